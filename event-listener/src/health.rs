//! Connection health monitoring
//!
//! A `HealthMonitor` is created fresh for every open connection and dropped
//! with it, so its timers never outlive the socket they watch. It combines
//! two concerns:
//!
//! - the staleness watchdog, always on: every `staleness_check_interval`
//!   it compares now against the last inbound frame and raises an alarm
//!   once the gap reaches `staleness_timeout`;
//! - the ping/pong probe, opt-in: a PING is due every `ping_interval` and
//!   an unanswered PING raises an alarm after `pong_timeout`.

use std::future::pending;
use std::time::Duration;

use tokio::time::{interval_at, sleep_until, Instant, Interval, MissedTickBehavior};

use crate::config::ListenerConfig;

/// Reason the monitor wants the worker's attention
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthAlarm {
    /// No inbound frame for at least the staleness timeout
    Stale(Duration),
    /// Time to send a PING
    PingDue,
    /// A PING went unanswered for the pong timeout
    PongOverdue(Duration),
}

pub struct HealthMonitor {
    staleness_check: Interval,
    staleness_timeout: Duration,
    last_message: Instant,
    ping: Option<Interval>,
    pong_timeout: Duration,
    pong_deadline: Option<Instant>,
}

fn periodic(period: Duration) -> Interval {
    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

impl HealthMonitor {
    /// Arm the monitor for a connection that just opened
    pub fn new(config: &ListenerConfig, ping_enabled: bool) -> Self {
        Self {
            staleness_check: periodic(config.staleness_check_interval),
            staleness_timeout: config.staleness_timeout,
            last_message: Instant::now(),
            ping: ping_enabled.then(|| periodic(config.ping_interval)),
            pong_timeout: config.pong_timeout,
            pong_deadline: None,
        }
    }

    /// Record inbound activity of any kind
    pub fn record_message(&mut self) {
        self.last_message = Instant::now();
    }

    /// Time since the last inbound frame
    pub fn silence(&self) -> Duration {
        self.last_message.elapsed()
    }

    /// Start the pong timeout for a PING that was just sent
    ///
    /// An already pending deadline is kept.
    pub fn ping_sent(&mut self) {
        if self.pong_deadline.is_none() {
            self.pong_deadline = Some(Instant::now() + self.pong_timeout);
        }
    }

    pub fn pong_received(&mut self) {
        self.pong_deadline = None;
    }

    pub fn awaiting_pong(&self) -> bool {
        self.pong_deadline.is_some()
    }

    /// Wait for the next alarm
    ///
    /// Cancel-safe; staleness checks that find the connection healthy are
    /// absorbed here and never returned.
    pub async fn next_alarm(&mut self) -> HealthAlarm {
        loop {
            tokio::select! {
                _ = self.staleness_check.tick() => {
                    let silence = self.last_message.elapsed();
                    if silence >= self.staleness_timeout {
                        return HealthAlarm::Stale(silence);
                    }
                }
                _ = tick_optional(&mut self.ping) => {
                    return HealthAlarm::PingDue;
                }
                _ = sleep_until_optional(self.pong_deadline) => {
                    self.pong_deadline = None;
                    return HealthAlarm::PongOverdue(self.pong_timeout);
                }
            }
        }
    }
}

async fn tick_optional(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => pending().await,
    }
}

async fn sleep_until_optional(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ListenerConfig {
        ListenerConfig::default()
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_after_timeout() {
        let start = Instant::now();
        let mut monitor = HealthMonitor::new(&config(), false);

        let alarm = monitor.next_alarm().await;
        assert_eq!(alarm, HealthAlarm::Stale(Duration::from_secs(120)));
        assert_eq!(start.elapsed(), Duration::from_secs(120));
    }

    #[tokio::test(start_paused = true)]
    async fn test_activity_defers_staleness() {
        let start = Instant::now();
        let mut monitor = HealthMonitor::new(&config(), false);

        tokio::time::sleep(Duration::from_secs(100)).await;
        monitor.record_message();

        // missed checks are delayed, so they resume at 100 and run every 30s
        let alarm = monitor.next_alarm().await;
        assert_eq!(alarm, HealthAlarm::Stale(Duration::from_secs(120)));
        assert_eq!(start.elapsed(), Duration::from_secs(220));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ping_cycle() {
        let mut monitor = HealthMonitor::new(&config(), true);

        assert_eq!(monitor.next_alarm().await, HealthAlarm::PingDue);
        monitor.ping_sent();
        assert!(monitor.awaiting_pong());

        tokio::time::sleep(Duration::from_secs(5)).await;
        monitor.record_message();
        monitor.pong_received();
        assert!(!monitor.awaiting_pong());

        assert_eq!(monitor.next_alarm().await, HealthAlarm::PingDue);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pong_overdue() {
        let start = Instant::now();
        let mut monitor = HealthMonitor::new(&config(), true);

        assert_eq!(monitor.next_alarm().await, HealthAlarm::PingDue);
        monitor.ping_sent();

        assert_eq!(
            monitor.next_alarm().await,
            HealthAlarm::PongOverdue(Duration::from_secs(15))
        );
        assert_eq!(start.elapsed(), Duration::from_secs(45));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_ping_when_disabled() {
        let mut monitor = HealthMonitor::new(&config(), false);
        let alarm = tokio::time::timeout(Duration::from_secs(60), monitor.next_alarm()).await;
        assert!(alarm.is_err());
    }
}
