//! Logging setup for applications using the event listener
//!
//! The listener itself only emits `tracing` events. Applications that have
//! no subscriber of their own can install one here; alternatively a
//! specific `Dispatch` can be handed to `EventListenerBuilder::with_dispatch`.

use tracing_subscriber::{fmt, EnvFilter, Registry};

/// Logging mode for different use cases
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoggingMode {
    /// No subscriber is installed
    Silent,
    /// Compact stderr output at `info`
    Development,
    /// Verbose output at `debug` with source locations
    Debug,
}

impl LoggingMode {
    /// Parse an `EAGLE_LOG_MODE` value; unknown values are `None`
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "silent" => Some(LoggingMode::Silent),
            "development" | "dev" => Some(LoggingMode::Development),
            "debug" => Some(LoggingMode::Debug),
            _ => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Failed to initialize tracing subscriber: {0}")]
    TracingInit(String),

    #[error("Invalid log filter '{filter}': {reason}")]
    InvalidFilter { filter: String, reason: String },
}

/// Install a global subscriber for the given mode
///
/// # Environment Variables
///
/// - `EAGLE_LOG_LEVEL`: filter directive, e.g. `debug` or `event_listener=trace`
/// - `RUST_LOG`: used when `EAGLE_LOG_LEVEL` is unset
pub fn init_logging(mode: LoggingMode) -> Result<(), LoggingError> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    match mode {
        LoggingMode::Silent => Ok(()),
        LoggingMode::Development => Registry::default()
            .with(fmt::layer().with_target(false).compact())
            .with(env_filter("info")?)
            .try_init()
            .map_err(|e| LoggingError::TracingInit(e.to_string())),
        LoggingMode::Debug => Registry::default()
            .with(
                fmt::layer()
                    .pretty()
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true),
            )
            .with(env_filter("debug")?)
            .try_init()
            .map_err(|e| LoggingError::TracingInit(e.to_string())),
    }
}

/// Install a subscriber chosen by `EAGLE_LOG_MODE` (`silent`, `development`, `debug`)
///
/// Defaults to silent.
pub fn init_logging_from_env() -> Result<(), LoggingError> {
    let mode = std::env::var("EAGLE_LOG_MODE")
        .ok()
        .and_then(|name| LoggingMode::from_name(&name))
        .unwrap_or(LoggingMode::Silent);

    init_logging(mode)
}

/// Build a `Dispatch` that writes JSON lines, for `EventListenerBuilder::with_dispatch`
pub fn json_dispatch(filter: &str) -> Result<tracing::Dispatch, LoggingError> {
    use tracing_subscriber::layer::SubscriberExt;

    let filter = parse_filter(filter)?;
    let subscriber = Registry::default().with(fmt::layer().json()).with(filter);
    Ok(tracing::Dispatch::new(subscriber))
}

fn env_filter(default_level: &str) -> Result<EnvFilter, LoggingError> {
    let directive = std::env::var("EAGLE_LOG_LEVEL")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| default_level.to_string());

    parse_filter(&directive)
}

fn parse_filter(directive: &str) -> Result<EnvFilter, LoggingError> {
    EnvFilter::try_new(directive).map_err(|e| LoggingError::InvalidFilter {
        filter: directive.to_string(),
        reason: e.to_string(),
    })
}

/// Whether a global subscriber has been installed
pub fn is_initialized() -> bool {
    tracing::dispatcher::has_been_set()
}
