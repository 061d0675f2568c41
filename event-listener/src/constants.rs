//! Collection names and snapshot flags understood by the EagleApi server

/// Collection names as they appear in SNAPSHOT payloads
pub mod collections {
    pub const NOTIFY: &str = "notifies";
    pub const APP: &str = "apps";
    pub const USER: &str = "users";
    pub const DEVICE: &str = "devices";
    pub const ACCOM: &str = "accoms";
    pub const ROOM: &str = "rooms";
    pub const ROOM_STATE_LOG: &str = "room_state_logs";
    pub const ROOM_TYPE: &str = "room_types";
    pub const ROOM_INTERRUPT: &str = "room_interrupts";
    pub const ROOM_SALE: &str = "room_sales";
    pub const ROOM_PAYMENT: &str = "room_payments";
    pub const ROOM_RESERVE: &str = "room_reserves";
    pub const RESERVE_AGENT_CONFIG: &str = "reserve_agent_configs";
    pub const DOOR_LOCK: &str = "door_locks";
    pub const KIOSK: &str = "kiosks";
    pub const CUSTOM_CONFIG: &str = "custom_configs";
}

/// Snapshot flags accepted by the JOIN command
///
/// Each flag selects a collection or subset to subscribe to. The server
/// answers every flag with one SNAPSHOT message during initialization.
pub struct SnapshotFlag;

impl SnapshotFlag {
    pub const ACCOM: &'static str = "ACCOM";
    /// This client's own app record
    pub const APP: &'static str = "APP";
    pub const ALL_APPS: &'static str = "ALL_APP";
    pub const ALL_USERS: &'static str = "ALL_USERS";
    pub const ALL_DEVICES: &'static str = "ALL_DEVICES";
    pub const ALL_ROOMS: &'static str = "ALL_ROOMS";
    pub const ALL_ROOM_TYPES: &'static str = "ALL_ROOM_TYPES";
    pub const LAST_100_ROOM_STATE_LOGS: &'static str = "LAST_100_ROOM_STATE_LOGS";
    pub const GENERATED_AND_USING_ROOM_RESERVED: &'static str =
        "GENERATED_AND_USING_ROOM_RESERVED";
    pub const ALL_ROOM_INTERRUPTS: &'static str = "ALL_ROOM_INTERRUPTS";
    pub const ALL_DOOR_LOCKS: &'static str = "ALL_DOOR_LOCKS";
    pub const ALL_RESERVE_AGENT_CONFIGS: &'static str = "ALL_RESERVE_AGENT_CONFIGS";
    pub const ACTIVATED_ROOM_SALES: &'static str = "ACTIVATED_ROOM_SALES";
    pub const ALL_KIOSKS: &'static str = "ALL_KIOSKS";
    pub const ALL_NOTIFY: &'static str = "ALL_NOTIFY";
    /// This client's own kiosk record
    pub const KIOSK: &'static str = "KIOSK";
    pub const LAST_100_KIOSK_LOGS: &'static str = "LAST_100_KIOSK_LOGS";
    pub const ALL_TODAY_PAYMENTS: &'static str = "ALL_TODAY_PAYMENTS";

    /// Flag for a single device
    pub fn device(device_id: &str) -> String {
        format!("DEVICE:{device_id}")
    }

    /// Flag for a single custom config entry
    pub fn custom_config(key: &str) -> String {
        format!("CUSTOM_CONFIG:{key}")
    }
}
