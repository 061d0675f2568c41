//! Document change records
//!
//! A `DocumentChange` is emitted for every real change the detector finds in
//! a snapshot. Records are transient: they are handed to observers and never
//! stored.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Kind of change observed for a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    /// First sighting of the document
    Add,
    /// At least one field differs from the cached version
    Update,
    /// The server sent an explicit `null` for a cached document
    Remove,
}

impl std::fmt::Display for ChangeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChangeType::Add => write!(f, "add"),
            ChangeType::Update => write!(f, "update"),
            ChangeType::Remove => write!(f, "remove"),
        }
    }
}

/// A single add/update/remove derived from a snapshot
///
/// Invariants upheld by the detector:
/// - `Remove` has `data == None`
/// - `Add` has `previous_data == None` and no changed fields
/// - `Update` always lists at least one changed field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentChange {
    /// Document id, unique within its collection
    pub id: String,

    /// Collection the document belongs to
    pub collection_name: String,

    pub change_type: ChangeType,

    /// Current document body, `None` when removed
    pub data: Option<Value>,

    /// Cached body before this change, `None` on add
    pub previous_data: Option<Value>,

    /// Top-level fields that differ, populated on update only
    pub changed_fields: Vec<String>,

    /// `update_time` of the incoming document, `0.0` when it had none
    pub update_time: f64,
}

/// Before/after view of a single field in a change
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyChange<'a> {
    pub previous: Option<&'a Value>,
    pub current: Option<&'a Value>,
    pub changed: bool,
}

impl DocumentChange {
    /// Check whether a field is among the changed fields
    pub fn is_property_changed(&self, field: &str) -> bool {
        self.changed_fields.iter().any(|f| f == field)
    }

    /// Get the previous and current value of a field
    pub fn property_change(&self, field: &str) -> PropertyChange<'_> {
        PropertyChange {
            previous: self.previous_data.as_ref().and_then(|d| d.get(field)),
            current: self.data.as_ref().and_then(|d| d.get(field)),
            changed: self.is_property_changed(field),
        }
    }

    /// Decode the current body into a typed model
    ///
    /// Returns `Ok(None)` for removals.
    pub fn data_as<T: DeserializeOwned>(&self) -> Result<Option<T>, serde_json::Error> {
        self.data.clone().map(serde_json::from_value).transpose()
    }

    /// Decode the previous body into a typed model
    pub fn previous_data_as<T: DeserializeOwned>(&self) -> Result<Option<T>, serde_json::Error> {
        self.previous_data
            .clone()
            .map(serde_json::from_value)
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn update() -> DocumentChange {
        DocumentChange {
            id: "room-1".to_string(),
            collection_name: "rooms".to_string(),
            change_type: ChangeType::Update,
            data: Some(json!({"temp": 22, "name": "101"})),
            previous_data: Some(json!({"temp": 20, "name": "101"})),
            changed_fields: vec!["temp".to_string()],
            update_time: 101.0,
        }
    }

    #[test]
    fn test_property_change() {
        let change = update();

        assert!(change.is_property_changed("temp"));
        assert!(!change.is_property_changed("name"));

        let temp = change.property_change("temp");
        assert_eq!(temp.previous, Some(&json!(20)));
        assert_eq!(temp.current, Some(&json!(22)));
        assert!(temp.changed);

        let missing = change.property_change("missing");
        assert_eq!(missing.previous, None);
        assert!(!missing.changed);
    }

    #[test]
    fn test_typed_access() {
        #[derive(Deserialize, Debug, PartialEq)]
        struct Room {
            temp: i32,
            name: String,
        }

        let change = update();
        let room: Option<Room> = change.data_as().unwrap();
        assert_eq!(
            room,
            Some(Room {
                temp: 22,
                name: "101".to_string()
            })
        );

        let previous: Option<Room> = change.previous_data_as().unwrap();
        assert_eq!(previous.map(|r| r.temp), Some(20));
    }

    #[test]
    fn test_serialized_shape() {
        let value = serde_json::to_value(update()).unwrap();
        assert_eq!(value["changeType"], json!("update"));
        assert_eq!(value["collectionName"], json!("rooms"));
        assert_eq!(value["changedFields"], json!(["temp"]));
    }

    #[test]
    fn test_change_type_display() {
        assert_eq!(ChangeType::Add.to_string(), "add");
        assert_eq!(ChangeType::Remove.to_string(), "remove");
    }
}
