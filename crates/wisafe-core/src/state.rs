//! Rendered state of one entity

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Context, EntityId};

/// State value plus attributes of an entity at a point in time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct State {
    pub entity_id: EntityId,

    /// The state value (e.g. "on", "Online", "low")
    pub state: String,

    #[serde(default)]
    pub attributes: HashMap<String, serde_json::Value>,

    /// Last time `state` took a different value
    pub last_changed: DateTime<Utc>,

    /// Last time the state or its attributes were written
    pub last_updated: DateTime<Utc>,

    pub context: Context,
}

impl State {
    pub fn new(
        entity_id: EntityId,
        state: impl Into<String>,
        attributes: HashMap<String, serde_json::Value>,
        context: Context,
    ) -> Self {
        let now = Utc::now();
        Self {
            entity_id,
            state: state.into(),
            attributes,
            last_changed: now,
            last_updated: now,
            context,
        }
    }

    /// Build the successor state, keeping `last_changed` when the value is the same
    pub fn with_update(
        &self,
        new_state: impl Into<String>,
        new_attributes: HashMap<String, serde_json::Value>,
        context: Context,
    ) -> Self {
        let now = Utc::now();
        let new_state = new_state.into();
        let last_changed = if self.state == new_state {
            self.last_changed
        } else {
            now
        };

        Self {
            entity_id: self.entity_id.clone(),
            state: new_state,
            attributes: new_attributes,
            last_changed,
            last_updated: now,
            context,
        }
    }

    /// Whether a write of (state, attributes) would differ from this state
    pub fn differs(&self, state: &str, attributes: &HashMap<String, serde_json::Value>) -> bool {
        self.state != state || &self.attributes != attributes
    }

    pub fn attribute<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.attributes
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

impl PartialEq for State {
    fn eq(&self, other: &Self) -> bool {
        // Timestamps and context are bookkeeping, not identity
        self.entity_id == other.entity_id
            && self.state == other.state
            && self.attributes == other.attributes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sensor() -> EntityId {
        EntityId::new("sensor", "wisafe2_d1_battery").unwrap()
    }

    #[test]
    fn test_same_value_keeps_last_changed() {
        let first = State::new(sensor(), "ok", HashMap::new(), Context::new());
        let second = first.with_update("ok", HashMap::new(), Context::new());
        assert_eq!(second.last_changed, first.last_changed);
        assert!(second.last_updated >= first.last_updated);
    }

    #[test]
    fn test_new_value_moves_last_changed() {
        let first = State::new(sensor(), "ok", HashMap::new(), Context::new());
        let second = first.with_update("low", HashMap::new(), Context::new());
        assert!(second.last_changed >= first.last_changed);
        assert_eq!(second.state, "low");
    }

    #[test]
    fn test_differs_and_attribute() {
        let attrs = HashMap::from([("device_id".to_string(), json!("D1"))]);
        let state = State::new(sensor(), "ok", attrs.clone(), Context::new());

        assert!(!state.differs("ok", &attrs));
        assert!(state.differs("low", &attrs));
        assert!(state.differs("ok", &HashMap::new()));
        assert_eq!(state.attribute::<String>("device_id").as_deref(), Some("D1"));
    }
}
