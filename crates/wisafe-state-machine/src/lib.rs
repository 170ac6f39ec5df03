//! Current state of every WiSafe2 entity
//!
//! Entities are re-rendered from each bridge snapshot, so most writes carry
//! the same value as before. Those are dropped here: only a write that
//! changes the value or the attributes is stored and announced with a
//! `state_changed` event.

use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument, trace};
use wisafe_core::events::StateChangedData;
use wisafe_core::{Context, EntityId, State};
use wisafe_event_bus::EventBus;

pub struct StateMachine {
    states: DashMap<String, State>,
    /// Entity ids per domain, in registration order
    domain_index: DashMap<String, Vec<String>>,
    event_bus: Arc<EventBus>,
}

impl StateMachine {
    pub fn new(event_bus: Arc<EventBus>) -> Self {
        Self {
            states: DashMap::new(),
            domain_index: DashMap::new(),
            event_bus,
        }
    }

    /// Write an entity state
    ///
    /// Returns the stored state. An identical write leaves the stored state
    /// (and its timestamps) alone and fires nothing.
    #[instrument(skip(self, state, attributes, context), fields(entity_id = %entity_id))]
    pub fn set(
        &self,
        entity_id: EntityId,
        state: impl Into<String>,
        attributes: HashMap<String, serde_json::Value>,
        context: Context,
    ) -> State {
        let key = entity_id.to_string();
        let state = state.into();

        let old_state = self.states.get(&key).map(|s| s.clone());
        if let Some(existing) = &old_state {
            if !existing.differs(&state, &attributes) {
                trace!("State unchanged");
                return existing.clone();
            }
        }

        let new_state = match &old_state {
            Some(existing) => existing.with_update(state, attributes, context.clone()),
            None => State::new(entity_id.clone(), state, attributes, context.clone()),
        };

        debug!(
            state = %new_state.state,
            old = old_state.as_ref().map(|s| s.state.as_str()).unwrap_or("-"),
            "Entity state changed"
        );

        self.states.insert(key.clone(), new_state.clone());
        if old_state.is_none() {
            self.domain_index
                .entry(entity_id.domain().to_string())
                .or_default()
                .push(key);
        }

        self.event_bus.fire_typed(
            StateChangedData {
                entity_id,
                old_state,
                new_state: Some(new_state.clone()),
            },
            context,
        );

        new_state
    }

    pub fn get(&self, entity_id: &str) -> Option<State> {
        self.states.get(entity_id).map(|s| s.clone())
    }

    pub fn get_state(&self, entity_id: &str) -> Option<String> {
        self.states.get(entity_id).map(|s| s.state.clone())
    }

    pub fn is_state(&self, entity_id: &str, state: &str) -> bool {
        self.get_state(entity_id).as_deref() == Some(state)
    }

    pub fn entity_ids(&self, domain: &str) -> Vec<String> {
        self.domain_index
            .get(domain)
            .map(|v| v.clone())
            .unwrap_or_default()
    }

    pub fn domain_states(&self, domain: &str) -> Vec<State> {
        self.entity_ids(domain)
            .iter()
            .filter_map(|id| self.get(id))
            .collect()
    }

    /// All states, sorted by entity id
    pub fn all(&self) -> Vec<State> {
        let mut states: Vec<State> = self.states.iter().map(|r| r.value().clone()).collect();
        states.sort_by(|a, b| a.entity_id.cmp(&b.entity_id));
        states
    }

    /// Drop an entity, announcing it with an empty `new_state`
    #[instrument(skip(self, context), fields(entity_id = %entity_id))]
    pub fn remove(&self, entity_id: &EntityId, context: Context) -> Option<State> {
        let key = entity_id.to_string();
        let old_state = self.states.remove(&key).map(|(_, s)| s)?;

        if let Some(mut ids) = self.domain_index.get_mut(entity_id.domain()) {
            ids.retain(|id| id != &key);
        }
        self.event_bus.fire_typed(
            StateChangedData {
                entity_id: entity_id.clone(),
                old_state: Some(old_state.clone()),
                new_state: None,
            },
            context,
        );
        Some(old_state)
    }

    pub fn entity_count(&self) -> usize {
        self.states.len()
    }
}

pub type SharedStateMachine = Arc<StateMachine>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn setup() -> (Arc<EventBus>, StateMachine) {
        let bus = Arc::new(EventBus::new());
        let sm = StateMachine::new(bus.clone());
        (bus, sm)
    }

    fn id(domain: &str, object_id: &str) -> EntityId {
        EntityId::new(domain, object_id).unwrap()
    }

    #[test]
    fn test_set_and_get() {
        let (_, sm) = setup();
        let attrs = HashMap::from([("device_id".to_string(), json!("D1"))]);

        let state = sm.set(id("sensor", "wisafe2_d1_battery"), "ok", attrs.clone(), Context::new());
        assert_eq!(state.state, "ok");
        assert_eq!(state.attributes, attrs);
        assert!(sm.is_state("sensor.wisafe2_d1_battery", "ok"));
        assert_eq!(sm.get_state("sensor.absent"), None);
    }

    #[test]
    fn test_domain_index_keeps_registration_order() {
        let (_, sm) = setup();
        sm.set(id("sensor", "b"), "1", HashMap::new(), Context::new());
        sm.set(id("binary_sensor", "x"), "off", HashMap::new(), Context::new());
        sm.set(id("sensor", "a"), "2", HashMap::new(), Context::new());

        assert_eq!(sm.entity_ids("sensor"), vec!["sensor.b", "sensor.a"]);
        assert_eq!(sm.domain_states("binary_sensor").len(), 1);
        assert_eq!(sm.entity_count(), 3);
        assert_eq!(sm.all()[0].entity_id.to_string(), "binary_sensor.x");
    }

    #[test]
    fn test_identical_write_is_dropped() {
        let (bus, sm) = setup();
        let mut rx = bus.subscribe_typed::<StateChangedData>();

        let first = sm.set(id("sensor", "t"), "ok", HashMap::new(), Context::new());
        let second = sm.set(id("sensor", "t"), "ok", HashMap::new(), Context::new());

        assert_eq!(first.last_updated, second.last_updated);
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_attribute_change_keeps_last_changed() {
        let (_, sm) = setup();
        let first = sm.set(id("sensor", "t"), "ok", HashMap::new(), Context::new());
        std::thread::sleep(std::time::Duration::from_millis(5));
        let second = sm.set(
            id("sensor", "t"),
            "ok",
            HashMap::from([("location".to_string(), json!("Hall"))]),
            Context::new(),
        );

        assert_eq!(first.last_changed, second.last_changed);
        assert!(second.last_updated > first.last_updated);
    }

    #[test]
    fn test_remove() {
        let (_, sm) = setup();
        let entity = id("button", "test_all");
        sm.set(entity.clone(), "unknown", HashMap::new(), Context::new());

        assert_eq!(sm.remove(&entity, Context::new()).unwrap().state, "unknown");
        assert!(sm.get("button.test_all").is_none());
        assert!(sm.entity_ids("button").is_empty());
        assert!(sm.remove(&entity, Context::new()).is_none());
    }

    #[tokio::test]
    async fn test_state_changed_event() {
        let (bus, sm) = setup();
        let mut rx = bus.subscribe_typed::<StateChangedData>();

        sm.set(id("binary_sensor", "smoke"), "off", HashMap::new(), Context::new());
        sm.set(id("binary_sensor", "smoke"), "on", HashMap::new(), Context::new());

        let created = rx.recv().await.unwrap();
        assert!(created.data.old_state.is_none());

        let changed = rx.recv().await.unwrap();
        assert_eq!(changed.data.old_state.unwrap().state, "off");
        assert_eq!(changed.data.new_state.unwrap().state, "on");
    }
}
