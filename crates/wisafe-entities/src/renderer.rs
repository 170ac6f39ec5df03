//! Writes rendered entities into the state machine

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};
use wisafe_bridge::{BridgeSnapshot, Coordinator};
use wisafe_core::Context;
use wisafe_state_machine::StateMachine;

use crate::binary_sensor::{bridge_binary_sensors, device_binary_sensors};
use crate::button::Button;
use crate::description::RenderedEntity;
use crate::sensor::{bridge_sensors, device_sensors};

pub struct EntityRenderer {
    states: Arc<StateMachine>,
    include_disabled: bool,
    /// One slot per button; a button state is only written while its slot
    /// is locked, so a render never overwrites a newer press
    last_pressed: DashMap<Button, Option<DateTime<Utc>>>,
}

impl EntityRenderer {
    pub fn new(states: Arc<StateMachine>) -> Self {
        Self {
            states,
            include_disabled: false,
            last_pressed: Button::ALL.into_iter().map(|b| (b, None)).collect(),
        }
    }

    /// Also render entities that are disabled by default (Raw Data)
    pub fn include_disabled(mut self, include: bool) -> Self {
        self.include_disabled = include;
        self
    }

    /// Every enabled entity for `snapshot`: bridge entities, each device in
    /// registry order, then the buttons
    pub fn entities(&self, snapshot: &BridgeSnapshot) -> Vec<RenderedEntity> {
        let mut entities = self.snapshot_entities(snapshot);
        entities.extend(Button::ALL.iter().map(|b| b.render(self.last_pressed(*b))));
        entities
    }

    /// Bridge entities then device entities, buttons excluded
    fn snapshot_entities(&self, snapshot: &BridgeSnapshot) -> Vec<RenderedEntity> {
        let mut entities = bridge_sensors(snapshot);
        entities.extend(bridge_binary_sensors(snapshot));
        for (device_id, device) in &snapshot.devices {
            entities.extend(device_sensors(device_id, device));
            entities.extend(device_binary_sensors(device_id, device));
        }

        entities.retain(|e| self.include_disabled || e.description.enabled_by_default);
        entities
    }

    fn write(&self, entity: &RenderedEntity, context: Context) -> bool {
        match entity.entity_id() {
            Ok(entity_id) => {
                self.states
                    .set(entity_id, entity.state.clone(), entity.attributes(), context);
                true
            }
            Err(e) => {
                warn!(unique_id = %entity.description.unique_id, error = %e, "Skipping entity");
                false
            }
        }
    }

    /// Write all entities for `snapshot`; returns how many were written
    pub fn render(&self, snapshot: &BridgeSnapshot, context: &Context) -> usize {
        let before = self.states.entity_count();
        let mut count = 0;

        for entity in self.snapshot_entities(snapshot) {
            if self.write(&entity, context.child()) {
                count += 1;
            }
        }
        for button in Button::ALL {
            if let Some(slot) = self.last_pressed.get(&button) {
                if self.write(&button.render(*slot), context.child()) {
                    count += 1;
                }
            }
        }

        let added = self.states.entity_count().saturating_sub(before);
        if added > 0 {
            info!(added, total = self.states.entity_count(), "Added WiSafe2 entities");
        }
        count
    }

    /// Press a button: send its command and record the press as its state
    ///
    /// Returns whether the command was written.
    pub async fn press(&self, button: Button, coordinator: &Coordinator) -> bool {
        {
            let mut slot = self.last_pressed.entry(button).or_insert(None);
            *slot = Some(Utc::now());
            self.write(&button.render(*slot), Context::new());
        }

        let sent = coordinator.send_command(button.command()).await;
        debug!(button = %button, sent, "Button pressed");
        sent
    }

    pub fn last_pressed(&self, button: Button) -> Option<DateTime<Utc>> {
        self.last_pressed.get(&button).and_then(|slot| *slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wisafe_bridge::DeviceSnapshot;
    use wisafe_core::DeviceCategory;
    use wisafe_event_bus::EventBus;

    fn renderer() -> (Arc<StateMachine>, EntityRenderer) {
        let states = Arc::new(StateMachine::new(Arc::new(EventBus::new())));
        (states.clone(), EntityRenderer::new(states))
    }

    fn smoke_alarm() -> DeviceSnapshot {
        DeviceSnapshot {
            name: Some("FP2620W2".to_string()),
            model_id: Some("0401".to_string()),
            device_type: Some(DeviceCategory::Smoke),
            location: Some("Hall".to_string()),
            battery_status: "ok".to_string(),
            base_status: "attached".to_string(),
            last_event: None,
            last_test_result: None,
            last_seen: None,
            is_online: true,
            smoke_active: false,
            co_active: false,
            problems: Vec::new(),
        }
    }

    #[test]
    fn test_bridge_only_render() {
        let (states, renderer) = renderer();
        let written = renderer.render(&BridgeSnapshot::default(), &Context::new());

        // status, last message, connected, seven buttons
        assert_eq!(written, 10);
        assert_eq!(states.get_state("sensor.wisafe2_bridge_status").as_deref(), Some("Offline"));
        assert!(states.get("sensor.wisafe2_bridge_raw").is_none());
        assert_eq!(states.entity_ids("button").len(), 7);
    }

    #[test]
    fn test_include_disabled() {
        let (states, renderer) = renderer();
        let renderer = renderer.include_disabled(true);
        renderer.render(&BridgeSnapshot::default(), &Context::new());
        assert_eq!(states.get_state("sensor.wisafe2_bridge_raw").as_deref(), Some("unknown"));
    }

    #[test]
    fn test_late_devices_get_entities() {
        let (states, renderer) = renderer();
        let mut snapshot = BridgeSnapshot::default();
        renderer.render(&snapshot, &Context::new());

        snapshot.devices.insert("A1".to_string(), smoke_alarm());
        renderer.render(&snapshot, &Context::new());

        assert_eq!(states.get_state("sensor.wisafe2_a1_battery").as_deref(), Some("ok"));
        assert_eq!(states.get_state("binary_sensor.wisafe2_a1_smoke").as_deref(), Some("off"));
        assert!(states.get("binary_sensor.wisafe2_a1_co").is_none());

        let battery = states.get("sensor.wisafe2_a1_battery").unwrap();
        assert_eq!(battery.attributes["friendly_name"], "FP2620W2 Battery");
        assert_eq!(battery.attributes["device_id"], "A1");
        assert_eq!(battery.attributes["device"]["model"], "FP2620W2");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_render_never_rolls_back_a_press() {
        let (states, renderer) = renderer();
        let renderer = Arc::new(renderer);
        let coordinator = Coordinator::detached(Arc::new(EventBus::new()));

        let background = renderer.clone();
        let rendering = tokio::task::spawn_blocking(move || {
            for _ in 0..500 {
                background.render(&BridgeSnapshot::default(), &Context::new());
            }
        });
        for _ in 0..20 {
            renderer.press(Button::TestAll, &coordinator).await;
            tokio::task::yield_now().await;
        }
        rendering.await.unwrap();

        let pressed = renderer.last_pressed(Button::TestAll).unwrap();
        assert_eq!(
            states.get_state("button.wisafe2_test_all"),
            Some(pressed.to_rfc3339())
        );
        assert_eq!(renderer.entities(&BridgeSnapshot::default()).len(), 10);
    }

    #[tokio::test]
    async fn test_press_records_time_even_when_not_sent() {
        let (states, renderer) = renderer();
        let coordinator = Coordinator::detached(Arc::new(EventBus::new()));

        assert!(!renderer.press(Button::TestSmoke, &coordinator).await);
        assert!(renderer.last_pressed(Button::TestSmoke).is_some());
        assert_ne!(
            states.get_state("button.wisafe2_test_smoke").as_deref(),
            Some("unknown")
        );
    }
}
