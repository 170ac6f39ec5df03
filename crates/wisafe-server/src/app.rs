//! The running daemon: bridge, entities and notification log

use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use wisafe_bridge::Coordinator;
use wisafe_config::BridgeConfig;
use wisafe_core::events::{DEVICE_MISSING, EMERGENCY, STATE_CHANGED};
use wisafe_core::Context;
use wisafe_entities::EntityRenderer;
use wisafe_event_bus::EventBus;
use wisafe_state_machine::StateMachine;

use crate::console::{ConsoleCommand, HELP};

pub struct WiSafe2 {
    pub bus: Arc<EventBus>,
    pub states: Arc<StateMachine>,
    pub coordinator: Arc<Coordinator>,
    pub renderer: Arc<EntityRenderer>,
}

impl WiSafe2 {
    pub fn new(config: &BridgeConfig, all_entities: bool) -> Self {
        let bus = Arc::new(EventBus::new());
        Self::with_coordinator(bus.clone(), Coordinator::from_config(config, bus), all_entities)
    }

    pub fn with_coordinator(bus: Arc<EventBus>, coordinator: Coordinator, all_entities: bool) -> Self {
        let states = Arc::new(StateMachine::new(bus.clone()));
        let renderer = EntityRenderer::new(states.clone()).include_disabled(all_entities);
        Self {
            bus,
            states,
            coordinator: Arc::new(coordinator),
            renderer: Arc::new(renderer),
        }
    }

    /// Re-render entities on every published snapshot
    pub fn spawn_renderer(&self) -> JoinHandle<()> {
        let renderer = self.renderer.clone();
        let mut snapshots = self.coordinator.subscribe_snapshots();
        let context = Context::new();

        tokio::spawn(async move {
            loop {
                let snapshot = snapshots.borrow_and_update().clone();
                renderer.render(&snapshot, &context);
                if snapshots.changed().await.is_err() {
                    break;
                }
            }
        })
    }

    /// Log emergencies and missing devices as they happen
    pub fn spawn_notification_log(&self) -> JoinHandle<()> {
        let mut events = self.bus.subscribe_all();

        tokio::spawn(async move {
            loop {
                let event = match events.recv().await {
                    Ok(event) => event,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Notification log fell behind");
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                };

                match event.event_type.as_str() {
                    EMERGENCY => warn!(
                        device_id = %event.data["device_id"],
                        event_type = %event.data["event_type"],
                        device_name = %event.data["device_name"],
                        location = %event.data["location"],
                        "Alarm emergency"
                    ),
                    DEVICE_MISSING => warn!(
                        device_id = %event.data["device_id"],
                        device_name = %event.data["device_name"],
                        "Alarm missing"
                    ),
                    STATE_CHANGED => debug!(
                        entity_id = %event.data["entity_id"],
                        state = %event.data["new_state"]["state"],
                        "State changed"
                    ),
                    other => debug!(event_type = %other, "Event"),
                }
            }
        })
    }

    /// Run one console command; returns false when the daemon should exit
    pub async fn execute(&self, command: ConsoleCommand) -> bool {
        match command {
            ConsoleCommand::Press(button) => {
                let sent = self.renderer.press(button, &self.coordinator).await;
                println!("{}: {}", button, if sent { "sent" } else { "failed" });
            }
            ConsoleCommand::Send(command) => {
                let sent = self.coordinator.send_command(command).await;
                println!("{}: {}", command, if sent { "sent" } else { "failed" });
            }
            ConsoleCommand::Status => match self.coordinator.refresh() {
                Ok(snapshot) => match serde_json::to_string_pretty(&snapshot) {
                    Ok(text) => println!("{}", text),
                    Err(e) => warn!(error = %e, "Failed to format snapshot"),
                },
                Err(e) => warn!(error = %e, "Failed to read bridge state"),
            },
            ConsoleCommand::Help => println!("{}", HELP),
            ConsoleCommand::Quit => {
                info!("Quit requested");
                return false;
            }
        }
        true
    }
}
