//! Bridge lifecycle: reader loop, status poll and command sender
//!
//! Serial I/O blocks, so every transport call runs on the blocking pool.
//! The dispatcher sits behind a std mutex that is only ever held inside
//! synchronous sections, never across an await point.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};
use wisafe_config::BridgeConfig;
use wisafe_core::liveness::POLL_INTERVAL;
use wisafe_core::{Command, Device, DEFAULT_BAUD_RATE};
use wisafe_event_bus::EventBus;

use crate::dispatcher::Dispatcher;
use crate::error::{BridgeError, BridgeResult};
use crate::snapshot::BridgeSnapshot;
use crate::transport::{SerialTransport, Transport};

/// Sleep when the transport has nothing to read
const IDLE_DELAY: Duration = Duration::from_millis(100);

/// Pause after a failed read before trying again
const READ_ERROR_PAUSE: Duration = Duration::from_secs(1);

const UPDATE_CHANNEL_CAPACITY: usize = 64;

type SharedTransport = Arc<Mutex<Option<Box<dyn Transport>>>>;

/// Source of the current time for liveness decisions
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// State shared between the coordinator and its background tasks
struct Shared {
    dispatcher: Mutex<Dispatcher>,
    transport: SharedTransport,
    running: AtomicBool,
    snapshots: watch::Sender<BridgeSnapshot>,
    updates: broadcast::Sender<Value>,
    clock: Clock,
    poll_interval: Duration,
}

impl Shared {
    fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    fn dispatcher(&self) -> BridgeResult<MutexGuard<'_, Dispatcher>> {
        self.dispatcher.lock().map_err(|_| BridgeError::LockPoisoned)
    }

    fn snapshot_now(&self) -> BridgeResult<BridgeSnapshot> {
        let now = self.now();
        Ok(self.dispatcher()?.snapshot(now))
    }

    /// Read one line if any bytes are waiting
    async fn read_available(&self) -> BridgeResult<Option<Vec<u8>>> {
        let transport = self.transport.clone();
        tokio::task::spawn_blocking(move || -> BridgeResult<Option<Vec<u8>>> {
            let mut guard = transport.lock().map_err(|_| BridgeError::LockPoisoned)?;
            let transport = guard.as_mut().ok_or(BridgeError::NotConnected)?;
            if transport.bytes_available()? == 0 {
                return Ok(None);
            }
            Ok(Some(transport.read_line()?))
        })
        .await?
    }

    fn process_bytes(&self, bytes: Vec<u8>) {
        let text = match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(e) => {
                debug!(error = %e, "Failed to decode serial data");
                return;
            }
        };
        let line = text.trim();
        if line.is_empty() {
            return;
        }

        let (update, snapshot) = match self.dispatcher() {
            Ok(mut dispatcher) => {
                let now = self.now();
                dispatcher.record_raw(line);
                let update = dispatcher.handle_line(line, now);
                (update, dispatcher.snapshot(now))
            }
            Err(e) => {
                error!(error = %e, "Dropping line");
                return;
            }
        };

        if let Some(update) = update {
            // No listeners is fine
            let _ = self.updates.send(update);
        }
        self.snapshots.send_replace(snapshot);
    }

    async fn write(&self, bytes: &'static [u8]) -> BridgeResult<()> {
        let transport = self.transport.clone();
        tokio::task::spawn_blocking(move || -> BridgeResult<()> {
            let mut guard = transport.lock().map_err(|_| BridgeError::LockPoisoned)?;
            let transport = guard.as_mut().ok_or(BridgeError::NotConnected)?;
            transport.write_all(bytes)?;
            Ok(())
        })
        .await?
    }
}

pub struct Coordinator {
    serial_port: String,
    baud_rate: u32,
    shared: Arc<Shared>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Coordinator {
    /// Coordinator for `serial_port`; nothing is opened until [`Coordinator::start`]
    pub fn new(serial_port: impl Into<String>, baud_rate: u32, event_bus: Arc<EventBus>) -> Self {
        let (snapshots, _) = watch::channel(BridgeSnapshot::default());
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);

        Self {
            serial_port: serial_port.into(),
            baud_rate,
            shared: Arc::new(Shared {
                dispatcher: Mutex::new(Dispatcher::new(event_bus)),
                transport: Arc::new(Mutex::new(None)),
                running: AtomicBool::new(false),
                snapshots,
                updates,
                clock: Arc::new(Utc::now),
                poll_interval: POLL_INTERVAL,
            }),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Replace the wall clock used for liveness; only takes effect before start
    pub fn with_clock(mut self, clock: Clock) -> Self {
        match Arc::get_mut(&mut self.shared) {
            Some(shared) => shared.clock = clock,
            None => warn!("Clock can only be replaced before start"),
        }
        self
    }

    /// Change the status poll period; only takes effect before start
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        match Arc::get_mut(&mut self.shared) {
            Some(shared) => shared.poll_interval = poll_interval,
            None => warn!("Poll interval can only be changed before start"),
        }
        self
    }

    /// Coordinator for the configured port, with configured devices registered
    pub fn from_config(config: &BridgeConfig, event_bus: Arc<EventBus>) -> Self {
        let coordinator = Self::new(&config.serial_port, config.baud_rate, event_bus);
        for device in &config.devices {
            if let Err(e) = coordinator.add_device(
                &device.device_id,
                device.model.as_deref(),
                device.name.as_deref(),
                device.location.as_deref(),
            ) {
                error!(device_id = %device.device_id, error = %e, "Failed to register device");
            }
        }
        coordinator
    }

    /// Coordinator with no serial port, for use with [`Coordinator::start_with`]
    pub fn detached(event_bus: Arc<EventBus>) -> Self {
        Self::new("", DEFAULT_BAUD_RATE, event_bus)
    }

    /// Open the serial port and start the background tasks
    ///
    /// Returns false if the port cannot be opened or the bridge is
    /// already running.
    #[instrument(skip(self), fields(port = %self.serial_port, baud_rate = self.baud_rate))]
    pub async fn start(&self) -> bool {
        if self.is_running() {
            warn!("Bridge already running");
            return false;
        }

        let port = self.serial_port.clone();
        let baud_rate = self.baud_rate;
        match tokio::task::spawn_blocking(move || SerialTransport::open(&port, baud_rate)).await {
            Ok(Ok(transport)) => self.start_with(Box::new(transport)),
            Ok(Err(e)) => {
                error!(error = %e, "Failed to connect to WiSafe2 bridge");
                false
            }
            Err(e) => {
                error!(error = %e, "Serial open task failed");
                false
            }
        }
    }

    /// Start the background tasks over an already open transport
    ///
    /// Must be called from within a tokio runtime.
    pub fn start_with(&self, transport: Box<dyn Transport>) -> bool {
        if self
            .shared
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!("Bridge already running");
            return false;
        }
        let description = transport.describe();

        match self.shared.transport.lock() {
            Ok(mut slot) => *slot = Some(transport),
            Err(_) => {
                error!("Transport lock poisoned");
                self.shared.running.store(false, Ordering::SeqCst);
                return false;
            }
        }

        let reader = tokio::spawn(read_loop(self.shared.clone()));
        let poll = tokio::spawn(poll_loop(self.shared.clone()));
        match self.tasks.lock() {
            Ok(mut tasks) => tasks.extend([reader, poll]),
            Err(_) => {
                error!("Task list lock poisoned");
                reader.abort();
                poll.abort();
                self.shared.running.store(false, Ordering::SeqCst);
                return false;
            }
        }

        info!(transport = %description, "Connected to WiSafe2 bridge");
        true
    }

    /// Stop the background tasks and close the transport
    pub async fn stop(&self) {
        self.shared.running.store(false, Ordering::SeqCst);

        let tasks = match self.tasks.lock() {
            Ok(mut tasks) => std::mem::take(&mut *tasks),
            Err(_) => Vec::new(),
        };
        for task in &tasks {
            task.abort();
        }
        for task in tasks {
            // Cancellation is the expected outcome
            let _ = task.await;
        }

        let transport = self.shared.transport.clone();
        let closed = tokio::task::spawn_blocking(move || {
            if let Ok(mut slot) = transport.lock() {
                if let Some(mut transport) = slot.take() {
                    transport.close();
                    return true;
                }
            }
            false
        })
        .await;

        match closed {
            Ok(true) => info!("WiSafe2 bridge stopped"),
            Ok(false) => debug!("Bridge was not connected"),
            Err(e) => error!(error = %e, "Failed to close transport"),
        }
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    /// Write a command to the bridge
    ///
    /// Returns false when the bridge is not running or the write fails.
    /// There is no retry and no acknowledgement.
    pub async fn send_command(&self, command: Command) -> bool {
        if !self.is_running() {
            error!(command = %command, "Cannot send command: bridge not connected");
            return false;
        }

        match self.shared.write(command.as_bytes()).await {
            Ok(()) => {
                debug!(command = %command, "Sent command");
                true
            }
            Err(e) => {
                error!(command = %command, error = %e, "Failed to send command");
                false
            }
        }
    }

    /// Send a command given by code (`1~`) or name (`test_co`)
    pub async fn send(&self, command: &str) -> bool {
        match command.parse::<Command>() {
            Ok(command) => self.send_command(command).await,
            Err(e) => {
                error!(error = %e, "Cannot send command");
                false
            }
        }
    }

    /// Ask every CO alarm to run its self test
    pub async fn test_co(&self) -> bool {
        self.send_command(Command::TestCo).await
    }

    /// Ask every smoke alarm to run its self test
    pub async fn test_smoke(&self) -> bool {
        self.send_command(Command::TestSmoke).await
    }

    /// Self test every paired alarm
    pub async fn test_all(&self) -> bool {
        self.send_command(Command::TestAll).await
    }

    /// Raise a CO emergency across the network
    pub async fn emergency_co(&self) -> bool {
        self.send_command(Command::EmergencyCo).await
    }

    /// Raise a fire emergency across the network
    pub async fn emergency_smoke(&self) -> bool {
        self.send_command(Command::EmergencySmoke).await
    }

    /// Silence sounding CO alarms
    pub async fn silence_co(&self) -> bool {
        self.send_command(Command::SilenceCo).await
    }

    /// Silence sounding smoke alarms
    pub async fn silence_smoke(&self) -> bool {
        self.send_command(Command::SilenceSmoke).await
    }

    /// Ask the bridge for its pairing status
    pub async fn get_pairing(&self) -> bool {
        self.send_command(Command::GetPairing).await
    }

    /// Put the bridge into pairing mode
    pub async fn start_pairing(&self) -> bool {
        self.send_command(Command::StartPairing).await
    }

    /// Register a device ahead of its first message, or update it
    pub fn add_device(
        &self,
        device_id: &str,
        model_id: Option<&str>,
        name: Option<&str>,
        location: Option<&str>,
    ) -> BridgeResult<Device> {
        let (device, snapshot) = {
            let mut dispatcher = self.shared.dispatcher()?;
            let device = dispatcher
                .registry_mut()
                .register(device_id, model_id, name, location)
                .clone();
            (device, dispatcher.snapshot(self.shared.now()))
        };
        self.shared.snapshots.send_replace(snapshot);
        Ok(device)
    }

    pub fn device(&self, device_id: &str) -> Option<Device> {
        self.shared
            .dispatcher()
            .ok()?
            .registry()
            .get(device_id)
            .cloned()
    }

    /// Bridge liveness as of now
    pub fn bridge_online(&self) -> bool {
        self.shared
            .dispatcher()
            .map(|d| d.bridge_online(self.shared.now()))
            .unwrap_or(false)
    }

    /// Fresh snapshot computed now, also published to subscribers
    pub fn refresh(&self) -> BridgeResult<BridgeSnapshot> {
        let snapshot = self.shared.snapshot_now()?;
        self.shared.snapshots.send_replace(snapshot.clone());
        Ok(snapshot)
    }

    /// Last published snapshot
    pub fn snapshot(&self) -> BridgeSnapshot {
        self.shared.snapshots.borrow().clone()
    }

    pub fn subscribe_snapshots(&self) -> watch::Receiver<BridgeSnapshot> {
        self.shared.snapshots.subscribe()
    }

    /// Every accepted frame, as parsed
    pub fn subscribe_updates(&self) -> broadcast::Receiver<Value> {
        self.shared.updates.subscribe()
    }

    pub fn serial_port(&self) -> &str {
        &self.serial_port
    }

    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }
}

async fn read_loop(shared: Arc<Shared>) {
    debug!("Reader started");
    while shared.running.load(Ordering::SeqCst) {
        match shared.read_available().await {
            Ok(Some(bytes)) => shared.process_bytes(bytes),
            Ok(None) => tokio::time::sleep(IDLE_DELAY).await,
            Err(e) => {
                error!(error = %e, "Error reading serial");
                tokio::time::sleep(READ_ERROR_PAUSE).await;
            }
        }
    }
    debug!("Reader stopped");
}

async fn poll_loop(shared: Arc<Shared>) {
    let mut interval = tokio::time::interval(shared.poll_interval);
    let mut was_online = false;

    while shared.running.load(Ordering::SeqCst) {
        interval.tick().await;

        let snapshot = match shared.snapshot_now() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                error!(error = %e, "Status poll failed");
                continue;
            }
        };
        if was_online && !snapshot.bridge_online {
            warn!("WiSafe2 bridge appears offline");
        }
        was_online = snapshot.bridge_online;
        shared.snapshots.send_replace(snapshot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MemoryTransport;
    use wisafe_config::DeviceConfig;

    fn bus() -> Arc<EventBus> {
        Arc::new(EventBus::new())
    }

    #[tokio::test]
    async fn test_send_before_start_fails() {
        let coordinator = Coordinator::detached(bus());
        assert!(!coordinator.send("1~").await);
        assert!(!coordinator.test_all().await);
    }

    #[tokio::test]
    async fn test_send_after_start_writes_bytes() {
        let coordinator = Coordinator::detached(bus());
        let (transport, handle) = MemoryTransport::new();
        assert!(coordinator.start_with(Box::new(transport)));

        assert!(coordinator.send("1~").await);
        assert!(coordinator.silence_smoke().await);
        assert_eq!(handle.written(), b"1~7~");

        coordinator.stop().await;
    }

    #[tokio::test]
    async fn test_send_unknown_command() {
        let coordinator = Coordinator::detached(bus());
        let (transport, handle) = MemoryTransport::new();
        coordinator.start_with(Box::new(transport));

        assert!(!coordinator.send("0~").await);
        assert!(handle.written().is_empty());
        coordinator.stop().await;
    }

    #[tokio::test]
    async fn test_write_failure_returns_false() {
        let coordinator = Coordinator::detached(bus());
        let (transport, handle) = MemoryTransport::new();
        coordinator.start_with(Box::new(transport));
        handle.fail_writes(true);

        assert!(!coordinator.get_pairing().await);
        coordinator.stop().await;
    }

    #[tokio::test]
    async fn test_start_twice_rejected() {
        let coordinator = Coordinator::detached(bus());
        let (first, _) = MemoryTransport::new();
        let (second, _) = MemoryTransport::new();

        assert!(coordinator.start_with(Box::new(first)));
        assert!(!coordinator.start_with(Box::new(second)));
        coordinator.stop().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_starts_admit_one() {
        let coordinator = Arc::new(Coordinator::detached(bus()));
        let barrier = Arc::new(std::sync::Barrier::new(8));

        let attempts: Vec<_> = (0..8)
            .map(|_| {
                let coordinator = coordinator.clone();
                let barrier = barrier.clone();
                let handle = tokio::runtime::Handle::current();
                std::thread::spawn(move || {
                    let _guard = handle.enter();
                    let (transport, _) = MemoryTransport::new();
                    barrier.wait();
                    coordinator.start_with(Box::new(transport))
                })
            })
            .collect();

        let started = attempts
            .into_iter()
            .map(|t| t.join().unwrap())
            .filter(|started| *started)
            .count();
        assert_eq!(started, 1);
        assert_eq!(coordinator.tasks.lock().unwrap().len(), 2);

        coordinator.stop().await;
    }

    #[tokio::test]
    async fn test_stop_closes_transport() {
        let coordinator = Coordinator::detached(bus());
        let (transport, handle) = MemoryTransport::new();
        coordinator.start_with(Box::new(transport));

        coordinator.stop().await;
        assert!(handle.is_closed());
        assert!(!coordinator.is_running());
        assert!(!coordinator.test_co().await);
    }

    #[tokio::test]
    async fn test_start_on_missing_port_fails() {
        let coordinator = Coordinator::new("/dev/wisafe2-does-not-exist", 115_200, bus());
        assert!(!coordinator.start().await);
        assert!(!coordinator.is_running());
    }

    #[test]
    fn test_from_config_registers_devices() {
        let mut config = BridgeConfig::new("/dev/ttyUSB0");
        config.devices.push(DeviceConfig {
            device_id: "A1".to_string(),
            model: Some("0301".to_string()),
            name: None,
            location: Some("Landing".to_string()),
        });

        let coordinator = Coordinator::from_config(&config, bus());
        let device = coordinator.device("A1").unwrap();
        assert_eq!(device.name.as_deref(), Some("W2-CO-10X"));
        assert_eq!(device.location.as_deref(), Some("Landing"));
        assert!(coordinator.snapshot().device("A1").is_some());
        assert!(!coordinator.bridge_online());
    }
}
