//! Byte transports to the bridge
//!
//! All calls block. The coordinator runs them on the blocking pool.

use serialport::SerialPort;
use std::collections::VecDeque;
use std::io::{self, BufRead, BufReader, ErrorKind, Write};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{BridgeError, BridgeResult};

/// Read timeout of the serial port; bounds how long `read_line` can block
pub const READ_TIMEOUT: Duration = Duration::from_millis(100);

pub trait Transport: Send {
    /// Bytes that can be read without blocking
    fn bytes_available(&mut self) -> io::Result<usize>;

    /// Read up to and including the next `\n`
    ///
    /// May return a partial line when the read times out first.
    fn read_line(&mut self) -> io::Result<Vec<u8>>;

    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Release the underlying device; later calls fail with `NotConnected`
    fn close(&mut self);

    fn describe(&self) -> String;
}

fn not_connected() -> io::Error {
    io::Error::new(ErrorKind::NotConnected, "transport closed")
}

/// Serial port at 8N1
pub struct SerialTransport {
    port_name: String,
    baud_rate: u32,
    reader: Option<BufReader<Box<dyn SerialPort>>>,
}

impl SerialTransport {
    pub fn open(port_name: &str, baud_rate: u32) -> BridgeResult<Self> {
        let port = serialport::new(port_name, baud_rate)
            .data_bits(serialport::DataBits::Eight)
            .stop_bits(serialport::StopBits::One)
            .parity(serialport::Parity::None)
            .timeout(READ_TIMEOUT)
            .open()
            .map_err(|e| BridgeError::Open {
                port: port_name.to_string(),
                source: e,
            })?;

        info!(port = %port_name, baud_rate, "Opened serial port");
        Ok(Self {
            port_name: port_name.to_string(),
            baud_rate,
            reader: Some(BufReader::new(port)),
        })
    }

    fn reader(&mut self) -> io::Result<&mut BufReader<Box<dyn SerialPort>>> {
        self.reader.as_mut().ok_or_else(not_connected)
    }
}

impl Transport for SerialTransport {
    fn bytes_available(&mut self) -> io::Result<usize> {
        let reader = self.reader()?;
        let buffered = reader.buffer().len();
        let pending = reader.get_ref().bytes_to_read().map_err(io::Error::from)?;
        Ok(buffered + pending as usize)
    }

    fn read_line(&mut self) -> io::Result<Vec<u8>> {
        let mut line = Vec::new();
        match self.reader()?.read_until(b'\n', &mut line) {
            Ok(_) => Ok(line),
            // read_until keeps what it read before the timeout
            Err(e) if e.kind() == ErrorKind::TimedOut => Ok(line),
            Err(e) => Err(e),
        }
    }

    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        let port = self.reader()?.get_mut();
        port.write_all(bytes)?;
        port.flush()
    }

    fn close(&mut self) {
        if self.reader.take().is_some() {
            info!(port = %self.port_name, "Closed serial port");
        }
    }

    fn describe(&self) -> String {
        format!("{} @ {} baud", self.port_name, self.baud_rate)
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    inbound: VecDeque<u8>,
    written: Vec<u8>,
    closed: bool,
    fail_reads: bool,
    fail_writes: bool,
}

/// In-process transport fed through a [`MemoryHandle`]
pub struct MemoryTransport {
    state: Arc<Mutex<MemoryState>>,
}

/// Test side of a [`MemoryTransport`]: inject input, inspect output
#[derive(Clone)]
pub struct MemoryHandle {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryTransport {
    pub fn new() -> (Self, MemoryHandle) {
        let state = Arc::new(Mutex::new(MemoryState::default()));
        (
            Self {
                state: state.clone(),
            },
            MemoryHandle { state },
        )
    }

    fn state(&self) -> io::Result<MutexGuard<'_, MemoryState>> {
        let state = self
            .state
            .lock()
            .map_err(|_| io::Error::new(ErrorKind::Other, "memory transport poisoned"))?;
        if state.closed {
            return Err(not_connected());
        }
        Ok(state)
    }
}

impl Transport for MemoryTransport {
    fn bytes_available(&mut self) -> io::Result<usize> {
        let state = self.state()?;
        if state.fail_reads {
            return Err(io::Error::new(ErrorKind::BrokenPipe, "injected read failure"));
        }
        Ok(state.inbound.len())
    }

    fn read_line(&mut self) -> io::Result<Vec<u8>> {
        let mut state = self.state()?;
        if state.fail_reads {
            return Err(io::Error::new(ErrorKind::BrokenPipe, "injected read failure"));
        }
        let mut line = Vec::new();
        while let Some(byte) = state.inbound.pop_front() {
            line.push(byte);
            if byte == b'\n' {
                break;
            }
        }
        Ok(line)
    }

    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        let mut state = self.state()?;
        if state.fail_writes {
            return Err(io::Error::new(ErrorKind::BrokenPipe, "injected write failure"));
        }
        state.written.extend_from_slice(bytes);
        Ok(())
    }

    fn close(&mut self) {
        if let Ok(mut state) = self.state.lock() {
            state.closed = true;
        }
        debug!("Closed memory transport");
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

impl MemoryHandle {
    /// Queue one line; a trailing newline is added
    pub fn push_line(&self, line: &str) {
        let mut bytes = line.as_bytes().to_vec();
        bytes.push(b'\n');
        self.push_bytes(&bytes);
    }

    pub fn push_bytes(&self, bytes: &[u8]) {
        if let Ok(mut state) = self.state.lock() {
            state.inbound.extend(bytes.iter().copied());
        }
    }

    /// Everything written to the transport so far
    pub fn written(&self) -> Vec<u8> {
        self.state
            .lock()
            .map(|s| s.written.clone())
            .unwrap_or_default()
    }

    pub fn pending(&self) -> usize {
        self.state.lock().map(|s| s.inbound.len()).unwrap_or(0)
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().map(|s| s.closed).unwrap_or(true)
    }

    pub fn fail_reads(&self, fail: bool) {
        if let Ok(mut state) = self.state.lock() {
            state.fail_reads = fail;
        }
    }

    pub fn fail_writes(&self, fail: bool) {
        if let Ok(mut state) = self.state.lock() {
            state.fail_writes = fail;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_lines() {
        let (mut transport, handle) = MemoryTransport::new();
        handle.push_line(r#"{"type":"heartbeat"}"#);
        handle.push_line("READY");

        assert_eq!(transport.bytes_available().unwrap(), 27);
        assert_eq!(transport.read_line().unwrap(), b"{\"type\":\"heartbeat\"}\n");
        assert_eq!(transport.read_line().unwrap(), b"READY\n");
        assert_eq!(transport.bytes_available().unwrap(), 0);
        assert!(transport.read_line().unwrap().is_empty());
    }

    #[test]
    fn test_memory_partial_line() {
        let (mut transport, handle) = MemoryTransport::new();
        handle.push_bytes(b"{\"dev");
        assert_eq!(transport.read_line().unwrap(), b"{\"dev");
    }

    #[test]
    fn test_memory_writes_and_close() {
        let (mut transport, handle) = MemoryTransport::new();
        transport.write_all(b"1~").unwrap();
        transport.write_all(b"3~").unwrap();
        assert_eq!(handle.written(), b"1~3~");

        transport.close();
        assert!(handle.is_closed());
        assert_eq!(
            transport.write_all(b"2~").unwrap_err().kind(),
            ErrorKind::NotConnected
        );
    }

    #[test]
    fn test_memory_injected_failures() {
        let (mut transport, handle) = MemoryTransport::new();
        handle.fail_reads(true);
        assert!(transport.bytes_available().is_err());
        handle.fail_reads(false);
        assert!(transport.bytes_available().is_ok());

        handle.fail_writes(true);
        assert!(transport.write_all(b"1~").is_err());
        assert!(handle.written().is_empty());
    }

    #[test]
    fn test_open_missing_port_fails() {
        let err = SerialTransport::open("/dev/wisafe2-does-not-exist", 115_200)
            .err()
            .unwrap();
        assert!(matches!(err, BridgeError::Open { .. }));
    }
}
