//! TrueRNG discovery and serial session handling.
//!
//! The TrueRNG family enumerates as a USB CDC serial port and starts
//! streaming entropy as soon as DTR is asserted. There is no command
//! protocol: a session is just an open port with DTR high, read in
//! fixed-size chunks.
//!
//! # Stale data
//!
//! The OS driver keeps buffering while nobody reads, so the input buffer is
//! discarded on open and again before every sample. How much actually gets
//! dropped depends on the platform driver; treat the flush as best effort.

use std::io::{self, ErrorKind, Read};
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use serialport::{ClearBuffer, SerialPort, SerialPortType};

use crate::errors::{AcquisitionError, Result};
use crate::sampler::Sample;

// ============================================================================
// Constants
// ============================================================================

/// Nominal baud rate. The device is USB CDC, so the value is not used on the wire.
const BAUD_RATE: u32 = 115200;

/// A sample read that produces nothing within this window fails.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

// ============================================================================
// Device Locator
// ============================================================================

/// Supported TrueRNG hardware, in allow-list order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrngModel {
    TrueRng,
    TrueRngPro,
    TrueRngProV2,
}

impl TrngModel {
    pub const ALL: [TrngModel; 3] = [
        TrngModel::TrueRng,
        TrngModel::TrueRngPro,
        TrngModel::TrueRngProV2,
    ];

    /// `VID:PID` as it appears in a port's hardware id.
    pub fn usb_id(self) -> &'static str {
        match self {
            TrngModel::TrueRng => "04D8:F5FE",
            TrngModel::TrueRngPro => "16D0:0AA0",
            TrngModel::TrueRngProV2 => "04D8:EBB5",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            TrngModel::TrueRng => "TrueRNG",
            TrngModel::TrueRngPro => "TrueRNGpro",
            TrngModel::TrueRngProV2 => "TrueRNGproV2",
        }
    }

    /// Match a hardware id string against the allow-list.
    pub fn identify(hardware_id: &str) -> Option<TrngModel> {
        Self::ALL
            .into_iter()
            .find(|model| hardware_id.contains(model.usb_id()))
    }
}

/// An enumerated serial port and its hardware description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortCandidate {
    pub name: String,
    /// Free-text id, e.g. `USB VID:PID=04D8:F5FE SER=123`; `n/a` for non-USB ports.
    pub hardware_id: String,
}

impl PortCandidate {
    pub fn new(name: impl Into<String>, hardware_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            hardware_id: hardware_id.into(),
        }
    }

    pub fn model(&self) -> Option<TrngModel> {
        TrngModel::identify(&self.hardware_id)
    }
}

/// The port chosen by [`locate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatedDevice {
    pub port: String,
    pub model: TrngModel,
}

/// List every serial port the OS reports, in enumeration order.
pub fn enumerate_ports() -> Result<Vec<PortCandidate>> {
    let ports = serialport::available_ports()?;
    Ok(ports
        .into_iter()
        .map(|p| {
            let hardware_id = hardware_id(&p.port_type);
            PortCandidate::new(p.port_name, hardware_id)
        })
        .collect())
}

fn hardware_id(port_type: &SerialPortType) -> String {
    match port_type {
        SerialPortType::UsbPort(usb) => {
            usb_hardware_id(usb.vid, usb.pid, usb.serial_number.as_deref())
        }
        _ => "n/a".to_string(),
    }
}

fn usb_hardware_id(vid: u16, pid: u16, serial: Option<&str>) -> String {
    match serial {
        Some(ser) => format!("USB VID:PID={vid:04X}:{pid:04X} SER={ser}"),
        None => format!("USB VID:PID={vid:04X}:{pid:04X}"),
    }
}

/// Pick the first allow-listed port in enumeration order.
///
/// Every match is logged, but model has no priority: with several devices
/// attached, whichever the OS listed first wins.
pub fn locate(ports: &[PortCandidate]) -> Option<LocatedDevice> {
    info!("Searching for RNG device...");
    let mut chosen = None;
    for port in ports {
        if let Some(model) = port.model() {
            info!("Found {} on {}", model.name(), port.name);
            if chosen.is_none() {
                chosen = Some(LocatedDevice {
                    port: port.name.clone(),
                    model,
                });
            }
        }
    }
    if chosen.is_none() {
        warn!("No TrueRNG found among {} port(s)", ports.len());
    }
    chosen
}

// ============================================================================
// Transport Abstraction
// ============================================================================

/// Byte source behind a [`TrngSession`].
pub trait Transport: Read + Send {
    /// Drop whatever input the driver has buffered. Best effort.
    fn discard_input(&mut self) -> io::Result<()>;

    /// Bound the next `read` call. Transports without a timeout ignore this.
    fn set_read_timeout(&mut self, _timeout: Duration) -> io::Result<()> {
        Ok(())
    }

    /// Undo session setup before the handle is dropped.
    fn release(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Transport for Box<dyn SerialPort> {
    fn discard_input(&mut self) -> io::Result<()> {
        self.clear(ClearBuffer::Input).map_err(io::Error::from)
    }

    fn set_read_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        self.set_timeout(timeout).map_err(io::Error::from)
    }

    fn release(&mut self) -> io::Result<()> {
        self.write_data_terminal_ready(false)
            .map_err(io::Error::from)
    }
}

// ============================================================================
// Session
// ============================================================================

/// Open connection to a TrueRNG.
///
/// Owns the port for its whole lifetime; dropping the session de-asserts DTR
/// and closes the port, on error paths too.
pub struct TrngSession {
    transport: Box<dyn Transport>,
    port: String,
    timeout: Duration,
}

impl TrngSession {
    /// Open `port`, assert DTR so the device starts streaming, and discard
    /// anything buffered before that.
    pub fn open(port: &str) -> Result<Self> {
        let mut serial = serialport::new(port, BAUD_RATE)
            .timeout(DEFAULT_TIMEOUT)
            .open()
            .map_err(|source| AcquisitionError::DeviceOpen {
                port: port.to_string(),
                source,
            })?;

        serial
            .write_data_terminal_ready(true)
            .map_err(|source| AcquisitionError::DeviceOpen {
                port: port.to_string(),
                source,
            })?;
        debug!("DTR asserted on {port}");

        Self::from_transport(port, serial, DEFAULT_TIMEOUT)
    }

    /// Wrap an already-open transport. The input buffer is discarded first;
    /// failing that counts as failing to open the device.
    pub fn from_transport<T>(port: impl Into<String>, transport: T, timeout: Duration) -> Result<Self>
    where
        T: Transport + 'static,
    {
        let mut session = Self {
            transport: Box::new(transport),
            port: port.into(),
            timeout,
        };
        if let Err(e) = session.transport.discard_input() {
            return Err(AcquisitionError::DeviceOpen {
                port: session.port.clone(),
                source: e.into(),
            });
        }
        info!("Opened {} (timeout {:?})", session.port, session.timeout);
        Ok(session)
    }

    pub fn port(&self) -> &str {
        &self.port
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Discard stale input, then block until exactly `byte_count` bytes arrive.
    ///
    /// The session timeout bounds the whole sample: every `read` is limited to
    /// whatever is left of it. Fails with [`AcquisitionError::ReadTimeout`]
    /// when the device stalls or the stream ends before the sample is
    /// complete. Partial samples are never returned.
    pub fn read_sample(&mut self, byte_count: usize) -> Result<Sample> {
        self.transport.discard_input()?;

        let mut buffer = vec![0u8; byte_count];
        let mut filled = 0usize;
        let deadline = Instant::now() + self.timeout;

        while filled < byte_count {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            self.transport.set_read_timeout(remaining)?;

            match self.transport.read(&mut buffer[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => break,
                Err(e) => return Err(e.into()),
            }
        }

        if filled < byte_count {
            return Err(AcquisitionError::ReadTimeout {
                expected: byte_count,
                received: filled,
            });
        }

        Ok(Sample::new(buffer))
    }
}

impl Drop for TrngSession {
    fn drop(&mut self) {
        if let Err(e) = self.transport.release() {
            warn!("Failed to release {}: {e}", self.port);
        }
        debug!("Closed {}", self.port);
    }
}
