use std::io::Read;
use std::time::Duration;

use serialport::{SerialPort, SerialPortType};
use tracing::info;

use crate::error::LogError;

/// Read timeout on the open device. A full timeout with no buffered line
/// is reported as `LineRead::Empty`, not an error.
pub const READ_TIMEOUT: Duration = Duration::from_secs(2);

/// Arduino USB vendor id (9025 decimal), covers the Nano 33 BLE among others.
const ARDUINO_VID: u16 = 0x2341;

/// Product-string fragments of common USB-to-serial bridge chips.
const ADAPTER_SIGNATURES: &[&str] = &["Arduino", "CH340", "CP210"];

/// Outcome of one `read_line` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineRead {
    /// One complete, whitespace-trimmed text line.
    Line(String),
    /// A complete line arrived but was not valid UTF-8; dropped.
    Binary,
    /// Read timeout elapsed without a complete line.
    Empty,
}

/// An open serial connection delivering newline-delimited text.
pub struct DevicePort {
    port: Box<dyn SerialPort>,
    pending: Vec<u8>,
}

impl DevicePort {
    pub fn open(name: &str, baud_rate: u32) -> Result<Self, LogError> {
        let port = serialport::new(name, baud_rate)
            .timeout(READ_TIMEOUT)
            .open()
            .map_err(|e| LogError::Connection(format!("could not open {}: {}", name, e)))?;
        info!(port = name, baud = baud_rate, "connected");
        Ok(DevicePort {
            port,
            pending: Vec::new(),
        })
    }

    /// Blocks up to `READ_TIMEOUT` for the next line. Partial input is kept
    /// across calls until its terminating newline arrives.
    pub fn read_line(&mut self) -> Result<LineRead, LogError> {
        loop {
            if let Some(idx) = self.pending.iter().position(|&b| b == b'\n') {
                let raw: Vec<u8> = self.pending.drain(..=idx).collect();
                return Ok(match String::from_utf8(raw) {
                    Ok(text) => LineRead::Line(text.trim().to_string()),
                    Err(_) => LineRead::Binary,
                });
            }

            let mut buf = [0u8; 256];
            match self.port.read(&mut buf) {
                Ok(0) => return Ok(LineRead::Empty),
                Ok(n) => self.pending.extend_from_slice(&buf[..n]),
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {
                    return Ok(LineRead::Empty)
                }
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(LogError::Device(e)),
            }
        }
    }
}

/// True when the vendor id or product string looks like a microcontroller
/// or USB-serial bridge we expect sensor firmware behind.
pub fn is_known_adapter(vid: Option<u16>, product: Option<&str>) -> bool {
    if vid == Some(ARDUINO_VID) {
        return true;
    }
    match product {
        Some(p) => ADAPTER_SIGNATURES.iter().any(|sig| p.contains(sig)),
        None => false,
    }
}

/// Enumerates attached serial devices and returns the first one matching a
/// known adapter signature. Best-effort UX helper; `--port` overrides it.
pub fn suggest_port() -> Result<Option<String>, LogError> {
    let ports = serialport::available_ports()?;
    if ports.is_empty() {
        info!("no serial ports detected");
        return Ok(None);
    }

    for p in &ports {
        match &p.port_type {
            SerialPortType::UsbPort(usb) => info!(
                port = %p.port_name,
                vid = usb.vid,
                product = usb.product.as_deref().unwrap_or("?"),
                "found port"
            ),
            other => info!(port = %p.port_name, kind = ?other, "found port"),
        }
    }

    for p in &ports {
        let (vid, product) = match &p.port_type {
            SerialPortType::UsbPort(usb) => (Some(usb.vid), usb.product.as_deref()),
            _ => (None, None),
        };
        if is_known_adapter(vid, product) {
            info!(port = %p.port_name, "selected port");
            return Ok(Some(p.port_name.clone()));
        }
    }

    Ok(None)
}
