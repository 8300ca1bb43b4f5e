use crate::{ByteTransport, PortInfo, Result, SerialSettings, TransportError};
use serialport::{ClearBuffer, SerialPort, SerialPortType};
use std::io::{ErrorKind, Read, Write};

/// Raw byte access to a host serial port (USB-serial adapters, onboard UARTs).
pub struct SerialPortTransport {
    port_path: String,
    port: Box<dyn SerialPort>,
}

impl SerialPortTransport {
    pub fn port_path(&self) -> &str {
        &self.port_path
    }

    fn map_open_error(path: &str, e: serialport::Error) -> TransportError {
        match e.kind() {
            serialport::ErrorKind::NoDevice => TransportError::PortNotFound(path.to_string()),
            serialport::ErrorKind::Io(ErrorKind::NotFound) => {
                TransportError::PortNotFound(path.to_string())
            }
            _ => TransportError::Io(e.to_string()),
        }
    }
}

impl ByteTransport for SerialPortTransport {
    fn open(path: &str, settings: &SerialSettings) -> Result<Self> {
        let port = serialport::new(path, settings.baud_rate)
            .timeout(settings.read_timeout)
            .open()
            .map_err(|e| Self::map_open_error(path, e))?;
        tracing::debug!(path, baud = settings.baud_rate, "serial port opened");
        Ok(Self {
            port_path: path.to_string(),
            port,
        })
    }

    fn list() -> Result<Vec<PortInfo>> {
        let mut out = Vec::new();
        for p in serialport::available_ports().map_err(|e| TransportError::Io(e.to_string()))? {
            let driver = match p.port_type {
                SerialPortType::UsbPort(_) => "usb-serial",
                _ => "serial",
            };
            out.push(PortInfo {
                name: p.port_name,
                driver: driver.to_string(),
            });
        }
        Ok(out)
    }

    fn read_byte(&mut self) -> Result<Option<u8>> {
        let mut buf = [0u8; 1];
        match self.port.read(&mut buf) {
            Ok(0) => Ok(None),
            Ok(_) => Ok(Some(buf[0])),
            Err(e) if e.kind() == ErrorKind::TimedOut || e.kind() == ErrorKind::WouldBlock => {
                Ok(None)
            }
            Err(e) => Err(TransportError::Io(e.to_string())),
        }
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        self.port.write_all(bytes).map_err(write_error)?;
        self.port.flush().map_err(write_error)
    }

    fn clear(&mut self) -> Result<()> {
        self.port
            .clear(ClearBuffer::All)
            .map_err(|e| TransportError::Io(e.to_string()))
    }
}

fn write_error(e: std::io::Error) -> TransportError {
    if e.kind() == ErrorKind::TimedOut {
        TransportError::Timeout
    } else {
        TransportError::Io(e.to_string())
    }
}
