use crate::{PortInfo, Result, SerialSettings};

/// A minimal blocking byte transport owned by exactly one client.
///
/// Implementations never block past their configured read timeout: a read that times
/// out, or an end-of-stream, yields `Ok(None)`. `Err` is reserved for failures of the
/// port itself (closed device, OS-level I/O error), which callers treat as fatal.
pub trait ByteTransport {
    /// Open a port by name (e.g., "/dev/ttyUSB0", "COM3").
    fn open(name: &str, settings: &SerialSettings) -> Result<Self>
    where
        Self: Sized;

    /// Attempt to list available ports for this backend.
    fn list() -> Result<Vec<PortInfo>>;

    /// Read one byte, waiting at most the configured read timeout.
    fn read_byte(&mut self) -> Result<Option<u8>>;

    /// Write all bytes to the line.
    fn write_all(&mut self, bytes: &[u8]) -> Result<()>;

    /// Drop any buffered input and pending output.
    fn clear(&mut self) -> Result<()> {
        Ok(())
    }
}
