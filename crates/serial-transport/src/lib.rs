//! serial-transport: byte-oriented serial port abstractions
//!
//! This crate provides a blocking, single-owner byte transport trait used by the Dofbot
//! protocol stack, with feature-gated backends. The default build enables a `mock`
//! backend so that binaries and tests run on any host without hardware attached.

mod types;
pub use types::{PortInfo, SerialSettings, DEFAULT_BAUD_RATE, DEFAULT_READ_TIMEOUT};

mod error;
pub use error::{Result, TransportError};

mod traits;
pub use traits::ByteTransport;

#[cfg(feature = "mock")]
mod mock;

#[cfg(feature = "mock")]
pub use mock::{MockHandle, MockTransport, Responder};

#[cfg(feature = "serial")]
mod serial;

#[cfg(feature = "serial")]
pub use serial::SerialPortTransport;
