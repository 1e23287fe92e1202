//! Instrument access.
//!
//! - [`transport`]: the `Transport` capability and SCPI response parsing
//! - [`session`]: an open connection with the BK894 command set on top
//! - [`visa`]: the VISA driver transport (feature `instrument_visa`)
//! - [`mock`]: a simulated meter for `--simulate` and tests

pub mod mock;
pub mod session;
pub mod transport;
pub mod visa;

pub use mock::MockLcrMeter;
pub use session::Session;
pub use transport::{DeviceInfo, Transport};
pub use visa::VisaTransport;
