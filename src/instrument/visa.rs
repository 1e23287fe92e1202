//! VISA transport for USBTMC/GPIB/LXI instruments.
//!
//! Wraps the `visa-rs` bindings to the system VISA library (NI-VISA or
//! compatible). The resource is opened with an exclusive lock so no other
//! process can talk to the meter while a sweep runs.
//!
//! Supports resource strings like:
//! - "USB0::0xF4EC::0xEE38::SERIAL::INSTR" (USBTMC)
//! - "GPIB0::1::INSTR" (GPIB interface)
//! - "TCPIP0::192.168.1.100::INSTR" (Ethernet/LXI)
//!
//! Without the `instrument_visa` feature every open fails with
//! `ImpError::FeatureNotEnabled`.

use crate::error::{AppResult, ImpError};
use crate::instrument::transport::Transport;
use std::time::Duration;

#[cfg(feature = "instrument_visa")]
use std::ffi::CString;
#[cfg(feature = "instrument_visa")]
use std::io::{BufRead, BufReader, Write};
#[cfg(feature = "instrument_visa")]
use visa_rs::prelude::*;

/// Line terminator appended to every command.
pub const LINE_TERMINATOR: &str = "\n";

/// VISA-backed transport.
#[cfg(feature = "instrument_visa")]
pub struct VisaTransport {
    resource: String,
    // Declared before the resource manager so it is dropped first.
    instr: Option<Instrument>,
    _rm: DefaultRM,
}

/// VISA-backed transport (compiled without `instrument_visa`).
#[cfg(not(feature = "instrument_visa"))]
pub struct VisaTransport {
    resource: String,
}

#[cfg(feature = "instrument_visa")]
fn visa_err(context: &str, err: impl std::fmt::Debug) -> String {
    format!("{context}: {err:?}")
}

#[cfg(feature = "instrument_visa")]
impl VisaTransport {
    /// Opens `resource` with an exclusive lock, waiting at most `timeout` for it.
    pub fn open(resource: &str, timeout: Duration) -> AppResult<Self> {
        let rm = DefaultRM::new().map_err(|e| {
            ImpError::Connection(visa_err("cannot start the VISA resource manager", e))
        })?;
        let name = CString::new(resource)
            .map_err(|_| ImpError::Connection(format!("invalid resource string '{resource}'")))?;
        let instr = rm
            .open(&name.into(), AccessMode::EXCLUSIVE_LOCK, timeout)
            .map_err(|e| ImpError::Connection(visa_err(&format!("cannot open {resource}"), e)))?;
        tracing::info!(resource, timeout_ms = timeout.as_millis() as u64, "VISA resource opened");
        Ok(Self {
            resource: resource.to_string(),
            instr: Some(instr),
            _rm: rm,
        })
    }

    fn instrument(&mut self) -> AppResult<&mut Instrument> {
        let resource = &self.resource;
        self.instr
            .as_mut()
            .ok_or_else(|| ImpError::device(format!("{resource} is not open")))
    }
}

#[cfg(feature = "instrument_visa")]
impl Transport for VisaTransport {
    fn write(&mut self, command: &str) -> AppResult<()> {
        let instr = self.instrument()?;
        instr
            .write_all(format!("{command}{LINE_TERMINATOR}").as_bytes())
            .map_err(|e| ImpError::device(format!("write '{command}' failed: {e}")))
    }

    fn query(&mut self, command: &str) -> AppResult<String> {
        self.write(command)?;
        let instr = self.instrument()?;
        let mut response = String::new();
        let mut reader = BufReader::new(&*instr);
        let read = reader
            .read_line(&mut response)
            .map_err(|e| ImpError::device(format!("reading response to '{command}' failed: {e}")))?;
        if read == 0 {
            return Err(ImpError::device(format!("no response to '{command}'")));
        }
        Ok(response.trim_end().to_string())
    }

    fn close(&mut self) -> AppResult<()> {
        if self.instr.take().is_some() {
            tracing::info!(resource = %self.resource, "VISA resource closed");
        }
        Ok(())
    }

    fn resource(&self) -> &str {
        &self.resource
    }
}

#[cfg(not(feature = "instrument_visa"))]
impl VisaTransport {
    /// Always fails: VISA support is compiled out.
    pub fn open(resource: &str, _timeout: Duration) -> AppResult<Self> {
        tracing::warn!(resource, "VISA support not compiled in");
        Err(ImpError::FeatureNotEnabled("instrument_visa".to_string()))
    }
}

#[cfg(not(feature = "instrument_visa"))]
impl Transport for VisaTransport {
    fn write(&mut self, _command: &str) -> AppResult<()> {
        Err(ImpError::FeatureNotEnabled("instrument_visa".to_string()))
    }

    fn query(&mut self, _command: &str) -> AppResult<String> {
        Err(ImpError::FeatureNotEnabled("instrument_visa".to_string()))
    }

    fn resource(&self) -> &str {
        &self.resource
    }
}
