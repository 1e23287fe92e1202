//! Common SCPI communication abstractions.
//!
//! [`Transport`] is the one capability the session needs from the outside
//! world: send a command, or send a query and read back one line. The VISA
//! driver and the simulated meter both implement it.

use crate::error::{AppResult, ImpError};
use std::fmt;

/// Trait for SCPI communication transports.
///
/// Abstracts the underlying communication mechanism so the session can be
/// driven by real hardware or by a simulator. Every call is a single blocking
/// round trip; implementations must not retry.
pub trait Transport {
    /// Send a command without expecting a response.
    fn write(&mut self, command: &str) -> AppResult<()>;

    /// Send a query command and return the response line, without terminator.
    fn query(&mut self, command: &str) -> AppResult<String>;

    /// Release the underlying device. Called exactly once by the session.
    fn close(&mut self) -> AppResult<()> {
        Ok(())
    }

    /// Resource string the transport is bound to.
    fn resource(&self) -> &str;
}

/// Parse a floating-point field from a SCPI response.
pub fn parse_f64_response(response: &str) -> AppResult<f64> {
    let field = response.trim();
    field
        .parse::<f64>()
        .map_err(|_| ImpError::device(format!("Failed to parse SCPI response as f64: '{field}'")))
}

/// Parse the primary and secondary readings of a `FETCH?` response.
///
/// The meter answers with comma separated fields (`primary,secondary,status`);
/// only the first two are used.
pub fn parse_reading_pair(response: &str) -> AppResult<(f64, f64)> {
    let mut fields = response.trim().split(',');
    match (fields.next(), fields.next()) {
        (Some(primary), Some(secondary)) => {
            Ok((parse_f64_response(primary)?, parse_f64_response(secondary)?))
        }
        _ => Err(ImpError::device(format!(
            "expected two comma separated readings, got '{}'",
            response.trim()
        ))),
    }
}

/// Identification returned by `*IDN?`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Vendor name.
    pub manufacturer: String,
    /// Model number, e.g. `894`.
    pub model: String,
    /// Serial number.
    pub serial: String,
    /// Firmware revision.
    pub firmware: String,
    /// Hardware revision.
    pub hardware: String,
}

impl DeviceInfo {
    /// Parse an `*IDN?` response. Missing trailing fields are left empty.
    ///
    /// # Errors
    ///
    /// Returns a device error if the response is blank.
    pub fn parse(response: &str) -> AppResult<Self> {
        let response = response.trim();
        if response.is_empty() {
            return Err(ImpError::device("empty *IDN? response"));
        }
        let mut fields = response.split(',').map(|f| f.trim().to_string());
        let mut next = || fields.next().unwrap_or_default();
        Ok(Self {
            manufacturer: next(),
            model: next(),
            serial: next(),
            firmware: next(),
            hardware: next(),
        })
    }
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} (serial {}, firmware {}, hardware {})",
            self.manufacturer, self.model, self.serial, self.firmware, self.hardware
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fetch_response_with_status_field() {
        let (z, theta) = parse_reading_pair("+1.87960E+02,-5.78600E+01,+0\n").unwrap();
        assert!((z - 187.96).abs() < 1e-9);
        assert!((theta + 57.86).abs() < 1e-9);
    }

    #[test]
    fn single_field_is_a_device_error() {
        let err = parse_reading_pair("+1.0E+02").unwrap_err();
        assert!(matches!(err, ImpError::Device(_)));
    }

    #[test]
    fn garbage_field_is_a_device_error() {
        let err = parse_reading_pair("OVLD,+1.0").unwrap_err();
        assert!(err.to_string().contains("'OVLD'"));
    }

    #[test]
    fn parses_idn() {
        let info = DeviceInfo::parse("B&K Precision, 894, 12345, 1.08, 1.0\n").unwrap();
        assert_eq!(info.manufacturer, "B&K Precision");
        assert_eq!(info.model, "894");
        assert_eq!(info.hardware, "1.0");
    }

    #[test]
    fn short_idn_leaves_fields_empty() {
        let info = DeviceInfo::parse("ACME,LCR-1").unwrap();
        assert_eq!(info.model, "LCR-1");
        assert!(info.serial.is_empty());
        assert!(DeviceInfo::parse("  ").is_err());
    }
}
