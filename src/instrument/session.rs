//! Instrument session: one open connection to the LCR meter.
//!
//! The session owns its [`Transport`] for the lifetime of a command. It is
//! closed exactly once, either explicitly with [`Session::close`] or, on early
//! returns and panics, by `Drop`.

use crate::error::{AppResult, ImpError};
use crate::instrument::transport::{parse_reading_pair, DeviceInfo, Transport};
use crate::instrument::visa::VisaTransport;
use crate::measurement::{MeasurementFunction, Sample};
use std::ops::RangeInclusive;
use std::thread;
use std::time::Duration;

/// Test frequencies the meter accepts, in Hz.
pub const FREQUENCY_RANGE: RangeInclusive<f64> = 1.0..=5.0e5;

/// Largest AC test level the meter accepts, in V. The lower bound is exclusive at 0 V.
pub const MAX_VOLTAGE: f64 = 2.0;

/// Checks a test frequency against [`FREQUENCY_RANGE`].
pub fn validate_frequency(frequency: f64) -> AppResult<()> {
    if frequency.is_finite() && FREQUENCY_RANGE.contains(&frequency) {
        Ok(())
    } else {
        Err(ImpError::config(format!(
            "frequency {frequency} Hz is outside {} Hz - {} Hz",
            FREQUENCY_RANGE.start(),
            FREQUENCY_RANGE.end()
        )))
    }
}

/// Checks an AC test level: above 0 V and at most [`MAX_VOLTAGE`].
pub fn validate_voltage(voltage: f64) -> AppResult<()> {
    if voltage.is_finite() && voltage > 0.0 && voltage <= MAX_VOLTAGE {
        Ok(())
    } else {
        Err(ImpError::config(format!(
            "AC voltage {voltage} V is outside (0 V, {MAX_VOLTAGE} V]"
        )))
    }
}

/// An open connection to the meter.
pub struct Session<T: Transport> {
    transport: T,
    settle: Duration,
    info: Option<DeviceInfo>,
    function: Option<MeasurementFunction>,
    closed: bool,
}

impl Session<VisaTransport> {
    /// Opens the VISA resource `device_id` and identifies the instrument.
    ///
    /// # Errors
    ///
    /// - `ImpError::Connection` if the resource cannot be opened, is locked by
    ///   another process, or does not answer `*IDN?`
    /// - `ImpError::FeatureNotEnabled` if built without `instrument_visa`
    pub fn open(device_id: &str, timeout: Duration) -> AppResult<Self> {
        let transport = VisaTransport::open(device_id, timeout)?;
        let mut session = Session::with_transport(transport);
        session.identify().map_err(|err| {
            ImpError::Connection(format!("{device_id} did not identify itself: {err}"))
        })?;
        Ok(session)
    }
}

impl<T: Transport> Session<T> {
    /// Wraps an already connected transport.
    pub fn with_transport(transport: T) -> Self {
        Self {
            transport,
            settle: Duration::ZERO,
            info: None,
            function: None,
            closed: false,
        }
    }

    /// Sets the wait between setting a step value and fetching.
    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.set_settle(settle);
        self
    }

    /// Changes the settle time of an already open session.
    pub fn set_settle(&mut self, settle: Duration) {
        self.settle = settle;
    }

    /// Wait applied before every `FETCH?`.
    pub fn settle(&self) -> Duration {
        self.settle
    }

    /// Identification from the last successful [`Session::identify`].
    pub fn info(&self) -> Option<&DeviceInfo> {
        self.info.as_ref()
    }

    /// Function selected by the last successful [`Session::configure`].
    pub fn function(&self) -> Option<MeasurementFunction> {
        self.function
    }

    /// The underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Queries `*IDN?` and remembers the answer.
    pub fn identify(&mut self) -> AppResult<DeviceInfo> {
        let info = DeviceInfo::parse(&self.transport.query("*IDN?")?)?;
        tracing::info!(
            resource = self.transport.resource(),
            manufacturer = %info.manufacturer,
            model = %info.model,
            serial = %info.serial,
            firmware = %info.firmware,
            "instrument identified"
        );
        self.info = Some(info.clone());
        Ok(info)
    }

    /// Selects the measurement function and the AC test level.
    ///
    /// # Errors
    ///
    /// Configuration error for an out-of-range voltage (nothing is sent),
    /// device error if the meter rejects either command.
    pub fn configure(&mut self, function: MeasurementFunction, voltage: f64) -> AppResult<()> {
        validate_voltage(voltage)?;
        self.write(&format!("FUNC:IMP {}", function.code()))?;
        self.function = Some(function);
        self.set_voltage(voltage)?;
        tracing::info!(%function, voltage, "instrument configured");
        Ok(())
    }

    /// Sets the test frequency.
    pub fn set_frequency(&mut self, frequency: f64) -> AppResult<()> {
        validate_frequency(frequency)?;
        self.write(&format!("FREQ {frequency}Hz"))
    }

    /// Sets the AC test level.
    pub fn set_voltage(&mut self, voltage: f64) -> AppResult<()> {
        validate_voltage(voltage)?;
        self.write(&format!("VOLT {voltage} V"))
    }

    /// Sets `frequency`, waits for settling and reads one sample.
    pub fn measure_at_frequency(&mut self, frequency: f64) -> AppResult<Sample> {
        self.set_frequency(frequency)?;
        self.fetch(frequency)
    }

    /// Sets `voltage`, waits for settling and reads one sample.
    pub fn measure_at_voltage(&mut self, voltage: f64) -> AppResult<Sample> {
        self.set_voltage(voltage)?;
        self.fetch(voltage)
    }

    fn fetch(&mut self, value: f64) -> AppResult<Sample> {
        if !self.settle.is_zero() {
            thread::sleep(self.settle);
        }
        let response = self.query("FETCH?")?;
        let (primary, secondary) = parse_reading_pair(&response)?;
        Ok(Sample::new(value, primary, secondary))
    }

    fn write(&mut self, command: &str) -> AppResult<()> {
        self.ensure_open()?;
        tracing::trace!(command, "write");
        self.transport.write(command)
    }

    fn query(&mut self, command: &str) -> AppResult<String> {
        self.ensure_open()?;
        let response = self.transport.query(command)?;
        tracing::trace!(command, response = response.trim(), "query");
        Ok(response)
    }

    fn ensure_open(&self) -> AppResult<()> {
        if self.closed {
            Err(ImpError::device("session already closed"))
        } else {
            Ok(())
        }
    }

    /// Releases the instrument.
    pub fn close(mut self) -> AppResult<()> {
        self.release()
    }

    fn release(&mut self) -> AppResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        tracing::debug!(resource = self.transport.resource(), "closing session");
        self.transport.close()
    }
}

impl<T: Transport> Drop for Session<T> {
    fn drop(&mut self) {
        if let Err(err) = self.release() {
            tracing::warn!(error = %err, "failed to close instrument session");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instrument::mock::MockLcrMeter;
    use tracing_test::traced_test;

    #[test]
    fn configure_sends_function_then_voltage() {
        let meter = MockLcrMeter::new();
        let mut session = Session::with_transport(meter.clone());
        session
            .configure(MeasurementFunction::CsRs, 0.5)
            .unwrap();
        assert_eq!(meter.commands(), vec!["FUNC:IMP CSRS", "VOLT 0.5 V"]);
    }

    #[test]
    fn out_of_range_voltage_sends_nothing() {
        let meter = MockLcrMeter::new();
        let mut session = Session::with_transport(meter.clone());
        let err = session
            .configure(MeasurementFunction::ZThetaDeg, 2.5)
            .unwrap_err();
        assert!(matches!(err, ImpError::Configuration(_)));
        assert!(meter.commands().is_empty());
    }

    #[test]
    fn measure_at_frequency_sets_then_fetches() {
        let meter = MockLcrMeter::new();
        let mut session = Session::with_transport(meter.clone());
        let sample = session.measure_at_frequency(1000.0).unwrap();
        assert_eq!(sample.value, 1000.0);
        assert_eq!(meter.commands(), vec!["FREQ 1000Hz", "FETCH?"]);
    }

    #[test]
    fn settle_delays_every_fetch() {
        let meter = MockLcrMeter::new();
        let mut session = Session::with_transport(meter).with_settle(Duration::from_millis(15));
        let started = std::time::Instant::now();
        session.measure_at_frequency(1000.0).unwrap();
        session.measure_at_frequency(2000.0).unwrap();
        assert!(started.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn rejected_function_is_a_device_error() {
        let meter = MockLcrMeter::new().rejecting("FUNC:IMP");
        let mut session = Session::with_transport(meter);
        let err = session
            .configure(MeasurementFunction::ZThetaDeg, 0.5)
            .unwrap_err();
        assert!(matches!(err, ImpError::Device(_)));
    }

    #[test]
    fn close_releases_exactly_once() {
        let meter = MockLcrMeter::new();
        let session = Session::with_transport(meter.clone());
        session.close().unwrap();
        assert_eq!(meter.close_count(), 1);
    }

    #[test]
    fn drop_releases_unclosed_session() {
        let meter = MockLcrMeter::new();
        {
            let mut session = Session::with_transport(meter.clone());
            session.measure_at_voltage(0.5).unwrap();
        }
        assert_eq!(meter.close_count(), 1);
    }

    #[test]
    #[traced_test]
    fn identify_logs_the_model() {
        let meter = MockLcrMeter::new();
        let mut session = Session::with_transport(meter);
        let info = session.identify().unwrap();
        assert_eq!(info.model, "894");
        assert!(session.info().is_some());
        assert!(logs_contain("instrument identified"));
    }

    #[cfg(not(feature = "instrument_visa"))]
    #[test]
    fn open_without_visa_feature_is_reported() {
        let err = Session::open("USB0::1::INSTR", Duration::from_secs(1))
            .err()
            .unwrap();
        assert!(matches!(err, ImpError::FeatureNotEnabled(_)));
    }
}
