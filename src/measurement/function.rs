//! Measurement functions supported by the BK894 `FUNC:IMP` command.

use crate::error::{AppResult, ImpError};
use std::fmt;
use std::str::FromStr;

/// Pair of quantities the meter reports for every `FETCH?`.
///
/// The code is what goes on the wire (`FUNC:IMP ZTD`); the first letter group
/// names the primary quantity and the remainder the secondary one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum MeasurementFunction {
    /// Parallel capacitance, dissipation factor
    CpD,
    /// Parallel capacitance, quality factor
    CpQ,
    /// Parallel capacitance, conductance
    CpG,
    /// Parallel capacitance, parallel resistance
    CpRp,
    /// Series capacitance, dissipation factor
    CsD,
    /// Series capacitance, quality factor
    CsQ,
    /// Series capacitance, series resistance
    CsRs,
    /// Parallel inductance, quality factor
    LpQ,
    /// Parallel inductance, dissipation factor
    LpD,
    /// Parallel inductance, conductance
    LpG,
    /// Parallel inductance, parallel resistance
    LpRp,
    /// Series inductance, dissipation factor
    LsD,
    /// Series inductance, quality factor
    LsQ,
    /// Series inductance, series resistance
    LsRs,
    /// Resistance, reactance
    Rx,
    /// Impedance magnitude, phase in degrees
    #[default]
    ZThetaDeg,
    /// Impedance magnitude, phase in radians
    ZThetaRad,
    /// Conductance, susceptance
    Gb,
    /// Admittance magnitude, phase in degrees
    YThetaDeg,
    /// Admittance magnitude, phase in radians
    YThetaRad,
}

impl MeasurementFunction {
    /// Every function the instrument accepts, in manual order.
    pub const ALL: [MeasurementFunction; 20] = [
        MeasurementFunction::CpD,
        MeasurementFunction::CpQ,
        MeasurementFunction::CpG,
        MeasurementFunction::CpRp,
        MeasurementFunction::CsD,
        MeasurementFunction::CsQ,
        MeasurementFunction::CsRs,
        MeasurementFunction::LpQ,
        MeasurementFunction::LpD,
        MeasurementFunction::LpG,
        MeasurementFunction::LpRp,
        MeasurementFunction::LsD,
        MeasurementFunction::LsQ,
        MeasurementFunction::LsRs,
        MeasurementFunction::Rx,
        MeasurementFunction::ZThetaDeg,
        MeasurementFunction::ZThetaRad,
        MeasurementFunction::Gb,
        MeasurementFunction::YThetaDeg,
        MeasurementFunction::YThetaRad,
    ];

    /// SCPI code sent with `FUNC:IMP`.
    pub fn code(self) -> &'static str {
        match self {
            MeasurementFunction::CpD => "CPD",
            MeasurementFunction::CpQ => "CPQ",
            MeasurementFunction::CpG => "CPG",
            MeasurementFunction::CpRp => "CPRP",
            MeasurementFunction::CsD => "CSD",
            MeasurementFunction::CsQ => "CSQ",
            MeasurementFunction::CsRs => "CSRS",
            MeasurementFunction::LpQ => "LPQ",
            MeasurementFunction::LpD => "LPD",
            MeasurementFunction::LpG => "LPG",
            MeasurementFunction::LpRp => "LPRP",
            MeasurementFunction::LsD => "LSD",
            MeasurementFunction::LsQ => "LSQ",
            MeasurementFunction::LsRs => "LSRS",
            MeasurementFunction::Rx => "RX",
            MeasurementFunction::ZThetaDeg => "ZTD",
            MeasurementFunction::ZThetaRad => "ZTR",
            MeasurementFunction::Gb => "GB",
            MeasurementFunction::YThetaDeg => "YTD",
            MeasurementFunction::YThetaRad => "YTR",
        }
    }

    /// Column headers (with units) for the primary and secondary readings.
    pub fn headers(self) -> (&'static str, &'static str) {
        use MeasurementFunction::*;
        let primary = match self {
            CpD | CpQ | CpG | CpRp => "Cp [F]",
            CsD | CsQ | CsRs => "Cs [F]",
            LpQ | LpD | LpG | LpRp => "Lp [H]",
            LsD | LsQ | LsRs => "Ls [H]",
            Rx => "R [Ohm]",
            ZThetaDeg | ZThetaRad => "Z [Ohm]",
            Gb => "G [S]",
            YThetaDeg | YThetaRad => "Y [S]",
        };
        let secondary = match self {
            CpD | CsD | LpD | LsD => "Dissip. [-]",
            CpQ | CsQ | LpQ | LsQ => "Quality [-]",
            CpG | LpG => "Cond. [S]",
            CpRp | LpRp | CsRs | LsRs => "Resis. [Ohm]",
            Rx => "X [Ohm]",
            ZThetaDeg | YThetaDeg => "Theta [Deg]",
            ZThetaRad | YThetaRad => "Theta [Rad]",
            Gb => "B [S]",
        };
        (primary, secondary)
    }
}

impl fmt::Display for MeasurementFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for MeasurementFunction {
    type Err = ImpError;

    /// Case-insensitive lookup by SCPI code.
    fn from_str(s: &str) -> AppResult<Self> {
        let wanted = s.trim();
        MeasurementFunction::ALL
            .into_iter()
            .find(|function| function.code().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| {
                ImpError::config(format!(
                    "unknown measurement function '{}'. Must be one of: {}",
                    wanted,
                    MeasurementFunction::ALL
                        .iter()
                        .map(|f| f.code())
                        .collect::<Vec<_>>()
                        .join(", ")
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_codes_case_insensitively() {
        assert_eq!(
            "ztd".parse::<MeasurementFunction>().unwrap(),
            MeasurementFunction::ZThetaDeg
        );
        assert_eq!(
            " CpRp ".parse::<MeasurementFunction>().unwrap(),
            MeasurementFunction::CpRp
        );
    }

    #[test]
    fn rejects_unknown_code() {
        let err = "XYZ".parse::<MeasurementFunction>().unwrap_err();
        assert!(err.to_string().contains("unknown measurement function 'XYZ'"));
    }

    #[test]
    fn every_code_round_trips() {
        for function in MeasurementFunction::ALL {
            assert_eq!(function.code().parse::<MeasurementFunction>().unwrap(), function);
        }
    }

    #[test]
    fn headers_follow_the_code() {
        assert_eq!(
            MeasurementFunction::ZThetaDeg.headers(),
            ("Z [Ohm]", "Theta [Deg]")
        );
        assert_eq!(MeasurementFunction::LsRs.headers(), ("Ls [H]", "Resis. [Ohm]"));
        assert_eq!(MeasurementFunction::Gb.headers(), ("G [S]", "B [S]"));
    }
}
