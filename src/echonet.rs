//! Decoding of ECHONET Lite low-voltage smart meter properties.
//!
//! The cloud API hands properties over as `{epc, val}` pairs where both are
//! hex strings. Raw integers are kept untouched in [`Reading`]; kWh figures
//! are derived on top of them by [`MeterSnapshot`].

use crate::types::{EchonetAppliance, EchonetProperty};
use std::fmt;

pub const EPC_COEFFICIENT: &str = "d3";
pub const EPC_EFFECTIVE_DIGITS: &str = "d7";
pub const EPC_CUMULATIVE_NORMAL: &str = "e0";
pub const EPC_CUMULATIVE_UNIT: &str = "e1";
pub const EPC_CUMULATIVE_REVERSE: &str = "e3";
pub const EPC_INSTANTANEOUS_POWER: &str = "e7";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("EPC {epc}: empty value")]
    Empty { epc: String },
    #[error("EPC {epc}: could not parse {val:?} as hex")]
    InvalidHex { epc: String, val: String },
    #[error("EPC {epc}: {val:?} does not fit in {bytes} byte(s)")]
    OutOfRange { epc: String, val: String, bytes: usize },
}

/// Unit of the cumulative energy counters (EPC 0xE1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnergyUnit {
    /// kWh represented by one count, as a power of ten.
    Known { exponent: i32 },
    Unknown(u8),
}

impl EnergyUnit {
    pub fn from_code(code: u8) -> Self {
        let exponent = match code {
            0x00 => 0,
            0x01 => -1,
            0x02 => -2,
            0x03 => -3,
            0x04 => -4,
            0x0A => 1,
            0x0B => 2,
            0x0C => 3,
            0x0D => 4,
            other => return EnergyUnit::Unknown(other),
        };
        EnergyUnit::Known { exponent }
    }

    pub fn kwh_per_count(&self) -> Option<f64> {
        match self {
            EnergyUnit::Known { exponent } => Some(10f64.powi(*exponent)),
            EnergyUnit::Unknown(_) => None,
        }
    }
}

impl fmt::Display for EnergyUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnergyUnit::Known { exponent } if *exponent >= 0 => {
                write!(f, "{} kWh", 10u64.pow(*exponent as u32))
            }
            EnergyUnit::Known { exponent } => {
                write!(f, "{:.*} kWh", (-exponent) as usize, 10f64.powi(*exponent))
            }
            EnergyUnit::Unknown(code) => write!(f, "unknown (code: 0x{:02x})", code),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Reading {
    /// Signed watts; negative while exporting.
    InstantaneousPower { watts: i32 },
    CumulativeNormal { raw: u64 },
    CumulativeReverse { raw: u64 },
    Coefficient(u32),
    EffectiveDigits(u8),
    Unit(EnergyUnit),
    Unknown { epc: String, val: String },
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reading::InstantaneousPower { watts } => write!(
                f,
                "Instantaneous Power: {} W ({:.3} kW)",
                watts,
                *watts as f64 / 1000.0
            ),
            Reading::CumulativeNormal { raw } => write!(f, "Cumulative Energy (normal): {}", raw),
            Reading::CumulativeReverse { raw } => {
                write!(f, "Cumulative Energy (reverse): {}", raw)
            }
            Reading::Coefficient(c) => write!(f, "Energy Coefficient: {}", c),
            Reading::EffectiveDigits(d) => write!(f, "Effective Digits: {}", d),
            Reading::Unit(u) => write!(f, "Energy Unit: {}", u),
            Reading::Unknown { epc, val } => write!(f, "EPC {}: {} (raw)", epc, val),
        }
    }
}

fn parse_hex(epc: &str, val: &str) -> Result<u64, DecodeError> {
    let digits = hex_digits(epc, val)?;
    u64::from_str_radix(digits, 16).map_err(|_| DecodeError::InvalidHex {
        epc: epc.into(),
        val: val.into(),
    })
}

fn hex_digits<'a>(epc: &str, val: &'a str) -> Result<&'a str, DecodeError> {
    let trimmed = val.trim();
    let digits = trimmed.trim_start_matches("0x").trim_start_matches("0X");
    if digits.is_empty() {
        return Err(DecodeError::Empty { epc: epc.into() });
    }
    Ok(digits)
}

/// Parses a value that must fit in `bytes` bytes once leading zeros are dropped.
fn parse_sized<N: TryFrom<u64>>(epc: &str, val: &str, bytes: usize) -> Result<N, DecodeError> {
    let out_of_range = || DecodeError::OutOfRange {
        epc: epc.into(),
        val: val.into(),
        bytes,
    };
    let raw = parse_hex(epc, val).map_err(|e| match e {
        // Too many digits for u64 is still a range problem when the digits are hex.
        DecodeError::InvalidHex { .. }
            if hex_digits(epc, val).is_ok_and(|d| d.chars().all(|c| c.is_ascii_hexdigit())) =>
        {
            out_of_range()
        }
        other => other,
    })?;
    N::try_from(raw).map_err(|_| out_of_range())
}

pub fn decode_property(prop: &EchonetProperty) -> Result<Reading, DecodeError> {
    let epc = prop.epc.trim().to_ascii_lowercase();
    let val = prop.val.as_str();
    let reading = match epc.as_str() {
        EPC_INSTANTANEOUS_POWER => {
            // Four-byte two's complement on the wire.
            let bits: u32 = parse_sized(&epc, val, 4)?;
            Reading::InstantaneousPower {
                watts: i32::from_be_bytes(bits.to_be_bytes()),
            }
        }
        EPC_CUMULATIVE_NORMAL => Reading::CumulativeNormal {
            raw: parse_hex(&epc, val)?,
        },
        EPC_CUMULATIVE_REVERSE => Reading::CumulativeReverse {
            raw: parse_hex(&epc, val)?,
        },
        EPC_COEFFICIENT => Reading::Coefficient(parse_sized(&epc, val, 4)?),
        EPC_EFFECTIVE_DIGITS => Reading::EffectiveDigits(parse_sized(&epc, val, 1)?),
        EPC_CUMULATIVE_UNIT => Reading::Unit(EnergyUnit::from_code(parse_sized(&epc, val, 1)?)),
        _ => Reading::Unknown {
            epc,
            val: prop.val.clone(),
        },
    };
    Ok(reading)
}

pub fn decode_appliance(
    appliance: &EchonetAppliance,
) -> Vec<(&EchonetProperty, Result<Reading, DecodeError>)> {
    appliance
        .properties
        .iter()
        .map(|p| (p, decode_property(p)))
        .collect()
}

/// Cumulative count converted to kWh, when the unit is known.
pub fn cumulative_kwh(raw: u64, coefficient: u32, unit: EnergyUnit) -> Option<f64> {
    unit.kwh_per_count()
        .map(|per| raw as f64 * coefficient as f64 * per)
}

/// Everything a smart meter reported in one response, folded together.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeterSnapshot {
    pub power_watts: Option<i32>,
    pub normal_raw: Option<u64>,
    pub reverse_raw: Option<u64>,
    pub coefficient: Option<u32>,
    pub unit: Option<EnergyUnit>,
}

impl MeterSnapshot {
    pub fn from_appliance(appliance: &EchonetAppliance) -> Self {
        let mut snap = MeterSnapshot::default();
        for (_, reading) in decode_appliance(appliance) {
            match reading {
                Ok(Reading::InstantaneousPower { watts }) => snap.power_watts = Some(watts),
                Ok(Reading::CumulativeNormal { raw }) => snap.normal_raw = Some(raw),
                Ok(Reading::CumulativeReverse { raw }) => snap.reverse_raw = Some(raw),
                Ok(Reading::Coefficient(c)) => snap.coefficient = Some(c),
                Ok(Reading::Unit(u)) => snap.unit = Some(u),
                _ => {}
            }
        }
        snap
    }

    fn to_kwh(&self, raw: Option<u64>) -> Option<f64> {
        // A meter that omits the coefficient uses 1.
        cumulative_kwh(raw?, self.coefficient.unwrap_or(1), self.unit?)
    }

    pub fn normal_kwh(&self) -> Option<f64> {
        self.to_kwh(self.normal_raw)
    }

    pub fn reverse_kwh(&self) -> Option<f64> {
        self.to_kwh(self.reverse_raw)
    }
}
