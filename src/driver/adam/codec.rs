//! RegisterCodec
//! pure translation between raw 16-bit register words and what the attributes expose:
//! - analog words <-> engineering units (mA, V or mV, as named by the type code)
//! - type code words <-> type code names
//! - status words -> status labels
//! - pairs of words <-> 32-bit counters
//!
//! the lookup tables are process wide constants, built once and only ever read

use std::collections::HashMap;

use lazy_static::lazy_static;
use serde_derive::Serialize;

use crate::common::error::{LookupError, ValidationError};

/// input range selected per channel by its type code register
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TypeCode {
    Current0To20mA,
    Current4To20mA,
    Voltage0To10V,
    Voltage0To5V,
    VoltagePlusMinus10V,
    VoltagePlusMinus5V,
    VoltagePlusMinus1V,
    VoltagePlusMinus500mV,
    VoltagePlusMinus150mV,
    CurrentPlusMinus20mA,
}

impl TypeCode {
    pub const ALL: [TypeCode; 10] = [
        TypeCode::Current0To20mA,
        TypeCode::Current4To20mA,
        TypeCode::Voltage0To10V,
        TypeCode::Voltage0To5V,
        TypeCode::VoltagePlusMinus10V,
        TypeCode::VoltagePlusMinus5V,
        TypeCode::VoltagePlusMinus1V,
        TypeCode::VoltagePlusMinus500mV,
        TypeCode::VoltagePlusMinus150mV,
        TypeCode::CurrentPlusMinus20mA,
    ];

    /// the ranges an analog output module can drive
    pub const OUTPUT: [TypeCode; 6] = [
        TypeCode::Current0To20mA,
        TypeCode::Current4To20mA,
        TypeCode::Voltage0To10V,
        TypeCode::Voltage0To5V,
        TypeCode::VoltagePlusMinus10V,
        TypeCode::VoltagePlusMinus5V,
    ];

    pub fn raw(self) -> u16 {
        match self {
            TypeCode::Current0To20mA => 0x0182,
            TypeCode::Current4To20mA => 0x0180,
            TypeCode::Voltage0To10V => 0x0148,
            TypeCode::Voltage0To5V => 0x0147,
            TypeCode::VoltagePlusMinus10V => 0x0143,
            TypeCode::VoltagePlusMinus5V => 0x0142,
            TypeCode::VoltagePlusMinus1V => 0x0140,
            TypeCode::VoltagePlusMinus500mV => 0x0104,
            TypeCode::VoltagePlusMinus150mV => 0x0103,
            TypeCode::CurrentPlusMinus20mA => 0x0181,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            TypeCode::Current0To20mA => "0-20mA",
            TypeCode::Current4To20mA => "4-20mA",
            TypeCode::Voltage0To10V => "0-10V",
            TypeCode::Voltage0To5V => "0-5V",
            TypeCode::VoltagePlusMinus10V => "+-10V",
            TypeCode::VoltagePlusMinus5V => "+-5V",
            TypeCode::VoltagePlusMinus1V => "+-1V",
            TypeCode::VoltagePlusMinus500mV => "+-500mV",
            TypeCode::VoltagePlusMinus150mV => "+-150mV",
            TypeCode::CurrentPlusMinus20mA => "+-20mA",
        }
    }

    /// physical range, in the unit the name carries
    pub fn range(self) -> (f64, f64) {
        match self {
            TypeCode::Current0To20mA => (0.0, 20.0),
            TypeCode::Current4To20mA => (4.0, 20.0),
            TypeCode::Voltage0To10V => (0.0, 10.0),
            TypeCode::Voltage0To5V => (0.0, 5.0),
            TypeCode::VoltagePlusMinus10V => (-10.0, 10.0),
            TypeCode::VoltagePlusMinus5V => (-5.0, 5.0),
            TypeCode::VoltagePlusMinus1V => (-1.0, 1.0),
            TypeCode::VoltagePlusMinus500mV => (-500.0, 500.0),
            TypeCode::VoltagePlusMinus150mV => (-150.0, 150.0),
            TypeCode::CurrentPlusMinus20mA => (-20.0, 20.0),
        }
    }
}

/// label of a status word with no flag set, a single blank as existing clients expect it
pub const STATUS_CLEAR: &str = " ";

lazy_static! {
    static ref TYPE_CODE_BY_RAW: HashMap<u16, TypeCode> =
        TypeCode::ALL.iter().map(|t| (t.raw(), *t)).collect();

    static ref TYPE_CODE_BY_NAME: HashMap<&'static str, TypeCode> =
        TypeCode::ALL.iter().map(|t| (t.name(), *t)).collect();

    /// analog input channel status (ADAM-6217)
    pub static ref AI_STATUS: StatusTable = StatusTable::new(&[
        (0, STATUS_CLEAR),
        (1, "Failed to provide AI value (UART timeout)"),
        (2, "Over Range"),
        (4, "Under Range"),
        (8, "Open Circuit(Burnout)"),
        (128, "AD Converter failed"),
        (512, "Zero / Span Calibration Error"),
    ]);

    /// analog output channel status, first word (ADAM-6224)
    pub static ref AO_STATUS: StatusTable = StatusTable::new(&[
        (0, STATUS_CLEAR),
        (1, "Fail to provide AO Value"),
        (8, "No Output Current"),
        (512, "Zero/Span Calibration Error"),
    ]);

    /// analog output channel status, second word (ADAM-6224)
    pub static ref AO_TRIGGER_STATUS: StatusTable = StatusTable::new(&[
        (0, STATUS_CLEAR),
        (1, "DI triggered to Safety Value"),
        (2, "DI triggered to Startup Value"),
        (4, "AO triggered to Fail Safety Value"),
    ]);

    /// digital input event status (ADAM-6224)
    pub static ref DI_EVENT_STATUS: StatusTable = StatusTable::new(&[
        (0, STATUS_CLEAR),
        (1, "Unreliable DI value (UART Timeout)"),
        (2, "Safety Value triggered"),
        (4, "Startup Value triggered"),
    ]);
}

/// fixed status word -> label table
#[derive(Debug)]
pub struct StatusTable {
    labels: HashMap<u16, &'static str>,
}

impl StatusTable {
    fn new(entries: &[(u16, &'static str)]) -> Self {
        Self {
            labels: entries.iter().copied().collect(),
        }
    }

    pub fn contains(&self, raw: u16) -> bool {
        self.labels.contains_key(&raw)
    }
}

/// map a status word to its label, the word must come from the table's domain
pub fn decode_status_bits(raw: u16, table: &StatusTable) -> Result<&'static str, LookupError> {
    table
        .labels
        .get(&raw)
        .copied()
        .ok_or(LookupError::UnknownStatus(raw))
}

/// scaling of one module: the raw full scale and the type codes it accepts
#[derive(Debug, Clone, Copy)]
pub struct AnalogScale {
    pub raw_max: u16,
    pub type_codes: &'static [TypeCode],
}

impl AnalogScale {
    /// resolve a type code word, only codes of this module count
    pub fn resolve(&self, type_code: u16) -> Option<TypeCode> {
        TYPE_CODE_BY_RAW
            .get(&type_code)
            .copied()
            .filter(|t| self.type_codes.contains(t))
    }

    /// raw word -> engineering value
    /// an unknown type code keeps `previous`, decoding never fails
    pub fn decode_analog(&self, raw: u16, type_code: u16, previous: f64) -> f64 {
        match self.resolve(type_code) {
            Some(t) => {
                let (min, max) = t.range();
                min + (max - min) * raw as f64 / self.raw_max as f64
            }
            None => previous,
        }
    }

    /// engineering value -> raw word
    /// values outside the type's range are rejected, an unknown type code keeps `previous_raw`
    pub fn encode_analog(&self, value: f64, type_code: u16, previous_raw: u16) -> Result<u16, ValidationError> {
        let t = match self.resolve(type_code) {
            Some(t) => t,
            None => return Ok(previous_raw),
        };
        let (min, max) = t.range();
        // NaN fails both comparisons
        if !(value >= min && value <= max) {
            return Err(ValidationError::OutOfRange {
                value,
                min,
                max,
                type_name: t.name(),
            });
        }
        let raw = ((value - min) / (max - min) * self.raw_max as f64).round();
        Ok(raw.min(self.raw_max as f64) as u16)
    }

    /// one raw step, in engineering units
    pub fn resolution(&self, type_code: TypeCode) -> f64 {
        let (min, max) = type_code.range();
        (max - min) / self.raw_max as f64
    }

    pub fn decode_type_code(&self, raw: u16) -> Result<&'static str, LookupError> {
        self.resolve(raw)
            .map(TypeCode::name)
            .ok_or(LookupError::UnknownTypeCodeRaw(raw))
    }

    /// accepts the ascii names and their `±` spelling
    pub fn encode_type_code(&self, name: &str) -> Result<u16, LookupError> {
        let normalized = name.trim().replace('±', "+-");
        TYPE_CODE_BY_NAME
            .get(normalized.as_str())
            .filter(|t| self.type_codes.contains(*t))
            .map(|t| t.raw())
            .ok_or_else(|| LookupError::UnknownTypeCode(name.to_string()))
    }
}

/// two consecutive words, low word first
pub fn decode_wide(low: u16, high: u16) -> u32 {
    low as u32 + 65536 * high as u32
}

pub fn encode_wide(value: u32) -> [u16; 2] {
    [(value % 65536) as u16, (value / 65536) as u16]
}
