use thiserror::Error;

use crate::driver::modbus::prelude::ModbusAddrSize;

/// transport boundary error
/// every failure of the modbus link is translated into one of these before leaving `DeviceConnection`
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DriverError {
    #[error("cannot connect to {address}, cause: {cause}")]
    Connect { address: String, cause: String },

    #[error("modbus {op} failed at address {address}, cause: {cause}")]
    Io {
        op: &'static str,
        address: ModbusAddrSize,
        cause: String,
    },

    #[error("modbus {op} at address {address} timed out after {timeout_ms} ms")]
    Timeout {
        op: &'static str,
        address: ModbusAddrSize,
        timeout_ms: u64,
    },

    #[error("modbus {op} at address {address} returned {actual} values, expected {expected}")]
    ShortResponse {
        op: &'static str,
        address: ModbusAddrSize,
        expected: usize,
        actual: usize,
    },

    #[error("device is not connected")]
    NotConnected,
}

/// a value or index rejected locally, before anything reaches the device
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("value {value} out of range [{min}, {max}] for type {type_name}")]
    OutOfRange {
        value: f64,
        min: f64,
        max: f64,
        type_name: &'static str,
    },

    #[error("channel {channel} out of range, device has {count} channels")]
    ChannelOutOfRange { channel: i64, count: usize },

    #[error("attribute {attribute} expects a {expected} value")]
    WrongValueType {
        attribute: String,
        expected: &'static str,
    },
}

/// miss in one of the fixed lookup tables
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    #[error("unknown type code name: {0}")]
    UnknownTypeCode(String),

    #[error("unknown type code: {0:#06x}")]
    UnknownTypeCodeRaw(u16),

    #[error("unknown status value: {0}")]
    UnknownStatus(u16),
}

/// error returned by device commands and attribute accessors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DeviceError {
    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Lookup(#[from] LookupError),

    #[error("unknown attribute: {0}")]
    UnknownAttribute(String),

    #[error("attribute {0} is read only")]
    ReadOnly(String),

    #[error("command {command} is not supported by {model}")]
    UnsupportedCommand {
        command: &'static str,
        model: &'static str,
    },

    #[error("unknown device: {0}")]
    UnknownDevice(String),

    #[error("device controller {0} is stopped")]
    ControllerStopped(String),
}
