//! DeviceStateMachine
//! STANDBY (not connected) -> ON (connected, polling) -> FAULT (connect or io error).
//! FAULT is left only through an explicit connect or disconnect, never automatically.

use std::fmt::{self, Display, Formatter};

use serde_derive::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DeviceState {
    Standby,
    On,
    Fault,
}

impl Display for DeviceState {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let name = match self {
            DeviceState::Standby => "STANDBY",
            DeviceState::On => "ON",
            DeviceState::Fault => "FAULT",
        };
        write!(f, "{}", name)
    }
}

/// what happened to the device
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    Connected { address: String },
    ConnectFailed { address: String, cause: String },
    Disconnected,
    PollFailed { cause: String },
    WriteFailed { attribute: String, cause: String },
}

impl DeviceState {
    /// next state and the status message that goes with it
    pub fn next(self, model: &str, transition: &Transition) -> (DeviceState, String) {
        match transition {
            Transition::Connected { address } => (
                DeviceState::On,
                format!("Connected to device with IP: {}", address),
            ),
            Transition::ConnectFailed { address, cause } => (
                DeviceState::Fault,
                format!("Exception caught while connecting to device {}:\n{}", address, cause),
            ),
            Transition::Disconnected => (
                DeviceState::Standby,
                format!(
                    "Device disconnected from {}, set state to STANDBY, ready to connect to device again",
                    model
                ),
            ),
            Transition::PollFailed { cause } => (
                DeviceState::Fault,
                format!("Exception caught while reading data from {} (was {}):\n{}", model, self, cause),
            ),
            Transition::WriteFailed { attribute, cause } => (
                DeviceState::Fault,
                format!("Exception caught while writing {} to {}:\n{}", attribute, model, cause),
            ),
        }
    }

    pub fn is_polling(self) -> bool {
        self == DeviceState::On
    }
}

pub fn initial_status(model: &str) -> String {
    format!("{} enabled", model)
}
