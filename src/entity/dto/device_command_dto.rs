//! used for commanding device
//! json shape: `{"device_id": "ai_rack", "action": {"reset_hist_max": {"channel": 3}}}`,
//! actions without parameters are plain strings, e.g. `"action": "connect_with_device"`

use serde_derive::Deserialize;

use crate::driver::adam::attribute::AttributeValue;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DeviceCommandDto {
    pub device_id: String,
    pub action: DeviceAction,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceAction {
    ConnectWithDevice,
    Disconnect,
    ReadDataFromDevice,
    ResetHistMax { channel: i64 },
    ResetHistMin { channel: i64 },
    ClearCounter { channel: i64 },
    WriteAttribute { attribute: String, value: AttributeValue },
}
