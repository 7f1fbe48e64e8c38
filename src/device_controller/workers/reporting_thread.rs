//! upward reporting worker
//! periodically serializes the state of every device and logs it as one json line per device

use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::device_thread::{DeviceHandle, MIN_PERIOD};
use crate::entity::dto::device_state_dto::DeviceStateDto;
use crate::{error, info};

const LOG_TAG: &str = "reporting_thread";

pub fn report(devices: &[DeviceHandle]) -> Vec<String> {
    devices
        .iter()
        .filter_map(|device| {
            let dto = DeviceStateDto::from_view(device.name(), device.view());
            match serde_json::to_string(&dto) {
                Ok(json) => Some(json),
                Err(e) => {
                    error!(LOG_TAG, "cannot serialize device state, device: {}, error: {}", device.name(), e);
                    None
                }
            }
        })
        .collect()
}

pub async fn reporting_loop(devices: Vec<DeviceHandle>, interval: Duration, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(interval.max(MIN_PERIOD));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!(LOG_TAG, "reporting worker exiting");
                return;
            }
            _ = ticker.tick() => {
                for line in report(&devices) {
                    info!(LOG_TAG, "device state: {}", line);
                }
            }
        }
    }
}
