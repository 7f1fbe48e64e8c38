//! ChannelState
//! in-memory mirror of every channel of one module, plus the device state it was read under.
//! the poller swaps in a whole new `ChannelSet` at once, writers touch single fields,
//! readers always see one consistent batch.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::RwLock;
use serde_derive::Serialize;

use super::codec::AnalogScale;
use super::state::DeviceState;

/// analog channel, input or output depending on the module
/// raw words are kept next to their decoded values so a later type code change can re-decode them
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AnalogChannel {
    pub value: f64,
    pub raw_value: u16,
    pub type_code: u16,
    pub status: u16,
    // second status word, analog output modules only
    pub trigger_status: u16,
    pub hist_max: f64,
    pub hist_max_raw: u16,
    pub hist_min: f64,
    pub hist_min_raw: u16,
    pub startup_value: f64,
    pub startup_raw: u16,
    pub safety_value: f64,
    pub safety_raw: u16,
    pub open_circuit: bool,
    pub high_alarm: bool,
    pub low_alarm: bool,
}

impl AnalogChannel {
    /// re-decode every scaled value under the current type code
    pub fn decode(&mut self, scale: &AnalogScale) {
        let t = self.type_code;
        self.value = scale.decode_analog(self.raw_value, t, self.value);
        self.hist_max = scale.decode_analog(self.hist_max_raw, t, self.hist_max);
        self.hist_min = scale.decode_analog(self.hist_min_raw, t, self.hist_min);
        self.startup_value = scale.decode_analog(self.startup_raw, t, self.startup_value);
        self.safety_value = scale.decode_analog(self.safety_raw, t, self.safety_value);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DigitalInputChannel {
    pub value: bool,
    pub event_status: u16,
    pub counter: u32,
    pub counter_enabled: bool,
    pub latch_closed: bool,
    pub overflow_clear_enabled: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DigitalOutputChannel {
    pub value: bool,
    pub pulse_low_ms: u32,
    pub pulse_high_ms: u32,
    pub absolute_pulse: u32,
    pub incremental_pulse: u32,
}

/// all channels of one module
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChannelSet {
    pub analog: Vec<AnalogChannel>,
    pub digital_inputs: Vec<DigitalInputChannel>,
    pub digital_outputs: Vec<DigitalOutputChannel>,
}

impl ChannelSet {
    /// zero valued channels
    pub fn new(analog: usize, digital_inputs: usize, digital_outputs: usize) -> Self {
        Self {
            analog: vec![AnalogChannel::default(); analog],
            digital_inputs: vec![DigitalInputChannel::default(); digital_inputs],
            digital_outputs: vec![DigitalOutputChannel::default(); digital_outputs],
        }
    }

    /// refresh every decoded analog value from its raw word and the channel's type code
    pub fn decode_analog(&mut self, scale: &AnalogScale) {
        for channel in self.analog.iter_mut() {
            channel.decode(scale);
        }
    }
}

/// what the rest of the system can see of a device
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceSnapshot {
    pub state: DeviceState,
    pub status_message: String,
    pub channels: ChannelSet,
    // ms since epoch of the last completed poll
    pub last_update: Option<u64>,
    pub poll_count: u64,
}

/// shared handle on a device snapshot
#[derive(Debug, Clone)]
pub struct ChannelCache {
    inner: Arc<RwLock<DeviceSnapshot>>,
}

impl ChannelCache {
    pub fn new(channels: ChannelSet, status_message: &str) -> Self {
        Self {
            inner: Arc::new(RwLock::new(DeviceSnapshot {
                state: DeviceState::Standby,
                status_message: status_message.to_string(),
                channels,
                last_update: None,
                poll_count: 0,
            })),
        }
    }

    pub fn snapshot(&self) -> DeviceSnapshot {
        self.inner.read().clone()
    }

    pub fn channels(&self) -> ChannelSet {
        self.inner.read().channels.clone()
    }

    /// run `f` against the current batch under the read lock
    pub fn read<T>(&self, f: impl FnOnce(&DeviceSnapshot) -> T) -> T {
        f(&self.inner.read())
    }

    pub fn state(&self) -> DeviceState {
        self.inner.read().state
    }

    pub fn status_message(&self) -> String {
        self.inner.read().status_message.clone()
    }

    /// swap in a freshly polled batch in one step
    pub fn replace_channels(&self, channels: ChannelSet) {
        let mut guard = self.inner.write();
        guard.channels = channels;
        guard.last_update = Some(now_millis());
        guard.poll_count += 1;
    }

    /// single field update after a confirmed write
    pub fn update_channels(&self, f: impl FnOnce(&mut ChannelSet)) {
        f(&mut self.inner.write().channels);
    }

    pub fn set_state(&self, state: DeviceState, status_message: String) {
        let mut guard = self.inner.write();
        guard.state = state;
        guard.status_message = status_message;
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::adam::codec::TypeCode;

    #[test]
    fn test_new_is_zero_valued() {
        let cache = ChannelCache::new(ChannelSet::new(8, 0, 0), "ADAM-6217 enabled");
        let snapshot = cache.snapshot();
        assert_eq!(snapshot.state, DeviceState::Standby);
        assert_eq!(snapshot.channels.analog.len(), 8);
        assert!(snapshot.channels.analog.iter().all(|c| c.value == 0.0 && c.raw_value == 0));
        assert_eq!(snapshot.last_update, None);
    }

    #[test]
    fn test_replace_swaps_whole_batch() {
        let cache = ChannelCache::new(ChannelSet::new(0, 4, 0), "");
        let mut fresh = cache.channels();
        for channel in fresh.digital_inputs.iter_mut() {
            channel.value = true;
        }
        cache.replace_channels(fresh);
        cache.read(|s| {
            assert!(s.channels.digital_inputs.iter().all(|c| c.value));
            assert_eq!(s.poll_count, 1);
            assert!(s.last_update.is_some());
        });
    }

    #[test]
    fn test_decode_analog_keeps_value_on_unknown_code() {
        let scale = AnalogScale { raw_max: 4095, type_codes: &TypeCode::OUTPUT };
        let mut set = ChannelSet::new(2, 0, 0);
        set.analog[0].type_code = TypeCode::Voltage0To10V.raw();
        set.analog[0].raw_value = 4095;
        set.analog[1].type_code = 0x0999;
        set.analog[1].raw_value = 4095;
        set.analog[1].value = 1.25;
        set.decode_analog(&scale);
        assert_eq!(set.analog[0].value, 10.0);
        assert_eq!(set.analog[1].value, 1.25);
    }
}
