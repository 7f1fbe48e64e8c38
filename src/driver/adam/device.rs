//! AdamDevice
//! one engine for every ADAM variant: owns the connection and the channel cache of a module,
//! drives the state machine and carries the write side of the attributes.
//! all methods take `&mut self`, so register io of one device is serialized by its owner.

use std::sync::Arc;

use super::attribute::{check_channel, parse_attribute_name, AttributeValue, DeviceView};
use super::channel::{ChannelCache, ChannelSet};
use super::codec::{encode_wide, AnalogScale};
use super::poller::poll_once;
use super::state::{initial_status, DeviceState, Transition};
use super::variant::{Attribute, Command, VariantDescriptor, WriteTarget};
use crate::common::error::{DeviceError, DriverError, ValidationError};
use crate::common::setting::DeviceSetting;
use crate::driver::modbus::modbus_connection::DeviceConnection;
use crate::driver::modbus::traits::ModbusConnector;
use crate::{debug, info, warn};

const LOG_TAG: &str = "adam_device";

/// what goes over the wire for one attribute write
#[derive(Debug, Clone, Copy, PartialEq)]
enum Payload {
    Coil(bool),
    Register(u16),
    Wide(u32),
}

pub struct AdamDevice {
    name: String,
    descriptor: &'static VariantDescriptor,
    address: String,
    port: u16,
    connection: DeviceConnection,
    cache: ChannelCache,
}

impl AdamDevice {
    pub fn new(setting: &DeviceSetting, connector: Arc<dyn ModbusConnector>) -> Self {
        let descriptor = setting.variant.descriptor();
        let channels = ChannelSet::new(
            descriptor.analog_channels,
            descriptor.digital_inputs,
            descriptor.digital_outputs,
        );
        Self {
            name: setting.name.clone(),
            descriptor,
            address: setting.address(),
            port: setting.port,
            connection: DeviceConnection::new(connector, setting.unit, setting.timeout()),
            cache: ChannelCache::new(channels, &initial_status(descriptor.model)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn descriptor(&self) -> &'static VariantDescriptor {
        self.descriptor
    }

    pub fn state(&self) -> DeviceState {
        self.cache.state()
    }

    pub fn view(&self) -> DeviceView {
        DeviceView::new(self.descriptor, self.cache.clone())
    }

    /// (re)open the connection, ON on success, FAULT otherwise
    /// connect failures end up in the status message, they are not returned
    pub async fn connect_with_device(&mut self) -> DeviceState {
        let transition = match self.connection.connect(&self.address, self.port).await {
            Ok(()) => Transition::Connected {
                address: self.address.clone(),
            },
            Err(e) => Transition::ConnectFailed {
                address: format!("{}:{}", self.address, self.port),
                cause: e.to_string(),
            },
        };
        self.apply(transition)
    }

    pub fn disconnect(&mut self) -> Result<DeviceState, DeviceError> {
        if !self.descriptor.supports_disconnect {
            return Err(DeviceError::UnsupportedCommand {
                command: "disconnect",
                model: self.descriptor.model,
            });
        }
        self.connection.close();
        Ok(self.apply(Transition::Disconnected))
    }

    /// one polling cycle, does nothing unless the device is ON
    /// the cache is swapped only when every block was read
    pub async fn read_data_from_device(&mut self) -> DeviceState {
        let state = self.cache.state();
        if !state.is_polling() {
            return state;
        }
        let current = self.cache.channels();
        match poll_once(&mut self.connection, self.descriptor, &current).await {
            Ok(channels) => {
                self.cache.replace_channels(channels);
                state
            }
            Err(e) => {
                warn!(LOG_TAG, "poll failed, device: {}, error: {}", self.name, e);
                self.apply(Transition::PollFailed { cause: e.to_string() })
            }
        }
    }

    pub async fn write_by_name(&mut self, name: &str, value: &AttributeValue) -> Result<(), DeviceError> {
        let (attribute, channel) = parse_attribute_name(name)?;
        self.write_attribute(attribute, channel, value).await
    }

    /// validate, write one attribute, and mirror it into the cache once the device confirmed it
    pub async fn write_attribute(
        &mut self,
        attribute: Attribute,
        channel: usize,
        value: &AttributeValue,
    ) -> Result<(), DeviceError> {
        check_channel(self.descriptor, attribute, channel)?;
        let name = format!("{}_{}", attribute.name(), channel);
        let target = self
            .descriptor
            .attribute(attribute)
            .and_then(|spec| spec.write)
            .ok_or_else(|| DeviceError::ReadOnly(name.clone()))?;

        let payload = self.encode(attribute, channel, value, &name)?;
        let address = target.address(channel);
        debug!(
            LOG_TAG,
            "write attribute, device: {}, attribute: {}, address: {}, payload: {:?}",
            self.name,
            name,
            address,
            payload
        );
        let result = match (target, payload) {
            (WriteTarget::Coil { .. }, Payload::Coil(on)) => self.connection.write_coil(address, on).await,
            (WriteTarget::Register { .. }, Payload::Register(raw)) => {
                self.connection.write_register(address, raw).await
            }
            (WriteTarget::WideRegister { .. }, Payload::Wide(v)) => {
                self.connection.write_registers(address, &encode_wide(v)).await
            }
            _ => return Err(DeviceError::ReadOnly(name)),
        };
        self.settle(&name, result)?;

        let scale = self.descriptor.scale;
        self.cache.update_channels(|set| store(set, scale, attribute, channel, payload));
        Ok(())
    }

    pub async fn reset_hist_max(&mut self, channel: i64) -> Result<(), DeviceError> {
        self.run_command(Command::ResetHistMax, channel).await
    }

    pub async fn reset_hist_min(&mut self, channel: i64) -> Result<(), DeviceError> {
        self.run_command(Command::ResetHistMin, channel).await
    }

    pub async fn clear_counter(&mut self, channel: i64) -> Result<(), DeviceError> {
        self.run_command(Command::ClearCounter, channel).await
    }

    /// single coil pulse at `base + channel`, the device clears it by itself
    pub async fn run_command(&mut self, command: Command, channel: i64) -> Result<(), DeviceError> {
        let spec = self
            .descriptor
            .command(command)
            .ok_or(DeviceError::UnsupportedCommand {
                command: command.name(),
                model: self.descriptor.model,
            })?;
        let count = self.descriptor.channel_count(command.bank());
        if channel < 0 || channel >= count as i64 {
            return Err(ValidationError::ChannelOutOfRange { channel, count }.into());
        }
        let address = spec.coil_base + channel as u16;
        info!(
            LOG_TAG,
            "run command, device: {}, command: {}, channel: {}",
            self.name,
            command.name(),
            channel
        );
        let result = self.connection.write_coil(address, true).await;
        self.settle(command.name(), result)
    }

    /// release the connection, called before the owner goes away
    pub fn shutdown(&mut self) {
        info!(LOG_TAG, "shutting down device: {}", self.name);
        self.connection.close();
    }

    fn encode(
        &self,
        attribute: Attribute,
        channel: usize,
        value: &AttributeValue,
        name: &str,
    ) -> Result<Payload, DeviceError> {
        let payload = match attribute {
            Attribute::AnalogOutput | Attribute::StartupValue | Attribute::SafetyValue => {
                let scale = self.scale(name)?;
                let requested = value.as_f64(name)?;
                let (type_code, previous_raw) = self.cache.read(|s| {
                    let c = &s.channels.analog[channel];
                    let raw = match attribute {
                        Attribute::StartupValue => c.startup_raw,
                        Attribute::SafetyValue => c.safety_raw,
                        _ => c.raw_value,
                    };
                    (c.type_code, raw)
                });
                Payload::Register(scale.encode_analog(requested, type_code, previous_raw)?)
            }
            Attribute::TypeCode => {
                let scale = self.scale(name)?;
                Payload::Register(scale.encode_type_code(value.as_text(name)?)?)
            }
            Attribute::DigitalOutput
            | Attribute::CounterEnabled
            | Attribute::LatchClosed
            | Attribute::OverflowClearEnabled => Payload::Coil(value.as_bool(name)?),
            Attribute::PulseLowWidth
            | Attribute::PulseHighWidth
            | Attribute::AbsolutePulse
            | Attribute::IncrementalPulse => Payload::Wide(value.as_u32(name)?),
            _ => return Err(DeviceError::ReadOnly(name.to_string())),
        };
        Ok(payload)
    }

    fn scale(&self, name: &str) -> Result<AnalogScale, DeviceError> {
        self.descriptor
            .scale
            .ok_or_else(|| DeviceError::UnknownAttribute(name.to_string()))
    }

    /// io failures move the device to FAULT and are handed back to the caller
    fn settle(&mut self, what: &str, result: Result<(), DriverError>) -> Result<(), DeviceError> {
        match result {
            Ok(()) => Ok(()),
            // nothing was sent, the device state is not affected
            Err(DriverError::NotConnected) => Err(DriverError::NotConnected.into()),
            Err(e) => {
                warn!(LOG_TAG, "write failed, device: {}, target: {}, error: {}", self.name, what, e);
                self.apply(Transition::WriteFailed {
                    attribute: what.to_string(),
                    cause: e.to_string(),
                });
                Err(e.into())
            }
        }
    }

    fn apply(&mut self, transition: Transition) -> DeviceState {
        let previous = self.cache.state();
        let (next, message) = previous.next(self.descriptor.model, &transition);
        info!(
            LOG_TAG,
            "device: {}, state: {} -> {}, status: {}",
            self.name,
            previous,
            next,
            message
        );
        self.cache.set_state(next, message);
        next
    }
}

impl Drop for AdamDevice {
    fn drop(&mut self) {
        self.connection.close();
    }
}

/// mirror a confirmed write into the cached channels
fn store(set: &mut ChannelSet, scale: Option<AnalogScale>, attribute: Attribute, channel: usize, payload: Payload) {
    match payload {
        Payload::Register(raw) => {
            let Some(c) = set.analog.get_mut(channel) else { return };
            match attribute {
                Attribute::TypeCode => c.type_code = raw,
                Attribute::StartupValue => c.startup_raw = raw,
                Attribute::SafetyValue => c.safety_raw = raw,
                _ => c.raw_value = raw,
            }
            if let Some(scale) = scale {
                c.decode(&scale);
            }
        }
        Payload::Coil(on) => match attribute {
            Attribute::DigitalOutput => {
                if let Some(c) = set.digital_outputs.get_mut(channel) {
                    c.value = on;
                }
            }
            _ => {
                if let Some(c) = set.digital_inputs.get_mut(channel) {
                    match attribute {
                        Attribute::CounterEnabled => c.counter_enabled = on,
                        Attribute::LatchClosed => c.latch_closed = on,
                        _ => c.overflow_clear_enabled = on,
                    }
                }
            }
        },
        Payload::Wide(v) => {
            if let Some(c) = set.digital_outputs.get_mut(channel) {
                match attribute {
                    Attribute::PulseLowWidth => c.pulse_low_ms = v,
                    Attribute::PulseHighWidth => c.pulse_high_ms = v,
                    Attribute::AbsolutePulse => c.absolute_pulse = v,
                    _ => c.incremental_pulse = v,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::driver::adam::codec::TypeCode;
    use crate::driver::adam::variant::Variant;
    use crate::driver::modbus::modbus_dummy::{DummyConnector, DummyModule, WriteRecord};
    use crate::driver::modbus::prelude::COIL_ON;

    fn device(variant: Variant, module: &DummyModule) -> AdamDevice {
        let mut setting = DeviceSetting::new("test", variant);
        setting.timeout_ms = 100;
        AdamDevice::new(&setting, Arc::new(DummyConnector::new(module.clone())))
    }

    async fn online(variant: Variant, module: &DummyModule) -> AdamDevice {
        let mut dev = device(variant, module);
        assert_eq!(dev.connect_with_device().await, DeviceState::On);
        dev
    }

    #[tokio::test]
    async fn test_starts_in_standby_zero_valued() {
        let module = DummyModule::new();
        let mut dev = device(Variant::Adam6217, &module);
        let view = dev.view();
        assert_eq!(view.state(), DeviceState::Standby);
        assert_eq!(view.status_message(), "ADAM-6217 enabled");
        assert!(view.snapshot().channels.analog.iter().all(|c| c.value == 0.0));
        // no polling while not connected
        assert_eq!(dev.read_data_from_device().await, DeviceState::Standby);
        assert_eq!(module.read_count(), 0);
    }

    #[tokio::test]
    async fn test_connect_poll_then_fault_keeps_values() {
        let module = DummyModule::new();
        let code = TypeCode::Voltage0To10V.raw();
        module.set_registers(200, &[code; 8]);
        module.set_coils(120, &[false; 8]);
        module.set_registers(0, &[100, 200, 300, 400, 500, 600, 700, 800]);
        let mut dev = online(Variant::Adam6217, &module).await;
        let view = dev.view();
        assert_eq!(view.status_message(), "Connected to device with IP: 192.168.120.56");

        assert_eq!(dev.read_data_from_device().await, DeviceState::On);
        let expected = Variant::Adam6217
            .descriptor()
            .scale
            .map(|s| s.decode_analog(100, code, 0.0))
            .unwrap();
        assert_eq!(view.read(Attribute::AnalogInput, 0), Ok(AttributeValue::Double(expected)));

        module.set_offline(true);
        assert_eq!(dev.read_data_from_device().await, DeviceState::Fault);
        assert!(!view.status_message().is_empty());
        // stale value is still served
        assert_eq!(view.read(Attribute::AnalogInput, 0), Ok(AttributeValue::Double(expected)));

        // no automatic recovery, only an explicit connect
        module.set_offline(false);
        let reads = module.read_count();
        assert_eq!(dev.read_data_from_device().await, DeviceState::Fault);
        assert_eq!(module.read_count(), reads);
        assert_eq!(dev.connect_with_device().await, DeviceState::On);
    }

    #[tokio::test]
    async fn test_failed_cycle_publishes_nothing() {
        let module = DummyModule::new();
        module.set_coils(120, &[true; 8]);
        module.set_registers(0, &[1000; 8]);
        module.fail_on("read_holding_registers", 0);
        let mut dev = online(Variant::Adam6217, &module).await;

        assert_eq!(dev.read_data_from_device().await, DeviceState::Fault);
        let snapshot = dev.view().snapshot();
        // the coil block was read before the failure, none of it is visible
        assert!(snapshot.channels.analog.iter().all(|c| !c.open_circuit));
        assert_eq!(snapshot.poll_count, 0);
        assert!(snapshot.status_message.contains("read_holding_registers"));
    }

    #[tokio::test]
    async fn test_connect_failure_sets_fault() {
        let module = DummyModule::new();
        module.set_offline(true);
        let mut dev = device(Variant::Adam6224, &module);
        assert_eq!(dev.connect_with_device().await, DeviceState::Fault);
        assert!(dev.view().status_message().contains("192.168.120.55:502"));
    }

    #[tokio::test]
    async fn test_reset_hist_validates_channel() {
        let module = DummyModule::new();
        let mut dev = online(Variant::Adam6217, &module).await;

        assert_eq!(
            dev.reset_hist_max(8).await,
            Err(DeviceError::Validation(ValidationError::ChannelOutOfRange { channel: 8, count: 8 }))
        );
        assert!(dev.reset_hist_min(-1).await.is_err());
        assert!(module.writes().is_empty());

        dev.reset_hist_max(3).await.unwrap();
        assert_eq!(module.writes(), vec![WriteRecord::Coil { address: 103, word: COIL_ON }]);
        module.clear_writes();
        dev.reset_hist_min(0).await.unwrap();
        assert_eq!(module.writes(), vec![WriteRecord::Coil { address: 110, word: COIL_ON }]);
        assert_eq!(dev.state(), DeviceState::On);
    }

    #[tokio::test]
    async fn test_unsupported_commands() {
        let module = DummyModule::new();
        let mut dev = online(Variant::Adam6224, &module).await;
        assert_eq!(
            dev.clear_counter(0).await,
            Err(DeviceError::UnsupportedCommand { command: "ClearCounter", model: "ADAM-6224" })
        );
        assert!(matches!(dev.disconnect(), Err(DeviceError::UnsupportedCommand { .. })));
        assert_eq!(dev.state(), DeviceState::On);
    }

    #[tokio::test]
    async fn test_out_of_range_write_never_reaches_device() {
        let module = DummyModule::new();
        module.set_registers(200, &[TypeCode::Voltage0To10V.raw(); 4]);
        let mut dev = online(Variant::Adam6224, &module).await;
        dev.read_data_from_device().await;

        let result = dev.write_by_name("AnalogOutput_1", &AttributeValue::Double(10.5)).await;
        assert!(matches!(result, Err(DeviceError::Validation(ValidationError::OutOfRange { .. }))));
        assert!(module.writes().is_empty());
        assert_eq!(dev.state(), DeviceState::On);

        dev.write_by_name("AnalogOutput_1", &AttributeValue::Double(5.0)).await.unwrap();
        assert_eq!(module.writes(), vec![WriteRecord::Register { address: 1, value: 2048 }]);
        let value = dev.view().read(Attribute::AnalogOutput, 1).unwrap();
        match value {
            AttributeValue::Double(v) => assert!((v - 5.0).abs() <= 10.0 / 4095.0),
            other => panic!("unexpected value: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_failed_write_faults_and_keeps_cache() {
        let module = DummyModule::new();
        let mut dev = online(Variant::Adam6256, &module).await;
        module.fail_on("write_single_coil", 16 + 4);

        let result = dev.write_by_name("DigitalOutput_4", &AttributeValue::Bool(true)).await;
        assert!(matches!(result, Err(DeviceError::Driver(DriverError::Io { .. }))));
        assert_eq!(dev.state(), DeviceState::Fault);
        assert_eq!(dev.view().read(Attribute::DigitalOutput, 4), Ok(AttributeValue::Bool(false)));
    }

    #[tokio::test]
    async fn test_write_without_connection() {
        let module = DummyModule::new();
        let mut dev = device(Variant::Adam6256, &module);
        let result = dev.write_by_name("DigitalOutput_0", &AttributeValue::Bool(true)).await;
        assert_eq!(result, Err(DeviceError::Driver(DriverError::NotConnected)));
        assert_eq!(dev.state(), DeviceState::Standby);
    }

    #[tokio::test]
    async fn test_wide_and_coil_writes() {
        let module = DummyModule::new();
        let mut dev = online(Variant::Adam6250, &module).await;

        dev.write_by_name("PulseHighWidth_2", &AttributeValue::ULong(65552)).await.unwrap();
        dev.write_by_name("LatchClosed_1", &AttributeValue::Bool(true)).await.unwrap();
        dev.clear_counter(7).await.unwrap();
        assert_eq!(
            module.writes(),
            vec![
                WriteRecord::Registers { address: 34, values: vec![0x0010, 0x0001] },
                WriteRecord::Coil { address: 57, word: COIL_ON },
                WriteRecord::Coil { address: 47, word: COIL_ON },
            ]
        );
        let view = dev.view();
        assert_eq!(view.read(Attribute::PulseHighWidth, 2), Ok(AttributeValue::ULong(65552)));
        assert_eq!(view.read(Attribute::LatchClosed, 1), Ok(AttributeValue::Bool(true)));

        // a polled value comes back the same way it was written
        dev.read_data_from_device().await;
        assert_eq!(view.read(Attribute::PulseHighWidth, 2), Ok(AttributeValue::ULong(65552)));
    }

    #[tokio::test]
    async fn test_read_only_and_type_code_writes() {
        let module = DummyModule::new();
        let mut dev = online(Variant::Adam6217, &module).await;

        assert_eq!(
            dev.write_by_name("HistMax_0", &AttributeValue::Double(1.0)).await,
            Err(DeviceError::ReadOnly("HistMax_0".to_string()))
        );
        dev.write_by_name("TypeCode_2", &AttributeValue::Text("±10V".to_string())).await.unwrap();
        assert_eq!(module.writes(), vec![WriteRecord::Register { address: 202, value: 0x0143 }]);
        assert_eq!(dev.view().read_by_name("TypeCode_2"), Ok(AttributeValue::Text("+-10V".to_string())));
    }

    #[tokio::test]
    async fn test_type_code_write_rescales_history() {
        let module = DummyModule::new();
        module.set_registers(200, &[TypeCode::Voltage0To10V.raw(); 8]);
        module.set_registers(10, &[65535]);
        module.set_registers(20, &[0]);
        let mut dev = online(Variant::Adam6217, &module).await;
        dev.read_data_from_device().await;
        let view = dev.view();
        assert_eq!(view.read(Attribute::HistMax, 0), Ok(AttributeValue::Double(10.0)));

        dev.write_by_name("TypeCode_0", &AttributeValue::Text("4-20mA".to_string())).await.unwrap();
        // same raw words, read under the new range before any poll
        assert_eq!(module.read_count(), 4);
        assert_eq!(view.read(Attribute::HistMax, 0), Ok(AttributeValue::Double(20.0)));
        assert_eq!(view.read(Attribute::HistMin, 0), Ok(AttributeValue::Double(4.0)));
    }

    #[tokio::test]
    async fn test_timed_out_poll_is_a_read_failure() {
        let module = DummyModule::new();
        module.set_registers(200, &[TypeCode::Voltage0To10V.raw(); 8]);
        module.set_registers(0, &[65535]);
        let mut dev = online(Variant::Adam6217, &module).await;
        assert_eq!(dev.read_data_from_device().await, DeviceState::On);
        let view = dev.view();
        let before = view.snapshot();

        // the device answers five times slower than the 100 ms timeout
        module.set_registers(0, &[0]);
        module.set_stall(Some(Duration::from_millis(500)));
        assert_eq!(dev.read_data_from_device().await, DeviceState::Fault);

        let after = view.snapshot();
        assert!(after.status_message.contains("timed out"), "{}", after.status_message);
        assert_eq!(after.channels, before.channels);
        assert_eq!(after.poll_count, before.poll_count);
        assert_eq!(view.read(Attribute::AnalogInput, 0), Ok(AttributeValue::Double(10.0)));
    }

    #[tokio::test]
    async fn test_disconnect_releases_connection() {
        let module = DummyModule::new();
        let mut dev = online(Variant::Adam6251, &module).await;
        assert_eq!(dev.disconnect(), Ok(DeviceState::Standby));
        assert_eq!(
            dev.clear_counter(0).await,
            Err(DeviceError::Driver(DriverError::NotConnected))
        );
        assert_eq!(dev.state(), DeviceState::Standby);
    }
}
