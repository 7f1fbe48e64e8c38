//! device manager
//! - builds one actor per configured module
//! - picks the tcp or the in-memory connector according to the running mode
//! - routes command dtos to the right device
//! - stops every worker on shutdown

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::workers::device_thread::DeviceHandle;
use super::workers::reporting_thread::reporting_loop;
use crate::common::error::DeviceError;
use crate::common::setting::{DeviceSetting, Settings};
use crate::driver::adam::device::AdamDevice;
use crate::driver::adam::state::DeviceState;
use crate::driver::adam::variant::{Attribute, Command, WriteTarget};
use crate::driver::modbus::modbus_dummy::{DummyConnector, DummyModule};
use crate::driver::modbus::modbus_tcp::ModbusTcpConnector;
use crate::driver::modbus::traits::ModbusConnector;
use crate::entity::dto::device_command_dto::{DeviceAction, DeviceCommandDto};
use crate::{error, info, warn};

const LOG_TAG: &str = "device_manager";

pub struct DeviceManager {
    devices: Vec<DeviceHandle>,
    index: HashMap<String, usize>,
    // dummy mode only, the simulated module behind each device
    dummy_modules: HashMap<String, DummyModule>,
    tasks: Vec<JoinHandle<()>>,
    cancel: CancellationToken,
}

impl DeviceManager {
    /// spawn every configured device and the reporting worker, then connect the auto_connect ones
    pub async fn start(settings: &Settings, cancel: CancellationToken) -> DeviceManager {
        let mut manager = DeviceManager {
            devices: vec![],
            index: HashMap::new(),
            dummy_modules: HashMap::new(),
            tasks: vec![],
            cancel,
        };
        if settings.is_dummy() {
            info!(LOG_TAG, "dummy mode, no modbus connection will be opened");
        }
        let tcp: Arc<dyn ModbusConnector> = Arc::new(ModbusTcpConnector);

        for setting in settings.devices.iter() {
            if manager.index.contains_key(&setting.name) {
                error!(LOG_TAG, "duplicated device name, skipped: {}", setting.name);
                continue;
            }
            let connector = if settings.is_dummy() {
                let module = dummy_module(setting);
                manager.dummy_modules.insert(setting.name.clone(), module.clone());
                Arc::new(DummyConnector::new(module)) as Arc<dyn ModbusConnector>
            } else {
                tcp.clone()
            };
            let device = AdamDevice::new(setting, connector);
            let (handle, task) = DeviceHandle::spawn(device, setting.polling_period(), manager.cancel.clone());
            info!(
                LOG_TAG,
                "device registered, name: {}, model: {}, address: {}:{}",
                setting.name,
                setting.variant.descriptor().model,
                setting.address(),
                setting.port
            );
            manager.index.insert(setting.name.clone(), manager.devices.len());
            manager.devices.push(handle);
            manager.tasks.push(task);
        }

        manager.tasks.push(tokio::spawn(reporting_loop(
            manager.devices.clone(),
            Duration::from_millis(settings.report.interval_ms),
            manager.cancel.clone(),
        )));

        for setting in settings.devices.iter().filter(|s| s.auto_connect) {
            if let Some(device) = manager.device(&setting.name) {
                match device.connect_with_device().await {
                    Ok(state) => info!(LOG_TAG, "auto connect, device: {}, state: {}", setting.name, state),
                    Err(e) => warn!(LOG_TAG, "auto connect failed, device: {}, error: {}", setting.name, e),
                }
            }
        }
        manager
    }

    pub fn devices(&self) -> &[DeviceHandle] {
        &self.devices
    }

    pub fn device(&self, name: &str) -> Option<&DeviceHandle> {
        self.index.get(name).and_then(|i| self.devices.get(*i))
    }

    pub fn dummy_module(&self, name: &str) -> Option<&DummyModule> {
        self.dummy_modules.get(name)
    }

    /// run one command dto, the device state after the command is returned
    pub async fn dispatch(&self, command: DeviceCommandDto) -> Result<DeviceState, DeviceError> {
        let device = self
            .device(&command.device_id)
            .ok_or_else(|| DeviceError::UnknownDevice(command.device_id.clone()))?;
        info!(LOG_TAG, "dispatch command, device: {}, action: {:?}", command.device_id, command.action);
        match command.action {
            DeviceAction::ConnectWithDevice => device.connect_with_device().await,
            DeviceAction::Disconnect => device.disconnect().await,
            DeviceAction::ReadDataFromDevice => device.read_data_from_device().await,
            DeviceAction::ResetHistMax { channel } => {
                device.run_command(Command::ResetHistMax, channel).await?;
                Ok(device.state())
            }
            DeviceAction::ResetHistMin { channel } => {
                device.run_command(Command::ResetHistMin, channel).await?;
                Ok(device.state())
            }
            DeviceAction::ClearCounter { channel } => {
                device.run_command(Command::ClearCounter, channel).await?;
                Ok(device.state())
            }
            DeviceAction::WriteAttribute { attribute, value } => {
                device.write_by_name(&attribute, value).await?;
                Ok(device.state())
            }
        }
    }

    /// cancel every worker and wait for them, connections are closed by the workers themselves
    pub async fn shutdown(self) {
        info!(LOG_TAG, "shutting down {} devices", self.devices.len());
        self.cancel.cancel();
        for result in join_all(self.tasks).await {
            if let Err(e) = result {
                error!(LOG_TAG, "worker ended abnormally: {}", e);
            }
        }
        info!(LOG_TAG, "all workers stopped");
    }
}

/// simulated module with a valid type code on every analog channel
fn dummy_module(setting: &DeviceSetting) -> DummyModule {
    let module = DummyModule::new();
    let descriptor = setting.variant.descriptor();
    let type_code_base = descriptor
        .attribute(Attribute::TypeCode)
        .and_then(|spec| spec.write);
    if let (Some(scale), Some(WriteTarget::Register { base })) = (descriptor.scale, type_code_base) {
        if let Some(first) = scale.type_codes.first() {
            module.set_registers(base, &vec![first.raw(); descriptor.analog_channels]);
        }
    }
    module
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::adam::attribute::AttributeValue;
    use crate::driver::modbus::modbus_dummy::WriteRecord;

    const DUMMY_CONFIG: &str = r#"
        [env]
        mode = "dummy"

        [report]
        interval_ms = 20

        [[devices]]
        name = "ai_rack"
        variant = "ADAM-6217"
        polling_period_ms = 10
        auto_connect = true

        [[devices]]
        name = "ao_rack"
        variant = "ADAM-6224"

        [[devices]]
        name = "ao_rack"
        variant = "ADAM-6256"
    "#;

    #[tokio::test]
    async fn test_start_dispatch_shutdown() {
        let settings = Settings::from_toml_str(DUMMY_CONFIG).unwrap();
        let manager = DeviceManager::start(&settings, CancellationToken::new()).await;

        // the duplicate name is dropped
        assert_eq!(manager.devices().len(), 2);
        assert_eq!(manager.device("ai_rack").map(|d| d.state()), Some(DeviceState::On));
        assert_eq!(manager.device("ao_rack").map(|d| d.state()), Some(DeviceState::Standby));

        tokio::time::sleep(Duration::from_millis(50)).await;
        let ai = manager.device("ai_rack").unwrap();
        assert_eq!(ai.read_by_name("TypeCode_7"), Ok(AttributeValue::Text("0-20mA".to_string())));

        let command: DeviceCommandDto = serde_json::from_str(
            r#"{"device_id": "ai_rack", "action": {"reset_hist_max": {"channel": 3}}}"#,
        )
        .unwrap();
        assert_eq!(manager.dispatch(command).await, Ok(DeviceState::On));
        assert_eq!(
            manager.dummy_module("ai_rack").unwrap().writes(),
            vec![WriteRecord::Coil { address: 103, word: 0xFF00 }]
        );

        let command = DeviceCommandDto { device_id: "nope".to_string(), action: DeviceAction::ConnectWithDevice };
        assert_eq!(manager.dispatch(command).await, Err(DeviceError::UnknownDevice("nope".to_string())));

        let command = DeviceCommandDto { device_id: "ao_rack".to_string(), action: DeviceAction::Disconnect };
        assert!(matches!(manager.dispatch(command).await, Err(DeviceError::UnsupportedCommand { .. })));

        let handle = manager.device("ai_rack").unwrap().clone();
        manager.shutdown().await;
        assert!(matches!(handle.read_data_from_device().await, Err(DeviceError::ControllerStopped(_))));
    }

    #[test]
    fn test_dummy_module_is_seeded() {
        let module = dummy_module(&DeviceSetting::new("ao", crate::driver::adam::variant::Variant::Adam6224));
        assert_eq!(module.register(200), 0x0182);
        assert_eq!(module.register(203), 0x0182);
        assert_eq!(module.register(204), 0);
    }
}
