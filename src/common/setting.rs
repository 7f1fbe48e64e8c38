//! setting config file
//! loaded from `config_{ENV}.toml`, any key can be overridden by `ADAM__SECTION__KEY` env vars

use std::env;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File, FileFormat};
use serde_derive::Deserialize;

use crate::driver::adam::variant::Variant;
use crate::driver::modbus::prelude::{ModbusUnitSize, DEFAULT_MODBUS_PORT};

#[derive(Debug, Clone, Deserialize)]
pub struct Env {
    #[serde(default = "default_env")]
    pub env: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// "real" opens tcp connections, "dummy" serves every device from memory
    #[serde(default = "default_mode")]
    pub mode: String,
}

impl Default for Env {
    fn default() -> Self {
        Self {
            env: default_env(),
            log_level: default_log_level(),
            mode: default_mode(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Report {
    #[serde(default = "default_report_interval")]
    pub interval_ms: u64,
}

impl Default for Report {
    fn default() -> Self {
        Self { interval_ms: default_report_interval() }
    }
}

/// one physical module
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceSetting {
    pub name: String,
    pub variant: Variant,
    /// target ip, falls back to the variant's factory address
    #[serde(default)]
    pub device_address: Option<String>,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_unit")]
    pub unit: ModbusUnitSize,
    #[serde(default = "default_polling_period")]
    pub polling_period_ms: u64,
    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,
    #[serde(default)]
    pub auto_connect: bool,
}

impl DeviceSetting {
    pub fn new(name: &str, variant: Variant) -> Self {
        Self {
            name: name.to_string(),
            variant,
            device_address: None,
            port: default_port(),
            unit: default_unit(),
            polling_period_ms: default_polling_period(),
            timeout_ms: default_timeout(),
            auto_connect: false,
        }
    }

    pub fn address(&self) -> String {
        match &self.device_address {
            Some(address) => address.clone(),
            None => self.variant.descriptor().default_address.to_string(),
        }
    }

    pub fn polling_period(&self) -> Duration {
        Duration::from_millis(self.polling_period_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub env: Env,
    #[serde(default)]
    pub report: Report,
    #[serde(default)]
    pub devices: Vec<DeviceSetting>,
}

impl Settings {
    /// load `config_{ENV}.toml` from the working directory
    pub fn load() -> Result<Self, ConfigError> {
        let env_name = match env::var("ENV") {
            Ok(e) => e,
            Err(_) => {
                log::warn!("no ENV set, use default: 'dev'");
                default_env()
            }
        };
        let file_path = format!("config_{}.toml", env_name);
        Self::from_file(&file_path)
    }

    pub fn from_file(file_path: &str) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::new(file_path, FileFormat::Toml))
            .add_source(Environment::with_prefix("ADAM").separator("__"))
            .build()?
            .try_deserialize::<Self>()?
            .validate()
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::from_str(content, FileFormat::Toml))
            .build()?
            .try_deserialize::<Self>()?
            .validate()
    }

    /// reject periods the workers cannot run with, a zero interval would never tick
    fn validate(self) -> Result<Self, ConfigError> {
        if self.report.interval_ms == 0 {
            return Err(ConfigError::Message("report.interval_ms must be greater than 0".to_string()));
        }
        for device in &self.devices {
            if device.polling_period_ms == 0 {
                return Err(ConfigError::Message(format!(
                    "device {}: polling_period_ms must be greater than 0",
                    device.name
                )));
            }
            if device.timeout_ms == 0 {
                return Err(ConfigError::Message(format!(
                    "device {}: timeout_ms must be greater than 0",
                    device.name
                )));
            }
        }
        Ok(self)
    }

    pub fn is_dummy(&self) -> bool {
        self.env.mode == "dummy"
    }
}

fn default_env() -> String {
    String::from("dev")
}

fn default_log_level() -> String {
    String::from("info")
}

fn default_mode() -> String {
    String::from("real")
}

fn default_report_interval() -> u64 {
    5000
}

fn default_port() -> u16 {
    DEFAULT_MODBUS_PORT
}

fn default_unit() -> ModbusUnitSize {
    1
}

fn default_polling_period() -> u64 {
    500
}

fn default_timeout() -> u64 {
    1000
}
