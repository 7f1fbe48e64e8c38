//! ADAM-6200 Modbus/TCP I/O modules as polled devices with typed attributes and commands

pub mod common;
pub mod driver;
pub mod device_controller;
pub mod entity;
