pub mod modbus;
pub mod adam;
