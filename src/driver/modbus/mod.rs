//! modbus/tcp transport boundary
//! the rest of the crate only talks to a module through `DeviceConnection`

pub mod traits;
pub mod modbus_tcp;
pub mod modbus_dummy;
pub mod modbus_connection;

pub mod prelude {
    pub type ModbusAddrSize = u16;
    pub type ModbusUnitSize = u8;

    pub const DEFAULT_MODBUS_PORT: u16 = 502;

    /// wire word of a coil written ON (function code 05)
    pub const COIL_ON: u16 = 0xFF00;
    pub const COIL_OFF: u16 = 0x0000;
}
