use async_trait::async_trait;

use super::prelude::*;
use crate::common::error::DriverError;

/// an opened modbus link to one module
/// implementations are not expected to be safe for concurrent use, callers serialize access
#[async_trait]
pub trait ModbusTransport: Send {
    async fn read_coils(
        &mut self,
        address: ModbusAddrSize,
        count: ModbusAddrSize,
    ) -> Result<Vec<bool>, DriverError>;

    async fn read_holding_registers(
        &mut self,
        address: ModbusAddrSize,
        count: ModbusAddrSize,
    ) -> Result<Vec<u16>, DriverError>;

    async fn write_single_coil(
        &mut self,
        address: ModbusAddrSize,
        value: bool,
    ) -> Result<(), DriverError>;

    async fn write_multiple_coils(
        &mut self,
        address: ModbusAddrSize,
        values: &[bool],
    ) -> Result<(), DriverError>;

    async fn write_single_register(
        &mut self,
        address: ModbusAddrSize,
        value: u16,
    ) -> Result<(), DriverError>;

    async fn write_multiple_registers(
        &mut self,
        address: ModbusAddrSize,
        values: &[u16],
    ) -> Result<(), DriverError>;
}

/// opens transports, one per connect command
#[async_trait]
pub trait ModbusConnector: Send + Sync {
    async fn connect(
        &self,
        address: &str,
        port: u16,
        unit: ModbusUnitSize,
    ) -> Result<Box<dyn ModbusTransport>, DriverError>;
}
