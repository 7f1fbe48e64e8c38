//! modbus/tcp transport on top of tokio-modbus

use async_trait::async_trait;
use tokio_modbus::{client::Context, prelude::*, Slave};

use super::prelude::*;
use super::traits::{ModbusConnector, ModbusTransport};
use crate::common::error::DriverError;
use crate::debug;

const LOG_TAG: &str = "modbus_tcp";

pub struct ModbusTcpTransport {
    ctx: Context,
}

#[async_trait]
impl ModbusTransport for ModbusTcpTransport {
    async fn read_coils(
        &mut self,
        address: ModbusAddrSize,
        count: ModbusAddrSize,
    ) -> Result<Vec<bool>, DriverError> {
        let ret = self
            .ctx
            .read_coils(address, count)
            .await
            .map_err(|e| io_error("read_coils", address, e))?;
        Ok(ret)
    }

    async fn read_holding_registers(
        &mut self,
        address: ModbusAddrSize,
        count: ModbusAddrSize,
    ) -> Result<Vec<u16>, DriverError> {
        let ret = self
            .ctx
            .read_holding_registers(address, count)
            .await
            .map_err(|e| io_error("read_holding_registers", address, e))?;
        Ok(ret)
    }

    async fn write_single_coil(
        &mut self,
        address: ModbusAddrSize,
        value: bool,
    ) -> Result<(), DriverError> {
        self.ctx
            .write_single_coil(address, value)
            .await
            .map_err(|e| io_error("write_single_coil", address, e))?;
        Ok(())
    }

    async fn write_multiple_coils(
        &mut self,
        address: ModbusAddrSize,
        values: &[bool],
    ) -> Result<(), DriverError> {
        self.ctx
            .write_multiple_coils(address, values)
            .await
            .map_err(|e| io_error("write_multiple_coils", address, e))?;
        Ok(())
    }

    async fn write_single_register(
        &mut self,
        address: ModbusAddrSize,
        value: u16,
    ) -> Result<(), DriverError> {
        self.ctx
            .write_single_register(address, value)
            .await
            .map_err(|e| io_error("write_single_register", address, e))?;
        Ok(())
    }

    async fn write_multiple_registers(
        &mut self,
        address: ModbusAddrSize,
        values: &[u16],
    ) -> Result<(), DriverError> {
        self.ctx
            .write_multiple_registers(address, values)
            .await
            .map_err(|e| io_error("write_multiple_registers", address, e))?;
        Ok(())
    }
}

fn io_error(op: &'static str, address: ModbusAddrSize, e: std::io::Error) -> DriverError {
    DriverError::Io {
        op,
        address,
        cause: e.to_string(),
    }
}

/// resolves the configured host and opens a tcp session with the module
#[derive(Debug, Default)]
pub struct ModbusTcpConnector;

#[async_trait]
impl ModbusConnector for ModbusTcpConnector {
    async fn connect(
        &self,
        address: &str,
        port: u16,
        unit: ModbusUnitSize,
    ) -> Result<Box<dyn ModbusTransport>, DriverError> {
        let target = format!("{}:{}", address, port);
        let connect_error = |cause: String| DriverError::Connect {
            address: target.clone(),
            cause,
        };

        let socket_addr = tokio::net::lookup_host((address, port))
            .await
            .map_err(|e| connect_error(e.to_string()))?
            .next()
            .ok_or_else(|| connect_error("address resolved to nothing".to_string()))?;

        debug!(LOG_TAG, "opening modbus tcp session, target: {}, unit: {}", socket_addr, unit);
        let ctx = tcp::connect_slave(socket_addr, Slave(unit))
            .await
            .map_err(|e| connect_error(e.to_string()))?;
        Ok(Box::new(ModbusTcpTransport { ctx }))
    }
}
