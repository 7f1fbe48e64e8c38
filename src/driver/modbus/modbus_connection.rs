//! DeviceConnection
//! owns the transport handle of one device and gates every register access:
//! - every call is bounded by the configured timeout, a timeout is reported like any other io failure
//! - short responses are rejected here so callers can slice blocks without checking
//! - close is idempotent

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use super::prelude::*;
use super::traits::{ModbusConnector, ModbusTransport};
use crate::common::error::DriverError;
use crate::{debug, info};

const LOG_TAG: &str = "modbus_connection";

pub struct DeviceConnection {
    connector: Arc<dyn ModbusConnector>,
    transport: Option<Box<dyn ModbusTransport>>,
    timeout: Duration,
    unit: ModbusUnitSize,
}

impl DeviceConnection {
    pub fn new(connector: Arc<dyn ModbusConnector>, unit: ModbusUnitSize, timeout: Duration) -> Self {
        Self {
            connector,
            transport: None,
            timeout,
            unit,
        }
    }

    pub fn is_open(&self) -> bool {
        self.transport.is_some()
    }

    /// open the transport, an already open one is released first
    pub async fn connect(&mut self, address: &str, port: u16) -> Result<(), DriverError> {
        self.close();
        let target = format!("{}:{}", address, port);
        let timeout_ms = self.timeout.as_millis() as u64;
        let transport = tokio::time::timeout(
            self.timeout,
            self.connector.connect(address, port, self.unit),
        )
        .await
        .map_err(|_| DriverError::Connect {
            address: target.clone(),
            cause: format!("timed out after {} ms", timeout_ms),
        })??;
        self.transport = Some(transport);
        info!(LOG_TAG, "connection opened, target: {}", target);
        Ok(())
    }

    /// release the transport, safe on a closed or never opened connection
    pub fn close(&mut self) {
        if self.transport.take().is_some() {
            info!(LOG_TAG, "connection closed");
        }
    }

    pub async fn read_coils(
        &mut self,
        address: ModbusAddrSize,
        count: ModbusAddrSize,
    ) -> Result<Vec<bool>, DriverError> {
        let timeout = self.timeout;
        let transport = self.transport.as_mut().ok_or(DriverError::NotConnected)?;
        let values = bounded(
            timeout,
            "read_coils",
            address,
            transport.read_coils(address, count),
        )
        .await?;
        // coil responses are padded up to a whole byte
        check_len("read_coils", address, count, values.len())?;
        Ok(values.into_iter().take(count as usize).collect())
    }

    pub async fn read_holding_registers(
        &mut self,
        address: ModbusAddrSize,
        count: ModbusAddrSize,
    ) -> Result<Vec<u16>, DriverError> {
        let timeout = self.timeout;
        let transport = self.transport.as_mut().ok_or(DriverError::NotConnected)?;
        let values = bounded(
            timeout,
            "read_holding_registers",
            address,
            transport.read_holding_registers(address, count),
        )
        .await?;
        check_len("read_holding_registers", address, count, values.len())?;
        Ok(values)
    }

    pub async fn write_coil(&mut self, address: ModbusAddrSize, value: bool) -> Result<(), DriverError> {
        let timeout = self.timeout;
        let transport = self.transport.as_mut().ok_or(DriverError::NotConnected)?;
        debug!(LOG_TAG, "write coil, address: {}, value: {}", address, value);
        bounded(
            timeout,
            "write_single_coil",
            address,
            transport.write_single_coil(address, value),
        )
        .await
    }

    pub async fn write_coils(&mut self, address: ModbusAddrSize, values: &[bool]) -> Result<(), DriverError> {
        let timeout = self.timeout;
        let transport = self.transport.as_mut().ok_or(DriverError::NotConnected)?;
        debug!(LOG_TAG, "write coils, address: {}, values: {:?}", address, values);
        bounded(
            timeout,
            "write_multiple_coils",
            address,
            transport.write_multiple_coils(address, values),
        )
        .await
    }

    pub async fn write_register(&mut self, address: ModbusAddrSize, value: u16) -> Result<(), DriverError> {
        let timeout = self.timeout;
        let transport = self.transport.as_mut().ok_or(DriverError::NotConnected)?;
        debug!(LOG_TAG, "write register, address: {}, value: {}", address, value);
        bounded(
            timeout,
            "write_single_register",
            address,
            transport.write_single_register(address, value),
        )
        .await
    }

    pub async fn write_registers(&mut self, address: ModbusAddrSize, values: &[u16]) -> Result<(), DriverError> {
        let timeout = self.timeout;
        let transport = self.transport.as_mut().ok_or(DriverError::NotConnected)?;
        debug!(LOG_TAG, "write registers, address: {}, values: {:?}", address, values);
        bounded(
            timeout,
            "write_multiple_registers",
            address,
            transport.write_multiple_registers(address, values),
        )
        .await
    }
}

impl Drop for DeviceConnection {
    fn drop(&mut self) {
        self.close();
    }
}

async fn bounded<T, F>(
    timeout: Duration,
    op: &'static str,
    address: ModbusAddrSize,
    fut: F,
) -> Result<T, DriverError>
where
    F: Future<Output = Result<T, DriverError>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(DriverError::Timeout {
            op,
            address,
            timeout_ms: timeout.as_millis() as u64,
        }),
    }
}

fn check_len(
    op: &'static str,
    address: ModbusAddrSize,
    expected: ModbusAddrSize,
    actual: usize,
) -> Result<(), DriverError> {
    if actual < expected as usize {
        return Err(DriverError::ShortResponse {
            op,
            address,
            expected: expected as usize,
            actual,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::modbus::modbus_dummy::{DummyConnector, DummyModule, WriteRecord};

    fn connection(module: &DummyModule, timeout_ms: u64) -> DeviceConnection {
        DeviceConnection::new(
            Arc::new(DummyConnector::new(module.clone())),
            1,
            Duration::from_millis(timeout_ms),
        )
    }

    #[tokio::test]
    async fn test_io_requires_connection() {
        let module = DummyModule::new();
        let mut conn = connection(&module, 100);
        assert_eq!(conn.read_coils(0, 4).await, Err(DriverError::NotConnected));
        assert_eq!(conn.write_register(0, 1).await, Err(DriverError::NotConnected));
        assert!(module.writes().is_empty());
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let module = DummyModule::new();
        let mut conn = connection(&module, 100);
        conn.close();
        conn.connect("dummy", 502).await.unwrap();
        assert!(conn.is_open());
        conn.close();
        conn.close();
        assert!(!conn.is_open());
    }

    #[tokio::test]
    async fn test_connect_failure_is_returned() {
        let module = DummyModule::new();
        module.set_offline(true);
        let mut conn = connection(&module, 100);
        match conn.connect("dummy", 502).await {
            Err(DriverError::Connect { address, .. }) => assert_eq!(address, "dummy:502"),
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(!conn.is_open());
    }

    #[tokio::test]
    async fn test_stalled_read_times_out() {
        let module = DummyModule::new();
        let mut conn = connection(&module, 20);
        conn.connect("dummy", 502).await.unwrap();
        module.set_stall(Some(Duration::from_millis(500)));
        match conn.read_holding_registers(0, 8).await {
            Err(DriverError::Timeout { op, address, timeout_ms }) => {
                assert_eq!(op, "read_holding_registers");
                assert_eq!(address, 0);
                assert_eq!(timeout_ms, 20);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_writes_pass_through() {
        let module = DummyModule::new();
        let mut conn = connection(&module, 100);
        conn.connect("dummy", 502).await.unwrap();
        conn.write_registers(16, &[0x0010, 0x0001]).await.unwrap();
        conn.write_coils(16, &[true, false]).await.unwrap();
        assert_eq!(
            module.writes(),
            vec![
                WriteRecord::Registers { address: 16, values: vec![0x0010, 0x0001] },
                WriteRecord::Coils { address: 16, values: vec![true, false] },
            ]
        );
    }
}
