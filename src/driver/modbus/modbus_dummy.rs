//! in-memory modbus module
//! used when `mode = "dummy"` and by the tests: serves coils and holding registers from a map,
//! records every write, and can be told to fail

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::prelude::*;
use super::traits::{ModbusConnector, ModbusTransport};
use crate::common::error::DriverError;
use crate::trace;

const LOG_TAG: &str = "modbus_dummy";
/// only the most recent writes are kept, older ones are dropped first
pub const WRITE_LOG_CAPACITY: usize = 1024;

/// a write as it went over the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteRecord {
    Coil { address: ModbusAddrSize, word: u16 },
    Coils { address: ModbusAddrSize, values: Vec<bool> },
    Register { address: ModbusAddrSize, value: u16 },
    Registers { address: ModbusAddrSize, values: Vec<u16> },
}

#[derive(Debug, Default)]
struct DummyBank {
    coils: HashMap<ModbusAddrSize, bool>,
    registers: HashMap<ModbusAddrSize, u16>,
    writes: VecDeque<WriteRecord>,
    read_count: usize,
    // (op, start address) pairs that fail until cleared
    failing: HashSet<(&'static str, ModbusAddrSize)>,
    offline: bool,
    stall: Option<Duration>,
}

impl DummyBank {
    fn record(&mut self, write: WriteRecord) {
        if self.writes.len() == WRITE_LOG_CAPACITY {
            self.writes.pop_front();
        }
        self.writes.push_back(write);
    }
}

/// shared handle on one simulated module
#[derive(Debug, Clone, Default)]
pub struct DummyModule {
    bank: Arc<Mutex<DummyBank>>,
}

impl DummyModule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_coils(&self, address: ModbusAddrSize, values: &[bool]) {
        let mut bank = self.bank.lock();
        for (i, value) in values.iter().enumerate() {
            bank.coils.insert(address + i as ModbusAddrSize, *value);
        }
    }

    pub fn set_registers(&self, address: ModbusAddrSize, values: &[u16]) {
        let mut bank = self.bank.lock();
        for (i, value) in values.iter().enumerate() {
            bank.registers.insert(address + i as ModbusAddrSize, *value);
        }
    }

    pub fn coil(&self, address: ModbusAddrSize) -> bool {
        self.bank.lock().coils.get(&address).copied().unwrap_or(false)
    }

    pub fn register(&self, address: ModbusAddrSize) -> u16 {
        self.bank.lock().registers.get(&address).copied().unwrap_or(0)
    }

    pub fn writes(&self) -> Vec<WriteRecord> {
        self.bank.lock().writes.iter().cloned().collect()
    }

    pub fn clear_writes(&self) {
        self.bank.lock().writes.clear();
    }

    pub fn read_count(&self) -> usize {
        self.bank.lock().read_count
    }

    /// make every `op` starting at `address` fail, op is the transport method name
    pub fn fail_on(&self, op: &'static str, address: ModbusAddrSize) {
        self.bank.lock().failing.insert((op, address));
    }

    pub fn clear_failures(&self) {
        self.bank.lock().failing.clear();
    }

    /// offline modules refuse connections and fail every operation
    pub fn set_offline(&self, offline: bool) {
        self.bank.lock().offline = offline;
    }

    /// delay every operation, used to trip transport timeouts
    pub fn set_stall(&self, stall: Option<Duration>) {
        self.bank.lock().stall = stall;
    }

    fn check(&self, op: &'static str, address: ModbusAddrSize) -> Result<(), DriverError> {
        let bank = self.bank.lock();
        if bank.offline {
            return Err(DriverError::Io {
                op,
                address,
                cause: "dummy module offline".to_string(),
            });
        }
        if bank.failing.contains(&(op, address)) {
            return Err(DriverError::Io {
                op,
                address,
                cause: "dummy failure injected".to_string(),
            });
        }
        Ok(())
    }

    async fn stall(&self) {
        let stall = self.bank.lock().stall;
        if let Some(duration) = stall {
            tokio::time::sleep(duration).await;
        }
    }
}

pub struct DummyTransport {
    module: DummyModule,
}

#[async_trait]
impl ModbusTransport for DummyTransport {
    async fn read_coils(
        &mut self,
        address: ModbusAddrSize,
        count: ModbusAddrSize,
    ) -> Result<Vec<bool>, DriverError> {
        self.module.stall().await;
        self.module.check("read_coils", address)?;
        trace!(LOG_TAG, "read coils, address: {}, count: {}", address, count);
        let mut bank = self.module.bank.lock();
        bank.read_count += 1;
        Ok((address..address + count)
            .map(|a| bank.coils.get(&a).copied().unwrap_or(false))
            .collect())
    }

    async fn read_holding_registers(
        &mut self,
        address: ModbusAddrSize,
        count: ModbusAddrSize,
    ) -> Result<Vec<u16>, DriverError> {
        self.module.stall().await;
        self.module.check("read_holding_registers", address)?;
        trace!(LOG_TAG, "read holding registers, address: {}, count: {}", address, count);
        let mut bank = self.module.bank.lock();
        bank.read_count += 1;
        Ok((address..address + count)
            .map(|a| bank.registers.get(&a).copied().unwrap_or(0))
            .collect())
    }

    async fn write_single_coil(
        &mut self,
        address: ModbusAddrSize,
        value: bool,
    ) -> Result<(), DriverError> {
        self.module.stall().await;
        self.module.check("write_single_coil", address)?;
        let mut bank = self.module.bank.lock();
        bank.coils.insert(address, value);
        let word = if value { COIL_ON } else { COIL_OFF };
        bank.record(WriteRecord::Coil { address, word });
        Ok(())
    }

    async fn write_multiple_coils(
        &mut self,
        address: ModbusAddrSize,
        values: &[bool],
    ) -> Result<(), DriverError> {
        self.module.stall().await;
        self.module.check("write_multiple_coils", address)?;
        let mut bank = self.module.bank.lock();
        for (i, value) in values.iter().enumerate() {
            bank.coils.insert(address + i as ModbusAddrSize, *value);
        }
        bank.record(WriteRecord::Coils {
            address,
            values: values.to_vec(),
        });
        Ok(())
    }

    async fn write_single_register(
        &mut self,
        address: ModbusAddrSize,
        value: u16,
    ) -> Result<(), DriverError> {
        self.module.stall().await;
        self.module.check("write_single_register", address)?;
        let mut bank = self.module.bank.lock();
        bank.registers.insert(address, value);
        bank.record(WriteRecord::Register { address, value });
        Ok(())
    }

    async fn write_multiple_registers(
        &mut self,
        address: ModbusAddrSize,
        values: &[u16],
    ) -> Result<(), DriverError> {
        self.module.stall().await;
        self.module.check("write_multiple_registers", address)?;
        let mut bank = self.module.bank.lock();
        for (i, value) in values.iter().enumerate() {
            bank.registers.insert(address + i as ModbusAddrSize, *value);
        }
        bank.record(WriteRecord::Registers {
            address,
            values: values.to_vec(),
        });
        Ok(())
    }
}

/// hands out transports bound to one `DummyModule`
#[derive(Debug, Clone, Default)]
pub struct DummyConnector {
    module: DummyModule,
}

impl DummyConnector {
    pub fn new(module: DummyModule) -> Self {
        Self { module }
    }

    pub fn module(&self) -> &DummyModule {
        &self.module
    }
}

#[async_trait]
impl ModbusConnector for DummyConnector {
    async fn connect(
        &self,
        address: &str,
        port: u16,
        unit: ModbusUnitSize,
    ) -> Result<Box<dyn ModbusTransport>, DriverError> {
        if self.module.bank.lock().offline {
            return Err(DriverError::Connect {
                address: format!("{}:{}", address, port),
                cause: "dummy module offline".to_string(),
            });
        }
        trace!(LOG_TAG, "dummy connect, target: {}:{}, unit: {}", address, port, unit);
        Ok(Box::new(DummyTransport {
            module: self.module.clone(),
        }))
    }
}
