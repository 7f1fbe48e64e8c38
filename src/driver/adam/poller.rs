//! PollingCycle
//! one poll reads every block of the descriptor's plan, in order, and only then maps the payloads
//! onto a copy of the current channels. a failed read aborts the cycle and nothing of it is kept.

use super::channel::ChannelSet;
use super::codec::decode_wide;
use super::variant::{Field, FieldSlice, Layout, ReadBlock, Space, VariantDescriptor};
use crate::common::error::DriverError;
use crate::driver::modbus::modbus_connection::DeviceConnection;
use crate::trace;

const LOG_TAG: &str = "poller";

#[derive(Debug)]
enum BlockData {
    Coils(Vec<bool>),
    Registers(Vec<u16>),
}

/// run one cycle against `conn`, returning the refreshed channels
/// `current` is the base for every field the plan does not cover
pub async fn poll_once(
    conn: &mut DeviceConnection,
    descriptor: &VariantDescriptor,
    current: &ChannelSet,
) -> Result<ChannelSet, DriverError> {
    let mut payloads = Vec::with_capacity(descriptor.poll_plan.len());
    for block in descriptor.poll_plan {
        payloads.push(read_block(conn, block).await?);
    }

    let mut channels = current.clone();
    for (block, data) in descriptor.poll_plan.iter().zip(payloads.iter()) {
        for slice in block.slices {
            apply_slice(&mut channels, slice, data);
        }
    }
    if let Some(scale) = descriptor.scale {
        channels.decode_analog(&scale);
    }
    trace!(
        LOG_TAG,
        "poll finished, model: {}, blocks: {}",
        descriptor.model,
        descriptor.poll_plan.len()
    );
    Ok(channels)
}

async fn read_block(conn: &mut DeviceConnection, block: &ReadBlock) -> Result<BlockData, DriverError> {
    match block.space {
        Space::Coils => Ok(BlockData::Coils(conn.read_coils(block.address, block.count).await?)),
        Space::HoldingRegisters => Ok(BlockData::Registers(
            conn.read_holding_registers(block.address, block.count).await?,
        )),
    }
}

fn apply_slice(channels: &mut ChannelSet, slice: &FieldSlice, data: &BlockData) {
    for ch in 0..slice.channels {
        match (slice.layout, data) {
            (Layout::Bits, BlockData::Coils(bits)) => {
                if let Some(value) = bits.get(slice.offset + ch) {
                    set_bit(channels, slice.field, ch, *value);
                }
            }
            (Layout::Words { stride }, BlockData::Registers(words)) => {
                if let Some(value) = words.get(slice.offset + ch * stride) {
                    set_word(channels, slice.field, ch, *value);
                }
            }
            (Layout::Wide, BlockData::Registers(words)) => {
                let at = slice.offset + 2 * ch;
                if let (Some(low), Some(high)) = (words.get(at), words.get(at + 1)) {
                    set_wide(channels, slice.field, ch, decode_wide(*low, *high));
                }
            }
            // bit slices only ever sit in coil blocks
            _ => {}
        }
    }
}

fn set_bit(channels: &mut ChannelSet, field: Field, ch: usize, value: bool) {
    match field {
        Field::OpenCircuit | Field::LowAlarm | Field::HighAlarm => {
            if let Some(c) = channels.analog.get_mut(ch) {
                match field {
                    Field::OpenCircuit => c.open_circuit = value,
                    Field::LowAlarm => c.low_alarm = value,
                    _ => c.high_alarm = value,
                }
            }
        }
        Field::DiValue | Field::DiCounterEnabled | Field::DiOverflowClear | Field::DiLatch => {
            if let Some(c) = channels.digital_inputs.get_mut(ch) {
                match field {
                    Field::DiValue => c.value = value,
                    Field::DiCounterEnabled => c.counter_enabled = value,
                    Field::DiOverflowClear => c.overflow_clear_enabled = value,
                    _ => c.latch_closed = value,
                }
            }
        }
        Field::DoValue => {
            if let Some(c) = channels.digital_outputs.get_mut(ch) {
                c.value = value;
            }
        }
        _ => {}
    }
}

fn set_word(channels: &mut ChannelSet, field: Field, ch: usize, value: u16) {
    if field == Field::DiEventStatus {
        if let Some(c) = channels.digital_inputs.get_mut(ch) {
            c.event_status = value;
        }
        return;
    }
    if let Some(c) = channels.analog.get_mut(ch) {
        match field {
            Field::AnalogRaw => c.raw_value = value,
            Field::HistMaxRaw => c.hist_max_raw = value,
            Field::HistMinRaw => c.hist_min_raw = value,
            Field::AnalogStatus => c.status = value,
            Field::AnalogTriggerStatus => c.trigger_status = value,
            Field::TypeCode => c.type_code = value,
            Field::StartupRaw => c.startup_raw = value,
            Field::SafetyRaw => c.safety_raw = value,
            _ => {}
        }
    }
}

fn set_wide(channels: &mut ChannelSet, field: Field, ch: usize, value: u32) {
    if field == Field::DiCounter {
        if let Some(c) = channels.digital_inputs.get_mut(ch) {
            c.counter = value;
        }
        return;
    }
    if let Some(c) = channels.digital_outputs.get_mut(ch) {
        match field {
            Field::DoPulseLow => c.pulse_low_ms = value,
            Field::DoPulseHigh => c.pulse_high_ms = value,
            Field::DoAbsolutePulse => c.absolute_pulse = value,
            Field::DoIncrementalPulse => c.incremental_pulse = value,
            _ => {}
        }
    }
}
