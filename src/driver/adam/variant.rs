//! per-module descriptors
//! a descriptor is everything that differs between the ADAM modules: channel counts, the ordered
//! poll plan (which blocks to read and where each field sits in them), the write addresses of
//! every attribute and the coil base of every command.
//! addresses are the modules' wire contract, do not change them.

use serde_derive::{Deserialize, Serialize};

use super::codec::{AnalogScale, TypeCode};
use crate::driver::modbus::prelude::ModbusAddrSize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Variant {
    #[serde(rename = "ADAM-6217")]
    Adam6217,
    #[serde(rename = "ADAM-6224")]
    Adam6224,
    #[serde(rename = "ADAM-6250")]
    Adam6250,
    #[serde(rename = "ADAM-6251")]
    Adam6251,
    #[serde(rename = "ADAM-6256")]
    Adam6256,
}

impl Variant {
    pub const ALL: [Variant; 5] = [
        Variant::Adam6217,
        Variant::Adam6224,
        Variant::Adam6250,
        Variant::Adam6251,
        Variant::Adam6256,
    ];

    pub fn descriptor(self) -> &'static VariantDescriptor {
        match self {
            Variant::Adam6217 => &ADAM_6217,
            Variant::Adam6224 => &ADAM_6224,
            Variant::Adam6250 => &ADAM_6250,
            Variant::Adam6251 => &ADAM_6251,
            Variant::Adam6256 => &ADAM_6256,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Space {
    Coils,
    HoldingRegisters,
}

/// cache slot a slice of a read block lands in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    AnalogRaw,
    HistMaxRaw,
    HistMinRaw,
    AnalogStatus,
    AnalogTriggerStatus,
    TypeCode,
    StartupRaw,
    SafetyRaw,
    OpenCircuit,
    LowAlarm,
    HighAlarm,
    DiValue,
    DiEventStatus,
    DiCounter,
    DiCounterEnabled,
    DiOverflowClear,
    DiLatch,
    DoValue,
    DoPulseLow,
    DoPulseHigh,
    DoAbsolutePulse,
    DoIncrementalPulse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// one coil per channel
    Bits,
    /// one register per channel, `stride` registers apart
    Words { stride: usize },
    /// two registers per channel, low word first
    Wide,
}

#[derive(Debug, Clone, Copy)]
pub struct FieldSlice {
    pub field: Field,
    pub offset: usize,
    pub channels: usize,
    pub layout: Layout,
}

impl FieldSlice {
    /// number of block entries the slice covers
    pub fn span(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        match self.layout {
            Layout::Bits => self.channels,
            Layout::Words { stride } => (self.channels - 1) * stride + 1,
            Layout::Wide => self.channels * 2,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ReadBlock {
    pub space: Space,
    pub address: ModbusAddrSize,
    pub count: ModbusAddrSize,
    pub slices: &'static [FieldSlice],
}

/// exposed per-channel attribute roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Attribute {
    AnalogInput,
    AnalogOutput,
    TypeCode,
    Status,
    HistMax,
    HistMin,
    StartupValue,
    SafetyValue,
    OpenCircuitFlag,
    HighAlarmFlag,
    LowAlarmFlag,
    DigitalInput,
    EventStatus,
    Counter,
    CounterEnabled,
    LatchClosed,
    OverflowClearEnabled,
    DigitalOutput,
    PulseLowWidth,
    PulseHighWidth,
    AbsolutePulse,
    IncrementalPulse,
}

/// which channel vector an attribute indexes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bank {
    Analog,
    DigitalInput,
    DigitalOutput,
}

impl Attribute {
    pub const ALL: [Attribute; 22] = [
        Attribute::AnalogInput,
        Attribute::AnalogOutput,
        Attribute::TypeCode,
        Attribute::Status,
        Attribute::HistMax,
        Attribute::HistMin,
        Attribute::StartupValue,
        Attribute::SafetyValue,
        Attribute::OpenCircuitFlag,
        Attribute::HighAlarmFlag,
        Attribute::LowAlarmFlag,
        Attribute::DigitalInput,
        Attribute::EventStatus,
        Attribute::Counter,
        Attribute::CounterEnabled,
        Attribute::LatchClosed,
        Attribute::OverflowClearEnabled,
        Attribute::DigitalOutput,
        Attribute::PulseLowWidth,
        Attribute::PulseHighWidth,
        Attribute::AbsolutePulse,
        Attribute::IncrementalPulse,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Attribute::AnalogInput => "AnalogInput",
            Attribute::AnalogOutput => "AnalogOutput",
            Attribute::TypeCode => "TypeCode",
            Attribute::Status => "Status",
            Attribute::HistMax => "HistMax",
            Attribute::HistMin => "HistMin",
            Attribute::StartupValue => "StartupValue",
            Attribute::SafetyValue => "SafetyValue",
            Attribute::OpenCircuitFlag => "OpenCircuitFlag",
            Attribute::HighAlarmFlag => "HighAlarmFlag",
            Attribute::LowAlarmFlag => "LowAlarmFlag",
            Attribute::DigitalInput => "DigitalInput",
            Attribute::EventStatus => "EventStatus",
            Attribute::Counter => "Counter",
            Attribute::CounterEnabled => "CounterEnabled",
            Attribute::LatchClosed => "LatchClosed",
            Attribute::OverflowClearEnabled => "OverflowClearEnabled",
            Attribute::DigitalOutput => "DigitalOutput",
            Attribute::PulseLowWidth => "PulseLowWidth",
            Attribute::PulseHighWidth => "PulseHighWidth",
            Attribute::AbsolutePulse => "AbsolutePulse",
            Attribute::IncrementalPulse => "IncrementalPulse",
        }
    }

    pub fn from_name(name: &str) -> Option<Attribute> {
        Attribute::ALL.iter().copied().find(|a| a.name() == name)
    }

    pub fn bank(self) -> Bank {
        match self {
            Attribute::AnalogInput
            | Attribute::AnalogOutput
            | Attribute::TypeCode
            | Attribute::Status
            | Attribute::HistMax
            | Attribute::HistMin
            | Attribute::StartupValue
            | Attribute::SafetyValue
            | Attribute::OpenCircuitFlag
            | Attribute::HighAlarmFlag
            | Attribute::LowAlarmFlag => Bank::Analog,
            Attribute::DigitalInput
            | Attribute::EventStatus
            | Attribute::Counter
            | Attribute::CounterEnabled
            | Attribute::LatchClosed
            | Attribute::OverflowClearEnabled => Bank::DigitalInput,
            Attribute::DigitalOutput
            | Attribute::PulseLowWidth
            | Attribute::PulseHighWidth
            | Attribute::AbsolutePulse
            | Attribute::IncrementalPulse => Bank::DigitalOutput,
        }
    }
}

/// where a write of channel `ch` goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteTarget {
    /// coil `base + ch`
    Coil { base: ModbusAddrSize },
    /// register `base + ch`
    Register { base: ModbusAddrSize },
    /// registers `base + 2ch` and `base + 2ch + 1`, low word first
    WideRegister { base: ModbusAddrSize },
}

impl WriteTarget {
    pub fn address(&self, channel: usize) -> ModbusAddrSize {
        let ch = channel as ModbusAddrSize;
        match *self {
            WriteTarget::Coil { base } | WriteTarget::Register { base } => base + ch,
            WriteTarget::WideRegister { base } => base + 2 * ch,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AttributeSpec {
    pub attribute: Attribute,
    /// None for read-only attributes
    pub write: Option<WriteTarget>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    ResetHistMax,
    ResetHistMin,
    ClearCounter,
}

impl Command {
    pub fn name(self) -> &'static str {
        match self {
            Command::ResetHistMax => "ResetHistMax",
            Command::ResetHistMin => "ResetHistMin",
            Command::ClearCounter => "ClearCounter",
        }
    }

    /// channel vector the command's index is checked against
    pub fn bank(self) -> Bank {
        match self {
            Command::ResetHistMax | Command::ResetHistMin => Bank::Analog,
            Command::ClearCounter => Bank::DigitalInput,
        }
    }
}

/// single coil pulse at `coil_base + channel`
#[derive(Debug, Clone, Copy)]
pub struct CommandSpec {
    pub command: Command,
    pub coil_base: ModbusAddrSize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalogKind {
    Input,
    Output,
}

#[derive(Debug)]
pub struct VariantDescriptor {
    pub variant: Variant,
    pub model: &'static str,
    pub description: &'static str,
    pub default_address: &'static str,
    pub analog_kind: AnalogKind,
    pub analog_channels: usize,
    pub digital_inputs: usize,
    pub digital_outputs: usize,
    pub scale: Option<AnalogScale>,
    pub poll_plan: &'static [ReadBlock],
    pub attributes: &'static [AttributeSpec],
    pub commands: &'static [CommandSpec],
    pub supports_disconnect: bool,
}

impl VariantDescriptor {
    pub fn channel_count(&self, bank: Bank) -> usize {
        match bank {
            Bank::Analog => self.analog_channels,
            Bank::DigitalInput => self.digital_inputs,
            Bank::DigitalOutput => self.digital_outputs,
        }
    }

    pub fn attribute(&self, attribute: Attribute) -> Option<&AttributeSpec> {
        self.attributes.iter().find(|a| a.attribute == attribute)
    }

    pub fn command(&self, command: Command) -> Option<&CommandSpec> {
        self.commands.iter().find(|c| c.command == command)
    }
}

const fn bits(field: Field, offset: usize, channels: usize) -> FieldSlice {
    FieldSlice { field, offset, channels, layout: Layout::Bits }
}

const fn words(field: Field, offset: usize, channels: usize) -> FieldSlice {
    FieldSlice { field, offset, channels, layout: Layout::Words { stride: 1 } }
}

const fn strided(field: Field, offset: usize, channels: usize, stride: usize) -> FieldSlice {
    FieldSlice { field, offset, channels, layout: Layout::Words { stride } }
}

const fn wide(field: Field, offset: usize, channels: usize) -> FieldSlice {
    FieldSlice { field, offset, channels, layout: Layout::Wide }
}

const fn read_only(attribute: Attribute) -> AttributeSpec {
    AttributeSpec { attribute, write: None }
}

const fn writable(attribute: Attribute, target: WriteTarget) -> AttributeSpec {
    AttributeSpec { attribute, write: Some(target) }
}

// ================= ADAM-6217: 8 analog inputs ====================

static ADAM_6217: VariantDescriptor = VariantDescriptor {
    variant: Variant::Adam6217,
    model: "ADAM-6217",
    description: "8-ch isolated analog input",
    default_address: "192.168.120.56",
    analog_kind: AnalogKind::Input,
    analog_channels: 8,
    digital_inputs: 0,
    digital_outputs: 0,
    scale: Some(AnalogScale { raw_max: 65535, type_codes: &TypeCode::ALL }),
    poll_plan: &[
        ReadBlock {
            space: Space::Coils,
            address: 120,
            count: 32,
            slices: &[
                bits(Field::OpenCircuit, 0, 8),
                bits(Field::LowAlarm, 10, 8),
                bits(Field::HighAlarm, 20, 8),
            ],
        },
        ReadBlock {
            space: Space::HoldingRegisters,
            address: 0,
            count: 32,
            slices: &[
                words(Field::AnalogRaw, 0, 8),
                words(Field::HistMaxRaw, 10, 8),
                words(Field::HistMinRaw, 20, 8),
            ],
        },
        // status is a 32-bit word pair per channel, the low word carries the flags
        ReadBlock {
            space: Space::HoldingRegisters,
            address: 100,
            count: 16,
            slices: &[strided(Field::AnalogStatus, 0, 8, 2)],
        },
        ReadBlock {
            space: Space::HoldingRegisters,
            address: 200,
            count: 8,
            slices: &[words(Field::TypeCode, 0, 8)],
        },
    ],
    attributes: &[
        read_only(Attribute::AnalogInput),
        writable(Attribute::TypeCode, WriteTarget::Register { base: 200 }),
        read_only(Attribute::Status),
        read_only(Attribute::HistMax),
        read_only(Attribute::HistMin),
        read_only(Attribute::OpenCircuitFlag),
        read_only(Attribute::HighAlarmFlag),
        read_only(Attribute::LowAlarmFlag),
    ],
    commands: &[
        CommandSpec { command: Command::ResetHistMax, coil_base: 100 },
        CommandSpec { command: Command::ResetHistMin, coil_base: 110 },
    ],
    supports_disconnect: true,
};

// ================= ADAM-6224: 4 analog outputs, 4 digital inputs ====================

static ADAM_6224: VariantDescriptor = VariantDescriptor {
    variant: Variant::Adam6224,
    model: "ADAM-6224",
    description: "4-ch isolated analog output, 4-ch digital input",
    default_address: "192.168.120.55",
    analog_kind: AnalogKind::Output,
    analog_channels: 4,
    digital_inputs: 4,
    digital_outputs: 0,
    scale: Some(AnalogScale { raw_max: 4095, type_codes: &TypeCode::OUTPUT }),
    poll_plan: &[
        ReadBlock {
            space: Space::Coils,
            address: 0,
            count: 4,
            slices: &[bits(Field::DiValue, 0, 4)],
        },
        ReadBlock {
            space: Space::HoldingRegisters,
            address: 0,
            count: 4,
            slices: &[words(Field::AnalogRaw, 0, 4)],
        },
        ReadBlock {
            space: Space::HoldingRegisters,
            address: 100,
            count: 8,
            slices: &[
                strided(Field::AnalogStatus, 0, 4, 2),
                strided(Field::AnalogTriggerStatus, 1, 4, 2),
            ],
        },
        ReadBlock {
            space: Space::HoldingRegisters,
            address: 110,
            count: 4,
            slices: &[words(Field::DiEventStatus, 0, 4)],
        },
        ReadBlock {
            space: Space::HoldingRegisters,
            address: 200,
            count: 4,
            slices: &[words(Field::TypeCode, 0, 4)],
        },
        ReadBlock {
            space: Space::HoldingRegisters,
            address: 400,
            count: 4,
            slices: &[words(Field::StartupRaw, 0, 4)],
        },
        ReadBlock {
            space: Space::HoldingRegisters,
            address: 410,
            count: 4,
            slices: &[words(Field::SafetyRaw, 0, 4)],
        },
    ],
    attributes: &[
        read_only(Attribute::DigitalInput),
        read_only(Attribute::EventStatus),
        writable(Attribute::AnalogOutput, WriteTarget::Register { base: 0 }),
        read_only(Attribute::Status),
        writable(Attribute::TypeCode, WriteTarget::Register { base: 200 }),
        writable(Attribute::StartupValue, WriteTarget::Register { base: 400 }),
        writable(Attribute::SafetyValue, WriteTarget::Register { base: 410 }),
    ],
    commands: &[],
    supports_disconnect: false,
};

// ================= ADAM-6250: 8 digital inputs, 7 digital outputs ====================

static ADAM_6250: VariantDescriptor = VariantDescriptor {
    variant: Variant::Adam6250,
    model: "ADAM-6250",
    description: "15-ch isolated digital I/O (8 inputs, 7 outputs)",
    default_address: "192.168.120.57",
    analog_kind: AnalogKind::Input,
    analog_channels: 0,
    digital_inputs: 8,
    digital_outputs: 7,
    scale: None,
    poll_plan: &[
        ReadBlock {
            space: Space::Coils,
            address: 0,
            count: 8,
            slices: &[bits(Field::DiValue, 0, 8)],
        },
        // 32..40 counter run, 40..48 clear counter, 48..56 clear overflow, 56..64 latch
        ReadBlock {
            space: Space::Coils,
            address: 32,
            count: 32,
            slices: &[
                bits(Field::DiCounterEnabled, 0, 8),
                bits(Field::DiOverflowClear, 16, 8),
                bits(Field::DiLatch, 24, 8),
            ],
        },
        ReadBlock {
            space: Space::Coils,
            address: 16,
            count: 7,
            slices: &[bits(Field::DoValue, 0, 7)],
        },
        ReadBlock {
            space: Space::HoldingRegisters,
            address: 0,
            count: 16,
            slices: &[wide(Field::DiCounter, 0, 8)],
        },
        ReadBlock {
            space: Space::HoldingRegisters,
            address: 16,
            count: 14,
            slices: &[wide(Field::DoPulseLow, 0, 7)],
        },
        ReadBlock {
            space: Space::HoldingRegisters,
            address: 30,
            count: 14,
            slices: &[wide(Field::DoPulseHigh, 0, 7)],
        },
        ReadBlock {
            space: Space::HoldingRegisters,
            address: 44,
            count: 14,
            slices: &[wide(Field::DoAbsolutePulse, 0, 7)],
        },
        ReadBlock {
            space: Space::HoldingRegisters,
            address: 58,
            count: 14,
            slices: &[wide(Field::DoIncrementalPulse, 0, 7)],
        },
    ],
    attributes: &[
        read_only(Attribute::DigitalInput),
        read_only(Attribute::Counter),
        writable(Attribute::CounterEnabled, WriteTarget::Coil { base: 32 }),
        writable(Attribute::OverflowClearEnabled, WriteTarget::Coil { base: 48 }),
        writable(Attribute::LatchClosed, WriteTarget::Coil { base: 56 }),
        writable(Attribute::DigitalOutput, WriteTarget::Coil { base: 16 }),
        writable(Attribute::PulseLowWidth, WriteTarget::WideRegister { base: 16 }),
        writable(Attribute::PulseHighWidth, WriteTarget::WideRegister { base: 30 }),
        writable(Attribute::AbsolutePulse, WriteTarget::WideRegister { base: 44 }),
        writable(Attribute::IncrementalPulse, WriteTarget::WideRegister { base: 58 }),
    ],
    commands: &[CommandSpec { command: Command::ClearCounter, coil_base: 40 }],
    supports_disconnect: false,
};

// ================= ADAM-6251: 16 digital inputs ====================

static ADAM_6251: VariantDescriptor = VariantDescriptor {
    variant: Variant::Adam6251,
    model: "ADAM-6251",
    description: "16-ch isolated digital input",
    default_address: "192.168.120.58",
    analog_kind: AnalogKind::Input,
    analog_channels: 0,
    digital_inputs: 16,
    digital_outputs: 0,
    scale: None,
    poll_plan: &[
        ReadBlock {
            space: Space::Coils,
            address: 0,
            count: 16,
            slices: &[bits(Field::DiValue, 0, 16)],
        },
        // 32..48 counter run, 48..64 clear counter, 64..80 clear overflow, 80..96 latch
        ReadBlock {
            space: Space::Coils,
            address: 32,
            count: 64,
            slices: &[
                bits(Field::DiCounterEnabled, 0, 16),
                bits(Field::DiOverflowClear, 32, 16),
                bits(Field::DiLatch, 48, 16),
            ],
        },
        ReadBlock {
            space: Space::HoldingRegisters,
            address: 0,
            count: 32,
            slices: &[wide(Field::DiCounter, 0, 16)],
        },
    ],
    attributes: &[
        read_only(Attribute::DigitalInput),
        read_only(Attribute::Counter),
        writable(Attribute::CounterEnabled, WriteTarget::Coil { base: 32 }),
        writable(Attribute::OverflowClearEnabled, WriteTarget::Coil { base: 64 }),
        writable(Attribute::LatchClosed, WriteTarget::Coil { base: 80 }),
    ],
    commands: &[CommandSpec { command: Command::ClearCounter, coil_base: 48 }],
    supports_disconnect: true,
};

// ================= ADAM-6256: 16 digital outputs ====================

static ADAM_6256: VariantDescriptor = VariantDescriptor {
    variant: Variant::Adam6256,
    model: "ADAM-6256",
    description: "16-ch isolated digital output",
    default_address: "192.168.120.59",
    analog_kind: AnalogKind::Input,
    analog_channels: 0,
    digital_inputs: 0,
    digital_outputs: 16,
    scale: None,
    poll_plan: &[
        ReadBlock {
            space: Space::Coils,
            address: 16,
            count: 16,
            slices: &[bits(Field::DoValue, 0, 16)],
        },
        // one read covers all four pulse tables
        ReadBlock {
            space: Space::HoldingRegisters,
            address: 0,
            count: 128,
            slices: &[
                wide(Field::DoPulseLow, 0, 16),
                wide(Field::DoPulseHigh, 32, 16),
                wide(Field::DoAbsolutePulse, 64, 16),
                wide(Field::DoIncrementalPulse, 96, 16),
            ],
        },
    ],
    attributes: &[
        writable(Attribute::DigitalOutput, WriteTarget::Coil { base: 16 }),
        writable(Attribute::PulseLowWidth, WriteTarget::WideRegister { base: 0 }),
        writable(Attribute::PulseHighWidth, WriteTarget::WideRegister { base: 32 }),
        writable(Attribute::AbsolutePulse, WriteTarget::WideRegister { base: 64 }),
        writable(Attribute::IncrementalPulse, WriteTarget::WideRegister { base: 96 }),
    ],
    commands: &[],
    supports_disconnect: true,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slices_fit_their_blocks() {
        for variant in Variant::ALL {
            let descriptor = variant.descriptor();
            assert_eq!(descriptor.variant, variant);
            for block in descriptor.poll_plan {
                for slice in block.slices {
                    assert!(
                        slice.offset + slice.span() <= block.count as usize,
                        "{} block {} slice {:?} overruns",
                        descriptor.model,
                        block.address,
                        slice.field
                    );
                    let bits = slice.layout == Layout::Bits;
                    assert_eq!(bits, block.space == Space::Coils);
                }
            }
        }
    }

    #[test]
    fn test_slices_match_channel_counts() {
        for variant in Variant::ALL {
            let descriptor = variant.descriptor();
            for block in descriptor.poll_plan {
                for slice in block.slices {
                    let bank = match slice.field {
                        Field::DiValue
                        | Field::DiEventStatus
                        | Field::DiCounter
                        | Field::DiCounterEnabled
                        | Field::DiOverflowClear
                        | Field::DiLatch => Bank::DigitalInput,
                        Field::DoValue
                        | Field::DoPulseLow
                        | Field::DoPulseHigh
                        | Field::DoAbsolutePulse
                        | Field::DoIncrementalPulse => Bank::DigitalOutput,
                        _ => Bank::Analog,
                    };
                    assert_eq!(slice.channels, descriptor.channel_count(bank));
                }
            }
        }
    }

    #[test]
    fn test_channel_counts() {
        let counts: Vec<(usize, usize, usize)> = Variant::ALL
            .iter()
            .map(|v| {
                let d = v.descriptor();
                (d.analog_channels, d.digital_inputs, d.digital_outputs)
            })
            .collect();
        assert_eq!(counts, vec![(8, 0, 0), (4, 4, 0), (0, 8, 7), (0, 16, 0), (0, 0, 16)]);
    }

    #[test]
    fn test_attribute_names_round_trip() {
        for attribute in Attribute::ALL {
            assert_eq!(Attribute::from_name(attribute.name()), Some(attribute));
        }
        assert_eq!(Attribute::from_name("Voltage"), None);
    }

    #[test]
    fn test_write_addresses() {
        assert_eq!(WriteTarget::Coil { base: 100 }.address(3), 103);
        assert_eq!(WriteTarget::WideRegister { base: 30 }.address(2), 34);
        let d = Variant::Adam6217.descriptor();
        assert_eq!(d.command(Command::ResetHistMin).map(|c| c.coil_base), Some(110));
        assert!(d.attribute(Attribute::AnalogOutput).is_none());
    }
}
