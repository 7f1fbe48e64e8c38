//! AttributeBridge, read side
//! attributes are exposed per channel as `Role_i` (e.g. `TypeCode_3`), the list is built from the
//! variant descriptor. reads are served from the channel cache only, they never touch the network.
//! the write side lives on `AdamDevice` since it needs the connection.

use serde_derive::{Deserialize, Serialize};

use super::channel::{ChannelCache, DeviceSnapshot};
use super::codec::{decode_status_bits, AI_STATUS, AO_STATUS, AO_TRIGGER_STATUS, DI_EVENT_STATUS};
use super::state::DeviceState;
use super::variant::{AnalogKind, Attribute, VariantDescriptor};
use crate::common::error::{DeviceError, ValidationError};

/// typed value crossing the attribute boundary
/// untagged variants are tried in order, whole numbers come in as `ULong`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Bool(bool),
    ULong(u64),
    Double(f64),
    Text(String),
}

impl AttributeValue {
    pub fn as_f64(&self, attribute: &str) -> Result<f64, ValidationError> {
        match self {
            AttributeValue::Double(v) => Ok(*v),
            AttributeValue::ULong(v) => Ok(*v as f64),
            _ => Err(wrong_type(attribute, "double")),
        }
    }

    pub fn as_bool(&self, attribute: &str) -> Result<bool, ValidationError> {
        match self {
            AttributeValue::Bool(v) => Ok(*v),
            _ => Err(wrong_type(attribute, "bool")),
        }
    }

    /// 32-bit register pair value
    pub fn as_u32(&self, attribute: &str) -> Result<u32, ValidationError> {
        match self {
            AttributeValue::ULong(v) => u32::try_from(*v).map_err(|_| ValidationError::OutOfRange {
                value: *v as f64,
                min: 0.0,
                max: u32::MAX as f64,
                type_name: "uint32",
            }),
            _ => Err(wrong_type(attribute, "ulong")),
        }
    }

    pub fn as_text(&self, attribute: &str) -> Result<&str, ValidationError> {
        match self {
            AttributeValue::Text(v) => Ok(v.as_str()),
            _ => Err(wrong_type(attribute, "string")),
        }
    }
}

fn wrong_type(attribute: &str, expected: &'static str) -> ValidationError {
    ValidationError::WrongValueType {
        attribute: attribute.to_string(),
        expected,
    }
}

pub fn attribute_name(attribute: Attribute, channel: usize) -> String {
    format!("{}_{}", attribute.name(), channel)
}

/// split `Role_i` into its role and channel index
pub fn parse_attribute_name(name: &str) -> Result<(Attribute, usize), DeviceError> {
    let unknown = || DeviceError::UnknownAttribute(name.to_string());
    let (role, index) = name.rsplit_once('_').ok_or_else(unknown)?;
    let attribute = Attribute::from_name(role).ok_or_else(unknown)?;
    let channel = index.parse::<usize>().map_err(|_| unknown())?;
    Ok((attribute, channel))
}

/// every attribute name the variant exposes, in registration order
pub fn attribute_names(descriptor: &VariantDescriptor) -> Vec<String> {
    descriptor
        .attributes
        .iter()
        .flat_map(|spec| {
            let count = descriptor.channel_count(spec.attribute.bank());
            (0..count).map(move |ch| attribute_name(spec.attribute, ch))
        })
        .collect()
}

/// check that `attribute` exists on the variant and `channel` is in range
pub fn check_channel(
    descriptor: &VariantDescriptor,
    attribute: Attribute,
    channel: usize,
) -> Result<(), DeviceError> {
    if descriptor.attribute(attribute).is_none() {
        return Err(DeviceError::UnknownAttribute(attribute_name(attribute, channel)));
    }
    let count = descriptor.channel_count(attribute.bank());
    if channel >= count {
        return Err(ValidationError::ChannelOutOfRange {
            channel: channel as i64,
            count,
        }
        .into());
    }
    Ok(())
}

/// read-only view on one device, cheap to clone and safe to use from any thread
#[derive(Debug, Clone)]
pub struct DeviceView {
    descriptor: &'static VariantDescriptor,
    cache: ChannelCache,
}

impl DeviceView {
    pub fn new(descriptor: &'static VariantDescriptor, cache: ChannelCache) -> Self {
        Self { descriptor, cache }
    }

    pub fn descriptor(&self) -> &'static VariantDescriptor {
        self.descriptor
    }

    pub fn state(&self) -> DeviceState {
        self.cache.state()
    }

    pub fn status_message(&self) -> String {
        self.cache.status_message()
    }

    pub fn snapshot(&self) -> DeviceSnapshot {
        self.cache.snapshot()
    }

    pub fn attribute_names(&self) -> Vec<String> {
        attribute_names(self.descriptor)
    }

    pub fn is_writable(&self, attribute: Attribute) -> bool {
        self.descriptor
            .attribute(attribute)
            .map(|spec| spec.write.is_some())
            .unwrap_or(false)
    }

    pub fn read_by_name(&self, name: &str) -> Result<AttributeValue, DeviceError> {
        let (attribute, channel) = parse_attribute_name(name)?;
        self.read(attribute, channel)
    }

    /// run `f` against one consistent snapshot, the cache cannot be swapped while it runs
    pub fn with_snapshot<T>(&self, f: impl FnOnce(&DeviceSnapshot) -> T) -> T {
        self.cache.read(f)
    }

    /// cached value of one channel attribute
    /// stale values are served as is while the device is in FAULT
    pub fn read(&self, attribute: Attribute, channel: usize) -> Result<AttributeValue, DeviceError> {
        self.cache.read(|snapshot| self.read_from(snapshot, attribute, channel))
    }

    /// decode one attribute from an already captured snapshot
    pub fn read_from(
        &self,
        snapshot: &DeviceSnapshot,
        attribute: Attribute,
        channel: usize,
    ) -> Result<AttributeValue, DeviceError> {
        check_channel(self.descriptor, attribute, channel)?;
        let descriptor = self.descriptor;
        let channels = &snapshot.channels;
        let missing = || DeviceError::UnknownAttribute(attribute_name(attribute, channel));
        let analog = || channels.analog.get(channel).ok_or_else(missing);
        let input = || channels.digital_inputs.get(channel).ok_or_else(missing);
        let output = || channels.digital_outputs.get(channel).ok_or_else(missing);
        let value = match attribute {
            Attribute::AnalogInput | Attribute::AnalogOutput => AttributeValue::Double(analog()?.value),
            Attribute::TypeCode => {
                let scale = descriptor.scale.ok_or_else(missing)?;
                AttributeValue::Text(scale.decode_type_code(analog()?.type_code)?.to_string())
            }
            Attribute::Status => {
                let c = analog()?;
                match descriptor.analog_kind {
                    AnalogKind::Input => AttributeValue::Text(decode_status_bits(c.status, &AI_STATUS)?.to_string()),
                    AnalogKind::Output => AttributeValue::Text(format!(
                        "{} {}",
                        decode_status_bits(c.status, &AO_STATUS)?,
                        decode_status_bits(c.trigger_status, &AO_TRIGGER_STATUS)?
                    )),
                }
            }
            Attribute::HistMax => AttributeValue::Double(analog()?.hist_max),
            Attribute::HistMin => AttributeValue::Double(analog()?.hist_min),
            Attribute::StartupValue => AttributeValue::Double(analog()?.startup_value),
            Attribute::SafetyValue => AttributeValue::Double(analog()?.safety_value),
            Attribute::OpenCircuitFlag => AttributeValue::Bool(analog()?.open_circuit),
            Attribute::HighAlarmFlag => AttributeValue::Bool(analog()?.high_alarm),
            Attribute::LowAlarmFlag => AttributeValue::Bool(analog()?.low_alarm),
            Attribute::DigitalInput => AttributeValue::Bool(input()?.value),
            Attribute::EventStatus => {
                AttributeValue::Text(decode_status_bits(input()?.event_status, &DI_EVENT_STATUS)?.to_string())
            }
            Attribute::Counter => AttributeValue::ULong(input()?.counter as u64),
            Attribute::CounterEnabled => AttributeValue::Bool(input()?.counter_enabled),
            Attribute::LatchClosed => AttributeValue::Bool(input()?.latch_closed),
            Attribute::OverflowClearEnabled => AttributeValue::Bool(input()?.overflow_clear_enabled),
            Attribute::DigitalOutput => AttributeValue::Bool(output()?.value),
            Attribute::PulseLowWidth => AttributeValue::ULong(output()?.pulse_low_ms as u64),
            Attribute::PulseHighWidth => AttributeValue::ULong(output()?.pulse_high_ms as u64),
            Attribute::AbsolutePulse => AttributeValue::ULong(output()?.absolute_pulse as u64),
            Attribute::IncrementalPulse => AttributeValue::ULong(output()?.incremental_pulse as u64),
        };
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::error::LookupError;
    use crate::driver::adam::channel::ChannelSet;
    use crate::driver::adam::codec::TypeCode;
    use crate::driver::adam::variant::Variant;

    fn view(variant: Variant) -> DeviceView {
        let d = variant.descriptor();
        let cache = ChannelCache::new(
            ChannelSet::new(d.analog_channels, d.digital_inputs, d.digital_outputs),
            "",
        );
        DeviceView::new(d, cache)
    }

    #[test]
    fn test_attribute_names() {
        let names = attribute_names(Variant::Adam6217.descriptor());
        assert_eq!(names.len(), 8 * 8);
        assert_eq!(names[0], "AnalogInput_0");
        assert!(names.contains(&"HistMin_7".to_string()));
        assert!(!names.contains(&"AnalogInput_8".to_string()));

        let names = attribute_names(Variant::Adam6250.descriptor());
        assert!(names.contains(&"DigitalOutput_6".to_string()));
        assert!(!names.contains(&"DigitalOutput_7".to_string()));
        assert!(names.contains(&"Counter_7".to_string()));
    }

    #[test]
    fn test_parse_attribute_name() {
        assert_eq!(parse_attribute_name("TypeCode_3"), Ok((Attribute::TypeCode, 3)));
        for bad in ["TypeCode", "TypeCode_x", "Voltage_1", "_1", "TypeCode_-1"] {
            assert!(matches!(parse_attribute_name(bad), Err(DeviceError::UnknownAttribute(_))), "{}", bad);
        }
    }

    #[test]
    fn test_read_checks_variant_and_range() {
        let v = view(Variant::Adam6217);
        assert_eq!(v.read_by_name("AnalogInput_7"), Ok(AttributeValue::Double(0.0)));
        assert_eq!(
            v.read_by_name("AnalogInput_8"),
            Err(DeviceError::Validation(ValidationError::ChannelOutOfRange { channel: 8, count: 8 }))
        );
        assert!(matches!(v.read_by_name("DigitalOutput_0"), Err(DeviceError::UnknownAttribute(_))));
    }

    #[test]
    fn test_decoded_reads() {
        let v = view(Variant::Adam6224);
        v.cache.update_channels(|set| {
            set.analog[0].type_code = TypeCode::Voltage0To10V.raw();
            set.analog[0].status = 8;
            set.analog[0].trigger_status = 1;
            set.digital_inputs[2].event_status = 2;
        });
        assert_eq!(v.read_by_name("TypeCode_0"), Ok(AttributeValue::Text("0-10V".to_string())));
        assert_eq!(
            v.read_by_name("Status_0"),
            Ok(AttributeValue::Text("No Output Current DI triggered to Safety Value".to_string()))
        );
        assert_eq!(
            v.read_by_name("EventStatus_2"),
            Ok(AttributeValue::Text("Safety Value triggered".to_string()))
        );
        // a zero type code is not in the table, only that read fails
        assert_eq!(
            v.read_by_name("TypeCode_1"),
            Err(DeviceError::Lookup(LookupError::UnknownTypeCodeRaw(0)))
        );
        // both words clear, two blank labels around the separator
        assert_eq!(v.read_by_name("Status_1"), Ok(AttributeValue::Text("   ".to_string())));
        assert_eq!(v.read_by_name("EventStatus_0"), Ok(AttributeValue::Text(" ".to_string())));
    }

    #[test]
    fn test_value_conversions() {
        assert_eq!(AttributeValue::ULong(3).as_f64("x"), Ok(3.0));
        assert!(AttributeValue::ULong(u64::MAX).as_u32("x").is_err());
        assert_eq!(
            AttributeValue::Double(1.0).as_bool("DigitalOutput_0"),
            Err(ValidationError::WrongValueType { attribute: "DigitalOutput_0".to_string(), expected: "bool" })
        );
        assert!(view(Variant::Adam6256).is_writable(Attribute::PulseLowWidth));
        assert!(!view(Variant::Adam6217).is_writable(Attribute::HistMax));
    }
}
