//! device state data transmission object

use std::collections::BTreeMap;

use serde_derive::Serialize;

use crate::driver::adam::attribute::{parse_attribute_name, AttributeValue, DeviceView};
use crate::driver::adam::state::DeviceState;

const DEVICE_CLASS: &str = "adam";

/// what the reporting worker publishes for one device
#[derive(Debug, Clone, Serialize)]
pub struct DeviceStateDto {
    // device name from the config
    pub device_id: String,
    pub device_class: String,
    // module model, e.g. ADAM-6217
    pub device_type: String,
    pub state: DeviceState,
    pub status_message: String,
    pub last_update: Option<u64>,
    pub poll_count: u64,
    // attributes whose cached value cannot be decoded are left out
    pub attributes: BTreeMap<String, AttributeValue>,
}

impl DeviceStateDto {
    pub fn from_view(device_id: &str, view: &DeviceView) -> DeviceStateDto {
        // one lock for the whole report, so every attribute comes from the same poll batch
        view.with_snapshot(|snapshot| {
            let attributes = view
                .attribute_names()
                .into_iter()
                .filter_map(|name| {
                    let (attribute, channel) = parse_attribute_name(&name).ok()?;
                    let value = view.read_from(snapshot, attribute, channel).ok()?;
                    Some((name, value))
                })
                .collect();
            DeviceStateDto {
                device_id: device_id.to_string(),
                device_class: DEVICE_CLASS.to_string(),
                device_type: view.descriptor().model.to_string(),
                state: snapshot.state,
                status_message: snapshot.status_message.clone(),
                last_update: snapshot.last_update,
                poll_count: snapshot.poll_count,
                attributes,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::adam::channel::{ChannelCache, ChannelSet};
    use crate::driver::adam::variant::Variant;

    #[test]
    fn test_dto_to_json() {
        let cache = ChannelCache::new(ChannelSet::new(0, 0, 16), "ADAM-6256 enabled");
        cache.update_channels(|set| set.digital_outputs[3].value = true);
        let view = DeviceView::new(Variant::Adam6256.descriptor(), cache);

        let dto = DeviceStateDto::from_view("do_rack", &view);
        assert_eq!(dto.attributes.len(), 5 * 16);

        let json: serde_json::Value = serde_json::to_value(&dto).unwrap();
        assert_eq!(json["device_type"], "ADAM-6256");
        assert_eq!(json["state"], "STANDBY");
        assert_eq!(json["attributes"]["DigitalOutput_3"], true);
        assert_eq!(json["attributes"]["PulseLowWidth_0"], 0);
    }

    #[test]
    fn test_undecodable_attributes_left_out() {
        // a zero type code word has no name
        let cache = ChannelCache::new(ChannelSet::new(8, 0, 0), "");
        let view = DeviceView::new(Variant::Adam6217.descriptor(), cache);
        let dto = DeviceStateDto::from_view("ai_rack", &view);
        assert!(!dto.attributes.contains_key("TypeCode_0"));
        assert!(dto.attributes.contains_key("Status_0"));
        assert!(dto.attributes.contains_key("AnalogInput_0"));
    }

    #[test]
    fn test_report_never_mixes_poll_batches() {
        let cache = ChannelCache::new(ChannelSet::new(0, 0, 16), "");
        let view = DeviceView::new(Variant::Adam6256.descriptor(), cache.clone());

        let writer = std::thread::spawn(move || {
            for batch in 1..=20_000u32 {
                let mut set = ChannelSet::new(0, 0, 16);
                for output in set.digital_outputs.iter_mut() {
                    output.pulse_low_ms = batch;
                }
                cache.replace_channels(set);
            }
        });

        for _ in 0..500 {
            let dto = DeviceStateDto::from_view("do_rack", &view);
            let widths: Vec<&AttributeValue> = (0..16)
                .filter_map(|ch| dto.attributes.get(&format!("PulseLowWidth_{}", ch)))
                .collect();
            assert_eq!(widths.len(), 16);
            // every replace bumps the poll count by one, batch n carries widths n
            assert!(
                widths.iter().all(|w| **w == AttributeValue::ULong(dto.poll_count)),
                "poll count {} with widths {:?}",
                dto.poll_count,
                widths
            );
        }
        writer.join().unwrap();
    }
}
