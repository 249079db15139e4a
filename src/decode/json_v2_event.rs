//! `/v2/event` JSON body: a single `{eventType, category, dimensions,
//! properties, timestamp}` object, or an array of them.

use serde::Deserialize;

use super::Decoder;
use crate::model::{DecodedItems, Event};

#[derive(Deserialize)]
#[serde(untagged)]
enum WireBody {
    One(Event),
    Many(Vec<Event>),
}

pub struct JsonV2EventDecoder;

impl Decoder for JsonV2EventDecoder {
    fn protocol(&self) -> &'static str {
        "json_v2_event"
    }

    fn decode(&self, body: &[u8]) -> Result<DecodedItems, String> {
        let wire: WireBody = serde_json::from_slice(body).map_err(|e| e.to_string())?;
        let events = match wire {
            WireBody::One(e) => vec![e],
            WireBody::Many(events) => events,
        };

        if events.is_empty() {
            return Err("empty event list".into());
        }

        Ok(DecodedItems::Events(events))
    }
}
