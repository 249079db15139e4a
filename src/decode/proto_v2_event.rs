//! `/v2/event` protobuf body: a stream of length-delimited `Event`
//! messages.

use bytes::{Buf, Bytes};
use prost::Message;

use super::Decoder;
use crate::model::DecodedItems;
use crate::proto;

pub struct ProtoV2EventDecoder;

impl Decoder for ProtoV2EventDecoder {
    fn protocol(&self) -> &'static str {
        "proto_v2_event"
    }

    fn decode(&self, body: &[u8]) -> Result<DecodedItems, String> {
        let mut buf = Bytes::copy_from_slice(body);
        let mut events = Vec::new();

        while buf.has_remaining() {
            let wire =
                proto::Event::decode_length_delimited(&mut buf).map_err(|e| e.to_string())?;
            events.push(proto::wire_event_to_domain(&wire));
        }

        if events.is_empty() {
            return Err("empty event stream".into());
        }

        Ok(DecodedItems::Events(events))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_length_delimited_event_stream() {
        let event = proto::Event {
            event_type: "deploy".into(),
            dimensions: vec![],
            properties: vec![],
            category: Some(proto::EventCategory::Job as i32),
            timestamp: Some(7),
        };
        let mut body = Vec::new();
        event.encode_length_delimited(&mut body).unwrap();

        let DecodedItems::Events(events) = ProtoV2EventDecoder.decode(&body).unwrap() else {
            panic!("expected events")
        };
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "deploy");
    }

    #[test]
    fn rejects_empty_stream() {
        assert!(ProtoV2EventDecoder.decode(&[]).is_err());
    }
}
