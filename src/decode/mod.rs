//! Decoders as a small capability set: each wire format is a stateless
//! unit struct implementing [`Decoder`] (`parse(body) -> items | error`,
//! plus a name), rather than routing dispatch through reflection.
//! [`DecoderTable`] resolves JSON vs. protobuf by content-type at
//! request time.

pub mod collectd;
pub mod json_v1;
pub mod json_v2;
pub mod json_v2_event;
pub mod proto_v1;
pub mod proto_v2;
pub mod proto_v2_event;

use axum::http::HeaderMap;
use axum::http::header::CONTENT_TYPE;

use crate::model::{Dimensions, MetricValue};

/// One wire-format parser. Stateless and process-lived.
pub trait Decoder: Send + Sync {
    fn protocol(&self) -> &'static str;
    fn decode(&self, body: &[u8]) -> Result<crate::model::DecodedItems, String>;
}

pub fn is_protobuf_content_type(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.contains("protobuf") || ct.contains("octet-stream"))
}

pub struct DecoderTable {
    v1_json: json_v1::JsonV1Decoder,
    v1_proto: proto_v1::ProtoV1Decoder,
    v2_json: json_v2::JsonV2Decoder,
    v2_proto: proto_v2::ProtoV2Decoder,
    v2_event_json: json_v2_event::JsonV2EventDecoder,
    v2_event_proto: proto_v2_event::ProtoV2EventDecoder,
    collectd: collectd::CollectdDecoder,
}

impl DecoderTable {
    pub fn new() -> Self {
        Self {
            v1_json: json_v1::JsonV1Decoder,
            v1_proto: proto_v1::ProtoV1Decoder,
            v2_json: json_v2::JsonV2Decoder,
            v2_proto: proto_v2::ProtoV2Decoder,
            v2_event_json: json_v2_event::JsonV2EventDecoder,
            v2_event_proto: proto_v2_event::ProtoV2EventDecoder,
            collectd: collectd::CollectdDecoder,
        }
    }

    pub fn datapoint_v1(&self, protobuf: bool) -> &dyn Decoder {
        if protobuf { &self.v1_proto } else { &self.v1_json }
    }

    pub fn datapoint_v2(&self, protobuf: bool) -> &dyn Decoder {
        if protobuf { &self.v2_proto } else { &self.v2_json }
    }

    pub fn event_v2(&self, protobuf: bool) -> &dyn Decoder {
        if protobuf { &self.v2_event_proto } else { &self.v2_event_json }
    }

    pub fn collectd(&self) -> &dyn Decoder {
        &self.collectd
    }
}

impl Default for DecoderTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared by the JSON decoders: a bare `serde_json::Value` scalar maps to
/// one of the three `MetricValue` variants; anything else is a decode error.
pub(crate) fn value_from_json(value: &serde_json::Value) -> Result<MetricValue, String> {
    match value {
        serde_json::Value::Number(n) if n.is_i64() || n.is_u64() => {
            Ok(MetricValue::Int(n.as_i64().ok_or("value out of i64 range")?))
        }
        serde_json::Value::Number(n) => {
            Ok(MetricValue::Float(n.as_f64().ok_or("invalid numeric value")?))
        }
        serde_json::Value::String(s) => Ok(MetricValue::Str(s.clone())),
        other => Err(format!("unsupported value type: {other}")),
    }
}

pub(crate) fn dimensions_with(pairs: impl IntoIterator<Item = (String, String)>) -> Dimensions {
    pairs.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_from_json_maps_int_float_string() {
        assert_eq!(
            value_from_json(&serde_json::json!(1)).unwrap(),
            MetricValue::Int(1)
        );
        assert_eq!(
            value_from_json(&serde_json::json!(1.5)).unwrap(),
            MetricValue::Float(1.5)
        );
        assert_eq!(
            value_from_json(&serde_json::json!("s")).unwrap(),
            MetricValue::Str("s".into())
        );
    }

    #[test]
    fn value_from_json_rejects_bool() {
        assert!(value_from_json(&serde_json::json!(true)).is_err());
    }

    #[test]
    fn content_type_detection() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, "application/x-protobuf".parse().unwrap());
        assert!(is_protobuf_content_type(&headers));

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, "application/json".parse().unwrap());
        assert!(!is_protobuf_content_type(&headers));
    }
}
