//! `/v1/datapoint` JSON body: a bare array of `{source, metric, value}`.
//! Type always defaults to GAUGE; this wire format predates per-datapoint
//! metric types.

use serde::Deserialize;

use super::{Decoder, dimensions_with, value_from_json};
use crate::model::{Datapoint, DecodedItems, MetricType};

#[derive(Deserialize)]
struct WireDatapoint {
    source: Option<String>,
    metric: String,
    value: serde_json::Value,
}

pub struct JsonV1Decoder;

impl Decoder for JsonV1Decoder {
    fn protocol(&self) -> &'static str {
        "json_v1"
    }

    fn decode(&self, body: &[u8]) -> Result<DecodedItems, String> {
        let wire: Vec<WireDatapoint> = serde_json::from_slice(body).map_err(|e| e.to_string())?;
        if wire.is_empty() {
            return Err("empty datapoint list".into());
        }

        let datapoints = wire
            .into_iter()
            .map(|w| {
                let dimensions = match w.source {
                    Some(source) => dimensions_with([("source".to_string(), source)]),
                    None => Default::default(),
                };
                Ok(Datapoint {
                    metric: w.metric,
                    dimensions,
                    value: value_from_json(&w.value)?,
                    metric_type: MetricType::Gauge,
                    timestamp: 0,
                })
            })
            .collect::<Result<Vec<_>, String>>()?;

        Ok(DecodedItems::Datapoints(datapoints))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_array_with_source() {
        let body = br#"[{"source":"host1","metric":"cpu","value":42}]"#;
        let items = JsonV1Decoder.decode(body).unwrap();
        let DecodedItems::Datapoints(dps) = items else {
            panic!("expected datapoints")
        };
        assert_eq!(dps.len(), 1);
        assert_eq!(dps[0].metric, "cpu");
        assert_eq!(dps[0].dimensions.get("source"), Some(&"host1".to_string()));
        assert_eq!(dps[0].metric_type, MetricType::Gauge);
    }

    #[test]
    fn decodes_without_source() {
        let body = br#"[{"metric":"cpu","value":1.5}]"#;
        let items = JsonV1Decoder.decode(body).unwrap();
        let DecodedItems::Datapoints(dps) = items else {
            panic!("expected datapoints")
        };
        assert!(dps[0].dimensions.is_empty());
    }

    #[test]
    fn rejects_empty_array() {
        assert!(JsonV1Decoder.decode(b"[]").is_err());
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(JsonV1Decoder.decode(b"not json").is_err());
    }
}
