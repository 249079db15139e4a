//! `/v2/datapoint` JSON body: an object keyed by metric type
//! (`gauge`/`counter`/`cumulative_counter`), each value an array of
//! `{metric, value, timestamp, dimensions}`.

use serde::Deserialize;

use super::{Decoder, value_from_json};
use crate::model::{Datapoint, DecodedItems, Dimensions, MetricType};

#[derive(Deserialize)]
struct WireEntry {
    metric: String,
    value: serde_json::Value,
    #[serde(default)]
    timestamp: i64,
    #[serde(default)]
    dimensions: Dimensions,
}

#[derive(Deserialize, Default)]
struct WireBody {
    #[serde(default)]
    gauge: Vec<WireEntry>,
    #[serde(default)]
    counter: Vec<WireEntry>,
    #[serde(default, rename = "cumulative_counter")]
    cumulative_counter: Vec<WireEntry>,
}

pub struct JsonV2Decoder;

impl Decoder for JsonV2Decoder {
    fn protocol(&self) -> &'static str {
        "json_v2"
    }

    fn decode(&self, body: &[u8]) -> Result<DecodedItems, String> {
        let wire: WireBody = serde_json::from_slice(body).map_err(|e| e.to_string())?;

        let mut datapoints = Vec::new();
        for (entries, metric_type) in [
            (wire.gauge, MetricType::Gauge),
            (wire.counter, MetricType::Counter),
            (wire.cumulative_counter, MetricType::CumulativeCounter),
        ] {
            for entry in entries {
                datapoints.push(Datapoint {
                    metric: entry.metric,
                    dimensions: entry.dimensions,
                    value: value_from_json(&entry.value)?,
                    metric_type,
                    timestamp: entry.timestamp,
                });
            }
        }

        if datapoints.is_empty() {
            return Err("empty datapoint payload".into());
        }

        Ok(DecodedItems::Datapoints(datapoints))
    }
}
