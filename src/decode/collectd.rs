//! `/v1/collectd` JSON body: the standard collectd write-http schema. One
//! element in the top-level array expands to `values.len()` datapoints.

use serde::Deserialize;

use super::Decoder;
use crate::model::{Datapoint, DecodedItems, Dimensions, MetricType, MetricValue};

#[derive(Deserialize)]
struct WireElement {
    values: Vec<f64>,
    dstypes: Vec<String>,
    dsnames: Vec<String>,
    time: f64,
    #[serde(default)]
    host: Option<String>,
    plugin: String,
    #[serde(default)]
    plugin_instance: Option<String>,
    #[serde(rename = "type")]
    type_: String,
    #[serde(default)]
    type_instance: Option<String>,
}

pub struct CollectdDecoder;

impl Decoder for CollectdDecoder {
    fn protocol(&self) -> &'static str {
        "collectd"
    }

    fn decode(&self, body: &[u8]) -> Result<DecodedItems, String> {
        let elements: Vec<WireElement> = serde_json::from_slice(body).map_err(|e| e.to_string())?;
        if elements.is_empty() {
            return Err("empty collectd payload".into());
        }

        let mut datapoints = Vec::new();
        for element in elements {
            if element.values.len() != element.dstypes.len()
                || element.values.len() != element.dsnames.len()
            {
                return Err("values/dstypes/dsnames length mismatch".into());
            }

            let timestamp = (element.time * 1000.0).round() as i64;

            let mut dimensions = Dimensions::new();
            if let Some(host) = &element.host {
                dimensions.insert("host".into(), host.clone());
            }
            dimensions.insert("plugin".into(), element.plugin.clone());
            if let Some(instance) = &element.plugin_instance {
                dimensions.insert("plugin_instance".into(), instance.clone());
            }

            for i in 0..element.values.len() {
                let metric = build_metric_name(&element, i);
                let metric_type = metric_type_from_dstype(&element.dstypes[i]);
                datapoints.push(Datapoint {
                    metric,
                    dimensions: dimensions.clone(),
                    value: MetricValue::Float(element.values[i]),
                    metric_type,
                    timestamp,
                });
            }
        }

        Ok(DecodedItems::Datapoints(datapoints))
    }
}

fn build_metric_name(element: &WireElement, index: usize) -> String {
    let mut name = element.plugin.clone();
    if let Some(instance) = &element.plugin_instance
        && !instance.is_empty()
    {
        name.push('.');
        name.push_str(instance);
    }
    name.push('.');
    name.push_str(&element.type_);
    if let Some(instance) = &element.type_instance
        && !instance.is_empty()
    {
        name.push('.');
        name.push_str(instance);
    }
    let dsname = &element.dsnames[index];
    if dsname != "value" {
        name.push('.');
        name.push_str(dsname);
    }
    name
}

fn metric_type_from_dstype(dstype: &str) -> MetricType {
    match dstype {
        "counter" | "derive" => MetricType::Counter,
        "absolute" => MetricType::CumulativeCounter,
        _ => MetricType::Gauge,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_body() -> &'static str {
        r#"[{
            "values": [1.0, 2.0],
            "dstypes": ["gauge", "counter"],
            "dsnames": ["value", "rx"],
            "time": 1.5,
            "interval": 10.0,
            "host": "h1",
            "plugin": "cpu",
            "plugin_instance": "0",
            "type": "load",
            "type_instance": "short"
        }]"#
    }

    #[test]
    fn expands_one_element_into_n_datapoints() {
        let DecodedItems::Datapoints(dps) = CollectdDecoder.decode(sample_body().as_bytes()).unwrap() else {
            panic!("expected datapoints")
        };
        assert_eq!(dps.len(), 2);
    }

    #[test]
    fn metric_name_omits_dsname_value() {
        let DecodedItems::Datapoints(dps) = CollectdDecoder.decode(sample_body().as_bytes()).unwrap() else {
            panic!("expected datapoints")
        };
        assert_eq!(dps[0].metric, "cpu.0.load.short");
        assert_eq!(dps[1].metric, "cpu.0.load.short.rx");
    }

    #[test]
    fn metric_type_mapping() {
        let DecodedItems::Datapoints(dps) = CollectdDecoder.decode(sample_body().as_bytes()).unwrap() else {
            panic!("expected datapoints")
        };
        assert_eq!(dps[0].metric_type, MetricType::Gauge);
        assert_eq!(dps[1].metric_type, MetricType::Counter);
    }

    #[test]
    fn timestamp_is_milliseconds() {
        let DecodedItems::Datapoints(dps) = CollectdDecoder.decode(sample_body().as_bytes()).unwrap() else {
            panic!("expected datapoints")
        };
        assert_eq!(dps[0].timestamp, 1500);
    }

    #[test]
    fn dimensions_carry_host_plugin_instance() {
        let DecodedItems::Datapoints(dps) = CollectdDecoder.decode(sample_body().as_bytes()).unwrap() else {
            panic!("expected datapoints")
        };
        assert_eq!(dps[0].dimensions.get("host"), Some(&"h1".to_string()));
        assert_eq!(dps[0].dimensions.get("plugin"), Some(&"cpu".to_string()));
        assert_eq!(dps[0].dimensions.get("plugin_instance"), Some(&"0".to_string()));
    }

    #[test]
    fn rejects_length_mismatch() {
        let body = r#"[{
            "values": [1.0],
            "dstypes": ["gauge", "counter"],
            "dsnames": ["value"],
            "time": 1.0,
            "plugin": "cpu",
            "type": "load"
        }]"#;
        assert!(CollectdDecoder.decode(body.as_bytes()).is_err());
    }
}
