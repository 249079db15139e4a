//! SignalFx-compatible v2 protobuf wire types, hand-derived with `prost`.
//!
//! Shared by the v2 protobuf decoders (decode) and the sink's upstream
//! egress (encode) — a batch drained from the queue is encoded with the
//! same `DataPointUploadMessage` / `EventUploadMessage` types a protobuf
//! submission is decoded from, so forwarding never needs a second schema.

use prost::Message;

#[derive(Clone, PartialEq, Message)]
pub struct Datum {
    #[prost(string, optional, tag = "1")]
    pub str_value: Option<String>,
    #[prost(double, optional, tag = "2")]
    pub double_value: Option<f64>,
    #[prost(int64, optional, tag = "3")]
    pub int_value: Option<i64>,
}

#[derive(Clone, PartialEq, Message)]
pub struct Dimension {
    #[prost(string, optional, tag = "1")]
    pub key: Option<String>,
    #[prost(string, optional, tag = "2")]
    pub value: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, prost::Enumeration)]
#[repr(i32)]
pub enum MetricType {
    Gauge = 0,
    Counter = 1,
    Enum = 2,
    CumulativeCounter = 3,
}

#[derive(Clone, PartialEq, Message)]
pub struct DataPoint {
    #[prost(string, optional, tag = "1")]
    pub source: Option<String>,
    #[prost(string, optional, tag = "2")]
    pub metric: Option<String>,
    #[prost(int64, optional, tag = "3")]
    pub timestamp: Option<i64>,
    #[prost(message, optional, tag = "4")]
    pub value: Option<Datum>,
    #[prost(enumeration = "MetricType", optional, tag = "5")]
    pub metric_type: Option<i32>,
    #[prost(message, repeated, tag = "6")]
    pub dimensions: Vec<Dimension>,
}

#[derive(Clone, PartialEq, Message)]
pub struct DataPointUploadMessage {
    #[prost(message, repeated, tag = "1")]
    pub datapoints: Vec<DataPoint>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, prost::Enumeration)]
#[repr(i32)]
pub enum EventCategory {
    Alert = 100000,
    Audit = 200000,
    Job = 300000,
    Collectd = 400000,
    ServiceDiscovery = 500000,
    Exception = 700000,
    UserDefined = 1000000,
    Agent = 2000000,
}

#[derive(Clone, PartialEq, Message)]
pub struct PropertyValue {
    #[prost(string, optional, tag = "1")]
    pub str_value: Option<String>,
    #[prost(double, optional, tag = "2")]
    pub double_value: Option<f64>,
    #[prost(int64, optional, tag = "3")]
    pub int_value: Option<i64>,
    #[prost(bool, optional, tag = "4")]
    pub bool_value: Option<bool>,
}

#[derive(Clone, PartialEq, Message)]
pub struct Property {
    #[prost(string, optional, tag = "1")]
    pub key: Option<String>,
    #[prost(message, optional, tag = "2")]
    pub value: Option<PropertyValue>,
}

#[derive(Clone, PartialEq, Message)]
pub struct Event {
    #[prost(string, required, tag = "1")]
    pub event_type: String,
    #[prost(message, repeated, tag = "2")]
    pub dimensions: Vec<Dimension>,
    #[prost(message, repeated, tag = "3")]
    pub properties: Vec<Property>,
    #[prost(enumeration = "EventCategory", optional, tag = "4")]
    pub category: Option<i32>,
    #[prost(int64, optional, tag = "5")]
    pub timestamp: Option<i64>,
}

#[derive(Clone, PartialEq, Message)]
pub struct EventUploadMessage {
    #[prost(message, repeated, tag = "1")]
    pub events: Vec<Event>,
}

// ---------------------------------------------------------------------------
// Conversions between wire types and domain types (src/model.rs)
// ---------------------------------------------------------------------------

use crate::model::{
    Datapoint, Dimensions, Event as DomainEvent, EventCategory as DomainEventCategory,
    MetricType as DomainMetricType, MetricValue, PropertyValue as DomainPropertyValue,
};

pub fn wire_metric_type_to_domain(t: Option<i32>) -> DomainMetricType {
    match t {
        Some(1) => DomainMetricType::Counter,
        Some(3) => DomainMetricType::CumulativeCounter,
        _ => DomainMetricType::Gauge,
    }
}

pub fn domain_metric_type_to_wire(t: DomainMetricType) -> i32 {
    match t {
        DomainMetricType::Gauge => MetricType::Gauge as i32,
        DomainMetricType::Counter => MetricType::Counter as i32,
        DomainMetricType::CumulativeCounter => MetricType::CumulativeCounter as i32,
    }
}

pub fn wire_dimensions_to_domain(dims: &[Dimension]) -> Dimensions {
    dims.iter()
        .filter_map(|d| Some((d.key.clone()?, d.value.clone().unwrap_or_default())))
        .collect()
}

pub fn domain_dimensions_to_wire(dims: &Dimensions) -> Vec<Dimension> {
    dims.iter()
        .map(|(k, v)| Dimension {
            key: Some(k.clone()),
            value: Some(v.clone()),
        })
        .collect()
}

pub fn wire_datum_to_value(datum: &Datum) -> Option<MetricValue> {
    if let Some(i) = datum.int_value {
        Some(MetricValue::Int(i))
    } else if let Some(d) = datum.double_value {
        Some(MetricValue::Float(d))
    } else {
        datum.str_value.clone().map(MetricValue::Str)
    }
}

pub fn value_to_wire_datum(value: &MetricValue) -> Datum {
    match value {
        MetricValue::Int(i) => Datum {
            int_value: Some(*i),
            double_value: None,
            str_value: None,
        },
        MetricValue::Float(f) => Datum {
            int_value: None,
            double_value: Some(*f),
            str_value: None,
        },
        MetricValue::Str(s) => Datum {
            int_value: None,
            double_value: None,
            str_value: Some(s.clone()),
        },
    }
}

pub fn wire_datapoint_to_domain(dp: &DataPoint) -> Option<Datapoint> {
    let metric = dp.metric.clone()?;
    let value = dp.value.as_ref().and_then(wire_datum_to_value)?;
    Some(Datapoint {
        metric,
        dimensions: wire_dimensions_to_domain(&dp.dimensions),
        value,
        metric_type: wire_metric_type_to_domain(dp.metric_type),
        timestamp: dp.timestamp.unwrap_or(0),
    })
}

pub fn domain_datapoint_to_wire(dp: &Datapoint) -> DataPoint {
    DataPoint {
        source: Some("sfx-proxy".into()),
        metric: Some(dp.metric.clone()),
        timestamp: Some(dp.timestamp),
        value: Some(value_to_wire_datum(&dp.value)),
        metric_type: Some(domain_metric_type_to_wire(dp.metric_type)),
        dimensions: domain_dimensions_to_wire(&dp.dimensions),
    }
}

pub fn wire_event_category_to_domain(c: Option<i32>) -> DomainEventCategory {
    match c {
        Some(100_000) => DomainEventCategory::Alert,
        Some(200_000) => DomainEventCategory::Audit,
        Some(300_000) => DomainEventCategory::Job,
        Some(400_000) => DomainEventCategory::Collectd,
        Some(500_000) => DomainEventCategory::ServiceDiscovery,
        Some(700_000) => DomainEventCategory::Exception,
        Some(2_000_000) => DomainEventCategory::Agent,
        _ => DomainEventCategory::UserDefined,
    }
}

pub fn domain_event_category_to_wire(c: DomainEventCategory) -> i32 {
    match c {
        DomainEventCategory::UserDefined => EventCategory::UserDefined as i32,
        DomainEventCategory::Alert => EventCategory::Alert as i32,
        DomainEventCategory::Audit => EventCategory::Audit as i32,
        DomainEventCategory::Job => EventCategory::Job as i32,
        DomainEventCategory::Collectd => EventCategory::Collectd as i32,
        DomainEventCategory::ServiceDiscovery => EventCategory::ServiceDiscovery as i32,
        DomainEventCategory::Exception => EventCategory::Exception as i32,
        DomainEventCategory::Agent => EventCategory::Agent as i32,
    }
}

fn wire_property_value_to_domain(v: &PropertyValue) -> DomainPropertyValue {
    if let Some(b) = v.bool_value {
        DomainPropertyValue::Bool(b)
    } else if let Some(i) = v.int_value {
        DomainPropertyValue::Int(i)
    } else if let Some(d) = v.double_value {
        DomainPropertyValue::Float(d)
    } else {
        DomainPropertyValue::Str(v.str_value.clone().unwrap_or_default())
    }
}

fn domain_property_value_to_wire(v: &DomainPropertyValue) -> PropertyValue {
    match v {
        DomainPropertyValue::Bool(b) => PropertyValue {
            bool_value: Some(*b),
            int_value: None,
            double_value: None,
            str_value: None,
        },
        DomainPropertyValue::Int(i) => PropertyValue {
            bool_value: None,
            int_value: Some(*i),
            double_value: None,
            str_value: None,
        },
        DomainPropertyValue::Float(f) => PropertyValue {
            bool_value: None,
            int_value: None,
            double_value: Some(*f),
            str_value: None,
        },
        DomainPropertyValue::Str(s) => PropertyValue {
            bool_value: None,
            int_value: None,
            double_value: None,
            str_value: Some(s.clone()),
        },
    }
}

pub fn wire_event_to_domain(e: &Event) -> DomainEvent {
    let properties = e
        .properties
        .iter()
        .filter_map(|p| {
            let key = p.key.clone()?;
            let value = wire_property_value_to_domain(p.value.as_ref()?);
            Some((key, value))
        })
        .collect();
    DomainEvent {
        event_type: e.event_type.clone(),
        category: wire_event_category_to_domain(e.category),
        dimensions: wire_dimensions_to_domain(&e.dimensions),
        properties,
        timestamp: e.timestamp.unwrap_or(0),
    }
}

pub fn domain_event_to_wire(e: &DomainEvent) -> Event {
    Event {
        event_type: e.event_type.clone(),
        dimensions: domain_dimensions_to_wire(&e.dimensions),
        properties: e
            .properties
            .iter()
            .map(|(k, v)| Property {
                key: Some(k.clone()),
                value: Some(domain_property_value_to_wire(v)),
            })
            .collect(),
        category: Some(domain_event_category_to_wire(e.category)),
        timestamp: Some(e.timestamp),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn datapoint_roundtrip_through_wire() {
        let mut dims = Dimensions::new();
        dims.insert("host".into(), "a".into());
        let dp = Datapoint {
            metric: "cpu.load".into(),
            dimensions: dims,
            value: MetricValue::Float(1.5),
            metric_type: DomainMetricType::Gauge,
            timestamp: 1000,
        };
        let wire = domain_datapoint_to_wire(&dp);
        let back = wire_datapoint_to_domain(&wire).unwrap();
        assert_eq!(back, dp);
    }

    #[test]
    fn encode_decode_upload_message() {
        let msg = DataPointUploadMessage {
            datapoints: vec![DataPoint {
                source: Some("s".into()),
                metric: Some("m".into()),
                timestamp: Some(1),
                value: Some(Datum {
                    str_value: None,
                    double_value: Some(2.0),
                    int_value: None,
                }),
                metric_type: Some(MetricType::Gauge as i32),
                dimensions: vec![],
            }],
        };
        let bytes = msg.encode_to_vec();
        let decoded = DataPointUploadMessage::decode(bytes.as_slice()).unwrap();
        assert_eq!(decoded.datapoints.len(), 1);
        assert_eq!(decoded.datapoints[0].metric.as_deref(), Some("m"));
    }

    #[test]
    fn event_category_roundtrip() {
        for cat in [
            DomainEventCategory::UserDefined,
            DomainEventCategory::Alert,
            DomainEventCategory::Audit,
            DomainEventCategory::Job,
            DomainEventCategory::Collectd,
            DomainEventCategory::ServiceDiscovery,
            DomainEventCategory::Exception,
            DomainEventCategory::Agent,
        ] {
            let wire = domain_event_category_to_wire(cat);
            assert_eq!(wire_event_category_to_domain(Some(wire)), cat);
        }
    }

    #[test]
    fn wire_datapoint_missing_metric_is_none() {
        let dp = DataPoint {
            source: None,
            metric: None,
            timestamp: None,
            value: Some(Datum {
                str_value: None,
                double_value: Some(1.0),
                int_value: None,
            }),
            metric_type: None,
            dimensions: vec![],
        };
        assert!(wire_datapoint_to_domain(&dp).is_none());
    }
}
