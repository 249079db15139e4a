//! Domain-level datapoint and event types shared by every decoder and by
//! the sink. These are wire-format-agnostic: a decoder's only job is to
//! produce `Vec<Datapoint>` or `Vec<Event>` from a request body.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Dimensions are a `BTreeMap` rather than a `HashMap` so re-serialization
/// in tests is deterministic and so a batch's dimension set has a stable
/// iteration order when encoded to protobuf.
pub type Dimensions = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MetricType {
    Gauge,
    Counter,
    CumulativeCounter,
}

impl Default for MetricType {
    fn default() -> Self {
        Self::Gauge
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Int(i64),
    Float(f64),
    Str(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Datapoint {
    pub metric: String,
    #[serde(default)]
    pub dimensions: Dimensions,
    pub value: MetricValue,
    #[serde(rename = "metricType", default)]
    pub metric_type: MetricType,
    /// Milliseconds since epoch. 0 means "assign on ingest".
    #[serde(default)]
    pub timestamp: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventCategory {
    UserDefined,
    Alert,
    Audit,
    Job,
    Collectd,
    ServiceDiscovery,
    Exception,
    Agent,
}

impl Default for EventCategory {
    fn default() -> Self {
        Self::UserDefined
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "eventType")]
    pub event_type: String,
    #[serde(default)]
    pub category: EventCategory,
    #[serde(default)]
    pub dimensions: Dimensions,
    #[serde(default)]
    pub properties: BTreeMap<String, PropertyValue>,
    #[serde(default)]
    pub timestamp: i64,
}

/// What a submission carries: datapoints or events, never mixed.
#[derive(Debug, Clone)]
pub enum DecodedItems {
    Datapoints(Vec<Datapoint>),
    Events(Vec<Event>),
}

impl DecodedItems {
    pub fn len(&self) -> usize {
        match self {
            Self::Datapoints(v) => v.len(),
            Self::Events(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn kind(&self) -> ItemKind {
        match self {
            Self::Datapoints(_) => ItemKind::Datapoint,
            Self::Events(_) => ItemKind::Event,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemKind {
    Datapoint,
    Event,
}

/// A single item tagged with its owning token, carried through the queue.
#[derive(Debug, Clone)]
pub enum QueueItem {
    Datapoint(Datapoint),
    Event(Event),
}

/// One slot enqueued to the async sink.
#[derive(Debug, Clone)]
pub struct QueueSlot {
    pub token: String,
    pub item: QueueItem,
}
