//! Atomic counters backing the `/debug/vars` snapshot. One `AtomicU64`
//! per named series; every protocol gets identical wiring — no
//! protocol-specific registration path.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use dashmap::DashMap;
use serde::Serialize;

/// Upper bounds (milliseconds) of the latency histogram's buckets; the
/// last bucket catches everything above `LATENCY_BUCKETS_MS`'s final value.
pub const LATENCY_BUCKETS_MS: [u64; 7] = [1, 5, 10, 50, 100, 500, 1000];

pub const PROTOCOLS: [&str; 7] = [
    "json_v1",
    "proto_v1",
    "json_v2",
    "proto_v2",
    "json_v2_event",
    "proto_v2_event",
    "collectd",
];

#[derive(Default)]
struct ProtocolCounters {
    incoming: AtomicU64,
    decode_errors: AtomicU64,
}

/// Process-wide counter set. Cheap to clone (wraps `Arc`s).
#[derive(Clone)]
pub struct Counters {
    per_protocol: Arc<DashMap<&'static str, Arc<ProtocolCounters>>>,
    active_connections: Arc<AtomicI64>,
    total_connections: Arc<AtomicU64>,
    total_processing_nanos: Arc<AtomicU64>,
    dropped_items: Arc<AtomicU64>,
    backpressure_errors: Arc<AtomicU64>,
    health_checks_ok: Arc<AtomicU64>,
    not_found: Arc<AtomicU64>,
    /// One counter per entry in `LATENCY_BUCKETS_MS`, plus one overflow
    /// bucket at the end.
    latency_buckets: Arc<[AtomicU64; LATENCY_BUCKETS_MS.len() + 1]>,
}

impl Counters {
    pub fn new() -> Self {
        let per_protocol = DashMap::new();
        for name in PROTOCOLS {
            per_protocol.insert(name, Arc::new(ProtocolCounters::default()));
        }
        Self {
            per_protocol: Arc::new(per_protocol),
            active_connections: Arc::new(AtomicI64::new(0)),
            total_connections: Arc::new(AtomicU64::new(0)),
            total_processing_nanos: Arc::new(AtomicU64::new(0)),
            dropped_items: Arc::new(AtomicU64::new(0)),
            backpressure_errors: Arc::new(AtomicU64::new(0)),
            health_checks_ok: Arc::new(AtomicU64::new(0)),
            not_found: Arc::new(AtomicU64::new(0)),
            latency_buckets: Arc::new(std::array::from_fn(|_| AtomicU64::new(0))),
        }
    }

    /// Record one request's end-to-end handler latency into the rolling
    /// bucket it falls under.
    pub fn observe_latency(&self, nanos: u64) {
        let ms = nanos / 1_000_000;
        let idx = LATENCY_BUCKETS_MS
            .iter()
            .position(|&bound| ms <= bound)
            .unwrap_or(LATENCY_BUCKETS_MS.len());
        self.latency_buckets[idx].fetch_add(1, Ordering::Relaxed);
    }

    /// Panics if `name` isn't one of `PROTOCOLS` — every call site passes
    /// a `&'static str` drawn from that fixed set.
    fn protocol(&self, name: &str) -> Arc<ProtocolCounters> {
        self.per_protocol
            .get(name)
            .unwrap_or_else(|| panic!("unknown protocol counter: {name}"))
            .value()
            .clone()
    }

    pub fn incr_incoming(&self, protocol: &str, n: u64) {
        self.protocol(protocol).incoming.fetch_add(n, Ordering::Relaxed);
    }

    pub fn incr_decode_error(&self, protocol: &str) {
        self.protocol(protocol)
            .decode_errors
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn incoming(&self, protocol: &str) -> u64 {
        self.protocol(protocol).incoming.load(Ordering::Relaxed)
    }

    pub fn decode_errors(&self, protocol: &str) -> u64 {
        self.protocol(protocol).decode_errors.load(Ordering::Relaxed)
    }

    pub fn conn_start(&self) {
        self.active_connections.fetch_add(1, Ordering::Relaxed);
        self.total_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn conn_end(&self, elapsed_nanos: u64) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
        self.total_processing_nanos
            .fetch_add(elapsed_nanos, Ordering::Relaxed);
    }

    pub fn active_connections(&self) -> i64 {
        self.active_connections.load(Ordering::Relaxed)
    }

    pub fn total_connections(&self) -> u64 {
        self.total_connections.load(Ordering::Relaxed)
    }

    pub fn incr_dropped(&self, n: u64) {
        self.dropped_items.fetch_add(n, Ordering::Relaxed);
    }

    pub fn incr_backpressure(&self) {
        self.backpressure_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn incr_health_ok(&self) {
        self.health_checks_ok.fetch_add(1, Ordering::Relaxed);
    }

    pub fn incr_not_found(&self) {
        self.not_found.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CountersSnapshot {
        let per_protocol = PROTOCOLS
            .iter()
            .map(|&name| {
                let c = self.protocol(name);
                (
                    name.to_string(),
                    ProtocolSnapshot {
                        incoming: c.incoming.load(Ordering::Relaxed),
                        decode_errors: c.decode_errors.load(Ordering::Relaxed),
                    },
                )
            })
            .collect();

        let latency_buckets_ms = self
            .latency_buckets
            .iter()
            .map(|b| b.load(Ordering::Relaxed))
            .collect();

        CountersSnapshot {
            per_protocol,
            active_connections: self.active_connections.load(Ordering::Relaxed),
            total_connections: self.total_connections.load(Ordering::Relaxed),
            total_processing_nanos: self.total_processing_nanos.load(Ordering::Relaxed),
            dropped_items: self.dropped_items.load(Ordering::Relaxed),
            backpressure_errors: self.backpressure_errors.load(Ordering::Relaxed),
            health_checks_ok: self.health_checks_ok.load(Ordering::Relaxed),
            not_found: self.not_found.load(Ordering::Relaxed),
            latency_buckets_ms,
        }
    }
}

impl Default for Counters {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Serialize)]
pub struct ProtocolSnapshot {
    pub incoming: u64,
    pub decode_errors: u64,
}

#[derive(Serialize)]
pub struct CountersSnapshot {
    pub per_protocol: std::collections::BTreeMap<String, ProtocolSnapshot>,
    pub active_connections: i64,
    pub total_connections: u64,
    pub total_processing_nanos: u64,
    pub dropped_items: u64,
    pub backpressure_errors: u64,
    pub health_checks_ok: u64,
    pub not_found: u64,
    /// Parallel to `LATENCY_BUCKETS_MS` plus one overflow bucket.
    pub latency_buckets_ms: Vec<u64>,
}
