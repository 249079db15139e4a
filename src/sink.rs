//! The async multi-token sink. A bounded channel fans out to `W` worker
//! tasks; each worker drains a batch of up to `M` items, groups them by
//! `(token, kind)`, and issues one upstream POST per group.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::counters::Counters;
use crate::error::CloseError;
use crate::model::{DecodedItems, ItemKind, QueueItem, QueueSlot};
use crate::proto;

const FIRST_ITEM_WAIT: Duration = Duration::from_millis(50);

#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    /// The producer's cancellation fired before every item was enqueued.
    /// Carries the count of items that were enqueued before cancellation,
    /// so callers can count exactly what reached the queue.
    #[error("queue full")]
    QueueFull(usize),
    #[error("sink closed")]
    Closed,
}

#[repr(u8)]
#[derive(Clone, Copy, PartialEq, Eq)]
enum SinkState {
    Open = 0,
    Draining = 1,
    Closed = 2,
}

impl From<u8> for SinkState {
    fn from(v: u8) -> Self {
        match v {
            0 => Self::Open,
            1 => Self::Draining,
            _ => Self::Closed,
        }
    }
}

/// Shared handle to the sink. Cheap to clone — producers (HTTP handlers)
/// each hold a clone and call `submit`.
#[derive(Clone)]
pub struct AsyncSink {
    tx: mpsc::Sender<QueueSlot>,
    rx: Arc<Mutex<mpsc::Receiver<QueueSlot>>>,
    state: Arc<AtomicU8>,
    workers: Arc<Mutex<Option<JoinSet<()>>>>,
}

impl AsyncSink {
    /// Build the queue and spawn `W` worker tasks.
    pub fn spawn(cfg: &Config, counters: Counters) -> Self {
        let (tx, rx) = mpsc::channel::<QueueSlot>(cfg.channel_size);
        let rx = Arc::new(Mutex::new(rx));
        let state = Arc::new(AtomicU8::new(SinkState::Open as u8));

        let client = reqwest::Client::new();
        let mut workers = JoinSet::new();
        for id in 0..cfg.num_draining_threads {
            let rx = rx.clone();
            let client = client.clone();
            let counters = counters.clone();
            let dp_endpoint = cfg.dp_endpoint.clone();
            let event_endpoint = cfg.event_endpoint.clone();
            let max_drain = cfg.max_drain_size;
            workers.spawn(async move {
                worker_loop(
                    id,
                    rx,
                    client,
                    dp_endpoint,
                    event_endpoint,
                    max_drain,
                    counters,
                )
                .await;
            });
        }

        Self {
            tx,
            rx,
            state,
            workers: Arc::new(Mutex::new(Some(workers))),
        }
    }

    fn state(&self) -> SinkState {
        self.state.load(Ordering::Acquire).into()
    }

    /// Enqueue every item in `items` under `token`. Enqueueing a
    /// multi-item submission is best-effort: if the queue fills mid-push
    /// and `cancel` fires, the partial run already enqueued is kept and
    /// an error is returned for the remainder.
    pub async fn submit(
        &self,
        token: &str,
        items: DecodedItems,
        cancel: &CancellationToken,
    ) -> Result<usize, SubmitError> {
        if self.state() != SinkState::Open {
            return Err(SubmitError::Closed);
        }

        let queue_items: Vec<QueueItem> = match items {
            DecodedItems::Datapoints(v) => v.into_iter().map(QueueItem::Datapoint).collect(),
            DecodedItems::Events(v) => v.into_iter().map(QueueItem::Event).collect(),
        };

        let mut enqueued = 0usize;
        for item in queue_items {
            let slot = QueueSlot {
                token: token.to_string(),
                item,
            };
            tokio::select! {
                biased;
                result = self.tx.send(slot) => {
                    match result {
                        Ok(()) => enqueued += 1,
                        Err(_) => return Err(SubmitError::Closed),
                    }
                }
                () = cancel.cancelled() => {
                    return Err(SubmitError::QueueFull(enqueued));
                }
            }
        }

        Ok(enqueued)
    }

    /// Close the queue (no further submits accepted), then wait up to
    /// `timeout` for workers to drain. Remaining items are discarded
    /// once the deadline passes, reported as [`CloseError::SinkIncomplete`].
    pub async fn close(&self, timeout: Duration) -> Result<(), CloseError> {
        self.state.store(SinkState::Draining as u8, Ordering::Release);
        // Rejects further sends while letting buffered items keep draining;
        // workers observe `rx.recv() == None` once the backlog is empty.
        self.rx.lock().await.close();

        let Some(mut workers) = self.workers.lock().await.take() else {
            self.state.store(SinkState::Closed as u8, Ordering::Release);
            return Ok(());
        };

        let deadline = tokio::time::Instant::now() + timeout;
        let mut incomplete = false;
        loop {
            if workers.is_empty() {
                break;
            }
            tokio::select! {
                _ = tokio::time::sleep_until(deadline) => {
                    tracing::warn!(remaining = workers.len(), "sink shutdown deadline reached, abandoning workers");
                    incomplete = true;
                    workers.abort_all();
                    break;
                }
                joined = workers.join_next() => {
                    if joined.is_none() {
                        break;
                    }
                }
            }
        }

        self.state.store(SinkState::Closed as u8, Ordering::Release);
        if incomplete {
            Err(CloseError::SinkIncomplete(workers.len()))
        } else {
            Ok(())
        }
    }
}

async fn worker_loop(
    _id: usize,
    rx: Arc<Mutex<mpsc::Receiver<QueueSlot>>>,
    client: reqwest::Client,
    dp_endpoint: String,
    event_endpoint: String,
    max_drain: usize,
    counters: Counters,
) {
    loop {
        let mut buffer = Vec::with_capacity(max_drain.min(256));
        let mut closed = false;

        {
            let mut guard = rx.lock().await;
            match tokio::time::timeout(FIRST_ITEM_WAIT, guard.recv()).await {
                Ok(Some(slot)) => buffer.push(slot),
                Ok(None) => closed = true,
                Err(_elapsed) => {}
            }

            while buffer.len() < max_drain {
                match guard.try_recv() {
                    Ok(slot) => buffer.push(slot),
                    Err(mpsc::error::TryRecvError::Empty) => break,
                    Err(mpsc::error::TryRecvError::Disconnected) => {
                        closed = true;
                        break;
                    }
                }
            }
        }

        if !buffer.is_empty() {
            flush(buffer, &client, &dp_endpoint, &event_endpoint, &counters).await;
        } else if closed {
            break;
        }
    }
}

type GroupKey = (String, ItemKind);

/// Group a drained run by `(token, kind)` and POST one batch per group.
/// Never mixes tokens or kinds in a single request.
async fn flush(
    buffer: Vec<QueueSlot>,
    client: &reqwest::Client,
    dp_endpoint: &str,
    event_endpoint: &str,
    counters: &Counters,
) {
    let mut groups: HashMap<GroupKey, Vec<QueueItem>> = HashMap::new();
    for slot in buffer {
        let kind = match &slot.item {
            QueueItem::Datapoint(_) => ItemKind::Datapoint,
            QueueItem::Event(_) => ItemKind::Event,
        };
        groups.entry((slot.token, kind)).or_default().push(slot.item);
    }

    for ((token, kind), items) in groups {
        let len = items.len();
        let (endpoint, body) = match kind {
            ItemKind::Datapoint => {
                let datapoints = items
                    .into_iter()
                    .filter_map(|i| match i {
                        QueueItem::Datapoint(dp) => Some(proto::domain_datapoint_to_wire(&dp)),
                        QueueItem::Event(_) => None,
                    })
                    .collect();
                let msg = proto::DataPointUploadMessage { datapoints };
                (dp_endpoint, prost::Message::encode_to_vec(&msg))
            }
            ItemKind::Event => {
                let events = items
                    .into_iter()
                    .filter_map(|i| match i {
                        QueueItem::Event(e) => Some(proto::domain_event_to_wire(&e)),
                        QueueItem::Datapoint(_) => None,
                    })
                    .collect();
                let msg = proto::EventUploadMessage { events };
                (event_endpoint, prost::Message::encode_to_vec(&msg))
            }
        };

        let result = client
            .post(endpoint)
            .header("X-SF-Token", token.clone())
            .header("Content-Type", "application/x-protobuf")
            .body(body)
            .send()
            .await;

        match result {
            Ok(resp) if resp.status().is_success() => {}
            Ok(resp) => {
                tracing::warn!(status = %resp.status(), token = %token, count = len, "upstream rejected batch, dropping");
                counters.incr_dropped(len as u64);
            }
            Err(err) => {
                tracing::warn!(error = %err, token = %token, count = len, "upstream post failed, dropping");
                counters.incr_dropped(len as u64);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Datapoint, Dimensions, MetricType, MetricValue};
    use prost::Message as _;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn cfg_for(dp_endpoint: String, event_endpoint: String) -> Config {
        Config {
            listen: "127.0.0.1:0".into(),
            token_header: "X-SF-Token".into(),
            graceful_min_wait: Duration::from_millis(0),
            graceful_max_wait: Duration::from_secs(1),
            graceful_check_interval: Duration::from_millis(10),
            graceful_silent_time: Duration::from_millis(10),
            dp_endpoint,
            event_endpoint,
            sink_shutdown_timeout: Duration::from_secs(1),
            num_draining_threads: 2,
            channel_size: 100,
            max_drain_size: 50,
            log_dir: None,
            report_interval: Duration::from_secs(10),
        }
    }

    fn one_datapoint(metric: &str) -> DecodedItems {
        DecodedItems::Datapoints(vec![Datapoint {
            metric: metric.into(),
            dimensions: Dimensions::new(),
            value: MetricValue::Int(1),
            metric_type: MetricType::Gauge,
            timestamp: 1000,
        }])
    }

    #[tokio::test]
    async fn happy_path_posts_to_upstream() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/datapoint"))
            .and(header("X-SF-Token", "t1"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let cfg = cfg_for(format!("{}/v2/datapoint", server.uri()), String::new());
        let sink = AsyncSink::spawn(&cfg, Counters::new());
        let cancel = CancellationToken::new();

        sink.submit("t1", one_datapoint("m"), &cancel).await.unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        sink.close(Duration::from_secs(1)).await.unwrap();
    }

    #[tokio::test]
    async fn submit_after_close_is_rejected() {
        let cfg = cfg_for("http://127.0.0.1:9".into(), "http://127.0.0.1:9".into());
        let sink = AsyncSink::spawn(&cfg, Counters::new());
        sink.close(Duration::from_millis(50)).await.unwrap();

        let cancel = CancellationToken::new();
        let err = sink.submit("t1", one_datapoint("m"), &cancel).await.unwrap_err();
        assert!(matches!(err, SubmitError::Closed));
    }

    #[tokio::test]
    async fn batching_splits_by_token_not_mixed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/datapoint"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let cfg = cfg_for(format!("{}/v2/datapoint", server.uri()), String::new());
        let sink = AsyncSink::spawn(&cfg, Counters::new());
        let cancel = CancellationToken::new();

        for _ in 0..10 {
            sink.submit("a", one_datapoint("m"), &cancel).await.unwrap();
        }
        for _ in 0..5 {
            sink.submit("b", one_datapoint("m"), &cancel).await.unwrap();
        }

        tokio::time::sleep(Duration::from_millis(200)).await;
        sink.close(Duration::from_secs(1)).await.unwrap();

        let requests = server.received_requests().await.unwrap();
        assert!(!requests.is_empty());
        for req in &requests {
            let decoded =
                proto::DataPointUploadMessage::decode(req.body.as_slice()).unwrap();
            let tokens: std::collections::HashSet<_> = req
                .headers
                .get("x-sf-token")
                .map(|v| v.to_str().unwrap().to_string())
                .into_iter()
                .collect();
            assert_eq!(tokens.len(), 1);
            assert!(!decoded.datapoints.is_empty());
        }
    }

    #[tokio::test]
    async fn backpressure_cancellation_returns_error_without_enqueueing() {
        let cfg = Config {
            channel_size: 1,
            num_draining_threads: 0,
            ..cfg_for("http://127.0.0.1:9".into(), "http://127.0.0.1:9".into())
        };
        let sink = AsyncSink::spawn(&cfg, Counters::new());
        let cancel = CancellationToken::new();

        // Fill the single queue slot; no workers are running to drain it.
        sink.submit("a", one_datapoint("m"), &cancel).await.unwrap();

        let cancel2 = CancellationToken::new();
        cancel2.cancel();
        let err = sink.submit("a", one_datapoint("m"), &cancel2).await.unwrap_err();
        assert!(matches!(err, SubmitError::QueueFull(0)));
    }
}
