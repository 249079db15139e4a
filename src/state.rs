//! Shared application state threaded through every handler and
//! middleware layer via axum's `State` extractor.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::counters::Counters;
use crate::decode::DecoderTable;
use crate::sink::AsyncSink;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub counters: Counters,
    pub sink: AsyncSink,
    pub decoders: Arc<DecoderTable>,
    /// Set once graceful shutdown begins. Never reset.
    pub drain: Arc<AtomicBool>,
    pub cancel: CancellationToken,
}

impl AppState {
    pub fn new(config: Config, sink: AsyncSink, counters: Counters, cancel: CancellationToken) -> Self {
        Self {
            config: Arc::new(config),
            counters,
            sink,
            decoders: Arc::new(DecoderTable::new()),
            drain: Arc::new(AtomicBool::new(false)),
            cancel,
        }
    }
}
