use std::env;
use std::time::Duration;

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_secs(key: &str, default_secs: u64) -> Duration {
    Duration::from_secs(env_or(key, default_secs))
}

#[derive(Debug, Clone)]
pub struct Config {
    pub listen: String,
    pub token_header: String,

    pub graceful_min_wait: Duration,
    pub graceful_max_wait: Duration,
    pub graceful_check_interval: Duration,
    pub graceful_silent_time: Duration,

    pub dp_endpoint: String,
    pub event_endpoint: String,
    pub sink_shutdown_timeout: Duration,
    pub num_draining_threads: usize,
    pub channel_size: usize,
    pub max_drain_size: usize,

    pub log_dir: Option<String>,
    pub report_interval: Duration,
}

impl Config {
    pub fn load() -> Self {
        Self {
            listen: format!("0.0.0.0:{}", env_or("POPS_PORT", 8100u16)),
            token_header: env::var("POPS_TOKEN_HEADER").unwrap_or_else(|_| "X-SF-Token".into()),

            graceful_min_wait: env_secs("POPS_GRACEFUL_MIN_WAIT_TIME", 5),
            graceful_max_wait: env_secs("POPS_GRACEFUL_MAX_WAIT_TIME", 25),
            graceful_check_interval: env_secs("POPS_GRACEFUL_CHECK_INTERVAL", 1),
            graceful_silent_time: env_secs("POPS_GRACEFUL_SILENT_TIME", 3),

            dp_endpoint: env::var("DATA_SINK_DP_ENDPOINT")
                .unwrap_or_else(|_| "https://ingest.us0.signalfx.com/v2/datapoint".into()),
            event_endpoint: env::var("DATA_SINK_EVENT_ENDPOINT")
                .unwrap_or_else(|_| "https://ingest.us0.signalfx.com/v2/event".into()),
            sink_shutdown_timeout: env_secs("DATA_SINK_SHUTDOWN_TIMEOUT", 3),
            num_draining_threads: env_or("NUM_DRAINING_THREADS", 50usize),
            channel_size: env_or("CHANEL_SIZE", 1_000_000usize),
            max_drain_size: env_or("MAX_DRAIN_SIZE", 5_000usize),

            log_dir: env::var("LOG_DIR").ok().filter(|v| !v.is_empty()),
            report_interval: env_secs("SF_REPORT_INTERVAL", 10),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[allow(unsafe_code)]
    fn defaults_match_spec() {
        // Rust 2024 requires `unsafe` for env mutation; single-threaded test, no races.
        for key in [
            "POPS_PORT",
            "POPS_TOKEN_HEADER",
            "POPS_GRACEFUL_MIN_WAIT_TIME",
            "DATA_SINK_DP_ENDPOINT",
            "NUM_DRAINING_THREADS",
            "CHANEL_SIZE",
            "MAX_DRAIN_SIZE",
            "LOG_DIR",
        ] {
            unsafe { env::remove_var(key) };
        }
        let cfg = Config::load();
        assert_eq!(cfg.listen, "0.0.0.0:8100");
        assert_eq!(cfg.token_header, "X-SF-Token");
        assert_eq!(cfg.graceful_min_wait, Duration::from_secs(5));
        assert_eq!(cfg.num_draining_threads, 50);
        assert_eq!(cfg.channel_size, 1_000_000);
        assert_eq!(cfg.max_drain_size, 5_000);
        assert!(cfg.log_dir.is_none());
    }
}
