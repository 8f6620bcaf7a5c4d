use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use berth_reconcile::{DEFAULT_MAX_ATTEMPTS, DEFAULT_RECONCILE_INTERVAL};

/// Default capacity of the reservation dispatcher queue.
pub const DEFAULT_QUEUE_DEPTH: usize = 256;

#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: SocketAddr,
    pub log_level: String,
    /// Interval between background zone assignment passes.
    pub zone_interval: Duration,
    /// Compare-and-set attempts per reservation before giving up.
    pub reservation_attempts: u32,
    pub queue_depth: usize,
    /// Optional JSON file with documents loaded at startup.
    pub seed_file: Option<PathBuf>,
    /// Create the default global placement when nothing else is seeded.
    pub default_placement: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let listen_addr = std::env::var("BERTH_LISTEN_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:8080".to_string())
            .parse()?;

        let log_level = std::env::var("BERTH_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let zone_interval = match std::env::var("BERTH_ZONE_INTERVAL_SECS") {
            Ok(v) => Duration::from_secs(v.parse()?),
            Err(_) => DEFAULT_RECONCILE_INTERVAL,
        };

        let reservation_attempts = match std::env::var("BERTH_RESERVATION_ATTEMPTS") {
            Ok(v) => v.parse()?,
            Err(_) => DEFAULT_MAX_ATTEMPTS,
        };

        let queue_depth = match std::env::var("BERTH_QUEUE_DEPTH") {
            Ok(v) => v.parse()?,
            Err(_) => DEFAULT_QUEUE_DEPTH,
        };

        let seed_file = std::env::var("BERTH_SEED_FILE").ok().map(PathBuf::from);

        let default_placement = std::env::var("BERTH_DEFAULT_PLACEMENT")
            .map(|v| v == "1" || v.to_lowercase() == "true")
            .unwrap_or(false);

        Ok(Self {
            listen_addr,
            log_level,
            zone_interval,
            reservation_attempts,
            queue_depth,
            seed_file,
            default_placement,
        })
    }
}
