//! Sync engine configuration.
//!
//! Operational parameters for header sync: batch sizes, timeouts, and limits.
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};

use crate::serde_utils::duration_millis;

/// Maximum headers requested in a single GetBlockHeaders.
pub const MAX_HEADERS_FETCH: u64 = 192;

/// Time a peer has to answer a request.
pub const REPLY_TIMEOUT: Duration = Duration::from_secs(10);

/// A session with no inbound traffic for this long is torn down.
pub const CONN_IDLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Validation failures tolerated per batch before the task is abandoned.
pub const MAX_BATCH_RETRIES: usize = 3;

/// How far back the engine looks for a common ancestor.
/// Bounds the work a peer can cause by announcing an unrelated chain.
pub const MAX_REORG_DEPTH: u64 = 1024;

/// Interval between sweeps for timed-out requests.
pub const TIMEOUT_SWEEP_INTERVAL: Duration = Duration::from_millis(100);

/// Preferred number of requests outstanding on one peer when picking a
/// replacement.
pub const MAX_CONCURRENT_REQUESTS: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub max_headers_fetch: u64,
    #[serde(with = "duration_millis")]
    pub reply_timeout: Duration,
    #[serde(with = "duration_millis")]
    pub conn_idle_timeout: Duration,
    pub max_batch_retries: usize,
    pub max_reorg_depth: u64,
    #[serde(with = "duration_millis")]
    pub timeout_sweep_interval: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_headers_fetch: MAX_HEADERS_FETCH,
            reply_timeout: REPLY_TIMEOUT,
            conn_idle_timeout: CONN_IDLE_TIMEOUT,
            max_batch_retries: MAX_BATCH_RETRIES,
            max_reorg_depth: MAX_REORG_DEPTH,
            timeout_sweep_interval: TIMEOUT_SWEEP_INTERVAL,
        }
    }
}

impl SyncConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml).context("invalid sync config")?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would stall every sync task.
    pub fn validate(&self) -> Result<()> {
        ensure!(self.max_headers_fetch > 0, "max_headers_fetch must be positive");
        ensure!(!self.reply_timeout.is_zero(), "reply_timeout must be positive");
        ensure!(
            !self.timeout_sweep_interval.is_zero(),
            "timeout_sweep_interval must be positive"
        );
        Ok(())
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_yaml_str(&yaml)
    }
}
