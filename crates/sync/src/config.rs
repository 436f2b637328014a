//! Configuration for the gossip synchronizer.

use std::time::Duration;
use thiserror::Error;

/// Errors from [`SyncConfig::validate`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("send_bps of 0 would pace sends infinitely; use a negative value for uncapped")]
    ZeroSendBps,

    #[error("fast_sync_threshold must be at least 1")]
    ZeroFastSyncThreshold,

    #[error("round_state_interval must be non-zero")]
    ZeroRoundStateInterval,
}

/// Tunables for the synchronizer.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Per-peer outbound bandwidth cap in bytes per second. Negative means
    /// uncapped: a peer task re-wakes immediately after each send.
    pub send_bps: i64,

    /// Cadence of the periodic round-state rebroadcast.
    pub round_state_interval: Duration,

    /// Height gap beyond which normal gossip gives up and a bulk fast-sync
    /// fetch is started instead.
    pub fast_sync_threshold: u64,

    /// Priority the reactor registers its protocols at.
    pub protocol_priority: u8,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            send_bps: -1,
            round_state_interval: Duration::from_millis(300),
            fast_sync_threshold: 4,
            protocol_priority: 3,
        }
    }
}

impl SyncConfig {
    /// Check the tunables for values the pacing and trigger arithmetic
    /// cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.send_bps == 0 {
            return Err(ConfigError::ZeroSendBps);
        }
        if self.fast_sync_threshold == 0 {
            return Err(ConfigError::ZeroFastSyncThreshold);
        }
        if self.round_state_interval.is_zero() {
            return Err(ConfigError::ZeroRoundStateInterval);
        }
        Ok(())
    }
}
