//! Error taxonomy. Everything stochastic (loss, corruption, reorder) is
//! recovered by the protocol layer and never surfaces here — only the two
//! behavior-level failures the driver and CLI must react to.

use std::time::Duration;

#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("loss probability {0} out of range [0,1]")]
    LossOutOfRange(f64),
    #[error("corrupt probability {0} out of range [0,1]")]
    CorruptOutOfRange(f64),
    #[error("reorder probability {0} out of range [0,1]")]
    ReorderOutOfRange(f64),
    #[error("rtt must be positive, got {0}ms")]
    NonPositiveRtt(f64),
    #[error("jitter must be non-negative, got {0}ms")]
    NegativeJitter(f64),
    #[error("window must be at least 1, got {0}")]
    ZeroWindow(u32),
    #[error("mss must be at least 1, got {0}")]
    ZeroMss(usize),
    #[error("payload_bytes must be at least 1, got {0}")]
    ZeroPayload(usize),
    #[error("runs must be at least 1, got {0}")]
    ZeroRuns(u32),
    #[error("unknown scenario preset {0:?}")]
    UnknownPreset(String),
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum RunError {
    #[error("run exceeded its safety bound of {0:?} simulated time")]
    Timeout(Duration),
}
