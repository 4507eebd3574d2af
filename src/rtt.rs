use std::time::Duration;

const INITIAL_RTO_MS: f64 = 1000.0;
const MIN_RTO_MS: f64 = 100.0;
const MAX_RTO_MS: f64 = 60_000.0;
const ALPHA: f64 = 0.125;
const BETA: f64 = 0.25;

/// Jacobson/Karels RTO estimator, updated only from Karn-eligible samples
/// (the sender must never call `update` for a retransmitted segment).
pub struct RttEstimator {
    srtt: f64,
    rttvar: f64,
    pub rto: Duration,
    sampled: bool,
}

impl RttEstimator {
    pub fn new() -> Self {
        Self {
            srtt: 0.0,
            rttvar: 0.0,
            rto: Duration::from_millis(INITIAL_RTO_MS as u64),
            sampled: false,
        }
    }

    pub fn update(&mut self, sample_rtt: Duration) {
        let rtt_ms = sample_rtt.as_secs_f64() * 1000.0;
        if !self.sampled {
            self.srtt = rtt_ms;
            self.rttvar = rtt_ms / 2.0;
            self.sampled = true;
        } else {
            // Jacobson/Karels: https://tcpcc.systemsapproach.org/algorithm.html
            self.rttvar = (1.0 - BETA) * self.rttvar + BETA * (self.srtt - rtt_ms).abs();
            self.srtt = (1.0 - ALPHA) * self.srtt + ALPHA * rtt_ms;
        }
        self.update_rto();
    }

    /// Exponential backoff on timeout, per Karn's algorithm. Holds until the
    /// next successful non-retransmitted sample recomputes RTO from scratch.
    pub fn backoff(&mut self) {
        let new_rto_ms = (self.rto.as_secs_f64() * 1000.0 * 2.0).min(MAX_RTO_MS);
        self.rto = Duration::from_millis(new_rto_ms as u64);
    }

    fn update_rto(&mut self) {
        let rto_ms = (self.srtt + 4.0 * self.rttvar).clamp(MIN_RTO_MS, MAX_RTO_MS);
        self.rto = Duration::from_millis(rto_ms as u64);
    }
}

impl Default for RttEstimator {
    fn default() -> Self {
        Self::new()
    }
}
