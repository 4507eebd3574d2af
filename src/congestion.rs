//! Optional AIMD-style congestion window for the TCP-like protocol. Disabled
//! by default; when enabled, it gates the sender's effective window alongside
//! the advertised window.

const INITIAL_CWND: f64 = 1.0;
const MIN_CWND: f64 = 1.0;
const INITIAL_SSTHRESH: f64 = 64.0;

pub struct CongestionControl {
    cwnd: f64,
    ssthresh: f64,
}

impl CongestionControl {
    pub fn new() -> Self {
        Self { cwnd: INITIAL_CWND, ssthresh: INITIAL_SSTHRESH }
    }

    /// Called for each segment newly (not redundantly) acknowledged. Slow
    /// start doubles cwnd per RTT (approximated here as +1 per ack while
    /// below ssthresh); congestion avoidance adds +1 per RTT (approximated
    /// as +1/cwnd per ack).
    pub fn on_new_ack(&mut self) {
        if self.cwnd < self.ssthresh {
            self.cwnd += 1.0;
        } else {
            self.cwnd += 1.0 / self.cwnd;
        }
    }

    /// RTO fired: collapse to slow start.
    pub fn on_timeout(&mut self) {
        self.ssthresh = (self.cwnd / 2.0).max(2.0);
        self.cwnd = MIN_CWND;
    }

    /// Fast retransmit fired: fast recovery halves the window instead of
    /// collapsing all the way to 1.
    pub fn on_fast_retransmit(&mut self) {
        self.ssthresh = self.cwnd / 2.0;
        self.cwnd = self.ssthresh;
    }

    /// Effective window in segments, never below 1.
    pub fn window(&self) -> u32 {
        (self.cwnd.floor() as u32).max(1)
    }
}

impl Default for CongestionControl {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_one_segment() {
        assert_eq!(CongestionControl::new().window(), 1);
    }

    #[test]
    fn slow_start_grows_quickly_then_levels_off_at_ssthresh() {
        let mut cc = CongestionControl::new();
        for _ in 0..100 {
            cc.on_new_ack();
        }
        assert!(cc.window() >= 64);
    }

    #[test]
    fn timeout_collapses_to_one_and_halves_ssthresh() {
        let mut cc = CongestionControl::new();
        for _ in 0..20 {
            cc.on_new_ack();
        }
        let cwnd_before = cc.window();
        cc.on_timeout();
        assert_eq!(cc.window(), 1);
        assert!(cc.ssthresh <= (cwnd_before as f64 / 2.0) + 0.001);
        assert!(cc.ssthresh >= 2.0);
    }

    #[test]
    fn fast_retransmit_halves_rather_than_collapsing() {
        let mut cc = CongestionControl::new();
        for _ in 0..20 {
            cc.on_new_ack();
        }
        let cwnd_before = cc.window();
        cc.on_fast_retransmit();
        assert!(cc.window() >= 1);
        assert!(cc.window() <= cwnd_before);
    }
}
