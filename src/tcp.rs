//! TCP-like: Selective Repeat augmented with Jacobson/Karn adaptive RTO,
//! 3-dupACK fast retransmit, and an optional AIMD congestion window.
//!
//! The wire encoding packs two numbers into one ACK segment: `ack` carries
//! the receiver's cumulative delivered prefix (used only for duplicate-ACK
//! counting), while `sack` carries the single seq this particular ACK is
//! individually acknowledging (used for SR-style per-segment bookkeeping).

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::time::Duration;

use crate::channel::Channel;
use crate::congestion::CongestionControl;
use crate::protocol::{ReceiverMachine, SenderMachine};
use crate::rtt::RttEstimator;
use crate::segment::{segment_payload, DecodeError, Segment};
use crate::timer::TimerWheel;

/// Sentinel meaning "the receiver has not delivered any in-order prefix
/// yet" — seq space is otherwise a plain u32 index into the segment list,
/// so this value is unambiguous for any realistic transfer.
const NO_CUMULATIVE_ACK: u32 = u32::MAX;
const DUP_ACKS_FOR_FAST_RETRANSMIT: u32 = 3;

pub struct TcpSender {
    segments: Vec<Segment>,
    total: u32,
    base: u32,
    next_seq: u32,
    window: u32,
    timer: TimerWheel,
    acked: BTreeSet<u32>,
    rtt: RttEstimator,
    cwnd: Option<CongestionControl>,
    first_sent_at: HashMap<u32, Duration>,
    last_cum_ack: Option<u32>,
    dup_count: u32,
    retransmissions: u64,
}

impl TcpSender {
    pub fn new(payload: &[u8], mss: usize, window: u32, cwnd_enabled: bool) -> Self {
        let segments = segment_payload(payload, mss);
        let total = segments.len() as u32;
        Self {
            segments,
            total,
            base: 0,
            next_seq: 0,
            window: window.max(1),
            timer: TimerWheel::new(),
            acked: BTreeSet::new(),
            rtt: RttEstimator::new(),
            cwnd: cwnd_enabled.then(CongestionControl::new),
            first_sent_at: HashMap::new(),
            last_cum_ack: None,
            dup_count: 0,
            retransmissions: 0,
        }
    }

    fn effective_window(&self) -> u32 {
        match &self.cwnd {
            Some(cc) => self.window.min(cc.window()),
            None => self.window,
        }
    }

    fn fill_window(&mut self, now: Duration, channel: &mut Channel) {
        let w = self.effective_window();
        while self.next_seq < self.base + w && self.next_seq < self.total {
            let seq = self.next_seq;
            channel.send_a_to_b(now, &self.segments[seq as usize]);
            self.timer.arm(seq, now + self.rtt.rto);
            self.first_sent_at.insert(seq, now);
            self.next_seq += 1;
        }
    }

    fn slide_base(&mut self) {
        while self.acked.remove(&self.base) {
            self.base += 1;
        }
    }

    fn retransmit(&mut self, seq: u32, now: Duration, channel: &mut Channel) {
        self.retransmissions += 1;
        self.first_sent_at.remove(&seq); // Karn: disqualify this seq from RTT sampling.
        channel.send_a_to_b(now, &self.segments[seq as usize]);
        self.timer.arm(seq, now + self.rtt.rto);
    }
}

impl SenderMachine for TcpSender {
    fn total_segments(&self) -> u32 {
        self.total
    }

    fn start(&mut self, now: Duration, channel: &mut Channel) {
        self.fill_window(now, channel);
    }

    fn on_ack(&mut self, result: Result<Segment, DecodeError>, now: Duration, channel: &mut Channel) {
        let Ok(Segment::Ack { ack: cumulative, sack }) = result else {
            return;
        };

        if let Some(seq) = sack.as_ref().and_then(|s| s.iter().next().copied()) {
            if seq >= self.base && seq < self.next_seq && self.acked.insert(seq) {
                self.timer.cancel(seq);
                if let Some(send_time) = self.first_sent_at.remove(&seq) {
                    // Karn-eligible: this ack is for a segment never retransmitted.
                    self.rtt.update(now.saturating_sub(send_time));
                }
                if let Some(cc) = self.cwnd.as_mut() {
                    cc.on_new_ack();
                }
                self.slide_base();
                self.fill_window(now, channel);
            }
        }

        match self.last_cum_ack {
            Some(prev) if prev == cumulative => {
                self.dup_count += 1;
                if self.dup_count == DUP_ACKS_FOR_FAST_RETRANSMIT {
                    let retransmit_seq = if cumulative == NO_CUMULATIVE_ACK { 0 } else { cumulative + 1 };
                    if retransmit_seq >= self.base && retransmit_seq < self.next_seq && !self.acked.contains(&retransmit_seq) {
                        log::debug!("tcp: fast retransmit seq {retransmit_seq} on 3rd duplicate ack");
                        self.retransmit(retransmit_seq, now, channel);
                        if let Some(cc) = self.cwnd.as_mut() {
                            cc.on_fast_retransmit();
                        }
                    }
                }
            }
            _ => {
                self.last_cum_ack = Some(cumulative);
                self.dup_count = 0;
            }
        }
    }

    fn poll_timers(&mut self, now: Duration, channel: &mut Channel) {
        for seq in self.timer.pop_due(now) {
            if seq < self.base || seq >= self.next_seq || self.acked.contains(&seq) {
                continue;
            }
            log::debug!("tcp: rto fired for seq {seq}, rto={:?}", self.rtt.rto);
            self.rtt.backoff();
            if let Some(cc) = self.cwnd.as_mut() {
                cc.on_timeout();
            }
            self.retransmit(seq, now, channel);
        }
    }

    fn next_timer_deadline(&mut self) -> Option<Duration> {
        self.timer.next_deadline()
    }

    fn is_complete(&self) -> bool {
        self.base >= self.total
    }

    fn retransmissions(&self) -> u64 {
        self.retransmissions
    }

    fn in_flight(&self) -> u32 {
        self.next_seq - self.base
    }
}

pub struct TcpReceiver {
    expected: u32,
    total: u32,
    window: u32,
    buffer: BTreeMap<u32, Vec<u8>>,
    delivered: Vec<u8>,
}

impl TcpReceiver {
    pub fn new(total: u32, window: u32) -> Self {
        Self { expected: 0, total, window: window.max(1), buffer: BTreeMap::new(), delivered: Vec::new() }
    }

    fn drain_contiguous(&mut self) {
        while let Some(payload) = self.buffer.remove(&self.expected) {
            self.delivered.extend_from_slice(&payload);
            self.expected += 1;
        }
    }

    fn cumulative_ack_field(&self) -> u32 {
        if self.expected == 0 {
            NO_CUMULATIVE_ACK
        } else {
            self.expected - 1
        }
    }
}

impl ReceiverMachine for TcpReceiver {
    fn on_data(&mut self, result: Result<Segment, DecodeError>, now: Duration, channel: &mut Channel) {
        let Ok(Segment::Data { seq, payload }) = result else {
            // Corrupted DATA is indistinguishable from loss: drop silently.
            return;
        };

        if seq < self.expected {
            let sack = [seq].into_iter().collect();
            channel.send_b_to_a(now, &Segment::Ack { ack: self.cumulative_ack_field(), sack: Some(sack) });
            return;
        }
        if seq < self.expected + self.window {
            self.buffer.entry(seq).or_insert(payload);
            if seq == self.expected {
                self.drain_contiguous();
            }
            let sack = [seq].into_iter().collect();
            channel.send_b_to_a(now, &Segment::Ack { ack: self.cumulative_ack_field(), sack: Some(sack) });
        } else {
            log::warn!("tcp: seq {seq} outside receive window [{}, {}), dropping without ack", self.expected, self.expected + self.window);
        }
        debug_assert!(self.buffer.len() as u32 <= self.window);
    }

    fn is_complete(&self) -> bool {
        self.expected >= self.total
    }

    fn delivered_bytes(&self) -> u64 {
        self.delivered.len() as u64
    }

    fn delivered(&self) -> &[u8] {
        &self.delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ChannelConfig;

    fn ideal_channel() -> Channel {
        Channel::new(
            ChannelConfig { loss_prob: 0.0, rtt_ms: 50.0, jitter_ms: 0.0, corrupt_prob: 0.0, reorder_prob: 0.0, loss_schedule: None },
            1,
        )
    }

    #[test]
    fn karn_rule_never_samples_from_a_retransmitted_segment() {
        let mut s = TcpSender::new(&vec![0u8; 4096], 1024, 4, false);
        let mut ch = ideal_channel();
        s.start(Duration::ZERO, &mut ch);
        // force a timeout-driven retransmit of seq 0
        s.timer.cancel(0);
        s.retransmit(0, Duration::from_millis(5), &mut ch);
        assert!(s.first_sent_at.get(&0).is_none());
        // ack arrives for the retransmitted seq: must not feed rtt.update
        let sack = [0u32].into_iter().collect();
        s.on_ack(Ok(Segment::Ack { ack: NO_CUMULATIVE_ACK, sack: Some(sack) }), Duration::from_millis(100), &mut ch);
        assert_eq!(s.rtt.rto, RttEstimator::new().rto);
    }

    #[test]
    fn third_duplicate_ack_triggers_fast_retransmit() {
        let mut s = TcpSender::new(&vec![0u8; 4096], 1024, 8, false);
        let mut ch = ideal_channel();
        s.start(Duration::ZERO, &mut ch);
        let dup = || Segment::Ack { ack: NO_CUMULATIVE_ACK, sack: Some([1u32].into_iter().collect()) };
        s.on_ack(Ok(dup()), Duration::from_millis(9), &mut ch); // establishes the baseline, not a duplicate
        s.on_ack(Ok(dup()), Duration::from_millis(10), &mut ch);
        s.on_ack(Ok(dup()), Duration::from_millis(11), &mut ch);
        let retx_before = s.retransmissions;
        s.on_ack(Ok(dup()), Duration::from_millis(12), &mut ch);
        assert_eq!(s.retransmissions, retx_before + 1);
    }

    #[test]
    fn first_ack_establishes_baseline_without_counting_as_duplicate() {
        let mut s = TcpSender::new(&vec![0u8; 4096], 1024, 8, false);
        let mut ch = ideal_channel();
        s.start(Duration::ZERO, &mut ch);
        let dup = || Segment::Ack { ack: NO_CUMULATIVE_ACK, sack: Some([1u32].into_iter().collect()) };
        s.on_ack(Ok(dup()), Duration::from_millis(9), &mut ch);
        s.on_ack(Ok(dup()), Duration::from_millis(10), &mut ch);
        let retx_before = s.retransmissions;
        s.on_ack(Ok(dup()), Duration::from_millis(11), &mut ch);
        assert_eq!(s.retransmissions, retx_before, "only two duplicates observed, should not fast-retransmit yet");
    }

    #[test]
    fn receiver_acks_every_data_including_before_first_in_order_segment() {
        let mut r = TcpReceiver::new(5, 4);
        let mut ch = ideal_channel();
        r.on_data(Ok(Segment::Data { seq: 1, payload: vec![1] }), Duration::ZERO, &mut ch);
        let (_, bytes) = ch.pop_ready(Duration::from_secs(1)).unwrap();
        assert_eq!(Segment::decode(&bytes).unwrap(), Segment::Ack { ack: NO_CUMULATIVE_ACK, sack: Some([1].into_iter().collect()) });
    }
}
