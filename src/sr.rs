//! Selective Repeat: per-segment ACK, per-segment timer, and a receiver
//! buffer for out-of-order arrivals. ACK(a) acknowledges exactly seq `a`,
//! never cumulatively — the essential difference from GBN.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use crate::channel::Channel;
use crate::protocol::{ReceiverMachine, SenderMachine};
use crate::segment::{segment_payload, DecodeError, Segment};
use crate::timer::TimerWheel;

pub struct SrSender {
    segments: Vec<Segment>,
    total: u32,
    base: u32,
    next_seq: u32,
    window: u32,
    timeout: Duration,
    timer: TimerWheel,
    acked: BTreeSet<u32>,
    retransmissions: u64,
}

impl SrSender {
    pub fn new(payload: &[u8], mss: usize, window: u32, timeout: Duration) -> Self {
        let segments = segment_payload(payload, mss);
        let total = segments.len() as u32;
        Self {
            segments,
            total,
            base: 0,
            next_seq: 0,
            window: window.max(1),
            timeout,
            timer: TimerWheel::new(),
            acked: BTreeSet::new(),
            retransmissions: 0,
        }
    }

    /// Effective send window for this tick; overridden by TCP-like to fold
    /// in the congestion window.
    fn effective_window(&self) -> u32 {
        self.window
    }

    fn fill_window(&mut self, now: Duration, channel: &mut Channel) {
        let w = self.effective_window();
        while self.next_seq < self.base + w && self.next_seq < self.total {
            self.send_fresh(self.next_seq, now, channel);
            self.next_seq += 1;
        }
    }

    fn send_fresh(&mut self, seq: u32, now: Duration, channel: &mut Channel) {
        channel.send_a_to_b(now, &self.segments[seq as usize]);
        self.timer.arm(seq, now + self.timeout);
    }

    fn slide_base(&mut self) {
        while self.acked.remove(&self.base) {
            self.base += 1;
        }
    }

    fn apply_ack(&mut self, seq: u32, now: Duration, channel: &mut Channel) -> bool {
        if seq < self.base || seq >= self.next_seq || self.acked.contains(&seq) {
            return false;
        }
        self.acked.insert(seq);
        self.timer.cancel(seq);
        self.slide_base();
        self.fill_window(now, channel);
        true
    }
}

impl SenderMachine for SrSender {
    fn total_segments(&self) -> u32 {
        self.total
    }

    fn start(&mut self, now: Duration, channel: &mut Channel) {
        self.fill_window(now, channel);
    }

    fn on_ack(&mut self, result: Result<Segment, DecodeError>, now: Duration, channel: &mut Channel) {
        let Ok(Segment::Ack { ack, .. }) = result else {
            return;
        };
        self.apply_ack(ack, now, channel);
    }

    fn poll_timers(&mut self, now: Duration, channel: &mut Channel) {
        for seq in self.timer.pop_due(now) {
            if seq < self.base || seq >= self.next_seq || self.acked.contains(&seq) {
                continue;
            }
            self.retransmissions += 1;
            log::debug!("sr: timeout, retransmitting seq {seq}");
            self.send_fresh(seq, now, channel);
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

pub struct SrReceiver {
    expected: u32,
    total: u32,
    window: u32,
    buffer: BTreeMap<u32, Vec<u8>>,
    delivered: Vec<u8>,
}

impl SrReceiver {
    pub fn new(total: u32, window: u32) -> Self {
        Self { expected: 0, total, window: window.max(1), buffer: BTreeMap::new(), delivered: Vec::new() }
    }

    fn drain_contiguous(&mut self) {
        while let Some(payload) = self.buffer.remove(&self.expected) {
            self.delivered.extend_from_slice(&payload);
            self.expected += 1;
        }
    }
}

impl ReceiverMachine for SrReceiver {
    fn on_data(&mut self, result: Result<Segment, DecodeError>, now: Duration, channel: &mut Channel) {
        let Ok(Segment::Data { seq, payload }) = result else {
            // Corrupted DATA is indistinguishable from loss: drop silently.
            return;
        };
        if seq < self.expected {
            // Already delivered; re-ack so a lost ACK doesn't stall the sender.
            channel.send_b_to_a(now, &Segment::Ack { ack: seq, sack: None });
        } else if seq < self.expected + self.window {
            self.buffer.entry(seq).or_insert(payload);
            channel.send_b_to_a(now, &Segment::Ack { ack: seq, sack: None });
            if seq == self.expected {
                self.drain_contiguous();
            }
        } else {
            log::warn!("sr: seq {seq} outside receive window [{}, {}), dropping without ack", self.expected, self.expected + self.window);
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
    fn receiver_buffers_out_of_order_then_delivers_in_order() {
        let mut r = SrReceiver::new(3, 4);
        let mut ch = ideal_channel();
        r.on_data(Ok(Segment::Data { seq: 2, payload: vec![2] }), Duration::ZERO, &mut ch);
        assert_eq!(r.delivered_bytes(), 0);
        r.on_data(Ok(Segment::Data { seq: 0, payload: vec![0] }), Duration::ZERO, &mut ch);
        assert_eq!(r.delivered(), &[0]);
        r.on_data(Ok(Segment::Data { seq: 1, payload: vec![1] }), Duration::ZERO, &mut ch);
        assert_eq!(r.delivered(), &[0, 1, 2]);
        assert!(r.is_complete());
    }

    #[test]
    fn receiver_never_buffers_more_than_window() {
        let mut r = SrReceiver::new(10, 3);
        let mut ch = ideal_channel();
        for seq in 0..10u32 {
            r.on_data(Ok(Segment::Data { seq, payload: vec![seq as u8] }), Duration::ZERO, &mut ch);
            assert!(r.buffer.len() as u32 <= 3);
        }
    }

    #[test]
    fn ack_acknowledges_exactly_its_own_seq_not_cumulative() {
        let mut s = SrSender::new(&vec![0u8; 4096], 1024, 4, Duration::from_millis(100));
        let mut ch = ideal_channel();
        s.start(Duration::ZERO, &mut ch);
        s.on_ack(Ok(Segment::Ack { ack: 2, sack: None }), Duration::from_millis(10), &mut ch);
        assert_eq!(s.base, 0);
        assert!(s.acked.contains(&2));
        s.on_ack(Ok(Segment::Ack { ack: 0, sack: None }), Duration::from_millis(11), &mut ch);
        s.on_ack(Ok(Segment::Ack { ack: 1, sack: None }), Duration::from_millis(12), &mut ch);
        assert_eq!(s.base, 3);
    }

    #[test]
    fn idempotent_ack_replay_is_a_no_op() {
        let mut s = SrSender::new(&vec![0u8; 4096], 1024, 4, Duration::from_millis(100));
        let mut ch = ideal_channel();
        s.start(Duration::ZERO, &mut ch);
        s.on_ack(Ok(Segment::Ack { ack: 0, sack: None }), Duration::from_millis(10), &mut ch);
        let base = s.base;
        let retx = s.retransmissions;
        s.on_ack(Ok(Segment::Ack { ack: 0, sack: None }), Duration::from_millis(20), &mut ch);
        assert_eq!(s.base, base);
        assert_eq!(s.retransmissions, retx);
    }
}
