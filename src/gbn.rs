//! Go-Back-N: cumulative ACK, a single shared retransmission timer, and
//! go-back-N retransmit of the whole in-flight window on timeout.

use std::time::Duration;

use crate::channel::Channel;
use crate::protocol::{ReceiverMachine, SenderMachine};
use crate::segment::{segment_payload, DecodeError, Segment};
use crate::timer::TimerWheel;

/// GBN has exactly one timer, for the oldest unacked segment; the wheel is
/// reused with a fixed key since it already gives us lazy cancellation.
const THE_TIMER: u32 = 0;

pub struct GbnSender {
    segments: Vec<Segment>,
    total: u32,
    base: u32,
    next_seq: u32,
    window: u32,
    timeout: Duration,
    timer: TimerWheel,
    retransmissions: u64,
}

impl GbnSender {
    pub fn new(payload: &[u8], mss: usize, window: u32, timeout: Duration) -> Self {
        let segments = segment_payload(payload, mss);
        let total = segments.len() as u32;
        Self { segments, total, base: 0, next_seq: 0, window: window.max(1), timeout, timer: TimerWheel::new(), retransmissions: 0 }
    }

    fn fill_window(&mut self, now: Duration, channel: &mut Channel) {
        while self.next_seq < self.base + self.window && self.next_seq < self.total {
            channel.send_a_to_b(now, &self.segments[self.next_seq as usize]);
            self.next_seq += 1;
        }
        if self.base < self.next_seq && !self.timer.is_armed(THE_TIMER) {
            self.timer.arm(THE_TIMER, now + self.timeout);
        }
    }
}

impl SenderMachine for GbnSender {
    fn total_segments(&self) -> u32 {
        self.total
    }

    fn start(&mut self, now: Duration, channel: &mut Channel) {
        self.fill_window(now, channel);
    }

    fn on_ack(&mut self, result: Result<Segment, DecodeError>, now: Duration, channel: &mut Channel) {
        let Ok(Segment::Ack { ack, .. }) = result else {
            // Corrupted or non-ACK traffic on this direction: treated as loss.
            return;
        };
        let new_base = ack.saturating_add(1);
        if new_base <= self.base {
            // Stale or duplicate cumulative ACK: GBN has no fast retransmit.
            return;
        }
        self.base = new_base.min(self.total);
        if self.base == self.next_seq {
            self.timer.cancel(THE_TIMER);
        } else {
            self.timer.arm(THE_TIMER, now + self.timeout);
        }
        self.fill_window(now, channel);
    }

    fn poll_timers(&mut self, now: Duration, channel: &mut Channel) {
        if self.timer.pop_due(now).is_empty() {
            return;
        }
        self.retransmissions += (self.next_seq - self.base) as u64;
        log::debug!("gbn: timeout, go-back-N retransmitting [{}, {})", self.base, self.next_seq);
        for seq in self.base..self.next_seq {
            channel.send_a_to_b(now, &self.segments[seq as usize]);
        }
        self.timer.arm(THE_TIMER, now + self.timeout);
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

pub struct GbnReceiver {
    expected: u32,
    total: u32,
    delivered: Vec<u8>,
    any_received: bool,
}

impl GbnReceiver {
    pub fn new(total: u32) -> Self {
        Self { expected: 0, total, delivered: Vec::new(), any_received: false }
    }
}

impl ReceiverMachine for GbnReceiver {
    fn on_data(&mut self, result: Result<Segment, DecodeError>, now: Duration, channel: &mut Channel) {
        let ack_and_send = |expected: u32, channel: &mut Channel| {
            channel.send_b_to_a(now, &Segment::Ack { ack: expected - 1, sack: None });
        };

        match result {
            Ok(Segment::Data { seq, payload }) => {
                self.any_received = true;
                if seq == self.expected {
                    self.delivered.extend_from_slice(&payload);
                    self.expected += 1;
                    ack_and_send(self.expected, channel);
                } else if self.expected > 0 {
                    ack_and_send(self.expected, channel);
                }
                // else: out-of-order before anything has ever been received
                // in-order — nothing to cumulatively ack yet, drop silently.
            }
            _ => {
                // Corrupted DATA or stray ACK on this direction: GBN still
                // re-acks the last good cumulative seq, same as a garbled
                // out-of-order arrival, provided we have one to report.
                if self.any_received && self.expected > 0 {
                    ack_and_send(self.expected, channel);
                }
            }
        }
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
