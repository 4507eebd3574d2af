//! The unreliable channel: an in-process, bidirectional datagram pipe with
//! independent loss, delay+jitter, corruption and reorder, driven by a
//! seeded PRNG so a scenario+seed is fully reproducible.
//!
//! Delivery order is the event heap's time order, not send order — this is
//! how reordering emerges even without the explicit reorder knob; the
//! reorder knob additionally swaps a delivery time with another queued
//! event in the same direction.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::time::Duration;

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use crate::segment::Segment;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dir {
    /// Sender to receiver: carries DATA segments.
    AtoB,
    /// Receiver to sender: carries ACK segments.
    BtoA,
}

#[derive(Debug, Clone)]
pub struct ChannelConfig {
    pub loss_prob: f64,
    pub rtt_ms: f64,
    pub jitter_ms: f64,
    pub corrupt_prob: f64,
    pub reorder_prob: f64,
    pub loss_schedule: Option<LossSchedule>,
}

/// Overrides `loss_prob` with `initial_loss_prob` for sends before
/// simulated time `cutover`, after which the channel reverts to the
/// static `loss_prob`. Lets a scenario model a link that drops everything
/// for a while and then clears up.
#[derive(Debug, Clone, Copy)]
pub struct LossSchedule {
    pub cutover: Duration,
    pub initial_loss_prob: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct EventKey {
    deliver_at: Duration,
    insertion: u64,
}

#[derive(Debug, Clone)]
struct ChannelEvent {
    key: EventKey,
    dir: Dir,
    bytes: Vec<u8>,
}

impl PartialEq for ChannelEvent {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}
impl Eq for ChannelEvent {}
impl PartialOrd for ChannelEvent {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for ChannelEvent {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.key.cmp(&other.key)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ChannelStats {
    pub sent: u64,
    pub dropped: u64,
    pub corrupted: u64,
    pub reordered: u64,
}

pub struct Channel {
    cfg: ChannelConfig,
    heap: BinaryHeap<Reverse<ChannelEvent>>,
    next_insertion: u64,
    loss_rng: Pcg32,
    jitter_rng: Pcg32,
    corrupt_rng: Pcg32,
    reorder_rng: Pcg32,
    stats: ChannelStats,
}

impl Channel {
    pub fn new(cfg: ChannelConfig, seed: u64) -> Self {
        Self {
            cfg,
            heap: BinaryHeap::new(),
            next_insertion: 0,
            loss_rng: Pcg32::seed_from_u64(seed ^ 0x1000_0001),
            jitter_rng: Pcg32::seed_from_u64(seed ^ 0x2000_0002),
            corrupt_rng: Pcg32::seed_from_u64(seed ^ 0x3000_0003),
            reorder_rng: Pcg32::seed_from_u64(seed ^ 0x4000_0004),
            stats: ChannelStats::default(),
        }
    }

    pub fn stats(&self) -> ChannelStats {
        self.stats
    }

    pub fn send_a_to_b(&mut self, now: Duration, seg: &Segment) {
        self.send(now, Dir::AtoB, seg);
    }

    pub fn send_b_to_a(&mut self, now: Duration, seg: &Segment) {
        self.send(now, Dir::BtoA, seg);
    }

    fn send(&mut self, now: Duration, dir: Dir, seg: &Segment) {
        self.stats.sent += 1;
        let loss_prob = match &self.cfg.loss_schedule {
            Some(sched) if now < sched.cutover => sched.initial_loss_prob,
            _ => self.cfg.loss_prob,
        };
        if loss_prob > 0.0 && self.loss_rng.gen_bool(loss_prob.min(1.0)) {
            self.stats.dropped += 1;
            log::trace!("channel: dropped {:?} seq/ack {}", dir, seg.seq_for_log());
            return;
        }

        let mut bytes = seg.encode();
        if self.cfg.corrupt_prob > 0.0 && self.corrupt_rng.gen_bool(self.cfg.corrupt_prob.min(1.0)) {
            Segment::corrupt_encoded(&mut bytes);
            self.stats.corrupted += 1;
            log::trace!("channel: corrupted {:?} seq/ack {}", dir, seg.seq_for_log());
        }

        let one_way = Duration::from_secs_f64((self.cfg.rtt_ms / 2.0 / 1000.0).max(0.0));
        let mut deliver_at = now + one_way;
        if self.cfg.jitter_ms > 0.0 {
            let jitter_ms: f64 = self.jitter_rng.gen_range(-self.cfg.jitter_ms..=self.cfg.jitter_ms);
            deliver_at = offset(deliver_at, jitter_ms).max(now);
        }

        let insertion = self.next_insertion;
        self.next_insertion += 1;
        let mut event = ChannelEvent { key: EventKey { deliver_at, insertion }, dir, bytes };

        if self.cfg.reorder_prob > 0.0 && self.reorder_rng.gen_bool(self.cfg.reorder_prob.min(1.0)) {
            let mut items = std::mem::take(&mut self.heap)
                .into_vec()
                .into_iter()
                .map(|Reverse(e)| e)
                .collect::<Vec<_>>();
            let candidates: Vec<usize> =
                items.iter().enumerate().filter(|(_, e)| e.dir == dir).map(|(i, _)| i).collect();
            if !candidates.is_empty() {
                let pick = candidates[self.reorder_rng.gen_range(0..candidates.len())];
                std::mem::swap(&mut items[pick].key.deliver_at, &mut event.key.deliver_at);
                self.stats.reordered += 1;
                log::trace!(
                    "channel: reordered {:?} seq/ack {} by swapping delivery time with a queued event",
                    dir,
                    seg.seq_for_log()
                );
            }
            self.heap = items.into_iter().map(Reverse).collect();
        }

        log::trace!(
            "channel: scheduled {:?} seq/ack {} for delivery at {:?}",
            event.dir,
            Segment::decode(&event.bytes)
                .map(|s| s.seq_for_log())
                .unwrap_or(u32::MAX),
            event.key.deliver_at
        );
        self.heap.push(Reverse(event));
    }

    pub fn next_event_time(&self) -> Option<Duration> {
        self.heap.peek().map(|Reverse(e)| e.key.deliver_at)
    }

    /// Pops and returns the earliest event if its deadline has arrived.
    pub fn pop_ready(&mut self, now: Duration) -> Option<(Dir, Vec<u8>)> {
        match self.heap.peek() {
            Some(Reverse(e)) if e.key.deliver_at <= now => {
                let Reverse(e) = self.heap.pop().unwrap();
                Some((e.dir, e.bytes))
            }
            _ => None,
        }
    }
}

fn offset(base: Duration, signed_ms: f64) -> Duration {
    let nanos = (base.as_nanos() as i128) + (signed_ms * 1_000_000.0) as i128;
    Duration::from_nanos(nanos.max(0) as u64)
}
