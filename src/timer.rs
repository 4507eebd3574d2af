//! Per-segment retransmission timers: a `(deadline, seq)` min-heap with lazy
//! cancellation — a timer wheel would be overkill at the window sizes this
//! testbed runs (`W <= 64`).
//!
//! GBN uses a single logical timer (always keyed on a fixed sentinel seq);
//! SR and the TCP-like protocol arm one timer per outstanding segment.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Entry {
    deadline: Duration,
    seq: u32,
    generation: u64,
}

#[derive(Debug, Default)]
pub struct TimerWheel {
    heap: BinaryHeap<Reverse<Entry>>,
    generation: HashMap<u32, u64>,
}

impl TimerWheel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms (or re-arms) the timer for `seq` at `deadline`. Any previously
    /// armed timer for the same seq is implicitly superseded: it will be
    /// skipped as stale when it's popped.
    pub fn arm(&mut self, seq: u32, deadline: Duration) {
        let generation = self.generation.entry(seq).or_insert(0);
        *generation += 1;
        self.heap.push(Reverse(Entry { deadline, seq, generation: *generation }));
    }

    /// Cancels the timer for `seq`, if any. Future pops for this seq are
    /// dropped as stale.
    pub fn cancel(&mut self, seq: u32) {
        self.generation.remove(&seq);
    }

    pub fn is_armed(&self, seq: u32) -> bool {
        self.generation.contains_key(&seq)
    }

    /// The next deadline among still-valid (non-cancelled) entries, without
    /// consuming it. Stale entries at the top are discarded as a side effect.
    pub fn next_deadline(&mut self) -> Option<Duration> {
        self.drop_stale_top();
        self.heap.peek().map(|Reverse(e)| e.deadline)
    }

    /// Pops every valid timer whose deadline is `<= now`, returning the seqs
    /// that fired. A fired timer is consumed — the sender must re-arm it
    /// explicitly if it wants another retransmission deadline.
    pub fn pop_due(&mut self, now: Duration) -> Vec<u32> {
        let mut fired = Vec::new();
        loop {
            match self.heap.peek() {
                Some(Reverse(e)) if e.deadline <= now => {
                    let Reverse(entry) = self.heap.pop().unwrap();
                    if self.generation.get(&entry.seq) == Some(&entry.generation) {
                        self.generation.remove(&entry.seq);
                        fired.push(entry.seq);
                    }
                }
                _ => break,
            }
        }
        fired
    }

    fn drop_stale_top(&mut self) {
        while let Some(Reverse(e)) = self.heap.peek() {
            if self.generation.get(&e.seq) == Some(&e.generation) {
                break;
            }
            self.heap.pop();
        }
    }
}
