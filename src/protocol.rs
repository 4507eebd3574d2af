//! The sender/receiver interface the driver's event loop steps against.
//! Each protocol (GBN, SR, TCP-like) implements these as an explicit state
//! machine advanced by an event — never by blocking — which is what makes
//! the cooperative, deterministic simulated-time driver possible.

use std::time::Duration;

use crate::channel::Channel;
use crate::segment::{DecodeError, Segment};

pub trait SenderMachine {
    /// Total number of DATA segments this transfer will send.
    fn total_segments(&self) -> u32;

    /// Sends the initial window of segments.
    fn start(&mut self, now: Duration, channel: &mut Channel);

    /// Handles an inbound segment on the B->A direction. A decode error
    /// (corruption) is handed through unchanged; each protocol decides how
    /// to treat it.
    fn on_ack(&mut self, result: Result<Segment, DecodeError>, now: Duration, channel: &mut Channel);

    /// Fires every due timer at `now` and acts on them (retransmit, rearm).
    fn poll_timers(&mut self, now: Duration, channel: &mut Channel);

    /// The next armed timer deadline, if any.
    fn next_timer_deadline(&mut self) -> Option<Duration>;

    /// True once every segment has been cumulatively/individually acked.
    fn is_complete(&self) -> bool;

    fn retransmissions(&self) -> u64;

    /// `next_seq - base`: in-flight segment count, checked against the
    /// window invariant by tests.
    fn in_flight(&self) -> u32;
}

pub trait ReceiverMachine {
    /// Handles an inbound segment on the A->B direction.
    fn on_data(&mut self, result: Result<Segment, DecodeError>, now: Duration, channel: &mut Channel);

    /// True once every segment through `total_segments` has been delivered.
    fn is_complete(&self) -> bool;

    fn delivered_bytes(&self) -> u64;

    /// The in-order byte stream delivered so far.
    fn delivered(&self) -> &[u8];
}
