//! Receive window for media packets
//!
//! The window classifies every arriving packet against the highest sequence
//! number seen so far:
//!
//! - a sequence number already in the window is a duplicate and is dropped;
//! - `highest + 1` is in order and goes out at once;
//! - anything else counts as an out-of-order event and is parked for a delay
//!   that grows with the wall-clock time since the last delivery and the
//!   timestamp gap to the last delivered packet.
//!
//! A parked packet is released when it is the next expected one or when its
//! delay expires, so a missing packet that turns up while its successor
//! waits is delivered first. An in-order packet never waits for parked
//! packets: delivering it moves the cursor past them, and they go out on
//! their own once their delay expires.
//!
//! The very first packet of a session is held for a warm-up delay, and
//! nothing is released until that delay has passed.
//!
//! All methods take the current instant as a parameter, so the window holds
//! no clock of its own.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::packet::RtpPacket;
use crate::session::ReceiverConfig;
use crate::stats::ReceptionStatsTracker;
use crate::{is_sequence_newer, RtpSequenceNumber, RtpTimestamp};

/// A packet leaving the window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleasedPacket {
    /// The packet to deliver
    pub packet: RtpPacket,

    /// How long the packet waited in the window
    pub held_for: Duration,
}

#[derive(Debug)]
struct ParkedPacket {
    packet: RtpPacket,
    arrived_at: Instant,
    release_at: Instant,
}

#[derive(Debug)]
enum Slot {
    Parked(ParkedPacket),
    Released,
}

/// Reorder and pacing state for one session
///
/// Owned by exactly one receive loop at a time.
#[derive(Debug)]
pub struct ReorderBuffer {
    config: ReceiverConfig,
    stats: ReceptionStatsTracker,

    /// Highest sequence number seen
    highest_seq: Option<RtpSequenceNumber>,

    /// Next sequence number to hand out
    next_seq: Option<RtpSequenceNumber>,

    last_delivered_ts: Option<RtpTimestamp>,
    last_delivery_at: Option<Instant>,
    warmup_until: Option<Instant>,

    /// Every sequence number still remembered, parked or already released
    slots: HashMap<RtpSequenceNumber, Slot>,

    /// Remembered sequence numbers in arrival order
    retention: VecDeque<RtpSequenceNumber>,

    /// Sequence numbers of parked packets
    parked: Vec<RtpSequenceNumber>,
}

impl ReorderBuffer {
    /// Create an empty window reporting into `stats`
    pub fn new(config: ReceiverConfig, stats: ReceptionStatsTracker) -> Self {
        Self {
            config,
            stats,
            highest_seq: None,
            next_seq: None,
            last_delivered_ts: None,
            last_delivery_at: None,
            warmup_until: None,
            slots: HashMap::new(),
            retention: VecDeque::new(),
            parked: Vec::new(),
        }
    }

    /// Add an arriving packet
    ///
    /// Returns the packets that can be delivered right away, in delivery order.
    pub fn push(&mut self, packet: RtpPacket, now: Instant) -> Vec<ReleasedPacket> {
        let seq = packet.sequence_number();
        let ts = packet.timestamp();

        self.stats.record_received(seq, ts);

        if self.slots.contains_key(&seq) {
            self.stats.record_duplicate();
            trace!("Duplicate packet with seq={}", seq);
            return Vec::new();
        }

        let highest = match self.highest_seq {
            Some(highest) => highest,
            None => {
                let release_at = now + self.config.warmup_delay();
                self.highest_seq = Some(seq);
                self.next_seq = Some(seq);
                self.warmup_until = Some(release_at);
                debug!("First packet seq={}, holding for warm-up", seq);
                self.park(packet, now, release_at);
                return self.poll(now);
            }
        };

        if seq == highest.wrapping_add(1) {
            self.highest_seq = Some(seq);

            if !self.warming_up(now) {
                self.remember(seq, Slot::Released);
                let mut released = vec![self.deliver(packet, Duration::ZERO, now)];
                released.extend(self.poll(now));
                return released;
            }

            self.park(packet, now, now);
        } else {
            self.stats.record_out_of_order();
            if is_sequence_newer(seq, highest) {
                self.highest_seq = Some(seq);
            }

            let delay = self.adaptive_delay(ts, now);
            debug!(
                "Out-of-order packet seq={} (highest={}), holding for {:?}",
                seq, highest, delay
            );
            self.park(packet, now, now + delay);
        }

        self.poll(now)
    }

    /// Release every packet whose turn has come
    pub fn poll(&mut self, now: Instant) -> Vec<ReleasedPacket> {
        let mut released = Vec::new();

        loop {
            let overflowing = self.parked.len() > self.config.max_parked_packets;
            if self.warming_up(now) && !overflowing {
                break;
            }

            let next = if overflowing {
                self.oldest_parked()
            } else {
                self.next_to_release(now)
            };

            match next.and_then(|seq| self.release(seq, now)) {
                Some(packet) => released.push(packet),
                None => break,
            }
        }

        released
    }

    /// Earliest instant at which [`poll`](Self::poll) may release something
    ///
    /// Only the packets that can go next are considered: late packets and the
    /// oldest packet at or past the next expected sequence number.
    pub fn next_release_at(&self) -> Option<Instant> {
        let release_at = |seq: &RtpSequenceNumber| match self.slots.get(seq) {
            Some(Slot::Parked(parked)) => Some(parked.release_at),
            _ => None,
        };

        let late_at = self
            .parked
            .iter()
            .filter(|seq| self.is_late(**seq))
            .filter_map(release_at)
            .min();
        let head_at = self
            .parked
            .iter()
            .filter(|seq| !self.is_late(**seq))
            .min_by_key(|seq| self.order_key(**seq))
            .and_then(release_at);

        let next = match (late_at, head_at) {
            (Some(a), Some(b)) => a.min(b),
            (a, b) => a.or(b)?,
        };

        match self.warmup_until {
            Some(warmup_until) => Some(next.max(warmup_until)),
            None => Some(next),
        }
    }

    /// Highest sequence number seen
    pub fn highest_seq(&self) -> Option<RtpSequenceNumber> {
        self.highest_seq
    }

    /// Number of packets waiting for release
    pub fn parked_len(&self) -> usize {
        self.parked.len()
    }

    /// Number of sequence numbers remembered for duplicate detection
    pub fn retained_len(&self) -> usize {
        self.slots.len()
    }

    /// Statistics handle this window reports into
    pub fn stats(&self) -> &ReceptionStatsTracker {
        &self.stats
    }

    /// Record a datagram that could not be decoded
    pub fn record_decode_error(&self) {
        self.stats.record_decode_error();
    }

    /// Forget all packets and counters
    pub fn reset(&mut self) {
        self.highest_seq = None;
        self.next_seq = None;
        self.last_delivered_ts = None;
        self.last_delivery_at = None;
        self.warmup_until = None;
        self.slots.clear();
        self.retention.clear();
        self.parked.clear();
        self.stats.reset();
    }

    fn warming_up(&self, now: Instant) -> bool {
        matches!(self.warmup_until, Some(until) if now < until)
    }

    /// Delay for a packet that broke the sequence
    ///
    /// Proportional to the time since the last delivery times the timestamp
    /// distance to the last delivered packet, capped at the configured maximum.
    fn adaptive_delay(&self, ts: RtpTimestamp, now: Instant) -> Duration {
        let (last_at, last_ts) = match (self.last_delivery_at, self.last_delivered_ts) {
            (Some(at), Some(ts)) => (at, ts),
            _ => return Duration::ZERO,
        };

        let max_delay = self.config.max_reorder_delay();
        let elapsed = now.saturating_duration_since(last_at);
        let gap = ts.wrapping_sub(last_ts).min(last_ts.wrapping_sub(ts));
        let secs = elapsed.as_secs_f64() * gap as f64 * self.config.timestamp_gap_weight;

        if !secs.is_finite() || secs <= 0.0 {
            Duration::ZERO
        } else if secs >= max_delay.as_secs_f64() {
            max_delay
        } else {
            Duration::from_secs_f64(secs)
        }
    }

    /// Sort key placing sequence numbers in stream order around the next expected one
    fn order_key(&self, seq: RtpSequenceNumber) -> u16 {
        let origin = self.next_seq.unwrap_or(seq).wrapping_sub(0x8000);
        seq.wrapping_sub(origin)
    }

    /// Whether the packet is older than the next expected one
    fn is_late(&self, seq: RtpSequenceNumber) -> bool {
        matches!(self.next_seq, Some(next) if is_sequence_newer(next, seq))
    }

    fn is_due(&self, seq: RtpSequenceNumber, now: Instant) -> bool {
        match self.slots.get(&seq) {
            Some(Slot::Parked(parked)) => parked.release_at <= now,
            _ => true,
        }
    }

    fn oldest_parked(&self) -> Option<RtpSequenceNumber> {
        self.parked.iter().copied().min_by_key(|seq| self.order_key(*seq))
    }

    /// Pick the parked packet to release next, if any may go now
    ///
    /// Late packets go out once their delay has run out without holding up
    /// the rest. Otherwise the oldest packet at or past the next expected
    /// sequence number goes out when it is that number or when it is due.
    fn next_to_release(&self, now: Instant) -> Option<RtpSequenceNumber> {
        let late = self
            .parked
            .iter()
            .copied()
            .filter(|seq| self.is_late(*seq) && self.is_due(*seq, now))
            .min_by_key(|seq| self.order_key(*seq));
        if late.is_some() {
            return late;
        }

        let head = self
            .parked
            .iter()
            .copied()
            .filter(|seq| !self.is_late(*seq))
            .min_by_key(|seq| self.order_key(*seq))?;

        if Some(head) == self.next_seq || self.is_due(head, now) {
            Some(head)
        } else {
            None
        }
    }

    fn park(&mut self, packet: RtpPacket, now: Instant, release_at: Instant) {
        let seq = packet.sequence_number();
        self.parked.push(seq);
        self.remember(
            seq,
            Slot::Parked(ParkedPacket {
                packet,
                arrived_at: now,
                release_at,
            }),
        );
    }

    fn release(&mut self, seq: RtpSequenceNumber, now: Instant) -> Option<ReleasedPacket> {
        self.parked.retain(|parked| *parked != seq);

        let parked = match self.slots.insert(seq, Slot::Released) {
            Some(Slot::Parked(parked)) => parked,
            _ => return None,
        };

        let held_for = now.saturating_duration_since(parked.arrived_at);
        Some(self.deliver(parked.packet, held_for, now))
    }

    fn deliver(&mut self, packet: RtpPacket, held_for: Duration, now: Instant) -> ReleasedPacket {
        let seq = packet.sequence_number();
        match self.next_seq {
            Some(next) if next == seq || is_sequence_newer(seq, next) => {
                if next != seq {
                    debug!("Delivering seq={} ahead of missing seq={}", seq, next);
                }
                self.next_seq = Some(seq.wrapping_add(1));
            }
            Some(next) => trace!("Late packet seq={} released behind next={}", seq, next),
            None => self.next_seq = Some(seq.wrapping_add(1)),
        }

        self.last_delivered_ts = Some(packet.timestamp());
        self.last_delivery_at = Some(now);
        self.stats.record_delivered();

        ReleasedPacket { packet, held_for }
    }

    fn remember(&mut self, seq: RtpSequenceNumber, slot: Slot) {
        self.slots.insert(seq, slot);
        self.retention.push_back(seq);

        while self.slots.len() > self.config.max_retained_packets {
            let position = self
                .retention
                .iter()
                .position(|seq| matches!(self.slots.get(seq), Some(Slot::Released)));

            match position.and_then(|index| self.retention.remove(index)) {
                Some(evicted) => {
                    self.slots.remove(&evicted);
                }
                None => break,
            }
        }
    }
}
