//! Reception statistics
//!
//! The receive loop records every observed packet into a
//! [`ReceptionStatsTracker`]; readers take a [`ReceptionStats`] snapshot under
//! the same lock and derive rates from it.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::{is_sequence_newer, RtpSequenceNumber, RtpTimestamp};

/// Snapshot of the counters for one session
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReceptionStats {
    /// Packets decoded from the wire, duplicates included
    pub packets_received: u64,

    /// Frames handed to the consumer
    pub frames_delivered: u64,

    /// Packets dropped because their sequence number was already seen
    pub duplicates: u64,

    /// Packets that arrived out of order or after a gap
    pub out_of_order: u64,

    /// Datagrams skipped because they could not be decoded
    pub decode_errors: u64,

    /// First sequence number received
    pub base_seq: Option<RtpSequenceNumber>,

    /// Highest sequence number seen, extended with wrap cycles
    pub highest_seq: u32,

    /// Timestamp of the first packet
    pub first_timestamp: Option<RtpTimestamp>,

    /// Timestamp of the newest packet
    pub last_timestamp: Option<RtpTimestamp>,

    /// Timestamp ticks per second
    pub clock_rate: u32,
}

impl ReceptionStats {
    /// Stream time covered so far, in seconds
    ///
    /// Derived from the sender timestamps, not from wall-clock time. Zero
    /// until two distinct timestamps have been observed.
    pub fn elapsed_secs(&self) -> f64 {
        match (self.first_timestamp, self.last_timestamp) {
            (Some(first), Some(last)) if self.clock_rate > 0 => {
                last.wrapping_sub(first) as f64 / self.clock_rate as f64
            }
            _ => 0.0,
        }
    }

    /// Packets the sequence range says should have arrived
    pub fn packets_expected(&self) -> u64 {
        match self.base_seq {
            Some(base) => (self.highest_seq as u64 + 1).saturating_sub(base as u64),
            None => 0,
        }
    }

    /// Packets missing from the sequence range
    pub fn packets_lost(&self) -> u64 {
        let unique = self.packets_received.saturating_sub(self.duplicates);
        self.packets_expected().saturating_sub(unique)
    }

    /// Delivered frames per second
    pub fn frame_rate(&self) -> f64 {
        self.per_second(self.frames_delivered)
    }

    /// Lost packets per second
    pub fn loss_rate(&self) -> f64 {
        self.per_second(self.packets_lost())
    }

    /// Out-of-order events per second
    pub fn out_of_order_rate(&self) -> f64 {
        self.per_second(self.out_of_order)
    }

    fn per_second(&self, count: u64) -> f64 {
        let elapsed = self.elapsed_secs();
        if elapsed > 0.0 {
            count as f64 / elapsed
        } else {
            0.0
        }
    }
}

#[derive(Debug, Default)]
struct TrackerState {
    stats: ReceptionStats,
    max_seq: Option<RtpSequenceNumber>,
    cycles: u32,
}

/// Shared reception counters
///
/// Cloning yields another handle to the same counters.
#[derive(Debug, Clone)]
pub struct ReceptionStatsTracker {
    inner: Arc<Mutex<TrackerState>>,
    clock_rate: u32,
}

impl ReceptionStatsTracker {
    /// Create a tracker for a stream with the given timestamp clock rate
    pub fn new(clock_rate: u32) -> Self {
        let tracker = Self {
            inner: Arc::new(Mutex::new(TrackerState::default())),
            clock_rate,
        };
        tracker.reset();
        tracker
    }

    /// Get a copy of the current statistics
    pub fn snapshot(&self) -> ReceptionStats {
        self.inner.lock().stats.clone()
    }

    /// Reset all statistics
    pub fn reset(&self) {
        let mut state = self.inner.lock();
        *state = TrackerState::default();
        state.stats.clock_rate = self.clock_rate;
    }

    /// Record a decoded packet, duplicates included
    pub fn record_received(&self, seq: RtpSequenceNumber, timestamp: RtpTimestamp) {
        let mut state = self.inner.lock();
        state.stats.packets_received += 1;

        match state.max_seq {
            None => {
                state.max_seq = Some(seq);
                state.stats.base_seq = Some(seq);
                state.stats.highest_seq = seq as u32;
                state.stats.first_timestamp = Some(timestamp);
                state.stats.last_timestamp = Some(timestamp);
            }
            Some(max_seq) if is_sequence_newer(seq, max_seq) => {
                if seq < max_seq {
                    state.cycles += 1;
                }
                state.max_seq = Some(seq);
                state.stats.highest_seq = (state.cycles << 16) | seq as u32;
                state.stats.last_timestamp = Some(timestamp);
            }
            Some(_) => {}
        }
    }

    pub fn record_duplicate(&self) {
        self.inner.lock().stats.duplicates += 1;
    }

    pub fn record_out_of_order(&self) {
        self.inner.lock().stats.out_of_order += 1;
    }

    pub fn record_delivered(&self) {
        self.inner.lock().stats.frames_delivered += 1;
    }

    pub fn record_decode_error(&self) {
        self.inner.lock().stats.decode_errors += 1;
    }
}

impl Default for ReceptionStatsTracker {
    fn default() -> Self {
        Self::new(90_000) // Default 90kHz video clock
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_stats_rates_are_zero() {
        let stats = ReceptionStatsTracker::new(90_000).snapshot();

        assert_eq!(stats.elapsed_secs(), 0.0);
        assert_eq!(stats.frame_rate(), 0.0);
        assert_eq!(stats.loss_rate(), 0.0);
        assert_eq!(stats.out_of_order_rate(), 0.0);
        assert_eq!(stats.packets_lost(), 0);
    }

    #[test]
    fn test_single_packet_has_no_elapsed_time() {
        let tracker = ReceptionStatsTracker::new(90_000);
        tracker.record_received(1, 3000);
        tracker.record_delivered();

        let stats = tracker.snapshot();
        assert_eq!(stats.elapsed_secs(), 0.0);
        assert_eq!(stats.frame_rate(), 0.0);
    }

    #[test]
    fn test_zero_clock_rate_does_not_divide() {
        let tracker = ReceptionStatsTracker::new(0);
        tracker.record_received(1, 0);
        tracker.record_received(2, 9000);

        let stats = tracker.snapshot();
        assert_eq!(stats.elapsed_secs(), 0.0);
        assert_eq!(stats.loss_rate(), 0.0);
    }

    #[test]
    fn test_rates_over_timestamp_span() {
        let tracker = ReceptionStatsTracker::new(1000);
        for seq in 1..=10u16 {
            if seq == 5 {
                continue;
            }
            tracker.record_received(seq, seq as u32 * 100);
            tracker.record_delivered();
        }
        tracker.record_out_of_order();

        let stats = tracker.snapshot();
        // Timestamps 100..=1000 at 1kHz
        assert!((stats.elapsed_secs() - 0.9).abs() < 1e-9);
        assert_eq!(stats.packets_expected(), 10);
        assert_eq!(stats.packets_lost(), 1);
        assert!((stats.frame_rate() - 9.0 / 0.9).abs() < 1e-9);
        assert!((stats.loss_rate() - 1.0 / 0.9).abs() < 1e-9);
        assert!((stats.out_of_order_rate() - 1.0 / 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_duplicates_do_not_hide_loss() {
        let tracker = ReceptionStatsTracker::new(1000);
        tracker.record_received(1, 0);
        tracker.record_received(1, 0);
        tracker.record_duplicate();
        tracker.record_received(3, 200);

        let stats = tracker.snapshot();
        assert_eq!(stats.packets_received, 3);
        assert_eq!(stats.packets_lost(), 1);
    }

    #[test]
    fn test_highest_sequence_extends_across_wrap() {
        let tracker = ReceptionStatsTracker::new(1000);
        tracker.record_received(65534, 0);
        tracker.record_received(65535, 10);
        tracker.record_received(0, 20);
        tracker.record_received(1, 30);

        let stats = tracker.snapshot();
        assert_eq!(stats.highest_seq, (1 << 16) | 1);
        assert_eq!(stats.packets_expected(), 4);
        assert_eq!(stats.packets_lost(), 0);
        assert_eq!(stats.last_timestamp, Some(30));
    }

    #[test]
    fn test_late_packet_keeps_newest_timestamp() {
        let tracker = ReceptionStatsTracker::new(1000);
        tracker.record_received(1, 100);
        tracker.record_received(3, 300);
        tracker.record_received(2, 200);

        let stats = tracker.snapshot();
        assert_eq!(stats.highest_seq, 3);
        assert_eq!(stats.last_timestamp, Some(300));
    }

    #[test]
    fn test_reset_clears_counters() {
        let tracker = ReceptionStatsTracker::new(8000);
        tracker.record_received(7, 1);
        tracker.record_delivered();
        tracker.record_decode_error();

        tracker.reset();

        let stats = tracker.snapshot();
        assert_eq!(stats.packets_received, 0);
        assert_eq!(stats.frames_delivered, 0);
        assert_eq!(stats.decode_errors, 0);
        assert_eq!(stats.base_seq, None);
        assert_eq!(stats.clock_rate, 8000);
    }
}
