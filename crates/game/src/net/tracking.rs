use std::collections::VecDeque;

use super::protocol::sequence_greater_than;

#[derive(Debug, Clone)]
pub struct PendingPacket {
    pub sequence: u32,
    pub send_time: f64,
    pub acked: bool,
}

/// Sender side of the packet ack scheme: remembers what went out and turns
/// incoming `(ack, ack_bitfield)` pairs into acknowledged sequences.
#[derive(Debug)]
pub struct AckTracker {
    pending: VecDeque<PendingPacket>,
    max_pending: usize,
    srtt_ms: f32,
    rtt_var_ms: f32,
}

impl AckTracker {
    pub fn new(max_pending: usize) -> Self {
        Self {
            pending: VecDeque::with_capacity(max_pending),
            max_pending,
            srtt_ms: 100.0,
            rtt_var_ms: 50.0,
        }
    }

    /// Returns the sequence evicted to make room, if any. Its contents will
    /// never be reported as acked.
    pub fn track_packet(&mut self, sequence: u32, now: f64) -> Option<u32> {
        let mut evicted = None;
        while self.pending.len() >= self.max_pending {
            if let Some(old) = self.pending.pop_front() {
                if !old.acked {
                    evicted = Some(old.sequence);
                }
            }
        }

        self.pending.push_back(PendingPacket {
            sequence,
            send_time: now,
            acked: false,
        });

        evicted
    }

    pub fn process_ack(&mut self, ack: u32, ack_bitfield: u32, now: f64) -> Vec<u32> {
        let mut acked_sequences = Vec::new();
        let mut rtt_samples = Vec::new();

        for pending in &mut self.pending {
            if pending.acked {
                continue;
            }

            let is_acked = if pending.sequence == ack {
                true
            } else if sequence_greater_than(ack, pending.sequence) {
                let diff = ack.wrapping_sub(pending.sequence);
                diff <= 32 && (ack_bitfield & (1 << (diff - 1))) != 0
            } else {
                false
            };

            if is_acked {
                pending.acked = true;
                acked_sequences.push(pending.sequence);
                rtt_samples.push(((now - pending.send_time) * 1000.0) as f32);
            }
        }

        for rtt in rtt_samples {
            self.update_rtt(rtt);
        }

        while self.pending.front().is_some_and(|p| p.acked) {
            self.pending.pop_front();
        }

        acked_sequences
    }

    fn update_rtt(&mut self, rtt: f32) {
        const ALPHA: f32 = 0.125;
        const BETA: f32 = 0.25;

        let diff = (rtt - self.srtt_ms).abs();
        self.rtt_var_ms = (1.0 - BETA) * self.rtt_var_ms + BETA * diff;
        self.srtt_ms = (1.0 - ALPHA) * self.srtt_ms + ALPHA * rtt;
    }

    pub fn srtt_ms(&self) -> f32 {
        self.srtt_ms
    }

    pub fn rtt_var_ms(&self) -> f32 {
        self.rtt_var_ms
    }

    pub fn unacked_count(&self) -> usize {
        self.pending.iter().filter(|p| !p.acked).count()
    }
}

/// Receiver side: drops duplicate packets and produces the ack data that goes
/// back in every outgoing header.
#[derive(Debug)]
pub struct ReceiveTracker {
    last_received: u32,
    received_bitfield: u32,
    recent_sequences: VecDeque<u32>,
    max_recent: usize,
}

impl Default for ReceiveTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ReceiveTracker {
    pub fn new() -> Self {
        Self {
            last_received: 0,
            received_bitfield: 0,
            recent_sequences: VecDeque::with_capacity(128),
            max_recent: 128,
        }
    }

    /// Senders start numbering at 1, so an untouched tracker acks nothing.
    pub fn record_received(&mut self, sequence: u32) -> bool {
        if sequence == 0 || self.recent_sequences.contains(&sequence) {
            return false;
        }

        if self.recent_sequences.len() >= self.max_recent {
            self.recent_sequences.pop_front();
        }
        self.recent_sequences.push_back(sequence);

        if sequence_greater_than(sequence, self.last_received) {
            let diff = sequence.wrapping_sub(self.last_received);
            if self.last_received != 0 && diff <= 32 {
                self.received_bitfield =
                    self.received_bitfield.checked_shl(diff).unwrap_or(0) | (1 << (diff - 1));
            } else {
                self.received_bitfield = 0;
            }
            self.last_received = sequence;
        } else {
            let diff = self.last_received.wrapping_sub(sequence);
            if diff > 0 && diff <= 32 {
                self.received_bitfield |= 1 << (diff - 1);
            }
        }

        true
    }

    pub fn ack_data(&self) -> (u32, u32) {
        (self.last_received, self.received_bitfield)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_receive_tracker_bitfield() {
        let mut tracker = ReceiveTracker::new();

        tracker.record_received(1);
        tracker.record_received(2);
        tracker.record_received(3);

        let (ack, bitfield) = tracker.ack_data();
        assert_eq!(ack, 3);
        assert_eq!(bitfield & 0b11, 0b11);
    }

    #[test]
    fn test_receive_tracker_out_of_order() {
        let mut tracker = ReceiveTracker::new();

        tracker.record_received(3);
        tracker.record_received(1);
        tracker.record_received(2);

        let (ack, bitfield) = tracker.ack_data();
        assert_eq!(ack, 3);
        assert_eq!(bitfield & 0b11, 0b11);
    }

    #[test]
    fn test_gap_is_not_acked() {
        let mut tracker = ReceiveTracker::new();

        tracker.record_received(1);
        tracker.record_received(3);

        let (ack, bitfield) = tracker.ack_data();
        assert_eq!(ack, 3);
        assert_eq!(bitfield & 0b01, 0, "sequence 2 never arrived");
        assert_eq!(bitfield & 0b10, 0b10);
    }

    #[test]
    fn test_duplicate_detection() {
        let mut tracker = ReceiveTracker::new();

        assert!(tracker.record_received(1));
        assert!(!tracker.record_received(1));
        assert!(tracker.record_received(2));
        assert!(!tracker.record_received(0));
    }

    #[test]
    fn test_fresh_tracker_acks_nothing() {
        let mut sender = AckTracker::new(32);
        sender.track_packet(1, 0.0);

        let receiver = ReceiveTracker::new();
        let (ack, bitfield) = receiver.ack_data();

        assert!(sender.process_ack(ack, bitfield, 0.1).is_empty());
        assert_eq!(sender.unacked_count(), 1);
    }

    #[test]
    fn test_ack_tracker_round_trip() {
        let mut sender = AckTracker::new(32);
        let mut receiver = ReceiveTracker::new();

        for sequence in 1..=4 {
            sender.track_packet(sequence, 0.0);
        }
        receiver.record_received(1);
        receiver.record_received(2);
        receiver.record_received(4);

        let (ack, bitfield) = receiver.ack_data();
        let mut acked = sender.process_ack(ack, bitfield, 0.05);
        acked.sort();

        assert_eq!(acked, vec![1, 2, 4]);
        assert_eq!(sender.unacked_count(), 1);
        assert!(sender.srtt_ms() < 100.0);
    }

    #[test]
    fn test_eviction_reports_unacked_sequence() {
        let mut sender = AckTracker::new(2);

        assert_eq!(sender.track_packet(1, 0.0), None);
        assert_eq!(sender.track_packet(2, 0.0), None);
        assert_eq!(sender.track_packet(3, 0.0), Some(1));
    }
}
