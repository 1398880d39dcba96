use linkcall_core::{CandidateRecord, IceCandidate};
use std::collections::{BTreeMap, HashSet, VecDeque};
use tracing::warn;

/// Remote candidates on their way to the transport.
///
/// Restores writer order from sequence numbers, drops redeliveries, and keeps
/// everything in FIFO order until the remote description is in place.
pub(crate) struct RemoteCandidateQueue {
    next_seq: u64,
    held: BTreeMap<u64, IceCandidate>,
    pending: VecDeque<IceCandidate>,
    applied: HashSet<IceCandidate>,
    window: usize,
}

impl RemoteCandidateQueue {
    pub(crate) fn new(window: usize) -> Self {
        Self {
            next_seq: 0,
            held: BTreeMap::new(),
            pending: VecDeque::new(),
            applied: HashSet::new(),
            window,
        }
    }

    /// Returns false when the record was already seen.
    pub(crate) fn accept(&mut self, record: CandidateRecord) -> bool {
        if record.seq < self.next_seq || self.held.contains_key(&record.seq) {
            return false;
        }

        self.held.insert(record.seq, record.candidate);
        self.release_contiguous();

        while self.held.len() > self.window {
            let Some((seq, candidate)) = self.held.pop_first() else {
                break;
            };
            warn!(
                "Remote candidates before seq {} never arrived, skipping ahead",
                seq
            );
            self.next_seq = seq + 1;
            self.pending.push_back(candidate);
            self.release_contiguous();
        }

        true
    }

    /// Candidates ready for the transport, in writer order, each at most once
    /// per attempt.
    pub(crate) fn drain_ready(&mut self) -> Vec<IceCandidate> {
        let mut ready = Vec::with_capacity(self.pending.len());
        while let Some(candidate) = self.pending.pop_front() {
            if self.applied.insert(candidate.clone()) {
                ready.push(candidate);
            }
        }
        ready
    }

    pub(crate) fn queued(&self) -> usize {
        self.pending.len() + self.held.len()
    }

    fn release_contiguous(&mut self) {
        while let Some(candidate) = self.held.remove(&self.next_seq) {
            self.pending.push_back(candidate);
            self.next_seq += 1;
        }
    }
}
