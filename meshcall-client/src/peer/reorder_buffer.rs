use meshcall_core::{ParticipantId, SignalEnvelope};
use std::collections::{HashMap, VecDeque};

/// Signals that arrived for a remote participant before a link to it existed.
///
/// Each queue is handed out once, in arrival order, when the link is created;
/// it is thrown away if the participant leaves first.
#[derive(Debug, Default)]
pub struct SignalReorderBuffer {
    queues: HashMap<ParticipantId, VecDeque<SignalEnvelope>>,
}

impl SignalReorderBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, remote_id: ParticipantId, envelope: SignalEnvelope) {
        self.queues.entry(remote_id).or_default().push_back(envelope);
    }

    /// Removes and returns everything queued for `remote_id`, oldest first.
    pub fn drain(&mut self, remote_id: &ParticipantId) -> Vec<SignalEnvelope> {
        self.queues
            .remove(remote_id)
            .map(Vec::from)
            .unwrap_or_default()
    }

    /// Drops the queue of a participant that left before any link was made.
    /// Returns how many signals were discarded.
    pub fn discard(&mut self, remote_id: &ParticipantId) -> usize {
        self.queues.remove(remote_id).map_or(0, |queue| queue.len())
    }

    pub fn pending(&self, remote_id: &ParticipantId) -> usize {
        self.queues.get(remote_id).map_or(0, VecDeque::len)
    }

    pub fn len(&self) -> usize {
        self.queues.values().map(VecDeque::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.queues.is_empty()
    }

    pub fn clear(&mut self) {
        self.queues.clear();
    }
}
