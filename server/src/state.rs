//! Authoritative session state for the coordinator
//!
//! One `SessionState` lives for the coordinator process's run. It owns
//! the shared passage, the participant capacity, and every
//! participant's progress, indexed by the dense identity handed out at
//! join time. The service serializes all access through a single lock;
//! no method here blocks or touches the network, so that lock is only
//! ever held across one read or mutation.

use log::{debug, info};

/// State of one typing-race session.
///
/// Identity `i` is always index `i` in the progress table. Records are
/// append-only: there is no disconnect signal, so an identity is never
/// reused within a session.
pub struct SessionState {
    text: String,
    capacity: usize,
    progresses: Vec<u32>,
}

impl SessionState {
    pub fn new(text: String, capacity: usize) -> Self {
        Self {
            text,
            capacity,
            progresses: Vec::new(),
        }
    }

    /// Admits one participant and returns the newly assigned identity,
    /// or `None` if the session is already at capacity.
    pub fn join(&mut self) -> Option<u32> {
        if self.progresses.len() >= self.capacity {
            debug!("Join rejected, session full ({} slots)", self.capacity);
            return None;
        }

        let id = self.progresses.len() as u32;
        self.progresses.push(0);
        info!(
            "Participant {} joined ({}/{})",
            id,
            self.progresses.len(),
            self.capacity
        );
        Some(id)
    }

    /// Overwrites one participant's progress. Updates for identities
    /// that were never assigned are dropped.
    pub fn set_progress(&mut self, id: u32, progress: u32) {
        match self.progresses.get_mut(id as usize) {
            Some(slot) => *slot = progress,
            None => debug!("Ignoring progress update for unknown participant {}", id),
        }
    }

    /// Value copy of every participant's progress. Callers get their
    /// own snapshot, never a view into live state.
    pub fn snapshot(&self) -> Vec<u32> {
        self.progresses.clone()
    }

    /// The immutable shared passage for this session.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn player_count(&self) -> usize {
        self.progresses.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[allow(dead_code)]
    pub fn is_full(&self) -> bool {
        self.progresses.len() >= self.capacity
    }
}
