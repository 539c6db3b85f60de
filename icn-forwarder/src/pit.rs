use std::collections::BTreeMap;
use std::time::Duration;

use icn_core::{FaceId, Interest, Name};
use log::debug;
use serde::Serialize;
use tokio::time::Instant;

use crate::fib::FibEntry;

/// A requester waiting on a pending Interest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Origin {
    pub face_id: FaceId,
    /// The request came from the local application rather than the network
    pub local_app: bool,
}

/// PIT entry aggregating every outstanding request for one name
#[derive(Debug, Clone)]
pub struct PitEntry {
    pub name: Name,
    /// Requesters in arrival order, without duplicates
    pub origins: Vec<Origin>,
    /// Interest re-sent on fallback and retransmission
    pub interest: Interest,
    /// Routes already tried for this name
    pub used_fib_entries: Vec<FibEntry>,
    /// Faces the Interest went out on in the current attempt
    pub outgoing_faces: Vec<FaceId>,
    /// Faces of the current attempt that answered with a Nack
    pub nacked_faces: Vec<FaceId>,
    pub retransmits: u32,
    pub timestamp: Instant,
}

impl PitEntry {
    fn new(name: Name, origin: Origin, interest: Interest) -> Self {
        Self {
            name,
            origins: vec![origin],
            interest,
            used_fib_entries: Vec::new(),
            outgoing_faces: Vec::new(),
            nacked_faces: Vec::new(),
            retransmits: 0,
            timestamp: Instant::now(),
        }
    }

    pub fn has_local_origin(&self) -> bool {
        self.origins.iter().any(|origin| origin.local_app)
    }

    /// Faces of the current attempt that have not answered with a Nack yet
    pub fn outstanding_faces(&self) -> impl Iterator<Item = FaceId> + '_ {
        self.outgoing_faces
            .iter()
            .copied()
            .filter(|face| !self.nacked_faces.contains(face))
    }
}

/// Result of adding an Interest to the PIT
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PitInsert {
    /// New PIT entry created
    Created,
    /// Origin appended to an existing entry
    Aggregated,
    /// The same origin was already recorded
    Duplicate,
}

/// State of the current forwarding attempt after a Nack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NackProgress {
    /// Other faces of the attempt may still answer
    Pending,
    /// Every face of the attempt answered with a Nack
    Exhausted,
}

/// Pending Interest Table keyed by exact name
#[derive(Debug)]
pub struct PendingInterestTable {
    entries: BTreeMap<Name, PitEntry>,
    pit_timeout: Duration,
    max_retransmits: u32,
}

impl PendingInterestTable {
    /// Create a new PIT
    pub fn new(pit_timeout: Duration, max_retransmits: u32) -> Self {
        Self {
            entries: BTreeMap::new(),
            pit_timeout,
            max_retransmits,
        }
    }

    /// Record a request for `name` from `face_id`.
    ///
    /// An existing entry gets the origin appended unless the same
    /// `(face_id, local_app)` pair is already present.
    pub fn add_pit_entry(
        &mut self,
        name: Name,
        face_id: FaceId,
        interest: Option<Interest>,
        local_app: bool,
    ) -> PitInsert {
        let origin = Origin { face_id, local_app };
        if let Some(entry) = self.entries.get_mut(&name) {
            if entry.origins.contains(&origin) {
                return PitInsert::Duplicate;
            }
            entry.origins.push(origin);
            debug!("Aggregated {} from face {} into PIT", name, face_id);
            return PitInsert::Aggregated;
        }

        let interest = interest.unwrap_or_else(|| Interest::new(name.clone()));
        debug!("Created PIT entry for {} from face {}", name, face_id);
        self.entries
            .insert(name.clone(), PitEntry::new(name, origin, interest));
        PitInsert::Created
    }

    pub fn find_pit_entry(&self, name: &Name) -> Option<&PitEntry> {
        self.entries.get(name)
    }

    pub fn remove_pit_entry(&mut self, name: &Name) -> Option<PitEntry> {
        self.entries.remove(name)
    }

    /// Re-insert an entry previously taken out of the table
    pub fn restore_pit_entry(&mut self, entry: PitEntry) {
        self.entries.insert(entry.name.clone(), entry);
    }

    /// Purge a face from every entry. Entries left without requesters are
    /// dropped; the number of dropped entries is returned.
    pub fn remove_pit_entry_by_faceid(&mut self, face_id: FaceId) -> usize {
        let before = self.entries.len();
        for entry in self.entries.values_mut() {
            entry.origins.retain(|origin| origin.face_id != face_id);
            entry.outgoing_faces.retain(|&face| face != face_id);
            entry.nacked_faces.retain(|&face| face != face_id);
        }
        self.entries.retain(|_, entry| !entry.origins.is_empty());
        before - self.entries.len()
    }

    /// Remember that `fib_entry` was tried for `name`
    pub fn add_used_fib_entry(&mut self, name: &Name, fib_entry: FibEntry) -> bool {
        match self.entries.get_mut(name) {
            Some(entry) => {
                if !entry.used_fib_entries.contains(&fib_entry) {
                    entry.used_fib_entries.push(fib_entry);
                }
                true
            }
            None => false,
        }
    }

    /// Begin a forwarding attempt over `faces`, forgetting earlier Nacks
    pub fn start_attempt(&mut self, name: &Name, faces: &[FaceId]) -> bool {
        match self.entries.get_mut(name) {
            Some(entry) => {
                entry.outgoing_faces = faces.to_vec();
                entry.nacked_faces.clear();
                true
            }
            None => false,
        }
    }

    /// Record a Nack from `face_id` for the current attempt
    pub fn record_nack(&mut self, name: &Name, face_id: FaceId) -> Option<NackProgress> {
        let entry = self.entries.get_mut(name)?;
        if !entry.nacked_faces.contains(&face_id) {
            entry.nacked_faces.push(face_id);
        }
        if entry.outstanding_faces().next().is_some() {
            Some(NackProgress::Pending)
        } else {
            Some(NackProgress::Exhausted)
        }
    }

    pub fn update_timestamp(&mut self, name: &Name) -> bool {
        match self.entries.get_mut(name) {
            Some(entry) => {
                entry.timestamp = Instant::now();
                true
            }
            None => false,
        }
    }

    /// Periodic sweep returning `(retransmit, removed)`.
    ///
    /// An entry with retransmit budget left is scheduled for retransmission
    /// and its counter incremented. Once the budget is spent the entry stays
    /// until it is older than the PIT timeout, then it is removed.
    pub fn ageing(&mut self) -> (Vec<PitEntry>, Vec<PitEntry>) {
        let now = Instant::now();
        let mut retransmit = Vec::new();
        let mut expired = Vec::new();

        for entry in self.entries.values_mut() {
            let timed_out = now.saturating_duration_since(entry.timestamp) > self.pit_timeout;
            if entry.retransmits < self.max_retransmits {
                entry.retransmits += 1;
                retransmit.push(entry.clone());
            } else if timed_out {
                expired.push(entry.name.clone());
            }
        }

        let removed: Vec<PitEntry> = expired
            .iter()
            .filter_map(|name| self.entries.remove(name))
            .collect();
        if !removed.is_empty() {
            debug!("Removed {} exhausted PIT entries", removed.len());
        }
        (retransmit, removed)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Snapshot of all entries in name order
    pub fn entries(&self) -> Vec<PitEntry> {
        self.entries.values().cloned().collect()
    }
}
