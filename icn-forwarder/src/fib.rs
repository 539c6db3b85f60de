use std::collections::BTreeMap;

use icn_core::{FaceId, Name};
use log::{debug, info, warn};
use serde::Serialize;

/// FIB entry mapping a name prefix to its outbound faces
#[derive(Debug, Clone, Serialize)]
pub struct FibEntry {
    pub name: Name,
    pub faces: Vec<FaceId>,
    /// Static entries survive `clear`
    pub is_static: bool,
    /// Insertion sequence; higher values are searched first
    #[serde(skip)]
    seq: u64,
}

impl FibEntry {
    pub fn new(name: Name, faces: Vec<FaceId>, is_static: bool) -> Self {
        Self {
            name,
            faces,
            is_static,
            seq: 0,
        }
    }

    /// Two entries describe the same route when prefix and faces agree
    pub fn same_route(&self, other: &FibEntry) -> bool {
        self.name == other.name && self.faces == other.faces
    }
}

impl PartialEq for FibEntry {
    fn eq(&self, other: &Self) -> bool {
        self.same_route(other)
    }
}

impl Eq for FibEntry {}

/// Forwarding Information Base with longest-prefix-match lookup.
///
/// Entries are grouped by exact prefix. Within one prefix the most recently
/// added entry wins, which callers walk through with the `already_used`
/// exclusion list to get multi-path fallback.
#[derive(Debug, Default)]
pub struct ForwardingInformationBase {
    entries: BTreeMap<Name, Vec<FibEntry>>,
    next_seq: u64,
}

impl ForwardingInformationBase {
    /// Create a new FIB
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a route. Returns false for a route without faces or if an
    /// identical route is already present.
    pub fn add_fib_entry(&mut self, name: Name, faces: Vec<FaceId>, is_static: bool) -> bool {
        if faces.is_empty() {
            warn!("Rejected FIB entry {} without faces", name);
            return false;
        }
        let mut entry = FibEntry::new(name, faces, is_static);
        let bucket = self.entries.entry(entry.name.clone()).or_default();
        if bucket.iter().any(|existing| existing.same_route(&entry)) {
            debug!("FIB entry {} -> {:?} already present", entry.name, entry.faces);
            return false;
        }

        self.next_seq += 1;
        entry.seq = self.next_seq;
        info!("Added FIB entry {} -> {:?} (static: {})", entry.name, entry.faces, entry.is_static);
        // buckets are kept most recent first
        bucket.insert(0, entry);
        true
    }

    /// Remove every entry registered for exactly this prefix
    pub fn remove_fib_entry(&mut self, name: &Name) -> usize {
        let removed = self.entries.remove(name).map_or(0, |bucket| bucket.len());
        if removed > 0 {
            info!("Removed {} FIB entries for prefix {}", removed, name);
        }
        removed
    }

    /// Longest-prefix match skipping routes listed in `already_used`.
    ///
    /// Candidate prefixes are tried from the full name down to the empty
    /// name; at each length entries are scanned most recent first.
    pub fn find_fib_entry(&self, name: &Name, already_used: &[FibEntry]) -> Option<FibEntry> {
        for length in (0..=name.len()).rev() {
            let prefix = name.get_prefix(length);
            let Some(bucket) = self.entries.get(&prefix) else {
                continue;
            };
            if let Some(entry) = bucket
                .iter()
                .find(|entry| !already_used.iter().any(|used| used.same_route(entry)))
            {
                debug!("FIB lookup for {}: matched {} -> {:?}", name, entry.name, entry.faces);
                return Some(entry.clone());
            }
        }
        debug!("FIB lookup for {}: no untried route", name);
        None
    }

    /// Remove all non-static entries
    pub fn clear(&mut self) {
        for bucket in self.entries.values_mut() {
            bucket.retain(|entry| entry.is_static);
        }
        self.entries.retain(|_, bucket| !bucket.is_empty());
    }

    /// Drop a face from every route, removing routes left without faces
    /// and routes that became identical to a more recent one
    pub fn remove_face(&mut self, face_id: FaceId) -> usize {
        let mut removed = 0;
        for bucket in self.entries.values_mut() {
            for entry in bucket.iter_mut() {
                entry.faces.retain(|&face| face != face_id);
            }
            let before = bucket.len();
            let mut kept: Vec<FibEntry> = Vec::with_capacity(before);
            for entry in bucket.drain(..) {
                if !entry.faces.is_empty() && !kept.iter().any(|newer| newer.same_route(&entry)) {
                    kept.push(entry);
                }
            }
            removed += before - kept.len();
            *bucket = kept;
        }
        self.entries.retain(|_, bucket| !bucket.is_empty());
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Snapshot of all entries, most recently added first
    pub fn entries(&self) -> Vec<FibEntry> {
        let mut entries: Vec<FibEntry> = self.entries.values().flatten().cloned().collect();
        entries.sort_by(|a, b| b.seq.cmp(&a.seq));
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(uri: &str) -> Name {
        Name::from_str(uri)
    }

    #[test]
    fn test_longest_prefix_match() {
        let mut fib = ForwardingInformationBase::new();
        fib.add_fib_entry(name("/a"), vec![1], false);
        fib.add_fib_entry(name("/a/b"), vec![2], false);

        let hit = fib.find_fib_entry(&name("/a/b/c"), &[]).unwrap();
        assert_eq!(hit.name, name("/a/b"));
        assert_eq!(hit.faces, vec![2]);

        let hit = fib.find_fib_entry(&name("/a/x"), &[]).unwrap();
        assert_eq!(hit.name, name("/a"));

        assert!(fib.find_fib_entry(&name("/b"), &[]).is_none());
    }

    #[test]
    fn test_default_route_matches_everything() {
        let mut fib = ForwardingInformationBase::new();
        fib.add_fib_entry(Name::new(), vec![9], true);
        let hit = fib.find_fib_entry(&name("/any/thing"), &[]).unwrap();
        assert_eq!(hit.faces, vec![9]);
    }

    #[test]
    fn test_duplicate_route_suppressed() {
        let mut fib = ForwardingInformationBase::new();
        assert!(fib.add_fib_entry(name("/a"), vec![1, 2], false));
        assert!(!fib.add_fib_entry(name("/a"), vec![1, 2], true));
        assert!(fib.add_fib_entry(name("/a"), vec![2, 1], false));
        assert_eq!(fib.len(), 2);
    }

    #[test]
    fn test_most_recent_entry_wins_ties() {
        let mut fib = ForwardingInformationBase::new();
        fib.add_fib_entry(name("/a"), vec![1], false);
        fib.add_fib_entry(name("/a"), vec![2], false);

        let hit = fib.find_fib_entry(&name("/a/b"), &[]).unwrap();
        assert_eq!(hit.faces, vec![2]);
    }

    #[test]
    fn test_fallback_never_repeats_used_entry() {
        let mut fib = ForwardingInformationBase::new();
        fib.add_fib_entry(name("/a"), vec![1], false);
        fib.add_fib_entry(name("/a/b"), vec![2], false);
        fib.add_fib_entry(name("/a/b"), vec![3], false);
        fib.add_fib_entry(Name::new(), vec![4], false);

        let target = name("/a/b/c");
        let mut used: Vec<FibEntry> = Vec::new();
        let mut order = Vec::new();
        while let Some(entry) = fib.find_fib_entry(&target, &used) {
            assert!(!used.contains(&entry));
            order.push(entry.faces[0]);
            used.push(entry);
        }
        // same-length alternatives in recency order, then shorter prefixes
        assert_eq!(order, vec![3, 2, 1, 4]);
        assert!(fib.find_fib_entry(&target, &used).is_none());
    }

    #[test]
    fn test_remove_fib_entry_is_exact() {
        let mut fib = ForwardingInformationBase::new();
        fib.add_fib_entry(name("/a"), vec![1], false);
        fib.add_fib_entry(name("/a"), vec![2], false);
        fib.add_fib_entry(name("/a/b"), vec![3], false);

        assert_eq!(fib.remove_fib_entry(&name("/a")), 2);
        assert_eq!(fib.remove_fib_entry(&name("/a")), 0);
        assert_eq!(fib.len(), 1);
        assert!(fib.find_fib_entry(&name("/a/x"), &[]).is_none());
    }

    #[test]
    fn test_clear_keeps_static() {
        let mut fib = ForwardingInformationBase::new();
        fib.add_fib_entry(name("/test"), vec![1], true);
        fib.add_fib_entry(name("/test"), vec![2], false);
        fib.add_fib_entry(name("/other"), vec![3], false);
        fib.clear();

        assert_eq!(fib.len(), 1);
        let hit = fib.find_fib_entry(&name("/test/data"), &[]).unwrap();
        assert_eq!(hit.faces, vec![1]);
    }

    #[test]
    fn test_remove_face() {
        let mut fib = ForwardingInformationBase::new();
        fib.add_fib_entry(name("/a"), vec![1, 2], false);
        fib.add_fib_entry(name("/b"), vec![2], false);

        assert_eq!(fib.remove_face(2), 1);
        assert_eq!(fib.len(), 1);
        assert_eq!(fib.find_fib_entry(&name("/a"), &[]).unwrap().faces, vec![1]);
        assert!(fib.find_fib_entry(&name("/b"), &[]).is_none());
    }

    #[test]
    fn test_route_without_faces_rejected() {
        let mut fib = ForwardingInformationBase::new();
        assert!(!fib.add_fib_entry(name("/a"), Vec::new(), false));
        assert!(fib.is_empty());
        assert!(fib.find_fib_entry(&name("/a/b"), &[]).is_none());
    }

    #[test]
    fn test_remove_face_collapses_identical_routes() {
        let mut fib = ForwardingInformationBase::new();
        fib.add_fib_entry(name("/a"), vec![1, 2], true);
        fib.add_fib_entry(name("/a"), vec![2], false);

        assert_eq!(fib.remove_face(1), 1);
        let entries = fib.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].faces, vec![2]);
        // the most recent of the identical routes survives
        assert!(!entries[0].is_static);
        assert!(!fib.add_fib_entry(name("/a"), vec![2], false));
    }

    #[test]
    fn test_entries_snapshot_in_recency_order() {
        let mut fib = ForwardingInformationBase::new();
        fib.add_fib_entry(name("/z"), vec![1], false);
        fib.add_fib_entry(name("/a"), vec![2], false);
        let names: Vec<String> = fib.entries().iter().map(|e| e.name.to_uri()).collect();
        assert_eq!(names, vec!["/a", "/z"]);
    }
}
