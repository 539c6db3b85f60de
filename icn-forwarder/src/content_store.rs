use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use icn_core::{Content, Name};
use log::debug;
use tokio::time::Instant;

use crate::config::{ContentStoreKind, ForwardingConfig};

/// Cached Content together with its staleness bookkeeping
#[derive(Debug, Clone)]
pub struct ContentStoreEntry {
    pub content: Content,
    /// Static entries are pinned: never aged out, never evicted for capacity
    pub is_static: bool,
    /// Last insert or cache hit
    pub timestamp: Instant,
}

impl ContentStoreEntry {
    fn new(content: Content, is_static: bool) -> Self {
        Self {
            content,
            is_static,
            timestamp: Instant::now(),
        }
    }

    pub fn name(&self) -> &Name {
        &self.content.name
    }

    pub fn is_stale(&self, now: Instant, cs_timeout: Duration) -> bool {
        !self.is_static && now.saturating_duration_since(self.timestamp) > cs_timeout
    }
}

/// Local cache of Content objects.
///
/// Both implementations share the same contract and differ only in how
/// `find` matches names.
pub trait ContentStore: Send + Sync {
    /// Insert or silently replace the entry for `content.name`.
    fn add(&mut self, content: Content, is_static: bool);

    fn find(&self, name: &Name) -> Option<&ContentStoreEntry>;

    fn remove(&mut self, name: &Name) -> Option<ContentStoreEntry>;

    /// Refresh the staleness clock of an entry. Returns false if absent.
    fn update_timestamp(&mut self, name: &Name) -> bool;

    /// Evict every non-static entry older than the cache timeout.
    fn ageing(&mut self) -> Vec<Name>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of all entries
    fn entries(&self) -> Vec<ContentStoreEntry>;

    /// Drop every non-static entry
    fn clear(&mut self);
}

/// Build the store selected by the configuration
pub fn build_content_store(config: &ForwardingConfig) -> Box<dyn ContentStore> {
    match config.content_store {
        ContentStoreKind::Exact => Box::new(ExactMatchContentStore::new(
            config.cs_timeout,
            config.cs_capacity,
        )),
        ContentStoreKind::Prefix => Box::new(PrefixMatchContentStore::new(
            config.cs_timeout,
            config.cs_capacity,
        )),
    }
}

/// Least recently touched non-static entry
fn eviction_candidate<'a>(entries: impl Iterator<Item = &'a ContentStoreEntry>) -> Option<Name> {
    entries
        .filter(|entry| !entry.is_static)
        .min_by_key(|entry| entry.timestamp)
        .map(|entry| entry.name().clone())
}

/// Content Store answering exact name matches only
#[derive(Debug)]
pub struct ExactMatchContentStore {
    entries: HashMap<Name, ContentStoreEntry>,
    cs_timeout: Duration,
    capacity: usize,
}

impl ExactMatchContentStore {
    pub fn new(cs_timeout: Duration, capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            cs_timeout,
            capacity,
        }
    }
}

impl ContentStore for ExactMatchContentStore {
    fn add(&mut self, content: Content, is_static: bool) {
        if self.capacity > 0
            && self.entries.len() >= self.capacity
            && !self.entries.contains_key(&content.name)
        {
            if let Some(victim) = eviction_candidate(self.entries.values()) {
                debug!("Content Store full, evicting {}", victim);
                self.entries.remove(&victim);
            }
        }
        let entry = ContentStoreEntry::new(content, is_static);
        self.entries.insert(entry.name().clone(), entry);
    }

    fn find(&self, name: &Name) -> Option<&ContentStoreEntry> {
        self.entries.get(name)
    }

    fn remove(&mut self, name: &Name) -> Option<ContentStoreEntry> {
        self.entries.remove(name)
    }

    fn update_timestamp(&mut self, name: &Name) -> bool {
        match self.entries.get_mut(name) {
            Some(entry) => {
                entry.timestamp = Instant::now();
                true
            }
            None => false,
        }
    }

    fn ageing(&mut self) -> Vec<Name> {
        let now = Instant::now();
        let stale: Vec<Name> = self
            .entries
            .values()
            .filter(|entry| entry.is_stale(now, self.cs_timeout))
            .map(|entry| entry.name().clone())
            .collect();
        for name in &stale {
            self.entries.remove(name);
        }
        stale
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn entries(&self) -> Vec<ContentStoreEntry> {
        let mut entries: Vec<ContentStoreEntry> = self.entries.values().cloned().collect();
        entries.sort_by(|a, b| a.name().cmp(b.name()));
        entries
    }

    fn clear(&mut self) {
        self.entries.retain(|_, entry| entry.is_static);
    }
}

#[derive(Debug, Default)]
struct TrieNode {
    entry: Option<ContentStoreEntry>,
    children: BTreeMap<Vec<u8>, TrieNode>,
}

impl TrieNode {
    fn is_empty(&self) -> bool {
        self.entry.is_none() && self.children.is_empty()
    }

    fn node(&self, components: &[Vec<u8>]) -> Option<&TrieNode> {
        components
            .iter()
            .try_fold(self, |node, component| node.children.get(component))
    }

    fn node_mut(&mut self, components: &[Vec<u8>]) -> Option<&mut TrieNode> {
        components
            .iter()
            .try_fold(self, |node, component| node.children.get_mut(component))
    }

    /// Own entry first, then the smallest child in component byte order
    fn leftmost_entry(&self) -> Option<&ContentStoreEntry> {
        if let Some(entry) = &self.entry {
            return Some(entry);
        }
        self.children.values().find_map(TrieNode::leftmost_entry)
    }

    fn remove(&mut self, components: &[Vec<u8>]) -> Option<ContentStoreEntry> {
        match components.split_first() {
            None => self.entry.take(),
            Some((head, rest)) => {
                let child = self.children.get_mut(head)?;
                let removed = child.remove(rest);
                if child.is_empty() {
                    self.children.remove(head);
                }
                removed
            }
        }
    }

    fn collect<'a>(&'a self, out: &mut Vec<&'a ContentStoreEntry>) {
        if let Some(entry) = &self.entry {
            out.push(entry);
        }
        for child in self.children.values() {
            child.collect(out);
        }
    }
}

/// Content Store keyed by a trie of name components.
///
/// `find` returns the entry stored under exactly the requested name when
/// there is one, otherwise the leftmost descendant in component byte order.
#[derive(Debug)]
pub struct PrefixMatchContentStore {
    root: TrieNode,
    len: usize,
    cs_timeout: Duration,
    capacity: usize,
}

impl PrefixMatchContentStore {
    pub fn new(cs_timeout: Duration, capacity: usize) -> Self {
        Self {
            root: TrieNode::default(),
            len: 0,
            cs_timeout,
            capacity,
        }
    }

    fn all_entries(&self) -> Vec<&ContentStoreEntry> {
        let mut out = Vec::with_capacity(self.len);
        self.root.collect(&mut out);
        out
    }
}

impl ContentStore for PrefixMatchContentStore {
    fn add(&mut self, content: Content, is_static: bool) {
        let exists = self
            .root
            .node(content.name.components())
            .map_or(false, |node| node.entry.is_some());
        if !exists && self.capacity > 0 && self.len >= self.capacity {
            if let Some(victim) = eviction_candidate(self.all_entries().into_iter()) {
                debug!("Content Store full, evicting {}", victim);
                self.remove(&victim);
            }
        }

        let mut node = &mut self.root;
        for component in content.name.components() {
            node = node.children.entry(component.clone()).or_default();
        }
        if node.entry.is_none() {
            self.len += 1;
        }
        node.entry = Some(ContentStoreEntry::new(content, is_static));
    }

    fn find(&self, name: &Name) -> Option<&ContentStoreEntry> {
        self.root.node(name.components())?.leftmost_entry()
    }

    fn remove(&mut self, name: &Name) -> Option<ContentStoreEntry> {
        let removed = self.root.remove(name.components());
        if removed.is_some() {
            self.len -= 1;
        }
        removed
    }

    fn update_timestamp(&mut self, name: &Name) -> bool {
        match self
            .root
            .node_mut(name.components())
            .and_then(|node| node.entry.as_mut())
        {
            Some(entry) => {
                entry.timestamp = Instant::now();
                true
            }
            None => false,
        }
    }

    fn ageing(&mut self) -> Vec<Name> {
        let now = Instant::now();
        let stale: Vec<Name> = self
            .all_entries()
            .into_iter()
            .filter(|entry| entry.is_stale(now, self.cs_timeout))
            .map(|entry| entry.name().clone())
            .collect();
        for name in &stale {
            self.remove(name);
        }
        stale
    }

    fn len(&self) -> usize {
        self.len
    }

    fn entries(&self) -> Vec<ContentStoreEntry> {
        self.all_entries().into_iter().cloned().collect()
    }

    fn clear(&mut self) {
        let dynamic: Vec<Name> = self
            .all_entries()
            .into_iter()
            .filter(|entry| !entry.is_static)
            .map(|entry| entry.name().clone())
            .collect();
        for name in &dynamic {
            self.remove(name);
        }
    }
}
