use std::sync::Arc;

use icn_core::{Content, FaceId, Name};
use log::info;
use serde::Serialize;
use tokio::sync::{watch, RwLock};
use tokio::time::Instant;

use crate::engine::{ForwardingStats, SharedContentStore, SharedFib, SharedPit};
use crate::fib::FibEntry;
use crate::pit::Origin;

/// Cache entry as reported to monitoring
#[derive(Debug, Clone, Serialize)]
pub struct CachedContentInfo {
    pub name: String,
    pub size: usize,
    pub is_static: bool,
    pub age_ms: u64,
}

/// Pending Interest as reported to monitoring
#[derive(Debug, Clone, Serialize)]
pub struct PendingInterestInfo {
    pub name: String,
    pub origins: Vec<Origin>,
    pub tried_routes: usize,
    pub outgoing_faces: Vec<FaceId>,
    pub retransmits: u32,
    pub age_ms: u64,
}

/// Full view of the forwarder state
#[derive(Debug, Clone, Serialize)]
pub struct TableSnapshot {
    pub content_store: Vec<CachedContentInfo>,
    pub fib: Vec<FibEntry>,
    pub pit: Vec<PendingInterestInfo>,
    pub stats: ForwardingStats,
}

/// Outcome of removing a face
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FaceRemoval {
    pub routes_removed: usize,
    pub pending_dropped: usize,
}

/// Cloneable handle used by the daemon to manage and inspect the tables
/// while the engine is running.
#[derive(Clone)]
pub struct ManagementHandle {
    content_store: SharedContentStore,
    fib: SharedFib,
    pit: SharedPit,
    stats: Arc<RwLock<ForwardingStats>>,
    shutdown: Arc<watch::Sender<bool>>,
}

impl ManagementHandle {
    pub(crate) fn new(
        content_store: SharedContentStore,
        fib: SharedFib,
        pit: SharedPit,
        stats: Arc<RwLock<ForwardingStats>>,
        shutdown: Arc<watch::Sender<bool>>,
    ) -> Self {
        Self {
            content_store,
            fib,
            pit,
            stats,
            shutdown,
        }
    }

    pub async fn add_fib_entry(&self, name: Name, faces: Vec<FaceId>, is_static: bool) -> bool {
        self.fib.write().await.add_fib_entry(name, faces, is_static)
    }

    pub async fn remove_fib_entry(&self, name: &Name) -> usize {
        self.fib.write().await.remove_fib_entry(name)
    }

    /// Drop all non-static routes
    pub async fn clear_fib(&self) {
        self.fib.write().await.clear();
    }

    /// Pin content in the cache
    pub async fn insert_static_content(&self, content: Content) {
        info!("Inserted static content {}", content.name);
        self.content_store.write().await.add(content, true);
    }

    pub async fn remove_content(&self, name: &Name) -> bool {
        self.content_store.write().await.remove(name).is_some()
    }

    /// Drop all non-static content
    pub async fn clear_content_store(&self) {
        self.content_store.write().await.clear();
    }

    /// Forget a face in the FIB and the PIT
    pub async fn remove_face(&self, face_id: FaceId) -> FaceRemoval {
        let pending_dropped = self.pit.write().await.remove_pit_entry_by_faceid(face_id);
        let routes_removed = self.fib.write().await.remove_face(face_id);
        info!(
            "Removed face {}: {} routes and {} pending Interests dropped",
            face_id, routes_removed, pending_dropped
        );
        FaceRemoval {
            routes_removed,
            pending_dropped,
        }
    }

    pub async fn cs_size(&self) -> usize {
        self.content_store.read().await.len()
    }

    pub async fn fib_size(&self) -> usize {
        self.fib.read().await.len()
    }

    pub async fn pit_size(&self) -> usize {
        self.pit.read().await.len()
    }

    pub async fn cs_entries(&self) -> Vec<CachedContentInfo> {
        let now = Instant::now();
        self.content_store
            .read()
            .await
            .entries()
            .into_iter()
            .map(|entry| CachedContentInfo {
                name: entry.name().to_uri(),
                size: entry.content.content.len(),
                is_static: entry.is_static,
                age_ms: now.saturating_duration_since(entry.timestamp).as_millis() as u64,
            })
            .collect()
    }

    pub async fn fib_entries(&self) -> Vec<FibEntry> {
        self.fib.read().await.entries()
    }

    pub async fn pit_entries(&self) -> Vec<PendingInterestInfo> {
        let now = Instant::now();
        self.pit
            .read()
            .await
            .entries()
            .into_iter()
            .map(|entry| PendingInterestInfo {
                name: entry.name.to_uri(),
                tried_routes: entry.used_fib_entries.len(),
                outgoing_faces: entry.outgoing_faces,
                retransmits: entry.retransmits,
                age_ms: now.saturating_duration_since(entry.timestamp).as_millis() as u64,
                origins: entry.origins,
            })
            .collect()
    }

    pub async fn stats(&self) -> ForwardingStats {
        self.stats.read().await.clone()
    }

    pub async fn snapshot(&self) -> TableSnapshot {
        TableSnapshot {
            content_store: self.cs_entries().await,
            fib: self.fib_entries().await,
            pit: self.pit_entries().await,
            stats: self.stats().await,
        }
    }

    /// Ask the engine run loop to stop
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    pub fn is_shutdown(&self) -> bool {
        *self.shutdown.borrow()
    }
}

#[cfg(test)]
mod tests {
    use crate::config::ForwardingConfig;
    use crate::engine::ForwardingEngine;
    use icn_core::{Content, Interest, Name};

    fn name(uri: &str) -> Name {
        Name::from_str(uri)
    }

    #[tokio::test]
    async fn test_remove_face_purges_fib_and_pit() {
        let engine = ForwardingEngine::new(ForwardingConfig::default()).unwrap();
        let mgmt = engine.management();
        mgmt.add_fib_entry(name("/a"), vec![1], false).await;
        mgmt.add_fib_entry(name("/b"), vec![1, 2], false).await;
        engine.handle_interest(5, Interest::new(name("/a/x")), false).await;
        engine.handle_interest(6, Interest::new(name("/b/x")), false).await;

        let removal = mgmt.remove_face(5).await;
        assert_eq!(removal.pending_dropped, 1);
        assert_eq!(removal.routes_removed, 0);
        assert_eq!(mgmt.pit_size().await, 1);

        let removal = mgmt.remove_face(1).await;
        assert_eq!(removal.routes_removed, 1);
        assert_eq!(mgmt.fib_entries().await[0].faces, vec![2]);
    }

    #[tokio::test]
    async fn test_static_content_management() {
        let engine = ForwardingEngine::new(ForwardingConfig::default()).unwrap();
        let mgmt = engine.management();
        mgmt.insert_static_content(Content::new(name("/s"), b"pinned".to_vec())).await;
        mgmt.clear_content_store().await;
        assert_eq!(mgmt.cs_size().await, 1);

        let entries = mgmt.cs_entries().await;
        assert_eq!(entries[0].name, "/s");
        assert_eq!(entries[0].size, 6);
        assert!(entries[0].is_static);

        assert!(mgmt.remove_content(&name("/s")).await);
        assert!(!mgmt.remove_content(&name("/s")).await);
    }

    #[tokio::test]
    async fn test_snapshot_serializes() {
        let engine = ForwardingEngine::new(ForwardingConfig::default()).unwrap();
        let mgmt = engine.management();
        mgmt.add_fib_entry(name("/test"), vec![1], true).await;
        engine.handle_interest(2, Interest::new(name("/test/data")), false).await;

        let json = serde_json::to_value(mgmt.snapshot().await).unwrap();
        assert_eq!(json["fib"][0]["faces"], serde_json::json!([1]));
        assert_eq!(json["fib"][0]["is_static"], true);
        assert_eq!(json["pit"][0]["name"], "/test/data");
        assert_eq!(json["pit"][0]["origins"][0]["face_id"], 2);
        assert_eq!(json["stats"]["interests_forwarded"], 1);
    }

    #[tokio::test]
    async fn test_shutdown_flag() {
        let engine = ForwardingEngine::new(ForwardingConfig::default()).unwrap();
        let mgmt = engine.management();
        assert!(!mgmt.is_shutdown());
        mgmt.clone().shutdown();
        assert!(mgmt.is_shutdown());
    }
}
