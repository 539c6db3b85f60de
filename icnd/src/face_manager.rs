use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use icn_core::{FaceId, Packet};
use icn_forwarder::{Direction, FacePacket, FaceRemoval, ForwarderChannels, ManagementHandle};
use log::{debug, info, warn};
use serde::Serialize;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch, Mutex, RwLock};
use tokio::task::JoinHandle;

use crate::service::Service;

/// Error types for face management operations
#[derive(Debug, thiserror::Error)]
pub enum FaceManagerError {
    #[error("Face not found: {0}")]
    FaceNotFound(FaceId),
    #[error("Forwarder queue closed for face {0}")]
    QueueClosed(FaceId),
    #[error("Service not running")]
    ServiceNotRunning,
    #[error("Service already running")]
    AlreadyRunning,
}

/// Which side of the engine a face is attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FaceKind {
    Network,
    Application,
}

impl fmt::Display for FaceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FaceKind::Network => write!(f, "network"),
            FaceKind::Application => write!(f, "application"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FaceInfo {
    pub face_id: FaceId,
    pub kind: FaceKind,
}

struct FaceEntry {
    kind: FaceKind,
    sender: mpsc::Sender<Packet>,
}

type FaceTable = Arc<RwLock<HashMap<FaceId, FaceEntry>>>;

/// Endpoint given to whoever owns a face: packets sent here enter the
/// engine tagged with the face id, packets the engine emits for the face
/// come out of `recv`.
pub struct FaceHandle {
    face_id: FaceId,
    kind: FaceKind,
    faces: FaceTable,
    to_engine: mpsc::Sender<FacePacket>,
    from_engine: mpsc::Receiver<Packet>,
}

impl FaceHandle {
    pub fn face_id(&self) -> FaceId {
        self.face_id
    }

    pub fn kind(&self) -> FaceKind {
        self.kind
    }

    /// Hand a packet to the engine. Fails once the face was deleted.
    pub async fn send(&self, packet: impl Into<Packet>) -> Result<(), FaceManagerError> {
        if !self.faces.read().await.contains_key(&self.face_id) {
            return Err(FaceManagerError::FaceNotFound(self.face_id));
        }
        self.to_engine
            .send((self.face_id, packet.into()))
            .await
            .map_err(|_| FaceManagerError::QueueClosed(self.face_id))
    }

    /// Next packet for this face, `None` once the face was deleted
    pub async fn recv(&mut self) -> Option<Packet> {
        self.from_engine.recv().await
    }
}

struct OutboundQueues {
    lower: mpsc::Receiver<FacePacket>,
    higher: mpsc::Receiver<FacePacket>,
}

struct Dispatchers {
    lower: JoinHandle<mpsc::Receiver<FacePacket>>,
    higher: JoinHandle<mpsc::Receiver<FacePacket>>,
}

/// Face management service
pub struct FaceManager {
    faces: FaceTable,
    running: Arc<RwLock<bool>>,
    next_face_id: Arc<RwLock<FaceId>>,
    queue_capacity: usize,
    lower_tx: mpsc::Sender<FacePacket>,
    higher_tx: mpsc::Sender<FacePacket>,
    outbound: Mutex<Option<OutboundQueues>>,
    dispatchers: Mutex<Option<Dispatchers>>,
    stop_tx: watch::Sender<bool>,
    management: ManagementHandle,
}

impl FaceManager {
    /// Create the face manager together with the channel set the engine
    /// runs on.
    pub fn new(queue_capacity: usize, management: ManagementHandle) -> (Self, ForwarderChannels) {
        let (lower_tx, from_lower) = mpsc::channel(queue_capacity);
        let (higher_tx, from_higher) = mpsc::channel(queue_capacity);
        let (to_lower, lower_out) = mpsc::channel(queue_capacity);
        let (to_higher, higher_out) = mpsc::channel(queue_capacity);
        let (stop_tx, _) = watch::channel(false);

        let channels = ForwarderChannels {
            from_lower,
            to_lower,
            from_higher: Some(from_higher),
            to_higher: Some(to_higher),
        };
        let manager = Self {
            faces: Arc::new(RwLock::new(HashMap::new())),
            running: Arc::new(RwLock::new(false)),
            next_face_id: Arc::new(RwLock::new(1)),
            queue_capacity,
            lower_tx,
            higher_tx,
            outbound: Mutex::new(Some(OutboundQueues {
                lower: lower_out,
                higher: higher_out,
            })),
            dispatchers: Mutex::new(None),
            stop_tx,
            management,
        };
        (manager, channels)
    }

    /// Register a new face with an auto-allocated id
    pub async fn create_face(&self, kind: FaceKind) -> Result<FaceHandle, FaceManagerError> {
        if !*self.running.read().await {
            return Err(FaceManagerError::ServiceNotRunning);
        }

        let face_id = self.allocate_face_id().await;
        let (sender, from_engine) = mpsc::channel(self.queue_capacity);
        self.faces.write().await.insert(face_id, FaceEntry { kind, sender });

        let to_engine = match kind {
            FaceKind::Network => self.lower_tx.clone(),
            FaceKind::Application => self.higher_tx.clone(),
        };
        info!("Created {} face {}", kind, face_id);
        Ok(FaceHandle {
            face_id,
            kind,
            faces: self.faces.clone(),
            to_engine,
            from_engine,
        })
    }

    /// Delete a face and purge it from the FIB and the PIT
    pub async fn delete_face(&self, face_id: FaceId) -> Result<FaceRemoval, FaceManagerError> {
        if !*self.running.read().await {
            return Err(FaceManagerError::ServiceNotRunning);
        }

        if self.faces.write().await.remove(&face_id).is_none() {
            return Err(FaceManagerError::FaceNotFound(face_id));
        }

        let removal = self.management.remove_face(face_id).await;
        info!("Deleted face {}", face_id);
        Ok(removal)
    }

    /// List all faces ordered by id
    pub async fn list_faces(&self) -> Vec<FaceInfo> {
        let mut faces: Vec<FaceInfo> = self
            .faces
            .read()
            .await
            .iter()
            .map(|(&face_id, face)| FaceInfo { face_id, kind: face.kind })
            .collect();
        faces.sort_by_key(|face| face.face_id);
        faces
    }

    async fn allocate_face_id(&self) -> FaceId {
        let mut next_id = self.next_face_id.write().await;
        let id = *next_id;
        *next_id += 1;
        id
    }
}

/// Route engine output for one direction to the owning faces until
/// stopped, then hand the queue back.
async fn dispatch_outbound(
    direction: Direction,
    mut queue: mpsc::Receiver<FacePacket>,
    faces: FaceTable,
    mut stop: watch::Receiver<bool>,
) -> mpsc::Receiver<FacePacket> {
    loop {
        tokio::select! {
            _ = stop.changed() => break,
            received = queue.recv() => match received {
                Some((face_id, packet)) => deliver(&faces, direction, face_id, packet).await,
                None => {
                    debug!("Engine {} queue closed", direction);
                    break;
                }
            },
        }
    }
    queue
}

/// Never waits on a face: a full or closed face queue drops the packet
async fn deliver(faces: &FaceTable, direction: Direction, face_id: FaceId, packet: Packet) {
    let sender = faces.read().await.get(&face_id).map(|face| face.sender.clone());
    let Some(sender) = sender else {
        warn!("Unknown {} face {}, dropping {}", direction, face_id, packet.kind());
        return;
    };
    match sender.try_send(packet) {
        Ok(()) => {}
        Err(TrySendError::Full(packet)) => {
            warn!("Face {} queue is full, dropping {}", face_id, packet.kind());
        }
        Err(TrySendError::Closed(packet)) => {
            warn!("Face {} is no longer reading, dropping {}", face_id, packet.kind());
        }
    }
}

#[async_trait]
impl Service for FaceManager {
    async fn start(&self) -> anyhow::Result<()> {
        let mut running = self.running.write().await;
        if *running {
            return Err(FaceManagerError::AlreadyRunning.into());
        }

        let Some(queues) = self.outbound.lock().await.take() else {
            anyhow::bail!("engine output queues are not available");
        };

        info!("Starting Face Manager service");
        self.stop_tx.send_replace(false);
        let dispatchers = Dispatchers {
            lower: tokio::spawn(dispatch_outbound(
                Direction::Lower,
                queues.lower,
                self.faces.clone(),
                self.stop_tx.subscribe(),
            )),
            higher: tokio::spawn(dispatch_outbound(
                Direction::Higher,
                queues.higher,
                self.faces.clone(),
                self.stop_tx.subscribe(),
            )),
        };
        *self.dispatchers.lock().await = Some(dispatchers);
        *running = true;
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        let mut running = self.running.write().await;
        if !*running {
            return Ok(());
        }

        info!("Stopping Face Manager service");
        *running = false;
        self.stop_tx.send_replace(true);

        if let Some(dispatchers) = self.dispatchers.lock().await.take() {
            let lower = dispatchers.lower.await?;
            let higher = dispatchers.higher.await?;
            *self.outbound.lock().await = Some(OutboundQueues { lower, higher });
        }

        // dropping the senders closes every face handle
        let closed = self.faces.write().await.drain().count();
        debug!("Closed {} faces", closed);
        Ok(())
    }

    fn name(&self) -> &str {
        "face-manager"
    }

    async fn is_running(&self) -> bool {
        *self.running.read().await
    }
}
