use std::sync::Arc;

use icn_core::{Content, FaceId, Interest, Nack, NackReason, Packet};
use log::{debug, info, trace, warn};
use serde::Serialize;
use tokio::sync::{mpsc, watch, RwLock};
use tokio::time::{interval, MissedTickBehavior};

use crate::config::ForwardingConfig;
use crate::content_store::{build_content_store, ContentStore};
use crate::error::{Direction, ForwarderError, Result};
use crate::fib::ForwardingInformationBase;
use crate::management::ManagementHandle;
use crate::pit::{NackProgress, Origin, PendingInterestTable};

pub type SharedContentStore = Arc<RwLock<Box<dyn ContentStore>>>;
pub type SharedFib = Arc<RwLock<ForwardingInformationBase>>;
pub type SharedPit = Arc<RwLock<PendingInterestTable>>;

/// A packet tagged with the face it arrived on or is destined to
pub type FacePacket = (FaceId, Packet);

/// Packet emitted by the engine
#[derive(Debug, Clone, PartialEq)]
pub enum ForwardingAction {
    /// Send to a network face
    ToLower { face_id: FaceId, packet: Packet },
    /// Hand to the local application
    ToHigher { face_id: FaceId, packet: Packet },
}

impl ForwardingAction {
    /// Answer on the face a request came in on
    fn reply(face_id: FaceId, from_local: bool, packet: Packet) -> Self {
        if from_local {
            ForwardingAction::ToHigher { face_id, packet }
        } else {
            ForwardingAction::ToLower { face_id, packet }
        }
    }

    fn to_origin(origin: &Origin, packet: Packet) -> Self {
        Self::reply(origin.face_id, origin.local_app, packet)
    }

    pub fn face_id(&self) -> FaceId {
        match self {
            ForwardingAction::ToLower { face_id, .. } | ForwardingAction::ToHigher { face_id, .. } => *face_id,
        }
    }

    pub fn packet(&self) -> &Packet {
        match self {
            ForwardingAction::ToLower { packet, .. } | ForwardingAction::ToHigher { packet, .. } => packet,
        }
    }
}

/// Queues connecting the engine to faces and the local application
pub struct ForwarderChannels {
    pub from_lower: mpsc::Receiver<FacePacket>,
    pub to_lower: mpsc::Sender<FacePacket>,
    pub from_higher: Option<mpsc::Receiver<FacePacket>>,
    pub to_higher: Option<mpsc::Sender<FacePacket>>,
}

/// Forwarding counters
#[derive(Debug, Clone, Default, Serialize)]
pub struct ForwardingStats {
    pub interests_received: u64,
    pub cs_hits: u64,
    pub interests_aggregated: u64,
    pub interests_to_app: u64,
    pub interests_forwarded: u64,
    pub no_route_nacks: u64,
    pub content_received: u64,
    pub content_delivered: u64,
    pub unsolicited_content: u64,
    pub nacks_received: u64,
    pub nack_fallbacks: u64,
    pub nacks_delivered: u64,
    pub retransmissions: u64,
    pub pit_expired: u64,
    pub cs_evicted: u64,
    pub malformed_packets: u64,
}

/// Outcome of one ageing sweep
#[derive(Debug, Default)]
pub struct AgeingReport {
    pub actions: Vec<ForwardingAction>,
    /// PIT entries re-forwarded over an untried route
    pub retransmitted: usize,
    /// PIT entries dropped after their retry budget
    pub expired: usize,
    /// Cache entries evicted for staleness
    pub evicted: usize,
}

impl AgeingReport {
    pub fn is_idle(&self) -> bool {
        self.actions.is_empty() && self.expired == 0 && self.evicted == 0
    }
}

/// ICN forwarding engine combining FIB, PIT and CS.
///
/// The engine is a reactive dispatcher: every handler consumes one packet
/// and returns the packets to emit. `run` drives it from channels and the
/// ageing timer on a single task, so all table mutations are sequential.
pub struct ForwardingEngine {
    content_store: SharedContentStore,
    fib: SharedFib,
    pit: SharedPit,
    stats: Arc<RwLock<ForwardingStats>>,
    config: ForwardingConfig,
    shutdown: Arc<watch::Sender<bool>>,
}

impl ForwardingEngine {
    /// Create a new forwarding engine with empty tables
    pub fn new(config: ForwardingConfig) -> Result<Self> {
        config.validate()?;
        let content_store = Arc::new(RwLock::new(build_content_store(&config)));
        let fib = Arc::new(RwLock::new(ForwardingInformationBase::new()));
        let pit = Arc::new(RwLock::new(PendingInterestTable::new(
            config.pit_timeout,
            config.pit_retransmits,
        )));
        let (shutdown, _) = watch::channel(false);

        Ok(Self {
            content_store,
            fib,
            pit,
            stats: Arc::new(RwLock::new(ForwardingStats::default())),
            config,
            shutdown: Arc::new(shutdown),
        })
    }

    pub fn config(&self) -> &ForwardingConfig {
        &self.config
    }

    /// Handle for management and monitoring collaborators
    pub fn management(&self) -> ManagementHandle {
        ManagementHandle::new(
            self.content_store.clone(),
            self.fib.clone(),
            self.pit.clone(),
            self.stats.clone(),
            self.shutdown.clone(),
        )
    }

    /// Classify a packet and run the matching handler
    pub async fn handle_packet(&self, face_id: FaceId, packet: Packet, from_local: bool) -> Vec<ForwardingAction> {
        match packet {
            Packet::Interest(interest) => self.handle_interest(face_id, interest, from_local).await,
            Packet::Content(content) => self.handle_content(face_id, content, from_local).await,
            Packet::Nack(nack) => self.handle_nack(face_id, nack, from_local).await,
            Packet::Unknown(payload) => {
                warn!("Discarding unclassified packet ({} bytes) from face {}", payload.len(), face_id);
                self.stats.write().await.malformed_packets += 1;
                Vec::new()
            }
        }
    }

    /// Process an incoming Interest
    pub async fn handle_interest(&self, face_id: FaceId, interest: Interest, from_local: bool) -> Vec<ForwardingAction> {
        let name = interest.name.clone();
        self.stats.write().await.interests_received += 1;

        // Step 1: Content Store
        {
            let mut cs = self.content_store.write().await;
            if let Some(entry) = cs.find(&name) {
                let content = entry.content.clone();
                cs.update_timestamp(&content.name);
                drop(cs);
                debug!("Content Store hit for {} from face {}", name, face_id);
                self.stats.write().await.cs_hits += 1;
                return vec![ForwardingAction::reply(face_id, from_local, content.into())];
            }
        }

        // Step 2: aggregate into an existing PIT entry
        let mut pit = self.pit.write().await;
        if pit.find_pit_entry(&name).is_some() {
            pit.add_pit_entry(name.clone(), face_id, Some(interest), from_local);
            pit.update_timestamp(&name);
            drop(pit);
            debug!("Interest {} from face {} aggregated in PIT", name, face_id);
            self.stats.write().await.interests_aggregated += 1;
            return Vec::new();
        }

        // Step 3: let the local application answer
        if self.config.interest_to_app && !from_local {
            pit.add_pit_entry(name.clone(), face_id, Some(interest.clone()), false);
            drop(pit);
            debug!("Interest {} from face {} handed to application", name, face_id);
            self.stats.write().await.interests_to_app += 1;
            return vec![ForwardingAction::ToHigher {
                face_id,
                packet: interest.into(),
            }];
        }

        // Step 4: FIB
        let route = self.fib.read().await.find_fib_entry(&name, &[]);
        match route {
            Some(route) => {
                pit.add_pit_entry(name.clone(), face_id, Some(interest.clone()), from_local);
                pit.add_used_fib_entry(&name, route.clone());
                pit.start_attempt(&name, &route.faces);
                drop(pit);
                debug!("Forwarding Interest {} to faces {:?}", name, route.faces);
                self.stats.write().await.interests_forwarded += 1;
                route
                    .faces
                    .iter()
                    .map(|&out_face| ForwardingAction::ToLower {
                        face_id: out_face,
                        packet: interest.clone().into(),
                    })
                    .collect()
            }
            None => {
                debug!("No forwarding route for Interest {}", name);
                let nack = Nack::new(NackReason::NoRoute, interest);
                let waiting = pit.remove_pit_entry(&name);
                drop(pit);
                self.stats.write().await.no_route_nacks += 1;
                match waiting {
                    Some(entry) => entry
                        .origins
                        .iter()
                        .map(|origin| ForwardingAction::to_origin(origin, nack.clone().into()))
                        .collect(),
                    None => vec![ForwardingAction::reply(face_id, from_local, nack.into())],
                }
            }
        }
    }

    /// Process an incoming Content packet
    pub async fn handle_content(&self, face_id: FaceId, content: Content, from_local: bool) -> Vec<ForwardingAction> {
        self.stats.write().await.content_received += 1;

        let pending = self.pit.write().await.remove_pit_entry(&content.name);
        let Some(entry) = pending else {
            debug!(
                "No PIT entry for Content {} from {} face {}, dropping",
                content.name,
                if from_local { "application" } else { "network" },
                face_id
            );
            self.stats.write().await.unsolicited_content += 1;
            return Vec::new();
        };

        let actions: Vec<ForwardingAction> = entry
            .origins
            .iter()
            .map(|origin| ForwardingAction::to_origin(origin, content.clone().into()))
            .collect();
        debug!("Returning Content {} to {} requesters", content.name, actions.len());

        self.content_store.write().await.add(content, false);
        self.stats.write().await.content_delivered += actions.len() as u64;
        actions
    }

    /// Process an incoming Nack
    pub async fn handle_nack(&self, face_id: FaceId, nack: Nack, from_local: bool) -> Vec<ForwardingAction> {
        self.stats.write().await.nacks_received += 1;
        let name = nack.name.clone();
        debug!(
            "Nack for {} ({}) from {} face {}",
            name,
            nack.reason,
            if from_local { "application" } else { "network" },
            face_id
        );

        let mut pit = self.pit.write().await;
        match pit.record_nack(&name, face_id) {
            None => {
                debug!("No PIT entry for Nack {}, dropping", name);
                return Vec::new();
            }
            Some(NackProgress::Pending) => {
                debug!("Nack for {} recorded, other faces still pending", name);
                return Vec::new();
            }
            Some(NackProgress::Exhausted) => {}
        }

        let (used, interest) = match pit.find_pit_entry(&name) {
            Some(entry) => (entry.used_fib_entries.clone(), entry.interest.clone()),
            None => return Vec::new(),
        };

        // Multi-path fallback over routes not tried yet
        let route = self.fib.read().await.find_fib_entry(&name, &used);
        if let Some(route) = route {
            pit.add_used_fib_entry(&name, route.clone());
            pit.start_attempt(&name, &route.faces);
            drop(pit);
            debug!("Falling back to {} -> {:?} for {}", route.name, route.faces, name);
            self.stats.write().await.nack_fallbacks += 1;
            return route
                .faces
                .iter()
                .map(|&out_face| ForwardingAction::ToLower {
                    face_id: out_face,
                    packet: interest.clone().into(),
                })
                .collect();
        }

        // Every path failed: the Nack is terminal
        let Some(mut entry) = pit.remove_pit_entry(&name) else {
            return Vec::new();
        };
        let actions: Vec<ForwardingAction> = entry
            .origins
            .iter()
            .map(|origin| ForwardingAction::to_origin(origin, nack.clone().into()))
            .collect();
        if self.config.keep_local_waiters_on_nack && entry.has_local_origin() {
            entry.origins.retain(|origin| origin.local_app);
            pit.restore_pit_entry(entry);
        }
        drop(pit);

        debug!("No route left for {}, sending Nack to {} requesters", name, actions.len());
        self.stats.write().await.nacks_delivered += actions.len() as u64;
        actions
    }

    /// Periodic sweep: retransmit or expire pending Interests, evict stale content
    pub async fn ageing(&self) -> AgeingReport {
        let mut report = AgeingReport::default();

        {
            let mut pit = self.pit.write().await;
            let (retransmit, removed) = pit.ageing();
            for entry in &removed {
                debug!("PIT entry {} exhausted its retransmissions, dropping", entry.name);
            }
            report.expired = removed.len();

            let fib = self.fib.read().await;
            for entry in retransmit {
                let Some(route) = fib.find_fib_entry(&entry.name, &entry.used_fib_entries) else {
                    trace!("No untried route to retransmit {}", entry.name);
                    continue;
                };
                pit.add_used_fib_entry(&entry.name, route.clone());
                pit.start_attempt(&entry.name, &route.faces);
                debug!(
                    "Retransmitting {} (attempt {}) to faces {:?}",
                    entry.name, entry.retransmits, route.faces
                );
                report.retransmitted += 1;
                report
                    .actions
                    .extend(route.faces.iter().map(|&out_face| ForwardingAction::ToLower {
                        face_id: out_face,
                        packet: entry.interest.clone().into(),
                    }));
            }
        }

        report.evicted = self.content_store.write().await.ageing().len();

        let mut stats = self.stats.write().await;
        stats.retransmissions += report.retransmitted as u64;
        stats.pit_expired += report.expired as u64;
        stats.cs_evicted += report.evicted as u64;
        report
    }

    /// Drive the engine until shutdown or until the network side goes away
    pub async fn run(&self, mut channels: ForwarderChannels) -> Result<()> {
        let mut shutdown = self.shutdown.subscribe();
        if *shutdown.borrow() {
            return Ok(());
        }

        let mut ageing = interval(self.config.ageing_interval);
        ageing.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // the first tick completes immediately
        ageing.tick().await;

        info!(
            "Forwarding engine started (ageing every {:?}, application {})",
            self.config.ageing_interval,
            if channels.to_higher.is_some() { "attached" } else { "detached" }
        );

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                received = channels.from_lower.recv() => match received {
                    Some((face_id, packet)) => {
                        let actions = self.handle_packet(face_id, packet, false).await;
                        self.forward(&mut channels, actions).await?;
                    }
                    None => {
                        info!("Lower channel closed");
                        break;
                    }
                },
                received = recv_optional(&mut channels.from_higher) => match received {
                    Some((face_id, packet)) => {
                        let actions = self.handle_packet(face_id, packet, true).await;
                        self.forward(&mut channels, actions).await?;
                    }
                    None => {
                        info!("Higher channel closed, application detached");
                        channels.from_higher = None;
                    }
                },
                _ = ageing.tick() => {
                    let report = self.ageing().await;
                    if report.is_idle() {
                        trace!("Ageing sweep: nothing to do");
                    } else {
                        debug!(
                            "Ageing sweep: {} retransmitted, {} expired, {} evicted",
                            report.retransmitted, report.expired, report.evicted
                        );
                    }
                    self.forward(&mut channels, report.actions).await?;
                }
            }
        }

        info!("Forwarding engine stopped");
        Ok(())
    }

    /// Dispatch actions; a vanished application is detached, a vanished
    /// network side is an error.
    async fn forward(&self, channels: &mut ForwarderChannels, actions: Vec<ForwardingAction>) -> Result<()> {
        match dispatch(channels, actions).await {
            Err(ForwarderError::ChannelClosed(Direction::Higher)) => {
                warn!("Higher channel closed, application detached");
                channels.to_higher = None;
                Ok(())
            }
            other => other,
        }
    }
}

async fn recv_optional(receiver: &mut Option<mpsc::Receiver<FacePacket>>) -> Option<FacePacket> {
    match receiver {
        Some(receiver) => receiver.recv().await,
        None => std::future::pending().await,
    }
}

/// Push actions onto the outbound queues.
///
/// Network sends stop at the first failure. A failed application send is
/// reported after the remaining actions went out.
async fn dispatch(channels: &ForwarderChannels, actions: Vec<ForwardingAction>) -> Result<()> {
    let mut higher_closed = false;
    for action in actions {
        match action {
            ForwardingAction::ToLower { face_id, packet } => {
                channels
                    .to_lower
                    .send((face_id, packet))
                    .await
                    .map_err(|_| ForwarderError::ChannelClosed(Direction::Lower))?;
            }
            ForwardingAction::ToHigher { face_id, packet } => match &channels.to_higher {
                Some(to_higher) if !higher_closed => {
                    if to_higher.send((face_id, packet)).await.is_err() {
                        higher_closed = true;
                    }
                }
                _ => debug!("No application attached, dropping {} for face {}", packet.kind(), face_id),
            },
        }
    }
    if higher_closed {
        return Err(ForwarderError::ChannelClosed(Direction::Higher));
    }
    Ok(())
}
