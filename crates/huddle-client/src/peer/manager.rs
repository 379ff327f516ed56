use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::connector::{PeerConnector, PeerEvent, PeerEventKind, PeerEventSender, PeerRole, Signal};
use super::session::{PeerSession, PeerState};
use super::ReconnectPolicy;
use crate::network::SignalingClient;
use crate::state::TrackSource;

/// Lifecycle change the session layer reacts to
#[derive(Debug, Clone, PartialEq)]
pub enum PeerNotice {
    /// First inbound track of the current instance arrived
    StreamAttached { peer_id: String },
    Reconnecting {
        peer_id: String,
        attempt: u32,
        reason: String,
    },
    /// Reconnect attempts exhausted; the peer was dropped
    GaveUp { peer_id: String, reason: String },
    /// The peer transport closed and the instance was removed
    Closed { peer_id: String },
}

/// Outcome of swapping the outbound source on every live peer
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SwapReport {
    pub attempted: usize,
    pub failed: Vec<String>,
}

/// Owns at most one connection instance per remote participant
pub struct PeerManager {
    connector: Arc<dyn PeerConnector>,
    signaling: SignalingClient,
    policy: ReconnectPolicy,
    sessions: HashMap<String, PeerSession>,
    reconnect_timers: HashMap<String, JoinHandle<()>>,
    events_tx: mpsc::UnboundedSender<PeerEvent>,
    next_generation: u64,
}

impl PeerManager {
    pub fn new(
        connector: Arc<dyn PeerConnector>,
        signaling: SignalingClient,
        policy: ReconnectPolicy,
    ) -> (Self, mpsc::UnboundedReceiver<PeerEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let manager = Self {
            connector,
            signaling,
            policy,
            sessions: HashMap::new(),
            reconnect_timers: HashMap::new(),
            events_tx,
            next_generation: 1,
        };
        (manager, events_rx)
    }

    /// Open a fresh instance for `peer_id`, tearing down any prior one
    pub async fn connect(
        &mut self,
        peer_id: &str,
        role: PeerRole,
        source: TrackSource,
    ) -> Option<PeerNotice> {
        if self.sessions.contains_key(peer_id) {
            tracing::info!("Replacing existing connection to {}", peer_id);
            self.close(peer_id).await;
        }

        let mut session = PeerSession::new(peer_id, role, source, 0, 0);
        self.start_instance(&mut session).await;
        self.sessions.insert(peer_id.to_string(), session);

        match self.sessions.get(peer_id).map(|s| s.link.is_none()) {
            Some(true) => self.begin_reconnect(peer_id, "connection setup failed").await,
            _ => None,
        }
    }

    /// Feed an inbound signal to the peer's instance, creating a responder if none exists
    pub async fn route_signal(
        &mut self,
        from: &str,
        signal: Signal,
        source: TrackSource,
    ) -> Option<PeerNotice> {
        let mut notice = None;
        match self.sessions.get_mut(from) {
            None => {
                tracing::info!("Creating responder for {} from {}", signal.kind(), from);
                notice = self.connect(from, PeerRole::Responder, source).await;
            }
            Some(session) if session.state == PeerState::Reconnecting => {
                // anything but a fresh offer was meant for the failed instance
                if !matches!(signal, Signal::Offer { .. }) {
                    tracing::debug!("Dropping {} from {} while reconnecting", signal.kind(), from);
                    return None;
                }
                tracing::info!("Offer from {} while reconnecting, reopening now", from);
                session.role = PeerRole::Responder;
                if let Some(timer) = self.reconnect_timers.remove(from) {
                    timer.abort();
                }
                notice = self.reopen(from, source).await;
            }
            Some(_) => {}
        }

        let link = self.sessions.get(from).and_then(|s| s.link.clone());
        let Some(link) = link else {
            tracing::warn!("No live connection to {}, dropping {}", from, signal.kind());
            return notice;
        };

        let kind = signal.kind();
        if let Err(e) = link.apply_signal(signal).await {
            tracing::error!("Failed to apply {} from {}: {}", kind, from, e);
        }
        notice
    }

    /// Process an event from a connection instance
    ///
    /// Events stamped with a generation other than the peer's current instance are dropped.
    pub async fn handle_event(
        &mut self,
        event: PeerEvent,
        current_source: TrackSource,
    ) -> Option<PeerNotice> {
        let PeerEvent {
            peer_id,
            generation,
            kind,
        } = event;

        let state = match self.sessions.get(&peer_id) {
            Some(session) if session.generation == generation => session.state,
            _ => {
                tracing::debug!("Ignoring stale event from {} (generation {})", peer_id, generation);
                return None;
            }
        };

        match kind {
            PeerEventKind::Signal(signal) => {
                if state.is_live() {
                    self.signaling.send(signal.into_message(&peer_id));
                }
                None
            }
            PeerEventKind::TrackReceived => {
                if state != PeerState::Negotiating {
                    return None;
                }
                let session = self.sessions.get_mut(&peer_id)?;
                if let Err(e) = session.transition(PeerState::Connected) {
                    tracing::warn!("{}", e);
                    return None;
                }
                session.retry_count = 0;
                tracing::info!("Connected to {}", peer_id);
                Some(PeerNotice::StreamAttached { peer_id })
            }
            PeerEventKind::Failed(reason) => {
                if !state.is_live() {
                    return None;
                }
                tracing::warn!("Connection to {} failed: {}", peer_id, reason);
                self.begin_reconnect(&peer_id, &reason).await
            }
            PeerEventKind::Closed => {
                tracing::info!("Connection to {} closed by transport", peer_id);
                self.close(&peer_id).await;
                Some(PeerNotice::Closed { peer_id })
            }
            PeerEventKind::ReconnectDue => {
                if state != PeerState::Reconnecting {
                    return None;
                }
                self.reconnect_timers.remove(&peer_id);
                self.reopen(&peer_id, current_source).await
            }
        }
    }

    /// Swap the outbound source on every peer, one independent attempt each
    pub async fn replace_source_all(&mut self, source: TrackSource) -> SwapReport {
        let mut targets = Vec::new();
        for session in self.sessions.values_mut() {
            session.source = source;
            if let Some(link) = &session.link {
                targets.push((session.peer_id.clone(), link.clone()));
            }
        }

        let attempts = targets.into_iter().map(|(peer_id, link)| async move {
            let result = link.replace_source(source).await;
            (peer_id, result)
        });
        let results = join_all(attempts).await;

        let mut report = SwapReport {
            attempted: results.len(),
            failed: Vec::new(),
        };
        for (peer_id, result) in results {
            if let Err(e) = result {
                tracing::error!("Failed to replace track for {}: {}", peer_id, e);
                report.failed.push(peer_id);
            }
        }
        report
    }

    /// Tear down the peer's instance; false if there was none
    pub async fn close(&mut self, peer_id: &str) -> bool {
        if let Some(timer) = self.reconnect_timers.remove(peer_id) {
            timer.abort();
        }
        let Some(mut session) = self.sessions.remove(peer_id) else {
            return false;
        };
        let _ = session.transition(PeerState::Closed);
        if let Some(link) = session.link.take() {
            link.close().await;
        }
        tracing::info!("Closed connection to {}", peer_id);
        true
    }

    pub async fn close_all(&mut self) {
        let peer_ids: Vec<String> = self.sessions.keys().cloned().collect();
        for peer_id in peer_ids {
            self.close(&peer_id).await;
        }
        for (_, timer) in self.reconnect_timers.drain() {
            timer.abort();
        }
    }

    /// Lifecycle state of `peer_id`, `Idle` when no instance exists
    pub fn state(&self, peer_id: &str) -> PeerState {
        self.sessions
            .get(peer_id)
            .map(|s| s.state)
            .unwrap_or(PeerState::Idle)
    }

    pub fn session(&self, peer_id: &str) -> Option<&PeerSession> {
        self.sessions.get(peer_id)
    }

    pub fn peer_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.sessions.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn pending_reconnects(&self) -> usize {
        self.reconnect_timers.len()
    }

    /// Give `session` a new generation and open its connection
    async fn start_instance(&mut self, session: &mut PeerSession) {
        session.generation = self.next_generation;
        self.next_generation += 1;
        let _ = session.transition(PeerState::Negotiating);

        let events = PeerEventSender::new(&session.peer_id, session.generation, self.events_tx.clone());
        match self
            .connector
            .open(&session.peer_id, session.role, session.source, events)
            .await
        {
            Ok(link) => {
                tracing::debug!(
                    "Opened {:?} connection to {} (generation {})",
                    session.role,
                    session.peer_id,
                    session.generation
                );
                session.link = Some(link);
            }
            Err(e) => {
                tracing::error!("Failed to open connection to {}: {}", session.peer_id, e);
            }
        }
    }

    async fn begin_reconnect(&mut self, peer_id: &str, reason: &str) -> Option<PeerNotice> {
        let session = self.sessions.get_mut(peer_id)?;
        let attempt = session.retry_count + 1;

        let Some(delay) = self.policy.delay_for(attempt) else {
            tracing::warn!("Giving up on {} after {} attempts", peer_id, session.retry_count);
            self.close(peer_id).await;
            return Some(PeerNotice::GaveUp {
                peer_id: peer_id.to_string(),
                reason: reason.to_string(),
            });
        };

        if let Err(e) = session.transition(PeerState::Reconnecting) {
            tracing::warn!("{}", e);
            return None;
        }
        session.retry_count = attempt;

        let events = PeerEventSender::new(peer_id, session.generation, self.events_tx.clone());
        let timer = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            events.emit(PeerEventKind::ReconnectDue);
        });
        if let Some(previous) = self.reconnect_timers.insert(peer_id.to_string(), timer) {
            previous.abort();
        }

        tracing::info!("Reconnecting to {} in {:?} (attempt {})", peer_id, delay, attempt);
        Some(PeerNotice::Reconnecting {
            peer_id: peer_id.to_string(),
            attempt,
            reason: reason.to_string(),
        })
    }

    /// Discard the failed instance and renegotiate in the same role
    async fn reopen(&mut self, peer_id: &str, source: TrackSource) -> Option<PeerNotice> {
        let mut session = self.sessions.remove(peer_id)?;
        if let Some(link) = session.link.take() {
            link.close().await;
        }
        session.source = source;
        self.start_instance(&mut session).await;
        let failed = session.link.is_none();
        self.sessions.insert(peer_id.to_string(), session);

        if failed {
            self.begin_reconnect(peer_id, "connection setup failed").await
        } else {
            None
        }
    }
}
