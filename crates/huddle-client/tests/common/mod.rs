#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

use huddle::config::ClientConfig;
use huddle::media::MediaCapture;
use huddle::network::{Outbound, SignalingClient};
use huddle::peer::{
    PeerConnector, PeerError, PeerEventKind, PeerEventSender, PeerLink, PeerRole, PeerState,
    Signal,
};
use huddle::state::TrackSource;
use huddle::{ClientError, Session, SessionContext, SessionHandle, SessionUpdate};
use huddle_protocol::{ClientMessage, ParticipantInfo, RelayMessage};

pub const SELF_ID: &str = "me0000001";

pub struct FakeLink {
    pub peer_id: String,
    pub role: PeerRole,
    pub initial_source: TrackSource,
    pub events: PeerEventSender,
    pub swaps: Mutex<Vec<TrackSource>>,
    pub signals: Mutex<Vec<Signal>>,
    pub closed: AtomicBool,
    fail_swaps: bool,
}

impl FakeLink {
    pub fn generation(&self) -> u64 {
        self.events.generation()
    }

    pub fn emit(&self, kind: PeerEventKind) {
        self.events.emit(kind);
    }

    pub fn swaps(&self) -> Vec<TrackSource> {
        self.swaps.lock().unwrap().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PeerLink for FakeLink {
    async fn apply_signal(&self, signal: Signal) -> Result<(), PeerError> {
        if let Signal::Offer { .. } = signal {
            self.events.emit(PeerEventKind::Signal(Signal::Answer {
                sdp: format!("answer-to-{}", self.peer_id),
            }));
        }
        self.signals.lock().unwrap().push(signal);
        Ok(())
    }

    async fn replace_source(&self, source: TrackSource) -> Result<(), PeerError> {
        self.swaps.lock().unwrap().push(source);
        if self.fail_swaps {
            return Err(PeerError::Backend("sender is gone".to_string()));
        }
        Ok(())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Connector that records every instance it opens
#[derive(Default)]
pub struct FakeConnector {
    links: Mutex<Vec<Arc<FakeLink>>>,
    failing_swaps: Mutex<HashSet<String>>,
}

impl FakeConnector {
    pub fn fail_swaps_for(&self, peer_id: &str) {
        self.failing_swaps.lock().unwrap().insert(peer_id.to_string());
    }

    pub fn links(&self) -> Vec<Arc<FakeLink>> {
        self.links.lock().unwrap().clone()
    }

    pub fn links_for(&self, peer_id: &str) -> Vec<Arc<FakeLink>> {
        self.links()
            .into_iter()
            .filter(|link| link.peer_id == peer_id)
            .collect()
    }

    pub fn latest(&self, peer_id: &str) -> Arc<FakeLink> {
        self.links_for(peer_id)
            .pop()
            .unwrap_or_else(|| panic!("no connection opened to {}", peer_id))
    }
}

#[async_trait]
impl PeerConnector for FakeConnector {
    async fn open(
        &self,
        peer_id: &str,
        role: PeerRole,
        source: TrackSource,
        events: PeerEventSender,
    ) -> Result<Arc<dyn PeerLink>, PeerError> {
        if role == PeerRole::Initiator {
            events.emit(PeerEventKind::Signal(Signal::Offer {
                sdp: format!("offer-to-{}", peer_id),
            }));
        }

        let link = Arc::new(FakeLink {
            peer_id: peer_id.to_string(),
            role,
            initial_source: source,
            events,
            swaps: Mutex::new(Vec::new()),
            signals: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
            fail_swaps: self.failing_swaps.lock().unwrap().contains(peer_id),
        });
        self.links.lock().unwrap().push(link.clone());
        Ok(link)
    }
}

#[derive(Default)]
pub struct FakeCapture {
    pub fail_acquire: bool,
    pub fail_screen: AtomicBool,
    pub releases: AtomicUsize,
    pub screen_active: AtomicBool,
}

#[async_trait]
impl MediaCapture for FakeCapture {
    async fn acquire(&self) -> huddle::Result<()> {
        if self.fail_acquire {
            return Err(ClientError::Media("camera not found".to_string()));
        }
        Ok(())
    }

    async fn start_screen(&self, _with_audio: bool) -> huddle::Result<()> {
        if self.fail_screen.load(Ordering::SeqCst) {
            return Err(ClientError::Media("picker dismissed".to_string()));
        }
        self.screen_active.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn stop_screen(&self) {
        self.screen_active.store(false, Ordering::SeqCst);
    }

    fn set_enabled(&self, _video: bool, _audio: bool) {}

    fn release(&self) {
        self.releases.fetch_add(1, Ordering::SeqCst);
    }
}

/// A session wired to in-memory relay, connector and capture
pub struct Harness {
    pub session: Session,
    pub handle: SessionHandle,
    pub updates: mpsc::UnboundedReceiver<SessionUpdate>,
    pub outbound: mpsc::UnboundedReceiver<Outbound>,
    pub relay: mpsc::UnboundedSender<RelayMessage>,
    pub connector: Arc<FakeConnector>,
    pub capture: Arc<FakeCapture>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(ClientConfig::default())
    }

    pub fn with_config(config: ClientConfig) -> Self {
        let (signaling, outbound) = SignalingClient::channel();
        let (relay, relay_rx) = mpsc::unbounded_channel();
        let connector = Arc::new(FakeConnector::default());
        let capture = Arc::new(FakeCapture::default());
        let ctx = SessionContext::new(
            "standup",
            SELF_ID,
            "Dana",
            config.presence.speech_threshold,
        );

        let (session, handle, updates) = Session::new(
            &config,
            ctx,
            signaling,
            relay_rx,
            connector.clone(),
            capture.clone(),
        );

        Self {
            session,
            handle,
            updates,
            outbound,
            relay,
            connector,
            capture,
        }
    }

    /// Join with the given peers already present
    pub async fn joined(self_is_host: bool, peers: &[&str]) -> Self {
        let mut harness = Self::new();
        let host_id = if self_is_host {
            SELF_ID.to_string()
        } else {
            peers.first().map(|p| p.to_string()).unwrap_or_default()
        };
        let participants = peers
            .iter()
            .map(|id| ParticipantInfo {
                id: id.to_string(),
                username: format!("user-{}", id),
                is_host: *id == host_id,
            })
            .collect();
        harness
            .session
            .handle_relay(RelayMessage::ExistingParticipants {
                is_host: self_is_host,
                host_id: Some(host_id),
                participants,
            })
            .await;
        harness
    }

    /// Step the session until `done` holds, failing after a bounded number of steps
    pub async fn step_until(&mut self, done: impl Fn(&Session) -> bool) {
        for _ in 0..200 {
            if done(&self.session) {
                return;
            }
            if !self.session.step().await {
                break;
            }
        }
        assert!(done(&self.session), "session never reached the expected state");
    }

    /// Mark every open connection as having received a track, and process the events
    pub async fn connect_all(&mut self) {
        let links = self.connector.links();
        for link in &links {
            link.emit(PeerEventKind::TrackReceived);
        }
        let peer_ids: Vec<String> = links.iter().map(|l| l.peer_id.clone()).collect();
        self.step_until(move |session| {
            peer_ids
                .iter()
                .all(|id| session.peers().state(id) == PeerState::Connected)
        })
        .await;
    }

    pub fn drain_updates(&mut self) -> Vec<SessionUpdate> {
        let mut updates = Vec::new();
        while let Ok(update) = self.updates.try_recv() {
            updates.push(update);
        }
        updates
    }

    pub fn drain_outbound(&mut self) -> Vec<Outbound> {
        let mut frames = Vec::new();
        while let Ok(frame) = self.outbound.try_recv() {
            frames.push(frame);
        }
        frames
    }

    pub fn sent_messages(&mut self) -> Vec<ClientMessage> {
        self.drain_outbound()
            .into_iter()
            .filter_map(|frame| match frame {
                Outbound::Message(message) => Some(message),
                Outbound::Close => None,
            })
            .collect()
    }
}
