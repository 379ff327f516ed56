//! webrtc-rs backed peer connections
//!
//! Every connection sends the same shared local tracks: one video sender that is
//! switched between camera and screen, the microphone, and a secondary audio
//! sender that carries screen audio while a share with audio is running.

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, mpsc};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::{MIME_TYPE_OPUS, MIME_TYPE_VP8, MediaEngine};
use webrtc::api::{API, APIBuilder};
use webrtc::ice_transport::ice_candidate::RTCIceCandidateInit;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::rtp_transceiver::RTCRtpTransceiverInit;
use webrtc::rtp_transceiver::rtp_codec::{RTCRtpCodecCapability, RTPCodecType};
use webrtc::rtp_transceiver::rtp_sender::RTCRtpSender;
use webrtc::rtp_transceiver::rtp_transceiver_direction::RTCRtpTransceiverDirection;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_remote::TrackRemote;

use huddle_protocol::IceCandidateData;

use super::{PeerConnector, PeerError, PeerEventKind, PeerEventSender, PeerLink, PeerRole, Signal};
use crate::config::IceServerConfig;
use crate::state::TrackSource;

/// Inbound track handed to whatever renders remote media
pub struct RemoteTrack {
    pub peer_id: String,
    pub track: Arc<TrackRemote>,
}

/// Local sample tracks shared by every peer connection
///
/// The capture pipeline writes samples into these; connections only reference them.
pub struct LocalTracks {
    pub camera: Arc<TrackLocalStaticSample>,
    pub microphone: Arc<TrackLocalStaticSample>,
    pub screen: Arc<TrackLocalStaticSample>,
    pub screen_audio: Arc<TrackLocalStaticSample>,
}

impl LocalTracks {
    pub fn new(stream_id: &str) -> Self {
        let video = |id: &str| {
            Arc::new(TrackLocalStaticSample::new(
                RTCRtpCodecCapability {
                    mime_type: MIME_TYPE_VP8.to_owned(),
                    clock_rate: 90000,
                    ..Default::default()
                },
                id.to_owned(),
                stream_id.to_owned(),
            ))
        };
        let audio = |id: &str| {
            Arc::new(TrackLocalStaticSample::new(
                RTCRtpCodecCapability {
                    mime_type: MIME_TYPE_OPUS.to_owned(),
                    clock_rate: 48000,
                    channels: 2,
                    ..Default::default()
                },
                id.to_owned(),
                stream_id.to_owned(),
            ))
        };

        Self {
            camera: video("camera"),
            microphone: audio("microphone"),
            screen: video("screen"),
            screen_audio: audio("screen-audio"),
        }
    }

    fn video_for(&self, source: TrackSource) -> Arc<dyn TrackLocal + Send + Sync> {
        match source {
            TrackSource::Camera => self.camera.clone(),
            TrackSource::Screen { .. } => self.screen.clone(),
        }
    }

    fn screen_audio_for(&self, source: TrackSource) -> Option<Arc<dyn TrackLocal + Send + Sync>> {
        match source {
            TrackSource::Screen { with_audio: true } => Some(self.screen_audio.clone()),
            _ => None,
        }
    }
}

pub struct RtcConnector {
    api: API,
    configuration: RTCConfiguration,
    tracks: Arc<LocalTracks>,
    remote_tracks: Option<mpsc::UnboundedSender<RemoteTrack>>,
}

impl RtcConnector {
    pub fn new(ice_servers: &[IceServerConfig], tracks: Arc<LocalTracks>) -> Result<Self, PeerError> {
        let mut media_engine = MediaEngine::default();
        media_engine.register_default_codecs()?;
        let registry = register_default_interceptors(Registry::new(), &mut media_engine)?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        let ice_servers = ice_servers
            .iter()
            .map(|server| RTCIceServer {
                urls: server.urls.clone(),
                username: server.username.clone().unwrap_or_default(),
                credential: server.credential.clone().unwrap_or_default(),
                ..Default::default()
            })
            .collect();

        Ok(Self {
            api,
            configuration: RTCConfiguration {
                ice_servers,
                ..Default::default()
            },
            tracks,
            remote_tracks: None,
        })
    }

    /// Forward inbound tracks to `tx`
    pub fn with_remote_tracks(mut self, tx: mpsc::UnboundedSender<RemoteTrack>) -> Self {
        self.remote_tracks = Some(tx);
        self
    }
}

#[async_trait]
impl PeerConnector for RtcConnector {
    async fn open(
        &self,
        peer_id: &str,
        role: PeerRole,
        source: TrackSource,
        events: PeerEventSender,
    ) -> Result<Arc<dyn PeerLink>, PeerError> {
        let pc = Arc::new(self.api.new_peer_connection(self.configuration.clone()).await?);

        let video_sender = pc.add_track(self.tracks.video_for(source)).await?;
        let audio_sender = pc.add_track(self.tracks.microphone.clone()).await?;
        let screen_audio = pc
            .add_transceiver_from_kind(
                RTPCodecType::Audio,
                Some(RTCRtpTransceiverInit {
                    direction: RTCRtpTransceiverDirection::Sendrecv,
                    send_encodings: vec![],
                }),
            )
            .await?;
        let screen_audio_sender = screen_audio.sender().await;
        if let Some(track) = self.tracks.screen_audio_for(source) {
            screen_audio_sender.replace_track(Some(track)).await?;
        }

        for sender in [video_sender.clone(), audio_sender, screen_audio_sender.clone()] {
            drain_rtcp(sender);
        }

        let closing = Arc::new(AtomicBool::new(false));
        register_callbacks(&pc, &events, closing.clone(), self.remote_tracks.clone());

        if role == PeerRole::Initiator {
            let offer = pc.create_offer(None).await?;
            pc.set_local_description(offer.clone()).await?;
            events.emit(PeerEventKind::Signal(Signal::Offer { sdp: offer.sdp }));
        }

        tracing::debug!("Peer connection to {} created as {:?}", peer_id, role);

        Ok(Arc::new(RtcLink {
            pc,
            events,
            tracks: self.tracks.clone(),
            video_sender,
            screen_audio_sender,
            pending_candidates: Mutex::new(Vec::new()),
            closing,
        }))
    }
}

fn register_callbacks(
    pc: &Arc<RTCPeerConnection>,
    events: &PeerEventSender,
    closing: Arc<AtomicBool>,
    remote_tracks: Option<mpsc::UnboundedSender<RemoteTrack>>,
) {
    let ice_events = events.clone();
    pc.on_ice_candidate(Box::new(move |candidate| {
        let events = ice_events.clone();
        Box::pin(async move {
            let Some(candidate) = candidate else { return };
            match candidate.to_json() {
                Ok(init) => events.emit(PeerEventKind::Signal(Signal::Candidate(IceCandidateData {
                    candidate: init.candidate,
                    sdp_mid: init.sdp_mid,
                    sdp_mline_index: init.sdp_mline_index,
                    username_fragment: init.username_fragment,
                }))),
                Err(e) => tracing::warn!("Failed to serialize ICE candidate: {}", e),
            }
        })
    }));

    let track_events = events.clone();
    pc.on_track(Box::new(move |track, _receiver, _transceiver| {
        tracing::info!(
            "Remote {:?} track {} from {}",
            track.kind(),
            track.id(),
            track_events.peer_id()
        );
        track_events.emit(PeerEventKind::TrackReceived);
        if let Some(tx) = &remote_tracks {
            let _ = tx.send(RemoteTrack {
                peer_id: track_events.peer_id().to_string(),
                track,
            });
        }
        Box::pin(async {})
    }));

    let state_events = events.clone();
    pc.on_peer_connection_state_change(Box::new(move |state: RTCPeerConnectionState| {
        match state {
            RTCPeerConnectionState::Failed => {
                state_events.emit(PeerEventKind::Failed("peer connection failed".to_string()));
            }
            RTCPeerConnectionState::Closed if !closing.load(Ordering::SeqCst) => {
                state_events.emit(PeerEventKind::Closed);
            }
            other => {
                tracing::debug!("Peer {} connection state: {}", state_events.peer_id(), other);
            }
        }
        Box::pin(async {})
    }));
}

/// Interceptors only run while RTCP is read
fn drain_rtcp(sender: Arc<RTCRtpSender>) {
    tokio::spawn(async move {
        let mut buf = vec![0u8; 1500];
        while sender.read(&mut buf).await.is_ok() {}
    });
}

struct RtcLink {
    pc: Arc<RTCPeerConnection>,
    events: PeerEventSender,
    tracks: Arc<LocalTracks>,
    video_sender: Arc<RTCRtpSender>,
    screen_audio_sender: Arc<RTCRtpSender>,
    /// Candidates that arrived before the remote description
    pending_candidates: Mutex<Vec<RTCIceCandidateInit>>,
    closing: Arc<AtomicBool>,
}

impl RtcLink {
    async fn flush_pending_candidates(&self) -> Result<(), PeerError> {
        let pending: Vec<_> = self.pending_candidates.lock().await.drain(..).collect();
        for candidate in pending {
            self.pc.add_ice_candidate(candidate).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl PeerLink for RtcLink {
    async fn apply_signal(&self, signal: Signal) -> Result<(), PeerError> {
        match signal {
            Signal::Offer { sdp } => {
                self.pc
                    .set_remote_description(RTCSessionDescription::offer(sdp)?)
                    .await?;
                self.flush_pending_candidates().await?;

                let answer = self.pc.create_answer(None).await?;
                self.pc.set_local_description(answer.clone()).await?;
                self.events
                    .emit(PeerEventKind::Signal(Signal::Answer { sdp: answer.sdp }));
            }
            Signal::Answer { sdp } => {
                self.pc
                    .set_remote_description(RTCSessionDescription::answer(sdp)?)
                    .await?;
                self.flush_pending_candidates().await?;
            }
            Signal::Candidate(candidate) => {
                let init = RTCIceCandidateInit {
                    candidate: candidate.candidate,
                    sdp_mid: candidate.sdp_mid,
                    sdp_mline_index: candidate.sdp_mline_index,
                    username_fragment: candidate.username_fragment,
                };
                if self.pc.remote_description().await.is_none() {
                    self.pending_candidates.lock().await.push(init);
                } else {
                    self.pc.add_ice_candidate(init).await?;
                }
            }
        }
        Ok(())
    }

    async fn replace_source(&self, source: TrackSource) -> Result<(), PeerError> {
        self.video_sender
            .replace_track(Some(self.tracks.video_for(source)))
            .await?;
        self.screen_audio_sender
            .replace_track(self.tracks.screen_audio_for(source))
            .await?;
        Ok(())
    }

    async fn close(&self) {
        if self.closing.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Err(e) = self.pc.close().await {
            tracing::warn!("Error closing peer connection to {}: {}", self.events.peer_id(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_selection_follows_source() {
        let tracks = LocalTracks::new("local");
        assert_eq!(tracks.video_for(TrackSource::Camera).id(), "camera");
        assert_eq!(
            tracks.video_for(TrackSource::Screen { with_audio: false }).id(),
            "screen"
        );
        assert!(tracks.screen_audio_for(TrackSource::Screen { with_audio: false }).is_none());
        assert!(tracks.screen_audio_for(TrackSource::Screen { with_audio: true }).is_some());
        assert!(tracks.screen_audio_for(TrackSource::Camera).is_none());
    }
}
