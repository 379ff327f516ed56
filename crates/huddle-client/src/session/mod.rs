//! Meeting session: one event loop that owns every piece of session state
//!
//! Relay messages, peer events, user commands, presence ticks and timers are all
//! handled on the single task that drives [`Session::run`], so no state is shared
//! across tasks. Relay messages are handled strictly in arrival order.

mod context;
mod handle;
mod update;

pub use context::{SessionContext, format_elapsed};
pub use handle::{Command, SessionHandle};
pub use update::{LeaveReason, NoticeLevel, SessionUpdate};

use chrono::{DateTime, Utc};
use huddle_protocol::{ClientMessage, ControlAction, ParticipantInfo, RelayMessage};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Interval, MissedTickBehavior};

use crate::config::ClientConfig;
use crate::control::ControlEffect;
use crate::media::MediaCapture;
use crate::network::{SignalingClient, generate_participant_id};
use crate::peer::{PeerConnector, PeerEvent, PeerManager, PeerNotice, PeerRole, Signal, SwapReport};
use crate::presence::SpeakerChange;
use crate::state::{ChatEntry, MediaState};
use crate::{ClientError, Result};

const DEFAULT_USERNAME: &str = "Anonymous";

enum TimerEvent {
    KickLeave,
}

pub struct Session {
    ctx: SessionContext,
    signaling: SignalingClient,
    relay_rx: mpsc::UnboundedReceiver<RelayMessage>,
    peers: PeerManager,
    peer_rx: mpsc::UnboundedReceiver<PeerEvent>,
    commands_rx: mpsc::UnboundedReceiver<Command>,
    commands_open: bool,
    timer_tx: mpsc::UnboundedSender<TimerEvent>,
    timer_rx: mpsc::UnboundedReceiver<TimerEvent>,
    updates: mpsc::UnboundedSender<SessionUpdate>,
    capture: Arc<dyn MediaCapture>,
    presence_tick: Interval,
    kick_delay: Duration,
    kick_timer: Option<JoinHandle<()>>,
    finished: bool,
}

/// Join `meeting_id`: acquire local media, open the relay channel and register
pub async fn join(
    config: &ClientConfig,
    meeting_id: &str,
    username: &str,
    capture: Arc<dyn MediaCapture>,
    connector: Arc<dyn PeerConnector>,
) -> Result<(Session, SessionHandle, mpsc::UnboundedReceiver<SessionUpdate>)> {
    let meeting_id = meeting_id.trim();
    if meeting_id.is_empty() {
        return Err(ClientError::Config("a meeting id is required".to_string()));
    }
    let username = match username.trim() {
        "" => DEFAULT_USERNAME,
        name => name,
    };
    let participant_id = generate_participant_id();

    if let Err(e) = capture.acquire().await {
        tracing::error!("Failed to access camera/microphone: {}", e);
        return Err(e);
    }

    let url = config.meeting_url(meeting_id, &participant_id);
    tracing::info!("Joining meeting {} as {} ({})", meeting_id, username, participant_id);
    let (signaling, relay_rx) = match SignalingClient::connect(&url, username).await {
        Ok(connection) => connection,
        Err(e) => {
            tracing::error!("Failed to connect to relay: {}", e);
            capture.release();
            return Err(e);
        }
    };

    let ctx = SessionContext::new(
        meeting_id,
        &participant_id,
        username,
        config.presence.speech_threshold,
    );
    Ok(Session::new(config, ctx, signaling, relay_rx, connector, capture))
}

impl Session {
    /// Assemble a session around an already registered relay channel
    pub fn new(
        config: &ClientConfig,
        ctx: SessionContext,
        signaling: SignalingClient,
        relay_rx: mpsc::UnboundedReceiver<RelayMessage>,
        connector: Arc<dyn PeerConnector>,
        capture: Arc<dyn MediaCapture>,
    ) -> (Self, SessionHandle, mpsc::UnboundedReceiver<SessionUpdate>) {
        let (peers, peer_rx) =
            PeerManager::new(connector, signaling.clone(), config.reconnect_policy());
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (timer_tx, timer_rx) = mpsc::unbounded_channel();
        let (updates, updates_rx) = mpsc::unbounded_channel();

        let mut presence_tick =
            tokio::time::interval(config.poll_interval().max(Duration::from_millis(1)));
        presence_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let session = Self {
            ctx,
            signaling,
            relay_rx,
            peers,
            peer_rx,
            commands_rx,
            commands_open: true,
            timer_tx,
            timer_rx,
            updates,
            capture,
            presence_tick,
            kick_delay: config.kick_leave_delay(),
            kick_timer: None,
            finished: false,
        };
        (session, SessionHandle::new(commands_tx), updates_rx)
    }

    /// Drive the session until it ends, handing back the final context
    pub async fn run(mut self) -> SessionContext {
        while self.step().await {}
        self.ctx
    }

    /// Handle one event from whichever source is ready; false once the session has ended
    pub async fn step(&mut self) -> bool {
        if self.finished {
            return false;
        }

        tokio::select! {
            message = self.relay_rx.recv() => match message {
                Some(message) => self.handle_relay(message).await,
                None => self.on_transport_lost().await,
            },
            Some(event) = self.peer_rx.recv() => self.handle_peer_event(event).await,
            command = self.commands_rx.recv(), if self.commands_open => match command {
                Some(command) => self.handle_command(command).await,
                None => {
                    tracing::debug!("All session handles dropped");
                    self.commands_open = false;
                }
            },
            Some(timer) = self.timer_rx.recv() => self.handle_timer(timer).await,
            _ = self.presence_tick.tick() => self.poll_presence(),
        }

        !self.finished
    }

    pub fn context(&self) -> &SessionContext {
        &self.ctx
    }

    pub fn peers(&self) -> &PeerManager {
        &self.peers
    }

    pub fn signaling(&self) -> &SignalingClient {
        &self.signaling
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub async fn handle_relay(&mut self, message: RelayMessage) {
        if self.finished {
            return;
        }
        tracing::debug!("Relay message: {}", message.kind());

        match message {
            RelayMessage::ExistingParticipants {
                is_host,
                host_id,
                participants,
            } => self.on_existing_participants(is_host, host_id, participants).await,
            RelayMessage::ParticipantJoined {
                participant_id,
                username,
                is_host,
                participant_count,
            } => self.on_participant_joined(participant_id, username, is_host, participant_count),
            RelayMessage::ParticipantLeft {
                participant_id,
                username,
                participant_count,
            } => {
                self.on_participant_left(participant_id, username, participant_count)
                    .await
            }
            RelayMessage::Chat {
                from,
                username,
                message,
                timestamp,
            } => self.on_chat(from, username, message, timestamp),
            RelayMessage::Reaction {
                from,
                username,
                emoji,
            } => {
                if from.as_deref().is_some_and(|id| self.ctx.is_self(id)) {
                    return;
                }
                self.emit(SessionUpdate::ReactionReceived { username, emoji });
            }
            RelayMessage::ParticipantState {
                from,
                video_enabled,
                audio_enabled,
            } => self.on_participant_state(from, video_enabled, audio_enabled),
            RelayMessage::HostControl {
                from_host,
                target_id,
                action,
                value,
            } => self.on_host_control(from_host, &target_id, action, value),
            RelayMessage::ScreenShare { from, sharing } => self.on_screen_share(from, sharing),
            signal @ (RelayMessage::Offer { .. }
            | RelayMessage::Answer { .. }
            | RelayMessage::IceCandidate { .. }) => self.on_signal(signal).await,
            RelayMessage::Unknown => {
                tracing::debug!("Ignoring unrecognized relay message");
            }
        }
    }

    pub async fn handle_peer_event(&mut self, event: PeerEvent) {
        if self.finished {
            return;
        }
        let notice = self
            .peers
            .handle_event(event, self.ctx.media.current_source())
            .await;
        self.apply_peer_notice(notice);
    }

    pub async fn handle_command(&mut self, command: Command) {
        if self.finished {
            if let Command::HostControl { reply, .. } = command {
                let _ = reply.send(Err(ClientError::SessionClosed));
            }
            return;
        }

        match command {
            Command::ToggleVideo => {
                self.ctx.media.toggle_video();
                self.publish_media_state();
            }
            Command::ToggleAudio => {
                self.ctx.media.toggle_audio();
                self.publish_media_state();
            }
            Command::StartScreenShare { with_audio } => {
                self.start_screen_share(with_audio).await;
            }
            Command::StopScreenShare => {
                self.stop_screen_share().await;
            }
            Command::SendChat(text) => self.send_chat(&text),
            Command::SendReaction(emoji) => self.send_reaction(&emoji),
            Command::SetChatOpen(open) => {
                self.ctx.chat.set_panel_open(open);
                self.emit(SessionUpdate::UnreadChanged(self.ctx.chat.unread_badge()));
            }
            Command::HostControl {
                target_id,
                action,
                reply,
            } => {
                let result = self.host_control(&target_id, action);
                let _ = reply.send(result);
            }
            Command::RegisterAudioSource {
                participant_id,
                source,
            } => self.ctx.speaker.register(&participant_id, source),
            Command::UnregisterAudioSource { participant_id } => {
                let change = self.ctx.speaker.unregister(&participant_id);
                self.emit_speaker_change(change);
            }
            Command::Leave => self.leave(LeaveReason::Requested).await,
        }
    }

    /// Switch every peer to the screen source; a no-op while a share is running
    pub async fn start_screen_share(&mut self, with_audio: bool) -> Option<SwapReport> {
        if self.ctx.media.is_sharing_screen() {
            tracing::debug!("Screen share already running");
            return None;
        }

        if let Err(e) = self.capture.start_screen(with_audio).await {
            tracing::error!("Failed to start screen capture: {}", e);
            self.emit(SessionUpdate::notice(NoticeLevel::Error, "Failed to start screen sharing"));
            return None;
        }
        if !self.ctx.media.start_screen_share(with_audio) {
            self.capture.stop_screen();
            return None;
        }

        let report = self
            .peers
            .replace_source_all(self.ctx.media.current_source())
            .await;
        self.report_swap_failures(&report);

        self.signaling.send(ClientMessage::ScreenShare { sharing: true });
        self.emit_local_media();
        self.emit(SessionUpdate::notice(NoticeLevel::Success, "Screen sharing started"));
        Some(report)
    }

    /// Switch every peer back to the camera; a no-op when no share is running
    pub async fn stop_screen_share(&mut self) -> Option<SwapReport> {
        if !self.ctx.media.stop_screen_share() {
            return None;
        }
        self.capture.stop_screen();

        let report = self
            .peers
            .replace_source_all(self.ctx.media.current_source())
            .await;
        self.report_swap_failures(&report);

        self.signaling.send(ClientMessage::ScreenShare { sharing: false });
        self.emit_local_media();
        self.emit(SessionUpdate::notice(NoticeLevel::Info, "Screen sharing stopped"));
        Some(report)
    }

    pub fn send_chat(&mut self, text: &str) {
        let message = text.trim();
        if message.is_empty() {
            return;
        }

        let timestamp = Utc::now();
        self.signaling.send(ClientMessage::Chat {
            username: self.ctx.username.clone(),
            message: message.to_string(),
            timestamp: timestamp.to_rfc3339(),
        });

        let sender = self.ctx.own_label();
        self.ctx.chat.push_own(&sender, message, timestamp);
        self.emit(SessionUpdate::ChatReceived(ChatEntry {
            sender,
            message: message.to_string(),
            timestamp,
            is_own: true,
        }));
    }

    pub fn send_reaction(&mut self, emoji: &str) {
        if emoji.trim().is_empty() {
            return;
        }
        self.signaling.send(ClientMessage::Reaction {
            username: self.ctx.username.clone(),
            emoji: emoji.to_string(),
        });
        self.emit(SessionUpdate::ReactionReceived {
            username: self.ctx.own_label(),
            emoji: emoji.to_string(),
        });
    }

    /// Issue a host action; refused locally unless we are the host
    pub fn host_control(&mut self, target_id: &str, action: ControlAction) -> Result<()> {
        let message = match self.ctx.control.request(&self.ctx.host, target_id, action) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!("Refusing {} for {}: {}", action, target_id, e);
                return Err(e.into());
            }
        };
        self.signaling.send(message);

        let notice = match action {
            ControlAction::MuteAudio => {
                SessionUpdate::notice(NoticeLevel::Info, "Mute request sent")
            }
            ControlAction::StopVideo => {
                SessionUpdate::notice(NoticeLevel::Info, "Stop video request sent")
            }
            ControlAction::Kick => SessionUpdate::notice(
                NoticeLevel::Warning,
                format!(
                    "{} has been removed from the meeting",
                    self.ctx.roster.resolve_display_name(target_id)
                ),
            ),
        };
        self.emit(notice);
        Ok(())
    }

    /// Tear everything down; safe to call repeatedly and from any state
    pub async fn leave(&mut self, reason: LeaveReason) {
        if self.finished {
            return;
        }
        self.finished = true;
        tracing::info!("Leaving meeting {} ({:?})", self.ctx.meeting_id, reason);

        if let Some(timer) = self.kick_timer.take() {
            timer.abort();
        }
        self.peers.close_all().await;
        self.signaling.close();
        if self.ctx.media.release() {
            self.capture.release();
        }
        self.ctx.speaker.clear();
        self.ctx.roster.clear();
        self.ctx.chat.clear();

        if reason == LeaveReason::Requested {
            self.emit(SessionUpdate::notice(NoticeLevel::Info, "Left meeting"));
        }
        self.emit(SessionUpdate::Left { reason });
    }

    async fn on_existing_participants(
        &mut self,
        is_host: bool,
        host_id: Option<String>,
        participants: Vec<ParticipantInfo>,
    ) {
        if !self.ctx.host.establish(host_id.clone(), is_host) {
            return;
        }
        self.ctx
            .roster
            .apply_existing_participants(host_id.as_deref(), &participants);

        self.emit(SessionUpdate::Joined {
            meeting_id: self.ctx.meeting_id.clone(),
            participant_id: self.ctx.participant_id.clone(),
            self_is_host: is_host,
        });
        self.emit(SessionUpdate::notice(
            NoticeLevel::Success,
            "Joined meeting successfully!",
        ));

        let peer_ids: Vec<String> = participants
            .into_iter()
            .map(|p| p.id)
            .filter(|id| !self.ctx.is_self(id))
            .collect();
        let source = self.ctx.media.current_source();
        for peer_id in peer_ids {
            let notice = self.peers.connect(&peer_id, PeerRole::Initiator, source).await;
            self.apply_peer_notice(notice);
        }
    }

    fn on_participant_joined(
        &mut self,
        participant_id: String,
        username: String,
        is_host: bool,
        participant_count: Option<usize>,
    ) {
        if self.ctx.is_self(&participant_id) {
            return;
        }
        self.ctx.roster.apply_joined(&participant_id, &username, is_host);
        self.ctx.roster.set_reported_count(participant_count);

        self.emit(SessionUpdate::notice(
            NoticeLevel::Info,
            format!("{} joined the meeting", username),
        ));
        self.emit(SessionUpdate::ParticipantJoined {
            participant_id,
            display_name: username,
            participant_count: self.ctx.roster.participant_count(),
        });
    }

    async fn on_participant_left(
        &mut self,
        participant_id: String,
        username: Option<String>,
        participant_count: Option<usize>,
    ) {
        let display_name = username.unwrap_or_else(|| {
            self.ctx
                .roster
                .resolve_display_name(&participant_id)
                .to_string()
        });

        if self.peers.close(&participant_id).await {
            self.emit(SessionUpdate::StreamRemoved {
                peer_id: participant_id.clone(),
            });
        }
        let change = self.ctx.speaker.unregister(&participant_id);
        self.emit_speaker_change(change);

        self.ctx.roster.apply_left(&participant_id);
        self.ctx.roster.set_reported_count(participant_count);

        self.emit(SessionUpdate::notice(
            NoticeLevel::Info,
            format!("{} left the meeting", display_name),
        ));
        self.emit(SessionUpdate::ParticipantLeft {
            participant_id,
            display_name,
            participant_count: self.ctx.roster.participant_count(),
        });
    }

    fn on_chat(
        &mut self,
        from: Option<String>,
        username: String,
        message: String,
        timestamp: Option<String>,
    ) {
        if from.as_deref().is_some_and(|id| self.ctx.is_self(id)) {
            return;
        }
        if message.trim().is_empty() {
            tracing::debug!("Ignoring empty chat message from {}", username);
            return;
        }

        let timestamp = timestamp
            .as_deref()
            .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_else(Utc::now);

        self.ctx.chat.push_remote(&username, &message, timestamp);
        self.emit(SessionUpdate::ChatReceived(ChatEntry {
            sender: username,
            message,
            timestamp,
            is_own: false,
        }));
        if self.ctx.chat.unread() > 0 {
            self.emit(SessionUpdate::UnreadChanged(self.ctx.chat.unread_badge()));
        }
    }

    fn on_participant_state(&mut self, from: String, video_enabled: bool, audio_enabled: bool) {
        if self.ctx.is_self(&from) {
            return;
        }
        self.ctx
            .roster
            .apply_media_state(&from, video_enabled, audio_enabled);
        self.emit(SessionUpdate::MediaStateChanged {
            participant_id: from,
            state: MediaState {
                video_enabled,
                audio_enabled,
            },
        });
    }

    fn on_screen_share(&mut self, from: Option<String>, sharing: bool) {
        let Some(from) = from else {
            tracing::warn!("Ignoring screen_share without sender");
            return;
        };
        if self.ctx.is_self(&from) {
            return;
        }
        self.ctx.roster.apply_screen_share(&from, sharing);
        self.emit(SessionUpdate::ScreenShareChanged {
            participant_id: from,
            sharing,
        });
    }

    fn on_host_control(
        &mut self,
        from_host: bool,
        target_id: &str,
        action: ControlAction,
        value: bool,
    ) {
        let effect = self
            .ctx
            .control
            .receive(&self.ctx.media, from_host, target_id, action, value);

        match effect {
            ControlEffect::Rejected | ControlEffect::NotForUs | ControlEffect::NoOp => {}
            ControlEffect::MuteAudio => {
                self.ctx.media.set_audio_enabled(false);
                self.publish_media_state();
                self.emit(SessionUpdate::notice(
                    NoticeLevel::Warning,
                    "Host has muted your microphone",
                ));
            }
            ControlEffect::StopVideo => {
                self.ctx.media.set_video_enabled(false);
                self.publish_media_state();
                self.emit(SessionUpdate::notice(
                    NoticeLevel::Warning,
                    "Host has stopped your video",
                ));
            }
            ControlEffect::Kick => {
                tracing::warn!("Removed from meeting by host, leaving in {:?}", self.kick_delay);
                self.emit(SessionUpdate::Kicked);
                self.emit(SessionUpdate::blocking(
                    NoticeLevel::Error,
                    "You have been removed from the meeting by the host",
                ));

                let timer_tx = self.timer_tx.clone();
                let delay = self.kick_delay;
                self.kick_timer = Some(tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = timer_tx.send(TimerEvent::KickLeave);
                }));
            }
        }
    }

    async fn on_signal(&mut self, message: RelayMessage) {
        let Some((from, signal)) = Signal::from_relay(message) else {
            return;
        };
        if self.ctx.is_self(&from) {
            tracing::warn!("Ignoring {} addressed from ourselves", signal.kind());
            return;
        }
        let notice = self
            .peers
            .route_signal(&from, signal, self.ctx.media.current_source())
            .await;
        self.apply_peer_notice(notice);
    }

    async fn on_transport_lost(&mut self) {
        tracing::error!("Connection to the relay was lost");
        self.emit(SessionUpdate::blocking(
            NoticeLevel::Error,
            "Connection to the meeting was lost",
        ));
        self.leave(LeaveReason::TransportLost).await;
    }

    async fn handle_timer(&mut self, timer: TimerEvent) {
        match timer {
            TimerEvent::KickLeave => {
                self.kick_timer = None;
                self.leave(LeaveReason::Kicked).await;
            }
        }
    }

    fn poll_presence(&mut self) {
        let change = self.ctx.speaker.poll();
        self.emit_speaker_change(change);
    }

    fn apply_peer_notice(&mut self, notice: Option<PeerNotice>) {
        let Some(notice) = notice else { return };

        match notice {
            PeerNotice::StreamAttached { peer_id } => {
                let display_name = self.ctx.roster.resolve_display_name(&peer_id).to_string();
                self.emit(SessionUpdate::StreamAttached {
                    peer_id,
                    display_name,
                });
            }
            PeerNotice::Reconnecting { peer_id, .. } => {
                let name = self.ctx.roster.resolve_display_name(&peer_id);
                self.emit(SessionUpdate::notice(
                    NoticeLevel::Warning,
                    format!("Connection to {} lost, reconnecting", name),
                ));
            }
            PeerNotice::GaveUp { peer_id, .. } => {
                let name = self.ctx.roster.resolve_display_name(&peer_id).to_string();
                self.emit(SessionUpdate::StreamRemoved {
                    peer_id: peer_id.clone(),
                });
                let change = self.ctx.speaker.unregister(&peer_id);
                self.emit_speaker_change(change);
                self.emit(SessionUpdate::notice(
                    NoticeLevel::Error,
                    format!("Could not reconnect to {}", name),
                ));
            }
            PeerNotice::Closed { peer_id } => {
                let change = self.ctx.speaker.unregister(&peer_id);
                self.emit(SessionUpdate::StreamRemoved { peer_id });
                self.emit_speaker_change(change);
            }
        }
    }

    fn report_swap_failures(&self, report: &SwapReport) {
        for peer_id in &report.failed {
            self.emit(SessionUpdate::notice(
                NoticeLevel::Warning,
                format!(
                    "Could not switch video for {}",
                    self.ctx.roster.resolve_display_name(peer_id)
                ),
            ));
        }
    }

    /// Mirror the enable flags to the capture and broadcast the full state
    fn publish_media_state(&mut self) {
        let media = &self.ctx.media;
        self.capture
            .set_enabled(media.video_enabled(), media.audio_enabled());
        self.signaling.send(media.state_message());
        self.emit_local_media();
    }

    fn emit_local_media(&self) {
        let media = &self.ctx.media;
        self.emit(SessionUpdate::LocalMediaChanged {
            video_enabled: media.video_enabled(),
            audio_enabled: media.audio_enabled(),
            source: media.current_source(),
        });
    }

    fn emit_speaker_change(&self, change: Option<SpeakerChange>) {
        if let Some(SpeakerChange { previous, current }) = change {
            self.emit(SessionUpdate::ActiveSpeakerChanged { previous, current });
        }
    }

    fn emit(&self, update: SessionUpdate) {
        if self.updates.send(update).is_err() {
            tracing::trace!("Session update dropped, no listener");
        }
    }
}
