use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};
use webrtc::api::API;
use webrtc::ice_transport::ice_candidate::RTCIceCandidateInit;
use webrtc::ice_transport::ice_gathering_state::RTCIceGatheringState;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::signaling_state::RTCSignalingState;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtcp::payload_feedbacks::picture_loss_indication::PictureLossIndication;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;
use webrtc::rtp_transceiver::rtp_transceiver_direction::RTCRtpTransceiverDirection;
use webrtc::rtp_transceiver::RTCRtpTransceiverInit;
use webrtc::track::track_local::track_local_static_rtp::TrackLocalStaticRTP;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_remote::TrackRemote;

use crate::error::SfuError;
use crate::id::{ParticipantId, SessionId};
use crate::media_setup::MediaSetup;
use crate::metrics;
use crate::peer_record::PeerRecord;
use crate::session_table::{Session, SessionTable};
use crate::signal::{Signal, SignalKind};

/// How long `addPeer` waits for ICE gathering before returning the offer with
/// whatever candidates have been gathered so far (the rest trickle in).
const ICE_GATHER_TIMEOUT: Duration = Duration::from_millis(500);

/// How often a PLI keyframe request is re-sent to a publishing track.
const PLI_INTERVAL: Duration = Duration::from_secs(3);

/// Invoked whenever the coordinator needs to push a signal (an offer, an
/// answer, or a trickled ICE candidate) out to a specific participant. Set
/// once at startup by whatever owns the transport.
pub type SignalCallback = dyn Fn(SessionId, ParticipantId, Signal) + Send + Sync;

/// Coordinates every session's SFU state: peer connections, the tracks being
/// relayed between them, and the signaling needed to keep offers/answers and
/// ICE candidates flowing.
pub struct SfuCoordinator {
    api: API,
    rtc_config: RTCConfiguration,
    sessions: SessionTable,
    signal_callback: RwLock<Option<Arc<SignalCallback>>>,
}

impl SfuCoordinator {
    pub fn new() -> Arc<Self> {
        Arc::new(SfuCoordinator {
            api: MediaSetup::create_webrtc_api(),
            rtc_config: MediaSetup::get_rtc_config(),
            sessions: SessionTable::new(),
            signal_callback: RwLock::new(None),
        })
    }

    /// Registers the single callback used to deliver outbound signals. Later
    /// calls replace the previous callback; in practice this is called once,
    /// at startup, by the transport layer.
    pub async fn set_signal_callback<F>(&self, callback: F)
    where
        F: Fn(SessionId, ParticipantId, Signal) + Send + Sync + 'static,
    {
        *self.signal_callback.write().await = Some(Arc::new(callback));
    }

    async fn emit_signal(&self, session_id: SessionId, participant_id: ParticipantId, signal: Signal) {
        let callback = self.signal_callback.read().await.clone();
        if let Some(callback) = callback {
            callback(session_id, participant_id, signal);
        }
    }

    /// Adds a new participant to `session_id`, wiring up ICE/track handlers
    /// and subscribing them to every track already being forwarded in that
    /// session, then returns the SDP offer the client should answer.
    ///
    /// The session table's write lock is only held long enough to register
    /// the new peer and snapshot the session's existing tracks; adding those
    /// tracks to the new connection and waiting for ICE gathering both
    /// happen after the lock is released.
    pub async fn add_peer(
        self: &Arc<Self>,
        session_id: SessionId,
        participant_id: ParticipantId,
    ) -> Result<Signal, SfuError> {
        let pc = self
            .api
            .new_peer_connection(self.rtc_config.clone())
            .await
            .map_err(|e| SfuError::MediaStack(e.to_string()))?;

        pc.add_transceiver_from_kind(
            RTPCodecType::Audio,
            Some(RTCRtpTransceiverInit {
                direction: RTCRtpTransceiverDirection::Recvonly,
                send_encodings: vec![],
            }),
        )
        .await
        .map_err(|e| SfuError::MediaStack(e.to_string()))?;

        pc.add_transceiver_from_kind(
            RTPCodecType::Video,
            Some(RTCRtpTransceiverInit {
                direction: RTCRtpTransceiverDirection::Recvonly,
                send_encodings: vec![],
            }),
        )
        .await
        .map_err(|e| SfuError::MediaStack(e.to_string()))?;

        let pc = Arc::new(pc);

        pc.on_peer_connection_state_change(Box::new({
            let participant_id = participant_id.clone();
            move |state: RTCPeerConnectionState| {
                info!(participant = %participant_id, %state, "peer connection state changed");
                Box::pin(async {})
            }
        }));

        self.register_ice_candidate_handler(session_id.clone(), participant_id.clone(), pc.clone());
        self.register_track_handler(session_id.clone(), participant_id.clone(), pc.clone());

        let record = Arc::new(PeerRecord::new(participant_id.clone(), pc.clone()));

        let existing_tracks = {
            let mut sessions = self.sessions.write().await;
            let is_new_session = !sessions.contains_key(&session_id);
            let session = sessions.entry(session_id.clone()).or_insert_with(Session::default);
            session.participants.insert(participant_id.clone(), record);
            if is_new_session {
                metrics::SFU_ACTIVE_SESSIONS.inc();
            }
            metrics::SFU_ACTIVE_PEERS.inc();
            session.tracks.snapshot_excluding(&participant_id)
        };

        for entry in existing_tracks {
            if let Err(e) = pc
                .add_track(Arc::clone(&entry.track) as Arc<dyn TrackLocal + Send + Sync>)
                .await
            {
                error!(participant = %participant_id, error = %e, "failed to add existing track to new peer");
            }
        }

        let offer = match pc.create_offer(None).await {
            Ok(offer) => offer,
            Err(e) => {
                self.rollback_peer(&session_id, &participant_id, &pc).await;
                return Err(SfuError::MediaStack(e.to_string()));
            }
        };

        let mut gather_complete = pc.gathering_complete_promise().await;
        if let Err(e) = pc.set_local_description(offer).await {
            self.rollback_peer(&session_id, &participant_id, &pc).await;
            return Err(SfuError::MediaStack(e.to_string()));
        }

        if pc.ice_gathering_state() != RTCIceGatheringState::Complete {
            let _ = tokio::time::timeout(ICE_GATHER_TIMEOUT, gather_complete.recv()).await;
        }

        let local_desc = pc.local_description().await.unwrap_or_default();
        Ok(Signal::offer(local_desc.sdp))
    }

    /// Undoes the session-table insert made earlier in `addPeer` once offer
    /// creation or `setLocalDescription` fails, so a half-negotiated peer
    /// never lingers in the table: removes the participant (and the session
    /// too, if this call just created it and it's now empty), decrements the
    /// metrics raised on insert, and closes the half-built connection.
    async fn rollback_peer(&self, session_id: &SessionId, participant_id: &ParticipantId, pc: &RTCPeerConnection) {
        let mut sessions = self.sessions.write().await;
        if let Some(session) = sessions.get_mut(session_id) {
            if session.participants.remove(participant_id).is_some() {
                metrics::SFU_ACTIVE_PEERS.dec();
            }
            if session.participants.is_empty() {
                sessions.remove(session_id);
                metrics::SFU_ACTIVE_SESSIONS.dec();
            }
        }
        drop(sessions);

        if let Err(e) = pc.close().await {
            warn!(participant = %participant_id, error = %e, "error closing half-negotiated peer connection");
        }
    }

    /// Applies an inbound signal from a participant already present in the
    /// session: an answer to a server-initiated offer, or a trickled ICE
    /// candidate. The server never accepts a client-initiated offer.
    pub async fn handle_signal(
        self: &Arc<Self>,
        session_id: SessionId,
        participant_id: ParticipantId,
        signal: Signal,
    ) -> Result<(), SfuError> {
        let record = {
            let sessions = self.sessions.read().await;
            let session = sessions
                .get(&session_id)
                .ok_or_else(|| SfuError::SessionNotFound(session_id.clone()))?;
            session
                .participants
                .get(&participant_id)
                .cloned()
                .ok_or_else(|| SfuError::PeerNotFound(session_id.clone(), participant_id.clone()))?
        };

        match signal.kind {
            SignalKind::Answer => {
                let desc = RTCSessionDescription::answer(signal.payload)
                    .map_err(|e| SfuError::SignalParse(e.to_string()))?;
                record
                    .pc
                    .set_remote_description(desc)
                    .await
                    .map_err(|e| SfuError::MediaStack(e.to_string()))?;

                let pending = {
                    let mut guard = record.lock().await;
                    let was_pending = *guard;
                    *guard = false;
                    was_pending
                };

                if pending {
                    let coordinator = self.clone();
                    tokio::spawn(async move {
                        coordinator.renegotiate(session_id, participant_id, record).await;
                    });
                }
                Ok(())
            }
            SignalKind::Candidate => {
                let candidate: RTCIceCandidateInit = serde_json::from_str(&signal.payload)
                    .map_err(|e| SfuError::SignalParse(e.to_string()))?;
                record
                    .pc
                    .add_ice_candidate(candidate)
                    .await
                    .map_err(|e| SfuError::MediaStack(e.to_string()))?;
                Ok(())
            }
            SignalKind::Offer => {
                warn!(participant = %participant_id, "ignoring client-initiated offer; server is always the offerer");
                Ok(())
            }
        }
    }

    /// Removes a participant's peer connection from a session, detaches any
    /// tracks it published from every other participant still connected, and
    /// triggers renegotiation on each one affected.
    pub async fn remove_peer(self: &Arc<Self>, session_id: SessionId, participant_id: ParticipantId) {
        let (removed, removed_tracks, remaining) = {
            let mut sessions = self.sessions.write().await;
            let Some(session) = sessions.get_mut(&session_id) else {
                return;
            };

            let removed = session.participants.remove(&participant_id);
            let removed_tracks = session.tracks.remove_by_owner(&participant_id);
            let remaining: Vec<_> = session.participants.values().cloned().collect();

            let is_empty = session.participants.is_empty();
            if is_empty {
                sessions.remove(&session_id);
                metrics::SFU_ACTIVE_SESSIONS.dec();
            }
            (removed, removed_tracks, remaining)
        };

        if let Some(record) = removed {
            metrics::SFU_ACTIVE_PEERS.dec();
            if let Err(e) = record.pc.close().await {
                warn!(participant = %participant_id, error = %e, "error closing peer connection");
            }
        }

        if removed_tracks.is_empty() {
            return;
        }

        for other in remaining {
            if other.pc.connection_state() == RTCPeerConnectionState::Closed {
                continue;
            }

            let mut needs_renegotiation = false;
            for sender in other.pc.get_senders().await {
                let Some(track) = sender.track().await else {
                    continue;
                };
                let matches = removed_tracks.iter().any(|entry| {
                    Arc::as_ptr(&entry.track) as *const () == Arc::as_ptr(&track) as *const ()
                });
                if matches {
                    if let Err(e) = other.pc.remove_track(&sender).await {
                        error!(participant = %other.participant_id, error = %e, "failed to remove track from peer");
                    } else {
                        needs_renegotiation = true;
                    }
                }
            }

            if needs_renegotiation {
                let coordinator = self.clone();
                let session_id = session_id.clone();
                let other_id = other.participant_id.clone();
                tokio::spawn(async move {
                    coordinator.renegotiate(session_id, other_id, other).await;
                });
            }
        }
    }

    /// Closes every peer connection across every session, for use during
    /// process shutdown. Does not attempt renegotiation on the way down.
    pub async fn shutdown(&self) {
        let mut sessions = self.sessions.write().await;
        for (_, session) in sessions.drain() {
            for (_, record) in session.participants {
                if let Err(e) = record.pc.close().await {
                    warn!(error = %e, "error closing peer connection during shutdown");
                }
            }
        }
    }

    /// Creates and sends a fresh offer to a peer whose set of tracks has
    /// changed, deferring to a pending flag if the peer's signaling state
    /// isn't stable yet (the answer handler re-arms this call when it is).
    async fn renegotiate(self: &Arc<Self>, session_id: SessionId, participant_id: ParticipantId, record: Arc<PeerRecord>) {
        let mut guard = record.lock().await;

        if record.pc.connection_state() == RTCPeerConnectionState::Closed {
            return;
        }

        if record.pc.signaling_state() != RTCSignalingState::Stable {
            debug!(participant = %participant_id, "renegotiation deferred: signaling state not stable");
            *guard = true;
            return;
        }

        let offer = match record.pc.create_offer(None).await {
            Ok(offer) => offer,
            Err(e) => {
                error!(participant = %participant_id, error = %e, "failed to create renegotiation offer");
                return;
            }
        };

        if let Err(e) = record.pc.set_local_description(offer).await {
            error!(participant = %participant_id, error = %e, "failed to set local description during renegotiation");
            return;
        }

        let local_desc = record.pc.local_description().await.unwrap_or_default();
        drop(guard);

        metrics::SFU_RENEGOTIATIONS_TOTAL.inc();
        self.emit_signal(session_id, participant_id, Signal::offer(local_desc.sdp)).await;
    }

    fn register_ice_candidate_handler(
        self: &Arc<Self>,
        session_id: SessionId,
        participant_id: ParticipantId,
        pc: Arc<RTCPeerConnection>,
    ) {
        let coordinator = self.clone();
        pc.on_ice_candidate(Box::new(move |candidate| {
            let coordinator = coordinator.clone();
            let session_id = session_id.clone();
            let participant_id = participant_id.clone();
            Box::pin(async move {
                let Some(candidate) = candidate else {
                    return;
                };
                let Ok(init) = candidate.to_json() else {
                    return;
                };
                let Ok(json) = serde_json::to_string(&init) else {
                    return;
                };
                coordinator
                    .emit_signal(session_id, participant_id, Signal::candidate(json))
                    .await;
            })
        }));
    }

    fn register_track_handler(
        self: &Arc<Self>,
        session_id: SessionId,
        participant_id: ParticipantId,
        pc: Arc<RTCPeerConnection>,
    ) {
        let coordinator = self.clone();
        pc.on_track(Box::new(move |remote_track, _receiver, _transceiver| {
            let coordinator = coordinator.clone();
            let session_id = session_id.clone();
            let participant_id = participant_id.clone();
            let pc = pc.clone();
            Box::pin(async move {
                coordinator
                    .handle_new_track(session_id, participant_id, pc, remote_track)
                    .await;
            })
        }));
    }

    async fn handle_new_track(
        self: &Arc<Self>,
        session_id: SessionId,
        participant_id: ParticipantId,
        source_pc: Arc<RTCPeerConnection>,
        remote_track: Arc<TrackRemote>,
    ) {
        let local_track = Arc::new(TrackLocalStaticRTP::new(
            remote_track.codec().capability,
            remote_track.id(),
            remote_track.stream_id(),
        ));

        let subscribers = {
            let mut sessions = self.sessions.write().await;
            let Some(session) = sessions.get_mut(&session_id) else {
                return;
            };
            session.tracks.append(local_track.clone(), participant_id.clone());
            session
                .participants
                .values()
                .filter(|p| p.participant_id != participant_id)
                .cloned()
                .collect::<Vec<_>>()
        };

        for subscriber in subscribers {
            if subscriber.pc.connection_state() == RTCPeerConnectionState::Closed {
                continue;
            }
            match subscriber
                .pc
                .add_track(Arc::clone(&local_track) as Arc<dyn TrackLocal + Send + Sync>)
                .await
            {
                Ok(_) => {
                    let coordinator = self.clone();
                    let session_id = session_id.clone();
                    let target = subscriber.participant_id.clone();
                    tokio::spawn(async move {
                        coordinator.renegotiate(session_id, target, subscriber).await;
                    });
                }
                Err(e) => {
                    error!(participant = %participant_id, error = %e, "failed to add track to subscriber");
                }
            }
        }

        spawn_rtp_relay(remote_track.clone(), local_track);
        spawn_pli_loop(source_pc, remote_track);
    }
}

/// Reads RTP packets off the publisher's remote track and writes them
/// straight through to the shared forwarding track, which fans the write out
/// to every subscriber bound to it.
fn spawn_rtp_relay(remote_track: Arc<TrackRemote>, local_track: Arc<TrackLocalStaticRTP>) {
    tokio::spawn(async move {
        loop {
            match remote_track.read_rtp().await {
                Ok((packet, _attrs)) => {
                    if local_track.write_rtp(&packet).await.is_err() {
                        metrics::SFU_PACKETS_DROPPED_TOTAL
                            .with_label_values(&["write_error"])
                            .inc();
                    } else {
                        metrics::SFU_PACKETS_FORWARDED_TOTAL
                            .with_label_values(&[&remote_track.kind().to_string()])
                            .inc();
                    }
                }
                Err(_) => break,
            }
        }
    });
}

/// Requests a keyframe from the publisher immediately on track arrival and
/// then every [`PLI_INTERVAL`] for as long as the source connection lives.
fn spawn_pli_loop(source_pc: Arc<RTCPeerConnection>, remote_track: Arc<TrackRemote>) {
    tokio::spawn(async move {
        let ssrc = remote_track.ssrc();
        let send_pli = || {
            let pc = source_pc.clone();
            async move {
                let packet: Box<dyn webrtc::rtcp::packet::Packet + Send + Sync> =
                    Box::new(PictureLossIndication { sender_ssrc: 0, media_ssrc: ssrc });
                let _ = pc.write_rtcp(&[packet]).await;
                metrics::SFU_PLIS_SENT_TOTAL.inc();
            }
        };

        send_pli().await;

        let mut ticker = tokio::time::interval(PLI_INTERVAL);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if source_pc.connection_state() == RTCPeerConnectionState::Closed {
                break;
            }
            send_pli().await;
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_add_peer_creates_session_and_returns_offer() {
        let coordinator = SfuCoordinator::new();
        let session_id = SessionId::from("room-1");
        let participant_id = ParticipantId::from("u1");

        let signal = coordinator
            .add_peer(session_id.clone(), participant_id.clone())
            .await
            .expect("add_peer should succeed");

        assert_eq!(signal.kind, SignalKind::Offer);
        assert!(signal.payload.contains("v=0"));

        let sessions = coordinator.sessions.read().await;
        let session = sessions.get(&session_id).unwrap();
        assert!(session.participants.contains_key(&participant_id));
    }

    #[tokio::test]
    async fn test_handle_signal_unknown_session_errors() {
        let coordinator = SfuCoordinator::new();
        let result = coordinator
            .handle_signal(
                SessionId::from("missing"),
                ParticipantId::from("u1"),
                Signal::candidate("{}".to_string()),
            )
            .await;
        assert!(matches!(result, Err(SfuError::SessionNotFound(_))));
    }

    #[tokio::test]
    async fn test_handle_signal_unknown_peer_errors() {
        let coordinator = SfuCoordinator::new();
        let session_id = SessionId::from("room-1");
        coordinator
            .add_peer(session_id.clone(), ParticipantId::from("u1"))
            .await
            .unwrap();

        let result = coordinator
            .handle_signal(
                session_id,
                ParticipantId::from("u2"),
                Signal::candidate("{}".to_string()),
            )
            .await;
        assert!(matches!(result, Err(SfuError::PeerNotFound(_, _))));
    }

    #[tokio::test]
    async fn test_remove_peer_clears_empty_session() {
        let coordinator = SfuCoordinator::new();
        let session_id = SessionId::from("room-1");
        let participant_id = ParticipantId::from("u1");

        coordinator
            .add_peer(session_id.clone(), participant_id.clone())
            .await
            .unwrap();
        coordinator.remove_peer(session_id.clone(), participant_id).await;

        let sessions = coordinator.sessions.read().await;
        assert!(!sessions.contains_key(&session_id));
    }

    #[tokio::test]
    async fn test_remove_peer_on_unknown_session_is_a_no_op() {
        let coordinator = SfuCoordinator::new();
        coordinator
            .remove_peer(SessionId::from("missing"), ParticipantId::from("u1"))
            .await;
    }

    #[tokio::test]
    async fn test_two_peers_join_same_session() {
        let coordinator = SfuCoordinator::new();
        let session_id = SessionId::from("room-1");

        coordinator
            .add_peer(session_id.clone(), ParticipantId::from("u1"))
            .await
            .unwrap();
        coordinator
            .add_peer(session_id.clone(), ParticipantId::from("u2"))
            .await
            .unwrap();

        let sessions = coordinator.sessions.read().await;
        let session = sessions.get(&session_id).unwrap();
        assert_eq!(session.participants.len(), 2);
    }
}
