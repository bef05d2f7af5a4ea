use std::sync::Arc;

use tokio::sync::Mutex;
use webrtc::peer_connection::RTCPeerConnection;

use crate::id::ParticipantId;

/// One participant's server-side peer connection plus the state needed to
/// serialize renegotiation against it.
///
/// `peer_lock` plays the same role as the original's `Peer.mu`: it is taken
/// for the whole duration of creating-and-sending an offer, and the boolean
/// it guards records whether another renegotiation was requested while one
/// was already in flight. It is always acquired *after* the session table
/// lock, never while holding it, and it must never itself be held while
/// awaiting the session table lock.
pub struct PeerRecord {
    pub participant_id: ParticipantId,
    pub pc: Arc<RTCPeerConnection>,
    peer_lock: Mutex<bool>,
}

impl PeerRecord {
    pub fn new(participant_id: ParticipantId, pc: Arc<RTCPeerConnection>) -> Self {
        PeerRecord {
            participant_id,
            pc,
            peer_lock: Mutex::new(false),
        }
    }

    /// Acquires the peer lock, giving the caller exclusive access to the
    /// `renegotiation_pending` flag for as long as the guard lives.
    pub async fn lock(&self) -> tokio::sync::MutexGuard<'_, bool> {
        self.peer_lock.lock().await
    }
}
