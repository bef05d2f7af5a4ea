use std::sync::Arc;

use tracing::info;

use crate::coordinator::SfuCoordinator;
use crate::error::SfuError;
use crate::id::{ParticipantId, SessionId};
use crate::signal::Signal;

/// Thin identity mapping between a room the transport talks about and the
/// session the coordinator tracks. A room and a session are the same thing
/// today; this exists so the transport never has to know that, and so a
/// future distinction (e.g. multiple sessions per room) only changes this file.
pub struct CallService {
    coordinator: Arc<SfuCoordinator>,
}

impl CallService {
    pub fn new(coordinator: Arc<SfuCoordinator>) -> Self {
        CallService { coordinator }
    }

    /// Adds a participant to a room's call, returning the offer they should answer.
    pub async fn join(&self, room_id: &str, participant_id: ParticipantId) -> Result<Signal, SfuError> {
        let session_id = SessionId::from(room_id);
        info!(room = %room_id, participant = %participant_id, "joining call");
        let offer = self.coordinator.add_peer(session_id, participant_id).await?;
        Ok(offer)
    }

    /// Forwards an answer or trickled ICE candidate from a participant already in the call.
    pub async fn signal(&self, room_id: &str, participant_id: ParticipantId, signal: Signal) -> Result<(), SfuError> {
        let session_id = SessionId::from(room_id);
        self.coordinator.handle_signal(session_id, participant_id, signal).await
    }

    /// Removes a participant from a room's call.
    pub async fn leave(&self, room_id: &str, participant_id: ParticipantId) {
        let session_id = SessionId::from(room_id);
        info!(room = %room_id, participant = %participant_id, "leaving call");
        self.coordinator.remove_peer(session_id, participant_id).await;
    }

    pub fn coordinator(&self) -> Arc<SfuCoordinator> {
        self.coordinator.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::SignalKind;

    #[tokio::test]
    async fn test_join_returns_offer() {
        let service = CallService::new(SfuCoordinator::new());
        let signal = service.join("room-1", ParticipantId::from("u1")).await.unwrap();
        assert_eq!(signal.kind, SignalKind::Offer);
    }

    #[tokio::test]
    async fn test_leave_unknown_participant_is_a_no_op() {
        let service = CallService::new(SfuCoordinator::new());
        service.leave("room-1", ParticipantId::from("ghost")).await;
    }
}
