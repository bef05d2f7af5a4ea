use std::fmt;

use crate::id::{ParticipantId, SessionId};

/// The error taxonomy for the coordinator and everything built on top of it.
///
/// This is a plain enum with a manual `Display`, matching the rest of the
/// crate's style (no `thiserror`): every caller that can hit one of these
/// either matches on it directly or just logs it with `{}`.
#[derive(Debug)]
pub enum SfuError {
    /// `handleSignal`/`removePeer` referenced a session that doesn't exist (or
    /// has already been torn down).
    SessionNotFound(SessionId),
    /// `handleSignal` referenced a participant not present in the session.
    PeerNotFound(SessionId, ParticipantId),
    /// The media stack (webrtc-rs) rejected an operation: offer/answer
    /// creation, (re)setting a description, adding/removing a track.
    MediaStack(String),
    /// The inbound signal payload was not valid JSON, or didn't match the
    /// expected `Signal` shape.
    SignalParse(String),
    /// The transport (WebSocket) failed to read or write.
    Transport(String),
}

impl fmt::Display for SfuError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SfuError::SessionNotFound(session) => write!(f, "session not found: {}", session),
            SfuError::PeerNotFound(session, participant) => {
                write!(f, "peer {} not found in session {}", participant, session)
            }
            SfuError::MediaStack(msg) => write!(f, "media stack error: {}", msg),
            SfuError::SignalParse(msg) => write!(f, "failed to parse signal: {}", msg),
            SfuError::Transport(msg) => write!(f, "transport error: {}", msg),
        }
    }
}

impl std::error::Error for SfuError {}
