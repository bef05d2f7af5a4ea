use std::fmt;
use std::sync::Arc;

/// A strongly typed identifier for a signaling session (one room's SFU state).
/// Wraps an `Arc<String>` for cheap cloning across the session table and every
/// peer record that belongs to it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(pub Arc<String>);

/// A strongly typed identifier for a single participant's peer connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParticipantId(pub Arc<String>);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        SessionId(Arc::new(s))
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        SessionId(Arc::new(s.to_string()))
    }
}

impl From<String> for ParticipantId {
    fn from(s: String) -> Self {
        ParticipantId(Arc::new(s))
    }
}

impl From<&str> for ParticipantId {
    fn from(s: &str) -> Self {
        ParticipantId(Arc::new(s.to_string()))
    }
}

impl AsRef<str> for SessionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for ParticipantId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl ParticipantId {
    /// Generates a fresh, randomly assigned participant identity for a new connection.
    pub fn generate() -> Self {
        ParticipantId(Arc::new(uuid::Uuid::new_v4().to_string()))
    }
}
