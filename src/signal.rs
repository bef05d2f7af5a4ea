use serde::{Deserialize, Serialize};

/// The three kinds of signal exchanged between the coordinator and a client.
///
/// Serialized lowercase to match the wire format: the server is always the
/// SDP offerer, so `Offer` only ever flows server->client, while `Answer` only
/// ever flows client->server; `Candidate` flows both ways.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalKind {
    Offer,
    Answer,
    Candidate,
}

/// A signaling message: an SDP blob (for `Offer`/`Answer`) or a JSON-encoded
/// ICE candidate (for `Candidate`), always carried as an opaque string.
///
/// Field names are capitalized on the wire to match the system this was
/// distilled from, which marshals an untagged Go struct (so its keys come out
/// capitalized by default); lowercase aliases are accepted on the way in
/// since Go's own decoder matches struct fields case-insensitively and
/// clients rely on that.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    #[serde(rename = "Type", alias = "type")]
    pub kind: SignalKind,
    #[serde(rename = "Payload", alias = "payload")]
    pub payload: String,
}

impl Signal {
    pub fn offer(sdp: String) -> Self {
        Signal {
            kind: SignalKind::Offer,
            payload: sdp,
        }
    }

    pub fn answer(sdp: String) -> Self {
        Signal {
            kind: SignalKind::Answer,
            payload: sdp,
        }
    }

    pub fn candidate(candidate_json: String) -> Self {
        Signal {
            kind: SignalKind::Candidate,
            payload: candidate_json,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_serializes_capitalized_fields() {
        let signal = Signal::offer("v=0...".to_string());
        let json = serde_json::to_string(&signal).unwrap();
        assert_eq!(json, r#"{"Type":"offer","Payload":"v=0..."}"#);
    }

    #[test]
    fn test_signal_accepts_lowercase_keys_on_deserialize() {
        let signal: Signal = serde_json::from_str(r#"{"type":"answer","payload":"v=0..."}"#).unwrap();
        assert_eq!(signal.kind, SignalKind::Answer);
        assert_eq!(signal.payload, "v=0...");
    }

    #[test]
    fn test_signal_roundtrip() {
        let signal = Signal::candidate(r#"{"candidate":"..."}"#.to_string());
        let json = serde_json::to_string(&signal).unwrap();
        let back: Signal = serde_json::from_str(&json).unwrap();
        assert_eq!(back.kind, SignalKind::Candidate);
        assert_eq!(back.payload, signal.payload);
    }
}
