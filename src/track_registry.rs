use std::sync::Arc;

use webrtc::track::track_local::track_local_static_rtp::TrackLocalStaticRTP;

use crate::id::ParticipantId;

/// A single forwarded media track and the participant whose publish created it.
///
/// `track` is shared (not cloned per subscriber): `TrackLocalStaticRTP` keeps
/// its own list of per-sender bindings internally and fans a written packet
/// out to every peer connection it has been added to, so one `TrackEntry`
/// is enough to reach every current and future subscriber in the session.
#[derive(Clone)]
pub struct TrackEntry {
    pub track: Arc<TrackLocalStaticRTP>,
    pub owner: ParticipantId,
}

/// The ordered, append-only set of tracks being forwarded within one session.
///
/// Has no locking of its own: every method call happens while the caller
/// already holds the session table's write lock, so insertion order is
/// stable across a fanout pass and no method here needs to be `async`.
#[derive(Default)]
pub struct TrackRegistry {
    entries: Vec<TrackEntry>,
}

impl TrackRegistry {
    pub fn new() -> Self {
        TrackRegistry { entries: Vec::new() }
    }

    /// Registers a newly published track, owned by `owner`.
    pub fn append(&mut self, track: Arc<TrackLocalStaticRTP>, owner: ParticipantId) {
        self.entries.push(TrackEntry { track, owner });
    }

    /// Removes every track published by `owner` (on disconnect), returning
    /// the removed entries so the caller can detach them from subscribers'
    /// peer connections.
    pub fn remove_by_owner(&mut self, owner: &ParticipantId) -> Vec<TrackEntry> {
        let mut removed = Vec::new();
        self.entries.retain(|entry| {
            if &entry.owner == owner {
                removed.push(entry.clone());
                false
            } else {
                true
            }
        });
        removed
    }

    /// A snapshot of every tracked entry not owned by `participant`, in
    /// insertion order — what a newly joined (or renegotiating) peer should
    /// be subscribed to.
    pub fn snapshot_excluding(&self, participant: &ParticipantId) -> Vec<TrackEntry> {
        self.entries
            .iter()
            .filter(|entry| &entry.owner != participant)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;

    fn dummy_track(id: &str) -> Arc<TrackLocalStaticRTP> {
        Arc::new(TrackLocalStaticRTP::new(
            RTCRtpCodecCapability {
                mime_type: "video/VP8".to_owned(),
                ..Default::default()
            },
            id.to_owned(),
            "stream".to_owned(),
        ))
    }

    #[test]
    fn test_append_preserves_insertion_order() {
        let mut registry = TrackRegistry::new();
        registry.append(dummy_track("a"), ParticipantId::from("u1"));
        registry.append(dummy_track("b"), ParticipantId::from("u2"));
        registry.append(dummy_track("c"), ParticipantId::from("u1"));

        let ids: Vec<_> = registry
            .snapshot_excluding(&ParticipantId::from("nobody"))
            .into_iter()
            .map(|e| e.track.id())
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_snapshot_excluding_filters_owner() {
        let mut registry = TrackRegistry::new();
        registry.append(dummy_track("a"), ParticipantId::from("u1"));
        registry.append(dummy_track("b"), ParticipantId::from("u2"));

        let snapshot = registry.snapshot_excluding(&ParticipantId::from("u1"));
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].track.id(), "b");
    }

    #[test]
    fn test_remove_by_owner() {
        let mut registry = TrackRegistry::new();
        registry.append(dummy_track("a"), ParticipantId::from("u1"));
        registry.append(dummy_track("b"), ParticipantId::from("u2"));
        registry.append(dummy_track("c"), ParticipantId::from("u1"));

        let removed = registry.remove_by_owner(&ParticipantId::from("u1"));
        assert_eq!(removed.len(), 2);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.snapshot_excluding(&ParticipantId::from("nobody"))[0].track.id(), "b");
    }
}
