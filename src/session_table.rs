use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::id::SessionId;
use crate::peer_record::PeerRecord;
use crate::id::ParticipantId;
use crate::track_registry::TrackRegistry;

/// One room's worth of coordinator state: every participant's peer record and
/// the tracks currently being forwarded between them.
#[derive(Default)]
pub struct Session {
    pub participants: HashMap<ParticipantId, Arc<PeerRecord>>,
    pub tracks: TrackRegistry,
}

/// Every active session, behind a single reader/writer lock.
///
/// This mirrors the original adapter's `sync.RWMutex`-guarded nested maps
/// rather than the sharded `DashMap` used elsewhere in this crate's ambient
/// code: the coordinator's invariants (never hold a peer lock while taking
/// this lock; never hold this lock across an `await` on the media stack)
/// only hold together if session-table mutation really does go through one
/// lock, not several independently-locked shards.
#[derive(Default)]
pub struct SessionTable {
    inner: RwLock<HashMap<SessionId, Session>>,
}

impl SessionTable {
    pub fn new() -> Self {
        SessionTable {
            inner: RwLock::new(HashMap::new()),
        }
    }

    pub async fn read(&self) -> RwLockReadGuard<'_, HashMap<SessionId, Session>> {
        self.inner.read().await
    }

    pub async fn write(&self) -> RwLockWriteGuard<'_, HashMap<SessionId, Session>> {
        self.inner.write().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_table_has_no_sessions() {
        let table = SessionTable::new();
        assert!(table.read().await.is_empty());
    }

    #[tokio::test]
    async fn test_write_then_read_sees_inserted_session() {
        let table = SessionTable::new();
        {
            let mut sessions = table.write().await;
            sessions.insert(SessionId::from("room-1"), Session::default());
        }
        assert_eq!(table.read().await.len(), 1);
        assert!(table.read().await.contains_key(&SessionId::from("room-1")));
    }
}
