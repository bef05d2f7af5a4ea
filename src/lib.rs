pub mod call_service;
pub mod chat;
pub mod coordinator;
pub mod error;
pub mod health;
pub mod id;
pub mod media_setup;
pub mod metrics;
pub mod peer_record;
pub mod session_table;
pub mod signal;
pub mod track_registry;
pub mod transport;

pub use coordinator::SfuCoordinator;
pub use id::{ParticipantId, SessionId};
pub use media_setup::MediaSetup;
