pub mod collab;
pub mod config;
pub mod error;
pub mod lock;
pub mod logging;
pub mod models;
pub mod progress;
pub mod router;
pub mod safeguard;
pub mod session;
pub mod storage;

#[cfg(test)]
pub mod test_helpers;

pub use config::Config;
pub use error::{Error, Result};
pub use lock::AutoNextLock;
pub use progress::ProgressStore;
pub use router::{InboundMessage, MessageRouter};
pub use safeguard::Safeguard;
pub use session::{PlaybackSession, SessionHandle, SessionOptions};
pub use storage::{KeyValueStore, MemoryStore};

// The canonical event model lives in the providers crate; re-export the
// pieces engine consumers need.
pub use embedsync_providers::{EpisodeRef, MediaKind, PlayerEvent, ProviderRegistry};
