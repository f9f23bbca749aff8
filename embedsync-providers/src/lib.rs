// Embed Provider System
//
// Two-tier architecture:
//
// Tier 1: embedsync-providers (this crate)
//   - One adapter per embed vendor: builds the iframe URL for a watch
//     session and normalizes that vendor's postMessage dialect into
//     canonical player events. Adapters are pure and hold no I/O.
//
// Tier 2: embedsync-core
//   - MessageRouter validates message origins against the registry and
//     dispatches to the matching adapter; PlaybackSession consumes the
//     canonical events.

pub mod error;
pub mod provider;
pub mod registry;
pub mod types;
pub mod vendors;

pub use error::RegistryError;
pub use provider::{EmbedProvider, ProviderMeta, QueryParams};
pub use registry::ProviderRegistry;
pub use types::{EmbedRequest, EpisodeRef, MediaKind, PlayerEvent, ProgressUpdate};

// Re-export vendors
pub use vendors::videasy::Videasy;
pub use vendors::vidfast::VidFast;
pub use vendors::vidlink::VidLink;
