//! Tunedeck — Live Stream Resolution Engine
//!
//! Playlist parsing, candidate probing, a persisted stream registry, and
//! live session playback coordination.
//!
//! ## Quick start
//!
//! ```no_run
//! use tunedeck::registry::StreamRegistry;
//! use tunedeck::resolver::StreamResolver;
//! use tunedeck::storage::JsonFileStorage;
//!
//! # fn main() -> tunedeck::Result<()> {
//! let storage = JsonFileStorage::open_default()?;
//! let mut registry = StreamRegistry::open(storage);
//! let resolver = StreamResolver::over_http(true)?;
//! registry.seed_builtins(&resolver)?;
//! registry.initialize_all(&resolver)?;
//! # Ok(())
//! # }
//! ```

pub mod candidates;
pub mod client;
pub mod config;
pub mod error;
pub mod playlist;
pub mod presets;
pub mod probe;
pub mod registry;
pub mod resolver;
pub mod session;
pub mod sink;
pub mod storage;
pub mod types;

pub use error::{Result, StreamError};
pub use registry::{RegistryEvent, StreamRegistry};
pub use resolver::{Resolution, Resolve, StreamResolver};
pub use session::LiveSession;
pub use types::{Stream, StreamConfig};
