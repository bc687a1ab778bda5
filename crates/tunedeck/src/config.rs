//! Configuration constants for the tunedeck engine

/// Network-related configuration
pub mod network {
    /// User agent for HTTP requests
    pub const USER_AGENT: &str = concat!("Tunedeck/", env!("CARGO_PKG_VERSION"));

    /// Connection timeout in seconds
    pub const CONNECT_TIMEOUT_SECS: u64 = 10;

    /// Read timeout for general requests in seconds
    pub const READ_TIMEOUT_SECS: u64 = 30;

    /// Total timeout for a playlist fetch in seconds. A hanging relay must
    /// not stall resolution; an aborted fetch degrades to zero entries.
    pub const PLAYLIST_FETCH_TIMEOUT_SECS: u64 = 5;

    /// Relay endpoint used to fetch cross-origin playlist bodies and to
    /// carry `http://` streams when the page itself is a secure origin.
    /// Invoked as `{STREAM_PROXY}?url={encoded target}`.
    pub const STREAM_PROXY: &str = "https://stream-proxy.round-bar-e93e.workers.dev";
}

/// Probe-related configuration
pub mod probe {
    /// Hard timeout for a single availability probe in milliseconds
    pub const PROBE_TIMEOUT_MS: u64 = 5000;
}

/// Playlist parsing limits
pub mod playlist {
    /// Cap on parsed entries; bounds memory on degenerate input
    pub const MAX_ENTRIES: usize = 500;
}

/// Live playback configuration
pub mod playback {
    /// How long to wait for the sink's ready signal before forcing playback.
    /// Some outputs never fire it for live sources.
    pub const READY_FALLBACK_MS: u64 = 100;
}
