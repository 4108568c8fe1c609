use thiserror::Error;

/// Failures surfaced by the facade's outward-facing `host()`/`join()` calls.
///
/// Everything below this layer (malformed frames, read timeouts, peer
/// disconnects mid-session) is handled internally by `net`'s receive loops —
/// this type only covers what can go wrong at the moment a session is
/// created or joined.
#[derive(Debug, Error)]
pub enum JoinError {
    #[error("transport error: {0}")]
    Transport(#[from] net::TransportError),

    #[error("discovery error: {0}")]
    Discovery(#[from] net::DiscoveryError),

    #[error("no session named \"{0}\" in the discovery directory")]
    UnknownSession(String),
}
