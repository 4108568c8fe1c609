use thiserror::Error;

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("exhausted {attempts} attempts to bind a UDP socket in {start}-{end}")]
    PortRangeExhausted {
        attempts: u32,
        start: u16,
        end: u16,
    },

    #[error("I/O error in session discovery: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("I/O error on session transport: {0}")]
    Io(#[from] std::io::Error),

    #[error("wire codec error: {0}")]
    Codec(#[from] protocol::CodecError),

    #[error("snapshot checksum did not match on join")]
    ChecksumMismatch,
}
