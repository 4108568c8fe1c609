use thiserror::Error;

/// Failures that can occur while encoding or decoding frames on the wire.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("I/O error while framing: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed JSON frame: {0}")]
    Json(#[from] serde_json::Error),

    #[error("wire operation is missing required field `{0}`")]
    MissingField(&'static str),

    #[error("frame length {0} exceeds maximum of {1} bytes")]
    FrameTooLarge(u32, u32),

    #[error("snapshot checksum mismatch: expected {expected:#010x}, computed {computed:#010x}")]
    ChecksumMismatch { expected: u32, computed: u32 },
}
