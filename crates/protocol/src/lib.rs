//! Wire protocol for the document engine (C3): a fixed-shape operation
//! record, an initial-snapshot record, and the length-prefixed framing used
//! to send either one over a TCP stream. Knows nothing about sockets beyond
//! the `AsyncRead`/`AsyncWrite` traits — dialing, listening, and the
//! host/guest receive loops live in the `net` crate.

pub mod error;
pub mod framing;
pub mod wire;

pub use error::CodecError;
pub use framing::{read_op, read_snapshot, write_op, write_snapshot, MAX_FRAME_BYTES};
pub use wire::{OpKind, Snapshot, WireCursor, WireOp};
