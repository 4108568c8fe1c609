//! Replicated Growable Array (RGA) document engine.
//!
//! This crate is the CRDT core: an ordered, tombstone-preserving sequence of
//! identified elements ([`Document`], C1) plus the local caret it carries and
//! the remote-peer caret registry ([`RemoteCursorRegistry`], C2). It does no
//! I/O and knows nothing about peers, sessions, or the wire — see the
//! `protocol` and `net` crates for that.
//!
//! The design trades a classical RGA's predecessor-reference commutativity
//! for a simpler, star-topology one: `position` fields are plain
//! sequence-indices sampled at the sender, and convergence only holds
//! because the host serializes every op before fanning it out (see the
//! `net` crate's host/guest roles).

mod cursor;
mod document;
mod element;
mod identifier;
mod op;

pub use cursor::{RemoteCursor, RemoteCursorRegistry, COLOR_PALETTE_SIZE};
pub use document::Document;
pub use element::Element;
pub use identifier::{Identifier, ParseIdentifierError};
pub use op::Operation;
