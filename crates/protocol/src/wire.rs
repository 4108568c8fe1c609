//! Wire-format types for the document engine's network protocol.
//!
//! These are deliberately distinct from [`rga::Operation`]: the wire
//! contract is a fixed-shape record (kind tag, identifier string, character
//! codepoint, position integer) so every variant serializes to the same
//! shape, whereas the domain enum only carries the fields each variant
//! actually needs.

use rga::{Document, Element, Identifier, Operation, RemoteCursorRegistry};
use serde::{Deserialize, Serialize};

use crate::error::CodecError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpKind {
    Insert,
    Delete,
    Move,
}

/// The fixed-shape wire record for one [`Operation`].
///
/// `id` is absent for `Move` (which carries a site identifier in `site`
/// instead of an element identifier), and `ch` only appears on `Insert`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireOp {
    pub kind: OpKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Identifier>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ch: Option<char>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site: Option<String>,
    pub position: usize,
}

impl From<&Operation> for WireOp {
    fn from(op: &Operation) -> Self {
        match op {
            Operation::Insert { id, ch, position } => WireOp {
                kind: OpKind::Insert,
                id: Some(id.clone()),
                ch: Some(*ch),
                site: None,
                position: *position,
            },
            Operation::Delete { id, position } => WireOp {
                kind: OpKind::Delete,
                id: Some(id.clone()),
                ch: None,
                site: None,
                position: *position,
            },
            Operation::Move { site, position } => WireOp {
                kind: OpKind::Move,
                id: None,
                ch: None,
                site: Some(site.clone()),
                position: *position,
            },
        }
    }
}

impl TryFrom<WireOp> for Operation {
    type Error = CodecError;

    fn try_from(wire: WireOp) -> Result<Self, Self::Error> {
        match wire.kind {
            OpKind::Insert => Ok(Operation::Insert {
                id: wire.id.ok_or(CodecError::MissingField("id"))?,
                ch: wire.ch.ok_or(CodecError::MissingField("ch"))?,
                position: wire.position,
            }),
            OpKind::Delete => Ok(Operation::Delete {
                id: wire.id.ok_or(CodecError::MissingField("id"))?,
                position: wire.position,
            }),
            OpKind::Move => Ok(Operation::Move {
                site: wire.site.ok_or(CodecError::MissingField("site"))?,
                position: wire.position,
            }),
        }
    }
}

/// A remote peer's last-known caret, as carried inside a [`Snapshot`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireCursor {
    pub site: String,
    pub position: usize,
    pub display_name: String,
    pub color_slot: usize,
}

/// The initial-state frame a host sends a guest on join:
/// `{elements, site, clock, remote_cursors, checksum}` per the wire
/// contract. `site`/`clock` describe the *host's* replica, not the guest's —
/// the guest keeps its own site identifier and starts its own clock at 0.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub elements: Vec<Element>,
    pub site: String,
    pub clock: u64,
    pub remote_cursors: Vec<WireCursor>,
    pub checksum: u32,
}

impl Snapshot {
    pub fn capture(doc: &Document, registry: &RemoteCursorRegistry) -> Self {
        let remote_cursors = registry
            .iter()
            .map(|(site, cursor)| WireCursor {
                site: site.clone(),
                position: cursor.position,
                display_name: cursor.display_name.clone(),
                color_slot: cursor.color_slot,
            })
            .collect();

        Snapshot {
            elements: doc.elements().to_vec(),
            site: doc.site().to_string(),
            clock: doc.clock(),
            remote_cursors,
            checksum: doc.checksum(),
        }
    }

    /// Verifies that `checksum` matches the CRC32 of `elements`' visible
    /// text, the same way a guest checks its bootstrap against the host.
    pub fn verify_checksum(&self) -> Result<(), CodecError> {
        let text: String = self
            .elements
            .iter()
            .filter(|e| e.is_visible())
            .map(|e| e.ch)
            .collect();
        let computed = crc32fast::hash(text.as_bytes());
        if computed != self.checksum {
            return Err(CodecError::ChecksumMismatch {
                expected: self.checksum,
                computed,
            });
        }
        Ok(())
    }
}
