use serde::{Deserialize, Serialize};

use crate::identifier::Identifier;

/// A single position in the document sequence: one codepoint plus its
/// identity and deletion state. Tombstones are never removed from the
/// sequence (see [`crate::Document`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Element {
    pub id: Identifier,
    pub ch: char,
    pub tombstone: bool,
}

impl Element {
    pub fn new(id: Identifier, ch: char) -> Self {
        Element {
            id,
            ch,
            tombstone: false,
        }
    }

    pub fn is_visible(&self) -> bool {
        !self.tombstone
    }
}
