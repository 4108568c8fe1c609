use crate::identifier::Identifier;

/// An edit as it is emitted by a replica and fanned out to peers.
///
/// `position` is always a *sequence-index* (it includes tombstones), sampled
/// at the originating replica at the moment the op was produced. Because the
/// star topology (see [`crate::Document`] docs) makes the host the sole
/// serializer, every replica applies ops in the same order and therefore
/// agrees on what `position` means by the time it is applied.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Insert {
        id: Identifier,
        ch: char,
        position: usize,
    },
    Delete {
        id: Identifier,
        position: usize,
    },
    /// Carries the *site identifier* of the peer whose caret moved, not an
    /// element identifier — there is no element involved.
    Move { site: String, position: usize },
}

impl Operation {
    pub fn position(&self) -> usize {
        match self {
            Operation::Insert { position, .. } => *position,
            Operation::Delete { position, .. } => *position,
            Operation::Move { position, .. } => *position,
        }
    }
}
