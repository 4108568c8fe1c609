use crate::element::Element;
use crate::identifier::Identifier;
use crate::op::Operation;

/// A replicated, append-ordered text buffer.
///
/// `Document` is the whole of component C1: an ordered sequence of
/// [`Element`]s (some tombstoned) plus the local caret, which is carried as
/// a *sequence-index* right alongside the sequence it indexes into, since
/// every mutation that touches one also has to touch the other under the
/// same critical section (see the concurrency notes in the crate root).
///
/// This type does no I/O and knows nothing about peers; it is driven purely
/// by `local_*` calls (from the UI) and `apply_remote` (from the network
/// layer), and it never fails — a delete at the start of the document is a
/// no-op, not an error.
#[derive(Debug, Clone)]
pub struct Document {
    site: String,
    clock: u64,
    elements: Vec<Element>,
    /// Sequence-index (includes tombstones) of the local caret.
    cursor: usize,
}

impl Document {
    pub fn new(site: impl Into<String>) -> Self {
        Document {
            site: site.into(),
            clock: 0,
            elements: Vec::new(),
            cursor: 0,
        }
    }

    /// Builds a document already containing `text`, as if every character
    /// had been locally inserted in order. Used to open a file and to
    /// reconstruct a guest's document from a snapshot's element list.
    pub fn from_elements(site: impl Into<String>, clock: u64, elements: Vec<Element>) -> Self {
        let cursor = elements.len();
        Document {
            site: site.into(),
            clock,
            elements,
            cursor,
        }
    }

    pub fn site(&self) -> &str {
        &self.site
    }

    pub fn clock(&self) -> u64 {
        self.clock
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    /// Sequence-index of the local caret (includes tombstones).
    pub fn cursor_seq_index(&self) -> usize {
        self.cursor
    }

    /// Visible-index of the local caret: count of non-tombstoned elements
    /// strictly before the caret.
    pub fn cursor_visible_index(&self) -> usize {
        self.visible_index_of(self.cursor)
    }

    /// Concatenation of the characters of every non-tombstoned element, in
    /// sequence order.
    pub fn text(&self) -> String {
        self.elements
            .iter()
            .filter(|e| e.is_visible())
            .map(|e| e.ch)
            .collect()
    }

    /// CRC32 of `text()`, used by guests to verify a snapshot on join.
    pub fn checksum(&self) -> u32 {
        crc32fast::hash(self.text().as_bytes())
    }

    // ---- local mutation --------------------------------------------------

    /// Inserts `ch` at the current caret position, advances the caret past
    /// it, and returns the `Insert` op to fan out. Never fails.
    pub fn local_insert(&mut self, ch: char) -> Operation {
        let id = self.next_identifier();
        let position = self.cursor;
        self.elements.insert(position, Element::new(id.clone(), ch));
        self.cursor += 1;
        Operation::Insert { id, ch, position }
    }

    /// Deletes the character immediately to the left of the caret, moving
    /// the caret onto it. Returns `None` (the spec's "Empty" op) if the
    /// caret is already at the very start of the document — deleting an
    /// already-tombstoned element cannot happen because the caret always
    /// skips tombstones on its way there.
    pub fn local_delete(&mut self) -> Option<Operation> {
        if self.cursor_visible_index() == 0 {
            return None;
        }

        self.move_left();
        let position = self.cursor;
        let element = &mut self.elements[position];
        element.tombstone = true;
        Some(Operation::Delete {
            id: element.id.clone(),
            position,
        })
    }

    // ---- remote application ----------------------------------------------

    /// Applies a remote `Insert` or `Delete`, reconciling the local caret
    /// against it. `Move` carries no element-sequence effect and is a no-op
    /// here — it is dispatched to the remote cursor registry by the caller,
    /// which owns a separate lock (see the crate-level concurrency notes).
    pub fn apply_remote(&mut self, op: &Operation) {
        let old_pos = self.cursor;
        match op {
            Operation::Insert { id, ch, position } => {
                let position = (*position).min(self.elements.len());
                self.elements
                    .insert(position, Element::new(id.clone(), *ch));
                if position <= old_pos {
                    self.cursor = old_pos + 1;
                }
            }
            Operation::Delete { id, .. } => {
                // Identifiers are authoritative; `position` is a hint from
                // the sender's own sequence and may be stale on arrival, so
                // the element is found by id (a silent no-op if unknown —
                // it was reordered away or never existed on this replica).
                if let Some(idx) = self.index_of(id) {
                    self.elements[idx].tombstone = true;
                    if idx < old_pos {
                        self.cursor = old_pos - 1;
                    } else if idx == old_pos {
                        self.cursor = self.nearest_non_tombstone_predecessor(old_pos);
                    }
                }
            }
            Operation::Move { .. } => {}
        }
    }

    fn index_of(&self, id: &Identifier) -> Option<usize> {
        self.elements.iter().position(|e| &e.id == id)
    }

    /// Walks left from `from` until landing on 0 or on a non-tombstoned
    /// element, used to clamp the caret after a remote delete lands exactly
    /// on it.
    fn nearest_non_tombstone_predecessor(&self, from: usize) -> usize {
        let mut idx = from;
        while idx > 0 {
            idx -= 1;
            if self.elements[idx].is_visible() {
                return idx;
            }
        }
        0
    }

    fn next_identifier(&mut self) -> Identifier {
        self.clock += 1;
        Identifier::new(self.site.clone(), self.clock)
    }

    // ---- cursor movement (C2 local caret) ---------------------------------

    pub fn move_left(&mut self) {
        while self.cursor > 0 {
            self.cursor -= 1;
            if self.elements[self.cursor].is_visible() {
                break;
            }
        }
    }

    pub fn move_right(&mut self) {
        while self.cursor < self.elements.len() {
            let passed_tombstone = self.elements[self.cursor].tombstone;
            self.cursor += 1;
            if !passed_tombstone {
                break;
            }
        }
    }

    /// Moves to the start (column 0) of the previous visible line.
    pub fn move_up(&mut self) {
        let v = self.cursor_visible_index();
        let visible = self.visible_chars();
        let line_start = Self::line_start(&visible, v);

        if line_start == 0 {
            self.cursor = self.seq_index_of_visible(0);
            return;
        }

        let prev_line_start = Self::line_start(&visible, line_start - 1);
        self.cursor = self.seq_index_of_visible(prev_line_start);
    }

    /// Moves to the end (trailing newline, or document end) of the next
    /// visible line. A no-op if there is no line below the current one.
    pub fn move_down(&mut self) {
        let v = self.cursor_visible_index();
        let visible = self.visible_chars();
        let line_end = Self::line_end(&visible, v);

        if line_end >= visible.len() {
            return; // already on the last line
        }

        let next_line_start = line_end + 1;
        let next_line_end = Self::line_end(&visible, next_line_start);
        self.cursor = self.seq_index_of_visible(next_line_end);
    }

    fn visible_chars(&self) -> Vec<char> {
        self.elements
            .iter()
            .filter(|e| e.is_visible())
            .map(|e| e.ch)
            .collect()
    }

    /// Index (in `visible`) of the first character of the line containing
    /// visible-index `v`.
    fn line_start(visible: &[char], v: usize) -> usize {
        let mut i = v;
        while i > 0 && visible[i - 1] != '\n' {
            i -= 1;
        }
        i
    }

    /// Index (in `visible`) of the newline terminating the line containing
    /// visible-index `v`, or `visible.len()` if that line is the last one.
    fn line_end(visible: &[char], v: usize) -> usize {
        let mut i = v;
        while i < visible.len() && visible[i] != '\n' {
            i += 1;
        }
        i
    }

    fn visible_index_of(&self, seq_index: usize) -> usize {
        self.elements[..seq_index]
            .iter()
            .filter(|e| e.is_visible())
            .count()
    }

    /// Sequence-index of the `v`-th visible element, or `elements.len()` if
    /// `v` is at (or past) the end of the visible text.
    fn seq_index_of_visible(&self, v: usize) -> usize {
        let mut seen = 0;
        for (idx, e) in self.elements.iter().enumerate() {
            if e.is_visible() {
                if seen == v {
                    return idx;
                }
                seen += 1;
            }
        }
        self.elements.len()
    }
}
