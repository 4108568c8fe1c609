use std::collections::HashMap;
use std::time::Instant;

/// Number of distinct caret colors renderers are expected to cycle through.
/// Slots are assigned round-robin as new sites are seen.
pub const COLOR_PALETTE_SIZE: usize = 8;

/// One remote peer's last-known caret, as tracked by the registry.
#[derive(Debug, Clone)]
pub struct RemoteCursor {
    pub position: usize,
    pub last_move_time: Instant,
    pub display_name: String,
    pub color_slot: usize,
}

/// Registry of remote peers' carets, keyed by site identifier.
///
/// Entries are created on the first `Move` seen from a site and updated on
/// every subsequent one; nothing in this type ever removes an entry — a
/// disconnected peer's caret simply stops moving (see §4.2 in the design
/// notes: stale entries are a renderer concern, not ours).
#[derive(Debug, Default)]
pub struct RemoteCursorRegistry {
    entries: HashMap<String, RemoteCursor>,
    next_guest_number: u64,
}

impl RemoteCursorRegistry {
    pub fn new() -> Self {
        RemoteCursorRegistry {
            entries: HashMap::new(),
            next_guest_number: 1,
        }
    }

    /// Records a `Move` from `site`, allocating a fresh registry entry if
    /// this is the first time this site has been seen.
    pub fn record_move(&mut self, site: String, position: usize) {
        if let Some(entry) = self.entries.get_mut(&site) {
            entry.position = position;
            entry.last_move_time = Instant::now();
            return;
        }

        let color_slot = self.entries.len() % COLOR_PALETTE_SIZE;
        let display_name = format!("guest{}", self.next_guest_number);
        self.next_guest_number += 1;

        self.entries.insert(
            site,
            RemoteCursor {
                position,
                last_move_time: Instant::now(),
                display_name,
                color_slot,
            },
        );
    }

    pub fn get(&self, site: &str) -> Option<&RemoteCursor> {
        self.entries.get(site)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &RemoteCursor)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
