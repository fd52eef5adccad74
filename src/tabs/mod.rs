//! Tab management - the collection of tabs and the active-tab pointer
//!
//! Tabs are containers of up to four session slots. The manager owns only
//! the tab bookkeeping; the sessions themselves live in
//! [`crate::session::SessionManager`], and destructive coordination between
//! the two (close confirmation, killing a closed tab's sessions) happens in
//! the orchestrator.

use std::collections::BTreeMap;

use crate::protocol::{SlotId, TabId};
use crate::server::Messenger;
use crate::session::SLOTS_PER_TAB;

/// A container of up to four session slots with shared layout state
#[derive(Debug, Clone)]
pub struct Tab {
    pub id: TabId,

    /// Number of slots the surface lays out for this tab, `1..=4`
    pub visible_slots: u8,

    /// Slot currently presented fullscreen, if any. Presentation
    /// bookkeeping only.
    pub fullscreen_slot: Option<SlotId>,
}

impl Tab {
    fn new(id: TabId) -> Self {
        Self {
            id,
            visible_slots: 1,
            fullscreen_slot: None,
        }
    }
}

/// Owns the tab map, the active-tab pointer, and the id allocator
///
/// Invariants: the map is never empty, exactly one tab is active, and ids
/// ascend from 1.
pub struct TabManager {
    tabs: BTreeMap<TabId, Tab>,
    active: TabId,
    next_id: TabId,
    messenger: Messenger,
}

impl TabManager {
    /// Create the manager with its initial tab (id 1) already active.
    /// The initial tab is not announced; the surface discovers it through
    /// the ready handshake.
    pub fn new(messenger: Messenger) -> Self {
        let mut tabs = BTreeMap::new();
        tabs.insert(1, Tab::new(1));
        Self {
            tabs,
            active: 1,
            next_id: 2,
            messenger,
        }
    }

    pub fn active_tab(&self) -> TabId {
        self.active
    }

    pub fn contains(&self, tab_id: TabId) -> bool {
        self.tabs.contains_key(&tab_id)
    }

    pub fn tab_ids(&self) -> Vec<TabId> {
        self.tabs.keys().copied().collect()
    }

    pub fn get(&self, tab_id: TabId) -> Option<&Tab> {
        self.tabs.get(&tab_id)
    }

    /// Allocate the next id, create an empty tab, make it active
    pub fn create_tab(&mut self) -> TabId {
        let id = self.next_id;
        self.next_id += 1;
        self.tabs.insert(id, Tab::new(id));
        self.active = id;
        self.messenger.tab_created(id);
        tracing::info!("Created tab {}", id);
        id
    }

    /// Make an existing tab active. Unknown ids are ignored; switching
    /// never affects any session's running state.
    pub fn switch_tab(&mut self, tab_id: TabId) {
        if !self.tabs.contains_key(&tab_id) {
            tracing::debug!("Switch to unknown tab {}", tab_id);
            return;
        }
        self.active = tab_id;
        self.messenger.tab_switched(tab_id);
    }

    /// Remove a tab and reassign the active pointer: lowest remaining id,
    /// or a fresh tab 1 (allocator reset) when the map would empty out.
    /// Returns the new active id, or `None` for an unknown tab.
    pub fn close_tab(&mut self, tab_id: TabId) -> Option<TabId> {
        if self.tabs.remove(&tab_id).is_none() {
            tracing::debug!("Close of unknown tab {}", tab_id);
            return None;
        }

        if self.tabs.is_empty() {
            self.tabs.insert(1, Tab::new(1));
            self.active = 1;
            self.next_id = 2;
        } else if self.active == tab_id {
            // BTreeMap keeps keys ordered; the first key is the lowest id.
            self.active = *self.tabs.keys().next().expect("tab map is never empty");
        }

        self.messenger.tab_closed(tab_id, self.active);
        tracing::info!("Closed tab {}, active is now {}", tab_id, self.active);
        Some(self.active)
    }

    /// Record that a session occupies a slot, growing the visible layout
    /// to cover it. The count never shrinks below one.
    pub fn note_slot_used(&mut self, tab_id: TabId, slot_id: SlotId) {
        if let Some(tab) = self.tabs.get_mut(&tab_id) {
            tab.visible_slots = tab.visible_slots.max(slot_id + 1).min(SLOTS_PER_TAB as u8);
        }
    }

    /// Record which slot the surface presents fullscreen
    pub fn set_fullscreen_slot(&mut self, tab_id: TabId, slot_id: Option<SlotId>) {
        if let Some(tab) = self.tabs.get_mut(&tab_id) {
            tab.fullscreen_slot = slot_id;
        }
    }
}
