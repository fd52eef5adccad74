//! Message types for the rendering-surface protocol
//!
//! Every message is an externally tagged enum variant; the tag is the
//! command name the surface switches on.

use serde::{Deserialize, Serialize};

/// Identifier of a tab. Allocated monotonically, starting at 1.
pub type TabId = u64;

/// Index of a session slot within a tab, in `0..SLOTS_PER_TAB`.
pub type SlotId = u8;

/// Derived activity classification for a session, based on output timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Busy,
    Idle,
}

/// A selectable project, as pushed to the surface on the initial handshake
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectInfo {
    pub name: String,
    pub path: String,
}

/// Rendering configuration pushed to the surface on the initial handshake
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RenderConfig {
    pub font_family: String,
    pub font_size: u16,
    pub foreground: String,
    pub background: String,
    pub dark_mode: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            font_family: "monospace".to_string(),
            font_size: 13,
            foreground: "#d4d4d4".to_string(),
            background: "#1e1e1e".to_string(),
            dark_mode: true,
        }
    }
}

/// Messages sent from the rendering surface to the core
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    /// Surface finished loading; core replies with projects and config
    Ready,

    /// Start (or replace) a session rooted at a project directory.
    /// Omitted tab falls back to the active tab; omitted terminal means
    /// the first free slot, creating a new tab when none is free.
    SelectProject {
        tab_id: Option<TabId>,
        terminal_id: Option<SlotId>,
        project_path: String,
        resume: Option<String>,
    },

    /// Keystrokes for a session
    Input {
        tab_id: TabId,
        terminal_id: SlotId,
        data: String,
    },

    /// Surface-side terminal geometry changed
    Resize {
        tab_id: TabId,
        terminal_id: SlotId,
        cols: u16,
        rows: u16,
    },

    /// Terminate a session and free its slot
    Kill { tab_id: TabId, terminal_id: SlotId },

    /// Kill and relaunch a session in its working directory
    Restart { tab_id: TabId, terminal_id: SlotId },

    /// Resolve a drag-and-drop payload into filesystem paths
    ResolveDrop {
        tab_id: TabId,
        terminal_id: SlotId,
        payload: serde_json::Value,
    },

    /// Open a file in the host's editor
    OpenFile {
        file_path: String,
        line: Option<u32>,
        column: Option<u32>,
        tab_id: Option<TabId>,
        terminal_id: Option<SlotId>,
    },

    /// Open a URL in the host's browser
    OpenUrl { url: String },

    /// Ask the host to pick files, inserting the chosen paths as input
    PickFiles { tab_id: TabId, terminal_id: SlotId },

    /// Create a new empty tab and make it active
    CreateTab,

    /// Make an existing tab active
    SwitchTab { tab_id: TabId },

    /// Close a tab, killing its sessions (after confirmation if any are live)
    CloseTab { tab_id: TabId },
}

/// Messages sent from the core to the rendering surface
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    /// Project list for the picker
    Projects { projects: Vec<ProjectInfo> },

    /// Fonts, colors, dark mode
    TerminalConfig { config: RenderConfig },

    /// Verbatim output chunk from a session's process
    Output {
        tab_id: TabId,
        terminal_id: SlotId,
        data: String,
        timestamp: i64,
    },

    /// Reset a slot's display before a fresh spawn
    Clear { tab_id: TabId, terminal_id: SlotId },

    /// Slot-scoped failure report
    Error {
        tab_id: TabId,
        terminal_id: SlotId,
        message: String,
    },

    /// Session ended (explicit kill or process exit); slot is free
    Killed { tab_id: TabId, terminal_id: SlotId },

    /// Session is being relaunched; clear the display, keep the slot
    Restarting { tab_id: TabId, terminal_id: SlotId },

    /// Busy/idle transition
    Status {
        tab_id: TabId,
        terminal_id: SlotId,
        status: SessionStatus,
    },

    /// Reply to resolveDrop
    DropResolved {
        tab_id: TabId,
        terminal_id: SlotId,
        paths: Vec<String>,
    },

    /// Surface should repaint from scratch
    Refresh,

    /// A tab was created and is now active
    TabCreated { tab_id: TabId },

    /// A tab was closed; carries the new active tab
    TabClosed {
        tab_id: TabId,
        new_active_tab_id: TabId,
    },

    /// The active tab changed
    TabSwitched { tab_id: TabId },
}
