//! Inbound message dispatch and session-event handling
//!
//! The orchestrator validates every inbound message before delegating to
//! the tab or session manager. Stale references are expected (the surface
//! acts on state the core may already have left), so invalid slots and
//! tabs are dropped quietly rather than reported. No handler failure
//! terminates the dispatch loop.

use std::path::Path;
use std::sync::Arc;

use crate::protocol::{ClientMessage, RenderConfig, SlotId, TabId};
use crate::session::{slot_in_range, SessionEvent, SessionManager};
use crate::tabs::TabManager;
use crate::workspace::{shell_quote, Confirmer, DropResolver, FilePicker, Opener, ProjectSource};

use super::Messenger;

/// The host services the core consumes, behind trait seams
pub struct Collaborators {
    pub projects: Arc<dyn ProjectSource>,
    pub confirmer: Arc<dyn Confirmer>,
    pub drops: Arc<dyn DropResolver>,
    pub opener: Arc<dyn Opener>,
    pub picker: Arc<dyn FilePicker>,
}

/// Validates and routes protocol traffic between the surface and the
/// managers. Owns all tab/session state; handlers run to completion on a
/// single task, so none of it is locked.
pub struct Orchestrator {
    sessions: SessionManager,
    tabs: TabManager,
    messenger: Messenger,
    collaborators: Collaborators,
    render_config: RenderConfig,
}

impl Orchestrator {
    pub fn new(
        sessions: SessionManager,
        tabs: TabManager,
        messenger: Messenger,
        collaborators: Collaborators,
        render_config: RenderConfig,
    ) -> Self {
        Self {
            sessions,
            tabs,
            messenger,
            collaborators,
            render_config,
        }
    }

    /// Dispatch one inbound surface message
    pub async fn handle_message(&mut self, msg: ClientMessage) {
        match msg {
            ClientMessage::Ready => self.on_ready(),

            ClientMessage::SelectProject {
                tab_id,
                terminal_id,
                project_path,
                resume,
            } => self.on_select_project(tab_id, terminal_id, &project_path, resume),

            ClientMessage::Input {
                tab_id,
                terminal_id,
                data,
            } => {
                if self.valid_target(tab_id, terminal_id) {
                    self.sessions.write_input(tab_id, terminal_id, &data);
                }
            }

            ClientMessage::Resize {
                tab_id,
                terminal_id,
                cols,
                rows,
            } => {
                if self.valid_target(tab_id, terminal_id) {
                    self.sessions.resize(tab_id, terminal_id, cols, rows);
                }
            }

            ClientMessage::Kill {
                tab_id,
                terminal_id,
            } => {
                if self.valid_target(tab_id, terminal_id) {
                    self.sessions.kill(tab_id, terminal_id);
                }
            }

            ClientMessage::Restart {
                tab_id,
                terminal_id,
            } => {
                if self.valid_target(tab_id, terminal_id) {
                    self.sessions.restart(tab_id, terminal_id);
                }
            }

            ClientMessage::ResolveDrop {
                tab_id,
                terminal_id,
                payload,
            } => {
                if self.valid_target(tab_id, terminal_id) {
                    let paths = self
                        .collaborators
                        .drops
                        .resolve_paths(&payload)
                        .iter()
                        .map(|p| p.to_string_lossy().into_owned())
                        .collect();
                    self.messenger.drop_resolved(tab_id, terminal_id, paths);
                }
            }

            ClientMessage::OpenFile {
                file_path,
                line,
                column,
                tab_id: _,
                terminal_id: _,
            } => {
                self.collaborators.opener.open_file(&file_path, line, column);
            }

            ClientMessage::OpenUrl { url } => {
                self.collaborators.opener.open_url(&url);
            }

            ClientMessage::PickFiles {
                tab_id,
                terminal_id,
            } => {
                if self.valid_target(tab_id, terminal_id) {
                    self.on_pick_files(tab_id, terminal_id).await;
                }
            }

            ClientMessage::CreateTab => {
                self.tabs.create_tab();
            }

            ClientMessage::SwitchTab { tab_id } => {
                self.tabs.switch_tab(tab_id);
            }

            ClientMessage::CloseTab { tab_id } => self.on_close_tab(tab_id).await,
        }
    }

    /// Apply one reader/timer event
    pub fn handle_session_event(&mut self, event: SessionEvent) {
        self.sessions.handle_event(event);
    }

    /// Initial handshake: push projects and render configuration, then ask
    /// the surface to repaint.
    fn on_ready(&mut self) {
        let projects = match self.collaborators.projects.list_projects() {
            Ok(projects) => projects,
            Err(e) => {
                tracing::warn!("Failed to list projects: {}", e);
                Vec::new()
            }
        };
        self.messenger.projects(projects);
        self.messenger.terminal_config(self.render_config.clone());
        self.messenger.refresh();
    }

    fn on_select_project(
        &mut self,
        tab_id: Option<TabId>,
        terminal_id: Option<SlotId>,
        project_path: &str,
        resume: Option<String>,
    ) {
        // An unknown or omitted tab falls back to the active tab.
        let tab_id = tab_id
            .filter(|id| self.tabs.contains(*id))
            .unwrap_or_else(|| self.tabs.active_tab());

        let (tab_id, slot_id) = match terminal_id {
            Some(slot_id) => {
                if !slot_in_range(slot_id) {
                    tracing::debug!("selectProject for out-of-range slot {}", slot_id);
                    return;
                }
                (tab_id, slot_id)
            }
            // No explicit slot: first free one, or a fresh tab when the
            // target is full.
            None => match self.sessions.first_free_slot(tab_id) {
                Some(slot_id) => (tab_id, slot_id),
                None => (self.tabs.create_tab(), 0),
            },
        };

        self.tabs.note_slot_used(tab_id, slot_id);
        self.sessions
            .start(tab_id, slot_id, Path::new(project_path), resume);
    }

    async fn on_pick_files(&mut self, tab_id: TabId, terminal_id: SlotId) {
        let paths = self.collaborators.picker.pick_files().await;
        if paths.is_empty() {
            return;
        }
        let quoted: Vec<String> = paths.iter().map(|p| shell_quote(p)).collect();
        let mut data = quoted.join(" ");
        data.push(' ');
        self.sessions.write_input(tab_id, terminal_id, &data);
    }

    async fn on_close_tab(&mut self, tab_id: TabId) {
        if !self.tabs.contains(tab_id) {
            tracing::debug!("Close of unknown tab {}", tab_id);
            return;
        }

        let live = self.sessions.live_slots(tab_id);
        if !live.is_empty() {
            let message = format!(
                "Tab {} has {} running session(s). Close it anyway?",
                tab_id,
                live.len()
            );
            if !self.collaborators.confirmer.confirm(&message).await {
                tracing::debug!("Close of tab {} declined", tab_id);
                return;
            }
        }

        self.sessions.kill_tab(tab_id);
        self.tabs.close_tab(tab_id);
    }

    /// A usable (tab, slot) reference: slot inside the fixed range, tab
    /// currently in the map. Anything else is stale surface state.
    fn valid_target(&self, tab_id: TabId, slot_id: SlotId) -> bool {
        if !slot_in_range(slot_id) {
            tracing::debug!("Dropping message for out-of-range slot {}", slot_id);
            return false;
        }
        if !self.tabs.contains(tab_id) {
            tracing::debug!("Dropping message for unknown tab {}", tab_id);
            return false;
        }
        true
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn tabs(&self) -> &TabManager {
        &self.tabs
    }
}
