//! Session manager - owns one PTY process per (tab, slot)
//!
//! Lifecycle per slot: `Empty → Starting → Busy/Idle (oscillating) →
//! Exited → Empty`, with a `Restarting → Starting` detour. All scheduled
//! continuations (bootstrap write, idle transition, restart settle) are
//! stamped with the slot generation they were created under and dropped on
//! arrival if the slot has since been cleaned up or respawned.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;

use super::pty::{PtyProcess, PtySpawner};
use super::{SessionEvent, SlotKey, SLOTS_PER_TAB};
use crate::config::TimingConfig;
use crate::protocol::{SessionStatus, SlotId, TabId};
use crate::server::Messenger;

/// Derived activity state of a live session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Activity {
    /// Spawned, no output seen yet
    Starting,
    /// Output within the idle timeout
    Busy,
    /// No output for at least the idle timeout
    Idle,
}

/// A live session occupying one slot
struct Session {
    process: Box<dyn PtyProcess>,
    working_dir: PathBuf,
    /// Resume token handed to the bootstrap write; never survives a restart
    resume: Option<String>,
    generation: u64,
    activity: Activity,
    last_output: Instant,
    idle_armed: bool,
}

/// Owns every running session and its lifecycle state
///
/// All mutation happens inside the orchestrator's single event-handling
/// context; the maps need no locking.
pub struct SessionManager {
    slots: HashMap<SlotKey, Session>,

    /// Per-slot spawn counters. These outlive slot occupancy: a counter is
    /// bumped on every spawn into the slot and on every cleanup, which is
    /// what retroactively invalidates timers scheduled under prior
    /// occupants.
    generations: HashMap<SlotKey, u64>,

    spawner: Arc<dyn PtySpawner>,

    /// Feed of reader/timer events back into the orchestrator loop
    events: mpsc::Sender<SessionEvent>,

    messenger: Messenger,

    shell: String,

    /// Command written into fresh sessions after the bootstrap delay
    tool: String,

    timings: TimingConfig,
}

impl SessionManager {
    pub fn new(
        spawner: Arc<dyn PtySpawner>,
        events: mpsc::Sender<SessionEvent>,
        messenger: Messenger,
        shell: String,
        tool: String,
        timings: TimingConfig,
    ) -> Self {
        Self {
            slots: HashMap::new(),
            generations: HashMap::new(),
            spawner,
            events,
            messenger,
            shell,
            tool,
            timings,
        }
    }

    /// Start a session in a slot, replacing any current occupant
    pub fn start(&mut self, tab_id: TabId, slot_id: SlotId, working_dir: &Path, resume: Option<String>) {
        let key = (tab_id, slot_id);

        // At-most-one-live-process: silently clear whatever occupies the
        // slot before spawning into it.
        self.cleanup_slot(key);

        self.messenger.clear(tab_id, slot_id);

        let generation = self.bump_generation(key);

        let mut process = match self.spawner.spawn(&self.shell, working_dir, &session_env()) {
            Ok(process) => process,
            Err(e) => {
                tracing::warn!("Spawn failed for tab {} slot {}: {}", tab_id, slot_id, e);
                self.messenger
                    .error(tab_id, slot_id, format!("Failed to start session: {e}"));
                return;
            }
        };

        let Some(reader) = process.take_reader() else {
            self.messenger
                .error(tab_id, slot_id, "Failed to start session: no output stream".into());
            return;
        };
        self.spawn_reader(tab_id, slot_id, generation, reader);

        self.slots.insert(
            key,
            Session {
                process,
                working_dir: working_dir.to_path_buf(),
                resume,
                generation,
                activity: Activity::Starting,
                last_output: Instant::now(),
                idle_armed: false,
            },
        );

        self.schedule(
            self.timings.bootstrap_delay(),
            SessionEvent::BootstrapDue {
                tab_id,
                slot_id,
                generation,
            },
        );

        tracing::info!(
            "Started session in tab {} slot {} at {}",
            tab_id,
            slot_id,
            working_dir.display()
        );
    }

    /// Route input to a session. Unknown slots and dead handles are
    /// tolerated: the surface may be acting on state the core already left.
    pub fn write_input(&mut self, tab_id: TabId, slot_id: SlotId, data: &str) {
        let Some(session) = self.slots.get_mut(&(tab_id, slot_id)) else {
            tracing::debug!("Input for empty tab {} slot {}", tab_id, slot_id);
            return;
        };
        if let Err(e) = session.process.write(data.as_bytes()) {
            tracing::debug!("Write to tab {} slot {} ignored: {}", tab_id, slot_id, e);
        }
    }

    /// Forward a geometry change; zero dimensions and failures are ignored
    pub fn resize(&mut self, tab_id: TabId, slot_id: SlotId, cols: u16, rows: u16) {
        if cols == 0 || rows == 0 {
            return;
        }
        let Some(session) = self.slots.get(&(tab_id, slot_id)) else {
            return;
        };
        if let Err(e) = session.process.resize(cols, rows) {
            tracing::debug!("Resize for tab {} slot {} ignored: {}", tab_id, slot_id, e);
        }
    }

    /// Terminate a session and free its slot. Idempotent: an empty slot is
    /// a no-op and emits nothing.
    pub fn kill(&mut self, tab_id: TabId, slot_id: SlotId) {
        if self.cleanup_slot((tab_id, slot_id)) {
            self.messenger.killed(tab_id, slot_id);
            tracing::info!("Killed session in tab {} slot {}", tab_id, slot_id);
        }
    }

    /// Kill and relaunch a session in its recorded working directory.
    /// No-op on an empty slot: no process is spawned, no event is emitted.
    pub fn restart(&mut self, tab_id: TabId, slot_id: SlotId) {
        let key = (tab_id, slot_id);
        let Some(session) = self.slots.get(&key) else {
            return;
        };
        let working_dir = session.working_dir.clone();

        self.messenger.restarting(tab_id, slot_id);
        self.cleanup_slot(key);

        // The settle continuation carries the post-cleanup generation; any
        // start or kill in the meantime bumps it and orphans the restart.
        let generation = self.current_generation(key);
        self.schedule(
            self.timings.restart_settle(),
            SessionEvent::RestartDue {
                tab_id,
                slot_id,
                generation,
                working_dir,
            },
        );
    }

    /// Kill every live session in a tab
    pub fn kill_tab(&mut self, tab_id: TabId) {
        for slot_id in self.live_slots(tab_id) {
            self.kill(tab_id, slot_id);
        }
    }

    /// Apply one reader/timer event to the slot state machine
    pub fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Output {
                tab_id,
                slot_id,
                generation,
                data,
            } => self.on_output(tab_id, slot_id, generation, &data),
            SessionEvent::Exited {
                tab_id,
                slot_id,
                generation,
            } => self.on_exited(tab_id, slot_id, generation),
            SessionEvent::BootstrapDue {
                tab_id,
                slot_id,
                generation,
            } => self.on_bootstrap_due(tab_id, slot_id, generation),
            SessionEvent::IdleDue {
                tab_id,
                slot_id,
                generation,
            } => self.on_idle_due(tab_id, slot_id, generation),
            SessionEvent::RestartDue {
                tab_id,
                slot_id,
                generation,
                working_dir,
            } => self.on_restart_due(tab_id, slot_id, generation, &working_dir),
        }
    }

    pub fn is_occupied(&self, tab_id: TabId, slot_id: SlotId) -> bool {
        self.slots.contains_key(&(tab_id, slot_id))
    }

    /// Lowest unoccupied slot of a tab, if any
    pub fn first_free_slot(&self, tab_id: TabId) -> Option<SlotId> {
        (0..SLOTS_PER_TAB as SlotId).find(|slot_id| !self.is_occupied(tab_id, *slot_id))
    }

    /// Occupied slots of a tab, ascending
    pub fn live_slots(&self, tab_id: TabId) -> Vec<SlotId> {
        let mut slots: Vec<SlotId> = self
            .slots
            .keys()
            .filter(|(tab, _)| *tab == tab_id)
            .map(|(_, slot)| *slot)
            .collect();
        slots.sort_unstable();
        slots
    }

    pub fn session_count(&self) -> usize {
        self.slots.len()
    }

    fn on_output(&mut self, tab_id: TabId, slot_id: SlotId, generation: u64, data: &[u8]) {
        let key = (tab_id, slot_id);
        let idle_timeout = self.timings.idle_timeout();
        let Some(session) = self.slots.get_mut(&key) else {
            return;
        };
        if session.generation != generation {
            return;
        }

        self.messenger
            .output(tab_id, slot_id, String::from_utf8_lossy(data).into_owned());

        if session.activity != Activity::Busy {
            session.activity = Activity::Busy;
            self.messenger.status(tab_id, slot_id, SessionStatus::Busy);
        }
        session.last_output = Instant::now();

        if !session.idle_armed {
            session.idle_armed = true;
            self.schedule(
                idle_timeout,
                SessionEvent::IdleDue {
                    tab_id,
                    slot_id,
                    generation,
                },
            );
        }
    }

    fn on_exited(&mut self, tab_id: TabId, slot_id: SlotId, generation: u64) {
        let key = (tab_id, slot_id);
        match self.slots.get(&key) {
            Some(session) if session.generation == generation => {}
            // Exit notification for a process that kill/restart/start
            // already cleaned up.
            _ => return,
        }
        self.cleanup_slot(key);
        self.messenger.killed(tab_id, slot_id);
        tracing::info!("Session in tab {} slot {} exited", tab_id, slot_id);
    }

    fn on_bootstrap_due(&mut self, tab_id: TabId, slot_id: SlotId, generation: u64) {
        let Some(session) = self.slots.get_mut(&(tab_id, slot_id)) else {
            return;
        };
        if session.generation != generation {
            return;
        }

        let mut command = self.tool.clone();
        if let Some(token) = session.resume.take() {
            command.push(' ');
            command.push_str(&token);
        }
        command.push('\r');

        if let Err(e) = session.process.write(command.as_bytes()) {
            tracing::debug!("Bootstrap write for tab {} slot {} ignored: {}", tab_id, slot_id, e);
        }
    }

    fn on_idle_due(&mut self, tab_id: TabId, slot_id: SlotId, generation: u64) {
        let key = (tab_id, slot_id);
        let idle_timeout = self.timings.idle_timeout();
        let Some(session) = self.slots.get_mut(&key) else {
            return;
        };
        if session.generation != generation {
            return;
        }

        session.idle_armed = false;
        let elapsed = session.last_output.elapsed();
        if elapsed < idle_timeout {
            // Output arrived since this timer was armed; push the deadline
            // out by the remainder instead of stacking a second timer.
            session.idle_armed = true;
            self.schedule(
                idle_timeout - elapsed,
                SessionEvent::IdleDue {
                    tab_id,
                    slot_id,
                    generation,
                },
            );
            return;
        }

        if session.activity == Activity::Busy {
            session.activity = Activity::Idle;
            self.messenger.status(tab_id, slot_id, SessionStatus::Idle);
        }
    }

    fn on_restart_due(&mut self, tab_id: TabId, slot_id: SlotId, generation: u64, working_dir: &Path) {
        let key = (tab_id, slot_id);
        if self.current_generation(key) != generation {
            return;
        }
        // A restart never carries the resume token forward.
        self.start(tab_id, slot_id, working_dir, None);
    }

    /// Remove the slot's session and terminate its process. Returns whether
    /// the slot was occupied. Emits nothing; callers own the event choice.
    fn cleanup_slot(&mut self, key: SlotKey) -> bool {
        let Some(mut session) = self.slots.remove(&key) else {
            return false;
        };
        session.process.kill();
        self.bump_generation(key);
        true
    }

    fn bump_generation(&mut self, key: SlotKey) -> u64 {
        let counter = self.generations.entry(key).or_insert(0);
        *counter += 1;
        *counter
    }

    fn current_generation(&self, key: SlotKey) -> u64 {
        self.generations.get(&key).copied().unwrap_or(0)
    }

    /// Post a generation-stamped event after a delay
    fn schedule(&self, delay: Duration, event: SessionEvent) {
        let events = self.events.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = events.send(event).await;
        });
    }

    /// Pump process output into the event loop from a dedicated OS thread;
    /// portable-pty readers block, so this cannot live on the runtime.
    fn spawn_reader(
        &self,
        tab_id: TabId,
        slot_id: SlotId,
        generation: u64,
        mut reader: Box<dyn std::io::Read + Send>,
    ) {
        let events = self.events.clone();
        std::thread::spawn(move || {
            let mut buf = [0u8; 8192];
            loop {
                match reader.read(&mut buf) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        let sent = events.blocking_send(SessionEvent::Output {
                            tab_id,
                            slot_id,
                            generation,
                            data: buf[..n].to_vec(),
                        });
                        if sent.is_err() {
                            return;
                        }
                    }
                }
            }
            let _ = events.blocking_send(SessionEvent::Exited {
                tab_id,
                slot_id,
                generation,
            });
        });
    }
}

fn session_env() -> Vec<(String, String)> {
    vec![
        ("TERM".to_string(), "xterm-256color".to_string()),
        ("COLORTERM".to_string(), "truecolor".to_string()),
    ]
}
