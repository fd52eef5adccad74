//! Server wiring: socket transport, dispatch loop, outbound fan-out

pub mod connection;
pub mod listener;
pub mod orchestrator;

pub use connection::Messenger;
pub use listener::SurfaceListener;
pub use orchestrator::{Collaborators, Orchestrator};

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::mpsc;

use crate::config::Config;
use crate::session::{NativePtySpawner, SessionManager};
use crate::tabs::TabManager;
use crate::workspace::{
    AutoConfirmer, CommandOpener, DirectoryProjects, NoopFilePicker, UriDropResolver,
};

/// Queue depths for the orchestrator's two inbound channels
const SESSION_EVENT_CAPACITY: usize = 256;
const INBOUND_CAPACITY: usize = 256;
const OUTBOUND_CAPACITY: usize = 1024;

impl Collaborators {
    /// The standalone binary's collaborator set, derived from config
    pub fn from_config(config: &Config) -> Self {
        Self {
            projects: Arc::new(DirectoryProjects::new(config.projects_root())),
            confirmer: Arc::new(AutoConfirmer),
            drops: Arc::new(UriDropResolver::new()),
            opener: Arc::new(CommandOpener::new(config.editor.open_command.clone())),
            picker: Arc::new(NoopFilePicker),
        }
    }
}

/// Run the orchestrator server until the shutdown channel fires
///
/// Everything stateful lives on this task: inbound surface messages and
/// session events are handled to completion, one at a time, through the
/// select loop. The managers rely on that run-to-completion discipline.
pub async fn run(
    config: Config,
    socket_path: PathBuf,
    mut shutdown_rx: mpsc::Receiver<()>,
) -> Result<()> {
    let messenger = Messenger::new(OUTBOUND_CAPACITY);
    let (session_tx, mut session_rx) = mpsc::channel(SESSION_EVENT_CAPACITY);
    let (inbound_tx, mut inbound_rx) = mpsc::channel(INBOUND_CAPACITY);

    let sessions = SessionManager::new(
        Arc::new(NativePtySpawner),
        session_tx,
        messenger.clone(),
        config.general.shell.clone(),
        config.general.tool.clone(),
        config.timing.clone(),
    );
    let tabs = TabManager::new(messenger.clone());
    let collaborators = Collaborators::from_config(&config);
    let mut orchestrator = Orchestrator::new(
        sessions,
        tabs,
        messenger.clone(),
        collaborators,
        config.render.clone(),
    );

    let surface = SurfaceListener::new(socket_path);
    let unix_listener = surface.bind().await?;
    tokio::spawn(listener::accept_loop(
        unix_listener,
        inbound_tx,
        messenger.clone(),
    ));

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                tracing::info!("Shutdown signal received");
                break;
            }
            Some(msg) = inbound_rx.recv() => {
                orchestrator.handle_message(msg).await;
            }
            Some(event) = session_rx.recv() => {
                orchestrator.handle_session_event(event);
            }
            else => break,
        }
    }

    surface.cleanup();
    Ok(())
}
