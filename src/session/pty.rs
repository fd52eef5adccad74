//! PTY process primitive - the process-spawning seam of the core
//!
//! The orchestrator only ever sees the [`PtySpawner`] and [`PtyProcess`]
//! traits; the portable-pty implementation lives behind them so tests can
//! substitute a scripted fake.

use std::io::{Read, Write};
use std::path::Path;

use portable_pty::{native_pty_system, Child, CommandBuilder, MasterPty, PtySize};
use thiserror::Error;

/// Errors from PTY operations
#[derive(Debug, Error)]
pub enum PtyError {
    #[error("PTY spawn failed: {0}")]
    SpawnFailed(String),

    #[error("PTY I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("PTY resize failed: {0}")]
    ResizeFailed(String),
}

/// A live process handle, owned exclusively by one session slot
pub trait PtyProcess: Send {
    /// Write input bytes to the process
    fn write(&mut self, data: &[u8]) -> Result<(), PtyError>;

    /// Propagate a terminal geometry change to the process
    fn resize(&self, cols: u16, rows: u16) -> Result<(), PtyError>;

    /// Terminate the process and reap it. Infallible by contract: killing
    /// an already-dead process is not an error.
    fn kill(&mut self);

    /// Extract the output reader for a dedicated I/O thread.
    /// Returns `None` on any call after the first.
    fn take_reader(&mut self) -> Option<Box<dyn Read + Send>>;
}

/// Process-spawning primitive consumed by the session manager
pub trait PtySpawner: Send + Sync {
    /// Spawn a shell rooted at `working_dir` with the given extra environment
    fn spawn(
        &self,
        shell: &str,
        working_dir: &Path,
        env: &[(String, String)],
    ) -> Result<Box<dyn PtyProcess>, PtyError>;
}

/// Initial PTY geometry; the surface sends a resize as soon as it lays out
const INITIAL_COLS: u16 = 80;
const INITIAL_ROWS: u16 = 24;

/// [`PtySpawner`] backed by the operating system's PTY facility
pub struct NativePtySpawner;

impl PtySpawner for NativePtySpawner {
    fn spawn(
        &self,
        shell: &str,
        working_dir: &Path,
        env: &[(String, String)],
    ) -> Result<Box<dyn PtyProcess>, PtyError> {
        let pty_system = native_pty_system();

        let pair = pty_system
            .openpty(PtySize {
                rows: INITIAL_ROWS,
                cols: INITIAL_COLS,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| PtyError::SpawnFailed(format!("failed to open PTY: {e}")))?;

        let mut cmd = CommandBuilder::new(shell);
        cmd.cwd(working_dir);
        for (key, value) in env {
            cmd.env(key, value);
        }

        let child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| PtyError::SpawnFailed(format!("failed to spawn shell: {e}")))?;

        let reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| PtyError::SpawnFailed(format!("failed to clone reader: {e}")))?;

        let writer = pair
            .master
            .take_writer()
            .map_err(|e| PtyError::SpawnFailed(format!("failed to take writer: {e}")))?;

        Ok(Box::new(NativePty {
            master: pair.master,
            writer,
            child,
            reader: Some(reader),
        }))
    }
}

/// Owns the portable-pty master pair, writer, and child process
struct NativePty {
    master: Box<dyn MasterPty + Send>,
    writer: Box<dyn Write + Send>,
    child: Box<dyn Child + Send + Sync>,
    reader: Option<Box<dyn Read + Send>>,
}

impl PtyProcess for NativePty {
    fn write(&mut self, data: &[u8]) -> Result<(), PtyError> {
        self.writer.write_all(data)?;
        self.writer.flush()?;
        Ok(())
    }

    fn resize(&self, cols: u16, rows: u16) -> Result<(), PtyError> {
        self.master
            .resize(PtySize {
                rows,
                cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| PtyError::ResizeFailed(format!("{e}")))
    }

    fn kill(&mut self) {
        // kill on an exited child errors; wait reaps either way
        let _ = self.child.kill();
        let _ = self.child.wait();
    }

    fn take_reader(&mut self) -> Option<Box<dyn Read + Send>> {
        self.reader.take()
    }
}
