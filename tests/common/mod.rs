//! Shared test doubles: a scripted PTY layer and collaborator fakes
#![allow(dead_code)]

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::{mpsc as std_mpsc, Arc, Mutex};

use async_trait::async_trait;
use termdeck::config::TimingConfig;
use termdeck::protocol::{ProjectInfo, ServerMessage};
use termdeck::session::{PtyError, PtyProcess, PtySpawner};
use termdeck::workspace::{Confirmer, FilePicker, Opener, ProjectSource};
use tokio::sync::broadcast;

/// Timings kept short; the tests run under a paused tokio clock anyway
pub fn test_timings() -> TimingConfig {
    TimingConfig {
        bootstrap_delay_ms: 100,
        idle_timeout_ms: 1_000,
        restart_settle_ms: 50,
    }
}

/// Inspectable state of one fake process
pub struct FakeProcessState {
    pub shell: String,
    pub working_dir: PathBuf,
    pub writes: Vec<Vec<u8>>,
    pub resizes: Vec<(u16, u16)>,
    pub killed: bool,
    /// Keeps the reader thread blocked until kill; dropped on kill so the
    /// reader sees end of stream, as a real PTY would.
    output_tx: Option<std_mpsc::Sender<Vec<u8>>>,
}

impl FakeProcessState {
    /// Concatenated writes as text, for bootstrap assertions
    pub fn written_text(&self) -> String {
        let bytes: Vec<u8> = self.writes.iter().flatten().copied().collect();
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

/// Scripted [`PtySpawner`]: records every spawn, can fail on demand, and
/// hands out handles whose state the test can inspect
#[derive(Default)]
pub struct FakeSpawner {
    fail_next: Mutex<bool>,
    spawns: Mutex<Vec<Arc<Mutex<FakeProcessState>>>>,
}

impl FakeSpawner {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_next_spawn(&self) {
        *self.fail_next.lock().unwrap() = true;
    }

    pub fn spawn_count(&self) -> usize {
        self.spawns.lock().unwrap().len()
    }

    pub fn process(&self, index: usize) -> Arc<Mutex<FakeProcessState>> {
        self.spawns.lock().unwrap()[index].clone()
    }

    pub fn last_process(&self) -> Arc<Mutex<FakeProcessState>> {
        self.spawns
            .lock()
            .unwrap()
            .last()
            .expect("no process spawned")
            .clone()
    }
}

impl PtySpawner for FakeSpawner {
    fn spawn(
        &self,
        shell: &str,
        working_dir: &Path,
        _env: &[(String, String)],
    ) -> Result<Box<dyn PtyProcess>, PtyError> {
        let mut fail_next = self.fail_next.lock().unwrap();
        if *fail_next {
            *fail_next = false;
            return Err(PtyError::SpawnFailed("scripted failure".to_string()));
        }
        drop(fail_next);

        let (output_tx, output_rx) = std_mpsc::channel();
        let state = Arc::new(Mutex::new(FakeProcessState {
            shell: shell.to_string(),
            working_dir: working_dir.to_path_buf(),
            writes: Vec::new(),
            resizes: Vec::new(),
            killed: false,
            output_tx: Some(output_tx),
        }));
        self.spawns.lock().unwrap().push(state.clone());

        Ok(Box::new(FakeProcess {
            state,
            reader: Some(Box::new(BlockingReader { rx: output_rx })),
        }))
    }
}

struct FakeProcess {
    state: Arc<Mutex<FakeProcessState>>,
    reader: Option<Box<dyn Read + Send>>,
}

impl PtyProcess for FakeProcess {
    fn write(&mut self, data: &[u8]) -> Result<(), PtyError> {
        let mut state = self.state.lock().unwrap();
        if state.killed {
            return Err(PtyError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "process exited",
            )));
        }
        state.writes.push(data.to_vec());
        Ok(())
    }

    fn resize(&self, cols: u16, rows: u16) -> Result<(), PtyError> {
        self.state.lock().unwrap().resizes.push((cols, rows));
        Ok(())
    }

    fn kill(&mut self) {
        let mut state = self.state.lock().unwrap();
        state.killed = true;
        state.output_tx = None;
    }

    fn take_reader(&mut self) -> Option<Box<dyn Read + Send>> {
        self.reader.take()
    }
}

/// Blocks until output is pushed or the fake process is killed
struct BlockingReader {
    rx: std_mpsc::Receiver<Vec<u8>>,
}

impl Read for BlockingReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self.rx.recv() {
            Ok(data) => {
                let n = data.len().min(buf.len());
                buf[..n].copy_from_slice(&data[..n]);
                Ok(n)
            }
            Err(_) => Ok(0),
        }
    }
}

/// Collect everything currently queued on the outbound stream
pub fn drain_outbound(rx: &mut broadcast::Receiver<ServerMessage>) -> Vec<ServerMessage> {
    let mut out = Vec::new();
    while let Ok(msg) = rx.try_recv() {
        out.push(msg);
    }
    out
}

/// Fixed project list
pub struct StaticProjects(pub Vec<ProjectInfo>);

impl ProjectSource for StaticProjects {
    fn list_projects(&self) -> anyhow::Result<Vec<ProjectInfo>> {
        Ok(self.0.clone())
    }
}

/// Confirmer scripted to accept or decline, recording the prompts
pub struct ScriptedConfirmer {
    pub accept: bool,
    pub prompts: Mutex<Vec<String>>,
}

impl ScriptedConfirmer {
    pub fn new(accept: bool) -> Arc<Self> {
        Arc::new(Self {
            accept,
            prompts: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl Confirmer for ScriptedConfirmer {
    async fn confirm(&self, message: &str) -> bool {
        self.prompts.lock().unwrap().push(message.to_string());
        self.accept
    }
}

/// Picker that returns a fixed set of paths
pub struct StaticPicker(pub Vec<PathBuf>);

#[async_trait]
impl FilePicker for StaticPicker {
    async fn pick_files(&self) -> Vec<PathBuf> {
        self.0.clone()
    }
}

/// Opener that records what it was asked to open
#[derive(Default)]
pub struct RecordingOpener {
    pub files: Mutex<Vec<(String, Option<u32>, Option<u32>)>>,
    pub urls: Mutex<Vec<String>>,
}

impl Opener for RecordingOpener {
    fn open_file(&self, path: &str, line: Option<u32>, column: Option<u32>) {
        self.files
            .lock()
            .unwrap()
            .push((path.to_string(), line, column));
    }

    fn open_url(&self, url: &str) {
        self.urls.lock().unwrap().push(url.to_string());
    }
}
