// ABOUTME: In-memory transport standing in for a remote SSH server.
// ABOUTME: Scripts exec replies and models remote files and directories for SCP/SFTP.

use async_trait::async_trait;
use parking_lot::Mutex;
use sshkit::ssh::{
    Connector, ExecOptions, ExecOutput, SessionConfig, SftpSubsystem, Transport, TransportError,
};
use std::collections::{BTreeMap, VecDeque};
use std::path::Path;
use std::sync::Arc;

pub const USER: &str = "deploy";
pub const PASSWORD: &str = "s3cret";

#[derive(Default)]
struct ServerState {
    refuse_connections: bool,
    fail_disconnect: bool,
    replies: VecDeque<ExecOutput>,
    commands: Vec<String>,
    detached: Vec<(String, ExecOptions)>,
    files: BTreeMap<String, (Vec<u8>, u32)>,
    dirs: BTreeMap<String, u32>,
    connects: usize,
    disconnects: usize,
    sftp_opened: usize,
    sftp_closed: usize,
}

/// Fake server shared between a test and the transports it hands out.
#[derive(Clone)]
pub struct FakeServer {
    state: Arc<Mutex<ServerState>>,
}

impl Default for FakeServer {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeServer {
    pub fn new() -> Self {
        let mut state = ServerState::default();
        state.dirs.insert("/".to_string(), 0o755);
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub fn session_config() -> SessionConfig {
        SessionConfig::new("fake.example.com", USER).password(PASSWORD)
    }

    pub fn refuse_connections(&self) {
        self.state.lock().refuse_connections = true;
    }

    pub fn fail_disconnect(&self) {
        self.state.lock().fail_disconnect = true;
    }

    /// Queue the output for the next exec.
    pub fn reply(&self, stdout: &str, stderr: &str) {
        self.state.lock().replies.push_back(ExecOutput {
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
            exit_status: None,
        });
    }

    pub fn reply_with_status(&self, stdout: &str, exit_status: u32) {
        self.state.lock().replies.push_back(ExecOutput {
            stdout: stdout.to_string(),
            stderr: String::new(),
            exit_status: Some(exit_status),
        });
    }

    pub fn commands(&self) -> Vec<String> {
        self.state.lock().commands.clone()
    }

    pub fn detached(&self) -> Vec<(String, ExecOptions)> {
        self.state.lock().detached.clone()
    }

    pub fn add_file(&self, path: &str, contents: &[u8]) {
        self.state
            .lock()
            .files
            .insert(path.to_string(), (contents.to_vec(), 0o644));
    }

    pub fn add_dir(&self, path: &str) {
        self.state.lock().dirs.insert(path.to_string(), 0o755);
    }

    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.state.lock().files.get(path).map(|(data, _)| data.clone())
    }

    pub fn mode(&self, path: &str) -> Option<u32> {
        let state = self.state.lock();
        state
            .files
            .get(path)
            .map(|(_, mode)| *mode)
            .or_else(|| state.dirs.get(path).copied())
    }

    pub fn has_dir(&self, path: &str) -> bool {
        self.state.lock().dirs.contains_key(path)
    }

    pub fn connects(&self) -> usize {
        self.state.lock().connects
    }

    pub fn disconnects(&self) -> usize {
        self.state.lock().disconnects
    }

    pub fn sftp_opened(&self) -> usize {
        self.state.lock().sftp_opened
    }

    pub fn sftp_closed(&self) -> usize {
        self.state.lock().sftp_closed
    }
}

#[async_trait]
impl Connector for FakeServer {
    type Transport = FakeTransport;

    async fn connect(&self, _config: &SessionConfig) -> Result<FakeTransport, TransportError> {
        let mut state = self.state.lock();
        if state.refuse_connections {
            return Err(TransportError::Rejected("connection refused".to_string()));
        }
        state.connects += 1;
        Ok(FakeTransport {
            state: Arc::clone(&self.state),
        })
    }
}

pub struct FakeTransport {
    state: Arc<Mutex<ServerState>>,
}

#[async_trait]
impl Transport for FakeTransport {
    type Sftp = FakeSftp;

    async fn authenticate_password(
        &mut self,
        user: &str,
        password: &str,
    ) -> Result<bool, TransportError> {
        Ok(user == USER && password == PASSWORD)
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        state.disconnects += 1;
        if state.fail_disconnect {
            return Err(TransportError::ChannelClosed);
        }
        Ok(())
    }

    async fn exec(
        &mut self,
        command: &str,
        _options: &ExecOptions,
    ) -> Result<ExecOutput, TransportError> {
        let mut state = self.state.lock();
        state.commands.push(command.to_string());
        Ok(state.replies.pop_front().unwrap_or_default())
    }

    async fn exec_detached(
        &mut self,
        command: &str,
        options: &ExecOptions,
    ) -> Result<(), TransportError> {
        self.state
            .lock()
            .detached
            .push((command.to_string(), options.clone()));
        Ok(())
    }

    async fn scp_send(
        &mut self,
        local: &Path,
        remote: &str,
        mode: u32,
    ) -> Result<(), TransportError> {
        let data = std::fs::read(local)?;
        let mut state = self.state.lock();
        if !state.dirs.contains_key(parent(remote)) {
            return Err(TransportError::Rejected(format!(
                "scp: {}: No such file or directory",
                remote
            )));
        }
        state.files.insert(remote.to_string(), (data, mode));
        Ok(())
    }

    async fn scp_recv(&mut self, remote: &str, local: &Path) -> Result<(), TransportError> {
        let data = self
            .state
            .lock()
            .files
            .get(remote)
            .map(|(data, _)| data.clone())
            .ok_or_else(|| {
                TransportError::Rejected(format!("scp: {}: No such file or directory", remote))
            })?;
        std::fs::write(local, data)?;
        Ok(())
    }

    async fn sftp_init(&mut self) -> Result<FakeSftp, TransportError> {
        self.state.lock().sftp_opened += 1;
        Ok(FakeSftp {
            state: Arc::clone(&self.state),
        })
    }
}

pub struct FakeSftp {
    state: Arc<Mutex<ServerState>>,
}

#[async_trait]
impl SftpSubsystem for FakeSftp {
    async fn chmod(&self, path: &str, mode: u32) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        if let Some((_, file_mode)) = state.files.get_mut(path) {
            *file_mode = mode;
            return Ok(());
        }
        match state.dirs.get_mut(path) {
            Some(dir_mode) => {
                *dir_mode = mode;
                Ok(())
            }
            None => Err(no_such_file(path)),
        }
    }

    async fn mkdir(&self, path: &str, mode: u32, recursive: bool) -> Result<(), TransportError> {
        let mut state = self.state.lock();

        if recursive {
            let mut missing = Vec::new();
            let mut current = path;
            while !state.dirs.contains_key(current) {
                if state.files.contains_key(current) {
                    return Err(TransportError::Rejected(format!(
                        "{}: exists and is not a directory",
                        current
                    )));
                }
                missing.push(current.to_string());
                current = parent(current);
            }
            for dir in missing {
                state.dirs.insert(dir, mode);
            }
            return Ok(());
        }

        if state.dirs.contains_key(path) || state.files.contains_key(path) {
            return Err(TransportError::Rejected(format!("{}: File exists", path)));
        }
        if !state.dirs.contains_key(parent(path)) {
            return Err(no_such_file(path));
        }
        state.dirs.insert(path.to_string(), mode);
        Ok(())
    }

    async fn rmdir(&self, path: &str) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        if !state.dirs.contains_key(path) {
            return Err(no_such_file(path));
        }
        let prefix = format!("{}/", path);
        let occupied = state.files.keys().any(|f| f.starts_with(&prefix))
            || state.dirs.keys().any(|d| d.starts_with(&prefix));
        if occupied {
            return Err(TransportError::Rejected(format!("{}: Directory not empty", path)));
        }
        state.dirs.remove(path);
        Ok(())
    }

    async fn unlink(&self, path: &str) -> Result<(), TransportError> {
        self.state
            .lock()
            .files
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| no_such_file(path))
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.state.lock().sftp_closed += 1;
        Ok(())
    }
}

fn parent(path: &str) -> &str {
    match path.trim_end_matches('/').rfind('/') {
        Some(0) | None => "/",
        Some(pos) => &path[..pos],
    }
}

fn no_such_file(path: &str) -> TransportError {
    TransportError::Rejected(format!("{}: No such file", path))
}
