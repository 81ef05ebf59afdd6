//! In-memory platform doubles shared by the install tests

#![allow(dead_code)]

use apkinst_errors::PlatformError;
use apkinst_events::{AppEvent, EventReceiver};
use apkinst_install::InstallConfig;
use apkinst_platform::{
    ByteSource, PackageInfo, PackageManager, Platform, PlatformContext, PrivilegedShell,
    SessionBackend, SessionStream, ShellOutput,
};
use apkinst_types::{InstallOutcome, SessionId};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWrite};
use tokio::sync::oneshot;

pub const PACKAGE: &str = "com.google.android.youtube";
pub const INSTALLED_BASE: &str = "/data/app/~~Xa1==/com.google.android.youtube-Yb2==/base.apk";

type Response = Result<ShellOutput, PlatformError>;

/// Root shell that records scripts and answers from registered rules
///
/// The most recently registered rule whose needle occurs in the script
/// wins; unmatched scripts succeed with no output.
#[derive(Default)]
pub struct MockShell {
    rules: Mutex<Vec<(String, Response)>>,
    scripts: Mutex<Vec<String>>,
    piped: Mutex<Vec<(String, Vec<u8>)>>,
    files: Mutex<HashMap<PathBuf, Vec<u8>>>,
}

impl MockShell {
    pub fn respond(&self, needle: &str, output: ShellOutput) {
        self.rules.lock().unwrap().push((needle.to_string(), Ok(output)));
    }

    pub fn fail(&self, needle: &str, exit_code: i32, lines: &[&str]) {
        self.respond(
            needle,
            ShellOutput::new(exit_code, lines.iter().map(|l| (*l).to_string()).collect()),
        );
    }

    pub fn error(&self, needle: &str, error: PlatformError) {
        self.rules.lock().unwrap().push((needle.to_string(), Err(error)));
    }

    pub fn add_file(&self, path: impl Into<PathBuf>, bytes: Vec<u8>) {
        self.files.lock().unwrap().insert(path.into(), bytes);
    }

    pub fn scripts(&self) -> Vec<String> {
        self.scripts.lock().unwrap().clone()
    }

    pub fn piped(&self) -> Vec<(String, Vec<u8>)> {
        self.piped.lock().unwrap().clone()
    }

    /// Index of the first script containing `needle`
    pub fn position(&self, needle: &str) -> Option<usize> {
        self.scripts().iter().position(|s| s.contains(needle))
    }

    pub fn ran(&self, needle: &str) -> bool {
        self.position(needle).is_some()
    }

    fn answer(&self, script: &str) -> Response {
        self.rules
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(needle, _)| script.contains(needle.as_str()))
            .map_or_else(|| Ok(ShellOutput::default()), |(_, response)| response.clone())
    }
}

#[async_trait]
impl PrivilegedShell for MockShell {
    async fn run(&self, _ctx: &PlatformContext, script: &str) -> Result<ShellOutput, PlatformError> {
        self.scripts.lock().unwrap().push(script.to_string());
        self.answer(script)
    }

    async fn pipe_to(
        &self,
        _ctx: &PlatformContext,
        command: &str,
        mut input: ByteSource,
        len: u64,
    ) -> Result<ShellOutput, PlatformError> {
        let mut bytes = Vec::new();
        input.read_to_end(&mut bytes).await.unwrap();
        self.piped
            .lock()
            .unwrap()
            .push((command.to_string(), bytes.clone()));
        if bytes.len() as u64 != len {
            return Err(PlatformError::StreamFailed {
                command: command.to_string(),
                message: format!("got {} of {len} bytes", bytes.len()),
            });
        }
        self.answer(command)
    }

    async fn open_read(&self, _ctx: &PlatformContext, path: &Path) -> Result<ByteSource, PlatformError> {
        let bytes = self
            .files
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| PlatformError::StreamFailed {
                command: format!("cat {}", path.display()),
                message: "No such file or directory".to_string(),
            })?;
        Ok(Box::new(io::Cursor::new(bytes)))
    }

    async fn close(&self, _ctx: &PlatformContext) -> Result<(), PlatformError> {
        Ok(())
    }
}

/// Package manager with one optionally installed package
#[derive(Default)]
pub struct MockPackageManager {
    info: Mutex<Option<PackageInfo>>,
    uninstall_error: Mutex<Option<PlatformError>>,
    uninstalled: Mutex<Vec<String>>,
}

impl MockPackageManager {
    pub fn install(&self, version_code: i64, source_dir: Option<&str>) {
        self.install_as(PACKAGE, version_code, source_dir);
    }

    pub fn install_as(&self, package: &str, version_code: i64, source_dir: Option<&str>) {
        *self.info.lock().unwrap() = Some(PackageInfo {
            package: package.to_string(),
            version_code,
            version_name: Some("18.45.43".to_string()),
            source_dir: source_dir.map(PathBuf::from),
        });
    }

    pub fn fail_uninstall(&self, error: PlatformError) {
        *self.uninstall_error.lock().unwrap() = Some(error);
    }

    pub fn uninstalled(&self) -> Vec<String> {
        self.uninstalled.lock().unwrap().clone()
    }
}

#[async_trait]
impl PackageManager for MockPackageManager {
    async fn package_info(
        &self,
        _ctx: &PlatformContext,
        package: &str,
    ) -> Result<PackageInfo, PlatformError> {
        self.info
            .lock()
            .unwrap()
            .clone()
            .filter(|info| info.package == package)
            .ok_or_else(|| PlatformError::PackageNotFound {
                package: package.to_string(),
            })
    }

    async fn uninstall(&self, _ctx: &PlatformContext, package: &str) -> Result<(), PlatformError> {
        if let Some(error) = self.uninstall_error.lock().unwrap().clone() {
            return Err(error);
        }
        self.uninstalled.lock().unwrap().push(package.to_string());
        Ok(())
    }
}

/// Session backend keeping every written entry in memory
pub struct MockSessionBackend {
    created: Mutex<Vec<u64>>,
    written: Arc<Mutex<BTreeMap<String, Vec<u8>>>>,
    committed: Mutex<Vec<SessionId>>,
    abandoned: Mutex<Vec<SessionId>>,
    commit_outcome: Mutex<InstallOutcome>,
}

impl Default for MockSessionBackend {
    fn default() -> Self {
        Self {
            created: Mutex::default(),
            written: Arc::default(),
            committed: Mutex::default(),
            abandoned: Mutex::default(),
            commit_outcome: Mutex::new(InstallOutcome::success()),
        }
    }
}

impl MockSessionBackend {
    pub const SESSION: SessionId = SessionId(4242);

    pub fn set_commit_outcome(&self, outcome: InstallOutcome) {
        *self.commit_outcome.lock().unwrap() = outcome;
    }

    pub fn created(&self) -> Vec<u64> {
        self.created.lock().unwrap().clone()
    }

    pub fn written(&self) -> BTreeMap<String, Vec<u8>> {
        self.written.lock().unwrap().clone()
    }

    pub fn committed(&self) -> Vec<SessionId> {
        self.committed.lock().unwrap().clone()
    }

    pub fn abandoned(&self) -> Vec<SessionId> {
        self.abandoned.lock().unwrap().clone()
    }
}

#[async_trait]
impl SessionBackend for MockSessionBackend {
    async fn create_session(
        &self,
        _ctx: &PlatformContext,
        total_size_bytes: u64,
    ) -> Result<SessionId, PlatformError> {
        self.created.lock().unwrap().push(total_size_bytes);
        Ok(Self::SESSION)
    }

    async fn open_write(
        &self,
        _ctx: &PlatformContext,
        _session: SessionId,
        name: &str,
        _size_bytes: u64,
    ) -> Result<Box<dyn SessionStream>, PlatformError> {
        Ok(Box::new(MockStream {
            name: name.to_string(),
            buffer: Vec::new(),
            sink: Arc::clone(&self.written),
        }))
    }

    async fn commit(
        &self,
        _ctx: &PlatformContext,
        session: SessionId,
        completion: oneshot::Sender<InstallOutcome>,
    ) -> Result<(), PlatformError> {
        self.committed.lock().unwrap().push(session);
        let _ = completion.send(self.commit_outcome.lock().unwrap().clone());
        Ok(())
    }

    async fn abandon(&self, _ctx: &PlatformContext, session: SessionId) -> Result<(), PlatformError> {
        self.abandoned.lock().unwrap().push(session);
        Ok(())
    }
}

struct MockStream {
    name: String,
    buffer: Vec<u8>,
    sink: Arc<Mutex<BTreeMap<String, Vec<u8>>>>,
}

impl AsyncWrite for MockStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.buffer.extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

#[async_trait]
impl SessionStream for MockStream {
    async fn fsync(&mut self) -> Result<(), PlatformError> {
        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<(), PlatformError> {
        let Self { name, buffer, sink } = *self;
        sink.lock().unwrap().insert(name, buffer);
        Ok(())
    }
}

pub struct Harness {
    pub shell: Arc<MockShell>,
    pub packages: Arc<MockPackageManager>,
    pub sessions: Arc<MockSessionBackend>,
    pub platform: Platform,
}

impl Harness {
    pub fn new() -> Self {
        let shell = Arc::new(MockShell::default());
        let packages = Arc::new(MockPackageManager::default());
        let sessions = Arc::new(MockSessionBackend::default());
        let platform = Platform::new(shell.clone(), packages.clone(), sessions.clone());
        Self {
            shell,
            packages,
            sessions,
            platform,
        }
    }
}

/// Defaults with the target package pinned and no settle delay
pub fn test_config() -> InstallConfig {
    InstallConfig::default()
        .with_target_package(PACKAGE)
        .with_mount_settle(Duration::ZERO)
}

pub fn context() -> (PlatformContext, EventReceiver) {
    let (tx, rx) = apkinst_events::channel();
    (PlatformContext::new(Some(tx)), rx)
}

pub fn drain(rx: &mut EventReceiver) -> Vec<AppEvent> {
    let mut events = Vec::new();
    while let Ok(message) = rx.try_recv() {
        events.push(message.event);
    }
    events
}

/// Write a package directory with the given files
pub fn package_dir(files: &[(&str, usize)]) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    for (name, size) in files {
        std::fs::write(dir.path().join(name), vec![0xA5; *size]).unwrap();
    }
    dir
}
