//! Supervisor for the single tunnel client process.
//!
//! `Stopped -> Starting -> Running -> Stopping -> Stopped`. All state lives in
//! one mutex-guarded [`RunnerState`]; the output drains and the exit watcher
//! are separate tasks that only write through that mutex and never hold it
//! across an await.

mod error;
mod logs;

pub use error::RunnerError;
pub use logs::{LogBuffer, MAX_LOG_LINES};

use crate::api::types::TunnelDetail;
use crate::api::{ApiError, CenterApi};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Grace period between the interrupt and the force kill.
pub const STOP_TIMEOUT: Duration = Duration::from_secs(3);
const STOP_POLL_INTERVAL: Duration = Duration::from_millis(100);
/// How long `stop` waits for the exit watcher after a force kill.
const KILL_WAIT: Duration = Duration::from_secs(1);
/// Tunnels fetched when picking a default.
const TUNNEL_LOOKUP_LIMIT: u32 = 100;

/// Where launch credentials come from.
#[async_trait]
pub trait TunnelSource: Send + Sync {
    /// Name of the account's first tunnel, if it has any.
    async fn first_tunnel_name(&self) -> Result<Option<String>, ApiError>;

    async fn tunnel_detail(&self, name: &str) -> Result<Option<TunnelDetail>, ApiError>;
}

#[async_trait]
impl TunnelSource for CenterApi {
    async fn first_tunnel_name(&self) -> Result<Option<String>, ApiError> {
        let tunnels = self.tunnels(1, TUNNEL_LOOKUP_LIMIT).await?;
        Ok(tunnels.list.first().map(|t| t.name.trim().to_string()))
    }

    async fn tunnel_detail(&self, name: &str) -> Result<Option<TunnelDetail>, ApiError> {
        CenterApi::tunnel_detail(self, name).await
    }
}

/// Mask the token half of an `id:token` launch argument.
///
/// Keeps the first and last four characters of tokens longer than eight.
#[must_use]
pub fn mask_token_arg(arg: &str) -> String {
    let Some((id, token)) = arg.split_once(':') else {
        return arg.to_string();
    };

    let token: Vec<char> = token.trim().chars().collect();
    if token.len() <= 8 {
        return format!("{id}:***");
    }
    let head: String = token[..4].iter().collect();
    let tail: String = token[token.len() - 4..].iter().collect();
    format!("{id}:{head}***{tail}")
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    #[default]
    Stopped,
    Starting,
    Running,
    Stopping,
}

/// Point-in-time copy of the supervisor state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RuntimeStatus {
    pub running: bool,
    pub phase: Phase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    pub tunnel_name: String,
    pub node_address: String,
    /// Launch command with the token masked.
    pub command: String,
    pub last_error: String,
    pub log_lines: Vec<String>,
}

/// Supervisor state. Details of the last run stay until the next start.
#[derive(Debug, Default)]
pub struct RunnerState {
    phase: Phase,
    /// Bumped on every launch so stale tasks can tell they are stale.
    generation: u64,
    pid: Option<u32>,
    /// Cancelling this kills the running process.
    kill: Option<CancellationToken>,
    started_at: Option<DateTime<Utc>>,
    tunnel_name: String,
    node_address: String,
    command: String,
    last_error: String,
    logs: LogBuffer,
    /// Set by `stop` so the exit watcher does not report a failure.
    stopping: bool,
}

impl RunnerState {
    fn snapshot(&self) -> RuntimeStatus {
        RuntimeStatus {
            running: matches!(self.phase, Phase::Running | Phase::Stopping),
            phase: self.phase,
            pid: self.pid,
            started_at: self
                .started_at
                .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true)),
            tunnel_name: self.tunnel_name.clone(),
            node_address: self.node_address.clone(),
            command: self.command.clone(),
            last_error: self.last_error.clone(),
            log_lines: self.logs.to_vec(),
        }
    }
}

struct Shared {
    state: Mutex<RunnerState>,
    phase_tx: watch::Sender<Phase>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, RunnerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_phase(&self, state: &mut RunnerState, phase: Phase) {
        state.phase = phase;
        self.phase_tx.send_replace(phase);
    }
}

/// Reverts `Starting` to `Stopped` if a start attempt bails out early.
struct StartingGuard<'a> {
    shared: &'a Shared,
    armed: bool,
}

impl Drop for StartingGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut state = self.shared.lock();
        if state.phase == Phase::Starting {
            self.shared.set_phase(&mut state, Phase::Stopped);
        }
    }
}

pub struct Supervisor {
    source: Arc<dyn TunnelSource>,
    binary_path: PathBuf,
    shared: Arc<Shared>,
    shutdown: CancellationToken,
    stop_timeout: Duration,
}

impl std::fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Supervisor")
            .field("binary_path", &self.binary_path)
            .field("phase", &self.shared.lock().phase)
            .finish_non_exhaustive()
    }
}

impl Supervisor {
    /// `shutdown` is the host's root token; cancelling it kills the process.
    pub fn new(
        source: Arc<dyn TunnelSource>,
        binary_path: impl Into<PathBuf>,
        shutdown: CancellationToken,
    ) -> Self {
        let (phase_tx, _) = watch::channel(Phase::Stopped);
        Self {
            source,
            binary_path: binary_path.into(),
            shared: Arc::new(Shared {
                state: Mutex::new(RunnerState::default()),
                phase_tx,
            }),
            shutdown,
            stop_timeout: STOP_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout = timeout;
        self
    }

    #[must_use]
    pub fn status(&self) -> RuntimeStatus {
        self.shared.lock().snapshot()
    }

    /// Watch phase changes, e.g. to wait for the process to exit.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Phase> {
        self.shared.phase_tx.subscribe()
    }

    /// Launch the tunnel client for `tunnel` (or the account's first tunnel).
    ///
    /// On success the returned status already shows the process as running.
    pub async fn start(&self, tunnel: Option<&str>) -> Result<RuntimeStatus, RunnerError> {
        let mut guard = {
            let mut state = self.shared.lock();
            if state.phase != Phase::Stopped {
                return Err(RunnerError::AlreadyRunning);
            }
            self.shared.set_phase(&mut state, Phase::Starting);
            StartingGuard {
                shared: &self.shared,
                armed: true,
            }
        };

        let name = match tunnel.map(str::trim).filter(|n| !n.is_empty()) {
            Some(name) => name.to_string(),
            None => self
                .source
                .first_tunnel_name()
                .await?
                .ok_or(RunnerError::NoTunnels)?,
        };
        if name.is_empty() {
            return Err(RunnerError::InvalidTunnelName);
        }

        let detail = self
            .source
            .tunnel_detail(&name)
            .await?
            .ok_or_else(|| RunnerError::DetailUnavailable(name.clone()))?;
        if detail.id <= 0 {
            return Err(RunnerError::MissingTunnelId(name));
        }
        let token = detail.tunnel_token.trim();
        if token.is_empty() {
            return Err(RunnerError::MissingTunnelToken(name));
        }
        let token_arg = format!("{}:{token}", detail.id);

        if !self.binary_path.is_file() {
            return Err(RunnerError::NotInstalled(self.binary_path.clone()));
        }

        let mut child = crate::frpc::background_command(&self.binary_path)
            .arg("-t")
            .arg(&token_arg)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| RunnerError::Spawn {
                path: self.binary_path.clone(),
                source,
            })?;
        let pid = child.id();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let kill = self.shutdown.child_token();
        let command = format!("{} -t {}", self.binary_path.display(), mask_token_arg(&token_arg));

        let (generation, status) = {
            let mut state = self.shared.lock();
            state.generation += 1;
            state.pid = pid;
            state.kill = Some(kill.clone());
            state.started_at = Some(Utc::now());
            state.tunnel_name = if detail.name.trim().is_empty() {
                name.clone()
            } else {
                detail.name.clone()
            };
            state.node_address.clone_from(&detail.node_address);
            state.command = command;
            state.last_error.clear();
            state.stopping = false;
            state.logs.clear();
            state
                .logs
                .push(format!("[runner] started: pid={}", pid.unwrap_or_default()));
            self.shared.set_phase(&mut state, Phase::Running);
            guard.armed = false;
            (state.generation, state.snapshot())
        };
        info!(pid, tunnel = %status.tunnel_name, command = %status.command, "Tunnel client started");

        if let Some(stdout) = stdout {
            tokio::spawn(drain_output(Arc::clone(&self.shared), stdout, generation));
        }
        if let Some(stderr) = stderr {
            tokio::spawn(drain_output(Arc::clone(&self.shared), stderr, generation));
        }
        tokio::spawn(watch_exit(Arc::clone(&self.shared), child, kill, generation));

        Ok(status)
    }

    /// Stop the running process: interrupt, wait up to the grace period, then
    /// kill. Stopping when nothing runs just returns the current status.
    pub async fn stop(&self) -> RuntimeStatus {
        let (pid, kill, generation) = {
            let mut state = self.shared.lock();
            if state.phase != Phase::Running {
                return state.snapshot();
            }
            state.stopping = true;
            self.shared.set_phase(&mut state, Phase::Stopping);
            (state.pid, state.kill.clone(), state.generation)
        };
        info!(pid, "Stopping tunnel client");

        #[cfg(unix)]
        {
            if let Some(pid) = pid {
                send_interrupt(pid);
            }
        }
        #[cfg(not(unix))]
        let _ = pid;

        let exited = if cfg!(unix) {
            self.wait_exit(generation, self.stop_timeout).await
        } else {
            false
        };

        if !exited {
            if cfg!(unix) {
                warn!(pid, "Tunnel client ignored interrupt, killing");
            }
            if let Some(kill) = kill {
                kill.cancel();
            }
            if !self.wait_exit(generation, KILL_WAIT).await {
                warn!(pid, "Tunnel client still running after kill");
            }
        }

        self.status()
    }

    /// Poll until the process of `generation` has been reaped.
    async fn wait_exit(&self, generation: u64, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            {
                let state = self.shared.lock();
                if state.generation != generation || state.phase == Phase::Stopped {
                    return true;
                }
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(STOP_POLL_INTERVAL).await;
        }
    }
}

#[cfg(unix)]
fn send_interrupt(pid: u32) {
    let Ok(raw) = libc::pid_t::try_from(pid) else {
        return;
    };
    // SAFETY: pid comes from our own live Child handle; kill(2) with SIGINT
    // has no memory-safety preconditions.
    #[allow(unsafe_code)]
    let ret = unsafe { libc::kill(raw, libc::SIGINT) };
    if ret != 0 {
        let err = std::io::Error::last_os_error();
        warn!(pid, error = %err, "Failed to send SIGINT");
    }
}

/// `exit status N`, or `signal: N` when killed by a signal.
fn describe_exit(status: ExitStatus) -> String {
    if let Some(code) = status.code() {
        return format!("exit status {code}");
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return format!("signal: {signal}");
        }
    }
    status.to_string()
}

fn push_log(shared: &Shared, generation: u64, line: String) {
    let mut state = shared.lock();
    if state.generation == generation {
        state.logs.push(line);
    }
}

async fn drain_output<R>(shared: Arc<Shared>, reader: R, generation: u64)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf).trim().to_string();
                if !line.is_empty() {
                    push_log(&shared, generation, line);
                }
            }
            Err(e) => {
                push_log(&shared, generation, format!("[runner] log read error: {e}"));
                break;
            }
        }
    }
}

async fn watch_exit(
    shared: Arc<Shared>,
    mut child: tokio::process::Child,
    kill: CancellationToken,
    generation: u64,
) {
    let result = tokio::select! {
        result = child.wait() => result,
        () = kill.cancelled() => {
            if let Err(e) = child.start_kill() {
                debug!(error = %e, "Kill after cancel failed");
            }
            child.wait().await
        }
    };

    let mut state = shared.lock();
    if state.generation != generation {
        return;
    }
    let requested = std::mem::take(&mut state.stopping) || kill.is_cancelled();

    let failure = match &result {
        Ok(status) if status.success() => None,
        Ok(status) => Some(describe_exit(*status)),
        Err(e) => Some(e.to_string()),
    };
    match failure {
        Some(reason) if !requested => {
            warn!(reason = %reason, "Tunnel client exited with error");
            state.logs.push(format!("[runner] exited with error: {reason}"));
            state.last_error = reason;
        }
        _ => {
            info!("Tunnel client exited");
            state.logs.push("[runner] exited");
        }
    }

    state.pid = None;
    state.kill = None;
    shared.set_phase(&mut state, Phase::Stopped);
}

#[cfg(test)]
mod tests;
