use super::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

#[test]
fn test_mask_token_arg() {
    assert_eq!(mask_token_arg("42:abcdefghijklmnop"), "42:abcd***mnop");
    assert_eq!(mask_token_arg("42:short"), "42:***");
    assert_eq!(mask_token_arg("42:12345678"), "42:***");
    assert_eq!(mask_token_arg("42:"), "42:***");
    assert_eq!(mask_token_arg("no-separator"), "no-separator");
}

#[test]
fn test_snapshot_running_flag_follows_phase() {
    let mut state = RunnerState::default();
    assert!(!state.snapshot().running);
    state.phase = Phase::Starting;
    assert!(!state.snapshot().running);
    state.phase = Phase::Stopping;
    assert!(state.snapshot().running);
}

#[derive(Default)]
struct FakeSource {
    tunnels: Vec<String>,
    detail: Option<TunnelDetail>,
    detail_calls: AtomicUsize,
    requested: Mutex<Vec<String>>,
}

#[async_trait]
impl TunnelSource for FakeSource {
    async fn first_tunnel_name(&self) -> Result<Option<String>, ApiError> {
        Ok(self.tunnels.first().cloned())
    }

    async fn tunnel_detail(&self, name: &str) -> Result<Option<TunnelDetail>, ApiError> {
        self.detail_calls.fetch_add(1, Ordering::SeqCst);
        self.requested.lock().unwrap().push(name.to_string());
        Ok(self.detail.clone())
    }
}

fn detail(id: i64, token: &str) -> TunnelDetail {
    TunnelDetail {
        id,
        name: "web".into(),
        node_address: "hk-1.example:7000".into(),
        tunnel_token: token.into(),
        ..TunnelDetail::default()
    }
}

fn source_with(detail: TunnelDetail) -> Arc<FakeSource> {
    Arc::new(FakeSource {
        tunnels: vec!["web".into(), "ssh".into()],
        detail: Some(detail),
        ..FakeSource::default()
    })
}

#[tokio::test]
async fn test_stop_when_stopped_is_noop() {
    let supervisor = Supervisor::new(
        Arc::new(FakeSource::default()),
        "/nonexistent/frpc",
        CancellationToken::new(),
    );
    let status = supervisor.stop().await;
    assert!(!status.running);
    assert_eq!(status.phase, Phase::Stopped);
    assert!(status.log_lines.is_empty());
}

#[tokio::test]
async fn test_missing_id_or_token_fails_fast() {
    let dir = TempDir::new().unwrap();
    let binary = dir.path().join("frpc");
    std::fs::write(&binary, "").unwrap();

    let supervisor = Supervisor::new(source_with(detail(0, "abcdefghijkl")), &binary, CancellationToken::new());
    let err = supervisor.start(Some("web")).await.unwrap_err();
    assert!(matches!(err, RunnerError::MissingTunnelId(ref name) if name == "web"));
    assert_eq!(supervisor.status().phase, Phase::Stopped);

    let supervisor = Supervisor::new(source_with(detail(42, "   ")), &binary, CancellationToken::new());
    let err = supervisor.start(Some("web")).await.unwrap_err();
    assert!(matches!(err, RunnerError::MissingTunnelToken(_)));
    let status = supervisor.status();
    assert_eq!(status.phase, Phase::Stopped);
    assert!(status.pid.is_none());
    assert!(status.log_lines.is_empty());
}

#[tokio::test]
async fn test_not_installed() {
    let supervisor = Supervisor::new(
        source_with(detail(42, "abcdefghijklmnop")),
        "/nonexistent/frpc",
        CancellationToken::new(),
    );
    let err = supervisor.start(Some("web")).await.unwrap_err();
    assert!(matches!(err, RunnerError::NotInstalled(_)));
    assert_eq!(supervisor.status().phase, Phase::Stopped);
}

#[tokio::test]
async fn test_no_tunnels() {
    let supervisor = Supervisor::new(Arc::new(FakeSource::default()), "/nonexistent/frpc", CancellationToken::new());
    let err = supervisor.start(None).await.unwrap_err();
    assert!(matches!(err, RunnerError::NoTunnels));

    // A blank name counts as "pick one".
    let err = supervisor.start(Some("  ")).await.unwrap_err();
    assert!(matches!(err, RunnerError::NoTunnels));
}

#[cfg(unix)]
mod process {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use std::path::Path;

    fn write_script(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("frpc");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    async fn wait_until(supervisor: &Supervisor, mut done: impl FnMut(&RuntimeStatus) -> bool) -> RuntimeStatus {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
        loop {
            let status = supervisor.status();
            if done(&status) || tokio::time::Instant::now() >= deadline {
                return status;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    #[tokio::test]
    async fn test_start_stop_lifecycle() {
        let dir = TempDir::new().unwrap();
        let binary = write_script(dir.path(), "echo \"frpc up\"\necho \"to stderr\" >&2\nexec sleep 30");
        let source = source_with(detail(42, "abcdefghijklmnop"));
        let supervisor = Supervisor::new(source.clone(), &binary, CancellationToken::new());

        let status = supervisor.start(None).await.unwrap();
        assert!(status.running);
        assert_eq!(status.phase, Phase::Running);
        let pid = status.pid.unwrap();
        assert_eq!(status.log_lines, vec![format!("[runner] started: pid={pid}")]);
        assert_eq!(status.command, format!("{} -t 42:abcd***mnop", binary.display()));
        assert_eq!(status.tunnel_name, "web");
        assert_eq!(status.node_address, "hk-1.example:7000");
        assert!(status.started_at.is_some());
        assert_eq!(source.requested.lock().unwrap().as_slice(), ["web"]);

        let status = wait_until(&supervisor, |s| s.log_lines.len() >= 3).await;
        assert!(status.log_lines.contains(&"frpc up".to_string()));
        assert!(status.log_lines.contains(&"to stderr".to_string()));

        let err = supervisor.start(Some("web")).await.unwrap_err();
        assert!(matches!(err, RunnerError::AlreadyRunning));
        assert_eq!(source.detail_calls.load(Ordering::SeqCst), 1);
        assert_eq!(supervisor.status().pid, Some(pid));

        let status = supervisor.stop().await;
        assert!(!status.running);
        assert_eq!(status.phase, Phase::Stopped);
        assert!(status.pid.is_none());
        assert!(status.last_error.is_empty());
        assert_eq!(status.log_lines.last().unwrap(), "[runner] exited");
        // Details of the last run remain visible.
        assert_eq!(status.tunnel_name, "web");
    }

    #[tokio::test]
    async fn test_unexpected_exit_records_error() {
        let dir = TempDir::new().unwrap();
        let binary = write_script(dir.path(), "echo \"bad config\"\nexit 3");
        let supervisor = Supervisor::new(source_with(detail(7, "abcdefghijklmnop")), &binary, CancellationToken::new());

        supervisor.start(Some("web")).await.unwrap();
        let status = wait_until(&supervisor, |s| s.phase == Phase::Stopped).await;

        assert!(!status.running);
        assert_eq!(status.last_error, "exit status 3");
        assert!(
            status
                .log_lines
                .contains(&"[runner] exited with error: exit status 3".to_string())
        );

        // A fresh start is allowed after the exit.
        let status = supervisor.start(Some("web")).await.unwrap();
        assert!(status.last_error.is_empty());
        assert_eq!(status.log_lines.len(), 1);
    }

    #[tokio::test]
    async fn test_stop_escalates_to_kill() {
        let dir = TempDir::new().unwrap();
        let binary = write_script(dir.path(), "trap '' INT\nexec sleep 30");
        let supervisor = Supervisor::new(source_with(detail(7, "abcdefghijklmnop")), &binary, CancellationToken::new())
            .with_stop_timeout(Duration::from_millis(300));

        supervisor.start(Some("web")).await.unwrap();
        let started = tokio::time::Instant::now();
        let status = supervisor.stop().await;

        assert!(!status.running);
        assert!(status.last_error.is_empty());
        assert_eq!(status.log_lines.last().unwrap(), "[runner] exited");
        assert!(started.elapsed() >= Duration::from_millis(300));
    }

    #[tokio::test]
    async fn test_log_ring_keeps_last_lines() {
        let dir = TempDir::new().unwrap();
        let binary = write_script(
            dir.path(),
            "i=0\nwhile [ $i -lt 350 ]; do echo \"line $i\"; i=$((i+1)); done\nexec sleep 30",
        );
        let supervisor = Supervisor::new(source_with(detail(7, "abcdefghijklmnop")), &binary, CancellationToken::new());

        supervisor.start(Some("web")).await.unwrap();
        let status = wait_until(&supervisor, |s| s.log_lines.last().is_some_and(|l| l == "line 349")).await;

        assert_eq!(status.log_lines.len(), MAX_LOG_LINES);
        assert_eq!(status.log_lines[0], "line 50");
        supervisor.stop().await;
    }

    #[tokio::test]
    async fn test_host_shutdown_kills_process() {
        let dir = TempDir::new().unwrap();
        let binary = write_script(dir.path(), "exec sleep 30");
        let shutdown = CancellationToken::new();
        let supervisor = Supervisor::new(source_with(detail(7, "abcdefghijklmnop")), &binary, shutdown.clone());

        supervisor.start(Some("web")).await.unwrap();
        let mut phases = supervisor.subscribe();
        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(5), phases.wait_for(|p| *p == Phase::Stopped))
            .await
            .unwrap()
            .unwrap();

        let status = supervisor.status();
        assert!(status.last_error.is_empty());
        assert_eq!(status.log_lines.last().unwrap(), "[runner] exited");
    }
}
