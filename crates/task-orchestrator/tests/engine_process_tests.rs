//! 외부 프로세스 통합 테스트
//!
//! 셸 스크립트를 엔진 실행 파일로 사용해 `TrivyEngine`의 프로세스 처리
//! (결과 파일 검증, 실패 진단, 시간 초과 시 종료 및 회수)를 검증합니다.

#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use scanward_core::types::{ScanType, TaskStatus};
use scanward_orchestrator::{
    OrchestratorConfig, ReportFormat, ScanOrchestrator, ScanOrchestratorBuilder, TaskSnapshot,
    TrivyEngine,
};

const FIXTURE: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/trivy-image.json");

/// `--output` 인자 값을 `$out`에 담는 스크립트 머리말
const PREAMBLE: &str = r#"#!/bin/sh
if [ "$1" = "--version" ]; then
  echo "Version: 0.50.1"
  exit 0
fi
out=""
while [ $# -gt 0 ]; do
  case "$1" in
    --output) out="$2"; shift 2 ;;
    *) shift ;;
  esac
done
"#;

fn write_script(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join("fake-trivy.sh");
    std::fs::write(&path, format!("{PREAMBLE}{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn build(script: &Path, results: &Path, timeout_secs: u64) -> ScanOrchestrator<TrivyEngine> {
    let config = OrchestratorConfig {
        executable: script.display().to_string(),
        engine_timeout_secs: timeout_secs,
        results_dir: results.to_path_buf(),
        ..OrchestratorConfig::default()
    };
    let engine = TrivyEngine::new(config.executable.clone(), Duration::from_secs(5));
    ScanOrchestratorBuilder::new()
        .config(config)
        .engine(engine)
        .build()
        .unwrap()
}

async fn wait(orch: &ScanOrchestrator<TrivyEngine>, id: &scanward_orchestrator::TaskId) -> TaskSnapshot {
    tokio::time::timeout(
        Duration::from_secs(20),
        orch.wait_until_terminal(id, Duration::from_millis(20)),
    )
    .await
    .expect("task did not finish in time")
    .unwrap()
}

#[tokio::test]
async fn successful_process_completes_task() {
    let dir = tempfile::tempdir().unwrap();
    let script = write_script(dir.path(), &format!("cat '{FIXTURE}' > \"$out\""));
    let results = dir.path().join("results");
    let orch = build(&script, &results, 30);

    let id = orch.submit(ScanType::Image, "nginx:latest").await.unwrap();
    let snapshot = wait(&orch, &id).await;

    assert_eq!(snapshot.status, TaskStatus::Completed);
    assert_eq!(snapshot.stats.unwrap().total, 6);
    assert!(results.join(format!("{id}.json")).exists());

    let raw = orch
        .get_report(&id.to_string(), ReportFormat::Raw)
        .await
        .unwrap();
    let value: serde_json::Value = serde_json::from_slice(&raw.bytes).unwrap();
    assert_eq!(value["ArtifactName"], "nginx:latest");
    orch.shutdown().await;
}

#[tokio::test]
async fn failing_process_reports_stderr() {
    let dir = tempfile::tempdir().unwrap();
    let script = write_script(
        dir.path(),
        "echo 'FATAL image not found: ghost:latest' >&2\nexit 1",
    );
    let orch = build(&script, &dir.path().join("results"), 30);

    let id = orch.submit(ScanType::Image, "ghost:latest").await.unwrap();
    let snapshot = wait(&orch, &id).await;

    assert_eq!(snapshot.status, TaskStatus::Failed);
    let error = snapshot.error.unwrap();
    assert!(error.contains("image not found"), "unexpected error: {error}");
}

#[tokio::test]
async fn empty_output_fails_task() {
    let dir = tempfile::tempdir().unwrap();
    let script = write_script(dir.path(), ": > \"$out\"");
    let orch = build(&script, &dir.path().join("results"), 30);

    let id = orch.submit(ScanType::Image, "alpine:3.18").await.unwrap();
    let snapshot = wait(&orch, &id).await;

    assert_eq!(snapshot.status, TaskStatus::Failed);
    assert!(snapshot.error.is_some());
    assert!(snapshot.stats.is_none());
}

#[tokio::test]
async fn malformed_output_fails_task() {
    let dir = tempfile::tempdir().unwrap();
    let script = write_script(dir.path(), "echo '{\"Results\": [' > \"$out\"");
    let orch = build(&script, &dir.path().join("results"), 30);

    let id = orch.submit(ScanType::Image, "alpine:3.18").await.unwrap();
    let snapshot = wait(&orch, &id).await;
    assert_eq!(snapshot.status, TaskStatus::Failed);
}

#[tokio::test]
async fn timeout_kills_and_reaps_process() {
    let dir = tempfile::tempdir().unwrap();
    let pid_file = dir.path().join("engine.pid");
    let script = write_script(
        dir.path(),
        &format!("echo $$ > '{}'\nexec sleep 30", pid_file.display()),
    );
    let orch = build(&script, &dir.path().join("results"), 1);

    let id = orch.submit(ScanType::Image, "huge:latest").await.unwrap();
    let snapshot = wait(&orch, &id).await;

    assert_eq!(snapshot.status, TaskStatus::TimedOut);
    assert_eq!(
        snapshot.error.as_deref(),
        Some("scan timed out after 1 seconds")
    );

    let pid = std::fs::read_to_string(&pid_file).unwrap();
    let alive = std::process::Command::new("kill")
        .arg("-0")
        .arg(pid.trim())
        .stderr(std::process::Stdio::null())
        .status()
        .unwrap()
        .success();
    assert!(!alive, "engine process {} still running", pid.trim());
}

/// 종료되었거나 좀비 상태인 프로세스는 살아있지 않은 것으로 봅니다.
fn process_alive(pid: &str) -> bool {
    let output = std::process::Command::new("ps")
        .args(["-o", "stat=", "-p", pid])
        .output()
        .unwrap();
    let stat = String::from_utf8_lossy(&output.stdout);
    let stat = stat.trim();
    !stat.is_empty() && !stat.starts_with('Z')
}

#[tokio::test]
async fn timeout_kills_engine_subprocesses() {
    let dir = tempfile::tempdir().unwrap();
    let pid_file = dir.path().join("child.pid");
    let script = write_script(
        dir.path(),
        &format!("sleep 30 &\necho $! > '{}'\nwait", pid_file.display()),
    );
    let orch = build(&script, &dir.path().join("results"), 1);

    let id = orch.submit(ScanType::Image, "huge:latest").await.unwrap();
    let snapshot = wait(&orch, &id).await;
    assert_eq!(snapshot.status, TaskStatus::TimedOut);

    let pid = std::fs::read_to_string(&pid_file).unwrap();
    let pid = pid.trim();
    let mut alive = process_alive(pid);
    for _ in 0..50 {
        if !alive {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
        alive = process_alive(pid);
    }
    assert!(!alive, "engine subprocess {pid} still running");
}

#[tokio::test]
async fn repo_scan_uses_repo_subcommand() {
    let dir = tempfile::tempdir().unwrap();
    let args_file = dir.path().join("args.txt");
    let script_body = format!(
        "cat '{FIXTURE}' > \"$out\"",
    );
    // 머리말이 인자를 소비하기 전에 기록
    let path = dir.path().join("fake-trivy.sh");
    std::fs::write(
        &path,
        format!(
            "#!/bin/sh\necho \"$@\" > '{}'\n{}{}\n",
            args_file.display(),
            PREAMBLE.trim_start_matches("#!/bin/sh\n"),
            script_body
        ),
    )
    .unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    let orch = build(&path, &dir.path().join("results"), 30);

    let id = orch
        .submit(ScanType::Repo, "https://github.com/org/repo")
        .await
        .unwrap();
    assert_eq!(wait(&orch, &id).await.status, TaskStatus::Completed);

    let args = std::fs::read_to_string(&args_file).unwrap();
    assert!(args.starts_with("repo https://github.com/org/repo --format json --output "));
    assert!(args.contains("--severity CRITICAL,HIGH,MEDIUM,LOW"));
    orch.shutdown().await;
}

#[tokio::test]
async fn health_reports_engine_version() {
    let dir = tempfile::tempdir().unwrap();
    let script = write_script(dir.path(), "exit 0");
    let orch = build(&script, &dir.path().join("results"), 30);

    let health = orch.health().await;
    assert!(health.engine_available);
    assert_eq!(health.engine_version.as_deref(), Some("0.50.1"));
}

#[tokio::test]
async fn missing_executable_is_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let orch = build(
        &dir.path().join("does-not-exist"),
        &dir.path().join("results"),
        30,
    );
    let health = orch.health().await;
    assert!(!health.engine_available);
    assert!(health.status.is_unhealthy());
}
