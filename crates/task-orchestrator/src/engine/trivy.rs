//! Trivy 프로세스 어댑터
//!
//! 외부 `trivy` 실행 파일을 제한 시간 안에서 실행하고 결과 파일을 검증합니다.
//!
//! # 명령 형식
//!
//! ```text
//! trivy <image|repo> <target> --format json --output <results_dir>/<id>.json \
//!       --severity CRITICAL,HIGH,MEDIUM,LOW [--skip-update] [--ignore-unfixed]
//! ```
//!
//! 엔진은 자체 프로세스 그룹에서 실행됩니다. 시간 초과 시 그룹 전체를 종료하고
//! 직계 자식을 회수(reap)한 뒤 `ScanTimeout`을 반환합니다.

use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tracing::{debug, warn};

use crate::engine::{EngineRequest, STDERR_CAPTURE_LIMIT, ScanArtifact, ScanEngine, load_artifact};
use crate::error::OrchestratorError;

/// 프로세스 종료 후 stderr 수집 대기 시간
const STDERR_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Trivy 엔진
#[derive(Debug, Clone)]
pub struct TrivyEngine {
    executable: String,
    version_timeout: Duration,
}

impl TrivyEngine {
    /// 실행 파일 경로와 버전 확인 제한 시간으로 엔진을 생성합니다.
    pub fn new(executable: impl Into<String>, version_timeout: Duration) -> Self {
        Self {
            executable: executable.into(),
            version_timeout,
        }
    }

    pub fn executable(&self) -> &str {
        &self.executable
    }

    fn build_command(&self, request: &EngineRequest) -> Command {
        let mut cmd = Command::new(&self.executable);
        cmd.arg(request.scan_type.subcommand())
            .arg(&request.target)
            .arg("--format")
            .arg("json")
            .arg("--output")
            .arg(&request.output_path)
            .arg("--severity")
            .arg(request.options.severity_arg());

        if request.options.skip_update {
            cmd.arg("--skip-update");
        }
        if request.options.ignore_unfixed {
            cmd.arg("--ignore-unfixed");
        }

        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);
        cmd
    }
}

impl ScanEngine for TrivyEngine {
    fn name(&self) -> &str {
        "trivy"
    }

    async fn run(&self, request: &EngineRequest) -> Result<ScanArtifact, OrchestratorError> {
        let mut cmd = self.build_command(request);
        debug!(task_id = %request.task_id, command = ?cmd, "spawning scan engine");

        let mut child = cmd.spawn().map_err(|e| {
            OrchestratorError::ScanExecution(format!(
                "failed to start '{}': {e}",
                self.executable
            ))
        })?;

        let stderr_task = child
            .stderr
            .take()
            .map(|stderr| tokio::spawn(capture_limited(stderr, STDERR_CAPTURE_LIMIT)));

        let status = match tokio::time::timeout(request.timeout, child.wait()).await {
            Ok(Ok(status)) => status,
            Ok(Err(e)) => {
                if let Some(task) = stderr_task {
                    task.abort();
                }
                return Err(OrchestratorError::ScanExecution(format!(
                    "failed to wait for engine process: {e}"
                )));
            }
            Err(_) => {
                warn!(
                    task_id = %request.task_id,
                    pid = child.id(),
                    timeout_secs = request.timeout.as_secs(),
                    "scan engine timed out, killing process"
                );
                terminate(&mut child, &request.task_id).await;
                if let Some(task) = stderr_task {
                    task.abort();
                }
                return Err(OrchestratorError::ScanTimeout {
                    secs: request.timeout.as_secs(),
                });
            }
        };

        let stderr = match stderr_task {
            Some(task) => match tokio::time::timeout(STDERR_DRAIN_TIMEOUT, task).await {
                Ok(Ok(text)) => text,
                _ => String::new(),
            },
            None => String::new(),
        };

        let exit_code = status.code();
        let diagnostic = if status.success() {
            stderr.clone()
        } else {
            format!("exit status {status}: {stderr}")
        };

        let raw = load_artifact(&request.output_path, &diagnostic).await?;

        if !status.success() {
            warn!(
                task_id = %request.task_id,
                exit_code,
                "scan engine exited with failure but produced a valid result"
            );
        }

        Ok(ScanArtifact {
            path: request.output_path.clone(),
            raw,
            exit_code,
        })
    }

    async fn version(&self) -> Result<String, OrchestratorError> {
        let output = Command::new(&self.executable)
            .arg("--version")
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.version_timeout, output)
            .await
            .map_err(|_| OrchestratorError::ScanTimeout {
                secs: self.version_timeout.as_secs(),
            })?
            .map_err(|e| {
                OrchestratorError::ScanExecution(format!(
                    "failed to start '{}': {e}",
                    self.executable
                ))
            })?;

        if !output.status.success() {
            return Err(OrchestratorError::ScanExecution(format!(
                "'{} --version' exited with {}",
                self.executable, output.status
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let version = parse_version(&stdout);
        debug!(version = %version, "scan engine found");
        Ok(version)
    }
}

/// 엔진 프로세스 그룹 전체를 종료하고 직계 자식을 회수합니다.
async fn terminate(child: &mut Child, task_id: &str) {
    #[cfg(unix)]
    if let Some(pid) = child.id() {
        match kill_process_group(pid) {
            Ok(()) => {
                if let Err(e) = child.wait().await {
                    warn!(task_id = %task_id, error = %e, "failed to reap engine process");
                }
                return;
            }
            Err(e) => {
                warn!(task_id = %task_id, pid, error = %e, "failed to kill engine process group");
            }
        }
    }

    // kill()은 종료 시그널 전송 후 프로세스 회수까지 대기
    if let Err(e) = child.kill().await {
        warn!(task_id = %task_id, error = %e, "failed to kill engine process");
    }
}

/// `process_group(0)`으로 시작한 자식은 pid가 곧 그룹 id입니다.
#[cfg(unix)]
fn kill_process_group(pid: u32) -> std::io::Result<()> {
    let pgid = libc::pid_t::try_from(pid)
        .map_err(|_| std::io::Error::new(std::io::ErrorKind::InvalidInput, "pid out of range"))?;
    // SAFETY: kill(2)은 메모리를 건드리지 않으며, 음수 pid는 프로세스 그룹을 지정합니다.
    let rc = unsafe { libc::kill(-pgid, libc::SIGKILL) };
    if rc == 0 {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error())
    }
}

/// `--version` 출력 첫 줄에서 버전 문자열을 추출합니다.
///
/// `Version: 0.50.1` 형식이면 접두사를 제거합니다.
fn parse_version(stdout: &str) -> String {
    let first = stdout.lines().map(str::trim).find(|l| !l.is_empty()).unwrap_or("");
    first
        .strip_prefix("Version:")
        .map(str::trim)
        .unwrap_or(first)
        .to_owned()
}

/// 스트림을 끝까지 읽되 처음 `limit` 바이트만 보관합니다.
async fn capture_limited<R>(mut reader: R, limit: usize) -> String
where
    R: AsyncRead + Unpin,
{
    let mut kept = Vec::with_capacity(limit.min(1024));
    let mut buf = [0u8; 1024];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                let room = limit.saturating_sub(kept.len());
                kept.extend_from_slice(&buf[..n.min(room)]);
            }
        }
    }
    String::from_utf8_lossy(&kept).trim().to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ScanOptions;
    use scanward_core::types::{ScanType, Severity};

    fn request(output: &std::path::Path) -> EngineRequest {
        EngineRequest {
            task_id: "task-1".to_owned(),
            scan_type: ScanType::Repo,
            target: "https://github.com/org/repo".to_owned(),
            output_path: output.to_path_buf(),
            timeout: Duration::from_secs(5),
            options: ScanOptions {
                severities: vec![Severity::High, Severity::Critical],
                skip_update: true,
                ignore_unfixed: true,
            },
        }
    }

    #[test]
    fn command_has_expected_arguments() {
        let engine = TrivyEngine::new("trivy", Duration::from_secs(1));
        let output = std::path::PathBuf::from("/tmp/results/task-1.json");
        let cmd = engine.build_command(&request(&output));
        let std_cmd = cmd.as_std();

        assert_eq!(std_cmd.get_program(), "trivy");
        let args: Vec<_> = std_cmd
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            vec![
                "repo",
                "https://github.com/org/repo",
                "--format",
                "json",
                "--output",
                "/tmp/results/task-1.json",
                "--severity",
                "CRITICAL,HIGH",
                "--skip-update",
                "--ignore-unfixed",
            ]
        );
    }

    #[test]
    fn parse_version_strips_prefix() {
        assert_eq!(parse_version("Version: 0.50.1\nVulnerability DB:\n"), "0.50.1");
        assert_eq!(parse_version("\n  trivy 0.49\n"), "trivy 0.49");
        assert_eq!(parse_version(""), "");
    }

    #[tokio::test]
    async fn capture_limited_truncates() {
        let data = vec![b'x'; 5000];
        let text = capture_limited(&data[..], 100).await;
        assert_eq!(text.len(), 100);
    }

    #[tokio::test]
    async fn missing_executable_is_execution_error() {
        let dir = tempfile::tempdir().unwrap();
        let engine = TrivyEngine::new(
            "/nonexistent/scanward-engine-binary",
            Duration::from_secs(1),
        );
        let err = engine
            .run(&request(&dir.path().join("x.json")))
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::ScanExecution(_)));

        assert!(engine.version().await.is_err());
    }
}
