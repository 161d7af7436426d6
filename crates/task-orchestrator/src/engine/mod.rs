//! 스캔 엔진 추상화
//!
//! [`ScanEngine`] trait은 외부 스캐너 실행을 추상화합니다.
//! 운영 코드는 [`TrivyEngine`](trivy::TrivyEngine)을, 테스트는 `MockEngine`을 사용합니다.
//!
//! ```text
//! ┌──────────────────┐
//! │ ScanOrchestrator │
//! └────────┬─────────┘
//!          ▼
//!   ┌────────────┐
//!   │ ScanEngine │ (trait)
//!   └────────────┘
//!      │      │
//!      ▼      ▼
//!  ┌─────┐ ┌────┐
//!  │Trivy│ │Mock│
//!  └──┬──┘ └────┘
//!     ▼
//!  external process --> <results_dir>/<id>.json
//! ```

pub mod trivy;

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use scanward_core::types::{ScanType, Severity};

use crate::error::OrchestratorError;

/// 에러 메시지에 포함할 stderr 최대 길이 (바이트)
pub const STDERR_CAPTURE_LIMIT: usize = 4096;

/// 요청별 스캔 옵션
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanOptions {
    /// 엔진에 요청할 심각도 목록
    pub severities: Vec<Severity>,
    /// 취약점 DB 업데이트 생략
    pub skip_update: bool,
    /// 수정 버전이 없는 취약점 제외
    pub ignore_unfixed: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            severities: Severity::ALL.to_vec(),
            skip_update: false,
            ignore_unfixed: false,
        }
    }
}

impl ScanOptions {
    /// `--severity` 인자 값 (`CRITICAL,HIGH,...`), 중복 제거 후 높은 심각도 순
    pub fn severity_arg(&self) -> String {
        let mut levels = self.severities.clone();
        levels.sort_unstable_by(|a, b| b.cmp(a));
        levels.dedup();
        levels
            .iter()
            .map(|s| s.as_engine_str())
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// 엔진 실행 요청
#[derive(Debug, Clone)]
pub struct EngineRequest {
    /// 작업 ID (로그용)
    pub task_id: String,
    /// 스캔 유형
    pub scan_type: ScanType,
    /// 검증된 스캔 대상
    pub target: String,
    /// 결과 파일 경로 (`<results_dir>/<id>.json`)
    pub output_path: PathBuf,
    /// 실행 제한 시간
    pub timeout: Duration,
    /// 스캔 옵션
    pub options: ScanOptions,
}

/// 엔진 실행 산출물
#[derive(Debug, Clone)]
pub struct ScanArtifact {
    /// 결과 파일 경로
    pub path: PathBuf,
    /// 파싱된 원본 결과
    pub raw: serde_json::Value,
    /// 프로세스 종료 코드 (시그널 종료 시 None)
    pub exit_code: Option<i32>,
}

/// 외부 스캔 엔진 trait
///
/// `Send + Sync + 'static`이므로 실행 단위 간에 `Arc`로 공유할 수 있습니다.
///
/// # 구현 규칙
///
/// - `run()`은 `request.timeout` 안에 반환해야 하며, 초과 시 프로세스를 종료하고
///   `OrchestratorError::ScanTimeout`을 반환합니다.
/// - 결과 파일은 존재하고, 비어있지 않고, JSON으로 파싱되어야 합니다.
///   그렇지 않으면 `ScanExecution` 또는 `ResultParse`를 반환합니다.
/// - 결과 파일을 삭제하지 않습니다.
pub trait ScanEngine: Send + Sync + 'static {
    /// 엔진 이름
    fn name(&self) -> &str;

    /// 스캔을 실행하고 검증된 산출물을 반환합니다.
    fn run(
        &self,
        request: &EngineRequest,
    ) -> impl Future<Output = Result<ScanArtifact, OrchestratorError>> + Send;

    /// 엔진 버전을 확인합니다. 실행할 수 없으면 에러를 반환합니다.
    fn version(&self) -> impl Future<Output = Result<String, OrchestratorError>> + Send;
}

/// 엔진이 남긴 결과 파일을 검증하고 JSON으로 읽습니다.
///
/// `diagnostic`은 파일이 없거나 비어 있을 때 에러 메시지에 덧붙입니다.
pub async fn load_artifact(
    path: &Path,
    diagnostic: &str,
) -> Result<serde_json::Value, OrchestratorError> {
    let metadata = match tokio::fs::metadata(path).await {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(OrchestratorError::ScanExecution(with_diagnostic(
                "engine produced no output file",
                diagnostic,
            )));
        }
        Err(e) => {
            return Err(OrchestratorError::Io {
                path: path.display().to_string(),
                source: e,
            });
        }
    };

    if metadata.len() == 0 {
        return Err(OrchestratorError::ScanExecution(with_diagnostic(
            "engine produced an empty output file",
            diagnostic,
        )));
    }

    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| OrchestratorError::Io {
            path: path.display().to_string(),
            source: e,
        })?;

    serde_json::from_slice(&bytes).map_err(|e| {
        OrchestratorError::ResultParse(format!("{}: {e}", path.display()))
    })
}

fn with_diagnostic(message: &str, diagnostic: &str) -> String {
    let diagnostic = diagnostic.trim();
    if diagnostic.is_empty() {
        message.to_owned()
    } else {
        format!("{message}: {diagnostic}")
    }
}

/// 테스트용 Mock 엔진
///
/// 설정된 JSON을 결과 파일로 기록하거나 지정된 에러를 반환합니다.
#[cfg(test)]
pub struct MockEngine {
    /// 결과 파일에 기록할 내용
    pub output: Option<String>,
    /// 실행 지연
    pub delay: Duration,
    /// 반환할 실행 실패 메시지
    pub fail_with: Option<String>,
}

#[cfg(test)]
impl MockEngine {
    pub fn with_output(output: impl Into<String>) -> Self {
        Self {
            output: Some(output.into()),
            delay: Duration::ZERO,
            fail_with: None,
        }
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            output: None,
            delay: Duration::ZERO,
            fail_with: Some(message.into()),
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[cfg(test)]
impl ScanEngine for MockEngine {
    fn name(&self) -> &str {
        "mock"
    }

    async fn run(&self, request: &EngineRequest) -> Result<ScanArtifact, OrchestratorError> {
        if tokio::time::timeout(request.timeout, tokio::time::sleep(self.delay))
            .await
            .is_err()
        {
            return Err(OrchestratorError::ScanTimeout {
                secs: request.timeout.as_secs(),
            });
        }
        if let Some(msg) = &self.fail_with {
            return Err(OrchestratorError::ScanExecution(msg.clone()));
        }
        if let Some(output) = &self.output {
            tokio::fs::write(&request.output_path, output)
                .await
                .map_err(|e| OrchestratorError::Io {
                    path: request.output_path.display().to_string(),
                    source: e,
                })?;
        }
        let raw = load_artifact(&request.output_path, "").await?;
        Ok(ScanArtifact {
            path: request.output_path.clone(),
            raw,
            exit_code: Some(0),
        })
    }

    async fn version(&self) -> Result<String, OrchestratorError> {
        Ok("mock 1.0.0".to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_arg_orders_and_dedups() {
        let options = ScanOptions {
            severities: vec![Severity::Low, Severity::Critical, Severity::Low],
            ..ScanOptions::default()
        };
        assert_eq!(options.severity_arg(), "CRITICAL,LOW");
    }

    #[test]
    fn default_options_request_all_levels() {
        assert_eq!(
            ScanOptions::default().severity_arg(),
            "CRITICAL,HIGH,MEDIUM,LOW"
        );
    }

    #[tokio::test]
    async fn load_artifact_missing_file_is_execution_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_artifact(&dir.path().join("none.json"), "image not found")
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::ScanExecution(_)));
        assert!(err.to_string().contains("image not found"));
    }

    #[tokio::test]
    async fn load_artifact_empty_file_is_execution_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.json");
        tokio::fs::write(&path, b"").await.unwrap();
        let err = load_artifact(&path, "").await.unwrap_err();
        assert!(matches!(err, OrchestratorError::ScanExecution(_)));
        assert!(err.to_string().contains("empty output file"));
    }

    #[tokio::test]
    async fn load_artifact_invalid_json_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        tokio::fs::write(&path, b"{not json").await.unwrap();
        let err = load_artifact(&path, "").await.unwrap_err();
        assert!(matches!(err, OrchestratorError::ResultParse(_)));
    }

    #[tokio::test]
    async fn load_artifact_valid_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ok.json");
        tokio::fs::write(&path, br#"{"Results":[]}"#).await.unwrap();
        let value = load_artifact(&path, "").await.unwrap();
        assert!(value["Results"].is_array());
    }

    #[tokio::test]
    async fn mock_engine_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let engine = MockEngine::with_output("{}").delayed(Duration::from_secs(5));
        let request = EngineRequest {
            task_id: "t".to_owned(),
            scan_type: ScanType::Image,
            target: "alpine:3.18".to_owned(),
            output_path: dir.path().join("t.json"),
            timeout: Duration::from_millis(20),
            options: ScanOptions::default(),
        };
        let err = engine.run(&request).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::ScanTimeout { .. }));
    }
}
