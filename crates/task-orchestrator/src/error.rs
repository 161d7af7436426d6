//! 오케스트레이터 에러 타입
//!
//! [`OrchestratorError`]는 스캔 작업의 접수, 실행, 보고서 생성 중 발생하는
//! 모든 에러를 나타냅니다. `From<OrchestratorError> for ScanwardError` 구현을 통해
//! `?` 연산자로 상위 에러 타입으로 전파됩니다.
//!
//! # 에러 카테고리
//!
//! - **요청 검증**: `Validation` (작업이 생성되지 않음)
//! - **엔진 실행**: `ScanExecution`, `ScanTimeout`, `ResultParse` (작업 종료 상태 결정)
//! - **보고서**: `ReportGeneration` (작업 상태를 바꾸지 않음)
//! - **조회**: `NotFound`, `NotReady`
//! - **수용 한도**: `Busy`
//! - **설정 / 파일 I/O**: `Config`, `Io`

use scanward_core::error::{ConfigError, ReportError, ScanError, ScanwardError};

/// 오케스트레이터 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    /// 스캔 요청 검증 실패
    #[error("validation error: {0}")]
    Validation(String),

    /// 엔진 실행 실패 또는 결과 파일 누락 (stderr 포함)
    #[error("scan execution failed: {0}")]
    ScanExecution(String),

    /// 엔진 실행 시간 초과
    #[error("scan timed out after {secs} seconds")]
    ScanTimeout {
        /// 적용된 제한 시간 (초)
        secs: u64,
    },

    /// 엔진 결과 파싱 실패
    #[error("result parse error: {0}")]
    ResultParse(String),

    /// 보고서 렌더링 또는 저장 실패
    #[error("report generation failed ({format}): {reason}")]
    ReportGeneration {
        /// 보고서 형식 (html, pdf, raw)
        format: String,
        /// 실패 사유
        reason: String,
    },

    /// 알 수 없는 작업 또는 산출물
    #[error("not found: {0}")]
    NotFound(String),

    /// 작업이 아직 완료되지 않음
    #[error("task {task_id} is not ready (status: {status})")]
    NotReady {
        /// 작업 ID
        task_id: String,
        /// 현재 상태
        status: String,
    },

    /// 수용 한도 초과
    #[error("orchestrator busy: {active} active tasks (limit: {limit})")]
    Busy {
        /// 현재 활성 작업 수
        active: usize,
        /// 허용 한도
        limit: usize,
    },

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// 파일 I/O 에러
    #[error("io error: {path}: {source}")]
    Io {
        /// 관련 파일 경로
        path: String,
        /// 원본 I/O 에러
        source: std::io::Error,
    },
}

impl OrchestratorError {
    /// 외부 응답에 사용하는 짧은 에러 코드
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::ScanExecution(_) => "scan_execution",
            Self::ScanTimeout { .. } => "scan_timeout",
            Self::ResultParse(_) => "result_parse",
            Self::ReportGeneration { .. } => "report_generation",
            Self::NotFound(_) => "not_found",
            Self::NotReady { .. } => "not_ready",
            Self::Busy { .. } => "busy",
            Self::Config { .. } => "config",
            Self::Io { .. } => "io",
        }
    }
}

impl From<OrchestratorError> for ScanwardError {
    fn from(err: OrchestratorError) -> Self {
        match err {
            OrchestratorError::Validation(msg) => ScanwardError::Scan(ScanError::InvalidRequest(msg)),
            OrchestratorError::ScanExecution(msg) => {
                ScanwardError::Scan(ScanError::ExecutionFailed(msg))
            }
            OrchestratorError::ScanTimeout { secs } => ScanwardError::Scan(ScanError::Timeout(secs)),
            OrchestratorError::ResultParse(msg) => ScanwardError::Scan(ScanError::ParseFailed(msg)),
            OrchestratorError::ReportGeneration { format, reason } => {
                ScanwardError::Report(ReportError::RenderFailed { format, reason })
            }
            OrchestratorError::NotFound(msg) => ScanwardError::Scan(ScanError::NotFound(msg)),
            OrchestratorError::NotReady { task_id, status } => {
                ScanwardError::Scan(ScanError::NotReady(format!("{task_id} ({status})")))
            }
            OrchestratorError::Busy { active, limit } => ScanwardError::Scan(ScanError::Busy(
                format!("{active} active tasks (limit: {limit})"),
            )),
            OrchestratorError::Config { field, reason } => {
                ScanwardError::Config(ConfigError::InvalidValue { field, reason })
            }
            OrchestratorError::Io { path, source } => ScanwardError::Io(std::io::Error::new(
                source.kind(),
                format!("{path}: {source}"),
            )),
        }
    }
}
