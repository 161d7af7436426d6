//! 에러 타입 — 도메인별 에러 정의

/// Scanward 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum ScanwardError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 스캔 작업 에러
    #[error("scan error: {0}")]
    Scan(#[from] ScanError),

    /// 보고서 생성 에러
    #[error("report error: {0}")]
    Report(#[from] ReportError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 스캔 작업 에러
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    /// 요청 검증 실패 (작업이 생성되지 않음)
    #[error("invalid scan request: {0}")]
    InvalidRequest(String),

    /// 외부 엔진 실행 실패
    #[error("engine execution failed: {0}")]
    ExecutionFailed(String),

    /// 외부 엔진 시간 초과
    #[error("engine timed out after {0} seconds")]
    Timeout(u64),

    /// 엔진 결과 파싱 실패
    #[error("result parse failed: {0}")]
    ParseFailed(String),

    /// 작업 또는 산출물을 찾을 수 없음
    #[error("not found: {0}")]
    NotFound(String),

    /// 작업이 아직 완료되지 않음
    #[error("not ready: {0}")]
    NotReady(String),

    /// 동시 실행 한도 초과
    #[error("busy: {0}")]
    Busy(String),
}

/// 보고서 생성 에러
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    /// 렌더링 실패
    #[error("render failed ({format}): {reason}")]
    RenderFailed { format: String, reason: String },

    /// 산출물 저장 실패
    #[error("artifact write failed: {0}")]
    WriteFailed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_converts_to_top_level() {
        let err: ScanwardError = ConfigError::InvalidValue {
            field: "engine.timeout_secs".to_owned(),
            reason: "must be greater than 0".to_owned(),
        }
        .into();
        assert!(matches!(err, ScanwardError::Config(_)));
        assert!(err.to_string().contains("engine.timeout_secs"));
    }

    #[test]
    fn scan_timeout_display() {
        let err = ScanError::Timeout(600);
        assert_eq!(err.to_string(), "engine timed out after 600 seconds");
    }

    #[test]
    fn report_error_display_includes_format() {
        let err = ReportError::RenderFailed {
            format: "pdf".to_owned(),
            reason: "empty document".to_owned(),
        };
        let msg = err.to_string();
        assert!(msg.contains("pdf"));
        assert!(msg.contains("empty document"));
    }

    #[test]
    fn io_error_converts() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: ScanwardError = io_err.into();
        assert!(matches!(err, ScanwardError::Io(_)));
    }
}
