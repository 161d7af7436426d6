//! 오케스트레이터 설정
//!
//! [`OrchestratorConfig`]는 core의 [`ScanwardConfig`]에서 엔진, 작업, 보고서 섹션을
//! 모아 타입이 지정된 형태로 변환한 설정입니다.
//!
//! # 사용 예시
//!
//! ```
//! use scanward_orchestrator::OrchestratorConfigBuilder;
//!
//! let config = OrchestratorConfigBuilder::new()
//!     .results_dir("/tmp/scanward-results")
//!     .engine_timeout_secs(120)
//!     .max_concurrent_scans(2)
//!     .build()
//!     .unwrap();
//! assert_eq!(config.engine_timeout_secs, 120);
//! ```

use std::path::PathBuf;

use scanward_core::config::ScanwardConfig;
use scanward_core::types::{ReportLocale, Severity};

use crate::engine::ScanOptions;
use crate::error::OrchestratorError;

/// 설정 상한값 상수
const MAX_ENGINE_TIMEOUT_SECS: u64 = 86_400;
const MAX_CONCURRENT_SCANS: usize = 256;
const MAX_PDF_WORKERS: usize = 64;

/// 오케스트레이터 설정
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// 엔진 실행 파일
    pub executable: String,
    /// 스캔 1회 제한 시간 (초)
    pub engine_timeout_secs: u64,
    /// `--version` 확인 제한 시간 (초)
    pub version_timeout_secs: u64,
    /// 요청에 옵션이 없을 때 사용하는 기본 스캔 옵션
    pub default_options: ScanOptions,

    /// 동시 실행 스캔 수
    pub max_concurrent_scans: usize,
    /// 실행 중 작업 외 대기 가능 작업 수
    pub max_queued_scans: usize,
    /// repo 대상 URL 스킴 요구 여부
    pub require_repo_url_scheme: bool,
    /// 대상 문자열 최대 길이
    pub max_target_len: usize,
    /// 보존할 종료 작업 수 (0 = 무제한)
    pub max_retained_tasks: usize,

    /// 산출물 디렉토리
    pub results_dir: PathBuf,
    /// PDF 생성 활성화
    pub pdf_enabled: bool,
    /// PDF 대상별 최대 발견 항목 수
    pub pdf_max_findings_per_target: usize,
    /// 동시 PDF 생성 수
    pub pdf_workers: usize,
    /// HTML 보고서 언어
    pub locale: ReportLocale,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            executable: "trivy".to_owned(),
            engine_timeout_secs: 600,
            version_timeout_secs: 10,
            default_options: ScanOptions::default(),
            max_concurrent_scans: 4,
            max_queued_scans: 64,
            require_repo_url_scheme: true,
            max_target_len: 2048,
            max_retained_tasks: 0,
            results_dir: PathBuf::from("/var/lib/scanward/results"),
            pdf_enabled: true,
            pdf_max_findings_per_target: 40,
            pdf_workers: 2,
            locale: ReportLocale::En,
        }
    }
}

impl OrchestratorConfig {
    /// core 설정에서 오케스트레이터 설정을 생성합니다.
    ///
    /// 인식할 수 없는 심각도 문자열은 건너뛰며, 결과가 비면 네 단계 전체를 사용합니다.
    pub fn from_core(core: &ScanwardConfig) -> Self {
        let mut severities: Vec<Severity> = core
            .engine
            .severities
            .iter()
            .filter_map(|s| Severity::from_str_loose(s))
            .collect();
        if severities.is_empty() {
            severities = Severity::ALL.to_vec();
        }

        Self {
            executable: core.engine.executable.clone(),
            engine_timeout_secs: core.engine.timeout_secs,
            version_timeout_secs: core.engine.version_timeout_secs,
            default_options: ScanOptions {
                severities,
                skip_update: core.engine.skip_update,
                ignore_unfixed: core.engine.ignore_unfixed,
            },
            max_concurrent_scans: core.tasks.max_concurrent_scans,
            max_queued_scans: core.tasks.max_queued_scans,
            require_repo_url_scheme: core.tasks.require_repo_url_scheme,
            max_target_len: core.tasks.max_target_len,
            max_retained_tasks: core.tasks.max_retained_tasks,
            results_dir: PathBuf::from(&core.report.results_dir),
            pdf_enabled: core.report.pdf_enabled,
            pdf_max_findings_per_target: core.report.pdf_max_findings_per_target,
            pdf_workers: core.report.pdf_workers,
            locale: ReportLocale::from_str_loose(&core.report.locale).unwrap_or_default(),
        }
    }

    /// 동시에 존재할 수 있는 활성(대기 + 실행) 작업 한도
    pub fn admission_limit(&self) -> usize {
        self.max_concurrent_scans.saturating_add(self.max_queued_scans)
    }

    /// 설정 값의 유효성을 검증합니다.
    ///
    /// # 검증 규칙
    ///
    /// - `engine_timeout_secs`: 1-86400
    /// - `max_concurrent_scans`: 1-256
    /// - `pdf_workers`: PDF 활성화 시 1-64
    /// - `results_dir`: 비어있으면 안 되며 `..` 컴포넌트 금지
    pub fn validate(&self) -> Result<(), OrchestratorError> {
        if self.executable.trim().is_empty() {
            return Err(config_err("executable", "must not be empty"));
        }
        if self.engine_timeout_secs == 0 || self.engine_timeout_secs > MAX_ENGINE_TIMEOUT_SECS {
            return Err(config_err(
                "engine_timeout_secs",
                format!("must be 1-{MAX_ENGINE_TIMEOUT_SECS}"),
            ));
        }
        if self.version_timeout_secs == 0 {
            return Err(config_err("version_timeout_secs", "must be greater than 0"));
        }
        if self.default_options.severities.is_empty() {
            return Err(config_err("severities", "must not be empty"));
        }
        if self.max_concurrent_scans == 0 || self.max_concurrent_scans > MAX_CONCURRENT_SCANS {
            return Err(config_err(
                "max_concurrent_scans",
                format!("must be 1-{MAX_CONCURRENT_SCANS}"),
            ));
        }
        if self.max_target_len == 0 {
            return Err(config_err("max_target_len", "must be greater than 0"));
        }
        if self.pdf_max_findings_per_target == 0 {
            return Err(config_err(
                "pdf_max_findings_per_target",
                "must be greater than 0",
            ));
        }
        if self.pdf_enabled && (self.pdf_workers == 0 || self.pdf_workers > MAX_PDF_WORKERS) {
            return Err(config_err(
                "pdf_workers",
                format!("must be 1-{MAX_PDF_WORKERS} when pdf is enabled"),
            ));
        }
        if self.results_dir.as_os_str().is_empty() {
            return Err(config_err("results_dir", "must not be empty"));
        }
        if self
            .results_dir
            .components()
            .any(|c| c == std::path::Component::ParentDir)
        {
            return Err(config_err(
                "results_dir",
                "contains path traversal pattern '..'",
            ));
        }
        Ok(())
    }
}

fn config_err(field: &str, reason: impl Into<String>) -> OrchestratorError {
    OrchestratorError::Config {
        field: field.to_owned(),
        reason: reason.into(),
    }
}

/// [`OrchestratorConfig`] 빌더
///
/// 빌드 시 유효성 검증을 수행합니다.
#[derive(Default)]
pub struct OrchestratorConfigBuilder {
    config: OrchestratorConfig,
}

impl OrchestratorConfigBuilder {
    /// 기본값을 가진 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 엔진 실행 파일을 설정합니다.
    pub fn executable(mut self, executable: impl Into<String>) -> Self {
        self.config.executable = executable.into();
        self
    }

    /// 스캔 제한 시간(초)을 설정합니다.
    pub fn engine_timeout_secs(mut self, secs: u64) -> Self {
        self.config.engine_timeout_secs = secs;
        self
    }

    /// 버전 확인 제한 시간(초)을 설정합니다.
    pub fn version_timeout_secs(mut self, secs: u64) -> Self {
        self.config.version_timeout_secs = secs;
        self
    }

    /// 기본 스캔 옵션을 설정합니다.
    pub fn default_options(mut self, options: ScanOptions) -> Self {
        self.config.default_options = options;
        self
    }

    pub fn max_concurrent_scans(mut self, max: usize) -> Self {
        self.config.max_concurrent_scans = max;
        self
    }

    pub fn max_queued_scans(mut self, max: usize) -> Self {
        self.config.max_queued_scans = max;
        self
    }

    pub fn require_repo_url_scheme(mut self, require: bool) -> Self {
        self.config.require_repo_url_scheme = require;
        self
    }

    pub fn max_target_len(mut self, len: usize) -> Self {
        self.config.max_target_len = len;
        self
    }

    pub fn max_retained_tasks(mut self, max: usize) -> Self {
        self.config.max_retained_tasks = max;
        self
    }

    /// 산출물 디렉토리를 설정합니다.
    pub fn results_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.results_dir = dir.into();
        self
    }

    pub fn pdf_enabled(mut self, enabled: bool) -> Self {
        self.config.pdf_enabled = enabled;
        self
    }

    pub fn pdf_max_findings_per_target(mut self, max: usize) -> Self {
        self.config.pdf_max_findings_per_target = max;
        self
    }

    pub fn pdf_workers(mut self, workers: usize) -> Self {
        self.config.pdf_workers = workers;
        self
    }

    pub fn locale(mut self, locale: ReportLocale) -> Self {
        self.config.locale = locale;
        self
    }

    /// 설정을 검증하고 빌드합니다.
    ///
    /// # Errors
    ///
    /// 유효성 검증 실패 시 `OrchestratorError::Config` 반환
    pub fn build(self) -> Result<OrchestratorConfig, OrchestratorError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
