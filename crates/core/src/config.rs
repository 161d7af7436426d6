//! 설정 관리 — scanward.toml 파싱 및 런타임 설정
//!
//! [`ScanwardConfig`]는 모든 크레이트의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`SCANWARD_ENGINE_TIMEOUT_SECS=300` 형식)
//! 3. 설정 파일 (`scanward.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), scanward_core::error::ScanwardError> {
//! use scanward_core::config::ScanwardConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = ScanwardConfig::load("scanward.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = ScanwardConfig::parse("[engine]\ntimeout_secs = 300")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, ScanwardError};
use crate::types::{ReportLocale, Severity};

/// 엔진 타임아웃 상한 (24시간)
const MAX_ENGINE_TIMEOUT_SECS: u64 = 86_400;

/// Scanward 통합 설정
///
/// `scanward.toml` 파일의 최상위 구조를 나타냅니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanwardConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 외부 스캔 엔진 설정
    #[serde(default)]
    pub engine: EngineConfig,
    /// 작업 관리 설정
    #[serde(default)]
    pub tasks: TasksConfig,
    /// 보고서 설정
    #[serde(default)]
    pub report: ReportConfig,
}

impl ScanwardConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ScanwardError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, ScanwardError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ScanwardError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                ScanwardError::Io(e)
            }
        })?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, ScanwardError> {
        toml::from_str(toml_str).map_err(|e| {
            ScanwardError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 설정을 TOML 문자열로 직렬화합니다.
    pub fn to_toml(&self) -> Result<String, ScanwardError> {
        toml::to_string_pretty(self).map_err(|e| {
            ScanwardError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `SCANWARD_{SECTION}_{FIELD}`
    /// 예: `SCANWARD_REPORT_RESULTS_DIR=/tmp/results`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "SCANWARD_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "SCANWARD_GENERAL_LOG_FORMAT");

        // Engine
        override_string(&mut self.engine.executable, "SCANWARD_ENGINE_EXECUTABLE");
        override_u64(&mut self.engine.timeout_secs, "SCANWARD_ENGINE_TIMEOUT_SECS");
        override_csv(&mut self.engine.severities, "SCANWARD_ENGINE_SEVERITIES");
        override_bool(&mut self.engine.skip_update, "SCANWARD_ENGINE_SKIP_UPDATE");
        override_bool(
            &mut self.engine.ignore_unfixed,
            "SCANWARD_ENGINE_IGNORE_UNFIXED",
        );
        override_u64(
            &mut self.engine.version_timeout_secs,
            "SCANWARD_ENGINE_VERSION_TIMEOUT_SECS",
        );

        // Tasks
        override_usize(
            &mut self.tasks.max_concurrent_scans,
            "SCANWARD_TASKS_MAX_CONCURRENT_SCANS",
        );
        override_usize(
            &mut self.tasks.max_queued_scans,
            "SCANWARD_TASKS_MAX_QUEUED_SCANS",
        );
        override_bool(
            &mut self.tasks.require_repo_url_scheme,
            "SCANWARD_TASKS_REQUIRE_REPO_URL_SCHEME",
        );
        override_usize(
            &mut self.tasks.max_target_len,
            "SCANWARD_TASKS_MAX_TARGET_LEN",
        );
        override_usize(
            &mut self.tasks.max_retained_tasks,
            "SCANWARD_TASKS_MAX_RETAINED_TASKS",
        );

        // Report
        override_string(
            &mut self.report.results_dir,
            "SCANWARD_REPORT_RESULTS_DIR",
        );
        override_bool(&mut self.report.pdf_enabled, "SCANWARD_REPORT_PDF_ENABLED");
        override_usize(
            &mut self.report.pdf_max_findings_per_target,
            "SCANWARD_REPORT_PDF_MAX_FINDINGS_PER_TARGET",
        );
        override_usize(&mut self.report.pdf_workers, "SCANWARD_REPORT_PDF_WORKERS");
        override_string(&mut self.report.locale, "SCANWARD_REPORT_LOCALE");
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), ScanwardError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        // engine
        if self.engine.executable.trim().is_empty() {
            return Err(invalid("engine.executable", "must not be empty"));
        }
        if self.engine.timeout_secs == 0 || self.engine.timeout_secs > MAX_ENGINE_TIMEOUT_SECS {
            return Err(invalid(
                "engine.timeout_secs",
                format!("must be between 1 and {MAX_ENGINE_TIMEOUT_SECS}"),
            ));
        }
        if self.engine.version_timeout_secs == 0 {
            return Err(invalid(
                "engine.version_timeout_secs",
                "must be greater than 0",
            ));
        }
        if self.engine.severities.is_empty() {
            return Err(invalid("engine.severities", "must not be empty"));
        }
        for s in &self.engine.severities {
            if Severity::from_str_loose(s).is_none() {
                return Err(invalid(
                    "engine.severities",
                    format!("unknown severity '{s}' (expected CRITICAL, HIGH, MEDIUM or LOW)"),
                ));
            }
        }

        // tasks
        if self.tasks.max_concurrent_scans == 0 {
            return Err(invalid(
                "tasks.max_concurrent_scans",
                "must be greater than 0",
            ));
        }
        if self.tasks.max_target_len == 0 {
            return Err(invalid("tasks.max_target_len", "must be greater than 0"));
        }

        // report
        if self.report.results_dir.trim().is_empty() {
            return Err(invalid("report.results_dir", "must not be empty"));
        }
        if self.report.pdf_max_findings_per_target == 0 {
            return Err(invalid(
                "report.pdf_max_findings_per_target",
                "must be greater than 0",
            ));
        }
        if self.report.pdf_enabled && self.report.pdf_workers == 0 {
            return Err(invalid(
                "report.pdf_workers",
                "must be greater than 0 when pdf is enabled",
            ));
        }
        if ReportLocale::from_str_loose(&self.report.locale).is_none() {
            return Err(invalid("report.locale", "must be one of: en, zh"));
        }

        Ok(())
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> ScanwardError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason: reason.into(),
    }
    .into()
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
        }
    }
}

/// 외부 스캔 엔진 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// 엔진 실행 파일 (PATH 검색 또는 절대 경로)
    pub executable: String,
    /// 스캔 1회 최대 실행 시간 (초)
    pub timeout_secs: u64,
    /// 기본 요청 심각도 목록
    pub severities: Vec<String>,
    /// 취약점 DB 업데이트 생략
    pub skip_update: bool,
    /// 수정 버전이 없는 취약점 제외
    pub ignore_unfixed: bool,
    /// `--version` 확인 제한 시간 (초)
    pub version_timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            executable: "trivy".to_owned(),
            timeout_secs: 600,
            severities: Severity::ALL
                .iter()
                .map(|s| s.as_engine_str().to_owned())
                .collect(),
            skip_update: false,
            ignore_unfixed: false,
            version_timeout_secs: 10,
        }
    }
}

/// 작업 관리 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TasksConfig {
    /// 동시에 실행되는 스캔 수
    pub max_concurrent_scans: usize,
    /// 실행 중인 스캔 외에 대기 가능한 작업 수
    pub max_queued_scans: usize,
    /// repo 대상에 `http://` 또는 `https://` 접두사 요구
    pub require_repo_url_scheme: bool,
    /// 대상 문자열 최대 길이
    pub max_target_len: usize,
    /// 보존할 종료 작업 수 (0 = 무제한)
    pub max_retained_tasks: usize,
}

impl Default for TasksConfig {
    fn default() -> Self {
        Self {
            max_concurrent_scans: 4,
            max_queued_scans: 64,
            require_repo_url_scheme: true,
            max_target_len: 2048,
            max_retained_tasks: 0,
        }
    }
}

/// 보고서 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// 산출물 디렉토리 (`<id>.json`, `<id>.html`, `<id>.pdf`)
    pub results_dir: String,
    /// PDF 생성 활성화
    pub pdf_enabled: bool,
    /// PDF에서 대상별로 나열할 최대 발견 항목 수
    pub pdf_max_findings_per_target: usize,
    /// 동시 PDF 생성 작업 수
    pub pdf_workers: usize,
    /// 보고서 언어 (en, zh)
    pub locale: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            results_dir: "/var/lib/scanward/results".to_owned(),
            pdf_enabled: true,
            pdf_max_findings_per_target: 40,
            pdf_workers: 2,
            locale: "en".to_owned(),
        }
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<bool>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse bool from env var, ignoring"
            ),
        }
    }
}

fn override_usize(target: &mut usize, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<usize>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse usize from env var, ignoring"
            ),
        }
    }
}

fn override_u64(target: &mut u64, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u64 from env var, ignoring"
            ),
        }
    }
}

/// 쉼표로 구분된 값을 Vec으로 파싱합니다. 빈 항목은 제거됩니다.
fn override_csv(target: &mut Vec<String>, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val
            .split(',')
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .collect();
    }
}
