//! 보고서 생성 및 산출물 저장
//!
//! 완료된 작업의 결과와 통계로 HTML / PDF 문서를 렌더링하고,
//! `<results_dir>/<id>.<ext>` 경로에 원자적으로 저장합니다.
//!
//! # 산출물 배치
//!
//! ```text
//! <results_dir>/
//!   <id>.json   엔진 원본 결과
//!   <id>.html   완료 직전 동기 생성 (실패 시 요청 시점에 재생성)
//!   <id>.pdf    완료 후 백그라운드 생성 (실패 시 요청 시점에 재생성)
//! ```

pub mod html;
pub mod pdf;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use scanward_core::types::{ReportLocale, ScanType};

use crate::error::OrchestratorError;
use crate::result::EngineReport;
use crate::stats::SeverityStats;

/// 보고서 형식
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReportFormat {
    /// 엔진 원본 JSON
    Raw,
    Html,
    Pdf,
}

impl ReportFormat {
    /// 문자열에서 형식을 파싱합니다 (`raw`/`json`, `html`, `pdf`).
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "raw" | "json" => Some(Self::Raw),
            "html" => Some(Self::Html),
            "pdf" => Some(Self::Pdf),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Raw => "raw",
            Self::Html => "html",
            Self::Pdf => "pdf",
        }
    }

    /// 파일 확장자
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Raw => "json",
            Self::Html => "html",
            Self::Pdf => "pdf",
        }
    }

    /// MIME 타입
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Raw => "application/json",
            Self::Html => "text/html; charset=utf-8",
            Self::Pdf => "application/pdf",
        }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 보고서 렌더링 입력
///
/// 완료된 작업의 불변 데이터로, 실행 단위 간에 저렴하게 복제됩니다.
#[derive(Debug, Clone)]
pub struct ReportInput {
    pub task_id: String,
    pub scan_type: ScanType,
    pub target: String,
    pub raw: Arc<serde_json::Value>,
    pub report: Arc<EngineReport>,
    pub stats: SeverityStats,
    pub locale: ReportLocale,
    /// PDF 대상별 최대 발견 항목 수
    pub pdf_max_findings: usize,
}

impl ReportInput {
    /// 지정 형식으로 렌더링합니다 (CPU 작업, 블로킹 컨텍스트에서 호출).
    pub fn render(
        &self,
        format: ReportFormat,
        generated_at: DateTime<Utc>,
    ) -> Result<Vec<u8>, OrchestratorError> {
        match format {
            ReportFormat::Raw => serde_json::to_vec_pretty(self.raw.as_ref()).map_err(|e| {
                OrchestratorError::ReportGeneration {
                    format: format.to_string(),
                    reason: e.to_string(),
                }
            }),
            ReportFormat::Html => Ok(html::render_html(self, generated_at).into_bytes()),
            ReportFormat::Pdf => pdf::render_pdf(self, generated_at),
        }
    }
}

/// 결과 디렉토리의 산출물 저장소
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// 작업 산출물 경로 (`<dir>/<id>.<ext>`)
    pub fn path_for(&self, task_id: &str, format: ReportFormat) -> PathBuf {
        self.dir.join(format!("{task_id}.{}", format.extension()))
    }

    /// 결과 디렉토리를 생성합니다.
    pub async fn ensure_dir(&self) -> Result<(), OrchestratorError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| OrchestratorError::Io {
                path: self.dir.display().to_string(),
                source: e,
            })
    }

    /// 비어있지 않은 산출물이 있으면 읽어 반환합니다.
    pub async fn read_if_present(&self, path: &Path) -> Result<Option<Vec<u8>>, OrchestratorError> {
        match tokio::fs::metadata(path).await {
            Ok(m) if m.is_file() && m.len() > 0 => {}
            Ok(_) => return Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(OrchestratorError::Io {
                    path: path.display().to_string(),
                    source: e,
                });
            }
        }
        match tokio::fs::read(path).await {
            Ok(bytes) if !bytes.is_empty() => Ok(Some(bytes)),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(OrchestratorError::Io {
                path: path.display().to_string(),
                source: e,
            }),
        }
    }

    /// 임시 파일에 기록한 뒤 rename으로 교체합니다.
    ///
    /// 읽는 쪽은 완성된 파일만 보게 됩니다.
    pub async fn write_atomic(&self, path: &Path, bytes: &[u8]) -> Result<(), OrchestratorError> {
        self.ensure_dir().await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "artifact".to_owned());
        let tmp = path.with_file_name(format!(".{file_name}.{}.tmp", uuid::Uuid::new_v4()));

        let io_err = |source: std::io::Error, p: &Path| OrchestratorError::Io {
            path: p.display().to_string(),
            source,
        };

        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|e| io_err(e, &tmp))?;
        if let Err(e) = tokio::fs::rename(&tmp, path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(io_err(e, path));
        }
        Ok(())
    }
}

/// 보고서 문서에 표시할 심각도 라벨
///
/// 인식하지 못한 값은 원문(대문자)을, 값이 없으면 `UNKNOWN`을 표시합니다.
pub(crate) fn severity_label(raw: Option<&str>, locale: ReportLocale) -> String {
    match raw {
        Some(s) => match scanward_core::types::Severity::from_str_loose(s) {
            Some(sev) => sev.label(locale).to_owned(),
            None => s.trim().to_ascii_uppercase(),
        },
        None => "UNKNOWN".to_owned(),
    }
}
