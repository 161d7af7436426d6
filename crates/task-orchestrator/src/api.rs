//! 경계 연산 -- 외부 요청과 오케스트레이터 연산 사이의 변환
//!
//! HTTP 프레임워크에 의존하지 않는 핸들러 수준 함수들입니다.
//! 각 함수는 상태 코드와 JSON 본문(또는 파일)을 담은 [`ApiResponse`]를 반환하므로
//! 어떤 전송 계층에서도 그대로 응답으로 옮길 수 있습니다.
//!
//! | 연산 | 성공 | 실패 |
//! |------|------|------|
//! | [`create_scan`] | 202 `{task_id, status}` | 400 검증, 503 한도 초과 |
//! | [`get_scan`] | 200 스냅샷 | 404 |
//! | [`list_scans`] | 200 `{scans}` | - |
//! | [`get_report`] | 200 파일 | 400 형식, 404, 409 미완료, 500 생성 실패 |
//! | [`health`] | 200 | - |

use serde::Deserialize;
use serde_json::{Value, json};

use scanward_core::types::{ScanType, Severity};

use crate::engine::{ScanEngine, ScanOptions};
use crate::error::OrchestratorError;
use crate::orchestrator::ScanOrchestrator;
use crate::report::ReportFormat;

/// 서비스 이름 (헬스 응답)
pub const SERVICE_NAME: &str = "scanward";

/// 경계 응답
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: ApiBody,
}

/// 응답 본문
#[derive(Debug, Clone, PartialEq)]
pub enum ApiBody {
    Json(Value),
    File {
        bytes: Vec<u8>,
        mime_type: &'static str,
        file_name: String,
    },
}

impl ApiResponse {
    fn json(status: u16, body: Value) -> Self {
        Self {
            status,
            body: ApiBody::Json(body),
        }
    }

    fn error(status: u16, message: impl Into<String>) -> Self {
        Self::json(status, json!({ "error": message.into() }))
    }

    /// JSON 본문 (파일 응답이면 `None`)
    pub fn json_body(&self) -> Option<&Value> {
        match &self.body {
            ApiBody::Json(value) => Some(value),
            ApiBody::File { .. } => None,
        }
    }
}

/// 스캔 생성 요청 본문
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateScanRequest {
    /// `image`(기본) 또는 `repo`
    #[serde(rename = "type", default)]
    pub scan_type: Option<String>,
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub options: Option<RequestOptions>,
}

/// 요청별 스캔 옵션 (생략한 항목은 설정 기본값)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RequestOptions {
    #[serde(default)]
    pub severity: Option<Vec<String>>,
    #[serde(default)]
    pub skip_update: Option<bool>,
    #[serde(default)]
    pub ignore_unfixed: Option<bool>,
}

impl RequestOptions {
    fn resolve(&self, defaults: &ScanOptions) -> Result<ScanOptions, String> {
        let severities = match &self.severity {
            Some(levels) => levels
                .iter()
                .map(|s| Severity::from_str_loose(s).ok_or_else(|| format!("Unknown severity: {s}")))
                .collect::<Result<Vec<_>, _>>()?,
            None => defaults.severities.clone(),
        };
        Ok(ScanOptions {
            severities,
            skip_update: self.skip_update.unwrap_or(defaults.skip_update),
            ignore_unfixed: self.ignore_unfixed.unwrap_or(defaults.ignore_unfixed),
        })
    }
}

/// 에러를 상태 코드로 변환합니다.
pub fn status_for(err: &OrchestratorError) -> u16 {
    match err {
        OrchestratorError::Validation(_) => 400,
        OrchestratorError::NotFound(_) => 404,
        OrchestratorError::NotReady { .. } => 409,
        OrchestratorError::Busy { .. } => 503,
        _ => 500,
    }
}

/// 스캔 작업을 생성합니다.
pub async fn create_scan<E: ScanEngine>(
    orchestrator: &ScanOrchestrator<E>,
    request: CreateScanRequest,
) -> ApiResponse {
    let scan_type = match request.scan_type.as_deref() {
        None => ScanType::Image,
        Some(raw) => match ScanType::from_str_loose(raw) {
            Some(t) => t,
            None => return ApiResponse::error(400, format!("Unsupported scan type: {raw}")),
        },
    };

    let target = request.target.as_deref().unwrap_or("");
    let options = match &request.options {
        Some(opts) => match opts.resolve(&orchestrator.config().default_options) {
            Ok(options) => Some(options),
            Err(message) => return ApiResponse::error(400, message),
        },
        None => None,
    };

    match orchestrator
        .submit_with_options(scan_type, target, options)
        .await
    {
        Ok(id) => ApiResponse::json(
            202,
            json!({ "task_id": id.to_string(), "status": "pending" }),
        ),
        Err(OrchestratorError::Validation(message)) => ApiResponse::error(400, message),
        Err(e) => ApiResponse::error(status_for(&e), e.to_string()),
    }
}

/// 작업 스냅샷을 반환합니다.
pub async fn get_scan<E: ScanEngine>(orchestrator: &ScanOrchestrator<E>, id: &str) -> ApiResponse {
    match orchestrator.get(id).await {
        Ok(snapshot) => match serde_json::to_value(&snapshot) {
            Ok(value) => ApiResponse::json(200, value),
            Err(e) => ApiResponse::error(500, e.to_string()),
        },
        Err(OrchestratorError::NotFound(_)) => ApiResponse::error(404, "Task not found"),
        Err(e) => ApiResponse::error(status_for(&e), e.to_string()),
    }
}

/// 작업 목록 요약을 반환합니다 (생성 시각 내림차순).
pub async fn list_scans<E: ScanEngine>(orchestrator: &ScanOrchestrator<E>) -> ApiResponse {
    let scans: Vec<_> = orchestrator
        .list()
        .await
        .iter()
        .map(|snapshot| snapshot.summary())
        .collect();
    match serde_json::to_value(&scans) {
        Ok(scans) => ApiResponse::json(200, json!({ "scans": scans })),
        Err(e) => ApiResponse::error(500, e.to_string()),
    }
}

/// 보고서 파일을 반환합니다.
pub async fn get_report<E: ScanEngine>(
    orchestrator: &ScanOrchestrator<E>,
    id: &str,
    format: &str,
) -> ApiResponse {
    let Some(format) = ReportFormat::from_str_loose(format) else {
        return ApiResponse::error(400, format!("Unsupported report format: {format}"));
    };
    if orchestrator.get(id).await.is_err() {
        return ApiResponse::error(404, "Task not found");
    }

    match orchestrator.get_report(id, format).await {
        Ok(artifact) => ApiResponse {
            status: 200,
            body: ApiBody::File {
                bytes: artifact.bytes,
                mime_type: artifact.mime_type,
                file_name: artifact.file_name,
            },
        },
        Err(OrchestratorError::NotFound(_)) => ApiResponse::error(404, "Report not found"),
        Err(OrchestratorError::NotReady { status, .. }) => ApiResponse::json(
            409,
            json!({ "error": "Scan not completed", "status": status }),
        ),
        Err(e) => ApiResponse::error(status_for(&e), e.to_string()),
    }
}

/// 서비스 헬스 정보를 반환합니다.
pub async fn health<E: ScanEngine>(orchestrator: &ScanOrchestrator<E>) -> ApiResponse {
    let snapshot = orchestrator.health().await;
    ApiResponse::json(
        200,
        json!({
            "status": snapshot.status.as_str(),
            "service": SERVICE_NAME,
            "engine": snapshot.engine_name,
            "engine_available": snapshot.engine_available,
            "engine_version": snapshot.engine_version,
            "pdf_support_available": snapshot.pdf_support_available,
            "active_tasks": snapshot.active_tasks,
        }),
    )
}
