//! 스캔 오케스트레이터 -- 작업 접수, 실행, 보고서 제공
//!
//! [`ScanOrchestrator`]는 레지스트리, 엔진, 산출물 저장소를 묶어
//! 작업 생명주기 전체를 관리합니다.
//!
//! # 실행 흐름
//!
//! ```text
//! submit() --> validate --> registry.admit (Pending) --> task_id 즉시 반환
//!                                  |
//!                       tracker.spawn (작업별 실행 단위)
//!                                  |
//!              scan semaphore --> Running --> engine.run (timeout)
//!                                                 |
//!                    +----------------------------+-----------------+
//!                    |                            |                 |
//!              EngineReport              ScanTimeout          기타 에러
//!                    |                            |                 |
//!             SeverityStats                   TimedOut           Failed
//!                    |
//!           HTML 렌더링 (실패해도 계속)
//!                    |
//!               Completed --> PDF 백그라운드 작업 (pdf semaphore, 실패는 로그만)
//! ```
//!
//! 어떤 경로로든 실행 단위가 끝나면 작업은 종료 상태에 도달합니다.
//! 실행 단위가 패닉하면 작업은 `Failed`로 기록됩니다.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use scanward_core::health::HealthStatus;
use scanward_core::metrics as m;
use scanward_core::types::{ScanType, Severity, TaskStatus};

use crate::config::OrchestratorConfig;
use crate::engine::trivy::TrivyEngine;
use crate::engine::{EngineRequest, ScanEngine, ScanOptions};
use crate::error::OrchestratorError;
use crate::report::{ArtifactStore, ReportFormat, ReportInput};
use crate::registry::TaskRegistry;
use crate::result::EngineReport;
use crate::stats::SeverityStats;
use crate::task::{TaskId, TaskSnapshot};

/// 엔진 자체 제한 시간 이후 외부 가드가 기다리는 추가 시간
const ENGINE_GRACE: Duration = Duration::from_secs(5);

/// 보고서 다운로드 결과
#[derive(Debug, Clone)]
pub struct ReportArtifact {
    pub bytes: Vec<u8>,
    pub mime_type: &'static str,
    /// 다운로드 파일명 (`<id>.<ext>`)
    pub file_name: String,
    /// 결과 디렉토리 내 경로
    pub path: PathBuf,
}

/// 헬스 스냅샷
#[derive(Debug, Clone)]
pub struct HealthSnapshot {
    pub status: HealthStatus,
    pub engine_name: String,
    pub engine_available: bool,
    pub engine_version: Option<String>,
    pub pdf_support_available: bool,
    pub active_tasks: usize,
}

struct Inner<E> {
    config: OrchestratorConfig,
    engine: E,
    registry: TaskRegistry,
    store: ArtifactStore,
    /// 동시 엔진 실행 한도
    scan_permits: Arc<Semaphore>,
    /// 동시 PDF 렌더링 한도
    pdf_permits: Arc<Semaphore>,
    tracker: TaskTracker,
}

/// 스캔 작업 오케스트레이터
///
/// 복제 비용이 낮으며(`Arc`), 모든 복제본이 같은 레지스트리를 공유합니다.
pub struct ScanOrchestrator<E: ScanEngine> {
    inner: Arc<Inner<E>>,
}

impl<E: ScanEngine> Clone for ScanOrchestrator<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl ScanOrchestrator<TrivyEngine> {
    /// 설정의 실행 파일로 Trivy 엔진을 구성해 오케스트레이터를 생성합니다.
    pub fn with_trivy(config: OrchestratorConfig) -> Result<Self, OrchestratorError> {
        let engine = TrivyEngine::new(
            config.executable.clone(),
            Duration::from_secs(config.version_timeout_secs),
        );
        ScanOrchestratorBuilder::new()
            .config(config)
            .engine(engine)
            .build()
    }
}

impl<E: ScanEngine> ScanOrchestrator<E> {
    pub fn config(&self) -> &OrchestratorConfig {
        &self.inner.config
    }

    pub fn engine(&self) -> &E {
        &self.inner.engine
    }

    /// 기본 옵션으로 스캔을 접수합니다.
    pub async fn submit(
        &self,
        scan_type: ScanType,
        target: &str,
    ) -> Result<TaskId, OrchestratorError> {
        self.submit_with_options(scan_type, target, None).await
    }

    /// 스캔을 접수하고 즉시 작업 ID를 반환합니다.
    ///
    /// 검증에 실패하면 작업이 생성되지 않습니다.
    /// 활성 작업이 한도에 도달했으면 `Busy`를 반환합니다.
    pub async fn submit_with_options(
        &self,
        scan_type: ScanType,
        target: &str,
        options: Option<ScanOptions>,
    ) -> Result<TaskId, OrchestratorError> {
        let inner = &self.inner;
        let target = validate_target(&inner.config, scan_type, target)?;
        let options = options.unwrap_or_else(|| inner.config.default_options.clone());
        if options.severities.is_empty() {
            return Err(OrchestratorError::Validation(
                "at least one severity level is required".to_owned(),
            ));
        }

        let snapshot = match inner.registry.admit(scan_type, target, options).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                metrics::counter!(m::TASKS_SUBMITTED_TOTAL, m::LABEL_RESULT => "busy").increment(1);
                warn!(error = %e, "scan rejected");
                return Err(e);
            }
        };
        metrics::counter!(m::TASKS_SUBMITTED_TOTAL, m::LABEL_RESULT => "accepted").increment(1);
        self.update_active_gauge().await;

        let id = snapshot.task_id;
        info!(
            task_id = %id,
            scan_type = %snapshot.scan_type,
            target = %snapshot.target,
            "scan submitted"
        );

        let this = self.clone();
        inner.tracker.spawn(async move { this.run_task(id).await });
        Ok(id)
    }

    /// 작업 스냅샷을 조회합니다.
    pub async fn get(&self, id: &str) -> Result<TaskSnapshot, OrchestratorError> {
        let task_id = parse_task_id(id)?;
        self.inner
            .registry
            .get(&task_id)
            .await
            .ok_or_else(|| OrchestratorError::NotFound(format!("task {id}")))
    }

    /// 모든 작업을 생성 시각 내림차순으로 반환합니다.
    pub async fn list(&self) -> Vec<TaskSnapshot> {
        self.inner.registry.list().await
    }

    /// 작업이 종료 상태에 도달할 때까지 주기적으로 확인합니다.
    pub async fn wait_until_terminal(
        &self,
        id: &TaskId,
        poll_interval: Duration,
    ) -> Result<TaskSnapshot, OrchestratorError> {
        loop {
            let snapshot = self
                .inner
                .registry
                .get(id)
                .await
                .ok_or_else(|| OrchestratorError::NotFound(format!("task {id}")))?;
            if snapshot.is_terminal() {
                return Ok(snapshot);
            }
            tokio::time::sleep(poll_interval).await;
        }
    }

    /// 완료된 작업의 보고서를 반환합니다.
    ///
    /// 캐시된 파일이 있으면 그대로 반환하고, 없으면 메모리의 결과로 다시 만듭니다.
    ///
    /// # Errors
    ///
    /// - 알 수 없는 작업, 실패/시간 초과 작업: `NotFound`
    /// - 대기/실행 중 작업: `NotReady`
    /// - 렌더링 또는 저장 실패: `ReportGeneration` (작업 상태는 변하지 않음)
    pub async fn get_report(
        &self,
        id: &str,
        format: ReportFormat,
    ) -> Result<ReportArtifact, OrchestratorError> {
        let snapshot = self.get(id).await?;
        match snapshot.status {
            TaskStatus::Completed => {}
            TaskStatus::Pending | TaskStatus::Running => {
                return Err(OrchestratorError::NotReady {
                    task_id: snapshot.task_id.to_string(),
                    status: snapshot.status.to_string(),
                });
            }
            TaskStatus::Failed | TaskStatus::TimedOut => {
                return Err(OrchestratorError::NotFound(format!(
                    "report for task {} (status: {})",
                    snapshot.task_id, snapshot.status
                )));
            }
        }

        let inner = &self.inner;
        if format == ReportFormat::Pdf && !inner.config.pdf_enabled {
            return Err(OrchestratorError::ReportGeneration {
                format: format.to_string(),
                reason: "pdf generation is disabled".to_owned(),
            });
        }

        let task_id = snapshot.task_id.to_string();
        let path = inner.store.path_for(&task_id, format);
        let artifact = |bytes: Vec<u8>| ReportArtifact {
            bytes,
            mime_type: format.mime_type(),
            file_name: format!("{task_id}.{}", format.extension()),
            path: path.clone(),
        };

        if let Some(bytes) = inner.store.read_if_present(&path).await? {
            debug!(task_id = %task_id, format = %format, "serving cached report");
            return Ok(artifact(bytes));
        }

        let input = self.report_input(&snapshot, format)?;
        if format == ReportFormat::Raw {
            warn!(task_id = %task_id, "raw result missing on disk, restoring from memory");
        } else {
            info!(task_id = %task_id, format = %format, "generating report on demand");
        }
        let bytes = self.generate_report(input, format).await?;
        Ok(artifact(bytes))
    }

    /// 엔진 가용성과 활성 작업 수를 확인합니다.
    pub async fn health(&self) -> HealthSnapshot {
        let inner = &self.inner;
        let (engine_available, engine_version) = match inner.engine.version().await {
            Ok(version) => (true, Some(version)),
            Err(e) => {
                warn!(engine = inner.engine.name(), error = %e, "scan engine unavailable");
                (false, None)
            }
        };
        let active_tasks = inner.registry.active_count().await;
        let pdf_support_available = inner.config.pdf_enabled;

        let status = if !engine_available {
            HealthStatus::Unhealthy(format!("{} is not available", inner.engine.name()))
        } else if !pdf_support_available {
            HealthStatus::Degraded("pdf generation disabled".to_owned())
        } else {
            HealthStatus::Healthy
        };

        HealthSnapshot {
            status,
            engine_name: inner.engine.name().to_owned(),
            engine_available,
            engine_version,
            pdf_support_available,
            active_tasks,
        }
    }

    /// 진행 중인 스캔과 PDF 작업이 모두 끝날 때까지 기다립니다.
    pub async fn shutdown(&self) {
        let inner = &self.inner;
        inner.tracker.close();
        info!(pending = inner.tracker.len(), "waiting for in-flight scans");
        inner.tracker.wait().await;
        info!("scan orchestrator drained");
    }

    /// 실행 단위 진입점. 내부 패닉을 작업 실패로 기록합니다.
    async fn run_task(self, id: TaskId) {
        let worker = self.clone();
        let handle = tokio::spawn(async move { worker.execute(id).await });
        if let Err(e) = handle.await {
            error!(task_id = %id, error = %e, "scan worker aborted");
            self.fail_task(&id, TaskStatus::Failed, format!("scan worker aborted: {e}"))
                .await;
        }
    }

    async fn execute(&self, id: TaskId) {
        let inner = &self.inner;

        let permit = match Arc::clone(&inner.scan_permits).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                self.fail_task(&id, TaskStatus::Failed, "scan dispatcher closed".to_owned())
                    .await;
                return;
            }
        };

        let Some(task) = inner.registry.mark_running(&id).await else {
            return;
        };
        debug!(task_id = %id, "scan started");

        let request = EngineRequest {
            task_id: id.to_string(),
            scan_type: task.scan_type,
            target: task.target.clone(),
            output_path: inner.store.path_for(&id.to_string(), ReportFormat::Raw),
            timeout: Duration::from_secs(inner.config.engine_timeout_secs),
            options: task.options.clone(),
        };

        let started = Instant::now();
        let outcome = self.invoke_engine(&request).await;
        metrics::histogram!(m::SCAN_DURATION_SECONDS).record(started.elapsed().as_secs_f64());
        drop(permit);

        let processed = outcome.and_then(|artifact| {
            let raw = Arc::new(artifact.raw);
            let report = Arc::new(EngineReport::from_value(&raw)?);
            let stats = SeverityStats::aggregate(&report);
            Ok((raw, report, stats))
        });

        match processed {
            Ok((raw, report, stats)) => self.finish_success(&task, raw, report, stats).await,
            Err(e) => {
                let status = match e {
                    OrchestratorError::ScanTimeout { .. } => TaskStatus::TimedOut,
                    _ => TaskStatus::Failed,
                };
                warn!(task_id = %id, error = %e, status = %status, "scan failed");
                self.fail_task(&id, status, e.to_string()).await;
            }
        }
    }

    async fn invoke_engine(
        &self,
        request: &EngineRequest,
    ) -> Result<crate::engine::ScanArtifact, OrchestratorError> {
        let inner = &self.inner;
        inner.store.ensure_dir().await?;
        match tokio::time::timeout(request.timeout + ENGINE_GRACE, inner.engine.run(request)).await
        {
            Ok(result) => result,
            Err(_) => Err(OrchestratorError::ScanTimeout {
                secs: request.timeout.as_secs(),
            }),
        }
    }

    async fn finish_success(
        &self,
        task: &TaskSnapshot,
        raw: Arc<serde_json::Value>,
        report: Arc<EngineReport>,
        stats: SeverityStats,
    ) {
        let inner = &self.inner;
        let id = task.task_id;
        let input = ReportInput {
            task_id: id.to_string(),
            scan_type: task.scan_type,
            target: task.target.clone(),
            raw: Arc::clone(&raw),
            report: Arc::clone(&report),
            stats,
            locale: inner.config.locale,
            pdf_max_findings: inner.config.pdf_max_findings_per_target,
        };

        // HTML 실패는 작업을 실패시키지 않음, 다운로드 시 재생성
        if let Err(e) = self.generate_report(input.clone(), ReportFormat::Html).await {
            warn!(task_id = %id, error = %e, "html report generation failed");
        }

        if inner.registry.complete(&id, raw, report, stats).await.is_none() {
            return;
        }
        metrics::counter!(m::TASKS_FINISHED_TOTAL, m::LABEL_RESULT => TaskStatus::Completed.as_str())
            .increment(1);
        for severity in Severity::ALL {
            metrics::counter!(m::FINDINGS_TOTAL, m::LABEL_SEVERITY => severity.as_engine_str())
                .increment(stats.count(severity));
        }
        metrics::counter!(m::FINDINGS_TOTAL, m::LABEL_SEVERITY => "UNKNOWN")
            .increment(stats.unclassified());
        self.update_active_gauge().await;
        info!(
            task_id = %id,
            total = stats.total,
            critical = stats.critical,
            high = stats.high,
            "scan completed"
        );

        if inner.config.pdf_enabled {
            self.spawn_pdf_job(input);
        }
    }

    fn spawn_pdf_job(&self, input: ReportInput) {
        let this = self.clone();
        self.inner.tracker.spawn(async move {
            let Ok(_permit) = Arc::clone(&this.inner.pdf_permits).acquire_owned().await else {
                return;
            };
            let task_id = input.task_id.clone();
            match this.generate_report(input, ReportFormat::Pdf).await {
                Ok(bytes) => debug!(task_id = %task_id, bytes = bytes.len(), "pdf report generated"),
                Err(e) => warn!(task_id = %task_id, error = %e, "background pdf generation failed"),
            }
        });
    }

    /// 렌더링 후 산출물을 원자적으로 저장합니다.
    async fn generate_report(
        &self,
        input: ReportInput,
        format: ReportFormat,
    ) -> Result<Vec<u8>, OrchestratorError> {
        let result = self.render_and_store(input, format).await;
        let outcome = if result.is_ok() { "success" } else { "failure" };
        metrics::counter!(
            m::REPORTS_GENERATED_TOTAL,
            m::LABEL_FORMAT => format.as_str(),
            m::LABEL_RESULT => outcome
        )
        .increment(1);
        result
    }

    async fn render_and_store(
        &self,
        input: ReportInput,
        format: ReportFormat,
    ) -> Result<Vec<u8>, OrchestratorError> {
        let path = self.inner.store.path_for(&input.task_id, format);
        let bytes = tokio::task::spawn_blocking(move || input.render(format, chrono::Utc::now()))
            .await
            .map_err(|e| OrchestratorError::ReportGeneration {
                format: format.to_string(),
                reason: format!("render worker aborted: {e}"),
            })??;
        self.inner
            .store
            .write_atomic(&path, &bytes)
            .await
            .map_err(|e| OrchestratorError::ReportGeneration {
                format: format.to_string(),
                reason: e.to_string(),
            })?;
        Ok(bytes)
    }

    fn report_input(
        &self,
        snapshot: &TaskSnapshot,
        format: ReportFormat,
    ) -> Result<ReportInput, OrchestratorError> {
        match (&snapshot.result, &snapshot.report, snapshot.stats) {
            (Some(raw), Some(report), Some(stats)) => Ok(ReportInput {
                task_id: snapshot.task_id.to_string(),
                scan_type: snapshot.scan_type,
                target: snapshot.target.clone(),
                raw: Arc::clone(raw),
                report: Arc::clone(report),
                stats,
                locale: self.inner.config.locale,
                pdf_max_findings: self.inner.config.pdf_max_findings_per_target,
            }),
            _ => Err(OrchestratorError::ReportGeneration {
                format: format.to_string(),
                reason: "completed task has no result".to_owned(),
            }),
        }
    }

    /// 작업을 실패 상태로 종료합니다. `Pending` 작업은 `Running`을 거칩니다.
    async fn fail_task(&self, id: &TaskId, status: TaskStatus, message: String) {
        let registry = &self.inner.registry;
        if registry
            .get(id)
            .await
            .is_some_and(|t| t.status == TaskStatus::Pending)
        {
            registry.mark_running(id).await;
        }
        if registry
            .finish_with_error(id, status, message)
            .await
            .is_some()
        {
            metrics::counter!(m::TASKS_FINISHED_TOTAL, m::LABEL_RESULT => status.as_str())
                .increment(1);
            self.update_active_gauge().await;
        }
    }

    async fn update_active_gauge(&self) {
        let active = self.inner.registry.active_count().await;
        metrics::gauge!(m::ACTIVE_TASKS).set(active as f64);
    }
}

/// [`ScanOrchestrator`] 빌더
pub struct ScanOrchestratorBuilder<E: ScanEngine> {
    config: OrchestratorConfig,
    engine: Option<E>,
}

impl<E: ScanEngine> ScanOrchestratorBuilder<E> {
    pub fn new() -> Self {
        Self {
            config: OrchestratorConfig::default(),
            engine: None,
        }
    }

    pub fn config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn engine(mut self, engine: E) -> Self {
        self.engine = Some(engine);
        self
    }

    /// 설정을 검증하고 오케스트레이터를 생성합니다.
    ///
    /// # Errors
    ///
    /// 엔진이 지정되지 않았거나 설정이 유효하지 않으면 `OrchestratorError::Config`
    pub fn build(self) -> Result<ScanOrchestrator<E>, OrchestratorError> {
        self.config.validate()?;
        let engine = self.engine.ok_or_else(|| OrchestratorError::Config {
            field: "engine".to_owned(),
            reason: "scan engine is required".to_owned(),
        })?;

        let config = self.config;
        let inner = Inner {
            registry: TaskRegistry::new(config.admission_limit(), config.max_retained_tasks),
            store: ArtifactStore::new(config.results_dir.clone()),
            scan_permits: Arc::new(Semaphore::new(config.max_concurrent_scans)),
            pdf_permits: Arc::new(Semaphore::new(config.pdf_workers.max(1))),
            tracker: TaskTracker::new(),
            engine,
            config,
        };
        Ok(ScanOrchestrator {
            inner: Arc::new(inner),
        })
    }
}

impl<E: ScanEngine> Default for ScanOrchestratorBuilder<E> {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_task_id(id: &str) -> Result<TaskId, OrchestratorError> {
    TaskId::parse(id).ok_or_else(|| OrchestratorError::NotFound(format!("task {id}")))
}

/// 스캔 대상을 정규화하고 검증합니다.
///
/// # 검증 규칙
///
/// - 앞뒤 공백 제거 후 비어있으면 안 됨
/// - `max_target_len` 이하
/// - 공백 및 제어 문자 금지
/// - `-`로 시작 금지 (엔진 플래그로 해석되지 않도록)
/// - 저장소 대상은 설정에 따라 `http://` 또는 `https://`로 시작
pub fn validate_target(
    config: &OrchestratorConfig,
    scan_type: ScanType,
    target: &str,
) -> Result<String, OrchestratorError> {
    let target = target.trim();
    if target.is_empty() {
        return Err(OrchestratorError::Validation("Target is required".to_owned()));
    }
    if target.len() > config.max_target_len {
        return Err(OrchestratorError::Validation(format!(
            "target exceeds maximum length of {} bytes",
            config.max_target_len
        )));
    }
    if target.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(OrchestratorError::Validation(
            "target must not contain whitespace or control characters".to_owned(),
        ));
    }
    if target.starts_with('-') {
        return Err(OrchestratorError::Validation(
            "target must not start with '-'".to_owned(),
        ));
    }
    if scan_type == ScanType::Repo
        && config.require_repo_url_scheme
        && !(target.starts_with("http://") || target.starts_with("https://"))
    {
        return Err(OrchestratorError::Validation(
            "repository target must start with http:// or https://".to_owned(),
        ));
    }
    Ok(target.to_owned())
}
