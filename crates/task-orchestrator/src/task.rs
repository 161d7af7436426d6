//! 스캔 작업 모델
//!
//! [`ScanTask`]는 레지스트리 내부에서만 변경되는 작업 레코드이고,
//! 외부에는 복제된 [`TaskSnapshot`]만 노출됩니다.
//!
//! # 불변 조건
//!
//! - `id`, `scan_type`, `target`은 생성 후 변경되지 않습니다.
//! - 상태 전이는 [`TaskStatus::can_transition_to`]를 따르며 되돌아가지 않습니다.
//! - `raw` / `report` / `stats`는 `Completed` 전이와 함께 한 번에 설정됩니다.
//! - `error`는 `Failed` / `TimedOut`에서만 설정됩니다.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use uuid::Uuid;

use scanward_core::types::{ScanType, TaskStatus};

use crate::engine::ScanOptions;
use crate::result::EngineReport;
use crate::stats::SeverityStats;

/// 작업 ID (UUID v4)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(Uuid);

impl TaskId {
    /// 새 ID를 발급합니다.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// 문자열에서 ID를 파싱합니다. 형식이 맞지 않으면 `None`.
    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s.trim()).ok().map(Self)
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for TaskId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// 작업 레코드
#[derive(Debug, Clone)]
pub struct ScanTask {
    pub id: TaskId,
    /// 생성 순번 (같은 시각 생성 작업의 순서 결정용)
    pub seq: u64,
    pub scan_type: ScanType,
    pub target: String,
    pub options: ScanOptions,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub raw: Option<Arc<serde_json::Value>>,
    pub report: Option<Arc<EngineReport>>,
    pub stats: Option<SeverityStats>,
}

impl ScanTask {
    /// `Pending` 상태의 새 작업을 생성합니다.
    pub fn new(
        id: TaskId,
        seq: u64,
        scan_type: ScanType,
        target: String,
        options: ScanOptions,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            seq,
            scan_type,
            target,
            options,
            status: TaskStatus::Pending,
            created_at: now,
            started_at: None,
            completed_at: None,
            error: None,
            raw: None,
            report: None,
            stats: None,
        }
    }

    /// `Pending -> Running`
    pub fn start(&mut self, now: DateTime<Utc>) -> bool {
        if !self.status.can_transition_to(TaskStatus::Running) {
            return false;
        }
        self.status = TaskStatus::Running;
        self.started_at = Some(now);
        true
    }

    /// `Running -> Completed`, 결과와 통계를 함께 설정합니다.
    pub fn complete(
        &mut self,
        raw: Arc<serde_json::Value>,
        report: Arc<EngineReport>,
        stats: SeverityStats,
        now: DateTime<Utc>,
    ) -> bool {
        if !self.status.can_transition_to(TaskStatus::Completed) {
            return false;
        }
        self.status = TaskStatus::Completed;
        self.completed_at = Some(now);
        self.raw = Some(raw);
        self.report = Some(report);
        self.stats = Some(stats);
        true
    }

    /// `Running -> Failed | TimedOut`
    ///
    /// `status`가 실패 상태가 아니면 전이하지 않습니다.
    pub fn fail(&mut self, status: TaskStatus, error: String, now: DateTime<Utc>) -> bool {
        if !matches!(status, TaskStatus::Failed | TaskStatus::TimedOut)
            || !self.status.can_transition_to(status)
        {
            return false;
        }
        self.status = status;
        self.completed_at = Some(now);
        self.error = Some(error);
        true
    }

    pub fn snapshot(&self) -> TaskSnapshot {
        TaskSnapshot {
            task_id: self.id,
            scan_type: self.scan_type,
            target: self.target.clone(),
            status: self.status,
            created_at: self.created_at,
            started_at: self.started_at,
            completed_at: self.completed_at,
            error: self.error.clone(),
            result: self.raw.clone(),
            stats: self.stats,
            options: self.options.clone(),
            report: self.report.clone(),
        }
    }
}

/// 작업 조회 결과 (레코드의 일관된 복사본)
#[derive(Debug, Clone, Serialize)]
pub struct TaskSnapshot {
    pub task_id: TaskId,
    #[serde(rename = "type")]
    pub scan_type: ScanType,
    pub target: String,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// 엔진 원본 결과
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Arc<serde_json::Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<SeverityStats>,
    pub options: ScanOptions,
    #[serde(skip)]
    pub report: Option<Arc<EngineReport>>,
}

impl TaskSnapshot {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// 목록 응답용 요약
    pub fn summary(&self) -> TaskSummary {
        TaskSummary {
            task_id: self.task_id,
            scan_type: self.scan_type,
            target: self.target.clone(),
            status: self.status,
            created_at: self.created_at,
            completed_at: self.completed_at,
        }
    }
}

/// 작업 목록 항목
#[derive(Debug, Clone, Serialize)]
pub struct TaskSummary {
    pub task_id: TaskId,
    #[serde(rename = "type")]
    pub scan_type: ScanType,
    pub target: String,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}
