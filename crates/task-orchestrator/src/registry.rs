//! 작업 레지스트리
//!
//! [`TaskRegistry`]는 모든 작업 레코드를 소유하는 유일한 공유 상태입니다.
//! 모든 변경은 쓰기 잠금 안에서 한 번에 이루어지므로 조회 쪽은
//! 중간 상태의 레코드를 볼 수 없습니다.
//!
//! 레지스트리는 휘발성입니다. 프로세스가 재시작되면 작업 목록은 비워지고,
//! 결과 디렉토리의 산출물만 남습니다.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use scanward_core::types::{ScanType, TaskStatus};

use crate::engine::ScanOptions;
use crate::error::OrchestratorError;
use crate::result::EngineReport;
use crate::stats::SeverityStats;
use crate::task::{ScanTask, TaskId, TaskSnapshot};

#[derive(Debug, Default)]
struct RegistryState {
    tasks: HashMap<TaskId, ScanTask>,
    next_seq: u64,
    /// 종료되지 않은 작업 수
    active: usize,
}

/// 휘발성 작업 레지스트리
#[derive(Debug)]
pub struct TaskRegistry {
    state: RwLock<RegistryState>,
    /// 활성 작업 수용 한도
    admission_limit: usize,
    /// 보관할 종료 작업 최대 수 (0 = 무제한)
    max_retained: usize,
}

impl TaskRegistry {
    pub fn new(admission_limit: usize, max_retained: usize) -> Self {
        Self {
            state: RwLock::new(RegistryState::default()),
            admission_limit,
            max_retained,
        }
    }

    /// 한도를 확인하고 `Pending` 작업을 등록합니다.
    ///
    /// 한도 확인과 등록은 같은 잠금 안에서 수행됩니다.
    pub async fn admit(
        &self,
        scan_type: ScanType,
        target: String,
        options: ScanOptions,
    ) -> Result<TaskSnapshot, OrchestratorError> {
        let mut state = self.state.write().await;
        if state.active >= self.admission_limit {
            return Err(OrchestratorError::Busy {
                active: state.active,
                limit: self.admission_limit,
            });
        }

        let mut id = TaskId::new();
        while state.tasks.contains_key(&id) {
            id = TaskId::new();
        }
        let seq = state.next_seq;
        state.next_seq += 1;
        state.active += 1;

        let task = ScanTask::new(id, seq, scan_type, target, options, Utc::now());
        let snapshot = task.snapshot();
        state.tasks.insert(id, task);
        Ok(snapshot)
    }

    pub async fn get(&self, id: &TaskId) -> Option<TaskSnapshot> {
        self.state.read().await.tasks.get(id).map(ScanTask::snapshot)
    }

    /// 모든 작업을 생성 시각 내림차순으로 반환합니다.
    pub async fn list(&self) -> Vec<TaskSnapshot> {
        let state = self.state.read().await;
        let mut tasks: Vec<&ScanTask> = state.tasks.values().collect();
        tasks.sort_by(|a, b| (b.created_at, b.seq).cmp(&(a.created_at, a.seq)));
        tasks.into_iter().map(ScanTask::snapshot).collect()
    }

    /// `Pending -> Running`
    pub async fn mark_running(&self, id: &TaskId) -> Option<TaskSnapshot> {
        let mut state = self.state.write().await;
        let task = state.tasks.get_mut(id)?;
        if !task.start(Utc::now()) {
            warn!(task_id = %id, status = %task.status, "rejected transition to running");
            return None;
        }
        Some(task.snapshot())
    }

    /// `Running -> Completed`
    pub async fn complete(
        &self,
        id: &TaskId,
        raw: Arc<serde_json::Value>,
        report: Arc<EngineReport>,
        stats: SeverityStats,
    ) -> Option<TaskSnapshot> {
        let mut state = self.state.write().await;
        let task = state.tasks.get_mut(id)?;
        if !task.complete(raw, report, stats, Utc::now()) {
            warn!(task_id = %id, status = %task.status, "rejected transition to completed");
            return None;
        }
        let snapshot = task.snapshot();
        Self::on_terminal(&mut state, self.max_retained, id);
        Some(snapshot)
    }

    /// `Running -> Failed | TimedOut`
    pub async fn finish_with_error(
        &self,
        id: &TaskId,
        status: TaskStatus,
        error: String,
    ) -> Option<TaskSnapshot> {
        let mut state = self.state.write().await;
        let task = state.tasks.get_mut(id)?;
        if !task.fail(status, error, Utc::now()) {
            warn!(task_id = %id, status = %task.status, target_status = %status, "rejected transition");
            return None;
        }
        let snapshot = task.snapshot();
        Self::on_terminal(&mut state, self.max_retained, id);
        Some(snapshot)
    }

    /// 종료되지 않은 작업 수
    pub async fn active_count(&self) -> usize {
        self.state.read().await.active
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.tasks.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// 활성 수를 줄이고, 보존 한도를 넘으면 가장 먼저 종료된 작업부터 제거합니다.
    ///
    /// 방금 종료된 작업은 제거 대상에서 제외됩니다.
    fn on_terminal(state: &mut RegistryState, max_retained: usize, finished: &TaskId) {
        state.active = state.active.saturating_sub(1);
        if max_retained == 0 {
            return;
        }

        let mut candidates: Vec<(chrono::DateTime<Utc>, u64, TaskId)> = state
            .tasks
            .values()
            .filter(|t| t.status.is_terminal() && t.id != *finished)
            .map(|t| (t.completed_at.unwrap_or(t.created_at), t.seq, t.id))
            .collect();
        // 방금 종료된 작업 1건이 보존 한도 하나를 차지
        let keep = max_retained - 1;
        if candidates.len() <= keep {
            return;
        }
        candidates.sort_unstable();
        let excess = candidates.len() - keep;
        for (_, _, id) in candidates.into_iter().take(excess) {
            state.tasks.remove(&id);
            debug!(task_id = %id, "evicted terminal task from registry");
        }
    }
}
