//! 메트릭 상수 및 설명 등록
//!
//! 스캔 작업 관련 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 오케스트레이터는 이 상수로 `metrics::counter!()`, `metrics::gauge!()`,
//! `metrics::histogram!()` 매크로를 호출합니다.
//! 레코더가 설치되지 않은 경우 기록은 아무 동작도 하지 않습니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `scanward_`
//! - 접미어: `_total` (counter), `_seconds` (histogram/latency), 없음 (gauge)
//!
//! # 사용 예시
//!
//! ```ignore
//! use metrics::counter;
//!
//! counter!(scanward_core::metrics::TASKS_SUBMITTED_TOTAL).increment(1);
//! ```

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 심각도 레이블 키 (critical, high, medium, low)
pub const LABEL_SEVERITY: &str = "severity";

/// 결과 레이블 키 (completed, failed, timeout / success, failure)
pub const LABEL_RESULT: &str = "result";

/// 보고서 형식 레이블 키 (raw, html, pdf)
pub const LABEL_FORMAT: &str = "format";

// ─── 작업 메트릭 ────────────────────────────────────────────────────

/// 접수된 스캔 작업 수 (counter)
pub const TASKS_SUBMITTED_TOTAL: &str = "scanward_tasks_submitted_total";

/// 종료 상태에 도달한 작업 수 (counter, label: result)
pub const TASKS_FINISHED_TOTAL: &str = "scanward_tasks_finished_total";

/// 엔진 실행 소요 시간 (histogram, 초)
pub const SCAN_DURATION_SECONDS: &str = "scanward_scan_duration_seconds";

/// 대기 또는 실행 중인 작업 수 (gauge)
pub const ACTIVE_TASKS: &str = "scanward_active_tasks";

// ─── 보고서 메트릭 ──────────────────────────────────────────────────

/// 생성된 보고서 수 (counter, label: format, result)
pub const REPORTS_GENERATED_TOTAL: &str = "scanward_reports_generated_total";

/// 집계된 발견 항목 수 (counter, label: severity)
pub const FINDINGS_TOTAL: &str = "scanward_findings_total";

// ─── 히스토그램 버킷 정의 ────────────────────────────────────────────

/// 스캔 소요 시간 히스토그램 버킷 (초)
///
/// 1s ~ 600s 범위 (이미지 다운로드와 DB 업데이트 포함)
pub const SCAN_DURATION_BUCKETS: [f64; 9] =
    [1.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 450.0, 600.0];

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// 전역 레코더 설치 후 한 번만 호출해야 합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge, describe_histogram};

    describe_counter!(
        TASKS_SUBMITTED_TOTAL,
        "Total number of scan tasks accepted for execution"
    );
    describe_counter!(
        TASKS_FINISHED_TOTAL,
        "Total number of scan tasks that reached a terminal state, by result"
    );
    describe_histogram!(
        SCAN_DURATION_SECONDS,
        "Wall-clock duration of a single engine invocation in seconds"
    );
    describe_gauge!(
        ACTIVE_TASKS,
        "Number of scan tasks currently pending or running"
    );
    describe_counter!(
        REPORTS_GENERATED_TOTAL,
        "Total number of report artifacts rendered, by format and result"
    );
    describe_counter!(
        FINDINGS_TOTAL,
        "Total number of findings aggregated from completed scans, by severity"
    );
}
