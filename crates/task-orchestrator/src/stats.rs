//! 심각도 통계 집계
//!
//! 모든 하위 대상의 모든 발견 항목을 네 버킷으로 집계합니다.
//! 인식하지 못한 심각도(`UNKNOWN` 등)는 어느 버킷에도 들어가지 않고 `total`만 증가시킵니다.

use serde::{Deserialize, Serialize};

use scanward_core::types::Severity;

use crate::result::EngineReport;

/// 심각도별 발견 항목 수
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityStats {
    pub critical: u64,
    pub high: u64,
    pub medium: u64,
    pub low: u64,
    /// 인식하지 못한 심각도를 포함한 전체 발견 항목 수
    pub total: u64,
}

impl SeverityStats {
    /// 보고서의 모든 발견 항목을 집계합니다.
    pub fn aggregate(report: &EngineReport) -> Self {
        let mut stats = Self::default();
        for finding in report.findings() {
            stats.record(finding.severity.as_deref());
        }
        stats
    }

    /// 발견 항목 1건을 기록합니다.
    pub fn record(&mut self, severity: Option<&str>) {
        self.total += 1;
        match severity.and_then(Severity::from_str_loose) {
            Some(Severity::Critical) => self.critical += 1,
            Some(Severity::High) => self.high += 1,
            Some(Severity::Medium) => self.medium += 1,
            Some(Severity::Low) => self.low += 1,
            None => {}
        }
    }

    /// 버킷 값 조회
    pub fn count(&self, severity: Severity) -> u64 {
        match severity {
            Severity::Critical => self.critical,
            Severity::High => self.high,
            Severity::Medium => self.medium,
            Severity::Low => self.low,
        }
    }

    /// 어느 버킷에도 속하지 않은 발견 항목 수
    pub fn unclassified(&self) -> u64 {
        self.total
            .saturating_sub(self.critical + self.high + self.medium + self.low)
    }
}
