//! 도메인 타입 — 시스템 전역에서 사용되는 공통 타입
//!
//! 스캔 요청, 작업 상태, 심각도 등 모든 크레이트가 공유하는 값 타입을 정의합니다.

use std::fmt;

use serde::{Deserialize, Serialize};

/// 심각도 버킷
///
/// 통계 집계에 사용되는 네 가지 인식 심각도입니다.
/// `Ord` 구현으로 심각도 비교가 가능합니다 (`Low < Medium < High < Critical`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    /// 낮은 심각도
    Low,
    /// 중간 심각도
    Medium,
    /// 높은 심각도
    High,
    /// 치명적 — 즉시 대응 필요
    Critical,
}

impl Severity {
    /// 모든 버킷 (높은 심각도 순)
    pub const ALL: [Severity; 4] = [
        Severity::Critical,
        Severity::High,
        Severity::Medium,
        Severity::Low,
    ];

    /// 엔진이 보고한 심각도 문자열을 버킷으로 분류합니다.
    ///
    /// 대소문자를 구분하지 않으며 `CRITICAL`, `HIGH`, `MEDIUM`, `LOW`만 인식합니다.
    /// 그 외 값(`UNKNOWN`, `NEGLIGIBLE` 등)은 `None`입니다.
    pub fn from_str_loose(s: &str) -> Option<Self> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("critical") {
            Some(Self::Critical)
        } else if s.eq_ignore_ascii_case("high") {
            Some(Self::High)
        } else if s.eq_ignore_ascii_case("medium") {
            Some(Self::Medium)
        } else if s.eq_ignore_ascii_case("low") {
            Some(Self::Low)
        } else {
            None
        }
    }

    /// 엔진 명령행에 전달하는 대문자 이름
    pub fn as_engine_str(&self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
        }
    }

    /// 보고서용 지역화 라벨
    pub fn label(&self, locale: ReportLocale) -> &'static str {
        match (locale, self) {
            (ReportLocale::En, Self::Critical) => "Critical",
            (ReportLocale::En, Self::High) => "High",
            (ReportLocale::En, Self::Medium) => "Medium",
            (ReportLocale::En, Self::Low) => "Low",
            (ReportLocale::Zh, Self::Critical) => "严重",
            (ReportLocale::Zh, Self::High) => "高危",
            (ReportLocale::Zh, Self::Medium) => "中危",
            (ReportLocale::Zh, Self::Low) => "低危",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label(ReportLocale::En))
    }
}

/// 스캔 유형
///
/// 엔진 하위 명령과 대상 형식 검증 규칙을 결정합니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanType {
    /// 컨테이너 이미지 (예: `alpine:3.18`)
    Image,
    /// 소스 저장소 URL
    Repo,
}

impl ScanType {
    /// 문자열에서 스캔 유형을 파싱합니다 (대소문자 구분 없음).
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "image" => Some(Self::Image),
            "repo" => Some(Self::Repo),
            _ => None,
        }
    }

    /// 엔진 하위 명령 이름
    pub fn subcommand(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Repo => "repo",
        }
    }
}

impl fmt::Display for ScanType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.subcommand())
    }
}

/// 스캔 작업 상태
///
/// 상태 전이는 단방향입니다:
///
/// ```text
/// Pending -> Running -> Completed
///                    -> Failed
///                    -> TimedOut
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// 생성됨, 실행 대기 중
    Pending,
    /// 엔진 실행 중
    Running,
    /// 완료 (결과와 통계 보유)
    Completed,
    /// 실패 (에러 메시지 보유)
    Failed,
    /// 시간 초과 (에러 메시지 보유)
    #[serde(rename = "timeout")]
    TimedOut,
}

impl TaskStatus {
    /// 종료 상태 여부 (이후 전이 없음)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::TimedOut)
    }

    /// `next`로의 전이가 허용되는지 확인합니다.
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Running)
                | (Self::Running, Self::Completed)
                | (Self::Running, Self::Failed)
                | (Self::Running, Self::TimedOut)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::TimedOut => "timeout",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 보고서 언어
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportLocale {
    #[default]
    En,
    Zh,
}

impl ReportLocale {
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "en" | "english" => Some(Self::En),
            "zh" | "zh-cn" | "chinese" => Some(Self::Zh),
            _ => None,
        }
    }

    /// 발견 항목이 없는 대상에 표시할 문구
    pub fn no_findings_text(&self) -> &'static str {
        match self {
            Self::En => "No vulnerabilities found",
            Self::Zh => "未发现漏洞",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_ordering() {
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
        assert!(Severity::High < Severity::Critical);
    }

    #[test]
    fn severity_from_str_loose_recognizes_exactly_four() {
        assert_eq!(Severity::from_str_loose("CRITICAL"), Some(Severity::Critical));
        assert_eq!(Severity::from_str_loose("high"), Some(Severity::High));
        assert_eq!(Severity::from_str_loose("Medium"), Some(Severity::Medium));
        assert_eq!(Severity::from_str_loose("low"), Some(Severity::Low));
        assert_eq!(Severity::from_str_loose("UNKNOWN"), None);
        assert_eq!(Severity::from_str_loose("crit"), None);
        assert_eq!(Severity::from_str_loose(""), None);
    }

    #[test]
    fn severity_labels() {
        assert_eq!(Severity::Critical.label(ReportLocale::En), "Critical");
        assert_eq!(Severity::High.label(ReportLocale::Zh), "高危");
        assert_eq!(Severity::Low.to_string(), "Low");
        assert_eq!(Severity::Medium.as_engine_str(), "MEDIUM");
    }

    #[test]
    fn severity_serializes_uppercase() {
        let json = serde_json::to_string(&Severity::High).unwrap();
        assert_eq!(json, "\"HIGH\"");
    }

    #[test]
    fn scan_type_parse() {
        assert_eq!(ScanType::from_str_loose("image"), Some(ScanType::Image));
        assert_eq!(ScanType::from_str_loose("REPO"), Some(ScanType::Repo));
        assert_eq!(ScanType::from_str_loose("fs"), None);
        assert_eq!(ScanType::Repo.subcommand(), "repo");
    }

    #[test]
    fn task_status_transitions() {
        use TaskStatus::*;
        assert!(Pending.can_transition_to(Running));
        assert!(Running.can_transition_to(Completed));
        assert!(Running.can_transition_to(Failed));
        assert!(Running.can_transition_to(TimedOut));

        assert!(!Pending.can_transition_to(Completed));
        assert!(!Running.can_transition_to(Pending));
        for terminal in [Completed, Failed, TimedOut] {
            assert!(terminal.is_terminal());
            for next in [Pending, Running, Completed, Failed, TimedOut] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn task_status_wire_names() {
        assert_eq!(serde_json::to_string(&TaskStatus::TimedOut).unwrap(), "\"timeout\"");
        assert_eq!(serde_json::to_string(&TaskStatus::Pending).unwrap(), "\"pending\"");
        assert_eq!(TaskStatus::Completed.to_string(), "completed");
    }

    #[test]
    fn locale_parse() {
        assert_eq!(ReportLocale::from_str_loose("zh"), Some(ReportLocale::Zh));
        assert_eq!(ReportLocale::from_str_loose("EN"), Some(ReportLocale::En));
        assert_eq!(ReportLocale::from_str_loose("fr"), None);
        assert_eq!(ReportLocale::default(), ReportLocale::En);
    }
}
