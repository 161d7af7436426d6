//! 헬스 상태 — 컴포넌트 상태 보고용 공통 타입

use std::fmt;

use serde::{Deserialize, Serialize};

/// 컴포넌트 헬스 상태
///
/// `Degraded`와 `Unhealthy`는 원인 설명을 함께 담습니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum HealthStatus {
    /// 정상
    Healthy,
    /// 일부 기능 제한 상태
    Degraded(String),
    /// 동작 불가
    Unhealthy(String),
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }

    pub fn is_unhealthy(&self) -> bool {
        matches!(self, Self::Unhealthy(_))
    }

    /// 상태 이름을 반환합니다 (`healthy`, `degraded`, `unhealthy`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Degraded(_) => "degraded",
            Self::Unhealthy(_) => "unhealthy",
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Degraded(reason) => write!(f, "degraded: {reason}"),
            Self::Unhealthy(reason) => write!(f, "unhealthy: {reason}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn predicates() {
        assert!(HealthStatus::Healthy.is_healthy());
        assert!(!HealthStatus::Degraded("x".to_owned()).is_healthy());
        assert!(HealthStatus::Unhealthy("x".to_owned()).is_unhealthy());
    }

    #[test]
    fn display_includes_reason() {
        let status = HealthStatus::Degraded("pdf disabled".to_owned());
        assert_eq!(status.to_string(), "degraded: pdf disabled");
        assert_eq!(status.as_str(), "degraded");
    }
}
