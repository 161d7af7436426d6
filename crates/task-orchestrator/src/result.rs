//! 엔진 결과 모델
//!
//! Trivy JSON 출력 중 통계와 보고서에 필요한 필드만 타입으로 정의합니다.
//! 알 수 없는 필드는 무시하고, 누락된 필드는 기본값으로 채웁니다.

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::OrchestratorError;

/// 엔진 보고서 최상위 구조
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineReport {
    #[serde(rename = "ArtifactName", default)]
    pub artifact_name: Option<String>,
    #[serde(rename = "ArtifactType", default)]
    pub artifact_type: Option<String>,
    /// 하위 대상 목록 (패키지 매니저, OS 레이어 등)
    #[serde(rename = "Results", default)]
    pub results: Option<Vec<TargetResult>>,
}

/// 하위 대상별 결과
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TargetResult {
    #[serde(rename = "Target", default, deserialize_with = "null_as_empty")]
    pub target: String,
    #[serde(rename = "Class", default)]
    pub class: Option<String>,
    #[serde(rename = "Type", default)]
    pub kind: Option<String>,
    #[serde(rename = "Vulnerabilities", default)]
    pub vulnerabilities: Option<Vec<Finding>>,
}

/// 발견 항목 (취약점 1건)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    #[serde(rename = "VulnerabilityID", default, deserialize_with = "null_as_empty")]
    pub vulnerability_id: String,
    #[serde(rename = "PkgName", default, deserialize_with = "null_as_empty")]
    pub pkg_name: String,
    #[serde(rename = "InstalledVersion", default, deserialize_with = "null_as_empty")]
    pub installed_version: String,
    #[serde(rename = "FixedVersion", default)]
    pub fixed_version: Option<String>,
    #[serde(rename = "Severity", default)]
    pub severity: Option<String>,
    #[serde(rename = "Title", default)]
    pub title: Option<String>,
}

/// `null` 문자열 필드를 빈 문자열로 읽습니다.
fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

impl EngineReport {
    /// 원본 JSON 값에서 보고서를 파싱합니다.
    pub fn from_value(value: &serde_json::Value) -> Result<Self, OrchestratorError> {
        Self::deserialize(value)
            .map_err(|e| OrchestratorError::ResultParse(format!("unexpected report shape: {e}")))
    }

    /// 하위 대상 목록 (없으면 빈 슬라이스)
    pub fn targets(&self) -> &[TargetResult] {
        self.results.as_deref().unwrap_or(&[])
    }

    /// 모든 하위 대상의 발견 항목을 순회합니다.
    pub fn findings(&self) -> impl Iterator<Item = &Finding> {
        self.targets().iter().flat_map(TargetResult::findings)
    }
}

impl TargetResult {
    pub fn findings(&self) -> &[Finding] {
        self.vulnerabilities.as_deref().unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_minimal_report() {
        let value = json!({
            "SchemaVersion": 2,
            "ArtifactName": "alpine:3.18",
            "Results": [
                {
                    "Target": "alpine:3.18 (alpine 3.18.0)",
                    "Class": "os-pkgs",
                    "Type": "alpine",
                    "Vulnerabilities": [
                        {
                            "VulnerabilityID": "CVE-2023-0001",
                            "PkgName": "openssl",
                            "InstalledVersion": "3.1.0-r0",
                            "FixedVersion": "3.1.1-r0",
                            "Severity": "HIGH",
                            "Extra": true
                        }
                    ]
                },
                { "Target": "app/package-lock.json" }
            ]
        });
        let report = EngineReport::from_value(&value).unwrap();
        assert_eq!(report.artifact_name.as_deref(), Some("alpine:3.18"));
        assert_eq!(report.targets().len(), 2);
        assert_eq!(report.findings().count(), 1);
        assert!(report.targets()[1].findings().is_empty());

        let finding = &report.targets()[0].findings()[0];
        assert_eq!(finding.vulnerability_id, "CVE-2023-0001");
        assert_eq!(finding.severity.as_deref(), Some("HIGH"));
    }

    #[test]
    fn missing_results_yields_no_findings() {
        let report = EngineReport::from_value(&json!({"SchemaVersion": 2})).unwrap();
        assert!(report.targets().is_empty());
        assert_eq!(report.findings().count(), 0);
    }

    #[test]
    fn null_results_yields_no_findings() {
        let report = EngineReport::from_value(&json!({"Results": null})).unwrap();
        assert!(report.targets().is_empty());
    }

    #[test]
    fn null_string_fields_read_as_empty() {
        let value = json!({
            "Results": [
                {
                    "Target": null,
                    "Vulnerabilities": [
                        {
                            "VulnerabilityID": "CVE-2024-0002",
                            "PkgName": null,
                            "InstalledVersion": null,
                            "Severity": "CRITICAL"
                        },
                        { "VulnerabilityID": null, "Severity": "LOW" }
                    ]
                }
            ]
        });
        let report = EngineReport::from_value(&value).unwrap();
        assert_eq!(report.targets()[0].target, "");

        let findings = report.targets()[0].findings();
        assert_eq!(findings.len(), 2);
        assert_eq!(findings[0].pkg_name, "");
        assert_eq!(findings[0].installed_version, "");
        assert_eq!(findings[1].vulnerability_id, "");

        let stats = crate::stats::SeverityStats::aggregate(&report);
        assert_eq!(stats.total, 2);
        assert_eq!(stats.critical, 1);
        assert_eq!(stats.low, 1);
    }

    #[test]
    fn wrong_shape_is_parse_error() {
        let err = EngineReport::from_value(&json!({"Results": "oops"})).unwrap_err();
        assert!(matches!(err, OrchestratorError::ResultParse(_)));
    }
}
