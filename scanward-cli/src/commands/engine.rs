//! `scanward engine` command handler

use std::io::Write;

use serde::Serialize;

use scanward_core::config::ScanwardConfig;
use scanward_orchestrator::{HealthSnapshot, OrchestratorConfig, ScanOrchestrator};

use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `engine` command.
///
/// # Errors
///
/// Returns `CliError::Command` when the scan engine cannot be invoked.
pub async fn execute(config: &ScanwardConfig, writer: &OutputWriter) -> Result<(), CliError> {
    let orch_config = OrchestratorConfig::from_core(config);
    let executable = orch_config.executable.clone();
    let orchestrator = ScanOrchestrator::with_trivy(orch_config)?;

    let report = EngineReport::from_snapshot(executable, orchestrator.health().await);
    writer.render(&report)?;

    if !report.available {
        return Err(CliError::Command(format!(
            "scan engine '{}' is not available",
            report.executable
        )));
    }
    Ok(())
}

/// Engine health report.
#[derive(Debug, Serialize)]
pub struct EngineReport {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub engine: String,
    pub executable: String,
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub pdf_support_available: bool,
}

impl EngineReport {
    fn from_snapshot(executable: String, snapshot: HealthSnapshot) -> Self {
        use scanward_core::health::HealthStatus;

        let reason = match &snapshot.status {
            HealthStatus::Healthy => None,
            HealthStatus::Degraded(r) | HealthStatus::Unhealthy(r) => Some(r.clone()),
        };
        Self {
            status: snapshot.status.as_str().to_owned(),
            reason,
            engine: snapshot.engine_name,
            executable,
            available: snapshot.engine_available,
            version: snapshot.engine_version,
            pdf_support_available: snapshot.pdf_support_available,
        }
    }
}

impl Render for EngineReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        let status = match self.status.as_str() {
            "healthy" => self.status.green().bold(),
            "degraded" => self.status.yellow().bold(),
            _ => self.status.red().bold(),
        };
        writeln!(w, "Engine: {} ({})", self.engine.bold(), self.executable)?;
        writeln!(w, "  Status:  {}", status)?;
        if let Some(ref reason) = self.reason {
            writeln!(w, "  Reason:  {}", reason)?;
        }
        writeln!(
            w,
            "  Version: {}",
            self.version.as_deref().unwrap_or("-")
        )?;
        writeln!(
            w,
            "  PDF:     {}",
            if self.pdf_support_available {
                "enabled"
            } else {
                "disabled"
            }
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scanward_core::health::HealthStatus;

    fn snapshot(status: HealthStatus, available: bool) -> HealthSnapshot {
        HealthSnapshot {
            status,
            engine_name: "trivy".to_owned(),
            engine_available: available,
            engine_version: available.then(|| "0.50.1".to_owned()),
            pdf_support_available: true,
            active_tasks: 0,
        }
    }

    #[test]
    fn healthy_snapshot_has_no_reason() {
        let report = EngineReport::from_snapshot(
            "/usr/bin/trivy".to_owned(),
            snapshot(HealthStatus::Healthy, true),
        );
        assert_eq!(report.status, "healthy");
        assert!(report.reason.is_none());
        assert_eq!(report.version.as_deref(), Some("0.50.1"));
    }

    #[test]
    fn unhealthy_snapshot_renders_reason() {
        colored::control::set_override(false);
        let report = EngineReport::from_snapshot(
            "trivy".to_owned(),
            snapshot(HealthStatus::Unhealthy("trivy is not available".to_owned()), false),
        );
        let mut buffer = Vec::new();
        report.render_text(&mut buffer).expect("render");
        let output = String::from_utf8(buffer).expect("valid UTF-8");
        assert!(output.contains("Status:  unhealthy"));
        assert!(output.contains("Reason:  trivy is not available"));
        assert!(output.contains("Version: -"));
    }

    #[test]
    fn json_omits_missing_version() {
        let report = EngineReport::from_snapshot(
            "trivy".to_owned(),
            snapshot(HealthStatus::Unhealthy("down".to_owned()), false),
        );
        let value = serde_json::to_value(&report).expect("serializable");
        assert_eq!(value["available"], false);
        assert!(value.get("version").is_none());
    }
}
