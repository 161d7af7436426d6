//! `scanward scan` command handler

use std::collections::VecDeque;
use std::io::Write;
use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};

use scanward_core::config::ScanwardConfig;
use scanward_core::types::{ScanType, Severity, TaskStatus};
use scanward_orchestrator::{
    OrchestratorConfig, OrchestratorError, ReportFormat, ScanEngine, ScanOptions,
    ScanOrchestrator, SeverityStats, TaskId, TaskSnapshot,
};

use crate::cli::ScanArgs;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `scan` command.
///
/// Every target is submitted to an in-process orchestrator. When the
/// orchestrator is saturated, the oldest outstanding task is awaited before
/// the next submission is retried.
///
/// # Errors
///
/// - `CliError::Command` if any scan was rejected, failed or timed out
/// - `CliError::Scan` if all scans completed and at least one finding was reported
pub async fn execute(
    args: ScanArgs,
    config: &ScanwardConfig,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let orch_config = OrchestratorConfig::from_core(config);
    let options = build_options(&args, &orch_config.default_options)?;
    let orchestrator = ScanOrchestrator::with_trivy(orch_config)?;

    let report = run_scans(&orchestrator, &args, options).await;
    orchestrator.shutdown().await;

    writer.render(&report)?;

    let unsuccessful = report.unsuccessful();
    if unsuccessful > 0 {
        return Err(CliError::Command(format!(
            "{} of {} scans did not complete",
            unsuccessful,
            report.scans.len()
        )));
    }
    if report.totals.total > 0 {
        return Err(CliError::Scan(format!(
            "found {} vulnerabilities",
            report.totals.total
        )));
    }
    Ok(())
}

/// Merge command-line flags over the configured default options.
fn build_options(args: &ScanArgs, defaults: &ScanOptions) -> Result<ScanOptions, CliError> {
    let severities = if args.severity.is_empty() {
        defaults.severities.clone()
    } else {
        args.severity
            .iter()
            .map(|s| {
                Severity::from_str_loose(s.trim()).ok_or_else(|| {
                    CliError::Command(format!(
                        "invalid severity: {} (expected: critical, high, medium, low)",
                        s
                    ))
                })
            })
            .collect::<Result<Vec<_>, _>>()?
    };

    Ok(ScanOptions {
        severities,
        skip_update: args.skip_update || defaults.skip_update,
        ignore_unfixed: args.ignore_unfixed || defaults.ignore_unfixed,
    })
}

async fn run_scans<E: ScanEngine>(
    orchestrator: &ScanOrchestrator<E>,
    args: &ScanArgs,
    options: ScanOptions,
) -> ScanReport {
    let scan_type: ScanType = args.kind.into();
    let poll = Duration::from_millis(args.poll_interval_ms.max(10));
    let mut outstanding: VecDeque<TaskId> = VecDeque::new();
    let mut scans = Vec::with_capacity(args.targets.len());

    for target in &args.targets {
        loop {
            match orchestrator
                .submit_with_options(scan_type, target, Some(options.clone()))
                .await
            {
                Ok(id) => {
                    info!(task_id = %id, target = %target, "scan submitted");
                    outstanding.push_back(id);
                    break;
                }
                Err(OrchestratorError::Busy { .. }) if !outstanding.is_empty() => {
                    if let Some(id) = outstanding.pop_front() {
                        scans.push(settle(orchestrator, &id, poll, args).await);
                    }
                }
                Err(e) => {
                    warn!(target = %target, error = %e, "scan rejected");
                    scans.push(ScanOutcome::rejected(scan_type, target, &e));
                    break;
                }
            }
        }
    }

    while let Some(id) = outstanding.pop_front() {
        scans.push(settle(orchestrator, &id, poll, args).await);
    }

    ScanReport::new(scans)
}

/// Wait for a task to finish and collect its requested reports.
async fn settle<E: ScanEngine>(
    orchestrator: &ScanOrchestrator<E>,
    id: &TaskId,
    poll: Duration,
    args: &ScanArgs,
) -> ScanOutcome {
    let snapshot = match orchestrator.wait_until_terminal(id, poll).await {
        Ok(snapshot) => snapshot,
        Err(e) => {
            return ScanOutcome {
                task_id: Some(id.to_string()),
                scan_type: args.kind.into(),
                target: String::new(),
                status: "unknown".to_owned(),
                error: Some(e.to_string()),
                stats: None,
                reports: Vec::new(),
            };
        }
    };

    let mut outcome = ScanOutcome::from_snapshot(&snapshot);
    if snapshot.status != TaskStatus::Completed {
        return outcome;
    }

    let wanted = [(args.html, ReportFormat::Html), (args.pdf, ReportFormat::Pdf)];
    for format in wanted
        .into_iter()
        .filter_map(|(enabled, format)| enabled.then_some(format))
    {
        match orchestrator.get_report(&id.to_string(), format).await {
            Ok(artifact) => outcome.reports.push(ReportPath {
                format: format.as_str().to_owned(),
                path: artifact.path.display().to_string(),
            }),
            Err(e) => warn!(task_id = %id, format = %format, error = %e, "report unavailable"),
        }
    }
    outcome
}

/// Result of a `scan` invocation.
#[derive(Debug, Serialize)]
pub struct ScanReport {
    pub scans: Vec<ScanOutcome>,
    /// Sum of every completed scan's statistics
    pub totals: SeverityStats,
}

impl ScanReport {
    fn new(scans: Vec<ScanOutcome>) -> Self {
        let mut totals = SeverityStats::default();
        for stats in scans.iter().filter_map(|s| s.stats.as_ref()) {
            totals.critical += stats.critical;
            totals.high += stats.high;
            totals.medium += stats.medium;
            totals.low += stats.low;
            totals.total += stats.total;
        }
        Self { scans, totals }
    }

    /// Number of scans that did not reach `completed`.
    fn unsuccessful(&self) -> usize {
        self.scans
            .iter()
            .filter(|s| s.status != TaskStatus::Completed.as_str())
            .count()
    }
}

/// Outcome of a single target.
#[derive(Debug, Serialize)]
pub struct ScanOutcome {
    /// `None` when the target was rejected before a task was created
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(rename = "type")]
    pub scan_type: ScanType,
    pub target: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<SeverityStats>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub reports: Vec<ReportPath>,
}

impl ScanOutcome {
    fn from_snapshot(snapshot: &TaskSnapshot) -> Self {
        Self {
            task_id: Some(snapshot.task_id.to_string()),
            scan_type: snapshot.scan_type,
            target: snapshot.target.clone(),
            status: snapshot.status.as_str().to_owned(),
            error: snapshot.error.clone(),
            stats: snapshot.stats,
            reports: Vec::new(),
        }
    }

    fn rejected(scan_type: ScanType, target: &str, error: &OrchestratorError) -> Self {
        Self {
            task_id: None,
            scan_type,
            target: target.to_owned(),
            status: "rejected".to_owned(),
            error: Some(error.to_string()),
            stats: None,
            reports: Vec::new(),
        }
    }
}

/// Location of a generated report.
#[derive(Debug, Serialize)]
pub struct ReportPath {
    pub format: String,
    pub path: String,
}

impl Render for ScanReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        for scan in &self.scans {
            writeln!(w, "Scan: {} ({})", scan.target.bold(), scan.scan_type)?;
            if let Some(ref id) = scan.task_id {
                writeln!(w, "  Task:     {}", id)?;
            }
            let status = match scan.status.as_str() {
                "completed" => scan.status.green(),
                "timeout" => scan.status.yellow(),
                _ => scan.status.red(),
            };
            writeln!(w, "  Status:   {}", status)?;
            if let Some(ref error) = scan.error {
                writeln!(w, "  Error:    {}", error.red())?;
            }
            if let Some(ref stats) = scan.stats {
                writeln!(w, "  Findings: {}", format_stats(stats))?;
            }
            for report in &scan.reports {
                writeln!(w, "  Report:   {} -> {}", report.format, report.path)?;
            }
            writeln!(w)?;
        }

        let summary = format!(
            "{} scan(s), {} finding(s)",
            self.scans.len(),
            self.totals.total
        );
        if self.totals.total > 0 || self.unsuccessful() > 0 {
            writeln!(w, "Summary: {}", summary.red().bold())?;
        } else {
            writeln!(w, "Summary: {}", summary.green().bold())?;
        }
        Ok(())
    }
}

fn format_stats(stats: &SeverityStats) -> String {
    if stats.total == 0 {
        return "none".to_owned();
    }
    let mut line = format!(
        "{} (critical {}, high {}, medium {}, low {}",
        stats.total, stats.critical, stats.high, stats.medium, stats.low
    );
    let other = stats.unclassified();
    if other > 0 {
        line.push_str(&format!(", other {other}"));
    }
    line.push(')');
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::TargetKind;

    fn args(severity: &[&str]) -> ScanArgs {
        ScanArgs {
            targets: vec!["nginx:latest".to_owned()],
            kind: TargetKind::Image,
            severity: severity.iter().map(|s| (*s).to_owned()).collect(),
            skip_update: true,
            ignore_unfixed: false,
            html: false,
            pdf: false,
            poll_interval_ms: 500,
        }
    }

    fn stats(critical: u64, high: u64, total: u64) -> SeverityStats {
        SeverityStats {
            critical,
            high,
            total,
            ..SeverityStats::default()
        }
    }

    fn outcome(status: &str, stats: Option<SeverityStats>) -> ScanOutcome {
        ScanOutcome {
            task_id: Some("7f3c9a52-8a1e-4c0e-9d61-3b2f5f8e1a00".to_owned()),
            scan_type: ScanType::Image,
            target: "nginx:latest".to_owned(),
            status: status.to_owned(),
            error: None,
            stats,
            reports: Vec::new(),
        }
    }

    #[test]
    fn options_default_to_config() {
        let defaults = ScanOptions::default();
        let options = build_options(&args(&[]), &defaults).expect("valid options");
        assert_eq!(options.severities, defaults.severities);
        assert!(options.skip_update);
    }

    #[test]
    fn options_parse_severity_flags() {
        let options =
            build_options(&args(&["critical", "HIGH"]), &ScanOptions::default()).expect("valid");
        assert_eq!(options.severities, vec![Severity::Critical, Severity::High]);
    }

    #[test]
    fn options_reject_unknown_severity() {
        let err = build_options(&args(&["urgent"]), &ScanOptions::default()).unwrap_err();
        assert!(err.to_string().contains("invalid severity: urgent"));
    }

    #[test]
    fn report_totals_sum_completed_scans() {
        let report = ScanReport::new(vec![
            outcome("completed", Some(stats(1, 2, 6))),
            outcome("completed", Some(stats(0, 1, 1))),
            outcome("failed", None),
        ]);
        assert_eq!(report.totals.critical, 1);
        assert_eq!(report.totals.high, 3);
        assert_eq!(report.totals.total, 7);
        assert_eq!(report.unsuccessful(), 1);
    }

    #[test]
    fn text_output_lists_findings_and_reports() {
        colored::control::set_override(false);
        let mut scan = outcome("completed", Some(stats(1, 2, 6)));
        scan.reports.push(ReportPath {
            format: "html".to_owned(),
            path: "/tmp/results/x.html".to_owned(),
        });
        let report = ScanReport::new(vec![scan]);

        let mut buffer = Vec::new();
        report.render_text(&mut buffer).expect("render");
        let output = String::from_utf8(buffer).expect("valid UTF-8");
        assert!(output.contains("Scan: nginx:latest (image)"));
        assert!(output.contains("Findings: 6 (critical 1, high 2, medium 0, low 0, other 3)"));
        assert!(output.contains("Report:   html -> /tmp/results/x.html"));
        assert!(output.contains("Summary: 1 scan(s), 6 finding(s)"));
    }

    #[test]
    fn rejected_outcome_serializes_without_task_id() {
        let err = OrchestratorError::Validation("Target is required".to_owned());
        let outcome = ScanOutcome::rejected(ScanType::Repo, "", &err);
        let value = serde_json::to_value(&outcome).expect("serializable");
        assert!(value.get("task_id").is_none());
        assert_eq!(value["type"], "repo");
        assert_eq!(value["status"], "rejected");
    }
}
