//! HTML 보고서 렌더링
//!
//! 외부 리소스 없이 단독으로 열 수 있는 문서를 생성합니다.
//! 모든 사용자/엔진 유래 문자열은 이스케이프됩니다.

use std::fmt::Write;

use chrono::{DateTime, Utc};

use scanward_core::types::{ReportLocale, Severity};

use crate::report::{ReportInput, severity_label};

const STYLE: &str = r#"
body { font-family: -apple-system, "Segoe UI", Helvetica, Arial, sans-serif; margin: 32px; color: #1f2328; }
h1 { font-size: 1.6em; margin-bottom: 4px; }
.meta { color: #59636e; margin-bottom: 24px; }
.meta span { margin-right: 24px; }
.stats { display: flex; gap: 12px; margin-bottom: 28px; }
.stat { border: 1px solid #d1d9e0; border-radius: 8px; padding: 10px 16px; min-width: 90px; }
.stat .count { font-size: 1.5em; font-weight: 600; }
.critical { color: #cf222e; } .high { color: #bc4c00; } .medium { color: #9a6700; } .low { color: #0969da; }
table { border-collapse: collapse; width: 100%; margin-bottom: 24px; }
th, td { border: 1px solid #d1d9e0; padding: 6px 10px; text-align: left; font-size: 0.9em; }
th { background: #f6f8fa; }
.empty { color: #1a7f37; font-style: italic; margin-bottom: 24px; }
"#;

/// HTML 특수 문자를 이스케이프합니다.
pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

fn severity_class(severity: Severity) -> &'static str {
    match severity {
        Severity::Critical => "critical",
        Severity::High => "high",
        Severity::Medium => "medium",
        Severity::Low => "low",
    }
}

/// 보고서 입력을 HTML 문서로 렌더링합니다.
pub fn render_html(input: &ReportInput, generated_at: DateTime<Utc>) -> String {
    let locale = input.locale;
    let mut html = String::with_capacity(8 * 1024);

    // String에 대한 write!는 실패하지 않음
    let _ = write!(
        html,
        "<!DOCTYPE html>\n<html lang=\"{lang}\">\n<head>\n<meta charset=\"UTF-8\">\n\
         <title>Security Scan Report - {target}</title>\n<style>{STYLE}</style>\n</head>\n<body>\n",
        lang = match locale {
            ReportLocale::En => "en",
            ReportLocale::Zh => "zh",
        },
        target = html_escape(&input.target),
    );

    let _ = write!(
        html,
        "<h1>Security Scan Report</h1>\n<div class=\"meta\">\
         <span><strong>Target:</strong> {target}</span>\
         <span><strong>Scan type:</strong> {scan_type}</span>\
         <span><strong>Task:</strong> {task_id}</span>\
         <span><strong>Generated:</strong> {generated}</span></div>\n",
        target = html_escape(&input.target),
        scan_type = input.scan_type,
        task_id = html_escape(&input.task_id),
        generated = generated_at.format("%Y-%m-%d %H:%M:%S UTC"),
    );

    html.push_str("<div class=\"stats\">\n");
    for severity in Severity::ALL {
        let _ = write!(
            html,
            "<div class=\"stat {class}\"><div class=\"count\">{count}</div>{label}</div>\n",
            class = severity_class(severity),
            count = input.stats.count(severity),
            label = severity.label(locale),
        );
    }
    let _ = write!(
        html,
        "<div class=\"stat\"><div class=\"count\">{}</div>Total</div>\n</div>\n",
        input.stats.total
    );

    let targets = input.report.targets();
    if targets.is_empty() {
        let _ = write!(
            html,
            "<p class=\"empty\">{}</p>\n",
            html_escape(locale.no_findings_text())
        );
    }

    for target in targets {
        let _ = write!(html, "<h2>{}</h2>\n", html_escape(&target.target));
        let findings = target.findings();
        if findings.is_empty() {
            let _ = write!(
                html,
                "<p class=\"empty\">{}</p>\n",
                html_escape(locale.no_findings_text())
            );
            continue;
        }

        html.push_str(
            "<table>\n<tr><th>Vulnerability</th><th>Severity</th><th>Package</th>\
             <th>Installed</th><th>Fixed</th></tr>\n",
        );
        for finding in findings {
            let class = finding
                .severity
                .as_deref()
                .and_then(Severity::from_str_loose)
                .map(severity_class)
                .unwrap_or("");
            let _ = write!(
                html,
                "<tr><td>{id}</td><td class=\"{class}\">{severity}</td><td>{pkg}</td>\
                 <td>{installed}</td><td>{fixed}</td></tr>\n",
                id = html_escape(&finding.vulnerability_id),
                severity = html_escape(&severity_label(finding.severity.as_deref(), locale)),
                pkg = html_escape(&finding.pkg_name),
                installed = html_escape(&finding.installed_version),
                fixed = html_escape(finding.fixed_version.as_deref().unwrap_or("")),
            );
        }
        html.push_str("</table>\n");
    }

    html.push_str("</body>\n</html>\n");
    html
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::test_support::sample_input;

    #[test]
    fn escape_covers_special_characters() {
        assert_eq!(
            html_escape(r#"<a href="x">&'"#),
            "&lt;a href=&quot;x&quot;&gt;&amp;&#x27;"
        );
    }

    #[test]
    fn html_contains_header_stats_and_findings() {
        let input = sample_input(ReportLocale::En);
        let html = render_html(&input, Utc::now());

        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("nginx:latest"));
        assert!(html.contains("Scan type:</strong> image"));
        assert!(html.contains("CVE-2024-0001"));
        assert!(html.contains("CVE-2024-0002"));
        assert!(html.contains("CVE-2024-0003"));
        assert!(html.contains(">Critical<") || html.contains("Critical</div>"));
        assert!(html.contains("libssl3"));
        assert!(html.contains("3.0.11-1"));
    }

    #[test]
    fn html_marks_target_without_findings() {
        let input = sample_input(ReportLocale::En);
        let html = render_html(&input, Utc::now());
        assert!(html.contains("usr/share/app/package-lock.json"));
        assert!(html.contains("No vulnerabilities found"));
    }

    #[test]
    fn html_escapes_engine_strings() {
        let input = sample_input(ReportLocale::En);
        let html = render_html(&input, Utc::now());
        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("<td><script>"));
    }

    #[test]
    fn html_uses_localized_labels() {
        let input = sample_input(ReportLocale::Zh);
        let html = render_html(&input, Utc::now());
        assert!(html.contains("严重"));
        assert!(html.contains("低危"));
        assert!(html.contains("lang=\"zh\""));
    }

    #[test]
    fn rendering_is_deterministic_for_fixed_time() {
        let input = sample_input(ReportLocale::En);
        let at = Utc::now();
        assert_eq!(render_html(&input, at), render_html(&input, at));
    }
}
