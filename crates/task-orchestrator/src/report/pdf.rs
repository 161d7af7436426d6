//! PDF 보고서 렌더링
//!
//! 표준 Type1 글꼴(Helvetica)만 사용하는 최소 PDF 1.4 문서를 직접 작성합니다.
//! 내장 글꼴은 Latin-1 범위만 표현하므로 라벨은 항상 영어이며,
//! ASCII 외 문자는 `?`로 대체됩니다.
//!
//! # 문서 구조
//!
//! ```text
//! 1 0 obj  Catalog
//! 2 0 obj  Pages (Kids)
//! 3 0 obj  Font F1 Helvetica
//! 4 0 obj  Font F2 Helvetica-Bold
//! 5+2i     Page i
//! 6+2i     Content stream i
//! xref / trailer
//! ```

use std::fmt::Write;

use chrono::{DateTime, Utc};

use scanward_core::types::{ReportLocale, Severity};

use crate::error::OrchestratorError;
use crate::report::{ReportInput, severity_label};

/// A4 (pt)
const PAGE_WIDTH: u32 = 595;
const PAGE_HEIGHT: u32 = 842;
const MARGIN_X: u32 = 50;
const TOP_Y: u32 = 792;
const BOTTOM_Y: u32 = 50;
const LINE_HEIGHT: u32 = 14;
const LINES_PER_PAGE: usize = ((TOP_Y - BOTTOM_Y) / LINE_HEIGHT) as usize;
const MAX_LINE_CHARS: usize = 96;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Style {
    Title,
    Heading,
    Body,
}

impl Style {
    fn font(&self) -> (&'static str, u32) {
        match self {
            Self::Title => ("F2", 16),
            Self::Heading => ("F2", 11),
            Self::Body => ("F1", 9),
        }
    }
}

#[derive(Debug, Clone)]
struct Line {
    style: Style,
    text: String,
}

impl Line {
    fn new(style: Style, text: impl Into<String>) -> Self {
        Self {
            style,
            text: text.into(),
        }
    }

    fn blank() -> Self {
        Self::new(Style::Body, "")
    }
}

/// 보고서 입력을 PDF 문서로 렌더링합니다.
///
/// 하위 대상별 발견 항목은 `input.pdf_max_findings`건까지만 나열하고
/// 생략된 건수를 표시합니다.
pub fn render_pdf(
    input: &ReportInput,
    generated_at: DateTime<Utc>,
) -> Result<Vec<u8>, OrchestratorError> {
    let lines = layout(input, generated_at);
    let pages: Vec<&[Line]> = lines.chunks(LINES_PER_PAGE).collect();
    if pages.is_empty() {
        return Err(OrchestratorError::ReportGeneration {
            format: "pdf".to_owned(),
            reason: "document has no content".to_owned(),
        });
    }

    let total = pages.len();
    let streams: Vec<String> = pages
        .iter()
        .enumerate()
        .map(|(i, page)| content_stream(page, i + 1, total))
        .collect();

    Ok(assemble(&streams))
}

fn layout(input: &ReportInput, generated_at: DateTime<Utc>) -> Vec<Line> {
    let mut lines = vec![
        Line::new(Style::Title, "Security Scan Report"),
        Line::blank(),
        Line::new(Style::Body, format!("Target: {}", input.target)),
        Line::new(Style::Body, format!("Scan type: {}", input.scan_type)),
        Line::new(Style::Body, format!("Task ID: {}", input.task_id)),
        Line::new(
            Style::Body,
            format!("Generated: {}", generated_at.format("%Y-%m-%d %H:%M:%S UTC")),
        ),
        Line::blank(),
        Line::new(Style::Heading, "Summary"),
    ];

    let mut summary = String::new();
    for severity in Severity::ALL {
        let _ = write!(
            summary,
            "{}: {}    ",
            severity.label(ReportLocale::En),
            input.stats.count(severity)
        );
    }
    let _ = write!(summary, "Total: {}", input.stats.total);
    lines.push(Line::new(Style::Body, summary));
    lines.push(Line::blank());

    let no_findings = ReportLocale::En.no_findings_text();
    let targets = input.report.targets();
    if targets.is_empty() {
        lines.push(Line::new(Style::Body, no_findings));
    }

    for target in targets {
        lines.push(Line::new(Style::Heading, target.target.clone()));
        let findings = target.findings();
        if findings.is_empty() {
            lines.push(Line::new(Style::Body, no_findings));
        }
        for finding in findings.iter().take(input.pdf_max_findings) {
            let mut text = format!(
                "{}  [{}]  {} {}",
                finding.vulnerability_id,
                severity_label(finding.severity.as_deref(), ReportLocale::En),
                finding.pkg_name,
                finding.installed_version,
            );
            if let Some(fixed) = finding.fixed_version.as_deref().filter(|f| !f.is_empty()) {
                let _ = write!(text, " -> {fixed}");
            }
            lines.push(Line::new(Style::Body, text));
        }
        let omitted = findings.len().saturating_sub(input.pdf_max_findings);
        if omitted > 0 {
            lines.push(Line::new(
                Style::Body,
                format!("... {omitted} more findings omitted (see HTML or JSON report)"),
            ));
        }
        lines.push(Line::blank());
    }

    lines
}

/// PDF 문자열 리터럴용 이스케이프 및 길이 제한
fn pdf_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len().min(MAX_LINE_CHARS) + 8);
    let mut count = 0;
    for c in s.chars() {
        if count >= MAX_LINE_CHARS {
            out.push_str("...");
            break;
        }
        match c {
            '\\' => out.push_str("\\\\"),
            '(' => out.push_str("\\("),
            ')' => out.push_str("\\)"),
            c if c.is_ascii() && !c.is_ascii_control() => out.push(c),
            _ => out.push('?'),
        }
        count += 1;
    }
    out
}

fn content_stream(lines: &[Line], page_no: usize, page_count: usize) -> String {
    let mut stream = String::new();
    let mut y = TOP_Y;
    for line in lines {
        if !line.text.is_empty() {
            let (font, size) = line.style.font();
            let _ = writeln!(
                stream,
                "BT /{font} {size} Tf {MARGIN_X} {y} Td ({}) Tj ET",
                pdf_text(&line.text)
            );
        }
        y = y.saturating_sub(LINE_HEIGHT);
    }
    let _ = writeln!(
        stream,
        "BT /F1 8 Tf {} 30 Td (Page {page_no} / {page_count}) Tj ET",
        PAGE_WIDTH - MARGIN_X - 50
    );
    stream
}

/// 객체를 직렬화하고 xref 테이블을 작성합니다.
fn assemble(streams: &[String]) -> Vec<u8> {
    let page_count = streams.len();
    let kids = (0..page_count)
        .map(|i| format!("{} 0 R", 5 + 2 * i))
        .collect::<Vec<_>>()
        .join(" ");

    let mut objects = vec![
        "<< /Type /Catalog /Pages 2 0 R >>".to_owned(),
        format!("<< /Type /Pages /Kids [{kids}] /Count {page_count} >>"),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>"
            .to_owned(),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica-Bold /Encoding /WinAnsiEncoding >>"
            .to_owned(),
    ];
    for (i, stream) in streams.iter().enumerate() {
        objects.push(format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {PAGE_WIDTH} {PAGE_HEIGHT}] \
             /Resources << /Font << /F1 3 0 R /F2 4 0 R >> >> /Contents {} 0 R >>",
            6 + 2 * i
        ));
        objects.push(format!(
            "<< /Length {} >>\nstream\n{stream}\nendstream",
            stream.len()
        ));
    }

    let mut out: Vec<u8> = Vec::with_capacity(4096);
    out.extend_from_slice(b"%PDF-1.4\n%\xE2\xE3\xCF\xD3\n");

    let mut offsets = Vec::with_capacity(objects.len());
    for (i, body) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.extend_from_slice(format!("{} 0 obj\n{body}\nendobj\n", i + 1).as_bytes());
    }

    let xref_pos = out.len();
    let mut xref = format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1);
    for offset in &offsets {
        let _ = write!(xref, "{offset:010} 00000 n \n");
    }
    let _ = write!(
        xref,
        "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{xref_pos}\n%%EOF\n",
        objects.len() + 1
    );
    out.extend_from_slice(xref.as_bytes());
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::test_support::sample_input;
    use crate::result::EngineReport;
    use crate::stats::SeverityStats;
    use serde_json::json;
    use std::sync::Arc;

    fn as_text(bytes: &[u8]) -> String {
        String::from_utf8_lossy(bytes).into_owned()
    }

    #[test]
    fn document_has_header_trailer_and_findings() {
        let pdf = render_pdf(&sample_input(ReportLocale::En), Utc::now()).unwrap();
        let text = as_text(&pdf);
        assert!(text.starts_with("%PDF-1.4"));
        assert!(text.trim_end().ends_with("%%EOF"));
        assert!(text.contains("Target: nginx:latest"));
        assert!(text.contains("CVE-2024-0001  [Critical]  libssl3 3.0.11-1 -> 3.0.13-1"));
        assert!(text.contains("No vulnerabilities found"));
        assert!(text.contains("/Count 1"));
    }

    #[test]
    fn labels_stay_english_for_other_locales() {
        let pdf = render_pdf(&sample_input(ReportLocale::Zh), Utc::now()).unwrap();
        let text = as_text(&pdf);
        assert!(text.contains("[Critical]"));
        assert!(!text.contains("严重"));
    }

    fn rfind_bytes(haystack: &[u8], needle: &[u8]) -> Option<usize> {
        haystack.windows(needle.len()).rposition(|w| w == needle)
    }

    #[test]
    fn xref_offsets_point_at_objects() {
        let pdf = render_pdf(&sample_input(ReportLocale::En), Utc::now()).unwrap();

        let marker = b"startxref\n";
        let at = rfind_bytes(&pdf, marker).unwrap() + marker.len();
        let tail = as_text(&pdf[at..]);
        let pos: usize = tail.lines().next().unwrap().parse().unwrap();
        assert!(pdf[pos..].starts_with(b"xref\n"));

        let xref = as_text(&pdf[pos..]);
        let entries: Vec<&str> = xref
            .lines()
            .skip(3)
            .take_while(|l| l.ends_with(" n "))
            .collect();
        assert!(!entries.is_empty());
        for (i, entry) in entries.iter().enumerate() {
            let offset: usize = entry[..10].parse().unwrap();
            let expected = format!("{} 0 obj", i + 1);
            assert!(pdf[offset..].starts_with(expected.as_bytes()));
        }
    }

    #[test]
    fn findings_beyond_limit_are_omitted_with_note() {
        let vulns: Vec<_> = (0..45)
            .map(|i| json!({"VulnerabilityID": format!("CVE-2024-{i:04}"), "Severity": "HIGH"}))
            .collect();
        let raw = json!({"Results": [{"Target": "big", "Vulnerabilities": vulns}]});
        let report = EngineReport::from_value(&raw).unwrap();
        let mut input = sample_input(ReportLocale::En);
        input.stats = SeverityStats::aggregate(&report);
        input.report = Arc::new(report);
        input.raw = Arc::new(raw);

        let text = as_text(&render_pdf(&input, Utc::now()).unwrap());
        assert!(text.contains("CVE-2024-0039"));
        assert!(!text.contains("CVE-2024-0040"));
        assert!(text.contains("5 more findings omitted"));
    }

    #[test]
    fn long_reports_are_paginated() {
        let results: Vec<_> = (0..30)
            .map(|i| {
                json!({
                    "Target": format!("layer-{i}"),
                    "Vulnerabilities": [{"VulnerabilityID": format!("CVE-2023-{i:04}"), "Severity": "LOW"}]
                })
            })
            .collect();
        let raw = json!({ "Results": results });
        let report = EngineReport::from_value(&raw).unwrap();
        let mut input = sample_input(ReportLocale::En);
        input.stats = SeverityStats::aggregate(&report);
        input.report = Arc::new(report);

        let text = as_text(&render_pdf(&input, Utc::now()).unwrap());
        assert!(text.contains("/Count 2"));
        assert!(text.contains("Page 2 / 2"));
        assert!(text.contains("CVE-2023-0029"));
    }

    #[test]
    fn text_escaping_and_non_ascii_replacement() {
        assert_eq!(pdf_text(r"a(b)c\d"), r"a\(b\)c\\d");
        assert_eq!(pdf_text("镜像"), "??");
        let long = "x".repeat(200);
        assert_eq!(pdf_text(&long).len(), MAX_LINE_CHARS + 3);
    }
}
