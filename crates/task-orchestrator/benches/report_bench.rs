//! 보고서 벤치마크
//!
//! 결과 파싱, 심각도 통계 집계, HTML / PDF 렌더링 성능을 측정합니다.

use std::sync::Arc;

use chrono::Utc;
use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use serde_json::{Value, json};

use scanward_core::types::{ReportLocale, ScanType};
use scanward_orchestrator::{EngineReport, ReportFormat, ReportInput, SeverityStats};

const SEVERITIES: [&str; 5] = ["CRITICAL", "HIGH", "MEDIUM", "LOW", "UNKNOWN"];

/// 하위 대상 `targets`개, 대상별 발견 항목 `per_target`개의 결과 생성
fn generate_report(targets: usize, per_target: usize) -> Value {
    let results: Vec<Value> = (0..targets)
        .map(|t| {
            let vulns: Vec<Value> = (0..per_target)
                .map(|i| {
                    json!({
                        "VulnerabilityID": format!("CVE-2024-{t:02}{i:04}"),
                        "PkgName": format!("pkg-{i}"),
                        "InstalledVersion": "1.0.0",
                        "FixedVersion": "1.0.1",
                        "Severity": SEVERITIES[i % SEVERITIES.len()],
                    })
                })
                .collect();
            json!({ "Target": format!("layer-{t}"), "Vulnerabilities": vulns })
        })
        .collect();
    json!({ "ArtifactName": "bench:latest", "Results": results })
}

fn input_for(raw: Value) -> ReportInput {
    let report = EngineReport::from_value(&raw).unwrap();
    let stats = SeverityStats::aggregate(&report);
    ReportInput {
        task_id: "bench".to_owned(),
        scan_type: ScanType::Image,
        target: "bench:latest".to_owned(),
        raw: Arc::new(raw),
        report: Arc::new(report),
        stats,
        locale: ReportLocale::En,
        pdf_max_findings: 40,
    }
}

fn bench_aggregation(c: &mut Criterion) {
    let mut group = c.benchmark_group("severity_aggregation");

    for findings in [100usize, 10_000] {
        let raw = generate_report(10, findings / 10);
        let report = EngineReport::from_value(&raw).unwrap();
        group.throughput(Throughput::Elements(findings as u64));
        group.bench_with_input(
            BenchmarkId::new("aggregate", findings),
            &report,
            |b, report| b.iter(|| SeverityStats::aggregate(black_box(report))),
        );
        group.bench_with_input(BenchmarkId::new("parse", findings), &raw, |b, raw| {
            b.iter(|| EngineReport::from_value(black_box(raw)).unwrap())
        });
    }

    group.finish();
}

fn bench_rendering(c: &mut Criterion) {
    let mut group = c.benchmark_group("report_rendering");
    let now = Utc::now();

    for findings in [50usize, 2_000] {
        let input = input_for(generate_report(5, findings / 5));
        group.throughput(Throughput::Elements(findings as u64));
        group.bench_with_input(BenchmarkId::new("html", findings), &input, |b, input| {
            b.iter(|| input.render(ReportFormat::Html, now).unwrap())
        });
        group.bench_with_input(BenchmarkId::new("pdf", findings), &input, |b, input| {
            b.iter(|| input.render(ReportFormat::Pdf, now).unwrap())
        });
    }

    group.finish();
}

criterion_group!(benches, bench_aggregation, bench_rendering);
criterion_main!(benches);
