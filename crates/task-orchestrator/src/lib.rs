#![doc = include_str!("../README.md")]
//!
//! # 모듈 구조
//!
//! - [`error`]: 도메인 에러 (`OrchestratorError`)
//! - [`config`]: 오케스트레이터 설정 (`OrchestratorConfig`, 빌더)
//! - [`engine`]: 스캔 엔진 추상화 (`ScanEngine` trait, `TrivyEngine`)
//! - [`result`]: 엔진 결과 모델 (`EngineReport`, `Finding`)
//! - [`stats`]: 심각도 통계 집계 (`SeverityStats`)
//! - [`report`]: HTML / PDF 렌더링과 산출물 저장소
//! - [`task`]: 작업 레코드와 스냅샷
//! - [`registry`]: 휘발성 작업 레지스트리
//! - [`orchestrator`]: 실행 조정 (`ScanOrchestrator`, 빌더)
//! - [`api`]: 전송 계층에 독립적인 경계 연산

pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod orchestrator;
pub mod registry;
pub mod report;
pub mod result;
pub mod stats;
pub mod task;

// --- Public API Re-exports ---

// Orchestrator
pub use orchestrator::{HealthSnapshot, ReportArtifact, ScanOrchestrator, ScanOrchestratorBuilder};

// Configuration
pub use config::{OrchestratorConfig, OrchestratorConfigBuilder};

// Error
pub use error::OrchestratorError;

// Engine
pub use engine::trivy::TrivyEngine;
pub use engine::{EngineRequest, ScanArtifact, ScanEngine, ScanOptions};

// Results & reports
pub use report::{ArtifactStore, ReportFormat, ReportInput};
pub use result::{EngineReport, Finding, TargetResult};
pub use stats::SeverityStats;

// Tasks
pub use task::{TaskId, TaskSnapshot, TaskSummary};
