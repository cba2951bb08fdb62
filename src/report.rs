//! JSON run report.
use crate::publish::BranchAction;
use crate::util::{display_path, now_epoch_ms};
use crate::workflow::{SyncOutcome, SyncRequest, SyncRun};
use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::path::Path;

/// Current schema version for run reports.
pub const REPORT_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Serialize)]
pub struct SyncReport {
    pub schema_version: u32,
    pub generated_at_epoch_ms: u128,
    pub branch: String,
    pub base_branch: String,
    pub detected: Vec<String>,
    pub relevant: Vec<String>,
    pub skipped: Vec<String>,
    /// Generated template paths, relative to the source checkout.
    pub generated: Vec<String>,
    /// Destination paths, relative to the plugins checkout.
    pub copied: Vec<String>,
    /// Absent when the run ended before touching the plugins repository.
    pub branch_action: Option<BranchAction>,
    pub outcome: SyncOutcome,
}

impl SyncReport {
    pub fn new(request: &SyncRequest, run: &SyncRun) -> Result<Self> {
        Ok(Self {
            schema_version: REPORT_SCHEMA_VERSION,
            generated_at_epoch_ms: now_epoch_ms()?,
            branch: request.branch.clone(),
            base_branch: request.base_branch.clone(),
            detected: run.detected.clone(),
            relevant: run.relevant.clone(),
            skipped: run.skipped.clone(),
            generated: run
                .generated
                .iter()
                .map(|artifact| display_path(&artifact.path, Some(&request.source_root)))
                .collect(),
            copied: run
                .copied
                .iter()
                .map(|path| display_path(path, Some(&request.plugins_repo_path)))
                .collect(),
            branch_action: run.branch_action,
            outcome: run.outcome.clone(),
        })
    }
}

/// Write the report as pretty JSON, creating parent directories.
pub fn write_report(path: &Path, report: &SyncReport) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    let text = serde_json::to_string_pretty(report).context("serialize sync report")?;
    fs::write(path, text.as_bytes()).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}
