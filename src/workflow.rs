//! End-to-end sync workflow.
//!
//! Stages run strictly in order: change detection, module filtering,
//! generation, publishing, pull-request upsert. Each benign empty result ends
//! the run early with a [`SyncOutcome`] rather than an error.
use crate::changes::{detect_modules, ChangeDetection};
use crate::config::SyncConfig;
use crate::generator::{GeneratedArtifact, Generator};
use crate::modules::{select_relevant, ModuleMap};
use crate::process::CommandRunner;
use crate::publish::{publish, BranchAction, PublishArgs};
use crate::pull_request::{authenticate, upsert_pull_request, PullRequestArgs, UpsertOutcome};
use crate::templates;
use anyhow::Result;
use serde::Serialize;
use std::path::PathBuf;

/// Caller-supplied parameters for one run.
#[derive(Debug, Clone)]
pub struct SyncRequest {
    pub branch: String,
    pub token: String,
    pub base_branch: String,
    pub source_root: PathBuf,
    pub plugins_repo_path: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NothingToDo {
    NoModulesTouched,
    NoRelevantModules,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SyncOutcome {
    NothingToDo { reason: NothingToDo },
    /// Templates were regenerated but matched what the branch already had.
    NoChanges,
    Published { pull_request: UpsertOutcome },
}

/// Everything a run observed, for logging and the JSON report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncRun {
    pub detected: Vec<String>,
    pub relevant: Vec<String>,
    pub skipped: Vec<String>,
    pub generated: Vec<GeneratedArtifact>,
    pub copied: Vec<PathBuf>,
    pub branch_action: Option<BranchAction>,
    pub outcome: SyncOutcome,
}

impl SyncRun {
    fn finished_early(detected: Vec<String>, skipped: Vec<String>, reason: NothingToDo) -> Self {
        Self {
            detected,
            relevant: Vec::new(),
            skipped,
            generated: Vec::new(),
            copied: Vec::new(),
            branch_action: None,
            outcome: SyncOutcome::NothingToDo { reason },
        }
    }
}

/// Run every stage after the dependency check.
pub fn run_sync(
    runner: &dyn CommandRunner,
    config: &SyncConfig,
    modules: &ModuleMap,
    request: &SyncRequest,
) -> Result<SyncRun> {
    let detected = detect_modules(&ChangeDetection {
        runner,
        source_root: &request.source_root,
        remote: &config.remote,
        base_branch: &request.base_branch,
        ecs_root: &config.ecs_root,
        timeout: config.timeouts.git(),
    })?;
    if detected.is_empty() {
        tracing::info!(base = %request.base_branch, "no modules touched; nothing to do");
        return Ok(SyncRun::finished_early(
            detected,
            Vec::new(),
            NothingToDo::NoModulesTouched,
        ));
    }

    let selection = select_relevant(&detected, modules);
    if selection.relevant.is_empty() {
        tracing::info!(skipped = ?selection.skipped, "no relevant modules; nothing to do");
        return Ok(SyncRun::finished_early(
            detected,
            selection.skipped,
            NothingToDo::NoRelevantModules,
        ));
    }
    tracing::info!(modules = ?selection.relevant, "relevant modules");

    let generator = Generator::new(runner, config, &request.source_root)?;
    let generated = generator.generate_all(&selection.relevant, config.teardown)?;

    let commit_message = templates::commit_message(&selection.relevant);
    let published = publish(&PublishArgs {
        runner,
        repo_url: &config.plugins_repo_url,
        repo_path: &request.plugins_repo_path,
        remote: &config.remote,
        branch: &request.branch,
        base_branch: &request.base_branch,
        resources_dir: &config.resources_dir,
        modules,
        artifacts: &generated,
        transfer: config.transfer,
        commit_message: &commit_message,
        timeout: config.timeouts.git(),
    })?;

    let outcome = if published.committed() {
        authenticate(
            runner,
            &request.plugins_repo_path,
            &request.token,
            config.timeouts.gh(),
        )?;
        let title = templates::pull_request_title(&selection.relevant);
        let body = templates::pull_request_body(&selection.relevant);
        let pull_request = upsert_pull_request(&PullRequestArgs {
            runner,
            repo_path: &request.plugins_repo_path,
            branch: &request.branch,
            base_branch: &request.base_branch,
            title: &title,
            body: &body,
            timeout: config.timeouts.gh(),
        })?;
        SyncOutcome::Published { pull_request }
    } else {
        SyncOutcome::NoChanges
    };

    Ok(SyncRun {
        detected,
        relevant: selection.relevant,
        skipped: selection.skipped,
        generated,
        copied: published.copied,
        branch_action: Some(published.branch),
        outcome,
    })
}

#[cfg(test)]
#[path = "workflow_tests.rs"]
mod tests;
