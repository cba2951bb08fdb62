//! Downstream repository publishing.
//!
//! Walks the plugins checkout through
//! `NotCloned -> Cloned -> BranchSelected -> ArtifactsCopied` and ends in
//! either `CommittedAndPushed` or `NoChanges`.
use crate::config::TransferPolicy;
use crate::generator::GeneratedArtifact;
use crate::modules::ModuleMap;
use crate::process::{CommandRunner, CommandSpec};
use crate::util::path_to_string;
use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishState {
    NotCloned,
    Cloned,
    BranchSelected,
    ArtifactsCopied,
    CommittedAndPushed,
    NoChanges,
}

/// Whether the target branch already existed on the remote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BranchAction {
    Reused,
    Created,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishOutcome {
    pub branch: BranchAction,
    pub copied: Vec<PathBuf>,
    /// Every state visited, ending with the terminal one.
    pub states: Vec<PublishState>,
}

impl PublishOutcome {
    pub fn final_state(&self) -> PublishState {
        self.states
            .last()
            .copied()
            .unwrap_or(PublishState::NotCloned)
    }

    pub fn committed(&self) -> bool {
        self.final_state() == PublishState::CommittedAndPushed
    }
}

/// Inputs for [`publish`].
pub struct PublishArgs<'a> {
    pub runner: &'a dyn CommandRunner,
    pub repo_url: &'a str,
    pub repo_path: &'a Path,
    pub remote: &'a str,
    pub branch: &'a str,
    /// New branches start from `<remote>/<base_branch>`.
    pub base_branch: &'a str,
    pub resources_dir: &'a str,
    pub modules: &'a ModuleMap,
    pub artifacts: &'a [GeneratedArtifact],
    pub transfer: TransferPolicy,
    pub commit_message: &'a str,
    pub timeout: Duration,
}

/// Copy generated templates into the downstream checkout and push them.
pub fn publish(args: &PublishArgs<'_>) -> Result<PublishOutcome> {
    let mut states = vec![PublishState::NotCloned];

    ensure_checkout(args)?;
    states.push(PublishState::Cloned);

    let branch = select_branch(args)?;
    states.push(PublishState::BranchSelected);

    let copied = transfer_artifacts(args)?;
    states.push(PublishState::ArtifactsCopied);

    states.push(commit_and_push(args)?);

    Ok(PublishOutcome {
        branch,
        copied,
        states,
    })
}

fn git(args: &PublishArgs<'_>) -> CommandSpec {
    CommandSpec::new("git", args.timeout).current_dir(args.repo_path)
}

fn ensure_checkout(args: &PublishArgs<'_>) -> Result<()> {
    if args.repo_path.exists() {
        // Whatever branch is checked out may be gone upstream; only refresh refs.
        tracing::info!(path = %args.repo_path.display(), "reusing downstream checkout");
        args.runner
            .run_checked(&git(args).args(["fetch", "--prune", args.remote]))
            .with_context(|| format!("fetch {} in {}", args.remote, args.repo_path.display()))?;
        return Ok(());
    }

    if let Some(parent) = args.repo_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create {}", parent.display()))?;
    }
    let path = path_to_string(args.repo_path, "plugins repository")?;
    tracing::info!(url = %args.repo_url, path = %path, "cloning downstream repository");
    let clone =
        CommandSpec::new("git", args.timeout).args(["clone", args.repo_url, path.as_str()]);
    args.runner
        .run_checked(&clone)
        .with_context(|| format!("clone {}", args.repo_url))?;
    Ok(())
}

fn select_branch(args: &PublishArgs<'_>) -> Result<BranchAction> {
    if remote_branch_exists(args)? {
        tracing::info!(branch = %args.branch, "switching to existing branch");
        let start = format!("{}/{}", args.remote, args.branch);
        args.runner
            .run_checked(&git(args).args(["checkout", "-B", args.branch, start.as_str()]))
            .with_context(|| format!("checkout {} at {start}", args.branch))?;
        return Ok(BranchAction::Reused);
    }

    // The upstream branch is established before any commit lands on it.
    let start = format!("{}/{}", args.remote, args.base_branch);
    tracing::info!(branch = %args.branch, base = %start, "creating branch");
    args.runner
        .run_checked(&git(args).args(["checkout", "-B", args.branch, start.as_str()]))
        .with_context(|| format!("create branch {} from {start}", args.branch))?;
    args.runner
        .run_checked(&git(args).args(["push", "-u", args.remote, args.branch]))
        .with_context(|| format!("push new branch {}", args.branch))?;
    Ok(BranchAction::Created)
}

fn remote_branch_exists(args: &PublishArgs<'_>) -> Result<bool> {
    let output = args
        .runner
        .run_checked(&git(args).args(["ls-remote", "--heads", args.remote, args.branch]))
        .with_context(|| format!("query remote branch {}", args.branch))?;
    let wanted = format!("refs/heads/{}", args.branch);
    Ok(output
        .stdout
        .lines()
        .any(|line| line.split_whitespace().nth(1) == Some(wanted.as_str())))
}

fn transfer_artifacts(args: &PublishArgs<'_>) -> Result<Vec<PathBuf>> {
    let dest_dir = args.repo_path.join(args.resources_dir);
    let mut copied = Vec::with_capacity(args.artifacts.len());
    for artifact in args.artifacts {
        let Some(file_name) = args.modules.template_for(&artifact.module) else {
            tracing::info!(module = %artifact.module, "skipping module without mapped template");
            continue;
        };
        let dest = dest_dir.join(file_name);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create {}", parent.display()))?;
        }
        match args.transfer {
            TransferPolicy::Copy => {
                fs::copy(&artifact.path, &dest).with_context(|| {
                    format!("copy {} to {}", artifact.path.display(), dest.display())
                })?;
            }
            TransferPolicy::Move => move_file(&artifact.path, &dest)?,
        }
        tracing::info!(
            module = %artifact.module,
            dest = %dest.display(),
            "transferred template"
        );
        copied.push(dest);
    }
    Ok(copied)
}

fn move_file(from: &Path, to: &Path) -> Result<()> {
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    // rename fails across filesystems; fall back to copy + remove.
    fs::copy(from, to).with_context(|| format!("copy {} to {}", from.display(), to.display()))?;
    fs::remove_file(from).with_context(|| format!("remove {}", from.display()))?;
    Ok(())
}

fn commit_and_push(args: &PublishArgs<'_>) -> Result<PublishState> {
    args.runner
        .run_checked(&git(args).args(["add", "--all"]))
        .context("stage changes")?;
    let status = args
        .runner
        .run_checked(&git(args).args(["status", "--porcelain"]))
        .context("inspect working tree")?;
    if status.stdout.trim().is_empty() {
        tracing::info!(branch = %args.branch, "no template changes to commit");
        return Ok(PublishState::NoChanges);
    }

    args.runner
        .run_checked(&git(args).args(["commit", "-m", args.commit_message]))
        .context("commit templates")?;
    args.runner
        .run_checked(&git(args).args(["push", args.remote, args.branch]))
        .with_context(|| format!("push {}", args.branch))?;
    tracing::info!(branch = %args.branch, "pushed template changes");
    Ok(PublishState::CommittedAndPushed)
}

#[cfg(test)]
#[path = "publish_tests.rs"]
mod tests;
