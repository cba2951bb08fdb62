//! Pull-request upsert through the GitHub CLI.
//!
//! Lookup-then-branch: list open PRs whose head is the target branch, then
//! create one or edit the existing one so reruns converge on the same PR.
use crate::process::{CommandRunner, CommandSpec};
use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;

const TOKEN_ENV_VARS: [&str; 2] = ["GITHUB_TOKEN", "GH_TOKEN"];

/// Decision taken by [`upsert_pull_request`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum UpsertOutcome {
    /// `number` is parsed from the URL `gh pr create` prints, when present.
    Created { number: Option<u64> },
    Updated { number: u64 },
}

impl fmt::Display for UpsertOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpsertOutcome::Created { number: Some(number) } => {
                write!(f, "created pull request #{number}")
            }
            UpsertOutcome::Created { number: None } => write!(f, "created pull request"),
            UpsertOutcome::Updated { number } => write!(f, "updated pull request #{number}"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PullRequestSummary {
    number: u64,
    #[serde(default)]
    updated_at: Option<String>,
}

/// Inputs for [`upsert_pull_request`].
pub struct PullRequestArgs<'a> {
    pub runner: &'a dyn CommandRunner,
    /// Downstream checkout; `gh` resolves the repository from it.
    pub repo_path: &'a Path,
    pub branch: &'a str,
    pub base_branch: &'a str,
    pub title: &'a str,
    pub body: &'a str,
    pub timeout: Duration,
}

/// Log `gh` in with `token`, passed on stdin.
pub fn authenticate(
    runner: &dyn CommandRunner,
    repo_path: &Path,
    token: &str,
    timeout: Duration,
) -> Result<()> {
    let spec = gh_command(repo_path, timeout)
        .args(["auth", "login", "--with-token"])
        .stdin(format!("{}\n", token.trim()));
    runner
        .run_checked(&spec)
        .context("authenticate GitHub CLI")?;
    Ok(())
}

/// Create the PR for `branch`, or edit the open one in place.
pub fn upsert_pull_request(args: &PullRequestArgs<'_>) -> Result<UpsertOutcome> {
    match find_open_pull_request(args)? {
        Some(number) => {
            tracing::info!(number, branch = %args.branch, "updating pull request");
            let number_arg = number.to_string();
            let spec = gh(args)
                .args(["pr", "edit", number_arg.as_str()])
                .args(["--title", args.title, "--body", args.body]);
            args.runner
                .run_checked(&spec)
                .with_context(|| format!("edit pull request #{number}"))?;
            Ok(UpsertOutcome::Updated { number })
        }
        None => {
            tracing::info!(
                branch = %args.branch,
                base = %args.base_branch,
                "creating pull request"
            );
            let spec = gh(args).args([
                "pr",
                "create",
                "--title",
                args.title,
                "--body",
                args.body,
                "--base",
                args.base_branch,
                "--head",
                args.branch,
            ]);
            let output = args
                .runner
                .run_checked(&spec)
                .with_context(|| format!("create pull request for {}", args.branch))?;
            Ok(UpsertOutcome::Created {
                number: parse_created_number(&output.stdout),
            })
        }
    }
}

fn gh(args: &PullRequestArgs<'_>) -> CommandSpec {
    gh_command(args.repo_path, args.timeout)
}

/// Inherited token variables would override the login and are dropped.
fn gh_command(repo_path: &Path, timeout: Duration) -> CommandSpec {
    let mut spec = CommandSpec::new("gh", timeout).current_dir(repo_path);
    for key in TOKEN_ENV_VARS {
        spec = spec.env_remove(key);
    }
    spec
}

fn find_open_pull_request(args: &PullRequestArgs<'_>) -> Result<Option<u64>> {
    let spec = gh(args).args([
        "pr",
        "list",
        "--head",
        args.branch,
        "--state",
        "open",
        "--json",
        "number,updatedAt",
    ]);
    let output = args
        .runner
        .run_checked(&spec)
        .with_context(|| format!("list pull requests for {}", args.branch))?;
    let text = output.stdout.trim();
    if text.is_empty() {
        return Ok(None);
    }
    let summaries: Vec<PullRequestSummary> =
        serde_json::from_str(text).context("parse gh pr list JSON")?;
    if summaries.len() > 1 {
        let numbers: Vec<u64> = summaries.iter().map(|pr| pr.number).collect();
        tracing::warn!(
            branch = %args.branch,
            candidates = ?numbers,
            "multiple open pull requests for branch; using the most recently updated"
        );
    }
    Ok(select_pull_request(&summaries))
}

/// Most recently updated wins; ties go to the highest number.
///
/// `updatedAt` is RFC 3339 UTC from the GitHub API, so string order is time order.
fn select_pull_request(summaries: &[PullRequestSummary]) -> Option<u64> {
    summaries
        .iter()
        .max_by(|a, b| {
            a.updated_at
                .cmp(&b.updated_at)
                .then_with(|| a.number.cmp(&b.number))
        })
        .map(|pr| pr.number)
}

fn parse_created_number(stdout: &str) -> Option<u64> {
    let pattern = Regex::new(r"/pull/(\d+)").ok()?;
    pattern
        .captures_iter(stdout)
        .last()
        .and_then(|captures| captures.get(1))
        .and_then(|number| number.as_str().parse().ok())
}

#[cfg(test)]
#[path = "pull_request_tests.rs"]
mod tests;
