//! Change detection against the base branch.
//!
//! Fetches the base branch, lists the paths that differ from it, and reduces
//! the ones under the ECS root to their module directory names.
use crate::process::{CommandRunner, CommandSpec};
use anyhow::{Context, Result};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

/// Inputs for [`detect_modules`].
pub struct ChangeDetection<'a> {
    pub runner: &'a dyn CommandRunner,
    pub source_root: &'a Path,
    pub remote: &'a str,
    pub base_branch: &'a str,
    pub ecs_root: &'a str,
    pub timeout: Duration,
}

/// Return touched module names in first-seen order.
///
/// A failed fetch (e.g. unreachable base ref) is an error; there is no
/// empty-diff fallback.
pub fn detect_modules(args: &ChangeDetection<'_>) -> Result<Vec<String>> {
    let fetch = CommandSpec::new("git", args.timeout)
        .args(["fetch", args.remote, args.base_branch])
        .current_dir(args.source_root);
    args.runner
        .run_checked(&fetch)
        .with_context(|| format!("fetch {}/{}", args.remote, args.base_branch))?;

    let base_ref = format!("{}/{}", args.remote, args.base_branch);
    let diff = CommandSpec::new("git", args.timeout)
        .args(["diff", "--name-only", "-z"])
        .arg(base_ref.as_str())
        .current_dir(args.source_root);
    let output = args
        .runner
        .run_checked(&diff)
        .with_context(|| format!("diff against {base_ref}"))?;

    let paths = output.stdout.split('\0').filter(|path| !path.is_empty());
    let modules = modules_from_paths(paths, args.ecs_root);
    tracing::info!(
        base = %base_ref,
        modules = ?modules,
        "detected modified modules"
    );
    Ok(modules)
}

/// Reduce changed paths to module directories directly below `root`.
///
/// Files sitting directly in `root` do not name a module and are ignored.
pub fn modules_from_paths<'p, I>(paths: I, root: &str) -> Vec<String>
where
    I: IntoIterator<Item = &'p str>,
{
    let root = root.trim_end_matches('/');
    let mut seen = HashSet::new();
    let mut modules = Vec::new();
    for path in paths {
        let Some(rest) = path.strip_prefix(root).and_then(|rest| rest.strip_prefix('/')) else {
            continue;
        };
        let Some((module, below)) = rest.split_once('/') else {
            continue;
        };
        if module.is_empty() || below.is_empty() {
            continue;
        }
        if seen.insert(module.to_string()) {
            modules.push(module.to_string());
        }
    }
    modules
}

#[cfg(test)]
#[path = "changes_tests.rs"]
mod tests;
