use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

mod changes;
mod cli;
mod config;
mod deps;
mod generator;
mod modules;
mod process;
mod publish;
mod pull_request;
mod report;
mod templates;
#[cfg(test)]
mod test_support;
mod util;
mod workflow;

use cli::RootArgs;
use modules::ModuleMap;
use process::{ProcessError, SystemRunner};
use publish::BranchAction;
use workflow::{NothingToDo, SyncOutcome, SyncRequest};

const LOG_ENV: &str = "ECS_SYNC_LOG";

fn main() -> ExitCode {
    let args = match RootArgs::try_parse() {
        Ok(args) => args,
        // --help and --version print to stdout and exit 0.
        Err(err) if !err.use_stderr() => err.exit(),
        Err(err) => {
            let _ = err.print();
            return ExitCode::from(1);
        }
    };
    init_tracing(args.verbose);

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(exit_code_for(&err))
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// External tool failures keep their own exit code; everything else is 1.
fn exit_code_for(err: &anyhow::Error) -> u8 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<ProcessError>())
        .map(ProcessError::exit_code)
        .and_then(|code| u8::try_from(code).ok())
        .filter(|code| *code != 0)
        .unwrap_or(1)
}

fn run(args: RootArgs) -> Result<()> {
    let token = args
        .token
        .clone()
        .filter(|token| !token.trim().is_empty())
        .ok_or_else(|| {
            anyhow!("a GitHub token is required (pass -t <token> or set GITHUB_TOKEN)")
        })?;

    let mut config = match &args.config {
        Some(path) => config::load_config(path)?,
        None => config::default_config(),
    };
    if let Some(transfer) = args.transfer {
        config.transfer = transfer;
    }
    if let Some(teardown) = args.teardown {
        config.teardown = teardown;
    }
    config::validate_config(&config)?;
    let modules = ModuleMap::new(config.modules.clone())?;

    deps::ensure_commands(&config.required_commands)?;

    let request = SyncRequest {
        branch: args.branch.clone(),
        token,
        base_branch: args.base_branch.clone(),
        source_root: resolve_source_root(&args.source_repo)?,
        plugins_repo_path: resolve_plugins_repo_path(args.plugins_repo_path.as_deref())?,
    };
    tracing::debug!(
        branch = %request.branch,
        base = %request.base_branch,
        source = %request.source_root.display(),
        plugins = %request.plugins_repo_path.display(),
        modules = config.modules.len(),
        "starting sync"
    );

    let run = workflow::run_sync(&SystemRunner, &config, &modules, &request)?;

    match &run.outcome {
        SyncOutcome::NothingToDo {
            reason: NothingToDo::NoModulesTouched,
        } => println!("No ECS modules changed; nothing to do."),
        SyncOutcome::NothingToDo {
            reason: NothingToDo::NoRelevantModules,
        } => println!(
            "No changed module has a mapped template ({}); nothing to do.",
            run.skipped.join(", ")
        ),
        SyncOutcome::NoChanges => println!(
            "Templates for {} are already up to date on {}.",
            templates::module_list(&run.relevant),
            request.branch
        ),
        SyncOutcome::Published { pull_request } => println!(
            "Published templates for {} to {}branch {} ({pull_request}).",
            templates::module_list(&run.relevant),
            match run.branch_action {
                Some(BranchAction::Created) => "new ",
                _ => "",
            },
            request.branch
        ),
    }

    if let Some(path) = &args.report {
        let report = report::SyncReport::new(&request, &run)?;
        report::write_report(path, &report)?;
        println!("Wrote run report to {}", path.display());
    }
    Ok(())
}

fn resolve_source_root(path: &std::path::Path) -> Result<PathBuf> {
    path.canonicalize()
        .with_context(|| format!("resolve source repository {}", path.display()))
}

/// Explicit path, else `<data-local-dir>/ecs-sync/wazuh-indexer-plugins`.
fn resolve_plugins_repo_path(explicit: Option<&std::path::Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    let data_dir = dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .ok_or_else(|| anyhow!("cannot determine a data directory; pass --plugins-repo-path"))?;
    Ok(data_dir.join("ecs-sync").join("wazuh-indexer-plugins"))
}
