//! CLI argument parsing.
use crate::config::{TeardownPolicy, TransferPolicy};
use clap::Parser;
use std::path::PathBuf;

/// Root CLI entrypoint.
#[derive(Parser, Debug)]
#[command(
    name = "ecs-sync",
    version,
    about = "Regenerate ECS index templates for modified modules and publish them downstream",
    after_help = "Examples:\n  ecs-sync -b ecs-update -t \"$GITHUB_TOKEN\"\n  BASE_BRANCH=main ecs-sync -b ecs-update --report /tmp/ecs-sync.json\n  ecs-sync -b ecs-update --config ecs-sync.json --transfer move"
)]
pub struct RootArgs {
    /// Branch to create or update in the plugins repository
    #[arg(short = 'b', long = "branch", value_name = "NAME")]
    pub branch: String,

    /// GitHub token used to authenticate the GitHub CLI
    #[arg(
        short = 't',
        long = "token",
        value_name = "TOKEN",
        env = "GITHUB_TOKEN",
        hide_env_values = true
    )]
    pub token: Option<String>,

    /// Base branch for change detection and the pull request
    #[arg(long, value_name = "NAME", env = "BASE_BRANCH", default_value = "master")]
    pub base_branch: String,

    /// Local checkout of the plugins repository (cloned when absent)
    #[arg(long, value_name = "DIR", env = "PLUGINS_REPO_PATH")]
    pub plugins_repo_path: Option<PathBuf>,

    /// Source repository checkout containing the ECS modules
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub source_repo: PathBuf,

    /// JSON config overriding the built-in module map, paths, and timeouts
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// How generated templates reach the plugins repository
    #[arg(long, value_enum, value_name = "POLICY")]
    pub transfer: Option<TransferPolicy>,

    /// When the generator's resources are torn down
    #[arg(long, value_enum, value_name = "POLICY")]
    pub teardown: Option<TeardownPolicy>,

    /// Write a JSON run report to this path
    #[arg(long, value_name = "FILE")]
    pub report: Option<PathBuf>,

    /// Log at debug level (ECS_SYNC_LOG overrides)
    #[arg(long)]
    pub verbose: bool,
}
