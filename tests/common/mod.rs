//! Shared helpers for the CLI integration tests.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

pub const TEST_TOKEN: &str = "ghp_integration_test";

/// Command for the built binary with ambient configuration scrubbed.
pub fn ecs_sync() -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_ecs-sync"));
    command
        .env_remove("GITHUB_TOKEN")
        .env_remove("BASE_BRANCH")
        .env_remove("PLUGINS_REPO_PATH")
        .env("ECS_SYNC_LOG", "warn");
    command
}

pub fn stdout_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

pub fn stderr_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

pub fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

pub fn run_git(cwd: &Path, args: &[&str]) {
    let status = Command::new("git")
        .args(["-c", "user.name=ecs-sync", "-c", "user.email=ecs-sync@example.invalid"])
        .args(args)
        .current_dir(cwd)
        .status()
        .expect("run git");
    assert!(status.success(), "git {args:?} failed in {}", cwd.display());
}

/// Write a config file into `dir` and return its path.
pub fn write_config(dir: &Path, json: &str) -> PathBuf {
    let path = dir.join("ecs-sync.json");
    fs::write(&path, json).expect("write config");
    path
}

/// Source checkout whose feature branch diverges from `origin/master`.
pub struct SourceRepo {
    pub temp_dir: TempDir,
    pub work: PathBuf,
}

impl SourceRepo {
    /// Bare origin with one commit on master, plus a clone on `feature`.
    pub fn new() -> Self {
        let temp_dir = tempfile::tempdir().expect("create temp dir");
        let origin = temp_dir.path().join("origin.git");
        let work = temp_dir.path().join("work");
        fs::create_dir_all(&origin).expect("create origin");
        fs::create_dir_all(&work).expect("create work");

        run_git(&origin, &["init", "--bare", "--quiet"]);
        run_git(&origin, &["symbolic-ref", "HEAD", "refs/heads/master"]);
        run_git(&work, &["init", "--quiet"]);
        run_git(&work, &["symbolic-ref", "HEAD", "refs/heads/master"]);
        fs::create_dir_all(work.join("ecs/alerts/fields")).expect("create module dir");
        fs::write(work.join("ecs/alerts/fields/custom.yml"), "fields: []\n")
            .expect("write module file");
        fs::write(work.join("README.md"), "source\n").expect("write readme");
        run_git(&work, &["add", "--all"]);
        run_git(&work, &["commit", "--quiet", "-m", "init"]);
        let origin_url = origin.to_str().expect("utf-8 path");
        run_git(&work, &["remote", "add", "origin", origin_url]);
        run_git(&work, &["push", "--quiet", "origin", "master"]);
        run_git(&work, &["checkout", "--quiet", "-b", "feature"]);

        Self { temp_dir, work }
    }

    pub fn commit_file(&self, rel: &str, contents: &str) {
        let path = self.work.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent");
        }
        fs::write(&path, contents).expect("write file");
        run_git(&self.work, &["add", "--all"]);
        run_git(&self.work, &["commit", "--quiet", "-m", "change"]);
    }
}
