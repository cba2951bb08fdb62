//! Mapping generator invocation.
//!
//! The generator is an external script with two subcommands: `run <module>`
//! writes the module's legacy index template under the pinned ECS version, and
//! `down` releases whatever it started (containers).
use crate::config::{generator_argv, SyncConfig, TeardownPolicy};
use crate::process::{CommandRunner, CommandSpec};
use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// A template produced for one module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratedArtifact {
    pub module: String,
    pub path: PathBuf,
}

pub struct Generator<'a> {
    runner: &'a dyn CommandRunner,
    argv: Vec<String>,
    source_root: &'a Path,
    ecs_root: &'a str,
    ecs_version: &'a str,
    timeout: Duration,
}

impl<'a> Generator<'a> {
    pub fn new(
        runner: &'a dyn CommandRunner,
        config: &'a SyncConfig,
        source_root: &'a Path,
    ) -> Result<Self> {
        Ok(Self {
            runner,
            argv: generator_argv(config)?,
            source_root,
            ecs_root: &config.ecs_root,
            ecs_version: &config.ecs_version,
            timeout: config.timeouts.generator(),
        })
    }

    /// Where `run <module>` leaves the module's template.
    pub fn artifact_path(&self, module: &str) -> PathBuf {
        self.source_root
            .join(self.ecs_root)
            .join(module)
            .join("mappings")
            .join(self.ecs_version)
            .join("generated")
            .join("elasticsearch")
            .join("legacy")
            .join("template.json")
    }

    /// Generate every module in order, tearing down per `policy`.
    ///
    /// Teardown is attempted even when a generation step fails; the
    /// generation error wins when both fail.
    pub fn generate_all(
        &self,
        modules: &[String],
        policy: TeardownPolicy,
    ) -> Result<Vec<GeneratedArtifact>> {
        let generated = self.generate_each(modules, policy);
        if policy == TeardownPolicy::Once {
            finish_with_teardown(generated.as_ref().err(), self.down())?;
        }
        generated
    }

    fn generate_each(
        &self,
        modules: &[String],
        policy: TeardownPolicy,
    ) -> Result<Vec<GeneratedArtifact>> {
        let mut artifacts = Vec::with_capacity(modules.len());
        for module in modules {
            let generated = self.generate(module);
            if policy == TeardownPolicy::PerModule {
                finish_with_teardown(generated.as_ref().err(), self.down())?;
            }
            artifacts.push(generated?);
        }
        Ok(artifacts)
    }

    fn generate(&self, module: &str) -> Result<GeneratedArtifact> {
        tracing::info!(module = %module, version = %self.ecs_version, "generating template");
        let spec = self.command().args(["run", module]);
        let output = self
            .runner
            .run_checked(&spec)
            .with_context(|| format!("generate template for module {module}"))?;

        let path = self.artifact_path(module);
        if !path.is_file() {
            return Err(anyhow!(
                "generator did not produce {} for module {module}",
                path.display()
            ));
        }
        tracing::info!(
            module = %module,
            elapsed_ms = output.elapsed_ms,
            "generated template"
        );
        Ok(GeneratedArtifact {
            module: module.to_string(),
            path,
        })
    }

    fn down(&self) -> Result<()> {
        let spec = self.command().arg("down");
        self.runner
            .run_checked(&spec)
            .context("tear down generator")?;
        Ok(())
    }

    fn command(&self) -> CommandSpec {
        let mut argv = self.argv.iter();
        let program = argv.next().map(String::as_str).unwrap_or_default();
        CommandSpec::new(program, self.timeout)
            .args(argv.map(String::as_str))
            .current_dir(self.source_root)
    }
}

fn finish_with_teardown(
    generation_error: Option<&anyhow::Error>,
    teardown: Result<()>,
) -> Result<()> {
    match (generation_error, teardown) {
        (Some(_), Err(teardown_err)) => {
            tracing::warn!(error = %format!("{teardown_err:#}"), "generator teardown failed");
            Ok(())
        }
        (_, result) => result,
    }
}

#[cfg(test)]
#[path = "generator_tests.rs"]
mod tests;
