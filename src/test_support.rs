//! Recording command runner for workflow tests.
use crate::process::{CommandOutput, CommandRunner, CommandSpec};
use anyhow::Result;
use std::cell::RefCell;

type Handler = Box<dyn Fn(&CommandSpec) -> CommandOutput>;

pub(crate) struct FakeRunner {
    handler: Handler,
    calls: RefCell<Vec<CommandSpec>>,
}

impl FakeRunner {
    /// Every command succeeds with empty output.
    pub(crate) fn succeeding() -> Self {
        Self::new(|_| ok(""))
    }

    pub(crate) fn new(handler: impl Fn(&CommandSpec) -> CommandOutput + 'static) -> Self {
        Self {
            handler: Box::new(handler),
            calls: RefCell::new(Vec::new()),
        }
    }

    /// Recorded command lines, in invocation order.
    pub(crate) fn command_lines(&self) -> Vec<String> {
        self.calls.borrow().iter().map(CommandSpec::display).collect()
    }

    pub(crate) fn calls(&self) -> Vec<CommandSpec> {
        self.calls.borrow().clone()
    }

    pub(crate) fn invoked(&self, prefix: &str) -> bool {
        self.command_lines()
            .iter()
            .any(|line| line.starts_with(prefix))
    }

    pub(crate) fn position(&self, prefix: &str) -> Option<usize> {
        self.command_lines()
            .iter()
            .position(|line| line.starts_with(prefix))
    }
}

impl CommandRunner for FakeRunner {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        self.calls.borrow_mut().push(spec.clone());
        Ok((self.handler)(spec))
    }
}

pub(crate) fn ok(stdout: &str) -> CommandOutput {
    CommandOutput {
        status: Some(0),
        stdout: stdout.to_string(),
        ..CommandOutput::default()
    }
}

pub(crate) fn failed(code: i32, stderr: &str) -> CommandOutput {
    CommandOutput {
        status: Some(code),
        stderr: stderr.to_string(),
        ..CommandOutput::default()
    }
}

/// True when `spec` invokes `program` with arguments starting with `args`.
pub(crate) fn matches(spec: &CommandSpec, program: &str, args: &[&str]) -> bool {
    spec.program == program
        && spec.args.len() >= args.len()
        && spec.args.iter().zip(args).all(|(actual, expected)| actual == expected)
}
