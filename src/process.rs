//! Bounded execution of external commands.
//!
//! Every git, generator, and `gh` invocation goes through [`CommandRunner`], so
//! the workflow sees a structured result (exit status, captured output,
//! elapsed time, timeout flag) instead of relying on exit-on-first-error.
use crate::util::tail_string;
use anyhow::{Context, Result};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(25);
/// How long pipes may stay open after the process group was killed.
const KILL_GRACE: Duration = Duration::from_secs(2);
const MAX_FAILURE_DETAIL_BYTES: usize = 2048;

/// Exit code reported when a command is killed for exceeding its timeout.
pub const TIMEOUT_EXIT_CODE: i32 = 124;

/// A single external command invocation.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    /// Written to the child's stdin, then closed. Never logged.
    pub stdin: Option<String>,
    pub env_remove: Vec<String>,
    pub timeout: Duration,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            stdin: None,
            env_remove: Vec::new(),
            timeout,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: &Path) -> Self {
        self.cwd = Some(dir.to_path_buf());
        self
    }

    pub fn stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    pub fn env_remove(mut self, key: impl Into<String>) -> Self {
        self.env_remove.push(key.into());
        self
    }

    /// Shell-quoted command line, for logs and error messages.
    pub fn display(&self) -> String {
        let program = std::iter::once(self.program.as_str());
        shell_words::join(program.chain(self.args.iter().map(String::as_str)))
    }
}

/// Captured result of a finished (or killed) command.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    /// `None` when the process was terminated by a signal.
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub elapsed_ms: u128,
    pub timed_out: bool,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        !self.timed_out && self.status == Some(0)
    }

    pub fn ensure_success(&self, spec: &CommandSpec) -> Result<(), ProcessError> {
        if self.success() {
            return Ok(());
        }
        if self.timed_out {
            return Err(ProcessError::TimedOut {
                command: spec.display(),
                timeout_secs: spec.timeout.as_secs(),
            });
        }
        match self.status {
            Some(code) => Err(ProcessError::Failed {
                command: spec.display(),
                code,
                detail: self.failure_detail(),
            }),
            None => Err(ProcessError::Signaled {
                command: spec.display(),
                detail: self.failure_detail(),
            }),
        }
    }

    fn failure_detail(&self) -> String {
        let stderr = self.stderr.trim();
        let text = if stderr.is_empty() {
            self.stdout.trim()
        } else {
            stderr
        };
        if text.is_empty() {
            return "no output".to_string();
        }
        tail_string(text, MAX_FAILURE_DETAIL_BYTES)
    }
}

/// External command failures, kept typed so `main` can propagate exit codes.
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("`{command}` exited with status {code}: {detail}")]
    Failed {
        command: String,
        code: i32,
        detail: String,
    },
    #[error("`{command}` was terminated by a signal: {detail}")]
    Signaled { command: String, detail: String },
    #[error("`{command}` timed out after {timeout_secs}s")]
    TimedOut { command: String, timeout_secs: u64 },
}

impl ProcessError {
    /// Process exit code the tool should terminate with.
    pub fn exit_code(&self) -> i32 {
        match self {
            ProcessError::Failed { code, .. } => *code,
            ProcessError::Signaled { .. } => 1,
            ProcessError::TimedOut { .. } => TIMEOUT_EXIT_CODE,
        }
    }
}

/// Seam between the workflow and the operating system.
pub trait CommandRunner {
    /// Run a command to completion or timeout; non-zero exits are not errors here.
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput>;

    /// Run a command and fail on non-zero exit, signal, or timeout.
    fn run_checked(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        let output = self.run(spec)?;
        output.ensure_success(spec)?;
        Ok(output)
    }
}

/// Runs commands as real child processes.
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        tracing::debug!(command = %spec.display(), cwd = ?spec.cwd, "running command");

        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if spec.stdin.is_some() {
            command.stdin(Stdio::piped());
        } else {
            command.stdin(Stdio::null());
        }
        if let Some(cwd) = &spec.cwd {
            command.current_dir(cwd);
        }
        for key in &spec.env_remove {
            command.env_remove(key);
        }
        isolate_process_group(&mut command);

        let start = Instant::now();
        let mut child = command
            .spawn()
            .with_context(|| format!("spawn {}", spec.program))?;

        // Drain pipes concurrently so a chatty child never blocks on a full pipe.
        let stdout_reader = Drain::spawn(child.stdout.take());
        let stderr_reader = Drain::spawn(child.stderr.take());

        if let Some(input) = &spec.stdin {
            if let Err(err) = feed_stdin(&mut child, input) {
                kill_tree(&mut child);
                let _ = child.wait();
                return Err(err).with_context(|| format!("write stdin for {}", spec.program));
            }
        }

        let mut timed_out = false;
        let status = loop {
            if let Some(status) = child
                .try_wait()
                .with_context(|| format!("poll {}", spec.program))?
            {
                break status;
            }
            if start.elapsed() > spec.timeout {
                timed_out = true;
                kill_tree(&mut child);
                break child
                    .wait()
                    .with_context(|| format!("reap timed out {}", spec.program))?;
            }
            thread::sleep(POLL_INTERVAL);
        };

        // Background descendants can hold the pipes open after the child exits;
        // the deadline still applies to them.
        let readers = [&stdout_reader, &stderr_reader];
        if !timed_out && !wait_for_readers(&readers, start, spec.timeout) {
            timed_out = true;
            tracing::warn!(
                program = %spec.program,
                "output still open after exit; killing process group"
            );
            kill_group(child.id());
        }
        if timed_out {
            wait_for_readers(&readers, Instant::now(), KILL_GRACE);
        }

        let stdout = stdout_reader.take();
        let stderr = stderr_reader.take();
        let elapsed_ms = start.elapsed().as_millis();

        tracing::info!(
            program = %spec.program,
            elapsed_ms,
            status = ?status.code(),
            timed_out,
            "command finished"
        );

        Ok(CommandOutput {
            status: status.code(),
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
            elapsed_ms,
            timed_out,
        })
    }
}

/// A broken pipe means the child exited without reading; its status decides.
fn feed_stdin(child: &mut Child, input: &str) -> std::io::Result<()> {
    let Some(mut stdin) = child.stdin.take() else {
        return Ok(());
    };
    match stdin.write_all(input.as_bytes()) {
        Err(err) if err.kind() == ErrorKind::BrokenPipe => Ok(()),
        result => result,
    }
}

/// Pipe reader whose bytes stay readable even if the thread never finishes.
struct Drain {
    buffer: Arc<Mutex<Vec<u8>>>,
    handle: Option<JoinHandle<()>>,
}

impl Drain {
    fn spawn<R>(pipe: Option<R>) -> Self
    where
        R: Read + Send + 'static,
    {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let handle = pipe.map(|mut pipe| {
            let buffer = Arc::clone(&buffer);
            thread::spawn(move || {
                let mut chunk = [0u8; 8192];
                loop {
                    match pipe.read(&mut chunk) {
                        Ok(0) => break,
                        Ok(read) => {
                            if let Ok(mut bytes) = buffer.lock() {
                                bytes.extend_from_slice(&chunk[..read]);
                            }
                        }
                        Err(err) if err.kind() == ErrorKind::Interrupted => {}
                        Err(_) => break,
                    }
                }
            })
        });
        Self { buffer, handle }
    }

    fn finished(&self) -> bool {
        match &self.handle {
            Some(handle) => handle.is_finished(),
            None => true,
        }
    }

    /// Bytes read so far; joins the thread only when it has already finished.
    fn take(self) -> Vec<u8> {
        if let Some(handle) = self.handle {
            if handle.is_finished() {
                let _ = handle.join();
            }
        }
        self.buffer
            .lock()
            .map(|mut bytes| std::mem::take(&mut *bytes))
            .unwrap_or_default()
    }
}

/// Wait until every reader hit EOF; false once `limit` has elapsed since `since`.
fn wait_for_readers(readers: &[&Drain], since: Instant, limit: Duration) -> bool {
    loop {
        if readers.iter().all(|reader| reader.finished()) {
            return true;
        }
        if since.elapsed() > limit {
            return false;
        }
        thread::sleep(POLL_INTERVAL);
    }
}

#[cfg(unix)]
fn isolate_process_group(command: &mut Command) {
    use std::os::unix::process::CommandExt;
    command.process_group(0);
}

#[cfg(not(unix))]
fn isolate_process_group(_command: &mut Command) {}

fn kill_tree(child: &mut Child) {
    kill_group(child.id());
    let _ = child.kill();
}

#[cfg(unix)]
fn kill_group(pid: u32) {
    // The child leads its own process group, so its pid is the group id.
    if let Ok(pgid) = libc::pid_t::try_from(pid) {
        // SAFETY: killpg only sends a signal; an empty group fails with ESRCH.
        unsafe {
            libc::killpg(pgid, libc::SIGKILL);
        }
    }
}

#[cfg(not(unix))]
fn kill_group(_pid: u32) {}

#[cfg(test)]
#[path = "process_tests.rs"]
mod tests;
