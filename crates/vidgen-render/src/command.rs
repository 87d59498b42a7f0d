//! Remotion CLI command builder and process runner.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::{RenderError, RenderResult};
use crate::progress::RenderProgress;

/// Lines of stderr kept for error reports.
const STDERR_TAIL_LINES: usize = 20;

/// Builder for one `remotion` CLI invocation.
#[derive(Debug, Clone)]
pub struct RemotionCommand {
    /// Program and leading args, e.g. `["npx", "remotion"]`
    launcher: Vec<String>,
    subcommand: String,
    positional: Vec<String>,
    flags: Vec<String>,
}

impl RemotionCommand {
    pub fn new(launcher: &[String], subcommand: impl Into<String>) -> Self {
        Self {
            launcher: launcher.to_vec(),
            subcommand: subcommand.into(),
            positional: Vec::new(),
            flags: Vec::new(),
        }
    }

    /// `remotion bundle <entry> --out-dir=<dir>`
    pub fn bundle(launcher: &[String], entry_point: &Path, out_dir: &Path) -> Self {
        Self::new(launcher, "bundle")
            .arg(entry_point.to_string_lossy())
            .flag("out-dir", out_dir.to_string_lossy())
    }

    /// `remotion compositions <serve-url> --props=<file>`
    pub fn compositions(launcher: &[String], serve_url: &Path, props_file: &Path) -> Self {
        Self::new(launcher, "compositions")
            .arg(serve_url.to_string_lossy())
            .flag("props", props_file.to_string_lossy())
    }

    /// `remotion render <serve-url> <composition> <output>`
    pub fn render(
        launcher: &[String],
        serve_url: &Path,
        composition_id: &str,
        output: &Path,
    ) -> Self {
        Self::new(launcher, "render")
            .arg(serve_url.to_string_lossy())
            .arg(composition_id)
            .arg(output.to_string_lossy())
    }

    /// Add a positional argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.positional.push(arg.into());
        self
    }

    /// Add `--name=value`.
    pub fn flag(mut self, name: &str, value: impl std::fmt::Display) -> Self {
        self.flags.push(format!("--{name}={value}"));
        self
    }

    pub fn program(&self) -> &str {
        self.launcher.first().map(String::as_str).unwrap_or("npx")
    }

    /// Arguments after the program name.
    pub fn build_args(&self) -> Vec<String> {
        let mut args: Vec<String> = self.launcher.iter().skip(1).cloned().collect();
        args.push(self.subcommand.clone());
        args.extend(self.positional.iter().cloned());
        args.extend(self.flags.iter().cloned());
        args
    }
}

/// Captured output of a finished process.
#[derive(Debug, Clone, Default)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Runs CLI commands with an optional hard timeout.
///
/// Children are killed when the run future is dropped, so an outer
/// `tokio::time::timeout` also terminates the process.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    timeout: Option<Duration>,
    working_dir: Option<PathBuf>,
}

impl ProcessRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub async fn run(&self, cmd: &RemotionCommand) -> RenderResult<ProcessOutput> {
        self.run_with_progress(cmd, |_| {}).await
    }

    /// Run, reporting render progress parsed from the output.
    pub async fn run_with_progress<F>(
        &self,
        cmd: &RemotionCommand,
        on_progress: F,
    ) -> RenderResult<ProcessOutput>
    where
        F: Fn(RenderProgress) + Send + Sync + 'static,
    {
        let program = cmd.program().to_string();
        which::which(&program).map_err(|_| RenderError::BinaryNotFound(program.clone()))?;

        let args = cmd.build_args();
        debug!("Running: {} {}", program, args.join(" "));

        let mut command = Command::new(&program);
        command
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }
        let mut child = command.spawn()?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| RenderError::invalid_output("stdout not captured"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| RenderError::invalid_output("stderr not captured"))?;

        let stdout_task = tokio::spawn(collect_lines(stdout, Some(on_progress)));
        let stderr_task = tokio::spawn(collect_lines(stderr, None::<fn(RenderProgress)>));

        let status = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
                Ok(status) => status?,
                Err(_) => {
                    warn!(
                        "{} {} timed out after {}s, killing process",
                        program,
                        cmd.subcommand,
                        limit.as_secs()
                    );
                    let _ = child.kill().await;
                    return Err(RenderError::Timeout(limit.as_secs()));
                }
            },
            None => child.wait().await?,
        };

        let output = ProcessOutput {
            stdout: stdout_task.await.unwrap_or_default(),
            stderr: stderr_task.await.unwrap_or_default(),
        };

        if status.success() {
            Ok(output)
        } else {
            Err(RenderError::command_failed(
                program,
                format!("{} exited with {}", cmd.subcommand, status),
                Some(tail(&output.stderr, STDERR_TAIL_LINES)),
                status.code(),
            ))
        }
    }
}

async fn collect_lines<R, F>(reader: R, on_progress: Option<F>) -> String
where
    R: AsyncRead + Unpin,
    F: Fn(RenderProgress),
{
    let mut lines = BufReader::new(reader).lines();
    let mut collected = String::new();
    while let Ok(Some(line)) = lines.next_line().await {
        if let Some(callback) = &on_progress {
            if let Some(progress) = RenderProgress::parse_line(&line) {
                callback(progress);
            }
        }
        collected.push_str(&line);
        collected.push('\n');
    }
    collected
}

fn tail(text: &str, lines: usize) -> String {
    let all: Vec<&str> = text.lines().collect();
    all[all.len().saturating_sub(lines)..].join("\n")
}
