//! External tool invocation
//!
//! gffread and BUSCO run as child processes. Commands are configured as
//! strings so a containerised wrapper (`docker run --rm img busco`) works the
//! same as a binary on `PATH`.

use async_trait::async_trait;
use std::fmt;
use std::path::Path;
use std::process::Stdio;
use tracing::debug;

/// A program plus arguments, built from a whitespace-separated command string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    program: String,
    args: Vec<String>,
}

impl CommandSpec {
    /// Split `command` on whitespace; `None` when it has no program
    pub fn parse(command: &str) -> Option<Self> {
        let mut parts = command.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self {
            program,
            args: parts.collect(),
        })
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn arguments(&self) -> &[String] {
        &self.args
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Captured result of one tool run
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    /// Exit code, `None` when killed by a signal
    pub code: Option<i32>,
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    /// Last `lines` lines of stderr, for error messages
    pub fn stderr_tail(&self, lines: usize) -> String {
        let all: Vec<&str> = self.stderr.lines().collect();
        all[all.len().saturating_sub(lines)..].join("\n")
    }
}

/// Runs external commands
#[async_trait]
pub trait ToolRunner: Send + Sync {
    /// Run `command` in `cwd` to completion.
    ///
    /// `Err` means the command could not be started; a non-zero exit is an
    /// `Ok` output with `success == false`.
    async fn run(&self, command: &CommandSpec, cwd: &Path) -> std::io::Result<ToolOutput>;
}

/// [`ToolRunner`] backed by real child processes
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

#[async_trait]
impl ToolRunner for ProcessRunner {
    async fn run(&self, command: &CommandSpec, cwd: &Path) -> std::io::Result<ToolOutput> {
        debug!(command = %command, cwd = %cwd.display(), "Running tool");

        let output = tokio::process::Command::new(command.program())
            .args(command.arguments())
            .current_dir(cwd)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await?;

        Ok(ToolOutput {
            code: output.status.code(),
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_command_spec_parse() {
        let spec = CommandSpec::parse("  docker run --rm  ezlabgva/busco busco ")
            .unwrap()
            .arg("-i")
            .arg("in.faa")
            .arg("-f");

        assert_eq!(spec.program(), "docker");
        assert_eq!(
            spec.arguments(),
            ["run", "--rm", "ezlabgva/busco", "busco", "-i", "in.faa", "-f"]
        );
        assert_eq!(spec.to_string(), "docker run --rm ezlabgva/busco busco -i in.faa -f");
        assert!(CommandSpec::parse("   ").is_none());
    }

    #[test]
    fn test_stderr_tail() {
        let output = ToolOutput {
            stderr: "a\nb\nc\n".to_string(),
            ..ToolOutput::default()
        };
        assert_eq!(output.stderr_tail(2), "b\nc");
        assert_eq!(output.stderr_tail(10), "a\nb\nc");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_process_runner_reports_exit_status() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ProcessRunner;

        let ok = runner
            .run(&CommandSpec::parse("sh -c").unwrap().arg("echo hi"), dir.path())
            .await
            .unwrap();
        assert!(ok.success);
        assert_eq!(ok.stdout.trim(), "hi");

        let failed = runner
            .run(&CommandSpec::parse("sh -c").unwrap().arg("echo oops >&2; exit 3"), dir.path())
            .await
            .unwrap();
        assert!(!failed.success);
        assert_eq!(failed.code, Some(3));
        assert_eq!(failed.stderr_tail(1), "oops");

        assert!(runner
            .run(&CommandSpec::parse("definitely-not-a-real-tool-xyz").unwrap(), dir.path())
            .await
            .is_err());
    }
}
