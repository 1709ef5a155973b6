//! Async execution of external tools with a time limit.

use ms_core::{Error, Result};
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::process::Command;

/// Default limit for a single tool run.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Output captured from a finished tool.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub status: ExitStatus,
    /// Standard output, lossily decoded.
    pub stdout: String,
    /// Standard error, lossily decoded.
    pub stderr: String,
}

/// Builder for one invocation of an external tool.
///
/// The child process is killed if the returned future is dropped, so
/// aborting the task that awaits [`execute`](ToolCommand::execute) never
/// leaves a stray process behind.
///
/// ```no_run
/// use ms_ffprobe::ToolCommand;
/// use std::path::PathBuf;
///
/// # async fn example() -> ms_core::Result<()> {
/// let output = ToolCommand::new(PathBuf::from("ffprobe"))
///     .args(["-v", "error", "-show_format", "movie.mkv"])
///     .execute()
///     .await?;
/// println!("{}", output.stdout);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: PathBuf,
    args: Vec<String>,
    timeout: Duration,
}

impl ToolCommand {
    pub fn new(program: PathBuf) -> Self {
        Self {
            program,
            args: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn arg(&mut self, s: impl Into<String>) -> &mut Self {
        self.args.push(s.into());
        self
    }

    pub fn args(&mut self, iter: impl IntoIterator<Item = impl Into<String>>) -> &mut Self {
        self.args.extend(iter.into_iter().map(Into::into));
        self
    }

    pub fn timeout(&mut self, d: Duration) -> &mut Self {
        self.timeout = d;
        self
    }

    /// Run the tool and capture its output.
    ///
    /// # Errors
    ///
    /// [`Error::Tool`] when the tool cannot be spawned, exits non-zero
    /// (the message carries stderr), or runs past its time limit.
    pub async fn execute(&self) -> Result<ToolOutput> {
        let tool = self.tool_name();
        tracing::debug!(%tool, args = ?self.args, "running tool");

        let child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::tool(&tool, format!("failed to spawn: {e}")))?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| Error::tool(&tool, format!("timed out after {:?}", self.timeout)))?
            .map_err(|e| Error::tool(&tool, format!("I/O error waiting for process: {e}")))?;

        let output = ToolOutput {
            status: output.status,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        if !output.status.success() {
            return Err(Error::tool(
                tool,
                format!("exited with status {}: {}", output.status, output.stderr.trim()),
            ));
        }
        Ok(output)
    }

    fn tool_name(&self) -> String {
        self.program
            .file_name()
            .unwrap_or(self.program.as_os_str())
            .to_string_lossy()
            .into_owned()
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn captures_stdout() {
        let output = ToolCommand::new(PathBuf::from("sh"))
            .args(["-c", "echo hello"])
            .execute()
            .await
            .unwrap();
        assert!(output.status.success());
        assert_eq!(output.stdout.trim(), "hello");
    }

    #[tokio::test]
    async fn nonzero_exit_reports_stderr() {
        let err = ToolCommand::new(PathBuf::from("sh"))
            .args(["-c", "echo 'no such file' >&2; exit 1"])
            .execute()
            .await
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("[sh]"), "{msg}");
        assert!(msg.contains("no such file"), "{msg}");
    }

    #[tokio::test]
    async fn missing_tool_fails_to_spawn() {
        let err = ToolCommand::new(PathBuf::from("nonexistent_tool_xyz_12345"))
            .execute()
            .await
            .unwrap_err();
        assert!(err.to_string().contains("failed to spawn"));
    }

    #[tokio::test]
    async fn timeout_fires() {
        let err = ToolCommand::new(PathBuf::from("sleep"))
            .arg("10")
            .timeout(Duration::from_millis(100))
            .execute()
            .await
            .unwrap_err();
        assert!(err.to_string().contains("timed out"), "{err}");
    }
}
