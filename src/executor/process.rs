//! Local process execution
//!
//! [`ProcessCommand`] starts one external program and streams its stdout and
//! stderr lines through an [`OutputStream`]. The exit code is returned as a
//! value; deciding whether a non-zero exit matters is left to the caller,
//! since the engine tools print diagnostics on stderr on success and can exit
//! 0 on functional failure.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;

use tokio::process::Command;
use tokio::sync::mpsc;

use super::stream::{CommandOutcome, OutputStream, STREAM_CAPACITY, forward_lines};
use crate::model::TransportError;
use crate::paths::CommandLine;

/// Builder for one local process invocation
#[derive(Debug, Clone)]
pub struct ProcessCommand {
    program: String,
    args: Vec<String>,
    cwd: Option<PathBuf>,
    env: BTreeMap<String, String>,
}

impl ProcessCommand {
    /// Creates a command for `program` with no arguments
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            env: BTreeMap::new(),
        }
    }

    /// Creates a command from a synthesized command line
    #[must_use]
    pub fn from_line(line: &CommandLine) -> Self {
        Self::new(line.program.clone()).args(line.args.iter().cloned())
    }

    /// Appends one argument
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends arguments
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Sets the working directory
    #[must_use]
    pub fn current_dir(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Overlays environment variables on top of the inherited environment
    #[must_use]
    pub fn envs<'a, I>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (&'a String, &'a String)>,
    {
        for (key, value) in vars {
            self.env.insert(key.clone(), value.clone());
        }
        self
    }

    /// Adds a single environment variable
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Program to run
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Arguments passed to the program
    #[must_use]
    pub fn arguments(&self) -> &[String] {
        &self.args
    }

    /// Builds the underlying tokio command without spawning it
    pub(crate) fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd.envs(&self.env);
        if let Some(cwd) = &self.cwd {
            cmd.current_dir(cwd);
        }
        cmd.kill_on_drop(true);
        cmd
    }

    /// Spawns the process and returns its output stream
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Spawn`] if the program cannot be started.
    pub fn spawn(&self) -> Result<OutputStream, TransportError> {
        tracing::debug!(program = %self.program, args = ?self.args, "Spawning process");

        let mut child = self
            .to_command()
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| TransportError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let (tx, rx) = mpsc::channel(STREAM_CAPACITY);
        let stdout_task = child
            .stdout
            .take()
            .map(|out| tokio::spawn(forward_lines(out, tx.clone())));
        let stderr_task = child
            .stderr
            .take()
            .map(|err| tokio::spawn(forward_lines(err, tx.clone())));

        let program = self.program.clone();
        let completion = tokio::spawn(async move {
            let status = tokio::select! {
                status = child.wait() => status?,
                () = tx.closed() => {
                    tracing::debug!(program = %program, "Output consumer dropped, killing process");
                    if let Err(e) = child.start_kill() {
                        tracing::debug!(program = %program, error = %e, "Kill failed");
                    }
                    child.wait().await?
                }
            };
            drop(tx);

            for task in [stdout_task, stderr_task].into_iter().flatten() {
                if let Ok(Err(e)) = task.await {
                    tracing::debug!(program = %program, error = %e, "Output reader stopped");
                }
            }

            Ok::<_, TransportError>(status.code().unwrap_or(-1))
        });

        Ok(OutputStream::new(rx, completion))
    }

    /// Runs the process to completion and collects its output
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Spawn`] if the program cannot be started.
    pub async fn output(&self) -> Result<CommandOutcome, TransportError> {
        self.spawn()?.finish().await
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    #[tokio::test]
    async fn test_streams_lines_in_order() {
        let mut stream = ProcessCommand::new("sh")
            .args(["-c", "echo first; echo second"])
            .spawn()
            .unwrap();

        assert_eq!(stream.next_line().await.as_deref(), Some("first"));
        assert_eq!(stream.next_line().await.as_deref(), Some("second"));

        let outcome = stream.finish().await.unwrap();
        assert_eq!(outcome.exit_code, 0);
        assert_eq!(outcome.output, vec!["first".to_string(), "second".to_string()]);
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_a_value() {
        let outcome = ProcessCommand::new("sh")
            .args(["-c", "echo before; exit 7"])
            .output()
            .await
            .unwrap();
        assert_eq!(outcome.exit_code, 7);
        assert_eq!(outcome.last_line(), Some("before"));
        assert!(matches!(
            outcome.into_result(),
            Err(TransportError::NonZeroExit { code: 7, .. })
        ));
    }

    #[tokio::test]
    async fn test_stderr_is_captured() {
        let outcome = ProcessCommand::new("sh")
            .args(["-c", "echo diagnostics >&2"])
            .output()
            .await
            .unwrap();
        assert!(outcome.is_success());
        assert_eq!(outcome.output, vec!["diagnostics".to_string()]);
    }

    #[tokio::test]
    async fn test_env_overlay_and_cwd() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = ProcessCommand::new("sh")
            .args(["-c", "echo $UCI_MARKER; pwd"])
            .env("UCI_MARKER", "overlay")
            .current_dir(dir.path())
            .output()
            .await
            .unwrap();
        assert_eq!(outcome.output[0], "overlay");
        let cwd = std::fs::canonicalize(dir.path()).unwrap();
        assert_eq!(outcome.output[1], cwd.to_string_lossy());
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let err = ProcessCommand::new("/definitely/not/a/program").spawn().unwrap_err();
        assert!(matches!(err, TransportError::Spawn { .. }));
    }

    #[tokio::test]
    async fn test_dropping_stream_releases_process() {
        let mut stream = ProcessCommand::new("sh")
            .args(["-c", "echo $$; sleep 30"])
            .spawn()
            .unwrap();
        let pid = stream.next_line().await.unwrap();
        drop(stream);

        let mut released = false;
        for _ in 0..40 {
            tokio::time::sleep(Duration::from_millis(50)).await;
            let alive = std::process::Command::new("kill")
                .args(["-0", &pid])
                .stderr(std::process::Stdio::null())
                .status()
                .map(|s| s.success())
                .unwrap_or(false);
            if !alive {
                released = true;
                break;
            }
        }
        assert!(released, "process {pid} still running after stream was dropped");
    }
}
