//! SSH shell sessions
//!
//! An [`SshSession`] drives the OpenSSH client against one remote host. The
//! authenticated connection is established lazily on first use as a
//! multiplexing master (`ControlMaster`) and reused by every later call:
//!
//! - discrete primitives (`mkdir`, `test -d`, `rm -rf`, heredoc writes) are
//!   one round trip each over the master;
//! - scripts run on a separate shell channel (`ssh -T host /bin/sh`): all
//!   input lines are written, followed by an `echo` of a freshly generated
//!   sentinel marker carrying `$?`, and output is forwarded until the
//!   sentinel line shows up, the channel closes, or reading fails;
//! - file transfers go through `scp` over a second master, connected
//!   independently the first time a copy is requested.
//!
//! Password authentication goes through `sshpass -e`; key authentication
//! passes `-i` and runs in batch mode.
//!
//! The sentinel is matched as a line prefix. Remote output that happens to
//! start with the same marker would end the stream early; markers embed a
//! random UUID, which makes this unlikely but not impossible.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::sync::{OnceCell, mpsc};
use uuid::Uuid;

use super::process::ProcessCommand;
use super::stream::{
    CommandOutcome, OutputStream, STREAM_CAPACITY, decode_line, forward_lines,
};
use super::traits::{HealthStatus, RemoteTransport};
use crate::model::TransportError;

/// How the session authenticates
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SshAuth {
    /// Password, fed to `sshpass` through the environment
    Password(String),
    /// Private key file
    PrivateKey(PathBuf),
    /// Whatever the local agent or default identities provide
    Agent,
}

/// Remote host a session connects to
#[derive(Debug, Clone)]
pub struct SessionTarget {
    /// Host name or address
    pub host: String,
    /// SSH port
    pub port: u16,
    /// Login user
    pub user: String,
    /// Authentication method
    pub auth: SshAuth,
    /// Connection timeout
    pub connect_timeout: Duration,
}

impl SessionTarget {
    /// `user@host` destination string
    #[must_use]
    pub fn destination(&self) -> String {
        format!("{}@{}", self.user, self.host)
    }
}

#[derive(Debug, Clone, Copy)]
enum Tool {
    Ssh,
    Scp,
}

/// Lazily connected SSH session owned by a single builder
#[derive(Debug)]
pub struct SshSession {
    target: SessionTarget,
    master_socket: PathBuf,
    copy_socket: PathBuf,
    master: OnceCell<Result<(), String>>,
    copy_channel: OnceCell<Result<(), String>>,
    disposed: AtomicBool,
}

impl SshSession {
    /// Creates a session; nothing is connected until first use
    #[must_use]
    pub fn new(target: SessionTarget) -> Self {
        let id = Uuid::new_v4().simple().to_string();
        let id = &id[..12];
        let tmp = std::env::temp_dir();
        Self {
            target,
            master_socket: tmp.join(format!("uci-{id}-m.sock")),
            copy_socket: tmp.join(format!("uci-{id}-c.sock")),
            master: OnceCell::new(),
            copy_channel: OnceCell::new(),
            disposed: AtomicBool::new(false),
        }
    }

    /// Target this session talks to
    #[must_use]
    pub fn target(&self) -> &SessionTarget {
        &self.target
    }

    /// Returns true once [`SshSession::dispose`] ran
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    /// Options shared by every ssh/scp invocation
    pub(crate) fn connection_options(&self, tool_is_scp: bool, socket: &Path) -> Vec<String> {
        let port_flag = if tool_is_scp { "-P" } else { "-p" };
        let mut opts = vec![
            port_flag.to_string(),
            self.target.port.to_string(),
            "-o".to_string(),
            format!("ControlPath={}", socket.display()),
            "-o".to_string(),
            "StrictHostKeyChecking=accept-new".to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={}", self.target.connect_timeout.as_secs().max(1)),
        ];
        match &self.target.auth {
            SshAuth::PrivateKey(key) => opts.extend([
                "-i".to_string(),
                key.display().to_string(),
                "-o".to_string(),
                "BatchMode=yes".to_string(),
            ]),
            SshAuth::Password(_) => opts.extend([
                "-o".to_string(),
                "PubkeyAuthentication=no".to_string(),
                "-o".to_string(),
                "PreferredAuthentications=password,keyboard-interactive".to_string(),
            ]),
            SshAuth::Agent => opts.extend(["-o".to_string(), "BatchMode=yes".to_string()]),
        }
        opts
    }

    fn base_command(&self, tool: Tool) -> ProcessCommand {
        let program = match tool {
            Tool::Ssh => "ssh",
            Tool::Scp => "scp",
        };
        match &self.target.auth {
            SshAuth::Password(password) => ProcessCommand::new("sshpass")
                .arg("-e")
                .arg(program)
                .env("SSHPASS", password.clone()),
            _ => ProcessCommand::new(program),
        }
    }

    /// Command that reuses an established master on `socket`
    fn command(&self, tool: Tool, socket: &Path) -> ProcessCommand {
        self.base_command(tool)
            .args(self.connection_options(matches!(tool, Tool::Scp), socket))
            .args(["-o", "ControlMaster=no"])
    }

    async fn connect(
        &self,
        cell: &OnceCell<Result<(), String>>,
        socket: &Path,
        channel: &str,
    ) -> Result<(), TransportError> {
        if self.is_disposed() {
            return Err(TransportError::Disposed);
        }

        let state = cell
            .get_or_init(|| async {
                tracing::info!(
                    host = %self.target.host,
                    port = self.target.port,
                    channel,
                    "Opening SSH connection"
                );
                // The backgrounded master inherits stdio, so nothing is piped here.
                let status = self
                    .base_command(Tool::Ssh)
                    .args(self.connection_options(false, socket))
                    .args(["-o", "ControlMaster=yes", "-o", "ControlPersist=yes", "-N", "-f"])
                    .arg(self.target.destination())
                    .to_command()
                    .stdin(Stdio::null())
                    .stdout(Stdio::null())
                    .stderr(Stdio::null())
                    .status()
                    .await;
                match status {
                    Ok(s) if s.success() => Ok(()),
                    Ok(s) => Err(format!(
                        "ssh to {} exited with code {}",
                        self.target.destination(),
                        s.code().unwrap_or(-1)
                    )),
                    Err(e) => Err(format!("failed to start ssh: {e}")),
                }
            })
            .await;

        state.clone().map_err(TransportError::Unreachable)
    }

    async fn ensure_master(&self) -> Result<(), TransportError> {
        self.connect(&self.master, &self.master_socket, "shell").await
    }

    async fn ensure_copy_channel(&self) -> Result<(), TransportError> {
        self.connect(&self.copy_channel, &self.copy_socket, "copy").await
    }

    /// Runs one command on the remote host and waits for it
    ///
    /// # Errors
    ///
    /// Fails if the session cannot connect or ssh cannot be started.
    pub async fn run_command(&self, command: &str) -> Result<CommandOutcome, TransportError> {
        self.ensure_master().await?;
        tracing::debug!(host = %self.target.host, command, "Remote command");
        self.command(Tool::Ssh, &self.master_socket)
            .arg(self.target.destination())
            .arg(command)
            .output()
            .await
    }

    async fn run_checked(&self, command: &str) -> Result<(), TransportError> {
        self.run_command(command).await?.into_result().map(|_| ())
    }

    /// `mkdir -p` on the remote host
    ///
    /// # Errors
    ///
    /// Fails on transport errors or a non-zero exit.
    pub async fn create_directory(&self, path: &str) -> Result<(), TransportError> {
        self.run_checked(&format!("mkdir -p {}", shell_words::quote(path)))
            .await
    }

    /// Returns true if `path` is a directory on the remote host
    ///
    /// # Errors
    ///
    /// Fails on transport errors.
    pub async fn directory_exists(&self, path: &str) -> Result<bool, TransportError> {
        let outcome = self
            .run_command(&format!("test -d {}", shell_words::quote(path)))
            .await?;
        Ok(outcome.is_success())
    }

    /// Returns true if `path` is a regular file on the remote host
    ///
    /// # Errors
    ///
    /// Fails on transport errors.
    pub async fn file_exists(&self, path: &str) -> Result<bool, TransportError> {
        let outcome = self
            .run_command(&format!("test -f {}", shell_words::quote(path)))
            .await?;
        Ok(outcome.is_success())
    }

    /// `rm -rf` on the remote host
    ///
    /// # Errors
    ///
    /// Fails on transport errors or a non-zero exit.
    pub async fn delete_directory(&self, path: &str) -> Result<(), TransportError> {
        self.run_checked(&format!("rm -rf {}", shell_words::quote(path)))
            .await
    }

    /// Copies the contents of `from` into `to`, both on the remote host
    ///
    /// # Errors
    ///
    /// Fails on transport errors or a non-zero exit.
    pub async fn copy_directory(&self, from: &str, to: &str) -> Result<(), TransportError> {
        let to = shell_words::quote(to);
        self.run_checked(&format!(
            "mkdir -p {to} && cp -R {}/. {to}/",
            shell_words::quote(from)
        ))
        .await
    }

    /// Writes `content` to a remote file through a quoted heredoc
    ///
    /// # Errors
    ///
    /// Fails on transport errors or a non-zero exit.
    pub async fn write_file(&self, path: &str, content: &str) -> Result<(), TransportError> {
        self.run_checked(&heredoc_command(path, content)).await
    }

    async fn scp(&self, recursive: bool, from: String, to: String) -> Result<(), TransportError> {
        self.ensure_copy_channel().await?;
        let mut cmd = self.command(Tool::Scp, &self.copy_socket).arg("-q");
        if recursive {
            cmd = cmd.arg("-r");
        }
        let outcome = cmd.arg(&from).arg(&to).output().await?;
        if outcome.is_success() {
            Ok(())
        } else {
            Err(TransportError::Copy {
                reason: outcome
                    .last_line()
                    .map_or_else(|| format!("scp exited with code {}", outcome.exit_code), str::to_string),
                from,
                to,
            })
        }
    }

    fn remote_spec(&self, path: &str) -> String {
        format!("{}:{}", self.target.destination(), path)
    }

    /// Uploads one local file to `remote`
    ///
    /// # Errors
    ///
    /// Fails if the copy channel cannot connect or scp fails.
    pub async fn upload_file(&self, local: &Path, remote: &str) -> Result<(), TransportError> {
        self.scp(false, local.display().to_string(), self.remote_spec(remote))
            .await
    }

    /// Uploads a local directory so that it becomes `remote`
    ///
    /// # Errors
    ///
    /// Fails if the copy channel cannot connect or scp fails.
    pub async fn upload_directory(&self, local: &Path, remote: &str) -> Result<(), TransportError> {
        self.scp(true, local.display().to_string(), self.remote_spec(remote))
            .await
    }

    /// Downloads one remote file to `local`
    ///
    /// # Errors
    ///
    /// Fails if the copy channel cannot connect or scp fails.
    pub async fn download_file(&self, remote: &str, local: &Path) -> Result<(), TransportError> {
        if let Some(parent) = local.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        self.scp(false, self.remote_spec(remote), local.display().to_string())
            .await
    }

    /// Downloads a remote directory so that it replaces `local`
    ///
    /// # Errors
    ///
    /// Fails if the copy channel cannot connect or scp fails.
    pub async fn download_directory(&self, remote: &str, local: &Path) -> Result<(), TransportError> {
        if tokio::fs::try_exists(local).await? {
            tokio::fs::remove_dir_all(local).await?;
        }
        if let Some(parent) = local.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        self.scp(true, self.remote_spec(remote), local.display().to_string())
            .await
    }

    /// Closes every connection this session opened; runs at most once
    pub async fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }

        for socket in self.open_sockets() {
            let outcome = ProcessCommand::new("ssh")
                .args(["-o".to_string(), format!("ControlPath={}", socket.display())])
                .args(["-O", "exit"])
                .arg(self.target.destination())
                .output()
                .await;
            match outcome {
                Ok(o) if o.is_success() => {
                    tracing::debug!(host = %self.target.host, "SSH connection closed");
                }
                Ok(o) => tracing::warn!(
                    host = %self.target.host,
                    exit_code = o.exit_code,
                    "Closing SSH connection failed"
                ),
                Err(e) => tracing::warn!(
                    host = %self.target.host,
                    error = %e,
                    "Closing SSH connection failed"
                ),
            }
        }
    }

    fn open_sockets(&self) -> Vec<PathBuf> {
        [
            (&self.master, &self.master_socket),
            (&self.copy_channel, &self.copy_socket),
        ]
        .into_iter()
        .filter(|(cell, _)| matches!(cell.get(), Some(Ok(()))))
        .map(|(_, socket)| socket.clone())
        .collect()
    }
}

impl Drop for SshSession {
    fn drop(&mut self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        for socket in self.open_sockets() {
            let _ = std::process::Command::new("ssh")
                .arg("-o")
                .arg(format!("ControlPath={}", socket.display()))
                .args(["-O", "exit"])
                .arg(self.target.destination())
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status();
        }
    }
}

#[async_trait]
impl RemoteTransport for SshSession {
    async fn health_check(&self) -> HealthStatus {
        match self.ensure_master().await {
            Ok(()) => HealthStatus::Healthy,
            Err(e) => HealthStatus::Unhealthy {
                reason: e.to_string(),
            },
        }
    }

    async fn execute(&self, script: &[String]) -> Result<OutputStream, TransportError> {
        self.ensure_master().await?;

        let marker = sentinel_marker();
        let shell = self
            .command(Tool::Ssh, &self.master_socket)
            .arg("-T")
            .arg(self.target.destination())
            .arg("/bin/sh");
        let mut child = shell
            .to_command()
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| TransportError::Spawn {
                program: shell.program().to_string(),
                source,
            })?;

        let (Some(mut stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            return Err(TransportError::Io(std::io::Error::other(
                "shell channel has no stdio",
            )));
        };

        let (tx, rx) = mpsc::channel(STREAM_CAPACITY);
        let stderr_task = child
            .stderr
            .take()
            .map(|err| tokio::spawn(forward_lines(err, tx.clone())));

        let input = script_input(script, &marker);
        let host = self.target.host.clone();
        let completion = tokio::spawn(async move {
            stdin.write_all(input.as_bytes()).await?;
            stdin.flush().await?;

            let status = tokio::select! {
                read = forward_until_sentinel(stdout, &marker, &tx) => read?,
                () = tx.closed() => None,
            };
            if status.is_none() {
                tracing::debug!(host = %host, "Shell channel ended without sentinel");
            }

            drop(stdin);
            if let Err(e) = child.start_kill() {
                tracing::debug!(host = %host, error = %e, "Shell channel already gone");
            }
            child.wait().await?;
            drop(tx);
            if let Some(task) = stderr_task {
                let _ = task.await;
            }

            Ok::<_, TransportError>(status.unwrap_or(-1))
        });

        Ok(OutputStream::new(rx, completion))
    }
}

/// Fresh marker for one script execution
pub(crate) fn sentinel_marker() -> String {
    format!("__UCI_DONE_{}__", Uuid::new_v4().simple())
}

/// Script lines followed by the sentinel echo reporting the last exit status
pub(crate) fn script_input(script: &[String], marker: &str) -> String {
    let mut input = String::new();
    for line in script {
        input.push_str(line);
        input.push('\n');
    }
    input.push_str(&format!("echo \"{marker}:$?\"\n"));
    input
}

/// `cat` heredoc writing `content` verbatim to `path`
pub(crate) fn heredoc_command(path: &str, content: &str) -> String {
    let delimiter = format!("UCI_EOF_{}", Uuid::new_v4().simple());
    let mut command = format!("cat > {} <<'{delimiter}'\n", shell_words::quote(path));
    command.push_str(content);
    if !content.ends_with('\n') {
        command.push('\n');
    }
    command.push_str(&delimiter);
    command
}

/// Forwards lines until one starts with `marker`; returns the status it carries
///
/// Returns `None` if the reader hits EOF or the receiver goes away first.
pub(crate) async fn forward_until_sentinel<R>(
    reader: R,
    marker: &str,
    tx: &mpsc::Sender<String>,
) -> std::io::Result<Option<i32>>
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            return Ok(None);
        }
        let line = decode_line(&buf);
        if let Some(rest) = line.strip_prefix(marker) {
            return Ok(Some(
                rest.trim_start_matches(':').trim().parse().unwrap_or(-1),
            ));
        }
        if tx.send(line).await.is_err() {
            return Ok(None);
        }
    }
}
