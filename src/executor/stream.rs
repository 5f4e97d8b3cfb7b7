//! Line streams produced by running commands
//!
//! Every transport hands its output to the caller as an [`OutputStream`]: a
//! bounded channel fed by a producer task. The consumer pulls lines with
//! [`OutputStream::next_line`] and collects the exit status with
//! [`OutputStream::finish`]. Dropping the stream closes the channel, which the
//! producer observes and uses to release its process or channel handle.

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::model::TransportError;

/// Capacity of the line channel between producer and consumer
pub const STREAM_CAPACITY: usize = 256;

/// Exit status and captured output of a finished command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
    /// Exit code; `-1` when the process was killed or the channel closed early
    pub exit_code: i32,
    /// Every line the consumer received
    pub output: Vec<String>,
}

impl CommandOutcome {
    /// Returns true if the command exited with status 0
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }

    /// Turns a non-zero exit into [`TransportError::NonZeroExit`]
    ///
    /// # Errors
    ///
    /// Returns the exit code and captured output when the exit code is not 0.
    pub fn into_result(self) -> Result<Self, TransportError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(TransportError::NonZeroExit {
                code: self.exit_code,
                output: self.output,
            })
        }
    }

    /// Last captured line, if any
    #[must_use]
    pub fn last_line(&self) -> Option<&str> {
        self.output.last().map(String::as_str)
    }
}

/// Lazily consumed output of one command invocation
#[derive(Debug)]
pub struct OutputStream {
    lines: mpsc::Receiver<String>,
    completion: JoinHandle<Result<i32, TransportError>>,
    captured: Vec<String>,
}

impl OutputStream {
    pub(crate) fn new(
        lines: mpsc::Receiver<String>,
        completion: JoinHandle<Result<i32, TransportError>>,
    ) -> Self {
        Self {
            lines,
            completion,
            captured: Vec::new(),
        }
    }

    /// Stream that replays pre-recorded lines and then reports `exit_code`
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn from_lines(lines: Vec<String>, exit_code: i32) -> Self {
        let (tx, rx) = mpsc::channel(STREAM_CAPACITY);
        let completion = tokio::spawn(async move {
            for line in lines {
                if tx.send(line).await.is_err() {
                    break;
                }
            }
            Ok::<_, TransportError>(exit_code)
        });
        Self::new(rx, completion)
    }

    /// Next output line, or `None` once the producer is done
    pub async fn next_line(&mut self) -> Option<String> {
        let line = self.lines.recv().await?;
        self.captured.push(line.clone());
        Some(line)
    }

    /// Drains remaining lines and waits for the exit status
    ///
    /// # Errors
    ///
    /// Returns the producer's error, e.g. when the process could not be waited
    /// on. A non-zero exit is not an error here.
    pub async fn finish(mut self) -> Result<CommandOutcome, TransportError> {
        while self.next_line().await.is_some() {}

        let exit_code = match self.completion.await {
            Ok(result) => result?,
            Err(join_error) => {
                return Err(TransportError::Io(std::io::Error::other(
                    join_error.to_string(),
                )));
            }
        };

        Ok(CommandOutcome {
            exit_code,
            output: self.captured,
        })
    }
}

/// Reads `reader` line by line into `tx` until EOF or until the receiver is gone
pub(crate) async fn forward_lines<R>(reader: R, tx: mpsc::Sender<String>) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            return Ok(());
        }
        if tx.send(decode_line(&buf)).await.is_err() {
            return Ok(());
        }
    }
}

/// Lossy UTF-8 decode with the line terminator stripped
pub(crate) fn decode_line(buf: &[u8]) -> String {
    String::from_utf8_lossy(buf)
        .trim_end_matches(&['\r', '\n'][..])
        .to_string()
}
