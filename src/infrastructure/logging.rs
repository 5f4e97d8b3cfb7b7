//! Logging configuration
//!
//! Initializes tracing for the application, and tees phase output into the
//! per-phase log files under the result root.

use std::path::{Path, PathBuf};

use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};

use crate::model::{EditorPlatform, EngineVersion};

/// Initializes logging with the specified level
///
/// `RUST_LOG` overrides `level`. Calling this more than once is harmless.
pub fn init_logging(level: &str) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .try_init();
}

/// Output of one phase, mirrored to tracing and a log file
///
/// A log file that cannot be created or written is reported once and then
/// skipped; the phase itself carries on.
#[derive(Debug)]
pub struct PhaseLog {
    platform: EditorPlatform,
    version: EngineVersion,
    phase: &'static str,
    path: PathBuf,
    writer: Option<BufWriter<File>>,
}

impl PhaseLog {
    /// Opens (truncating) the log file at `path`
    pub async fn create(
        path: &Path,
        platform: EditorPlatform,
        version: EngineVersion,
        phase: &'static str,
    ) -> Self {
        let writer = match open(path).await {
            Ok(file) => Some(BufWriter::new(file)),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Cannot create phase log");
                None
            }
        };
        Self {
            platform,
            version,
            phase,
            path: path.to_path_buf(),
            writer,
        }
    }

    /// Log file path
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Records one output line
    pub async fn line(&mut self, line: &str) {
        tracing::info!(
            platform = %self.platform,
            version = %self.version,
            phase = self.phase,
            "{line}"
        );
        self.write(line).await;
    }

    /// Records a status message that is not toolchain output
    pub async fn note(&mut self, message: &str) {
        tracing::info!(
            platform = %self.platform,
            version = %self.version,
            phase = self.phase,
            "{message}"
        );
        self.write(&format!("[unreal-ci] {message}")).await;
    }

    async fn write(&mut self, line: &str) {
        let Some(writer) = self.writer.as_mut() else {
            return;
        };
        let result = async {
            writer.write_all(line.as_bytes()).await?;
            writer.write_all(b"\n").await
        }
        .await;
        if let Err(e) = result {
            tracing::warn!(path = %self.path.display(), error = %e, "Phase log write failed");
            self.writer = None;
        }
    }

    /// Flushes the log file
    pub async fn finish(mut self) {
        if let Some(writer) = self.writer.as_mut()
            && let Err(e) = writer.flush().await
        {
            tracing::warn!(path = %self.path.display(), error = %e, "Phase log flush failed");
        }
    }
}

async fn open(path: &Path) -> std::io::Result<File> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    File::create(path).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_init_logging() {
        init_logging("debug");
        init_logging("info");
    }

    #[tokio::test]
    async fn test_phase_log_writes_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("build/Windows_5.3/Build.log");

        let mut log =
            PhaseLog::create(&path, EditorPlatform::Windows, EngineVersion::Ue5_3, "build").await;
        log.line("Compiling module").await;
        log.note("exit code 0").await;
        log.finish().await;

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "Compiling module\n[unreal-ci] exit code 0\n");
    }

    #[tokio::test]
    async fn test_phase_log_unwritable_path_is_tolerated() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "x").unwrap();

        let mut log = PhaseLog::create(
            &blocker.join("Build.log"),
            EditorPlatform::Mac,
            EngineVersion::Ue5_4,
            "build",
        )
        .await;
        log.line("still logged to tracing").await;
        log.finish().await;
    }
}
