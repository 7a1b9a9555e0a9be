//! Subprocess execution: spawns the engine, streams its output and
//! classifies the exit.

use log::{debug, error, info, warn};
use std::ffi::OsString;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use crate::errors::{AppError, AppResult};

/// Accumulated streams of a finished engine run.
#[derive(Debug, Default)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Run the engine to completion. Exactly one subprocess per call, no retries.
///
/// The child is killed when the cancellation token fires or the timeout
/// elapses; a well-behaved caller owns the scratch directory cleanup.
pub async fn run(
    binary: &Path,
    args: &[OsString],
    working_dir: &Path,
    timeout: Duration,
    cancel: &CancellationToken,
) -> AppResult<ProcessOutput> {
    info!("Spawning {} in {}", binary.display(), working_dir.display());
    debug!("Engine arguments: {:?}", args);

    let mut child = Command::new(binary)
        .args(args)
        .current_dir(working_dir)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| AppError::Launch {
            path: binary.to_path_buf(),
            source,
        })?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow::anyhow!("Failed to get stdout handle"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow::anyhow!("Failed to get stderr handle"))?;

    // Drain both pipes as data arrives so the child never blocks on a full
    // pipe buffer.
    let stdout_task = tokio::spawn(drain_lines(stdout, false));
    let stderr_task = tokio::spawn(drain_lines(stderr, true));

    let status = tokio::select! {
        _ = cancel.cancelled() => {
            warn!("Generation canceled, killing engine process");
            if let Err(e) = child.kill().await {
                error!("Failed to kill engine process: {}", e);
            }
            return Err(AppError::Canceled);
        }
        _ = tokio::time::sleep(timeout) => {
            warn!("Engine run exceeded {}s, killing process", timeout.as_secs());
            if let Err(e) = child.kill().await {
                error!("Failed to kill engine process: {}", e);
            }
            return Err(AppError::Timeout(timeout.as_secs()));
        }
        status = child.wait() => status?,
    };

    let stdout = stdout_task.await.unwrap_or_default();
    let stderr = stderr_task.await.unwrap_or_default();

    if !status.success() {
        let code = status.code().unwrap_or(-1);
        error!("Engine exited with code {}", code);
        return Err(AppError::EngineFailed { code, stderr });
    }

    info!("Engine run completed successfully");
    Ok(ProcessOutput { stdout, stderr })
}

/// Read a pipe line by line, logging as lines arrive and accumulating the
/// full text for diagnostics.
async fn drain_lines<R: AsyncRead + Unpin>(pipe: R, is_stderr: bool) -> String {
    let mut reader = BufReader::new(pipe);
    let mut accumulated = String::new();
    let mut line = String::new();

    loop {
        match reader.read_line(&mut line).await {
            Ok(0) => break, // EOF
            Ok(_) => {
                if is_stderr {
                    error!("engine stderr: {}", line.trim_end());
                } else {
                    debug!("engine stdout: {}", line.trim_end());
                }
                accumulated.push_str(&line);
                line.clear();
            }
            Err(e) => {
                error!("Error reading engine output: {}", e);
                break;
            }
        }
    }

    accumulated
}
