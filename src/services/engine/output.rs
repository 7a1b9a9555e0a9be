//! Output discovery: find the audio file the engine wrote into the scratch
//! directory.

use log::{debug, error, warn};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use super::runner::ProcessOutput;
use crate::errors::{AppError, AppResult};

const AUDIO_EXTENSION: &str = "wav";

/// Locate the `.wav` the engine produced. The engine's naming convention is
/// undocumented, so when several files qualify the newest by modification
/// time wins, with filename order breaking ties.
pub async fn resolve_output(scratch_dir: &Path, output: &ProcessOutput) -> AppResult<PathBuf> {
    debug!(
        "Searching for .{} output in {}",
        AUDIO_EXTENSION,
        scratch_dir.display()
    );

    let mut matching: Vec<(PathBuf, SystemTime)> = Vec::new();
    let mut seen: Vec<String> = Vec::new();

    let mut read_dir = tokio::fs::read_dir(scratch_dir).await.inspect_err(|e| {
        error!(
            "Failed to read scratch directory {}: {}",
            scratch_dir.display(),
            e
        );
    })?;

    while let Some(entry) = read_dir.next_entry().await? {
        let path = entry.path();
        seen.push(entry.file_name().to_string_lossy().into_owned());

        let is_audio = path
            .extension()
            .is_some_and(|ext| ext.to_string_lossy().eq_ignore_ascii_case(AUDIO_EXTENSION));
        if !is_audio {
            continue;
        }

        match entry.metadata().await {
            Ok(metadata) if metadata.is_file() => {
                let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
                matching.push((path, modified));
            }
            Ok(_) => {}
            Err(e) => warn!("Failed to get metadata for {}: {}", path.display(), e),
        }
    }

    if matching.is_empty() {
        error!(
            "Engine exited cleanly but wrote no .{} file to {}; directory contains: {:?}",
            AUDIO_EXTENSION,
            scratch_dir.display(),
            seen
        );
        return Err(AppError::MissingOutput {
            stdout: output.stdout.clone(),
            stderr: output.stderr.clone(),
        });
    }

    if matching.len() > 1 {
        warn!(
            "Engine wrote {} audio files to {}, picking the newest",
            matching.len(),
            scratch_dir.display()
        );
    }

    matching.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    let (path, _) = matching.into_iter().next().unwrap();
    debug!("Resolved engine output: {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_output() -> ProcessOutput {
        ProcessOutput::default()
    }

    #[tokio::test]
    async fn test_single_wav_is_resolved() {
        let dir = tempfile::tempdir().unwrap();
        let wav = dir.path().join("out.wav");
        tokio::fs::write(&wav, b"RIFF").await.unwrap();

        let resolved = resolve_output(dir.path(), &empty_output()).await.unwrap();
        assert_eq!(resolved, wav);
    }

    #[tokio::test]
    async fn test_extension_match_is_case_insensitive() {
        let dir = tempfile::tempdir().unwrap();
        let wav = dir.path().join("OUT.WAV");
        tokio::fs::write(&wav, b"RIFF").await.unwrap();

        let resolved = resolve_output(dir.path(), &empty_output()).await.unwrap();
        assert_eq!(resolved, wav);
    }

    #[tokio::test]
    async fn test_non_audio_files_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("log.txt"), b"noise")
            .await
            .unwrap();
        tokio::fs::create_dir(dir.path().join("nested.wav"))
            .await
            .unwrap();
        let wav = dir.path().join("speech.wav");
        tokio::fs::write(&wav, b"RIFF").await.unwrap();

        let resolved = resolve_output(dir.path(), &empty_output()).await.unwrap();
        assert_eq!(resolved, wav);
    }

    #[tokio::test]
    async fn test_empty_directory_is_missing_output_with_diagnostics() {
        let dir = tempfile::tempdir().unwrap();
        let output = ProcessOutput {
            stdout: "synthesis done".to_string(),
            stderr: "warning: slow".to_string(),
        };

        let err = resolve_output(dir.path(), &output).await.unwrap_err();
        match err {
            AppError::MissingOutput { stdout, stderr } => {
                assert_eq!(stdout, "synthesis done");
                assert_eq!(stderr, "warning: slow");
            }
            other => panic!("expected MissingOutput, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unreadable_directory_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let gone = dir.path().join("never-created");
        let err = resolve_output(&gone, &empty_output()).await.unwrap_err();
        assert!(matches!(err, AppError::Io(_)));
    }

    #[tokio::test]
    async fn test_newest_wav_wins() {
        let dir = tempfile::tempdir().unwrap();
        let older = dir.path().join("a_first.wav");
        tokio::fs::write(&older, b"RIFF1").await.unwrap();
        // Coarse filesystem mtime resolution needs a real gap
        tokio::time::sleep(std::time::Duration::from_millis(1100)).await;
        let newer = dir.path().join("z_second.wav");
        tokio::fs::write(&newer, b"RIFF2").await.unwrap();

        let resolved = resolve_output(dir.path(), &empty_output()).await.unwrap();
        assert_eq!(resolved, newer);
    }
}
