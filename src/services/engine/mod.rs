//! Orchestration of a single synthesis request: build the invocation, run
//! the engine, resolve the produced file. Also owns scratch-directory
//! lifecycle (cleanup on failure, explicit release, stale sweep).

pub mod output;
pub mod request;
pub mod runner;

use log::{info, warn};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio_util::sync::CancellationToken;

use crate::config::EngineConfig;
use crate::errors::{AppError, AppResult};
use request::{EngineInvocation, GenerationRequest, SCRATCH_PREFIX};

/// A successfully generated audio file plus the engine's stdout.
#[derive(Debug)]
pub struct Generation {
    pub file_path: PathBuf,
    pub stdout: String,
}

/// Run one generation end to end. On any failure the scratch directory is
/// removed; on success it is kept so the UI can play the file, and released
/// later through [`cleanup_generation_file`].
pub async fn generate(
    config: &EngineConfig,
    request: &GenerationRequest,
    cancel: &CancellationToken,
) -> AppResult<Generation> {
    request.validate()?;

    let invocation = EngineInvocation::build(request, &config.temp_root).await?;
    let result = run_and_resolve(config, &invocation, cancel).await;

    if result.is_err() {
        if let Err(e) = tokio::fs::remove_dir_all(&invocation.scratch_dir).await {
            warn!(
                "Failed to remove scratch directory {}: {}",
                invocation.scratch_dir.display(),
                e
            );
        }
    }

    result
}

async fn run_and_resolve(
    config: &EngineConfig,
    invocation: &EngineInvocation,
    cancel: &CancellationToken,
) -> AppResult<Generation> {
    let process_output = runner::run(
        &config.binary,
        &invocation.args,
        &config.working_dir,
        config.timeout,
        cancel,
    )
    .await?;

    let file_path = output::resolve_output(&invocation.scratch_dir, &process_output).await?;
    info!("Generated audio file: {}", file_path.display());

    Ok(Generation {
        file_path,
        stdout: process_output.stdout,
    })
}

/// Map a generated file back to its scratch directory, refusing anything
/// outside the `supertonic_*` namespace directly under the temp root.
fn scratch_dir_of(file_path: &Path, temp_root: &Path) -> AppResult<PathBuf> {
    let dir = file_path
        .parent()
        .ok_or_else(|| AppError::InvalidRequest("path has no parent directory".into()))?;

    let name = dir.file_name().and_then(|n| n.to_str()).unwrap_or("");
    if !name.starts_with(SCRATCH_PREFIX) || dir.parent() != Some(temp_root) {
        return Err(AppError::InvalidRequest(format!(
            "{} is not inside a scratch directory",
            file_path.display()
        )));
    }

    Ok(dir.to_path_buf())
}

/// Release the scratch directory that produced `file_path`.
pub async fn cleanup_generation_file(file_path: &Path, temp_root: &Path) -> AppResult<()> {
    let scratch_dir = scratch_dir_of(file_path, temp_root)?;
    info!("Removing scratch directory {}", scratch_dir.display());
    tokio::fs::remove_dir_all(&scratch_dir).await?;
    Ok(())
}

/// Remove scratch directories older than `max_age` from the temp root.
/// Leftovers accumulate when the app is killed mid-generation or the UI
/// never releases a result.
pub async fn sweep_stale_scratch(temp_root: &Path, max_age: Duration) -> AppResult<usize> {
    let cutoff = SystemTime::now()
        .checked_sub(max_age)
        .unwrap_or(SystemTime::UNIX_EPOCH);
    let mut removed = 0usize;

    let mut read_dir = tokio::fs::read_dir(temp_root).await?;
    while let Some(entry) = read_dir.next_entry().await? {
        let path = entry.path();
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if !name.starts_with(SCRATCH_PREFIX) {
            continue;
        }

        let Ok(metadata) = entry.metadata().await else {
            continue;
        };
        if !metadata.is_dir() {
            continue;
        }
        let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        if modified >= cutoff {
            continue;
        }

        match tokio::fs::remove_dir_all(&path).await {
            Ok(()) => {
                info!("Swept stale scratch directory {}", path.display());
                removed += 1;
            }
            Err(e) => warn!("Failed to sweep {}: {}", path.display(), e),
        }
    }

    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use request::{Language, Voice};

    fn test_request(text: &str) -> GenerationRequest {
        GenerationRequest::new(text.to_string(), Voice::M1, Language::En, 1.0, Some(5))
    }

    #[tokio::test]
    async fn test_scratch_dir_of_accepts_scratch_paths() {
        let temp = tempfile::tempdir().unwrap();
        let scratch = temp.path().join("supertonic_1700000000000");
        let file = scratch.join("out.wav");
        assert_eq!(scratch_dir_of(&file, temp.path()).unwrap(), scratch);
    }

    #[tokio::test]
    async fn test_scratch_dir_of_refuses_foreign_paths() {
        let temp = tempfile::tempdir().unwrap();
        let foreign = temp.path().join("other_dir").join("out.wav");
        assert!(scratch_dir_of(&foreign, temp.path()).is_err());

        let nested = temp
            .path()
            .join("elsewhere")
            .join("supertonic_123")
            .join("out.wav");
        assert!(scratch_dir_of(&nested, temp.path()).is_err());
    }

    #[tokio::test]
    async fn test_cleanup_generation_file_removes_scratch_dir() {
        let temp = tempfile::tempdir().unwrap();
        let scratch = temp.path().join("supertonic_42");
        tokio::fs::create_dir(&scratch).await.unwrap();
        let file = scratch.join("out.wav");
        tokio::fs::write(&file, b"RIFF").await.unwrap();

        cleanup_generation_file(&file, temp.path()).await.unwrap();
        assert!(!scratch.exists());
    }

    #[tokio::test]
    async fn test_sweep_removes_only_stale_scratch_dirs() {
        let temp = tempfile::tempdir().unwrap();
        let stale = temp.path().join("supertonic_old");
        tokio::fs::create_dir(&stale).await.unwrap();
        let unrelated = temp.path().join("keepme");
        tokio::fs::create_dir(&unrelated).await.unwrap();

        // max_age of zero makes everything created before "now" stale
        tokio::time::sleep(Duration::from_millis(50)).await;
        let removed = sweep_stale_scratch(temp.path(), Duration::ZERO)
            .await
            .unwrap();

        assert_eq!(removed, 1);
        assert!(!stale.exists());
        assert!(unrelated.exists());
    }

    #[tokio::test]
    async fn test_sweep_keeps_fresh_scratch_dirs() {
        let temp = tempfile::tempdir().unwrap();
        let fresh = temp.path().join("supertonic_new");
        tokio::fs::create_dir(&fresh).await.unwrap();

        let removed = sweep_stale_scratch(temp.path(), Duration::from_secs(3600))
            .await
            .unwrap();

        assert_eq!(removed, 0);
        assert!(fresh.exists());
    }

    #[cfg(unix)]
    mod end_to_end {
        use super::*;
        use std::os::unix::fs::PermissionsExt;
        use tokio_util::sync::CancellationToken;

        /// Install a shell script standing in for the engine binary. It takes
        /// the real argument contract (`--save-dir <dir> ...`).
        async fn fake_engine(dir: &Path, body: &str) -> PathBuf {
            let path = dir.join("fake-engine");
            let script = format!("#!/bin/sh\n{}\n", body);
            tokio::fs::write(&path, script).await.unwrap();
            let mut perms = tokio::fs::metadata(&path).await.unwrap().permissions();
            perms.set_mode(0o755);
            tokio::fs::set_permissions(&path, perms).await.unwrap();
            path
        }

        fn config(binary: PathBuf, dir: &Path, temp_root: &Path) -> EngineConfig {
            EngineConfig {
                binary,
                working_dir: dir.to_path_buf(),
                timeout: Duration::from_secs(10),
                temp_root: temp_root.to_path_buf(),
            }
        }

        #[tokio::test]
        async fn test_generate_returns_written_wav() {
            let bin_dir = tempfile::tempdir().unwrap();
            let temp_root = tempfile::tempdir().unwrap();
            // $1 is --save-dir, $2 its value
            let engine =
                fake_engine(bin_dir.path(), "printf RIFF > \"$2/out.wav\"; echo done").await;
            let config = config(engine, bin_dir.path(), temp_root.path());

            let generation = generate(&config, &test_request("Hello"), &CancellationToken::new())
                .await
                .unwrap();

            assert!(generation.file_path.ends_with("out.wav"));
            assert!(generation.file_path.exists());
            assert!(generation.stdout.contains("done"));
            // Scratch dir survives success for playback
            assert!(generation.file_path.parent().unwrap().exists());
        }

        #[tokio::test]
        async fn test_generate_failure_removes_scratch_dir() {
            let bin_dir = tempfile::tempdir().unwrap();
            let temp_root = tempfile::tempdir().unwrap();
            let engine = fake_engine(bin_dir.path(), "echo bad model >&2; exit 2").await;
            let config = config(engine, bin_dir.path(), temp_root.path());

            let err = generate(&config, &test_request("Hello"), &CancellationToken::new())
                .await
                .unwrap_err();

            match err {
                AppError::EngineFailed { code, stderr } => {
                    assert_eq!(code, 2);
                    assert!(stderr.contains("bad model"));
                }
                other => panic!("expected EngineFailed, got {:?}", other),
            }
            // Failure path must not leak the scratch dir
            let mut entries = std::fs::read_dir(temp_root.path()).unwrap();
            assert!(entries.next().is_none());
        }

        #[tokio::test]
        async fn test_generate_clean_exit_without_output_is_missing_output() {
            let bin_dir = tempfile::tempdir().unwrap();
            let temp_root = tempfile::tempdir().unwrap();
            let engine = fake_engine(bin_dir.path(), "echo quiet success").await;
            let config = config(engine, bin_dir.path(), temp_root.path());

            let err = generate(&config, &test_request("Hello"), &CancellationToken::new())
                .await
                .unwrap_err();

            // The rendered message is what crosses the command boundary, so
            // the captured streams must survive into it
            assert!(err.to_string().contains("quiet success"));
            match err {
                AppError::MissingOutput { stdout, .. } => {
                    assert!(stdout.contains("quiet success"));
                }
                other => panic!("expected MissingOutput, got {:?}", other),
            }
        }

        #[tokio::test]
        async fn test_generate_rejects_invalid_request_before_spawning() {
            let temp_root = tempfile::tempdir().unwrap();
            // Deliberately nonexistent binary: validation must fire first
            let config = config(
                PathBuf::from("/nonexistent/engine"),
                temp_root.path(),
                temp_root.path(),
            );

            let err = generate(&config, &test_request("  "), &CancellationToken::new())
                .await
                .unwrap_err();
            assert!(matches!(err, AppError::InvalidRequest(_)));
        }
    }
}
