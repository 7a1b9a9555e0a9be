use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("TTS engine not found: {0}")]
    EngineNotFound(String),

    #[error("Failed to launch TTS engine at {path}: {source}")]
    Launch {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("TTS engine exited with code {code}: {stderr}")]
    EngineFailed { code: i32, stderr: String },

    #[error(
        "TTS engine produced no audio file; stdout: {}; stderr: {}",
        trim_for_display(.stdout),
        trim_for_display(.stderr)
    )]
    MissingOutput { stdout: String, stderr: String },

    #[error("Generation timed out after {0} seconds")]
    Timeout(u64),

    #[error("Generation canceled")]
    Canceled,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type AppResult<T> = Result<T, AppError>;

/// Keep captured process output readable in a single-line error message.
fn trim_for_display(text: &str) -> String {
    const MAX_CHARS: usize = 500;

    let trimmed = text.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }
    if trimmed.chars().count() > MAX_CHARS {
        let mut cut: String = trimmed.chars().take(MAX_CHARS).collect();
        cut.push_str("...");
        cut
    } else {
        trimmed.to_string()
    }
}
