//! File-facing commands: the save flow, scratch release and small helpers.

use log::{error, info};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tauri_plugin_dialog::DialogExt;
use tauri_plugin_opener::OpenerExt;

use crate::config::AppContext;
use crate::services::engine;
use crate::utils::common::check_file_exists_and_valid;

const SOURCE_MISSING: &str = "Source file not found";
const DEFAULT_SAVE_NAME: &str = "supertonic_output.wav";

/// Terminal outcome of the save flow. Cancellation is not an error: the UI
/// treats it as a silent no-op.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub canceled: Option<bool>,
}

impl SaveResult {
    fn saved(path: &Path) -> Self {
        SaveResult {
            success: true,
            file_path: Some(path.to_string_lossy().into_owned()),
            error: None,
            canceled: None,
        }
    }

    fn failed(error: impl Into<String>) -> Self {
        SaveResult {
            success: false,
            file_path: None,
            error: Some(error.into()),
            canceled: None,
        }
    }

    fn canceled() -> Self {
        SaveResult {
            success: false,
            file_path: None,
            error: None,
            canceled: Some(true),
        }
    }
}

/// Pre-dialog guard for the save flow: the generated file must still exist
/// with real content. A zero-byte file means the engine run went wrong.
async fn source_still_valid(path: &Path) -> bool {
    check_file_exists_and_valid(path).await
}

/// Copy a generated file to a user-chosen destination. The dialog is only
/// shown when the source still exists; dismissing it touches nothing.
#[tauri::command]
pub async fn save_audio(app: tauri::AppHandle, source_path: String) -> Result<SaveResult, String> {
    let source = PathBuf::from(&source_path);
    if !source_still_valid(&source).await {
        info!("Save refused, source is gone: {}", source_path);
        return Ok(SaveResult::failed(SOURCE_MISSING));
    }

    // The dialog reports through a callback; bridge it back into async
    let (tx, rx) = tokio::sync::oneshot::channel();
    app.dialog()
        .file()
        .set_title("Save Audio File")
        .set_file_name(DEFAULT_SAVE_NAME)
        .add_filter("WAV Audio", &["wav"])
        .save_file(move |picked| {
            let _ = tx.send(picked);
        });

    let picked = rx.await.map_err(|e| e.to_string())?;
    let Some(picked) = picked else {
        info!("Save dialog dismissed");
        return Ok(SaveResult::canceled());
    };

    let destination = picked.into_path().map_err(|e| e.to_string())?;
    match tokio::fs::copy(&source, &destination).await {
        Ok(_) => {
            info!("Saved audio to {}", destination.display());
            Ok(SaveResult::saved(&destination))
        }
        Err(e) => {
            error!("Failed to copy {} to {}: {}", source_path, destination.display(), e);
            Ok(SaveResult::failed(e.to_string()))
        }
    }
}

/// Release the scratch directory behind a generated file once the UI is done
/// with it.
#[tauri::command]
pub async fn cleanup_generation(
    state: tauri::State<'_, AppContext>,
    file_path: String,
) -> Result<(), String> {
    engine::cleanup_generation_file(Path::new(&file_path), &state.engine.temp_root)
        .await
        .map_err(|e| e.to_string())
}

/// Check if a file exists and is accessible
#[tauri::command]
pub async fn check_file_exists(path: String) -> Result<bool, String> {
    Ok(Path::new(&path).exists())
}

/// Open a file using the system's default program
#[tauri::command]
pub async fn open_file(app: tauri::AppHandle, path: String) -> Result<(), String> {
    app.opener()
        .open_path(&path, None::<&str>)
        .map_err(|e| e.to_string())
}
