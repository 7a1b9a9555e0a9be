//! Generation commands: the boundary the frontend crosses to reach the
//! engine pipeline.

use log::{error, info};
use serde::Serialize;
use tauri::Emitter;
use uuid::Uuid;

use crate::config::{self, AppContext, UiSettings};
use crate::services::engine::{
    self,
    request::{GenerationRequest, Language, Voice},
};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResult {
    pub file_path: String,
    pub stdout: String,
}

#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationStarted {
    request_id: String,
}

/// An id/label pair the frontend renders as a picker option.
#[derive(Debug, Serialize)]
pub struct CatalogEntry {
    pub id: &'static str,
    pub label: &'static str,
}

/// Run one synthesis request end to end and return the produced file.
///
/// Emits `generation-started` with the request id first, so the UI can call
/// [`cancel_generation`] while the engine runs.
#[tauri::command]
pub async fn generate_tts(
    window: tauri::Window,
    state: tauri::State<'_, AppContext>,
    text: String,
    voice: Voice,
    lang: Language,
    speed: f64,
    steps: Option<u32>,
) -> Result<GenerationResult, String> {
    let request = GenerationRequest::new(text, voice, lang, speed, steps);
    info!(
        "Generation requested: voice={}, lang={}, speed={}, steps={}, text_len={}",
        request.voice.id(),
        request.lang.code(),
        request.speed,
        request.steps,
        request.text.len()
    );

    // Reject bad input before the request is registered, so the UI never
    // sees a started event for a generation that cannot run
    if let Err(e) = request.validate() {
        error!("Generation rejected: {}", e);
        return Err(e.to_string());
    }

    let id = Uuid::new_v4();
    let token = state.register(id).await;
    if let Err(e) = window.emit(
        "generation-started",
        GenerationStarted {
            request_id: id.to_string(),
        },
    ) {
        error!("Failed to emit generation-started: {}", e);
    }

    let result = engine::generate(&state.engine, &request, &token).await;
    state.finish(&id).await;

    match result {
        Ok(generation) => Ok(GenerationResult {
            file_path: generation.file_path.to_string_lossy().into_owned(),
            stdout: generation.stdout,
        }),
        Err(e) => {
            error!("Generation {} failed: {}", id, e);
            Err(e.to_string())
        }
    }
}

/// Cancel an in-flight generation. Returns false when the id is unknown,
/// meaning the request already finished.
#[tauri::command]
pub async fn cancel_generation(
    state: tauri::State<'_, AppContext>,
    request_id: String,
) -> Result<bool, String> {
    let id = Uuid::parse_str(&request_id).map_err(|e| e.to_string())?;
    let canceled = state.cancel(&id).await;
    info!("Cancel requested for {}: known={}", request_id, canceled);
    Ok(canceled)
}

/// Voice catalog for the picker UI.
#[tauri::command]
pub fn list_voices() -> Vec<CatalogEntry> {
    Voice::ALL
        .iter()
        .map(|v| CatalogEntry {
            id: v.id(),
            label: v.label(),
        })
        .collect()
}

/// Language catalog for the picker UI.
#[tauri::command]
pub fn list_languages() -> Vec<CatalogEntry> {
    Language::ALL
        .iter()
        .map(|l| CatalogEntry {
            id: l.code(),
            label: l.label(),
        })
        .collect()
}

/// Restore the last-used form values.
#[tauri::command]
pub async fn load_ui_settings(app: tauri::AppHandle) -> Result<UiSettings, String> {
    config::load_ui_settings(&app).map_err(|e| e.to_string())
}

/// Persist the current form values.
#[tauri::command]
pub async fn save_ui_settings(app: tauri::AppHandle, settings: UiSettings) -> Result<(), String> {
    config::save_ui_settings(&app, &settings).map_err(|e| e.to_string())
}
