//! Engine location and persisted UI settings.

use anyhow::{Result, anyhow};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use tauri::Manager;
use tauri_plugin_store::StoreExt;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::errors::{AppError, AppResult};
use crate::services::engine::request::{Language, Voice};

#[cfg(windows)]
const ENGINE_BINARY: &str = "supertonic.exe";
#[cfg(not(windows))]
const ENGINE_BINARY: &str = "supertonic";

const DEFAULT_TIMEOUT_SECS: u64 = 300;
const SETTINGS_STORE: &str = ".settings.dat";
const SETTINGS_KEY: &str = "ui_settings";

/// Resolved location of the external TTS engine.
///
/// The working directory matters: the engine resolves its `assets/` and
/// `onnx/` lookups relative to it.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub binary: PathBuf,
    pub working_dir: PathBuf,
    pub timeout: Duration,
    pub temp_root: PathBuf,
}

impl EngineConfig {
    /// Locate the engine binary: `SUPERTONIC_ENGINE` env override first, then
    /// the bundled `engine/` resource directory, then PATH.
    pub fn resolve(app: &tauri::AppHandle) -> AppResult<Self> {
        let binary = if let Ok(path) = std::env::var("SUPERTONIC_ENGINE") {
            info!("Using engine binary from SUPERTONIC_ENGINE: {}", path);
            PathBuf::from(path)
        } else if let Some(bundled) = Self::bundled_binary(app) {
            info!("Using bundled engine binary: {}", bundled.display());
            bundled
        } else if let Ok(found) = which::which(ENGINE_BINARY) {
            info!("Using engine binary from PATH: {}", found.display());
            found
        } else {
            return Err(AppError::EngineNotFound(format!(
                "engine binary '{}' not found; set SUPERTONIC_ENGINE or install it on PATH",
                ENGINE_BINARY
            )));
        };

        let working_dir = match std::env::var("SUPERTONIC_ENGINE_DIR") {
            Ok(dir) => PathBuf::from(dir),
            Err(_) => binary
                .parent()
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(".")),
        };
        debug!("Engine working directory: {}", working_dir.display());

        let timeout_secs = std::env::var("SUPERTONIC_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        Ok(Self {
            binary,
            working_dir,
            timeout: Duration::from_secs(timeout_secs),
            temp_root: std::env::temp_dir(),
        })
    }

    /// Used when startup resolution fails: spawning `supertonic` by bare
    /// name surfaces a launch failure on the first generate instead of
    /// blocking the app from opening.
    pub fn fallback() -> Self {
        Self {
            binary: PathBuf::from(ENGINE_BINARY),
            working_dir: PathBuf::from("."),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            temp_root: std::env::temp_dir(),
        }
    }

    fn bundled_binary(app: &tauri::AppHandle) -> Option<PathBuf> {
        let candidate = app
            .path()
            .resource_dir()
            .ok()?
            .join("engine")
            .join(ENGINE_BINARY);
        candidate.is_file().then_some(candidate)
    }
}

/// Application context handed to command handlers via Tauri managed state.
/// Holds the resolved engine config and the in-flight generation registry.
pub struct AppContext {
    pub engine: EngineConfig,
    active: Mutex<HashMap<Uuid, CancellationToken>>,
}

impl AppContext {
    pub fn new(engine: EngineConfig) -> Self {
        Self {
            engine,
            active: Mutex::new(HashMap::new()),
        }
    }

    /// Register a new in-flight generation and return its cancellation token.
    pub async fn register(&self, id: Uuid) -> CancellationToken {
        let token = CancellationToken::new();
        self.active.lock().await.insert(id, token.clone());
        token
    }

    /// Drop a finished generation from the registry.
    pub async fn finish(&self, id: &Uuid) {
        self.active.lock().await.remove(id);
    }

    /// Cancel an in-flight generation. Returns false if the id is unknown
    /// (already finished or never started).
    pub async fn cancel(&self, id: &Uuid) -> bool {
        match self.active.lock().await.get(id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }
}

/// Last-used form values, persisted so the UI restores them across launches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiSettings {
    pub voice: Voice,
    pub lang: Language,
    pub speed: f64,
    pub steps: u32,
}

impl Default for UiSettings {
    fn default() -> Self {
        UiSettings {
            voice: Voice::M1,
            lang: Language::En,
            speed: 1.0,
            steps: 5,
        }
    }
}

pub fn load_ui_settings(app: &tauri::AppHandle) -> Result<UiSettings> {
    let store = app.store(SETTINGS_STORE)?;
    let settings = match store.get(SETTINGS_KEY) {
        Some(value) => match serde_json::from_value::<UiSettings>(value) {
            Ok(settings) => settings,
            Err(e) => {
                log::warn!("Stored UI settings are unreadable, using defaults: {}", e);
                UiSettings::default()
            }
        },
        None => UiSettings::default(),
    };
    Ok(settings)
}

pub fn save_ui_settings(app: &tauri::AppHandle, settings: &UiSettings) -> Result<()> {
    let store = app.store(SETTINGS_STORE)?;
    let value = serde_json::to_value(settings)
        .map_err(|e| anyhow!("Failed to serialize UI settings: {}", e))?;
    store.set(SETTINGS_KEY, value);
    store
        .save()
        .map_err(|e| anyhow!("Failed to persist UI settings: {}", e))?;
    debug!("UI settings saved");
    Ok(())
}
