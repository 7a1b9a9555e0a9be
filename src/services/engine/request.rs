//! Generation requests: typed form parameters, boundary validation and
//! construction of the engine invocation (scratch directory + argument list).

use log::debug;
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::errors::{AppError, AppResult};

pub const SPEED_MIN: f64 = 0.5;
pub const SPEED_MAX: f64 = 2.0;
pub const STEPS_MIN: u32 = 1;
pub const STEPS_MAX: u32 = 10;
pub const DEFAULT_STEPS: u32 = 5;

/// Scratch directories are named `supertonic_<timestamp>` under the OS temp
/// root so concurrent and stale generations are easy to tell apart.
pub const SCRATCH_PREFIX: &str = "supertonic_";

/// Voice models shipped with the engine. Serialized as the bare id ("M1").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Voice {
    M1,
    M2,
    M3,
    M4,
    M5,
    F1,
    F2,
    F3,
    F4,
    F5,
}

impl Voice {
    pub const ALL: [Voice; 10] = [
        Voice::M1,
        Voice::M2,
        Voice::M3,
        Voice::M4,
        Voice::M5,
        Voice::F1,
        Voice::F2,
        Voice::F3,
        Voice::F4,
        Voice::F5,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            Voice::M1 => "M1",
            Voice::M2 => "M2",
            Voice::M3 => "M3",
            Voice::M4 => "M4",
            Voice::M5 => "M5",
            Voice::F1 => "F1",
            Voice::F2 => "F2",
            Voice::F3 => "F3",
            Voice::F4 => "F4",
            Voice::F5 => "F5",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Voice::M1 => "Male 1",
            Voice::M2 => "Male 2",
            Voice::M3 => "Male 3",
            Voice::M4 => "Male 4",
            Voice::M5 => "Male 5",
            Voice::F1 => "Female 1",
            Voice::F2 => "Female 2",
            Voice::F3 => "Female 3",
            Voice::F4 => "Female 4",
            Voice::F5 => "Female 5",
        }
    }

    /// Style asset path, resolved by the engine relative to its working dir.
    pub fn style_path(&self) -> PathBuf {
        Path::new("assets")
            .join("voice_styles")
            .join(format!("{}.json", self.id()))
    }
}

/// Languages the engine was trained on. Serialized lowercase ("en").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    En,
    Ko,
    Es,
    Pt,
    Fr,
}

impl Language {
    pub const ALL: [Language; 5] = [
        Language::En,
        Language::Ko,
        Language::Es,
        Language::Pt,
        Language::Fr,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Ko => "ko",
            Language::Es => "es",
            Language::Pt => "pt",
            Language::Fr => "fr",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Language::En => "English",
            Language::Ko => "Korean",
            Language::Es => "Spanish",
            Language::Pt => "Portuguese",
            Language::Fr => "French",
        }
    }
}

/// One user-initiated synthesis request. Constructed per action, consumed
/// once.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub text: String,
    pub voice: Voice,
    pub lang: Language,
    pub speed: f64,
    pub steps: u32,
}

impl GenerationRequest {
    pub fn new(
        text: String,
        voice: Voice,
        lang: Language,
        speed: f64,
        steps: Option<u32>,
    ) -> Self {
        GenerationRequest {
            text,
            voice,
            lang,
            speed,
            steps: steps.unwrap_or(DEFAULT_STEPS),
        }
    }

    /// Boundary validation. The engine would reject most of these itself,
    /// but failing here gives the user a typed error before a process spawns.
    pub fn validate(&self) -> AppResult<()> {
        if self.text.trim().is_empty() {
            return Err(AppError::InvalidRequest("text must not be empty".into()));
        }
        if !(SPEED_MIN..=SPEED_MAX).contains(&self.speed) {
            return Err(AppError::InvalidRequest(format!(
                "speed {} is outside [{}, {}]",
                self.speed, SPEED_MIN, SPEED_MAX
            )));
        }
        if !(STEPS_MIN..=STEPS_MAX).contains(&self.steps) {
            return Err(AppError::InvalidRequest(format!(
                "steps {} is outside [{}, {}]",
                self.steps, STEPS_MIN, STEPS_MAX
            )));
        }
        Ok(())
    }
}

/// A validated request turned into something the runner can execute: the
/// per-request scratch directory plus the engine argument list.
#[derive(Debug)]
pub struct EngineInvocation {
    pub scratch_dir: PathBuf,
    pub args: Vec<OsString>,
}

impl EngineInvocation {
    /// Create the scratch directory and build the argument list. The caller
    /// passes the temp root (normally `std::env::temp_dir()`).
    pub async fn build(request: &GenerationRequest, temp_root: &Path) -> std::io::Result<Self> {
        let timestamp = chrono::Utc::now().timestamp_millis();
        let scratch_dir = create_scratch_dir(temp_root, timestamp).await?;
        debug!("Created scratch directory {}", scratch_dir.display());

        let args: Vec<OsString> = vec![
            "--save-dir".into(),
            scratch_dir.clone().into_os_string(),
            "--text".into(),
            request.text.clone().into(),
            "--voice-style".into(),
            request.voice.style_path().into_os_string(),
            "--lang".into(),
            request.lang.code().into(),
            "--speed".into(),
            format_speed(request.speed).into(),
            "--total-step".into(),
            request.steps.to_string().into(),
        ];

        Ok(EngineInvocation { scratch_dir, args })
    }
}

/// Create `<root>/supertonic_<ts>`, appending `-N` until creation succeeds so
/// two requests issued in the same millisecond never share a directory.
async fn create_scratch_dir(root: &Path, timestamp: i64) -> std::io::Result<PathBuf> {
    let mut suffix = 0u32;
    loop {
        let name = if suffix == 0 {
            format!("{}{}", SCRATCH_PREFIX, timestamp)
        } else {
            format!("{}{}-{}", SCRATCH_PREFIX, timestamp, suffix)
        };
        let candidate = root.join(name);
        match tokio::fs::create_dir(&candidate).await {
            Ok(()) => return Ok(candidate),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => suffix += 1,
            Err(e) => return Err(e),
        }
    }
}

/// Stringify speed the way the engine expects: whole numbers without a
/// trailing ".0" (1.0 → "1", 1.5 → "1.5").
fn format_speed(speed: f64) -> String {
    if speed.fract() == 0.0 {
        format!("{}", speed as i64)
    } else {
        format!("{}", speed)
    }
}
