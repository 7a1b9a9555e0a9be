// Re-export commands from individual modules
pub mod tts_commands;
pub mod utility_commands;

pub use tts_commands::*;
pub use utility_commands::*;
