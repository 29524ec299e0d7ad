mod config;
mod formats;
mod job;
mod state;

// Export the types needed by other modules
pub use config::SettingsStore;
#[cfg(test)]
pub use config::Preferences;
pub use formats::{INPUT_FORMATS, OUTPUT_FORMATS};
pub use job::{ConversionJob, ConversionResult};
pub use state::{Phase, RepaintHook, Session, ShutdownDecision, StatusLevel, DEFAULT_TIMEOUT};
