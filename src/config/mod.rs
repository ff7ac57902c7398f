//! Settings for the promotion engine.
//!
//! This module handles everything around `skald.promote.yaml`:
//! - Parsing and deserializing the settings file
//! - Environment variable overrides and `.env` loading
//! - Validation of settings values

mod parser;
mod settings;

pub use parser::{DEFAULT_SETTINGS_FILES, SettingsParser, find_settings_file};
pub use settings::PromotionSettings;
