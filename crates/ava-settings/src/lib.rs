//! # ava-settings
//!
//! Configuration for the intent-embedding generator.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`EmbedGenSettings::default()`]
//! 2. **User file**: `~/.ava/embedgen.json` (deep-merged over defaults)
//! 3. **Environment variables**: `AVA_*` overrides (highest priority)
//!
//! Command-line flags are applied on top by the binary.
//!
//! # Usage
//!
//! ```no_run
//! use ava_settings::load_settings;
//!
//! let settings = load_settings().unwrap_or_default();
//! println!("locale: {}", settings.locale);
//! ```

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::*;
