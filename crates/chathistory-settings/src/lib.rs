//! # chathistory-settings
//!
//! Layered configuration for chat-history sessions.
//!
//! ```no_run
//! use chathistory_settings::load_settings;
//!
//! let cwd = std::env::current_dir().unwrap();
//! let settings = load_settings(&cwd, &serde_json::Map::new()).unwrap();
//! println!("user: {}", settings.user);
//! ```

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{find_config_file, load_settings, overlay, resolve_settings};
pub use types::{ApiMode, ChatSettings};
