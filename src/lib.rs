//! Core Config Library
//!
//! Loads application settings from YAML/JSON files, environment variables
//! and programmatic defaults into one thread-safe store, with typed
//! accessors and weakly typed deserialization into caller structs.
//!
//! ```no_run
//! use core_config::{Config, with_defaults, with_env, with_filepath};
//! use serde_json::json;
//!
//! let cfg = Config::new([
//!     with_defaults([("environment", json!("staging"))]),
//!     with_env("CONFIG"),
//!     with_filepath("config.yaml"),
//! ])?;
//! let name = cfg.get_string_with_default("app.name", "my-app");
//! # let _ = name;
//! # Ok::<(), core_config::ConfigError>(())
//! ```

pub mod config;
pub mod error;

pub use config::{Config, ConfigOption, ConfigStruct, with_defaults, with_env, with_filepath};
pub use error::{ConfigError, ErrorCode, Result};
