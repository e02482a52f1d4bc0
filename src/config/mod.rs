// src/config/mod.rs

//! Script configuration for chore.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate durations and turn the raw model into a `ScriptConfig`
//!   (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_from_path};
pub use model::{RawScriptConfig, ScriptConfig, ShutdownSection, SourcesSection};
pub use validate::parse_duration;
