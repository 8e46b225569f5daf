// src/config/mod.rs

//! Job file loading and validation.
//!
//! - `model.rs` is the TOML-backed data model.
//! - `loader.rs` reads a job file from disk.
//! - `validate.rs` turns the raw model into a checked [`JobFile`].

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_from_path};
pub use model::{BuildSection, EngineSection, JobFile, JobSection, RawJobFile, TestSection};

/// Bound on a single build/test service call.
pub const DEFAULT_CALL_TIMEOUT_SECS: u64 = 60;
/// Compare-and-set attempts per task update.
pub const DEFAULT_COMMIT_ATTEMPTS: u32 = 5;
/// Traverse-then-execute passes per evaluation.
pub const DEFAULT_MAX_PASSES: u32 = 8;
