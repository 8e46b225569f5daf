// src/config/loader.rs

use std::fs;
use std::path::Path;

use crate::config::model::{JobFile, RawJobFile};
use crate::errors::Result;

/// Read and deserialize a job file without semantic checks.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawJobFile> {
    let contents = fs::read_to_string(path.as_ref())?;
    let raw: RawJobFile = toml::from_str(&contents)?;
    Ok(raw)
}

/// Read a job file and validate it.
///
/// This is the entry point the CLI uses; the result is ready to be turned
/// into a task graph with [`crate::tasks::create_graph`].
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<JobFile> {
    let raw = load_from_path(path)?;
    JobFile::try_from(raw)
}
