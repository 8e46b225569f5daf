// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

use crate::graph::GraphError;
use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum TrygraphError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid event: {0}")]
    InvalidEvent(String),

    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Invalid task graph: {0}")]
    Graph(#[from] GraphError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, TrygraphError>;
