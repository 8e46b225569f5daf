// src/graph/change.rs

//! The source change a build is produced for.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A single commit in a repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Commit {
    pub repository: String,
    pub git_hash: String,
}

impl Commit {
    pub fn new(repository: impl Into<String>, git_hash: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            git_hash: git_hash.into(),
        }
    }
}

/// A code-review patch applied on top of the commits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Patch {
    pub server: String,
    pub change: String,
    pub revision: String,
}

/// A set of commits (base first, then dependency overrides) plus an optional
/// patch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Change {
    #[serde(default)]
    pub commits: Vec<Commit>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patch: Option<Patch>,
}

impl Change {
    pub fn from_commits(commits: impl IntoIterator<Item = Commit>) -> Self {
        Self {
            commits: commits.into_iter().collect(),
            patch: None,
        }
    }

    pub fn with_patch(mut self, patch: Patch) -> Self {
        self.patch = Some(patch);
        self
    }

    /// Identifier safe to embed in task ids, e.g. `chromium@7c7e90be` or
    /// `chromium@aaa_v8@bbb_+_12345/2`.
    pub fn id(&self) -> String {
        let mut parts: Vec<String> = self
            .commits
            .iter()
            .map(|c| format!("{}@{}", c.repository, c.git_hash))
            .collect();
        if let Some(patch) = &self.patch {
            parts.push(format!("+_{}/{}", patch.change, patch.revision));
        }
        parts.join("_")
    }
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let commits: Vec<String> = self
            .commits
            .iter()
            .map(|c| format!("{}@{}", c.repository, c.git_hash))
            .collect();
        write!(f, "{}", commits.join(" "))?;
        if let Some(patch) = &self.patch {
            write!(f, " + {}/{}", patch.change, patch.revision)?;
        }
        Ok(())
    }
}
