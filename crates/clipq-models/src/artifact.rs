//! Artifact references produced by the processing pipeline.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Reference to the downstream artifact a completed job produced.
///
/// A job is only considered successful when the pipeline hands back a
/// valid reference; returning without error is not enough.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
pub struct ArtifactRef {
    /// Object key in the artifact store
    pub storage_key: String,
    /// Optional public URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl ArtifactRef {
    /// Create a reference from a storage key.
    pub fn new(storage_key: impl Into<String>) -> Self {
        Self {
            storage_key: storage_key.into(),
            url: None,
        }
    }

    /// Set the public URL.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Completion criterion: the storage key must be non-empty.
    pub fn is_valid(&self) -> bool {
        !self.storage_key.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_storage_key_is_invalid() {
        assert!(!ArtifactRef::default().is_valid());
        assert!(!ArtifactRef::new("   ").is_valid());
        assert!(ArtifactRef::new("clips/u1/v1/clip.mp4").is_valid());
    }
}
