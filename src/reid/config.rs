//! Re-identification settings, readable from the `reIdModel` JSON block.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::reid::error::{ReidError, Result};

/// Where a session keeps its embeddings.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersistencePolicy {
    /// Process memory only.
    #[default]
    Memory,
    /// Append-only log file in `dir`, removed when the session ends.
    File {
        dir: PathBuf,
        #[serde(default)]
        sync: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReidConfig {
    /// Embeddings per identity compared against a new raw identity (K).
    #[serde(default = "default_window_size", alias = "noOfFrameFeatures")]
    pub window_size: usize,

    /// Minimum mean cosine similarity for a remap, in (0, 1].
    #[serde(default = "default_confidence_threshold", alias = "confidence")]
    pub confidence_threshold: f32,

    #[serde(default)]
    pub persistence: PersistencePolicy,

    /// Execution target hint for the embedder (cpu, cuda, ...).
    #[serde(default = "default_device")]
    pub device: String,

    /// Embedder architecture hint.
    #[serde(default = "default_model_type")]
    pub model_type: String,

    /// Embedder weights location.
    #[serde(default)]
    pub model_path: Option<PathBuf>,
}

fn default_window_size() -> usize {
    10
}

fn default_confidence_threshold() -> f32 {
    0.8
}

fn default_device() -> String {
    "cpu".to_string()
}

fn default_model_type() -> String {
    "osnet_x1_0".to_string()
}

impl Default for ReidConfig {
    fn default() -> Self {
        Self {
            window_size: default_window_size(),
            confidence_threshold: default_confidence_threshold(),
            persistence: PersistencePolicy::default(),
            device: default_device(),
            model_type: default_model_type(),
            model_path: None,
        }
    }
}

impl ReidConfig {
    pub fn with_window_size(mut self, window_size: usize) -> Self {
        self.window_size = window_size;
        self
    }

    pub fn with_confidence_threshold(mut self, threshold: f32) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    pub fn with_persistence(mut self, persistence: PersistencePolicy) -> Self {
        self.persistence = persistence;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.window_size == 0 {
            return Err(ReidError::MalformedConfig(
                "window size must be a positive integer".to_string(),
            ));
        }
        let t = self.confidence_threshold;
        if !t.is_finite() || t <= 0.0 || t > 1.0 {
            return Err(ReidError::MalformedConfig(format!(
                "confidence threshold {t} outside (0, 1]"
            )));
        }
        if let PersistencePolicy::File { dir, .. } = &self.persistence {
            if dir.as_os_str().is_empty() {
                return Err(ReidError::MalformedConfig(
                    "file persistence needs a directory".to_string(),
                ));
            }
        }
        Ok(())
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ReidError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .map_err(|e| ReidError::Config(format!("{}: {e}", path.display())))?;
        Self::from_json_str(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(ReidConfig::default().validate().is_ok());
    }

    #[test]
    fn test_reads_legacy_keys() {
        let config = ReidConfig::from_json_str(
            r#"{
                "device": "cuda",
                "noOfFrameFeatures": 5,
                "confidence": 0.7,
                "modelType": "osnet_ain_x1_0"
            }"#,
        )
        .unwrap();
        assert_eq!(config.window_size, 5);
        assert_eq!(config.confidence_threshold, 0.7);
        assert_eq!(config.device, "cuda");
        assert_eq!(config.model_type, "osnet_ain_x1_0");
        assert_eq!(config.persistence, PersistencePolicy::Memory);
    }

    #[test]
    fn test_file_persistence() {
        let config = ReidConfig::from_json_str(
            r#"{ "windowSize": 3, "persistence": { "file": { "dir": "/var/lib/reid" } } }"#,
        )
        .unwrap();
        assert_eq!(
            config.persistence,
            PersistencePolicy::File {
                dir: PathBuf::from("/var/lib/reid"),
                sync: false
            }
        );
    }

    #[test]
    fn test_rejects_bad_values() {
        for json in [
            r#"{ "windowSize": 0 }"#,
            r#"{ "confidenceThreshold": 0.0 }"#,
            r#"{ "confidenceThreshold": 1.5 }"#,
            r#"{ "confidenceThreshold": -0.2 }"#,
        ] {
            assert!(
                matches!(ReidConfig::from_json_str(json), Err(ReidError::MalformedConfig(_))),
                "{json}"
            );
        }
    }

    #[test]
    fn test_rejects_invalid_json() {
        assert!(matches!(
            ReidConfig::from_json_str("{ not json"),
            Err(ReidError::Config(_))
        ));
    }
}
