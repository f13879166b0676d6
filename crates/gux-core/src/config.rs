//! Verification options.
//!
//! Every field has a default, so an empty TOML file is a valid config.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{GuxError, Result};

/// Thresholds and selection for one verification run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct VerifyOptions {
    /// Maximum ΔE between a declared colour and its nearest cluster.
    pub colour_threshold: f64,

    /// Number of k-means clusters.
    pub clusters: usize,

    /// Maximum pixel mismatch (percent) tolerated by `compare`.
    pub max_mismatch_pct: f64,

    /// Maximum census distribution distance tolerated by `census-diff`.
    pub census_shift_threshold: f64,

    /// Explicit technique selection. `None` picks the defaults.
    pub techniques: Option<Vec<String>>,

    pub policy: GatePolicy,

    /// Produce diff images from `compare`.
    pub diff_artifacts: bool,
}

impl Default for VerifyOptions {
    fn default() -> Self {
        Self {
            colour_threshold: 5.0,
            clusters: 5,
            max_mismatch_pct: 0.5,
            census_shift_threshold: 20.0,
            techniques: None,
            policy: GatePolicy::default(),
            diff_artifacts: false,
        }
    }
}

/// How unverified zones affect the exit status.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct GatePolicy {
    /// Treat every unverified zone as required.
    pub fail_on_unverified: bool,
}

impl VerifyOptions {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let options: Self = toml::from_str(text).map_err(|e| GuxError::Config(e.to_string()))?;
        options.validate()?;
        Ok(options)
    }

    /// Load options from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let options = Self::from_toml_str(&text)
            .map_err(|e| GuxError::Config(format!("{}: {e}", path.display())))?;
        tracing::debug!(path = %path.display(), "verify options loaded");
        Ok(options)
    }

    pub fn validate(&self) -> Result<()> {
        let non_negative = [
            ("colour_threshold", self.colour_threshold),
            ("max_mismatch_pct", self.max_mismatch_pct),
            ("census_shift_threshold", self.census_shift_threshold),
        ];
        for (field, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(GuxError::Config(format!(
                    "{field} must be a non-negative number, got {value}"
                )));
            }
        }
        if self.clusters == 0 {
            return Err(GuxError::Config("clusters must be at least 1".into()));
        }
        if let Some(names) = &self.techniques {
            if let Some(unknown) = names.iter().find(|n| crate::techniques::lookup(n).is_none()) {
                return Err(GuxError::Config(format!("unknown technique: {unknown}")));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_gives_defaults() {
        let options = VerifyOptions::from_toml_str("").unwrap();
        assert_eq!(options, VerifyOptions::default());
        assert_eq!(options.colour_threshold, 5.0);
        assert!(!options.policy.fail_on_unverified);
    }

    #[test]
    fn test_partial_toml() {
        let options = VerifyOptions::from_toml_str(
            r#"
colour_threshold = 2.5
techniques = ["colours", "lines"]

[policy]
fail_on_unverified = true
"#,
        )
        .unwrap();
        assert_eq!(options.colour_threshold, 2.5);
        assert_eq!(options.clusters, 5);
        assert_eq!(
            options.techniques,
            Some(vec!["colours".to_string(), "lines".to_string()])
        );
        assert!(options.policy.fail_on_unverified);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = VerifyOptions::from_toml_str("colour_treshold = 3.0").unwrap_err();
        assert!(matches!(err, GuxError::Config(_)));
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(VerifyOptions::from_toml_str("clusters = 0").is_err());
        assert!(VerifyOptions::from_toml_str("colour_threshold = -1.0").is_err());
        assert!(VerifyOptions::from_toml_str("techniques = [\"ocr\"]").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gux.toml");
        std::fs::write(&path, "max_mismatch_pct = 1.5\n").unwrap();
        let options = VerifyOptions::load(&path).unwrap();
        assert_eq!(options.max_mismatch_pct, 1.5);
    }
}
