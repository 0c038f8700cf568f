//! Pipeline tuning loaded from YAML.
//!
//! Every section and field is optional; missing values take the defaults
//! of the reference stages.
//!
//! ```yaml
//! binarize:
//!   threshold: 110      # omit for Otsu
//! filter:
//!   min_contour_length: 20
//! pnp:
//!   max_reprojection_error: 4.0
//! ```

use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::geometry::PnPConfig;
use crate::stages::{
    BinarizeConfig, ContourFilterConfig, ContoursConfig, MatcherConfig, PerspectiveConfig,
};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub binarize: BinarizeConfig,
    pub contours: ContoursConfig,
    pub filter: ContourFilterConfig,
    pub rectify: PerspectiveConfig,
    pub matcher: MatcherConfig,
    pub pnp: PnPConfig,
}

impl PipelineConfig {
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        serde_yaml::from_str(text).context("Failed to parse pipeline config")
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        serde_yaml::from_reader(
            File::open(path).with_context(|| format!("Failed to open {:?}", path))?,
        )
        .with_context(|| format!("Failed to parse pipeline config {:?}", path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config = PipelineConfig::from_yaml_str(
            "binarize:\n  threshold: 90\npnp:\n  max_iterations: 5\n",
        )
        .unwrap();
        assert_eq!(config.binarize.threshold, Some(90));
        assert_eq!(config.pnp.max_iterations, 5);
        assert_relative_eq!(config.pnp.max_reprojection_error, 4.0);
        assert_eq!(config.contours.min_contour_size, 4);
        assert_relative_eq!(config.filter.min_contour_length, 20.0);
        assert_eq!(config.rectify.patch_size, 64);
        assert_eq!(config.matcher.max_distance, 0);
    }

    #[test]
    fn test_empty_document_is_default() {
        let config = PipelineConfig::from_yaml_str("{}").unwrap();
        assert_eq!(config.binarize.threshold, None);
    }

    #[test]
    fn test_shipped_config_parses() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("data/pipeline.yml");
        let config = PipelineConfig::from_file(path).unwrap();
        assert_eq!(config.binarize.threshold, None);
        assert_relative_eq!(config.filter.min_corner_distance, 10.0);
    }

    #[test]
    fn test_rejects_malformed_yaml() {
        assert!(PipelineConfig::from_yaml_str("pnp: [1, 2").is_err());
    }
}
