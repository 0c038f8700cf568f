//! Marker definitions on disk.
//!
//! ```yaml
//! width: 0.157     # metres
//! height: 0.157
//! pattern:         # 1 = white, 0 = black; border not included
//!   - [1, 0, 1, 1, 0]
//!   - ...
//! ```

use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use tracing::debug;

use super::{MarkerGeometry, MarkerSource, SquaredBinaryPattern};

#[derive(Debug, Deserialize)]
struct MarkerYaml {
    width: f64,
    height: f64,
    pattern: Vec<Vec<u8>>,
}

impl TryFrom<MarkerYaml> for MarkerGeometry {
    type Error = anyhow::Error;

    fn try_from(raw: MarkerYaml) -> Result<Self> {
        if !(raw.width > 0.0 && raw.height > 0.0) {
            bail!(
                "Marker size must be positive, got {}x{}",
                raw.width,
                raw.height
            );
        }
        Ok(Self {
            pattern: SquaredBinaryPattern::from_rows(&raw.pattern)?,
            width: raw.width,
            height: raw.height,
        })
    }
}

/// Parse a marker definition from YAML text.
pub fn marker_from_yaml_str(text: &str) -> Result<MarkerGeometry> {
    let raw: MarkerYaml = serde_yaml::from_str(text).context("Failed to parse marker")?;
    raw.try_into()
}

/// Marker definition read from a YAML file when the pipeline initializes.
pub struct YamlMarkerFile {
    path: PathBuf,
}

impl YamlMarkerFile {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl MarkerSource for YamlMarkerFile {
    fn load_marker(&mut self) -> Result<MarkerGeometry> {
        let raw: MarkerYaml = serde_yaml::from_reader(
            File::open(&self.path).with_context(|| format!("Failed to open {:?}", self.path))?,
        )
        .with_context(|| format!("Failed to parse marker {:?}", self.path))?;
        let geometry = MarkerGeometry::try_from(raw)?;
        debug!(
            path = %self.path.display(),
            cells = geometry.pattern.size(),
            "marker file loaded"
        );
        Ok(geometry)
    }
}

/// Marker definition already held in memory.
pub struct StaticMarker(pub MarkerGeometry);

impl MarkerSource for StaticMarker {
    fn load_marker(&mut self) -> Result<MarkerGeometry> {
        Ok(self.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_marker_yaml() {
        let text = "width: 0.1\nheight: 0.12\npattern:\n  - [1, 0, 1]\n  - [0, 0, 1]\n  - [1, 1, 0]\n";
        let geometry = marker_from_yaml_str(text).unwrap();
        assert_eq!(geometry.pattern.size(), 3);
        assert_eq!(geometry.width, 0.1);
        assert_eq!(geometry.height, 0.12);
        assert!(geometry.pattern.is_white(2, 1));
    }

    #[test]
    fn test_rejects_non_positive_size() {
        let text = "width: 0.0\nheight: 0.1\npattern:\n  - [1]\n";
        assert!(marker_from_yaml_str(text).is_err());
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let mut source = YamlMarkerFile::new("/nonexistent/marker.yml");
        assert!(source.load_marker().is_err());
    }

    #[test]
    fn test_loads_shipped_marker() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("data/marker.yml");
        let geometry = YamlMarkerFile::new(path).load_marker().unwrap();
        assert_eq!(geometry.pattern.size(), 6);
        assert_eq!(geometry.width, 0.157);
    }
}
