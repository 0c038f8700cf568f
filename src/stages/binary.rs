//! Greyscale to black/white conversion.

use image::GrayImage;
use imageproc::contrast::{ThresholdType, otsu_level, threshold};
use serde::Deserialize;

use super::ImageFilter;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BinarizeConfig {
    /// Pixels at or below this value become black. `None` picks the level
    /// with Otsu's method on every frame.
    pub threshold: Option<u8>,
}

pub struct BinaryFilter {
    config: BinarizeConfig,
}

impl BinaryFilter {
    pub fn new(config: BinarizeConfig) -> Self {
        Self { config }
    }

    /// Level used for `grey`: the configured one, or Otsu's.
    pub fn level(&self, grey: &GrayImage) -> u8 {
        self.config.threshold.unwrap_or_else(|| otsu_level(grey))
    }
}

impl ImageFilter for BinaryFilter {
    fn binarize(&self, grey: &GrayImage) -> GrayImage {
        threshold(grey, self.level(grey), ThresholdType::Binary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_threshold() {
        let grey = GrayImage::from_raw(5, 1, vec![100, 150, 200, 50, 128]).unwrap();
        let filter = BinaryFilter::new(BinarizeConfig {
            threshold: Some(128),
        });
        let binary = filter.binarize(&grey);
        assert_eq!(binary.as_raw(), &vec![0, 255, 255, 0, 0]);
    }

    #[test]
    fn test_otsu_separates_two_classes() {
        let mut raw = vec![50u8; 50];
        raw.extend(vec![200u8; 50]);
        let grey = GrayImage::from_raw(10, 10, raw).unwrap();
        let filter = BinaryFilter::new(BinarizeConfig::default());
        let level = filter.level(&grey);
        assert!((50..200).contains(&level));

        let binary = filter.binarize(&grey);
        assert_eq!(binary.get_pixel(0, 0)[0], 0);
        assert_eq!(binary.get_pixel(0, 9)[0], 255);
    }

    #[test]
    fn test_otsu_on_pure_black_and_white() {
        let grey = GrayImage::from_raw(2, 1, vec![0, 255]).unwrap();
        let binary = BinaryFilter::new(BinarizeConfig::default()).binarize(&grey);
        assert_eq!(binary.as_raw(), &vec![0, 255]);
    }
}
