//! Colour to greyscale conversion.

use image::{GrayImage, RgbImage, imageops};

use super::ImageConvertor;

/// Rec. 709 luma conversion.
#[derive(Debug, Default, Clone, Copy)]
pub struct GreyConverter;

impl ImageConvertor for GreyConverter {
    fn convert(&self, frame: &RgbImage) -> GrayImage {
        imageops::grayscale(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_black_and_white_are_preserved() {
        let mut frame = RgbImage::from_pixel(2, 1, Rgb([255, 255, 255]));
        frame.put_pixel(1, 0, Rgb([0, 0, 0]));
        let grey = GreyConverter.convert(&frame);
        assert_eq!(grey.get_pixel(0, 0)[0], 255);
        assert_eq!(grey.get_pixel(1, 0)[0], 0);
    }
}
