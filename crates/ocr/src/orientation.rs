use image::DynamicImage;

use crate::recognizer::OcrError;
use crate::types::Rotation;

/// Estimates how a page is rotated relative to upright.
pub trait OrientationEstimator: Send + Sync {
    fn estimate(&self, image: &DynamicImage) -> Result<Rotation, OcrError>;
}

/// Always reports the same rotation. Used for tests and for deployments that
/// know every scan arrives the same way up.
pub struct FixedOrientation(pub Rotation);

impl OrientationEstimator for FixedOrientation {
    fn estimate(&self, _image: &DynamicImage) -> Result<Rotation, OcrError> {
        Ok(self.0)
    }
}

/// Turn the page over when it is upside down. Quarter turns are left alone.
///
/// An estimator failure is not fatal: the page is processed as supplied.
pub fn correct_orientation(image: DynamicImage, estimator: &dyn OrientationEstimator) -> DynamicImage {
    match estimator.estimate(&image) {
        Ok(Rotation::Half) => {
            tracing::info!("Page is upside down, rotating 180°");
            image.rotate180()
        }
        Ok(other) => {
            if other != Rotation::Upright {
                tracing::debug!(rotation = %other, "Ignoring non half-turn rotation");
            }
            image
        }
        Err(e) => {
            tracing::warn!("Orientation estimate failed, using page as-is: {e}");
            image
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, GrayImage};

    struct Failing;

    impl OrientationEstimator for Failing {
        fn estimate(&self, _image: &DynamicImage) -> Result<Rotation, OcrError> {
            Err(OcrError::Engine("too few characters".into()))
        }
    }

    fn marked() -> DynamicImage {
        let mut img = GrayImage::new(6, 4);
        img.put_pixel(0, 0, Luma([255]));
        DynamicImage::ImageLuma8(img)
    }

    #[test]
    fn half_turn_is_rotated() {
        let out = correct_orientation(marked(), &FixedOrientation(Rotation::Half)).to_luma8();
        assert_eq!(out.dimensions(), (6, 4));
        assert_eq!(out.get_pixel(5, 3)[0], 255);
        assert_eq!(out.get_pixel(0, 0)[0], 0);
    }

    #[test]
    fn quarter_turns_are_not_corrected() {
        for rotation in [Rotation::Upright, Rotation::Quarter, Rotation::ThreeQuarter] {
            let out = correct_orientation(marked(), &FixedOrientation(rotation)).to_luma8();
            assert_eq!(out.dimensions(), (6, 4));
            assert_eq!(out.get_pixel(0, 0)[0], 255);
        }
    }

    #[test]
    fn estimator_failure_keeps_page() {
        let out = correct_orientation(marked(), &Failing).to_luma8();
        assert_eq!(out.get_pixel(0, 0)[0], 255);
    }
}
