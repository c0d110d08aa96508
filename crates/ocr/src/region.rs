use docscan_core::{BoundingBox, BoundsPolicy, FieldKind, FieldMap};
use image::DynamicImage;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegionError {
    #[error("Field '{field}' box {bbox} lies outside the {width}x{height} image")]
    OutOfBounds {
        field: FieldKind,
        bbox: BoundingBox,
        width: u32,
        height: u32,
    },
}

/// A cropped field region, ready for recognition.
#[derive(Debug, Clone)]
pub struct FieldCrop {
    pub kind: FieldKind,
    /// Box actually cropped (differs from the map only when clamped).
    pub bbox: BoundingBox,
    pub image: DynamicImage,
}

/// Crop every field of `map` out of `image`, in map order.
///
/// Boxes that extend past the image edge fail the whole extraction under
/// [`BoundsPolicy::Reject`]; under [`BoundsPolicy::Clamp`] they are cut to the
/// image, and only a box with no overlap at all fails.
pub fn extract_regions(
    image: &DynamicImage,
    map: &FieldMap,
    policy: BoundsPolicy,
) -> Result<Vec<FieldCrop>, RegionError> {
    let (width, height) = (image.width(), image.height());

    // Resolve every box first so a bad field crops nothing.
    let boxes = map
        .iter()
        .map(|def| {
            let out_of_bounds = || RegionError::OutOfBounds {
                field: def.kind,
                bbox: def.bbox,
                width,
                height,
            };
            let bbox = if def.bbox.fits_within(width, height) {
                def.bbox
            } else {
                match policy {
                    BoundsPolicy::Reject => return Err(out_of_bounds()),
                    BoundsPolicy::Clamp => {
                        let clamped = def.bbox.clamp_to(width, height).ok_or_else(out_of_bounds)?;
                        tracing::debug!(field = %def.kind, from = %def.bbox, to = %clamped, "Clamped field box");
                        clamped
                    }
                }
            };
            Ok((def.kind, bbox))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(boxes
        .into_iter()
        .map(|(kind, bbox)| FieldCrop {
            kind,
            bbox,
            image: image.crop_imm(bbox.x1(), bbox.y1(), bbox.width(), bbox.height()),
        })
        .collect())
}
