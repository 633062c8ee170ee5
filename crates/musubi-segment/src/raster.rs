//! Channel extraction: turn decoded images into segmentation inputs.
//!
//! The engine consumes [`ScalarField`]s; this module builds them from
//! `image` buffers. Intensity channels come straight from pixel values
//! (0..255 as `f32` — apply a channel scale at
//! [`add_feature`](crate::Segmenter::add_feature) to reweight them).
//! The gradient helpers derive a boundary-weight channel from Sobel
//! magnitude for [`set_merge_weight`](crate::Segmenter::set_merge_weight),
//! which expects *high* values where merging is allowed and *low*
//! values across edges worth preserving.

use image::{GrayImage, Luma, RgbaImage};
use imageproc::definitions::Image;
use imageproc::filter::filter_clamped;
use imageproc::kernel;

use crate::types::{Dimensions, ScalarField};

/// Dimensions of an image buffer.
fn image_dimensions(width: u32, height: u32) -> Dimensions {
    Dimensions { width, height }
}

/// Extract the luminance channel of a grayscale image.
#[must_use]
pub fn luma_channel(image: &GrayImage) -> ScalarField {
    ScalarField::from_fn(image_dimensions(image.width(), image.height()), |x, y| {
        f32::from(image.get_pixel(x, y).0[0])
    })
}

/// Extract the red, green, and blue channels of an RGBA image.
///
/// The alpha channel is ignored; segmentation treats transparency as
/// out of scope for the feature space.
#[must_use]
pub fn rgb_channels(image: &RgbaImage) -> [ScalarField; 3] {
    let dims = image_dimensions(image.width(), image.height());
    std::array::from_fn(|channel| {
        ScalarField::from_fn(dims, |x, y| f32::from(image.get_pixel(x, y).0[channel]))
    })
}

/// Sobel gradient magnitude of a grayscale image, unnormalized.
#[must_use]
pub fn gradient_magnitude(image: &GrayImage) -> ScalarField {
    let gx: Image<Luma<i16>> = filter_clamped(image, kernel::SOBEL_HORIZONTAL_3X3);
    let gy: Image<Luma<i16>> = filter_clamped(image, kernel::SOBEL_VERTICAL_3X3);
    ScalarField::from_fn(image_dimensions(image.width(), image.height()), |x, y| {
        f32::from(gx.get_pixel(x, y).0[0]).hypot(f32::from(gy.get_pixel(x, y).0[0]))
    })
}

/// Merge-permission weight derived from the gradient: 1 in perfectly
/// smooth regions, falling toward 0 across the strongest edge in the
/// image. A uniform image (no gradient anywhere) is all 1s.
///
/// Feed this to [`set_merge_weight`](crate::Segmenter::set_merge_weight)
/// with a cutoff in `(0, 1)` to keep similar segments from merging
/// across strong edges.
#[must_use]
pub fn smoothness_weight(image: &GrayImage) -> ScalarField {
    let magnitude = gradient_magnitude(image);
    let max = magnitude
        .as_slice()
        .iter()
        .copied()
        .fold(0.0f32, f32::max);
    if max <= 0.0 {
        return ScalarField::from_fn(magnitude.dimensions(), |_, _| 1.0);
    }
    let dims = magnitude.dimensions();
    ScalarField::from_fn(dims, |x, y| 1.0 - magnitude.get(x, y) / max)
}
