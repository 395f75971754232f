//! Pixel-level checks on decoded frames.

use fishctl_capture::PixelFormat;
use ndarray::{s, Array2, Array3, ArrayView3};

/// The `size` × `size` block at the centre of the frame, clamped to its bounds
pub fn center_region(pixels: &Array3<u8>, size: usize) -> ArrayView3<'_, u8> {
    let (height, width, _) = pixels.dim();
    let rows = size.min(height);
    let cols = size.min(width);
    let top = (height - rows) / 2;
    let left = (width - cols) / 2;
    pixels.slice(s![top..top + rows, left..left + cols, ..])
}

/// Pixels whose RGB distance to `reference` is at most `distance`.
///
/// `reference` is given as RGB and looked up through `format`'s channel order;
/// the alpha/padding byte is ignored.
pub fn color_mask(
    region: ArrayView3<'_, u8>,
    format: PixelFormat,
    reference: [u8; 3],
    distance: f32,
) -> Array2<bool> {
    let (rows, cols, _) = region.dim();
    let channels = format.rgb_channels();
    let limit = distance * distance;

    Array2::from_shape_fn((rows, cols), |(y, x)| {
        let squared: f32 = channels
            .iter()
            .zip(reference)
            .map(|(&channel, want)| {
                let diff = f32::from(region[[y, x, channel]]) - f32::from(want);
                diff * diff
            })
            .sum();
        squared <= limit
    })
}

/// Fraction of `true` cells; 0 for an empty mask
pub fn match_ratio(mask: &Array2<bool>) -> f32 {
    if mask.is_empty() {
        return 0.0;
    }
    let hits = mask.iter().filter(|&&hit| hit).count();
    hits as f32 / mask.len() as f32
}
