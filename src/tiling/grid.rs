//! Optional resize so that a fixed `[rows, cols]` grid covers the canvas
//! without padding.

use image::imageops::{self, FilterType};
use ndarray::{ArrayView2, ArrayView3};
use tracing::debug;

use crate::raster::{
    mask_from_gray, mask_to_gray, rgba_dims, rgba_from_image, rgba_to_image, ClassId, IndexMask,
    RgbaBuffer,
};

/// Canvas `(width, height)` that a `[rows, cols]` grid covers exactly.
pub fn grid_canvas(grid: [usize; 2], tile_size: usize, stride: usize) -> (usize, usize) {
    let [rows, cols] = grid;
    let extent = |n: usize| tile_size + n.saturating_sub(1) * stride;
    (extent(cols), extent(rows))
}

/// Resizes `image` (Lanczos3) and `mask` (nearest neighbour) to `canvas`.
///
/// Nearest-neighbour sampling keeps every mask pixel a valid class id.
pub fn resize_to_canvas(
    image: ArrayView3<'_, u8>,
    mask: ArrayView2<'_, ClassId>,
    canvas: (usize, usize),
) -> (RgbaBuffer, IndexMask) {
    let (width, height) = canvas;
    debug!(
        from = ?rgba_dims(image),
        to = ?canvas,
        "resizing canvas to fit tile grid"
    );

    let resized = imageops::resize(
        &rgba_to_image(image),
        width as u32,
        height as u32,
        FilterType::Lanczos3,
    );
    let resized_mask = imageops::resize(
        &mask_to_gray(mask),
        width as u32,
        height as u32,
        FilterType::Nearest,
    );

    (rgba_from_image(&resized), mask_from_gray(&resized_mask))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array2, Array3};

    #[test]
    fn grid_canvas_matches_stride_contract() {
        assert_eq!(grid_canvas([4, 4], 512, 256), (1280, 1280));
        assert_eq!(grid_canvas([1, 3], 4, 2), (8, 4));
    }

    #[test]
    fn mask_resize_only_produces_existing_ids() {
        let image = Array3::from_elem((5, 7, 4), 90u8);
        let mask = Array2::from_shape_fn((5, 7), |(y, x)| {
            if (x + y) % 2 == 0 {
                ClassId(2)
            } else {
                ClassId(0)
            }
        });

        let (resized, resized_mask) = resize_to_canvas(image.view(), mask.view(), (8, 4));
        assert_eq!(resized.shape(), &[4, 8, 4]);
        assert_eq!(resized_mask.dim(), (4, 8));
        assert!(resized_mask
            .iter()
            .all(|id| *id == ClassId(0) || *id == ClassId(2)));
    }
}
