//! In-memory raster types shared by every pipeline stage.
//!
//! Images are `ndarray` buffers laid out as `(row, col, channel)` so that
//! stages can slice, rotate and compare whole planes at once rather than
//! walking pixels one by one. The `image` crate is only touched at the edges
//! (decoding layers, resizing, encoding tiles).

mod ids;
mod layer;

pub use ids::{ClassId, DocumentId};
pub use layer::Layer;

use image::{GrayImage, Luma, Rgba, RgbaImage};
use ndarray::{Array2, Array3, ArrayView2, ArrayView3};

/// An RGBA raster shaped `(height, width, 4)`.
pub type RgbaBuffer = Array3<u8>;

/// A single-channel class-index raster shaped `(height, width)`.
pub type IndexMask = Array2<ClassId>;

/// Number of channels every layer buffer carries.
pub const CHANNELS: usize = 4;

/// Returns `(width, height)` of an RGBA buffer.
pub fn rgba_dims(buffer: ArrayView3<'_, u8>) -> (usize, usize) {
    let shape = buffer.shape();
    (shape[1], shape[0])
}

/// Returns `(width, height)` of an index mask.
pub fn mask_dims(mask: ArrayView2<'_, ClassId>) -> (usize, usize) {
    let shape = mask.shape();
    (shape[1], shape[0])
}

/// Copies a decoded `image` RGBA buffer into an `ndarray` buffer.
pub fn rgba_from_image(image: &RgbaImage) -> RgbaBuffer {
    let width = image.width() as usize;
    let height = image.height() as usize;
    let raw = image.as_raw();
    Array3::from_shape_fn((height, width, CHANNELS), |(y, x, c)| {
        raw[(y * width + x) * CHANNELS + c]
    })
}

/// Converts an RGBA buffer back into an `image` buffer for encoding/resizing.
pub fn rgba_to_image(buffer: ArrayView3<'_, u8>) -> RgbaImage {
    let (width, height) = rgba_dims(buffer);
    RgbaImage::from_fn(width as u32, height as u32, |x, y| {
        let (x, y) = (x as usize, y as usize);
        Rgba([
            buffer[[y, x, 0]],
            buffer[[y, x, 1]],
            buffer[[y, x, 2]],
            buffer[[y, x, 3]],
        ])
    })
}

/// Encodes an index mask as an 8-bit grayscale image (pixel value = class id).
pub fn mask_to_gray(mask: ArrayView2<'_, ClassId>) -> GrayImage {
    let (width, height) = mask_dims(mask);
    GrayImage::from_fn(width as u32, height as u32, |x, y| {
        Luma([mask[[y as usize, x as usize]].as_u8()])
    })
}

/// Decodes an 8-bit grayscale image into an index mask.
pub fn mask_from_gray(image: &GrayImage) -> IndexMask {
    let width = image.width() as usize;
    let height = image.height() as usize;
    let raw = image.as_raw();
    Array2::from_shape_fn((height, width), |(y, x)| ClassId(raw[y * width + x]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rgba_conversion_keeps_pixel_positions() {
        let mut image = RgbaImage::new(3, 2);
        image.put_pixel(2, 1, Rgba([10, 20, 30, 40]));

        let buffer = rgba_from_image(&image);
        assert_eq!(buffer.shape(), &[2, 3, 4]);
        assert_eq!(buffer[[1, 2, 0]], 10);
        assert_eq!(buffer[[1, 2, 3]], 40);
        assert_eq!(rgba_dims(buffer.view()), (3, 2));

        let back = rgba_to_image(buffer.view());
        assert_eq!(back.get_pixel(2, 1), &Rgba([10, 20, 30, 40]));
    }

    #[test]
    fn mask_gray_encoding_uses_class_value() {
        let mut mask = IndexMask::from_elem((2, 2), ClassId(0));
        mask[[0, 1]] = ClassId(5);

        let gray = mask_to_gray(mask.view());
        assert_eq!(gray.get_pixel(1, 0), &Luma([5]));
        assert_eq!(mask_from_gray(&gray), mask);
    }
}
