//! Bottom/right padding so that a canvas is covered exactly by the tile grid.

use ndarray::{s, Array2, Array3, ArrayView2, ArrayView3};

use crate::config::{PaddingConfig, PaddingMode};
use crate::raster::{ClassId, IndexMask, RgbaBuffer, CHANNELS};

/// Pixels to append to an axis of length `len` so that `(len + pad - tile)`
/// is a multiple of `stride`.
///
/// An axis shorter than one tile is padded up to exactly one tile.
pub fn pad_amount(len: usize, tile_size: usize, stride: usize) -> usize {
    if len <= tile_size {
        return tile_size - len;
    }
    match (len - tile_size) % stride {
        0 => 0,
        rem => stride - rem,
    }
}

/// Mirrors around the edge pixel, excluding it.
fn reflect_index(i: usize, len: usize) -> usize {
    if len == 1 {
        return 0;
    }
    let period = 2 * (len - 1);
    let m = i % period;
    if m < len {
        m
    } else {
        period - m
    }
}

/// Mirrors around the edge, repeating the edge pixel.
fn symmetric_index(i: usize, len: usize) -> usize {
    let period = 2 * len;
    let m = i % period;
    if m < len {
        m
    } else {
        period - 1 - m
    }
}

fn index_map(len: usize, pad: usize, mirror: fn(usize, usize) -> usize) -> Vec<usize> {
    (0..len + pad).map(|i| mirror(i, len)).collect()
}

fn mirror_pad(
    image: ArrayView3<'_, u8>,
    pad_bottom: usize,
    pad_right: usize,
    mirror: fn(usize, usize) -> usize,
) -> RgbaBuffer {
    let (height, width) = (image.shape()[0], image.shape()[1]);
    let rows = index_map(height, pad_bottom, mirror);
    let cols = index_map(width, pad_right, mirror);
    Array3::from_shape_fn((rows.len(), cols.len(), CHANNELS), |(y, x, c)| {
        image[[rows[y], cols[x], c]]
    })
}

/// Pads an RGBA image on the bottom and right using the configured mode.
///
/// The input must be non-empty on both axes.
pub fn pad_rgba(
    image: ArrayView3<'_, u8>,
    pad_bottom: usize,
    pad_right: usize,
    padding: PaddingConfig,
) -> RgbaBuffer {
    match padding.mode {
        PaddingMode::Constant => {
            let (height, width) = (image.shape()[0], image.shape()[1]);
            let shape = (height + pad_bottom, width + pad_right, CHANNELS);
            let mut out = Array3::from_elem(shape, padding.value);
            out.slice_mut(s![..height, ..width, ..]).assign(&image);
            out
        }
        PaddingMode::Reflect => mirror_pad(image, pad_bottom, pad_right, reflect_index),
        PaddingMode::Symmetric => mirror_pad(image, pad_bottom, pad_right, symmetric_index),
    }
}

/// Pads a mask on the bottom and right with the background id.
pub fn pad_mask(
    mask: ArrayView2<'_, ClassId>,
    pad_bottom: usize,
    pad_right: usize,
    background: ClassId,
) -> IndexMask {
    let (height, width) = mask.dim();
    let mut out = Array2::from_elem((height + pad_bottom, width + pad_right), background);
    out.slice_mut(s![..height, ..width]).assign(&mask);
    out
}
