//! Rotating landscape documents into portrait orientation.

use ndarray::{Array, ArrayBase, Axis, Data, Dimension};
use tracing::debug;

use crate::raster::{rgba_dims, IndexMask, RgbaBuffer};

/// An image/mask pair after orientation normalization.
#[derive(Clone, Debug)]
pub struct Oriented {
    pub image: RgbaBuffer,
    pub mask: IndexMask,
    /// Whether the pair was rotated.
    pub rotated: bool,
}

/// Rotates `image` and `mask` a quarter turn counter-clockwise when
/// `auto_orient` is set and the canvas is wider than tall.
///
/// Both buffers are always rotated together, so pixel correspondence between
/// image and mask is kept. A portrait (or square) pair is returned as-is,
/// which makes the operation idempotent.
pub fn normalize_orientation(image: RgbaBuffer, mask: IndexMask, auto_orient: bool) -> Oriented {
    let (width, height) = rgba_dims(image.view());
    if !auto_orient || width <= height {
        return Oriented {
            image,
            mask,
            rotated: false,
        };
    }

    debug!(width, height, "rotating landscape canvas to portrait");
    Oriented {
        image: rotate_quarter_ccw(image),
        mask: rotate_quarter_ccw(mask),
        rotated: true,
    }
}

/// Rotates the first two axes (row, col) by 90 degrees counter-clockwise.
///
/// Trailing axes (channels) are carried along untouched.
pub fn rotate_quarter_ccw<S, A, D>(array: ArrayBase<S, D>) -> Array<A, D>
where
    S: Data<Elem = A>,
    A: Clone,
    D: Dimension,
{
    let mut view = array.view();
    view.swap_axes(0, 1);
    view.invert_axis(Axis(0));
    view.as_standard_layout().into_owned()
}
