//! Color-to-class mapping for annotation layers.
//!
//! Each class contributes one boolean membership plane computed over the
//! whole image at once. Planes are applied in ascending class id order and a
//! pixel keeps the first class that claims it, so overlapping definitions
//! resolve by id rather than by declaration order.

use ndarray::{Array2, ArrayView3, Axis, Zip};

use crate::config::ClassTable;
use crate::raster::{ClassId, IndexMask};

/// A class-id mask plus the number of pixels no class color matched.
#[derive(Clone, Debug, PartialEq)]
pub struct ColorMapping {
    pub mask: IndexMask,
    /// Opaque pixels whose color is not in the class table. They are
    /// written as background.
    pub unmapped: usize,
}

/// Maps every pixel of an RGBA buffer to a class id.
///
/// Pixels whose alpha is below the background alpha threshold are
/// background regardless of their color. Pixels matching no class color fall
/// back to the background id. The result depends only on the inputs, so
/// calling it twice yields identical masks.
pub fn map_colors(image: ArrayView3<'_, u8>, table: &ClassTable) -> IndexMask {
    map_layer(image, table).mask
}

/// Like [`map_colors`], but also counts pixels with an unknown color.
pub fn map_layer(image: ArrayView3<'_, u8>, table: &ClassTable) -> ColorMapping {
    let (height, width) = (image.shape()[0], image.shape()[1]);
    let background = table.background_id();

    let mut mask = IndexMask::from_elem((height, width), background);
    let mut assigned = Array2::from_elem((height, width), false);
    let mut remaining = height * width;

    if let Some(threshold) = table.background().alpha_threshold {
        let transparent = alpha_below(image, threshold);
        Zip::from(&mut assigned)
            .and(&transparent)
            .for_each(|claimed, &hit| {
                if hit {
                    *claimed = true;
                    remaining -= 1;
                }
            });
    }

    for spec in table.by_ascending_id() {
        if remaining == 0 {
            break;
        }
        let members = color_membership(image, spec.color);
        claim(&mut mask, &mut assigned, &members, spec.id, &mut remaining);
    }

    ColorMapping {
        mask,
        unmapped: remaining,
    }
}

/// Boolean plane of pixels whose RGB equals `color` exactly.
pub fn color_membership(image: ArrayView3<'_, u8>, color: [u8; 3]) -> Array2<bool> {
    let [r, g, b] = color;
    Zip::from(image.lanes(Axis(2))).map_collect(|px| px[0] == r && px[1] == g && px[2] == b)
}

/// Boolean plane of pixels whose alpha is strictly below `threshold`.
fn alpha_below(image: ArrayView3<'_, u8>, threshold: u8) -> Array2<bool> {
    Zip::from(image.lanes(Axis(2))).map_collect(|px| px[3] < threshold)
}

fn claim(
    mask: &mut IndexMask,
    assigned: &mut Array2<bool>,
    members: &Array2<bool>,
    id: ClassId,
    remaining: &mut usize,
) {
    Zip::from(mask)
        .and(assigned)
        .and(members)
        .for_each(|pixel, claimed, &hit| {
            if hit && !*claimed {
                *pixel = id;
                *claimed = true;
                *remaining -= 1;
            }
        });
}
