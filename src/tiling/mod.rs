//! Cutting an image/mask pair into fixed-size overlapping tiles.
//!
//! Successive tile origins are `stride = tile_size - 2 * overlap` pixels
//! apart. The canvas is padded on the bottom and right until
//! `(size - tile_size)` is a multiple of the stride, so the grid covers it
//! with no gap:
//!
//! ```text
//! rows = ceil((H - tile_size) / stride) + 1
//! cols = ceil((W - tile_size) / stride) + 1
//! ```
//!
//! The image is padded per [`PaddingConfig`]; the mask is always padded with
//! the background id so that padding never reads as annotation.

mod grid;
mod padding;
mod report;

pub use grid::{grid_canvas, resize_to_canvas};
pub use padding::{pad_amount, pad_mask, pad_rgba};
pub use report::TilingStats;

use ndarray::{s, ArrayView2, ArrayView3, CowArray};
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::config::{PaddingConfig, TilingConfig};
use crate::error::SegtilerError;
use crate::raster::{mask_dims, rgba_dims, ClassId, DocumentId, IndexMask, RgbaBuffer};

/// One fixed-size patch cut from a document.
#[derive(Clone, Debug, PartialEq)]
pub struct Tile {
    /// `tile_size x tile_size x 4` source pixels.
    pub image: RgbaBuffer,
    /// `tile_size x tile_size` class ids.
    pub mask: IndexMask,
    /// `(row, col)` of the top-left corner in the padded canvas.
    pub origin: (usize, usize),
    pub document_id: DocumentId,
    /// Fraction of mask pixels that are not background.
    pub foreground_ratio: f64,
    /// Whether the tile extends past the unpadded canvas.
    pub touches_padding: bool,
}

/// Tiles emitted for one document, in row-major order, plus statistics.
#[derive(Clone, Debug)]
pub struct TileSet {
    pub tiles: Vec<Tile>,
    pub stats: TilingStats,
}

/// A validated tiling configuration.
#[derive(Clone, Debug)]
pub struct Tiler {
    tile_size: usize,
    stride: usize,
    padding: PaddingConfig,
    min_foreground_ratio: f64,
}

impl Tiler {
    /// Validates `config` and derives the stride.
    pub fn new(config: &TilingConfig) -> Result<Self, SegtilerError> {
        config.validate()?;
        Ok(Self {
            tile_size: config.tile_size,
            stride: config.stride()?,
            padding: config.padding,
            min_foreground_ratio: config.min_foreground_ratio,
        })
    }

    pub fn tile_size(&self) -> usize {
        self.tile_size
    }

    /// Distance between successive tile origins.
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Padding appended to an axis of length `len`.
    pub fn padding_for(&self, len: usize) -> usize {
        pad_amount(len, self.tile_size, self.stride)
    }

    /// Number of tiles along an axis of length `len`.
    pub fn tiles_along(&self, len: usize) -> usize {
        (len + self.padding_for(len) - self.tile_size) / self.stride + 1
    }

    /// Tile origins `(row, col)` for a `width x height` canvas, row-major.
    pub fn origins(&self, width: usize, height: usize) -> Vec<(usize, usize)> {
        let padded_height = height + self.padding_for(height);
        let padded_width = width + self.padding_for(width);

        let rows = (0..)
            .step_by(self.stride)
            .take_while(|row| row + self.tile_size <= padded_height);
        rows.flat_map(|row| {
            (0..)
                .step_by(self.stride)
                .take_while(move |col| col + self.tile_size <= padded_width)
                .map(move |col| (row, col))
        })
        .collect()
    }

    /// Cuts `image` and `mask` into tiles.
    ///
    /// Both buffers must have the same width and height. Tiles whose
    /// foreground ratio is below the configured minimum are dropped; an
    /// empty canvas yields no tiles.
    pub fn generate(
        &self,
        document_id: &DocumentId,
        image: ArrayView3<'_, u8>,
        mask: ArrayView2<'_, ClassId>,
        background: ClassId,
    ) -> Result<TileSet, SegtilerError> {
        let (width, height) = rgba_dims(image);
        let mask_size = mask_dims(mask);
        if mask_size != (width, height) {
            return Err(SegtilerError::SizeMismatch {
                document: document_id.to_string(),
                what: "mask".to_string(),
                expected: (width, height),
                actual: mask_size,
            });
        }

        let mut stats = TilingStats {
            document_id: document_id.clone(),
            canvas: (width, height),
            padded_canvas: (width, height),
            class_pixels: class_pixels(mask),
            ..Default::default()
        };
        if width == 0 || height == 0 {
            return Ok(TileSet {
                tiles: Vec::new(),
                stats,
            });
        }

        let pad_bottom = self.padding_for(height);
        let pad_right = self.padding_for(width);
        let (image, mask) = if pad_bottom == 0 && pad_right == 0 {
            (CowArray::from(image), CowArray::from(mask))
        } else {
            debug!(
                document = %document_id,
                pad_bottom,
                pad_right,
                mode = ?self.padding.mode,
                "padding canvas"
            );
            (
                CowArray::from(pad_rgba(image, pad_bottom, pad_right, self.padding)),
                CowArray::from(pad_mask(mask, pad_bottom, pad_right, background)),
            )
        };

        stats.padded_canvas = (width + pad_right, height + pad_bottom);
        stats.grid = (self.tiles_along(height), self.tiles_along(width));

        let t = self.tile_size;
        let area = t as f64 * t as f64;
        let mut tiles = Vec::new();
        for (row, col) in self.origins(width, height) {
            stats.candidates += 1;

            let tile_mask = mask.slice(s![row..row + t, col..col + t]).to_owned();
            let foreground = tile_mask.iter().filter(|&&id| id != background).count();
            let foreground_ratio = foreground as f64 / area;
            if foreground_ratio < self.min_foreground_ratio {
                stats.dropped += 1;
                continue;
            }

            let touches_padding = row + t > height || col + t > width;
            if touches_padding {
                stats.padded_tiles += 1;
            }

            tiles.push(Tile {
                image: image.slice(s![row..row + t, col..col + t, ..]).to_owned(),
                mask: tile_mask,
                origin: (row, col),
                document_id: document_id.clone(),
                foreground_ratio,
                touches_padding,
            });
        }
        stats.emitted = tiles.len();

        info!(
            document = %document_id,
            candidates = stats.candidates,
            emitted = stats.emitted,
            dropped = stats.dropped,
            "tiled document"
        );

        Ok(TileSet { tiles, stats })
    }
}

fn class_pixels(mask: ArrayView2<'_, ClassId>) -> BTreeMap<ClassId, usize> {
    let mut counts = BTreeMap::new();
    for &id in mask.iter() {
        *counts.entry(id).or_insert(0) += 1;
    }
    counts
}
