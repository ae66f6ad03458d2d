//! Named raster layers as handed over by the layer extraction step.

use ndarray::{s, Array3};

use super::{rgba_dims, RgbaBuffer, CHANNELS};

/// A named RGBA raster positioned on a shared canvas.
#[derive(Clone, Debug)]
pub struct Layer {
    /// Layer name (e.g. `original`, `mask`, `refined`).
    pub name: String,

    /// Pixel data shaped `(height, width, 4)`.
    pub pixels: RgbaBuffer,

    /// Whether the layer was visible in the source document.
    pub visible: bool,

    /// Top-left position of the layer on the canvas, as `(x, y)`.
    pub offset: (i64, i64),
}

impl Layer {
    /// Creates a visible layer placed at the canvas origin.
    pub fn new(name: impl Into<String>, pixels: RgbaBuffer) -> Self {
        Self {
            name: name.into(),
            pixels,
            visible: true,
            offset: (0, 0),
        }
    }

    /// Returns a copy of this layer moved to `offset`.
    pub fn with_offset(mut self, x: i64, y: i64) -> Self {
        self.offset = (x, y);
        self
    }

    /// Returns a copy of this layer with the given visibility.
    pub fn with_visibility(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    /// Returns `(width, height)` of the layer's own pixel data.
    pub fn dims(&self) -> (usize, usize) {
        rgba_dims(self.pixels.view())
    }

    /// Returns true if the layer rectangle lies fully inside a canvas.
    pub fn fits_canvas(&self, canvas_width: usize, canvas_height: usize) -> bool {
        let (width, height) = self.dims();
        let (x, y) = self.offset;
        x >= 0
            && y >= 0
            && (x as usize).saturating_add(width) <= canvas_width
            && (y as usize).saturating_add(height) <= canvas_height
    }

    /// Renders the layer onto a transparent canvas of the given size.
    ///
    /// Returns `None` if the layer does not fit the canvas.
    pub fn place_on_canvas(&self, canvas_width: usize, canvas_height: usize) -> Option<RgbaBuffer> {
        if !self.fits_canvas(canvas_width, canvas_height) {
            return None;
        }

        let (width, height) = self.dims();
        if self.offset == (0, 0) && (width, height) == (canvas_width, canvas_height) {
            return Some(self.pixels.clone());
        }

        let x = self.offset.0 as usize;
        let y = self.offset.1 as usize;
        let mut canvas = Array3::zeros((canvas_height, canvas_width, CHANNELS));
        canvas
            .slice_mut(s![y..y + height, x..x + width, ..])
            .assign(&self.pixels);
        Some(canvas)
    }
}
