//! Per-document tiling statistics.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::raster::{ClassId, DocumentId};

/// What happened while tiling one document.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct TilingStats {
    pub document_id: DocumentId,
    /// Canvas size before padding, `(width, height)`.
    pub canvas: (usize, usize),
    /// Canvas size after padding, `(width, height)`.
    pub padded_canvas: (usize, usize),
    /// Grid shape `(rows, cols)`.
    pub grid: (usize, usize),
    /// Tiles cut before filtering.
    pub candidates: usize,
    pub emitted: usize,
    /// Tiles dropped by the foreground filter.
    pub dropped: usize,
    /// Emitted tiles that extend into the padded area.
    pub padded_tiles: usize,
    /// Pixel count per class over the unpadded mask.
    pub class_pixels: BTreeMap<ClassId, usize>,
}

impl TilingStats {
    /// True if any padding was added.
    pub fn was_padded(&self) -> bool {
        self.canvas != self.padded_canvas
    }

    /// Share of the unpadded canvas taken by each class, as a percentage.
    pub fn class_percentages(&self) -> Vec<(ClassId, f64)> {
        let total: usize = self.class_pixels.values().sum();
        self.class_pixels
            .iter()
            .map(|(&id, &count)| {
                let pct = if total == 0 {
                    0.0
                } else {
                    count as f64 * 100.0 / total as f64
                };
                (id, pct)
            })
            .collect()
    }
}

impl fmt::Display for TilingStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{}: {}x{} canvas, {} rows x {} cols",
            self.document_id, self.canvas.0, self.canvas.1, self.grid.0, self.grid.1
        )?;
        if self.was_padded() {
            writeln!(
                f,
                "  padded to {}x{}",
                self.padded_canvas.0, self.padded_canvas.1
            )?;
        }
        writeln!(
            f,
            "  tiles: {} emitted, {} dropped, {} touching padding",
            self.emitted, self.dropped, self.padded_tiles
        )?;
        for (id, pct) in self.class_percentages() {
            writeln!(
                f,
                "  class {}: {} px ({:.2}%)",
                id,
                self.class_pixels.get(&id).copied().unwrap_or(0),
                pct
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_percentages_sum_to_hundred() {
        let mut stats = TilingStats::default();
        stats.class_pixels.insert(ClassId(0), 75);
        stats.class_pixels.insert(ClassId(1), 25);

        let pcts = stats.class_percentages();
        assert_eq!(pcts, vec![(ClassId(0), 75.0), (ClassId(1), 25.0)]);
    }

    #[test]
    fn display_mentions_padding_only_when_applied() {
        let mut stats = TilingStats {
            document_id: DocumentId::new("page"),
            canvas: (8, 8),
            padded_canvas: (8, 8),
            grid: (3, 3),
            candidates: 9,
            emitted: 9,
            ..Default::default()
        };
        assert!(!stats.to_string().contains("padded to"));

        stats.padded_canvas = (10, 8);
        assert!(stats.to_string().contains("padded to 10x8"));
    }
}
