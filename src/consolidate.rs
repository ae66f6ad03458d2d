//! Merging several annotation layers into one class-index mask.
//!
//! Layers are visited from highest to lowest priority. A pixel takes the
//! class of the first layer that labels it with something other than
//! background; if no layer does, it stays background. With the default
//! order `[mask, refined]` this lets `mask` override `refined` while
//! `refined` fills whatever `mask` left empty.

use ndarray::{ArrayView3, Zip};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::color_map::map_layer;
use crate::config::ClassTable;
use crate::document::Document;
use crate::error::SegtilerError;
use crate::raster::{rgba_dims, IndexMask};

/// How many pixels one layer decided during the merge.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LayerContribution {
    pub layer: String,
    pub pixels: usize,
    /// Opaque pixels whose color matched no class.
    pub unmapped: usize,
}

/// The merged mask together with per-layer contribution counts.
#[derive(Clone, Debug)]
pub struct ConsolidatedMask {
    pub mask: IndexMask,
    pub contributions: Vec<LayerContribution>,
}

impl ConsolidatedMask {
    /// Names of the layers that were present and merged, in priority order.
    pub fn merged_layers(&self) -> Vec<&str> {
        self.contributions.iter().map(|c| c.layer.as_str()).collect()
    }
}

/// Merges the document's annotation layers named in `priority`.
///
/// Absent layers are skipped. If none of them is present the document
/// cannot be labelled and a missing-annotation error is returned.
pub fn consolidate(
    document: &Document,
    priority: &[String],
    table: &ClassTable,
) -> Result<ConsolidatedMask, SegtilerError> {
    let mut present = Vec::with_capacity(priority.len());
    for name in priority {
        match document.canvas_layer(name)? {
            Some(pixels) => present.push((name.as_str(), pixels)),
            None => debug!(document = %document.id, layer = %name, "annotation layer absent"),
        }
    }

    if present.is_empty() {
        return Err(SegtilerError::MissingAnnotation {
            document: document.id.to_string(),
            wanted: priority.to_vec(),
        });
    }

    let views: Vec<(&str, ArrayView3<'_, u8>)> = present
        .iter()
        .map(|(name, pixels)| (*name, pixels.view()))
        .collect();

    consolidate_layers(
        document.id.as_str(),
        (document.width, document.height),
        &views,
        table,
    )
}

/// Merges already-rendered layers, highest priority first.
///
/// Every layer must be exactly `canvas` (`width`, `height`) in size.
pub fn consolidate_layers(
    document: &str,
    canvas: (usize, usize),
    layers: &[(&str, ArrayView3<'_, u8>)],
    table: &ClassTable,
) -> Result<ConsolidatedMask, SegtilerError> {
    let (width, height) = canvas;
    let background = table.background_id();
    let mut mask = IndexMask::from_elem((height, width), background);
    let mut contributions = Vec::with_capacity(layers.len());

    for (name, pixels) in layers {
        let dims = rgba_dims(*pixels);
        if dims != canvas {
            return Err(SegtilerError::SizeMismatch {
                document: document.to_string(),
                what: format!("layer '{}'", name),
                expected: canvas,
                actual: dims,
            });
        }

        let mapping = map_layer(*pixels, table);
        if mapping.unmapped > 0 {
            warn!(
                document,
                layer = %name,
                pixels = mapping.unmapped,
                "layer has colors outside the class table; treating them as background"
            );
        }

        let mut updated = 0usize;
        Zip::from(&mut mask).and(&mapping.mask).for_each(|merged, &id| {
            if *merged == background && id != background {
                *merged = id;
                updated += 1;
            }
        });

        info!(
            document,
            layer = %name,
            pixels = updated,
            "merged annotation layer ({:.1}% of canvas)",
            percent(updated, width * height)
        );
        contributions.push(LayerContribution {
            layer: name.to_string(),
            pixels: updated,
            unmapped: mapping.unmapped,
        });
    }

    Ok(ConsolidatedMask {
        mask,
        contributions,
    })
}

fn percent(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 * 100.0 / total as f64
    }
}
