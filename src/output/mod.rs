//! Writing a split dataset to disk.
//!
//! ```text
//! <out>/
//!   train/images/00001.png   RGBA tile
//!   train/masks/00001.png    8-bit class ids
//!   val/...
//!   test/...
//!   manifest.json
//!   provenance.csv
//! ```

mod manifest;
mod validate;

pub use manifest::{write_manifest, Manifest, TilingSummary, MANIFEST_VERSION};
pub use validate::{validate_dataset, DatasetCheck, PartitionCheck};

use rayon::prelude::*;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::SegtilerError;
use crate::raster::{mask_to_gray, rgba_to_image};
use crate::split::{Partition, SplitDataset, SplitTile};

pub const MANIFEST_FILE: &str = "manifest.json";
pub const PROVENANCE_FILE: &str = "provenance.csv";
pub const IMAGES_DIR: &str = "images";
pub const MASKS_DIR: &str = "masks";

/// Path of a tile's image file under `out_dir`.
pub fn image_path(out_dir: &Path, tile: &SplitTile) -> PathBuf {
    tile_path(out_dir, tile, IMAGES_DIR)
}

/// Path of a tile's mask file under `out_dir`.
pub fn mask_path(out_dir: &Path, tile: &SplitTile) -> PathBuf {
    tile_path(out_dir, tile, MASKS_DIR)
}

fn tile_path(out_dir: &Path, tile: &SplitTile, kind: &str) -> PathBuf {
    out_dir
        .join(tile.assignment.partition.as_str())
        .join(kind)
        .join(format!("{}.png", tile.name()))
}

/// Creates the partition directories and writes every tile image and mask.
///
/// Directories are created for all partitions, including empty ones. Any
/// partition directory left by an earlier run is removed first so that
/// stale tiles cannot mix into the new split.
pub fn write_tiles(out_dir: &Path, dataset: &SplitDataset) -> Result<(), SegtilerError> {
    for partition in Partition::ALL {
        let dir = out_dir.join(partition.as_str());
        if dir.exists() {
            debug!(dir = %dir.display(), "clearing previous partition output");
            fs::remove_dir_all(&dir)?;
        }
        for kind in [IMAGES_DIR, MASKS_DIR] {
            fs::create_dir_all(dir.join(kind))?;
        }
    }

    dataset.tiles.par_iter().try_for_each(|tile| {
        let path = image_path(out_dir, tile);
        rgba_to_image(tile.tile.image.view())
            .save(&path)
            .map_err(|source| SegtilerError::ImageWrite { path, source })?;

        let path = mask_path(out_dir, tile);
        mask_to_gray(tile.tile.mask.view())
            .save(&path)
            .map_err(|source| SegtilerError::ImageWrite { path, source })
    })?;

    info!(
        tiles = dataset.tiles.len(),
        out = %out_dir.display(),
        "wrote tiles"
    );
    Ok(())
}

/// One row of `provenance.csv`.
#[derive(Debug, Serialize)]
struct ProvenanceRow<'a> {
    partition: &'static str,
    name: String,
    document_id: &'a str,
    origin_row: usize,
    origin_col: usize,
    foreground_ratio: f64,
    touches_padding: bool,
}

impl<'a> From<&'a SplitTile> for ProvenanceRow<'a> {
    fn from(tile: &'a SplitTile) -> Self {
        Self {
            partition: tile.assignment.partition.as_str(),
            name: tile.name(),
            document_id: tile.tile.document_id.as_str(),
            origin_row: tile.tile.origin.0,
            origin_col: tile.tile.origin.1,
            foreground_ratio: tile.tile.foreground_ratio,
            touches_padding: tile.tile.touches_padding,
        }
    }
}

/// Writes one CSV row per tile, in dataset order.
pub fn write_provenance_csv(path: &Path, dataset: &SplitDataset) -> Result<(), SegtilerError> {
    let file = File::create(path)?;
    let mut csv_writer = csv::Writer::from_writer(BufWriter::new(file));

    for tile in &dataset.tiles {
        csv_writer
            .serialize(ProvenanceRow::from(tile))
            .map_err(|source| SegtilerError::CsvWrite {
                path: path.to_path_buf(),
                source,
            })?;
    }

    csv_writer
        .into_inner()
        .map_err(|e| SegtilerError::Io(e.into_error()))?
        .flush()?;

    Ok(())
}
