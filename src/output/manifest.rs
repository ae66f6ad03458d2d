//! JSON manifest describing a generated dataset.
//!
//! The manifest carries no timestamps, so two runs with the same inputs and
//! seed produce byte-identical files.

use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::batch::BatchReport;
use crate::config::{BuildConfig, ClassTable};
use crate::error::SegtilerError;
use crate::split::SplitStats;

use super::DatasetCheck;

/// Current manifest layout version.
pub const MANIFEST_VERSION: u32 = 1;

/// Derived tiling parameters recorded alongside the configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct TilingSummary {
    pub tile_size: usize,
    pub stride: usize,
    /// Tiles emitted across all documents.
    pub tiles: usize,
    /// Tiles dropped by the foreground filter.
    pub dropped: usize,
}

/// Everything recorded about one build.
#[derive(Debug, Serialize)]
pub struct Manifest<'a> {
    pub manifest_version: u32,
    pub generator: String,
    pub config: &'a BuildConfig,
    pub classes: &'a ClassTable,
    pub tiling: TilingSummary,
    pub documents: &'a BatchReport,
    pub split: &'a SplitStats,
    /// Post-write dataset check, when one was run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<&'a DatasetCheck>,
}

impl<'a> Manifest<'a> {
    pub fn new(
        config: &'a BuildConfig,
        classes: &'a ClassTable,
        stride: usize,
        documents: &'a BatchReport,
        split: &'a SplitStats,
        validation: Option<&'a DatasetCheck>,
    ) -> Self {
        Self {
            manifest_version: MANIFEST_VERSION,
            generator: format!("segtiler {}", env!("CARGO_PKG_VERSION")),
            config,
            classes,
            tiling: TilingSummary {
                tile_size: config.tiling.tile_size,
                stride,
                tiles: documents.tile_count(),
                dropped: documents.dropped_count(),
            },
            documents,
            split,
            validation,
        }
    }
}

/// Writes `manifest` as pretty-printed JSON.
pub fn write_manifest(path: &Path, manifest: &Manifest<'_>) -> Result<(), SegtilerError> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, manifest).map_err(|source| {
        SegtilerError::ManifestWrite {
            path: path.to_path_buf(),
            source,
        }
    })?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}
