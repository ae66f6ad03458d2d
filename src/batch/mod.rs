//! Running the per-document pipeline over many documents and pooling tiles.
//!
//! Each document goes through merge, orientation, optional grid resize and
//! tiling on its own; nothing mutable is shared between documents, so they
//! are processed on a rayon pool. The pool is joined before anything is
//! returned, which is the barrier the splitter relies on.

mod report;

pub use report::{BatchReport, DocumentOutcome, DocumentStatus};

use rayon::prelude::*;
use std::borrow::Cow;
use rayon::ThreadPoolBuilder;
use tracing::{info, warn};

use crate::config::{BuildConfig, ClassTable};
use crate::consolidate::{consolidate, LayerContribution};
use crate::document::{Document, DocumentSource};
use crate::error::SegtilerError;
use crate::orient::normalize_orientation;
use crate::raster::{rgba_dims, DocumentId};
use crate::tiling::{grid_canvas, resize_to_canvas, Tile, Tiler, TilingStats};

/// Result of running the pipeline on a single document.
#[derive(Clone, Debug)]
pub struct ProcessedDocument {
    pub document_id: DocumentId,
    pub tiles: Vec<Tile>,
    pub merged: Vec<LayerContribution>,
    pub rotated: bool,
    /// Canvas the pair was resized to for a fixed grid, if any.
    pub resized_to: Option<(usize, usize)>,
    pub stats: TilingStats,
}

/// The per-document pipeline with its configuration resolved.
#[derive(Clone, Debug)]
pub struct DocumentPipeline {
    classes: ClassTable,
    tiler: Tiler,
    original_layer: String,
    priority: Vec<String>,
    include_hidden: bool,
    auto_orient: bool,
    grid_size: Option<[usize; 2]>,
}

impl DocumentPipeline {
    /// Validates `config` and builds the pipeline.
    pub fn new(config: &BuildConfig, classes: ClassTable) -> Result<Self, SegtilerError> {
        config.validate()?;
        Ok(Self {
            classes,
            tiler: Tiler::new(&config.tiling)?,
            original_layer: config.input.original_layer.clone(),
            priority: config.mask_integration.priority_order.clone(),
            include_hidden: config.input.include_hidden,
            auto_orient: config.tiling.auto_orient,
            grid_size: config.tiling.grid_size,
        })
    }

    pub fn tiler(&self) -> &Tiler {
        &self.tiler
    }

    pub fn classes(&self) -> &ClassTable {
        &self.classes
    }

    /// Merge, orient, resize and tile one document.
    ///
    /// Hidden layers are ignored unless the input config includes them.
    pub fn run(&self, document: &Document) -> Result<ProcessedDocument, SegtilerError> {
        let document = if self.include_hidden {
            Cow::Borrowed(document)
        } else {
            document.visible_only()
        };

        let image = document
            .canvas_layer(&self.original_layer)?
            .ok_or_else(|| SegtilerError::MalformedDocument {
                document: document.id.to_string(),
                message: format!("no '{}' layer found", self.original_layer),
            })?;
        let merged = consolidate(&document, &self.priority, &self.classes)?;

        let oriented = normalize_orientation(image, merged.mask, self.auto_orient);
        if oriented.rotated {
            info!(document = %document.id, "rotated to portrait");
        }

        let (mut image, mut mask) = (oriented.image, oriented.mask);
        let mut resized_to = None;
        if let Some(grid) = self.grid_size {
            let canvas = grid_canvas(grid, self.tiler.tile_size(), self.tiler.stride());
            if rgba_dims(image.view()) != canvas {
                (image, mask) = resize_to_canvas(image.view(), mask.view(), canvas);
                resized_to = Some(canvas);
            }
        }

        let set = self.tiler.generate(
            &document.id,
            image.view(),
            mask.view(),
            self.classes.background_id(),
        )?;

        Ok(ProcessedDocument {
            document_id: document.id.clone(),
            tiles: set.tiles,
            merged: merged.contributions,
            rotated: oriented.rotated,
            resized_to,
            stats: set.stats,
        })
    }
}

/// Worker and failure policy for [`aggregate`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BatchOptions {
    /// Worker threads; 0 uses one per core.
    pub workers: usize,
    /// Abort on the first failing document instead of skipping it.
    pub fail_fast: bool,
}

/// The pooled tiles of every document plus the per-document report.
#[derive(Clone, Debug)]
pub struct Aggregate {
    /// Tiles in document order, then row-major within a document.
    pub pool: Vec<Tile>,
    pub report: BatchReport,
}

/// Runs `pipeline` over every source and concatenates the tiles.
///
/// Document-scoped failures (missing annotation, size mismatch, malformed
/// or unreadable document) are logged and the document is skipped, unless
/// `fail_fast` is set. Any other error aborts the batch.
pub fn aggregate<S: DocumentSource>(
    sources: &[S],
    pipeline: &DocumentPipeline,
    options: BatchOptions,
) -> Result<Aggregate, SegtilerError> {
    let workers = ThreadPoolBuilder::new()
        .num_threads(options.workers)
        .build()
        .map_err(|e| SegtilerError::WorkerPool(e.to_string()))?;

    info!(
        documents = sources.len(),
        workers = workers.current_num_threads(),
        "processing documents"
    );

    let results: Vec<(ProcessedOrSkipped, DocumentId)> = workers.install(|| {
        sources
            .par_iter()
            .map(|source| {
                let id = source.document_id();
                let result = source.load().and_then(|doc| pipeline.run(&doc));
                match result {
                    Ok(processed) => Ok((ProcessedOrSkipped::Processed(processed), id)),
                    Err(err) if err.is_document_scoped() && !options.fail_fast => {
                        warn!(document = %id, error = %err, "skipping document");
                        Ok((ProcessedOrSkipped::Skipped(err.to_string()), id))
                    }
                    Err(err) => Err(err),
                }
            })
            .collect::<Result<Vec<_>, SegtilerError>>()
    })?;

    let mut pool = Vec::new();
    let mut report = BatchReport::default();
    for (result, document_id) in results {
        let status = match result {
            ProcessedOrSkipped::Processed(processed) => {
                pool.extend(processed.tiles);
                DocumentStatus::Processed {
                    rotated: processed.rotated,
                    resized_to: processed.resized_to,
                    merged: processed.merged,
                    tiling: processed.stats,
                }
            }
            ProcessedOrSkipped::Skipped(reason) => DocumentStatus::Skipped { reason },
        };
        report.documents.push(DocumentOutcome {
            document_id,
            status,
        });
    }

    info!(
        processed = report.processed_count(),
        skipped = report.skipped_count(),
        tiles = pool.len(),
        "batch complete"
    );

    Ok(Aggregate { pool, report })
}

enum ProcessedOrSkipped {
    Processed(ProcessedDocument),
    Skipped(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ClassSpec, TilingConfig};
    use crate::document::{discover_documents, LAYER_SIDECAR};
    use crate::raster::{ClassId, Layer};
    use ndarray::Array3;

    fn classes() -> ClassTable {
        ClassTable::new(
            ClassSpec::new(0, "background", [0, 0, 0]).with_alpha_threshold(128),
            vec![ClassSpec::new(1, "text", [255, 0, 0])],
        )
        .expect("valid table")
    }

    fn config() -> BuildConfig {
        BuildConfig {
            tiling: TilingConfig {
                tile_size: 4,
                overlap: 1,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn red(width: usize, height: usize) -> Array3<u8> {
        Array3::from_shape_fn((height, width, 4), |(_, _, c)| match c {
            0 | 3 => 255,
            _ => 0,
        })
    }

    fn annotated(id: &str, width: usize, height: usize) -> Document {
        Document::new(id, width, height)
            .with_layer(Layer::new("original", Array3::from_elem((height, width, 4), 128)))
            .with_layer(Layer::new("mask", red(width, height)))
    }

    fn options() -> BatchOptions {
        BatchOptions {
            workers: 2,
            fail_fast: false,
        }
    }

    #[test]
    fn document_without_annotation_is_skipped() {
        let pipeline = DocumentPipeline::new(&config(), classes()).expect("pipeline");
        let docs = vec![
            annotated("a", 8, 8),
            Document::new("blank", 8, 8)
                .with_layer(Layer::new("original", Array3::zeros((8, 8, 4)))),
            annotated("c", 8, 8),
        ];

        let result = aggregate(&docs, &pipeline, options()).expect("batch");
        assert_eq!(result.pool.len(), 18);
        assert_eq!(result.report.skipped_count(), 1);
        assert!(result.report.documents[1].is_skipped());
        assert!(result
            .pool
            .iter()
            .all(|tile| tile.document_id != DocumentId::new("blank")));
    }

    #[test]
    fn fail_fast_aborts_on_first_failure() {
        let pipeline = DocumentPipeline::new(&config(), classes()).expect("pipeline");
        let docs = vec![
            annotated("a", 8, 8),
            Document::new("blank", 8, 8)
                .with_layer(Layer::new("original", Array3::zeros((8, 8, 4)))),
        ];

        let err = aggregate(
            &docs,
            &pipeline,
            BatchOptions {
                workers: 1,
                fail_fast: true,
            },
        )
        .unwrap_err();
        assert!(matches!(err, SegtilerError::MissingAnnotation { .. }));
    }

    #[test]
    fn pool_is_in_document_then_scan_order() {
        let pipeline = DocumentPipeline::new(&config(), classes()).expect("pipeline");
        let docs = vec![annotated("a", 6, 6), annotated("b", 6, 6)];

        let result = aggregate(&docs, &pipeline, options()).expect("batch");
        let order: Vec<(String, (usize, usize))> = result
            .pool
            .iter()
            .map(|tile| (tile.document_id.to_string(), tile.origin))
            .collect();
        assert_eq!(order[0], ("a".to_string(), (0, 0)));
        assert_eq!(order[3], ("a".to_string(), (2, 2)));
        assert_eq!(order[4], ("b".to_string(), (0, 0)));
    }

    #[test]
    fn landscape_document_is_rotated_then_resized_to_grid() {
        let mut config = config();
        config.tiling.auto_orient = true;
        config.tiling.grid_size = Some([2, 2]);
        let pipeline = DocumentPipeline::new(&config, classes()).expect("pipeline");

        let processed = pipeline.run(&annotated("wide", 12, 5)).expect("run");
        assert!(processed.rotated);
        assert_eq!(processed.resized_to, Some((6, 6)));
        assert_eq!(processed.tiles.len(), 4);
        assert!(processed
            .tiles
            .iter()
            .all(|tile| tile.mask.iter().all(|&id| id == ClassId(1))));
    }

    #[test]
    fn hidden_annotation_layer_is_ignored_unless_included() {
        let doc = Document::new("hidden", 4, 4)
            .with_layer(Layer::new("original", Array3::from_elem((4, 4, 4), 128)))
            .with_layer(Layer::new("mask", red(4, 4)).with_visibility(false));

        let pipeline = DocumentPipeline::new(&config(), classes()).expect("pipeline");
        let err = pipeline.run(&doc).unwrap_err();
        assert!(matches!(err, SegtilerError::MissingAnnotation { .. }));

        let mut config = config();
        config.input.include_hidden = true;
        let pipeline = DocumentPipeline::new(&config, classes()).expect("pipeline");
        let processed = pipeline.run(&doc).expect("run");
        assert_eq!(processed.tiles.len(), 1);
        assert_eq!(processed.tiles[0].foreground_ratio, 1.0);
    }

    #[test]
    fn unreadable_document_is_skipped_next_to_a_good_one() {
        let dir = tempfile::tempdir().expect("tempdir");
        for name in ["a_good", "b_bad"] {
            let doc_dir = dir.path().join(name);
            std::fs::create_dir_all(&doc_dir).expect("mkdir");
            image::RgbaImage::from_pixel(4, 4, image::Rgba([128, 128, 128, 255]))
                .save(doc_dir.join("original.png"))
                .expect("write original");
            image::RgbaImage::from_pixel(4, 4, image::Rgba([255, 0, 0, 255]))
                .save(doc_dir.join("mask.png"))
                .expect("write mask");
        }
        std::fs::write(dir.path().join("b_bad").join(LAYER_SIDECAR), [0xff, 0xfe, 0x00])
            .expect("write sidecar");

        let sources = discover_documents(dir.path(), "original", false).expect("discover");
        let pipeline = DocumentPipeline::new(&config(), classes()).expect("pipeline");
        let result = aggregate(&sources, &pipeline, options()).expect("batch");

        assert_eq!(result.pool.len(), 1);
        assert_eq!(result.report.processed_count(), 1);
        assert_eq!(result.report.skipped_count(), 1);
        assert!(result.report.documents[1].is_skipped());
    }

    #[test]
    fn missing_original_layer_is_malformed() {
        let pipeline = DocumentPipeline::new(&config(), classes()).expect("pipeline");
        let doc = Document::new("x", 4, 4).with_layer(Layer::new("mask", red(4, 4)));
        let err = pipeline.run(&doc).unwrap_err();
        assert!(matches!(err, SegtilerError::MalformedDocument { .. }));
    }
}
