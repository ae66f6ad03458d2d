//! Reader for documents stored as a directory of per-layer PNG files.
//!
//! Layout:
//!
//! ```text
//! input/
//!   page_001/
//!     original.png
//!     mask.png
//!     refined.png
//!     layers.yaml      (optional)
//!   page_002/
//!     ...
//! ```
//!
//! Without a sidecar every PNG is a visible layer at the canvas origin, named
//! after its file stem, and the canvas is the size of the source layer. The
//! optional `layers.yaml` sidecar carries what a layered file would: layer
//! visibility, canvas offsets and an explicit canvas size.
//!
//! ```yaml
//! canvas: [2480, 3508]
//! layers:
//!   - { name: original, file: original.png }
//!   - { name: mask, file: mask.png, offset: [120, 40] }
//!   - { name: refined, file: refined.png, visible: false }
//! ```

use serde::Deserialize;
use std::borrow::Cow;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

use super::{Document, DocumentSource};
use crate::error::SegtilerError;
use crate::raster::{rgba_from_image, DocumentId, Layer};

/// File name of the optional per-document layer description.
pub const LAYER_SIDECAR: &str = "layers.yaml";

#[derive(Debug, Deserialize)]
struct Sidecar {
    #[serde(default)]
    canvas: Option<[usize; 2]>,
    layers: Vec<SidecarLayer>,
}

#[derive(Debug, Deserialize)]
struct SidecarLayer {
    name: String,
    file: PathBuf,
    #[serde(default = "default_visible")]
    visible: bool,
    #[serde(default)]
    offset: [i64; 2],
}

fn default_visible() -> bool {
    true
}

/// A document stored as a directory of layer PNGs.
#[derive(Clone, Debug)]
pub struct LayerDirSource {
    dir: PathBuf,
    id: DocumentId,
    original_layer: String,
    include_hidden: bool,
}

impl LayerDirSource {
    /// Creates a source for `dir`; the document id is the directory name.
    pub fn new(dir: impl Into<PathBuf>, original_layer: impl Into<String>, include_hidden: bool) -> Self {
        let dir = dir.into();
        let id = dir
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| dir.to_string_lossy().into_owned());

        Self {
            dir,
            id: DocumentId::new(id),
            original_layer: original_layer.into(),
            include_hidden,
        }
    }

    /// The directory this source reads from.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn malformed(&self, message: impl Into<String>) -> SegtilerError {
        SegtilerError::MalformedDocument {
            document: self.id.to_string(),
            message: message.into(),
        }
    }

    fn read_failed(&self, path: &Path, source: std::io::Error) -> SegtilerError {
        SegtilerError::DocumentRead {
            document: self.id.to_string(),
            path: path.to_path_buf(),
            source,
        }
    }

    fn read_sidecar(&self) -> Result<Option<Sidecar>, SegtilerError> {
        let path = self.dir.join(LAYER_SIDECAR);
        if !path.is_file() {
            return Ok(None);
        }

        let text = fs::read_to_string(&path).map_err(|e| self.read_failed(&path, e))?;
        serde_yaml::from_str(&text)
            .map(Some)
            .map_err(|source| self.malformed(format!("invalid {}: {}", LAYER_SIDECAR, source)))
    }

    fn implicit_layers(&self) -> Result<Vec<SidecarLayer>, SegtilerError> {
        let mut layers = Vec::new();

        let entries = fs::read_dir(&self.dir).map_err(|e| self.read_failed(&self.dir, e))?;
        for entry in entries {
            let path = entry.map_err(|e| self.read_failed(&self.dir, e))?.path();
            if !path.is_file() || !is_png(&path) {
                continue;
            }
            let Some(stem) = path.file_stem().map(|s| s.to_string_lossy().into_owned()) else {
                continue;
            };
            layers.push(SidecarLayer {
                name: stem,
                file: path,
                visible: true,
                offset: [0, 0],
            });
        }

        layers.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(layers)
    }

    fn read_layer(&self, entry: &SidecarLayer) -> Result<Layer, SegtilerError> {
        let path = if entry.file.is_absolute() {
            entry.file.clone()
        } else {
            self.dir.join(&entry.file)
        };

        let decoded = image::open(&path).map_err(|source| SegtilerError::ImageRead {
            path: path.clone(),
            source,
        })?;

        debug!(
            document = %self.id,
            layer = %entry.name,
            width = decoded.width(),
            height = decoded.height(),
            "decoded layer"
        );

        Ok(Layer::new(entry.name.clone(), rgba_from_image(&decoded.to_rgba8()))
            .with_offset(entry.offset[0], entry.offset[1])
            .with_visibility(entry.visible))
    }
}

impl DocumentSource for LayerDirSource {
    fn document_id(&self) -> DocumentId {
        self.id.clone()
    }

    fn load(&self) -> Result<Cow<'_, Document>, SegtilerError> {
        let (canvas, entries) = match self.read_sidecar()? {
            Some(sidecar) => (sidecar.canvas, sidecar.layers),
            None => (None, self.implicit_layers()?),
        };

        let mut layers = Vec::with_capacity(entries.len());
        for entry in entries
            .iter()
            .filter(|entry| entry.visible || self.include_hidden)
        {
            layers.push(self.read_layer(entry)?);
        }

        let original = layers
            .iter()
            .find(|layer| layer.name == self.original_layer)
            .ok_or_else(|| {
                self.malformed(format!("no '{}' layer found", self.original_layer))
            })?;

        let (width, height) = match canvas {
            Some([width, height]) => (width, height),
            None => {
                let (w, h) = original.dims();
                let (x, y) = original.offset;
                (
                    (x.max(0) as usize).saturating_add(w),
                    (y.max(0) as usize).saturating_add(h),
                )
            }
        };

        Ok(Cow::Owned(Document {
            id: self.id.clone(),
            width,
            height,
            layers,
        }))
    }
}

fn is_png(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("png"))
}

fn is_document_dir(dir: &Path, original_layer: &str) -> bool {
    dir.join(LAYER_SIDECAR).is_file() || dir.join(format!("{}.png", original_layer)).is_file()
}

/// Finds document directories under `root`, sorted by name.
///
/// If `root` itself looks like a document (has a sidecar or a source layer
/// file) it is returned as the only document.
pub fn discover_documents(
    root: &Path,
    original_layer: &str,
    include_hidden: bool,
) -> Result<Vec<LayerDirSource>, SegtilerError> {
    if !root.is_dir() {
        return Err(SegtilerError::NoDocuments {
            path: root.to_path_buf(),
        });
    }

    if is_document_dir(root, original_layer) {
        return Ok(vec![LayerDirSource::new(root, original_layer, include_hidden)]);
    }

    let mut sources = Vec::new();
    for entry in WalkDir::new(root)
        .follow_links(true)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|source| SegtilerError::Io(source.into()))?;
        if entry.file_type().is_dir() && is_document_dir(entry.path(), original_layer) {
            sources.push(LayerDirSource::new(
                entry.path(),
                original_layer,
                include_hidden,
            ));
        }
    }

    if sources.is_empty() {
        return Err(SegtilerError::NoDocuments {
            path: root.to_path_buf(),
        });
    }

    Ok(sources)
}
