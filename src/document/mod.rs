//! Source documents: a canvas plus the layers extracted from it.
//!
//! Decoding the original layered file format is not part of this crate. A
//! [`DocumentSource`] hands the pipeline an in-memory [`Document`]; the
//! bundled [`LayerDirSource`] reads a directory of per-layer PNG files.

mod layer_dir;

pub use layer_dir::{discover_documents, LayerDirSource, LAYER_SIDECAR};

use std::borrow::Cow;

use crate::error::SegtilerError;
use crate::raster::{DocumentId, Layer, RgbaBuffer};

/// A source document: identifier, canvas size and layers.
#[derive(Clone, Debug)]
pub struct Document {
    pub id: DocumentId,
    pub width: usize,
    pub height: usize,
    pub layers: Vec<Layer>,
}

impl Document {
    /// Creates an empty document with the given canvas size.
    pub fn new(id: impl Into<DocumentId>, width: usize, height: usize) -> Self {
        Self {
            id: id.into(),
            width,
            height,
            layers: Vec::new(),
        }
    }

    /// Adds a layer.
    pub fn with_layer(mut self, layer: Layer) -> Self {
        self.layers.push(layer);
        self
    }

    /// Returns the first layer with the given name.
    pub fn layer(&self, name: &str) -> Option<&Layer> {
        self.layers.iter().find(|layer| layer.name == name)
    }

    /// The document without its hidden layers.
    ///
    /// Borrows `self` when every layer is visible.
    pub fn visible_only(&self) -> Cow<'_, Document> {
        if self.layers.iter().all(|layer| layer.visible) {
            return Cow::Borrowed(self);
        }
        Cow::Owned(Document {
            id: self.id.clone(),
            width: self.width,
            height: self.height,
            layers: self
                .layers
                .iter()
                .filter(|layer| layer.visible)
                .cloned()
                .collect(),
        })
    }

    /// Renders the named layer onto the document canvas.
    ///
    /// Returns `Ok(None)` if the layer is absent and a size mismatch error if
    /// it does not fit the canvas.
    pub fn canvas_layer(&self, name: &str) -> Result<Option<RgbaBuffer>, SegtilerError> {
        let Some(layer) = self.layer(name) else {
            return Ok(None);
        };

        layer
            .place_on_canvas(self.width, self.height)
            .map(Some)
            .ok_or_else(|| SegtilerError::SizeMismatch {
                document: self.id.to_string(),
                what: format!("layer '{}' at offset {:?}", name, layer.offset),
                expected: (self.width, self.height),
                actual: layer.dims(),
            })
    }
}

/// Anything that can produce a [`Document`] on demand.
///
/// Loading happens inside the per-document worker, so sources must be
/// shareable across threads.
pub trait DocumentSource: Sync {
    /// Identifier used for logging and provenance before the document loads.
    fn document_id(&self) -> DocumentId;

    /// Loads (or borrows) the document.
    fn load(&self) -> Result<Cow<'_, Document>, SegtilerError>;
}

impl DocumentSource for Document {
    fn document_id(&self) -> DocumentId {
        self.id.clone()
    }

    fn load(&self) -> Result<Cow<'_, Document>, SegtilerError> {
        Ok(Cow::Borrowed(self))
    }
}
