use std::path::PathBuf;
use thiserror::Error;

/// The main error type for segtiler operations.
#[derive(Debug, Error)]
pub enum SegtilerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {message}")]
    Configuration { message: String },

    #[error("Failed to parse configuration from {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Document '{document}' has none of the annotation layers {wanted:?}")]
    MissingAnnotation {
        document: String,
        wanted: Vec<String>,
    },

    #[error(
        "Document '{document}': {what} is {}x{} but expected {}x{}",
        actual.0, actual.1, expected.0, expected.1
    )]
    SizeMismatch {
        document: String,
        what: String,
        expected: (usize, usize),
        actual: (usize, usize),
    },

    #[error("Document '{document}': failed to read {path}: {source}")]
    DocumentRead {
        document: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Document '{document}' is malformed: {message}")]
    MalformedDocument { document: String, message: String },

    #[error("No documents found under {path}")]
    NoDocuments { path: PathBuf },

    #[error("No tiles survived aggregation; cannot build a dataset split")]
    EmptyPool,

    #[error("Failed to read image {path}: {source}")]
    ImageRead {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Failed to write image {path}: {source}")]
    ImageWrite {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Failed to write manifest to {path}: {source}")]
    ManifestWrite {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to write CSV to {path}: {source}")]
    CsvWrite {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Dataset written to {path} failed validation with {problems} problem(s)")]
    InvalidDataset { path: PathBuf, problems: usize },

    #[error("Failed to start worker pool: {0}")]
    WorkerPool(String),
}

impl SegtilerError {
    /// Shorthand for a [`SegtilerError::Configuration`] error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Returns true for errors that only invalidate a single document.
    ///
    /// The batch stage isolates these and keeps processing sibling documents
    /// unless fail-fast is requested. Everything else aborts the run.
    pub fn is_document_scoped(&self) -> bool {
        matches!(
            self,
            Self::MissingAnnotation { .. }
                | Self::SizeMismatch { .. }
                | Self::MalformedDocument { .. }
                | Self::DocumentRead { .. }
                | Self::ImageRead { .. }
        )
    }
}
