//! Per-document outcomes of a batch run.

use serde::Serialize;
use std::fmt;

use crate::consolidate::LayerContribution;
use crate::raster::DocumentId;
use crate::tiling::TilingStats;

/// How one document fared.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DocumentStatus {
    Processed {
        rotated: bool,
        resized_to: Option<(usize, usize)>,
        merged: Vec<LayerContribution>,
        tiling: TilingStats,
    },
    Skipped {
        reason: String,
    },
}

/// Outcome record for one document.
#[derive(Clone, Debug, Serialize)]
pub struct DocumentOutcome {
    pub document_id: DocumentId,
    #[serde(flatten)]
    pub status: DocumentStatus,
}

impl DocumentOutcome {
    /// Tiles this document contributed to the pool.
    pub fn tiles(&self) -> usize {
        match &self.status {
            DocumentStatus::Processed { tiling, .. } => tiling.emitted,
            DocumentStatus::Skipped { .. } => 0,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self.status, DocumentStatus::Skipped { .. })
    }
}

/// Summary of a batch run, one entry per document in input order.
#[derive(Clone, Debug, Default, Serialize)]
pub struct BatchReport {
    pub documents: Vec<DocumentOutcome>,
}

impl BatchReport {
    pub fn processed_count(&self) -> usize {
        self.documents.iter().filter(|d| !d.is_skipped()).count()
    }

    pub fn skipped_count(&self) -> usize {
        self.documents.iter().filter(|d| d.is_skipped()).count()
    }

    /// Total tiles in the pool.
    pub fn tile_count(&self) -> usize {
        self.documents.iter().map(DocumentOutcome::tiles).sum()
    }

    /// Total tiles dropped by the foreground filter.
    pub fn dropped_count(&self) -> usize {
        self.documents
            .iter()
            .map(|d| match &d.status {
                DocumentStatus::Processed { tiling, .. } => tiling.dropped,
                DocumentStatus::Skipped { .. } => 0,
            })
            .sum()
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Documents: {} processed, {} skipped",
            self.processed_count(),
            self.skipped_count()
        )?;
        writeln!(
            f,
            "Tiles: {} pooled, {} dropped by foreground filter",
            self.tile_count(),
            self.dropped_count()
        )?;

        for outcome in &self.documents {
            match &outcome.status {
                DocumentStatus::Processed {
                    rotated,
                    merged,
                    tiling,
                    ..
                } => {
                    write!(f, "  {}: {} tiles", outcome.document_id, tiling.emitted)?;
                    if *rotated {
                        write!(f, " (rotated)")?;
                    }
                    let unmapped: usize = merged.iter().map(|c| c.unmapped).sum();
                    if unmapped > 0 {
                        write!(f, ", {} px with unknown colors", unmapped)?;
                    }
                    writeln!(f)?;
                }
                DocumentStatus::Skipped { reason } => {
                    writeln!(f, "  {}: skipped ({})", outcome.document_id, reason)?;
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_ignore_skipped_documents() {
        let report = BatchReport {
            documents: vec![
                DocumentOutcome {
                    document_id: DocumentId::new("a"),
                    status: DocumentStatus::Processed {
                        rotated: true,
                        resized_to: None,
                        merged: Vec::new(),
                        tiling: TilingStats {
                            emitted: 4,
                            dropped: 1,
                            ..Default::default()
                        },
                    },
                },
                DocumentOutcome {
                    document_id: DocumentId::new("b"),
                    status: DocumentStatus::Skipped {
                        reason: "no annotation".to_string(),
                    },
                },
            ],
        };

        assert_eq!(report.processed_count(), 1);
        assert_eq!(report.skipped_count(), 1);
        assert_eq!(report.tile_count(), 4);
        assert_eq!(report.dropped_count(), 1);

        let text = report.to_string();
        assert!(text.contains("a: 4 tiles (rotated)"));
        assert!(text.contains("b: skipped (no annotation)"));
    }

    #[test]
    fn status_is_tagged_in_json() {
        let outcome = DocumentOutcome {
            document_id: DocumentId::new("b"),
            status: DocumentStatus::Skipped {
                reason: "bad".to_string(),
            },
        };
        let json = serde_json::to_value(&outcome).expect("serialize");
        assert_eq!(json["status"], "skipped");
        assert_eq!(json["document_id"], "b");
    }
}
