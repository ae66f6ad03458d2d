//! Newtype identifiers for class labels and source documents.
//!
//! Using newtypes keeps a class index from being confused with an arbitrary
//! byte value, and a document identifier from an arbitrary string.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The integer label a mask pixel carries.
///
/// Masks are persisted as 8-bit grayscale images, so ids are bounded to `u8`.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassId(pub u8);

impl ClassId {
    /// Creates a new ClassId.
    #[inline]
    pub fn new(id: u8) -> Self {
        Self(id)
    }

    /// Returns the underlying value.
    #[inline]
    pub fn as_u8(&self) -> u8 {
        self.0
    }
}

impl From<u8> for ClassId {
    fn from(id: u8) -> Self {
        Self(id)
    }
}

impl fmt::Debug for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClassId({})", self.0)
    }
}

impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifies the source document a tile was cut from.
#[derive(Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(pub String);

impl DocumentId {
    /// Creates a new DocumentId.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for DocumentId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for DocumentId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Debug for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DocumentId({:?})", self.0)
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_id_ordering() {
        assert!(ClassId(1) < ClassId(2));
        assert_eq!(ClassId::from(7), ClassId::new(7));
    }

    #[test]
    fn test_document_id_display() {
        let id = DocumentId::new("scan_004");
        assert_eq!(id.to_string(), "scan_004");
        assert_eq!(format!("{:?}", id), "DocumentId(\"scan_004\")");
    }

    #[test]
    fn test_class_id_serde_is_transparent() {
        let json = serde_json::to_string(&ClassId(3)).expect("serialize");
        assert_eq!(json, "3");
        let parsed: ClassId = serde_json::from_str("12").expect("parse");
        assert_eq!(parsed, ClassId(12));
    }
}
