//! Class definitions: which annotation color means which class id.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::SegtilerError;
use crate::raster::ClassId;

/// One class definition.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClassSpec {
    /// Class id written into masks.
    pub id: ClassId,

    /// Human-readable class name.
    pub name: String,

    /// Annotation color as `[r, g, b]`.
    pub color: [u8; 3],

    /// Pixels with alpha strictly below this value count as background.
    ///
    /// Only meaningful on the background class.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alpha_threshold: Option<u8>,

    /// Optional free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ClassSpec {
    /// Creates a class with no alpha threshold or description.
    pub fn new(id: impl Into<ClassId>, name: impl Into<String>, color: [u8; 3]) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            color,
            alpha_threshold: None,
            description: None,
        }
    }

    /// Sets the alpha threshold.
    pub fn with_alpha_threshold(mut self, threshold: u8) -> Self {
        self.alpha_threshold = Some(threshold);
        self
    }
}

/// On-disk shape of the class table file.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub(crate) struct ClassTableFile {
    background: ClassSpec,
    #[serde(default)]
    classes: Vec<ClassSpec>,
}

/// The validated set of classes plus the designated background class.
///
/// Ids and colors are unique across the whole table. Construction fails
/// with a configuration error otherwise.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(try_from = "ClassTableFile", into = "ClassTableFile")]
pub struct ClassTable {
    background: ClassSpec,
    classes: Vec<ClassSpec>,
    by_id: Vec<ClassSpec>,
}

impl ClassTable {
    /// Builds a table, rejecting duplicate ids and duplicate colors.
    pub fn new(background: ClassSpec, classes: Vec<ClassSpec>) -> Result<Self, SegtilerError> {
        let mut seen_ids: HashMap<ClassId, &str> = HashMap::new();
        let mut seen_colors: HashMap<[u8; 3], &str> = HashMap::new();

        for spec in std::iter::once(&background).chain(classes.iter()) {
            if let Some(first) = seen_ids.insert(spec.id, &spec.name) {
                return Err(SegtilerError::config(format!(
                    "duplicate class id {} (used by '{}' and '{}')",
                    spec.id, first, spec.name
                )));
            }
            if let Some(first) = seen_colors.insert(spec.color, &spec.name) {
                return Err(SegtilerError::config(format!(
                    "duplicate class color {:?} (used by '{}' and '{}')",
                    spec.color, first, spec.name
                )));
            }
        }

        let mut by_id: Vec<ClassSpec> = std::iter::once(background.clone())
            .chain(classes.iter().cloned())
            .collect();
        by_id.sort_by_key(|spec| spec.id);

        Ok(Self {
            background,
            classes,
            by_id,
        })
    }

    /// Parses and validates a class table from YAML text.
    ///
    /// Duplicate ids or colors surface as a custom YAML error here;
    /// [`load_class_table`](super::load_class_table) keeps them apart.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    /// The background class.
    pub fn background(&self) -> &ClassSpec {
        &self.background
    }

    /// Shorthand for the background class id.
    pub fn background_id(&self) -> ClassId {
        self.background.id
    }

    /// Foreground classes in declaration order.
    pub fn classes(&self) -> &[ClassSpec] {
        &self.classes
    }

    /// All classes, background included, in ascending id order.
    pub fn by_ascending_id(&self) -> &[ClassSpec] {
        &self.by_id
    }

    /// Looks up a class by id.
    pub fn get(&self, id: ClassId) -> Option<&ClassSpec> {
        self.by_id
            .binary_search_by_key(&id, |spec| spec.id)
            .ok()
            .map(|idx| &self.by_id[idx])
    }

    /// Class name for display; unknown ids render as `unknown_<id>`.
    pub fn name_of(&self, id: ClassId) -> String {
        self.get(id)
            .map(|spec| spec.name.clone())
            .unwrap_or_else(|| format!("unknown_{}", id))
    }
}

impl TryFrom<ClassTableFile> for ClassTable {
    type Error = SegtilerError;

    fn try_from(file: ClassTableFile) -> Result<Self, Self::Error> {
        ClassTable::new(file.background, file.classes)
    }
}

impl From<ClassTable> for ClassTableFile {
    fn from(table: ClassTable) -> Self {
        Self {
            background: table.background,
            classes: table.classes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn background() -> ClassSpec {
        ClassSpec::new(0, "background", [0, 0, 0]).with_alpha_threshold(128)
    }

    #[test]
    fn table_orders_classes_by_id() {
        let table = ClassTable::new(
            background(),
            vec![
                ClassSpec::new(2, "figure", [0, 255, 0]),
                ClassSpec::new(1, "text", [255, 0, 0]),
            ],
        )
        .expect("valid table");

        let ids: Vec<u8> = table
            .by_ascending_id()
            .iter()
            .map(|c| c.id.as_u8())
            .collect();
        assert_eq!(ids, vec![0, 1, 2]);
        assert_eq!(table.classes()[0].name, "figure");
        assert_eq!(table.name_of(ClassId(1)), "text");
        assert_eq!(table.name_of(ClassId(9)), "unknown_9");
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let err = ClassTable::new(
            background(),
            vec![ClassSpec::new(0, "text", [255, 0, 0])],
        )
        .unwrap_err();
        assert!(matches!(err, SegtilerError::Configuration { .. }));
        assert!(err.to_string().contains("duplicate class id 0"));
    }

    #[test]
    fn duplicate_colors_are_rejected() {
        let err = ClassTable::new(
            background(),
            vec![
                ClassSpec::new(1, "text", [255, 0, 0]),
                ClassSpec::new(2, "title", [255, 0, 0]),
            ],
        )
        .unwrap_err();
        assert!(err.to_string().contains("duplicate class color"));
    }

    #[test]
    fn yaml_table_is_validated_on_parse() {
        let yaml = r#"
background:
  id: 0
  name: background
  color: [0, 0, 0]
  alpha_threshold: 64
classes:
  - id: 1
    name: text
    color: [255, 0, 0]
    description: printed text
"#;
        let table = ClassTable::from_yaml_str(yaml).expect("parse");
        assert_eq!(table.background().alpha_threshold, Some(64));
        assert_eq!(table.classes().len(), 1);

        let duplicate = r#"
background: { id: 0, name: background, color: [0, 0, 0] }
classes:
  - { id: 0, name: text, color: [255, 0, 0] }
"#;
        assert!(ClassTable::from_yaml_str(duplicate).is_err());
    }
}
