//! Build configuration: tiling, splitting, mask merging and batch options.
//!
//! Configuration is loaded once from YAML, validated statically, and then
//! passed by shared reference to every stage. Nothing in the pipeline holds
//! configuration as global state, which is what lets documents be processed
//! on independent workers.

mod classes;

pub use classes::{ClassSpec, ClassTable};

use classes::ClassTableFile;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::SegtilerError;

/// Tolerance used when checking that split ratios sum to one.
pub const RATIO_SUM_TOLERANCE: f64 = 1e-3;

/// How the canvas is extended on the right/bottom edges before tiling.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaddingMode {
    /// Fill with a constant value.
    #[default]
    Constant,
    /// Mirror around the edge pixel, excluding it (`dcb|abcd|cba`).
    Reflect,
    /// Mirror around the edge, repeating the edge pixel (`cba|abcd|dcb`).
    Symmetric,
}

/// Padding policy for source images.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaddingConfig {
    pub mode: PaddingMode,
    /// Fill value for every channel in constant mode.
    pub value: u8,
}

/// Tiling parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TilingConfig {
    pub tile_size: usize,
    /// Overlap in pixels shared with each neighbouring tile.
    pub overlap: usize,
    /// Optional `[rows, cols]` grid; the image is resized so it fits exactly.
    pub grid_size: Option<[usize; 2]>,
    pub auto_orient: bool,
    pub padding: PaddingConfig,
    pub min_foreground_ratio: f64,
}

impl Default for TilingConfig {
    fn default() -> Self {
        Self {
            tile_size: 512,
            overlap: 128,
            grid_size: None,
            auto_orient: false,
            padding: PaddingConfig::default(),
            min_foreground_ratio: 0.0,
        }
    }
}

impl TilingConfig {
    /// Distance between successive tile origins: `tile_size - 2 * overlap`.
    pub fn stride(&self) -> Result<usize, SegtilerError> {
        let margin = self.overlap.checked_mul(2);
        match margin.and_then(|m| self.tile_size.checked_sub(m)) {
            Some(stride) if stride > 0 => Ok(stride),
            _ => Err(SegtilerError::config(format!(
                "stride must be positive (tile_size {} - 2 * overlap {} <= 0)",
                self.tile_size, self.overlap
            ))),
        }
    }

    /// Checks every tiling parameter.
    pub fn validate(&self) -> Result<(), SegtilerError> {
        if self.tile_size == 0 {
            return Err(SegtilerError::config("tile_size must be greater than 0"));
        }
        let stride = self.stride()?;

        if let Some([rows, cols]) = self.grid_size {
            if rows == 0 || cols == 0 {
                return Err(SegtilerError::config(format!(
                    "grid_size must be [rows, cols] with positive values, got [{}, {}]",
                    rows, cols
                )));
            }
            // resized canvases go through `image`, which addresses pixels with u32
            let fits = |n: usize| {
                (n - 1)
                    .checked_mul(stride)
                    .and_then(|extent| extent.checked_add(self.tile_size))
                    .is_some_and(|extent| extent <= u32::MAX as usize)
            };
            if !fits(rows) || !fits(cols) {
                return Err(SegtilerError::config(format!(
                    "grid_size [{}, {}] needs a canvas larger than {} pixels per side",
                    rows,
                    cols,
                    u32::MAX
                )));
            }
        }

        if !(0.0..=1.0).contains(&self.min_foreground_ratio) {
            return Err(SegtilerError::config(format!(
                "min_foreground_ratio must be in [0.0, 1.0], got {}",
                self.min_foreground_ratio
            )));
        }

        Ok(())
    }
}

/// Train/validation/test split parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    pub train_ratio: f64,
    pub val_ratio: f64,
    pub test_ratio: f64,
    pub seed: u64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            train_ratio: 0.8,
            val_ratio: 0.1,
            test_ratio: 0.1,
            seed: 42,
        }
    }
}

impl SplitConfig {
    /// Checks that every ratio is in `[0, 1]` and that they sum to one.
    pub fn validate(&self) -> Result<(), SegtilerError> {
        let ratios = [
            ("train_ratio", self.train_ratio),
            ("val_ratio", self.val_ratio),
            ("test_ratio", self.test_ratio),
        ];

        for (name, ratio) in ratios {
            if !ratio.is_finite() || !(0.0..=1.0).contains(&ratio) {
                return Err(SegtilerError::config(format!(
                    "{} must be in [0.0, 1.0], got {}",
                    name, ratio
                )));
            }
        }

        let total = self.train_ratio + self.val_ratio + self.test_ratio;
        if (total - 1.0).abs() > RATIO_SUM_TOLERANCE {
            return Err(SegtilerError::config(format!(
                "split ratios must sum to 1.0, got {:.4}",
                total
            )));
        }

        Ok(())
    }
}

/// Which annotation layers are merged, highest priority first.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaskIntegrationConfig {
    pub priority_order: Vec<String>,
}

impl Default for MaskIntegrationConfig {
    fn default() -> Self {
        Self {
            priority_order: vec!["mask".to_string(), "refined".to_string()],
        }
    }
}

/// Which layers are read from each document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Name of the source raster layer.
    pub original_layer: String,
    /// Also read layers that were hidden in the source document.
    pub include_hidden: bool,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            original_layer: "original".to_string(),
            include_hidden: false,
        }
    }
}

/// Worker pool and failure policy.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Worker threads; 0 lets the pool pick one per core.
    pub workers: usize,
    /// Abort the batch on the first failing document.
    pub fail_fast: bool,
}

/// The full build configuration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    pub tiling: TilingConfig,
    pub data_split: SplitConfig,
    pub mask_integration: MaskIntegrationConfig,
    pub input: InputConfig,
    pub batch: BatchConfig,
}

impl BuildConfig {
    /// Parses a build configuration from YAML text without validating it.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    /// Runs every check that does not need document data.
    pub fn validate(&self) -> Result<(), SegtilerError> {
        self.tiling.validate()?;
        self.data_split.validate()?;

        if self.mask_integration.priority_order.is_empty() {
            return Err(SegtilerError::config(
                "mask_integration.priority_order must name at least one layer",
            ));
        }
        if self
            .mask_integration
            .priority_order
            .contains(&self.input.original_layer)
        {
            return Err(SegtilerError::config(format!(
                "layer '{}' cannot be both the source image and an annotation layer",
                self.input.original_layer
            )));
        }

        Ok(())
    }
}

/// Reads and validates a build configuration file.
pub fn load_build_config(path: &Path) -> Result<BuildConfig, SegtilerError> {
    let text = fs::read_to_string(path)?;
    let config = BuildConfig::from_yaml_str(&text).map_err(|source| {
        SegtilerError::ConfigParse {
            path: path.to_path_buf(),
            source,
        }
    })?;
    config.validate()?;
    Ok(config)
}

/// Reads and validates a class table file.
///
/// Malformed YAML is a parse error; duplicate ids or colors are a
/// configuration error.
pub fn load_class_table(path: &Path) -> Result<ClassTable, SegtilerError> {
    let text = fs::read_to_string(path)?;
    let file: ClassTableFile =
        serde_yaml::from_str(&text).map_err(|source| SegtilerError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })?;
    ClassTable::try_from(file)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stride_is_tile_minus_twice_overlap() {
        let tiling = TilingConfig {
            tile_size: 512,
            overlap: 128,
            ..Default::default()
        };
        assert_eq!(tiling.stride().expect("valid"), 256);
    }

    #[test]
    fn overlap_of_half_tile_is_rejected() {
        let tiling = TilingConfig {
            tile_size: 8,
            overlap: 4,
            ..Default::default()
        };
        assert!(matches!(
            tiling.validate(),
            Err(SegtilerError::Configuration { .. })
        ));
    }

    #[test]
    fn ratios_must_sum_to_one() {
        let split = SplitConfig {
            train_ratio: 0.8,
            val_ratio: 0.1,
            test_ratio: 0.09,
            seed: 1,
        };
        let err = split.validate().unwrap_err();
        assert!(err.to_string().contains("sum to 1.0"));

        assert!(SplitConfig::default().validate().is_ok());
    }

    #[test]
    fn negative_ratio_is_rejected() {
        let split = SplitConfig {
            train_ratio: 1.1,
            val_ratio: -0.1,
            test_ratio: 0.0,
            seed: 1,
        };
        assert!(split.validate().is_err());
    }

    #[test]
    fn partial_yaml_falls_back_to_defaults() {
        let yaml = r#"
tiling:
  tile_size: 256
  overlap: 32
  padding:
    mode: reflect
data_split:
  seed: 7
"#;
        let config = BuildConfig::from_yaml_str(yaml).expect("parse");
        assert_eq!(config.tiling.tile_size, 256);
        assert_eq!(config.tiling.padding.mode, PaddingMode::Reflect);
        assert_eq!(config.tiling.padding.value, 0);
        assert_eq!(config.data_split.seed, 7);
        assert_eq!(config.data_split.train_ratio, 0.8);
        assert_eq!(
            config.mask_integration.priority_order,
            vec!["mask".to_string(), "refined".to_string()]
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_priority_list_is_rejected() {
        let mut config = BuildConfig::default();
        config.mask_integration.priority_order.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn huge_overlap_is_a_configuration_error() {
        let config =
            BuildConfig::from_yaml_str("tiling: { tile_size: 4, overlap: 9223372036854775808 }")
                .expect("parse");
        assert!(matches!(
            config.validate(),
            Err(SegtilerError::Configuration { .. })
        ));
    }

    #[test]
    fn oversized_grid_is_rejected() {
        let mut config = BuildConfig::default();
        config.tiling.grid_size = Some([usize::MAX, 2]);
        assert!(matches!(
            config.validate(),
            Err(SegtilerError::Configuration { .. })
        ));
    }

    #[test]
    fn duplicate_class_in_file_is_a_configuration_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("classes.yaml");
        fs::write(
            &path,
            "background: { id: 0, name: background, color: [0, 0, 0] }\nclasses:\n  - { id: 0, name: text, color: [255, 0, 0] }\n",
        )
        .expect("write classes");

        let err = load_class_table(&path).unwrap_err();
        assert!(matches!(err, SegtilerError::Configuration { .. }));
        assert!(err.to_string().contains("duplicate class id 0"));

        fs::write(&path, "background: [not, a, class]\n").expect("write classes");
        assert!(matches!(
            load_class_table(&path),
            Err(SegtilerError::ConfigParse { .. })
        ));
    }

    #[test]
    fn zero_grid_dimension_is_rejected() {
        let mut config = BuildConfig::default();
        config.tiling.grid_size = Some([0, 3]);
        assert!(config.validate().is_err());
    }
}
