//! Checking a written dataset against the split it was written from.
//!
//! Every partition must hold one image/mask pair per assigned tile, with
//! matching dimensions and an 8-bit grayscale mask. No tile may appear in
//! more than one partition.

use image::ColorType;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::path::Path;
use tracing::{info, warn};
use walkdir::WalkDir;

use super::{IMAGES_DIR, MASKS_DIR};
use crate::error::SegtilerError;
use crate::split::{Partition, SplitDataset};

/// Findings for one partition directory.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PartitionCheck {
    pub partition: Partition,
    /// Tiles the split assigned to this partition.
    pub expected: usize,
    /// Image/mask pairs found on disk.
    pub pairs: usize,
    pub problems: Vec<String>,
}

/// Result of [`validate_dataset`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DatasetCheck {
    pub partitions: Vec<PartitionCheck>,
    /// Tiles (document, origin) assigned to more than one partition.
    pub shared_tiles: usize,
}

impl DatasetCheck {
    pub fn is_ok(&self) -> bool {
        self.shared_tiles == 0
            && self
                .partitions
                .iter()
                .all(|p| p.problems.is_empty() && p.pairs == p.expected)
    }

    pub fn problem_count(&self) -> usize {
        let mismatched = self
            .partitions
            .iter()
            .filter(|p| p.pairs != p.expected)
            .count();
        self.partitions.iter().map(|p| p.problems.len()).sum::<usize>()
            + mismatched
            + usize::from(self.shared_tiles > 0)
    }
}

impl fmt::Display for DatasetCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_ok() {
            return writeln!(f, "Dataset check: OK");
        }

        writeln!(f, "Dataset check: {} problem(s)", self.problem_count())?;
        for check in &self.partitions {
            if check.pairs != check.expected {
                writeln!(
                    f,
                    "  {}: {} pairs on disk, {} expected",
                    check.partition, check.pairs, check.expected
                )?;
            }
            for problem in &check.problems {
                writeln!(f, "  {}: {}", check.partition, problem)?;
            }
        }
        if self.shared_tiles > 0 {
            writeln!(
                f,
                "  {} tile(s) appear in more than one partition",
                self.shared_tiles
            )?;
        }
        Ok(())
    }
}

/// Re-reads the dataset under `out_dir` and checks it against `dataset`.
///
/// Problems with the files are collected into the returned report; only a
/// partition directory that cannot be listed is an error.
pub fn validate_dataset(
    out_dir: &Path,
    dataset: &SplitDataset,
) -> Result<DatasetCheck, SegtilerError> {
    let mut partitions = Vec::with_capacity(Partition::ALL.len());
    for partition in Partition::ALL {
        partitions.push(check_partition(
            &out_dir.join(partition.as_str()),
            partition,
            dataset.stats.count(partition),
        )?);
    }

    let check = DatasetCheck {
        partitions,
        shared_tiles: shared_tiles(dataset),
    };

    if check.is_ok() {
        info!(out = %out_dir.display(), "dataset check passed");
    } else {
        warn!(
            out = %out_dir.display(),
            problems = check.problem_count(),
            "dataset check failed"
        );
    }
    Ok(check)
}

fn check_partition(
    dir: &Path,
    partition: Partition,
    expected: usize,
) -> Result<PartitionCheck, SegtilerError> {
    let images = png_stems(&dir.join(IMAGES_DIR))?;
    let masks = png_stems(&dir.join(MASKS_DIR))?;

    let mut problems: Vec<String> = images
        .difference(&masks)
        .map(|name| format!("{}: image has no mask", name))
        .chain(
            masks
                .difference(&images)
                .map(|name| format!("{}: mask has no image", name)),
        )
        .collect();

    let paired: Vec<&String> = images.intersection(&masks).collect();
    let mut pair_problems: Vec<String> = paired
        .par_iter()
        .filter_map(|name| check_pair(dir, name).err())
        .collect();
    pair_problems.sort();
    problems.extend(pair_problems);

    Ok(PartitionCheck {
        partition,
        expected,
        pairs: paired.len(),
        problems,
    })
}

/// Checks one pair; the error is a human-readable problem description.
fn check_pair(dir: &Path, name: &str) -> Result<(), String> {
    let file = format!("{}.png", name);
    let image = image::open(dir.join(IMAGES_DIR).join(&file))
        .map_err(|e| format!("{}: unreadable image ({})", name, e))?;
    let mask = image::open(dir.join(MASKS_DIR).join(&file))
        .map_err(|e| format!("{}: unreadable mask ({})", name, e))?;

    if mask.color() != ColorType::L8 {
        return Err(format!(
            "{}: mask is {:?}, expected 8-bit grayscale",
            name,
            mask.color()
        ));
    }
    let (image_size, mask_size) = (
        (image.width(), image.height()),
        (mask.width(), mask.height()),
    );
    if image_size != mask_size {
        return Err(format!(
            "{}: image is {}x{} but mask is {}x{}",
            name, image_size.0, image_size.1, mask_size.0, mask_size.1
        ));
    }
    Ok(())
}

fn png_stems(dir: &Path) -> Result<BTreeSet<String>, SegtilerError> {
    let mut stems = BTreeSet::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|source| SegtilerError::Io(source.into()))?;
        let path = entry.path();
        let is_png = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("png"));
        if entry.file_type().is_file() && is_png {
            if let Some(stem) = path.file_stem() {
                stems.insert(stem.to_string_lossy().into_owned());
            }
        }
    }
    Ok(stems)
}

fn shared_tiles(dataset: &SplitDataset) -> usize {
    let mut seen: HashMap<(&str, (usize, usize)), Partition> = HashMap::new();
    let mut shared = BTreeSet::new();
    for tile in &dataset.tiles {
        let key = (tile.tile.document_id.as_str(), tile.tile.origin);
        let partition = tile.assignment.partition;
        if let Some(&first) = seen.get(&key) {
            if first != partition {
                shared.insert(key);
            }
        } else {
            seen.insert(key, partition);
        }
    }
    shared.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SplitConfig;
    use crate::output::write_tiles;
    use crate::raster::{ClassId, DocumentId};
    use crate::split::split_pool;
    use crate::tiling::Tile;
    use image::{Rgb, RgbImage};
    use ndarray::{Array2, Array3};
    use std::fs;

    fn dataset(n: usize) -> SplitDataset {
        let pool = (0..n)
            .map(|i| Tile {
                image: Array3::from_elem((4, 4, 4), 50),
                mask: Array2::from_elem((4, 4), ClassId(1)),
                origin: (i, 0),
                document_id: DocumentId::new("doc"),
                foreground_ratio: 1.0,
                touches_padding: false,
            })
            .collect();
        split_pool(pool, &SplitConfig::default()).expect("split")
    }

    #[test]
    fn freshly_written_dataset_passes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let dataset = dataset(10);
        write_tiles(dir.path(), &dataset).expect("write");

        let check = validate_dataset(dir.path(), &dataset).expect("check");
        assert!(check.is_ok(), "{}", check);
        assert_eq!(check.partitions[0].pairs, 8);
        assert_eq!(check.to_string(), "Dataset check: OK\n");
    }

    #[test]
    fn broken_pairs_are_reported() {
        let dir = tempfile::tempdir().expect("tempdir");
        let dataset = dataset(10);
        write_tiles(dir.path(), &dataset).expect("write");

        fs::remove_file(dir.path().join("val/masks/00001.png")).expect("remove");
        RgbImage::from_pixel(4, 4, Rgb([1, 1, 1]))
            .save(dir.path().join("train/masks/00002.png"))
            .expect("overwrite mask");
        RgbImage::from_pixel(3, 4, Rgb([1, 1, 1]))
            .save(dir.path().join("train/images/00003.png"))
            .expect("overwrite image");

        let check = validate_dataset(dir.path(), &dataset).expect("check");
        assert!(!check.is_ok());

        let train = &check.partitions[0];
        assert_eq!(train.problems.len(), 2);
        assert!(train.problems[0].starts_with("00002: mask is"));
        assert!(train.problems[1].contains("3x4 but mask is 4x4"));

        let val = &check.partitions[1];
        assert_eq!((val.pairs, val.expected), (0, 1));
        assert_eq!(val.problems, vec!["00001: image has no mask".to_string()]);

        let text = check.to_string();
        assert!(text.contains("val: 0 pairs on disk, 1 expected"));
    }

    #[test]
    fn tile_in_two_partitions_is_shared() {
        let mut dataset = dataset(10);
        let train = dataset
            .tiles
            .iter()
            .position(|t| t.assignment.partition == Partition::Train)
            .expect("train tile");
        let val = dataset
            .tiles
            .iter()
            .position(|t| t.assignment.partition == Partition::Val)
            .expect("val tile");
        dataset.tiles[val].tile.origin = dataset.tiles[train].tile.origin;

        assert_eq!(shared_tiles(&dataset), 1);
    }
}
