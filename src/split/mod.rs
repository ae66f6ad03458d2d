//! Seeded train/val/test partitioning of the pooled tiles.
//!
//! The pool is permuted with a generator seeded from the configuration, then
//! cut into three contiguous runs (train, val, test). Validation and test
//! sizes are `floor(n * ratio)`; whatever is left goes to train. Inside each
//! partition tiles are numbered `00001`, `00002`, ... in permutation order.

mod report;

pub use report::{PartitionStats, SplitStats};

use rand::seq::SliceRandom;
use rand::{rngs::StdRng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{info, warn};

use crate::config::SplitConfig;
use crate::error::SegtilerError;
use crate::tiling::Tile;

/// Guards `floor` against ratios like 0.1 * 10 landing just under 1.
const FLOOR_EPSILON: f64 = 1e-9;

/// One of the three dataset partitions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Partition {
    Train,
    Val,
    Test,
}

impl Partition {
    /// All partitions in output order.
    pub const ALL: [Partition; 3] = [Partition::Train, Partition::Val, Partition::Test];

    /// Directory / manifest name of the partition.
    pub fn as_str(&self) -> &'static str {
        match self {
            Partition::Train => "train",
            Partition::Val => "val",
            Partition::Test => "test",
        }
    }

    fn ratio(&self, config: &SplitConfig) -> f64 {
        match self {
            Partition::Train => config.train_ratio,
            Partition::Val => config.val_ratio,
            Partition::Test => config.test_ratio,
        }
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Number of tiles in each partition.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PartitionSizes {
    pub train: usize,
    pub val: usize,
    pub test: usize,
}

impl PartitionSizes {
    pub fn get(&self, partition: Partition) -> usize {
        match partition {
            Partition::Train => self.train,
            Partition::Val => self.val,
            Partition::Test => self.test,
        }
    }

    pub fn total(&self) -> usize {
        self.train + self.val + self.test
    }
}

/// Partition sizes for a pool of `n` tiles; the remainder goes to train.
pub fn partition_sizes(n: usize, config: &SplitConfig) -> PartitionSizes {
    let floor = |ratio: f64| ((n as f64 * ratio + FLOOR_EPSILON).floor() as usize).min(n);
    let val = floor(config.val_ratio);
    let test = floor(config.test_ratio).min(n - val);
    PartitionSizes {
        train: n - val - test,
        val,
        test,
    }
}

/// Where one pooled tile ends up.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct SplitAssignment {
    /// Index of the tile in the pool.
    pub index: usize,
    pub partition: Partition,
    /// 1-based position within the partition.
    pub sequence: usize,
}

impl SplitAssignment {
    /// Zero-padded output name, e.g. `00001`.
    pub fn name(&self) -> String {
        format!("{:05}", self.sequence)
    }
}

/// Assigns every index of a pool of `pool_len` tiles to a partition.
///
/// The result is in permutation order: all train assignments, then val,
/// then test, each numbered from 1. It depends only on `pool_len` and
/// the configured seed and ratios.
pub fn assign_splits(
    pool_len: usize,
    config: &SplitConfig,
) -> Result<Vec<SplitAssignment>, SegtilerError> {
    config.validate()?;
    if pool_len == 0 {
        return Err(SegtilerError::EmptyPool);
    }

    let mut order: Vec<usize> = (0..pool_len).collect();
    let mut rng = StdRng::seed_from_u64(config.seed);
    order.shuffle(&mut rng);

    let sizes = partition_sizes(pool_len, config);
    let mut assignments = Vec::with_capacity(pool_len);
    let mut rest = order.as_slice();
    for partition in Partition::ALL {
        let (run, tail) = rest.split_at(sizes.get(partition));
        rest = tail;
        assignments.extend(run.iter().enumerate().map(|(i, &index)| SplitAssignment {
            index,
            partition,
            sequence: i + 1,
        }));
    }

    Ok(assignments)
}

/// A tile with its final partition and name.
#[derive(Clone, Debug)]
pub struct SplitTile {
    pub assignment: SplitAssignment,
    pub tile: Tile,
}

impl SplitTile {
    pub fn name(&self) -> String {
        self.assignment.name()
    }
}

/// The partitioned dataset, ordered train, val, test.
#[derive(Clone, Debug)]
pub struct SplitDataset {
    pub tiles: Vec<SplitTile>,
    pub stats: SplitStats,
}

impl SplitDataset {
    /// Tiles of one partition in name order.
    pub fn partition(&self, partition: Partition) -> impl Iterator<Item = &SplitTile> {
        self.tiles
            .iter()
            .filter(move |t| t.assignment.partition == partition)
    }
}

/// Shuffles and partitions the full pool.
///
/// Must only be called once every document has been aggregated: sizes and
/// the permutation depend on the whole pool.
pub fn split_pool(pool: Vec<Tile>, config: &SplitConfig) -> Result<SplitDataset, SegtilerError> {
    let assignments = assign_splits(pool.len(), config)?;
    let sizes = partition_sizes(pool.len(), config);

    for partition in Partition::ALL {
        if partition.ratio(config) == 0.0 {
            warn!(partition = %partition, "split ratio is zero; partition will be empty");
        }
    }

    let mut slots: Vec<Option<Tile>> = pool.into_iter().map(Some).collect();
    let tiles: Vec<SplitTile> = assignments
        .into_iter()
        .filter_map(|assignment| {
            slots[assignment.index]
                .take()
                .map(|tile| SplitTile { assignment, tile })
        })
        .collect();

    let stats = SplitStats::new(config, sizes, &tiles);
    for entry in &stats.partitions {
        info!(
            partition = %entry.partition,
            tiles = entry.count,
            "expected {:.1}%, actual {:.1}%",
            entry.expected_ratio * 100.0,
            entry.actual_ratio * 100.0
        );
    }

    Ok(SplitDataset { tiles, stats })
}
