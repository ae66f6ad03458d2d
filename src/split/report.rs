//! Split statistics: expected vs actual partition shares.

use serde::Serialize;
use std::fmt;

use super::{Partition, PartitionSizes, SplitTile};
use crate::config::SplitConfig;

/// Number of sample names listed per partition.
const SAMPLE_NAMES: usize = 3;

/// Statistics for one partition.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PartitionStats {
    pub partition: Partition,
    pub count: usize,
    pub expected_ratio: f64,
    pub actual_ratio: f64,
    /// First few output names, for eyeballing.
    pub sample_names: Vec<String>,
}

/// Statistics for the whole split.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SplitStats {
    pub seed: u64,
    pub total: usize,
    pub partitions: Vec<PartitionStats>,
}

impl SplitStats {
    pub(super) fn new(config: &SplitConfig, sizes: PartitionSizes, tiles: &[SplitTile]) -> Self {
        let total = sizes.total();
        let partitions = Partition::ALL
            .into_iter()
            .map(|partition| {
                let count = sizes.get(partition);
                PartitionStats {
                    partition,
                    count,
                    expected_ratio: partition.ratio(config),
                    actual_ratio: if total == 0 {
                        0.0
                    } else {
                        count as f64 / total as f64
                    },
                    sample_names: tiles
                        .iter()
                        .filter(|t| t.assignment.partition == partition)
                        .take(SAMPLE_NAMES)
                        .map(SplitTile::name)
                        .collect(),
                }
            })
            .collect();

        Self {
            seed: config.seed,
            total,
            partitions,
        }
    }

    /// Tiles assigned to `partition`.
    pub fn count(&self, partition: Partition) -> usize {
        self.partitions
            .iter()
            .find(|p| p.partition == partition)
            .map_or(0, |p| p.count)
    }
}

impl fmt::Display for SplitStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Split of {} tiles (seed {}):", self.total, self.seed)?;
        for p in &self.partitions {
            write!(
                f,
                "  {:<5} {:>6} tiles  expected {:>5.1}%  actual {:>5.1}%",
                p.partition.as_str(),
                p.count,
                p.expected_ratio * 100.0,
                p.actual_ratio * 100.0
            )?;
            if !p.sample_names.is_empty() {
                write!(f, "  [{}", p.sample_names.join(", "))?;
                if p.count > p.sample_names.len() {
                    write!(f, ", ...")?;
                }
                write!(f, "]")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
