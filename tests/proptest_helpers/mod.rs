#![allow(dead_code)]

use ndarray::{Array2, Array3};
use proptest::prelude::*;
use proptest::test_runner::{Config as ProptestConfig, FileFailurePersistence};

use segtiler::config::SplitConfig;
use segtiler::raster::ClassId;

pub fn proptest_config() -> ProptestConfig {
    let cases = std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(64);

    let mut config = ProptestConfig::with_failure_persistence(FileFailurePersistence::WithSource(
        "proptest-regressions",
    ));
    config.cases = cases;
    config.max_shrink_iters = 1024;
    config
}

/// `(tile_size, overlap)` pairs with a positive stride.
pub fn arb_tiling() -> impl Strategy<Value = (usize, usize)> {
    (2usize..=12).prop_flat_map(|tile| (Just(tile), 0..=(tile - 1) / 2))
}

/// A random image/mask pair of the given size with class ids below `classes`.
pub fn arb_pair(
    width: usize,
    height: usize,
    classes: u8,
) -> impl Strategy<Value = (Array3<u8>, Array2<ClassId>)> {
    (
        prop::collection::vec(any::<u8>(), width * height * 4),
        prop::collection::vec(0..classes, width * height),
    )
        .prop_map(move |(pixels, ids)| {
            let image = Array3::from_shape_vec((height, width, 4), pixels)
                .expect("pixel count matches shape");
            let mask = Array2::from_shape_vec((height, width), ids)
                .expect("id count matches shape")
                .mapv(ClassId);
            (image, mask)
        })
}

/// Split ratios that sum to exactly one, from two cut points in per-mille.
pub fn arb_split_config() -> impl Strategy<Value = SplitConfig> {
    (0u32..=1000, 0u32..=1000, any::<u64>()).prop_map(|(a, b, seed)| {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        SplitConfig {
            train_ratio: f64::from(lo) / 1000.0,
            val_ratio: f64::from(hi - lo) / 1000.0,
            test_ratio: f64::from(1000 - hi) / 1000.0,
            seed,
        }
    })
}
