#![allow(dead_code)]

use image::{Rgba, RgbaImage};
use std::fs;
use std::path::Path;

pub const RED: [u8; 4] = [255, 0, 0, 255];
pub const GREEN: [u8; 4] = [0, 255, 0, 255];
pub const CLEAR: [u8; 4] = [0, 0, 0, 0];

pub const CLASSES_YAML: &str = "\
background: { id: 0, name: background, color: [0, 0, 0], alpha_threshold: 128 }
classes:
  - { id: 1, name: text, color: [255, 0, 0] }
  - { id: 2, name: figure, color: [0, 255, 0] }
";

pub const BUILD_YAML: &str = "\
tiling:
  tile_size: 4
  overlap: 1
data_split:
  train_ratio: 0.8
  val_ratio: 0.1
  test_ratio: 0.1
  seed: 42
";

pub fn write_png(path: &Path, width: u32, height: u32, color: [u8; 4]) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent dir");
    }
    RgbaImage::from_pixel(width, height, Rgba(color))
        .save(path)
        .expect("write png file");
}

/// Writes a document directory with a gray source layer and the given
/// annotation layers, each filled with one color.
pub fn write_document(root: &Path, name: &str, width: u32, height: u32, layers: &[(&str, [u8; 4])]) {
    let dir = root.join(name);
    write_png(&dir.join("original.png"), width, height, [90, 90, 90, 255]);
    for (layer, color) in layers {
        write_png(&dir.join(format!("{}.png", layer)), width, height, *color);
    }
}

/// Writes the class table and build config, returning their paths.
pub fn write_configs(dir: &Path, build_yaml: &str) -> (std::path::PathBuf, std::path::PathBuf) {
    let config = dir.join("build_config.yaml");
    let classes = dir.join("classes.yaml");
    fs::write(&config, build_yaml).expect("write build config");
    fs::write(&classes, CLASSES_YAML).expect("write class table");
    (config, classes)
}

pub fn count_pngs(dir: &Path) -> usize {
    match fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(Result::ok)
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "png"))
            .count(),
        Err(_) => 0,
    }
}
