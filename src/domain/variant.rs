use super::dimensions::Dimensions;
use super::filter::{Composition, FilterGraph};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Closed interval the brightness and contrast factors are drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PerturbationBand {
    min: f64,
    max: f64,
}

impl PerturbationBand {
    /// Returns `None` for an empty or non-finite interval.
    pub fn new(min: f64, max: f64) -> Option<Self> {
        if min.is_finite() && max.is_finite() && min <= max {
            Some(Self { min, max })
        } else {
            None
        }
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

impl Default for PerturbationBand {
    /// ±5% around neutral.
    fn default() -> Self {
        Self {
            min: 0.95,
            max: 1.05,
        }
    }
}

/// Color grading values applied to one variant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VariantParams {
    pub brightness: f64,
    pub contrast: f64,
}

/// Derive the color parameters of variant `index` from a batch seed.
///
/// Each index gets its own generator, so the values depend only on
/// `(index, seed)` and not on the order in which variants are planned.
pub fn derive_params(index: usize, seed: u64, band: &PerturbationBand) -> VariantParams {
    let mut rng = StdRng::seed_from_u64(mix_seed(seed, index as u64));
    VariantParams {
        brightness: rng.gen_range(band.min..=band.max),
        contrast: rng.gen_range(band.min..=band.max),
    }
}

// splitmix64 finalizer, spreads neighbouring indices over the seed space
fn mix_seed(seed: u64, index: u64) -> u64 {
    let mut z = seed ^ index.wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// File name of variant `index`, zero-based and never padded.
pub fn variant_file_name(index: usize) -> String {
    format!("video_{}.mp4", index)
}

pub fn variant_output_path(output_dir: &Path, index: usize) -> PathBuf {
    output_dir.join(variant_file_name(index))
}

/// Fully resolved description of one variant render.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderSpec {
    pub index: usize,
    pub source_path: PathBuf,
    pub watermark_path: PathBuf,
    pub output_path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub brightness: f64,
    pub contrast: f64,
    pub composition: Composition,
}

impl RenderSpec {
    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.width, self.height)
    }

    pub fn params(&self) -> VariantParams {
        VariantParams {
            brightness: self.brightness,
            contrast: self.contrast,
        }
    }

    pub fn filter_graph(&self) -> FilterGraph {
        self.composition.filter_graph(self.dimensions(), self.params())
    }
}
