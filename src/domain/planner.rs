use super::dimensions::Dimensions;
use super::filter::Composition;
use super::variant::{derive_params, variant_output_path, PerturbationBand, RenderSpec};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Turns a variant index into a [`RenderSpec`]. Never touches the filesystem.
#[derive(Debug, Clone)]
pub struct VariantPlanner {
    source_path: PathBuf,
    watermark_path: PathBuf,
    output_dir: PathBuf,
    dimensions: Dimensions,
    seed: u64,
    band: PerturbationBand,
    composition: Composition,
}

impl VariantPlanner {
    pub fn new(
        source_path: &Path,
        watermark_path: &Path,
        output_dir: &Path,
        dimensions: Dimensions,
        seed: u64,
    ) -> Self {
        Self {
            source_path: source_path.to_path_buf(),
            watermark_path: watermark_path.to_path_buf(),
            output_dir: output_dir.to_path_buf(),
            dimensions,
            seed,
            band: PerturbationBand::default(),
            composition: Composition::default(),
        }
    }

    pub fn with_band(mut self, band: PerturbationBand) -> Self {
        self.band = band;
        self
    }

    pub fn with_composition(mut self, composition: Composition) -> Self {
        self.composition = composition;
        self
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn plan(&self, index: usize) -> RenderSpec {
        let params = derive_params(index, self.seed, &self.band);
        RenderSpec {
            index,
            source_path: self.source_path.clone(),
            watermark_path: self.watermark_path.clone(),
            output_path: variant_output_path(&self.output_dir, index),
            width: self.dimensions.width,
            height: self.dimensions.height,
            brightness: params.brightness,
            contrast: params.contrast,
            composition: self.composition.clone(),
        }
    }

    /// Specs for indices `0..count`, in index order.
    pub fn plan_batch(&self, count: usize) -> Vec<RenderSpec> {
        (0..count).map(|index| self.plan(index)).collect()
    }
}

/// Seed used when none is configured.
pub fn wall_clock_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_nanos() as u64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn planner(seed: u64) -> VariantPlanner {
        VariantPlanner::new(
            Path::new("uploads/source.mp4"),
            Path::new("uploads/logo.png"),
            Path::new("static/videos"),
            Dimensions::new(1920, 1080),
            seed,
        )
    }

    #[test]
    fn test_plan_fills_every_field() {
        let spec = planner(11).plan(4);
        assert_eq!(spec.index, 4);
        assert_eq!(spec.source_path, PathBuf::from("uploads/source.mp4"));
        assert_eq!(spec.watermark_path, PathBuf::from("uploads/logo.png"));
        assert_eq!(spec.output_path, PathBuf::from("static/videos/video_4.mp4"));
        assert_eq!((spec.width, spec.height), (1920, 1080));
        assert!(PerturbationBand::default().contains(spec.brightness));
        assert!(PerturbationBand::default().contains(spec.contrast));
    }

    #[test]
    fn test_plan_batch_assigns_dense_indices() {
        let specs = planner(1).plan_batch(5);
        let indices: Vec<usize> = specs.iter().map(|spec| spec.index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3, 4]);
        assert!(planner(1).plan_batch(0).is_empty());
    }

    #[test]
    fn test_same_seed_plans_identical_batches() {
        assert_eq!(planner(77).plan_batch(3), planner(77).plan_batch(3));
        assert_ne!(planner(77).plan_batch(3), planner(78).plan_batch(3));
    }

    #[test]
    fn test_custom_band_and_composition_are_carried() {
        let band = PerturbationBand::new(1.0, 1.0).unwrap();
        let composition = Composition {
            colorkey: None,
            ..Composition::default()
        };
        let spec = planner(5)
            .with_band(band)
            .with_composition(composition.clone())
            .plan(0);
        assert_eq!(spec.brightness, 1.0);
        assert_eq!(spec.composition, composition);
    }
}
