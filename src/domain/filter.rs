//! Composition policy and the ffmpeg filter graph that implements it.
//!
//! Every variant is built the same way:
//! 1. a solid canvas the size of the probed source,
//! 2. the source scaled to fit (aspect preserved, never cropped) and centered on it,
//! 3. the watermark scaled to a fixed box, optionally with near-white keyed out,
//! 4. the watermark overlaid on the bottom-right corner, inset by a margin,
//! 5. brightness/contrast grading applied last, to the whole composite.
//!
//! The canvas is rounded down to even sides so yuv420p output always encodes.
//! Brightness factors are centered on 1.0 like contrast, but ffmpeg's `eq`
//! takes brightness as an offset around 0.0, so the factor is shifted by -1.

use super::dimensions::Dimensions;
use super::variant::VariantParams;
use serde::Serialize;
use std::fmt;

/// Label of the final video pad, mapped to the output file.
pub const OUTPUT_LABEL: &str = "out";

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ColorKey {
    /// 0xRRGGBB
    pub color: u32,
    pub similarity: f32,
    pub blend: f32,
}

impl Default for ColorKey {
    fn default() -> Self {
        Self {
            color: 0xFF_FF_FF,
            similarity: 0.3,
            blend: 0.1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Composition {
    pub canvas_color: String,
    pub watermark_width: u32,
    pub watermark_height: u32,
    /// Distance between the watermark and the right/bottom edges, in pixels.
    pub margin: u32,
    pub colorkey: Option<ColorKey>,
}

impl Default for Composition {
    fn default() -> Self {
        Self {
            canvas_color: String::from("white"),
            watermark_width: 150,
            watermark_height: 84,
            margin: 10,
            colorkey: Some(ColorKey::default()),
        }
    }
}

impl Composition {
    pub fn filter_graph(&self, canvas: Dimensions, params: VariantParams) -> FilterGraph {
        let Dimensions { width, height } = canvas.rounded_to_even();

        let mut chains = vec![
            format!("color=c={}:s={}x{}[bg]", self.canvas_color, width, height),
            format!(
                "[0:v]scale={}:{}:force_original_aspect_ratio=decrease[video]",
                width, height
            ),
            // the canvas never ends on its own, so the source decides the length
            "[bg][video]overlay=x=(W-w)/2:y=(H-h)/2:shortest=1[with_bg]".to_string(),
        ];

        let watermark_label = match &self.colorkey {
            Some(key) => {
                chains.push(format!(
                    "[1:v]scale={}:{}[wm]",
                    self.watermark_width, self.watermark_height
                ));
                chains.push(format!(
                    "[wm]colorkey=0x{:06X}:{}:{}[wmclean]",
                    key.color, key.similarity, key.blend
                ));
                "wmclean"
            }
            None => {
                chains.push(format!(
                    "[1:v]scale={}:{}[wm]",
                    self.watermark_width, self.watermark_height
                ));
                "wm"
            }
        };

        chains.push(format!(
            "[with_bg][{}]overlay=W-w-{}:H-h-{},eq=brightness={:.4}:contrast={:.4}[{}]",
            watermark_label,
            self.margin,
            self.margin,
            brightness_offset(params.brightness),
            params.contrast,
            OUTPUT_LABEL
        ));

        FilterGraph(chains.join(";"))
    }
}

/// `eq=brightness=` value for a multiplicative factor; 1.0 leaves the image unchanged.
pub fn brightness_offset(factor: f64) -> f64 {
    factor - 1.0
}

/// A complete `-filter_complex` expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterGraph(String);

impl FilterGraph {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn output_pad(&self) -> String {
        format!("[{}]", OUTPUT_LABEL)
    }
}

impl fmt::Display for FilterGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> VariantParams {
        VariantParams {
            brightness: 1.02,
            contrast: 0.97,
        }
    }

    #[test]
    fn test_default_graph_matches_composition_policy() {
        let graph = Composition::default().filter_graph(Dimensions::new(1920, 1080), params());
        assert_eq!(
            graph.as_str(),
            "color=c=white:s=1920x1080[bg];\
             [0:v]scale=1920:1080:force_original_aspect_ratio=decrease[video];\
             [bg][video]overlay=x=(W-w)/2:y=(H-h)/2:shortest=1[with_bg];\
             [1:v]scale=150:84[wm];\
             [wm]colorkey=0xFFFFFF:0.3:0.1[wmclean];\
             [with_bg][wmclean]overlay=W-w-10:H-h-10,eq=brightness=0.0200:contrast=0.9700[out]"
        );
        assert_eq!(graph.output_pad(), "[out]");
    }

    #[test]
    fn test_grading_is_the_last_step() {
        let graph = Composition::default().filter_graph(Dimensions::new(640, 360), params());
        let last_chain = graph.as_str().rsplit(';').next().unwrap();
        assert!(last_chain.contains("overlay=W-w-10:H-h-10,eq="));
        assert!(last_chain.ends_with("[out]"));
    }

    #[test]
    fn test_graph_without_colorkey_uses_scaled_watermark_directly() {
        let composition = Composition {
            colorkey: None,
            ..Composition::default()
        };
        let graph = composition.filter_graph(Dimensions::new(640, 360), params());
        assert!(!graph.as_str().contains("colorkey"));
        assert!(graph.as_str().contains("[with_bg][wm]overlay=W-w-10:H-h-10"));
    }

    #[test]
    fn test_custom_canvas_and_margin() {
        let composition = Composition {
            canvas_color: String::from("black"),
            margin: 24,
            ..Composition::default()
        };
        let graph = composition.filter_graph(Dimensions::new(1080, 1920), params());
        assert!(graph.as_str().starts_with("color=c=black:s=1080x1920[bg]"));
        assert!(graph.as_str().contains("overlay=W-w-24:H-h-24"));
    }

    #[test]
    fn test_brightness_is_a_small_offset_around_zero() {
        let dark = VariantParams {
            brightness: 0.95,
            contrast: 1.0,
        };
        let graph = Composition::default().filter_graph(Dimensions::new(640, 360), dark);
        assert!(graph.as_str().contains("eq=brightness=-0.0500:contrast=1.0000[out]"));

        let neutral = VariantParams {
            brightness: 1.0,
            contrast: 1.0,
        };
        let graph = Composition::default().filter_graph(Dimensions::new(640, 360), neutral);
        assert!(graph.as_str().contains("eq=brightness=0.0000:"));
    }

    #[test]
    fn test_default_band_stays_within_five_percent_offset() {
        let band = crate::domain::variant::PerturbationBand::default();
        for index in 0..200 {
            let params = crate::domain::variant::derive_params(index, 3, &band);
            assert!(brightness_offset(params.brightness).abs() <= 0.05 + f64::EPSILON);
        }
    }

    #[test]
    fn test_odd_source_size_gets_even_canvas() {
        let graph = Composition::default().filter_graph(Dimensions::new(641, 361), params());
        assert!(graph.as_str().starts_with("color=c=white:s=640x360[bg]"));
        assert!(graph.as_str().contains("[0:v]scale=640:360:force_original_aspect_ratio=decrease"));
    }
}
