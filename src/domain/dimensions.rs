use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Pixel size of the first video stream of a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// 4:2:0 encoders need both sides even.
    pub fn is_even(&self) -> bool {
        self.width % 2 == 0 && self.height % 2 == 0
    }

    /// Largest even size that fits inside this one, at least 2x2.
    pub fn rounded_to_even(&self) -> Self {
        Self {
            width: (self.width & !1).max(2),
            height: (self.height & !1).max(2),
        }
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("failed to start media inspection tool: {0}")]
    Spawn(String),
    #[error("media inspection tool exited with {status:?}: {stderr}")]
    ToolFailed { status: Option<i32>, stderr: String },
    #[error("could not read dimensions from inspection output {output:?}")]
    Unparsable { output: String },
}

/// Parse `width,height` as printed by `ffprobe -of csv=p=0`.
///
/// Only the first non-empty line is considered. Both values must be present
/// and non-zero, otherwise nothing is returned.
pub fn parse_dimensions(stdout: &str) -> Result<Dimensions, ProbeError> {
    let unparsable = || ProbeError::Unparsable {
        output: stdout.trim().to_string(),
    };

    let line = stdout
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .ok_or_else(unparsable)?;

    // Some containers make ffprobe emit a dangling separator.
    let fields: Vec<&str> = line.trim_end_matches(',').split(',').map(str::trim).collect();
    let [width, height] = fields.as_slice() else {
        return Err(unparsable());
    };

    let width: u32 = width.parse().map_err(|_| unparsable())?;
    let height: u32 = height.parse().map_err(|_| unparsable())?;
    if width == 0 || height == 0 {
        return Err(unparsable());
    }

    Ok(Dimensions { width, height })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_csv() {
        let dims = parse_dimensions("1920,1080\n").unwrap();
        assert_eq!(dims, Dimensions::new(1920, 1080));
    }

    #[test]
    fn test_parse_tolerates_trailing_separator_and_blank_lines() {
        let dims = parse_dimensions("\n  720,1280,\n").unwrap();
        assert_eq!(dims, Dimensions::new(720, 1280));
    }

    #[test]
    fn test_parse_rejects_single_value() {
        let result = parse_dimensions("1920\n");
        assert!(matches!(result, Err(ProbeError::Unparsable { .. })));
    }

    #[test]
    fn test_parse_rejects_extra_values() {
        assert!(parse_dimensions("1920,1080,25").is_err());
    }

    #[test]
    fn test_parse_rejects_non_numeric() {
        assert!(parse_dimensions("N/A,1080").is_err());
        assert!(parse_dimensions("1920,abc").is_err());
    }

    #[test]
    fn test_parse_rejects_zero_and_empty() {
        assert!(parse_dimensions("0,1080").is_err());
        assert!(parse_dimensions("").is_err());
        assert!(parse_dimensions("   \n").is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(Dimensions::new(640, 360).to_string(), "640x360");
    }

    #[test]
    fn test_rounded_to_even() {
        assert_eq!(Dimensions::new(1920, 1080).rounded_to_even(), Dimensions::new(1920, 1080));
        assert_eq!(Dimensions::new(641, 361).rounded_to_even(), Dimensions::new(640, 360));
        assert_eq!(Dimensions::new(1, 1).rounded_to_even(), Dimensions::new(2, 2));
        assert!(Dimensions::new(1280, 720).is_even());
        assert!(!Dimensions::new(1280, 719).is_even());
    }
}
