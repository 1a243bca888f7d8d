use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{
    policy::{PALETTE_CANDIDATES, POSTERIZE_DEPTHS},
    ApngFitError,
};

/// Requested output fidelity. Each tier owns an ordered palette ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityTier {
    #[default]
    High,
    Medium,
    Low,
}

impl QualityTier {
    pub fn palette_ladder(self) -> &'static [u16] {
        match self {
            QualityTier::High => &[256, 128, 64],
            QualityTier::Medium => &[128, 64, 32],
            QualityTier::Low => &[64, 32, 16, 8, 4],
        }
    }
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            QualityTier::High => "high",
            QualityTier::Medium => "medium",
            QualityTier::Low => "low",
        };
        f.write_str(label)
    }
}

impl FromStr for QualityTier {
    type Err = ApngFitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" => Ok(QualityTier::High),
            "medium" => Ok(QualityTier::Medium),
            "low" => Ok(QualityTier::Low),
            other => Err(ApngFitError::Configuration(format!(
                "unknown quality tier '{other}' (expected high, medium or low)"
            ))),
        }
    }
}

/// How a source image is scaled onto the fixed canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AspectMode {
    #[default]
    Crop,
    Fit,
    Stretch,
}

impl FromStr for AspectMode {
    type Err = ApngFitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "crop" => Ok(AspectMode::Crop),
            "fit" => Ok(AspectMode::Fit),
            "stretch" => Ok(AspectMode::Stretch),
            other => Err(ApngFitError::Configuration(format!(
                "unknown aspect mode '{other}' (expected crop, fit or stretch)"
            ))),
        }
    }
}

/// Palette sizes at or above the floor, most colours first.
pub fn allowed_palettes(min_palette: u16) -> Vec<u16> {
    PALETTE_CANDIDATES
        .iter()
        .copied()
        .filter(|&size| size >= min_palette)
        .collect()
}

/// Posterization depths permitted by the floor, mildest first. `None` disables posterization.
pub fn allowed_depths(posterize_limit: Option<u8>) -> Vec<u8> {
    match posterize_limit {
        Some(limit) => POSTERIZE_DEPTHS
            .iter()
            .copied()
            .filter(|&bits| bits >= limit)
            .collect(),
        None => Vec::new(),
    }
}
