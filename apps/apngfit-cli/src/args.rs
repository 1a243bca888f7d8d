use std::path::PathBuf;

use apngfit_types::{
    config::ApngFitConfig,
    quality::{AspectMode, QualityTier},
};
use clap::Parser;

/// Build a size-budgeted animated PNG from still images.
#[derive(Debug, Parser)]
#[command(name = "apngfit", version)]
pub struct Args {
    /// Source images (jpg, jpeg, png, gif, webp).
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// TOML config file; falls back to $APNGFIT_CONFIG, then ./apngfit.toml.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Requested sequence length (5-20); snaps to whole cycles of the inputs.
    #[arg(long)]
    pub frames: Option<usize>,

    /// Total animation duration in seconds (1-4).
    #[arg(long)]
    pub duration: Option<f32>,

    /// Number of plays (1-4).
    #[arg(long)]
    pub loops: Option<u32>,

    #[arg(long)]
    pub aspect: Option<AspectMode>,

    #[arg(long)]
    pub quality: Option<QualityTier>,

    /// Smallest palette the search may use.
    #[arg(long)]
    pub min_palette: Option<u16>,

    /// Most aggressive posterization depth in bits (4-6), or `none`.
    #[arg(long, value_parser = parse_posterize_limit)]
    pub posterize_limit: Option<PosterizeLimit>,

    /// Output budget in bytes.
    #[arg(long)]
    pub size_limit: Option<usize>,

    /// Output file, or a directory to place a suggested file name in.
    #[arg(long, short)]
    pub output: Option<PathBuf>,

    /// Write the artifact even when it misses the budget.
    #[arg(long)]
    pub keep_oversize: bool,

    /// Persist the resolved settings back to the config file.
    #[arg(long)]
    pub save_config: bool,

    /// Write the attempt log as JSON.
    #[arg(long)]
    pub report: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PosterizeLimit(pub Option<u8>);

fn parse_posterize_limit(raw: &str) -> Result<PosterizeLimit, String> {
    if raw.eq_ignore_ascii_case("none") {
        return Ok(PosterizeLimit(None));
    }
    raw.parse::<u8>()
        .map(|bits| PosterizeLimit(Some(bits)))
        .map_err(|_| format!("expected 4, 5, 6 or none, got '{raw}'"))
}

impl Args {
    /// Command-line values win over the file.
    pub fn apply(&self, config: &mut ApngFitConfig) {
        if let Some(frames) = self.frames {
            config.timing.frame_count = frames;
        }
        if let Some(duration) = self.duration {
            config.timing.duration_sec = duration;
        }
        if let Some(loops) = self.loops {
            config.timing.loops = loops;
        }
        if let Some(aspect) = self.aspect {
            config.raster.aspect = aspect;
        }
        if let Some(quality) = self.quality {
            config.encode.quality = quality;
        }
        if let Some(min_palette) = self.min_palette {
            config.encode.min_palette = min_palette;
        }
        if let Some(PosterizeLimit(limit)) = self.posterize_limit {
            config.encode.posterize_limit = limit;
        }
        if let Some(size_limit) = self.size_limit {
            config.encode.size_limit_bytes = size_limit;
        }
    }
}
