use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::{
    policy::{
        MAX_DURATION_SEC, MAX_FRAMES, MAX_LOOPS, MIN_DURATION_SEC, MIN_FRAMES, MIN_LOOPS,
        SIZE_LIMIT,
    },
    quality::{AspectMode, QualityTier},
    ApngFitError, Result,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub frame_count: usize,
    pub duration_sec: f32,
    pub loops: u32,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            frame_count: MIN_FRAMES,
            duration_sec: 2.0,
            loops: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodeConfig {
    pub quality: QualityTier,
    pub min_palette: u16,
    /// Lowest posterization bit depth allowed; `"none"` disables posterization.
    #[serde(with = "posterize_limit_repr")]
    pub posterize_limit: Option<u8>,
    pub size_limit_bytes: usize,
    pub pacing_ms: u64,
}

impl Default for EncodeConfig {
    fn default() -> Self {
        Self {
            quality: QualityTier::High,
            min_palette: 4,
            posterize_limit: Some(4),
            size_limit_bytes: SIZE_LIMIT,
            pacing_ms: 0,
        }
    }
}

/// Written as a bit depth or the keyword `"none"`, so a disabled limit survives a save.
mod posterize_limit_repr {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    const DISABLED: &str = "none";

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Bits(u8),
        Keyword(String),
    }

    pub fn serialize<S: Serializer>(limit: &Option<u8>, serializer: S) -> Result<S::Ok, S::Error> {
        match limit {
            Some(bits) => serializer.serialize_u8(*bits),
            None => serializer.serialize_str(DISABLED),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u8>, D::Error> {
        match Repr::deserialize(deserializer)? {
            Repr::Bits(bits) => Ok(Some(bits)),
            Repr::Keyword(word) if word.eq_ignore_ascii_case(DISABLED) => Ok(None),
            Repr::Keyword(other) => Err(D::Error::custom(format!(
                "posterize_limit must be a bit depth or \"{DISABLED}\", got \"{other}\""
            ))),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RasterConfig {
    pub aspect: AspectMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpsConfig {
    pub log_level: String,
    pub output_dir: String,
}

impl Default for OpsConfig {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
            output_dir: ".".into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ApngFitConfig {
    pub timing: TimingConfig,
    pub encode: EncodeConfig,
    pub raster: RasterConfig,
    pub ops: OpsConfig,
}

impl ApngFitConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref).map_err(|err| {
            ApngFitError::Configuration(format!(
                "unable to read config file {}: {err}",
                path_ref.display()
            ))
        })?;
        toml::from_str(&contents).map_err(|err| {
            ApngFitError::Configuration(format!(
                "failed to parse config file {}: {err}",
                path_ref.display()
            ))
        })
    }

    /// Persist the current settings so the next run starts from them.
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path_ref = path.as_ref();
        let doc = toml::to_string_pretty(self).map_err(|err| {
            ApngFitError::Configuration(format!("failed to serialize config: {err}"))
        })?;
        fs::write(path_ref, doc).map_err(|err| {
            ApngFitError::Configuration(format!(
                "unable to write config file {}: {err}",
                path_ref.display()
            ))
        })
    }

    pub fn validate(&self) -> Result<()> {
        if !(MIN_FRAMES..=MAX_FRAMES).contains(&self.timing.frame_count) {
            return Err(ApngFitError::Configuration(format!(
                "timing.frame_count must be between {MIN_FRAMES} and {MAX_FRAMES}"
            )));
        }
        if !(MIN_DURATION_SEC..=MAX_DURATION_SEC).contains(&self.timing.duration_sec) {
            return Err(ApngFitError::Configuration(format!(
                "timing.duration_sec must be between {MIN_DURATION_SEC} and {MAX_DURATION_SEC}"
            )));
        }
        if !(MIN_LOOPS..=MAX_LOOPS).contains(&self.timing.loops) {
            return Err(ApngFitError::Configuration(format!(
                "timing.loops must be between {MIN_LOOPS} and {MAX_LOOPS}"
            )));
        }
        if !(1..=256).contains(&self.encode.min_palette) {
            return Err(ApngFitError::Configuration(
                "encode.min_palette must be between 1 and 256".into(),
            ));
        }
        if let Some(bits) = self.encode.posterize_limit {
            if !(4..=6).contains(&bits) {
                return Err(ApngFitError::Configuration(
                    "encode.posterize_limit must be 4, 5 or 6 when set".into(),
                ));
            }
        }
        if self.encode.size_limit_bytes == 0 {
            return Err(ApngFitError::Configuration(
                "encode.size_limit_bytes must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}
