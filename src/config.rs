use crate::alphabet::Alphabet;
use crate::{CodecError, Result, DEFAULT_ASCII_RAMP, DEFAULT_FEATURE_SYMBOLS};
use log::debug;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Named tuning presets
#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Preset {
    /// Balanced settings
    Default,
    /// Fewer corrections, gentler hysteresis
    HighQuality,
    /// Aggressive cleanup for smaller files
    HighCompression,
    /// Quantize and compress only
    Fast,
}

/// Which background the output is drawn against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Polarity {
    /// Light symbols on a dark background
    #[default]
    Dark,
    /// Dark symbols on a light background
    Light,
}

/// Symbol sets for both background polarities
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlphabetConfig {
    /// Symbols ordered dark to light, used on dark backgrounds
    pub dark_symbols: String,
    /// Symbols for light backgrounds; the reverse of `dark_symbols` when unset
    pub light_symbols: Option<String>,
    pub polarity: Polarity,
}

impl Default for AlphabetConfig {
    fn default() -> Self {
        Self {
            dark_symbols: DEFAULT_ASCII_RAMP.iter().collect(),
            light_symbols: None,
            polarity: Polarity::Dark,
        }
    }
}

impl AlphabetConfig {
    /// Alphabet for the configured polarity
    pub fn alphabet(&self) -> Result<Alphabet> {
        let dark = Alphabet::from_str_symbols(&self.dark_symbols)?;
        match self.polarity {
            Polarity::Dark => Ok(dark),
            Polarity::Light => match &self.light_symbols {
                Some(light) => Alphabet::from_str_symbols(light),
                None => Ok(dark.reversed()),
            },
        }
    }
}

/// Boundary hysteresis applied by the quantizer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HysteresisConfig {
    pub enabled: bool,
    /// Distance in pixel units from a symbol boundary inside which the
    /// previous symbol is kept
    pub threshold: u8,
}

impl Default for HysteresisConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: 8,
        }
    }
}

/// Toggles and thresholds for the four cleanup stages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanupConfig {
    pub enable_isolated_replacement: bool,
    pub enable_run_consolidation: bool,
    pub enable_temporal_smoothing: bool,
    pub enable_spatial_coherence: bool,
    /// Minimum share of the neighbourhood a symbol needs to count as fitting (0-1)
    pub spatial_coherence_threshold: f64,
    /// Majority share at which a neighbourhood counts as uniform (0-1)
    pub spatial_uniformity_threshold: f64,
    /// Keep feature symbols even when they do not fit their neighbourhood
    pub preserve_features: bool,
    pub feature_symbols: String,
    /// Log per-stage percentages at info level
    pub verbose: bool,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            enable_isolated_replacement: true,
            enable_run_consolidation: true,
            enable_temporal_smoothing: true,
            enable_spatial_coherence: true,
            spatial_coherence_threshold: 0.15,
            spatial_uniformity_threshold: 0.7,
            preserve_features: true,
            feature_symbols: DEFAULT_FEATURE_SYMBOLS.iter().collect(),
            verbose: false,
        }
    }
}

impl CleanupConfig {
    /// Every stage switched off
    pub fn disabled() -> Self {
        Self {
            enable_isolated_replacement: false,
            enable_run_consolidation: false,
            enable_temporal_smoothing: false,
            enable_spatial_coherence: false,
            ..Default::default()
        }
    }

    pub fn is_feature_symbol(&self, symbol: char) -> bool {
        self.preserve_features && self.feature_symbols.contains(symbol)
    }
}

/// General-purpose compressor applied to each frame's segment stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum PayloadFormat {
    /// Bare LZ4 block; the frame's cell count bounds the output
    #[default]
    Lz4Block,
    /// Self-delimiting LZ4 frame format
    Lz4Frame,
    /// Legacy `.lzma` stream, honours `level`
    Lzma,
    /// `.xz` stream with a CRC64 check, honours `level`
    Xz,
    /// No compression
    Stored,
}

impl PayloadFormat {
    /// Algorithm id written to container metadata
    pub fn algorithm_id(&self) -> &'static str {
        match self {
            PayloadFormat::Lz4Block => "rle-lz4",
            PayloadFormat::Lz4Frame => "rle-lz4-frame",
            PayloadFormat::Lzma => "rle-lzma",
            PayloadFormat::Xz => "rle-xz",
            PayloadFormat::Stored => "rle-stored",
        }
    }

    pub fn from_algorithm_id(id: &str) -> Option<Self> {
        match id {
            "rle-lz4" => Some(PayloadFormat::Lz4Block),
            "rle-lz4-frame" => Some(PayloadFormat::Lz4Frame),
            "rle-lzma" => Some(PayloadFormat::Lzma),
            "rle-xz" => Some(PayloadFormat::Xz),
            "rle-stored" => Some(PayloadFormat::Stored),
            _ => None,
        }
    }

    /// Whether `level` changes the payload
    pub fn uses_level(&self) -> bool {
        matches!(self, PayloadFormat::Lzma | PayloadFormat::Xz)
    }
}

/// Highest LZMA preset level
pub const MAX_COMPRESSION_LEVEL: u32 = 9;

/// Payload compression and the ratios used to grade a clip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressionConfig {
    pub format: PayloadFormat,
    /// Preset level, 0 (fast) to 9 (smallest); LZ4 formats ignore it
    pub level: u32,
    pub target_ratio: f64,
    pub excellent_ratio: f64,
    pub good_ratio: f64,
    pub acceptable_ratio: f64,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            format: PayloadFormat::Lz4Block,
            level: 6,
            target_ratio: 10.0,
            excellent_ratio: 10.0,
            good_ratio: 7.0,
            acceptable_ratio: 5.0,
        }
    }
}

/// Complete codec configuration, threaded explicitly through every stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    pub description: String,
    pub alphabet: AlphabetConfig,
    pub hysteresis: HysteresisConfig,
    pub cleanup: CleanupConfig,
    pub compression: CompressionConfig,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            description: "default configuration".to_string(),
            alphabet: AlphabetConfig::default(),
            hysteresis: HysteresisConfig::default(),
            cleanup: CleanupConfig::default(),
            compression: CompressionConfig::default(),
        }
    }
}

impl CodecConfig {
    /// Build one of the named presets
    pub fn from_preset(preset: Preset) -> Self {
        match preset {
            Preset::Default => Self::default(),
            Preset::HighQuality => Self {
                description: "high quality: preserve detail".to_string(),
                cleanup: CleanupConfig {
                    enable_isolated_replacement: false,
                    spatial_coherence_threshold: 0.1,
                    spatial_uniformity_threshold: 0.8,
                    ..Default::default()
                },
                ..Default::default()
            },
            Preset::HighCompression => Self {
                description: "high compression: aggressive cleanup".to_string(),
                cleanup: CleanupConfig {
                    spatial_coherence_threshold: 0.2,
                    spatial_uniformity_threshold: 0.6,
                    ..Default::default()
                },
                compression: CompressionConfig {
                    level: 9,
                    target_ratio: 15.0,
                    ..Default::default()
                },
                ..Default::default()
            },
            Preset::Fast => Self {
                description: "fast: skip the neighbourhood stages".to_string(),
                cleanup: CleanupConfig {
                    enable_temporal_smoothing: false,
                    enable_spatial_coherence: false,
                    ..Default::default()
                },
                compression: CompressionConfig {
                    level: 1,
                    target_ratio: 5.0,
                    ..Default::default()
                },
                ..Default::default()
            },
        }
    }

    /// List every problem with the configuration
    pub fn issues(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if let Err(e) = Alphabet::from_str_symbols(&self.alphabet.dark_symbols) {
            issues.push(format!("dark_symbols: {}", e));
        }
        if let Some(light) = &self.alphabet.light_symbols {
            if let Err(e) = Alphabet::from_str_symbols(light) {
                issues.push(format!("light_symbols: {}", e));
            }
            if light.chars().count() != self.alphabet.dark_symbols.chars().count() {
                issues.push("dark_symbols and light_symbols must be the same length".to_string());
            }
        }

        let cleanup = &self.cleanup;
        if !(0.0..=1.0).contains(&cleanup.spatial_coherence_threshold) {
            issues.push("spatial_coherence_threshold must be between 0 and 1".to_string());
        }
        if !(0.0..=1.0).contains(&cleanup.spatial_uniformity_threshold) {
            issues.push("spatial_uniformity_threshold must be between 0 and 1".to_string());
        }

        let compression = &self.compression;
        if compression.level > MAX_COMPRESSION_LEVEL {
            issues.push(format!(
                "level must be between 0 and {}, got {}",
                MAX_COMPRESSION_LEVEL, compression.level
            ));
        }
        for (name, value) in [
            ("target_ratio", compression.target_ratio),
            ("excellent_ratio", compression.excellent_ratio),
            ("good_ratio", compression.good_ratio),
            ("acceptable_ratio", compression.acceptable_ratio),
        ] {
            if value.is_nan() || value < 1.0 {
                issues.push(format!("{} must be >= 1", name));
            }
        }
        if compression.acceptable_ratio > compression.good_ratio
            || compression.good_ratio > compression.excellent_ratio
        {
            issues.push("ratios must satisfy acceptable <= good <= excellent".to_string());
        }

        issues
    }

    /// Check every range once; stages assume a validated config
    pub fn validate(&self) -> Result<()> {
        let issues = self.issues();
        if issues.is_empty() {
            Ok(())
        } else {
            Err(CodecError::InvalidConfig(issues.join("; ")))
        }
    }

    /// Load and validate a JSON configuration file
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let config: CodecConfig = serde_json::from_str(&text)?;
        config.validate()?;
        debug!("Loaded configuration '{}' from {}", config.description, path.display());
        Ok(config)
    }

    /// Save as pretty-printed JSON
    pub fn to_json_file(&self, path: &Path) -> Result<()> {
        let text = serde_json::to_string_pretty(self)?;
        fs::write(path, text)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_validate() {
        for preset in [
            Preset::Default,
            Preset::HighQuality,
            Preset::HighCompression,
            Preset::Fast,
        ] {
            let config = CodecConfig::from_preset(preset);
            assert!(config.validate().is_ok(), "{:?}: {:?}", preset, config.issues());
        }
    }

    #[test]
    fn test_threshold_ranges_checked() {
        let mut config = CodecConfig::default();
        config.cleanup.spatial_coherence_threshold = 1.5;
        config.cleanup.spatial_uniformity_threshold = -0.1;
        assert_eq!(config.issues().len(), 2);
        assert!(matches!(config.validate(), Err(CodecError::InvalidConfig(_))));
    }

    #[test]
    fn test_compression_level_range_checked() {
        let mut config = CodecConfig::default();
        config.compression.level = 9;
        assert!(config.validate().is_ok());

        config.compression.level = 10;
        let issues = config.issues();
        assert_eq!(issues.len(), 1);
        assert!(issues[0].contains("level"));
    }

    #[test]
    fn test_presets_set_levels() {
        assert_eq!(CodecConfig::from_preset(Preset::HighCompression).compression.level, 9);
        assert_eq!(CodecConfig::from_preset(Preset::Fast).compression.level, 1);
    }

    #[test]
    fn test_dual_polarity_lengths_must_match() {
        let mut config = CodecConfig::default();
        config.alphabet.light_symbols = Some("@%#".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_light_polarity_defaults_to_reversed() {
        let config = AlphabetConfig {
            polarity: Polarity::Light,
            ..Default::default()
        };
        let alphabet = config.alphabet().unwrap();
        assert_eq!(alphabet.symbol(0), '@');
    }

    #[test]
    fn test_json_roundtrip_with_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let config = CodecConfig::from_preset(Preset::HighCompression);
        config.to_json_file(&path).unwrap();
        assert_eq!(CodecConfig::from_json_file(&path).unwrap(), config);

        std::fs::write(&path, r#"{"hysteresis": {"threshold": 3}}"#).unwrap();
        let partial = CodecConfig::from_json_file(&path).unwrap();
        assert_eq!(partial.hysteresis.threshold, 3);
        assert!(partial.hysteresis.enabled);
        assert_eq!(partial.cleanup, CleanupConfig::default());
    }

    #[test]
    fn test_algorithm_ids_roundtrip() {
        for format in [
            PayloadFormat::Lz4Block,
            PayloadFormat::Lz4Frame,
            PayloadFormat::Lzma,
            PayloadFormat::Xz,
            PayloadFormat::Stored,
        ] {
            assert_eq!(PayloadFormat::from_algorithm_id(format.algorithm_id()), Some(format));
        }
        assert_eq!(PayloadFormat::from_algorithm_id("middle-out"), None);
    }
}
