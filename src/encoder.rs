//! Clip encoding: quantize, clean up, compress, and package.

use crate::alphabet::Alphabet;
use crate::cleanup::{CleanupPipeline, CleanupReport};
use crate::compressor::{ClipStatistics, FrameCompressor};
use crate::config::CodecConfig;
use crate::container::{Container, ContainerMetadata};
use crate::grid::SymbolGrid;
use crate::quantizer::{quantize_clip, IntensityFrame};
use crate::{CodecError, Result};
use log::info;

/// A finished container plus what each stage did to the clip
#[derive(Debug, Clone)]
pub struct EncodedClip {
    pub container: Container,
    pub cleanup: CleanupReport,
    pub statistics: ClipStatistics,
}

/// Runs the whole encoding pipeline under one [`CodecConfig`]
#[derive(Debug, Clone)]
pub struct ClipEncoder {
    config: CodecConfig,
    alphabet: Alphabet,
    original_file: Option<String>,
}

impl ClipEncoder {
    /// Validate the configuration and resolve its alphabet
    pub fn new(config: CodecConfig) -> Result<Self> {
        config.validate()?;
        let alphabet = config.alphabet.alphabet()?;
        Ok(Self {
            config,
            alphabet,
            original_file: None,
        })
    }

    /// Record the source name in the container metadata
    pub fn with_original_file(mut self, name: impl Into<String>) -> Self {
        self.original_file = Some(name.into());
        self
    }

    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    pub fn alphabet(&self) -> &Alphabet {
        &self.alphabet
    }

    /// Quantize a clip with the configured hysteresis
    pub fn quantize(&self, frames: &[IntensityFrame]) -> Result<Vec<SymbolGrid>> {
        quantize_clip(frames, &self.alphabet, &self.config.hysteresis)
    }

    /// Encode intensity frames into a container
    pub fn encode(&self, frames: &[IntensityFrame], fps: f64) -> Result<EncodedClip> {
        if frames.is_empty() {
            return Err(CodecError::InvalidInput("cannot encode an empty clip".to_string()));
        }
        let grids = self.quantize(frames)?;
        self.encode_grids(grids, fps)
    }

    /// Clean up and package grids that were quantized elsewhere
    pub fn encode_grids(&self, mut grids: Vec<SymbolGrid>, fps: f64) -> Result<EncodedClip> {
        let first = grids
            .first()
            .ok_or_else(|| CodecError::InvalidInput("cannot encode an empty clip".to_string()))?;
        let (width, height) = (first.cols() as u32, first.rows() as u32);
        if let Some(position) = grids.iter().position(|g| !g.same_shape(first)) {
            return Err(CodecError::InvalidInput(format!(
                "frame {} is {}x{} but the clip is {}x{}",
                position,
                grids[position].cols(),
                grids[position].rows(),
                width,
                height
            )));
        }

        let pipeline = CleanupPipeline::new(self.config.cleanup.clone(), self.alphabet.clone());
        let cleanup = pipeline.run(&mut grids);

        let compressor = FrameCompressor::from_config(&self.config.compression);
        let records = compressor.compress_clip(&grids, fps)?;
        let statistics = ClipStatistics::aggregate(&records);

        let mut metadata = ContainerMetadata::new(
            width,
            height,
            fps,
            records.len() as u32,
            compressor.format(),
        );
        metadata.alphabet = Some(self.alphabet.as_string());
        metadata.original_file = self.original_file.clone();
        metadata.compression_ratio = Some(statistics.overall_ratio);

        let container = Container::new(metadata, records)?;

        info!(
            "Encoded {} frames at {}x{}: {:.1}:1 ({})",
            statistics.frame_count,
            width,
            height,
            statistics.overall_ratio,
            statistics.rating(&self.config.compression)
        );
        if !statistics.meets_target(&self.config.compression) {
            info!(
                "Compression ratio is below the {:.0}:1 target",
                self.config.compression.target_ratio
            );
        }

        Ok(EncodedClip {
            container,
            cleanup,
            statistics,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CleanupConfig;

    fn ramp_frames(count: usize) -> Vec<IntensityFrame> {
        (0..count)
            .map(|t| {
                let data = (0..40 * 12)
                    .map(|i| (((i % 40) * 6 + t) % 256) as u8)
                    .collect();
                IntensityFrame::new(40, 12, data).unwrap()
            })
            .collect()
    }

    #[test]
    fn test_encode_and_decode() {
        let config = CodecConfig {
            cleanup: CleanupConfig::disabled(),
            ..Default::default()
        };
        let encoder = ClipEncoder::new(config).unwrap().with_original_file("ramp");
        let frames = ramp_frames(6);
        let expected = encoder.quantize(&frames).unwrap();

        let encoded = encoder.encode(&frames, 24.0).unwrap();
        let container = &encoded.container;
        assert_eq!(container.frame_count(), 6);
        assert_eq!(container.width(), 40);
        assert_eq!(container.height(), 12);
        assert_eq!(container.metadata().original_file.as_deref(), Some("ramp"));
        assert_eq!(container.metadata().alphabet.as_deref(), Some(" .:-=+*#%@"));
        assert_eq!(encoded.cleanup.total_changes(), 0);

        assert_eq!(container.decode_all().unwrap(), expected);
    }

    #[test]
    fn test_statistics_match_container() {
        let encoder = ClipEncoder::new(CodecConfig::default()).unwrap();
        let encoded = encoder.encode(&ramp_frames(4), 10.0).unwrap();
        assert_eq!(encoded.statistics, encoded.container.statistics());
        assert_eq!(
            encoded.container.metadata().compression_ratio,
            Some(encoded.statistics.overall_ratio)
        );
    }

    #[test]
    fn test_empty_clip_rejected() {
        let encoder = ClipEncoder::new(CodecConfig::default()).unwrap();
        assert!(matches!(
            encoder.encode(&[], 24.0),
            Err(CodecError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_mixed_grid_shapes_rejected_before_cleanup() {
        let encoder = ClipEncoder::new(CodecConfig::default()).unwrap();
        let grids = vec![
            SymbolGrid::filled(2, 2, ' '),
            SymbolGrid::filled(3, 3, '.'),
            SymbolGrid::filled(2, 2, ' '),
        ];
        assert!(matches!(
            encoder.encode_grids(grids, 10.0),
            Err(CodecError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_level_reaches_container() {
        let mut config = CodecConfig::default();
        config.compression.format = crate::config::PayloadFormat::Lzma;
        config.compression.level = 9;
        let encoder = ClipEncoder::new(config).unwrap();
        let frames = ramp_frames(3);
        let expected = encoder.quantize(&frames).unwrap();

        let encoded = encoder.encode(&frames, 12.0).unwrap();
        assert_eq!(encoded.container.metadata().compression_algorithm, "rle-lzma");
        assert_eq!(encoded.container.decode_all().unwrap().len(), expected.len());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = CodecConfig::default();
        config.cleanup.spatial_coherence_threshold = 2.0;
        assert!(ClipEncoder::new(config).is_err());
    }
}
