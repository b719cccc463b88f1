use crate::quantizer::IntensityFrame;
use crate::{CodecError, Result};
use image::imageops::{self, FilterType};
use image::RgbImage;
use log::{debug, info};
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};

/// File extensions picked up from a frame directory
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "gif", "tif", "tiff", "pgm", "ppm", "webp"];

/// How still images are turned into intensity frames
#[derive(Debug, Clone, PartialEq)]
pub struct SourceConfig {
    /// Output columns; derived from `height` or `default_width` when unset
    pub width: Option<u32>,
    /// Output rows; derived from the image aspect when unset
    pub height: Option<u32>,
    /// Columns used when neither dimension is given
    pub default_width: u32,
    /// Character cell width / height, corrects for tall terminal cells
    pub aspect_ratio: f64,
    /// Brightness adjustment (-1.0 to 1.0)
    pub brightness: f64,
    /// Contrast adjustment (0.0 to 2.0, 1.0 = normal)
    pub contrast: f64,
    /// Stop after this many frames
    pub max_frames: Option<usize>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            width: None,
            height: None,
            default_width: 120,
            aspect_ratio: 0.55,
            brightness: 0.0,
            contrast: 1.0,
            max_frames: None,
        }
    }
}

impl SourceConfig {
    pub fn validate(&self) -> Result<()> {
        if self.width == Some(0) || self.height == Some(0) || self.default_width == 0 {
            return Err(CodecError::InvalidConfig(
                "output dimensions must be at least 1".to_string(),
            ));
        }
        if !(self.aspect_ratio.is_finite() && self.aspect_ratio > 0.0) {
            return Err(CodecError::InvalidConfig(format!(
                "aspect ratio must be positive, got {}",
                self.aspect_ratio
            )));
        }
        if !(-1.0..=1.0).contains(&self.brightness) {
            return Err(CodecError::InvalidConfig(
                "brightness must be between -1.0 and 1.0".to_string(),
            ));
        }
        if !(0.0..=2.0).contains(&self.contrast) {
            return Err(CodecError::InvalidConfig(
                "contrast must be between 0.0 and 2.0".to_string(),
            ));
        }
        Ok(())
    }

    /// Output grid size for a `src_width × src_height` image
    pub fn target_dimensions(&self, src_width: u32, src_height: u32) -> (u32, u32) {
        let src_aspect = src_width.max(1) as f64 / src_height.max(1) as f64;

        let (width, height) = match (self.width, self.height) {
            (Some(w), Some(h)) => (w, h),
            (Some(w), None) => (w, (w as f64 / src_aspect * self.aspect_ratio).round() as u32),
            (None, Some(h)) => ((h as f64 * src_aspect / self.aspect_ratio).round() as u32, h),
            (None, None) => {
                let w = self.default_width;
                (w, (w as f64 / src_aspect * self.aspect_ratio).round() as u32)
            }
        };

        (width.max(1), height.max(1))
    }
}

/// Parse a `WIDTHxHEIGHT` string such as `120x40`
pub fn parse_resolution(value: &str) -> Result<(u32, u32)> {
    let invalid = || {
        CodecError::InvalidInput(format!(
            "invalid resolution '{}', expected WIDTHxHEIGHT (e.g. 120x40)",
            value
        ))
    };

    let (width, height) = value
        .trim()
        .split_once(|c: char| c == 'x' || c == 'X')
        .ok_or_else(invalid)?;
    let width: u32 = width.trim().parse().map_err(|_| invalid())?;
    let height: u32 = height.trim().parse().map_err(|_| invalid())?;

    if width == 0 || height == 0 {
        return Err(invalid());
    }
    Ok((width, height))
}

/// Luminance from RGB using ITU-R BT.709 coefficients
pub fn luminance(r: u8, g: u8, b: u8) -> u8 {
    let luma = 0.2126 * r as f64 + 0.7152 * g as f64 + 0.0722 * b as f64;
    luma.round().clamp(0.0, 255.0) as u8
}

/// Apply brightness and contrast to one intensity value
pub fn adjust_intensity(value: u8, brightness: f64, contrast: f64) -> u8 {
    let mut adjusted = value as f64;
    adjusted += brightness * 255.0;
    adjusted = (adjusted - 128.0) * contrast + 128.0;
    adjusted.round().clamp(0.0, 255.0) as u8
}

/// Resize an RGB image to `width × height` and reduce it to intensities
pub fn intensity_from_rgb(image: &RgbImage, width: u32, height: u32, config: &SourceConfig) -> IntensityFrame {
    let resized = if image.dimensions() == (width, height) {
        image.clone()
    } else {
        imageops::resize(image, width, height, FilterType::Triangle)
    };

    let data = resized
        .pixels()
        .map(|p| {
            let [r, g, b] = p.0;
            adjust_intensity(luminance(r, g, b), config.brightness, config.contrast)
        })
        .collect();

    IntensityFrame {
        data,
        width,
        height,
    }
}

/// A directory of still images played back as a clip, in file name order
#[derive(Debug, Clone)]
pub struct FrameSource {
    paths: Vec<PathBuf>,
    config: SourceConfig,
    width: u32,
    height: u32,
}

impl FrameSource {
    /// Index the images in `dir`; the first image fixes the output size
    pub fn open<P: AsRef<Path>>(dir: P, config: SourceConfig) -> Result<Self> {
        let dir = dir.as_ref();
        config.validate()?;

        if !dir.is_dir() {
            return Err(CodecError::InvalidInput(format!(
                "{} is not a directory",
                dir.display()
            )));
        }

        let mut paths = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_file() && is_image(&path) {
                paths.push(path);
            }
        }
        paths.sort();
        if let Some(max) = config.max_frames {
            paths.truncate(max);
        }

        let first = paths.first().ok_or_else(|| {
            CodecError::InvalidInput(format!("no image frames found in {}", dir.display()))
        })?;
        let (src_width, src_height) = image::image_dimensions(first)?;
        let (width, height) = config.target_dimensions(src_width, src_height);

        info!(
            "Found {} frames in {} ({}x{} -> {}x{})",
            paths.len(),
            dir.display(),
            src_width,
            src_height,
            width,
            height
        );

        Ok(Self {
            paths,
            config,
            width,
            height,
        })
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// Output grid size as (columns, rows)
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn load_frame(&self, index: usize) -> Result<IntensityFrame> {
        let path = self.paths.get(index).ok_or(CodecError::FrameOutOfRange {
            index,
            count: self.paths.len(),
        })?;

        debug!("Loading frame {} from {}", index, path.display());
        let image = image::open(path)?.to_rgb8();
        Ok(intensity_from_rgb(&image, self.width, self.height, &self.config))
    }

    /// Load every frame, decoding images in parallel
    pub fn load_all(&self) -> Result<Vec<IntensityFrame>> {
        (0..self.paths.len())
            .into_par_iter()
            .map(|index| self.load_frame(index))
            .collect()
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}
