//! Per-frame payload compression and clip-level size statistics.
//!
//! An intra frame's payload is the row-scoped RLE stream of its grid, run
//! through the configured [`PayloadFormat`]. Legacy delta frames carry a list
//! of changed cells instead and can only be rebuilt against the frame before
//! them.

use crate::config::{CompressionConfig, PayloadFormat, MAX_COMPRESSION_LEVEL};
use crate::grid::SymbolGrid;
use crate::rle::{self, read_symbol, read_varint};
use crate::{utils, CodecError, DecodeError, FormatError, Result};
use log::debug;
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::fmt;
use std::io::{self, Read, Write};
use xz2::read::XzDecoder;
use xz2::stream::{Check, LzmaOptions, Stream};
use xz2::write::XzEncoder;

/// Upper bound on decompressed stream bytes per grid cell.
///
/// A segment is at most 4 bytes of UTF-8 plus a 5 byte varint, and a delta
/// entry at most two varints plus a symbol, so 16 covers both with room.
const MAX_STREAM_BYTES_PER_CELL: usize = 16;

/// Most bytes one LZ4 block byte can expand to
const LZ4_MAX_EXPANSION: usize = 255;

/// Memory cap handed to the LZMA decoders
const LZMA_MEMLIMIT: u64 = 128 * 1024 * 1024;

/// Level used when none is configured
pub const DEFAULT_COMPRESSION_LEVEL: u32 = 6;

/// How a frame's payload is coded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FrameType {
    /// Self-contained frame (`'I'`)
    IntraCoded,
    /// Changes against the previous frame (`'P'`), read support only
    DeltaCoded,
}

impl FrameType {
    pub fn tag(&self) -> u8 {
        match self {
            FrameType::IntraCoded => b'I',
            FrameType::DeltaCoded => b'P',
        }
    }

    pub fn from_tag(tag: u8) -> std::result::Result<Self, FormatError> {
        match tag {
            b'I' => Ok(FrameType::IntraCoded),
            b'P' => Ok(FrameType::DeltaCoded),
            other => Err(FormatError::UnknownFrameType(other)),
        }
    }
}

impl fmt::Display for FrameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag() as char)
    }
}

/// One compressed frame as stored in a container
#[derive(Debug, Clone, PartialEq)]
pub struct FrameRecord {
    pub index: u32,
    pub frame_type: FrameType,
    /// Presentation time in seconds (`index / fps`)
    pub timestamp: f64,
    /// Symbol count of the uncompressed grid (`rows * cols`)
    pub raw_size: u32,
    pub payload: Vec<u8>,
}

impl FrameRecord {
    pub fn compressed_size(&self) -> u32 {
        self.payload.len() as u32
    }

    /// `raw_size / compressed_size`, 0 for an empty payload
    pub fn ratio(&self) -> f64 {
        utils::ratio(self.raw_size as u64, self.compressed_size() as u64)
    }
}

/// Turns symbol grids into frame records and back
#[derive(Debug, Clone, Copy)]
pub struct FrameCompressor {
    format: PayloadFormat,
    level: u32,
}

impl Default for FrameCompressor {
    fn default() -> Self {
        Self::new(PayloadFormat::default())
    }
}

impl FrameCompressor {
    pub fn new(format: PayloadFormat) -> Self {
        Self {
            format,
            level: DEFAULT_COMPRESSION_LEVEL,
        }
    }

    /// Set the preset level used by the LZMA formats
    pub fn with_level(mut self, level: u32) -> Self {
        self.level = level;
        self
    }

    pub fn from_config(config: &CompressionConfig) -> Self {
        Self::new(config.format).with_level(config.level)
    }

    pub fn format(&self) -> PayloadFormat {
        self.format
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    /// Compress one grid into an intra-coded record
    pub fn compress(&self, grid: &SymbolGrid, index: u32, fps: f64) -> Result<FrameRecord> {
        let stream = rle::to_bytes(&rle::encode(grid));
        let payload = self.pack(&stream)?;

        Ok(FrameRecord {
            index,
            frame_type: FrameType::IntraCoded,
            timestamp: index as f64 / fps,
            raw_size: grid.len() as u32,
            payload,
        })
    }

    /// Compress a whole clip in parallel; records come back in frame order
    pub fn compress_clip(&self, grids: &[SymbolGrid], fps: f64) -> Result<Vec<FrameRecord>> {
        let first = grids
            .first()
            .ok_or_else(|| CodecError::InvalidInput("cannot compress an empty clip".to_string()))?;

        if !(fps.is_finite() && fps > 0.0) {
            return Err(CodecError::InvalidInput(format!(
                "frame rate must be positive, got {}",
                fps
            )));
        }

        if let Some(position) = grids.iter().position(|g| !g.same_shape(first)) {
            return Err(CodecError::InvalidInput(format!(
                "frame {} is {}x{} but the clip is {}x{}",
                position,
                grids[position].cols(),
                grids[position].rows(),
                first.cols(),
                first.rows()
            )));
        }

        let records = grids
            .par_iter()
            .enumerate()
            .map(|(index, grid)| self.compress(grid, index as u32, fps))
            .collect::<Result<Vec<_>>>()?;

        debug!(
            "Compressed {} frames with {} (level {})",
            records.len(),
            self.format.algorithm_id(),
            self.level
        );
        Ok(records)
    }

    /// Rebuild an intra-coded record as a `height × width` grid
    pub fn decompress(
        &self,
        record: &FrameRecord,
        width: usize,
        height: usize,
    ) -> std::result::Result<SymbolGrid, DecodeError> {
        if record.frame_type == FrameType::DeltaCoded {
            return Err(DecodeError::MissingReference);
        }
        check_raw_size(record, width, height)?;

        let stream = self.unpack(&record.payload, record.raw_size as usize)?;
        let segments = rle::from_bytes(&stream)?;

        let actual = rle::symbol_count(&segments);
        if actual != record.raw_size as usize {
            return Err(DecodeError::SymbolCount {
                expected: record.raw_size as usize,
                actual,
            });
        }

        rle::decode(&segments, height, width)
    }

    /// Rebuild a legacy delta record by applying its changes to `reference`
    pub fn decompress_delta(
        &self,
        record: &FrameRecord,
        reference: &SymbolGrid,
    ) -> std::result::Result<SymbolGrid, DecodeError> {
        check_raw_size(record, reference.cols(), reference.rows())?;

        let stream = self.unpack(&record.payload, record.raw_size as usize)?;
        apply_deltas(&stream, reference)
    }

    fn pack(&self, stream: &[u8]) -> Result<Vec<u8>> {
        match self.format {
            PayloadFormat::Lz4Block => Ok(lz4_flex::block::compress(stream)),
            PayloadFormat::Lz4Frame => {
                let mut encoder = lz4_flex::frame::FrameEncoder::new(Vec::new());
                encoder.write_all(stream)?;
                encoder
                    .finish()
                    .map_err(|e| CodecError::Io(io::Error::new(io::ErrorKind::Other, e.to_string())))
            }
            PayloadFormat::Lzma | PayloadFormat::Xz => {
                if self.level > MAX_COMPRESSION_LEVEL {
                    return Err(CodecError::InvalidConfig(format!(
                        "compression level must be between 0 and {}, got {}",
                        MAX_COMPRESSION_LEVEL, self.level
                    )));
                }
                let encoder = if self.format == PayloadFormat::Lzma {
                    LzmaOptions::new_preset(self.level)
                        .and_then(|options| Stream::new_lzma_encoder(&options))
                } else {
                    Stream::new_easy_encoder(self.level, Check::Crc64)
                }
                .map_err(|e| CodecError::InvalidConfig(format!("lzma encoder: {}", e)))?;

                let mut writer = XzEncoder::new_stream(Vec::new(), encoder);
                writer.write_all(stream)?;
                Ok(writer.finish()?)
            }
            PayloadFormat::Stored => Ok(stream.to_vec()),
        }
    }

    /// Decompress a payload whose stream may not exceed the bound for `cells`
    fn unpack(&self, payload: &[u8], cells: usize) -> std::result::Result<Vec<u8>, DecodeError> {
        let limit = cells
            .saturating_mul(MAX_STREAM_BYTES_PER_CELL)
            .saturating_add(MAX_STREAM_BYTES_PER_CELL);

        let stream = match self.format {
            PayloadFormat::Lz4Block => {
                // the buffer never outgrows what the payload could expand to
                let capacity = limit.min(
                    payload
                        .len()
                        .saturating_mul(LZ4_MAX_EXPANSION)
                        .saturating_add(MAX_STREAM_BYTES_PER_CELL),
                );
                let mut stream = vec![0u8; capacity];
                let written = lz4_flex::block::decompress_into(payload, &mut stream)
                    .map_err(|e| DecodeError::Decompress(e.to_string()))?;
                stream.truncate(written);
                stream
            }
            PayloadFormat::Lz4Frame => {
                let mut stream = Vec::new();
                lz4_flex::frame::FrameDecoder::new(payload)
                    .take(limit as u64 + 1)
                    .read_to_end(&mut stream)
                    .map_err(|e| DecodeError::Decompress(e.to_string()))?;
                stream
            }
            PayloadFormat::Lzma | PayloadFormat::Xz => {
                let decoder = if self.format == PayloadFormat::Lzma {
                    Stream::new_lzma_decoder(LZMA_MEMLIMIT)
                } else {
                    Stream::new_stream_decoder(LZMA_MEMLIMIT, 0)
                }
                .map_err(|e| DecodeError::Decompress(e.to_string()))?;

                let mut stream = Vec::new();
                XzDecoder::new_stream(payload, decoder)
                    .take(limit as u64 + 1)
                    .read_to_end(&mut stream)
                    .map_err(|e| DecodeError::Decompress(e.to_string()))?;
                stream
            }
            PayloadFormat::Stored => payload.to_vec(),
        };

        if stream.len() > limit {
            return Err(DecodeError::Decompress(format!(
                "stream exceeds the {} bytes a {}-cell frame can need",
                limit, cells
            )));
        }
        Ok(stream)
    }
}

fn check_raw_size(
    record: &FrameRecord,
    width: usize,
    height: usize,
) -> std::result::Result<(), DecodeError> {
    if record.raw_size as usize != width * height {
        return Err(DecodeError::Malformed(format!(
            "record holds {} symbols but a {}x{} grid needs {}",
            record.raw_size,
            width,
            height,
            width * height
        )));
    }
    Ok(())
}

/// Apply a `(row, col, symbol)` change list to a copy of `reference`
fn apply_deltas(stream: &[u8], reference: &SymbolGrid) -> std::result::Result<SymbolGrid, DecodeError> {
    let mut grid = reference.clone();
    let mut pos = 0;

    while pos < stream.len() {
        let row = read_varint(stream, &mut pos)? as usize;
        let col = read_varint(stream, &mut pos)? as usize;
        let symbol = read_symbol(stream, &mut pos)?;

        if row >= grid.rows() || col >= grid.cols() {
            return Err(DecodeError::Malformed(format!(
                "delta at ({}, {}) lies outside the {}x{} grid",
                row,
                col,
                grid.cols(),
                grid.rows()
            )));
        }
        grid.set(row, col, symbol);
    }

    Ok(grid)
}

#[cfg(test)]
impl FrameCompressor {
    /// Build a legacy delta record, for exercising the read path
    pub(crate) fn compress_delta(
        &self,
        previous: &SymbolGrid,
        current: &SymbolGrid,
        index: u32,
        fps: f64,
    ) -> FrameRecord {
        let mut stream = Vec::new();
        for row in 0..current.rows() {
            for col in 0..current.cols() {
                let symbol = current.get(row, col);
                if symbol != previous.get(row, col) {
                    rle::write_varint(&mut stream, row as u32);
                    rle::write_varint(&mut stream, col as u32);
                    rle::write_symbol(&mut stream, symbol);
                }
            }
        }

        FrameRecord {
            index,
            frame_type: FrameType::DeltaCoded,
            timestamp: index as f64 / fps,
            raw_size: current.len() as u32,
            payload: self.pack(&stream).unwrap(),
        }
    }
}

/// How a clip's overall ratio compares with the configured targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionRating {
    Excellent,
    Good,
    Acceptable,
    Poor,
}

impl CompressionRating {
    pub fn from_ratio(ratio: f64, config: &CompressionConfig) -> Self {
        if ratio >= config.excellent_ratio {
            CompressionRating::Excellent
        } else if ratio >= config.good_ratio {
            CompressionRating::Good
        } else if ratio >= config.acceptable_ratio {
            CompressionRating::Acceptable
        } else {
            CompressionRating::Poor
        }
    }
}

impl fmt::Display for CompressionRating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CompressionRating::Excellent => "excellent",
            CompressionRating::Good => "good",
            CompressionRating::Acceptable => "acceptable",
            CompressionRating::Poor => "poor",
        };
        f.write_str(label)
    }
}

/// Totals for one frame type
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameTypeStats {
    pub frames: usize,
    pub raw_size: u64,
    pub compressed_size: u64,
}

impl FrameTypeStats {
    pub fn ratio(&self) -> f64 {
        utils::ratio(self.raw_size, self.compressed_size)
    }
}

/// Size statistics derived from a clip's records
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClipStatistics {
    pub frame_count: usize,
    pub total_raw_size: u64,
    pub total_compressed_size: u64,
    pub overall_ratio: f64,
    pub min_frame_ratio: f64,
    pub max_frame_ratio: f64,
    pub mean_frame_ratio: f64,
    pub by_type: BTreeMap<FrameType, FrameTypeStats>,
}

impl ClipStatistics {
    pub fn aggregate(records: &[FrameRecord]) -> Self {
        if records.is_empty() {
            return Self::default();
        }

        let mut stats = Self {
            frame_count: records.len(),
            min_frame_ratio: f64::INFINITY,
            max_frame_ratio: 0.0,
            ..Self::default()
        };
        let mut ratio_sum = 0.0;

        for record in records {
            let raw = record.raw_size as u64;
            let compressed = record.compressed_size() as u64;
            stats.total_raw_size += raw;
            stats.total_compressed_size += compressed;

            let ratio = record.ratio();
            ratio_sum += ratio;
            stats.min_frame_ratio = stats.min_frame_ratio.min(ratio);
            stats.max_frame_ratio = stats.max_frame_ratio.max(ratio);

            let entry = stats.by_type.entry(record.frame_type).or_default();
            entry.frames += 1;
            entry.raw_size += raw;
            entry.compressed_size += compressed;
        }

        stats.overall_ratio = utils::ratio(stats.total_raw_size, stats.total_compressed_size);
        stats.mean_frame_ratio = ratio_sum / records.len() as f64;
        stats
    }

    pub fn compressed_kib(&self) -> f64 {
        self.total_compressed_size as f64 / 1024.0
    }

    pub fn raw_kib(&self) -> f64 {
        self.total_raw_size as f64 / 1024.0
    }

    pub fn rating(&self, config: &CompressionConfig) -> CompressionRating {
        CompressionRating::from_ratio(self.overall_ratio, config)
    }

    pub fn meets_target(&self, config: &CompressionConfig) -> bool {
        self.overall_ratio >= config.target_ratio
    }
}

impl fmt::Display for ClipStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Frames:          {}", self.frame_count)?;
        writeln!(f, "Raw size:        {}", utils::format_kib(self.total_raw_size))?;
        writeln!(
            f,
            "Compressed size: {}",
            utils::format_kib(self.total_compressed_size)
        )?;
        write!(
            f,
            "Ratio:           {:.1}:1 (per frame min {:.1}, mean {:.1}, max {:.1})",
            self.overall_ratio, self.min_frame_ratio, self.mean_frame_ratio, self.max_frame_ratio
        )?;
        for (frame_type, totals) in &self.by_type {
            write!(
                f,
                "\n  {}-frames: {} ({:.1}:1)",
                frame_type,
                totals.frames,
                totals.ratio()
            )?;
        }
        Ok(())
    }
}
