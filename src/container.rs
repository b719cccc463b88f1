//! The `.txv` container: metadata plus one compressed payload per frame.
//!
//! Layout, all integers little-endian:
//!
//! ```text
//! magic            8 bytes  "ASCIITXV"
//! format_version   u32
//! metadata_length  u32
//! metadata         UTF-8 JSON
//! frame_count      u32
//! repeated frame_count times:
//!   frame_index      u32
//!   frame_type       u8   'I' or 'P'
//!   padding          3 bytes
//!   timestamp        f64
//!   raw_size         u32
//!   compressed_size  u32
//!   payload          compressed_size bytes
//! ```
//!
//! [`Container`] holds a whole file in memory. [`ContainerReader`] keeps only
//! the frame headers and seeks to a payload when a frame is requested.

use crate::compressor::{ClipStatistics, FrameCompressor, FrameRecord, FrameType};
use crate::config::PayloadFormat;
use crate::grid::SymbolGrid;
use crate::{utils, CodecError, DecodeError, FormatError, Result, PACKAGE_NAME, VERSION};
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;

/// Magic bytes identifying a container
pub const MAGIC: &[u8; 8] = b"ASCIITXV";

/// Container version written by this build and the only one it reads
pub const FORMAT_VERSION: u32 = 1;

/// Size of the fixed header in front of every payload
pub const FRAME_HEADER_SIZE: usize = 24;

/// Conventional file extension
pub const FILE_EXTENSION: &str = "txv";

/// magic + format_version + metadata_length + frame_count
const FIXED_HEADER_SIZE: u64 = 8 + 4 + 4 + 4;

/// Descriptive fields stored as JSON after the fixed header
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerMetadata {
    pub format_version: String,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    #[serde(alias = "total_frames")]
    pub frame_count: u32,
    pub duration_seconds: f64,
    pub compression_algorithm: String,
    #[serde(default)]
    pub created_by: String,
    /// RFC 3339
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compression_ratio: Option<f64>,
    /// Symbols used, darkest first
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alphabet: Option<String>,
}

impl ContainerMetadata {
    pub fn new(width: u32, height: u32, fps: f64, frame_count: u32, format: PayloadFormat) -> Self {
        Self {
            format_version: FORMAT_VERSION.to_string(),
            width,
            height,
            fps,
            frame_count,
            duration_seconds: if fps > 0.0 {
                frame_count as f64 / fps
            } else {
                0.0
            },
            compression_algorithm: format.algorithm_id().to_string(),
            created_by: format!("{} {}", PACKAGE_NAME, VERSION),
            creation_timestamp: Some(Utc::now().to_rfc3339()),
            original_file: None,
            compression_ratio: None,
            alphabet: None,
        }
    }

    /// Payload format named by `compression_algorithm`
    pub fn payload_format(&self) -> std::result::Result<PayloadFormat, FormatError> {
        PayloadFormat::from_algorithm_id(&self.compression_algorithm)
            .ok_or_else(|| FormatError::UnsupportedAlgorithm(self.compression_algorithm.clone()))
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.creation_timestamp
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|t| t.with_timezone(&Utc))
    }

    /// Symbols per frame
    pub fn cells(&self) -> usize {
        self.width as usize * self.height as usize
    }

    fn check(&self) -> std::result::Result<(), FormatError> {
        if self.width == 0 || self.height == 0 {
            return Err(FormatError::Inconsistent(format!(
                "frame size {}x{} is empty",
                self.width, self.height
            )));
        }
        if !(self.fps.is_finite() && self.fps > 0.0) {
            return Err(FormatError::Inconsistent(format!(
                "frame rate {} is not positive",
                self.fps
            )));
        }
        if self.cells() > u32::MAX as usize {
            return Err(FormatError::Inconsistent(format!(
                "frame size {}x{} is too large",
                self.width, self.height
            )));
        }
        self.payload_format()?;
        Ok(())
    }
}

/// Fixed 24-byte header in front of each payload
#[derive(Debug, Clone, Copy, PartialEq)]
struct FrameHeader {
    index: u32,
    frame_type: FrameType,
    timestamp: f64,
    raw_size: u32,
    compressed_size: u32,
}

impl FrameHeader {
    fn of(record: &FrameRecord) -> Self {
        Self {
            index: record.index,
            frame_type: record.frame_type,
            timestamp: record.timestamp,
            raw_size: record.raw_size,
            compressed_size: record.compressed_size(),
        }
    }

    fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(&self.index.to_le_bytes())?;
        w.write_all(&[self.frame_type.tag(), 0, 0, 0])?;
        w.write_all(&self.timestamp.to_le_bytes())?;
        w.write_all(&self.raw_size.to_le_bytes())?;
        w.write_all(&self.compressed_size.to_le_bytes())?;
        Ok(())
    }

    fn read_from<R: Read>(r: &mut R, position: usize) -> Result<Self> {
        let mut buf = [0u8; FRAME_HEADER_SIZE];
        read_exact_or_truncated(r, &mut buf, || format!("header of frame {}", position))?;

        let u32_at = |at: usize| u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]]);
        let mut timestamp = [0u8; 8];
        timestamp.copy_from_slice(&buf[8..16]);

        Ok(Self {
            index: u32_at(0),
            frame_type: FrameType::from_tag(buf[4])?,
            timestamp: f64::from_le_bytes(timestamp),
            raw_size: u32_at(16),
            compressed_size: u32_at(20),
        })
    }

    /// The header must carry its position as index and the metadata's cell count
    fn check(&self, position: usize, metadata: &ContainerMetadata) -> std::result::Result<(), FormatError> {
        if self.index as usize != position {
            return Err(FormatError::Inconsistent(format!(
                "frame at position {} is labelled {}",
                position, self.index
            )));
        }
        if self.raw_size as usize != metadata.cells() {
            return Err(FormatError::Inconsistent(format!(
                "frame {} holds {} symbols but frames are {}x{}",
                position, self.raw_size, metadata.width, metadata.height
            )));
        }
        Ok(())
    }
}

fn read_exact_or_truncated<R: Read, F: FnOnce() -> String>(
    r: &mut R,
    buf: &mut [u8],
    what: F,
) -> Result<()> {
    match r.read_exact(buf) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
            Err(FormatError::Truncated(format!("file ends inside the {}", what())).into())
        }
        Err(e) => Err(e.into()),
    }
}

fn read_u32<R: Read>(r: &mut R, what: &str) -> Result<u32> {
    let mut buf = [0u8; 4];
    read_exact_or_truncated(r, &mut buf, || what.to_string())?;
    Ok(u32::from_le_bytes(buf))
}

/// Read `len` bytes without trusting `len` for the allocation
fn read_bounded<R: Read>(r: &mut R, len: u32, what: &str) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    r.by_ref().take(len as u64).read_to_end(&mut buf)?;
    if buf.len() != len as usize {
        return Err(FormatError::Truncated(format!(
            "{} declares {} bytes but only {} remain",
            what,
            len,
            buf.len()
        ))
        .into());
    }
    Ok(buf)
}

/// Everything before the first frame header
struct ContainerHeader {
    metadata: ContainerMetadata,
    frame_count: u32,
    /// Bytes up to and including the frame count
    size: u64,
}

impl ContainerHeader {
    fn read_from<R: Read>(r: &mut R) -> Result<Self> {
        let mut magic = Vec::with_capacity(MAGIC.len());
        r.by_ref().take(MAGIC.len() as u64).read_to_end(&mut magic)?;
        if magic.as_slice() != MAGIC {
            // a short file that starts like a container is a truncated one
            if magic.len() < MAGIC.len() && MAGIC.starts_with(&magic) && !magic.is_empty() {
                return Err(FormatError::Truncated("file ends inside the magic".to_string()).into());
            }
            return Err(FormatError::BadMagic { found: magic }.into());
        }

        let version = read_u32(r, "format version")?;
        if version != FORMAT_VERSION {
            return Err(FormatError::UnsupportedVersion {
                found: version,
                supported: FORMAT_VERSION,
            }
            .into());
        }

        let metadata_length = read_u32(r, "metadata length")?;
        let raw = read_bounded(r, metadata_length, "metadata")?;
        let metadata: ContainerMetadata =
            serde_json::from_slice(&raw).map_err(FormatError::Metadata)?;
        metadata.check()?;

        let frame_count = read_u32(r, "frame count")?;
        if metadata.frame_count != frame_count {
            return Err(FormatError::Inconsistent(format!(
                "metadata lists {} frames but the header declares {}",
                metadata.frame_count, frame_count
            ))
            .into());
        }

        Ok(Self {
            metadata,
            frame_count,
            size: FIXED_HEADER_SIZE + metadata_length as u64,
        })
    }
}

fn ensure_exhausted<R: Read>(r: &mut R) -> Result<()> {
    let mut probe = [0u8; 1];
    loop {
        match r.read(&mut probe) {
            Ok(0) => return Ok(()),
            Ok(_) => {
                return Err(FormatError::Inconsistent(
                    "trailing bytes after the last frame".to_string(),
                )
                .into())
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
}

/// First frame to decode when reconstructing `index`: the nearest intra frame
/// at or before it
fn chain_start<F: Fn(usize) -> FrameType>(index: usize, frame_type_at: F) -> usize {
    (0..=index)
        .rev()
        .find(|&i| frame_type_at(i) == FrameType::IntraCoded)
        .unwrap_or(0)
}

/// Decode frames `start..=index` in order, feeding each one to the next delta
fn decode_chain<R, F>(
    compressor: &FrameCompressor,
    metadata: &ContainerMetadata,
    start: usize,
    index: usize,
    mut load: F,
) -> Result<SymbolGrid>
where
    R: Borrow<FrameRecord>,
    F: FnMut(usize) -> Result<R>,
{
    let width = metadata.width as usize;
    let height = metadata.height as usize;
    let mut grid: Option<SymbolGrid> = None;

    for position in start..=index {
        let loaded = load(position)?;
        let record: &FrameRecord = loaded.borrow();
        let decoded = match (record.frame_type, grid.as_ref()) {
            (FrameType::IntraCoded, _) => compressor.decompress(record, width, height),
            (FrameType::DeltaCoded, Some(reference)) => compressor.decompress_delta(record, reference),
            (FrameType::DeltaCoded, None) => Err(DecodeError::MissingReference),
        };
        grid = Some(decoded.map_err(|source| CodecError::Decode {
            index: position,
            source,
        })?);
    }

    grid.ok_or(CodecError::FrameOutOfRange {
        index,
        count: metadata.frame_count as usize,
    })
}

/// A complete container held in memory.
///
/// Decoding takes `&self`, so one container can serve frame requests from
/// several threads at once.
#[derive(Debug, Clone)]
pub struct Container {
    metadata: ContainerMetadata,
    records: Vec<FrameRecord>,
    compressor: FrameCompressor,
}

impl Container {
    /// Assemble a container, checking the records against the metadata
    pub fn new(metadata: ContainerMetadata, records: Vec<FrameRecord>) -> Result<Self> {
        metadata.check()?;
        if metadata.frame_count as usize != records.len() {
            return Err(FormatError::Inconsistent(format!(
                "metadata lists {} frames but {} records were given",
                metadata.frame_count,
                records.len()
            ))
            .into());
        }
        for (position, record) in records.iter().enumerate() {
            FrameHeader::of(record).check(position, &metadata)?;
        }

        let compressor = FrameCompressor::new(metadata.payload_format()?);
        Ok(Self {
            metadata,
            records,
            compressor,
        })
    }

    pub fn metadata(&self) -> &ContainerMetadata {
        &self.metadata
    }

    pub fn records(&self) -> &[FrameRecord] {
        &self.records
    }

    pub fn frame_count(&self) -> usize {
        self.records.len()
    }

    pub fn width(&self) -> usize {
        self.metadata.width as usize
    }

    pub fn height(&self) -> usize {
        self.metadata.height as usize
    }

    pub fn statistics(&self) -> ClipStatistics {
        ClipStatistics::aggregate(&self.records)
    }

    pub fn frame(&self, index: usize) -> Result<&FrameRecord> {
        self.records.get(index).ok_or(CodecError::FrameOutOfRange {
            index,
            count: self.records.len(),
        })
    }

    /// Decode one frame, replaying legacy deltas from the preceding intra frame
    pub fn decode_frame(&self, index: usize) -> Result<SymbolGrid> {
        self.frame(index)?;
        let start = chain_start(index, |i| self.records[i].frame_type);
        decode_chain(&self.compressor, &self.metadata, start, index, |i| self.frame(i))
    }

    /// Decode every frame in order
    pub fn decode_all(&self) -> Result<Vec<SymbolGrid>> {
        let mut grids: Vec<SymbolGrid> = Vec::with_capacity(self.records.len());
        for (index, record) in self.records.iter().enumerate() {
            let decoded = match (record.frame_type, grids.last()) {
                (FrameType::IntraCoded, _) => {
                    self.compressor.decompress(record, self.width(), self.height())
                }
                (FrameType::DeltaCoded, Some(previous)) => {
                    self.compressor.decompress_delta(record, previous)
                }
                (FrameType::DeltaCoded, None) => Err(DecodeError::MissingReference),
            };
            grids.push(decoded.map_err(|source| CodecError::Decode { index, source })?);
        }
        Ok(grids)
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> Result<()> {
        let metadata = serde_json::to_vec(&self.metadata).map_err(FormatError::Metadata)?;
        let metadata_length = u32::try_from(metadata.len())
            .map_err(|_| FormatError::Inconsistent("metadata does not fit in 4 GiB".to_string()))?;

        w.write_all(MAGIC)?;
        w.write_all(&FORMAT_VERSION.to_le_bytes())?;
        w.write_all(&metadata_length.to_le_bytes())?;
        w.write_all(&metadata)?;
        w.write_all(&(self.records.len() as u32).to_le_bytes())?;

        for record in &self.records {
            FrameHeader::of(record).write_to(w)?;
            w.write_all(&record.payload)?;
        }
        Ok(())
    }

    /// Write to `path` through a temporary file renamed into place on success
    pub fn write_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        let mut temp = tempfile::NamedTempFile::new_in(dir)?;
        {
            let mut writer = BufWriter::new(temp.as_file_mut());
            self.write_to(&mut writer)?;
            writer.flush()?;
        }
        temp.as_file().sync_all()?;
        temp.persist(path).map_err(|e| CodecError::Io(e.error))?;

        info!(
            "Wrote {} frames to {}",
            self.records.len(),
            path.display()
        );
        Ok(())
    }

    pub fn read_from<R: Read>(r: &mut R) -> Result<Self> {
        let header = ContainerHeader::read_from(r)?;
        let metadata = header.metadata;

        // capacity is capped: the declared count is not trusted until the frames are read
        let mut records = Vec::with_capacity((header.frame_count as usize).min(4096));
        for position in 0..header.frame_count as usize {
            let frame = FrameHeader::read_from(r, position)?;
            frame.check(position, &metadata)?;
            let payload = read_bounded(r, frame.compressed_size, "frame payload")?;
            records.push(FrameRecord {
                index: frame.index,
                frame_type: frame.frame_type,
                timestamp: frame.timestamp,
                raw_size: frame.raw_size,
                payload,
            });
        }
        ensure_exhausted(r)?;

        debug!("Read container with {} frames", records.len());
        Self::new(metadata, records)
    }

    pub fn read_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut reader = BufReader::new(File::open(path)?);
        Self::read_from(&mut reader)
    }
}

/// Location of one frame inside a seekable container
#[derive(Debug, Clone, Copy)]
struct FrameEntry {
    header: FrameHeader,
    payload_offset: u64,
}

/// Seek-based random access over a container on disk.
///
/// Opening scans only the frame headers; payloads are read on demand.
pub struct ContainerReader<R> {
    reader: R,
    metadata: ContainerMetadata,
    compressor: FrameCompressor,
    entries: Vec<FrameEntry>,
    header_size: u64,
    stream_len: u64,
}

impl ContainerReader<BufReader<File>> {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::new(BufReader::new(File::open(path)?))
    }
}

impl<R: Read + Seek> ContainerReader<R> {
    pub fn new(mut reader: R) -> Result<Self> {
        let stream_len = reader.seek(SeekFrom::End(0))?;
        reader.seek(SeekFrom::Start(0))?;

        let header = ContainerHeader::read_from(&mut reader)?;
        let metadata = header.metadata;
        let compressor = FrameCompressor::new(metadata.payload_format()?);

        let mut entries = Vec::with_capacity((header.frame_count as usize).min(4096));
        let mut offset = header.size;
        for position in 0..header.frame_count as usize {
            let frame = FrameHeader::read_from(&mut reader, position)?;
            frame.check(position, &metadata)?;

            let payload_offset = offset + FRAME_HEADER_SIZE as u64;
            let end = payload_offset + frame.compressed_size as u64;
            if end > stream_len {
                return Err(FormatError::Truncated(format!(
                    "payload of frame {} runs {} bytes past the end of the file",
                    position,
                    end - stream_len
                ))
                .into());
            }

            entries.push(FrameEntry {
                header: frame,
                payload_offset,
            });
            offset = end;
            reader.seek(SeekFrom::Start(offset))?;
        }

        if offset != stream_len {
            return Err(FormatError::Inconsistent(format!(
                "{} trailing bytes after the last frame",
                stream_len - offset
            ))
            .into());
        }

        debug!(
            "Indexed {} frames ({} byte header)",
            entries.len(),
            header.size
        );
        Ok(Self {
            reader,
            metadata,
            compressor,
            entries,
            header_size: header.size,
            stream_len,
        })
    }

    pub fn metadata(&self) -> &ContainerMetadata {
        &self.metadata
    }

    pub fn frame_count(&self) -> usize {
        self.entries.len()
    }

    /// Bytes before the first frame header
    pub fn header_size(&self) -> u64 {
        self.header_size
    }

    /// Bytes taken by frame headers and payloads
    pub fn frame_data_size(&self) -> u64 {
        self.stream_len - self.header_size
    }

    pub fn stream_len(&self) -> u64 {
        self.stream_len
    }

    fn entry(&self, index: usize) -> Result<&FrameEntry> {
        self.entries.get(index).ok_or(CodecError::FrameOutOfRange {
            index,
            count: self.entries.len(),
        })
    }

    pub fn frame_type(&self, index: usize) -> Result<FrameType> {
        Ok(self.entry(index)?.header.frame_type)
    }

    pub fn timestamp(&self, index: usize) -> Result<f64> {
        Ok(self.entry(index)?.header.timestamp)
    }

    /// Number of frames of each type
    pub fn frame_type_counts(&self) -> (usize, usize) {
        let intra = self
            .entries
            .iter()
            .filter(|e| e.header.frame_type == FrameType::IntraCoded)
            .count();
        (intra, self.entries.len() - intra)
    }

    /// Read one record's header and payload
    pub fn read_record(&mut self, index: usize) -> Result<FrameRecord> {
        let entry = *self.entry(index)?;
        self.reader.seek(SeekFrom::Start(entry.payload_offset))?;

        let mut payload = vec![0u8; entry.header.compressed_size as usize];
        read_exact_or_truncated(&mut self.reader, &mut payload, || {
            format!("payload of frame {}", index)
        })?;

        Ok(FrameRecord {
            index: entry.header.index,
            frame_type: entry.header.frame_type,
            timestamp: entry.header.timestamp,
            raw_size: entry.header.raw_size,
            payload,
        })
    }

    /// Decode one frame, replaying legacy deltas from the preceding intra frame
    pub fn decode_frame(&mut self, index: usize) -> Result<SymbolGrid> {
        self.entry(index)?;
        let start = chain_start(index, |i| self.entries[i].header.frame_type);
        let compressor = self.compressor;
        let metadata = self.metadata.clone();
        decode_chain(&compressor, &metadata, start, index, |i| self.read_record(i))
    }
}

/// Summary of a container file gathered from its headers alone
#[derive(Debug, Clone)]
pub struct ContainerInfo {
    pub metadata: ContainerMetadata,
    pub file_size: u64,
    pub header_size: u64,
    pub frame_data_size: u64,
    pub average_frame_size: f64,
    pub intra_frames: usize,
    pub delta_frames: usize,
}

impl ContainerInfo {
    pub fn inspect<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = ContainerReader::open(path)?;
        let (intra_frames, delta_frames) = reader.frame_type_counts();
        let frame_count = reader.frame_count();

        Ok(Self {
            metadata: reader.metadata().clone(),
            file_size: reader.stream_len(),
            header_size: reader.header_size(),
            frame_data_size: reader.frame_data_size(),
            average_frame_size: if frame_count == 0 {
                0.0
            } else {
                reader.frame_data_size() as f64 / frame_count as f64
            },
            intra_frames,
            delta_frames,
        })
    }
}

impl fmt::Display for ContainerInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = &self.metadata;
        writeln!(f, "Format version:  {}", m.format_version)?;
        writeln!(f, "Dimensions:      {}x{}", m.width, m.height)?;
        writeln!(f, "Frame rate:      {:.2} fps", m.fps)?;
        writeln!(
            f,
            "Frames:          {} ({} intra, {} delta)",
            m.frame_count, self.intra_frames, self.delta_frames
        )?;
        writeln!(
            f,
            "Duration:        {}",
            utils::format_duration(m.duration_seconds)
        )?;
        writeln!(f, "Algorithm:       {}", m.compression_algorithm)?;
        if let Some(alphabet) = &m.alphabet {
            writeln!(f, "Alphabet:        \"{}\"", alphabet)?;
        }
        if let Some(source) = &m.original_file {
            writeln!(f, "Source:          {}", source)?;
        }
        if let Some(created) = &m.creation_timestamp {
            writeln!(f, "Created:         {} by {}", created, m.created_by)?;
        }
        if let Some(ratio) = m.compression_ratio {
            writeln!(f, "Ratio:           {:.1}:1", ratio)?;
        }
        writeln!(f, "File size:       {}", utils::format_kib(self.file_size))?;
        writeln!(f, "Header size:     {} bytes", self.header_size)?;
        writeln!(
            f,
            "Frame data:      {}",
            utils::format_kib(self.frame_data_size)
        )?;
        write!(f, "Avg frame size:  {:.1} bytes", self.average_frame_size)
    }
}

/// How much work `validate` does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValidationMode {
    /// Structure only: header, metadata, every frame header and payload extent
    #[default]
    Quick,
    /// Structure plus a decode of every frame
    Full,
}

/// Outcome of a successful validation
#[derive(Debug, Clone)]
pub struct ValidationReport {
    pub metadata: ContainerMetadata,
    pub mode: ValidationMode,
    pub frames_indexed: usize,
    pub frames_decoded: usize,
    /// Oddities that do not make the file unreadable
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

/// Check a container file's structure without modifying it.
///
/// Every structural problem is returned as an error; soft mismatches such as a
/// stale duration end up in the report's warnings.
pub fn validate<P: AsRef<Path>>(path: P, mode: ValidationMode) -> Result<ValidationReport> {
    let mut reader = ContainerReader::open(path)?;
    let metadata = reader.metadata().clone();
    let mut warnings = Vec::new();

    let expected_duration = metadata.frame_count as f64 / metadata.fps;
    if (metadata.duration_seconds - expected_duration).abs() > 1.0 / metadata.fps {
        warnings.push(format!(
            "duration {:.3}s does not match {} frames at {} fps",
            metadata.duration_seconds, metadata.frame_count, metadata.fps
        ));
    }
    if metadata.format_version != FORMAT_VERSION.to_string() {
        warnings.push(format!(
            "metadata version '{}' differs from header version {}",
            metadata.format_version, FORMAT_VERSION
        ));
    }
    if metadata.creation_timestamp.is_some() && metadata.created_at().is_none() {
        warnings.push("creation timestamp is not RFC 3339".to_string());
    }

    let mut frames_decoded = 0;
    if mode == ValidationMode::Full {
        let mut previous: Option<SymbolGrid> = None;
        for index in 0..reader.frame_count() {
            let record = reader.read_record(index)?;
            let decoded = match (record.frame_type, previous.as_ref()) {
                (FrameType::IntraCoded, _) => reader.compressor.decompress(
                    &record,
                    metadata.width as usize,
                    metadata.height as usize,
                ),
                (FrameType::DeltaCoded, Some(reference)) => {
                    reader.compressor.decompress_delta(&record, reference)
                }
                (FrameType::DeltaCoded, None) => Err(DecodeError::MissingReference),
            };
            previous = Some(decoded.map_err(|source| CodecError::Decode { index, source })?);
            frames_decoded += 1;
        }
    }

    for warning in &warnings {
        warn!("{}", warning);
    }

    Ok(ValidationReport {
        frames_indexed: reader.frame_count(),
        metadata,
        mode,
        frames_decoded,
        warnings,
    })
}
