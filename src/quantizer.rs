//! Pixel to symbol quantization with temporal boundary hysteresis.
//!
//! Each pixel maps to `floor(pixel * N / 256)`. When the previous frame's
//! symbol at that cell sits exactly one step away and the pixel lies within
//! `threshold` of the boundary between the two symbols, the previous symbol is
//! kept. This damps noise-level flicker without holding back real changes.

use crate::alphabet::Alphabet;
use crate::config::HysteresisConfig;
use crate::grid::SymbolGrid;
use crate::{CodecError, Result};
use log::{debug, trace};
use rayon::prelude::*;

/// Single-channel intensity buffer for one frame, row-major
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntensityFrame {
    /// Luma values 0-255
    pub data: Vec<u8>,
    /// Columns
    pub width: u32,
    /// Rows
    pub height: u32,
}

impl IntensityFrame {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        let frame = Self {
            data,
            width,
            height,
        };
        frame.check()?;
        Ok(frame)
    }

    /// Buffer length must be `width * height`
    pub fn check(&self) -> Result<()> {
        let expected = self.cols() * self.rows();
        if self.data.len() != expected {
            return Err(CodecError::InvalidInput(format!(
                "intensity buffer of {}x{} needs {} values, got {}",
                self.width,
                self.height,
                expected,
                self.data.len()
            )));
        }
        Ok(())
    }

    /// Frame with every pixel set to `value`
    pub fn filled(width: u32, height: u32, value: u8) -> Self {
        Self {
            data: vec![value; width as usize * height as usize],
            width,
            height,
        }
    }

    pub fn rows(&self) -> usize {
        self.height as usize
    }

    pub fn cols(&self) -> usize {
        self.width as usize
    }
}

/// Pick the output index for one cell.
///
/// Returns the chosen index and whether hysteresis held the previous symbol.
#[inline]
fn resolve_cell(
    pixel: u8,
    candidate: usize,
    previous: Option<char>,
    alphabet: &Alphabet,
    threshold: u8,
) -> (usize, bool) {
    let prev_index = match previous.and_then(|symbol| alphabet.index_of(symbol)) {
        Some(index) => index,
        None => return (candidate, false),
    };

    if prev_index.abs_diff(candidate) != 1 {
        return (candidate, false);
    }

    let boundary = alphabet.upper_boundary(prev_index.min(candidate));
    if (pixel as f64 - boundary).abs() < threshold as f64 {
        (prev_index, true)
    } else {
        (candidate, false)
    }
}

fn check_previous(frame: &IntensityFrame, previous: Option<&SymbolGrid>) -> Result<()> {
    if let Some(prev) = previous {
        if prev.rows() != frame.rows() || prev.cols() != frame.cols() {
            return Err(CodecError::InvalidInput(format!(
                "frame is {}x{} but the previous grid is {}x{}",
                frame.cols(),
                frame.rows(),
                prev.cols(),
                prev.rows()
            )));
        }
    }
    Ok(())
}

/// Build a grid from precomputed candidate indices, applying hysteresis
/// against `previous`. Returns the grid and the number of held cells.
fn apply_hysteresis(
    frame: &IntensityFrame,
    candidates: &[u8],
    previous: Option<&SymbolGrid>,
    alphabet: &Alphabet,
    config: &HysteresisConfig,
) -> Result<(SymbolGrid, usize)> {
    let previous = if config.enabled { previous } else { None };
    let mut held = 0;
    let cells = frame
        .data
        .iter()
        .zip(candidates)
        .enumerate()
        .map(|(i, (&pixel, &candidate))| {
            let prev_symbol = previous.map(|grid| grid.cells()[i]);
            let (index, was_held) =
                resolve_cell(pixel, candidate as usize, prev_symbol, alphabet, config.threshold);
            if was_held {
                held += 1;
            }
            alphabet.symbol(index)
        })
        .collect();

    let grid = SymbolGrid::from_cells(frame.rows(), frame.cols(), cells)?;
    Ok((grid, held))
}

fn candidate_indices(frame: &IntensityFrame, alphabet: &Alphabet) -> Vec<u8> {
    frame
        .data
        .iter()
        .map(|&pixel| alphabet.index_for_intensity(pixel) as u8)
        .collect()
}

/// Quantize one frame, optionally against the previous output grid
pub fn quantize(
    frame: &IntensityFrame,
    previous: Option<&SymbolGrid>,
    alphabet: &Alphabet,
    config: &HysteresisConfig,
) -> Result<SymbolGrid> {
    quantize_with_report(frame, previous, alphabet, config).map(|(grid, _)| grid)
}

/// Like [`quantize`], also returning how many cells hysteresis held back
pub fn quantize_with_report(
    frame: &IntensityFrame,
    previous: Option<&SymbolGrid>,
    alphabet: &Alphabet,
    config: &HysteresisConfig,
) -> Result<(SymbolGrid, usize)> {
    frame.check()?;
    check_previous(frame, previous)?;
    let candidates = candidate_indices(frame, alphabet);
    apply_hysteresis(frame, &candidates, previous, alphabet, config)
}

/// Quantize a whole clip in order.
///
/// Candidate indices depend only on pixels, so they are computed for every
/// frame in parallel; hysteresis then runs as a sequential second pass.
pub fn quantize_clip(
    frames: &[IntensityFrame],
    alphabet: &Alphabet,
    config: &HysteresisConfig,
) -> Result<Vec<SymbolGrid>> {
    for frame in frames {
        frame.check()?;
    }
    if let Some(first) = frames.first() {
        if let Some((i, bad)) = frames
            .iter()
            .enumerate()
            .find(|(_, f)| f.width != first.width || f.height != first.height)
        {
            return Err(CodecError::InvalidInput(format!(
                "frame {} is {}x{}, clip is {}x{}",
                i, bad.width, bad.height, first.width, first.height
            )));
        }
    }

    let candidates: Vec<Vec<u8>> = frames
        .par_iter()
        .map(|frame| candidate_indices(frame, alphabet))
        .collect();

    let mut grids: Vec<SymbolGrid> = Vec::with_capacity(frames.len());
    let mut total_held = 0;
    for (frame, candidates) in frames.iter().zip(&candidates) {
        let (grid, held) = apply_hysteresis(frame, candidates, grids.last(), alphabet, config)?;
        total_held += held;
        grids.push(grid);
    }

    debug!(
        "Quantized {} frames, hysteresis held {} cells",
        grids.len(),
        total_held
    );
    Ok(grids)
}

/// Per-clip quantizer that remembers the last grid it produced
#[derive(Debug, Clone)]
pub struct QuantizerSession {
    alphabet: Alphabet,
    config: HysteresisConfig,
    previous: Option<SymbolGrid>,
    /// `(width, height)` fixed by the first frame
    dimensions: Option<(u32, u32)>,
    frames_processed: u64,
    cells_held: u64,
}

impl QuantizerSession {
    pub fn new(alphabet: Alphabet, config: HysteresisConfig) -> Self {
        Self {
            alphabet,
            config,
            previous: None,
            dimensions: None,
            frames_processed: 0,
            cells_held: 0,
        }
    }

    /// Quantize the next frame of the clip.
    ///
    /// The first frame sets the clip dimensions; later frames must match.
    pub fn quantize(&mut self, frame: &IntensityFrame) -> Result<SymbolGrid> {
        if let Some((width, height)) = self.dimensions {
            if (frame.width, frame.height) != (width, height) {
                return Err(CodecError::InvalidInput(format!(
                    "frame is {}x{} but the clip is {}x{}",
                    frame.width, frame.height, width, height
                )));
            }
        }
        let (grid, held) =
            quantize_with_report(frame, self.previous.as_ref(), &self.alphabet, &self.config)?;

        trace!("Frame {}: hysteresis held {} cells", self.frames_processed, held);
        self.frames_processed += 1;
        self.cells_held += held as u64;
        self.dimensions = Some((frame.width, frame.height));
        self.previous = Some(grid.clone());
        Ok(grid)
    }

    /// Forget the previous grid, e.g. after seeking in the source.
    ///
    /// The clip dimensions stay fixed.
    pub fn reset(&mut self) {
        self.previous = None;
    }

    pub fn previous(&self) -> Option<&SymbolGrid> {
        self.previous.as_ref()
    }

    pub fn alphabet(&self) -> &Alphabet {
        &self.alphabet
    }

    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.dimensions
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }

    /// Total cells kept at their previous symbol so far
    pub fn cells_held(&self) -> u64 {
        self.cells_held
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Eight symbols so every boundary sits on a whole pixel value (32 apart)
    fn octal_alphabet() -> Alphabet {
        Alphabet::new(&['0', '1', '2', '3', '4', '5', '6', '7']).unwrap()
    }

    fn config(threshold: u8) -> HysteresisConfig {
        HysteresisConfig {
            enabled: true,
            threshold,
        }
    }

    #[test]
    fn test_first_frame_has_no_hysteresis() {
        let alphabet = octal_alphabet();
        let frame = IntensityFrame::new(3, 1, vec![0, 130, 255]).unwrap();
        let grid = quantize(&frame, None, &alphabet, &config(8)).unwrap();
        assert_eq!(grid.to_string(), "047");
    }

    #[test]
    fn test_boundary_suppression_upward() {
        let alphabet = octal_alphabet();
        let threshold = 8;
        let previous = SymbolGrid::filled(1, 1, '3');
        // boundary between 3 and 4 is 128
        let near = IntensityFrame::new(1, 1, vec![128 + threshold - 1]).unwrap();
        let far = IntensityFrame::new(1, 1, vec![128 + threshold + 1]).unwrap();

        let kept = quantize(&near, Some(&previous), &alphabet, &config(threshold)).unwrap();
        let switched = quantize(&far, Some(&previous), &alphabet, &config(threshold)).unwrap();

        assert_eq!(kept.get(0, 0), '3');
        assert_eq!(switched.get(0, 0), '4');
    }

    #[test]
    fn test_boundary_suppression_downward() {
        let alphabet = octal_alphabet();
        let threshold = 8;
        let previous = SymbolGrid::filled(1, 1, '4');
        let near = IntensityFrame::new(1, 1, vec![128 - (threshold - 1)]).unwrap();
        let far = IntensityFrame::new(1, 1, vec![128 - (threshold + 1)]).unwrap();

        let kept = quantize(&near, Some(&previous), &alphabet, &config(threshold)).unwrap();
        let switched = quantize(&far, Some(&previous), &alphabet, &config(threshold)).unwrap();

        assert_eq!(kept.get(0, 0), '4');
        assert_eq!(switched.get(0, 0), '3');
    }

    #[test]
    fn test_large_jumps_never_suppressed() {
        let alphabet = octal_alphabet();
        let previous = SymbolGrid::filled(1, 1, '1');
        // candidate 4, two or more steps away from 1
        let frame = IntensityFrame::new(1, 1, vec![129]).unwrap();
        let grid = quantize(&frame, Some(&previous), &alphabet, &config(255)).unwrap();
        assert_eq!(grid.get(0, 0), '4');
    }

    #[test]
    fn test_unknown_previous_symbol_skips_hysteresis() {
        let alphabet = octal_alphabet();
        let previous = SymbolGrid::filled(1, 1, 'x');
        let frame = IntensityFrame::new(1, 1, vec![130]).unwrap();
        let grid = quantize(&frame, Some(&previous), &alphabet, &config(50)).unwrap();
        assert_eq!(grid.get(0, 0), '4');
    }

    #[test]
    fn test_disabled_hysteresis() {
        let alphabet = octal_alphabet();
        let previous = SymbolGrid::filled(1, 1, '3');
        let frame = IntensityFrame::new(1, 1, vec![129]).unwrap();
        let off = HysteresisConfig {
            enabled: false,
            threshold: 50,
        };
        let grid = quantize(&frame, Some(&previous), &alphabet, &off).unwrap();
        assert_eq!(grid.get(0, 0), '4');
    }

    #[test]
    fn test_threshold_monotonicity() {
        let alphabet = octal_alphabet();
        let pixels: Vec<u8> = (0..=255).collect();
        let frame = IntensityFrame::new(16, 16, pixels.clone()).unwrap();
        // previous grid one step below every candidate where possible
        let prev_cells = pixels
            .iter()
            .map(|&p| alphabet.symbol(alphabet.index_for_intensity(p).saturating_sub(1)))
            .collect();
        let previous = SymbolGrid::from_cells(16, 16, prev_cells).unwrap();

        let mut last_held = 0;
        for threshold in [0u8, 1, 2, 4, 8, 16, 32, 64, 255] {
            let (_, held) =
                quantize_with_report(&frame, Some(&previous), &alphabet, &config(threshold))
                    .unwrap();
            assert!(held >= last_held, "threshold {} held {} < {}", threshold, held, last_held);
            last_held = held;
        }
        assert!(last_held > 0);
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        let alphabet = octal_alphabet();
        let previous = SymbolGrid::filled(2, 2, '0');
        let frame = IntensityFrame::filled(3, 2, 0);
        assert!(quantize(&frame, Some(&previous), &alphabet, &config(8)).is_err());
        assert!(IntensityFrame::new(2, 2, vec![0; 3]).is_err());
    }

    #[test]
    fn test_session_tracks_previous_grid() {
        let mut session = QuantizerSession::new(octal_alphabet(), config(8));
        let first = session.quantize(&IntensityFrame::filled(2, 2, 120)).unwrap();
        assert_eq!(first.get(0, 0), '3');

        // 130 would be '4' on its own; it is within 8 of the 128 boundary
        let second = session.quantize(&IntensityFrame::filled(2, 2, 130)).unwrap();
        assert_eq!(second.get(0, 0), '3');
        assert_eq!(session.cells_held(), 4);
        assert_eq!(session.frames_processed(), 2);

        session.reset();
        let third = session.quantize(&IntensityFrame::filled(2, 2, 130)).unwrap();
        assert_eq!(third.get(0, 0), '4');
    }

    #[test]
    fn test_clip_matches_session() {
        let alphabet = octal_alphabet();
        let frames: Vec<IntensityFrame> = [120u8, 130, 135, 140, 90]
            .iter()
            .map(|&v| IntensityFrame::filled(3, 2, v))
            .collect();

        let batch = quantize_clip(&frames, &alphabet, &config(8)).unwrap();
        let mut session = QuantizerSession::new(alphabet, config(8));
        for (frame, expected) in frames.iter().zip(&batch) {
            assert_eq!(&session.quantize(frame).unwrap(), expected);
        }
    }

    #[test]
    fn test_short_buffer_is_an_error() {
        let alphabet = octal_alphabet();
        let frame = IntensityFrame {
            data: vec![30; 5],
            width: 2,
            height: 2,
        };
        let previous = SymbolGrid::filled(2, 2, '0');
        assert!(matches!(
            quantize(&frame, Some(&previous), &alphabet, &config(8)),
            Err(CodecError::InvalidInput(_))
        ));
        assert!(matches!(
            quantize_clip(&[frame], &alphabet, &config(8)),
            Err(CodecError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_session_keeps_dimensions_across_reset() {
        let mut session = QuantizerSession::new(octal_alphabet(), config(8));
        session.quantize(&IntensityFrame::filled(3, 2, 10)).unwrap();
        assert_eq!(session.dimensions(), Some((3, 2)));

        session.reset();
        assert!(session.previous().is_none());
        assert!(matches!(
            session.quantize(&IntensityFrame::filled(4, 4, 10)),
            Err(CodecError::InvalidInput(_))
        ));
        assert!(session.quantize(&IntensityFrame::filled(3, 2, 10)).is_ok());
    }
}
