//! Row-scoped run-length coding of symbol grids.
//!
//! Runs never cross a row boundary: every row is encoded on its own and the
//! row segment lists are concatenated top to bottom.
//!
//! Wire form of a segment list: for each segment, the symbol as UTF-8
//! followed by the run length as an unsigned LEB128 varint.

use crate::grid::SymbolGrid;
use crate::DecodeError;

/// One run of identical symbols
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    pub symbol: char,
    pub run: u32,
}

impl Segment {
    pub fn new(symbol: char, run: u32) -> Self {
        Self { symbol, run }
    }
}

/// Encode a grid row by row
pub fn encode(grid: &SymbolGrid) -> Vec<Segment> {
    let mut segments = Vec::new();

    for row in grid.iter_rows() {
        let mut symbols = row.iter();
        let Some(&first) = symbols.next() else {
            continue;
        };

        let mut current = Segment::new(first, 1);
        for &symbol in symbols {
            if symbol == current.symbol {
                current.run += 1;
            } else {
                segments.push(current);
                current = Segment::new(symbol, 1);
            }
        }
        segments.push(current);
    }

    segments
}

/// Total number of symbols the segments expand to
pub fn symbol_count(segments: &[Segment]) -> usize {
    segments.iter().map(|s| s.run as usize).sum()
}

/// Replay segments into a `rows × cols` grid.
///
/// The run lengths must cover the grid exactly; a short or long list is an
/// error rather than being padded or truncated.
pub fn decode(segments: &[Segment], rows: usize, cols: usize) -> Result<SymbolGrid, DecodeError> {
    if let Some(position) = segments.iter().position(|s| s.run == 0) {
        return Err(DecodeError::Malformed(format!(
            "segment {} has a zero run length",
            position
        )));
    }

    let expected = rows * cols;
    let actual = symbol_count(segments);
    if actual != expected {
        return Err(DecodeError::SymbolCount { expected, actual });
    }

    let mut cells = Vec::with_capacity(expected);
    for segment in segments {
        cells.extend(std::iter::repeat(segment.symbol).take(segment.run as usize));
    }

    SymbolGrid::from_cells(rows, cols, cells)
        .map_err(|e| DecodeError::Malformed(e.to_string()))
}

pub(crate) fn write_varint(out: &mut Vec<u8>, mut value: u32) {
    while value >= 0x80 {
        out.push((value as u8 & 0x7F) | 0x80);
        value >>= 7;
    }
    out.push(value as u8);
}

pub(crate) fn read_varint(bytes: &[u8], pos: &mut usize) -> Result<u32, DecodeError> {
    let mut value: u32 = 0;
    for shift in (0..35).step_by(7) {
        let byte = *bytes
            .get(*pos)
            .ok_or_else(|| DecodeError::Malformed("stream ends inside a varint".to_string()))?;
        *pos += 1;

        let bits = (byte & 0x7F) as u32;
        if shift == 28 && bits > 0x0F {
            return Err(DecodeError::Malformed("varint overflows u32".to_string()));
        }
        value |= bits << shift;
        if byte & 0x80 == 0 {
            return Ok(value);
        }
    }
    Err(DecodeError::Malformed("varint longer than 5 bytes".to_string()))
}

pub(crate) fn write_symbol(out: &mut Vec<u8>, symbol: char) {
    let mut buf = [0u8; 4];
    out.extend_from_slice(symbol.encode_utf8(&mut buf).as_bytes());
}

pub(crate) fn read_symbol(bytes: &[u8], pos: &mut usize) -> Result<char, DecodeError> {
    let lead = *bytes
        .get(*pos)
        .ok_or_else(|| DecodeError::Malformed("stream ends before a symbol".to_string()))?;
    let width = match lead {
        0x00..=0x7F => 1,
        0xC0..=0xDF => 2,
        0xE0..=0xEF => 3,
        0xF0..=0xF7 => 4,
        _ => {
            return Err(DecodeError::Malformed(format!(
                "invalid UTF-8 lead byte {:#04x} at offset {}",
                lead, *pos
            )))
        }
    };

    let raw = bytes
        .get(*pos..*pos + width)
        .ok_or_else(|| DecodeError::Malformed("stream ends inside a symbol".to_string()))?;
    let symbol = std::str::from_utf8(raw)
        .ok()
        .and_then(|s| s.chars().next())
        .ok_or_else(|| DecodeError::Malformed(format!("invalid UTF-8 symbol at offset {}", *pos)))?;

    *pos += width;
    Ok(symbol)
}

/// Serialize segments to their compact wire form
pub fn to_bytes(segments: &[Segment]) -> Vec<u8> {
    let mut out = Vec::with_capacity(segments.len() * 2);
    for segment in segments {
        write_symbol(&mut out, segment.symbol);
        write_varint(&mut out, segment.run);
    }
    out
}

/// Parse the wire form back into segments
pub fn from_bytes(bytes: &[u8]) -> Result<Vec<Segment>, DecodeError> {
    let mut segments = Vec::new();
    let mut pos = 0;
    while pos < bytes.len() {
        let symbol = read_symbol(bytes, &mut pos)?;
        let run = read_varint(bytes, &mut pos)?;
        segments.push(Segment::new(symbol, run));
    }
    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flat_frame_is_one_run_per_row() {
        let grid = SymbolGrid::filled(4, 4, '@');
        let segments = encode(&grid);
        assert_eq!(segments, vec![Segment::new('@', 4); 4]);
    }

    #[test]
    fn test_runs_reset_at_row_boundaries() {
        let grid = SymbolGrid::from_lines(&["aab", "bbb"]).unwrap();
        let segments = encode(&grid);
        assert_eq!(
            segments,
            vec![
                Segment::new('a', 2),
                Segment::new('b', 1),
                Segment::new('b', 3),
            ]
        );
    }

    #[test]
    fn test_checkerboard_has_no_runs() {
        let grid = SymbolGrid::from_lines(&[" @ @", "@ @ ", " @ @", "@ @ "]).unwrap();
        let segments = encode(&grid);
        assert_eq!(segments.len(), 16);
        assert!(segments.iter().all(|s| s.run == 1));
    }

    #[test]
    fn test_roundtrip() {
        let grid = SymbolGrid::from_lines(&["  ..::", "@@@%%#", "░░▒▓██"]).unwrap();
        let decoded = decode(&encode(&grid), grid.rows(), grid.cols()).unwrap();
        assert_eq!(decoded, grid);
    }

    #[test]
    fn test_count_mismatch_is_an_error() {
        let segments = vec![Segment::new('a', 3)];
        assert!(matches!(
            decode(&segments, 2, 2),
            Err(DecodeError::SymbolCount { expected: 4, actual: 3 })
        ));

        let segments = vec![Segment::new('a', 5)];
        assert!(matches!(
            decode(&segments, 2, 2),
            Err(DecodeError::SymbolCount { expected: 4, actual: 5 })
        ));
    }

    #[test]
    fn test_zero_run_is_malformed() {
        let segments = vec![Segment::new('a', 0), Segment::new('a', 4)];
        assert!(matches!(decode(&segments, 2, 2), Err(DecodeError::Malformed(_))));
    }

    #[test]
    fn test_wire_form() {
        let segments = vec![Segment::new('@', 300), Segment::new('█', 1)];
        let bytes = to_bytes(&segments);
        // '@', 300 = 0xAC 0x02, then the 3-byte block symbol and 1
        assert_eq!(&bytes[..3], &[b'@', 0xAC, 0x02]);
        assert_eq!(bytes.len(), 3 + 3 + 1);
        assert_eq!(from_bytes(&bytes).unwrap(), segments);
    }

    #[test]
    fn test_wire_form_rejects_truncation() {
        let bytes = to_bytes(&[Segment::new('@', 300)]);
        assert!(from_bytes(&bytes[..2]).is_err());
        assert!(from_bytes(&[0xFF, 0x01]).is_err());
        assert!(from_bytes(&[b'a', 0xFF, 0xFF, 0xFF, 0xFF, 0x7F]).is_err());
    }
}
