use crate::{CodecError, Result, DEFAULT_ASCII_RAMP};
use std::collections::HashMap;

/// Ordered symbol set, index 0 is the darkest intensity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alphabet {
    symbols: Vec<char>,
    lookup: HashMap<char, usize>,
}

impl Alphabet {
    /// Build an alphabet from symbols ordered dark to light.
    ///
    /// Needs at least two symbols, no repeats, and at most 256 entries so a
    /// symbol index always fits in a byte.
    pub fn new(symbols: &[char]) -> Result<Self> {
        if symbols.len() < 2 {
            return Err(CodecError::InvalidConfig(format!(
                "alphabet needs at least 2 symbols, got {}",
                symbols.len()
            )));
        }
        if symbols.len() > 256 {
            return Err(CodecError::InvalidConfig(format!(
                "alphabet has {} symbols, at most 256 are supported",
                symbols.len()
            )));
        }

        let mut lookup = HashMap::with_capacity(symbols.len());
        for (index, &symbol) in symbols.iter().enumerate() {
            if lookup.insert(symbol, index).is_some() {
                return Err(CodecError::InvalidConfig(format!(
                    "alphabet symbol {:?} appears more than once",
                    symbol
                )));
            }
        }

        Ok(Self {
            symbols: symbols.to_vec(),
            lookup,
        })
    }

    /// Parse an alphabet from a string, one symbol per char
    pub fn from_str_symbols(symbols: &str) -> Result<Self> {
        let chars: Vec<char> = symbols.chars().collect();
        Self::new(&chars)
    }

    /// Same symbols in the opposite order.
    ///
    /// Index 0 still means darkest; only the symbol drawn for each intensity flips.
    pub fn reversed(&self) -> Self {
        let symbols: Vec<char> = self.symbols.iter().rev().copied().collect();
        let lookup = symbols.iter().enumerate().map(|(i, &c)| (c, i)).collect();
        Self { symbols, lookup }
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn symbols(&self) -> &[char] {
        &self.symbols
    }

    /// Symbol for an intensity index, clamped to the last entry
    pub fn symbol(&self, index: usize) -> char {
        self.symbols[index.min(self.symbols.len() - 1)]
    }

    pub fn index_of(&self, symbol: char) -> Option<usize> {
        self.lookup.get(&symbol).copied()
    }

    pub fn contains(&self, symbol: char) -> bool {
        self.lookup.contains_key(&symbol)
    }

    /// True when both symbols are in the alphabet and at most one step apart
    pub fn are_adjacent(&self, a: char, b: char) -> bool {
        match (self.index_of(a), self.index_of(b)) {
            (Some(i), Some(j)) => i.abs_diff(j) <= 1,
            _ => false,
        }
    }

    /// Candidate index for a pixel: `floor(pixel * N / 256)`, clamped
    pub fn index_for_intensity(&self, pixel: u8) -> usize {
        let n = self.symbols.len();
        ((pixel as usize * n) / 256).min(n - 1)
    }

    /// Intensity at the boundary between `index` and `index + 1`
    pub fn upper_boundary(&self, index: usize) -> f64 {
        (index + 1) as f64 * (256.0 / self.symbols.len() as f64)
    }

    /// Symbols as a string, in order
    pub fn as_string(&self) -> String {
        self.symbols.iter().collect()
    }
}

impl Default for Alphabet {
    fn default() -> Self {
        let symbols = DEFAULT_ASCII_RAMP.to_vec();
        let lookup = symbols.iter().enumerate().map(|(i, &c)| (c, i)).collect();
        Self { symbols, lookup }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_short_and_duplicate_alphabets() {
        assert!(Alphabet::new(&['@']).is_err());
        assert!(Alphabet::new(&[]).is_err());
        assert!(Alphabet::new(&[' ', '.', ' ']).is_err());
        assert!(Alphabet::new(&[' ', '@']).is_ok());
    }

    #[test]
    fn test_intensity_mapping_extremes() {
        let alphabet = Alphabet::default();
        assert_eq!(alphabet.index_for_intensity(0), 0);
        assert_eq!(alphabet.index_for_intensity(255), alphabet.len() - 1);
        // 10 symbols: each bucket is 25.6 wide
        assert_eq!(alphabet.index_for_intensity(25), 0);
        assert_eq!(alphabet.index_for_intensity(26), 1);
    }

    #[test]
    fn test_reversed_keeps_index_meaning() {
        let alphabet = Alphabet::default();
        let reversed = alphabet.reversed();

        assert_eq!(reversed.len(), alphabet.len());
        assert_eq!(reversed.symbol(0), '@');
        assert_eq!(reversed.symbol(reversed.len() - 1), ' ');
        assert_eq!(reversed.index_of('@'), Some(0));
        assert_eq!(reversed.index_for_intensity(0), 0);
    }

    #[test]
    fn test_adjacency() {
        let alphabet = Alphabet::default();
        assert!(alphabet.are_adjacent('.', ':'));
        assert!(alphabet.are_adjacent(':', ':'));
        assert!(!alphabet.are_adjacent('.', '='));
        assert!(!alphabet.are_adjacent('.', 'X'));
    }

    #[test]
    fn test_boundary_position() {
        let alphabet = Alphabet::new(&['a', 'b', 'c', 'd', 'e', 'f', 'g', 'h']).unwrap();
        assert_eq!(alphabet.upper_boundary(3), 128.0);
        assert_eq!(alphabet.upper_boundary(0), 32.0);
    }
}
