use crate::{CodecError, Result};
use std::fmt;

/// One quantized frame: `rows × cols` symbols stored row-major
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolGrid {
    rows: usize,
    cols: usize,
    cells: Vec<char>,
}

impl SymbolGrid {
    /// Grid of `rows × cols` copies of one symbol
    pub fn filled(rows: usize, cols: usize, symbol: char) -> Self {
        Self {
            rows,
            cols,
            cells: vec![symbol; rows * cols],
        }
    }

    /// Wrap row-major cells; the length must be exactly `rows * cols`
    pub fn from_cells(rows: usize, cols: usize, cells: Vec<char>) -> Result<Self> {
        if cells.len() != rows * cols {
            return Err(CodecError::InvalidInput(format!(
                "grid of {}x{} needs {} cells, got {}",
                cols,
                rows,
                rows * cols,
                cells.len()
            )));
        }
        Ok(Self { rows, cols, cells })
    }

    /// Build a grid from text lines; every line must have the same length
    pub fn from_lines<S: AsRef<str>>(lines: &[S]) -> Result<Self> {
        let rows = lines.len();
        let cols = lines.first().map(|l| l.as_ref().chars().count()).unwrap_or(0);
        let mut cells = Vec::with_capacity(rows * cols);

        for (row, line) in lines.iter().enumerate() {
            let before = cells.len();
            cells.extend(line.as_ref().chars());
            if cells.len() - before != cols {
                return Err(CodecError::InvalidInput(format!(
                    "row {} has {} symbols, expected {}",
                    row,
                    cells.len() - before,
                    cols
                )));
            }
        }

        Ok(Self { rows, cols, cells })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Number of symbols in the grid
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> char {
        self.cells[row * self.cols + col]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, symbol: char) {
        self.cells[row * self.cols + col] = symbol;
    }

    pub fn row(&self, row: usize) -> &[char] {
        &self.cells[row * self.cols..(row + 1) * self.cols]
    }

    pub fn row_mut(&mut self, row: usize) -> &mut [char] {
        &mut self.cells[row * self.cols..(row + 1) * self.cols]
    }

    /// Iterate rows top to bottom
    pub fn iter_rows(&self) -> impl Iterator<Item = &[char]> {
        // chunks_exact panics on 0, and a 0-column grid has no cells to yield
        self.cells.chunks_exact(self.cols.max(1))
    }

    pub fn cells(&self) -> &[char] {
        &self.cells
    }

    pub fn cells_mut(&mut self) -> &mut [char] {
        &mut self.cells
    }

    pub fn same_shape(&self, other: &SymbolGrid) -> bool {
        self.rows == other.rows && self.cols == other.cols
    }

    /// Count of cells that differ from `other`; grids must share a shape
    pub fn diff_count(&self, other: &SymbolGrid) -> usize {
        self.cells
            .iter()
            .zip(other.cells.iter())
            .filter(|(a, b)| a != b)
            .count()
    }

    /// Rows as strings, top to bottom
    pub fn to_lines(&self) -> Vec<String> {
        self.iter_rows().map(|row| row.iter().collect()).collect()
    }
}

impl fmt::Display for SymbolGrid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, row) in self.iter_rows().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            for symbol in row {
                write!(f, "{}", symbol)?;
            }
        }
        Ok(())
    }
}
