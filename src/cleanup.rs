//! Symbol-grid cleanup applied to a whole clip before compression.
//!
//! Four stages, each optional, always in this order:
//! 1. isolated-symbol replacement (3x3 neighbourhood)
//! 2. run consolidation (`A A B A A` -> `A A A A A` per row)
//! 3. temporal smoothing (`A B A` flicker across three frames)
//! 4. spatial coherence filtering (5x5 neighbourhood)
//!
//! Every stage reads its input as a snapshot and produces replacement grids,
//! so a cell's outcome never depends on cells already rewritten by the same
//! stage. Spatial stages run per frame in parallel.

use crate::alphabet::Alphabet;
use crate::config::CleanupConfig;
use crate::grid::SymbolGrid;
use log::{debug, log, Level};
use rayon::prelude::*;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupStage {
    IsolatedReplacement,
    RunConsolidation,
    TemporalSmoothing,
    SpatialCoherence,
}

impl CleanupStage {
    pub const ALL: [CleanupStage; 4] = [
        CleanupStage::IsolatedReplacement,
        CleanupStage::RunConsolidation,
        CleanupStage::TemporalSmoothing,
        CleanupStage::SpatialCoherence,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            CleanupStage::IsolatedReplacement => "isolated-symbol replacement",
            CleanupStage::RunConsolidation => "run consolidation",
            CleanupStage::TemporalSmoothing => "temporal smoothing",
            CleanupStage::SpatialCoherence => "spatial coherence filtering",
        }
    }

    fn enabled(&self, config: &CleanupConfig) -> bool {
        match self {
            CleanupStage::IsolatedReplacement => config.enable_isolated_replacement,
            CleanupStage::RunConsolidation => config.enable_run_consolidation,
            CleanupStage::TemporalSmoothing => config.enable_temporal_smoothing,
            CleanupStage::SpatialCoherence => config.enable_spatial_coherence,
        }
    }
}

/// Corrected-cell counts per stage
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    /// Cells across the whole clip
    pub total_cells: usize,
    pub isolated_replacement: usize,
    pub run_consolidation: usize,
    pub temporal_smoothing: usize,
    pub spatial_coherence: usize,
}

impl CleanupReport {
    pub fn count(&self, stage: CleanupStage) -> usize {
        match stage {
            CleanupStage::IsolatedReplacement => self.isolated_replacement,
            CleanupStage::RunConsolidation => self.run_consolidation,
            CleanupStage::TemporalSmoothing => self.temporal_smoothing,
            CleanupStage::SpatialCoherence => self.spatial_coherence,
        }
    }

    fn count_mut(&mut self, stage: CleanupStage) -> &mut usize {
        match stage {
            CleanupStage::IsolatedReplacement => &mut self.isolated_replacement,
            CleanupStage::RunConsolidation => &mut self.run_consolidation,
            CleanupStage::TemporalSmoothing => &mut self.temporal_smoothing,
            CleanupStage::SpatialCoherence => &mut self.spatial_coherence,
        }
    }

    pub fn total_changes(&self) -> usize {
        CleanupStage::ALL.iter().map(|&s| self.count(s)).sum()
    }

    /// Share of all cells changed by one stage, in percent
    pub fn percent(&self, stage: CleanupStage) -> f64 {
        percent_of(self.count(stage), self.total_cells)
    }

    pub fn total_percent(&self) -> f64 {
        percent_of(self.total_changes(), self.total_cells)
    }
}

fn percent_of(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 * 100.0 / total as f64
    }
}

impl fmt::Display for CleanupReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for stage in CleanupStage::ALL {
            writeln!(
                f,
                "  {:<28} {:>8} ({:.2}%)",
                stage.name(),
                self.count(stage),
                self.percent(stage)
            )?;
        }
        write!(
            f,
            "  {:<28} {:>8} ({:.2}%)",
            "total",
            self.total_changes(),
            self.total_percent()
        )
    }
}

/// Symbol counts in first-seen order
fn tally(symbols: impl Iterator<Item = char>) -> Vec<(char, usize)> {
    let mut counts: Vec<(char, usize)> = Vec::with_capacity(8);
    for symbol in symbols {
        match counts.iter_mut().find(|(s, _)| *s == symbol) {
            Some((_, count)) => *count += 1,
            None => counts.push((symbol, 1)),
        }
    }
    counts
}

/// Most frequent entry; ties go to the symbol seen first
fn majority(counts: &[(char, usize)]) -> Option<(char, usize)> {
    counts
        .iter()
        .fold(None, |best: Option<(char, usize)>, &(symbol, count)| match best {
            Some((_, best_count)) if best_count >= count => best,
            _ => Some((symbol, count)),
        })
}

fn count_of(counts: &[(char, usize)], symbol: char) -> usize {
    counts
        .iter()
        .find(|(s, _)| *s == symbol)
        .map(|&(_, c)| c)
        .unwrap_or(0)
}

/// Symbols within `radius` of a cell (Chebyshev distance), excluding the cell
fn neighbourhood(grid: &SymbolGrid, row: usize, col: usize, radius: usize) -> Vec<char> {
    let row_start = row.saturating_sub(radius);
    let row_end = (row + radius).min(grid.rows() - 1);
    let col_start = col.saturating_sub(radius);
    let col_end = (col + radius).min(grid.cols() - 1);

    let mut symbols = Vec::with_capacity((2 * radius + 1).pow(2));
    for r in row_start..=row_end {
        for c in col_start..=col_end {
            if r != row || c != col {
                symbols.push(grid.get(r, c));
            }
        }
    }
    symbols
}

/// A cell is outvoted when fewer than `1 / MINORITY_DIVISOR` of its
/// neighbours share its symbol
const MINORITY_DIVISOR: usize = 4;

/// Stage 1: replace a symbol its 8 neighbours do not back up.
///
/// A cell changes when its own symbol is absent or a minority among the
/// neighbours (fewer than a quarter of them share it), and the neighbourhood
/// majority covers at least half of the neighbours. Cells with fewer than 3
/// neighbours are left alone.
pub fn replace_isolated(grid: &SymbolGrid) -> (SymbolGrid, usize) {
    let mut out = grid.clone();
    let mut changed = 0;

    for row in 0..grid.rows() {
        for col in 0..grid.cols() {
            let neighbours = neighbourhood(grid, row, col, 1);
            if neighbours.len() < 3 {
                continue;
            }

            let counts = tally(neighbours.iter().copied());
            let Some((major, major_count)) = majority(&counts) else {
                continue;
            };
            let symbol = grid.get(row, col);
            let own = count_of(&counts, symbol);

            let outvoted = own * MINORITY_DIVISOR < neighbours.len();
            if outvoted && major != symbol && major_count >= neighbours.len() / 2 {
                out.set(row, col, major);
                changed += 1;
            }
        }
    }

    (out, changed)
}

/// Collapse every `A A B A A` in a row to `A A A A A` until none remain
pub fn consolidate_row(row: &[char]) -> Vec<char> {
    let mut current = row.to_vec();
    if current.len() < 5 {
        return current;
    }

    loop {
        let mut next = Vec::with_capacity(current.len());
        let mut changed = false;
        let mut i = 0;

        while i < current.len() {
            if i + 4 < current.len() {
                let a = current[i];
                if current[i + 1] == a
                    && current[i + 3] == a
                    && current[i + 4] == a
                    && current[i + 2] != a
                {
                    next.extend_from_slice(&[a; 5]);
                    i += 5;
                    changed = true;
                    continue;
                }
            }
            next.push(current[i]);
            i += 1;
        }

        current = next;
        if !changed {
            return current;
        }
    }
}

/// Stage 2: run consolidation over every row of a grid
pub fn consolidate_runs(grid: &SymbolGrid) -> (SymbolGrid, usize) {
    let mut out = grid.clone();
    let mut changed = 0;

    for row in 0..grid.rows() {
        let consolidated = consolidate_row(grid.row(row));
        let target = out.row_mut(row);
        changed += target
            .iter()
            .zip(&consolidated)
            .filter(|(a, b)| a != b)
            .count();
        target.copy_from_slice(&consolidated);
    }

    (out, changed)
}

/// Stage 3: undo one-frame flicker between two identical frames.
///
/// A cell at `t` is rewritten when `t-1` and `t+1` agree, `t` differs, and
/// the symbol at `t` is one alphabet step from the flanking symbol. The first
/// and last frames are never rewritten; clips shorter than 3 frames pass
/// through untouched.
pub fn smooth_temporal(grids: &[SymbolGrid], alphabet: &Alphabet) -> (Vec<SymbolGrid>, usize) {
    if grids.len() < 3 {
        return (grids.to_vec(), 0);
    }

    let middle: Vec<(SymbolGrid, usize)> = (1..grids.len() - 1)
        .into_par_iter()
        .map(|t| {
            let (prev, curr, next) = (&grids[t - 1], &grids[t], &grids[t + 1]);
            let mut out = curr.clone();
            if !(prev.same_shape(curr) && next.same_shape(curr)) {
                return (out, 0);
            }
            let mut changed = 0;

            for (i, cell) in out.cells_mut().iter_mut().enumerate() {
                let before = prev.cells()[i];
                let after = next.cells()[i];
                if before == after && *cell != before && alphabet.are_adjacent(*cell, before) {
                    *cell = before;
                    changed += 1;
                }
            }
            (out, changed)
        })
        .collect();

    let changed = middle.iter().map(|(_, c)| c).sum();
    let mut out = Vec::with_capacity(grids.len());
    out.push(grids[0].clone());
    out.extend(middle.into_iter().map(|(grid, _)| grid));
    out.push(grids[grids.len() - 1].clone());

    (out, changed)
}

/// Does `symbol` belong in its radius-2 neighbourhood?
///
/// It fits when it makes up at least `coherence` of the neighbours, or when
/// the neighbourhood is too mixed (majority share below `uniformity`) for an
/// outlier to stand out.
fn fits_context(symbol: char, counts: &[(char, usize)], total: usize, config: &CleanupConfig) -> bool {
    if total == 0 {
        return true;
    }

    let frequency = count_of(counts, symbol) as f64 / total as f64;
    if frequency >= config.spatial_coherence_threshold {
        return true;
    }

    let uniformity = majority(counts).map(|(_, c)| c).unwrap_or(0) as f64 / total as f64;
    uniformity < config.spatial_uniformity_threshold
}

/// Stage 4: replace salt-and-pepper outliers in otherwise uniform areas
pub fn filter_spatial_coherence(grid: &SymbolGrid, config: &CleanupConfig) -> (SymbolGrid, usize) {
    let mut out = grid.clone();
    let mut changed = 0;

    for row in 0..grid.rows() {
        for col in 0..grid.cols() {
            let symbol = grid.get(row, col);
            let context = neighbourhood(grid, row, col, 2);
            let counts = tally(context.iter().copied());

            if fits_context(symbol, &counts, context.len(), config) || config.is_feature_symbol(symbol) {
                continue;
            }

            if let Some((replacement, _)) = majority(&counts) {
                if replacement != symbol {
                    out.set(row, col, replacement);
                    changed += 1;
                }
            }
        }
    }

    (out, changed)
}

/// Apply a spatial stage to every frame in parallel, keeping frame order
fn per_frame<F>(grids: &mut Vec<SymbolGrid>, stage: F) -> usize
where
    F: Fn(&SymbolGrid) -> (SymbolGrid, usize) + Sync + Send,
{
    let results: Vec<(SymbolGrid, usize)> = grids.par_iter().map(stage).collect();
    let changed = results.iter().map(|(_, c)| c).sum();
    *grids = results.into_iter().map(|(g, _)| g).collect();
    changed
}

/// Runs the enabled cleanup stages over a clip
#[derive(Debug, Clone)]
pub struct CleanupPipeline {
    config: CleanupConfig,
    alphabet: Alphabet,
}

impl CleanupPipeline {
    pub fn new(config: CleanupConfig, alphabet: Alphabet) -> Self {
        Self { config, alphabet }
    }

    pub fn config(&self) -> &CleanupConfig {
        &self.config
    }

    /// Clean every grid of the clip; grids are replaced stage by stage
    pub fn run(&self, grids: &mut Vec<SymbolGrid>) -> CleanupReport {
        let mut report = CleanupReport {
            total_cells: grids.iter().map(|g| g.len()).sum(),
            ..Default::default()
        };
        if grids.is_empty() {
            return report;
        }

        let level = if self.config.verbose { Level::Info } else { Level::Debug };
        log!(
            level,
            "Symbol cleanup: {} frames ({}x{})",
            grids.len(),
            grids[0].cols(),
            grids[0].rows()
        );

        for stage in CleanupStage::ALL {
            if !stage.enabled(&self.config) {
                debug!("Skipping {}", stage.name());
                continue;
            }

            let changed = self.run_stage(stage, grids);
            *report.count_mut(stage) += changed;
            log!(
                level,
                "  {}: {} corrections ({:.2}%)",
                stage.name(),
                changed,
                report.percent(stage)
            );
        }

        log!(
            level,
            "Symbol cleanup: {} corrections ({:.2}%)",
            report.total_changes(),
            report.total_percent()
        );
        report
    }

    fn run_stage(&self, stage: CleanupStage, grids: &mut Vec<SymbolGrid>) -> usize {
        match stage {
            CleanupStage::IsolatedReplacement => per_frame(grids, replace_isolated),
            CleanupStage::RunConsolidation => per_frame(grids, consolidate_runs),
            CleanupStage::SpatialCoherence => {
                per_frame(grids, |g| filter_spatial_coherence(g, &self.config))
            }
            CleanupStage::TemporalSmoothing => {
                let (smoothed, changed) = smooth_temporal(grids, &self.alphabet);
                *grids = smoothed;
                changed
            }
        }
    }
}
