use crate::grid::SymbolGrid;
use anyhow::Result;
use crossterm::{
    cursor::{Hide, MoveTo, Show},
    execute, queue,
    style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor},
    terminal::{disable_raw_mode, enable_raw_mode, Clear, ClearType},
};
use log::debug;
use std::io::{stdout, Stdout, Write};
use std::time::Duration;

/// Shrink a grid to fit `max_cols × max_rows` by nearest-neighbour sampling.
///
/// Both axes are scaled by the same factor so the picture keeps its shape;
/// grids that already fit are returned unchanged.
pub fn fit_grid(grid: &SymbolGrid, max_cols: usize, max_rows: usize) -> SymbolGrid {
    if grid.is_empty() || (grid.cols() <= max_cols && grid.rows() <= max_rows) {
        return grid.clone();
    }

    let scale = (max_cols as f64 / grid.cols() as f64).min(max_rows as f64 / grid.rows() as f64);
    let cols = ((grid.cols() as f64 * scale) as usize).clamp(1, max_cols.max(1));
    let rows = ((grid.rows() as f64 * scale) as usize).clamp(1, max_rows.max(1));

    let x_ratio = grid.cols() as f64 / cols as f64;
    let y_ratio = grid.rows() as f64 / rows as f64;

    let mut fitted = SymbolGrid::filled(rows, cols, ' ');
    for y in 0..rows {
        let src_y = ((y as f64 * y_ratio) as usize).min(grid.rows() - 1);
        for x in 0..cols {
            let src_x = ((x as f64 * x_ratio) as usize).min(grid.cols() - 1);
            fitted.set(y, x, grid.get(src_y, src_x));
        }
    }
    fitted
}

/// Terminal renderer for decoded symbol grids
pub struct Renderer {
    stdout: Stdout,
    center_output: bool,
    terminal_width: u16,
    terminal_height: u16,
    active: bool,
}

impl Renderer {
    /// Create a renderer sized to the current terminal
    pub fn new() -> Result<Self> {
        let (terminal_width, terminal_height) = crossterm::terminal::size()?;
        Ok(Self::with_dimensions(terminal_width, terminal_height))
    }

    /// Create a renderer for a terminal of known size
    pub fn with_dimensions(terminal_width: u16, terminal_height: u16) -> Self {
        Self {
            stdout: stdout(),
            center_output: true,
            terminal_width,
            terminal_height,
            active: false,
        }
    }

    /// Initialize the terminal for rendering
    pub fn init(&mut self) -> Result<()> {
        enable_raw_mode()?;
        execute!(self.stdout, Hide, Clear(ClearType::All))?;
        self.active = true;
        debug!("Terminal initialized for rendering");
        Ok(())
    }

    /// Restore terminal to normal state
    pub fn cleanup(&mut self) -> Result<()> {
        execute!(self.stdout, Show, ResetColor, Clear(ClearType::All), MoveTo(0, 0))?;
        disable_raw_mode()?;
        self.active = false;
        debug!("Terminal restored to normal state");
        Ok(())
    }

    /// Update terminal dimensions
    pub fn update_dimensions(&mut self) -> Result<(u16, u16)> {
        let (width, height) = crossterm::terminal::size()?;
        self.terminal_width = width;
        self.terminal_height = height;
        debug!("Terminal dimensions updated: {}x{}", width, height);
        Ok((width, height))
    }

    pub fn dimensions(&self) -> (u16, u16) {
        (self.terminal_width, self.terminal_height)
    }

    pub fn set_centering(&mut self, center: bool) {
        self.center_output = center;
    }

    /// Area left for the picture when one row is kept for the status line
    fn drawable_area(&self) -> (usize, usize) {
        (
            self.terminal_width as usize,
            self.terminal_height.saturating_sub(1) as usize,
        )
    }

    /// Top-left corner that centres a `cols × rows` picture
    fn offsets(&self, cols: usize, rows: usize) -> (u16, u16) {
        if !self.center_output {
            return (0, 0);
        }
        let (area_cols, area_rows) = self.drawable_area();
        (
            (area_cols.saturating_sub(cols) / 2) as u16,
            (area_rows.saturating_sub(rows) / 2) as u16,
        )
    }

    /// Render a grid, scaled down to the terminal if needed
    pub fn render_grid(&mut self, grid: &SymbolGrid) -> Result<()> {
        let start_time = std::time::Instant::now();
        let (area_cols, area_rows) = self.drawable_area();
        let fitted = fit_grid(grid, area_cols, area_rows);
        let (offset_x, offset_y) = self.offsets(fitted.cols(), fitted.rows());

        queue!(self.stdout, Clear(ClearType::All))?;
        for (y, row) in fitted.iter_rows().enumerate() {
            let line: String = row.iter().collect();
            queue!(self.stdout, MoveTo(offset_x, offset_y + y as u16), Print(line))?;
        }
        self.stdout.flush()?;

        debug!(
            "Frame rendered in {}ms ({}x{} -> {}x{} at offset {},{})",
            start_time.elapsed().as_millis(),
            grid.cols(),
            grid.rows(),
            fitted.cols(),
            fitted.rows(),
            offset_x,
            offset_y
        );
        Ok(())
    }

    /// Render a grid with a status line on the bottom row
    pub fn render_grid_with_status(&mut self, grid: &SymbolGrid, status: &str) -> Result<()> {
        self.render_grid(grid)?;

        if !status.is_empty() {
            let status_y = self.terminal_height.saturating_sub(1);
            let truncated: String = status.chars().take(self.terminal_width as usize).collect();
            queue!(
                self.stdout,
                MoveTo(0, status_y),
                SetForegroundColor(Color::White),
                SetBackgroundColor(Color::DarkGrey),
                Print(truncated),
                ResetColor
            )?;
            self.stdout.flush()?;
        }

        Ok(())
    }

    /// Display a message in the center of the screen
    pub fn display_message(&mut self, message: &str) -> Result<()> {
        let lines: Vec<&str> = message.lines().collect();
        let start_y = (self.terminal_height / 2).saturating_sub(lines.len() as u16 / 2);

        queue!(self.stdout, Clear(ClearType::All))?;
        for (i, line) in lines.iter().enumerate() {
            let x = (self.terminal_width / 2).saturating_sub(line.chars().count() as u16 / 2);
            queue!(
                self.stdout,
                MoveTo(x, start_y + i as u16),
                SetForegroundColor(Color::Yellow),
                Print(line),
                ResetColor
            )?;
        }
        self.stdout.flush()?;

        debug!("Message displayed: {}", message);
        Ok(())
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        if self.active {
            let _ = self.cleanup();
        }
    }
}

/// Delay between frames for a clip's frame rate and a speed multiplier
pub fn calculate_frame_delay(target_fps: f64, speed_multiplier: f64) -> Duration {
    let effective_fps = target_fps * speed_multiplier;
    if !(effective_fps.is_finite() && effective_fps > 0.0) {
        return Duration::ZERO;
    }
    let frame_time_ms = 1000.0 / effective_fps;
    Duration::from_millis(frame_time_ms as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_delay_calculation() {
        let delay = calculate_frame_delay(30.0, 1.0);
        assert_eq!(delay.as_millis(), 33); // ~33ms for 30 FPS

        let delay_2x = calculate_frame_delay(30.0, 2.0);
        assert_eq!(delay_2x.as_millis(), 16); // ~16ms for 60 FPS (2x speed)

        assert_eq!(calculate_frame_delay(0.0, 1.0), Duration::ZERO);
    }

    #[test]
    fn test_fit_grid_keeps_small_grids() {
        let grid = SymbolGrid::from_lines(&["ab", "cd"]).unwrap();
        assert_eq!(fit_grid(&grid, 80, 24), grid);
    }

    #[test]
    fn test_fit_grid_scales_uniformly() {
        let grid = SymbolGrid::from_lines(&["aabb", "aabb", "ccdd", "ccdd"]).unwrap();
        let fitted = fit_grid(&grid, 2, 10);
        assert_eq!(fitted.to_lines(), vec!["ab", "cd"]);
    }

    #[test]
    fn test_fit_grid_never_exceeds_area() {
        let grid = SymbolGrid::filled(37, 120, '#');
        let fitted = fit_grid(&grid, 80, 23);
        assert!(fitted.cols() <= 80);
        assert!(fitted.rows() <= 23);
        assert!(fitted.cols() > 0 && fitted.rows() > 0);
    }

    #[test]
    fn test_centering_offsets() {
        let mut renderer = Renderer::with_dimensions(80, 25);
        assert_eq!(renderer.offsets(40, 12), (20, 6));
        assert_eq!(renderer.offsets(100, 30), (0, 0));

        renderer.set_centering(false);
        assert_eq!(renderer.offsets(40, 12), (0, 0));
    }
}
