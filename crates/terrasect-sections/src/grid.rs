//! The section grid and its spatial index.
//!
//! The grid is centred on the origin of the partition space. Cells are held in
//! an explicit row-major table; a [`CellId`] carries its column, row and
//! 1-based ordinal, and displays as the ordinal zero-padded to the digit count
//! of the total cell count, so lexical order equals raster order.

use std::fmt;

use glam::{UVec2, Vec2, Vec3};
use terrasect_config::{GenerationConfig, GenerationMode, NumberMode};

use crate::error::SectionsError;

/// Tolerance factor applied to cell sizes when matching piece centroids.
pub const CENTROID_SCALE: f32 = 0.99;

/// Identifier of one grid cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellId {
    ordinal: u32,
    col: u32,
    row: u32,
    digits: u8,
}

impl CellId {
    /// Column, counted from the lowest X.
    pub fn col(&self) -> u32 {
        self.col
    }

    /// Row, counted from the lowest Y.
    pub fn row(&self) -> u32 {
        self.row
    }

    /// 1-based row-major position of the cell.
    pub fn ordinal(&self) -> u32 {
        self.ordinal
    }
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:0width$}", self.ordinal, width = self.digits as usize)
    }
}

/// An origin-centred grid of equally sized cells over the XY plane.
#[derive(Clone, Debug, PartialEq)]
pub struct GridSpec {
    counts: UVec2,
    size: Vec2,
    digits: u8,
    centers: Vec<Vec2>,
}

impl GridSpec {
    /// Splits `footprint` into `counts` cells per axis.
    pub fn by_count(footprint: Vec2, counts: UVec2) -> Result<Self, SectionsError> {
        if !(footprint.x > 0.0 && footprint.y > 0.0) {
            return Err(SectionsError::DegenerateGrid(format!(
                "footprint {footprint} has no area"
            )));
        }
        if counts.min_element() == 0 {
            return Err(SectionsError::DegenerateGrid(format!(
                "cell counts {counts} must be positive"
            )));
        }
        Self::new(counts, footprint / counts.as_vec2())
    }

    /// Covers `footprint` with cells of `size`, rounding the per-axis count
    /// to the requested parity.
    pub fn by_size(footprint: Vec2, size: Vec2, mode: NumberMode) -> Result<Self, SectionsError> {
        if !(size.x > 0.0 && size.y > 0.0) {
            return Err(SectionsError::DegenerateGrid(format!(
                "cell size {size} must be positive"
            )));
        }
        if !(footprint.x >= 0.0 && footprint.y >= 0.0) {
            return Err(SectionsError::DegenerateGrid(format!(
                "footprint {footprint} is invalid"
            )));
        }
        let derived = (footprint / size).ceil().max(Vec2::ONE).as_uvec2();
        let counts = UVec2::new(round_count(derived.x, mode), round_count(derived.y, mode));
        Self::new(counts, size)
    }

    /// Builds the grid the generation options ask for.
    pub fn from_config(config: &GenerationConfig, footprint: Vec2) -> Result<Self, SectionsError> {
        match config.mode {
            GenerationMode::ByNumber => Self::by_count(footprint, UVec2::from(config.number)),
            GenerationMode::BySize => {
                Self::by_size(footprint, Vec2::from(config.size), config.number_mode)
            }
        }
    }

    fn new(counts: UVec2, size: Vec2) -> Result<Self, SectionsError> {
        if !size.is_finite() {
            return Err(SectionsError::DegenerateGrid(format!(
                "cell size {size} is not finite"
            )));
        }
        let total = counts.x.checked_mul(counts.y).ok_or_else(|| {
            SectionsError::DegenerateGrid(format!("{counts} cells overflow the cell count"))
        })?;
        let digits = total.to_string().len() as u8;

        let mut centers = Vec::with_capacity(total as usize);
        for row in 0..counts.y {
            let y = 0.5 * size.y * (2.0 * row as f32 + 1.0 - counts.y as f32);
            for col in 0..counts.x {
                let x = 0.5 * size.x * (2.0 * col as f32 + 1.0 - counts.x as f32);
                centers.push(Vec2::new(x, y));
            }
        }

        Ok(Self {
            counts,
            size,
            digits,
            centers,
        })
    }

    /// Cells per axis.
    pub fn counts(&self) -> UVec2 {
        self.counts
    }

    /// Cell size per axis.
    pub fn size(&self) -> Vec2 {
        self.size
    }

    /// Total covered extent (`counts * size`).
    pub fn extent(&self) -> Vec2 {
        self.counts.as_vec2() * self.size
    }

    /// Total number of cells.
    pub fn cell_count(&self) -> usize {
        self.centers.len()
    }

    /// Width of a displayed [`CellId`].
    pub fn digits(&self) -> usize {
        self.digits as usize
    }

    /// The cell at `(col, row)`, if inside the grid.
    pub fn cell(&self, col: u32, row: u32) -> Option<CellId> {
        (col < self.counts.x && row < self.counts.y).then(|| CellId {
            ordinal: row * self.counts.x + col + 1,
            col,
            row,
            digits: self.digits,
        })
    }

    /// Every cell in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = CellId> + '_ {
        (0..self.counts.y)
            .flat_map(move |row| (0..self.counts.x).filter_map(move |col| self.cell(col, row)))
    }

    /// Centre of a cell in the XY plane.
    pub fn center(&self, cell: &CellId) -> Vec2 {
        self.centers[(cell.ordinal - 1) as usize]
    }

    /// Centre of a cell at `z = 0`.
    pub fn center3(&self, cell: &CellId) -> Vec3 {
        self.center(cell).extend(0.0)
    }

    /// Parses a displayed cell id back to its cell.
    pub fn parse_cell(&self, id: &str) -> Option<CellId> {
        if id.len() != self.digits() {
            return None;
        }
        let ordinal: u32 = id.parse().ok()?;
        let index = ordinal.checked_sub(1)?;
        self.cell(index % self.counts.x, index / self.counts.x)
    }

    /// The cell whose rectangle contains `point`, edges included.
    pub fn locate_cell(&self, point: Vec2) -> Option<CellId> {
        self.locate_cell_scaled(point, 1.0)
    }

    /// The first cell, in row-major order, whose rectangle scaled by `scale`
    /// about its centre contains `point`.
    pub fn locate_cell_scaled(&self, point: Vec2, scale: f32) -> Option<CellId> {
        let half = 0.5 * self.size * scale;
        self.cells()
            .find(|cell| (point - self.center(cell)).abs().cmple(half).all())
    }

    /// X coordinates of the `counts.x + 1` vertical cut planes.
    pub fn planes_x(&self) -> impl Iterator<Item = f32> + '_ {
        (0..=self.counts.x).map(|i| (i as f32 - 0.5 * self.counts.x as f32) * self.size.x)
    }

    /// Y coordinates of the `counts.y + 1` horizontal cut planes.
    pub fn planes_y(&self) -> impl Iterator<Item = f32> + '_ {
        (0..=self.counts.y).map(|i| (i as f32 - 0.5 * self.counts.y as f32) * self.size.y)
    }
}

fn round_count(n: u32, mode: NumberMode) -> u32 {
    match mode {
        NumberMode::Automatic => n,
        NumberMode::Even if n % 2 == 0 => n,
        NumberMode::Odd if n % 2 == 1 => n,
        NumberMode::Even | NumberMode::Odd => n + 1,
    }
}
