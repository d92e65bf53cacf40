//! Occupancy grid and footprint math.
//!
//! All functions operate on an explicit [`Grid`] value. Mutations that must be
//! all-or-nothing go through a [`GridTransaction`], which records every cell it
//! overwrites and restores them unless the transaction is committed.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;
use thiserror::Error;

use crate::catalog::Item;
use crate::constants::{DAY_GRID_COLS, DAY_GRID_ROWS, WEEK_GRID_COLS, WEEK_GRID_ROWS};

/// Grid mode determines the grid dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum GridMode {
    #[default]
    Day,
    Week,
}

impl GridMode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::Week => "week",
        }
    }

    /// `(cols, rows)` for the mode.
    #[must_use]
    pub const fn dimensions(self) -> (usize, usize) {
        match self {
            Self::Day => (DAY_GRID_COLS, DAY_GRID_ROWS),
            Self::Week => (WEEK_GRID_COLS, WEEK_GRID_ROWS),
        }
    }
}

impl fmt::Display for GridMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unique identity of one physical placement.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(pub String);

impl InstanceId {
    #[must_use]
    pub fn new(value: &str) -> Self {
        Self(value.trim().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Column/row pair on the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellPos {
    pub col: i32,
    pub row: i32,
}

impl CellPos {
    #[must_use]
    pub const fn new(col: i32, row: i32) -> Self {
        Self { col, row }
    }

    /// Chebyshev distance, so diagonal neighbours are at distance 1.
    #[must_use]
    pub const fn chebyshev(self, other: Self) -> u32 {
        let dc = self.col.abs_diff(other.col);
        let dr = self.row.abs_diff(other.row);
        if dc > dr { dc } else { dr }
    }
}

/// Footprint cells stored inline for the common small item sizes.
pub type Footprint = SmallVec<[CellPos; 8]>;

/// One grid cell.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    #[serde(default)]
    pub occupant: Option<InstanceId>,
}

impl Cell {
    #[must_use]
    pub const fn is_occupied(&self) -> bool {
        self.occupant.is_some()
    }
}

/// Reason a footprint cannot be placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitError {
    OutOfBounds,
    Overlap,
}

/// Row-major occupancy matrix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawGrid")]
pub struct Grid {
    cols: usize,
    rows: usize,
    cells: Vec<Cell>,
}

#[derive(Deserialize)]
struct RawGrid {
    cols: usize,
    rows: usize,
    cells: Vec<Cell>,
}

/// A persisted grid whose cell list does not match its dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("grid of {cols}x{rows} carries {cells} cells")]
pub struct GridShapeError {
    pub cols: usize,
    pub rows: usize,
    pub cells: usize,
}

impl TryFrom<RawGrid> for Grid {
    type Error = GridShapeError;

    fn try_from(raw: RawGrid) -> Result<Self, Self::Error> {
        if raw.cols.checked_mul(raw.rows) != Some(raw.cells.len()) {
            return Err(GridShapeError {
                cols: raw.cols,
                rows: raw.rows,
                cells: raw.cells.len(),
            });
        }
        Ok(Self {
            cols: raw.cols,
            rows: raw.rows,
            cells: raw.cells,
        })
    }
}

impl Grid {
    /// Grid of the mode's dimensions with every cell unoccupied.
    #[must_use]
    pub fn empty(mode: GridMode) -> Self {
        let (cols, rows) = mode.dimensions();
        Self::with_size(cols, rows)
    }

    #[must_use]
    pub fn with_size(cols: usize, rows: usize) -> Self {
        Self {
            cols,
            rows,
            cells: vec![Cell::default(); cols * rows],
        }
    }

    #[must_use]
    pub const fn cols(&self) -> usize {
        self.cols
    }

    #[must_use]
    pub const fn rows(&self) -> usize {
        self.rows
    }

    fn index(&self, pos: CellPos) -> Option<usize> {
        let col = usize::try_from(pos.col).ok()?;
        let row = usize::try_from(pos.row).ok()?;
        (col < self.cols && row < self.rows).then_some(row * self.cols + col)
    }

    #[must_use]
    pub fn cell(&self, pos: CellPos) -> Option<&Cell> {
        self.index(pos).map(|idx| &self.cells[idx])
    }

    /// Instance occupying the cell, if any.
    #[must_use]
    pub fn occupant(&self, pos: CellPos) -> Option<&InstanceId> {
        self.cell(pos).and_then(|cell| cell.occupant.as_ref())
    }

    #[must_use]
    pub fn occupied_count(&self) -> usize {
        self.cells.iter().filter(|cell| cell.is_occupied()).count()
    }

    /// Cells tagged with the given instance, in row-major order.
    #[must_use]
    pub fn cells_of(&self, id: &InstanceId) -> Footprint {
        self.positions()
            .filter(|pos| self.occupant(*pos) == Some(id))
            .collect()
    }

    fn positions(&self) -> impl Iterator<Item = CellPos> + '_ {
        (0..self.rows).flat_map(move |row| {
            (0..self.cols).map(move |col| {
                CellPos::new(
                    i32::try_from(col).unwrap_or(i32::MAX),
                    i32::try_from(row).unwrap_or(i32::MAX),
                )
            })
        })
    }

    /// Explain why the item does not fit at `(x, y)`, or `None` when it fits.
    #[must_use]
    pub fn fit_error(&self, item: &Item, x: i32, y: i32) -> Option<FitError> {
        let cols = i32::try_from(self.cols).unwrap_or(i32::MAX);
        let rows = i32::try_from(self.rows).unwrap_or(i32::MAX);
        if x < 0
            || y < 0
            || x.saturating_add(i32::from(item.width)) > cols
            || y.saturating_add(i32::from(item.height)) > rows
        {
            return Some(FitError::OutOfBounds);
        }
        occupied_cells(item, x, y)
            .into_iter()
            .any(|pos| self.cell(pos).is_some_and(Cell::is_occupied))
            .then_some(FitError::Overlap)
    }
}

/// Create an empty grid for the mode.
#[must_use]
pub fn create_empty_grid(mode: GridMode) -> Grid {
    Grid::empty(mode)
}

/// Whether the item fits entirely inside the grid at `(x, y)` without overlap.
#[must_use]
pub fn can_place(grid: &Grid, item: &Item, x: i32, y: i32) -> bool {
    grid.fit_error(item, x, y).is_none()
}

/// Mark the item's footprint as occupied by `id`.
///
/// Precondition: [`can_place`] returned true for the same grid, item, and origin.
/// No validation happens here; occupied cells are overwritten and cells outside
/// the grid are skipped.
pub fn place_item(grid: &mut Grid, item: &Item, x: i32, y: i32, id: &InstanceId) {
    for pos in occupied_cells(item, x, y) {
        if let Some(idx) = grid.index(pos) {
            grid.cells[idx].occupant = Some(id.clone());
        }
    }
}

/// Clear every cell tagged with `id`, scanning the whole grid. Returns the number of cleared cells.
pub fn remove_item(grid: &mut Grid, id: &InstanceId) -> usize {
    let mut cleared = 0;
    for cell in &mut grid.cells {
        if cell.occupant.as_ref() == Some(id) {
            cell.occupant = None;
            cleared += 1;
        }
    }
    cleared
}

/// Cells the item would cover with its top-left corner at `(x, y)`.
#[must_use]
pub fn occupied_cells(item: &Item, x: i32, y: i32) -> Footprint {
    let mut cells = Footprint::new();
    for dy in 0..i32::from(item.height) {
        for dx in 0..i32::from(item.width) {
            cells.push(CellPos::new(x.saturating_add(dx), y.saturating_add(dy)));
        }
    }
    cells
}

/// First origin, scanning rows top-to-bottom then columns left-to-right, where the item fits.
#[must_use]
pub fn find_empty_position(grid: &Grid, item: &Item) -> Option<(i32, i32)> {
    grid.positions()
        .find(|pos| can_place(grid, item, pos.col, pos.row))
        .map(|pos| (pos.col, pos.row))
}

/// Staged grid mutation with automatic rollback.
///
/// Every overwritten cell is journaled. Dropping the transaction without calling
/// [`GridTransaction::commit`] restores the grid to its state at [`GridTransaction::begin`].
#[derive(Debug)]
pub struct GridTransaction<'g> {
    grid: &'g mut Grid,
    undo: Vec<(usize, Cell)>,
}

impl<'g> GridTransaction<'g> {
    pub const fn begin(grid: &'g mut Grid) -> Self {
        Self {
            grid,
            undo: Vec::new(),
        }
    }

    /// Tentative grid state, including staged changes.
    #[must_use]
    pub fn grid(&self) -> &Grid {
        &*self.grid
    }

    #[must_use]
    pub fn fit_error(&self, item: &Item, x: i32, y: i32) -> Option<FitError> {
        self.grid.fit_error(item, x, y)
    }

    /// Stage a placement after validating it against the tentative state.
    ///
    /// # Errors
    ///
    /// Returns the fit error when the footprint is out of bounds or overlaps.
    pub fn try_place(
        &mut self,
        item: &Item,
        x: i32,
        y: i32,
        id: &InstanceId,
    ) -> Result<(), FitError> {
        if let Some(err) = self.grid.fit_error(item, x, y) {
            return Err(err);
        }
        for pos in occupied_cells(item, x, y) {
            if let Some(idx) = self.grid.index(pos) {
                self.journal(idx);
                self.grid.cells[idx].occupant = Some(id.clone());
            }
        }
        Ok(())
    }

    /// Stage removal of every cell tagged with `id`.
    pub fn remove(&mut self, id: &InstanceId) -> usize {
        let mut cleared = 0;
        for idx in 0..self.grid.cells.len() {
            if self.grid.cells[idx].occupant.as_ref() == Some(id) {
                self.journal(idx);
                self.grid.cells[idx].occupant = None;
                cleared += 1;
            }
        }
        cleared
    }

    fn journal(&mut self, idx: usize) {
        self.undo.push((idx, self.grid.cells[idx].clone()));
    }

    /// Keep every staged change.
    pub fn commit(mut self) {
        self.undo.clear();
    }
}

impl Drop for GridTransaction<'_> {
    fn drop(&mut self) {
        while let Some((idx, cell)) = self.undo.pop() {
            self.grid.cells[idx] = cell;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ItemKind;

    fn item(width: u8, height: u8) -> Item {
        Item::new("block", ItemKind::Task, width, height)
    }

    #[test]
    fn day_and_week_dimensions() {
        let day = create_empty_grid(GridMode::Day);
        assert_eq!((day.cols(), day.rows()), (8, 6));
        let week = create_empty_grid(GridMode::Week);
        assert_eq!((week.cols(), week.rows()), (12, 10));
        assert_eq!(week.occupied_count(), 0);
    }

    #[test]
    fn bounds_are_checked_on_every_edge() {
        let grid = create_empty_grid(GridMode::Day);
        let block = item(2, 2);
        assert!(can_place(&grid, &block, 0, 0));
        assert!(can_place(&grid, &block, 6, 4));
        assert_eq!(grid.fit_error(&block, -1, 0), Some(FitError::OutOfBounds));
        assert_eq!(grid.fit_error(&block, 0, -1), Some(FitError::OutOfBounds));
        assert_eq!(grid.fit_error(&block, 7, 0), Some(FitError::OutOfBounds));
        assert_eq!(grid.fit_error(&block, 0, 5), Some(FitError::OutOfBounds));
    }

    #[test]
    fn place_then_overlap_is_rejected() {
        let mut grid = create_empty_grid(GridMode::Day);
        let task = item(2, 2);
        let id = InstanceId::new("inst-a");
        assert!(can_place(&grid, &task, 1, 1));
        place_item(&mut grid, &task, 1, 1, &id);
        for (col, row) in [(1, 1), (2, 1), (1, 2), (2, 2)] {
            assert_eq!(grid.occupant(CellPos::new(col, row)), Some(&id));
        }
        assert_eq!(grid.occupied_count(), 4);
        assert_eq!(grid.fit_error(&item(1, 1), 1, 1), Some(FitError::Overlap));
        assert!(can_place(&grid, &item(1, 1), 3, 1));
    }

    #[test]
    fn can_place_agrees_with_footprint_cells() {
        let mut grid = create_empty_grid(GridMode::Day);
        place_item(&mut grid, &item(3, 1), 2, 3, &InstanceId::new("wall"));
        let block = item(2, 2);
        for y in -1..=6 {
            for x in -1..=8 {
                let all_free = occupied_cells(&block, x, y)
                    .into_iter()
                    .all(|pos| grid.cell(pos).is_some_and(|cell| !cell.is_occupied()));
                assert_eq!(can_place(&grid, &block, x, y), all_free, "origin ({x},{y})");
            }
        }
    }

    #[test]
    fn remove_restores_empty_grid() {
        let empty = create_empty_grid(GridMode::Week);
        let mut grid = empty.clone();
        let id = InstanceId::new("inst-z");
        place_item(&mut grid, &item(3, 2), 4, 5, &id);
        assert_eq!(remove_item(&mut grid, &id), 6);
        assert_eq!(grid, empty);
        assert_eq!(remove_item(&mut grid, &id), 0);
    }

    #[test]
    fn find_empty_position_scans_row_major() {
        let mut grid = create_empty_grid(GridMode::Day);
        assert_eq!(find_empty_position(&grid, &item(1, 1)), Some((0, 0)));
        place_item(&mut grid, &item(8, 1), 0, 0, &InstanceId::new("row0"));
        place_item(&mut grid, &item(3, 1), 0, 1, &InstanceId::new("row1"));
        assert_eq!(find_empty_position(&grid, &item(1, 1)), Some((3, 1)));
        assert_eq!(find_empty_position(&grid, &item(1, 6)), None);
        assert_eq!(find_empty_position(&grid, &item(5, 2)), Some((3, 1)));
    }

    #[test]
    fn transaction_rolls_back_unless_committed() {
        let mut grid = create_empty_grid(GridMode::Day);
        let a = InstanceId::new("a");
        place_item(&mut grid, &item(2, 1), 0, 0, &a);
        let before = grid.clone();

        {
            let mut txn = GridTransaction::begin(&mut grid);
            assert_eq!(txn.remove(&a), 2);
            txn.try_place(&item(1, 1), 5, 5, &InstanceId::new("b")).unwrap();
            assert_eq!(txn.grid().occupied_count(), 1);
        }
        assert_eq!(grid, before);

        let mut txn = GridTransaction::begin(&mut grid);
        txn.remove(&a);
        txn.try_place(&item(2, 1), 3, 3, &a).unwrap();
        txn.commit();
        assert_eq!(grid.occupant(CellPos::new(3, 3)), Some(&a));
        assert_eq!(grid.occupant(CellPos::new(0, 0)), None);
    }

    #[test]
    fn chebyshev_counts_diagonals_as_adjacent() {
        assert_eq!(CellPos::new(0, 0).chebyshev(CellPos::new(1, 1)), 1);
        assert_eq!(CellPos::new(0, 0).chebyshev(CellPos::new(2, 1)), 2);
    }

    #[test]
    fn deserializing_rejects_mismatched_cell_counts() {
        let short = r#"{"cols":2,"rows":2,"cells":[{},{},{}]}"#;
        let err = serde_json::from_str::<Grid>(short).unwrap_err();
        assert!(err.to_string().contains("grid of 2x2 carries 3 cells"));

        let exact = r#"{"cols":1,"rows":2,"cells":[{},{"occupant":"inst-a"}]}"#;
        let grid: Grid = serde_json::from_str(exact).unwrap();
        assert_eq!(grid.occupied_count(), 1);
    }
}
