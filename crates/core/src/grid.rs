//! Grid placement engine.
//!
//! Blocks in grid mode occupy axis-aligned rectangles of cells on a grid with
//! a fixed number of columns and unbounded rows. Coordinates are 1-based, the
//! same convention as CSS grid lines.
//!
//! Invariants maintained by everything that commits a layout:
//!
//! - no two placed rectangles overlap;
//! - `1 <= col` and `col + col_span - 1 <= columns`;
//! - `row + row_span - 1 <= MAX_ROW`.

use serde::{Deserialize, Serialize};

use crate::block::Block;
use crate::error::CoreError;

/// Column count on narrow viewports.
pub const MOBILE_COLUMNS: u32 = 2;

/// Column count on wide viewports.
pub const DESKTOP_COLUMNS: u32 = 4;

/// Gap between cells in pixels.
pub const DEFAULT_GAP_PX: f64 = 12.0;

/// Height of a single row in pixels.
pub const DEFAULT_ROW_HEIGHT_PX: f64 = 100.0;

/// Cell width used until the container has been measured.
pub const PLACEHOLDER_CELL_WIDTH_PX: f64 = 100.0;

/// Lowest row a layout may reach.
pub const MAX_ROW: u32 = 10_000;

// ---------------------------------------------------------------------------
// Layout records
// ---------------------------------------------------------------------------

/// A block's placement on the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridLayoutData {
    pub col: u32,
    pub row: u32,
    pub col_span: u32,
    pub row_span: u32,
}

impl GridLayoutData {
    pub fn new(col: u32, row: u32, col_span: u32, row_span: u32) -> Self {
        Self {
            col,
            row,
            col_span,
            row_span,
        }
    }

    /// A 1×1 layout at `(col, row)`.
    pub fn cell(col: u32, row: u32) -> Self {
        Self::new(col, row, 1, 1)
    }

    /// Saturates instead of wrapping, so an oversized layout never fits.
    pub fn last_col(&self) -> u32 {
        self.col.saturating_add(self.col_span.saturating_sub(1))
    }

    pub fn last_row(&self) -> u32 {
        self.row.saturating_add(self.row_span.saturating_sub(1))
    }

    /// Two rectangles overlap iff both their column and row ranges intersect.
    pub fn overlaps(&self, other: &GridLayoutData) -> bool {
        self.col <= other.last_col()
            && other.col <= self.last_col()
            && self.row <= other.last_row()
            && other.row <= self.last_row()
    }

    /// Whether the rectangle lies within `[1, columns]` horizontally, ends by
    /// [`MAX_ROW`] and has positive spans.
    pub fn fits(&self, columns: u32) -> bool {
        self.col >= 1
            && self.row >= 1
            && self.col_span >= 1
            && self.row_span >= 1
            && self.last_col() <= columns
            && self.last_row() <= MAX_ROW
    }

    pub fn position(&self) -> GridPosition {
        GridPosition {
            col: self.col,
            row: self.row,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridPosition {
    pub col: u32,
    pub row: u32,
}

/// CSS grid placement for a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GridStyle {
    pub grid_column: String,
    pub grid_row: String,
}

impl From<&GridLayoutData> for GridStyle {
    fn from(layout: &GridLayoutData) -> Self {
        Self {
            grid_column: format!("{} / span {}", layout.col, layout.col_span),
            grid_row: format!("{} / span {}", layout.row, layout.row_span),
        }
    }
}

// ---------------------------------------------------------------------------
// Grid configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Viewport {
    Mobile,
    #[default]
    Desktop,
}

impl Viewport {
    pub fn columns(self) -> u32 {
        match self {
            Viewport::Mobile => MOBILE_COLUMNS,
            Viewport::Desktop => DESKTOP_COLUMNS,
        }
    }
}

/// Grid dimensions used for geometry and pixel ↔ cell conversion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridConfig {
    pub columns: u32,
    pub gap: f64,
    pub row_height: f64,
    /// Measured container width in pixels; `0.0` until measured.
    pub container_width: f64,
}

impl GridConfig {
    pub fn for_viewport(viewport: Viewport) -> Self {
        Self {
            columns: viewport.columns(),
            gap: DEFAULT_GAP_PX,
            row_height: DEFAULT_ROW_HEIGHT_PX,
            container_width: 0.0,
        }
    }

    pub fn with_container_width(mut self, width: f64) -> Self {
        self.container_width = width;
        self
    }

    /// Width of one column in pixels.
    ///
    /// Falls back to [`PLACEHOLDER_CELL_WIDTH_PX`] while the container is
    /// unmeasured so conversions never divide by zero.
    pub fn cell_width(&self) -> f64 {
        if self.container_width <= 0.0 || self.columns == 0 {
            return PLACEHOLDER_CELL_WIDTH_PX;
        }
        let gaps = self.gap * f64::from(self.columns.saturating_sub(1));
        ((self.container_width - gaps) / f64::from(self.columns)).max(0.0)
    }

    pub fn cell_height(&self) -> f64 {
        self.row_height
    }
}

impl Default for GridConfig {
    fn default() -> Self {
        Self::for_viewport(Viewport::default())
    }
}

// ---------------------------------------------------------------------------
// GridEngine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    pub block_id: String,
    pub layout: GridLayoutData,
}

/// Placement index over the grid-positioned blocks of one page.
#[derive(Debug, Clone)]
pub struct GridEngine {
    config: GridConfig,
    placements: Vec<Placement>,
}

impl GridEngine {
    pub fn new(config: GridConfig) -> Self {
        Self {
            config,
            placements: Vec::new(),
        }
    }

    /// Index every non-profile block that carries a layout.
    pub fn from_blocks(config: GridConfig, blocks: &[Block]) -> Self {
        let placements = blocks
            .iter()
            .filter(|b| !b.is_profile())
            .filter_map(|b| {
                b.grid_layout.map(|layout| Placement {
                    block_id: b.id.clone(),
                    layout,
                })
            })
            .collect();
        Self { config, placements }
    }

    pub fn config(&self) -> &GridConfig {
        &self.config
    }

    pub fn placements(&self) -> &[Placement] {
        &self.placements
    }

    pub fn layout_of(&self, block_id: &str) -> Option<&GridLayoutData> {
        self.placements
            .iter()
            .find(|p| p.block_id == block_id)
            .map(|p| &p.layout)
    }

    /// CSS placement for a block, or `None` if it has no layout.
    pub fn compute_style(&self, block_id: &str) -> Option<GridStyle> {
        self.layout_of(block_id).map(GridStyle::from)
    }

    /// Whether `candidate` stays in bounds and overlaps no placement other
    /// than `excluding`'s.
    pub fn is_position_valid(&self, candidate: &GridLayoutData, excluding: Option<&str>) -> bool {
        if !candidate.fits(self.config.columns) {
            return false;
        }
        self.placements
            .iter()
            .filter(|p| Some(p.block_id.as_str()) != excluding)
            .all(|p| !p.layout.overlaps(candidate))
    }

    /// First row-major position where a `width`×`height` rectangle fits.
    ///
    /// `width` is clamped to the column count. Rows past the lowest placement
    /// are always free, so the scan terminates.
    pub fn find_free_position(&self, width: u32, height: u32) -> GridPosition {
        let columns = self.config.columns.max(1);
        let width = width.clamp(1, columns);
        let height = height.max(1);
        let bottom = self
            .placements
            .iter()
            .map(|p| p.layout.last_row())
            .max()
            .unwrap_or(0);

        for row in 1..=bottom.saturating_add(1) {
            for col in 1..=columns - width + 1 {
                let candidate = GridLayoutData::new(col, row, width, height);
                if self.is_position_valid(&candidate, None) {
                    return candidate.position();
                }
            }
        }

        GridPosition {
            col: 1,
            row: bottom.saturating_add(1),
        }
    }

    /// Commit a layout for `block_id`, replacing its previous one.
    pub fn place(&mut self, block_id: &str, layout: GridLayoutData) -> Result<(), CoreError> {
        if !layout.fits(self.config.columns) {
            return Err(CoreError::Conflict(format!(
                "Layout {}x{} at ({}, {}) is outside the {}-column grid",
                layout.col_span, layout.row_span, layout.col, layout.row, self.config.columns
            )));
        }
        if !self.is_position_valid(&layout, Some(block_id)) {
            return Err(CoreError::Conflict(format!(
                "Layout at ({}, {}) overlaps another block",
                layout.col, layout.row
            )));
        }

        match self.placements.iter_mut().find(|p| p.block_id == block_id) {
            Some(existing) => existing.layout = layout,
            None => self.placements.push(Placement {
                block_id: block_id.to_string(),
                layout,
            }),
        }
        Ok(())
    }

    /// Place a new `width`×`height` block at the first free position.
    pub fn insert(&mut self, block_id: &str, width: u32, height: u32) -> GridLayoutData {
        let width = width.clamp(1, self.config.columns.max(1));
        let height = height.max(1);
        let pos = self.find_free_position(width, height);
        let layout = GridLayoutData::new(pos.col, pos.row, width, height);
        self.placements.push(Placement {
            block_id: block_id.to_string(),
            layout,
        });
        layout
    }

    pub fn remove(&mut self, block_id: &str) {
        self.placements.retain(|p| p.block_id != block_id);
    }
}

/// Place every non-profile block on the grid, in list order.
///
/// Existing layouts are kept when they fit and do not collide with an
/// earlier block. Blocks without a layout, or whose layout was dropped, get
/// the first free 1×1 cell afterwards. Profile layouts are cleared.
pub fn assign_missing_layouts(blocks: &mut [Block], config: GridConfig) {
    let mut engine = GridEngine::new(config);
    for block in blocks.iter_mut() {
        if block.is_profile() {
            block.grid_layout = None;
            continue;
        }
        if let Some(layout) = block.grid_layout {
            if engine.place(&block.id, layout).is_err() {
                block.grid_layout = None;
            }
        }
    }
    for block in blocks.iter_mut() {
        if block.is_profile() || block.grid_layout.is_some() {
            continue;
        }
        block.grid_layout = Some(engine.insert(&block.id, 1, 1));
    }
}

/// Check every layout in `blocks` against the ones before it.
///
/// Fails on the first layout that is out of bounds or overlaps an earlier
/// block. Blocks without a layout and the profile are skipped.
pub fn validate_layouts(blocks: &[Block], config: GridConfig) -> Result<GridEngine, CoreError> {
    let mut engine = GridEngine::new(config);
    for block in blocks.iter().filter(|b| !b.is_profile()) {
        if let Some(layout) = block.grid_layout {
            engine.place(&block.id, layout).map_err(|e| match e {
                CoreError::Conflict(msg) => CoreError::Conflict(format!("Block '{}': {msg}", block.id)),
                other => other,
            })?;
        }
    }
    Ok(engine)
}
