//! Drag and resize gesture interpreters.
//!
//! A gesture captures the block's layout and the pointer position when it
//! starts. Each pointer move converts the pixel delta into a cell delta,
//! clamps the resulting candidate, and validates it against the grid with
//! the block's own footprint excluded. Nothing is committed until release:
//! a valid last candidate becomes [`GestureOutcome::Commit`], anything else
//! is a [`GestureOutcome::Revert`] carrying the original layout unchanged.
//!
//! [`GestureTracker`] owns at most one active gesture. Pointer move/up
//! events are only consumed while it is capturing.

use serde::Serialize;

use crate::grid::{GridConfig, GridEngine, GridLayoutData, MAX_ROW};

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PointerPoint {
    pub x: f64,
    pub y: f64,
}

impl PointerPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Hover feedback for the cell currently under the pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DropIndicator {
    pub candidate: GridLayoutData,
    pub valid: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GestureOutcome {
    Commit {
        block_id: String,
        layout: GridLayoutData,
    },
    Revert {
        block_id: String,
        layout: GridLayoutData,
    },
}

impl GestureOutcome {
    pub fn block_id(&self) -> &str {
        match self {
            GestureOutcome::Commit { block_id, .. } | GestureOutcome::Revert { block_id, .. } => {
                block_id
            }
        }
    }

    /// The layout to write back, only for committed gestures.
    pub fn committed(&self) -> Option<GridLayoutData> {
        match self {
            GestureOutcome::Commit { layout, .. } => Some(*layout),
            GestureOutcome::Revert { .. } => None,
        }
    }
}

/// Convert a pixel delta into whole cells: `round(delta / (cell + gap))`.
pub fn cell_delta(dx: f64, dy: f64, config: &GridConfig) -> (i64, i64) {
    let col_step = config.cell_width() + config.gap;
    let row_step = config.cell_height() + config.gap;
    let dcol = if col_step > 0.0 { (dx / col_step).round() as i64 } else { 0 };
    let drow = if row_step > 0.0 { (dy / row_step).round() as i64 } else { 0 };
    (dcol, drow)
}

fn clamp_to_u32(value: i64, min: i64, max: i64) -> u32 {
    value.clamp(min, max.max(min)) as u32
}

fn finish(block_id: String, original: GridLayoutData, hover: Option<DropIndicator>) -> GestureOutcome {
    match hover {
        Some(DropIndicator {
            candidate,
            valid: true,
        }) => GestureOutcome::Commit {
            block_id,
            layout: candidate,
        },
        _ => GestureOutcome::Revert {
            block_id,
            layout: original,
        },
    }
}

// ---------------------------------------------------------------------------
// Drag
// ---------------------------------------------------------------------------

/// Moves a block; spans are fixed.
#[derive(Debug, Clone)]
pub struct DragGesture {
    block_id: String,
    original: GridLayoutData,
    origin: PointerPoint,
    hover: Option<DropIndicator>,
}

impl DragGesture {
    pub fn begin(block_id: impl Into<String>, original: GridLayoutData, pointer: PointerPoint) -> Self {
        Self {
            block_id: block_id.into(),
            original,
            origin: pointer,
            hover: None,
        }
    }

    pub fn update(&mut self, pointer: PointerPoint, engine: &GridEngine) -> DropIndicator {
        let config = engine.config();
        let (dcol, drow) = cell_delta(pointer.x - self.origin.x, pointer.y - self.origin.y, config);

        let max_col = i64::from(config.columns) - i64::from(self.original.col_span) + 1;
        let max_row = i64::from(MAX_ROW) - i64::from(self.original.row_span) + 1;
        let candidate = GridLayoutData {
            col: clamp_to_u32(i64::from(self.original.col).saturating_add(dcol), 1, max_col),
            row: clamp_to_u32(i64::from(self.original.row).saturating_add(drow), 1, max_row),
            ..self.original
        };

        let indicator = DropIndicator {
            candidate,
            valid: engine.is_position_valid(&candidate, Some(&self.block_id)),
        };
        self.hover = Some(indicator);
        indicator
    }

    pub fn hover(&self) -> Option<&DropIndicator> {
        self.hover.as_ref()
    }

    pub fn finish(self) -> GestureOutcome {
        finish(self.block_id, self.original, self.hover)
    }
}

// ---------------------------------------------------------------------------
// Resize
// ---------------------------------------------------------------------------

/// Changes a block's spans; the top-left corner is fixed.
#[derive(Debug, Clone)]
pub struct ResizeGesture {
    block_id: String,
    original: GridLayoutData,
    origin: PointerPoint,
    hover: Option<DropIndicator>,
}

impl ResizeGesture {
    pub fn begin(block_id: impl Into<String>, original: GridLayoutData, pointer: PointerPoint) -> Self {
        Self {
            block_id: block_id.into(),
            original,
            origin: pointer,
            hover: None,
        }
    }

    pub fn update(&mut self, pointer: PointerPoint, engine: &GridEngine) -> DropIndicator {
        let config = engine.config();
        let (dcol, drow) = cell_delta(pointer.x - self.origin.x, pointer.y - self.origin.y, config);

        let max_span = i64::from(config.columns) - i64::from(self.original.col) + 1;
        let max_row_span = i64::from(MAX_ROW) - i64::from(self.original.row) + 1;
        let candidate = GridLayoutData {
            col_span: clamp_to_u32(i64::from(self.original.col_span).saturating_add(dcol), 1, max_span),
            row_span: clamp_to_u32(i64::from(self.original.row_span).saturating_add(drow), 1, max_row_span),
            ..self.original
        };

        let indicator = DropIndicator {
            candidate,
            valid: engine.is_position_valid(&candidate, Some(&self.block_id)),
        };
        self.hover = Some(indicator);
        indicator
    }

    pub fn hover(&self) -> Option<&DropIndicator> {
        self.hover.as_ref()
    }

    pub fn finish(self) -> GestureOutcome {
        finish(self.block_id, self.original, self.hover)
    }
}

// ---------------------------------------------------------------------------
// Tracker
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub enum ActiveGesture {
    Drag(DragGesture),
    Resize(ResizeGesture),
}

/// Routes pointer events to the single in-progress gesture.
#[derive(Debug, Default)]
pub struct GestureTracker {
    active: Option<ActiveGesture>,
}

impl GestureTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether pointer move/up events are currently being consumed.
    pub fn is_capturing(&self) -> bool {
        self.active.is_some()
    }

    /// Start dragging. Returns `false` if another gesture is in progress.
    pub fn start_drag(&mut self, block_id: &str, layout: GridLayoutData, pointer: PointerPoint) -> bool {
        if self.active.is_some() {
            return false;
        }
        self.active = Some(ActiveGesture::Drag(DragGesture::begin(block_id, layout, pointer)));
        true
    }

    /// Start resizing. Returns `false` if another gesture is in progress.
    pub fn start_resize(&mut self, block_id: &str, layout: GridLayoutData, pointer: PointerPoint) -> bool {
        if self.active.is_some() {
            return false;
        }
        self.active = Some(ActiveGesture::Resize(ResizeGesture::begin(block_id, layout, pointer)));
        true
    }

    /// Feed a pointer move. `None` when no gesture is active.
    pub fn pointer_move(&mut self, pointer: PointerPoint, engine: &GridEngine) -> Option<DropIndicator> {
        match self.active.as_mut()? {
            ActiveGesture::Drag(g) => Some(g.update(pointer, engine)),
            ActiveGesture::Resize(g) => Some(g.update(pointer, engine)),
        }
    }

    /// Release the pointer, ending the gesture.
    pub fn pointer_up(&mut self) -> Option<GestureOutcome> {
        match self.active.take()? {
            ActiveGesture::Drag(g) => Some(g.finish()),
            ActiveGesture::Resize(g) => Some(g.finish()),
        }
    }

    /// Abort the gesture without committing anything.
    pub fn cancel(&mut self) -> Option<GestureOutcome> {
        let (block_id, layout) = match self.active.take()? {
            ActiveGesture::Drag(g) => (g.block_id, g.original),
            ActiveGesture::Resize(g) => (g.block_id, g.original),
        };
        Some(GestureOutcome::Revert { block_id, layout })
    }
}
