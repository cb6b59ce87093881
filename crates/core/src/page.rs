//! The page document and its synchronous mutations.
//!
//! [`PageData`] is the aggregate root of an editing session. Every mutation
//! here is pure in-memory work; persistence is the pipeline's concern.
//!
//! `blocks[0]` is always the page's single profile block. The profile never
//! takes part in reordering or grid placement.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::block::{Block, BlockKind};
use crate::error::CoreError;
use crate::grid::{assign_missing_layouts, validate_layouts, GridConfig, GridEngine, GridLayoutData};
use crate::types::DbId;

/// Slugs are 3-32 chars of `[a-z0-9-]`, not starting or ending with `-`.
static SLUG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9][a-z0-9-]{1,30}[a-z0-9]$").expect("slug regex is valid")
});

/// Validate a public page slug.
pub fn validate_slug(slug: &str) -> Result<(), CoreError> {
    if SLUG_RE.is_match(slug) {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "Invalid slug '{slug}'. Use 3-32 lowercase letters, digits or hyphens"
        )))
    }
}

// ---------------------------------------------------------------------------
// Theme and editor mode
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Theme {
    pub preset: String,
    pub background: String,
    pub text_color: String,
    pub accent_color: String,
    pub font_family: String,
    pub button_style: String,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            preset: "minimal".into(),
            background: "#ffffff".into(),
            text_color: "#111111".into(),
            accent_color: "#3b82f6".into(),
            font_family: "Inter".into(),
            button_style: "rounded".into(),
        }
    }
}

/// How the editor arranges blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditorMode {
    /// A single column in list order.
    #[default]
    Linear,
    /// Free placement on the grid.
    Grid,
}

impl EditorMode {
    pub fn as_str(self) -> &'static str {
        match self {
            EditorMode::Linear => "linear",
            EditorMode::Grid => "grid",
        }
    }

    /// Parse a stored mode name. Unknown names fall back to linear.
    pub fn from_name(name: &str) -> Self {
        match name {
            "grid" => EditorMode::Grid,
            _ => EditorMode::Linear,
        }
    }
}

// ---------------------------------------------------------------------------
// PageData
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageData {
    /// `None` until the first save assigns a database id.
    #[serde(default)]
    pub id: Option<DbId>,
    pub user_id: DbId,
    pub slug: String,
    #[serde(default)]
    pub title: Option<String>,
    pub blocks: Vec<Block>,
    #[serde(default)]
    pub theme: Theme,
    #[serde(default)]
    pub editor_mode: EditorMode,
    #[serde(default)]
    pub is_published: bool,
    #[serde(default)]
    pub niche: Option<String>,
}

/// Partial page update. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PagePatch {
    pub title: Option<String>,
    pub slug: Option<String>,
    pub niche: Option<String>,
    pub theme: Option<Theme>,
    pub editor_mode: Option<EditorMode>,
}

impl PageData {
    /// A fresh, unsaved page holding only a profile block.
    pub fn new(user_id: DbId, slug: impl Into<String>, profile_name: impl Into<String>) -> Self {
        Self {
            id: None,
            user_id,
            slug: slug.into(),
            title: None,
            blocks: vec![Block::profile(profile_name)],
            theme: Theme::default(),
            editor_mode: EditorMode::default(),
            is_published: false,
            niche: None,
        }
    }

    pub fn profile(&self) -> Option<&Block> {
        self.blocks.iter().find(|b| b.is_profile())
    }

    /// Blocks that take part in ordering and grid placement.
    pub fn content_blocks(&self) -> impl Iterator<Item = &Block> {
        self.blocks.iter().filter(|b| !b.is_profile())
    }

    pub fn find_block(&self, block_id: &str) -> Option<&Block> {
        self.blocks.iter().find(|b| b.id == block_id)
    }

    pub fn event_block_ids(&self) -> Vec<String> {
        self.blocks
            .iter()
            .filter(|b| b.is_event())
            .map(|b| b.id.clone())
            .collect()
    }

    pub fn grid(&self, config: GridConfig) -> GridEngine {
        GridEngine::from_blocks(config, &self.blocks)
    }

    /// Move the profile block to the front, dropping extra profiles and
    /// creating an empty one if none exists. Profiles never carry a layout.
    pub fn ensure_profile_first(&mut self) {
        let mut profile: Option<Block> = None;
        let mut rest = Vec::with_capacity(self.blocks.len());
        for block in self.blocks.drain(..) {
            if block.is_profile() {
                if profile.is_none() {
                    profile = Some(block);
                }
            } else {
                rest.push(block);
            }
        }

        let mut profile = profile.unwrap_or_else(|| Block::profile(""));
        profile.grid_layout = None;

        self.blocks = std::iter::once(profile).chain(rest).collect();
    }

    /// Append a block. A requested layout is validated in either mode; in
    /// grid mode a block without one gets the first free 1×1 cell.
    pub fn add_block(&mut self, mut block: Block, grid: GridConfig) -> Result<(), CoreError> {
        if block.is_profile() {
            return Err(CoreError::Validation(
                "A page has exactly one profile block".into(),
            ));
        }
        if block.id.trim().is_empty() {
            block.id = crate::block::new_block_id();
        }
        if self.find_block(&block.id).is_some() {
            return Err(CoreError::Conflict(format!(
                "Block '{}' already exists",
                block.id
            )));
        }

        match block.grid_layout {
            Some(layout) => self.check_layout(&block, layout, grid)?,
            None if self.editor_mode == EditorMode::Grid => {
                block.grid_layout = Some(self.grid(grid).insert(&block.id, 1, 1));
            }
            None => {}
        }

        self.blocks.push(block);
        Ok(())
    }

    /// Merge a JSON patch into a block. A changed layout is validated
    /// against the other placements.
    pub fn update_block(
        &mut self,
        block_id: &str,
        patch: &serde_json::Value,
        grid: GridConfig,
    ) -> Result<(), CoreError> {
        let index = self.index_of(block_id)?;
        let merged = self.blocks[index].merge_patch(patch)?;

        if merged.grid_layout != self.blocks[index].grid_layout {
            if let Some(layout) = merged.grid_layout {
                self.check_layout(&merged, layout, grid)?;
            }
        }

        self.blocks[index] = merged;
        Ok(())
    }

    /// Commit a layout produced by a drag or resize gesture.
    pub fn set_block_layout(
        &mut self,
        block_id: &str,
        layout: GridLayoutData,
        grid: GridConfig,
    ) -> Result<(), CoreError> {
        let index = self.index_of(block_id)?;
        self.check_layout(&self.blocks[index], layout, grid)?;
        self.blocks[index].grid_layout = Some(layout);
        Ok(())
    }

    pub fn delete_block(&mut self, block_id: &str) -> Result<Block, CoreError> {
        let index = self.index_of(block_id)?;
        if self.blocks[index].is_profile() {
            return Err(CoreError::Validation(
                "The profile block cannot be deleted".into(),
            ));
        }
        Ok(self.blocks.remove(index))
    }

    /// Reorder the non-profile blocks. `ordered_ids` must name each of them
    /// exactly once; the profile stays first.
    pub fn reorder_blocks(&mut self, ordered_ids: &[String]) -> Result<(), CoreError> {
        let content_count = self.content_blocks().count();
        if ordered_ids.len() != content_count {
            return Err(CoreError::Validation(format!(
                "Expected {content_count} block ids, got {}",
                ordered_ids.len()
            )));
        }

        self.ensure_profile_first();
        let mut order: Vec<usize> = Vec::with_capacity(ordered_ids.len());
        for id in ordered_ids {
            let pos = self.blocks[1..]
                .iter()
                .position(|b| &b.id == id)
                .filter(|pos| !order.contains(pos))
                .ok_or_else(|| {
                    CoreError::Validation(format!(
                        "Block '{id}' is unknown, repeated, or the profile block"
                    ))
                })?;
            order.push(pos);
        }

        let mut content: Vec<Option<Block>> = self.blocks.drain(1..).map(Some).collect();
        let reordered: Vec<Block> = order
            .into_iter()
            .filter_map(|pos| content[pos].take())
            .collect();
        self.blocks.extend(reordered);
        Ok(())
    }

    /// Replace the whole block list, restoring the profile invariant and
    /// placing unplaced blocks in grid mode. A list without a profile keeps
    /// the current one.
    ///
    /// Supplied layouts are checked in list order; the first one that is out
    /// of bounds or overlaps an earlier block rejects the whole list and
    /// leaves the page untouched.
    pub fn replace_blocks(&mut self, mut blocks: Vec<Block>, grid: GridConfig) -> Result<(), CoreError> {
        if !blocks.iter().any(Block::is_profile) {
            if let Some(profile) = self.profile().cloned() {
                blocks.insert(0, profile);
            }
        }
        let previous = std::mem::replace(&mut self.blocks, blocks);
        self.ensure_profile_first();
        if let Err(e) = validate_layouts(&self.blocks, grid) {
            self.blocks = previous;
            return Err(e);
        }
        if self.editor_mode == EditorMode::Grid {
            assign_missing_layouts(&mut self.blocks, grid);
        }
        Ok(())
    }

    pub fn update_theme(&mut self, theme: Theme) {
        self.theme = theme;
    }

    /// Switch editor mode. Entering grid mode places every unplaced block and
    /// re-places any whose layout collides with an earlier one.
    pub fn update_editor_mode(&mut self, mode: EditorMode, grid: GridConfig) {
        self.editor_mode = mode;
        if mode == EditorMode::Grid {
            assign_missing_layouts(&mut self.blocks, grid);
        }
    }

    pub fn apply_patch(&mut self, patch: PagePatch, grid: GridConfig) -> Result<(), CoreError> {
        if let Some(slug) = &patch.slug {
            validate_slug(slug)?;
        }

        if let Some(title) = patch.title {
            self.title = Some(title);
        }
        if let Some(slug) = patch.slug {
            self.slug = slug;
        }
        if let Some(niche) = patch.niche {
            self.niche = Some(niche);
        }
        if let Some(theme) = patch.theme {
            self.update_theme(theme);
        }
        if let Some(mode) = patch.editor_mode {
            self.update_editor_mode(mode, grid);
        }
        Ok(())
    }

    fn index_of(&self, block_id: &str) -> Result<usize, CoreError> {
        self.blocks
            .iter()
            .position(|b| b.id == block_id)
            .ok_or_else(|| CoreError::BlockNotFound(block_id.to_string()))
    }

    fn check_layout(
        &self,
        block: &Block,
        layout: GridLayoutData,
        grid: GridConfig,
    ) -> Result<(), CoreError> {
        if block.kind() == BlockKind::Profile {
            return Err(CoreError::Validation(
                "The profile block is not placed on the grid".into(),
            ));
        }
        let mut engine = self.grid(grid);
        engine.place(&block.id, layout)
    }
}
