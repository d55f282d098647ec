//! Explored rectangle and its placement state

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::core::geometry::{Bounds, Coord};

/// Identifier of a map segment
pub type SegmentId = i64;

/// Opaque identifier of a grid cell within a segment
pub type GridId = i64;

/// Grid-relative corners of a rectangle.
///
/// Valid before the owning grids are placed in the segment, which is what
/// gets persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridAnchor {
    pub ul_grid: GridId,
    pub br_grid: GridId,
    /// Offset of the upper-left corner inside `ul_grid`
    pub local_ul: Coord,
    /// Offset of the lower-right corner inside `br_grid`
    pub local_br: Coord,
}

/// What is currently known about where a rectangle lies
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placement {
    /// Absolute corners observed, owning grids not yet known
    Observed(Bounds),
    /// Owning grids and offsets known, grids not yet placed in the segment
    Anchored(GridAnchor),
    /// Both known
    Resolved { bounds: Bounds, anchor: GridAnchor },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RectState {
    Pending,
    Resolved,
}

/// A revealed region of one segment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rectangle {
    pub segment: SegmentId,
    placement: Placement,
    history: BTreeSet<GridId>,
}

impl Rectangle {
    /// Rectangle seen in absolute coordinates, awaiting grid lookup
    pub fn observed(bounds: Bounds, segment: SegmentId) -> Self {
        Self {
            segment,
            placement: Placement::Observed(bounds),
            history: BTreeSet::new(),
        }
    }

    /// Rectangle known only relative to its grids, as loaded from disk
    pub fn anchored(anchor: GridAnchor, segment: SegmentId) -> Self {
        Self {
            segment,
            placement: Placement::Anchored(anchor),
            history: BTreeSet::from([anchor.ul_grid, anchor.br_grid]),
        }
    }

    pub fn resolved(bounds: Bounds, anchor: GridAnchor, segment: SegmentId) -> Self {
        Self {
            segment,
            placement: Placement::Resolved { bounds, anchor },
            history: BTreeSet::from([anchor.ul_grid, anchor.br_grid]),
        }
    }

    pub fn state(&self) -> RectState {
        match self.placement {
            Placement::Resolved { .. } => RectState::Resolved,
            _ => RectState::Pending,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.state() == RectState::Resolved
    }

    pub fn is_pending(&self) -> bool {
        self.state() == RectState::Pending
    }

    pub fn placement(&self) -> &Placement {
        &self.placement
    }

    /// Absolute bounds, only once resolved
    pub fn bounds(&self) -> Option<Bounds> {
        match self.placement {
            Placement::Resolved { bounds, .. } => Some(bounds),
            _ => None,
        }
    }

    /// Absolute bounds whenever they are known, resolved or not
    pub fn observed_bounds(&self) -> Option<Bounds> {
        match self.placement {
            Placement::Observed(bounds) | Placement::Resolved { bounds, .. } => Some(bounds),
            Placement::Anchored(_) => None,
        }
    }

    pub fn anchor(&self) -> Option<&GridAnchor> {
        match &self.placement {
            Placement::Anchored(anchor) | Placement::Resolved { anchor, .. } => Some(anchor),
            Placement::Observed(_) => None,
        }
    }

    pub fn ul(&self) -> Option<Coord> {
        self.bounds().map(|b| b.ul)
    }

    pub fn br(&self) -> Option<Coord> {
        self.bounds().map(|b| b.br)
    }

    pub fn area(&self) -> Option<i64> {
        self.bounds().map(|b| b.area())
    }

    /// Grids absorbed into this rectangle, including its own corners
    pub fn history(&self) -> &BTreeSet<GridId> {
        &self.history
    }

    /// True when any of `grids` was absorbed into this rectangle
    pub fn depends_on(&self, grids: &[GridId]) -> bool {
        grids.iter().any(|g| self.history.contains(g))
    }

    pub(crate) fn with_history(mut self, grids: impl IntoIterator<Item = GridId>) -> Self {
        self.history.extend(grids);
        self
    }

    /// Pin a pending rectangle to absolute coordinates.
    ///
    /// Resolved rectangles are immutable; placing one again is a no-op.
    pub(crate) fn place(&mut self, bounds: Bounds, anchor: GridAnchor) {
        if self.is_resolved() {
            return;
        }
        self.history.insert(anchor.ul_grid);
        self.history.insert(anchor.br_grid);
        self.placement = Placement::Resolved { bounds, anchor };
    }
}
