//! Placement of rectangles in segment coordinates
//!
//! A rectangle arrives either with absolute corners (fresh observation, or a
//! piece cut by geometry) or with grid-relative corners (loaded from disk).
//! Either way it becomes resolved once both corner grids are present in the
//! segment's grid map.

use log::trace;

use crate::core::error::ResolveError;
use crate::core::geometry::{Bounds, Coord};
use crate::core::grid::GridLookup;
use crate::core::rect::{GridAnchor, GridId, Placement, RectState, Rectangle, SegmentId};

/// Resolves rectangles against one grid map with a fixed cell size
pub struct Resolver<'a> {
    grids: &'a dyn GridLookup,
    cell_size: i32,
}

impl<'a> Resolver<'a> {
    pub fn new(grids: &'a dyn GridLookup, cell_size: i32) -> Self {
        Self { grids, cell_size }
    }

    pub fn cell_size(&self) -> i32 {
        self.cell_size
    }

    /// Try whichever resolution path fits the rectangle's placement.
    ///
    /// Failures are logged and leave the rectangle pending.
    pub fn advance(&self, rect: &mut Rectangle) -> RectState {
        let result = match rect.placement() {
            Placement::Resolved { .. } => return RectState::Resolved,
            Placement::Observed(_) => self.try_resolve(rect),
            Placement::Anchored(_) => self.try_resolve_by_history(rect),
        };
        if let Err(e) = result {
            trace!("Rectangle in segment {} still pending: {e}", rect.segment);
        }
        rect.state()
    }

    /// Find the owning grids of an observed rectangle's corners.
    pub fn try_resolve(&self, rect: &mut Rectangle) -> Result<(), ResolveError> {
        let bounds = match rect.placement() {
            Placement::Observed(bounds) => *bounds,
            Placement::Resolved { .. } => return Ok(()),
            Placement::Anchored(_) => return self.try_resolve_by_history(rect),
        };
        let anchor = self.locate(rect.segment, bounds)?;
        rect.place(bounds, anchor);
        Ok(())
    }

    /// Place an anchored rectangle by reverse-looking-up its grids.
    pub fn try_resolve_by_history(&self, rect: &mut Rectangle) -> Result<(), ResolveError> {
        let anchor = match rect.placement() {
            Placement::Anchored(anchor) => *anchor,
            Placement::Resolved { .. } => return Ok(()),
            Placement::Observed(_) => return self.try_resolve(rect),
        };
        let segment = rect.segment;
        self.require_segment(segment)?;

        let ul_cell = self.cell_of(segment, anchor.ul_grid)?;
        let br_cell = self.cell_of(segment, anchor.br_grid)?;
        let ul = self.absolute(segment, ul_cell, anchor.local_ul)?;
        let br = self.absolute(segment, br_cell, anchor.local_br)?;
        if ul.x > br.x || ul.y > br.y {
            return Err(ResolveError::InvertedBounds(segment));
        }

        rect.place(Bounds { ul, br }, anchor);
        Ok(())
    }

    /// Grid anchor for absolute bounds in `segment`
    pub fn locate(&self, segment: SegmentId, bounds: Bounds) -> Result<GridAnchor, ResolveError> {
        self.require_segment(segment)?;

        let ul_cell = bounds.ul.floor_div(self.cell_size);
        let br_cell = bounds.br.floor_div(self.cell_size);
        let ul_grid = self.grid_at(segment, ul_cell)?;
        let br_grid = self.grid_at(segment, br_cell)?;

        Ok(GridAnchor {
            ul_grid,
            br_grid,
            local_ul: self.local(segment, ul_cell, bounds.ul)?,
            local_br: self.local(segment, br_cell, bounds.br)?,
        })
    }

    /// Cell origin plus local offset
    fn absolute(&self, segment: SegmentId, cell: Coord, local: Coord) -> Result<Coord, ResolveError> {
        cell.checked_scale(self.cell_size)
            .and_then(|origin| origin.checked_add(local))
            .ok_or(ResolveError::OutOfRange(segment))
    }

    /// Offset of `point` from its cell origin
    fn local(&self, segment: SegmentId, cell: Coord, point: Coord) -> Result<Coord, ResolveError> {
        cell.checked_scale(self.cell_size)
            .and_then(|origin| point.checked_sub(origin))
            .ok_or(ResolveError::OutOfRange(segment))
    }

    fn require_segment(&self, segment: SegmentId) -> Result<(), ResolveError> {
        if self.grids.contains_segment(segment) {
            Ok(())
        } else {
            Err(ResolveError::SegmentNotFound(segment))
        }
    }

    fn grid_at(&self, segment: SegmentId, cell: Coord) -> Result<GridId, ResolveError> {
        self.grids
            .grid_id(segment, cell)
            .ok_or(ResolveError::UnknownCell { segment, cell })
    }

    fn cell_of(&self, segment: SegmentId, grid: GridId) -> Result<Coord, ResolveError> {
        self.grids
            .grid_cell(segment, grid)
            .ok_or(ResolveError::GridNotFound { segment, grid })
    }
}
