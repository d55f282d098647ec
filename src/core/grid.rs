//! Segment grid lookup
//!
//! The fog engine never owns the segment map. It only asks two questions of
//! it: which grid sits at a cell, and where a grid sits.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::core::geometry::Coord;
use crate::core::rect::{GridId, SegmentId};

/// Read-only view of the segment/grid placement map.
///
/// Implementations take their own read lock for the duration of each call.
pub trait GridLookup: Send + Sync {
    fn contains_segment(&self, segment: SegmentId) -> bool;

    /// Grid placed at `cell` in `segment`
    fn grid_id(&self, segment: SegmentId, cell: Coord) -> Option<GridId>;

    /// Cell at which grid `id` is placed in `segment`
    fn grid_cell(&self, segment: SegmentId, id: GridId) -> Option<Coord>;
}

#[derive(Debug, Default)]
struct Segment {
    cells: HashMap<Coord, GridId>,
    ids: HashMap<GridId, Coord>,
}

/// In-memory [`GridLookup`] keeping both directions of the mapping
#[derive(Debug, Default)]
pub struct SegmentMap {
    segments: RwLock<HashMap<SegmentId, Segment>>,
}

impl SegmentMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place `id` at `cell`, displacing whatever occupied either slot
    pub fn insert_grid(&self, segment: SegmentId, cell: Coord, id: GridId) {
        let mut segments = self.segments.write();
        let seg = segments.entry(segment).or_default();
        if let Some(old_cell) = seg.ids.insert(id, cell) {
            seg.cells.remove(&old_cell);
        }
        if let Some(old_id) = seg.cells.insert(cell, id) {
            if old_id != id {
                seg.ids.remove(&old_id);
            }
        }
    }

    pub fn remove_grid(&self, segment: SegmentId, id: GridId) -> Option<Coord> {
        let mut segments = self.segments.write();
        let seg = segments.get_mut(&segment)?;
        let cell = seg.ids.remove(&id)?;
        seg.cells.remove(&cell);
        Some(cell)
    }

    pub fn remove_segment(&self, segment: SegmentId) -> bool {
        self.segments.write().remove(&segment).is_some()
    }

    pub fn grid_count(&self, segment: SegmentId) -> usize {
        self.segments
            .read()
            .get(&segment)
            .map_or(0, |seg| seg.ids.len())
    }
}

impl GridLookup for SegmentMap {
    fn contains_segment(&self, segment: SegmentId) -> bool {
        self.segments.read().contains_key(&segment)
    }

    fn grid_id(&self, segment: SegmentId, cell: Coord) -> Option<GridId> {
        self.segments.read().get(&segment)?.cells.get(&cell).copied()
    }

    fn grid_cell(&self, segment: SegmentId, id: GridId) -> Option<Coord> {
        self.segments.read().get(&segment)?.ids.get(&id).copied()
    }
}
