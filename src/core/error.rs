//! Resolution errors
//!
//! These never leave the engine: a rectangle that fails to resolve simply
//! stays pending and is retried on the next tick.

use thiserror::Error;

use crate::core::geometry::Coord;
use crate::core::rect::{GridId, SegmentId};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("segment {0} not loaded")]
    SegmentNotFound(SegmentId),

    #[error("grid {grid} not placed in segment {segment}")]
    GridNotFound { segment: SegmentId, grid: GridId },

    #[error("no grid at cell ({}, {}) in segment {segment}", cell.x, cell.y)]
    UnknownCell { segment: SegmentId, cell: Coord },

    #[error("grids of segment {0} place the corners out of order")]
    InvertedBounds(SegmentId),

    #[error("coordinates in segment {0} out of range")]
    OutOfRange(SegmentId),
}
