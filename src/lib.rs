//! # Butterfly-fog Library
//!
//! Incremental explored-area ("fog of war") tracking for segmented,
//! cell-based maps.
//!
//! ## Features
//!
//! - **Compact coverage**: each segment holds a set of non-overlapping
//!   rectangles; adjacent ones of matching size are merged
//! - **Deferred placement**: regions whose grid is not placed yet stay
//!   pending and resolve on a later tick
//! - **Non-blocking ticks**: clipping and merging run on one background
//!   worker, never on the caller's thread
//! - **Persistence**: grid-relative JSON documents that survive segment
//!   re-layout
//!
//! ## Basic Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use butterfly_fog::{Coord, FogArea, FogConfig, SegmentMap};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let grids = Arc::new(SegmentMap::new());
//!     grids.insert_grid(1, Coord::new(0, 0), 7);
//!
//!     let fog = FogArea::open("fog.json", grids.clone(), FogConfig::default())?;
//!     fog.submit(Coord::new(0, 0), Coord::new(40, 30), 1);
//!
//!     // Once per frame
//!     fog.tick(0.016);
//!
//!     fog.drain(Duration::from_secs(1))?;
//!     if fog.take_dirty() {
//!         fog.save("fog.json")?;
//!     }
//!     Ok(())
//! }
//! ```

pub use crate::core::codec;
pub use crate::core::error::ResolveError;
pub use crate::core::geometry::{merge, overlaps, subtract, Bounds, Coord};
pub use crate::core::grid::{GridLookup, SegmentMap};
pub use crate::core::queue::IngestQueue;
pub use crate::core::rect::{GridAnchor, GridId, Placement, RectState, Rectangle, SegmentId};
pub use crate::core::resolver::Resolver;
pub use crate::core::store::{RectId, RectangleStore};
pub use crate::core::{FogArea, FogConfig};
pub use crate::core::config::DEFAULT_CELL_SIZE;
pub use butterfly_common::{Error, Result};

// Internal modules
mod core;
