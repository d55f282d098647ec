//! Core modules of the fog engine
//!
//! Leaves first: geometry and rectangles, the grid collaborator and the
//! resolver, then the store and queue the worker operates on.

pub mod area;
pub mod codec;
pub mod config;
pub mod error;
pub mod geometry;
pub mod grid;
pub mod queue;
pub mod rect;
pub mod resolver;
pub mod store;
mod worker;

pub use area::FogArea;
pub use config::FogConfig;
