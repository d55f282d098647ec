//! Explored-area engine facade

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use butterfly_common::Result;
use log::{debug, info, warn};
use serde_json::Value;

use crate::core::codec;
use crate::core::config::FogConfig;
use crate::core::geometry::Coord;
use crate::core::grid::GridLookup;
use crate::core::rect::{Rectangle, SegmentId};
use crate::core::store::RectangleStore;
use crate::core::worker::{Job, Shared, Worker};

/// Tracks the explored area of every segment.
///
/// Observations go in through [`submit`](Self::submit) and are folded into
/// the store by a background worker, kicked off from [`tick`](Self::tick).
/// Readers always get copies.
pub struct FogArea {
    shared: Arc<Shared>,
    worker: Worker,
}

impl FogArea {
    /// Start with nothing explored
    pub fn new(grids: Arc<dyn GridLookup>, config: FogConfig) -> Result<Self> {
        Self::with_rectangles(grids, config, Vec::new())
    }

    /// Start from a persisted document. Malformed content gives an empty
    /// area rather than an error.
    pub fn with_document(grids: Arc<dyn GridLookup>, config: FogConfig, text: &str) -> Result<Self> {
        config.validate()?;
        let rects = codec::decode_str(text, config.cell_size);
        Self::with_rectangles(grids, config, rects)
    }

    /// Start from the document at `path`, or empty if there is none
    pub fn open<P: AsRef<Path>>(path: P, grids: Arc<dyn GridLookup>, config: FogConfig) -> Result<Self> {
        config.validate()?;
        let rects = codec::read_file(path.as_ref(), config.cell_size);
        Self::with_rectangles(grids, config, rects)
    }

    fn with_rectangles(
        grids: Arc<dyn GridLookup>,
        config: FogConfig,
        rects: Vec<Rectangle>,
    ) -> Result<Self> {
        config.validate()?;
        let loaded = rects.len();
        let shared = Arc::new(Shared::new(RectangleStore::from_rectangles(rects), grids, config));
        let worker = Worker::spawn(Arc::clone(&shared))?;
        info!("Fog area ready with {loaded} loaded rectangle(s)");
        Ok(Self { shared, worker })
    }

    pub fn config(&self) -> &FogConfig {
        &self.shared.config
    }

    /// Queue an observed region; returns false if it was debounced or empty
    pub fn submit(&self, ul: Coord, br: Coord, segment: SegmentId) -> bool {
        self.shared.queue.submit(ul, br, segment)
    }

    /// Advance resolution and start a worker pass if one is due.
    ///
    /// Never blocks on a running pass.
    pub fn tick(&self, _dt: f64) {
        let resolver = self.shared.resolver();
        self.shared.queue.advance(&resolver);
        let settled = self.shared.store.settle_pending(&resolver);
        if !settled.is_empty() {
            debug!("Resolved {} stored rectangle(s)", settled.len());
            self.shared.note_settled(settled);
            self.shared.notify_resolved();
        }
        self.schedule();
    }

    fn schedule(&self) {
        if !self.shared.has_work() || !self.shared.try_claim() {
            return;
        }
        let job = match self.shared.next_candidate() {
            Some(candidate) => Job::Candidate(candidate),
            None if self.shared.has_settled() => Job::Reconcile,
            None => {
                self.shared.release();
                return;
            }
        };
        if let Err(job) = self.worker.dispatch(job) {
            warn!("Fog worker unavailable, work kept for a later tick");
            if let Job::Candidate(candidate) = job {
                self.shared.queue.requeue_front(candidate);
            }
            self.shared.release();
        }
    }

    /// Resolved rectangles in insertion order, optionally for one segment
    pub fn snapshot(&self, segment: Option<SegmentId>) -> Vec<Rectangle> {
        self.shared.store.snapshot(segment)
    }

    pub fn is_explored(&self, segment: SegmentId, point: Coord) -> bool {
        self.shared.store.contains_point(segment, point)
    }

    pub fn explored_area(&self, segment: SegmentId) -> i64 {
        self.shared.store.area(segment)
    }

    /// Stored rectangles still waiting for their grids
    pub fn pending_count(&self) -> usize {
        self.shared.store.pending_count()
    }

    /// Observations not yet folded into the store
    pub fn queued_count(&self) -> usize {
        self.shared.queue.len()
    }

    pub fn serialize(&self) -> Value {
        codec::encode(&self.shared.store.snapshot_all())
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.serialize())?)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        codec::write_file(path.as_ref(), &self.serialize())
    }

    /// Return and clear the changed-since-last-save flag
    pub fn take_dirty(&self) -> bool {
        self.shared.store.take_dirty()
    }

    pub fn generation(&self) -> u64 {
        self.shared.store.generation()
    }

    /// Forget everything explored and everything queued
    pub fn clear(&self) {
        self.shared.queue.clear();
        self.shared.forget_settled();
        self.shared.store.clear();
        self.shared.store.mark_changed();
    }

    /// Tick until no pass runs and none could start.
    ///
    /// Candidates still waiting on a grid, or on a stored rectangle that
    /// shares one of their grids, do not count as work.
    ///
    /// Returns false if `timeout` ran out first.
    pub fn drain(&self, timeout: Duration) -> Result<bool> {
        let deadline = Instant::now() + timeout;
        loop {
            self.worker.ensure_running()?;
            self.tick(0.0);
            if !self.shared.is_busy() && !self.shared.has_work() {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            std::thread::sleep(self.shared.config.poll_interval);
        }
    }
}

impl Drop for FogArea {
    fn drop(&mut self) {
        self.shared.request_shutdown();
        self.worker.shutdown();
    }
}
