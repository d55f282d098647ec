//! Ordered queue of freshly observed rectangles

use std::collections::VecDeque;

use log::trace;
use parking_lot::Mutex;

use crate::core::geometry::{Bounds, Coord};
use crate::core::rect::{RectState, Rectangle, SegmentId};
use crate::core::resolver::Resolver;

#[derive(Debug, Default)]
struct QueueState {
    items: VecDeque<Rectangle>,
    /// Last accepted observation, for debouncing
    last: Option<(Coord, Coord, SegmentId)>,
}

/// FIFO of candidates waiting for a worker pass
#[derive(Debug, Default)]
pub struct IngestQueue {
    state: Mutex<QueueState>,
}

impl IngestQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue an observation; returns false when it was dropped.
    ///
    /// A repeat of the previous accepted observation is a no-op, as is one
    /// with zero area.
    pub fn submit(&self, ul: Coord, br: Coord, segment: SegmentId) -> bool {
        let mut state = self.state.lock();
        if state.last == Some((ul, br, segment)) {
            trace!("Debounced repeat observation in segment {segment}");
            return false;
        }
        state.last = Some((ul, br, segment));

        let bounds = Bounds::new(ul, br);
        if bounds.is_empty() {
            trace!("Dropped zero-area observation in segment {segment}");
            return false;
        }
        state.items.push_back(Rectangle::observed(bounds, segment));
        true
    }

    /// Try to resolve every queued candidate; returns how many are ready
    pub fn advance(&self, resolver: &Resolver<'_>) -> usize {
        let mut state = self.state.lock();
        state
            .items
            .iter_mut()
            .map(|rect| resolver.advance(rect))
            .filter(|s| *s == RectState::Resolved)
            .count()
    }

    /// Take the oldest resolved candidate that is not `blocked`, leaving the
    /// others in order
    pub fn pop_ready(&self, blocked: impl Fn(&Rectangle) -> bool) -> Option<Rectangle> {
        let mut state = self.state.lock();
        let idx = state
            .items
            .iter()
            .position(|r| r.is_resolved() && !blocked(r))?;
        state.items.remove(idx)
    }

    /// True if [`pop_ready`](Self::pop_ready) would return a candidate
    pub fn has_ready(&self, blocked: impl Fn(&Rectangle) -> bool) -> bool {
        self.state
            .lock()
            .items
            .iter()
            .any(|r| r.is_resolved() && !blocked(r))
    }

    /// Put back a candidate whose pass did not complete
    pub fn requeue_front(&self, rect: Rectangle) {
        self.state.lock().items.push_front(rect);
    }

    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().items.is_empty()
    }

    pub fn ready_count(&self) -> usize {
        self.state
            .lock()
            .items
            .iter()
            .filter(|r| r.is_resolved())
            .count()
    }

    /// Drop every candidate and forget the last observation
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.items.clear();
        state.last = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::grid::SegmentMap;

    fn c(x: i32, y: i32) -> Coord {
        Coord::new(x, y)
    }

    #[test]
    fn test_consecutive_duplicates_debounced() {
        let queue = IngestQueue::new();
        assert!(queue.submit(c(0, 0), c(10, 10), 1));
        assert!(!queue.submit(c(0, 0), c(10, 10), 1));
        assert_eq!(queue.len(), 1);

        assert!(queue.submit(c(0, 0), c(20, 10), 1));
        assert!(queue.submit(c(0, 0), c(10, 10), 1));
        assert_eq!(queue.len(), 3);
    }

    #[test]
    fn test_segment_change_is_not_a_duplicate() {
        let queue = IngestQueue::new();
        assert!(queue.submit(c(0, 0), c(10, 10), 1));
        assert!(queue.submit(c(0, 0), c(10, 10), 2));
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_zero_area_dropped() {
        let queue = IngestQueue::new();
        assert!(!queue.submit(c(0, 0), c(0, 10), 1));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_pop_ready_skips_pending() {
        let grids = SegmentMap::new();
        grids.insert_grid(1, c(0, 0), 7);
        let queue = IngestQueue::new();
        queue.submit(c(0, 0), c(10, 10), 9);
        queue.submit(c(0, 0), c(10, 10), 1);

        assert_eq!(queue.pop_ready(|_| false), None);
        assert_eq!(queue.advance(&Resolver::new(&grids, 100)), 1);
        assert_eq!(queue.ready_count(), 1);

        let ready = queue.pop_ready(|_| false).expect("segment 1 candidate resolves");
        assert_eq!(ready.segment, 1);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.pop_ready(|_| false), None);
    }

    #[test]
    fn test_blocked_head_does_not_hold_back_others() {
        let grids = SegmentMap::new();
        grids.insert_grid(1, c(0, 0), 7);
        grids.insert_grid(2, c(0, 0), 8);
        let queue = IngestQueue::new();
        queue.submit(c(0, 0), c(10, 10), 1);
        queue.submit(c(0, 0), c(10, 10), 2);
        queue.advance(&Resolver::new(&grids, 100));

        let blocked = |r: &Rectangle| r.segment == 1;
        assert!(queue.has_ready(blocked));
        let ready = queue.pop_ready(blocked).expect("segment 2 candidate is free");
        assert_eq!(ready.segment, 2);

        assert!(!queue.has_ready(blocked));
        assert_eq!(queue.pop_ready(blocked), None);
        assert_eq!(queue.len(), 1);
        assert!(queue.has_ready(|_| false));
    }

    #[test]
    fn test_requeue_front_and_clear() {
        let queue = IngestQueue::new();
        queue.submit(c(0, 0), c(10, 10), 1);
        queue.requeue_front(Rectangle::observed(Bounds::new(c(5, 5), c(6, 6)), 3));
        assert_eq!(queue.len(), 2);

        queue.clear();
        assert!(queue.is_empty());
        assert!(queue.submit(c(0, 0), c(10, 10), 1));
    }
}
