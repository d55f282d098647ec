//! Authoritative set of explored rectangles
//!
//! Readers get independent copies taken under the lock. Membership changes
//! come only from the worker; the tick may flip pending entries to resolved
//! in place.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::core::geometry::Coord;
use crate::core::rect::{GridId, RectState, Rectangle, SegmentId};
use crate::core::resolver::Resolver;

/// Store-assigned handle of a rectangle, increasing with insertion order
pub type RectId = u64;

#[derive(Debug, Default)]
struct Entries {
    next_id: RectId,
    /// Bumped on every insertion, removal or placement change
    epoch: u64,
    rects: BTreeMap<RectId, Rectangle>,
}

impl Entries {
    fn push(&mut self, rect: Rectangle) -> RectId {
        let id = self.next_id;
        self.next_id += 1;
        self.rects.insert(id, rect);
        self.epoch += 1;
        id
    }
}

/// Segment-partitioned rectangle set guarded by a single lock
#[derive(Debug, Default)]
pub struct RectangleStore {
    entries: Mutex<Entries>,
    generation: AtomicU64,
    dirty: AtomicBool,
}

impl RectangleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rectangles(rects: impl IntoIterator<Item = Rectangle>) -> Self {
        let store = Self::new();
        {
            let mut entries = store.entries.lock();
            for rect in rects {
                entries.push(rect);
            }
        }
        store
    }

    /// Resolved rectangles in insertion order, optionally for one segment
    pub fn snapshot(&self, segment: Option<SegmentId>) -> Vec<Rectangle> {
        self.entries
            .lock()
            .rects
            .values()
            .filter(|r| r.is_resolved() && segment.map_or(true, |s| r.segment == s))
            .cloned()
            .collect()
    }

    /// Every stored rectangle, pending ones included
    pub fn snapshot_all(&self) -> Vec<Rectangle> {
        self.entries.lock().rects.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().rects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().rects.is_empty()
    }

    pub fn pending_count(&self) -> usize {
        self.entries
            .lock()
            .rects
            .values()
            .filter(|r| r.is_pending())
            .count()
    }

    pub fn contains_point(&self, segment: SegmentId, point: Coord) -> bool {
        self.entries.lock().rects.values().any(|r| {
            r.segment == segment && r.bounds().is_some_and(|b| b.contains(point))
        })
    }

    /// Summed area of resolved rectangles in `segment`
    pub fn area(&self, segment: SegmentId) -> i64 {
        self.entries
            .lock()
            .rects
            .values()
            .filter(|r| r.segment == segment)
            .filter_map(Rectangle::area)
            .sum()
    }

    /// True while a pending rectangle has absorbed any of `grids`
    pub fn has_pending_dependents(&self, grids: &[GridId]) -> bool {
        self.entries
            .lock()
            .rects
            .values()
            .any(|r| r.is_pending() && r.depends_on(grids))
    }

    /// First pair of resolved rectangles in one segment whose interiors meet
    pub fn first_overlap(&self) -> Option<(Rectangle, Rectangle)> {
        let entries = self.entries.lock();
        let rects: Vec<&Rectangle> = entries.rects.values().collect();
        for (i, a) in rects.iter().enumerate() {
            for b in &rects[i + 1..] {
                if crate::core::geometry::overlaps(a, b) {
                    return Some(((*a).clone(), (*b).clone()));
                }
            }
        }
        None
    }

    /// Number of completed changes so far
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Return and clear the "changed since last save" flag
    pub fn take_dirty(&self) -> bool {
        self.dirty.swap(false, Ordering::AcqRel)
    }

    pub(crate) fn mark_changed(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.dirty.store(true, Ordering::Release);
    }

    /// Copy of every entry together with the epoch it was taken at
    pub(crate) fn view(&self) -> (u64, Vec<(RectId, Rectangle)>) {
        let entries = self.entries.lock();
        let copy = entries
            .rects
            .iter()
            .map(|(id, r)| (*id, r.clone()))
            .collect();
        (entries.epoch, copy)
    }

    /// Add a rectangle as-is. Inside a [`FogArea`](crate::FogArea) only the
    /// worker does this.
    pub fn insert(&self, rect: Rectangle) -> RectId {
        self.entries.lock().push(rect)
    }

    /// Insert `rects` only if nothing changed since `epoch`.
    ///
    /// Gives the rectangles back when the store moved on, so the caller can
    /// recompute against a fresh view.
    pub(crate) fn insert_at(
        &self,
        epoch: u64,
        rects: Vec<Rectangle>,
    ) -> std::result::Result<usize, Vec<Rectangle>> {
        let mut entries = self.entries.lock();
        if entries.epoch != epoch {
            return Err(rects);
        }
        let count = rects.len();
        for rect in rects {
            entries.push(rect);
        }
        Ok(count)
    }

    pub fn remove(&self, id: RectId) -> Option<Rectangle> {
        let mut entries = self.entries.lock();
        let removed = entries.rects.remove(&id);
        if removed.is_some() {
            entries.epoch += 1;
        }
        removed
    }

    /// Atomically swap the rectangles `ids` for `rect`.
    ///
    /// Does nothing and returns false if any id is gone.
    pub(crate) fn replace(&self, ids: &[RectId], rect: Rectangle) -> bool {
        let mut entries = self.entries.lock();
        if !ids.iter().all(|id| entries.rects.contains_key(id)) {
            return false;
        }
        for id in ids {
            entries.rects.remove(id);
        }
        entries.push(rect);
        true
    }

    /// Swap the rectangle `id` for `pieces` only if nothing changed since
    /// `epoch`.
    ///
    /// Gives the pieces back when the store moved on or `id` is gone.
    pub(crate) fn swap_at(
        &self,
        epoch: u64,
        id: RectId,
        pieces: Vec<Rectangle>,
    ) -> std::result::Result<usize, Vec<Rectangle>> {
        let mut entries = self.entries.lock();
        if entries.epoch != epoch || entries.rects.remove(&id).is_none() {
            return Err(pieces);
        }
        entries.epoch += 1;
        let count = pieces.len();
        for piece in pieces {
            entries.push(piece);
        }
        Ok(count)
    }

    /// Try to resolve every pending entry; returns the ids that resolved.
    ///
    /// Grid lookups happen outside the store lock.
    pub(crate) fn settle_pending(&self, resolver: &Resolver<'_>) -> Vec<RectId> {
        let pending: Vec<(RectId, Rectangle)> = {
            let entries = self.entries.lock();
            entries
                .rects
                .iter()
                .filter(|(_, r)| r.is_pending())
                .map(|(id, r)| (*id, r.clone()))
                .collect()
        };
        if pending.is_empty() {
            return Vec::new();
        }

        let settled: Vec<(RectId, Rectangle)> = pending
            .into_iter()
            .filter_map(|(id, mut rect)| {
                (resolver.advance(&mut rect) == RectState::Resolved).then_some((id, rect))
            })
            .collect();
        if settled.is_empty() {
            return Vec::new();
        }

        let mut entries = self.entries.lock();
        let mut ids = Vec::with_capacity(settled.len());
        for (id, rect) in settled {
            if let Some(slot) = entries.rects.get_mut(&id) {
                if slot.is_pending() {
                    *slot = rect;
                    ids.push(id);
                }
            }
        }
        if !ids.is_empty() {
            entries.epoch += 1;
        }
        ids
    }

    pub(crate) fn clear(&self) {
        let mut entries = self.entries.lock();
        entries.rects.clear();
        entries.epoch += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geometry::Bounds;
    use crate::core::grid::SegmentMap;
    use crate::core::rect::GridAnchor;

    fn resolved(x0: i32, y0: i32, x1: i32, y1: i32, segment: SegmentId) -> Rectangle {
        let bounds = Bounds::new(Coord::new(x0, y0), Coord::new(x1, y1));
        let anchor = GridAnchor {
            ul_grid: 1,
            br_grid: 1,
            local_ul: bounds.ul,
            local_br: bounds.br,
        };
        Rectangle::resolved(bounds, anchor, segment)
    }

    fn anchored(grid: GridId) -> Rectangle {
        Rectangle::anchored(
            GridAnchor {
                ul_grid: grid,
                br_grid: grid,
                local_ul: Coord::new(0, 0),
                local_br: Coord::new(10, 10),
            },
            1,
        )
    }

    #[test]
    fn test_snapshot_filters_pending_and_segment() {
        let store = RectangleStore::new();
        store.insert(resolved(0, 0, 10, 10, 1));
        store.insert(resolved(0, 0, 10, 10, 2));
        store.insert(anchored(5));

        assert_eq!(store.len(), 3);
        assert_eq!(store.pending_count(), 1);
        assert_eq!(store.snapshot(None).len(), 2);
        assert_eq!(store.snapshot(Some(2)).len(), 1);
        assert_eq!(store.snapshot_all().len(), 3);
    }

    #[test]
    fn test_snapshot_is_independent_copy() {
        let store = RectangleStore::new();
        let id = store.insert(resolved(0, 0, 10, 10, 1));
        let snap = store.snapshot(None);
        store.remove(id);
        assert_eq!(snap.len(), 1);
        assert!(store.is_empty());
    }

    #[test]
    fn test_point_queries_and_area() {
        let store = RectangleStore::new();
        store.insert(resolved(0, 0, 10, 10, 1));
        store.insert(resolved(10, 0, 15, 10, 1));

        assert!(store.contains_point(1, Coord::new(12, 3)));
        assert!(!store.contains_point(1, Coord::new(15, 3)));
        assert!(!store.contains_point(2, Coord::new(1, 1)));
        assert_eq!(store.area(1), 150);
        assert_eq!(store.area(2), 0);
    }

    #[test]
    fn test_insert_at_rejects_stale_epoch() {
        let store = RectangleStore::new();
        let (epoch, _) = store.view();
        store.insert(resolved(0, 0, 10, 10, 1));

        let rejected = store.insert_at(epoch, vec![resolved(20, 20, 30, 30, 1)]);
        assert_eq!(rejected.unwrap_err().len(), 1);

        let (epoch, _) = store.view();
        assert_eq!(store.insert_at(epoch, vec![resolved(20, 20, 30, 30, 1)]), Ok(1));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_replace_requires_all_ids() {
        let store = RectangleStore::new();
        let a = store.insert(resolved(0, 0, 10, 10, 1));
        let b = store.insert(resolved(10, 0, 20, 10, 1));

        assert!(!store.replace(&[a, 999], resolved(0, 0, 20, 10, 1)));
        assert_eq!(store.len(), 2);

        assert!(store.replace(&[a, b], resolved(0, 0, 20, 10, 1)));
        assert_eq!(store.len(), 1);
        assert_eq!(store.area(1), 200);
    }

    #[test]
    fn test_swap_at_checks_epoch_and_id() {
        let store = RectangleStore::new();
        let id = store.insert(resolved(0, 0, 20, 10, 1));
        let (epoch, _) = store.view();
        store.insert(resolved(50, 50, 60, 60, 1));

        let pieces = vec![resolved(0, 0, 10, 10, 1), resolved(10, 0, 20, 10, 1)];
        let pieces = store.swap_at(epoch, id, pieces).unwrap_err();

        let (epoch, _) = store.view();
        assert_eq!(store.swap_at(epoch, 999, pieces.clone()).unwrap_err().len(), 2);
        assert_eq!(store.swap_at(epoch, id, pieces), Ok(2));
        assert_eq!(store.len(), 3);
        assert_eq!(store.area(1), 300);
        assert!(store.remove(id).is_none());
    }

    #[test]
    fn test_pending_dependents() {
        let store = RectangleStore::new();
        store.insert(anchored(42));
        assert!(store.has_pending_dependents(&[42]));
        assert!(!store.has_pending_dependents(&[43]));
    }

    #[test]
    fn test_settle_pending_resolves_in_place() {
        let grids = SegmentMap::new();
        let store = RectangleStore::new();
        store.insert(resolved(0, 0, 10, 10, 1));
        let id = store.insert(anchored(42));

        let resolver = Resolver::new(&grids, 100);
        assert!(store.settle_pending(&resolver).is_empty());

        grids.insert_grid(1, Coord::new(3, 0), 42);
        let resolver = Resolver::new(&grids, 100);
        assert_eq!(store.settle_pending(&resolver), vec![id]);
        assert!(store.settle_pending(&resolver).is_empty());
        assert_eq!(store.pending_count(), 0);
        assert!(!store.has_pending_dependents(&[42]));
        assert_eq!(
            store.snapshot(Some(1))[0].bounds(),
            Some(Bounds::new(Coord::new(300, 0), Coord::new(310, 10)))
        );
    }

    #[test]
    fn test_first_overlap_detection() {
        let store = RectangleStore::new();
        store.insert(resolved(0, 0, 10, 10, 1));
        store.insert(resolved(10, 0, 20, 10, 1));
        assert!(store.first_overlap().is_none());

        store.insert(resolved(5, 5, 15, 15, 1));
        assert!(store.first_overlap().is_some());
    }

    #[test]
    fn test_dirty_flag() {
        let store = RectangleStore::new();
        assert!(!store.take_dirty());
        store.mark_changed();
        assert_eq!(store.generation(), 1);
        assert!(store.take_dirty());
        assert!(!store.take_dirty());
    }
}
