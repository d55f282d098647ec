//! Axis-aligned rectangle geometry
//!
//! Pure functions over [`Bounds`] plus the [`Rectangle`]-level overlap,
//! subtract and merge used by the worker. Nothing in here consults a grid map:
//! pieces produced by [`subtract`] and [`merge`] come back `Pending` and are
//! placed by the resolver.

use serde::{Deserialize, Serialize};

use crate::core::rect::Rectangle;

/// Integer map coordinate
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Coord {
    pub x: i32,
    pub y: i32,
}

impl Coord {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Floor division on both axes, so negative coordinates land in the
    /// cell to their upper-left.
    pub fn floor_div(self, d: i32) -> Self {
        Self::new(self.x.div_euclid(d), self.y.div_euclid(d))
    }

    /// Scale both axes, `None` on overflow
    pub fn checked_scale(self, m: i32) -> Option<Self> {
        Some(Self::new(self.x.checked_mul(m)?, self.y.checked_mul(m)?))
    }

    pub fn checked_add(self, rhs: Coord) -> Option<Self> {
        Some(Self::new(self.x.checked_add(rhs.x)?, self.y.checked_add(rhs.y)?))
    }

    pub fn checked_sub(self, rhs: Coord) -> Option<Self> {
        Some(Self::new(self.x.checked_sub(rhs.x)?, self.y.checked_sub(rhs.y)?))
    }
}

/// Absolute extent of a rectangle, `ul` inclusive and `br` exclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Bounds {
    pub ul: Coord,
    pub br: Coord,
}

impl Bounds {
    /// Build bounds from two opposite corners in any order
    pub fn new(a: Coord, b: Coord) -> Self {
        Self {
            ul: Coord::new(a.x.min(b.x), a.y.min(b.y)),
            br: Coord::new(a.x.max(b.x), a.y.max(b.y)),
        }
    }

    pub fn width(&self) -> i64 {
        i64::from(self.br.x) - i64::from(self.ul.x)
    }

    pub fn height(&self) -> i64 {
        i64::from(self.br.y) - i64::from(self.ul.y)
    }

    pub fn area(&self) -> i64 {
        self.width() * self.height()
    }

    /// Zero width or zero height
    pub fn is_empty(&self) -> bool {
        self.width() <= 0 || self.height() <= 0
    }

    /// True when the interiors intersect. Touching edges do not count.
    pub fn overlaps(&self, other: &Bounds) -> bool {
        if self.is_empty() || other.is_empty() {
            return false;
        }
        self.br.x > other.ul.x
            && self.ul.x < other.br.x
            && self.br.y > other.ul.y
            && self.ul.y < other.br.y
    }

    pub fn intersection(&self, other: &Bounds) -> Option<Bounds> {
        if !self.overlaps(other) {
            return None;
        }
        Some(Bounds {
            ul: Coord::new(self.ul.x.max(other.ul.x), self.ul.y.max(other.ul.y)),
            br: Coord::new(self.br.x.min(other.br.x), self.br.y.min(other.br.y)),
        })
    }

    /// Half-open containment: the right and bottom edges are outside.
    pub fn contains(&self, p: Coord) -> bool {
        p.x >= self.ul.x && p.x < self.br.x && p.y >= self.ul.y && p.y < self.br.y
    }

    /// Tile `self \ other` with non-overlapping bands.
    ///
    /// Emission order is fixed: left band, right band, then the top and bottom
    /// bands clipped to the horizontal overlap. Zero-area bands are dropped.
    pub fn subtract(&self, other: &Bounds) -> Vec<Bounds> {
        if !self.overlaps(other) {
            return vec![*self];
        }

        let mut pieces = Vec::with_capacity(4);

        if self.ul.x < other.ul.x {
            pieces.push(Bounds {
                ul: self.ul,
                br: Coord::new(other.ul.x, self.br.y),
            });
        }
        if self.br.x > other.br.x {
            pieces.push(Bounds {
                ul: Coord::new(other.br.x, self.ul.y),
                br: self.br,
            });
        }

        let mid_left = self.ul.x.max(other.ul.x);
        let mid_right = self.br.x.min(other.br.x);
        if self.ul.y < other.ul.y && mid_left < mid_right {
            pieces.push(Bounds {
                ul: Coord::new(mid_left, self.ul.y),
                br: Coord::new(mid_right, other.ul.y),
            });
        }
        if self.br.y > other.br.y && mid_left < mid_right {
            pieces.push(Bounds {
                ul: Coord::new(mid_left, other.br.y),
                br: Coord::new(mid_right, self.br.y),
            });
        }

        pieces.retain(|p| !p.is_empty());
        pieces
    }

    /// Union of two rectangles sharing one full-length edge.
    ///
    /// Returns `None` for partial-edge contact, overlap, or disjoint input.
    pub fn merge(&self, other: &Bounds) -> Option<Bounds> {
        if self.is_empty() || other.is_empty() {
            return None;
        }

        let side_by_side = self.ul.y == other.ul.y
            && self.height() == other.height()
            && (self.br.x == other.ul.x || self.ul.x == other.br.x);
        if side_by_side {
            return Some(Bounds {
                ul: Coord::new(self.ul.x.min(other.ul.x), self.ul.y),
                br: Coord::new(self.br.x.max(other.br.x), self.br.y),
            });
        }

        let stacked = self.ul.x == other.ul.x
            && self.width() == other.width()
            && (self.br.y == other.ul.y || self.ul.y == other.br.y);
        if stacked {
            return Some(Bounds {
                ul: Coord::new(self.ul.x, self.ul.y.min(other.ul.y)),
                br: Coord::new(self.br.x, self.br.y.max(other.br.y)),
            });
        }

        None
    }
}

/// Same segment, both resolved, interiors intersect
pub fn overlaps(a: &Rectangle, b: &Rectangle) -> bool {
    if a.segment != b.segment {
        return false;
    }
    match (a.bounds(), b.bounds()) {
        (Some(ab), Some(bb)) => ab.overlaps(&bb),
        _ => false,
    }
}

/// Pieces of `a` not covered by `b`.
///
/// When the two do not overlap `a` is returned as-is. Otherwise every piece
/// is a fresh `Pending` rectangle in `a`'s segment.
pub fn subtract(a: &Rectangle, b: &Rectangle) -> Vec<Rectangle> {
    let (Some(ab), Some(bb)) = (a.bounds(), b.bounds()) else {
        return vec![a.clone()];
    };
    if !overlaps(a, b) {
        return vec![a.clone()];
    }
    ab.subtract(&bb)
        .into_iter()
        .map(|piece| Rectangle::observed(piece, a.segment))
        .collect()
}

/// Merge two resolved rectangles of one segment sharing a full edge.
///
/// The result is `Pending` until resolved and carries both histories.
pub fn merge(a: &Rectangle, b: &Rectangle) -> Option<Rectangle> {
    if a.segment != b.segment {
        return None;
    }
    let merged = a.bounds()?.merge(&b.bounds()?)?;
    Some(
        Rectangle::observed(merged, a.segment)
            .with_history(a.history().iter().chain(b.history()).copied()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::rect::GridAnchor;
    use proptest::prelude::*;

    fn b(x0: i32, y0: i32, x1: i32, y1: i32) -> Bounds {
        Bounds::new(Coord::new(x0, y0), Coord::new(x1, y1))
    }

    fn resolved(bounds: Bounds, segment: i64, grid: i64) -> Rectangle {
        let anchor = GridAnchor {
            ul_grid: grid,
            br_grid: grid,
            local_ul: bounds.ul,
            local_br: bounds.br,
        };
        Rectangle::resolved(bounds, anchor, segment)
    }

    #[test]
    fn test_bounds_normalizes_corners() {
        let r = b(10, 10, 0, 0);
        assert_eq!(r.ul, Coord::new(0, 0));
        assert_eq!(r.br, Coord::new(10, 10));
        assert_eq!(r.area(), 100);
    }

    #[test]
    fn test_touching_edges_do_not_overlap() {
        assert!(!b(0, 0, 10, 10).overlaps(&b(10, 0, 20, 10)));
        assert!(!b(0, 0, 10, 10).overlaps(&b(0, 10, 10, 20)));
        assert!(b(0, 0, 10, 10).overlaps(&b(9, 9, 20, 20)));
    }

    #[test]
    fn test_empty_bounds_never_overlap() {
        assert!(!b(5, 0, 5, 10).overlaps(&b(0, 0, 10, 10)));
    }

    #[test]
    fn test_contains_is_half_open() {
        let r = b(0, 0, 10, 10);
        assert!(r.contains(Coord::new(0, 0)));
        assert!(r.contains(Coord::new(9, 9)));
        assert!(!r.contains(Coord::new(10, 5)));
        assert!(!r.contains(Coord::new(5, 10)));
    }

    #[test]
    fn test_floor_div_negative() {
        assert_eq!(Coord::new(-1, 99).floor_div(100), Coord::new(-1, 0));
        assert_eq!(Coord::new(-100, 100).floor_div(100), Coord::new(-1, 1));
    }

    #[test]
    fn test_checked_arithmetic_at_limits() {
        let far = Coord::new(i32::MAX, 0);
        assert_eq!(far.checked_add(Coord::new(1, 0)), None);
        assert_eq!(Coord::new(i32::MIN, 0).checked_sub(Coord::new(1, 0)), None);
        assert_eq!(Coord::new(i32::MIN / 50, 0).checked_scale(100), None);
        assert_eq!(Coord::new(-3, 4).checked_scale(100), Some(Coord::new(-300, 400)));
        assert_eq!(
            Coord::new(5, 5).checked_sub(Coord::new(2, 7)),
            Some(Coord::new(3, -2))
        );
    }

    #[test]
    fn test_extreme_bounds_area() {
        let r = b(i32::MIN, 0, i32::MAX, 2);
        assert_eq!(r.width(), i64::from(u32::MAX));
        assert_eq!(r.area(), 2 * i64::from(u32::MAX));
    }

    #[test]
    fn test_subtract_disjoint_returns_self() {
        let a = b(0, 0, 10, 10);
        assert_eq!(a.subtract(&b(20, 20, 30, 30)), vec![a]);
    }

    #[test]
    fn test_subtract_fully_covered_is_empty() {
        assert!(b(2, 2, 8, 8).subtract(&b(0, 0, 10, 10)).is_empty());
    }

    #[test]
    fn test_subtract_piece_order() {
        // Hole in the middle: left, right, top, bottom
        let pieces = b(0, 0, 30, 30).subtract(&b(10, 10, 20, 20));
        assert_eq!(
            pieces,
            vec![
                b(0, 0, 10, 30),
                b(20, 0, 30, 30),
                b(10, 0, 20, 10),
                b(10, 20, 20, 30),
            ]
        );
    }

    #[test]
    fn test_subtract_corner_overlap() {
        let pieces = b(5, 5, 15, 15).subtract(&b(0, 0, 10, 10));
        assert_eq!(pieces, vec![b(10, 5, 15, 15), b(5, 10, 10, 15)]);
    }

    #[test]
    fn test_merge_side_by_side() {
        assert_eq!(b(0, 0, 10, 10).merge(&b(10, 0, 20, 10)), Some(b(0, 0, 20, 10)));
        assert_eq!(b(10, 0, 20, 10).merge(&b(0, 0, 10, 10)), Some(b(0, 0, 20, 10)));
    }

    #[test]
    fn test_merge_stacked() {
        assert_eq!(b(0, 0, 10, 10).merge(&b(0, 10, 10, 25)), Some(b(0, 0, 10, 25)));
    }

    #[test]
    fn test_merge_rejects_partial_edge() {
        assert_eq!(b(0, 0, 10, 10).merge(&b(10, 5, 20, 15)), None);
        assert_eq!(b(0, 0, 10, 10).merge(&b(10, 0, 20, 5)), None);
    }

    #[test]
    fn test_merge_rejects_overlap_and_gap() {
        assert_eq!(b(0, 0, 10, 10).merge(&b(5, 0, 15, 10)), None);
        assert_eq!(b(0, 0, 10, 10).merge(&b(11, 0, 20, 10)), None);
    }

    #[test]
    fn test_rectangle_overlaps_requires_same_segment_and_resolved() {
        let a = resolved(b(0, 0, 10, 10), 1, 7);
        let same = resolved(b(5, 5, 15, 15), 1, 7);
        let other_segment = resolved(b(5, 5, 15, 15), 2, 7);
        let pending = Rectangle::observed(b(5, 5, 15, 15), 1);

        assert!(overlaps(&a, &same));
        assert!(!overlaps(&a, &other_segment));
        assert!(!overlaps(&a, &pending));
    }

    #[test]
    fn test_rectangle_subtract_keeps_non_overlapping_unchanged() {
        let a = resolved(b(0, 0, 10, 10), 1, 7);
        let far = resolved(b(50, 50, 60, 60), 1, 7);
        let result = subtract(&a, &far);
        assert_eq!(result, vec![a]);
    }

    #[test]
    fn test_rectangle_subtract_pieces_are_pending() {
        let a = resolved(b(0, 0, 10, 10), 1, 7);
        let hole = resolved(b(0, 0, 5, 10), 1, 7);
        let result = subtract(&a, &hole);
        assert_eq!(result.len(), 1);
        assert!(result[0].is_pending());
        assert_eq!(result[0].observed_bounds(), Some(b(5, 0, 10, 10)));
    }

    #[test]
    fn test_rectangle_merge_unions_history() {
        let a = resolved(b(0, 0, 10, 10), 1, 7);
        let c = resolved(b(10, 0, 20, 10), 1, 8);
        let merged = merge(&a, &c).expect("adjacent rectangles merge");
        assert_eq!(merged.observed_bounds(), Some(b(0, 0, 20, 10)));
        assert!(merged.history().contains(&7));
        assert!(merged.history().contains(&8));
        assert_eq!(merge(&a, &resolved(b(10, 0, 20, 10), 2, 8)), None);
    }

    #[test]
    fn test_subtract_of_merge_recovers_other_half() {
        let a = b(0, 0, 10, 10);
        let c = b(10, 0, 20, 10);
        let merged = a.merge(&c).expect("merge");
        let rest = merged.subtract(&a);
        assert_eq!(rest.iter().map(Bounds::area).sum::<i64>(), c.area());
    }

    fn arb_bounds() -> impl Strategy<Value = Bounds> {
        (-50i32..50, -50i32..50, 1i32..40, 1i32..40)
            .prop_map(|(x, y, w, h)| b(x, y, x + w, y + h))
    }

    proptest! {
        #[test]
        fn prop_subtract_preserves_area(a in arb_bounds(), c in arb_bounds()) {
            let pieces = a.subtract(&c);
            let covered = a.intersection(&c).map_or(0, |i| i.area());
            prop_assert_eq!(pieces.iter().map(Bounds::area).sum::<i64>() + covered, a.area());
        }

        #[test]
        fn prop_subtract_pieces_disjoint(a in arb_bounds(), c in arb_bounds()) {
            let pieces = a.subtract(&c);
            for (i, p) in pieces.iter().enumerate() {
                prop_assert!(!p.is_empty());
                prop_assert!(!p.overlaps(&c));
                for q in &pieces[i + 1..] {
                    prop_assert!(!p.overlaps(q));
                }
            }
        }

        #[test]
        fn prop_merge_only_for_full_edge(a in arb_bounds(), c in arb_bounds()) {
            if let Some(m) = a.merge(&c) {
                prop_assert!(!a.overlaps(&c));
                prop_assert_eq!(m.area(), a.area() + c.area());
                prop_assert_eq!(m.subtract(&a).iter().map(Bounds::area).sum::<i64>(), c.area());
            }
        }
    }
}
