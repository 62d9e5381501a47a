// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Quadrilateral with four labelled corners plus the measurements, orderings and
// transforms the detector and the crop session need.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::geometry::{AffineTransform, Transformable};
use crate::types::{Point, Rect, Size};

/// Four corners labelled top-left, top-right, bottom-right, bottom-left.
///
/// The labels are only trustworthy after [`Quadrilateral::reorganize`] (or the
/// angular sort in the detector) has been applied; construction does not
/// check them.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Quadrilateral {
    pub top_left: Point,
    pub top_right: Point,
    pub bottom_right: Point,
    pub bottom_left: Point,
}

impl Quadrilateral {
    pub const fn new(
        top_left: Point,
        top_right: Point,
        bottom_right: Point,
        bottom_left: Point,
    ) -> Self {
        Self {
            top_left,
            top_right,
            bottom_right,
            bottom_left,
        }
    }

    /// The quadrilateral covering `rect`, labelled in a y-down space.
    pub fn from_rect(rect: &Rect) -> Self {
        Self::new(
            Point::new(rect.min_x(), rect.min_y()),
            Point::new(rect.max_x(), rect.min_y()),
            Point::new(rect.max_x(), rect.max_y()),
            Point::new(rect.min_x(), rect.max_y()),
        )
    }

    /// Corners in path order: TL, TR, BR, BL.
    pub fn corners(&self) -> [Point; 4] {
        [
            self.top_left,
            self.top_right,
            self.bottom_right,
            self.bottom_left,
        ]
    }

    /// Closed polygon TL -> TR -> BR -> BL -> TL.
    pub fn path(&self) -> [Point; 5] {
        [
            self.top_left,
            self.top_right,
            self.bottom_right,
            self.bottom_left,
            self.top_left,
        ]
    }

    /// Sum of the four edge lengths.
    pub fn perimeter(&self) -> f64 {
        self.top_left.distance_to(self.top_right)
            + self.top_right.distance_to(self.bottom_right)
            + self.bottom_right.distance_to(self.bottom_left)
            + self.bottom_left.distance_to(self.top_left)
    }

    /// Area enclosed by the corner path (shoelace formula).
    pub fn area(&self) -> f64 {
        let path = self.path();
        let twice: f64 = path
            .windows(2)
            .map(|w| w[0].x * w[1].y - w[1].x * w[0].y)
            .sum();
        twice.abs() * 0.5
    }

    /// Candidate with the largest [`perimeter`](Self::perimeter).
    ///
    /// A single candidate is returned as-is; ties keep the first maximum.
    pub fn biggest(candidates: &[Quadrilateral]) -> Option<Quadrilateral> {
        if candidates.len() <= 1 {
            return candidates.first().copied();
        }
        let mut best = candidates[0];
        let mut best_perimeter = best.perimeter();
        for candidate in &candidates[1..] {
            let perimeter = candidate.perimeter();
            if perimeter > best_perimeter {
                best = *candidate;
                best_perimeter = perimeter;
            }
        }
        Some(best)
    }

    /// Whether every corner of `other` falls inside a square of side
    /// `2 * distance` around the matching corner of `self`.
    pub fn is_within(&self, distance: f64, other: &Quadrilateral) -> bool {
        self.corners()
            .iter()
            .zip(other.corners().iter())
            .all(|(mine, theirs)| mine.surrounding_square(distance).contains(*theirs))
    }

    /// Relabel the corners from their positions: the two smallest-y points are
    /// the top edge, the other two the bottom edge, and x decides left/right
    /// inside each pair.
    ///
    /// Reliable for near-axis-aligned shapes only. Heavily rotated or
    /// collinear inputs may be mislabelled.
    pub fn reorganize(&mut self) {
        let mut points = self.corners();
        points.sort_by(|a, b| a.y.total_cmp(&b.y));
        let (mut top, mut bottom) = ([points[0], points[1]], [points[2], points[3]]);
        top.sort_by(|a, b| a.x.total_cmp(&b.x));
        bottom.sort_by(|a, b| a.x.total_cmp(&b.x));

        self.top_left = top[0];
        self.top_right = top[1];
        self.bottom_right = bottom[1];
        self.bottom_left = bottom[0];
    }

    /// Owned variant of [`reorganize`](Self::reorganize).
    pub fn reorganized(mut self) -> Self {
        self.reorganize();
        self
    }

    /// Scale from `from` to `to`, optionally rotating by `rotation_angle`
    /// (radians) and re-centring the rotated source bounds onto the
    /// destination bounds.
    ///
    /// For quarter turns the source width and height are swapped before the
    /// scale factor is computed. A zero source width is replaced by the
    /// smallest positive `f64`.
    pub fn scale(&self, from: Size, to: Size, rotation_angle: f64) -> Quadrilateral {
        let rotated = rotation_angle != 0.0;
        let effective_from = if rotated && rotation_angle != PI {
            from.swapped()
        } else {
            from
        };

        let from_width = if effective_from.width == 0.0 {
            f64::MIN_POSITIVE
        } else {
            effective_from.width
        };

        let factor = to.width / from_width;
        let scale = AffineTransform::scale(factor, factor);
        let scaled = self.applying(&scale);
        if !rotated {
            return scaled;
        }

        let rotation = AffineTransform::rotation(rotation_angle);
        let from_bounds = Rect::from_size(from).applying(&scale).applying(&rotation);
        let to_bounds = Rect::from_size(to);
        let recenter = AffineTransform::translate_between_centers(&from_bounds, &to_bounds);

        scaled.apply_transforms(&[rotation, recenter])
    }

    /// Flip every corner's y axis inside a container of the given height.
    pub fn to_cartesian(&self, height: f64) -> Quadrilateral {
        Quadrilateral::new(
            self.top_left.cartesian(height),
            self.top_right.cartesian(height),
            self.bottom_right.cartesian(height),
            self.bottom_left.cartesian(height),
        )
    }

    /// Translate every corner by `(dx, dy)`.
    pub fn offset_by(&self, dx: f64, dy: f64) -> Quadrilateral {
        self.applying(&AffineTransform::translation(dx, dy))
    }

    pub fn is_finite(&self) -> bool {
        self.corners().iter().all(Point::is_finite)
    }
}

impl Transformable for Quadrilateral {
    fn applying(&self, transform: &AffineTransform) -> Self {
        Quadrilateral::new(
            transform.apply(self.top_left),
            transform.apply(self.top_right),
            transform.apply(self.bottom_right),
            transform.apply(self.bottom_left),
        )
    }
}

impl std::fmt::Display for Quadrilateral {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "topLeft: ({:.2}, {:.2}), topRight: ({:.2}, {:.2}), bottomRight: ({:.2}, {:.2}), bottomLeft: ({:.2}, {:.2})",
            self.top_left.x,
            self.top_left.y,
            self.top_right.x,
            self.top_right.y,
            self.bottom_right.x,
            self.bottom_right.y,
            self.bottom_left.x,
            self.bottom_left.y,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    fn square(side: f64) -> Quadrilateral {
        Quadrilateral::from_rect(&Rect::new(0.0, 0.0, side, side))
    }

    fn assert_close(a: &Quadrilateral, b: &Quadrilateral, eps: f64) {
        for (p, q) in a.corners().iter().zip(b.corners().iter()) {
            assert!(
                (p.x - q.x).abs() < eps && (p.y - q.y).abs() < eps,
                "{a} vs {b}"
            );
        }
    }

    #[test]
    fn perimeter_and_area_of_rectangle() {
        let q = Quadrilateral::from_rect(&Rect::new(0.0, 0.0, 30.0, 10.0));
        assert!((q.perimeter() - 80.0).abs() < 1e-9);
        assert!((q.area() - 300.0).abs() < 1e-9);
    }

    #[test]
    fn collapsed_quad_has_zero_perimeter() {
        let p = Point::new(4.0, 4.0);
        assert_eq!(Quadrilateral::new(p, p, p, p).perimeter(), 0.0);
    }

    #[test]
    fn path_is_closed() {
        let q = square(2.0);
        let path = q.path();
        assert_eq!(path[0], path[4]);
        assert_eq!(path[2], q.bottom_right);
    }

    #[test]
    fn biggest_picks_max_perimeter() {
        let small = square(10.0);
        let large = square(30.0);
        let medium = square(20.0);
        assert_eq!(Quadrilateral::biggest(&[small, large, medium]), Some(large));
    }

    #[test]
    fn biggest_singleton_and_empty() {
        let only = square(3.0);
        assert_eq!(Quadrilateral::biggest(&[only]), Some(only));
        assert_eq!(Quadrilateral::biggest(&[]), None);
    }

    #[test]
    fn biggest_tie_keeps_first() {
        let first = square(10.0);
        let second = first.offset_by(100.0, 0.0);
        assert_eq!(Quadrilateral::biggest(&[first, second]), Some(first));
    }

    #[test]
    fn reorganize_sorts_shuffled_corners() {
        let expected = Quadrilateral::from_rect(&Rect::new(2.0, 3.0, 8.0, 5.0));
        let mut shuffled = Quadrilateral::new(
            expected.bottom_right,
            expected.top_left,
            expected.bottom_left,
            expected.top_right,
        );
        shuffled.reorganize();
        assert_eq!(shuffled, expected);
    }

    #[test]
    fn reorganize_is_idempotent() {
        let q = Quadrilateral::new(
            Point::new(1.0, 2.0),
            Point::new(9.0, 1.0),
            Point::new(10.0, 8.0),
            Point::new(0.0, 9.0),
        );
        assert_eq!(q.reorganized(), q.reorganized().reorganized());
    }

    #[test]
    fn is_within_checks_each_corner() {
        let q = square(10.0);
        let nudged = q.offset_by(0.5, -0.5);
        assert!(q.is_within(1.0, &nudged));
        assert!(!q.is_within(0.25, &nudged));

        let mut one_off = q;
        one_off.bottom_left = Point::new(-3.0, 10.0);
        assert!(!q.is_within(1.0, &one_off));
    }

    #[test]
    fn scale_without_rotation_same_size_is_identity() {
        let q = Quadrilateral::new(
            Point::new(12.5, 3.0),
            Point::new(80.0, 7.25),
            Point::new(77.0, 60.0),
            Point::new(9.0, 55.5),
        );
        let size = Size::new(100.0, 70.0);
        assert_close(&q.scale(size, size, 0.0), &q, 1e-9);
    }

    #[test]
    fn scale_halves_coordinates() {
        let q = square(40.0);
        let scaled = q.scale(Size::new(200.0, 100.0), Size::new(100.0, 50.0), 0.0);
        assert_close(&scaled, &square(20.0), 1e-9);
    }

    #[test]
    fn scale_zero_width_source_stays_finite() {
        // 0 / 0 would poison every corner with NaN.
        let q = square(1.0);
        let scaled = q.scale(Size::new(0.0, 10.0), Size::new(0.0, 10.0), 0.0);
        assert!(scaled.is_finite());
        assert_eq!(scaled, square(0.0));
    }

    #[test]
    fn scale_quarter_turn_swaps_and_recenters() {
        // A 200x100 source turned a quarter turn lands in a 100x200 target.
        let from = Size::new(200.0, 100.0);
        let to = Size::new(100.0, 200.0);
        let full = Quadrilateral::from_rect(&Rect::from_size(from));
        let turned = full.scale(from, to, FRAC_PI_2);

        let bounds = Rect::bounding(&turned.corners());
        assert!((bounds.width() - 100.0).abs() < 1e-9, "{bounds:?}");
        assert!((bounds.height() - 200.0).abs() < 1e-9, "{bounds:?}");
        assert!((bounds.min_x()).abs() < 1e-9);
        assert!((bounds.min_y()).abs() < 1e-9);
    }

    #[test]
    fn scale_half_turn_keeps_orientation_of_size() {
        let size = Size::new(40.0, 20.0);
        let full = Quadrilateral::from_rect(&Rect::from_size(size));
        let turned = full.scale(size, size, PI);
        // corners swap places but the bounds stay put
        assert!((turned.top_left.x - 40.0).abs() < 1e-9);
        assert!((turned.top_left.y - 20.0).abs() < 1e-9);
        assert!(turned.bottom_right.x.abs() < 1e-9);
    }

    #[test]
    fn to_cartesian_round_trips() {
        let q = square(5.0).offset_by(1.0, 2.0);
        assert_eq!(q.to_cartesian(50.0).to_cartesian(50.0), q);
        assert_eq!(q.to_cartesian(50.0).top_left, Point::new(1.0, 48.0));
    }
}
