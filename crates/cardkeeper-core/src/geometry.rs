// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Geometry primitives: affine transforms, directed lines and the half-plane
// test used to keep dragged corners from crossing a diagonal.

use serde::{Deserialize, Serialize};

use crate::types::{Point, Rect};

/// A 2D affine transform in row-vector form:
///
/// ```text
/// x' = a * x + c * y + tx
/// y' = b * x + d * y + ty
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AffineTransform {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub tx: f64,
    pub ty: f64,
}

impl AffineTransform {
    pub const IDENTITY: AffineTransform = AffineTransform {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        tx: 0.0,
        ty: 0.0,
    };

    pub fn scale(sx: f64, sy: f64) -> Self {
        Self {
            a: sx,
            d: sy,
            ..Self::IDENTITY
        }
    }

    /// Counter-clockwise rotation about the origin (in a y-up space).
    pub fn rotation(angle: f64) -> Self {
        let (sin, cos) = angle.sin_cos();
        Self {
            a: cos,
            b: sin,
            c: -sin,
            d: cos,
            tx: 0.0,
            ty: 0.0,
        }
    }

    pub fn translation(tx: f64, ty: f64) -> Self {
        Self {
            tx,
            ty,
            ..Self::IDENTITY
        }
    }

    /// Translation that moves the centre of `from` onto the centre of `to`.
    pub fn translate_between_centers(from: &Rect, to: &Rect) -> Self {
        let (f, t) = (from.center(), to.center());
        Self::translation(t.x - f.x, t.y - f.y)
    }

    /// `self` followed by `next`.
    pub fn then(&self, next: &AffineTransform) -> AffineTransform {
        AffineTransform {
            a: self.a * next.a + self.b * next.c,
            b: self.a * next.b + self.b * next.d,
            c: self.c * next.a + self.d * next.c,
            d: self.c * next.b + self.d * next.d,
            tx: self.tx * next.a + self.ty * next.c + next.tx,
            ty: self.tx * next.b + self.ty * next.d + next.ty,
        }
    }

    pub fn apply(&self, p: Point) -> Point {
        Point::new(
            self.a * p.x + self.c * p.y + self.tx,
            self.b * p.x + self.d * p.y + self.ty,
        )
    }
}

impl Default for AffineTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Anything that can be pushed through an affine transform.
pub trait Transformable: Sized {
    fn applying(&self, transform: &AffineTransform) -> Self;

    /// Left-to-right fold of [`Transformable::applying`].
    fn apply_transforms(&self, transforms: &[AffineTransform]) -> Self {
        let mut iter = transforms.iter();
        let Some(first) = iter.next() else {
            return self.applying(&AffineTransform::IDENTITY);
        };
        iter.fold(self.applying(first), |acc, t| acc.applying(t))
    }
}

impl Transformable for Point {
    fn applying(&self, transform: &AffineTransform) -> Self {
        transform.apply(*self)
    }
}

impl Transformable for Rect {
    /// Bounding box of the four transformed corners.
    fn applying(&self, transform: &AffineTransform) -> Self {
        let corners = [
            Point::new(self.min_x(), self.min_y()),
            Point::new(self.max_x(), self.min_y()),
            Point::new(self.max_x(), self.max_y()),
            Point::new(self.min_x(), self.max_y()),
        ]
        .map(|p| transform.apply(p));
        Rect::bounding(&corners)
    }
}

/// A directed line from `p1` to `p2`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Line {
    pub p1: Point,
    pub p2: Point,
}

impl Line {
    pub const fn new(p1: Point, p2: Point) -> Self {
        Self { p1, p2 }
    }

    /// Signed area of the parallelogram spanned by `p1 -> point` and `p1 -> p2`.
    pub fn cross(&self, point: Point) -> f64 {
        (point.x - self.p1.x) * (self.p2.y - self.p1.y)
            - (point.y - self.p1.y) * (self.p2.x - self.p1.x)
    }

    /// Half-plane membership: `true` when `point` lies strictly on the
    /// negative side of the directed line.
    ///
    /// The comparison is done in floating point; near-collinear points with a
    /// cross product in (-1, 0) still count as inside.
    pub fn side_of(&self, point: Point) -> bool {
        self.cross(point) < 0.0
    }
}

/// `true` iff `point` is on the inside of *any* of `lines`.
///
/// This is a crossing guard, not a polygon containment test.
pub fn intersect(point: Point, lines: &[Line]) -> bool {
    lines.iter().any(|line| line.side_of(point))
}
