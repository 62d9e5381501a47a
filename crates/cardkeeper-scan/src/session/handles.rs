// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Crop handles in display space: the four corners the user drags, the edge
// midpoints derived from them, and the move rules.

use serde::Serialize;

use cardkeeper_core::{Line, Point, Quadrilateral, Rect, Size, intersect};

/// A draggable handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DragTarget {
    TopLeft,
    TopRight,
    BottomRight,
    BottomLeft,
    Top,
    Right,
    Bottom,
    Left,
}

impl DragTarget {
    pub const CORNERS: [DragTarget; 4] = [
        DragTarget::TopLeft,
        DragTarget::TopRight,
        DragTarget::BottomRight,
        DragTarget::BottomLeft,
    ];

    pub const EDGES: [DragTarget; 4] = [
        DragTarget::Top,
        DragTarget::Right,
        DragTarget::Bottom,
        DragTarget::Left,
    ];

    pub fn is_corner(&self) -> bool {
        matches!(
            self,
            DragTarget::TopLeft
                | DragTarget::TopRight
                | DragTarget::BottomRight
                | DragTarget::BottomLeft
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DragTarget::TopLeft => "top-left",
            DragTarget::TopRight => "top-right",
            DragTarget::BottomRight => "bottom-right",
            DragTarget::BottomLeft => "bottom-left",
            DragTarget::Top => "top",
            DragTarget::Right => "right",
            DragTarget::Bottom => "bottom",
            DragTarget::Left => "left",
        }
    }
}

impl std::fmt::Display for DragTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Corner handles in display coordinates (top-left origin).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CropHandles {
    quad: Quadrilateral,
}

impl CropHandles {
    pub fn new(quad: Quadrilateral) -> Self {
        Self { quad }
    }

    pub fn quad(&self) -> &Quadrilateral {
        &self.quad
    }

    /// Where a handle is drawn. Edge handles sit on the midpoint of their two
    /// corners.
    pub fn position(&self, target: DragTarget) -> Point {
        let q = &self.quad;
        match target {
            DragTarget::TopLeft => q.top_left,
            DragTarget::TopRight => q.top_right,
            DragTarget::BottomRight => q.bottom_right,
            DragTarget::BottomLeft => q.bottom_left,
            DragTarget::Top => q.top_left.midpoint(q.top_right),
            DragTarget::Bottom => q.bottom_left.midpoint(q.bottom_right),
            DragTarget::Right => q.top_right.midpoint(q.bottom_right),
            DragTarget::Left => q.bottom_left.midpoint(q.top_left),
        }
    }

    /// Top, right, bottom and left edge handle positions.
    pub fn midpoints(&self) -> [Point; 4] {
        DragTarget::EDGES.map(|edge| self.position(edge))
    }

    /// Lines between the three corners that stay put while `corner` moves.
    /// A corner may not cross to the inner side of any of them.
    fn guard_lines(&self, corner: DragTarget) -> Option<[Line; 3]> {
        let q = &self.quad;
        let (tl, tr, br, bl) = (q.top_left, q.top_right, q.bottom_right, q.bottom_left);
        let lines = match corner {
            DragTarget::TopLeft => [Line::new(bl, tr), Line::new(br, tr), Line::new(bl, br)],
            DragTarget::TopRight => [Line::new(tl, bl), Line::new(bl, br), Line::new(tl, br)],
            DragTarget::BottomRight => [Line::new(tr, bl), Line::new(tr, tl), Line::new(tl, bl)],
            DragTarget::BottomLeft => [Line::new(tr, tl), Line::new(br, tr), Line::new(br, tl)],
            _ => return None,
        };
        Some(lines)
    }

    fn corner_mut(&mut self, corner: DragTarget) -> Option<&mut Point> {
        let q = &mut self.quad;
        match corner {
            DragTarget::TopLeft => Some(&mut q.top_left),
            DragTarget::TopRight => Some(&mut q.top_right),
            DragTarget::BottomRight => Some(&mut q.bottom_right),
            DragTarget::BottomLeft => Some(&mut q.bottom_left),
            _ => None,
        }
    }

    /// Move a corner to `to` if it stays inside `bounds` and does not cross
    /// the other three corners. Returns whether the move was applied.
    pub fn try_move_corner(&mut self, corner: DragTarget, to: Point, bounds: &Rect) -> bool {
        let Some(lines) = self.guard_lines(corner) else {
            return false;
        };
        if !bounds.contains(to) || intersect(to, &lines) {
            return false;
        }
        match self.corner_mut(corner) {
            Some(point) => {
                *point = to;
                true
            }
            None => false,
        }
    }

    /// Slide an edge so its midpoint follows `to` along the edge's normal
    /// axis: vertically for top and bottom, horizontally for left and right.
    /// Both moved corners must stay inside `bounds`.
    pub fn try_move_edge(&mut self, edge: DragTarget, to: Point, bounds: &Rect) -> bool {
        if edge.is_corner() || !bounds.contains(to) {
            return false;
        }
        let anchor = self.position(edge);
        let (dx, dy) = match edge {
            DragTarget::Top | DragTarget::Bottom => (0.0, to.y - anchor.y),
            _ => (to.x - anchor.x, 0.0),
        };

        let q = &self.quad;
        let (first, second, a, b) = match edge {
            DragTarget::Top => (DragTarget::TopLeft, DragTarget::TopRight, q.top_left, q.top_right),
            DragTarget::Bottom => (
                DragTarget::BottomLeft,
                DragTarget::BottomRight,
                q.bottom_left,
                q.bottom_right,
            ),
            DragTarget::Right => (
                DragTarget::TopRight,
                DragTarget::BottomRight,
                q.top_right,
                q.bottom_right,
            ),
            _ => (DragTarget::BottomLeft, DragTarget::TopLeft, q.bottom_left, q.top_left),
        };
        let (a, b) = (a.offset_by(dx, dy), b.offset_by(dx, dy));
        if !bounds.contains(a) || !bounds.contains(b) {
            return false;
        }
        if let Some(p) = self.corner_mut(first) {
            *p = a;
        }
        if let Some(p) = self.corner_mut(second) {
            *p = b;
        }
        true
    }

    /// Handles after the displayed image turned a quarter turn clockwise.
    ///
    /// `prev_rect` and `prev_size` are the display rect and upright image
    /// size before the turn; `new_rect` and `new_size` after it. Each corner
    /// is taken into previous image pixels, turned with `(x, y) -> (h - y, x)`
    /// while the roles move one step clockwise, and brought back into the new
    /// display rect.
    pub fn rotated_clockwise(
        &self,
        prev_rect: &Rect,
        prev_size: Size,
        new_rect: &Rect,
        new_size: Size,
    ) -> CropHandles {
        if !(prev_rect.width() > 0.0) || !(new_rect.width() > 0.0) || !(new_size.width > 0.0) {
            return *self;
        }
        let to_image = prev_size.width / prev_rect.width();
        let to_display = new_size.width / new_rect.width();
        let prev = |p: Point| {
            Point::new(
                (p.x - prev_rect.min_x()) * to_image,
                (p.y - prev_rect.min_y()) * to_image,
            )
        };
        let turn = |p: Point| {
            let p = prev(p);
            Point::new(
                (prev_size.height - p.y) / to_display + new_rect.min_x(),
                p.x / to_display + new_rect.min_y(),
            )
        };

        let q = &self.quad;
        CropHandles::new(Quadrilateral::new(
            turn(q.bottom_left),
            turn(q.top_left),
            turn(q.top_right),
            turn(q.bottom_right),
        ))
    }

    /// Handles carried from one display rect onto another showing the same
    /// image. An empty source rect leaves them unchanged.
    pub fn reprojected(&self, from: &Rect, to: &Rect) -> CropHandles {
        if !(from.width() > 0.0) {
            return *self;
        }
        let factor = to.width() / from.width();
        let map = |p: Point| {
            Point::new(
                (p.x - from.min_x()) * factor + to.min_x(),
                (p.y - from.min_y()) * factor + to.min_y(),
            )
        };
        let q = &self.quad;
        CropHandles::new(Quadrilateral::new(
            map(q.top_left),
            map(q.top_right),
            map(q.bottom_right),
            map(q.bottom_left),
        ))
    }

    /// Corners in upright image pixels for an image of `image_size` shown in
    /// `rect`. `None` when `rect` is empty.
    pub fn to_image_space(&self, rect: &Rect, image_size: Size) -> Option<Quadrilateral> {
        if !(rect.width() > 0.0) {
            return None;
        }
        let factor = image_size.width / rect.width();
        let map = |p: Point| Point::new((p.x - rect.min_x()) * factor, (p.y - rect.min_y()) * factor);
        let q = &self.quad;
        Some(Quadrilateral::new(
            map(q.top_left),
            map(q.top_right),
            map(q.bottom_right),
            map(q.bottom_left),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> CropHandles {
        CropHandles::new(Quadrilateral::from_rect(&Rect::new(0.0, 0.0, 10.0, 10.0)))
    }

    fn roomy() -> Rect {
        Rect::new(-20.0, -20.0, 50.0, 50.0)
    }

    #[test]
    fn top_left_cannot_cross_the_opposite_diagonal() {
        let mut handles = square();
        assert!(!handles.try_move_corner(DragTarget::TopLeft, Point::new(11.0, 11.0), &roomy()));
        assert_eq!(handles, square());
        assert!(handles.try_move_corner(DragTarget::TopLeft, Point::new(1.0, 1.0), &roomy()));
        assert_eq!(handles.quad().top_left, Point::new(1.0, 1.0));
    }

    #[test]
    fn every_corner_has_its_own_guard() {
        let cases = [
            (DragTarget::TopRight, Point::new(9.0, 1.0), Point::new(-1.0, 11.0)),
            (DragTarget::BottomRight, Point::new(9.0, 9.0), Point::new(-1.0, -1.0)),
            (DragTarget::BottomLeft, Point::new(1.0, 9.0), Point::new(11.0, -1.0)),
        ];
        for (corner, inside, crossed) in cases {
            let mut handles = square();
            assert!(!handles.try_move_corner(corner, crossed, &roomy()), "{corner}");
            assert!(handles.try_move_corner(corner, inside, &roomy()), "{corner}");
            assert_eq!(handles.position(corner), inside);
        }
    }

    #[test]
    fn corner_must_stay_in_bounds() {
        let mut handles = square();
        let bounds = Rect::new(0.0, 0.0, 10.0, 10.0);
        assert!(!handles.try_move_corner(DragTarget::TopLeft, Point::new(-1.0, 0.0), &bounds));
        // Half-open: the far edge is outside.
        assert!(!handles.try_move_corner(DragTarget::BottomRight, Point::new(10.0, 10.0), &bounds));
        assert!(handles.try_move_corner(DragTarget::BottomRight, Point::new(9.5, 9.5), &bounds));
    }

    #[test]
    fn edge_targets_are_not_corner_moves() {
        let mut handles = square();
        assert!(!handles.try_move_corner(DragTarget::Top, Point::new(5.0, 1.0), &roomy()));
        assert!(!handles.try_move_edge(DragTarget::TopLeft, Point::new(1.0, 1.0), &roomy()));
    }

    #[test]
    fn midpoints_follow_corners() {
        let mut handles = square();
        assert_eq!(
            handles.midpoints(),
            [
                Point::new(5.0, 0.0),
                Point::new(10.0, 5.0),
                Point::new(5.0, 10.0),
                Point::new(0.0, 5.0),
            ]
        );
        assert!(handles.try_move_corner(DragTarget::TopRight, Point::new(12.0, 2.0), &roomy()));
        assert_eq!(handles.position(DragTarget::Top), Point::new(6.0, 1.0));
        assert_eq!(handles.position(DragTarget::Right), Point::new(11.0, 6.0));
    }

    #[test]
    fn edge_drag_moves_both_corners_along_its_axis() {
        let mut handles = square();
        // Horizontal component of the touch is ignored for the top edge.
        assert!(handles.try_move_edge(DragTarget::Top, Point::new(8.0, 3.0), &roomy()));
        assert_eq!(handles.quad().top_left, Point::new(0.0, 3.0));
        assert_eq!(handles.quad().top_right, Point::new(10.0, 3.0));
        assert_eq!(handles.quad().bottom_left, Point::new(0.0, 10.0));

        assert!(handles.try_move_edge(DragTarget::Left, Point::new(-2.0, 0.0), &roomy()));
        assert_eq!(handles.quad().top_left, Point::new(-2.0, 3.0));
        assert_eq!(handles.quad().bottom_left, Point::new(-2.0, 10.0));
        assert_eq!(handles.quad().top_right, Point::new(10.0, 3.0));
    }

    #[test]
    fn edge_drag_rejects_corners_leaving_bounds() {
        let bounds = Rect::new(0.0, 0.0, 20.0, 20.0);
        let mut handles = CropHandles::new(Quadrilateral::new(
            Point::new(2.0, 2.0),
            Point::new(10.0, 5.0),
            Point::new(10.0, 10.0),
            Point::new(2.0, 10.0),
        ));
        let before = handles;
        // Midpoint y is 3.5; moving it to 0.5 would push the top-left to -1.
        assert!(!handles.try_move_edge(DragTarget::Top, Point::new(6.0, 0.5), &bounds));
        assert_eq!(handles, before);
        // The touch itself must be inside the image.
        assert!(!handles.try_move_edge(DragTarget::Right, Point::new(25.0, 6.0), &bounds));
        assert_eq!(handles, before);
    }

    #[test]
    fn rotation_keeps_handles_on_the_same_content() {
        // 200x100 image shown 1:1, turned into a 100x200 image shown at half
        // size in the same 200x100 view.
        let prev_rect = Rect::new(0.0, 0.0, 200.0, 100.0);
        let new_rect = Rect::new(75.0, 0.0, 50.0, 100.0);
        let handles = CropHandles::new(Quadrilateral::new(
            Point::new(20.0, 10.0),
            Point::new(180.0, 20.0),
            Point::new(190.0, 90.0),
            Point::new(10.0, 80.0),
        ));
        let turned =
            handles.rotated_clockwise(&prev_rect, Size::new(200.0, 100.0), &new_rect, Size::new(100.0, 200.0));

        let q = turned.quad();
        assert_eq!(q.top_left, Point::new(85.0, 5.0));
        assert_eq!(q.top_right, Point::new(120.0, 10.0));
        assert_eq!(q.bottom_right, Point::new(115.0, 90.0));
        assert_eq!(q.bottom_left, Point::new(80.0, 95.0));
        assert_eq!(turned.quad().reorganized(), *turned.quad());
    }

    #[test]
    fn rotation_with_empty_rect_is_unchanged() {
        let handles = square();
        let empty = Rect::new(5.0, 5.0, 0.0, 0.0);
        let turned = handles.rotated_clockwise(&empty, Size::new(10.0, 10.0), &roomy(), Size::new(10.0, 10.0));
        assert_eq!(turned, handles);
    }

    #[test]
    fn reprojection_and_image_space() {
        let handles = CropHandles::new(Quadrilateral::from_rect(&Rect::new(60.0, 10.0, 40.0, 20.0)));
        let from = Rect::new(50.0, 0.0, 100.0, 50.0);
        let to = Rect::new(0.0, 25.0, 200.0, 100.0);

        let moved = handles.reprojected(&from, &to);
        assert_eq!(moved.quad().top_left, Point::new(20.0, 45.0));
        assert_eq!(moved.quad().bottom_right, Point::new(100.0, 85.0));

        let image = handles.to_image_space(&from, Size::new(400.0, 200.0)).expect("rect");
        assert_eq!(image.top_left, Point::new(40.0, 40.0));
        assert_eq!(image.bottom_right, Point::new(200.0, 120.0));
        assert!(handles.to_image_space(&Rect::default(), Size::new(1.0, 1.0)).is_none());
        assert_eq!(handles.reprojected(&Rect::default(), &to), handles);
    }
}
