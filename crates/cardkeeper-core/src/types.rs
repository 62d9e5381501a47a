// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core value types shared by the detector, the converter and the crop session.
//
// None of these types know which coordinate space they live in. Detector
// space is bottom-left origin and unrotated; display space is top-left origin
// and oriented. Moving a value between spaces always goes through an explicit
// conversion.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a crop session, used to correlate log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A real-valued (x, y) pair.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const ZERO: Point = Point { x: 0.0, y: 0.0 };

    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other`.
    pub fn distance_to(&self, other: Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    /// Arithmetic midpoint of `self` and `other`.
    pub fn midpoint(&self, other: Point) -> Point {
        Point::new((self.x + other.x) * 0.5, (self.y + other.y) * 0.5)
    }

    /// Flip the y axis inside a container of the given height.
    ///
    /// The same call converts top-left origin to bottom-left origin and back.
    pub fn cartesian(&self, height: f64) -> Point {
        Point::new(self.x, height - self.y)
    }

    /// Swap the two axes.
    pub fn transposed(&self) -> Point {
        Point::new(self.y, self.x)
    }

    pub fn offset_by(&self, dx: f64, dy: f64) -> Point {
        Point::new(self.x + dx, self.y + dy)
    }

    pub fn scaled_by(&self, factor: f64) -> Point {
        Point::new(self.x * factor, self.y * factor)
    }

    /// A square of side `2 * distance` centred on this point.
    pub fn surrounding_square(&self, distance: f64) -> Rect {
        Rect::new(
            self.x - distance,
            self.y - distance,
            distance * 2.0,
            distance * 2.0,
        )
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// A width/height pair in pixels (or display points).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub const ZERO: Size = Size {
        width: 0.0,
        height: 0.0,
    };

    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Pixel dimensions of an image buffer.
    pub fn from_pixels(width: u32, height: u32) -> Self {
        Self::new(width as f64, height as f64)
    }

    /// Width and height exchanged, as seen after a quarter turn.
    pub fn swapped(&self) -> Size {
        Size::new(self.height, self.width)
    }

    /// True when either dimension is zero (or negative).
    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

/// An axis-aligned rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub origin: Point,
    pub size: Size,
}

impl Rect {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            origin: Point::new(x, y),
            size: Size::new(width, height),
        }
    }

    /// A rect anchored at the origin.
    pub const fn from_size(size: Size) -> Self {
        Self {
            origin: Point::ZERO,
            size,
        }
    }

    pub fn width(&self) -> f64 {
        self.size.width
    }

    pub fn height(&self) -> f64 {
        self.size.height
    }

    pub fn min_x(&self) -> f64 {
        self.origin.x.min(self.origin.x + self.size.width)
    }

    pub fn max_x(&self) -> f64 {
        self.origin.x.max(self.origin.x + self.size.width)
    }

    pub fn min_y(&self) -> f64 {
        self.origin.y.min(self.origin.y + self.size.height)
    }

    pub fn max_y(&self) -> f64 {
        self.origin.y.max(self.origin.y + self.size.height)
    }

    pub fn center(&self) -> Point {
        Point::new(
            (self.min_x() + self.max_x()) * 0.5,
            (self.min_y() + self.max_y()) * 0.5,
        )
    }

    /// Half-open containment: the minimum edges are inside, the maximum edges
    /// are not. An empty rect contains nothing.
    pub fn contains(&self, point: Point) -> bool {
        if self.size.is_empty() {
            return false;
        }
        point.x >= self.min_x()
            && point.x < self.max_x()
            && point.y >= self.min_y()
            && point.y < self.max_y()
    }

    /// Smallest rect containing every point in `points`.
    pub fn bounding(points: &[Point]) -> Rect {
        let Some(first) = points.first() else {
            return Rect::default();
        };
        let mut min = *first;
        let mut max = *first;
        for p in points {
            min.x = min.x.min(p.x);
            min.y = min.y.min(p.y);
            max.x = max.x.max(p.x);
            max.y = max.y.max(p.y);
        }
        Rect::new(min.x, min.y, max.x - min.x, max.y - min.y)
    }

    /// The largest rect with the aspect ratio of `aspect` that fits inside
    /// `bounds`, centred in it.
    ///
    /// Degenerate inputs collapse to a zero-size rect at the centre of
    /// `bounds`.
    pub fn aspect_fit(aspect: Size, bounds: Rect) -> Rect {
        let center = bounds.center();
        if aspect.is_empty() || bounds.size.is_empty() {
            return Rect {
                origin: center,
                size: Size::ZERO,
            };
        }
        let scale = (bounds.width() / aspect.width).min(bounds.height() / aspect.height);
        let size = Size::new(aspect.width * scale, aspect.height * scale);
        Rect::new(
            center.x - size.width * 0.5,
            center.y - size.height * 0.5,
            size.width,
            size.height,
        )
    }
}

/// The orientation tag stored alongside a captured pixel buffer.
///
/// The variants follow the camera convention: `Right` means the buffer must
/// be turned a quarter turn clockwise to appear upright.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Orientation {
    #[default]
    Up,
    UpMirrored,
    Down,
    DownMirrored,
    Left,
    LeftMirrored,
    Right,
    RightMirrored,
}

impl Orientation {
    pub const ALL: [Orientation; 8] = [
        Orientation::Up,
        Orientation::UpMirrored,
        Orientation::Down,
        Orientation::DownMirrored,
        Orientation::Left,
        Orientation::LeftMirrored,
        Orientation::Right,
        Orientation::RightMirrored,
    ];

    /// EXIF orientation value (1..=8).
    pub fn exif(&self) -> u8 {
        match self {
            Self::Up => 1,
            Self::UpMirrored => 2,
            Self::Down => 3,
            Self::DownMirrored => 4,
            Self::LeftMirrored => 5,
            Self::Right => 6,
            Self::RightMirrored => 7,
            Self::Left => 8,
        }
    }

    pub fn from_exif(value: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|o| o.exif() == value)
    }

    /// Whether the upright image has width and height exchanged relative to
    /// the stored buffer.
    pub fn swaps_axes(&self) -> bool {
        matches!(
            self,
            Self::Left | Self::LeftMirrored | Self::Right | Self::RightMirrored
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::UpMirrored => "up-mirrored",
            Self::Down => "down",
            Self::DownMirrored => "down-mirrored",
            Self::Left => "left",
            Self::LeftMirrored => "left-mirrored",
            Self::Right => "right",
            Self::RightMirrored => "right-mirrored",
        }
    }
}

impl std::fmt::Display for Orientation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Orientation {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let normalised = s.trim().to_ascii_lowercase().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|o| o.as_str() == normalised)
            .ok_or_else(|| format!("unknown orientation: {s}"))
    }
}
