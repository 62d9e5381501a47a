// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Rectangle feature: one detection result (or the full-bounds fallback) tied
// to the size of the image it came from, and its conversion into display
// space.

use serde::Serialize;
use tracing::{debug, info, instrument};

use cardkeeper_core::{Orientation, Point, Quadrilateral, Size};

use crate::detect::RectangleDetector;
use crate::image::SourceImage;

/// An immutable detection result.
///
/// Corners are in detector space (bottom-left origin, pixel units of the
/// stored buffer) with the labels assigned by the angular sort. `size` is the
/// image size the corners relate to. `is_correct` is `false` for the
/// full-bounds fallback.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RectangleFeature {
    quad: Quadrilateral,
    size: Size,
    is_correct: bool,
}

impl RectangleFeature {
    pub fn new(quad: Quadrilateral, size: Size, is_correct: bool) -> Self {
        Self {
            quad,
            size,
            is_correct,
        }
    }

    /// The whole image, inset by `inset` pixels on every side.
    pub fn fallback(size: Size, inset: f64) -> Self {
        let quad = Quadrilateral::new(
            Point::new(inset, inset),
            Point::new(size.width - inset, inset),
            Point::new(size.width - inset, size.height - inset),
            Point::new(inset, size.height - inset),
        );
        Self::new(quad, size, false)
    }

    /// A detection result if there is one, the fallback otherwise.
    pub fn from_detection(detected: Option<Quadrilateral>, size: Size, inset: f64) -> Self {
        match detected {
            Some(quad) => Self::new(quad, size, true),
            None => Self::fallback(size, inset),
        }
    }

    /// Run `detector` over the stored pixels of `image`, unless `expanded`
    /// asks for the full-bounds quadrilateral straight away.
    #[instrument(skip(image, detector), fields(width = image.pixels().width(), height = image.pixels().height()))]
    pub fn detect(
        image: &SourceImage,
        expanded: bool,
        detector: &dyn RectangleDetector,
        inset: f64,
    ) -> Self {
        let size = image.size();
        if expanded {
            debug!("Expanded crop requested; skipping detection");
            return Self::fallback(size, inset);
        }
        let detected = detector.detect(image.pixels());
        if detected.is_none() {
            info!("No rectangle detected; using full image bounds");
        }
        Self::from_detection(detected, size, inset)
    }

    // -- Accessors ------------------------------------------------------------

    pub fn quad(&self) -> &Quadrilateral {
        &self.quad
    }

    pub fn top_left(&self) -> Point {
        self.quad.top_left
    }

    pub fn top_right(&self) -> Point {
        self.quad.top_right
    }

    pub fn bottom_right(&self) -> Point {
        self.quad.bottom_right
    }

    pub fn bottom_left(&self) -> Point {
        self.quad.bottom_left
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn is_correct(&self) -> bool {
        self.is_correct
    }

    // -- Conversion -----------------------------------------------------------

    /// Express this feature in a display space of `new_size` showing an
    /// image with the given orientation.
    ///
    /// The default mapping flips y and moves each corner one role along
    /// (bottom-left becomes top-left, bottom-right top-right, top-right
    /// bottom-right, top-left bottom-left). A genuine detection on a
    /// `Right`-oriented image is transposed instead. A source width that
    /// truncates to zero returns the feature unchanged.
    ///
    /// The result is tagged as not correct, so converting it again always
    /// takes the default mapping.
    pub fn convert_to(&self, new_size: Size, orientation: Orientation) -> RectangleFeature {
        if !(self.size.width.abs() >= 1.0) {
            return *self;
        }

        let scale = new_size.width / self.size.width;
        let q = &self.quad;
        let h = self.size.height;
        let flipped = |p: Point| Point::new(p.x * scale, (h - p.y) * scale);
        let swapped = |p: Point| Point::new(p.y * scale, p.x * scale);

        let quad = if orientation == Orientation::Right && self.is_correct {
            Quadrilateral::new(
                swapped(q.top_left),
                swapped(q.bottom_left),
                swapped(q.bottom_right),
                swapped(q.top_right),
            )
        } else {
            Quadrilateral::new(
                flipped(q.bottom_left),
                flipped(q.bottom_right),
                flipped(q.top_right),
                flipped(q.top_left),
            )
        };
        RectangleFeature::new(quad, new_size, false)
    }
}
