// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Rectangle detection: the detector seam, the two candidate-selection
// metrics, and the angular corner canonicalisation shared by every stage.
//
// All detectors read the stored (unrotated) pixel buffer and answer in
// detector space: pixel units, bottom-left origin.

pub mod contour;
pub mod hough;

use std::f64::consts::{FRAC_PI_4, PI};
use std::sync::Arc;

use image::DynamicImage;
use tracing::{debug, instrument, warn};

use cardkeeper_core::error::Result;
use cardkeeper_core::{AffineTransform, DetectorConfig, Point, Quadrilateral, Rect, Size, Transformable};

pub use contour::ContourObserver;
pub use hough::FeatureDetector;

/// Something that can find the single best card-like quadrilateral in an
/// image.
///
/// `None` covers every failure mode: no candidates, an unusable image, an
/// internal error. Callers fall back to the full image bounds either way.
pub trait RectangleDetector: Send + Sync {
    fn detect(&self, image: &DynamicImage) -> Option<Quadrilateral>;
}

impl<D: RectangleDetector + ?Sized> RectangleDetector for Arc<D> {
    fn detect(&self, image: &DynamicImage) -> Option<Quadrilateral> {
        (**self).detect(image)
    }
}

/// A source of rectangle observations in normalised coordinates: both axes
/// in `[0, 1]`, origin at the bottom-left corner of the image.
pub trait RectangleObserver: Send + Sync {
    fn observe(&self, image: &DynamicImage) -> Result<Vec<Quadrilateral>>;
}

// -- Canonicalisation ---------------------------------------------------------

/// Polar angle of `point` around `center`, shifted by three eighths of a
/// turn. Uses a truncated remainder, so the result lies in `(-2π, 2π)`.
pub fn angle_from_point(point: Point, center: Point) -> f64 {
    let theta = (point.y - center.y).atan2(point.x - center.x);
    (PI - FRAC_PI_4 + theta) % (2.0 * PI)
}

/// Relabel the corners of a freshly detected quadrilateral.
///
/// The points are sorted by descending [`angle_from_point`] around the centre
/// of their bounding box; positions 3, 2, 1, 0 of the sorted list become
/// top-left, top-right, bottom-right and bottom-left.
pub fn sort_corners_by_angle(quad: &Quadrilateral) -> Quadrilateral {
    let mut points = [
        quad.top_left,
        quad.bottom_left,
        quad.top_right,
        quad.bottom_right,
    ];
    let center = Rect::bounding(&points).center();
    points.sort_by(|a, b| {
        angle_from_point(*b, center).total_cmp(&angle_from_point(*a, center))
    });
    Quadrilateral::new(points[3], points[2], points[1], points[0])
}

// -- Candidate selection ------------------------------------------------------

/// Length of the top edge plus length of the left edge, in single precision.
fn half_perimeter(quad: &Quadrilateral) -> f32 {
    let width = ((quad.top_left.x - quad.top_right.x) as f32)
        .hypot((quad.top_left.y - quad.top_right.y) as f32);
    let height = ((quad.top_left.x - quad.bottom_left.x) as f32)
        .hypot((quad.top_left.y - quad.bottom_left.y) as f32);
    width + height
}

/// Candidate with the largest top-plus-left edge length.
///
/// Distinct from [`Quadrilateral::biggest`]: the feature detector
/// ranks by this half-perimeter, the observation path by full perimeter.
/// Ties keep the first maximum.
pub fn biggest_by_half_perimeter(candidates: &[Quadrilateral]) -> Option<Quadrilateral> {
    let (first, rest) = candidates.split_first()?;
    let mut best = *first;
    let mut best_value = half_perimeter(first);
    for candidate in rest {
        let value = half_perimeter(candidate);
        if value > best_value {
            best = *candidate;
            best_value = value;
        }
    }
    Some(best)
}

// -- Shape filters ------------------------------------------------------------

/// Whether the corner path TL -> TR -> BR -> BL turns the same way at every
/// corner.
pub(crate) fn is_convex(quad: &Quadrilateral) -> bool {
    let path = quad.path();
    let mut sign = 0.0f64;
    for i in 0..4 {
        let (a, b, c) = (path[i], path[i + 1], path[(i + 2) % 4]);
        let turn = (b.x - a.x) * (c.y - b.y) - (b.y - a.y) * (c.x - b.x);
        if turn.abs() < f64::EPSILON {
            return false;
        }
        if sign == 0.0 {
            sign = turn.signum();
        } else if turn.signum() != sign {
            return false;
        }
    }
    true
}

/// Size and aspect-ratio gate shared by both detection stages.
///
/// `extent` is the image size in the quad's units. The shorter averaged side
/// must reach `min_feature_size` of the shorter image side, and the
/// short/long ratio must fall in the configured window.
pub(crate) fn passes_shape_filters(quad: &Quadrilateral, extent: Size, config: &DetectorConfig) -> bool {
    let width = 0.5
        * (quad.top_left.distance_to(quad.top_right)
            + quad.bottom_left.distance_to(quad.bottom_right));
    let height = 0.5
        * (quad.top_left.distance_to(quad.bottom_left)
            + quad.top_right.distance_to(quad.bottom_right));
    let (short, long) = if width < height {
        (width, height)
    } else {
        (height, width)
    };
    if !(long > 0.0) {
        return false;
    }

    let min_side = extent.width.min(extent.height);
    let ratio = short / long;
    short >= config.min_feature_size * min_side
        && ratio >= config.min_aspect_ratio
        && ratio <= config.max_aspect_ratio
}

// -- Observation-based detector -----------------------------------------------

/// Detector built on a [`RectangleObserver`].
///
/// The largest observation by full perimeter is scaled from normalised
/// coordinates to the image extent and canonicalised with
/// [`sort_corners_by_angle`].
pub struct VisionDetector<O = ContourObserver> {
    observer: O,
}

impl VisionDetector<ContourObserver> {
    pub fn with_config(config: DetectorConfig) -> Self {
        Self::new(ContourObserver::new(config))
    }
}

impl Default for VisionDetector<ContourObserver> {
    fn default() -> Self {
        Self::with_config(DetectorConfig::default())
    }
}

impl<O: RectangleObserver> VisionDetector<O> {
    pub fn new(observer: O) -> Self {
        Self { observer }
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }
}

impl<O: RectangleObserver> RectangleDetector for VisionDetector<O> {
    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    fn detect(&self, image: &DynamicImage) -> Option<Quadrilateral> {
        let observations = match self.observer.observe(image) {
            Ok(observations) => observations,
            Err(err) => {
                warn!(error = %err, "Rectangle observation failed; treating as no result");
                return None;
            }
        };
        debug!(count = observations.len(), "Rectangle observations");

        let biggest = if observations.len() > 1 {
            Quadrilateral::biggest(&observations)?
        } else {
            *observations.first()?
        };

        let extent = AffineTransform::scale(image.width() as f64, image.height() as f64);
        let sorted = sort_corners_by_angle(&biggest.applying(&extent));
        debug!(quad = %sorted, "Observation selected");
        Some(sorted)
    }
}

// -- Staged pipeline ----------------------------------------------------------

/// Runs detectors in order and keeps the first answer.
///
/// The default pipeline is the line-based [`FeatureDetector`] followed by the
/// contour-based [`VisionDetector`].
#[derive(Clone)]
pub struct StagedDetector {
    stages: Vec<Arc<dyn RectangleDetector>>,
}

impl StagedDetector {
    pub fn new(stages: Vec<Arc<dyn RectangleDetector>>) -> Self {
        Self { stages }
    }

    pub fn with_config(config: DetectorConfig) -> Self {
        Self::new(vec![
            Arc::new(FeatureDetector::new(config.clone())),
            Arc::new(VisionDetector::with_config(config)),
        ])
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

impl Default for StagedDetector {
    fn default() -> Self {
        Self::with_config(DetectorConfig::default())
    }
}

impl RectangleDetector for StagedDetector {
    fn detect(&self, image: &DynamicImage) -> Option<Quadrilateral> {
        for (stage, detector) in self.stages.iter().enumerate() {
            if let Some(quad) = detector.detect(image) {
                debug!(stage, "Detection stage produced a rectangle");
                return Some(quad);
            }
        }
        None
    }
}
