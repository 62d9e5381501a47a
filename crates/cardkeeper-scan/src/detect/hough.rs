// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Line-based rectangle feature detector: Canny edges, Hough lines, and
// candidate rectangles assembled from pairs of roughly horizontal and roughly
// vertical lines.

use image::{DynamicImage, GrayImage};
use imageproc::edges::canny;
use imageproc::filter::gaussian_blur_f32;
use imageproc::hough::{LineDetectionOptions, PolarLine, detect_lines};
use tracing::{debug, info, instrument};

use cardkeeper_core::{DetectorConfig, Point, Quadrilateral, Size};

use super::{RectangleDetector, biggest_by_half_perimeter, is_convex, passes_shape_filters, sort_corners_by_angle};

/// Images smaller than this on either side are not searched.
const MIN_DIMENSION: u32 = 16;
/// Floor for the Hough vote threshold on small images.
const MIN_VOTES: f64 = 20.0;
/// Fraction of a candidate's border that must sit on edge pixels.
const MIN_EDGE_SUPPORT: f64 = 0.5;
/// Corners may overshoot the image by this many pixels.
const BOUNDS_TOLERANCE: f64 = 2.0;

/// Rectangle feature detector.
///
/// [`FeatureDetector::features`] lists up to `max_feature_count` candidates;
/// the [`RectangleDetector`] impl picks the one with the longest top plus
/// left edge and canonicalises its corners.
#[derive(Debug, Clone, Default)]
pub struct FeatureDetector {
    config: DetectorConfig,
}

/// A Hough line with its position along the perpendicular image axis.
#[derive(Debug, Clone, Copy)]
struct AxisLine {
    line: PolarLine,
    /// y at the horizontal midline for horizontal lines, x at the vertical
    /// midline for vertical ones.
    position: f64,
}

impl FeatureDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Candidate rectangles in detector space, best supported first.
    ///
    /// Each candidate's corners carry their visual labels: `top_left` is the
    /// upper-left corner as the buffer is stored.
    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    pub fn features(&self, image: &DynamicImage) -> Vec<Quadrilateral> {
        let cfg = &self.config;
        let (width, height) = (image.width(), image.height());
        if width < MIN_DIMENSION || height < MIN_DIMENSION {
            debug!("Image too small for feature detection");
            return Vec::new();
        }

        let gray = image.to_luma8();
        let blurred = gaussian_blur_f32(&gray, cfg.blur_sigma);
        let edges = canny(&blurred, cfg.canny_low, cfg.canny_high);

        let min_side = width.min(height) as f64;
        let vote_threshold = (min_side * cfg.hough_vote_fraction).max(MIN_VOTES) as u32;
        let options = LineDetectionOptions {
            vote_threshold,
            suppression_radius: 8,
        };
        let lines = detect_lines(&edges, options);
        debug!(line_count = lines.len(), vote_threshold, "Hough lines detected");

        let (horizontal, vertical) = classify_lines(&lines, &edges, cfg.max_lines_per_axis);
        if horizontal.len() < 2 || vertical.len() < 2 {
            debug!(
                horizontal = horizontal.len(),
                vertical = vertical.len(),
                "Not enough lines to form a rectangle"
            );
            return Vec::new();
        }

        let extent = Size::from_pixels(width, height);
        let mut scored: Vec<(f64, Quadrilateral)> = Vec::new();
        for (i, top) in horizontal.iter().enumerate() {
            for bottom in &horizontal[i + 1..] {
                for (j, left) in vertical.iter().enumerate() {
                    for right in &vertical[j + 1..] {
                        let Some(quad) = quad_from_lines(top, bottom, left, right) else {
                            continue;
                        };
                        if !within_bounds(&quad, extent)
                            || !is_convex(&quad)
                            || !passes_shape_filters(&quad, extent, cfg)
                        {
                            continue;
                        }
                        let support = edge_support(&edges, &quad);
                        if support >= MIN_EDGE_SUPPORT {
                            scored.push((support, quad));
                        }
                    }
                }
            }
        }

        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        scored.truncate(cfg.max_feature_count);
        info!(candidates = scored.len(), "Rectangle features found");

        scored
            .into_iter()
            .map(|(_, quad)| quad.to_cartesian(height as f64))
            .collect()
    }
}

impl RectangleDetector for FeatureDetector {
    fn detect(&self, image: &DynamicImage) -> Option<Quadrilateral> {
        let features = self.features(image);
        let best = biggest_by_half_perimeter(&features)?;
        Some(sort_corners_by_angle(&best))
    }
}

// -- Line helpers -------------------------------------------------------------

/// Split Hough lines into roughly horizontal and roughly vertical sets.
///
/// `angle_in_degrees` is the direction of the line normal: a normal in
/// [60, 120] degrees means a horizontal line, one in [0, 30] or [150, 180)
/// a vertical line. Lines in between are dropped. Each set keeps the
/// `max_per_axis` lines with the most edge pixels, sorted top to bottom or
/// left to right.
fn classify_lines(
    lines: &[PolarLine],
    edges: &GrayImage,
    max_per_axis: usize,
) -> (Vec<AxisLine>, Vec<AxisLine>) {
    let (w, h) = (edges.width() as f64, edges.height() as f64);
    let mut horizontal = Vec::new();
    let mut vertical = Vec::new();

    for line in lines {
        let angle = line.angle_in_degrees;
        let theta = (angle as f64).to_radians();
        let r = line.r as f64;
        if (60..=120).contains(&angle) {
            let position = (r - 0.5 * w * theta.cos()) / theta.sin();
            horizontal.push(AxisLine {
                line: *line,
                position,
            });
        } else if angle <= 30 || angle >= 150 {
            let position = (r - 0.5 * h * theta.sin()) / theta.cos();
            vertical.push(AxisLine {
                line: *line,
                position,
            });
        }
    }

    (
        strongest(horizontal, edges, max_per_axis),
        strongest(vertical, edges, max_per_axis),
    )
}

fn strongest(mut lines: Vec<AxisLine>, edges: &GrayImage, keep: usize) -> Vec<AxisLine> {
    if lines.len() > keep {
        let mut voted: Vec<(usize, AxisLine)> = lines
            .into_iter()
            .map(|l| (line_votes(edges, &l.line), l))
            .collect();
        voted.sort_by(|a, b| b.0.cmp(&a.0));
        voted.truncate(keep);
        lines = voted.into_iter().map(|(_, l)| l).collect();
    }
    lines.sort_by(|a, b| a.position.total_cmp(&b.position));
    lines
}

/// Edge pixels along the full visible span of `line`.
fn line_votes(edges: &GrayImage, line: &PolarLine) -> usize {
    let (w, h) = (edges.width() as f64, edges.height() as f64);
    let theta = (line.angle_in_degrees as f64).to_radians();
    let (sin, cos) = theta.sin_cos();
    let r = line.r as f64;
    let (a, b) = if sin.abs() >= cos.abs() {
        (
            Point::new(0.0, r / sin),
            Point::new(w - 1.0, (r - (w - 1.0) * cos) / sin),
        )
    } else {
        (
            Point::new(r / cos, 0.0),
            Point::new((r - (h - 1.0) * sin) / cos, h - 1.0),
        )
    };
    sample_segment(edges, a, b).0
}

/// Intersection of two lines in Hough normal form `x cos θ + y sin θ = r`.
///
/// Returns `None` for (nearly) parallel lines.
fn intersect_polar_lines(a: &PolarLine, b: &PolarLine) -> Option<Point> {
    let (sin_a, cos_a) = (a.angle_in_degrees as f64).to_radians().sin_cos();
    let (sin_b, cos_b) = (b.angle_in_degrees as f64).to_radians().sin_cos();

    let denom = cos_a * sin_b - sin_a * cos_b;
    if denom.abs() < 1e-6 {
        return None;
    }

    let (r_a, r_b) = (a.r as f64, b.r as f64);
    Some(Point::new(
        (r_a * sin_b - r_b * sin_a) / denom,
        (r_b * cos_a - r_a * cos_b) / denom,
    ))
}

fn quad_from_lines(
    top: &AxisLine,
    bottom: &AxisLine,
    left: &AxisLine,
    right: &AxisLine,
) -> Option<Quadrilateral> {
    Some(Quadrilateral::new(
        intersect_polar_lines(&top.line, &left.line)?,
        intersect_polar_lines(&top.line, &right.line)?,
        intersect_polar_lines(&bottom.line, &right.line)?,
        intersect_polar_lines(&bottom.line, &left.line)?,
    ))
}

fn within_bounds(quad: &Quadrilateral, extent: Size) -> bool {
    quad.corners().iter().all(|p| {
        p.is_finite()
            && p.x >= -BOUNDS_TOLERANCE
            && p.y >= -BOUNDS_TOLERANCE
            && p.x <= extent.width + BOUNDS_TOLERANCE
            && p.y <= extent.height + BOUNDS_TOLERANCE
    })
}

// -- Edge sampling ------------------------------------------------------------

/// Fraction of the quad's border that lies on (or next to) an edge pixel.
fn edge_support(edges: &GrayImage, quad: &Quadrilateral) -> f64 {
    let path = quad.path();
    let (mut hits, mut samples) = (0usize, 0usize);
    for pair in path.windows(2) {
        let (h, s) = sample_segment(edges, pair[0], pair[1]);
        hits += h;
        samples += s;
    }
    if samples == 0 {
        return 0.0;
    }
    hits as f64 / samples as f64
}

/// Walk from `a` to `b` one pixel at a time; returns (hits, samples).
fn sample_segment(edges: &GrayImage, a: Point, b: Point) -> (usize, usize) {
    let length = a.distance_to(b);
    if !length.is_finite() {
        return (0, 0);
    }
    let steps = length.ceil().max(1.0) as usize;
    let mut hits = 0;
    for step in 0..=steps {
        let t = step as f64 / steps as f64;
        let x = a.x + (b.x - a.x) * t;
        let y = a.y + (b.y - a.y) * t;
        if is_edge_near(edges, x, y) {
            hits += 1;
        }
    }
    (hits, steps + 1)
}

/// Any edge pixel in the 3x3 neighbourhood of the rounded position.
fn is_edge_near(edges: &GrayImage, x: f64, y: f64) -> bool {
    let (w, h) = (edges.width() as i64, edges.height() as i64);
    let (cx, cy) = (x.round() as i64, y.round() as i64);
    for ny in (cy - 1)..=(cy + 1) {
        for nx in (cx - 1)..=(cx + 1) {
            if nx >= 0 && ny >= 0 && nx < w && ny < h && edges.get_pixel(nx as u32, ny as u32).0[0] > 0 {
                return true;
            }
        }
    }
    false
}
