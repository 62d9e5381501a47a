// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Contour-based rectangle observer: Otsu binarisation in both polarities,
// outer contours, and Douglas-Peucker simplification down to four-cornered
// convex shapes. Results are normalised observations.

use image::{DynamicImage, GrayImage};
use imageproc::contours::{BorderType, Contour, find_contours};
use imageproc::contrast::{ThresholdType, otsu_level, threshold};
use imageproc::filter::gaussian_blur_f32;
use imageproc::geometry::{approximate_polygon_dp, arc_length};
use tracing::{debug, instrument};

use cardkeeper_core::error::{CardkeeperError, Result};
use cardkeeper_core::{DetectorConfig, Point, Quadrilateral, Size};

use super::{RectangleObserver, is_convex, passes_shape_filters};

/// Shapes whose bounds come this close to every image edge are the frame
/// itself, not a card.
const BORDER_MARGIN: f64 = 3.0;
/// Two observations closer than this (per corner, in pixels) are one shape.
const DUPLICATE_DISTANCE: f64 = 4.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Polarity {
    BrightOnDark,
    DarkOnBright,
}

/// Finds card-like quadrilaterals as closed outlines of uniform regions.
#[derive(Debug, Clone, Default)]
pub struct ContourObserver {
    config: DetectorConfig,
}

impl ContourObserver {
    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Four-cornered convex outlines in `mask`, in top-left pixel space with
    /// visual corner labels.
    fn quads_in(&self, mask: &GrayImage) -> Vec<Quadrilateral> {
        let cfg = &self.config;
        let extent = Size::from_pixels(mask.width(), mask.height());
        let min_perimeter = 4.0 * cfg.min_feature_size * extent.width.min(extent.height);

        let contours: Vec<Contour<i32>> = find_contours(mask);
        let mut quads = Vec::new();
        for contour in contours.iter().filter(|c| c.border_type == BorderType::Outer) {
            if contour.points.len() < 4 {
                continue;
            }
            let length = arc_length(&contour.points, true);
            if length < min_perimeter {
                continue;
            }
            let epsilon = (cfg.polygon_epsilon * length).max(1.0);
            let polygon = approximate_polygon_dp(&contour.points, epsilon, true);
            if polygon.len() != 4 {
                continue;
            }

            let corner = |i: usize| Point::new(polygon[i].x as f64, polygon[i].y as f64);
            let quad = Quadrilateral::new(corner(0), corner(1), corner(2), corner(3)).reorganized();
            if is_convex(&quad) && !hugs_border(&quad, extent) && passes_shape_filters(&quad, extent, cfg) {
                quads.push(quad);
            }
        }
        quads
    }
}

impl RectangleObserver for ContourObserver {
    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    fn observe(&self, image: &DynamicImage) -> Result<Vec<Quadrilateral>> {
        let (width, height) = (image.width(), image.height());
        if width == 0 || height == 0 {
            return Err(CardkeeperError::DetectionUnavailable(format!(
                "cannot observe a {}x{} image",
                width, height
            )));
        }

        let gray = image.to_luma8();
        let blurred = gaussian_blur_f32(&gray, self.config.blur_sigma);
        let level = otsu_level(&blurred);
        debug!(level, "Otsu level computed");

        let mut found: Vec<Quadrilateral> = Vec::new();
        for polarity in [Polarity::BrightOnDark, Polarity::DarkOnBright] {
            let mask = binarize(&blurred, level, polarity);
            for quad in self.quads_in(&mask) {
                if !found.iter().any(|q| q.is_within(DUPLICATE_DISTANCE, &quad)) {
                    found.push(quad);
                }
            }
        }

        found.sort_by(|a, b| b.area().total_cmp(&a.area()));
        found.truncate(self.config.max_observations);
        debug!(count = found.len(), "Contour observations");

        let (w, h) = (width as f64, height as f64);
        Ok(found
            .into_iter()
            .map(|q| {
                let normalise = |p: Point| Point::new(p.x / w, (h - p.y) / h);
                Quadrilateral::new(
                    normalise(q.top_left),
                    normalise(q.top_right),
                    normalise(q.bottom_right),
                    normalise(q.bottom_left),
                )
            })
            .collect())
    }
}

fn hugs_border(quad: &Quadrilateral, extent: Size) -> bool {
    let corners = quad.corners();
    let min_x = corners.iter().map(|p| p.x).fold(f64::INFINITY, f64::min);
    let min_y = corners.iter().map(|p| p.y).fold(f64::INFINITY, f64::min);
    let max_x = corners.iter().map(|p| p.x).fold(f64::NEG_INFINITY, f64::max);
    let max_y = corners.iter().map(|p| p.y).fold(f64::NEG_INFINITY, f64::max);
    min_x <= BORDER_MARGIN
        && min_y <= BORDER_MARGIN
        && max_x >= extent.width - 1.0 - BORDER_MARGIN
        && max_y >= extent.height - 1.0 - BORDER_MARGIN
}

/// Foreground mask: 255 where the pixel belongs to the requested polarity.
fn binarize(gray: &GrayImage, level: u8, polarity: Polarity) -> GrayImage {
    let kind = match polarity {
        Polarity::BrightOnDark => ThresholdType::Binary,
        Polarity::DarkOnBright => ThresholdType::BinaryInverted,
    };
    threshold(gray, level, kind)
}
