// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Engine configuration. The defaults are the tuned values the detector and
// crop session were built around; a JSON file may override any subset.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CardkeeperError, Result};

/// Tuning for both rectangle detection stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Smallest accepted feature, as a fraction of the image's shorter side.
    pub min_feature_size: f64,
    /// Lower bound of the short/long side ratio.
    pub min_aspect_ratio: f64,
    /// Upper bound of the short/long side ratio.
    pub max_aspect_ratio: f64,
    /// Candidate cap for the line-based feature detector.
    pub max_feature_count: usize,
    /// Candidate cap for the contour-based observer.
    pub max_observations: usize,
    /// Gaussian blur applied before edge detection / thresholding.
    pub blur_sigma: f32,
    pub canny_low: f32,
    pub canny_high: f32,
    /// Hough vote threshold as a fraction of the image's shorter side.
    pub hough_vote_fraction: f64,
    /// Lines kept per axis before pairing them into candidates.
    pub max_lines_per_axis: usize,
    /// Polygon simplification tolerance as a fraction of contour length.
    pub polygon_epsilon: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            min_feature_size: 0.2,
            min_aspect_ratio: 0.2,
            max_aspect_ratio: 1.0,
            max_feature_count: 10,
            max_observations: 20,
            blur_sigma: 2.0,
            canny_low: 50.0,
            canny_high: 150.0,
            hough_vote_fraction: 0.25,
            max_lines_per_axis: 8,
            polygon_epsilon: 0.02,
        }
    }
}

/// How big the perspective-corrected output is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputExtent {
    /// The quadrilateral is stretched over the full source pixel extent.
    #[default]
    SourceExtent,
    /// Width and height follow the quadrilateral's longest opposite edges.
    QuadEdges,
}

/// Tuning for the interactive crop session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CropConfig {
    /// Inset of the full-bounds fallback quadrilateral, in source pixels.
    pub fallback_inset: f64,
    /// Loupe magnification for large images.
    pub loupe_scale: f64,
    /// Loupe magnification when the image is close to display resolution.
    pub loupe_close_scale: f64,
    /// Image-to-display width ratio under which `loupe_close_scale` applies.
    pub loupe_close_ratio: f64,
    /// Vertical distance between the touch point and the loupe centre.
    pub loupe_offset: f64,
    pub output_extent: OutputExtent,
}

impl Default for CropConfig {
    fn default() -> Self {
        Self {
            fallback_inset: 1.0,
            loupe_scale: 2.5,
            loupe_close_scale: 6.0,
            loupe_close_ratio: 3.0,
            loupe_offset: 50.0,
            output_extent: OutputExtent::SourceExtent,
        }
    }
}

/// Everything the engine can be tuned with.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub detector: DetectorConfig,
    pub crop: CropConfig,
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&raw)
    }

    /// Reject values the pipeline cannot work with.
    pub fn validate(&self) -> Result<()> {
        let d = &self.detector;
        let in_unit = |v: f64| v.is_finite() && (0.0..=1.0).contains(&v);

        if !in_unit(d.min_feature_size) {
            return Err(invalid("detector.min_feature_size must be in [0, 1]"));
        }
        if !in_unit(d.min_aspect_ratio)
            || !in_unit(d.max_aspect_ratio)
            || d.min_aspect_ratio > d.max_aspect_ratio
        {
            return Err(invalid(
                "detector aspect ratio window must satisfy 0 <= min <= max <= 1",
            ));
        }
        if d.max_feature_count == 0 || d.max_observations == 0 || d.max_lines_per_axis < 2 {
            return Err(invalid("detector candidate limits must be positive"));
        }
        if !(d.blur_sigma.is_finite() && d.blur_sigma > 0.0) {
            return Err(invalid("detector.blur_sigma must be positive"));
        }
        if !(d.canny_low.is_finite() && d.canny_high.is_finite() && d.canny_low <= d.canny_high) {
            return Err(invalid("detector canny thresholds must satisfy low <= high"));
        }
        if !in_unit(d.hough_vote_fraction) || !in_unit(d.polygon_epsilon) {
            return Err(invalid(
                "detector.hough_vote_fraction and polygon_epsilon must be in [0, 1]",
            ));
        }

        let c = &self.crop;
        if !(c.fallback_inset.is_finite() && c.fallback_inset >= 0.0) {
            return Err(invalid("crop.fallback_inset must be non-negative"));
        }
        let positive = |v: f64| v.is_finite() && v > 0.0;
        if !(positive(c.loupe_scale) && positive(c.loupe_close_scale) && positive(c.loupe_close_ratio)) {
            return Err(invalid("crop loupe factors must be finite and positive"));
        }
        if !c.loupe_offset.is_finite() {
            return Err(invalid("crop.loupe_offset must be finite"));
        }
        Ok(())
    }
}

fn invalid(msg: &str) -> CardkeeperError {
    CardkeeperError::InvalidConfig(msg.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        EngineConfig::default().validate().expect("defaults are valid");
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = EngineConfig::from_json_str(
            r#"{ "detector": { "max_observations": 5 }, "crop": { "output_extent": "quad-edges" } }"#,
        )
        .expect("parse");
        assert_eq!(config.detector.max_observations, 5);
        assert_eq!(config.detector.min_feature_size, 0.2);
        assert_eq!(config.crop.output_extent, OutputExtent::QuadEdges);
        assert_eq!(config.crop.fallback_inset, 1.0);
    }

    #[test]
    fn inverted_aspect_window_is_rejected() {
        let err = EngineConfig::from_json_str(
            r#"{ "detector": { "min_aspect_ratio": 0.9, "max_aspect_ratio": 0.5 } }"#,
        )
        .unwrap_err();
        assert!(matches!(err, CardkeeperError::InvalidConfig(_)));
    }

    #[test]
    fn unbounded_loupe_factors_are_rejected() {
        let cases: [fn(&mut CropConfig); 5] = [
            |c: &mut CropConfig| c.loupe_scale = f64::INFINITY,
            |c: &mut CropConfig| c.loupe_close_scale = f64::INFINITY,
            |c: &mut CropConfig| c.loupe_close_ratio = f64::INFINITY,
            |c: &mut CropConfig| c.loupe_scale = f64::NAN,
            |c: &mut CropConfig| c.loupe_close_ratio = 0.0,
        ];
        for set in cases {
            let mut config = EngineConfig::default();
            set(&mut config.crop);
            let err = config.validate().unwrap_err();
            assert!(matches!(err, CardkeeperError::InvalidConfig(_)), "{err:?}");
        }
    }

    #[test]
    fn malformed_json_is_serialization_error() {
        let err = EngineConfig::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, CardkeeperError::Serialization(_)));
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("engine.json");
        std::fs::write(&path, r#"{ "crop": { "loupe_offset": 80.0 } }"#).expect("write");
        let config = EngineConfig::from_json_file(&path).expect("load");
        assert_eq!(config.crop.loupe_offset, 80.0);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = EngineConfig::from_json_file("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, CardkeeperError::Io(_)));
    }
}
