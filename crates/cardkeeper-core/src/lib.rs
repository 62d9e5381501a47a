// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Cardkeeper core: geometry primitives, quadrilaterals, errors and configuration
// shared by the scanning engine and its drivers.

pub mod config;
pub mod error;
pub mod geometry;
pub mod quad;
pub mod types;

pub use config::{CropConfig, DetectorConfig, EngineConfig, OutputExtent};
pub use error::CardkeeperError;
pub use geometry::{AffineTransform, Line, Transformable, intersect};
pub use quad::Quadrilateral;
pub use types::*;
