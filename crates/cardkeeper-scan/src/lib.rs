// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Cardkeeper scan: rectangle detection, display-space conversion,
// perspective correction, and the interactive crop session.

pub mod detect;
pub mod feature;
pub mod image;
pub mod perspective;
pub mod session;

pub use self::detect::{
    ContourObserver, FeatureDetector, RectangleDetector, RectangleObserver, StagedDetector,
    VisionDetector,
};
pub use self::feature::RectangleFeature;
pub use self::image::SourceImage;
pub use self::perspective::{CorrectionInput, correct};
pub use self::session::{CropHandles, CropSession, DragOutcome, DragTarget, Loupe, SessionState};

#[cfg(test)]
pub(crate) mod test_support {
    use ::image::{DynamicImage, GrayImage, Luma};

    /// A bright card (`x0..x1`, `y0..y1`, top-left origin) on a dark
    /// background.
    pub(crate) fn card_image(width: u32, height: u32, x0: u32, y0: u32, x1: u32, y1: u32) -> DynamicImage {
        let mut img = GrayImage::from_pixel(width, height, Luma([30u8]));
        for y in y0..y1 {
            for x in x0..x1 {
                img.put_pixel(x, y, Luma([240u8]));
            }
        }
        DynamicImage::ImageLuma8(img)
    }
}
