// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Perspective correction: warp the interior of a quadrilateral onto an
// axis-aligned output rectangle.

use image::{DynamicImage, ImageBuffer, Luma, LumaA, Rgb, Rgba};
use imageproc::geometric_transformations::{Interpolation, Projection, warp_into};
use tracing::{debug, info, instrument, warn};

use cardkeeper_core::error::{CardkeeperError, Result};
use cardkeeper_core::{Orientation, OutputExtent, Point, Quadrilateral};

use crate::image::SourceImage;

/// The four corners handed to the correction, in the stored buffer's
/// bottom-left-origin pixel space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CorrectionInput {
    pub top_left: Point,
    pub top_right: Point,
    pub bottom_right: Point,
    pub bottom_left: Point,
}

impl CorrectionInput {
    /// Build the correction input from a quadrilateral in oriented image
    /// pixels (top-left origin).
    ///
    /// For an `Up` image each corner is flipped into bottom-left-origin space
    /// using `raw_height`. For any other orientation the corners are
    /// transposed and relabelled: the input top-left comes from the
    /// top-right, top-right from bottom-right, bottom-right from bottom-left,
    /// bottom-left from top-left.
    pub fn from_image_quad(quad: &Quadrilateral, orientation: Orientation, raw_height: f64) -> Self {
        if orientation == Orientation::Up {
            Self {
                top_left: quad.top_left.cartesian(raw_height),
                top_right: quad.top_right.cartesian(raw_height),
                bottom_right: quad.bottom_right.cartesian(raw_height),
                bottom_left: quad.bottom_left.cartesian(raw_height),
            }
        } else {
            Self {
                top_left: quad.top_right.transposed(),
                top_right: quad.bottom_right.transposed(),
                bottom_right: quad.bottom_left.transposed(),
                bottom_left: quad.top_left.transposed(),
            }
        }
    }

    pub fn quad(&self) -> Quadrilateral {
        Quadrilateral::new(
            self.top_left,
            self.top_right,
            self.bottom_right,
            self.bottom_left,
        )
    }
}

/// Warp the quadrilateral described by `input` onto a rectangle.
///
/// The output keeps the pixel format and the orientation tag of `image`.
/// Fails with [`CardkeeperError::CropFailed`] when the corners do not define
/// a usable projection or the output would be empty.
#[instrument(skip(image), fields(width = image.pixels().width(), height = image.pixels().height()))]
pub fn correct(image: &SourceImage, input: CorrectionInput, extent: OutputExtent) -> Result<SourceImage> {
    let pixels = image.pixels();
    let (width, height) = (pixels.width(), pixels.height());
    if width == 0 || height == 0 {
        return Err(CardkeeperError::CropFailed("source image is empty".into()));
    }

    // Buffer coordinates are top-left origin.
    let buffer = input.quad().to_cartesian(height as f64);
    if !buffer.is_finite() {
        return Err(CardkeeperError::CropFailed("corner coordinates are not finite".into()));
    }
    if buffer.area().abs() < 1.0 {
        return Err(CardkeeperError::CropFailed("corners enclose no area".into()));
    }

    let (out_w, out_h) = match extent {
        OutputExtent::SourceExtent => (width, height),
        OutputExtent::QuadEdges => {
            let w = buffer
                .top_left
                .distance_to(buffer.top_right)
                .max(buffer.bottom_left.distance_to(buffer.bottom_right));
            let h = buffer
                .top_left
                .distance_to(buffer.bottom_left)
                .max(buffer.top_right.distance_to(buffer.bottom_right));
            (w.round() as u32, h.round() as u32)
        }
    };
    if out_w == 0 || out_h == 0 {
        return Err(CardkeeperError::CropFailed(format!(
            "output would be {}x{}",
            out_w, out_h
        )));
    }

    let src = buffer.corners().map(|p| (p.x as f32, p.y as f32));
    let dst = [
        (0.0, 0.0),
        (out_w as f32, 0.0),
        (out_w as f32, out_h as f32),
        (0.0, out_h as f32),
    ];
    let Some(projection) = Projection::from_control_points(src, dst) else {
        warn!(quad = %buffer, "Corners do not define a projective transform");
        return Err(CardkeeperError::CropFailed(
            "corners do not define a projective transform".into(),
        ));
    };
    debug!(out_w, out_h, ?extent, "Projection computed");

    macro_rules! warp {
        ($buf:expr, $variant:path, $default:expr) => {{
            let mut out = ImageBuffer::new(out_w, out_h);
            warp_into($buf, &projection, Interpolation::Bilinear, $default, &mut out);
            $variant(out)
        }};
    }

    let warped = match pixels {
        DynamicImage::ImageLuma8(buf) => warp!(buf, DynamicImage::ImageLuma8, Luma([255u8])),
        DynamicImage::ImageLumaA8(buf) => warp!(buf, DynamicImage::ImageLumaA8, LumaA([255u8, 255])),
        DynamicImage::ImageRgb8(buf) => warp!(buf, DynamicImage::ImageRgb8, Rgb([255u8, 255, 255])),
        DynamicImage::ImageRgba8(buf) => {
            warp!(buf, DynamicImage::ImageRgba8, Rgba([255u8, 255, 255, 255]))
        }
        DynamicImage::ImageLuma16(buf) => warp!(buf, DynamicImage::ImageLuma16, Luma([u16::MAX])),
        DynamicImage::ImageRgb16(buf) => {
            warp!(buf, DynamicImage::ImageRgb16, Rgb([u16::MAX, u16::MAX, u16::MAX]))
        }
        DynamicImage::ImageRgba16(buf) => warp!(
            buf,
            DynamicImage::ImageRgba16,
            Rgba([u16::MAX, u16::MAX, u16::MAX, u16::MAX])
        ),
        other => {
            let rgba = other.to_rgba8();
            warp!(&rgba, DynamicImage::ImageRgba8, Rgba([255u8, 255, 255, 255]))
        }
    };

    info!(out_w, out_h, "Perspective correction applied");
    Ok(SourceImage::new(warped, image.orientation()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::card_image;
    use cardkeeper_core::{Rect, Size};
    use image::GrayImage;

    fn upright(img: DynamicImage) -> SourceImage {
        SourceImage::upright(img)
    }

    #[test]
    fn up_input_is_flipped_into_buffer_space() {
        let quad = Quadrilateral::from_rect(&Rect::new(10.0, 20.0, 30.0, 40.0));
        let input = CorrectionInput::from_image_quad(&quad, Orientation::Up, 100.0);
        assert_eq!(input.top_left, Point::new(10.0, 80.0));
        assert_eq!(input.top_right, Point::new(40.0, 80.0));
        assert_eq!(input.bottom_right, Point::new(40.0, 20.0));
        assert_eq!(input.bottom_left, Point::new(10.0, 20.0));
    }

    #[test]
    fn other_orientations_transpose_and_relabel() {
        let quad = Quadrilateral::new(
            Point::new(1.0, 2.0),
            Point::new(3.0, 4.0),
            Point::new(5.0, 6.0),
            Point::new(7.0, 8.0),
        );
        for orientation in [Orientation::Right, Orientation::Left, Orientation::Down] {
            let input = CorrectionInput::from_image_quad(&quad, orientation, 100.0);
            assert_eq!(input.top_left, Point::new(4.0, 3.0));
            assert_eq!(input.top_right, Point::new(6.0, 5.0));
            assert_eq!(input.bottom_right, Point::new(8.0, 7.0));
            assert_eq!(input.bottom_left, Point::new(2.0, 1.0));
        }
    }

    #[test]
    fn crops_card_to_source_extent() {
        let image = upright(card_image(200, 160, 40, 30, 160, 130));
        let quad = Quadrilateral::from_rect(&Rect::new(40.0, 30.0, 120.0, 100.0));
        let input = CorrectionInput::from_image_quad(&quad, Orientation::Up, 160.0);

        let out = correct(&image, input, OutputExtent::SourceExtent).expect("crop");
        assert_eq!(out.pixel_size(), Size::new(200.0, 160.0));
        assert_eq!(out.orientation(), Orientation::Up);
        let gray = out.pixels().to_luma8();
        for (x, y) in [(100, 80), (10, 10), (190, 150), (5, 150)] {
            assert!(gray.get_pixel(x, y).0[0] > 200, "({x}, {y}) is dark");
        }
        assert!(matches!(out.pixels(), DynamicImage::ImageLuma8(_)));
    }

    #[test]
    fn quad_edges_sizes_output_from_corners() {
        let image = upright(card_image(200, 160, 40, 30, 160, 130));
        let quad = Quadrilateral::from_rect(&Rect::new(40.0, 30.0, 120.0, 100.0));
        let input = CorrectionInput::from_image_quad(&quad, Orientation::Up, 160.0);
        let out = correct(&image, input, OutputExtent::QuadEdges).expect("crop");
        assert_eq!(out.pixel_size(), Size::new(120.0, 100.0));
    }

    #[test]
    fn keeps_orientation_tag() {
        let image = SourceImage::new(DynamicImage::new_rgb8(80, 60), Orientation::Right);
        let quad = Quadrilateral::from_rect(&Rect::new(5.0, 5.0, 50.0, 70.0));
        let input = CorrectionInput::from_image_quad(&quad, Orientation::Right, 60.0);
        let out = correct(&image, input, OutputExtent::SourceExtent).expect("crop");
        assert_eq!(out.orientation(), Orientation::Right);
        assert_eq!(out.pixel_size(), Size::new(80.0, 60.0));
    }

    #[test]
    fn collapsed_quad_fails() {
        let image = upright(DynamicImage::ImageLuma8(GrayImage::new(50, 50)));
        let p = Point::new(10.0, 10.0);
        let input = CorrectionInput::from_image_quad(&Quadrilateral::new(p, p, p, p), Orientation::Up, 50.0);
        let err = correct(&image, input, OutputExtent::SourceExtent).unwrap_err();
        assert!(matches!(err, CardkeeperError::CropFailed(_)));
        let err = correct(&image, input, OutputExtent::QuadEdges).unwrap_err();
        assert!(matches!(err, CardkeeperError::CropFailed(_)));
    }

    #[test]
    fn non_finite_corners_fail() {
        let image = upright(DynamicImage::ImageLuma8(GrayImage::new(50, 50)));
        let mut quad = Quadrilateral::from_rect(&Rect::new(0.0, 0.0, 20.0, 20.0));
        quad.top_left.x = f64::NAN;
        let input = CorrectionInput::from_image_quad(&quad, Orientation::Up, 50.0);
        assert!(correct(&image, input, OutputExtent::SourceExtent).is_err());
    }

    #[test]
    fn empty_source_fails() {
        let image = upright(DynamicImage::new_rgb8(0, 0));
        let input = CorrectionInput::from_image_quad(&Quadrilateral::default(), Orientation::Up, 0.0);
        assert!(matches!(
            correct(&image, input, OutputExtent::SourceExtent),
            Err(CardkeeperError::CropFailed(_))
        ));
    }
}
