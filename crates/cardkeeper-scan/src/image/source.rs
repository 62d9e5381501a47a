// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Source image: a captured pixel buffer plus its orientation tag, with the
// handful of pixel operations the crop flow needs: orientation baking,
// quarter-turn rotation, the drag loupe, and encoding for persistence.

use image::{DynamicImage, ImageFormat};
use tracing::{debug, info, instrument};

use cardkeeper_core::error::{CardkeeperError, Result};
use cardkeeper_core::{Orientation, Point, Rect, Size};

/// A photo as handed over by the camera or photo library.
///
/// `pixels` is the stored buffer; `orientation` says how it must be turned to
/// look upright. [`SourceImage::size`] reports the upright (displayed) size,
/// [`SourceImage::pixel_size`] the stored buffer size.
#[derive(Debug, Clone)]
pub struct SourceImage {
    pixels: DynamicImage,
    orientation: Orientation,
}

impl SourceImage {
    // -- Construction ---------------------------------------------------------

    pub fn new(pixels: DynamicImage, orientation: Orientation) -> Self {
        Self {
            pixels,
            orientation,
        }
    }

    /// An upright image.
    pub fn upright(pixels: DynamicImage) -> Self {
        Self::new(pixels, Orientation::Up)
    }

    /// Decode raw encoded bytes (JPEG, PNG, etc.).
    #[instrument(skip(data), fields(data_len = data.len()))]
    pub fn from_bytes(data: &[u8], orientation: Orientation) -> Result<Self> {
        let pixels = image::load_from_memory(data).map_err(|err| {
            CardkeeperError::ImageError(format!("failed to decode image: {}", err))
        })?;
        debug!(
            width = pixels.width(),
            height = pixels.height(),
            %orientation,
            "Image decoded from bytes"
        );
        Ok(Self::new(pixels, orientation))
    }

    /// Load an image from a file path.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<std::path::Path>, orientation: Orientation) -> Result<Self> {
        let pixels = image::open(path.as_ref()).map_err(|err| {
            CardkeeperError::ImageError(format!(
                "failed to open {}: {}",
                path.as_ref().display(),
                err
            ))
        })?;
        info!(
            width = pixels.width(),
            height = pixels.height(),
            %orientation,
            "Image loaded"
        );
        Ok(Self::new(pixels, orientation))
    }

    // -- Accessors ------------------------------------------------------------

    pub fn pixels(&self) -> &DynamicImage {
        &self.pixels
    }

    pub fn into_pixels(self) -> DynamicImage {
        self.pixels
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    /// Size of the stored buffer.
    pub fn pixel_size(&self) -> Size {
        Size::from_pixels(self.pixels.width(), self.pixels.height())
    }

    /// Size as displayed, i.e. after the orientation tag is applied.
    pub fn size(&self) -> Size {
        let raw = self.pixel_size();
        if self.orientation.swaps_axes() {
            raw.swapped()
        } else {
            raw
        }
    }

    // -- Orientation ----------------------------------------------------------

    /// Bake the orientation tag into the pixels and return an `Up` image.
    #[instrument(skip(self), fields(orientation = %self.orientation))]
    pub fn to_upright(&self) -> SourceImage {
        let p = &self.pixels;
        let pixels = match self.orientation {
            Orientation::Up => return self.clone(),
            Orientation::UpMirrored => p.fliph(),
            Orientation::Down => p.rotate180(),
            Orientation::DownMirrored => p.flipv(),
            Orientation::Left => p.rotate270(),
            Orientation::LeftMirrored => p.rotate90().fliph(),
            Orientation::Right => p.rotate90(),
            Orientation::RightMirrored => p.rotate270().fliph(),
        };
        debug!(
            width = pixels.width(),
            height = pixels.height(),
            "Orientation baked into pixels"
        );
        SourceImage::upright(pixels)
    }

    /// Turn the upright image a quarter turn clockwise.
    #[instrument(skip(self))]
    pub fn rotated_clockwise(&self) -> SourceImage {
        let upright = self.to_upright();
        SourceImage::upright(upright.pixels.rotate90())
    }

    // -- Loupe ----------------------------------------------------------------

    /// Magnified view around `point`, where `point` is expressed in a display
    /// rect of size `display_size` showing this image.
    ///
    /// The crop is `display_size / scale_factor` source pixels, centred on the
    /// touch point and clipped to the image. Returns `None` when nothing of the
    /// image remains after clipping.
    pub fn loupe(&self, point: Point, scale_factor: f64, display_size: Size) -> Option<DynamicImage> {
        if display_size.is_empty() || !(scale_factor > 0.0) {
            return None;
        }
        let upright;
        let pixels = if self.orientation == Orientation::Up {
            &self.pixels
        } else {
            upright = self.to_upright();
            &upright.pixels
        };

        let size = Size::from_pixels(pixels.width(), pixels.height());
        let scaled_point = Point::new(
            point.x * (size.width / display_size.width),
            point.y * (size.height / display_size.height),
        );
        let crop_size = Size::new(
            display_size.width / scale_factor,
            display_size.height / scale_factor,
        );
        let wanted = Rect::new(
            scaled_point.x - crop_size.width / 2.0,
            scaled_point.y - crop_size.height / 2.0,
            crop_size.width,
            crop_size.height,
        );

        let x0 = wanted.min_x().max(0.0).floor();
        let y0 = wanted.min_y().max(0.0).floor();
        let x1 = wanted.max_x().min(size.width).ceil();
        let y1 = wanted.max_y().min(size.height).ceil();
        if !(x1 > x0 && y1 > y0) {
            return None;
        }
        Some(pixels.crop_imm(x0 as u32, y0 as u32, (x1 - x0) as u32, (y1 - y0) as u32))
    }

    // -- Output ---------------------------------------------------------------

    /// Encode the stored buffer as PNG bytes.
    pub fn to_png_bytes(&self) -> Result<Vec<u8>> {
        encode_to_format(&self.pixels, ImageFormat::Png)
    }

    /// Encode the stored buffer as JPEG bytes with the given quality (1-100).
    pub fn to_jpeg_bytes(&self, quality: u8) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        let rgb = self.pixels.to_rgb8();
        let encoder =
            image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100));
        rgb.write_with_encoder(encoder).map_err(|err| {
            CardkeeperError::ImageError(format!("JPEG encoding failed: {}", err))
        })?;
        Ok(buffer)
    }

    /// Write the upright image to a file. The format is inferred from the
    /// file extension.
    pub fn save(&self, path: impl AsRef<std::path::Path>) -> Result<()> {
        self.to_upright().pixels.save(path.as_ref()).map_err(|err| {
            CardkeeperError::ImageError(format!(
                "failed to save image to {}: {}",
                path.as_ref().display(),
                err
            ))
        })
    }
}

/// Encode a `DynamicImage` into the specified format, returning the raw bytes.
fn encode_to_format(image: &DynamicImage, format: ImageFormat) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let mut cursor = std::io::Cursor::new(&mut buffer);
    image.write_to(&mut cursor, format).map_err(|err| {
        CardkeeperError::ImageError(format!("image encoding failed: {}", err))
    })?;
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    /// 3x2 buffer with a red marker in the stored top-left pixel.
    fn marked(orientation: Orientation) -> SourceImage {
        let mut img = RgbaImage::from_pixel(3, 2, Rgba([0, 0, 0, 255]));
        img.put_pixel(0, 0, Rgba([255, 0, 0, 255]));
        SourceImage::new(DynamicImage::ImageRgba8(img), orientation)
    }

    fn red_at(img: &SourceImage) -> (u32, u32) {
        let rgba = img.pixels().to_rgba8();
        let (x, y, _) = rgba
            .enumerate_pixels()
            .find(|(_, _, p)| p.0[0] == 255)
            .expect("marker present");
        (x, y)
    }

    #[test]
    fn size_swaps_for_quarter_turns() {
        assert_eq!(marked(Orientation::Up).size(), Size::new(3.0, 2.0));
        assert_eq!(marked(Orientation::Right).size(), Size::new(2.0, 3.0));
        assert_eq!(marked(Orientation::Right).pixel_size(), Size::new(3.0, 2.0));
        assert_eq!(marked(Orientation::DownMirrored).size(), Size::new(3.0, 2.0));
    }

    #[test]
    fn upright_matches_size_for_every_orientation() {
        for o in Orientation::ALL {
            let img = marked(o);
            let upright = img.to_upright();
            assert_eq!(upright.orientation(), Orientation::Up);
            assert_eq!(upright.pixel_size(), img.size(), "{o}");
        }
    }

    #[test]
    fn upright_moves_marker() {
        // Stored top-left ends up: right -> top-right, left -> bottom-left,
        // down -> bottom-right, up-mirrored -> top-right.
        assert_eq!(red_at(&marked(Orientation::Right).to_upright()), (1, 0));
        assert_eq!(red_at(&marked(Orientation::Left).to_upright()), (0, 2));
        assert_eq!(red_at(&marked(Orientation::Down).to_upright()), (2, 1));
        assert_eq!(red_at(&marked(Orientation::UpMirrored).to_upright()), (2, 0));
        assert_eq!(red_at(&marked(Orientation::LeftMirrored).to_upright()), (0, 0));
    }

    #[test]
    fn rotated_clockwise_is_up_and_turned() {
        let turned = marked(Orientation::Up).rotated_clockwise();
        assert_eq!(turned.orientation(), Orientation::Up);
        assert_eq!(turned.pixel_size(), Size::new(2.0, 3.0));
        assert_eq!(red_at(&turned), (1, 0));
    }

    #[test]
    fn loupe_crops_around_point() {
        let img = SourceImage::upright(DynamicImage::ImageRgba8(RgbaImage::new(400, 200)));
        // Display rect is half size, so (100, 50) maps to source (200, 100);
        // 2x magnification takes 100x50 source pixels around it.
        let loupe = img
            .loupe(Point::new(100.0, 50.0), 2.0, Size::new(200.0, 100.0))
            .expect("inside");
        assert_eq!((loupe.width(), loupe.height()), (100, 50));
    }

    #[test]
    fn loupe_clips_at_edges_and_rejects_outside() {
        let img = SourceImage::upright(DynamicImage::ImageRgba8(RgbaImage::new(100, 100)));
        let clipped = img
            .loupe(Point::new(0.0, 0.0), 2.0, Size::new(100.0, 100.0))
            .expect("corner still overlaps");
        assert_eq!((clipped.width(), clipped.height()), (25, 25));
        assert!(img.loupe(Point::new(500.0, 500.0), 2.0, Size::new(100.0, 100.0)).is_none());
        assert!(img.loupe(Point::new(5.0, 5.0), 2.0, Size::ZERO).is_none());
    }

    #[test]
    fn png_round_trip_keeps_dimensions() {
        let img = marked(Orientation::Up);
        let bytes = img.to_png_bytes().expect("encode");
        let decoded = SourceImage::from_bytes(&bytes, Orientation::Up).expect("decode");
        assert_eq!(decoded.pixel_size(), img.pixel_size());
    }

    #[test]
    fn garbage_bytes_are_image_error() {
        let err = SourceImage::from_bytes(b"not an image", Orientation::Up).unwrap_err();
        assert!(matches!(err, CardkeeperError::ImageError(_)));
    }
}
