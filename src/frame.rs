//! Frame type and encoding.
//!
//! A `Frame` is one captured RGB raster. Frames live for exactly one
//! iteration of a streaming loop: captured, detected on, annotated,
//! encoded, dropped. Nothing retains them across iterations.

use anyhow::{Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::{imageops, Rgb, RgbImage};

use crate::annotate;

/// Canonical frame width in pixels.
pub const FRAME_WIDTH: u32 = 640;
/// Canonical frame height in pixels.
pub const FRAME_HEIGHT: u32 = 480;

const PLACEHOLDER_BG: Rgb<u8> = Rgb([24, 26, 30]);
const PLACEHOLDER_FG: Rgb<u8> = Rgb([200, 200, 200]);
const PLACEHOLDER_CAPTION: &str = "CAMERA NOT FOUND";

/// One RGB frame, 8 bits per channel.
pub struct Frame {
    image: RgbImage,
}

impl Frame {
    pub fn from_rgb(image: RgbImage) -> Self {
        Self { image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn as_image(&self) -> &RgbImage {
        &self.image
    }

    pub fn as_image_mut(&mut self) -> &mut RgbImage {
        &mut self.image
    }

    pub fn into_image(self) -> RgbImage {
        self.image
    }

    /// Resize in place to the given resolution. No-op when already there.
    pub fn ensure_size(&mut self, width: u32, height: u32) {
        if self.image.width() != width || self.image.height() != height {
            self.image =
                imageops::resize(&self.image, width, height, imageops::FilterType::Triangle);
        }
    }

    /// The "camera not found" card shown while no capture device is available.
    pub fn placeholder(width: u32, height: u32) -> Self {
        let mut image = RgbImage::from_pixel(width, height, PLACEHOLDER_BG);
        let scale = 2;
        let text_width = annotate::text_width(PLACEHOLDER_CAPTION, scale);
        let x = (width.saturating_sub(text_width) / 2) as i32;
        let y = (height / 2) as i32 - 8;
        annotate::draw_text(&mut image, PLACEHOLDER_CAPTION, x, y, scale, PLACEHOLDER_FG);
        Self { image }
    }

    /// Encode as JPEG. Quality is clamped to 1..=100.
    pub fn encode_jpeg(&self, quality: u8) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100))
            .encode_image(&self.image)
            .context("encode frame as jpeg")?;
        Ok(buffer)
    }
}

impl From<RgbImage> for Frame {
    fn from(image: RgbImage) -> Self {
        Self { image }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_has_requested_dimensions() {
        let frame = Frame::placeholder(FRAME_WIDTH, FRAME_HEIGHT);
        assert_eq!(frame.width(), FRAME_WIDTH);
        assert_eq!(frame.height(), FRAME_HEIGHT);
    }

    #[test]
    fn placeholder_carries_a_caption() {
        // The card is not a flat fill: the caption pixels differ from the background.
        let frame = Frame::placeholder(FRAME_WIDTH, FRAME_HEIGHT);
        let distinct = frame
            .as_image()
            .pixels()
            .filter(|p| p.0 != PLACEHOLDER_BG.0)
            .count();
        assert!(distinct > 0);
    }

    #[test]
    fn encode_jpeg_emits_soi_marker() -> Result<()> {
        let frame = Frame::from_rgb(RgbImage::new(64, 48));
        let jpeg = frame.encode_jpeg(80)?;
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
        Ok(())
    }

    #[test]
    fn ensure_size_resizes_only_when_needed() {
        let mut frame = Frame::from_rgb(RgbImage::new(320, 240));
        frame.ensure_size(FRAME_WIDTH, FRAME_HEIGHT);
        assert_eq!((frame.width(), frame.height()), (FRAME_WIDTH, FRAME_HEIGHT));

        let before = frame.as_image().as_raw().as_ptr();
        frame.ensure_size(FRAME_WIDTH, FRAME_HEIGHT);
        assert_eq!(before, frame.as_image().as_raw().as_ptr());
    }
}
