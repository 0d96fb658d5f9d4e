//! Detection overlays.
//!
//! Draws bounding rectangles and warning captions onto frames for the
//! human viewing the stream. Purely cosmetic: no state, no failure
//! modes. A frame with no regions and no active alarm passes through
//! untouched.

use image::{Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;

use crate::detect::DetectionRegion;
use crate::frame::Frame;

/// Label drawn above each detected region.
pub const REGION_LABEL: &str = "FIRE DETECTED";
/// Full-frame caption drawn while the alarm is latched.
pub const ALARM_CAPTION: &str = "!!! WARNING: ALARM !!!";

const OVERLAY_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const BORDER_PX: u32 = 2;

const GLYPH_WIDTH: u32 = 5;
const GLYPH_HEIGHT: u32 = 7;

/// Draw overlays in place: one rectangle and label per region, plus the
/// alarm caption when the latch is active.
pub fn annotate(frame: &mut Frame, regions: &[DetectionRegion], alarm_active: bool) {
    let image = frame.as_image_mut();
    for region in regions {
        draw_region(image, region);
    }
    if alarm_active {
        draw_text(image, ALARM_CAPTION, 10, 34, 2, OVERLAY_COLOR);
    }
}

fn draw_region(image: &mut RgbImage, region: &DetectionRegion) {
    draw_hollow_rect_mut(image, region.rect(), OVERLAY_COLOR);
    for inset in 1..BORDER_PX {
        let width = region.width.saturating_sub(inset * 2);
        let height = region.height.saturating_sub(inset * 2);
        if width == 0 || height == 0 {
            break;
        }
        let rect = Rect::at((region.x + inset) as i32, (region.y + inset) as i32)
            .of_size(width, height);
        draw_hollow_rect_mut(image, rect, OVERLAY_COLOR);
    }

    // Label above the box, or below it when the box touches the top edge.
    let label_y = if region.y > GLYPH_HEIGHT + 3 {
        region.y as i32 - (GLYPH_HEIGHT + 3) as i32
    } else {
        (region.y + region.height) as i32 + 3
    };
    draw_text(image, REGION_LABEL, region.x as i32, label_y, 1, OVERLAY_COLOR);
}

/// Render `text` with the embedded 5x7 glyph set, scaled by `scale`.
/// Characters without a glyph still advance the pen.
pub(crate) fn draw_text(image: &mut RgbImage, text: &str, x: i32, y: i32, scale: u32, color: Rgb<u8>) {
    let scale = scale.max(1);
    let advance = ((GLYPH_WIDTH + 1) * scale) as i32;
    let mut pen_x = x;
    for ch in text.chars() {
        if pen_x >= image.width() as i32 {
            break;
        }
        if let Some(rows) = glyph(ch) {
            blit_glyph(image, &rows, pen_x, y, scale, color);
        }
        pen_x += advance;
    }
}

/// Width in pixels of `text` as rendered by `draw_text`.
pub(crate) fn text_width(text: &str, scale: u32) -> u32 {
    text.chars().count() as u32 * (GLYPH_WIDTH + 1) * scale.max(1)
}

fn blit_glyph(image: &mut RgbImage, rows: &[u8; 7], x: i32, y: i32, scale: u32, color: Rgb<u8>) {
    for (row, bits) in rows.iter().enumerate() {
        for col in 0..GLYPH_WIDTH {
            if (bits >> (GLYPH_WIDTH - 1 - col)) & 1 == 0 {
                continue;
            }
            for dy in 0..scale {
                for dx in 0..scale {
                    let px = x + (col * scale + dx) as i32;
                    let py = y + (row as u32 * scale + dy) as i32;
                    if px >= 0 && py >= 0 && (px as u32) < image.width() && (py as u32) < image.height()
                    {
                        image.put_pixel(px as u32, py as u32, color);
                    }
                }
            }
        }
    }
}

/// 5x7 glyphs for the caption alphabet. Each row uses the low five bits.
fn glyph(ch: char) -> Option<[u8; 7]> {
    let rows = match ch {
        'A' => [0x0E, 0x11, 0x11, 0x1F, 0x11, 0x11, 0x11],
        'C' => [0x0E, 0x11, 0x10, 0x10, 0x10, 0x11, 0x0E],
        'D' => [0x1E, 0x11, 0x11, 0x11, 0x11, 0x11, 0x1E],
        'E' => [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x1F],
        'F' => [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x10],
        'G' => [0x0E, 0x11, 0x10, 0x17, 0x11, 0x11, 0x0F],
        'I' => [0x1F, 0x04, 0x04, 0x04, 0x04, 0x04, 0x1F],
        'L' => [0x10, 0x10, 0x10, 0x10, 0x10, 0x10, 0x1F],
        'M' => [0x11, 0x1B, 0x15, 0x15, 0x11, 0x11, 0x11],
        'N' => [0x11, 0x19, 0x15, 0x13, 0x11, 0x11, 0x11],
        'O' => [0x0E, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E],
        'R' => [0x1E, 0x11, 0x11, 0x1E, 0x14, 0x12, 0x11],
        'T' => [0x1F, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04],
        'U' => [0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E],
        'W' => [0x11, 0x11, 0x11, 0x15, 0x15, 0x15, 0x0A],
        '!' => [0x04, 0x04, 0x04, 0x04, 0x04, 0x00, 0x04],
        ':' => [0x00, 0x04, 0x00, 0x00, 0x00, 0x04, 0x00],
        ' ' => [0x00; 7],
        _ => return None,
    };
    Some(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    fn black_frame() -> Frame {
        Frame::from_rgb(RgbImage::new(crate::frame::FRAME_WIDTH, crate::frame::FRAME_HEIGHT))
    }

    #[test]
    fn no_regions_no_alarm_is_a_no_op() {
        let mut frame = black_frame();
        let original = frame.as_image().clone();
        annotate(&mut frame, &[], false);
        assert_eq!(frame.as_image().as_raw(), original.as_raw());
    }

    #[test]
    fn region_draws_its_border() {
        let mut frame = black_frame();
        let region = DetectionRegion {
            x: 100,
            y: 100,
            width: 50,
            height: 50,
            area: 2500,
        };
        annotate(&mut frame, &[region], false);
        // Top-left corner of the outer border is painted in overlay red.
        assert_eq!(frame.as_image().get_pixel(100, 100), &OVERLAY_COLOR);
        // Interior stays untouched.
        assert_eq!(frame.as_image().get_pixel(125, 125), &Rgb([0, 0, 0]));
    }

    #[test]
    fn alarm_caption_changes_the_frame() {
        let mut frame = black_frame();
        let original = frame.as_image().clone();
        annotate(&mut frame, &[], true);
        assert_ne!(frame.as_image().as_raw(), original.as_raw());
    }

    #[test]
    fn every_caption_character_has_a_glyph() {
        for caption in [REGION_LABEL, ALARM_CAPTION, "CAMERA NOT FOUND"] {
            for ch in caption.chars() {
                assert!(glyph(ch).is_some(), "missing glyph for {:?}", ch);
            }
        }
    }
}
