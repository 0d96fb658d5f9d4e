//! Fire-color segmentation.
//!
//! The detector runs a fixed per-frame pipeline:
//!
//! 1. Resize to the canonical resolution.
//! 2. Gaussian blur to suppress pixel-level noise.
//! 3. Convert to HSV and keep pixels inside the flame-color window
//!    (orange/yellow hues, saturation and value above a floor).
//! 4. Label connected mask regions and keep those whose pixel count
//!    clears the area threshold; each survivor becomes one
//!    `DetectionRegion` with its tight bounding rectangle.

use std::collections::HashMap;

use image::{imageops, GrayImage, Luma, RgbImage};
use imageproc::filter::gaussian_blur_f32;
use imageproc::region_labelling::{connected_components, Connectivity};

use crate::detect::regions::{DetectionRegion, MIN_REGION_AREA};
use crate::frame::{Frame, FRAME_HEIGHT, FRAME_WIDTH};

/// Thresholds for the flame-color window. All HSV channels are on a
/// 0-255 scale; hue wraps 360 degrees into 256 steps.
#[derive(Clone, Debug)]
pub struct FireDetectorConfig {
    pub canonical_width: u32,
    pub canonical_height: u32,
    /// Blur strength. 3.5 matches a 21x21 smoothing kernel.
    pub blur_sigma: f32,
    pub hue_min: u8,
    pub hue_max: u8,
    pub saturation_floor: u8,
    pub value_floor: u8,
    pub min_region_area: u32,
}

impl Default for FireDetectorConfig {
    fn default() -> Self {
        Self {
            canonical_width: FRAME_WIDTH,
            canonical_height: FRAME_HEIGHT,
            blur_sigma: 3.5,
            hue_min: 18,
            hue_max: 35,
            saturation_floor: 50,
            value_floor: 50,
            min_region_area: MIN_REGION_AREA,
        }
    }
}

/// Stateless per-frame fire-color detector.
#[derive(Clone, Debug, Default)]
pub struct FireDetector {
    config: FireDetectorConfig,
}

impl FireDetector {
    pub fn new(config: FireDetectorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FireDetectorConfig {
        &self.config
    }

    /// Find fire-colored regions. Coordinates are in the canonical
    /// resolution; callers that annotate should resize the frame to the
    /// same resolution first.
    pub fn detect(&self, frame: &Frame) -> Vec<DetectionRegion> {
        let image = frame.as_image();
        let resized;
        let image = if image.width() != self.config.canonical_width
            || image.height() != self.config.canonical_height
        {
            resized = imageops::resize(
                image,
                self.config.canonical_width,
                self.config.canonical_height,
                imageops::FilterType::Triangle,
            );
            &resized
        } else {
            image
        };

        let blurred = gaussian_blur_f32(image, self.config.blur_sigma);
        let mask = self.fire_mask(&blurred);
        regions_from_mask(&mask, self.config.min_region_area)
    }

    fn fire_mask(&self, image: &RgbImage) -> GrayImage {
        let mut mask = GrayImage::new(image.width(), image.height());
        for (x, y, pixel) in image.enumerate_pixels() {
            let [r, g, b] = pixel.0;
            let (h, s, v) = rgb_to_hsv(r, g, b);
            let hit = (self.config.hue_min..=self.config.hue_max).contains(&h)
                && s >= self.config.saturation_floor
                && v >= self.config.value_floor;
            if hit {
                mask.put_pixel(x, y, Luma([255u8]));
            }
        }
        mask
    }
}

/// RGB to HSV with all three channels on a 0-255 scale.
pub(crate) fn rgb_to_hsv(r: u8, g: u8, b: u8) -> (u8, u8, u8) {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let value = max;
    if max == 0 {
        return (0, 0, 0);
    }
    let delta = (max - min) as f32;
    let saturation = (delta * 255.0 / max as f32).round() as u8;
    if min == max {
        return (0, saturation, value);
    }

    let (rf, gf, bf) = (r as f32, g as f32, b as f32);
    let mut hue_deg = if max == r {
        60.0 * ((gf - bf) / delta)
    } else if max == g {
        60.0 * ((bf - rf) / delta) + 120.0
    } else {
        60.0 * ((rf - gf) / delta) + 240.0
    };
    if hue_deg < 0.0 {
        hue_deg += 360.0;
    }
    let hue = (hue_deg * 256.0 / 360.0).round().min(255.0) as u8;
    (hue, saturation, value)
}

struct Extent {
    min_x: u32,
    max_x: u32,
    min_y: u32,
    max_y: u32,
    area: u32,
}

fn regions_from_mask(mask: &GrayImage, min_area: u32) -> Vec<DetectionRegion> {
    let labels = connected_components(mask, Connectivity::Eight, Luma([0u8]));
    let mut extents: HashMap<u32, Extent> = HashMap::new();
    for (x, y, label) in labels.enumerate_pixels() {
        let id = label.0[0];
        if id == 0 {
            continue;
        }
        let extent = extents.entry(id).or_insert(Extent {
            min_x: x,
            max_x: x,
            min_y: y,
            max_y: y,
            area: 0,
        });
        extent.min_x = extent.min_x.min(x);
        extent.max_x = extent.max_x.max(x);
        extent.min_y = extent.min_y.min(y);
        extent.max_y = extent.max_y.max(y);
        extent.area += 1;
    }

    let mut regions: Vec<DetectionRegion> = extents
        .into_values()
        .filter(|extent| extent.area > min_area)
        .map(|extent| DetectionRegion {
            x: extent.min_x,
            y: extent.min_y,
            width: extent.max_x - extent.min_x + 1,
            height: extent.max_y - extent.min_y + 1,
            area: extent.area,
        })
        .collect();
    regions.sort_by_key(|region| (region.y, region.x));
    regions
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    const ORANGE: Rgb<u8> = Rgb([255, 128, 0]);

    fn frame_with_block(
        width: u32,
        height: u32,
        block: Option<(u32, u32, u32, u32)>,
        color: Rgb<u8>,
    ) -> Frame {
        let image = RgbImage::from_fn(width, height, |x, y| match block {
            Some((bx, by, bw, bh))
                if (bx..bx + bw).contains(&x) && (by..by + bh).contains(&y) =>
            {
                color
            }
            _ => Rgb([0, 0, 0]),
        });
        Frame::from_rgb(image)
    }

    #[test]
    fn hsv_of_black_white_and_primaries() {
        assert_eq!(rgb_to_hsv(0, 0, 0), (0, 0, 0));
        assert_eq!(rgb_to_hsv(255, 255, 255), (0, 0, 255));
        assert_eq!(rgb_to_hsv(255, 0, 0), (0, 255, 255));
        let (h, s, v) = rgb_to_hsv(0, 0, 255);
        assert_eq!((s, v), (255, 255));
        assert_eq!(h, 171); // 240 degrees
    }

    #[test]
    fn orange_falls_in_the_flame_window() {
        let config = FireDetectorConfig::default();
        let (h, s, v) = rgb_to_hsv(ORANGE.0[0], ORANGE.0[1], ORANGE.0[2]);
        assert!((config.hue_min..=config.hue_max).contains(&h), "hue {h}");
        assert!(s >= config.saturation_floor);
        assert!(v >= config.value_floor);
    }

    #[test]
    fn all_black_frame_yields_no_regions() {
        let detector = FireDetector::default();
        let frame = frame_with_block(640, 480, None, ORANGE);
        assert!(detector.detect(&frame).is_empty());
    }

    #[test]
    fn orange_square_yields_one_tight_region() {
        let detector = FireDetector::default();
        let frame = frame_with_block(640, 480, Some((100, 100, 50, 50)), ORANGE);
        let regions = detector.detect(&frame);
        assert_eq!(regions.len(), 1);

        // Blur bleeds the block outward by a few pixels at most.
        let region = regions[0];
        assert!(region.x.abs_diff(100) <= 8, "x={}", region.x);
        assert!(region.y.abs_diff(100) <= 8, "y={}", region.y);
        assert!(region.width.abs_diff(50) <= 16, "width={}", region.width);
        assert!(region.height.abs_diff(50) <= 16, "height={}", region.height);
        assert!(region.significant());
    }

    #[test]
    fn sub_threshold_speck_is_ignored() {
        let detector = FireDetector::default();
        let frame = frame_with_block(640, 480, Some((100, 100, 10, 10)), ORANGE);
        assert!(detector.detect(&frame).is_empty());
    }

    #[test]
    fn oversized_input_is_judged_at_canonical_scale() {
        let detector = FireDetector::default();
        // 2x input; the block lands at half coordinates after resize.
        let frame = frame_with_block(1280, 960, Some((200, 200, 100, 100)), ORANGE);
        let regions = detector.detect(&frame);
        assert_eq!(regions.len(), 1);
        let region = regions[0];
        assert!(region.x.abs_diff(100) <= 8, "x={}", region.x);
        assert!(region.y.abs_diff(100) <= 8, "y={}", region.y);
    }

    #[test]
    fn gray_frame_yields_no_regions() {
        // Saturation floor rejects achromatic pixels no matter how bright.
        let detector = FireDetector::default();
        let frame = Frame::from_rgb(RgbImage::from_pixel(640, 480, Rgb([200, 200, 200])));
        assert!(detector.detect(&frame).is_empty());
    }
}
