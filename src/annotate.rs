// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Skeleton overlays for saved predictions.

use std::path::Path;

use image::{DynamicImage, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_hollow_rect_mut, draw_line_segment_mut};
use imageproc::rect::Rect;

use crate::keypoint::{Joint, LIMBS, Skeleton};
use crate::posture::PostureVerdict;

/// Limb color for a good posture.
pub const GOOD_COLOR: Rgb<u8> = Rgb([0, 255, 0]);

/// Limb color for a flagged posture.
pub const BAD_COLOR: Rgb<u8> = Rgb([255, 0, 0]);

/// Pose palette used for joint markers.
pub const POSE_COLORS: [[u8; 3]; 3] = [
    [255, 128, 0],  // #ff8000 legs
    [51, 153, 255], // #3399ff arms and torso
    [0, 255, 0],    // #00ff00 face
];

/// Palette index per joint, in channel order.
const KPT_COLOR_INDICES: [usize; Joint::COUNT] = [2, 2, 2, 2, 2, 1, 1, 1, 1, 1, 1, 0, 0, 0, 0, 0, 0];

/// Color of a joint marker.
#[must_use]
pub const fn joint_color(joint: Joint) -> Rgb<u8> {
    Rgb(POSE_COLORS[KPT_COLOR_INDICES[joint.index()]])
}

/// Limb color for a verdict.
#[must_use]
pub const fn verdict_color(verdict: &PostureVerdict) -> Rgb<u8> {
    if verdict.is_good() { GOOD_COLOR } else { BAD_COLOR }
}

/// Draw a skeleton over an image.
///
/// `skeleton` must be in the image's own pixel space. Limbs take the verdict
/// color and the frame gets a border of the same color.
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
pub fn annotate_image(image: &DynamicImage, skeleton: &Skeleton, verdict: &PostureVerdict) -> DynamicImage {
    let mut img: RgbImage = image.to_rgb8();
    let (width, height) = img.dimensions();
    let color = verdict_color(verdict);

    let shortest = width.min(height).max(1);
    let line_width = (shortest / 320).clamp(1, 4) as i32;
    let radius = (shortest / 160).clamp(2, 8) as i32;

    for (a, b) in LIMBS {
        let (Some(p), Some(q)) = (skeleton.get(a), skeleton.get(b)) else {
            continue;
        };
        for offset in -(line_width / 2)..=(line_width / 2) {
            let o = offset as f32;
            draw_line_segment_mut(
                &mut img,
                (p.x() + o, p.y()),
                (q.x() + o, q.y()),
                color,
            );
            draw_line_segment_mut(
                &mut img,
                (p.x(), p.y() + o),
                (q.x(), q.y() + o),
                color,
            );
        }
    }

    for (joint, keypoint) in skeleton.iter() {
        if let Some(kp) = keypoint {
            draw_filled_circle_mut(&mut img, (kp.col, kp.row), radius, joint_color(joint));
        }
    }

    if width > 2 && height > 2 {
        for t in 0..line_width.max(2) as u32 {
            if width > 2 * t && height > 2 * t {
                let rect = Rect::at(t as i32, t as i32).of_size(width - 2 * t, height - 2 * t);
                draw_hollow_rect_mut(&mut img, rect, color);
            }
        }
    }

    DynamicImage::ImageRgb8(img)
}

/// Find the next available run directory (predict, predict2, predict3, etc.)
pub fn find_next_run_dir(base: &str, prefix: &str) -> String {
    let base_path = Path::new(base);

    let first = base_path.join(prefix);
    if !first.exists() {
        return first.to_string_lossy().to_string();
    }

    (2..)
        .map(|i| base_path.join(format!("{prefix}{i}")))
        .find(|candidate| !candidate.exists())
        .unwrap_or(first)
        .to_string_lossy()
        .to_string()
}
