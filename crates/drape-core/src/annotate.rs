//! Visualization copy of the input with the chosen face outlined.

use crate::frame::BgrImage;
use crate::types::FaceBox;
use image::{Rgb, RgbImage};
use imageproc::{drawing::draw_hollow_rect_mut, rect::Rect};

const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const BOX_THICKNESS: u32 = 2;

/// Draw `face` on an RGB copy of `image`. The source is left untouched.
pub fn annotate_face(image: &BgrImage, face: &FaceBox) -> RgbImage {
    let mut canvas = image.to_rgb();

    // Nested 1-px outlines, growing inward.
    for inset in 0..BOX_THICKNESS {
        let Some(w) = face.width.checked_sub(2 * inset).filter(|&w| w > 0) else {
            break;
        };
        let Some(h) = face.height.checked_sub(2 * inset).filter(|&h| h > 0) else {
            break;
        };
        let rect = Rect::at((face.x + inset) as i32, (face.y + inset) as i32).of_size(w, h);
        draw_hollow_rect_mut(&mut canvas, rect, BOX_COLOR);
    }

    canvas
}
