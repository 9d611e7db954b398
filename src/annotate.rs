//! Box outlines drawn over a copy of the working image.

use image::{Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;

use crate::geometry::CropRect;

pub const OUTLINE_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const OUTLINE_WIDTH: u32 = 3;

/// Return a copy of `image` with every non-degenerate rectangle outlined.
pub fn annotate<'a>(image: &RgbImage, rects: impl IntoIterator<Item = &'a CropRect>) -> RgbImage {
    let mut annotated = image.clone();
    for rect in rects {
        draw_outline(&mut annotated, rect);
    }
    annotated
}

fn draw_outline(image: &mut RgbImage, rect: &CropRect) {
    // Inset rings so the outline stays inside the crop bounds.
    for inset in 0..OUTLINE_WIDTH {
        let width = rect.width().saturating_sub(2 * inset);
        let height = rect.height().saturating_sub(2 * inset);
        if width == 0 || height == 0 {
            break;
        }
        let outline = Rect::at((rect.x1 + inset) as i32, (rect.y1 + inset) as i32)
            .of_size(width, height);
        draw_hollow_rect_mut(image, outline, OUTLINE_COLOR);
    }
}
