//! Box geometry: center-form detector boxes to integer crop rectangles.

/// Axis-aligned box in center form, as returned by the detection workflow.
///
/// Width and height are not validated; whatever the service returns is
/// passed through to [`crop_rect`].
#[derive(Clone, Debug, PartialEq)]
pub struct DetectionBox {
    pub center_x: f64,
    pub center_y: f64,
    pub width: f64,
    pub height: f64,
    pub label: String,
    pub confidence: f64,
}

impl DetectionBox {
    /// Corner-form bounds `(x1, y1, x2, y2)` before any clamping.
    pub fn corners(&self) -> (f64, f64, f64, f64) {
        let half_w = self.width / 2.0;
        let half_h = self.height / 2.0;
        (
            self.center_x - half_w,
            self.center_y - half_h,
            self.center_x + half_w,
            self.center_y + half_h,
        )
    }
}

/// Integer crop rectangle in corner form. `x2`/`y2` are exclusive.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CropRect {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
}

impl CropRect {
    pub fn width(&self) -> u32 {
        self.x2.saturating_sub(self.x1)
    }

    pub fn height(&self) -> u32 {
        self.y2.saturating_sub(self.y1)
    }

    /// True when the rectangle covers no pixels.
    pub fn is_degenerate(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }
}

/// Map a detection box onto pixel bounds that are safe to crop.
///
/// The top-left corner is clamped from below at 0 and the bottom-right
/// corner from above at the image size. Coordinates are then rounded and
/// confined to `[0, width] x [0, height]`. A box lying outside the image
/// on one axis collapses to a degenerate rectangle instead of erroring;
/// non-finite input yields an empty rectangle.
pub fn crop_rect(bbox: &DetectionBox, image_width: u32, image_height: u32) -> CropRect {
    let (x1, y1, x2, y2) = bbox.corners();
    if ![x1, y1, x2, y2].iter().all(|v| v.is_finite()) {
        return CropRect::default();
    }
    let x1 = x1.max(0.0);
    let y1 = y1.max(0.0);
    let x2 = x2.min(image_width as f64);
    let y2 = y2.min(image_height as f64);

    CropRect {
        x1: to_pixel(x1, image_width),
        y1: to_pixel(y1, image_height),
        x2: to_pixel(x2, image_width),
        y2: to_pixel(y2, image_height),
    }
}

fn to_pixel(value: f64, extent: u32) -> u32 {
    value.round().clamp(0.0, extent as f64) as u32
}
