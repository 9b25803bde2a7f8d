use serde::{Deserialize, Serialize};

/// Largest coordinate or size accepted from a remote response, in pixels.
pub const MAX_COORDINATE: f64 = 16_777_216.0;

/// Pixel rectangle with top-left origin. Serialized as `[x, y, w, h]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "[i32; 4]", into = "[i32; 4]")]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl BoundingBox {
    /// Negative sizes are clamped to zero.
    pub fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self {
            x,
            y,
            w: w.max(0),
            h: h.max(0),
        }
    }

    /// Integer center, `(x + w/2, y + h/2)`, saturating at the `i32` range.
    pub fn center(&self) -> Point {
        Point {
            x: self.x.saturating_add(self.w / 2),
            y: self.y.saturating_add(self.h / 2),
        }
    }

    /// Exact center, used to seed tracking from a user selection.
    pub fn center_f64(&self) -> (f64, f64) {
        (
            f64::from(self.x) + f64::from(self.w) / 2.0,
            f64::from(self.y) + f64::from(self.h) / 2.0,
        )
    }
}

impl From<[i32; 4]> for BoundingBox {
    fn from([x, y, w, h]: [i32; 4]) -> Self {
        Self::new(x, y, w, h)
    }
}

impl From<BoundingBox> for [i32; 4] {
    fn from(bbox: BoundingBox) -> Self {
        [bbox.x, bbox.y, bbox.w, bbox.h]
    }
}

/// Integer pixel point. Serialized as `[x, y]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "[i32; 2]", into = "[i32; 2]")]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn distance_to(&self, (x, y): (f64, f64)) -> f64 {
        let dx = f64::from(self.x) - x;
        let dy = f64::from(self.y) - y;
        (dx * dx + dy * dy).sqrt()
    }
}

impl From<[i32; 2]> for Point {
    fn from([x, y]: [i32; 2]) -> Self {
        Self { x, y }
    }
}

impl From<Point> for [i32; 2] {
    fn from(point: Point) -> Self {
        [point.x, point.y]
    }
}

/// One normalized player detection.
///
/// Fields are private so the center always matches the box it was built from.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Detection {
    bbox: BoundingBox,
    confidence: f32,
    center: Point,
}

impl Detection {
    /// Build from a top-left box. Confidence is clamped to `[0, 1]`.
    pub fn new(bbox: BoundingBox, confidence: f32) -> Self {
        let confidence = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };
        Self {
            bbox,
            confidence,
            center: bbox.center(),
        }
    }

    /// Build from the center + size form remote detectors report.
    pub fn from_center(cx: f64, cy: f64, width: f64, height: f64, confidence: f32) -> Self {
        let width = coordinate(width).max(0.0);
        let height = coordinate(height).max(0.0);
        let cx = coordinate(cx);
        let cy = coordinate(cy);
        let bbox = BoundingBox::new(
            (cx - width / 2.0) as i32,
            (cy - height / 2.0) as i32,
            width as i32,
            height as i32,
        );
        Self::new(bbox, confidence)
    }

    pub fn bbox(&self) -> BoundingBox {
        self.bbox
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    pub fn center(&self) -> Point {
        self.center
    }
}

/// Non-finite values read as 0; the rest are clamped to `±MAX_COORDINATE`.
fn coordinate(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(-MAX_COORDINATE, MAX_COORDINATE)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn center_form_converts_to_top_left() {
        let det = Detection::from_center(50.0, 60.0, 20.0, 40.0, 0.9);
        assert_eq!(det.bbox(), BoundingBox::new(40, 40, 20, 40));
        assert_eq!(det.center(), Point { x: 50, y: 60 });
        assert_eq!(det.confidence(), 0.9);
    }

    #[test]
    fn center_always_derives_from_bbox() {
        for (cx, cy, w, h) in [
            (10.5, 7.25, 3.0, 9.0),
            (0.0, 0.0, 0.0, 0.0),
            (3.0, 2.0, 11.0, 5.0),
            (-4.0, 8.0, 6.0, 2.5),
        ] {
            let det = Detection::from_center(cx, cy, w, h, 0.5);
            let bbox = det.bbox();
            assert_eq!(
                det.center(),
                Point {
                    x: bbox.x + bbox.w / 2,
                    y: bbox.y + bbox.h / 2
                }
            );
        }
    }

    #[test]
    fn clamps_sizes_and_confidence() {
        let det = Detection::from_center(10.0, 10.0, -4.0, f64::NAN, 1.7);
        assert_eq!(det.bbox().w, 0);
        assert_eq!(det.bbox().h, 0);
        assert_eq!(det.confidence(), 1.0);
        assert_eq!(Detection::new(BoundingBox::new(0, 0, 1, 1), f32::NAN).confidence(), 0.0);
    }

    #[test]
    fn huge_remote_coordinates_are_clamped() {
        let det = Detection::from_center(3e9, 10.0, 3e9, 10.0, 0.9);
        let bbox = det.bbox();
        assert_eq!(bbox, BoundingBox::new(8_388_608, 5, 16_777_216, 10));
        assert_eq!(det.center(), Point { x: 16_777_216, y: 10 });

        let det = Detection::from_center(-1e12, f64::INFINITY, 1e12, 4.0, 0.5);
        assert_eq!(det.bbox().x, -25_165_824);
        assert_eq!(det.bbox().y, -2);
        assert_eq!(det.center(), Point { x: -16_777_216, y: 0 });
    }

    #[test]
    fn center_saturates_at_i32_range() {
        let bbox = BoundingBox::new(i32::MAX - 1, i32::MIN, i32::MAX, 0);
        assert_eq!(bbox.center(), Point { x: i32::MAX, y: i32::MIN });
    }

    #[test]
    fn bbox_serializes_as_array() {
        let bbox = BoundingBox::new(100, 100, 200, 300);
        assert_eq!(serde_json::to_string(&bbox).unwrap(), "[100,100,200,300]");
        let parsed: BoundingBox = serde_json::from_str("[1,2,3,4]").unwrap();
        assert_eq!(parsed, BoundingBox::new(1, 2, 3, 4));
    }
}
