use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// An axis-aligned rectangle in source-frame pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct PixelRect {
    /// X coordinate of the top-left corner
    pub x: u32,
    /// Y coordinate of the top-left corner
    pub y: u32,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl PixelRect {
    /// Create a new rectangle.
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Rectangle covering a whole frame.
    pub fn full(frame_width: u32, frame_height: u32) -> Self {
        Self::new(0, 0, frame_width, frame_height)
    }

    /// Area in pixels.
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Build a rectangle from signed detector output, clipped to the frame.
    ///
    /// Returns `None` when nothing of the box lies inside the frame.
    pub fn clipped(
        x: i64,
        y: i64,
        width: i64,
        height: i64,
        frame_width: u32,
        frame_height: u32,
    ) -> Option<Self> {
        let x1 = x.max(0);
        let y1 = y.max(0);
        let x2 = (x + width).min(frame_width as i64);
        let y2 = (y + height).min(frame_height as i64);

        if x2 <= x1 || y2 <= y1 {
            return None;
        }

        Some(Self::new(
            x1 as u32,
            y1 as u32,
            (x2 - x1) as u32,
            (y2 - y1) as u32,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clipped_inside_frame_is_unchanged() {
        let rect = PixelRect::clipped(10, 20, 50, 60, 640, 480).unwrap();
        assert_eq!(rect, PixelRect::new(10, 20, 50, 60));
    }

    #[test]
    fn test_clipped_overhanging_edges() {
        let rect = PixelRect::clipped(-10, 450, 50, 60, 640, 480).unwrap();
        assert_eq!(rect, PixelRect::new(0, 450, 40, 30));
    }

    #[test]
    fn test_clipped_outside_frame() {
        assert!(PixelRect::clipped(700, 10, 50, 50, 640, 480).is_none());
        assert!(PixelRect::clipped(10, 10, 0, 50, 640, 480).is_none());
    }

    #[test]
    fn test_full_frame() {
        let rect = PixelRect::full(320, 240);
        assert_eq!(rect.area(), 320 * 240);
        assert!(!rect.is_empty());
        assert!(PixelRect::new(0, 0, 0, 5).is_empty());
    }
}
