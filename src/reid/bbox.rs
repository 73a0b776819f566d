use serde::{Deserialize, Serialize};

/// Detection bounding box in pixel coordinates.
///
/// Stored as corners (TLBR), which is what the upstream tracker emits. Also
/// constructible from:
/// - TLWH: Top-Left X, Top-Left Y, Width, Height
/// - XYWH: Center X, Center Y, Width, Height
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Top-left x coordinate
    pub x1: f32,
    /// Top-left y coordinate
    pub y1: f32,
    /// Bottom-right x coordinate
    pub x2: f32,
    /// Bottom-right y coordinate
    pub y2: f32,
}

impl BoundingBox {
    /// Create a box from TLBR corners (x1, y1, x2, y2).
    #[inline]
    pub fn from_tlbr(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Create a box from the top-left corner and its dimensions.
    #[inline]
    pub fn from_tlwh(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x1: x,
            y1: y,
            x2: x + width,
            y2: y + height,
        }
    }

    /// Create a box from its center and dimensions.
    #[inline]
    pub fn from_xywh(cx: f32, cy: f32, width: f32, height: f32) -> Self {
        Self {
            x1: cx - width / 2.0,
            y1: cy - height / 2.0,
            x2: cx + width / 2.0,
            y2: cy + height / 2.0,
        }
    }

    #[inline]
    pub fn to_tlbr(&self) -> [f32; 4] {
        [self.x1, self.y1, self.x2, self.y2]
    }

    #[inline]
    pub fn to_tlwh(&self) -> [f32; 4] {
        [self.x1, self.y1, self.width(), self.height()]
    }

    #[inline]
    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    #[inline]
    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    #[inline]
    pub fn center(&self) -> (f32, f32) {
        ((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }

    #[inline]
    pub fn area(&self) -> f32 {
        self.width().max(0.0) * self.height().max(0.0)
    }

    /// True when no pixel can be cropped from this box.
    pub fn is_degenerate(&self) -> bool {
        let finite = self.to_tlbr().iter().all(|v| v.is_finite());
        !finite || self.width() <= 0.0 || self.height() <= 0.0
    }

    /// Integer pixel window `(x, y, width, height)` after clamping to a frame.
    ///
    /// Returns `None` when nothing of the box lies inside the frame.
    pub fn pixel_window(
        &self,
        frame_width: u32,
        frame_height: u32,
    ) -> Option<(u32, u32, u32, u32)> {
        if self.is_degenerate() {
            return None;
        }
        let x1 = self.x1.floor().clamp(0.0, frame_width as f32) as u32;
        let y1 = self.y1.floor().clamp(0.0, frame_height as f32) as u32;
        let x2 = self.x2.ceil().clamp(0.0, frame_width as f32) as u32;
        let y2 = self.y2.ceil().clamp(0.0, frame_height as f32) as u32;
        if x2 <= x1 || y2 <= y1 {
            return None;
        }
        Some((x1, y1, x2 - x1, y2 - y1))
    }
}
