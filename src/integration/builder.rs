//! Builder for creating TrackedDetection objects from various tracker output formats.

use crate::reid::{BoundingBox, Identity, TrackedDetection};

/// Builder for creating `TrackedDetection` objects from various input formats.
#[derive(Debug, Clone, Default)]
pub struct TrackedDetectionBuilder {
    bbox: BoundingBox,
    raw_identity: u64,
    score: f32,
}

impl TrackedDetectionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set bounding box in TLBR format (x1, y1, x2, y2).
    pub fn tlbr(mut self, x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        self.bbox = BoundingBox::from_tlbr(x1, y1, x2, y2);
        self
    }

    /// Set bounding box in XYWH format (center_x, center_y, width, height).
    pub fn xywh(mut self, cx: f32, cy: f32, w: f32, h: f32) -> Self {
        self.bbox = BoundingBox::from_xywh(cx, cy, w, h);
        self
    }

    /// Set bounding box in TLWH format (left, top, width, height).
    pub fn tlwh(mut self, x: f32, y: f32, w: f32, h: f32) -> Self {
        self.bbox = BoundingBox::from_tlwh(x, y, w, h);
        self
    }

    /// Set the identity proposed by the tracker.
    pub fn raw_identity(mut self, id: u64) -> Self {
        self.raw_identity = id;
        self
    }

    pub fn score(mut self, score: f32) -> Self {
        self.score = score;
        self
    }

    pub fn build(self) -> TrackedDetection {
        TrackedDetection::new(self.bbox, Identity(self.raw_identity), self.score)
    }

    /// Build from a tracker row `[xmin, ymin, xmax, ymax, track_id, conf]`.
    ///
    /// Returns `None` when the track id is not a finite non-negative integer.
    pub fn from_tracker_row(row: [f32; 6]) -> Option<TrackedDetection> {
        let track_id = row[4];
        if !track_id.is_finite() || track_id < 0.0 || track_id.fract() != 0.0 {
            return None;
        }
        let detection = Self::new()
            .tlbr(row[0], row[1], row[2], row[3])
            .raw_identity(track_id as u64)
            .score(row[5])
            .build();
        Some(detection)
    }
}
