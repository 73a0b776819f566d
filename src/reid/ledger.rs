//! In-memory bounding box history per resolved identity.

use std::collections::HashMap;

use crate::reid::bbox::BoundingBox;
use crate::reid::identity::Identity;

#[derive(Debug, Clone, Default)]
pub struct TrackletLedger {
    tracks: HashMap<Identity, Vec<BoundingBox>>,
}

impl TrackletLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, identity: Identity, bbox: BoundingBox) {
        self.tracks.entry(identity).or_default().push(bbox);
    }

    /// Boxes recorded for `identity`, oldest first.
    pub fn trajectory(&self, identity: Identity) -> &[BoundingBox] {
        self.tracks
            .get(&identity)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn last(&self, identity: Identity) -> Option<&BoundingBox> {
        self.trajectory(identity).last()
    }

    pub fn contains(&self, identity: Identity) -> bool {
        self.tracks.contains_key(&identity)
    }

    /// Path length travelled by the box center, in pixels.
    pub fn center_path_length(&self, identity: Identity) -> f32 {
        self.trajectory(identity)
            .windows(2)
            .map(|pair| {
                let (ax, ay) = pair[0].center();
                let (bx, by) = pair[1].center();
                ((bx - ax).powi(2) + (by - ay).powi(2)).sqrt()
            })
            .sum()
    }

    /// Number of identities with at least one box.
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn identities(&self) -> impl Iterator<Item = Identity> + '_ {
        self.tracks.keys().copied()
    }

    pub fn clear(&mut self) {
        self.tracks.clear();
    }
}
