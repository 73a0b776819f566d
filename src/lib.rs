//! Per-session identity resolution for tracked video detections.
//!
//! The upstream tracker proposes a raw identity per detection. The first time a
//! raw identity shows up in a session, its appearance embedding is compared with
//! the recent embeddings of every identity already seen; a close enough match
//! remaps the detection to the historical identity, otherwise the raw identity is
//! accepted as a new subject.
//!
//! ```ignore
//! use tracklet_reid::{ReidConfig, ReidPipeline};
//!
//! let mut pipeline = ReidPipeline::new(my_embedder, ReidConfig::default());
//! pipeline.start_video("cam_01.mp4")?;
//! for (frame, detections) in video {
//!     let resolved = pipeline.process_frame(&frame, &detections)?;
//! }
//! let summary = pipeline.finish_video()?;
//! ```

pub mod integration;
pub mod reid;

pub use integration::{FeatureEmbedder, Frame, ImageCrop, ReidPipeline, TrackedDetectionBuilder};
pub use reid::{
    BoundingBox, Embedding, FileTrackletStore, Identity, IdentityMatcher, MatchCandidate,
    MemoryTrackletStore, PersistencePolicy, ReidConfig, ReidError, ResolvedDetection, Resolution,
    Result, Session, SessionStore, SessionSummary, TrackedDetection, TrackletLedger,
    TrackletRecord, TrackletStore,
};
