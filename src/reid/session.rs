//! One video's identity resolution state.

use std::collections::{BTreeMap, HashMap};
use std::fmt::Display;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::integration::{FeatureEmbedder, ImageCrop};
use crate::reid::bbox::BoundingBox;
use crate::reid::config::{PersistencePolicy, ReidConfig};
use crate::reid::embedding::Embedding;
use crate::reid::error::{ReidError, Result};
use crate::reid::file_store::FileTrackletStore;
use crate::reid::identity::Identity;
use crate::reid::ledger::TrackletLedger;
use crate::reid::matcher::{IdentityMatcher, Resolution};
use crate::reid::store::{MemoryTrackletStore, TrackletStore, check_dimension};

/// Detection handed over by the upstream tracker.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrackedDetection {
    pub bbox: BoundingBox,
    /// Identity proposed by the tracker for this frame.
    pub raw_identity: Identity,
    /// Detector confidence.
    pub score: f32,
}

impl TrackedDetection {
    pub fn new(bbox: BoundingBox, raw_identity: impl Into<Identity>, score: f32) -> Self {
        Self {
            bbox,
            raw_identity: raw_identity.into(),
            score,
        }
    }
}

/// Outcome for one detection; `identity` is the downstream join key.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ResolvedDetection {
    pub bbox: BoundingBox,
    pub raw_identity: Identity,
    /// `None` when no embedding could be computed this frame.
    pub identity: Option<Identity>,
    pub resolution: Option<Resolution>,
}

impl ResolvedDetection {
    fn resolved(detection: &TrackedDetection, resolution: Resolution) -> Self {
        Self {
            bbox: detection.bbox,
            raw_identity: detection.raw_identity,
            identity: Some(resolution.identity()),
            resolution: Some(resolution),
        }
    }

    fn unresolved(detection: &TrackedDetection) -> Self {
        Self {
            bbox: detection.bbox,
            raw_identity: detection.raw_identity,
            identity: None,
            resolution: None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.identity.is_some()
    }
}

/// Counters reported when a session ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionSummary {
    pub frames: u64,
    pub detections: u64,
    pub bootstraps: u64,
    pub reidentified: u64,
    pub new_identities: u64,
    pub known: u64,
    pub unresolved: u64,
}

impl SessionSummary {
    fn record(&mut self, resolution: &Resolution) {
        match resolution {
            Resolution::Bootstrap { .. } => self.bootstraps += 1,
            Resolution::Reidentified { .. } => self.reidentified += 1,
            Resolution::New { .. } => self.new_identities += 1,
            Resolution::Known { .. } => self.known += 1,
        }
    }
}

/// Store chosen by [`PersistencePolicy`].
#[derive(Debug)]
pub enum SessionStore {
    Memory(MemoryTrackletStore),
    File(FileTrackletStore),
}

impl SessionStore {
    pub fn create(policy: &PersistencePolicy, camera_id: &str) -> Result<Self> {
        Ok(match policy {
            PersistencePolicy::Memory => Self::Memory(MemoryTrackletStore::new()),
            PersistencePolicy::File { dir, sync } => {
                Self::File(FileTrackletStore::create(dir, camera_id, *sync)?)
            }
        })
    }

    fn inner(&self) -> &dyn TrackletStore {
        match self {
            Self::Memory(store) => store,
            Self::File(store) => store,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn TrackletStore {
        match self {
            Self::Memory(store) => store,
            Self::File(store) => store,
        }
    }
}

impl TrackletStore for SessionStore {
    fn append(&mut self, identity: Identity, embedding: Embedding) -> Result<u64> {
        self.inner_mut().append(identity, embedding)
    }

    fn query_window(&self, identity: Identity, k: usize) -> Result<Vec<Embedding>> {
        self.inner().query_window(identity, k)
    }

    fn query_all_windows(&self, k: usize) -> Result<BTreeMap<Identity, Vec<Embedding>>> {
        self.inner().query_all_windows(k)
    }

    fn len(&self) -> usize {
        self.inner().len()
    }

    fn identities(&self) -> Vec<Identity> {
        self.inner().identities()
    }

    fn history_len(&self, identity: Identity) -> usize {
        self.inner().history_len(identity)
    }

    fn dimension(&self) -> Option<usize> {
        self.inner().dimension()
    }

    fn close(self) -> Result<()> {
        match self {
            Self::Memory(store) => store.close(),
            Self::File(store) => store.close(),
        }
    }
}

/// Identity resolution state for one video.
///
/// Owns the embedding store and the box ledger. Dropping or finishing the
/// session releases both; nothing carries over to the next video.
///
/// Remaps are final: if two subjects are merged by a false positive they stay
/// merged for the rest of the session.
#[derive(Debug)]
pub struct Session<S: TrackletStore = SessionStore> {
    camera_id: String,
    matcher: IdentityMatcher,
    store: S,
    ledger: TrackletLedger,
    aliases: HashMap<Identity, Identity>,
    summary: SessionSummary,
    /// Set once a store write fails.
    failed: bool,
}

impl Session<SessionStore> {
    /// Start a session with the store selected by `config.persistence`.
    pub fn open(config: &ReidConfig, camera_id: &str) -> Result<Self> {
        config.validate()?;
        let store = SessionStore::create(&config.persistence, camera_id)?;
        Self::with_store(config, camera_id, store)
    }
}

impl Session<MemoryTrackletStore> {
    pub fn in_memory(config: &ReidConfig, camera_id: &str) -> Result<Self> {
        Self::with_store(config, camera_id, MemoryTrackletStore::new())
    }
}

impl<S: TrackletStore> Session<S> {
    /// Start a session over a fresh store.
    pub fn with_store(config: &ReidConfig, camera_id: &str, store: S) -> Result<Self> {
        config.validate()?;
        if !store.is_empty() {
            return Err(ReidError::StoreNotEmpty {
                records: store.len(),
            });
        }

        info!(
            camera = camera_id,
            window_size = config.window_size,
            confidence_threshold = config.confidence_threshold,
            "reid session started"
        );

        Ok(Self {
            camera_id: camera_id.to_string(),
            matcher: IdentityMatcher::new(config.window_size, config.confidence_threshold),
            store,
            ledger: TrackletLedger::new(),
            aliases: HashMap::new(),
            summary: SessionSummary::default(),
            failed: false,
        })
    }

    /// Resolve one detection whose embedding is already computed.
    ///
    /// The embedding is appended under the final identity and the box under
    /// the same identity in the ledger. Only a store write failure leaves the
    /// session unusable; other errors reject this detection alone. Once a
    /// write has failed every later call returns [`ReidError::SessionFailed`].
    pub fn resolve(
        &mut self,
        detection: &TrackedDetection,
        embedding: Embedding,
    ) -> Result<Resolution> {
        self.settle(detection, Ok(embedding))
    }

    /// Apply the outcome of embedding one detection and keep the counters.
    fn settle(
        &mut self,
        detection: &TrackedDetection,
        embedding: Result<Embedding>,
    ) -> Result<Resolution> {
        self.ensure_usable()?;
        self.summary.detections += 1;

        let outcome = embedding.and_then(|embedding| self.apply(detection, embedding));
        match &outcome {
            Ok(resolution) => self.summary.record(resolution),
            Err(ReidError::StorageWrite(e)) => {
                warn!(camera = %self.camera_id, error = %e, "tracklet store write failed");
                self.failed = true;
            }
            Err(_) => self.summary.unresolved += 1,
        }
        outcome
    }

    fn ensure_usable(&self) -> Result<()> {
        if self.failed {
            return Err(ReidError::SessionFailed {
                camera: self.camera_id.clone(),
            });
        }
        Ok(())
    }

    fn apply(&mut self, detection: &TrackedDetection, embedding: Embedding) -> Result<Resolution> {
        let raw = detection.raw_identity;
        if !embedding.is_valid() {
            return Err(ReidError::Embedding {
                identity: raw,
                reason: "embedding is empty or not finite".to_string(),
            });
        }
        check_dimension(self.store.dimension(), &embedding)?;

        let resolution = match self.aliases.get(&raw) {
            Some(&identity) => Resolution::Known { identity },
            None => self.matcher.resolve(raw, &embedding, &self.store),
        };
        let identity = resolution.identity();

        self.store.append(identity, embedding)?;
        self.aliases.entry(raw).or_insert(identity);
        self.ledger.push(identity, detection.bbox);
        Ok(resolution)
    }

    /// Resolve every detection of one frame, in order.
    ///
    /// Returns one entry per input. A detection whose crop cannot be embedded
    /// is reported unresolved and leaves no trace in the store; the rest of the
    /// frame continues. A store write failure aborts with `Err` and fails the
    /// session.
    pub fn process_detections<E>(
        &mut self,
        embedder: &mut E,
        items: &[(TrackedDetection, ImageCrop<'_>)],
    ) -> Result<Vec<ResolvedDetection>>
    where
        E: FeatureEmbedder,
        E::Error: Display,
    {
        self.ensure_usable()?;
        self.summary.frames += 1;
        let mut resolved = Vec::with_capacity(items.len());

        for (detection, crop) in items {
            let embedding = embed(embedder, detection, crop);
            match self.settle(detection, embedding) {
                Ok(resolution) => {
                    resolved.push(ResolvedDetection::resolved(detection, resolution))
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(
                        camera = %self.camera_id,
                        raw = %detection.raw_identity,
                        error = %e,
                        "skipping identity resolution for detection"
                    );
                    resolved.push(ResolvedDetection::unresolved(detection));
                }
            }
        }

        debug!(
            camera = %self.camera_id,
            frame = self.summary.frames,
            detections = items.len(),
            "frame resolved"
        );
        Ok(resolved)
    }

    /// Final identity previously assigned to a raw tracker identity.
    pub fn resolved_identity(&self, raw: Identity) -> Option<Identity> {
        self.aliases.get(&raw).copied()
    }

    pub fn camera_id(&self) -> &str {
        &self.camera_id
    }

    pub fn matcher(&self) -> &IdentityMatcher {
        &self.matcher
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn ledger(&self) -> &TrackletLedger {
        &self.ledger
    }

    pub fn summary(&self) -> SessionSummary {
        self.summary
    }

    /// Whether a store write has failed in this session.
    pub fn has_failed(&self) -> bool {
        self.failed
    }

    /// End the session and release its storage.
    pub fn finish(self) -> Result<SessionSummary> {
        let Self {
            camera_id,
            store,
            summary,
            ..
        } = self;
        store.close()?;
        info!(
            camera = %camera_id,
            frames = summary.frames,
            detections = summary.detections,
            reidentified = summary.reidentified,
            new_identities = summary.new_identities,
            unresolved = summary.unresolved,
            "reid session finished"
        );
        Ok(summary)
    }
}

fn embed<E>(
    embedder: &mut E,
    detection: &TrackedDetection,
    crop: &ImageCrop<'_>,
) -> Result<Embedding>
where
    E: FeatureEmbedder,
    E::Error: Display,
{
    if detection.bbox.is_degenerate() || crop.is_empty() {
        return Err(ReidError::Embedding {
            identity: detection.raw_identity,
            reason: "zero-area crop".to_string(),
        });
    }
    embedder.embed(crop).map_err(|e| ReidError::Embedding {
        identity: detection.raw_identity,
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detection(raw: u64) -> TrackedDetection {
        TrackedDetection::new(BoundingBox::from_tlbr(0.0, 0.0, 10.0, 20.0), raw, 0.9)
    }

    fn session() -> Session<MemoryTrackletStore> {
        Session::in_memory(&ReidConfig::default(), "cam").unwrap()
    }

    #[test]
    fn test_first_detection_bootstraps() {
        let mut session = session();
        let res = session
            .resolve(&detection(7), Embedding::from(vec![1.0, 0.0]))
            .unwrap();
        assert_eq!(
            res,
            Resolution::Bootstrap {
                identity: Identity(7)
            }
        );
        assert_eq!(session.ledger().trajectory(Identity(7)).len(), 1);
    }

    #[test]
    fn test_alias_is_reused_without_rematching() {
        let mut session = session();
        session.resolve(&detection(7), Embedding::from(vec![1.0, 0.0])).unwrap();
        let res = session
            .resolve(&detection(9), Embedding::from(vec![1.0, 0.05]))
            .unwrap();
        assert!(res.is_remap());

        // A dissimilar embedding under an already resolved raw id is trusted.
        let res = session
            .resolve(&detection(9), Embedding::from(vec![0.0, 1.0]))
            .unwrap();
        assert_eq!(
            res,
            Resolution::Known {
                identity: Identity(7)
            }
        );
        assert_eq!(session.resolved_identity(Identity(9)), Some(Identity(7)));
        assert_eq!(session.store().history_len(Identity(7)), 3);
        assert_eq!(session.ledger().trajectory(Identity(7)).len(), 3);
    }

    #[test]
    fn test_dimension_mismatch_leaves_store_untouched() {
        let mut session = session();
        session.resolve(&detection(1), Embedding::from(vec![1.0, 0.0])).unwrap();
        let err = session
            .resolve(&detection(2), Embedding::from(vec![1.0, 0.0, 0.0]))
            .unwrap_err();
        assert!(!err.is_fatal());
        assert_eq!(session.store().len(), 1);
        assert_eq!(session.resolved_identity(Identity(2)), None);
    }

    #[test]
    fn test_rejects_non_finite_embedding() {
        let mut session = session();
        let err = session
            .resolve(&detection(1), Embedding::from(vec![f32::NAN, 0.0]))
            .unwrap_err();
        assert!(matches!(err, ReidError::Embedding { .. }));
        assert!(session.store().is_empty());
    }

    #[test]
    fn test_rejects_malformed_config() {
        let config = ReidConfig::default().with_window_size(0);
        assert!(matches!(
            Session::in_memory(&config, "cam"),
            Err(ReidError::MalformedConfig(_))
        ));
    }

    #[test]
    fn test_rejects_non_empty_store() {
        let mut store = MemoryTrackletStore::new();
        store.append(Identity(1), Embedding::from(vec![1.0])).unwrap();
        assert!(matches!(
            Session::with_store(&ReidConfig::default(), "cam", store),
            Err(ReidError::StoreNotEmpty { records: 1 })
        ));
    }

    #[test]
    fn test_summary_counts() {
        let mut session = session();
        session.resolve(&detection(1), Embedding::from(vec![1.0, 0.0])).unwrap();
        session.resolve(&detection(2), Embedding::from(vec![0.0, 1.0])).unwrap();
        session.resolve(&detection(3), Embedding::from(vec![1.0, 0.01])).unwrap();
        session.resolve(&detection(1), Embedding::from(vec![1.0, 0.0])).unwrap();

        let summary = session.finish().unwrap();
        assert_eq!(summary.detections, 4);
        assert_eq!(summary.bootstraps, 1);
        assert_eq!(summary.new_identities, 1);
        assert_eq!(summary.reidentified, 1);
        assert_eq!(summary.known, 1);
    }

    #[test]
    fn test_rejected_detections_are_counted_once() {
        let mut session = session();
        session.resolve(&detection(1), Embedding::from(vec![1.0, 0.0])).unwrap();
        assert!(session.resolve(&detection(2), Embedding::from(vec![1.0])).is_err());
        assert!(session.resolve(&detection(3), Embedding::from(Vec::<f32>::new())).is_err());

        let summary = session.summary();
        assert_eq!(summary.detections, 3);
        assert_eq!(summary.unresolved, 2);
        assert_eq!(summary.bootstraps, 1);
    }
}
