use std::collections::BTreeMap;
use std::io;

use tracklet_reid::{
    BoundingBox, Embedding, FeatureEmbedder, Frame, Identity, ImageCrop, MemoryTrackletStore,
    ReidConfig, ReidError, ReidPipeline, Resolution, Result, Session, TrackedDetection,
    TrackletStore,
};

/// Memory store that fails the n-th append, or every history read.
#[derive(Default)]
struct FlakyStore {
    inner: MemoryTrackletStore,
    fail_append_at: Option<usize>,
    fail_reads: bool,
    appends: usize,
}

impl FlakyStore {
    fn failing_append(n: usize) -> Self {
        Self {
            fail_append_at: Some(n),
            ..Self::default()
        }
    }

    fn failing_reads() -> Self {
        Self {
            fail_reads: true,
            ..Self::default()
        }
    }

    fn read_error() -> ReidError {
        ReidError::StorageRead(io::Error::new(io::ErrorKind::UnexpectedEof, "short read"))
    }
}

impl TrackletStore for FlakyStore {
    fn append(&mut self, identity: Identity, embedding: Embedding) -> Result<u64> {
        let n = self.appends;
        self.appends += 1;
        if self.fail_append_at == Some(n) {
            return Err(ReidError::StorageWrite(io::Error::other("disk full")));
        }
        self.inner.append(identity, embedding)
    }

    fn query_window(&self, identity: Identity, k: usize) -> Result<Vec<Embedding>> {
        if self.fail_reads {
            return Err(Self::read_error());
        }
        self.inner.query_window(identity, k)
    }

    fn query_all_windows(&self, k: usize) -> Result<BTreeMap<Identity, Vec<Embedding>>> {
        if self.fail_reads {
            return Err(Self::read_error());
        }
        self.inner.query_all_windows(k)
    }

    fn len(&self) -> usize {
        self.inner.len()
    }

    fn identities(&self) -> Vec<Identity> {
        self.inner.identities()
    }

    fn history_len(&self, identity: Identity) -> usize {
        self.inner.history_len(identity)
    }

    fn dimension(&self) -> Option<usize> {
        self.inner.dimension()
    }
}

/// Embeds a crop by its first byte: `[b, 1]`.
struct FirstByteEmbedder;

impl FeatureEmbedder for FirstByteEmbedder {
    type Error = std::convert::Infallible;

    fn embed(&mut self, crop: &ImageCrop<'_>) -> std::result::Result<Embedding, Self::Error> {
        Ok(Embedding::from(vec![crop.data[0] as f32, 1.0]))
    }
}

fn det(raw: u64) -> TrackedDetection {
    TrackedDetection::new(BoundingBox::from_tlbr(0.0, 0.0, 4.0, 4.0), raw, 0.9)
}

fn session(store: FlakyStore) -> Session<FlakyStore> {
    Session::with_store(&ReidConfig::default(), "cam_03.mp4", store).unwrap()
}

#[test]
fn test_write_failure_fails_the_session() {
    let mut session = session(FlakyStore::failing_append(1));
    session.resolve(&det(1), Embedding::from(vec![1.0, 0.0])).unwrap();

    let err = session
        .resolve(&det(2), Embedding::from(vec![0.0, 1.0]))
        .unwrap_err();
    assert!(matches!(err, ReidError::StorageWrite(_)));
    assert!(err.is_fatal());
    assert!(session.has_failed());
    assert_eq!(session.resolved_identity(Identity(2)), None);

    // Nothing further is accepted, even though the store would take it.
    let err = session
        .resolve(&det(3), Embedding::from(vec![0.0, 1.0]))
        .unwrap_err();
    assert!(matches!(err, ReidError::SessionFailed { .. }));
    assert_eq!(session.store().len(), 1);
    assert_eq!(session.resolved_identity(Identity(3)), None);
}

#[test]
fn test_write_failure_aborts_the_frame() {
    let mut session = session(FlakyStore::failing_append(1));
    let items = vec![
        (det(1), ImageCrop::new(vec![1u8; 16], 4, 4, 1)),
        (det(2), ImageCrop::new(vec![2u8; 16], 4, 4, 1)),
        (det(3), ImageCrop::new(vec![3u8; 16], 4, 4, 1)),
    ];

    let err = session
        .process_detections(&mut FirstByteEmbedder, &items)
        .unwrap_err();
    assert!(matches!(err, ReidError::StorageWrite(_)));
    assert_eq!(session.resolved_identity(Identity(3)), None);

    let err = session
        .process_detections(&mut FirstByteEmbedder, &items[2..])
        .unwrap_err();
    assert!(matches!(err, ReidError::SessionFailed { .. }));
    assert_eq!(session.summary().frames, 1);
}

#[test]
fn test_pipeline_discards_session_after_write_failure() {
    let session = session(FlakyStore::failing_append(0));
    let mut pipeline =
        ReidPipeline::with_session(FirstByteEmbedder, ReidConfig::default(), session);
    let frame = Frame::new(vec![9u8; 8 * 8], 8, 8, 1).unwrap();

    let err = pipeline.process_frame(&frame, &[det(1)]).unwrap_err();
    assert!(matches!(err, ReidError::StorageWrite(_)));
    assert!(pipeline.session().is_none());

    assert!(matches!(
        pipeline.process_frame(&frame, &[det(1)]),
        Err(ReidError::NoSession)
    ));
}

#[test]
fn test_read_failure_resolves_as_new_identity() {
    let mut session = session(FlakyStore::failing_reads());
    session.resolve(&det(1), Embedding::from(vec![1.0, 0.0])).unwrap();

    // Same appearance, but the history cannot be read.
    let res = session
        .resolve(&det(2), Embedding::from(vec![1.0, 0.0]))
        .unwrap();
    assert_eq!(
        res,
        Resolution::New {
            identity: Identity(2),
            best: None
        }
    );
    assert!(!session.has_failed());
    assert_eq!(session.store().len(), 2);
    assert_eq!(session.resolved_identity(Identity(2)), Some(Identity(2)));
}
