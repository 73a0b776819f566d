use tracklet_reid::{
    BoundingBox, Embedding, FileTrackletStore, Identity, PersistencePolicy, ReidConfig, ReidError,
    Resolution, Session, TrackedDetection, TrackletStore,
};

fn det(raw: u64) -> TrackedDetection {
    TrackedDetection::new(BoundingBox::from_tlwh(0.0, 0.0, 20.0, 40.0), raw, 0.8)
}

fn file_config(dir: &std::path::Path) -> ReidConfig {
    ReidConfig::default().with_persistence(PersistencePolicy::File {
        dir: dir.to_path_buf(),
        sync: false,
    })
}

#[test]
fn test_file_session_creates_and_removes_log() {
    let dir = tempfile::tempdir().unwrap();
    let config = file_config(dir.path());
    let log = FileTrackletStore::log_path(dir.path(), "cam_01.mp4").unwrap();

    let mut session = Session::open(&config, "cam_01.mp4").unwrap();
    assert!(log.exists());

    session.resolve(&det(7), Embedding::from(vec![1.0, 0.0])).unwrap();
    let res = session.resolve(&det(9), Embedding::from(vec![0.99, 0.05])).unwrap();
    assert_eq!(res.identity(), Identity(7));
    assert!(std::fs::metadata(&log).unwrap().len() > 0);

    let summary = session.finish().unwrap();
    assert_eq!(summary.detections, 2);
    assert!(!log.exists());
}

#[test]
fn test_aborted_session_leaves_nothing_behind() {
    let dir = tempfile::tempdir().unwrap();
    let config = file_config(dir.path());
    let log = FileTrackletStore::log_path(dir.path(), "cam_02").unwrap();

    {
        let mut session = Session::open(&config, "cam_02").unwrap();
        session.resolve(&det(1), Embedding::from(vec![0.5, 0.5])).unwrap();
        assert!(log.exists());
    }
    assert!(!log.exists());
}

#[test]
fn test_sessions_never_share_identities() {
    let dir = tempfile::tempdir().unwrap();
    let config = file_config(dir.path());

    let mut first = Session::open(&config, "cam").unwrap();
    first.resolve(&det(4), Embedding::from(vec![1.0, 0.0])).unwrap();
    first.finish().unwrap();

    let mut second = Session::open(&config, "cam").unwrap();
    assert!(second.store().is_empty());
    let res = second.resolve(&det(8), Embedding::from(vec![1.0, 0.0])).unwrap();
    assert_eq!(
        res,
        Resolution::Bootstrap {
            identity: Identity(8)
        }
    );
}

#[test]
fn test_memory_and_file_sessions_agree() {
    let dir = tempfile::tempdir().unwrap();
    let mut on_disk = Session::open(&file_config(dir.path()), "cam").unwrap();
    let mut in_memory = Session::open(&ReidConfig::default(), "cam").unwrap();

    let stream = [
        (1, vec![1.0, 0.0, 0.0]),
        (2, vec![0.0, 1.0, 0.0]),
        (3, vec![0.95, 0.1, 0.0]),
        (4, vec![0.0, 0.0, 1.0]),
        (5, vec![0.05, 0.98, 0.0]),
        (1, vec![0.9, 0.0, 0.1]),
    ];
    for (raw, values) in stream {
        let a = on_disk.resolve(&det(raw), Embedding::from(values.clone())).unwrap();
        let b = in_memory.resolve(&det(raw), Embedding::from(values)).unwrap();
        assert_eq!(a, b);
    }
    assert_eq!(on_disk.store().identities(), in_memory.store().identities());
    assert_eq!(
        on_disk.store().query_all_windows(2).unwrap(),
        in_memory.store().query_all_windows(2).unwrap()
    );
}

#[test]
fn test_malformed_config_fails_before_any_frame() {
    let dir = tempfile::tempdir().unwrap();
    let config = file_config(dir.path()).with_confidence_threshold(1.2);

    let err = Session::open(&config, "cam").unwrap_err();
    assert!(matches!(err, ReidError::MalformedConfig(_)));
    assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
}

#[test]
fn test_config_from_json_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("reid.json");
    std::fs::write(&path, r#"{ "noOfFrameFeatures": 4, "confidence": 0.75 }"#).unwrap();

    let config = ReidConfig::from_json_file(&path).unwrap();
    assert_eq!(config.window_size, 4);
    assert_eq!(config.confidence_threshold, 0.75);

    assert!(matches!(
        ReidConfig::from_json_file(dir.path().join("missing.json")),
        Err(ReidError::Config(_))
    ));
}
