//! ReidPipeline for combining an embedding backend with per-video sessions.

use std::fmt::Display;

use tracing::warn;

use crate::reid::{
    ReidConfig, ReidError, ResolvedDetection, Result, Session, SessionStore, SessionSummary,
    TrackedDetection, TrackletStore,
};

use super::{FeatureEmbedder, Frame, ImageCrop};

/// Bundles a `FeatureEmbedder` with the session of the video being processed.
///
/// At most one session exists at a time: starting a video tears down the
/// previous one first.
pub struct ReidPipeline<E: FeatureEmbedder, S: TrackletStore = SessionStore> {
    embedder: E,
    config: ReidConfig,
    session: Option<Session<S>>,
}

impl<E> ReidPipeline<E, SessionStore>
where
    E: FeatureEmbedder,
    E::Error: Display,
{
    pub fn new(embedder: E, config: ReidConfig) -> Self {
        Self {
            embedder,
            config,
            session: None,
        }
    }

    pub fn with_default_config(embedder: E) -> Self {
        Self::new(embedder, ReidConfig::default())
    }

    /// Open a session for a new video, closing any session still open.
    ///
    /// Returns the summary of the closed session, if there was one.
    pub fn start_video(&mut self, camera_id: &str) -> Result<Option<SessionSummary>> {
        let previous = self.close_session()?;
        self.session = Some(Session::open(&self.config, camera_id)?);
        Ok(previous)
    }
}

impl<E, S> ReidPipeline<E, S>
where
    E: FeatureEmbedder,
    E::Error: Display,
    S: TrackletStore,
{
    /// Build a pipeline around a session opened by the caller.
    pub fn with_session(embedder: E, config: ReidConfig, session: Session<S>) -> Self {
        Self {
            embedder,
            config,
            session: Some(session),
        }
    }

    /// Replace the current session with `session`, closing the old one.
    pub fn start_session(&mut self, session: Session<S>) -> Result<Option<SessionSummary>> {
        let previous = self.close_session()?;
        self.session = Some(session);
        Ok(previous)
    }

    fn close_session(&mut self) -> Result<Option<SessionSummary>> {
        self.session.take().map(Session::finish).transpose()
    }

    /// Resolve identities for every detection in `frame`.
    ///
    /// A store write failure discards the session; the error is returned and
    /// a new video must be started.
    pub fn process_frame(
        &mut self,
        frame: &Frame,
        detections: &[TrackedDetection],
    ) -> Result<Vec<ResolvedDetection>> {
        let session = self.session.as_mut().ok_or(ReidError::NoSession)?;

        let items: Vec<(TrackedDetection, ImageCrop<'static>)> = detections
            .iter()
            .map(|det| (*det, frame.crop(&det.bbox)))
            .collect();

        let result = session.process_detections(&mut self.embedder, &items);
        if result.is_err() {
            if let Some(session) = self.session.take() {
                warn!(camera = session.camera_id(), "discarding reid session after store failure");
            }
        }
        result
    }

    /// Close the current session and release its storage.
    pub fn finish_video(&mut self) -> Result<SessionSummary> {
        self.session.take().ok_or(ReidError::NoSession)?.finish()
    }

    /// Get a reference to the current session.
    pub fn session(&self) -> Option<&Session<S>> {
        self.session.as_ref()
    }

    /// Get a reference to the underlying embedder.
    pub fn embedder(&self) -> &E {
        &self.embedder
    }

    /// Get a mutable reference to the underlying embedder.
    pub fn embedder_mut(&mut self) -> &mut E {
        &mut self.embedder
    }

    pub fn config(&self) -> &ReidConfig {
        &self.config
    }
}
