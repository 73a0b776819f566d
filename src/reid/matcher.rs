//! Similarity-based decision for raw identities seen for the first time.

use std::collections::BTreeMap;

use ndarray::{Array2, ArrayView1, Axis, stack};
use serde::Serialize;
use tracing::{debug, warn};

use crate::reid::embedding::{Embedding, mean_cosine_similarity};
use crate::reid::error::Result;
use crate::reid::identity::Identity;
use crate::reid::store::TrackletStore;

/// Best-scoring historical identity for a query embedding.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MatchCandidate {
    pub identity: Identity,
    /// Mean cosine similarity over the identity's window.
    pub score: f32,
}

/// How a detection's final identity was decided.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Resolution {
    /// First detection of the session; accepted without consulting history.
    Bootstrap { identity: Identity },
    /// Raw identity merged into a historical one.
    Reidentified {
        raw: Identity,
        identity: Identity,
        score: f32,
    },
    /// Raw identity accepted as a new subject.
    New {
        identity: Identity,
        best: Option<MatchCandidate>,
    },
    /// Raw identity already resolved earlier in the session.
    Known { identity: Identity },
}

impl Resolution {
    /// Final identity for the detection.
    pub fn identity(&self) -> Identity {
        match *self {
            Self::Bootstrap { identity }
            | Self::Reidentified { identity, .. }
            | Self::New { identity, .. }
            | Self::Known { identity } => identity,
        }
    }

    pub fn is_remap(&self) -> bool {
        matches!(self, Self::Reidentified { .. })
    }
}

#[derive(Debug, Clone)]
pub struct IdentityMatcher {
    window_size: usize,
    confidence_threshold: f32,
}

impl IdentityMatcher {
    pub fn new(window_size: usize, confidence_threshold: f32) -> Self {
        Self {
            window_size,
            confidence_threshold,
        }
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn confidence_threshold(&self) -> f32 {
        self.confidence_threshold
    }

    /// Highest mean similarity among `windows`.
    ///
    /// Identities are scanned in ascending order and only a strictly greater
    /// score replaces the current best, so the lowest identity wins exact ties.
    /// Empty windows are skipped.
    pub fn best_match(
        &self,
        query: &Embedding,
        windows: &BTreeMap<Identity, Vec<Embedding>>,
    ) -> Option<MatchCandidate> {
        let mut best: Option<MatchCandidate> = None;
        for (&identity, window) in windows {
            let Some(matrix) = stack_window(window) else {
                continue;
            };
            if matrix.ncols() != query.dim() {
                continue;
            }
            let Some(score) = mean_cosine_similarity(query, matrix.view()) else {
                continue;
            };
            if best.is_none_or(|b| score > b.score) {
                best = Some(MatchCandidate { identity, score });
            }
        }
        best
    }

    /// Decide the final identity for a raw identity seen for the first time.
    ///
    /// Does not write to the store. A failed history read is treated as an
    /// absence of candidates.
    pub fn resolve<S: TrackletStore + ?Sized>(
        &self,
        raw: Identity,
        query: &Embedding,
        store: &S,
    ) -> Resolution {
        self.try_resolve(raw, query, store).unwrap_or_else(|e| {
            warn!(raw = %raw, error = %e, "history unavailable, treating as new identity");
            Resolution::New {
                identity: raw,
                best: None,
            }
        })
    }

    /// Same as [`resolve`](Self::resolve) but surfaces read failures.
    pub fn try_resolve<S: TrackletStore + ?Sized>(
        &self,
        raw: Identity,
        query: &Embedding,
        store: &S,
    ) -> Result<Resolution> {
        if store.is_empty() {
            return Ok(Resolution::Bootstrap { identity: raw });
        }

        let windows = store.query_all_windows(self.window_size)?;
        let best = self.best_match(query, &windows);

        Ok(match best {
            Some(candidate) if candidate.score >= self.confidence_threshold => {
                debug!(
                    raw = %raw,
                    identity = %candidate.identity,
                    score = candidate.score,
                    "re-identified"
                );
                Resolution::Reidentified {
                    raw,
                    identity: candidate.identity,
                    score: candidate.score,
                }
            }
            _ => {
                debug!(
                    raw = %raw,
                    best_score = ?best.map(|b| b.score),
                    "accepted as new identity"
                );
                Resolution::New {
                    identity: raw,
                    best,
                }
            }
        })
    }
}

fn stack_window(window: &[Embedding]) -> Option<Array2<f32>> {
    if window.is_empty() {
        return None;
    }
    let views: Vec<ArrayView1<'_, f32>> = window.iter().map(Embedding::view).collect();
    stack(Axis(0), &views).ok()
}
