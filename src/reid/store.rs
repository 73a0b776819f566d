//! Append-only per-session embedding storage.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::reid::embedding::Embedding;
use crate::reid::error::{ReidError, Result};
use crate::reid::identity::Identity;

/// One stored observation. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackletRecord {
    pub identity: Identity,
    /// Store-wide append order, starting at 0.
    pub sequence: u64,
    pub embedding: Embedding,
}

/// Storage of (identity, embedding) observations for one session.
///
/// Records are only ever appended. Windows hold at most `k` embeddings in
/// recency order: oldest first, most recent last.
pub trait TrackletStore {
    /// Append an embedding under `identity` and return its sequence number.
    fn append(&mut self, identity: Identity, embedding: Embedding) -> Result<u64>;

    /// Last `k` embeddings for `identity`. Empty for an unseen identity.
    fn query_window(&self, identity: Identity, k: usize) -> Result<Vec<Embedding>>;

    /// Last `k` embeddings for every known identity.
    fn query_all_windows(&self, k: usize) -> Result<BTreeMap<Identity, Vec<Embedding>>>;

    /// Total number of records.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Known identities in ascending order.
    fn identities(&self) -> Vec<Identity>;

    /// Number of records stored for `identity`.
    fn history_len(&self, identity: Identity) -> usize;

    /// Embedding dimension fixed by the first append, if any.
    fn dimension(&self) -> Option<usize>;

    /// Release the store at session end.
    fn close(self) -> Result<()>
    where
        Self: Sized,
    {
        drop(self);
        Ok(())
    }
}

impl<S: TrackletStore + ?Sized> TrackletStore for Box<S> {
    fn append(&mut self, identity: Identity, embedding: Embedding) -> Result<u64> {
        (**self).append(identity, embedding)
    }

    fn query_window(&self, identity: Identity, k: usize) -> Result<Vec<Embedding>> {
        (**self).query_window(identity, k)
    }

    fn query_all_windows(&self, k: usize) -> Result<BTreeMap<Identity, Vec<Embedding>>> {
        (**self).query_all_windows(k)
    }

    fn len(&self) -> usize {
        (**self).len()
    }

    fn identities(&self) -> Vec<Identity> {
        (**self).identities()
    }

    fn history_len(&self, identity: Identity) -> usize {
        (**self).history_len(identity)
    }

    fn dimension(&self) -> Option<usize> {
        (**self).dimension()
    }
}

pub(crate) fn check_dimension(expected: Option<usize>, embedding: &Embedding) -> Result<()> {
    match expected {
        Some(expected) if expected != embedding.dim() => Err(ReidError::DimensionMismatch {
            expected,
            got: embedding.dim(),
        }),
        _ => Ok(()),
    }
}

/// Start index of the last `k` items of a sequence of length `len`.
#[inline]
pub(crate) fn window_start(len: usize, k: usize) -> usize {
    len.saturating_sub(k)
}

/// In-memory store keeping the full history of every identity.
#[derive(Debug, Default)]
pub struct MemoryTrackletStore {
    records: HashMap<Identity, Vec<TrackletRecord>>,
    next_sequence: u64,
    dimension: Option<usize>,
}

impl MemoryTrackletStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Full history of `identity` in append order.
    pub fn records(&self, identity: Identity) -> &[TrackletRecord] {
        self.records
            .get(&identity)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    fn window_of(records: &[TrackletRecord], k: usize) -> Vec<Embedding> {
        records[window_start(records.len(), k)..]
            .iter()
            .map(|r| r.embedding.clone())
            .collect()
    }
}

impl TrackletStore for MemoryTrackletStore {
    fn append(&mut self, identity: Identity, embedding: Embedding) -> Result<u64> {
        check_dimension(self.dimension, &embedding)?;
        self.dimension.get_or_insert(embedding.dim());

        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.records.entry(identity).or_default().push(TrackletRecord {
            identity,
            sequence,
            embedding,
        });
        Ok(sequence)
    }

    fn query_window(&self, identity: Identity, k: usize) -> Result<Vec<Embedding>> {
        Ok(Self::window_of(self.records(identity), k))
    }

    fn query_all_windows(&self, k: usize) -> Result<BTreeMap<Identity, Vec<Embedding>>> {
        Ok(self
            .records
            .iter()
            .map(|(&identity, records)| (identity, Self::window_of(records, k)))
            .collect())
    }

    fn len(&self) -> usize {
        self.next_sequence as usize
    }

    fn identities(&self) -> Vec<Identity> {
        let mut ids: Vec<Identity> = self.records.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    fn history_len(&self, identity: Identity) -> usize {
        self.records(identity).len()
    }

    fn dimension(&self) -> Option<usize> {
        self.dimension
    }
}
