mod bbox;
mod config;
mod embedding;
mod error;
mod file_store;
mod identity;
mod ledger;
mod matcher;
mod session;
mod store;

pub use bbox::BoundingBox;
pub use config::{PersistencePolicy, ReidConfig};
pub use embedding::{Embedding, cosine_similarity, mean_cosine_similarity};
pub use error::{ReidError, Result};
pub use file_store::FileTrackletStore;
pub use identity::Identity;
pub use ledger::TrackletLedger;
pub use matcher::{IdentityMatcher, MatchCandidate, Resolution};
pub use session::{ResolvedDetection, Session, SessionStore, SessionSummary, TrackedDetection};
pub use store::{MemoryTrackletStore, TrackletRecord, TrackletStore};
