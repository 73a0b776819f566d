use std::fmt;

use serde::{Deserialize, Serialize};

/// Session-unique label for a tracked subject.
///
/// Raw tracker ids and resolved ids share this type. Ordering is numeric and is
/// what breaks exact ties between equally similar candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(pub u64);

impl Identity {
    #[inline]
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    #[inline]
    pub fn value(self) -> u64 {
        self.0
    }
}

impl From<u64> for Identity {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
