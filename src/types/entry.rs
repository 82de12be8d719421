//! Votable entry identity
//!
//! Entry kinds are a closed enum: adding a votable class is a compile-time
//! extension, and each kind maps explicitly to the query filter it produces.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::{Result, TallyError};

/// The class of thing a vote targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    /// A top-level discussion thread
    Thread,
    /// A submission posted inside a thread
    Submission,
}

impl EntryKind {
    /// Wire/storage tag for this kind
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Thread => "thread",
            Self::Submission => "submission",
        }
    }

    /// Parse a wire tag
    pub fn parse(tag: &str) -> Result<Self> {
        match tag {
            "thread" => Ok(Self::Thread),
            "submission" => Ok(Self::Submission),
            other => Err(TallyError::BadRequest(format!(
                "Unknown entry kind: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Composite identity of a voted-on entry
///
/// Every tally, rank entry and vote record addresses its entry through this
/// triple. The string forms produced here are the `_id` formats used in
/// MongoDB.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntryRef {
    pub entry_kind: EntryKind,
    pub thread_id: String,
    pub entry_id: String,
}

impl EntryRef {
    pub fn new(
        entry_kind: EntryKind,
        thread_id: impl Into<String>,
        entry_id: impl Into<String>,
    ) -> Self {
        Self {
            entry_kind,
            thread_id: thread_id.into(),
            entry_id: entry_id.into(),
        }
    }

    /// Storage key for the entry's tally document
    /// Format: {kind}:{thread_id}:{entry_id}
    pub fn tally_key(&self) -> String {
        format!("{}:{}:{}", self.entry_kind, self.thread_id, self.entry_id)
    }

    /// Storage key for a rank entry under the given rank key
    /// Format: {kind}:{thread_id}:{rank_key}
    pub fn rank_entry_key(&self, rank_key: &str) -> String {
        format!("{}:{}:{}", self.entry_kind, self.thread_id, rank_key)
    }
}

impl fmt::Display for EntryRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.entry_kind, self.thread_id, self.entry_id)
    }
}
