//! The message handed to the dispatch layer, and the key it is deduplicated by

use std::{
    fmt::{self, Display},
    sync::Arc,
};

use serde::{Deserialize, Serialize};

/// An outbound message
///
/// The dispatch layer never inspects the content beyond deriving an
/// [`IdentityKey`] from it; the fields are passed through to whichever
/// backend ends up delivering it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Message {
    /// Destination address
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl Message {
    #[must_use]
    pub fn new(to: impl Into<String>, subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            subject: subject.into(),
            body: body.into(),
        }
    }
}

/// Identity of a message for deduplication purposes
///
/// Two messages with the same key are treated as the same submission. This
/// is a plain derived string, not a digest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct IdentityKey(Arc<str>);

impl IdentityKey {
    #[must_use]
    pub fn new(s: impl Into<Arc<str>>) -> Self {
        Self(s.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for IdentityKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<String> for IdentityKey {
    fn from(s: String) -> Self {
        Self(Arc::from(s))
    }
}

impl From<&str> for IdentityKey {
    fn from(s: &str) -> Self {
        Self(Arc::from(s))
    }
}
