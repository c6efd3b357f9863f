use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identifier returned by the object store for a stored byte sequence.
///
/// A handle is only meaningful after the write that produced it returned
/// successfully. The empty handle stands for "no blob" (e.g. the result of a
/// failed conversion).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlobHandle(String);

impl BlobHandle {
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    pub fn empty() -> Self {
        Self(String::new())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for BlobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for BlobHandle {
    fn from(handle: String) -> Self {
        Self(handle)
    }
}

impl From<&str> for BlobHandle {
    fn from(handle: &str) -> Self {
        Self(handle.to_string())
    }
}

impl AsRef<str> for BlobHandle {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
