//! Documents and their identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque, stable identifier of a page in the corpus.
///
/// Confluence page ids are numeric, but the search API returns them as strings,
/// so ids are kept as text. Configuration files may spell them either way:
///
/// ```
/// use pagechat::document::DocId;
///
/// let ids: Vec<DocId> = serde_yaml::from_str("[9535489, \"9601025\"]").unwrap();
/// assert_eq!(ids[0], DocId::from(9535489u64));
/// assert_eq!(ids[1].as_str(), "9601025");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "RawDocId", into = "String")]
pub struct DocId(String);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawDocId {
    Number(u64),
    Text(String),
}

impl From<RawDocId> for DocId {
    fn from(raw: RawDocId) -> Self {
        match raw {
            RawDocId::Number(n) => DocId::from(n),
            RawDocId::Text(s) => DocId(s),
        }
    }
}

impl DocId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<u64> for DocId {
    fn from(id: u64) -> Self {
        DocId(id.to_string())
    }
}

impl From<&str> for DocId {
    fn from(id: &str) -> Self {
        DocId(id.to_string())
    }
}

impl From<String> for DocId {
    fn from(id: String) -> Self {
        DocId(id)
    }
}

impl From<DocId> for String {
    fn from(id: DocId) -> Self {
        id.0
    }
}

impl fmt::Display for DocId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A page's raw content, immutable once indexed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub id: DocId,
    pub text: String,
}

impl Document {
    pub fn new(id: impl Into<DocId>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
        }
    }

    /// Whether the document has anything worth embedding.
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}
