//! Core data types for texel records and projects.

use serde::{Deserialize, Serialize};

/// The subset of a texel that identifies it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TexelId {
    /// Locale independent file identifier, see [`crate::files::FileCodec::path_to_domain`]
    pub domain: String,

    /// Dot-joined path of keys inside the file
    pub key: String,

    /// Locale code, e.g. "en" or "de"
    pub locale: String,
}

/// The most basic text element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Texel {
    pub domain: String,
    pub key: String,
    pub locale: String,

    /// `None` is a tombstone: the entry is deleted.
    #[serde(default)]
    pub value: Option<String>,
}

impl Texel {
    /// Create a texel with a value.
    pub fn new(domain: impl Into<String>, key: impl Into<String>, locale: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            key: key.into(),
            locale: locale.into(),
            value: Some(value.into()),
        }
    }

    /// Create a tombstone that deletes the entry with the given identity.
    pub fn tombstone(domain: impl Into<String>, key: impl Into<String>, locale: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            key: key.into(),
            locale: locale.into(),
            value: None,
        }
    }

    /// The identity triple of this texel.
    pub fn id(&self) -> TexelId {
        TexelId {
            domain: self.domain.clone(),
            key: self.key.clone(),
            locale: self.locale.clone(),
        }
    }

    /// Returns true if both texels describe the same entry, ignoring the value.
    pub fn same_id(&self, other: &Texel) -> bool {
        self.key == other.key && self.domain == other.domain && self.locale == other.locale
    }

    /// Returns true if this texel marks a deletion.
    pub fn is_tombstone(&self) -> bool {
        self.value.is_none()
    }
}

/// An abstraction over "repository" and "branches".
///
/// Ids are opaque to everything but the driver that issued them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<Box<Project>>,

    /// Leaf projects can be listed and updated, others only contain projects.
    pub leaf: bool,
}

impl Project {
    /// Create a leaf project without a parent.
    pub fn leaf(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            parent: None,
            leaf: true,
        }
    }

    /// Create a container project without a parent.
    pub fn container(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            parent: None,
            leaf: false,
        }
    }

    /// Attach a parent project.
    pub fn with_parent(mut self, parent: Project) -> Self {
        self.parent = Some(Box::new(parent));
        self
    }
}
