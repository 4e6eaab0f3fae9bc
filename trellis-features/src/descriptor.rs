//! Feature Descriptors
//!
//! Identity and dependencies of an optional feature module.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// An optional feature and the features it depends on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureDescriptor {
    /// Unique feature id
    pub id: String,

    /// Ids of the features this one depends on
    #[serde(default)]
    pub depends_on: BTreeSet<String>,
}

impl FeatureDescriptor {
    /// Create a feature without dependencies
    ///
    /// # Examples
    ///
    /// ```
    /// use trellis_features::FeatureDescriptor;
    ///
    /// let comments = FeatureDescriptor::new("Comments").with_dependency("Blog");
    /// assert!(comments.depends("Blog"));
    /// ```
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            depends_on: BTreeSet::new(),
        }
    }

    /// Add a dependency
    pub fn with_dependency(mut self, id: impl Into<String>) -> Self {
        self.depends_on.insert(id.into());
        self
    }

    /// Add several dependencies
    pub fn with_dependencies<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on.extend(ids.into_iter().map(Into::into));
        self
    }

    /// Whether this feature depends directly on `id`
    pub fn depends(&self, id: &str) -> bool {
        self.depends_on.contains(id)
    }
}
