//! Shell Feature State
//!
//! Snapshot of which features exist for one shell and whether each is
//! enabled. Each record also keeps the dependencies it was enabled with, so
//! features that later leave the desired set are still disabled and
//! uninstalled dependents first.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Recorded state of one feature
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureState {
    /// Feature id
    pub feature_id: String,

    /// Whether the feature is enabled
    pub is_enabled: bool,

    /// Dependencies as of the last reconciliation that desired the feature
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub depends_on: BTreeSet<String>,
}

impl FeatureState {
    /// Create a feature record
    pub fn new(feature_id: impl Into<String>, is_enabled: bool) -> Self {
        Self {
            feature_id: feature_id.into(),
            is_enabled,
            depends_on: BTreeSet::new(),
        }
    }

    /// Record the feature's dependencies
    pub fn with_dependencies<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on = ids.into_iter().map(Into::into).collect();
        self
    }
}

/// Feature snapshot of one shell
///
/// Features keep the order in which they were first recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShellState {
    /// Shell (tenant) id
    pub tenant_id: u64,

    /// Recorded features
    #[serde(default)]
    pub features: Vec<FeatureState>,
}

impl ShellState {
    /// Fresh state of a newly provisioned shell
    pub fn new(tenant_id: u64) -> Self {
        Self {
            tenant_id,
            features: Vec::new(),
        }
    }

    /// Append a feature record
    pub fn with_feature(mut self, feature_id: impl Into<String>, is_enabled: bool) -> Self {
        self.features.push(FeatureState::new(feature_id, is_enabled));
        self
    }

    /// Append a feature record carrying its dependencies
    pub fn with_record(mut self, record: FeatureState) -> Self {
        self.features.push(record);
        self
    }

    /// Find a feature record
    pub fn find(&self, feature_id: &str) -> Option<&FeatureState> {
        self.features.iter().find(|f| f.feature_id == feature_id)
    }

    pub(crate) fn find_mut(&mut self, feature_id: &str) -> Option<&mut FeatureState> {
        self.features.iter_mut().find(|f| f.feature_id == feature_id)
    }

    /// Whether the feature has any record, enabled or not
    pub fn contains(&self, feature_id: &str) -> bool {
        self.find(feature_id).is_some()
    }

    /// Whether the feature is recorded and enabled
    pub fn is_enabled(&self, feature_id: &str) -> bool {
        self.find(feature_id).is_some_and(|f| f.is_enabled)
    }

    /// Ids of enabled features
    pub fn enabled_ids(&self) -> BTreeSet<&str> {
        self.features
            .iter()
            .filter(|f| f.is_enabled)
            .map(|f| f.feature_id.as_str())
            .collect()
    }
}
