//! Feature State Diffing
//!
//! Turns a shell's recorded feature state and a desired feature set into the
//! next state plus an ordered list of lifecycle transitions.
//!
//! Ordering rules:
//!
//! - disables come first, dependents before their dependencies
//! - then each newly enabled feature, dependencies first; a feature never
//!   recorded before gets `Install` immediately followed by `Enable`
//! - ties are broken by feature id, so equal inputs give equal output
//!
//! Disabling never implies uninstalling. A disabled feature stays recorded
//! until [`FeatureStateDiffer::uninstall`] removes it.

use crate::descriptor::FeatureDescriptor;
use crate::error::FeatureError;
use crate::state::{FeatureState, ShellState};
use crate::transition::Transition;
use std::collections::{BTreeMap, BTreeSet};
use trellis_log::{debug, error, trace};

/// Outcome of a successful diff
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    /// State to persist once every transition has been applied
    pub state: ShellState,

    /// Transitions in the order they must be applied
    pub transitions: Vec<Transition>,
}

impl Reconciliation {
    /// Whether nothing changes
    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }
}

/// Pure feature-state diffing
///
/// Features that are no longer desired are ordered by the dependencies
/// recorded in the shell state. The optional catalog overrides those records
/// for the features it knows; desired descriptors always take precedence.
#[derive(Debug, Clone, Default)]
pub struct FeatureStateDiffer {
    catalog: BTreeMap<String, FeatureDescriptor>,
}

impl FeatureStateDiffer {
    /// Create a differ with an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a differ knowing `features`
    pub fn with_catalog<I>(features: I) -> Result<Self, FeatureError>
    where
        I: IntoIterator<Item = FeatureDescriptor>,
    {
        let mut differ = Self::new();
        for feature in features {
            differ.register(feature)?;
        }
        Ok(differ)
    }

    /// Add a descriptor to the catalog
    ///
    /// Registering an identical descriptor twice is a no-op; a different
    /// descriptor under the same id is [`FeatureError::DuplicateFeature`].
    pub fn register(&mut self, feature: FeatureDescriptor) -> Result<(), FeatureError> {
        match self.catalog.get(&feature.id) {
            Some(existing) if *existing != feature => Err(FeatureError::DuplicateFeature(feature.id)),
            Some(_) => Ok(()),
            None => {
                self.catalog.insert(feature.id.clone(), feature);
                Ok(())
            }
        }
    }

    /// Catalog entry for `id`
    pub fn descriptor(&self, id: &str) -> Option<&FeatureDescriptor> {
        self.catalog.get(id)
    }

    /// Diff `previous` against `desired`.
    ///
    /// # Examples
    ///
    /// ```
    /// use trellis_features::{FeatureDescriptor, FeatureStateDiffer, ShellState, Transition};
    ///
    /// let previous = ShellState::new(1).with_feature("Blog", true);
    /// let desired = [
    ///     FeatureDescriptor::new("Blog"),
    ///     FeatureDescriptor::new("Comments").with_dependency("Blog"),
    /// ];
    ///
    /// let result = FeatureStateDiffer::new().reconcile(&previous, &desired).unwrap();
    /// assert_eq!(
    ///     result.transitions,
    ///     vec![Transition::install("Comments"), Transition::enable("Comments")]
    /// );
    /// ```
    ///
    /// # Errors
    ///
    /// Returned before any transition is computed:
    ///
    /// - [`FeatureError::DuplicateFeature`] for conflicting descriptors
    /// - [`FeatureError::MissingDependency`] when a desired feature depends
    ///   on one that is not desired
    /// - [`FeatureError::DependencyCycle`] naming the cycle
    pub fn reconcile(
        &self,
        previous: &ShellState,
        desired: &[FeatureDescriptor],
    ) -> Result<Reconciliation, FeatureError> {
        let wanted = index_desired(desired)?;
        for feature in wanted.values() {
            if let Some(dependency) = feature
                .depends_on
                .iter()
                .find(|dep| !wanted.contains_key(dep.as_str()))
            {
                return Err(FeatureError::MissingDependency {
                    feature: feature.id.clone(),
                    dependency: dependency.clone(),
                });
            }
        }

        let mut graph: BTreeMap<&str, BTreeSet<&str>> = wanted
            .iter()
            .map(|(id, feature)| (*id, feature.depends_on.iter().map(String::as_str).collect()))
            .collect();
        for record in &previous.features {
            let id = record.feature_id.as_str();
            if !graph.contains_key(id) {
                graph.insert(id, self.dependencies_of(record));
            }
        }
        let order = topological_order(&graph)?;

        let enabled = previous.enabled_ids();
        let mut state = previous.clone();
        let mut transitions = Vec::new();

        for id in order.iter().rev() {
            if enabled.contains(id) && !wanted.contains_key(id) {
                if let Some(record) = state.find_mut(id) {
                    record.is_enabled = false;
                }
                transitions.push(Transition::disable(*id));
            }
        }

        for id in &order {
            let Some(feature) = wanted.get(id) else {
                continue;
            };
            match state.find_mut(id) {
                Some(record) => {
                    record.depends_on.clone_from(&feature.depends_on);
                    if enabled.contains(id) {
                        continue;
                    }
                    record.is_enabled = true;
                }
                None => {
                    state.features.push(
                        FeatureState::new(*id, true).with_dependencies(feature.depends_on.iter().cloned()),
                    );
                    transitions.push(Transition::install(*id));
                }
            }
            transitions.push(Transition::enable(*id));
        }

        debug!(
            tenant_id = previous.tenant_id,
            desired = wanted.len(),
            transitions = transitions.len(),
            "reconciled feature state"
        );
        Ok(Reconciliation { state, transitions })
    }

    /// Remove recorded, disabled features.
    ///
    /// Emits `Uninstall` for each, dependents before their dependencies.
    ///
    /// # Errors
    ///
    /// - [`FeatureError::NotInstalled`] for a feature with no record
    /// - [`FeatureError::StillEnabled`] for an enabled feature
    pub fn uninstall(&self, previous: &ShellState, features: &[&str]) -> Result<Reconciliation, FeatureError> {
        let mut targets: BTreeSet<&str> = BTreeSet::new();
        for &id in features {
            match previous.find(id) {
                None => return Err(FeatureError::NotInstalled(id.to_string())),
                Some(record) if record.is_enabled => {
                    return Err(FeatureError::StillEnabled(id.to_string()));
                }
                Some(_) => {
                    targets.insert(id);
                }
            }
        }

        let graph: BTreeMap<&str, BTreeSet<&str>> = previous
            .features
            .iter()
            .map(|record| (record.feature_id.as_str(), self.dependencies_of(record)))
            .collect();
        let order = topological_order(&graph)?;

        let transitions: Vec<Transition> = order
            .iter()
            .rev()
            .filter(|id| targets.contains(**id))
            .map(|id| Transition::uninstall(*id))
            .collect();

        let mut state = previous.clone();
        state
            .features
            .retain(|record| !targets.contains(record.feature_id.as_str()));

        debug!(
            tenant_id = previous.tenant_id,
            uninstalled = transitions.len(),
            "computed feature uninstall"
        );
        Ok(Reconciliation { state, transitions })
    }

    fn dependencies_of<'a>(&'a self, record: &'a FeatureState) -> BTreeSet<&'a str> {
        let depends_on = match self.catalog.get(&record.feature_id) {
            Some(feature) => &feature.depends_on,
            None => &record.depends_on,
        };
        depends_on.iter().map(String::as_str).collect()
    }
}

fn index_desired(desired: &[FeatureDescriptor]) -> Result<BTreeMap<&str, &FeatureDescriptor>, FeatureError> {
    let mut wanted = BTreeMap::new();
    for feature in desired {
        if let Some(existing) = wanted.insert(feature.id.as_str(), feature)
            && existing != feature
        {
            return Err(FeatureError::DuplicateFeature(feature.id.clone()));
        }
    }
    Ok(wanted)
}

/// Dependencies-first order of `graph`, ties broken by id.
///
/// Dependencies outside the graph are ignored.
fn topological_order<'a>(graph: &BTreeMap<&'a str, BTreeSet<&'a str>>) -> Result<Vec<&'a str>, FeatureError> {
    let mut pending: BTreeMap<&'a str, usize> = BTreeMap::new();
    let mut dependents: BTreeMap<&'a str, Vec<&'a str>> = BTreeMap::new();

    for (&id, deps) in graph {
        let known: Vec<&'a str> = deps
            .iter()
            .copied()
            .filter(|dep| graph.contains_key(dep))
            .collect();
        pending.insert(id, known.len());
        for dep in known {
            dependents.entry(dep).or_default().push(id);
        }
    }

    let mut ready: BTreeSet<&'a str> = pending
        .iter()
        .filter(|(_, count)| **count == 0)
        .map(|(id, _)| *id)
        .collect();
    let mut order = Vec::with_capacity(graph.len());

    while let Some(id) = ready.pop_first() {
        trace!(feature = id, "feature ordered");
        order.push(id);
        for &dependent in dependents.get(id).into_iter().flatten() {
            if let Some(count) = pending.get_mut(dependent) {
                *count -= 1;
                if *count == 0 {
                    ready.insert(dependent);
                }
            }
        }
    }

    if order.len() < graph.len() {
        let cycle = find_cycle(graph, &order);
        error!(cycle = ?cycle, "feature dependency cycle");
        return Err(FeatureError::DependencyCycle(cycle));
    }
    Ok(order)
}

// Every node left unordered has at least one unordered dependency, so
// following them from any such node must revisit one.
fn find_cycle<'a>(graph: &BTreeMap<&'a str, BTreeSet<&'a str>>, ordered: &[&'a str]) -> Vec<String> {
    let done: BTreeSet<&str> = ordered.iter().copied().collect();
    let blocked = |id: &str| graph.contains_key(id) && !done.contains(id);

    let Some(mut current) = graph.keys().copied().find(|id| blocked(*id)) else {
        return Vec::new();
    };
    let mut path: Vec<&str> = Vec::new();

    loop {
        if let Some(start) = path.iter().position(|id| *id == current) {
            let mut cycle: Vec<String> = path[start..].iter().map(|id| id.to_string()).collect();
            cycle.push(current.to_string());
            return cycle;
        }
        path.push(current);

        let next = graph
            .get(current)
            .and_then(|deps| deps.iter().copied().find(|dep| blocked(*dep)));
        match next {
            Some(next) => current = next,
            None => return path.iter().map(|id| id.to_string()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transition::TransitionKind;

    fn feature(id: &str) -> FeatureDescriptor {
        FeatureDescriptor::new(id)
    }

    fn position(transitions: &[Transition], kind: TransitionKind, id: &str) -> usize {
        transitions
            .iter()
            .position(|t| t.kind == kind && t.feature_id == id)
            .unwrap()
    }

    #[test]
    fn test_blog_comments_example() {
        let previous = ShellState::new(1).with_feature("Blog", true);
        let desired = [feature("Blog"), feature("Comments").with_dependency("Blog")];

        let result = FeatureStateDiffer::new().reconcile(&previous, &desired).unwrap();

        assert_eq!(
            result.transitions,
            vec![Transition::install("Comments"), Transition::enable("Comments")]
        );
        assert_eq!(
            result.state,
            ShellState::new(1)
                .with_feature("Blog", true)
                .with_record(FeatureState::new("Comments", true).with_dependencies(["Blog"]))
        );
    }

    #[test]
    fn test_new_dependency_is_installed_and_enabled_first() {
        // "Alpha" sorts first but depends on "Zeta"
        let desired = [feature("Alpha").with_dependency("Zeta"), feature("Zeta")];
        let result = FeatureStateDiffer::new()
            .reconcile(&ShellState::new(1), &desired)
            .unwrap();

        assert_eq!(
            result.transitions,
            vec![
                Transition::install("Zeta"),
                Transition::enable("Zeta"),
                Transition::install("Alpha"),
                Transition::enable("Alpha"),
            ]
        );
        let ids: Vec<&str> = result.state.features.iter().map(|f| f.feature_id.as_str()).collect();
        assert_eq!(ids, vec!["Zeta", "Alpha"]);
    }

    #[test]
    fn test_dependents_are_disabled_first() {
        let differ = FeatureStateDiffer::with_catalog([
            feature("Storage"),
            feature("Analytics").with_dependency("Storage"),
        ])
        .unwrap();
        let previous = ShellState::new(1)
            .with_feature("Storage", true)
            .with_feature("Analytics", true);

        let result = differ.reconcile(&previous, &[]).unwrap();

        assert_eq!(
            result.transitions,
            vec![Transition::disable("Analytics"), Transition::disable("Storage")]
        );
        assert!(result.state.features.iter().all(|f| !f.is_enabled));
        assert_eq!(result.state.features.len(), 2);
    }

    #[test]
    fn test_recorded_dependencies_order_disables_without_catalog() {
        let differ = FeatureStateDiffer::new();
        let desired = [feature("Storage"), feature("Analytics").with_dependency("Storage")];

        let enabled = differ.reconcile(&ShellState::new(1), &desired).unwrap();
        assert_eq!(
            enabled.state.find("Analytics").unwrap().depends_on,
            BTreeSet::from(["Storage".to_string()])
        );

        let removed = differ.reconcile(&enabled.state, &[]).unwrap();
        assert_eq!(
            removed.transitions,
            vec![Transition::disable("Analytics"), Transition::disable("Storage")]
        );

        let uninstalled = differ
            .uninstall(&removed.state, &["Storage", "Analytics"])
            .unwrap();
        assert_eq!(
            uninstalled.transitions,
            vec![Transition::uninstall("Analytics"), Transition::uninstall("Storage")]
        );
    }

    #[test]
    fn test_recorded_dependencies_follow_desired_descriptor() {
        let previous = ShellState::new(1)
            .with_feature("Media", true)
            .with_record(FeatureState::new("Blog", true).with_dependencies(["Media"]));

        let result = FeatureStateDiffer::new()
            .reconcile(&previous, &[feature("Blog")])
            .unwrap();

        assert_eq!(result.transitions, vec![Transition::disable("Media")]);
        assert!(result.state.find("Blog").unwrap().depends_on.is_empty());
    }

    #[test]
    fn test_catalog_overrides_recorded_dependencies() {
        let differ = FeatureStateDiffer::with_catalog([
            feature("Zeta").with_dependency("Alpha"),
            feature("Alpha"),
        ])
        .unwrap();
        let previous = ShellState::new(1)
            .with_feature("Alpha", true)
            .with_feature("Zeta", true);

        let result = differ.reconcile(&previous, &[]).unwrap();
        assert_eq!(
            result.transitions,
            vec![Transition::disable("Zeta"), Transition::disable("Alpha")]
        );
    }

    #[test]
    fn test_disabled_feature_is_only_enabled() {
        let previous = ShellState::new(1).with_feature("Blog", false);
        let result = FeatureStateDiffer::new()
            .reconcile(&previous, &[feature("Blog")])
            .unwrap();

        assert_eq!(result.transitions, vec![Transition::enable("Blog")]);
        assert!(result.state.is_enabled("Blog"));
    }

    #[test]
    fn test_disable_never_uninstalls() {
        let previous = ShellState::new(1).with_feature("Blog", true);
        let result = FeatureStateDiffer::new().reconcile(&previous, &[]).unwrap();

        assert_eq!(result.transitions, vec![Transition::disable("Blog")]);
        assert!(result.state.contains("Blog"));
        assert!(
            result
                .transitions
                .iter()
                .all(|t| t.kind != TransitionKind::Uninstall)
        );
    }

    #[test]
    fn test_unchanged_state_has_no_transitions() {
        let previous = ShellState::new(1).with_feature("Blog", true);
        let result = FeatureStateDiffer::new()
            .reconcile(&previous, &[feature("Blog")])
            .unwrap();

        assert!(result.is_empty());
        assert_eq!(result.state, previous);
    }

    #[test]
    fn test_cycle_is_rejected() {
        let desired = [feature("F").with_dependency("G"), feature("G").with_dependency("F")];
        let err = FeatureStateDiffer::new()
            .reconcile(&ShellState::new(1), &desired)
            .unwrap_err();

        match err {
            FeatureError::DependencyCycle(cycle) => {
                assert_eq!(cycle, vec!["F".to_string(), "G".to_string(), "F".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_cycle_behind_acyclic_prefix() {
        let desired = [
            feature("A").with_dependency("B"),
            feature("B").with_dependency("C"),
            feature("C").with_dependency("D"),
            feature("D").with_dependency("C"),
        ];
        let err = FeatureStateDiffer::new()
            .reconcile(&ShellState::new(1), &desired)
            .unwrap_err();

        assert!(matches!(
            err,
            FeatureError::DependencyCycle(ref cycle) if cycle == &["C", "D", "C"]
        ));
    }

    #[test]
    fn test_self_dependency_is_a_cycle() {
        let desired = [feature("Loop").with_dependency("Loop")];
        let result = FeatureStateDiffer::new().reconcile(&ShellState::new(1), &desired);
        assert!(matches!(result, Err(FeatureError::DependencyCycle(_))));
    }

    #[test]
    fn test_missing_dependency() {
        let desired = [feature("Comments").with_dependency("Blog")];
        let err = FeatureStateDiffer::new()
            .reconcile(&ShellState::new(1).with_feature("Blog", true), &desired)
            .unwrap_err();

        assert!(matches!(
            err,
            FeatureError::MissingDependency { ref feature, ref dependency }
                if feature == "Comments" && dependency == "Blog"
        ));
        assert!(err.is_configuration_error());
    }

    #[test]
    fn test_conflicting_duplicates() {
        let desired = [feature("Blog"), feature("Blog").with_dependency("Media")];
        let result = FeatureStateDiffer::new().reconcile(&ShellState::new(1), &desired);
        assert!(matches!(result, Err(FeatureError::DuplicateFeature(id)) if id == "Blog"));

        let same = [feature("Blog"), feature("Blog")];
        let result = FeatureStateDiffer::new()
            .reconcile(&ShellState::new(1), &same)
            .unwrap();
        assert_eq!(result.transitions.len(), 2);
    }

    #[test]
    fn test_diamond_and_determinism() {
        let desired = vec![
            feature("Top").with_dependencies(["Left", "Right"]),
            feature("Left").with_dependency("Base"),
            feature("Right").with_dependency("Base"),
            feature("Base"),
        ];
        let mut reversed = desired.clone();
        reversed.reverse();

        let differ = FeatureStateDiffer::new();
        let a = differ.reconcile(&ShellState::new(1), &desired).unwrap();
        let b = differ.reconcile(&ShellState::new(1), &reversed).unwrap();
        assert_eq!(a, b);

        let t = &a.transitions;
        assert!(position(t, TransitionKind::Enable, "Base") < position(t, TransitionKind::Install, "Left"));
        assert!(position(t, TransitionKind::Enable, "Base") < position(t, TransitionKind::Install, "Right"));
        assert!(position(t, TransitionKind::Enable, "Left") < position(t, TransitionKind::Install, "Top"));
        assert!(position(t, TransitionKind::Enable, "Right") < position(t, TransitionKind::Install, "Top"));
    }

    #[test]
    fn test_mixed_disable_and_enable() {
        let differ = FeatureStateDiffer::with_catalog([feature("Legacy")]).unwrap();
        let previous = ShellState::new(1)
            .with_feature("Legacy", true)
            .with_feature("Blog", false);

        let result = differ.reconcile(&previous, &[feature("Blog")]).unwrap();
        assert_eq!(
            result.transitions,
            vec![Transition::disable("Legacy"), Transition::enable("Blog")]
        );
    }

    #[test]
    fn test_catalog_rejects_conflicting_descriptor() {
        let mut differ = FeatureStateDiffer::new();
        differ.register(feature("Blog")).unwrap();
        differ.register(feature("Blog")).unwrap();

        let result = differ.register(feature("Blog").with_dependency("Media"));
        assert!(matches!(result, Err(FeatureError::DuplicateFeature(_))));
        assert!(differ.descriptor("Blog").unwrap().depends_on.is_empty());
    }

    #[test]
    fn test_uninstall_dependents_first() {
        let differ = FeatureStateDiffer::with_catalog([
            feature("Storage"),
            feature("Analytics").with_dependency("Storage"),
        ])
        .unwrap();
        let previous = ShellState::new(1)
            .with_feature("Storage", false)
            .with_feature("Analytics", false)
            .with_feature("Blog", true);

        let result = differ.uninstall(&previous, &["Storage", "Analytics"]).unwrap();

        assert_eq!(
            result.transitions,
            vec![Transition::uninstall("Analytics"), Transition::uninstall("Storage")]
        );
        assert_eq!(result.state, ShellState::new(1).with_feature("Blog", true));
    }

    #[test]
    fn test_uninstall_rejects_enabled_and_unknown() {
        let differ = FeatureStateDiffer::new();
        let previous = ShellState::new(1).with_feature("Blog", true);

        assert!(matches!(
            differ.uninstall(&previous, &["Blog"]),
            Err(FeatureError::StillEnabled(id)) if id == "Blog"
        ));
        assert!(matches!(
            differ.uninstall(&previous, &["Media"]),
            Err(FeatureError::NotInstalled(id)) if id == "Media"
        ));
    }
}
