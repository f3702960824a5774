//! Per-action override points injected into a service.
//!
//! Both hooks are plain strategy objects; closures implement them too.

use crate::action::Action;
use crate::model::value::{FieldMap, FieldValue};
use std::collections::{BTreeMap, BTreeSet};

/// Derives the filters actually applied to a list query.
pub trait FilterHook {
    fn filters(&self, action: Action, requested: FieldMap) -> FieldMap;
}

/// Selects the relation includes loaded for an action.
pub trait RelationHook {
    fn relations_for(&self, action: Action) -> BTreeSet<String>;
}

/// Applies request filters unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThroughFilters;

impl FilterHook for PassThroughFilters {
    fn filters(&self, _action: Action, requested: FieldMap) -> FieldMap {
        requested
    }
}

/// Adds default filters a request did not supply itself.
#[derive(Debug, Clone, Default)]
pub struct DefaultFilters {
    defaults: FieldMap,
}

impl DefaultFilters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.defaults.insert(name.into(), value.into());
        self
    }
}

impl FilterHook for DefaultFilters {
    fn filters(&self, _action: Action, mut requested: FieldMap) -> FieldMap {
        for (name, value) in &self.defaults {
            requested
                .entry(name.clone())
                .or_insert_with(|| value.clone());
        }
        requested
    }
}

impl<F> FilterHook for F
where
    F: Fn(Action, FieldMap) -> FieldMap,
{
    fn filters(&self, action: Action, requested: FieldMap) -> FieldMap {
        self(action, requested)
    }
}

/// Loads no relations for any action.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRelations;

impl RelationHook for NoRelations {
    fn relations_for(&self, _action: Action) -> BTreeSet<String> {
        BTreeSet::new()
    }
}

/// Fixed relation includes per action.
#[derive(Debug, Clone, Default)]
pub struct ActionRelations {
    by_action: BTreeMap<Action, BTreeSet<String>>,
}

impl ActionRelations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(mut self, action: Action, relations: &[&str]) -> Self {
        self.by_action
            .entry(action)
            .or_default()
            .extend(relations.iter().map(|name| name.to_string()));
        self
    }

    /// Same includes for every action.
    pub fn everywhere(relations: &[&str]) -> Self {
        Action::ALL
            .into_iter()
            .fold(Self::new(), |hook, action| hook.on(action, relations))
    }
}

impl RelationHook for ActionRelations {
    fn relations_for(&self, action: Action) -> BTreeSet<String> {
        self.by_action.get(&action).cloned().unwrap_or_default()
    }
}

impl<F> RelationHook for F
where
    F: Fn(Action) -> BTreeSet<String>,
{
    fn relations_for(&self, action: Action) -> BTreeSet<String> {
        self(action)
    }
}
