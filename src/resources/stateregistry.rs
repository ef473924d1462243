//! Shared registry of live flow states.
//!
//! Every [`FlowController`](crate::components::flowcontroller::FlowController)
//! registers the states it builds here, scoped by its [`OwnerTag`]. All
//! lookups go through an owner, so two controllers may both own an `"idle"`
//! state without seeing each other's, and a rebuild only unregisters the
//! states of the controller being rebuilt.
//!
//! Transitions consult the registry through a [`RegistryView`] to decide
//! whether their target still exists; a target that is gone makes the
//! transition dormant rather than failing.

use std::fmt;

use bevy_ecs::prelude::Resource;
use log::debug;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::components::flowstate::FlowState;

/// Identifies the controller that owns a group of registered states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OwnerTag(pub u64);

impl fmt::Display for OwnerTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "owner#{}", self.0)
    }
}

/// States registered by a single owner, in registration order.
#[derive(Debug, Default, Clone)]
struct RegistryScope {
    states: FxHashMap<String, FlowState>,
    order: Vec<String>,
}

/// Owner-scoped mapping from state id to state.
///
/// Within one owner an id maps to at most one state; registering the same id
/// again silently replaces the previous state and keeps its original
/// position in the registration order.
#[derive(Resource, Debug, Default, Clone)]
pub struct StateRegistry {
    scopes: FxHashMap<OwnerTag, RegistryScope>,
    next_owner: u64,
}

impl StateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand out an owner tag that no other caller of this registry holds.
    pub fn allocate_owner(&mut self) -> OwnerTag {
        self.next_owner += 1;
        OwnerTag(self.next_owner)
    }

    /// Register `state` under `owner`, returning the state it replaced.
    pub fn register(&mut self, owner: OwnerTag, state: FlowState) -> Option<FlowState> {
        let scope = self.scopes.entry(owner).or_default();
        let id = state.id.clone();
        let replaced = scope.states.insert(id.clone(), state);
        if replaced.is_none() {
            scope.order.push(id);
        } else {
            debug!("{}: replaced registered state '{}'", owner, id);
        }
        replaced
    }

    pub fn unregister(&mut self, owner: OwnerTag, id: &str) -> Option<FlowState> {
        let scope = self.scopes.get_mut(&owner)?;
        let removed = scope.states.remove(id)?;
        scope.order.retain(|registered| registered != id);
        if scope.states.is_empty() {
            self.scopes.remove(&owner);
        }
        Some(removed)
    }

    /// Drop every state registered by `owner`. Returns how many were removed.
    pub fn unregister_owner(&mut self, owner: OwnerTag) -> usize {
        let removed = self
            .scopes
            .remove(&owner)
            .map(|scope| scope.states.len())
            .unwrap_or(0);
        if removed > 0 {
            debug!("{}: unregistered {} states", owner, removed);
        }
        removed
    }

    pub fn get(&self, owner: OwnerTag, id: &str) -> Option<&FlowState> {
        if id.is_empty() {
            return None;
        }
        self.scopes.get(&owner)?.states.get(id)
    }

    pub fn get_mut(&mut self, owner: OwnerTag, id: &str) -> Option<&mut FlowState> {
        self.scopes.get_mut(&owner)?.states.get_mut(id)
    }

    pub fn contains(&self, owner: OwnerTag, id: &str) -> bool {
        self.get(owner, id).is_some()
    }

    /// Ids registered by `owner`, in registration order.
    pub fn state_ids(&self, owner: OwnerTag) -> Vec<String> {
        self.scopes
            .get(&owner)
            .map(|scope| scope.order.clone())
            .unwrap_or_default()
    }

    /// States registered by `owner`, in registration order.
    pub fn states(&self, owner: OwnerTag) -> Vec<&FlowState> {
        let Some(scope) = self.scopes.get(&owner) else {
            return Vec::new();
        };
        scope
            .order
            .iter()
            .filter_map(|id| scope.states.get(id))
            .collect()
    }

    pub fn first_registered(&self, owner: OwnerTag) -> Option<&str> {
        self.scopes
            .get(&owner)?
            .order
            .first()
            .map(String::as_str)
    }

    /// Number of states registered by `owner`.
    pub fn len(&self, owner: OwnerTag) -> usize {
        self.scopes
            .get(&owner)
            .map(|scope| scope.states.len())
            .unwrap_or(0)
    }

    /// Total number of registered states across all owners.
    pub fn total_len(&self) -> usize {
        self.scopes.values().map(|scope| scope.states.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    /// Lookups restricted to `owner`.
    pub fn view(&self, owner: OwnerTag) -> RegistryView<'_> {
        RegistryView {
            registry: self,
            owner,
        }
    }
}

/// Read-only registry access scoped to one owner.
#[derive(Clone, Copy)]
pub struct RegistryView<'a> {
    registry: &'a StateRegistry,
    owner: OwnerTag,
}

impl<'a> RegistryView<'a> {
    pub fn owner(&self) -> OwnerTag {
        self.owner
    }

    pub fn contains(&self, id: &str) -> bool {
        self.registry.contains(self.owner, id)
    }

    pub fn get(&self, id: &str) -> Option<&'a FlowState> {
        self.registry.get(self.owner, id)
    }
}
