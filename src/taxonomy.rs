//! Ticket classification taxonomy
//!
//! A three-level tree, Type -> Group -> Subgroup, owned by the
//! [`TaxonomyStore`]. Every mutation persists the whole tree to durable
//! storage and then broadcasts the new snapshot, so cascading dropdowns,
//! log filters, and the admin editor all converge on the same view no
//! matter which of them performed the edit.

use crate::bus::{ChangeBus, Subscription};
use crate::storage::KeyValueStore;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

/// Storage key for the serialized tree.
pub const TAXONOMY_KEY: &str = "deskline.taxonomy";

/// Local validation failure. The tree is never left partially mutated:
/// any error means the operation was a no-op.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaxonomyError {
    #[error("name must not be blank")]
    BlankName,
    #[error("name already exists: {0}")]
    AlreadyExists(String),
    #[error("unknown type: {0}")]
    UnknownType(String),
    #[error("unknown group: {0}/{1}")]
    UnknownGroup(String, String),
    #[error("subgroup already exists: {0}")]
    DuplicateSubgroup(String),
}

type GroupMap = BTreeMap<String, Vec<String>>;

/// The Type -> Group -> Subgroup tree.
///
/// Types and groups are ordered map keys; subgroups are an ordered list
/// unique within their group. Renames move the whole subtree atomically
/// and deletes cascade.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaxonomyTree {
    types: BTreeMap<String, GroupMap>,
}

impl TaxonomyTree {
    /// The tree used on first run, before any admin edit.
    pub fn default_tree() -> Self {
        let mut tree = Self::default();
        for (ty, groups) in [
            ("Hardware", vec![("Desktop", vec!["Setup", "Repair"]), ("Printer", vec!["Toner", "Jam"])]),
            ("Software", vec![("Office", vec!["Install", "License"]), ("Email", vec![])]),
            ("Network", vec![("Wifi", vec![]), ("VPN", vec![])]),
        ] {
            tree.types.insert(
                ty.into(),
                groups
                    .into_iter()
                    .map(|(g, subs)| (g.into(), subs.into_iter().map(String::from).collect()))
                    .collect(),
            );
        }
        tree
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }

    pub fn contains_type(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    pub fn groups(&self, ty: &str) -> Option<&GroupMap> {
        self.types.get(ty)
    }

    pub fn subgroups(&self, ty: &str, group: &str) -> Option<&[String]> {
        self.types.get(ty)?.get(group).map(Vec::as_slice)
    }

    fn checked_name(name: &str) -> Result<String, TaxonomyError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(TaxonomyError::BlankName);
        }
        Ok(name.to_string())
    }

    pub fn add_type(&mut self, name: &str) -> Result<(), TaxonomyError> {
        let name = Self::checked_name(name)?;
        if self.types.contains_key(&name) {
            return Err(TaxonomyError::AlreadyExists(name));
        }
        self.types.insert(name, GroupMap::new());
        Ok(())
    }

    /// Move every group and subgroup under `new_name` and drop `old_name`
    /// in one update; there is never a window where both keys hold live
    /// children. Renaming a type to itself is a no-op.
    pub fn rename_type(&mut self, old_name: &str, new_name: &str) -> Result<(), TaxonomyError> {
        let new_name = Self::checked_name(new_name)?;
        if old_name == new_name {
            return Ok(());
        }
        if self.types.contains_key(&new_name) {
            return Err(TaxonomyError::AlreadyExists(new_name));
        }
        let groups = self
            .types
            .remove(old_name)
            .ok_or_else(|| TaxonomyError::UnknownType(old_name.into()))?;
        self.types.insert(new_name, groups);
        Ok(())
    }

    /// Remove a type and cascade to all its groups and subgroups.
    pub fn delete_type(&mut self, name: &str) -> Result<(), TaxonomyError> {
        self.types
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| TaxonomyError::UnknownType(name.into()))
    }

    pub fn add_group(&mut self, ty: &str, name: &str) -> Result<(), TaxonomyError> {
        let name = Self::checked_name(name)?;
        let groups = self
            .types
            .get_mut(ty)
            .ok_or_else(|| TaxonomyError::UnknownType(ty.into()))?;
        if groups.contains_key(&name) {
            return Err(TaxonomyError::AlreadyExists(name));
        }
        groups.insert(name, Vec::new());
        Ok(())
    }

    /// Same contract as [`rename_type`](Self::rename_type), one level down;
    /// the subgroup list follows the group to its new name.
    pub fn rename_group(&mut self, ty: &str, old_name: &str, new_name: &str) -> Result<(), TaxonomyError> {
        let new_name = Self::checked_name(new_name)?;
        if old_name == new_name {
            return Ok(());
        }
        let groups = self
            .types
            .get_mut(ty)
            .ok_or_else(|| TaxonomyError::UnknownType(ty.into()))?;
        if groups.contains_key(&new_name) {
            return Err(TaxonomyError::AlreadyExists(new_name));
        }
        let subgroups = groups
            .remove(old_name)
            .ok_or_else(|| TaxonomyError::UnknownGroup(ty.into(), old_name.into()))?;
        groups.insert(new_name, subgroups);
        Ok(())
    }

    pub fn delete_group(&mut self, ty: &str, name: &str) -> Result<(), TaxonomyError> {
        let groups = self
            .types
            .get_mut(ty)
            .ok_or_else(|| TaxonomyError::UnknownType(ty.into()))?;
        groups
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| TaxonomyError::UnknownGroup(ty.into(), name.into()))
    }

    /// Append a subgroup to `(ty, group)`. Duplicates within a group are
    /// rejected.
    pub fn add_subgroup(&mut self, ty: &str, group: &str, name: &str) -> Result<(), TaxonomyError> {
        let name = Self::checked_name(name)?;
        let subgroups = self
            .types
            .get_mut(ty)
            .ok_or_else(|| TaxonomyError::UnknownType(ty.into()))?
            .get_mut(group)
            .ok_or_else(|| TaxonomyError::UnknownGroup(ty.into(), group.into()))?;
        if subgroups.iter().any(|s| s == &name) {
            return Err(TaxonomyError::DuplicateSubgroup(name));
        }
        subgroups.push(name);
        Ok(())
    }

    /// Remove every subgroup of `(ty, group)` equal to `name`.
    pub fn delete_subgroup(&mut self, ty: &str, group: &str, name: &str) -> Result<(), TaxonomyError> {
        let subgroups = self
            .types
            .get_mut(ty)
            .ok_or_else(|| TaxonomyError::UnknownType(ty.into()))?
            .get_mut(group)
            .ok_or_else(|| TaxonomyError::UnknownGroup(ty.into(), group.into()))?;
        subgroups.retain(|s| s != name);
        Ok(())
    }
}

/// Owner of the taxonomy tree.
///
/// All operations are synchronous and persist-then-broadcast: the mutated
/// tree is written whole to the key-value store, then published on the
/// change bus. Subscribers should re-read [`snapshot`](Self::snapshot) on
/// notification rather than rely on the payload alone, which also covers
/// consumers that mounted after a change.
pub struct TaxonomyStore {
    tree: RwLock<TaxonomyTree>,
    store: Arc<dyn KeyValueStore>,
    bus: ChangeBus,
}

impl TaxonomyStore {
    /// Load the tree from storage, falling back to the built-in default
    /// when the key is absent or the value does not parse.
    pub fn open(store: Arc<dyn KeyValueStore>) -> Self {
        let tree = match store.get(TAXONOMY_KEY) {
            Some(raw) => match serde_json::from_str(&raw) {
                Ok(tree) => tree,
                Err(e) => {
                    tracing::warn!("Stored taxonomy unreadable, using defaults: {}", e);
                    TaxonomyTree::default_tree()
                }
            },
            None => TaxonomyTree::default_tree(),
        };

        Self {
            tree: RwLock::new(tree),
            store,
            bus: ChangeBus::new(),
        }
    }

    /// Current tree, cloned.
    pub fn snapshot(&self) -> TaxonomyTree {
        self.tree.read().clone()
    }

    /// Register for change notifications. The subscription ends when the
    /// returned guard is dropped.
    pub fn subscribe(
        &self,
        listener: impl Fn(&TaxonomyTree) + Send + Sync + 'static,
    ) -> Subscription {
        self.bus.subscribe(listener)
    }

    pub fn add_type(&self, name: &str) -> Result<(), TaxonomyError> {
        self.mutate(|tree| tree.add_type(name))
    }

    pub fn rename_type(&self, old_name: &str, new_name: &str) -> Result<(), TaxonomyError> {
        self.mutate(|tree| tree.rename_type(old_name, new_name))
    }

    pub fn delete_type(&self, name: &str) -> Result<(), TaxonomyError> {
        self.mutate(|tree| tree.delete_type(name))
    }

    pub fn add_group(&self, ty: &str, name: &str) -> Result<(), TaxonomyError> {
        self.mutate(|tree| tree.add_group(ty, name))
    }

    pub fn rename_group(&self, ty: &str, old_name: &str, new_name: &str) -> Result<(), TaxonomyError> {
        self.mutate(|tree| tree.rename_group(ty, old_name, new_name))
    }

    pub fn delete_group(&self, ty: &str, name: &str) -> Result<(), TaxonomyError> {
        self.mutate(|tree| tree.delete_group(ty, name))
    }

    pub fn add_subgroup(&self, ty: &str, group: &str, name: &str) -> Result<(), TaxonomyError> {
        self.mutate(|tree| tree.add_subgroup(ty, group, name))
    }

    pub fn delete_subgroup(&self, ty: &str, group: &str, name: &str) -> Result<(), TaxonomyError> {
        self.mutate(|tree| tree.delete_subgroup(ty, group, name))
    }

    fn mutate(
        &self,
        op: impl FnOnce(&mut TaxonomyTree) -> Result<(), TaxonomyError>,
    ) -> Result<(), TaxonomyError> {
        let next = {
            let mut tree = self.tree.write();
            let mut next = tree.clone();
            op(&mut next)?;
            self.persist(&next);
            *tree = next.clone();
            next
        };
        // Publish after releasing the write lock so listeners can re-read
        self.bus.publish(&next);
        Ok(())
    }

    fn persist(&self, tree: &TaxonomyTree) {
        match serde_json::to_string(tree) {
            Ok(raw) => self.store.set(TAXONOMY_KEY, &raw),
            Err(e) => tracing::error!("Failed to serialize taxonomy: {}", e),
        }
    }
}
