//! Object identities and catalog snapshots
//!
//! An [`ObjectIdentity`] is the three-part name of a table or view
//! (`container.namespace.name`). Objects are matched across containers by
//! their [`ComparisonKey`], which drops the container and folds case.

use serde::{Deserialize, Serialize};
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Identifies a queryable object (table or view) in a warehouse
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectIdentity {
    /// Database / catalog name
    pub container: String,

    /// Schema name
    pub namespace: String,

    /// Table or view name
    pub name: String,
}

impl ObjectIdentity {
    /// Create a new object identity
    pub fn new(
        container: impl Into<String>,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            container: container.into(),
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Get fully qualified name
    pub fn fqn(&self) -> String {
        format!("{}.{}.{}", self.container, self.namespace, self.name)
    }

    /// Container-independent key used to match objects across containers
    pub fn comparison_key(&self) -> ComparisonKey {
        ComparisonKey::new(&self.namespace, &self.name)
    }
}

impl fmt::Display for ObjectIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.fqn())
    }
}

/// `NAMESPACE.NAME`, upper-cased
///
/// Unquoted identifiers are case-insensitive in the warehouse, so the key
/// folds case to make `sales.orders` and `SALES.ORDERS` the same object.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ComparisonKey {
    namespace: String,
    name: String,
}

impl ComparisonKey {
    pub fn new(namespace: &str, name: &str) -> Self {
        Self {
            namespace: namespace.trim().to_uppercase(),
            name: name.trim().to_uppercase(),
        }
    }

    /// Parse `namespace.name`; returns `None` if either part is missing
    pub fn parse(s: &str) -> Option<Self> {
        let (namespace, name) = s.split_once('.')?;
        if namespace.trim().is_empty() || name.trim().is_empty() {
            return None;
        }
        Some(Self::new(namespace, name))
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Qualify the key with a container to get a queryable three-part name
    pub fn qualify(&self, container: &str) -> String {
        format!("{}.{}.{}", container, self.namespace, self.name)
    }
}

impl fmt::Display for ComparisonKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.namespace, self.name)
    }
}

/// All objects listed from one container at one point in time
///
/// Keys are unique within a snapshot: when two listed identities fold to the
/// same comparison key, the first one inserted is kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    container: String,
    objects: BTreeMap<ComparisonKey, ObjectIdentity>,
}

impl CatalogSnapshot {
    /// Create an empty snapshot for a container
    pub fn new(container: impl Into<String>) -> Self {
        Self {
            container: container.into(),
            objects: BTreeMap::new(),
        }
    }

    /// Build a snapshot from a list of identities
    pub fn from_objects(
        container: impl Into<String>,
        objects: impl IntoIterator<Item = ObjectIdentity>,
    ) -> Self {
        let mut snapshot = Self::new(container);
        for object in objects {
            snapshot.insert(object);
        }
        snapshot
    }

    /// Insert an identity, returning `false` if its key was already present
    pub fn insert(&mut self, object: ObjectIdentity) -> bool {
        match self.objects.entry(object.comparison_key()) {
            Entry::Vacant(slot) => {
                slot.insert(object);
                true
            }
            Entry::Occupied(_) => false,
        }
    }

    pub fn container(&self) -> &str {
        &self.container
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn contains(&self, key: &ComparisonKey) -> bool {
        self.objects.contains_key(key)
    }

    pub fn get(&self, key: &ComparisonKey) -> Option<&ObjectIdentity> {
        self.objects.get(key)
    }

    /// Comparison keys of every object in the snapshot
    pub fn keys(&self) -> BTreeSet<ComparisonKey> {
        self.objects.keys().cloned().collect()
    }

    pub fn objects(&self) -> impl Iterator<Item = &ObjectIdentity> {
        self.objects.values()
    }
}

/// Three disjoint key sets derived from two snapshots
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionResult {
    /// Keys present only in the left snapshot
    pub only_left: BTreeSet<ComparisonKey>,

    /// Keys present only in the right snapshot
    pub only_right: BTreeSet<ComparisonKey>,

    /// Keys present in both snapshots
    pub common: BTreeSet<ComparisonKey>,
}

impl PartitionResult {
    /// Total number of distinct keys across both snapshots
    pub fn total(&self) -> usize {
        self.only_left.len() + self.only_right.len() + self.common.len()
    }

    /// Check if both snapshots listed exactly the same objects
    pub fn is_aligned(&self) -> bool {
        self.only_left.is_empty() && self.only_right.is_empty()
    }
}
