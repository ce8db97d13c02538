//! Namespace tree scoping node names.
//!
//! [`NamespaceDef`] represents a single namespace, and [`NamespaceTree`]
//! manages the hierarchy. Namespaces form a tree with a root; each one owns
//! a name table mapping node names to the nodes declared in it, which is
//! where name uniqueness is enforced.

use std::collections::HashMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::id::{NamespaceId, NodeId};

/// A namespace definition within the tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamespaceDef {
    pub id: NamespaceId,
    pub name: String,
    /// `None` for the root namespace.
    pub parent: Option<NamespaceId>,
}

/// Manages the hierarchical namespace tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamespaceTree {
    namespaces: HashMap<NamespaceId, NamespaceDef>,
    children: HashMap<NamespaceId, Vec<NamespaceId>>,
    /// Namespace -> (node name -> node), in declaration order.
    names: HashMap<NamespaceId, IndexMap<String, NodeId>>,
    root: NamespaceId,
    next_id: u32,
}

impl NamespaceTree {
    /// Creates a new tree with a root namespace at `NamespaceId(0)`.
    pub fn new(root_name: &str) -> Self {
        let root_id = NamespaceId(0);
        let root = NamespaceDef {
            id: root_id,
            name: root_name.to_string(),
            parent: None,
        };

        let mut namespaces = HashMap::new();
        namespaces.insert(root_id, root);

        let mut children = HashMap::new();
        children.insert(root_id, Vec::new());

        let mut names = HashMap::new();
        names.insert(root_id, IndexMap::new());

        NamespaceTree {
            namespaces,
            children,
            names,
            root: root_id,
            next_id: 1,
        }
    }

    pub fn root_id(&self) -> NamespaceId {
        self.root
    }

    /// Creates a child namespace under `parent`.
    ///
    /// Sibling namespaces must have distinct names.
    pub fn add_namespace(
        &mut self,
        name: &str,
        parent: NamespaceId,
    ) -> Result<NamespaceId, CoreError> {
        validate_name(name)?;
        if !self.namespaces.contains_key(&parent) {
            return Err(CoreError::NamespaceNotFound { id: parent });
        }
        let clash = self
            .children(parent)
            .iter()
            .any(|c| self.namespaces.get(c).is_some_and(|ns| ns.name == name));
        if clash {
            return Err(CoreError::DuplicateName {
                namespace: self.path(parent).join("."),
                name: name.to_string(),
            });
        }

        let id = NamespaceId(self.next_id);
        self.next_id += 1;

        self.namespaces.insert(
            id,
            NamespaceDef {
                id,
                name: name.to_string(),
                parent: Some(parent),
            },
        );
        self.children.entry(parent).or_default().push(id);
        self.children.insert(id, Vec::new());
        self.names.insert(id, IndexMap::new());

        Ok(id)
    }

    pub fn get(&self, id: NamespaceId) -> Option<&NamespaceDef> {
        self.namespaces.get(&id)
    }

    /// Returns the child namespaces, or an empty slice.
    pub fn children(&self, id: NamespaceId) -> &[NamespaceId] {
        self.children
            .get(&id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Reserves `name` for `node` in `namespace`.
    pub fn declare(
        &mut self,
        namespace: NamespaceId,
        name: &str,
        node: NodeId,
    ) -> Result<(), CoreError> {
        validate_name(name)?;
        let path = self.path(namespace);
        let table = self
            .names
            .get_mut(&namespace)
            .ok_or(CoreError::NamespaceNotFound { id: namespace })?;
        if table.contains_key(name) {
            return Err(CoreError::DuplicateName {
                namespace: path.join("."),
                name: name.to_string(),
            });
        }
        table.insert(name.to_string(), node);
        Ok(())
    }

    /// Looks up a node by name within one namespace (no parent fallback).
    pub fn lookup(&self, namespace: NamespaceId, name: &str) -> Option<NodeId> {
        self.names.get(&namespace)?.get(name).copied()
    }

    /// Nodes declared in a namespace, in declaration order.
    pub fn nodes_in(&self, namespace: NamespaceId) -> Vec<NodeId> {
        self.names
            .get(&namespace)
            .map(|t| t.values().copied().collect())
            .unwrap_or_default()
    }

    /// Returns the full path from the root to the given namespace.
    ///
    /// Returns an empty vec if the namespace does not exist.
    pub fn path(&self, id: NamespaceId) -> Vec<String> {
        let mut parts = Vec::new();
        let mut current = id;

        loop {
            match self.namespaces.get(&current) {
                Some(ns) => {
                    parts.push(ns.name.clone());
                    match ns.parent {
                        Some(parent) => current = parent,
                        None => break,
                    }
                }
                None => return Vec::new(),
            }
        }

        parts.reverse();
        parts
    }
}

/// Names are non-empty and may not contain `.`, which separates path segments.
pub(crate) fn validate_name(name: &str) -> Result<(), CoreError> {
    if name.is_empty() || name.contains('.') || name.chars().any(char::is_whitespace) {
        return Err(CoreError::InvalidName {
            name: name.to_string(),
        });
    }
    Ok(())
}
