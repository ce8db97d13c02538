//! IrGraph: the arena holding every IR node and its relations.
//!
//! [`IrGraph`] is the single entry point for assembling an architecture.
//! Nodes are stored once in a `StableGraph` and referenced everywhere else by
//! [`NodeId`], so a node shared by five services is one entry with five
//! incoming edges, and identity (not structure) decides sameness.
//!
//! Each node has two ordered relations:
//! - **arguments**: collaborators supplied to it, fixed when it is added
//! - **contained**: children it owns and generates, appended during assembly
//!
//! Both relations are mirrored as petgraph edges (`node -> dependency`) so
//! reachability and cycle checks run on the same structure. The graph is
//! append-only until [`IrGraph::freeze`]; compilation only reads it.

use std::collections::HashSet;
use std::fmt;

use petgraph::algo::{has_path_connecting, is_cyclic_directed};
use petgraph::graph::NodeIndex;
use petgraph::stable_graph::StableGraph;
use petgraph::Directed;
use smallvec::SmallVec;

use crate::capability::{self, Capability};
use crate::error::CoreError;
use crate::id::{NamespaceId, NodeId};
use crate::namespace::{validate_name, NamespaceTree};
use crate::node::IrNode;

/// Relation represented by a graph edge, pointing from a node to the node
/// it depends on or contains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    Argument,
    Contains,
}

/// A node plus its relations.
#[derive(Debug)]
pub struct NodeEntry {
    node: Box<dyn IrNode>,
    namespace: NamespaceId,
    arguments: SmallVec<[NodeId; 4]>,
    contained: SmallVec<[NodeId; 4]>,
}

impl NodeEntry {
    pub fn node(&self) -> &dyn IrNode {
        self.node.as_ref()
    }

    pub fn namespace(&self) -> NamespaceId {
        self.namespace
    }

    pub fn arguments(&self) -> &[NodeId] {
        &self.arguments
    }

    pub fn contained(&self) -> &[NodeId] {
        &self.contained
    }
}

/// The IR graph arena.
#[derive(Debug)]
pub struct IrGraph {
    nodes: StableGraph<NodeEntry, EdgeKind, Directed, u32>,
    /// Namespace hierarchy and per-namespace name tables.
    pub namespaces: NamespaceTree,
    frozen: bool,
}

impl IrGraph {
    /// Creates an empty graph with a root namespace.
    pub fn new(root_namespace: &str) -> Self {
        IrGraph {
            nodes: StableGraph::new(),
            namespaces: NamespaceTree::new(root_namespace),
            frozen: false,
        }
    }

    pub fn root_namespace(&self) -> NamespaceId {
        self.namespaces.root_id()
    }

    // -----------------------------------------------------------------------
    // Assembly
    // -----------------------------------------------------------------------

    /// Adds a child namespace under `parent`.
    pub fn add_namespace(
        &mut self,
        name: &str,
        parent: NamespaceId,
    ) -> Result<NamespaceId, CoreError> {
        self.ensure_mutable()?;
        self.namespaces.add_namespace(name, parent)
    }

    /// Adds a node to `namespace` with its argument nodes.
    ///
    /// Fails immediately if the name is taken in the namespace, if an
    /// argument does not exist, or if the node's declared capabilities are
    /// inconsistent (a missing prerequisite, or a declared contract without
    /// its accessor and vice versa).
    pub fn add_node<N: IrNode + 'static>(
        &mut self,
        namespace: NamespaceId,
        node: N,
        arguments: &[NodeId],
    ) -> Result<NodeId, CoreError> {
        self.ensure_mutable()?;
        if self.namespaces.get(namespace).is_none() {
            return Err(CoreError::NamespaceNotFound { id: namespace });
        }
        validate_name(node.name())?;
        if self.namespaces.lookup(namespace, node.name()).is_some() {
            return Err(CoreError::DuplicateName {
                namespace: self.namespaces.path(namespace).join("."),
                name: node.name().to_string(),
            });
        }
        for &arg in arguments {
            self.get(arg)?;
        }
        check_capabilities(&node)?;

        let name = node.name().to_string();
        let idx = self.nodes.add_node(NodeEntry {
            node: Box::new(node),
            namespace,
            arguments: arguments.iter().copied().collect(),
            contained: SmallVec::new(),
        });
        for &arg in arguments {
            self.nodes.add_edge(idx, arg.into(), EdgeKind::Argument);
        }
        let id = NodeId::from(idx);
        self.namespaces.declare(namespace, &name, id)?;
        Ok(id)
    }

    /// Appends `child` to `parent`'s contained nodes.
    ///
    /// Rejects the edge if `child` already reaches `parent`, which would
    /// make `parent` transitively contain itself.
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), CoreError> {
        self.ensure_mutable()?;
        self.get(parent)?;
        self.get(child)?;

        let (p, c): (NodeIndex<u32>, NodeIndex<u32>) = (parent.into(), child.into());
        if parent == child || has_path_connecting(&self.nodes, c, p, None) {
            return Err(CoreError::Cycle {
                path: format!(
                    "{} -> {} -> {}",
                    self.qualified_name(parent),
                    self.qualified_name(child),
                    self.qualified_name(parent)
                ),
            });
        }
        if self.nodes[p].contained.contains(&child) {
            return Ok(());
        }

        self.nodes[p].contained.push(child);
        self.nodes.add_edge(p, c, EdgeKind::Contains);
        Ok(())
    }

    /// Freezes the graph. Every later mutation fails with [`CoreError::Frozen`].
    pub fn freeze(&mut self) {
        debug_assert!(self.is_acyclic(), "IR graph must be acyclic");
        self.frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    fn ensure_mutable(&self) -> Result<(), CoreError> {
        if self.frozen {
            Err(CoreError::Frozen)
        } else {
            Ok(())
        }
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn entry(&self, id: NodeId) -> Option<&NodeEntry> {
        self.nodes.node_weight(id.into())
    }

    pub fn node(&self, id: NodeId) -> Option<&dyn IrNode> {
        self.entry(id).map(NodeEntry::node)
    }

    /// Like [`node`](Self::node) but with a typed error.
    pub fn get(&self, id: NodeId) -> Result<&dyn IrNode, CoreError> {
        self.node(id).ok_or(CoreError::NodeNotFound { id })
    }

    /// The node's own name, or `""` for an unknown id.
    pub fn name(&self, id: NodeId) -> &str {
        self.node(id).map_or("", |n| n.name())
    }

    /// Argument nodes, or an empty slice for an unknown id.
    pub fn arguments(&self, id: NodeId) -> &[NodeId] {
        self.entry(id).map_or(&[], |e| e.arguments())
    }

    /// Contained nodes, or an empty slice for an unknown id.
    pub fn contained(&self, id: NodeId) -> &[NodeId] {
        self.entry(id).map_or(&[], |e| e.contained())
    }

    pub fn namespace_of(&self, id: NodeId) -> Option<NamespaceId> {
        self.entry(id).map(NodeEntry::namespace)
    }

    /// Full path including the root namespace, e.g. `app.frontend.handler`.
    pub fn qualified_name(&self, id: NodeId) -> String {
        match self.entry(id) {
            Some(entry) => {
                let mut parts = self.namespaces.path(entry.namespace);
                parts.push(entry.node.name().to_string());
                parts.join(".")
            }
            None => format!("<unknown node {id}>"),
        }
    }

    /// Name used for the node in generated code: the namespace path below
    /// the root plus the node name, dotted (`frontend.handler`).
    pub fn instance_name(&self, id: NodeId) -> String {
        match self.entry(id) {
            Some(entry) => {
                let mut parts: Vec<String> = self
                    .namespaces
                    .path(entry.namespace)
                    .into_iter()
                    .skip(1)
                    .collect();
                parts.push(entry.node.name().to_string());
                parts.join(".")
            }
            None => String::new(),
        }
    }

    /// Finds a node by name within one namespace.
    pub fn find(&self, namespace: NamespaceId, name: &str) -> Option<NodeId> {
        self.namespaces.lookup(namespace, name)
    }

    /// All node ids in insertion order.
    pub fn node_ids(&self) -> Vec<NodeId> {
        self.nodes.node_indices().map(NodeId::from).collect()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.nodes.edge_count()
    }

    pub fn is_acyclic(&self) -> bool {
        !is_cyclic_directed(&self.nodes)
    }

    /// The transitive argument and contained closure of `roots`.
    ///
    /// Every node appears once, after all of its arguments and contained
    /// nodes. Ties keep argument order, then contained order, then root
    /// order, so the result is deterministic.
    pub fn closure(&self, roots: &[NodeId]) -> Result<Vec<NodeId>, CoreError> {
        for &root in roots {
            self.get(root)?;
        }
        let mut seen = HashSet::new();
        let mut order = Vec::new();
        for &root in roots {
            self.post_order(root, &mut seen, &mut order);
        }
        Ok(order)
    }

    fn post_order(&self, id: NodeId, seen: &mut HashSet<NodeId>, order: &mut Vec<NodeId>) {
        if !seen.insert(id) {
            return;
        }
        for &dep in self.arguments(id).iter().chain(self.contained(id)) {
            self.post_order(dep, seen, order);
        }
        order.push(id);
    }
}

impl fmt::Display for IrGraph {
    /// One line per node: `name = Kind(arg, ...) { child, ... }`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for id in self.node_ids() {
            let Some(entry) = self.entry(id) else {
                continue;
            };
            let args: Vec<String> = entry
                .arguments
                .iter()
                .map(|a| self.instance_name(*a))
                .collect();
            write!(
                f,
                "{} = {}({})",
                self.instance_name(id),
                entry.node.kind(),
                args.join(", ")
            )?;
            if !entry.contained.is_empty() {
                let children: Vec<String> = entry
                    .contained
                    .iter()
                    .map(|c| self.instance_name(*c))
                    .collect();
                write!(f, " {{ {} }}", children.join(", "))?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

fn check_capabilities(node: &dyn IrNode) -> Result<(), CoreError> {
    let declared = node.capabilities();
    if let Some((capability, requires)) = declared.missing_prerequisite() {
        return Err(CoreError::MissingPrerequisite {
            node: node.name().to_string(),
            capability,
            requires,
        });
    }
    for capability in Capability::ALL {
        match (declared.contains(capability), capability::exposes(node, capability)) {
            (true, false) => {
                return Err(CoreError::CapabilityMismatch {
                    node: node.name().to_string(),
                    capability,
                    reason: "declared but not exposed",
                })
            }
            (false, true) => {
                return Err(CoreError::CapabilityMismatch {
                    node: node.name().to_string(),
                    capability,
                    reason: "exposed but not declared",
                })
            }
            _ => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::GraphBuilder;
    use crate::capability::{CapabilitySet, Instantiable, Service};
    use crate::code::ServiceInterface;
    use crate::error::BuildError;

    #[derive(Debug)]
    struct Plain(&'static str);

    impl IrNode for Plain {
        fn name(&self) -> &str {
            self.0
        }
        fn kind(&self) -> &'static str {
            "Plain"
        }
        fn capabilities(&self) -> CapabilitySet {
            CapabilitySet::EMPTY
        }
    }

    /// Declares `caps` and exposes Instantiable + Service accessors.
    #[derive(Debug)]
    struct Svc {
        name: &'static str,
        caps: CapabilitySet,
    }

    impl Instantiable for Svc {
        fn add_instantiation(
            &self,
            _this: NodeId,
            _graph: &mut dyn GraphBuilder,
        ) -> Result<(), BuildError> {
            Ok(())
        }
    }

    impl Service for Svc {
        fn interface(&self, _this: NodeId, _graph: &IrGraph) -> Result<ServiceInterface, BuildError> {
            Ok(ServiceInterface::new("svc", "Svc", vec![]))
        }
    }

    impl IrNode for Svc {
        fn name(&self) -> &str {
            self.name
        }
        fn kind(&self) -> &'static str {
            "Svc"
        }
        fn capabilities(&self) -> CapabilitySet {
            self.caps
        }
        fn as_instantiable(&self) -> Option<&dyn Instantiable> {
            Some(self)
        }
        fn as_service(&self) -> Option<&dyn Service> {
            Some(self)
        }
    }

    fn service(name: &'static str) -> Svc {
        Svc {
            name,
            caps: CapabilitySet::of(&[Capability::Instantiable, Capability::Service]),
        }
    }

    #[test]
    fn add_nodes_with_arguments() {
        let mut graph = IrGraph::new("app");
        let root = graph.root_namespace();

        let db = graph.add_node(root, Plain("db"), &[]).unwrap();
        let svc = graph.add_node(root, service("users"), &[db]).unwrap();

        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.edge_count(), 1);
        assert_eq!(graph.arguments(svc), &[db]);
        assert_eq!(graph.name(svc), "users");
        assert_eq!(graph.find(root, "db"), Some(db));
    }

    #[test]
    fn duplicate_name_in_namespace_errors() {
        let mut graph = IrGraph::new("app");
        let root = graph.root_namespace();
        graph.add_node(root, Plain("db"), &[]).unwrap();

        let result = graph.add_node(root, Plain("db"), &[]);
        match result {
            Err(CoreError::DuplicateName { namespace, name }) => {
                assert_eq!(namespace, "app");
                assert_eq!(name, "db");
            }
            other => panic!("expected DuplicateName, got {other:?}"),
        }
        assert_eq!(graph.node_count(), 1);
    }

    #[test]
    fn same_name_in_sibling_namespaces() {
        let mut graph = IrGraph::new("app");
        let root = graph.root_namespace();
        let a = graph.add_namespace("a", root).unwrap();
        let b = graph.add_namespace("b", root).unwrap();

        let db_a = graph.add_node(a, Plain("db"), &[]).unwrap();
        let db_b = graph.add_node(b, Plain("db"), &[]).unwrap();

        assert_ne!(db_a, db_b);
        assert_eq!(graph.qualified_name(db_a), "app.a.db");
        assert_eq!(graph.instance_name(db_b), "b.db");
    }

    #[test]
    fn missing_argument_errors() {
        let mut graph = IrGraph::new("app");
        let root = graph.root_namespace();
        let result = graph.add_node(root, Plain("x"), &[NodeId(99)]);
        assert!(matches!(
            result,
            Err(CoreError::NodeNotFound { id }) if id == NodeId(99)
        ));
    }

    #[test]
    fn service_without_instantiable_is_rejected_on_add() {
        let mut graph = IrGraph::new("app");
        let root = graph.root_namespace();
        let bad = Svc {
            name: "bad",
            caps: CapabilitySet::of(&[Capability::Service]),
        };
        let result = graph.add_node(root, bad, &[]);
        match result {
            Err(CoreError::MissingPrerequisite {
                node,
                capability,
                requires,
            }) => {
                assert_eq!(node, "bad");
                assert_eq!(capability, Capability::Service);
                assert_eq!(requires, Capability::Instantiable);
            }
            other => panic!("expected MissingPrerequisite, got {other:?}"),
        }
    }

    #[test]
    fn declared_set_must_match_accessors() {
        let mut graph = IrGraph::new("app");
        let root = graph.root_namespace();

        // Exposes Service but only declares Instantiable.
        let under = Svc {
            name: "under",
            caps: CapabilitySet::of(&[Capability::Instantiable]),
        };
        assert!(matches!(
            graph.add_node(root, under, &[]),
            Err(CoreError::CapabilityMismatch {
                capability: Capability::Service,
                ..
            })
        ));

        // Declares GeneratesFuncs without exposing it.
        let over = Svc {
            name: "over",
            caps: CapabilitySet::of(&[
                Capability::Instantiable,
                Capability::Service,
                Capability::GeneratesFuncs,
            ]),
        };
        assert!(matches!(
            graph.add_node(root, over, &[]),
            Err(CoreError::CapabilityMismatch {
                capability: Capability::GeneratesFuncs,
                ..
            })
        ));
    }

    #[test]
    fn add_child_rejects_cycles() {
        let mut graph = IrGraph::new("app");
        let root = graph.root_namespace();
        let a = graph.add_node(root, Plain("a"), &[]).unwrap();
        let b = graph.add_node(root, Plain("b"), &[a]).unwrap();
        let proc_node = graph.add_node(root, Plain("proc"), &[]).unwrap();

        graph.add_child(proc_node, b).unwrap();
        assert_eq!(graph.contained(proc_node), &[b]);

        // a is reachable from proc via b, so a containing proc closes a cycle.
        let result = graph.add_child(a, proc_node);
        match result {
            Err(CoreError::Cycle { path }) => assert_eq!(path, "app.a -> app.proc -> app.a"),
            other => panic!("expected Cycle, got {other:?}"),
        }
        assert!(matches!(
            graph.add_child(a, a),
            Err(CoreError::Cycle { .. })
        ));
        assert!(graph.is_acyclic());
    }

    #[test]
    fn add_child_twice_is_idempotent() {
        let mut graph = IrGraph::new("app");
        let root = graph.root_namespace();
        let a = graph.add_node(root, Plain("a"), &[]).unwrap();
        let p = graph.add_node(root, Plain("p"), &[]).unwrap();
        graph.add_child(p, a).unwrap();
        graph.add_child(p, a).unwrap();
        assert_eq!(graph.contained(p), &[a]);
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn frozen_graph_rejects_mutation() {
        let mut graph = IrGraph::new("app");
        let root = graph.root_namespace();
        let a = graph.add_node(root, Plain("a"), &[]).unwrap();
        let b = graph.add_node(root, Plain("b"), &[]).unwrap();
        graph.freeze();

        assert!(graph.is_frozen());
        assert!(matches!(
            graph.add_node(root, Plain("c"), &[]),
            Err(CoreError::Frozen)
        ));
        assert!(matches!(graph.add_child(a, b), Err(CoreError::Frozen)));
        assert!(matches!(
            graph.add_namespace("ns", root),
            Err(CoreError::Frozen)
        ));
    }

    #[test]
    fn closure_orders_dependencies_first_and_dedups_diamond() {
        // p -> (b, c); b -> a; c -> a
        let mut graph = IrGraph::new("app");
        let root = graph.root_namespace();
        let a = graph.add_node(root, Plain("a"), &[]).unwrap();
        let b = graph.add_node(root, Plain("b"), &[a]).unwrap();
        let c = graph.add_node(root, Plain("c"), &[a]).unwrap();
        let p = graph.add_node(root, Plain("p"), &[b, c]).unwrap();

        let order = graph.closure(&[p]).unwrap();
        assert_eq!(order, vec![a, b, c, p]);
    }

    #[test]
    fn closure_includes_contained_nodes() {
        let mut graph = IrGraph::new("app");
        let root = graph.root_namespace();
        let cfg = graph.add_node(root, Plain("cfg"), &[]).unwrap();
        let svc = graph.add_node(root, service("svc"), &[cfg]).unwrap();
        let proc_node = graph.add_node(root, Plain("proc"), &[]).unwrap();
        graph.add_child(proc_node, svc).unwrap();

        let order = graph.closure(&[proc_node]).unwrap();
        assert_eq!(order, vec![cfg, svc, proc_node]);
    }

    #[test]
    fn closure_unknown_root_errors() {
        let graph = IrGraph::new("app");
        assert!(matches!(
            graph.closure(&[NodeId(3)]),
            Err(CoreError::NodeNotFound { .. })
        ));
    }

    #[test]
    fn display_pretty_prints_nodes() {
        let mut graph = IrGraph::new("app");
        let root = graph.root_namespace();
        let ns = graph.add_namespace("frontend", root).unwrap();
        let db = graph.add_node(root, Plain("db"), &[]).unwrap();
        let svc = graph.add_node(ns, service("handler"), &[db]).unwrap();
        let proc_node = graph.add_node(root, Plain("proc"), &[]).unwrap();
        graph.add_child(proc_node, svc).unwrap();

        let text = graph.to_string();
        assert_eq!(
            text,
            "db = Plain()\nfrontend.handler = Svc(db)\nproc = Plain() { frontend.handler }\n"
        );
    }

    const NAMES: [&str; 12] = ["n0", "n1", "n2", "n3", "n4", "n5", "n6", "n7", "n8", "n9", "n10", "n11"];

    proptest::proptest! {
        /// Node `i` takes arguments drawn from nodes `< i`, so any such graph
        /// is a DAG; the closure must list each reachable node once, after
        /// all of its arguments.
        #[test]
        fn closure_is_dependency_first(
            edges in proptest::collection::vec(proptest::collection::vec(0usize..12, 0..4), 1..12)
        ) {
            let mut graph = IrGraph::new("app");
            let root = graph.root_namespace();
            let mut ids = Vec::new();
            for (i, picks) in edges.iter().enumerate() {
                let mut args: Vec<NodeId> = Vec::new();
                for &p in picks {
                    if i > 0 {
                        let dep = ids[p % i];
                        if !args.contains(&dep) {
                            args.push(dep);
                        }
                    }
                }
                ids.push(graph.add_node(root, Plain(NAMES[i]), &args).unwrap());
            }

            let last = *ids.last().unwrap();
            let order = graph.closure(&[last]).unwrap();

            let unique: HashSet<NodeId> = order.iter().copied().collect();
            proptest::prop_assert_eq!(unique.len(), order.len());
            proptest::prop_assert_eq!(order.last().copied(), Some(last));
            for (pos, id) in order.iter().enumerate() {
                for arg in graph.arguments(*id) {
                    let arg_pos = order.iter().position(|x| x == arg);
                    proptest::prop_assert!(arg_pos.is_some_and(|p| p < pos));
                }
            }
        }
    }
}
