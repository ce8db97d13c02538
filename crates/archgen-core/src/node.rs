//! The base IR node contract.
//!
//! An [`IrNode`] is an abstract architecture component: a service, a queue,
//! a process, a config value. Nodes carry only their own payload; the
//! argument and contained relations live in the [`IrGraph`](crate::graph::IrGraph)
//! arena so the same node can be shared by reference from many positions.

use std::fmt;

use crate::capability::{
    CapabilitySet, GeneratesFuncs, GeneratesInterfaces, Instantiable, ProvidesModule,
    RequiresPackage, Service,
};

/// A node in the IR graph.
///
/// Implementors declare their capability set once and expose each declared
/// contract through the matching `as_*` accessor. The graph rejects nodes
/// whose declared set and accessors disagree.
pub trait IrNode: fmt::Debug + Send + Sync {
    /// Name, unique within the namespace the node is added to.
    fn name(&self) -> &str;

    /// Short type label used when printing the graph, e.g. `"ServiceImpl"`.
    fn kind(&self) -> &'static str;

    /// The closed set of contracts this node type supports.
    fn capabilities(&self) -> CapabilitySet;

    fn as_requires_package(&self) -> Option<&dyn RequiresPackage> {
        None
    }

    fn as_generates_interfaces(&self) -> Option<&dyn GeneratesInterfaces> {
        None
    }

    fn as_generates_funcs(&self) -> Option<&dyn GeneratesFuncs> {
        None
    }

    fn as_instantiable(&self) -> Option<&dyn Instantiable> {
        None
    }

    fn as_provides_module(&self) -> Option<&dyn ProvidesModule> {
        None
    }

    fn as_service(&self) -> Option<&dyn Service> {
        None
    }
}
