//! Capability registry and the code-generation contracts nodes opt into.
//!
//! Every node type declares, through [`IrNode::capabilities`], the closed set
//! of contracts it supports. The compiler dispatches a pass to a node only
//! when the capability is declared *and* the matching accessor on
//! [`IrNode`] returns a handle; anything else means "skip this pass for this
//! node", never an error.
//!
//! There are five code-generation contracts plus the `Service` marker:
//! 1. [`RequiresPackage`] adds dependencies to a module manifest
//! 2. [`GeneratesInterfaces`] writes trait and struct declarations
//! 3. [`GeneratesFuncs`] writes function and method bodies
//! 4. [`Instantiable`] declares how to build the node at runtime
//! 5. [`ProvidesModule`] contributes a whole module to the workspace

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::builder::{GraphBuilder, ModuleBuilder, WorkspaceBuilder};
use crate::code::ServiceInterface;
use crate::error::BuildError;
use crate::graph::IrGraph;
use crate::id::NodeId;
use crate::node::IrNode;

/// A named contract a node may implement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    RequiresPackage,
    GeneratesInterfaces,
    GeneratesFuncs,
    Instantiable,
    ProvidesModule,
    Service,
}

impl Capability {
    /// Every capability, in compilation pass order.
    pub const ALL: [Capability; 6] = [
        Capability::ProvidesModule,
        Capability::RequiresPackage,
        Capability::GeneratesInterfaces,
        Capability::GeneratesFuncs,
        Capability::Instantiable,
        Capability::Service,
    ];

    /// Contracts a node must also declare when it declares `self`.
    pub fn prerequisites(self) -> &'static [Capability] {
        match self {
            Capability::Service => &[Capability::Instantiable],
            _ => &[],
        }
    }

    fn bit(self) -> u8 {
        match self {
            Capability::RequiresPackage => 1 << 0,
            Capability::GeneratesInterfaces => 1 << 1,
            Capability::GeneratesFuncs => 1 << 2,
            Capability::Instantiable => 1 << 3,
            Capability::ProvidesModule => 1 << 4,
            Capability::Service => 1 << 5,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Capability::RequiresPackage => "requires_package",
            Capability::GeneratesInterfaces => "generates_interfaces",
            Capability::GeneratesFuncs => "generates_funcs",
            Capability::Instantiable => "instantiable",
            Capability::ProvidesModule => "provides_module",
            Capability::Service => "service",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The set of capabilities a node type declares.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CapabilitySet(u8);

impl CapabilitySet {
    pub const EMPTY: CapabilitySet = CapabilitySet(0);

    pub fn of(capabilities: &[Capability]) -> Self {
        capabilities
            .iter()
            .fold(CapabilitySet::EMPTY, |set, c| set.with(*c))
    }

    pub fn with(self, capability: Capability) -> Self {
        CapabilitySet(self.0 | capability.bit())
    }

    pub fn contains(self, capability: Capability) -> bool {
        self.0 & capability.bit() != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn iter(self) -> impl Iterator<Item = Capability> {
        Capability::ALL.into_iter().filter(move |c| self.contains(*c))
    }

    /// Returns the first `(capability, missing prerequisite)` pair, if any.
    pub fn missing_prerequisite(self) -> Option<(Capability, Capability)> {
        self.iter().find_map(|c| {
            c.prerequisites()
                .iter()
                .find(|p| !self.contains(**p))
                .map(|p| (c, *p))
        })
    }
}

impl fmt::Display for CapabilitySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.iter().map(Capability::as_str).collect();
        write!(f, "[{}]", names.join(", "))
    }
}

// ---------------------------------------------------------------------------
// Contracts
// ---------------------------------------------------------------------------

/// Nodes that add dependencies to the module manifest they are compiled into.
///
/// Runs before any source is emitted, so the manifest is complete first.
pub trait RequiresPackage {
    fn add_requirements(
        &self,
        this: NodeId,
        module: &mut dyn ModuleBuilder,
    ) -> Result<(), BuildError>;
}

/// Nodes that write trait and struct declarations into a module.
///
/// Declarations are separated from bodies because a body generated for one
/// node may reference a type declared by another node's pass.
pub trait GeneratesInterfaces {
    fn generate_interfaces(
        &self,
        this: NodeId,
        module: &mut dyn ModuleBuilder,
    ) -> Result<(), BuildError>;
}

/// Nodes that write function and method bodies into a module.
pub trait GeneratesFuncs {
    fn generate_funcs(&self, this: NodeId, module: &mut dyn ModuleBuilder)
        -> Result<(), BuildError>;
}

/// Nodes that can be built at runtime.
///
/// `add_instantiation` declares a build function in the generated namespace
/// file. The build function receives the runtime container and may `get`
/// other instances, typically the node's IR arguments.
pub trait Instantiable {
    fn add_instantiation(
        &self,
        this: NodeId,
        graph: &mut dyn GraphBuilder,
    ) -> Result<(), BuildError>;
}

/// Nodes that copy or create a self-contained module in the workspace.
pub trait ProvidesModule {
    fn add_to_workspace(
        &self,
        this: NodeId,
        workspace: &mut dyn WorkspaceBuilder,
    ) -> Result<(), BuildError>;
}

/// An instantiable node exposing methods other nodes can call directly.
pub trait Service: Instantiable {
    /// The interface instances of this node implement.
    fn interface(&self, this: NodeId, graph: &IrGraph) -> Result<ServiceInterface, BuildError>;
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

pub fn requires_package(node: &dyn IrNode) -> Option<&dyn RequiresPackage> {
    if node.capabilities().contains(Capability::RequiresPackage) {
        node.as_requires_package()
    } else {
        None
    }
}

pub fn generates_interfaces(node: &dyn IrNode) -> Option<&dyn GeneratesInterfaces> {
    if node.capabilities().contains(Capability::GeneratesInterfaces) {
        node.as_generates_interfaces()
    } else {
        None
    }
}

pub fn generates_funcs(node: &dyn IrNode) -> Option<&dyn GeneratesFuncs> {
    if node.capabilities().contains(Capability::GeneratesFuncs) {
        node.as_generates_funcs()
    } else {
        None
    }
}

pub fn instantiable(node: &dyn IrNode) -> Option<&dyn Instantiable> {
    if node.capabilities().contains(Capability::Instantiable) {
        node.as_instantiable()
    } else {
        None
    }
}

pub fn provides_module(node: &dyn IrNode) -> Option<&dyn ProvidesModule> {
    if node.capabilities().contains(Capability::ProvidesModule) {
        node.as_provides_module()
    } else {
        None
    }
}

pub fn service(node: &dyn IrNode) -> Option<&dyn Service> {
    if node.capabilities().contains(Capability::Service) {
        node.as_service()
    } else {
        None
    }
}

/// Whether `node` exposes an accessor handle for `capability`.
pub(crate) fn exposes(node: &dyn IrNode, capability: Capability) -> bool {
    match capability {
        Capability::RequiresPackage => node.as_requires_package().is_some(),
        Capability::GeneratesInterfaces => node.as_generates_interfaces().is_some(),
        Capability::GeneratesFuncs => node.as_generates_funcs().is_some(),
        Capability::Instantiable => node.as_instantiable().is_some(),
        Capability::ProvidesModule => node.as_provides_module().is_some(),
        Capability::Service => node.as_service().is_some(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_contains_only_added_capabilities() {
        let set = CapabilitySet::of(&[Capability::Instantiable, Capability::GeneratesFuncs]);
        assert!(set.contains(Capability::Instantiable));
        assert!(set.contains(Capability::GeneratesFuncs));
        assert!(!set.contains(Capability::Service));
        assert!(!set.is_empty());
        assert!(CapabilitySet::EMPTY.is_empty());
    }

    #[test]
    fn service_requires_instantiable() {
        let set = CapabilitySet::of(&[Capability::Service]);
        assert_eq!(
            set.missing_prerequisite(),
            Some((Capability::Service, Capability::Instantiable))
        );

        let set = set.with(Capability::Instantiable);
        assert_eq!(set.missing_prerequisite(), None);
    }

    #[test]
    fn iter_follows_pass_order() {
        let set = CapabilitySet::of(&[
            Capability::Instantiable,
            Capability::RequiresPackage,
            Capability::ProvidesModule,
        ]);
        let order: Vec<Capability> = set.iter().collect();
        assert_eq!(
            order,
            vec![
                Capability::ProvidesModule,
                Capability::RequiresPackage,
                Capability::Instantiable,
            ]
        );
    }

    #[test]
    fn display_lists_names() {
        let set = CapabilitySet::of(&[Capability::Service, Capability::Instantiable]);
        assert_eq!(set.to_string(), "[instantiable, service]");
    }
}
