//! IR node model for describing a distributed application as a graph of
//! components and the capability contracts code generators dispatch on.

pub mod builder;
pub mod capability;
pub mod code;
pub mod error;
pub mod graph;
pub mod id;
pub mod names;
pub mod namespace;
pub mod node;

// Re-export commonly used types
pub use builder::{
    GraphBuilder, GraphInfo, LocalModule, ModuleBuilder, ModuleInfo, PackageInfo, VisitTracker,
    WorkspaceBuilder, WorkspaceInfo,
};
pub use capability::{
    Capability, CapabilitySet, GeneratesFuncs, GeneratesInterfaces, Instantiable, ProvidesModule,
    RequiresPackage, Service,
};
pub use code::{Constructor, Func, ServiceInterface, TypeName, Variable};
pub use error::{BuildError, CoreError};
pub use graph::{EdgeKind, IrGraph, NodeEntry};
pub use id::{NamespaceId, NodeId};
pub use namespace::{NamespaceDef, NamespaceTree};
pub use node::IrNode;
