use archgen_core::builder::{GraphBuilder, ModuleBuilder};
use archgen_core::capability::{Capability, CapabilitySet, Instantiable, RequiresPackage, Service};
use archgen_core::code::{Constructor, ServiceInterface};
use archgen_core::error::BuildError;
use archgen_core::graph::IrGraph;
use archgen_core::id::NodeId;
use archgen_core::node::IrNode;

/// A service whose implementation lives in a crate and is built by a
/// constructor function.
///
/// The node's IR arguments are passed to the constructor positionally, each
/// fetched from the container as the constructor's declared argument type.
/// The crate is either a module in the workspace (see
/// [`LocalModuleNode`](super::LocalModuleNode)) or an external dependency
/// at [`with_version`](Self::with_version).
#[derive(Debug, Clone)]
pub struct ServiceImpl {
    name: String,
    package: String,
    version: Option<String>,
    interface: ServiceInterface,
    constructor: Constructor,
}

impl ServiceImpl {
    pub fn new(
        name: &str,
        package: &str,
        interface: ServiceInterface,
        constructor: Constructor,
    ) -> Self {
        ServiceImpl {
            name: name.to_string(),
            package: package.to_string(),
            version: None,
            interface,
            constructor,
        }
    }

    /// Depends on `package` at `version` unless it is a workspace module.
    pub fn with_version(mut self, version: &str) -> Self {
        self.version = Some(version.to_string());
        self
    }

    pub fn constructor(&self) -> &Constructor {
        &self.constructor
    }
}

impl IrNode for ServiceImpl {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &'static str {
        "ServiceImpl"
    }

    fn capabilities(&self) -> CapabilitySet {
        CapabilitySet::of(&[
            Capability::RequiresPackage,
            Capability::Instantiable,
            Capability::Service,
        ])
    }

    fn as_requires_package(&self) -> Option<&dyn RequiresPackage> {
        Some(self)
    }

    fn as_instantiable(&self) -> Option<&dyn Instantiable> {
        Some(self)
    }

    fn as_service(&self) -> Option<&dyn Service> {
        Some(self)
    }
}

impl RequiresPackage for ServiceImpl {
    fn add_requirements(
        &self,
        _this: NodeId,
        module: &mut dyn ModuleBuilder,
    ) -> Result<(), BuildError> {
        if module.workspace().local_module(&self.package).is_some() {
            module.require_local(&self.package)?;
        } else {
            let version = self.version.as_deref().ok_or_else(|| BuildError::ModuleNotFound {
                name: self.package.clone(),
            })?;
            module.require(&self.package, version)?;
        }
        for arg in &self.constructor.func.arguments {
            module.require_type(&arg.ty)?;
        }
        module.require_type(&self.interface.user_type())
    }
}

impl Instantiable for ServiceImpl {
    fn add_instantiation(
        &self,
        this: NodeId,
        graph: &mut dyn GraphBuilder,
    ) -> Result<(), BuildError> {
        let args = graph.graph().arguments(this).to_vec();
        graph.visit(&args)?;
        let name = graph.graph().instance_name(this);
        graph.declare_constructor(&name, &self.constructor, &args)
    }
}

impl Service for ServiceImpl {
    fn interface(&self, _this: NodeId, _graph: &IrGraph) -> Result<ServiceInterface, BuildError> {
        Ok(self.interface.clone())
    }
}
