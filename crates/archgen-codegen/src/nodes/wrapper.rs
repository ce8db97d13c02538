use archgen_core::builder::{GraphBuilder, ModuleBuilder};
use archgen_core::capability::{
    self, Capability, CapabilitySet, GeneratesFuncs, GeneratesInterfaces, Instantiable,
    RequiresPackage, Service,
};
use archgen_core::code::{Constructor, Func, ServiceInterface, TypeName, Variable};
use archgen_core::error::BuildError;
use archgen_core::graph::IrGraph;
use archgen_core::id::{NamespaceId, NodeId};
use archgen_core::names;
use archgen_core::node::IrNode;

use crate::error::CodegenError;
use crate::imports::Imports;
use crate::render;

/// Package generated wrappers are written to.
const PACKAGE: &str = "wrappers";

/// Wraps the service passed as its first argument.
///
/// The wrapper exposes the derived interface `<Service>_Wrapper`, with the
/// wrapped interface's methods, and a struct implementing it that logs each
/// call before delegating. Both are generated into the module compiling the
/// node.
#[derive(Debug, Clone)]
pub struct ServiceWrapper {
    name: String,
}

impl ServiceWrapper {
    pub fn new(name: &str) -> Self {
        ServiceWrapper {
            name: name.to_string(),
        }
    }

    /// File stem for this wrapper's artifacts, derived from its instance
    /// path so same-named wrappers in different namespaces stay apart:
    /// `frontend.logged` -> `frontend_logged`.
    fn stem(this: NodeId, graph: &IrGraph) -> String {
        names::snake_name(&graph.instance_name(this))
    }

    fn types_module(stem: &str) -> String {
        names::snake_name(&names::artifact_name(stem, "Wrapper"))
    }

    fn impl_module(stem: &str) -> String {
        names::snake_name(&names::artifact_name(stem, "WrapperImpl"))
    }

    fn types_path(stem: &str) -> String {
        format!("crate::{PACKAGE}::{}", Self::types_module(stem))
    }

    fn impl_path(stem: &str) -> String {
        format!("crate::{PACKAGE}::{}", Self::impl_module(stem))
    }

    fn constructor_name(stem: &str) -> String {
        format!("new_{}", Self::impl_module(stem))
    }

    /// The wrapped node and its interface.
    fn wrapped(&self, this: NodeId, graph: &IrGraph) -> Result<(NodeId, ServiceInterface), BuildError> {
        let target = graph.arguments(this).first().copied().ok_or_else(|| {
            BuildError::Capability(format!("wrapper '{}' has no service to wrap", self.name))
        })?;
        let node = graph.get(target).map_err(|_| BuildError::UnknownNode { id: target })?;
        let service = capability::service(node).ok_or_else(|| BuildError::NotAService {
            node: graph.qualified_name(target),
        })?;
        Ok((target, service.interface(target, graph)?))
    }

    fn derived(stem: &str, wrapped: &ServiceInterface) -> ServiceInterface {
        wrapped.copy_as(&names::artifact_name(&wrapped.name, "Wrapper"), &Self::types_path(stem))
    }

    fn struct_name(wrapped: &ServiceInterface) -> String {
        names::artifact_name(&wrapped.name, "WrapperImpl")
    }
}

/// Adds a [`ServiceWrapper`] around `target`, failing unless `target` is a
/// service.
pub fn wrap_service(
    graph: &mut IrGraph,
    namespace: NamespaceId,
    name: &str,
    target: NodeId,
) -> Result<NodeId, CodegenError> {
    let node = graph.get(target)?;
    if capability::service(node).is_none() {
        return Err(BuildError::NotAService {
            node: graph.qualified_name(target),
        }
        .into());
    }
    let id = graph.add_node(namespace, ServiceWrapper::new(name), &[target])?;
    Ok(id)
}

impl IrNode for ServiceWrapper {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &'static str {
        "ServiceWrapper"
    }

    fn capabilities(&self) -> CapabilitySet {
        CapabilitySet::of(&[
            Capability::RequiresPackage,
            Capability::GeneratesInterfaces,
            Capability::GeneratesFuncs,
            Capability::Instantiable,
            Capability::Service,
        ])
    }

    fn as_requires_package(&self) -> Option<&dyn RequiresPackage> {
        Some(self)
    }

    fn as_generates_interfaces(&self) -> Option<&dyn GeneratesInterfaces> {
        Some(self)
    }

    fn as_generates_funcs(&self) -> Option<&dyn GeneratesFuncs> {
        Some(self)
    }

    fn as_instantiable(&self) -> Option<&dyn Instantiable> {
        Some(self)
    }

    fn as_service(&self) -> Option<&dyn Service> {
        Some(self)
    }
}

impl RequiresPackage for ServiceWrapper {
    fn add_requirements(
        &self,
        this: NodeId,
        module: &mut dyn ModuleBuilder,
    ) -> Result<(), BuildError> {
        let (target, wrapped) = self.wrapped(this, module.graph())?;
        module.visit(&[target])?;
        module.require("tracing", "0.1")?;
        if wrapped.has_async_methods() {
            module.require("async-trait", "0.1")?;
        }
        module.require_type(&wrapped.user_type())?;
        for method in &wrapped.methods {
            for arg in &method.arguments {
                module.require_type(&arg.ty)?;
            }
            if let Some(ret) = &method.returns {
                module.require_type(ret)?;
            }
        }
        Ok(())
    }
}

impl GeneratesInterfaces for ServiceWrapper {
    fn generate_interfaces(
        &self,
        this: NodeId,
        module: &mut dyn ModuleBuilder,
    ) -> Result<(), BuildError> {
        let (_, wrapped) = self.wrapped(this, module.graph())?;
        let stem = Self::stem(this, module.graph());
        let derived = Self::derived(&stem, &wrapped);

        let mut imports = Imports::new(&Self::types_path(&stem));
        let mut body = render::interface_trait(&derived, &mut imports);
        body.push('\n');
        body.push_str(&render::wrapper_struct(
            &Self::struct_name(&wrapped),
            &wrapped,
            &mut imports,
        ));

        module.create_package(PACKAGE)?;
        module.add_file(
            PACKAGE,
            &format!("{}.rs", Self::types_module(&stem)),
            &render::file(&imports, &body),
        )?;
        Ok(())
    }
}

impl GeneratesFuncs for ServiceWrapper {
    fn generate_funcs(&self, this: NodeId, module: &mut dyn ModuleBuilder) -> Result<(), BuildError> {
        let (_, wrapped) = self.wrapped(this, module.graph())?;
        let stem = Self::stem(this, module.graph());
        let derived = Self::derived(&stem, &wrapped);

        let mut imports = Imports::new(&Self::impl_path(&stem));
        let struct_ty =
            imports.qualify(&TypeName::user(&Self::types_path(&stem), &Self::struct_name(&wrapped)));
        let body = render::wrapper_impl(
            &struct_ty,
            &derived,
            &wrapped,
            &Self::constructor_name(&stem),
            &mut imports,
        );

        module.create_package(PACKAGE)?;
        module.add_file(
            PACKAGE,
            &format!("{}.rs", Self::impl_module(&stem)),
            &render::file(&imports, &body),
        )?;
        Ok(())
    }
}

impl Instantiable for ServiceWrapper {
    fn add_instantiation(
        &self,
        this: NodeId,
        graph: &mut dyn GraphBuilder,
    ) -> Result<(), BuildError> {
        let (target, wrapped) = self.wrapped(this, graph.graph())?;
        graph.visit(&[target])?;

        let stem = Self::stem(this, graph.graph());
        let derived = Self::derived(&stem, &wrapped);
        let constructor = Constructor {
            module: Self::impl_path(&stem),
            func: Func::new(
                &Self::constructor_name(&stem),
                vec![Variable::new("inner", wrapped.handle_type())],
                Some(derived.handle_type()),
            ),
            fallible: false,
            runnable: false,
        };
        let name = graph.graph().instance_name(this);
        graph.declare_constructor(&name, &constructor, &[target])
    }
}

impl Service for ServiceWrapper {
    fn interface(&self, this: NodeId, graph: &IrGraph) -> Result<ServiceInterface, BuildError> {
        let (_, wrapped) = self.wrapped(this, graph)?;
        Ok(Self::derived(&Self::stem(this, graph), &wrapped))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::ConfigValue;
    use archgen_core::error::CoreError;

    #[test]
    fn wrap_service_rejects_non_services() {
        let mut graph = IrGraph::new("app");
        let root = graph.root_namespace();
        let cfg = graph.add_node(root, ConfigValue::new("cfg", "x"), &[]).unwrap();

        let err = wrap_service(&mut graph, root, "logged", cfg).unwrap_err();
        assert!(matches!(
            err,
            CodegenError::Build(BuildError::NotAService { ref node }) if node == "app.cfg"
        ));
        assert!(matches!(
            wrap_service(&mut graph, root, "logged", NodeId(42)),
            Err(CodegenError::Graph(CoreError::NodeNotFound { .. }))
        ));
    }

    #[test]
    fn derived_interface_names() {
        let wrapped = ServiceInterface::new("user_svc", "UserService", vec![]);
        let derived = ServiceWrapper::derived("logged_users", &wrapped);
        assert_eq!(derived.name, "UserService_Wrapper");
        assert_eq!(derived.module, "crate::wrappers::logged_users_wrapper");
        assert_eq!(
            ServiceWrapper::impl_path("logged_users"),
            "crate::wrappers::logged_users_wrapper_impl"
        );
        assert_eq!(
            ServiceWrapper::constructor_name("logged_users"),
            "new_logged_users_wrapper_impl"
        );
        assert_eq!(ServiceWrapper::struct_name(&wrapped), "UserService_WrapperImpl");
    }

    #[test]
    fn artifact_stem_includes_namespace() {
        let mut graph = IrGraph::new("app");
        let root = graph.root_namespace();
        let ns_a = graph.add_namespace("a", root).unwrap();
        let ns_b = graph.add_namespace("b", root).unwrap();
        let cfg = graph.add_node(root, ConfigValue::new("cfg", "x"), &[]).unwrap();
        let in_root = graph.add_node(root, ServiceWrapper::new("logged"), &[cfg]).unwrap();
        let in_a = graph.add_node(ns_a, ServiceWrapper::new("logged"), &[cfg]).unwrap();
        let in_b = graph.add_node(ns_b, ServiceWrapper::new("logged"), &[cfg]).unwrap();

        assert_eq!(ServiceWrapper::stem(in_root, &graph), "logged");
        assert_eq!(ServiceWrapper::stem(in_a, &graph), "a_logged");
        assert_eq!(ServiceWrapper::stem(in_b, &graph), "b_logged");
        assert_eq!(
            ServiceWrapper::types_module(&ServiceWrapper::stem(in_a, &graph)),
            "a_logged_wrapper"
        );
    }
}
