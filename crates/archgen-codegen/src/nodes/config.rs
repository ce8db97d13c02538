use archgen_core::builder::GraphBuilder;
use archgen_core::capability::{Capability, CapabilitySet, Instantiable};
use archgen_core::error::BuildError;
use archgen_core::id::NodeId;
use archgen_core::node::IrNode;

use crate::render;

/// A named string value, available to other instances as `String`.
#[derive(Debug, Clone)]
pub struct ConfigValue {
    name: String,
    value: String,
}

impl ConfigValue {
    pub fn new(name: &str, value: &str) -> Self {
        ConfigValue {
            name: name.to_string(),
            value: value.to_string(),
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

impl IrNode for ConfigValue {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &'static str {
        "ConfigValue"
    }

    fn capabilities(&self) -> CapabilitySet {
        CapabilitySet::of(&[Capability::Instantiable])
    }

    fn as_instantiable(&self) -> Option<&dyn Instantiable> {
        Some(self)
    }
}

impl Instantiable for ConfigValue {
    fn add_instantiation(
        &self,
        this: NodeId,
        graph: &mut dyn GraphBuilder,
    ) -> Result<(), BuildError> {
        let name = graph.graph().instance_name(this);
        graph.declare(&name, &render::string_value_body(&self.value), &[])
    }
}
