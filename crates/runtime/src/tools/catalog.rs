//! Function-calling catalog built from tool descriptors.

use crate::model::{FunctionSpec, ToolSpec};
use crate::tools::ToolDescriptor;

impl From<&ToolDescriptor> for ToolSpec {
    fn from(descriptor: &ToolDescriptor) -> Self {
        ToolSpec::Function {
            function: FunctionSpec {
                name: descriptor.name.clone(),
                description: descriptor.description.clone(),
                parameters: descriptor.input_schema.clone(),
            },
        }
    }
}

/// Tool specs in the order the session listed them.
///
/// Names must already be unique; [`SessionConnector`](crate::SessionConnector)
/// deduplicates when it refreshes the listing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolCatalog {
    specs: Vec<ToolSpec>,
}

impl ToolCatalog {
    pub fn from_descriptors(descriptors: &[ToolDescriptor]) -> Self {
        Self {
            specs: descriptors.iter().map(ToolSpec::from).collect(),
        }
    }

    pub fn specs(&self) -> &[ToolSpec] {
        &self.specs
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}
