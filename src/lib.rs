#![no_std]

extern crate alloc;

#[cfg(test)]
extern crate std;

pub(crate) mod any;
pub(crate) mod build;
pub(crate) mod definition;
pub(crate) mod descriptor;
pub(crate) mod errors;
pub(crate) mod inject;
pub(crate) mod scanner;
pub(crate) mod toolbox;
pub(crate) mod transform;
pub(crate) mod validate;

pub use any::{TypeInfo, TypeSet};
pub use definition::{ClassDefinition, ClassHandle, FactoryDefinition, FieldDefinition, ParamDefinition};
pub use errors::{InjectErrorKind, ScanErrorKind, ToolboxErrorKind, TransformErrorKind};
pub use inject::{expect_tool, inject_shared, inject_shared_in, inject_tools, inject_tools_in, Injectable};
pub use scanner::{clear_scan_history, scan_definition, scan_definitions};
pub use toolbox::{Tool, Toolbox};
pub use transform::{rewrite_class, DEPENDENCY_MARKER};
