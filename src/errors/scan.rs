use alloc::string::String;

use super::{inject::InjectErrorKind, toolbox::ToolboxErrorKind};

#[derive(thiserror::Error, Debug)]
pub enum ScanErrorKind {
    #[error("Class has no parameterless construction path: {class}")]
    MissingConstructor { class: &'static str },
    #[error("Factory method returns nothing: {method}")]
    FactoryReturnsNothing { method: &'static str },
    #[error("Duplicate tool name: {name}")]
    DuplicateToolName { name: String },
    /// `path` carries the full cycle in traversal order, e.g. `a -> b -> c -> a`.
    #[error("Circular dependency detected: {path}")]
    CircularDependency { path: String },
    #[error(transparent)]
    Toolbox(#[from] ToolboxErrorKind),
    #[error(transparent)]
    Inject(#[from] InjectErrorKind),
    #[error("Unable to build tool: {name}")]
    UnableToBuild {
        name: String,
        #[source]
        source: anyhow::Error,
    },
}
