use super::toolbox::ToolboxErrorKind;

#[derive(thiserror::Error, Debug)]
pub enum InjectErrorKind {
    /// Registry resolution failures pass through unwrapped.
    #[error(transparent)]
    Toolbox(#[from] ToolboxErrorKind),
    #[error("Unable to inject tool into field: {field}")]
    Assign {
        field: &'static str,
        #[source]
        source: anyhow::Error,
    },
    #[error("No dependency-marked field named {field}")]
    UnknownField { field: &'static str },
}
