use alloc::string::String;

#[derive(thiserror::Error, Debug)]
pub enum ToolboxErrorKind {
    #[error("Tool name already in use: {name}")]
    NameAlreadyInUse { name: String },
    #[error("Tool not found. tool name: {name}")]
    NotFoundByName { name: String },
    #[error("Tool not found. required type: {required}")]
    NotFoundByType { required: &'static str },
    #[error("Tool not of required type. tool name: {name}, required type: {required}, actual type: {actual}")]
    NotOfRequiredType {
        name: String,
        required: &'static str,
        actual: &'static str,
    },
    #[error("No unique tool for required type: {required}")]
    NoUniqueForType { required: &'static str },
    #[error("No unique tool for required type: {required}, fallback name ({fallback}) did not match any of the options")]
    FallbackUnmatched { required: &'static str, fallback: String },
    #[error("{name:?} is not a valid tool name")]
    InvalidName { name: String },
}
