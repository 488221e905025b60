use alloc::{boxed::Box, string::{String, ToString as _}, vec::Vec};

use crate::{
    any::{ToolValue, TypeInfo, TypeSet},
    definition::ParamDefinition,
    errors::{InjectErrorKind, ScanErrorKind},
    toolbox::{Tool, ToolboxInner},
};

pub(crate) type ConstructFn = Box<dyn Fn(&ToolboxInner) -> Result<ToolValue, InjectErrorKind> + Send + Sync>;
pub(crate) type SharedInjectFn = Box<dyn Fn(&ToolboxInner) -> Result<(), InjectErrorKind> + Send + Sync>;
pub(crate) type InvokeFn = Box<dyn Fn(Option<&Tool>, &[Tool]) -> Result<ToolValue, anyhow::Error> + Send + Sync>;

/// One dependency edge of a descriptor. An explicit name pins the dependency
/// to one tool; otherwise resolution goes by unique type, with an optional
/// fallback name to break ties.
#[derive(Clone)]
pub(crate) struct DependencyRef {
    pub(crate) required: TypeInfo,
    pub(crate) explicit_name: Option<String>,
    pub(crate) fallback_name: Option<String>,
}

pub(crate) enum ToolBuilder {
    /// Construct the value, then inject its fields.
    Construct(ConstructFn),
    /// Invoke a factory method, resolving the maker (for instance factories)
    /// and the parameters first.
    Factory {
        maker_name: String,
        maker_type: TypeInfo,
        params: Vec<ParamDefinition>,
        is_shared: bool,
        invoke: InvokeFn,
    },
}

impl ToolBuilder {
    /// Produces the tool value against a registry whose dependencies for this
    /// descriptor are already in place.
    pub(crate) fn build(&self, name: &str, inner: &ToolboxInner) -> Result<ToolValue, ScanErrorKind> {
        match self {
            Self::Construct(construct) => Ok(construct(inner)?),
            Self::Factory {
                maker_name,
                maker_type,
                params,
                is_shared,
                invoke,
            } => {
                let maker = if *is_shared {
                    None
                } else {
                    Some(inner.get_unique_by_type_with_fallback(maker_type, maker_name)?)
                };

                let mut args = Vec::with_capacity(params.len());
                for param in params {
                    args.push(match param.explicit_name {
                        Some(tool_name) => inner.get_by_name_and_type(tool_name, &param.required)?,
                        None => inner.get_unique_by_type(&param.required)?,
                    });
                }

                invoke(maker.as_ref(), &args).map_err(|source| ScanErrorKind::UnableToBuild {
                    name: name.to_string(),
                    source,
                })
            }
        }
    }
}

/// Everything the build engine needs to register one tool: its name, its
/// types, its dependency edges, and a builder.
pub(crate) struct ToolDescriptor {
    pub(crate) name: String,
    pub(crate) type_info: TypeInfo,
    pub(crate) satisfies: TypeSet,
    pub(crate) dependencies: Vec<DependencyRef>,
    pub(crate) builder: ToolBuilder,
}
