use alloc::{boxed::Box, sync::Arc, vec::Vec};
use core::any::type_name;

use crate::{
    any::{ToolValue, TypeInfo, TypeSet},
    descriptor::{ConstructFn, InvokeFn, SharedInjectFn},
    inject::{self, Injectable},
    toolbox::Tool,
};

/// One dependency-marked field of an [`Injectable`] type.
pub struct FieldDefinition {
    pub(crate) name: &'static str,
    pub(crate) required: TypeInfo,
    pub(crate) explicit_name: Option<&'static str>,
}

impl FieldDefinition {
    /// A field resolved by unique type, with the field name as fallback.
    #[must_use]
    pub fn of<T: ?Sized + 'static>(name: &'static str) -> Self {
        Self {
            name,
            required: TypeInfo::of::<T>(),
            explicit_name: None,
        }
    }

    /// A field resolved by an explicitly requested tool name.
    #[must_use]
    pub fn named<T: ?Sized + 'static>(name: &'static str, tool_name: &'static str) -> Self {
        Self {
            name,
            required: TypeInfo::of::<T>(),
            explicit_name: Some(tool_name),
        }
    }
}

/// One parameter of a factory method, resolved like a field but without a
/// name fallback.
pub struct ParamDefinition {
    pub(crate) required: TypeInfo,
    pub(crate) explicit_name: Option<&'static str>,
}

/// Stand-in value registered under a class-level tool name. Provides a place
/// to hang shared-state dependencies so that other tools can depend on "the
/// class itself" by its path-like name.
#[derive(Debug, Clone)]
pub struct ClassHandle {
    pub class_name: &'static str,
}

pub(crate) enum DefinitionKind {
    Tool,
    ToolMaker,
    Plain,
}

/// Declarative description of one type handed to the scanner: whether it is a
/// tool, a tool maker, or a plain participant, how to construct it, and which
/// factory methods it exposes.
pub struct ClassDefinition {
    pub(crate) class_name: &'static str,
    pub(crate) type_info: TypeInfo,
    pub(crate) satisfies: TypeSet,
    pub(crate) kind: DefinitionKind,
    pub(crate) tool_name: Option<&'static str>,
    pub(crate) fields: Vec<FieldDefinition>,
    pub(crate) shared_fields: Vec<FieldDefinition>,
    pub(crate) constructor: Option<ConstructFn>,
    pub(crate) shared_inject: SharedInjectFn,
    pub(crate) factories: Vec<FactoryDefinition>,
}

impl ClassDefinition {
    fn with_kind<T: Injectable>(kind: DefinitionKind, constructor: Option<ConstructFn>) -> Self {
        Self {
            class_name: type_name::<T>(),
            type_info: TypeInfo::of::<T>(),
            satisfies: TypeSet::of::<T>(),
            kind,
            tool_name: None,
            fields: T::fields(),
            shared_fields: T::shared_fields(),
            constructor,
            shared_inject: Box::new(|inner| inject::inject_shared_locked::<T>(inner)),
            factories: Vec::new(),
        }
    }

    fn default_constructor<T: Default + Injectable>() -> ConstructFn {
        Box::new(|inner| {
            let mut value = T::default();
            inject::inject_instance_locked(inner, &mut value)?;
            Ok(Arc::new(value) as ToolValue)
        })
    }

    /// A tool built from `T::default()` with its fields injected afterwards.
    #[must_use]
    pub fn tool<T: Default + Injectable>() -> Self {
        Self::with_kind::<T>(DefinitionKind::Tool, Some(Self::default_constructor::<T>()))
    }

    /// A tool built by the given parameterless constructor, with its fields
    /// injected afterwards.
    #[must_use]
    pub fn tool_with_constructor<T: Injectable>(construct: impl Fn() -> T + Send + Sync + 'static) -> Self {
        let constructor: ConstructFn = Box::new(move |inner| {
            let mut value = construct();
            inject::inject_instance_locked(inner, &mut value)?;
            Ok(Arc::new(value) as ToolValue)
        });
        Self::with_kind::<T>(DefinitionKind::Tool, Some(constructor))
    }

    /// A tool declaration without any construction path. Scanning such a
    /// definition fails, mirroring types that are marked as tools but cannot
    /// be instantiated.
    #[must_use]
    pub fn tool_declaration<T: Injectable>() -> Self {
        Self::with_kind::<T>(DefinitionKind::Tool, None)
    }

    /// A tool-maker: itself registered as a tool, plus one tool per attached
    /// factory.
    #[must_use]
    pub fn tool_maker<T: Default + Injectable>() -> Self {
        Self::with_kind::<T>(DefinitionKind::ToolMaker, Some(Self::default_constructor::<T>()))
    }

    /// A plain participant: never registered as a tool, but its shared
    /// dependency-marked fields get injected once the batch is built.
    #[must_use]
    pub fn plain<T: Injectable>() -> Self {
        Self::with_kind::<T>(DefinitionKind::Plain, None)
    }

    /// Overrides the derived tool name.
    #[must_use]
    pub fn named(mut self, name: &'static str) -> Self {
        self.tool_name = Some(name);
        self
    }

    /// Also indexes the tool under `U`, e.g. a trait marker.
    #[must_use]
    pub fn satisfying<U: ?Sized + 'static>(mut self) -> Self {
        self.satisfies = self.satisfies.with::<U>();
        self
    }

    #[must_use]
    pub fn with_factory(mut self, factory: FactoryDefinition) -> Self {
        self.factories.push(factory);
        self
    }
}

/// One factory method of a tool-maker. Shared factories need no maker
/// instance; instance factories receive the maker tool built from the
/// enclosing definition.
pub struct FactoryDefinition {
    pub(crate) method_name: &'static str,
    pub(crate) tool_name: Option<&'static str>,
    pub(crate) provides: TypeInfo,
    pub(crate) satisfies: TypeSet,
    pub(crate) params: Vec<ParamDefinition>,
    pub(crate) is_shared: bool,
    pub(crate) invoke: InvokeFn,
}

impl FactoryDefinition {
    /// A factory invoked without a maker instance.
    #[must_use]
    pub fn shared<R: Send + Sync + 'static>(
        method_name: &'static str,
        invoke: impl Fn(&[Tool]) -> Result<R, anyhow::Error> + Send + Sync + 'static,
    ) -> Self {
        Self {
            method_name,
            tool_name: None,
            provides: TypeInfo::of::<R>(),
            satisfies: TypeSet::of::<R>(),
            params: Vec::new(),
            is_shared: true,
            invoke: Box::new(move |_maker, params| invoke(params).map(|value| Arc::new(value) as ToolValue)),
        }
    }

    /// A factory invoked on the maker instance built from the enclosing
    /// definition.
    #[must_use]
    pub fn instance<M: Send + Sync + 'static, R: Send + Sync + 'static>(
        method_name: &'static str,
        invoke: impl Fn(&M, &[Tool]) -> Result<R, anyhow::Error> + Send + Sync + 'static,
    ) -> Self {
        Self {
            method_name,
            tool_name: None,
            provides: TypeInfo::of::<R>(),
            satisfies: TypeSet::of::<R>(),
            params: Vec::new(),
            is_shared: false,
            invoke: Box::new(move |maker, params| {
                let maker = maker
                    .and_then(|tool| tool.get::<M>())
                    .ok_or_else(|| anyhow::anyhow!("maker tool is not of type {}", type_name::<M>()))?;
                invoke(maker, params).map(|value| Arc::new(value) as ToolValue)
            }),
        }
    }

    /// Overrides the derived tool name.
    #[must_use]
    pub fn named(mut self, name: &'static str) -> Self {
        self.tool_name = Some(name);
        self
    }

    /// Appends a parameter resolved by unique type.
    #[must_use]
    pub fn param<P: ?Sized + 'static>(mut self) -> Self {
        self.params.push(ParamDefinition {
            required: TypeInfo::of::<P>(),
            explicit_name: None,
        });
        self
    }

    /// Appends a parameter resolved by an explicitly requested tool name.
    #[must_use]
    pub fn named_param<P: ?Sized + 'static>(mut self, tool_name: &'static str) -> Self {
        self.params.push(ParamDefinition {
            required: TypeInfo::of::<P>(),
            explicit_name: Some(tool_name),
        });
        self
    }

    /// Also indexes the produced tool under `U`.
    #[must_use]
    pub fn satisfying<U: ?Sized + 'static>(mut self) -> Self {
        self.satisfies = self.satisfies.with::<U>();
        self
    }
}
