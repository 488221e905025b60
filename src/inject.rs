use core::any::type_name;
use tracing::{debug, debug_span};

use crate::{
    definition::FieldDefinition,
    errors::InjectErrorKind,
    toolbox::{Tool, Toolbox, ToolboxInner},
};

/// A type whose dependency-marked fields the injector can fill.
///
/// `fields` and `shared_fields` describe the instance-level and shared
/// (static-like) dependency-marked fields; `assign` and `assign_shared`
/// perform the actual writes. The defaults declare no dependencies, so a type
/// without dependency-marked members implements the trait trivially.
pub trait Injectable: Send + Sync + 'static {
    #[must_use]
    fn fields() -> alloc::vec::Vec<FieldDefinition>
    where
        Self: Sized,
    {
        alloc::vec::Vec::new()
    }

    #[must_use]
    fn shared_fields() -> alloc::vec::Vec<FieldDefinition>
    where
        Self: Sized,
    {
        alloc::vec::Vec::new()
    }

    fn assign(&mut self, field: &'static str, tool: &Tool) -> Result<(), InjectErrorKind> {
        let _ = tool;
        Err(InjectErrorKind::UnknownField { field })
    }

    fn assign_shared(field: &'static str, tool: &Tool) -> Result<(), InjectErrorKind>
    where
        Self: Sized,
    {
        let _ = tool;
        Err(InjectErrorKind::UnknownField { field })
    }
}

/// Borrows a tool as the field's type, or reports an injection failure for
/// the given field. Intended for use inside [`Injectable::assign`] impls.
pub fn expect_tool<'a, T: 'static>(field: &'static str, tool: &'a Tool) -> Result<&'a T, InjectErrorKind> {
    tool.get::<T>().ok_or_else(|| InjectErrorKind::Assign {
        field,
        source: anyhow::anyhow!("tool value is not of type {}", type_name::<T>()),
    })
}

/// Explicit name forces exact name-and-type resolution; otherwise the field
/// resolves by unique type, with the field's own name as fallback.
pub(crate) fn resolve_field(inner: &ToolboxInner, field: &FieldDefinition) -> Result<Tool, InjectErrorKind> {
    let tool = match field.explicit_name {
        Some(name) => inner.get_by_name_and_type(name, &field.required)?,
        None => inner.get_unique_by_type_with_fallback(&field.required, field.name)?,
    };
    Ok(tool)
}

pub(crate) fn inject_instance_locked<T: Injectable>(inner: &ToolboxInner, target: &mut T) -> Result<(), InjectErrorKind> {
    let span = debug_span!("inject", target = type_name::<T>());
    let _guard = span.enter();

    for field in T::fields() {
        let tool = resolve_field(inner, &field)?;
        target.assign(field.name, &tool)?;
        debug!(field = field.name, "Injected");
    }
    Ok(())
}

pub(crate) fn inject_shared_locked<T: Injectable>(inner: &ToolboxInner) -> Result<(), InjectErrorKind> {
    let span = debug_span!("inject_shared", target = type_name::<T>());
    let _guard = span.enter();

    for field in T::shared_fields() {
        let tool = resolve_field(inner, &field)?;
        T::assign_shared(field.name, &tool)?;
        debug!(field = field.name, "Injected");
    }
    Ok(())
}

/// Fills every dependency-marked instance field of `target` from the given
/// toolbox.
///
/// The engine keeps no "already injected" state: calling this twice with an
/// unchanged toolbox re-assigns the same values, and guarding against
/// re-entry is the caller's job.
pub fn inject_tools_in<T: Injectable>(toolbox: &Toolbox, target: &mut T) -> Result<(), InjectErrorKind> {
    let inner = toolbox.lock();
    inject_instance_locked(&inner, target)
}

/// Instance entry point used by patched constructors: fills the
/// dependency-marked fields of `target` from the process-wide toolbox.
pub fn inject_tools<T: Injectable>(target: &mut T) -> Result<(), InjectErrorKind> {
    inject_tools_in(Toolbox::global(), target)
}

/// Fills every dependency-marked shared field of `T` from the given toolbox.
pub fn inject_shared_in<T: Injectable>(toolbox: &Toolbox) -> Result<(), InjectErrorKind> {
    let inner = toolbox.lock();
    inject_shared_locked::<T>(&inner)
}

pub fn inject_shared<T: Injectable>() -> Result<(), InjectErrorKind> {
    inject_shared_in::<T>(Toolbox::global())
}
