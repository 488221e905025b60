use alloc::{
    boxed::Box,
    collections::{BTreeMap, BTreeSet},
    string::{String, ToString as _},
    sync::Arc,
    vec::Vec,
};
use core::any::TypeId;
use parking_lot::Mutex;
use tracing::debug;

use crate::{
    any::{ToolValue, TypeInfo, TypeSet},
    errors::ToolboxErrorKind,
    validate,
};

/// Cheaply clonable handle over one registered tool.
#[derive(Clone)]
pub struct Tool {
    value: ToolValue,
}

impl Tool {
    #[inline]
    #[must_use]
    pub(crate) fn new<T: Send + Sync + 'static>(value: T) -> Self {
        Self { value: Arc::new(value) }
    }

    #[inline]
    #[must_use]
    pub(crate) const fn from_value(value: ToolValue) -> Self {
        Self { value }
    }

    /// Borrows the tool as `T`, dereferencing through the boxed dual when the
    /// stored value is `Box<T>`.
    #[must_use]
    pub fn get<T: 'static>(&self) -> Option<&T> {
        if let Some(value) = self.value.downcast_ref::<T>() {
            return Some(value);
        }
        self.value.downcast_ref::<Box<T>>().map(|boxed| &**boxed)
    }

    #[inline]
    #[must_use]
    pub fn arc<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.value.clone().downcast::<T>().ok()
    }
}

#[derive(Clone)]
pub(crate) struct ToolEntry {
    pub(crate) tool: Tool,
    pub(crate) type_info: TypeInfo,
    pub(crate) satisfies: TypeSet,
}

#[derive(Clone)]
pub(crate) struct ToolboxInner {
    tools_by_name: BTreeMap<String, ToolEntry>,
    names_by_type: BTreeMap<TypeId, Vec<String>>,
    scanned: BTreeSet<TypeId>,
}

impl ToolboxInner {
    pub(crate) fn add(
        &mut self,
        name: &str,
        tool: Tool,
        type_info: TypeInfo,
        satisfies: TypeSet,
    ) -> Result<(), ToolboxErrorKind> {
        validate::tool_name(name)?;

        if self.tools_by_name.contains_key(name) {
            return Err(ToolboxErrorKind::NameAlreadyInUse { name: name.to_string() });
        }

        for satisfied in satisfies.iter() {
            self.names_by_type.entry(satisfied.id).or_default().push(name.to_string());
        }
        self.tools_by_name.insert(
            name.to_string(),
            ToolEntry {
                tool,
                type_info,
                satisfies,
            },
        );

        debug!(name, "Added tool");
        Ok(())
    }

    pub(crate) fn remove(&mut self, name: &str, required: &TypeInfo) -> Result<Tool, ToolboxErrorKind> {
        let entry = self
            .tools_by_name
            .get(name)
            .ok_or_else(|| ToolboxErrorKind::NotFoundByName { name: name.to_string() })?;
        if !entry.satisfies.contains(required) {
            return Err(ToolboxErrorKind::NotOfRequiredType {
                name: name.to_string(),
                required: required.name,
                actual: entry.type_info.name,
            });
        }

        let entry = self.tools_by_name.remove(name).expect("entry presence checked above");
        for satisfied in entry.satisfies.iter() {
            if let Some(names) = self.names_by_type.get_mut(&satisfied.id) {
                names.retain(|known| known != name);
            }
        }

        debug!(name, "Removed tool");
        Ok(entry.tool)
    }

    pub(crate) fn get_by_name(&self, name: &str) -> Result<Tool, ToolboxErrorKind> {
        self.tools_by_name
            .get(name)
            .map(|entry| entry.tool.clone())
            .ok_or_else(|| ToolboxErrorKind::NotFoundByName { name: name.to_string() })
    }

    pub(crate) fn get_by_name_and_type(&self, name: &str, required: &TypeInfo) -> Result<Tool, ToolboxErrorKind> {
        let entry = self
            .tools_by_name
            .get(name)
            .ok_or_else(|| ToolboxErrorKind::NotFoundByName { name: name.to_string() })?;
        if !entry.satisfies.contains(required) {
            return Err(ToolboxErrorKind::NotOfRequiredType {
                name: name.to_string(),
                required: required.name,
                actual: entry.type_info.name,
            });
        }
        Ok(entry.tool.clone())
    }

    pub(crate) fn get_unique_by_type(&self, required: &TypeInfo) -> Result<Tool, ToolboxErrorKind> {
        let names = self.names_of_type(&required.id);
        match names {
            [] => Err(ToolboxErrorKind::NotFoundByType { required: required.name }),
            [name] => self.get_by_name(name),
            _ => Err(ToolboxErrorKind::NoUniqueForType { required: required.name }),
        }
    }

    pub(crate) fn get_unique_by_type_with_fallback(
        &self,
        required: &TypeInfo,
        fallback: &str,
    ) -> Result<Tool, ToolboxErrorKind> {
        let names = self.names_of_type(&required.id);
        match names {
            [] => Err(ToolboxErrorKind::NotFoundByType { required: required.name }),
            [name] => self.get_by_name(name),
            names if names.iter().any(|name| name == fallback) => self.get_by_name(fallback),
            _ => Err(ToolboxErrorKind::FallbackUnmatched {
                required: required.name,
                fallback: fallback.to_string(),
            }),
        }
    }

    #[inline]
    pub(crate) fn names_of_type(&self, id: &TypeId) -> &[String] {
        self.names_by_type.get(id).map_or(&[], Vec::as_slice)
    }

    #[inline]
    pub(crate) fn contains(&self, name: &str) -> bool {
        self.tools_by_name.contains_key(name)
    }

    pub(crate) fn type_of(&self, name: &str) -> Option<TypeInfo> {
        self.tools_by_name.get(name).map(|entry| entry.type_info)
    }

    pub(crate) fn clear(&mut self) {
        self.tools_by_name.clear();
        self.names_by_type.clear();
    }

    #[inline]
    pub(crate) fn is_scanned(&self, id: &TypeId) -> bool {
        self.scanned.contains(id)
    }

    #[inline]
    pub(crate) fn mark_scanned(&mut self, id: TypeId) {
        self.scanned.insert(id);
    }

    #[inline]
    pub(crate) fn clear_scan_history(&mut self) {
        self.scanned.clear();
    }
}

/// The tool registry: `(name -> tool)` plus an index from every satisfiable
/// type to the names of the tools that satisfy it.
///
/// All batch operations (scan, build, clear) serialize on the registry lock,
/// so no lookup ever observes a partially built batch. [`Toolbox::global`] is
/// the process-wide instance used by patched constructors; independent
/// instances are mostly useful in tests.
pub struct Toolbox {
    inner: Mutex<ToolboxInner>,
}

static GLOBAL: Toolbox = Toolbox::new();

impl Default for Toolbox {
    fn default() -> Self {
        Self::new()
    }
}

impl Toolbox {
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(ToolboxInner {
                tools_by_name: BTreeMap::new(),
                names_by_type: BTreeMap::new(),
                scanned: BTreeSet::new(),
            }),
        }
    }

    #[inline]
    #[must_use]
    pub fn global() -> &'static Toolbox {
        &GLOBAL
    }

    pub(crate) fn lock(&self) -> parking_lot::MutexGuard<'_, ToolboxInner> {
        self.inner.lock()
    }

    /// Adds the given value under the given name, indexed under the value's
    /// own type and its boxed/unboxed dual.
    pub fn add<T: Send + Sync + 'static>(&self, name: &str, value: T) -> Result<(), ToolboxErrorKind> {
        self.add_with_types(name, value, TypeSet::of::<T>())
    }

    /// Adds the given value with an explicit set of satisfiable types, e.g.
    /// including trait markers the tool should be discoverable under.
    pub fn add_with_types<T: Send + Sync + 'static>(
        &self,
        name: &str,
        value: T,
        satisfies: TypeSet,
    ) -> Result<(), ToolboxErrorKind> {
        self.lock().add(name, Tool::new(value), TypeInfo::of::<T>(), satisfies)
    }

    /// Removes the tool with the given name, checking it satisfies `T` first.
    pub fn remove<T: ?Sized + 'static>(&self, name: &str) -> Result<Tool, ToolboxErrorKind> {
        self.lock().remove(name, &TypeInfo::of::<T>())
    }

    pub fn get_by_name(&self, name: &str) -> Result<Tool, ToolboxErrorKind> {
        self.lock().get_by_name(name)
    }

    pub fn get_by_name_and_type<T: ?Sized + 'static>(&self, name: &str) -> Result<Tool, ToolboxErrorKind> {
        self.lock().get_by_name_and_type(name, &TypeInfo::of::<T>())
    }

    /// Returns the tool that uniquely satisfies `T`.
    pub fn get_unique_by_type<T: ?Sized + 'static>(&self) -> Result<Tool, ToolboxErrorKind> {
        self.lock().get_unique_by_type(&TypeInfo::of::<T>())
    }

    /// Returns the tool that uniquely satisfies `T`, falling back to the tool
    /// with the given name when more than one candidate satisfies `T`.
    pub fn get_unique_by_type_with_fallback<T: ?Sized + 'static>(&self, fallback: &str) -> Result<Tool, ToolboxErrorKind> {
        self.lock().get_unique_by_type_with_fallback(&TypeInfo::of::<T>(), fallback)
    }

    #[must_use]
    pub fn get_names_by_type<T: ?Sized + 'static>(&self) -> Vec<String> {
        self.lock().names_of_type(&TypeId::of::<T>()).to_vec()
    }

    /// All tools currently satisfying `T`, keyed by name.
    #[must_use]
    pub fn tools_by_type<T: ?Sized + 'static>(&self) -> BTreeMap<String, Tool> {
        let inner = self.lock();
        inner
            .names_of_type(&TypeId::of::<T>())
            .iter()
            .filter_map(|name| inner.get_by_name(name).ok().map(|tool| (name.clone(), tool)))
            .collect()
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.lock().contains(name)
    }

    /// The declared type of the tool with the given name, if present.
    #[must_use]
    pub fn type_of(&self, name: &str) -> Option<TypeInfo> {
        self.lock().type_of(name)
    }

    /// Clears all tools. The toolbox contains no tools after this call
    /// completes; scan history is kept (see [`crate::clear_scan_history`]).
    pub fn clear(&self) {
        self.lock().clear();
    }
}
