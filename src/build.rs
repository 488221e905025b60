use alloc::{
    collections::{BTreeMap, BTreeSet},
    format,
    string::String,
    vec::Vec,
};
use core::any::TypeId;
use tracing::debug;

use crate::{
    descriptor::ToolDescriptor,
    errors::{ScanErrorKind, ToolboxErrorKind},
    toolbox::{Tool, ToolboxInner},
};

/// Per-batch build state: the work stack, the names currently being examined
/// and an index from satisfiable type to the not-yet-built names of the batch.
struct BuildContext {
    descriptors: BTreeMap<String, ToolDescriptor>,
    stack: Vec<String>,
    in_progress: BTreeSet<String>,
    pending_by_type: BTreeMap<TypeId, Vec<String>>,
}

impl BuildContext {
    fn new(descriptors: BTreeMap<String, ToolDescriptor>) -> Self {
        let mut pending_by_type: BTreeMap<TypeId, Vec<String>> = BTreeMap::new();
        let mut stack = Vec::with_capacity(descriptors.len());
        for (name, descriptor) in &descriptors {
            stack.push(name.clone());
            for satisfied in descriptor.satisfies.iter() {
                pending_by_type.entry(satisfied.id).or_default().push(name.clone());
            }
        }
        Self {
            descriptors,
            stack,
            in_progress: BTreeSet::new(),
            pending_by_type,
        }
    }

    fn pending_of_type(&self, id: &TypeId) -> &[String] {
        self.pending_by_type.get(id).map_or(&[], Vec::as_slice)
    }

    /// Marks a name as built: it leaves the in-progress set and every pending
    /// type bucket.
    fn mark_built(&mut self, name: &str) {
        self.in_progress.remove(name);
        for names in self.pending_by_type.values_mut() {
            names.retain(|pending| pending != name);
        }
    }

    /// The cycle in traversal order, from the first occurrence of `name` on
    /// the stack back to `name` itself.
    fn cycle(&self, name: &str) -> ScanErrorKind {
        let mut path = String::from(name);
        for entry in self.stack.iter().rev() {
            path = format!("{entry} -> {path}");
            if entry == name {
                break;
            }
        }
        ScanErrorKind::CircularDependency { path }
    }
}

/// Registers every descriptor of the batch, building dependencies first.
///
/// Depth-first over an explicit work stack: the top descriptor's unbuilt
/// dependencies get pushed above it and it is revisited once they are all
/// registered. A dependency that is already being examined deeper down the
/// stack is a cycle.
pub(crate) fn build_tools(
    inner: &mut ToolboxInner,
    descriptors: BTreeMap<String, ToolDescriptor>,
) -> Result<(), ScanErrorKind> {
    for name in descriptors.keys() {
        if inner.contains(name) {
            return Err(ToolboxErrorKind::NameAlreadyInUse { name: name.clone() }.into());
        }
    }

    let mut ctx = BuildContext::new(descriptors);

    while let Some(current) = ctx.stack.last().cloned() {
        if inner.contains(&current) {
            ctx.stack.pop();
            continue;
        }
        ctx.in_progress.insert(current.clone());

        let dependencies = ctx
            .descriptors
            .get(&current)
            .map(|descriptor| descriptor.dependencies.clone())
            .unwrap_or_default();

        let mut pushed_any = false;
        for dependency in &dependencies {
            if let Some(name) = &dependency.explicit_name {
                if inner.contains(name) {
                    continue;
                }
                if ctx.in_progress.contains(name) {
                    return Err(ctx.cycle(name));
                }
                if !ctx.descriptors.contains_key(name) {
                    return Err(ToolboxErrorKind::NotFoundByName { name: name.clone() }.into());
                }
                ctx.stack.push(name.clone());
                pushed_any = true;
                break;
            }

            let registered = inner.names_of_type(&dependency.required.id);
            let pending = ctx.pending_of_type(&dependency.required.id);
            match registered.len() + pending.len() {
                0 => {
                    return Err(ToolboxErrorKind::NotFoundByType {
                        required: dependency.required.name,
                    }
                    .into());
                }
                1 => {
                    if registered.is_empty() {
                        let name = pending[0].clone();
                        if ctx.in_progress.contains(&name) {
                            return Err(ctx.cycle(&name));
                        }
                        ctx.stack.push(name);
                        pushed_any = true;
                    }
                }
                _ => {
                    let Some(fallback) = &dependency.fallback_name else {
                        return Err(ToolboxErrorKind::NoUniqueForType {
                            required: dependency.required.name,
                        }
                        .into());
                    };
                    if registered.iter().any(|name| name == fallback) {
                        continue;
                    }
                    if pending.iter().any(|name| name == fallback) {
                        if ctx.in_progress.contains(fallback) {
                            return Err(ctx.cycle(fallback));
                        }
                        ctx.stack.push(fallback.clone());
                        pushed_any = true;
                    } else {
                        return Err(ToolboxErrorKind::FallbackUnmatched {
                            required: dependency.required.name,
                            fallback: fallback.clone(),
                        }
                        .into());
                    }
                }
            }

            // depth-first: revisit the current descriptor only after the
            // pushed dependency is fully built
            if pushed_any {
                break;
            }
        }

        if pushed_any {
            continue;
        }

        let descriptor = ctx
            .descriptors
            .get(&current)
            .ok_or_else(|| ToolboxErrorKind::NotFoundByName { name: current.clone() })?;
        let value = descriptor.builder.build(&current, inner)?;
        inner.add(
            &current,
            Tool::from_value(value),
            descriptor.type_info,
            descriptor.satisfies.clone(),
        )?;
        debug!(name = current.as_str(), "Built tool");

        ctx.stack.pop();
        ctx.mark_built(&current);
    }

    Ok(())
}
