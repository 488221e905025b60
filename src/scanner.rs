use alloc::{
    boxed::Box,
    collections::BTreeMap,
    string::{String, ToString},
    sync::Arc,
    vec,
    vec::Vec,
};
use core::any::TypeId;
use tracing::{debug, debug_span};

use crate::{
    any::{ToolValue, TypeInfo, TypeSet},
    build,
    definition::{ClassDefinition, ClassHandle, DefinitionKind, FieldDefinition},
    descriptor::{ConstructFn, DependencyRef, SharedInjectFn, ToolBuilder, ToolDescriptor},
    errors::ScanErrorKind,
    toolbox::{Toolbox, ToolboxInner},
};

/// Derived tool names follow field naming: `Hammer` becomes `hammer`.
fn uncapitalized(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn field_dependencies(fields: &[FieldDefinition]) -> Vec<DependencyRef> {
    fields
        .iter()
        .map(|field| DependencyRef {
            required: field.required,
            explicit_name: field.explicit_name.map(ToString::to_string),
            fallback_name: Some(field.name.to_string()),
        })
        .collect()
}

fn insert_descriptor(
    descriptors: &mut BTreeMap<String, ToolDescriptor>,
    descriptor: ToolDescriptor,
) -> Result<(), ScanErrorKind> {
    if descriptors.contains_key(&descriptor.name) {
        return Err(ScanErrorKind::DuplicateToolName {
            name: descriptor.name,
        });
    }
    descriptors.insert(descriptor.name.clone(), descriptor);
    Ok(())
}

fn scan_locked(inner: &mut ToolboxInner, definitions: Vec<ClassDefinition>) -> Result<(), ScanErrorKind> {
    let mut descriptors = BTreeMap::new();
    let mut plain_injects: Vec<SharedInjectFn> = Vec::new();

    for definition in definitions {
        if matches!(definition.kind, DefinitionKind::Plain) {
            if !definition.shared_fields.is_empty() {
                plain_injects.push(definition.shared_inject);
            }
            continue;
        }
        if inner.is_scanned(&definition.type_info.id) {
            debug!(class = definition.class_name, "Class already scanned, skipping");
            continue;
        }

        let ClassDefinition {
            class_name,
            type_info,
            satisfies,
            kind,
            tool_name,
            fields,
            shared_fields,
            constructor,
            shared_inject,
            factories,
        } = definition;

        let constructor = constructor.ok_or(ScanErrorKind::MissingConstructor { class: class_name })?;
        let instance_name = tool_name.map_or_else(|| uncapitalized(type_info.short_name()), ToString::to_string);

        // The instance tool depends on the class-level tool so that shared
        // fields are filled before the first instance is built.
        let mut dependencies = field_dependencies(&fields);
        dependencies.push(DependencyRef {
            required: TypeInfo::of::<ClassHandle>(),
            explicit_name: Some(class_name.to_string()),
            fallback_name: None,
        });
        insert_descriptor(
            &mut descriptors,
            ToolDescriptor {
                name: instance_name.clone(),
                type_info,
                satisfies,
                dependencies,
                builder: ToolBuilder::Construct(constructor),
            },
        )?;

        let class_builder: ConstructFn = Box::new(move |inner| {
            shared_inject(inner)?;
            Ok(Arc::new(ClassHandle { class_name }) as ToolValue)
        });
        insert_descriptor(
            &mut descriptors,
            ToolDescriptor {
                name: class_name.to_string(),
                type_info: TypeInfo::of::<ClassHandle>(),
                satisfies: TypeSet::of::<ClassHandle>(),
                dependencies: field_dependencies(&shared_fields),
                builder: ToolBuilder::Construct(class_builder),
            },
        )?;

        if matches!(kind, DefinitionKind::ToolMaker) {
            for factory in factories {
                if factory.provides.id == TypeId::of::<()>() {
                    return Err(ScanErrorKind::FactoryReturnsNothing {
                        method: factory.method_name,
                    });
                }
                let factory_name = factory
                    .tool_name
                    .map_or_else(|| factory.method_name.to_string(), ToString::to_string);

                let mut dependencies: Vec<DependencyRef> = factory
                    .params
                    .iter()
                    .map(|param| DependencyRef {
                        required: param.required,
                        explicit_name: param.explicit_name.map(ToString::to_string),
                        fallback_name: None,
                    })
                    .collect();
                dependencies.push(if factory.is_shared {
                    DependencyRef {
                        required: TypeInfo::of::<ClassHandle>(),
                        explicit_name: Some(class_name.to_string()),
                        fallback_name: None,
                    }
                } else {
                    DependencyRef {
                        required: type_info,
                        explicit_name: None,
                        fallback_name: Some(instance_name.clone()),
                    }
                });

                insert_descriptor(
                    &mut descriptors,
                    ToolDescriptor {
                        name: factory_name,
                        type_info: factory.provides,
                        satisfies: factory.satisfies,
                        dependencies,
                        builder: ToolBuilder::Factory {
                            maker_name: instance_name.clone(),
                            maker_type: type_info,
                            params: factory.params,
                            is_shared: factory.is_shared,
                            invoke: factory.invoke,
                        },
                    },
                )?;
            }
        }

        inner.mark_scanned(type_info.id);
    }

    build::build_tools(inner, descriptors)?;

    for inject in plain_injects {
        inject(inner)?;
    }
    Ok(())
}

/// Scans a batch of class definitions: derives instance, class-level and
/// factory tools, builds them in dependency order and finally injects the
/// shared fields of plain participants.
///
/// The batch is atomic. On any failure the toolbox is restored to its state
/// before the call, scan history included.
pub fn scan_definitions(toolbox: &Toolbox, definitions: Vec<ClassDefinition>) -> Result<(), ScanErrorKind> {
    let span = debug_span!("scan", definitions = definitions.len());
    let _guard = span.enter();

    let mut inner = toolbox.lock();
    let snapshot = inner.clone();
    match scan_locked(&mut inner, definitions) {
        Ok(()) => Ok(()),
        Err(err) => {
            *inner = snapshot;
            Err(err)
        }
    }
}

pub fn scan_definition(toolbox: &Toolbox, definition: ClassDefinition) -> Result<(), ScanErrorKind> {
    scan_definitions(toolbox, vec![definition])
}

/// Forgets which classes have been scanned. Tools stay registered; combined
/// with [`Toolbox::clear`] this resets the toolbox for a fresh scan.
pub fn clear_scan_history(toolbox: &Toolbox) {
    toolbox.lock().clear_scan_history();
}

#[cfg(test)]
mod tests {
    use super::{clear_scan_history, scan_definition, scan_definitions};
    use crate::{
        definition::{ClassDefinition, ClassHandle, FactoryDefinition, FieldDefinition},
        errors::{InjectErrorKind, ScanErrorKind},
        inject::{expect_tool, Injectable},
        toolbox::{Tool, Toolbox},
    };

    use alloc::{
        format,
        string::{String, ToString as _},
        vec,
        vec::Vec,
    };
    use core::any::type_name;
    use tracing_test::traced_test;

    #[derive(Default)]
    struct Hammer {
        head: Option<String>,
    }

    impl Injectable for Hammer {
        fn fields() -> Vec<FieldDefinition> {
            vec![FieldDefinition::of::<String>("head")]
        }

        fn assign(&mut self, field: &'static str, tool: &Tool) -> Result<(), InjectErrorKind> {
            self.head = Some(expect_tool::<String>(field, tool)?.clone());
            Ok(())
        }
    }

    #[derive(Default, Clone)]
    struct Anvil {
        mass: u32,
    }

    impl Injectable for Anvil {}

    #[derive(Default)]
    struct Smith {
        anvil: Option<Anvil>,
    }

    impl Injectable for Smith {
        fn fields() -> Vec<FieldDefinition> {
            vec![FieldDefinition::of::<Anvil>("anvil")]
        }

        fn assign(&mut self, field: &'static str, tool: &Tool) -> Result<(), InjectErrorKind> {
            self.anvil = Some(expect_tool::<Anvil>(field, tool)?.clone());
            Ok(())
        }
    }

    struct Gadget {
        label: String,
    }

    #[test]
    #[traced_test]
    fn test_scan_registers_instance_and_class_tools() {
        let toolbox = Toolbox::new();
        toolbox.add("head", "steel".to_string()).unwrap();

        scan_definition(&toolbox, ClassDefinition::tool::<Hammer>()).unwrap();

        let tool = toolbox.get_by_name("hammer").unwrap();
        assert_eq!(tool.get::<Hammer>().unwrap().head.as_deref(), Some("steel"));

        let class_tool = toolbox.get_by_name(type_name::<Hammer>()).unwrap();
        assert_eq!(class_tool.get::<ClassHandle>().unwrap().class_name, type_name::<Hammer>());
    }

    #[test]
    fn test_overridden_tool_name() {
        let toolbox = Toolbox::new();
        toolbox.add("head", "steel".to_string()).unwrap();

        scan_definition(&toolbox, ClassDefinition::tool::<Hammer>().named("sledge")).unwrap();
        assert!(toolbox.contains("sledge"));
        assert!(!toolbox.contains("hammer"));
    }

    #[test]
    fn test_dependency_between_scanned_tools() {
        let toolbox = Toolbox::new();

        scan_definitions(
            &toolbox,
            vec![ClassDefinition::tool::<Smith>(), ClassDefinition::tool::<Anvil>()],
        )
        .unwrap();

        let tool = toolbox.get_by_name("smith").unwrap();
        assert_eq!(tool.get::<Smith>().unwrap().anvil.as_ref().unwrap().mass, 0);
    }

    #[test]
    fn test_missing_constructor_rolls_back() {
        let toolbox = Toolbox::new();
        toolbox.add("head", "steel".to_string()).unwrap();

        let err = scan_definitions(
            &toolbox,
            vec![
                ClassDefinition::tool::<Hammer>(),
                ClassDefinition::tool_declaration::<Smith>(),
            ],
        )
        .unwrap_err();
        assert!(matches!(err, ScanErrorKind::MissingConstructor { .. }));

        // nothing from the batch landed, and the batch can be retried
        assert!(!toolbox.contains("hammer"));
        scan_definition(&toolbox, ClassDefinition::tool::<Hammer>()).unwrap();
        assert!(toolbox.contains("hammer"));
    }

    #[test]
    fn test_unresolvable_dependency_rolls_back() {
        let toolbox = Toolbox::new();

        // Hammer needs a String tool that was never added
        let err = scan_definition(&toolbox, ClassDefinition::tool::<Hammer>()).unwrap_err();
        assert!(matches!(err, ScanErrorKind::Toolbox(_)));
        assert!(!toolbox.contains("hammer"));
        assert!(!toolbox.contains(type_name::<Hammer>()));

        toolbox.add("head", "steel".to_string()).unwrap();
        scan_definition(&toolbox, ClassDefinition::tool::<Hammer>()).unwrap();
    }

    #[test]
    fn test_duplicate_names_in_batch() {
        let toolbox = Toolbox::new();

        let err = scan_definitions(
            &toolbox,
            vec![
                ClassDefinition::tool::<Anvil>().named("same"),
                ClassDefinition::tool::<Smith>().named("same"),
            ],
        )
        .unwrap_err();
        assert!(matches!(err, ScanErrorKind::DuplicateToolName { .. }));
        assert!(!toolbox.contains("same"));
    }

    #[test]
    fn test_rescan_is_skipped() {
        let toolbox = Toolbox::new();
        toolbox.add("head", "steel".to_string()).unwrap();

        scan_definition(&toolbox, ClassDefinition::tool::<Hammer>()).unwrap();
        // no duplicate-name failure: the class is known and skipped
        scan_definition(&toolbox, ClassDefinition::tool::<Hammer>()).unwrap();
    }

    #[test]
    fn test_clear_scan_history_allows_rescan() {
        let toolbox = Toolbox::new();
        toolbox.add("head", "steel".to_string()).unwrap();

        scan_definition(&toolbox, ClassDefinition::tool::<Hammer>()).unwrap();
        toolbox.clear();
        toolbox.add("head", "steel".to_string()).unwrap();

        // still skipped until the history is cleared
        scan_definition(&toolbox, ClassDefinition::tool::<Hammer>()).unwrap();
        assert!(!toolbox.contains("hammer"));

        clear_scan_history(&toolbox);
        scan_definition(&toolbox, ClassDefinition::tool::<Hammer>()).unwrap();
        assert!(toolbox.contains("hammer"));
    }

    #[test]
    fn test_shared_factory() {
        let toolbox = Toolbox::new();
        toolbox.add("size", 7u32).unwrap();

        scan_definition(
            &toolbox,
            ClassDefinition::tool_maker::<Anvil>().with_factory(
                FactoryDefinition::shared::<Gadget>("stamp", |params| {
                    let size = params[0].get::<u32>().unwrap();
                    Ok(Gadget {
                        label: format!("gadget-{size}"),
                    })
                })
                .param::<u32>(),
            ),
        )
        .unwrap();

        let tool = toolbox.get_by_name("stamp").unwrap();
        assert_eq!(tool.get::<Gadget>().unwrap().label, "gadget-7");
        // the maker itself is a tool too
        assert!(toolbox.contains("anvil"));
    }

    #[test]
    fn test_instance_factory_uses_built_maker() {
        #[derive(Default)]
        struct Forge {
            metal: Option<String>,
        }

        impl Injectable for Forge {
            fn fields() -> Vec<FieldDefinition> {
                vec![FieldDefinition::of::<String>("metal")]
            }

            fn assign(&mut self, field: &'static str, tool: &Tool) -> Result<(), InjectErrorKind> {
                self.metal = Some(expect_tool::<String>(field, tool)?.clone());
                Ok(())
            }
        }

        let toolbox = Toolbox::new();
        toolbox.add("metal", "iron".to_string()).unwrap();

        scan_definition(
            &toolbox,
            ClassDefinition::tool_maker::<Forge>().with_factory(FactoryDefinition::instance::<Forge, Gadget>(
                "cast",
                |forge, _params| {
                    Ok(Gadget {
                        label: forge.metal.clone().unwrap_or_default(),
                    })
                },
            )),
        )
        .unwrap();

        let tool = toolbox.get_by_name("cast").unwrap();
        assert_eq!(tool.get::<Gadget>().unwrap().label, "iron");
    }

    #[test]
    fn test_factory_returning_nothing_rejected() {
        let toolbox = Toolbox::new();

        let err = scan_definition(
            &toolbox,
            ClassDefinition::tool_maker::<Anvil>().with_factory(FactoryDefinition::shared::<()>("noop", |_| Ok(()))),
        )
        .unwrap_err();
        assert!(matches!(err, ScanErrorKind::FactoryReturnsNothing { method: "noop" }));
        assert!(!toolbox.contains("anvil"));
    }

    #[test]
    fn test_named_factory_tool() {
        let toolbox = Toolbox::new();

        scan_definition(
            &toolbox,
            ClassDefinition::tool_maker::<Anvil>().with_factory(
                FactoryDefinition::shared::<Gadget>("make", |_| {
                    Ok(Gadget {
                        label: "made".to_string(),
                    })
                })
                .named("bespoke"),
            ),
        )
        .unwrap();

        assert!(toolbox.contains("bespoke"));
        assert!(!toolbox.contains("make"));
    }

    #[test]
    fn test_plain_shared_injection_after_build() {
        use core::sync::atomic::{AtomicU32, Ordering};

        static MASS: AtomicU32 = AtomicU32::new(0);

        struct Ledger;

        impl Injectable for Ledger {
            fn shared_fields() -> Vec<FieldDefinition> {
                vec![FieldDefinition::of::<u32>("mass")]
            }

            fn assign_shared(field: &'static str, tool: &Tool) -> Result<(), InjectErrorKind> {
                MASS.store(*expect_tool::<u32>(field, tool)?, Ordering::SeqCst);
                Ok(())
            }
        }

        let toolbox = Toolbox::new();
        toolbox.add("mass", 42u32).unwrap();

        scan_definitions(
            &toolbox,
            vec![ClassDefinition::plain::<Ledger>(), ClassDefinition::tool::<Anvil>()],
        )
        .unwrap();
        assert_eq!(MASS.load(Ordering::SeqCst), 42);
    }

    #[test]
    fn test_field_cycle_detected() {
        struct Left {
            _right: Option<Tool>,
        }

        impl Default for Left {
            fn default() -> Self {
                Self { _right: None }
            }
        }

        struct Right {
            _left: Option<Tool>,
        }

        impl Default for Right {
            fn default() -> Self {
                Self { _left: None }
            }
        }

        impl Injectable for Left {
            fn fields() -> Vec<FieldDefinition> {
                vec![FieldDefinition::of::<Right>("right")]
            }

            fn assign(&mut self, _field: &'static str, tool: &Tool) -> Result<(), InjectErrorKind> {
                self._right = Some(tool.clone());
                Ok(())
            }
        }

        impl Injectable for Right {
            fn fields() -> Vec<FieldDefinition> {
                vec![FieldDefinition::of::<Left>("left")]
            }

            fn assign(&mut self, _field: &'static str, tool: &Tool) -> Result<(), InjectErrorKind> {
                self._left = Some(tool.clone());
                Ok(())
            }
        }

        let toolbox = Toolbox::new();
        let err = scan_definitions(
            &toolbox,
            vec![ClassDefinition::tool::<Left>(), ClassDefinition::tool::<Right>()],
        )
        .unwrap_err();
        assert!(matches!(err, ScanErrorKind::CircularDependency { .. }));
        assert!(!toolbox.contains("left"));
        assert!(!toolbox.contains("right"));
    }
}
