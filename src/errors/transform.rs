#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum TransformErrorKind {
    #[error("Class payload truncated: needed {needed} byte(s) at offset {offset} in {section}")]
    Truncated {
        section: &'static str,
        offset: usize,
        needed: usize,
    },
    #[error("Unknown constant tag {tag} at constant {index}")]
    UnknownConstantTag { tag: u8, index: u16 },
    #[error("Constructor without a superclass constructor call")]
    MissingSuperInvoke,
    #[error("Constant table full: {count} entries, cannot append 6 more")]
    ConstantTableFull { count: u16 },
}
