use alloc::string::ToString as _;

use crate::errors::ToolboxErrorKind;

/// Any non-blank string is acceptable as a tool name. Names that follow field
/// naming rules additionally work with the fallback-by-field-name mechanism.
pub(crate) fn tool_name(name: &str) -> Result<(), ToolboxErrorKind> {
    if name.chars().all(char::is_whitespace) {
        return Err(ToolboxErrorKind::InvalidName { name: name.to_string() });
    }
    Ok(())
}
