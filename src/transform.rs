mod reader;

use alloc::{borrow::Cow, vec::Vec};
use tracing::debug;

use crate::errors::TransformErrorKind;
use reader::{read_class, CONSTANT_COUNT_AT};

/// Marker string whose presence in a class's constant pool opts the class
/// into constructor patching.
pub const DEPENDENCY_MARKER: &str = "Ltoolbox/UseTool;";

const INJECTOR_CLASS: &str = "toolbox/ToolInjector";
const INJECT_METHOD: &str = "injectTools";
const INJECT_DESCRIPTOR: &str = "(Ljava/lang/Object;)V";

const TAG_UTF8: u8 = 1;
const TAG_CLASS: u8 = 7;
const TAG_METHODREF: u8 = 10;
const TAG_NAME_AND_TYPE: u8 = 12;

const OP_ALOAD_0: u8 = 0x2a;
const OP_INVOKESTATIC: u8 = 0xb8;

/// Three Utf8 entries, a Class, a NameAndType and a Methodref.
const INJECTED_CONSTANTS: u16 = 6;

fn injected_constants(base: u16) -> Vec<u8> {
    let mut out = Vec::new();
    for text in [INJECTOR_CLASS, INJECT_METHOD, INJECT_DESCRIPTOR] {
        out.push(TAG_UTF8);
        out.extend_from_slice(&(text.len() as u16).to_be_bytes());
        out.extend_from_slice(text.as_bytes());
    }
    out.push(TAG_CLASS);
    out.extend_from_slice(&base.to_be_bytes());
    out.push(TAG_NAME_AND_TYPE);
    out.extend_from_slice(&(base + 1).to_be_bytes());
    out.extend_from_slice(&(base + 2).to_be_bytes());
    out.push(TAG_METHODREF);
    out.extend_from_slice(&(base + 3).to_be_bytes());
    out.extend_from_slice(&(base + 4).to_be_bytes());
    out
}

fn write_u16(out: &mut [u8], at: usize, value: u16) {
    out[at..at + 2].copy_from_slice(&value.to_be_bytes());
}

fn write_u32(out: &mut [u8], at: usize, value: u32) {
    out[at..at + 4].copy_from_slice(&value.to_be_bytes());
}

/// Rewrites a class payload so that every constructor calls the injection
/// routine right after invoking its superclass constructor.
///
/// A class without [`DEPENDENCY_MARKER`] in its constant pool is returned
/// unchanged as [`Cow::Borrowed`]. A marked class gets six constants appended
/// to its pool and a four-byte call (`aload_0`, `invokestatic` plus a
/// two-byte method reference) spliced into each constructor, with the
/// affected length fields bumped to match. The input is never modified.
pub fn rewrite_class(bytes: &[u8]) -> Result<Cow<'_, [u8]>, TransformErrorKind> {
    let Some(info) = read_class(bytes, DEPENDENCY_MARKER)? else {
        return Ok(Cow::Borrowed(bytes));
    };
    if info.constant_count > u16::MAX - INJECTED_CONSTANTS {
        return Err(TransformErrorKind::ConstantTableFull {
            count: info.constant_count,
        });
    }

    let constants = injected_constants(info.constant_count);
    let methodref = info.constant_count + INJECTED_CONSTANTS - 1;
    let call = [OP_ALOAD_0, OP_INVOKESTATIC, (methodref >> 8) as u8, methodref as u8];

    let mut out = Vec::with_capacity(bytes.len() + constants.len() + call.len() * info.constructors.len());
    out.extend_from_slice(&bytes[..info.constants_end]);
    write_u16(&mut out, CONSTANT_COUNT_AT, info.constant_count + INJECTED_CONSTANTS);
    out.extend_from_slice(&constants);

    let mut copied = info.constants_end;
    for (ordinal, code) in info.constructors.iter().enumerate() {
        out.extend_from_slice(&bytes[copied..code.splice_at]);
        out.extend_from_slice(&call);
        copied = code.splice_at;

        // length fields sit before the splice point, so they are in `out`
        // already, shifted by everything inserted so far
        let shift = constants.len() + call.len() * ordinal;
        write_u32(&mut out, code.attribute_length_at + shift, code.attribute_length + call.len() as u32);
        write_u32(&mut out, code.code_length_at + shift, code.code_length + call.len() as u32);
    }
    out.extend_from_slice(&bytes[copied..]);

    debug!(constructors = info.constructors.len(), "Rewrote class payload");
    Ok(Cow::Owned(out))
}
