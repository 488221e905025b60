use alloc::vec::Vec;

use crate::errors::TransformErrorKind;

const INIT_NAME: &[u8] = b"<init>";
const CODE_ATTRIBUTE: &[u8] = b"Code";

pub(crate) const OP_INVOKESPECIAL: u8 = 0xb7;

/// Offset of the constant pool count, right after the fixed 8-byte header.
pub(crate) const CONSTANT_COUNT_AT: usize = 8;

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    const fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take(&mut self, len: usize, section: &'static str) -> Result<&'a [u8], TransformErrorKind> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.bytes.len())
            .ok_or(TransformErrorKind::Truncated {
                section,
                offset: self.pos,
                needed: len,
            })?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn skip(&mut self, len: usize, section: &'static str) -> Result<(), TransformErrorKind> {
        self.take(len, section).map(drop)
    }

    fn u8(&mut self, section: &'static str) -> Result<u8, TransformErrorKind> {
        Ok(self.take(1, section)?[0])
    }

    fn u16(&mut self, section: &'static str) -> Result<u16, TransformErrorKind> {
        let bytes = self.take(2, section)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    fn u32(&mut self, section: &'static str) -> Result<u32, TransformErrorKind> {
        let bytes = self.take(4, section)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }
}

/// Location of one constructor's code: where its length fields sit and where
/// the injection call has to be spliced in.
pub(crate) struct CodeInfo {
    pub(crate) attribute_length_at: usize,
    pub(crate) attribute_length: u32,
    pub(crate) code_length_at: usize,
    pub(crate) code_length: u32,
    /// First offset after the superclass constructor call and its operands.
    pub(crate) splice_at: usize,
}

pub(crate) struct ClassInfo {
    pub(crate) constant_count: u16,
    pub(crate) constants_end: usize,
    pub(crate) constructors: Vec<CodeInfo>,
}

/// Single forward pass over a class payload. Returns `None` when the marker
/// string is absent from the constant pool, without touching the sections
/// after it.
pub(crate) fn read_class(bytes: &[u8], marker: &str) -> Result<Option<ClassInfo>, TransformErrorKind> {
    let mut cursor = Cursor::new(bytes);
    cursor.skip(CONSTANT_COUNT_AT, "header")?;
    let constant_count = cursor.u16("constant pool count")?;

    let mut init_index = None;
    let mut code_index = None;
    let mut has_marker = false;

    let mut index: u16 = 1;
    while index < constant_count {
        let tag = cursor.u8("constant tag")?;
        match tag {
            // Class, String, MethodType, Module, Package
            7 | 8 | 16 | 19 | 20 => cursor.skip(2, "constant")?,
            // MethodHandle
            15 => cursor.skip(3, "constant")?,
            // refs, NameAndType, Integer, Float, Dynamic, InvokeDynamic
            3 | 4 | 9 | 10 | 11 | 12 | 17 | 18 => cursor.skip(4, "constant")?,
            // Long and Double take two constant pool slots
            5 | 6 => {
                cursor.skip(8, "constant")?;
                index += 1;
            }
            1 => {
                let len = cursor.u16("utf8 length")? as usize;
                let text = cursor.take(len, "utf8 constant")?;
                if text == INIT_NAME {
                    init_index = Some(index);
                } else if text == CODE_ATTRIBUTE {
                    code_index = Some(index);
                } else if text == marker.as_bytes() {
                    has_marker = true;
                }
            }
            _ => return Err(TransformErrorKind::UnknownConstantTag { tag, index }),
        }
        index += 1;
    }
    let constants_end = cursor.pos;

    if !has_marker {
        return Ok(None);
    }

    cursor.skip(6, "class header")?;
    let interface_count = cursor.u16("interfaces")?;
    cursor.skip(2 * interface_count as usize, "interfaces")?;

    let field_count = cursor.u16("fields")?;
    for _ in 0..field_count {
        cursor.skip(6, "field")?;
        let attribute_count = cursor.u16("field attributes")?;
        for _ in 0..attribute_count {
            cursor.skip(2, "attribute name")?;
            let length = cursor.u32("attribute length")?;
            cursor.skip(length as usize, "attribute payload")?;
        }
    }

    let mut constructors = Vec::new();
    let method_count = cursor.u16("methods")?;
    for _ in 0..method_count {
        cursor.skip(2, "method access")?;
        let name_index = cursor.u16("method name")?;
        cursor.skip(2, "method descriptor")?;
        let attribute_count = cursor.u16("method attributes")?;

        let is_constructor = init_index.is_some_and(|init| name_index == init);
        let mut code = None;
        for _ in 0..attribute_count {
            let attribute_name = cursor.u16("attribute name")?;
            let attribute_length_at = cursor.pos;
            let attribute_length = cursor.u32("attribute length")?;

            if is_constructor && code_index.is_some_and(|idx| attribute_name == idx) {
                cursor.skip(4, "code header")?;
                let code_length_at = cursor.pos;
                let code_length = cursor.u32("code length")?;
                let body = cursor.take(code_length as usize, "code")?;

                let invoke_at = body
                    .iter()
                    .position(|op| *op == OP_INVOKESPECIAL)
                    .ok_or(TransformErrorKind::MissingSuperInvoke)?;
                if invoke_at + 3 > body.len() {
                    return Err(TransformErrorKind::Truncated {
                        section: "code",
                        offset: code_length_at + 4 + invoke_at,
                        needed: 3,
                    });
                }

                code = Some(CodeInfo {
                    attribute_length_at,
                    attribute_length,
                    code_length_at,
                    code_length,
                    splice_at: code_length_at + 4 + invoke_at + 3,
                });

                // exception table and nested attributes
                let consumed = 4 + 4 + code_length as usize;
                let rest = (attribute_length as usize)
                    .checked_sub(consumed)
                    .ok_or(TransformErrorKind::Truncated {
                        section: "code attribute",
                        offset: cursor.pos,
                        needed: consumed,
                    })?;
                cursor.skip(rest, "code attribute")?;
            } else {
                cursor.skip(attribute_length as usize, "attribute payload")?;
            }
        }

        if is_constructor {
            constructors.push(code.ok_or(TransformErrorKind::MissingSuperInvoke)?);
        }
    }

    let attribute_count = cursor.u16("class attributes")?;
    for _ in 0..attribute_count {
        cursor.skip(2, "attribute name")?;
        let length = cursor.u32("attribute length")?;
        cursor.skip(length as usize, "attribute payload")?;
    }

    Ok(Some(ClassInfo {
        constant_count,
        constants_end,
        constructors,
    }))
}
