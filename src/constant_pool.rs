//! Constant pool decoding and symbolic lookups.
use crate::error::ClassFormatError;
use crate::jvm::ClassReader;

type Result<T> = std::result::Result<T, ClassFormatError>;

const CONSTANT_UTF8: u8 = 1;
const CONSTANT_INTEGER: u8 = 3;
const CONSTANT_FLOAT: u8 = 4;
const CONSTANT_LONG: u8 = 5;
const CONSTANT_DOUBLE: u8 = 6;
const CONSTANT_CLASS: u8 = 7;
const CONSTANT_STRING: u8 = 8;
const CONSTANT_FIELD_REF: u8 = 9;
const CONSTANT_METHOD_REF: u8 = 10;
const CONSTANT_INTERFACE_METHOD_REF: u8 = 11;
const CONSTANT_NAME_AND_TYPE: u8 = 12;
const CONSTANT_METHOD_HANDLE: u8 = 15;
const CONSTANT_METHOD_TYPE: u8 = 16;
const CONSTANT_DYNAMIC: u8 = 17;
const CONSTANT_INVOKE_DYNAMIC: u8 = 18;
const CONSTANT_MODULE: u8 = 19;
const CONSTANT_PACKAGE: u8 = 20;

/// A single constant pool entry.
#[derive(Debug, Clone, PartialEq)]
pub enum CPInfo {
    ConstantUtf8 { bytes: String },
    ConstantInteger { value: i32 },
    ConstantFloat { value: f32 },
    ConstantLong { value: i64 },
    ConstantDouble { value: f64 },
    ConstantClass { name_index: u16 },
    ConstantString { string_index: u16 },
    ConstantFieldRef { class_index: u16, name_and_type_index: u16 },
    ConstantMethodRef { class_index: u16, name_and_type_index: u16 },
    ConstantInterfaceMethodRef { class_index: u16, name_and_type_index: u16 },
    ConstantNameAndType { name_index: u16, descriptor_index: u16 },
    ConstantMethodHandle { reference_kind: u8, reference_index: u16 },
    ConstantMethodType { descriptor_index: u16 },
    ConstantDynamic { bootstrap_method_attr_index: u16, name_and_type_index: u16 },
    ConstantInvokeDynamic { bootstrap_method_attr_index: u16, name_and_type_index: u16 },
    ConstantModule { name_index: u16 },
    ConstantPackage { name_index: u16 },
}

/// Parsed constant pool. Indices are 1-based; index 0 and the slot following
/// a long or double are unusable.
#[derive(Debug, Clone, Default)]
pub struct ConstantPool {
    entries: Vec<Option<CPInfo>>,
}

impl ConstantPool {
    /// Parse the `constant_pool_count` and the entries that follow it.
    pub fn parse(reader: &mut ClassReader) -> Result<Self> {
        let count = reader.read_u2()?;
        let mut entries = vec![None];
        while entries.len() < count as usize {
            let index = entries.len() as u16;
            let entry = Self::parse_entry(reader, index)?;
            let wide = matches!(
                entry,
                CPInfo::ConstantLong { .. } | CPInfo::ConstantDouble { .. }
            );
            entries.push(Some(entry));
            if wide {
                entries.push(None);
            }
        }
        Ok(Self { entries })
    }

    fn parse_entry(reader: &mut ClassReader, index: u16) -> Result<CPInfo> {
        let offset = reader.offset();
        let tag = reader.read_u1()?;
        let entry = match tag {
            CONSTANT_UTF8 => {
                let length = reader.read_u2()?;
                let raw = reader.read_bytes(length as usize)?;
                CPInfo::ConstantUtf8 {
                    bytes: decode_modified_utf8(raw)
                        .ok_or(ClassFormatError::InvalidUtf8 { index })?,
                }
            }
            CONSTANT_INTEGER => CPInfo::ConstantInteger {
                value: reader.read_u4()? as i32,
            },
            CONSTANT_FLOAT => CPInfo::ConstantFloat {
                value: f32::from_bits(reader.read_u4()?),
            },
            CONSTANT_LONG => {
                let high = u64::from(reader.read_u4()?);
                let low = u64::from(reader.read_u4()?);
                CPInfo::ConstantLong {
                    value: ((high << 32) | low) as i64,
                }
            }
            CONSTANT_DOUBLE => {
                let high = u64::from(reader.read_u4()?);
                let low = u64::from(reader.read_u4()?);
                CPInfo::ConstantDouble {
                    value: f64::from_bits((high << 32) | low),
                }
            }
            CONSTANT_CLASS => CPInfo::ConstantClass {
                name_index: reader.read_u2()?,
            },
            CONSTANT_STRING => CPInfo::ConstantString {
                string_index: reader.read_u2()?,
            },
            CONSTANT_FIELD_REF => CPInfo::ConstantFieldRef {
                class_index: reader.read_u2()?,
                name_and_type_index: reader.read_u2()?,
            },
            CONSTANT_METHOD_REF => CPInfo::ConstantMethodRef {
                class_index: reader.read_u2()?,
                name_and_type_index: reader.read_u2()?,
            },
            CONSTANT_INTERFACE_METHOD_REF => CPInfo::ConstantInterfaceMethodRef {
                class_index: reader.read_u2()?,
                name_and_type_index: reader.read_u2()?,
            },
            CONSTANT_NAME_AND_TYPE => CPInfo::ConstantNameAndType {
                name_index: reader.read_u2()?,
                descriptor_index: reader.read_u2()?,
            },
            CONSTANT_METHOD_HANDLE => CPInfo::ConstantMethodHandle {
                reference_kind: reader.read_u1()?,
                reference_index: reader.read_u2()?,
            },
            CONSTANT_METHOD_TYPE => CPInfo::ConstantMethodType {
                descriptor_index: reader.read_u2()?,
            },
            CONSTANT_DYNAMIC => CPInfo::ConstantDynamic {
                bootstrap_method_attr_index: reader.read_u2()?,
                name_and_type_index: reader.read_u2()?,
            },
            CONSTANT_INVOKE_DYNAMIC => CPInfo::ConstantInvokeDynamic {
                bootstrap_method_attr_index: reader.read_u2()?,
                name_and_type_index: reader.read_u2()?,
            },
            CONSTANT_MODULE => CPInfo::ConstantModule {
                name_index: reader.read_u2()?,
            },
            CONSTANT_PACKAGE => CPInfo::ConstantPackage {
                name_index: reader.read_u2()?,
            },
            tag => return Err(ClassFormatError::UnknownConstantTag { tag, offset }),
        };
        Ok(entry)
    }

    /// Number of index slots, including the unusable slot 0.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.len() <= 1
    }

    /// Returns the entry at `index`.
    pub fn get(&self, index: u16) -> Result<&CPInfo> {
        self.entries
            .get(index as usize)
            .and_then(Option::as_ref)
            .ok_or(ClassFormatError::BadConstantIndex { index })
    }

    /// Resolve a `CONSTANT_Utf8` entry.
    pub fn utf8(&self, index: u16) -> Result<&str> {
        match self.get(index)? {
            CPInfo::ConstantUtf8 { bytes } => Ok(bytes),
            _ => Err(ClassFormatError::UnexpectedConstant {
                index,
                expected: "Utf8",
            }),
        }
    }

    /// Resolve a `CONSTANT_Class` entry to its internal class name.
    pub fn class_name(&self, index: u16) -> Result<&str> {
        match self.get(index)? {
            CPInfo::ConstantClass { name_index } => self.utf8(*name_index),
            _ => Err(ClassFormatError::UnexpectedConstant {
                index,
                expected: "Class",
            }),
        }
    }

    /// Resolve a `CONSTANT_NameAndType` entry to its name and descriptor.
    pub fn name_and_type(&self, index: u16) -> Result<(&str, &str)> {
        match self.get(index)? {
            CPInfo::ConstantNameAndType {
                name_index,
                descriptor_index,
            } => Ok((self.utf8(*name_index)?, self.utf8(*descriptor_index)?)),
            _ => Err(ClassFormatError::UnexpectedConstant {
                index,
                expected: "NameAndType",
            }),
        }
    }

    /// Resolve a field, method or interface method reference into
    /// `(class, name, descriptor)`.
    pub fn member_ref(&self, index: u16) -> Result<(&str, &str, &str)> {
        match self.get(index)? {
            CPInfo::ConstantFieldRef {
                class_index,
                name_and_type_index,
            }
            | CPInfo::ConstantMethodRef {
                class_index,
                name_and_type_index,
            }
            | CPInfo::ConstantInterfaceMethodRef {
                class_index,
                name_and_type_index,
            } => {
                let class = self.class_name(*class_index)?;
                let (name, descriptor) = self.name_and_type(*name_and_type_index)?;
                Ok((class, name, descriptor))
            }
            _ => Err(ClassFormatError::UnexpectedConstant {
                index,
                expected: "member reference",
            }),
        }
    }
}

/// Decode the JVM's modified UTF-8: `0xC0 0x80` encodes NUL and
/// supplementary characters arrive as surrogate pairs.
fn decode_modified_utf8(bytes: &[u8]) -> Option<String> {
    if let Ok(s) = std::str::from_utf8(bytes) {
        return Some(s.to_string());
    }
    let mut units = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let a = u16::from(bytes[i]);
        if a & 0x80 == 0 {
            units.push(a);
            i += 1;
        } else if a & 0xe0 == 0xc0 {
            let b = u16::from(*bytes.get(i + 1)?);
            units.push(((a & 0x1f) << 6) | (b & 0x3f));
            i += 2;
        } else if a & 0xf0 == 0xe0 {
            let b = u16::from(*bytes.get(i + 1)?);
            let c = u16::from(*bytes.get(i + 2)?);
            units.push(((a & 0x0f) << 12) | ((b & 0x3f) << 6) | (c & 0x3f));
            i += 3;
        } else {
            return None;
        }
    }
    char::decode_utf16(units).collect::<std::result::Result<String, _>>().ok()
}
