//! Field and method tables of a class.
use crate::constant_pool::ConstantPool;
use crate::descriptor::{BaseTypeKind, MethodDescriptor};
use crate::error::ClassFormatError;
use crate::jvm::{ClassReader, GenericAttribute};
use crate::value::Value;

use std::cell::{OnceCell, RefCell};
use std::fmt;

type Result<T> = std::result::Result<T, ClassFormatError>;

/// Name of the static initializer.
pub const CLINIT: &str = "<clinit>";
/// Name of instance constructors.
pub const INIT: &str = "<init>";

/// Class access flags and the names they print as, in print order.
pub const CLASS_ACCESS_FLAGS: &[(u16, &str)] = &[
    (0x0001, "public"),
    (0x0010, "final"),
    (0x0020, "super"),
    (0x0200, "interface"),
    (0x0400, "abstract"),
    (0x1000, "synthetic"),
    (0x2000, "annotation"),
    (0x4000, "enum"),
];

pub const FIELD_ACCESS_FLAGS: &[(u16, &str)] = &[
    (0x0001, "public"),
    (0x0002, "private"),
    (0x0004, "protected"),
    (0x0008, "static"),
    (0x0010, "final"),
    (0x0040, "volatile"),
    (0x0080, "transient"),
    (0x1000, "synthetic"),
    (0x4000, "enum"),
];

pub const METHOD_ACCESS_FLAGS: &[(u16, &str)] = &[
    (0x0001, "public"),
    (0x0002, "private"),
    (0x0004, "protected"),
    (0x0008, "static"),
    (0x0010, "final"),
    (0x0020, "synchronized"),
    (0x0040, "bridge"),
    (0x0080, "varargs"),
    (0x0100, "native"),
    (0x0400, "abstract"),
    (0x0800, "strict"),
    (0x1000, "synthetic"),
];

pub const ACC_STATIC: u16 = 0x0008;

/// Names of the flags in `table` set in `flags`.
pub fn flag_names(flags: u16, table: &[(u16, &'static str)]) -> Vec<&'static str> {
    table
        .iter()
        .filter(|(mask, _)| flags & mask == *mask)
        .map(|(_, name)| *name)
        .collect()
}

/// Parsed `field_info`.
///
/// Instance fields act as templates copied into each new object. Static
/// fields keep their live value here.
#[derive(Debug)]
pub struct FieldInfo {
    class_name: String,
    pub name: String,
    pub descriptor: String,
    pub access_flags: u16,
    pub attributes: Vec<GenericAttribute>,
    field_type: BaseTypeKind,
    default_value: OnceCell<Value>,
    static_value: RefCell<Option<Value>>,
}

impl FieldInfo {
    pub fn parse(reader: &mut ClassReader, pool: &ConstantPool, class_name: &str) -> Result<Self> {
        let access_flags = reader.read_u2()?;
        let name = pool.utf8(reader.read_u2()?)?.to_string();
        let descriptor = pool.utf8(reader.read_u2()?)?.to_string();
        let field_type = BaseTypeKind::parse_field(&descriptor)?;
        let attributes = GenericAttribute::parse_list(reader, pool)?;
        Ok(Self {
            class_name: class_name.to_string(),
            name,
            descriptor,
            access_flags,
            attributes,
            field_type,
            default_value: OnceCell::new(),
            static_value: RefCell::new(None),
        })
    }

    /// Name of the declaring class.
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn has_flag(&self, mask: u16) -> bool {
        self.access_flags & mask == mask
    }

    pub fn is_static(&self) -> bool {
        self.has_flag(ACC_STATIC)
    }

    pub fn field_type(&self) -> &BaseTypeKind {
        &self.field_type
    }

    /// Computes the default value once. Static fields start out holding it.
    pub(crate) fn initialize_default_value(&self) {
        let value = self.default_value.get_or_init(|| self.field_type.default_value());
        if self.is_static() {
            let mut slot = self.static_value.borrow_mut();
            if slot.is_none() {
                *slot = Some(value.clone());
            }
        }
    }

    pub fn default_value(&self) -> Value {
        self.default_value
            .get_or_init(|| self.field_type.default_value())
            .clone()
    }

    /// Current value of a static field.
    pub fn value(&self) -> Value {
        self.static_value
            .borrow()
            .clone()
            .unwrap_or_else(|| self.default_value())
    }

    pub fn set_value(&self, value: Value) {
        *self.static_value.borrow_mut() = Some(value);
    }
}

impl fmt::Display for FieldInfo {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "\t")?;
        for flag in flag_names(self.access_flags, FIELD_ACCESS_FLAGS) {
            write!(f, "{flag} ")?;
        }
        write!(f, "{} {}", self.name, self.descriptor)
    }
}

/// Parsed `method_info`. The executable body is bound by the runtime.
#[derive(Debug)]
pub struct MethodInfo {
    class_name: String,
    pub name: String,
    pub descriptor: String,
    pub access_flags: u16,
    pub attributes: Vec<GenericAttribute>,
    signature: MethodDescriptor,
}

impl MethodInfo {
    pub fn parse(reader: &mut ClassReader, pool: &ConstantPool, class_name: &str) -> Result<Self> {
        let access_flags = reader.read_u2()?;
        let name = pool.utf8(reader.read_u2()?)?.to_string();
        let descriptor = pool.utf8(reader.read_u2()?)?.to_string();
        let signature = MethodDescriptor::parse(&descriptor)?;
        let attributes = GenericAttribute::parse_list(reader, pool)?;
        Ok(Self {
            class_name: class_name.to_string(),
            name,
            descriptor,
            access_flags,
            attributes,
            signature,
        })
    }

    /// Name of the declaring class.
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn has_flag(&self, mask: u16) -> bool {
        self.access_flags & mask == mask
    }

    pub fn is_static(&self) -> bool {
        self.has_flag(ACC_STATIC)
    }

    pub fn signature(&self) -> &MethodDescriptor {
        &self.signature
    }

    pub fn returns_value(&self) -> bool {
        self.signature.returns_value()
    }

    pub fn is_clinit(&self) -> bool {
        self.name == CLINIT && self.descriptor == "()V"
    }

    /// Lookup identity: exact name and descriptor text.
    pub fn matches(&self, name: &str, descriptor: &str) -> bool {
        self.name == name && self.descriptor == descriptor
    }

    /// Fully qualified `class.name(descriptor)` form.
    pub fn qualified_name(&self) -> String {
        format!("{}.{}{}", self.class_name, self.name, self.descriptor)
    }
}

impl fmt::Display for MethodInfo {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "\t")?;
        for flag in flag_names(self.access_flags, METHOD_ACCESS_FLAGS) {
            write!(f, "{flag} ")?;
        }
        write!(f, "{}{}", self.name, self.descriptor)
    }
}
