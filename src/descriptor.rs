//! Field and method descriptor decoding.
use crate::error::ClassFormatError;
use crate::value::Value;

use once_cell::sync::Lazy;
use regex::Regex;

type Result<T> = std::result::Result<T, ClassFormatError>;

static METHOD_DESCRIPTOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\(([^)]*)\)(.+)$").expect("method descriptor pattern"));

/// Primitive and reference types supported by the JVM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BaseTypeKind {
    Boolean,
    Byte,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
    Void,
    Reference(String),
    Array(Box<BaseTypeKind>),
}

impl BaseTypeKind {
    /// Returns the size in local variable slots of a given type.
    pub fn size(&self) -> usize {
        match self {
            Self::Void => 0,
            Self::Long | Self::Double => 2,
            _ => 1,
        }
    }

    /// Zero value a freshly created field of this type holds.
    pub fn default_value(&self) -> Value {
        match self {
            Self::Boolean | Self::Byte | Self::Char | Self::Short | Self::Int => Value::Int(0),
            Self::Long => Value::Long(0),
            Self::Float => Value::Float(0.0),
            Self::Double => Value::Double(0.0),
            Self::Void | Self::Reference(_) | Self::Array(_) => Value::Null,
        }
    }

    /// Decode a field descriptor such as `I` or `[Ljava/lang/String;`.
    pub fn parse_field(descriptor: &str) -> Result<Self> {
        match decode_type(descriptor)? {
            (Self::Void, _) => Err(invalid(descriptor)),
            (t, len) if len == descriptor.len() => Ok(t),
            _ => Err(invalid(descriptor)),
        }
    }
}

/// Decoded method descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDescriptor {
    pub arg_types: Vec<BaseTypeKind>,
    pub return_type: BaseTypeKind,
}

impl MethodDescriptor {
    /// Parse a method descriptor, returning argument types and return type.
    pub fn parse(descriptor: &str) -> Result<Self> {
        let caps = METHOD_DESCRIPTOR
            .captures(descriptor)
            .ok_or_else(|| invalid(descriptor))?;
        let arg_string = caps.get(1).map_or("", |m| m.as_str());
        let return_string = caps.get(2).map_or("", |m| m.as_str());

        let (return_type, len) = decode_type(return_string)?;
        if len != return_string.len() {
            return Err(invalid(descriptor));
        }

        let mut arg_types = Vec::new();
        let mut rest = arg_string;
        while !rest.is_empty() {
            let (t, len) = decode_type(rest)?;
            if t == BaseTypeKind::Void {
                return Err(invalid(descriptor));
            }
            arg_types.push(t);
            rest = &rest[len..];
        }
        Ok(Self {
            arg_types,
            return_type,
        })
    }

    /// True unless the method returns `void`.
    pub fn returns_value(&self) -> bool {
        self.return_type != BaseTypeKind::Void
    }

    /// Local variable slots taken by the declared arguments.
    pub fn arg_slots(&self) -> usize {
        self.arg_types.iter().map(BaseTypeKind::size).sum()
    }
}

/// Decodes the type at the start of `s`, returning it along with the number
/// of bytes its representation took.
fn decode_type(s: &str) -> Result<(BaseTypeKind, usize)> {
    let first = s.chars().next().ok_or_else(|| invalid(s))?;
    let t = match first {
        'Z' => BaseTypeKind::Boolean,
        'B' => BaseTypeKind::Byte,
        'C' => BaseTypeKind::Char,
        'S' => BaseTypeKind::Short,
        'I' => BaseTypeKind::Int,
        'J' => BaseTypeKind::Long,
        'F' => BaseTypeKind::Float,
        'D' => BaseTypeKind::Double,
        'V' => BaseTypeKind::Void,
        'L' => {
            let end = s.find(';').ok_or_else(|| invalid(s))?;
            if end == 1 {
                return Err(invalid(s));
            }
            return Ok((BaseTypeKind::Reference(s[1..end].to_string()), end + 1));
        }
        '[' => {
            let (component, len) = decode_type(&s[1..])?;
            if component == BaseTypeKind::Void {
                return Err(invalid(s));
            }
            return Ok((BaseTypeKind::Array(Box::new(component)), len + 1));
        }
        _ => return Err(invalid(s)),
    };
    Ok((t, 1))
}

fn invalid(descriptor: &str) -> ClassFormatError {
    ClassFormatError::InvalidDescriptor(descriptor.to_string())
}
