//! Error types for class loading and execution.
use crate::value::Value;

use thiserror::Error;

/// Failures while decoding a class file buffer.
#[derive(Debug, Error)]
pub enum ClassFormatError {
    #[error("unexpected end of class data at offset {offset}")]
    UnexpectedEof { offset: usize },

    #[error("unsupported read width of {0} bytes")]
    UnsupportedWidth(usize),

    #[error("bad magic value {found:#010x}, expected 0xcafebabe")]
    BadMagic { found: u32 },

    #[error("constant pool index {index} is out of range")]
    BadConstantIndex { index: u16 },

    #[error("unknown constant pool tag {tag} at offset {offset}")]
    UnknownConstantTag { tag: u8, offset: usize },

    #[error("constant pool entry {index} is not a {expected}")]
    UnexpectedConstant { index: u16, expected: &'static str },

    #[error("malformed modified UTF-8 in constant pool entry {index}")]
    InvalidUtf8 { index: u16 },

    #[error("invalid descriptor `{0}`")]
    InvalidDescriptor(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Failures raised by the class registry, the resolver and the call engine.
///
/// `Thrown` is the only variant that represents a guest exception; every other
/// variant is a host condition that guest handlers never see.
#[derive(Debug, Error)]
pub enum VmError {
    #[error(transparent)]
    Format(#[from] ClassFormatError),

    #[error("class not found: {0}")]
    ClassNotFound(String),

    #[error("class {0} is already defined")]
    DuplicateClass(String),

    #[error("class {0} is reserved but not yet fully loaded")]
    ClassNotReady(String),

    #[error("method not found: {class}.{name}{descriptor}")]
    MethodNotFound {
        class: String,
        name: String,
        descriptor: String,
    },

    #[error("field not found: {class}.{name}:{descriptor}")]
    FieldNotFound {
        class: String,
        name: String,
        descriptor: String,
    },

    #[error("static initialization of {0} failed earlier")]
    InitializationFailed(String),

    #[error("no executable body is bound for {0}")]
    NoExecutableBody(String),

    #[error("frame for {0} has no pending control token")]
    MissingControlToken(String),

    #[error("operand stack underflow in {0}")]
    StackUnderflow(String),

    #[error("call stack is empty")]
    EmptyCallStack,

    #[error("call stack exceeded {0} frames")]
    StackOverflow(usize),

    #[error("{method} does not match its descriptor on return")]
    ReturnMismatch { method: String },

    #[error("guest exception of type {}", .0.type_name())]
    Thrown(Value),
}

impl VmError {
    /// Returns true if the error is a guest exception that guest handlers may
    /// still catch.
    pub fn is_guest(&self) -> bool {
        matches!(self, Self::Thrown(_))
    }
}
