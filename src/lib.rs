//! A small JVM core: class file parsing, a lazily populated class registry,
//! member resolution along the inheritance chain, static initialization and
//! a trampoline-driven call stack with a bridge for host-initiated calls.
pub mod class;
pub mod config;
pub mod constant_pool;
pub mod descriptor;
pub mod error;
pub mod interpreter;
pub mod jvm;
pub mod member;
pub mod registry;
pub mod runtime;
pub mod stack;
pub mod value;

#[cfg(test)]
mod fixtures;

pub use class::{Class, InitState};
pub use config::VmConfig;
pub use error::{ClassFormatError, VmError};
pub use interpreter::{ExecutionEngine, Guarded, MethodBody};
pub use registry::{ClassLoader, ClassRegistry, DirectoryLoader, MemoryLoader};
pub use runtime::{Runtime, Step};
pub use stack::{CallStack, ControlToken, Frame, ProgramCounter};
pub use value::{JavaObject, ObjectRef, Value};
