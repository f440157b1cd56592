//! Executable method bodies.
//!
//! The call-control engine treats a method body as opaque: it is entered at a
//! program counter, either to run normally or to look for an exception
//! handler. Bytecode interpreters plug in through `ExecutionEngine`; host code
//! binds native bodies directly on the runtime.
use crate::error::VmError;
use crate::member::MethodInfo;
use crate::runtime::Runtime;
use crate::stack::ProgramCounter;
use crate::value::Value;

use std::rc::Rc;

type Result<T> = std::result::Result<T, VmError>;

/// Executable body of a method.
///
/// A body runs until it either schedules what happens next for its frame
/// (`Runtime::create_resume` followed by `Runtime::create_call`, or
/// `Runtime::create_return`) or raises with `Runtime::throw_exception`.
pub trait MethodBody {
    /// Run the method starting at `pc`.
    fn execute(&self, rt: &mut Runtime, pc: ProgramCounter) -> Result<()>;

    /// Program counter of the handler covering `pc` for `exception`, if any.
    fn handle_exception(
        &self,
        _rt: &mut Runtime,
        _pc: ProgramCounter,
        _exception: &Value,
    ) -> Result<Option<ProgramCounter>> {
        Ok(None)
    }
}

impl<F> MethodBody for F
where
    F: Fn(&mut Runtime, ProgramCounter) -> Result<()>,
{
    fn execute(&self, rt: &mut Runtime, pc: ProgramCounter) -> Result<()> {
        self(rt, pc)
    }
}

/// Supplies bodies for methods that have no native binding, typically by
/// interpreting their `Code` attribute.
pub trait ExecutionEngine {
    fn body_for(&self, method: &MethodInfo) -> Option<Rc<dyn MethodBody>>;
}

/// One entry of an exception handler table. Covers `start <= pc < end`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionHandler {
    pub start: ProgramCounter,
    pub end: ProgramCounter,
    pub target: ProgramCounter,
    /// Class caught; `None` catches everything.
    pub catch_type: Option<String>,
}

/// Wraps a body with an exception handler table.
pub struct Guarded<B> {
    body: B,
    handlers: Vec<ExceptionHandler>,
}

impl<B: MethodBody> Guarded<B> {
    pub fn new(body: B) -> Self {
        Self {
            body,
            handlers: Vec::new(),
        }
    }

    pub fn catching(
        mut self,
        start: usize,
        end: usize,
        target: usize,
        catch_type: Option<&str>,
    ) -> Self {
        self.handlers.push(ExceptionHandler {
            start: ProgramCounter::new(start),
            end: ProgramCounter::new(end),
            target: ProgramCounter::new(target),
            catch_type: catch_type.map(str::to_string),
        });
        self
    }
}

impl<B: MethodBody> MethodBody for Guarded<B> {
    fn execute(&self, rt: &mut Runtime, pc: ProgramCounter) -> Result<()> {
        self.body.execute(rt, pc)
    }

    fn handle_exception(
        &self,
        rt: &mut Runtime,
        pc: ProgramCounter,
        exception: &Value,
    ) -> Result<Option<ProgramCounter>> {
        for handler in &self.handlers {
            if pc < handler.start || pc >= handler.end {
                continue;
            }
            let Some(catch_type) = handler.catch_type.as_deref() else {
                return Ok(Some(handler.target));
            };
            let Some(object) = exception.as_object() else {
                continue;
            };
            let class = Rc::clone(object.borrow().class());
            if class.name() == catch_type || class.is_a(rt.registry_mut(), catch_type)? {
                return Ok(Some(handler.target));
            }
        }
        Ok(None)
    }
}
