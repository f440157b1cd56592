//! Call stack, frames and the control tokens that drive the trampoline.
use crate::error::VmError;
use crate::member::MethodInfo;
use crate::value::Value;

use std::fmt;
use std::rc::Rc;

type Result<T> = std::result::Result<T, VmError>;

/// Program counter within the bytecode of the current method.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramCounter(usize);

impl ProgramCounter {
    /// Entry point of every method.
    pub const START: ProgramCounter = ProgramCounter(0);
    /// Out-of-band value used while host code is driving a guest call.
    pub const NATIVE: ProgramCounter = ProgramCounter(usize::MAX);

    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    pub const fn index(self) -> usize {
        self.0
    }

    pub fn is_native(self) -> bool {
        self == Self::NATIVE
    }
}

impl fmt::Display for ProgramCounter {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.is_native() {
            write!(f, "native")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// What to do next for a frame.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlToken {
    /// Fresh invocation; arguments are already in the locals.
    Call,
    /// Continue a suspended frame at `pc`.
    Resume { pc: ProgramCounter },
    /// Search the frame's handlers for one covering `pc`.
    Exception { pc: ProgramCounter, exception: Value },
    /// Pop the frame, handing its return value to the caller.
    Return,
}

impl ControlToken {
    fn kind(&self) -> &'static str {
        match self {
            Self::Call => "Call",
            Self::Resume { .. } => "Resume",
            Self::Exception { .. } => "Exception",
            Self::Return => "Return",
        }
    }

    fn pc(&self) -> ProgramCounter {
        match self {
            Self::Resume { pc } | Self::Exception { pc, .. } => *pc,
            Self::Call | Self::Return => ProgramCounter::START,
        }
    }
}

impl fmt::Display for ControlToken {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "[MethodRun {} {}]", self.kind(), self.pc())
    }
}

/// Execution record of one in-progress method call.
#[derive(Debug)]
pub struct Frame {
    method: Rc<MethodInfo>,
    locals: Vec<Option<Value>>,
    operands: Vec<Value>,
    tokens: Vec<ControlToken>,
    invoker_pc: ProgramCounter,
    boundary: bool,
}

impl Frame {
    /// Frame for a guest invocation of `method` issued while the caller was
    /// at `invoker_pc`.
    pub fn new(method: Rc<MethodInfo>, invoker_pc: ProgramCounter) -> Self {
        Self {
            method,
            locals: Vec::new(),
            operands: Vec::new(),
            tokens: Vec::new(),
            invoker_pc,
            boundary: false,
        }
    }

    /// Placeholder frame isolating a host-initiated call from the frames
    /// beneath it.
    pub fn boundary(method: Rc<MethodInfo>, invoker_pc: ProgramCounter) -> Self {
        Self {
            boundary: true,
            ..Self::new(method, invoker_pc)
        }
    }

    pub fn method(&self) -> &Rc<MethodInfo> {
        &self.method
    }

    pub fn is_boundary(&self) -> bool {
        self.boundary
    }

    /// Program counter of the caller when this frame was pushed.
    pub fn invoker_pc(&self) -> ProgramCounter {
        self.invoker_pc
    }

    pub fn push(&mut self, value: Value) {
        self.operands.push(value);
    }

    pub fn pop(&mut self) -> Result<Value> {
        self.operands
            .pop()
            .ok_or_else(|| VmError::StackUnderflow(self.method.qualified_name()))
    }

    pub fn peek(&self) -> Option<&Value> {
        self.operands.last()
    }

    /// Number of values on the operand area.
    pub fn depth(&self) -> usize {
        self.operands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operands.is_empty()
    }

    pub fn clear_operands(&mut self) {
        self.operands.clear();
    }

    /// Stores `value` at `index`; a wide value also claims `index + 1`.
    pub fn set_local(&mut self, index: usize, value: Value) {
        let width = value.width();
        if self.locals.len() < index + width {
            self.locals.resize(index + width, None);
        }
        if width == 2 {
            self.locals[index + 1] = None;
        }
        self.locals[index] = Some(value);
    }

    pub fn local(&self, index: usize) -> Option<&Value> {
        self.locals.get(index).and_then(Option::as_ref)
    }

    /// Number of local variable slots in use.
    pub fn locals_len(&self) -> usize {
        self.locals.len()
    }

    pub fn push_token(&mut self, token: ControlToken) {
        self.tokens.push(token);
    }

    pub fn pop_token(&mut self) -> Option<ControlToken> {
        self.tokens.pop()
    }

    pub fn peek_token(&self) -> Option<&ControlToken> {
        self.tokens.last()
    }
}

/// Ordered sequence of frames; the last one is the current frame.
#[derive(Debug)]
pub struct CallStack {
    frames: Vec<Frame>,
    max_depth: usize,
}

impl CallStack {
    pub fn new(max_depth: usize) -> Self {
        Self {
            frames: Vec::new(),
            max_depth,
        }
    }

    pub fn push(&mut self, frame: Frame) -> Result<()> {
        if self.frames.len() >= self.max_depth {
            return Err(VmError::StackOverflow(self.max_depth));
        }
        self.frames.push(frame);
        Ok(())
    }

    pub fn pop(&mut self) -> Option<Frame> {
        self.frames.pop()
    }

    /// Drops frames until at most `depth` remain.
    pub fn truncate(&mut self, depth: usize) {
        self.frames.truncate(depth);
    }

    pub fn current(&self) -> Option<&Frame> {
        self.frames.last()
    }

    pub fn current_mut(&mut self) -> Option<&mut Frame> {
        self.frames.last_mut()
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}
