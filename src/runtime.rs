//! JVM runtime module: the execution context that owns the class registry and
//! the call stack, and drives method execution through control tokens.
//!
//! Guest calls never recurse on the host stack. A body that needs to call
//! another method records where it wants to continue (`create_resume`),
//! schedules the callee (`create_call`) and returns; the driver loop then
//! dispatches whatever token sits on top of the current frame.
use crate::class::Class;
use crate::config::VmConfig;
use crate::error::VmError;
use crate::interpreter::{ExecutionEngine, MethodBody};
use crate::member::{MethodInfo, INIT};
use crate::registry::ClassRegistry;
use crate::stack::{CallStack, ControlToken, Frame, ProgramCounter};
use crate::value::{ObjectRef, Value};

use std::collections::HashMap;
use std::rc::Rc;

use tracing::{debug, error, trace};

type Result<T> = std::result::Result<T, VmError>;

/// Outcome of a single driver step.
#[derive(Debug, PartialEq)]
pub enum Step {
    /// A body ran on behalf of the current frame.
    Executed,
    /// A frame returned into its caller.
    Returned,
    /// The outermost frame returned, with its result if any.
    Finished(Option<Value>),
    /// The call stack is empty.
    Idle,
}

/// `Runtime` represents one execution context for guest programs: the
/// registry of loaded classes, the call stack and the current program
/// counter. All mutation is sequential; there is a single logical thread of
/// guest control.
pub struct Runtime {
    config: VmConfig,
    registry: ClassRegistry,
    stack: CallStack,
    pc: ProgramCounter,
    natives: HashMap<String, Rc<dyn MethodBody>>,
    engine: Option<Box<dyn ExecutionEngine>>,
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new(VmConfig::default())
    }
}

impl Runtime {
    pub fn new(config: VmConfig) -> Self {
        let registry = ClassRegistry::new(&config);
        let stack = CallStack::new(config.max_stack_depth);
        Self {
            config,
            registry,
            stack,
            pc: ProgramCounter::START,
            natives: HashMap::new(),
            engine: None,
        }
    }

    pub fn config(&self) -> &VmConfig {
        &self.config
    }

    pub fn registry(&self) -> &ClassRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ClassRegistry {
        &mut self.registry
    }

    pub fn stack(&self) -> &CallStack {
        &self.stack
    }

    pub fn pc(&self) -> ProgramCounter {
        self.pc
    }

    pub fn set_pc(&mut self, pc: ProgramCounter) {
        self.pc = pc;
    }

    pub fn current_frame(&self) -> Result<&Frame> {
        self.stack.current().ok_or(VmError::EmptyCallStack)
    }

    pub fn current_frame_mut(&mut self) -> Result<&mut Frame> {
        self.stack.current_mut().ok_or(VmError::EmptyCallStack)
    }

    /// Binds a host implementation to `class_name.name(descriptor)`.
    pub fn bind_native(
        &mut self,
        class_name: &str,
        name: &str,
        descriptor: &str,
        body: impl MethodBody + 'static,
    ) {
        self.natives
            .insert(format!("{class_name}.{name}{descriptor}"), Rc::new(body));
    }

    /// Same as `bind_native` for a plain closure.
    pub fn bind_native_fn<F>(&mut self, class_name: &str, name: &str, descriptor: &str, body: F)
    where
        F: Fn(&mut Runtime, ProgramCounter) -> Result<()> + 'static,
    {
        self.bind_native(class_name, name, descriptor, body);
    }

    /// Installs the engine consulted for methods without a native binding.
    pub fn set_engine(&mut self, engine: impl ExecutionEngine + 'static) {
        self.engine = Some(Box::new(engine));
    }

    fn body_for(&self, method: &MethodInfo) -> Result<Rc<dyn MethodBody>> {
        let key = method.qualified_name();
        if let Some(body) = self.natives.get(&key) {
            return Ok(Rc::clone(body));
        }
        self.engine
            .as_ref()
            .and_then(|engine| engine.body_for(method))
            .ok_or(VmError::NoExecutableBody(key))
    }

    /// Returns the class named `name`, loading it if needed.
    pub fn load_class(&mut self, name: &str) -> Result<Rc<Class>> {
        self.registry.lookup(name)
    }

    /// Parses and registers a class definition.
    pub fn define_class(&mut self, bytes: &[u8]) -> Result<Rc<Class>> {
        self.registry.define(bytes)
    }

    /// Loads and statically initializes the class named `name`.
    pub fn initialize_class(&mut self, name: &str) -> Result<Rc<Class>> {
        let class = self.registry.lookup(name)?;
        class.initialize(self)?;
        Ok(class)
    }

    /// Pushes a frame for `method`, copies `args` into consecutive local
    /// slots and schedules a fresh invocation.
    ///
    /// When calling from a running body, call `create_resume` first so the
    /// caller continues at the right instruction.
    pub fn create_call(&mut self, method: Rc<MethodInfo>, args: Vec<Value>) -> Result<()> {
        trace!(method = %method.qualified_name(), "call");
        let mut frame = Frame::new(method, self.pc);
        let mut slot = 0;
        for arg in args {
            let width = arg.width();
            frame.set_local(slot, arg);
            slot += width;
        }
        frame.push_token(ControlToken::Call);
        self.stack.push(frame)
    }

    /// Records where the current frame continues once the call it is about
    /// to make returns. Without `pc`, the current program counter is used.
    pub fn create_resume(&mut self, pc: Option<ProgramCounter>) -> Result<()> {
        if let Some(pc) = pc {
            self.pc = pc;
        }
        let pc = self.pc;
        self.current_frame_mut()?
            .push_token(ControlToken::Resume { pc });
        Ok(())
    }

    /// Schedules the current frame's return, leaving `value` on its operand
    /// area for the caller.
    pub fn create_return(&mut self, value: Option<Value>) -> Result<()> {
        let frame = self.current_frame_mut()?;
        if frame.method().returns_value() != value.is_some() {
            return Err(VmError::ReturnMismatch {
                method: frame.method().qualified_name(),
            });
        }
        if let Some(value) = value {
            frame.push(value);
        }
        frame.push_token(ControlToken::Return);
        Ok(())
    }

    /// Raises a guest exception at the current program counter.
    ///
    /// The exception and an `Exception` token are pushed onto the current
    /// frame so that its handlers are searched when the token is dispatched.
    /// The returned error must be propagated to the driver.
    pub fn throw_exception(&mut self, exception: Value) -> VmError {
        let token = ControlToken::Exception {
            pc: self.pc,
            exception: exception.clone(),
        };
        if let Some(frame) = self.stack.current_mut() {
            frame.push(exception.clone());
            frame.push_token(token);
        }
        VmError::Thrown(exception)
    }

    /// Guest-side static call: initializes the owning class, then schedules
    /// the call.
    pub fn invoke_static(
        &mut self,
        class_name: &str,
        name: &str,
        descriptor: &str,
        args: Vec<Value>,
    ) -> Result<()> {
        let class = self.registry.lookup(class_name)?;
        class.initialize(self)?;
        let method = class.get_method_assert(&mut self.registry, name, descriptor)?;
        self.create_call(method, args)
    }

    /// Dispatches the token on top of the current frame.
    pub fn step(&mut self) -> Result<Step> {
        let Some(frame) = self.stack.current_mut() else {
            return Ok(Step::Idle);
        };
        let method = Rc::clone(frame.method());
        let token = frame
            .pop_token()
            .ok_or_else(|| VmError::MissingControlToken(method.qualified_name()))?;
        trace!(method = %method.qualified_name(), %token, "dispatch");
        match token {
            ControlToken::Call => {
                self.pc = ProgramCounter::START;
                self.run_body(&method, ProgramCounter::START)?;
                Ok(Step::Executed)
            }
            ControlToken::Resume { pc } => {
                self.pc = pc;
                self.run_body(&method, pc)?;
                Ok(Step::Executed)
            }
            ControlToken::Exception { pc, exception } => {
                self.dispatch_exception(&method, pc, exception)
            }
            ControlToken::Return => self.complete_return(),
        }
    }

    fn run_body(&mut self, method: &MethodInfo, pc: ProgramCounter) -> Result<()> {
        let body = self.body_for(method)?;
        let depth = self.stack.depth();
        match body.execute(self, pc) {
            Err(VmError::Thrown(exception)) => {
                // Bodies that propagate a failed nested call instead of
                // calling `throw_exception` still get their token.
                self.stack.truncate(depth);
                let pending = matches!(
                    self.stack.current().and_then(Frame::peek_token),
                    Some(ControlToken::Exception { .. })
                );
                if pending {
                    return Err(VmError::Thrown(exception));
                }
                // A resume scheduled before the failure is never reached.
                if let Some(frame) = self.stack.current_mut() {
                    if let Some(ControlToken::Resume { .. }) = frame.peek_token() {
                        frame.pop_token();
                    }
                }
                Err(self.throw_exception(exception))
            }
            other => other,
        }
    }

    fn dispatch_exception(
        &mut self,
        method: &MethodInfo,
        pc: ProgramCounter,
        exception: Value,
    ) -> Result<Step> {
        self.pc = pc;
        self.current_frame_mut()?.pop()?;
        let body = self.body_for(method)?;
        match body.handle_exception(self, pc, &exception)? {
            Some(target) => {
                trace!(method = %method.qualified_name(), %pc, %target, "exception handled");
                let frame = self.current_frame_mut()?;
                frame.clear_operands();
                frame.push(exception);
                self.pc = target;
                self.run_body(method, target)?;
                Ok(Step::Executed)
            }
            None => self.unwind(exception),
        }
    }

    /// Pops the current frame and re-raises `exception` in its caller.
    fn unwind(&mut self, exception: Value) -> Result<Step> {
        let frame = self.stack.pop().ok_or(VmError::EmptyCallStack)?;
        match self.stack.current_mut() {
            None => {
                error!("uncaught exception of type {}", exception.type_name());
                Err(VmError::Thrown(exception))
            }
            Some(caller) => {
                if let Some(ControlToken::Resume { .. }) = caller.peek_token() {
                    caller.pop_token();
                }
                self.pc = frame.invoker_pc();
                Err(self.throw_exception(exception))
            }
        }
    }

    fn complete_return(&mut self) -> Result<Step> {
        let mut callee = self.stack.pop().ok_or(VmError::EmptyCallStack)?;
        let value = if callee.method().returns_value() {
            Some(callee.pop()?)
        } else {
            None
        };
        match self.stack.current_mut() {
            Some(caller) => {
                if let Some(value) = value {
                    caller.push(value);
                }
                Ok(Step::Returned)
            }
            None => Ok(Step::Finished(value)),
        }
    }

    /// Drives the trampoline until the call stack is empty and returns the
    /// result of the outermost frame.
    pub fn run(&mut self) -> Result<Option<Value>> {
        let mut result = None;
        loop {
            match self.step() {
                Ok(Step::Idle) => return Ok(result),
                Ok(Step::Finished(value)) => result = value,
                Ok(_) => {}
                // A frame further down may still catch it.
                Err(err) if err.is_guest() && !self.stack.is_empty() => {}
                Err(err) => {
                    self.stack.truncate(0);
                    return Err(err);
                }
            }
        }
    }

    /// Invokes a guest method from host code and waits for its result.
    ///
    /// The call runs above a boundary frame so that it can be driven to
    /// completion without disturbing the frames beneath. A guest exception
    /// that unwinds to the boundary, and any host error, is returned with the
    /// stack restored to its depth before the call.
    pub fn call_from_native(
        &mut self,
        class_name: &str,
        method_name: &str,
        descriptor: &str,
        args: Vec<Value>,
    ) -> Result<Option<Value>> {
        let class = self.registry.lookup(class_name)?;
        let method = class.get_method_assert(&mut self.registry, method_name, descriptor)?;
        debug!(method = %method.qualified_name(), "call from native");

        let saved_pc = self.pc;
        let base_depth = self.stack.depth();
        self.stack.push(Frame::boundary(Rc::clone(&method), saved_pc))?;
        self.pc = ProgramCounter::NATIVE;
        self.create_resume(None)?;
        let boundary_depth = self.stack.depth();

        if let Err(err) = self.create_call(Rc::clone(&method), args) {
            self.stack.truncate(base_depth);
            self.pc = saved_pc;
            return Err(err);
        }

        while self.stack.depth() > boundary_depth {
            if let Err(err) = self.step() {
                if self.stack.depth() <= boundary_depth || !err.is_guest() {
                    self.stack.truncate(base_depth);
                    self.pc = saved_pc;
                    return Err(err);
                }
                trace!("guest exception still inside the native call");
            }
        }

        let mut boundary = self.stack.pop().ok_or(VmError::EmptyCallStack)?;
        boundary.pop_token();
        let value = if method.returns_value() {
            Some(boundary.pop()?)
        } else {
            None
        };
        self.pc = saved_pc;
        Ok(value)
    }

    /// Creates an object of `class_name` and runs its `<init>` constructor
    /// matching `descriptor` with `args`.
    pub fn construct_object(
        &mut self,
        class_name: &str,
        descriptor: &str,
        args: Vec<Value>,
    ) -> Result<ObjectRef> {
        let class = self.registry.lookup(class_name)?;
        class.initialize(self)?;
        let object = class.instantiate(&mut self.registry)?;
        let mut init_args = Vec::with_capacity(args.len() + 1);
        init_args.push(Value::Object(Rc::clone(&object)));
        init_args.extend(args);
        self.call_from_native(class.name(), INIT, descriptor, init_args)?;
        Ok(object)
    }

    /// Reads a static field, initializing its class first.
    pub fn get_static(&mut self, class_name: &str, name: &str, descriptor: &str) -> Result<Value> {
        let class = self.initialize_class(class_name)?;
        class.get_static(&mut self.registry, name, descriptor)
    }

    /// Writes a static field, initializing its class first.
    pub fn set_static(
        &mut self,
        class_name: &str,
        name: &str,
        descriptor: &str,
        value: Value,
    ) -> Result<()> {
        let class = self.initialize_class(class_name)?;
        class.set_static(&mut self.registry, name, descriptor, value)
    }
}
