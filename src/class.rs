//! In-memory representation of a loaded class: parsing, member resolution
//! along the inheritance chain, type relationships and static initialization.
use crate::constant_pool::ConstantPool;
use crate::error::{ClassFormatError, VmError};
use crate::jvm::{ClassReader, GenericAttribute, MAGIC};
use crate::member::{flag_names, FieldInfo, MethodInfo, CLASS_ACCESS_FLAGS, CLINIT};
use crate::registry::{ClassRegistry, ROOT_CLASS};
use crate::runtime::Runtime;
use crate::value::{JavaObject, ObjectRef, Value};

use std::cell::{Cell, OnceCell, RefCell};
use std::fmt;
use std::rc::Rc;

use tracing::{debug, warn};

type Result<T> = std::result::Result<T, VmError>;

pub const ACC_INTERFACE: u16 = 0x0200;

/// Static initialization progress of a class.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum InitState {
    Uninitialized,
    /// Marked before any initializer code runs; re-entrant requests are
    /// no-ops while in this state.
    InProgress,
    Initialized,
    /// The superclass or the static initializer failed.
    Erroneous,
}

/// A parsed class or interface. Immutable once registered, apart from the
/// memoized superclass link, the deprecation cache, the initialization state
/// and static field values.
#[derive(Debug)]
pub struct Class {
    name: String,
    declared_name: String,
    pub minor_version: u16,
    pub major_version: u16,
    constant_pool: ConstantPool,
    pub access_flags: u16,
    super_class_name: Option<String>,
    interfaces: Vec<String>,
    fields: Vec<Rc<FieldInfo>>,
    methods: Vec<Rc<MethodInfo>>,
    attributes: Vec<GenericAttribute>,
    super_class: OnceCell<Rc<Class>>,
    deprecated: OnceCell<bool>,
    deprecation_warned: Cell<bool>,
    init_state: Cell<InitState>,
}

impl Class {
    /// Parse a class file and register it.
    ///
    /// The class name is reserved in the registry as soon as it is known, and
    /// field default values are only computed once the finished class is
    /// registered.
    pub fn parse(bytes: &[u8], registry: &mut ClassRegistry) -> Result<Rc<Class>> {
        let mut reader = ClassReader::new(bytes);
        let magic = reader.read_u4()?;
        if magic != MAGIC {
            if registry.strict_magic() {
                return Err(ClassFormatError::BadMagic { found: magic }.into());
            }
            warn!("magic value 0xcafebabe not found, instead: {magic:#010x}");
        }
        let minor_version = reader.read_u2()?;
        let major_version = reader.read_u2()?;
        let constant_pool = ConstantPool::parse(&mut reader)?;
        let access_flags = reader.read_u2()?;
        let this_class = reader.read_u2()?;
        let declared_name = constant_pool.class_name(this_class)?.to_string();
        let name = registry.registered_name(&declared_name);

        if !registry.reserve(&name) {
            return Err(VmError::DuplicateClass(name));
        }
        let shell = ClassShell {
            name: name.clone(),
            declared_name,
            minor_version,
            major_version,
            constant_pool,
            access_flags,
        };
        let class = match shell.parse_rest(&mut reader) {
            Ok(class) => Rc::new(class),
            Err(err) => {
                registry.release(&name);
                return Err(err.into());
            }
        };
        registry.register(&class.name, Rc::clone(&class));
        for field in &class.fields {
            field.initialize_default_value();
        }
        if reader.remaining() > 0 {
            debug!(class = %class.name, trailing = reader.remaining(), "ignoring trailing bytes");
        }
        debug!(class = %class.name, "registered class");
        Ok(class)
    }

    /// Name the class is registered under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name as written in the class file, before bootstrap aliasing.
    pub fn declared_name(&self) -> &str {
        &self.declared_name
    }

    pub fn constant_pool(&self) -> &ConstantPool {
        &self.constant_pool
    }

    pub fn super_class_name(&self) -> Option<&str> {
        self.super_class_name.as_deref()
    }

    pub fn interfaces(&self) -> &[String] {
        &self.interfaces
    }

    pub fn fields(&self) -> &[Rc<FieldInfo>] {
        &self.fields
    }

    pub fn methods(&self) -> &[Rc<MethodInfo>] {
        &self.methods
    }

    pub fn attributes(&self) -> &[GenericAttribute] {
        &self.attributes
    }

    /// Checks if the class has a specific access flag.
    pub fn has_flag(&self, mask: u16) -> bool {
        self.access_flags & mask == mask
    }

    pub fn is_interface(&self) -> bool {
        self.has_flag(ACC_INTERFACE)
    }

    /// Resolves the superclass through the registry. The link is cached
    /// after the first successful resolution.
    pub fn super_class(&self, registry: &mut ClassRegistry) -> Result<Option<Rc<Class>>> {
        let Some(super_name) = self.super_class_name.as_deref() else {
            return Ok(None);
        };
        if let Some(cached) = self.super_class.get() {
            return Ok(Some(Rc::clone(cached)));
        }
        let resolved = registry.lookup(super_name)?;
        Ok(Some(Rc::clone(self.super_class.get_or_init(|| resolved))))
    }

    /// The `<clinit>()V` method, if the class declares one.
    pub fn static_initializer(&self) -> Option<Rc<MethodInfo>> {
        self.methods.iter().find(|m| m.is_clinit()).cloned()
    }

    /// True if the class carries a `Deprecated` attribute. Computed once.
    pub fn is_deprecated(&self) -> bool {
        *self
            .deprecated
            .get_or_init(|| self.attributes.iter().any(|a| a.name == "Deprecated"))
    }

    /// True once the deprecation warning for this class has been emitted.
    pub fn deprecation_warned(&self) -> bool {
        self.deprecation_warned.get()
    }

    pub fn init_state(&self) -> InitState {
        self.init_state.get()
    }

    /// True once initialization has been triggered, including while the
    /// static initializer is still running.
    pub fn is_initialized(&self) -> bool {
        matches!(
            self.init_state.get(),
            InitState::InProgress | InitState::Initialized
        )
    }

    /// Runs static initialization once: superclass first, then `<clinit>`
    /// through the native bridge. Interfaces are not initialized.
    pub fn initialize(&self, rt: &mut Runtime) -> Result<()> {
        match self.init_state.get() {
            InitState::InProgress | InitState::Initialized => return Ok(()),
            InitState::Erroneous => return Err(VmError::InitializationFailed(self.name.clone())),
            InitState::Uninitialized => {}
        }
        // Marked before any initializer runs so self-referential statics
        // do not recurse.
        self.init_state.set(InitState::InProgress);
        debug!(class = %self.name, "initializing class");
        match self.run_initializers(rt) {
            Ok(()) => {
                self.init_state.set(InitState::Initialized);
                Ok(())
            }
            Err(err) => {
                self.init_state.set(InitState::Erroneous);
                Err(err)
            }
        }
    }

    fn run_initializers(&self, rt: &mut Runtime) -> Result<()> {
        if self.is_deprecated() && !self.deprecation_warned.replace(true) {
            warn!("using deprecated class \"{}\"", self.name);
        }
        if let Some(super_class) = self.super_class(rt.registry_mut())? {
            super_class.initialize(rt)?;
        }
        if self.static_initializer().is_some() {
            rt.call_from_native(&self.name, CLINIT, "()V", Vec::new())?;
        }
        Ok(())
    }

    /// Finds a method by exact name and descriptor, searching this class and
    /// then each superclass in turn.
    pub fn get_method(
        &self,
        registry: &mut ClassRegistry,
        name: &str,
        descriptor: &str,
    ) -> Result<Option<Rc<MethodInfo>>> {
        if let Some(method) = self.methods.iter().find(|m| m.matches(name, descriptor)) {
            return Ok(Some(Rc::clone(method)));
        }
        match self.super_class(registry)? {
            Some(super_class) => super_class.get_method(registry, name, descriptor),
            None => Ok(None),
        }
    }

    /// Same as `get_method`, but a missing method is an error.
    pub fn get_method_assert(
        &self,
        registry: &mut ClassRegistry,
        name: &str,
        descriptor: &str,
    ) -> Result<Rc<MethodInfo>> {
        self.get_method(registry, name, descriptor)?
            .ok_or_else(|| VmError::MethodNotFound {
                class: self.name.clone(),
                name: name.to_string(),
                descriptor: descriptor.to_string(),
            })
    }

    /// Finds a field by exact name and descriptor along the superclass chain.
    pub fn get_field(
        &self,
        registry: &mut ClassRegistry,
        name: &str,
        descriptor: &str,
    ) -> Result<Option<Rc<FieldInfo>>> {
        if let Some(field) = self
            .fields
            .iter()
            .find(|f| f.name == name && f.descriptor == descriptor)
        {
            return Ok(Some(Rc::clone(field)));
        }
        match self.super_class(registry)? {
            Some(super_class) => super_class.get_field(registry, name, descriptor),
            None => Ok(None),
        }
    }

    /// Same as `get_field`, but a missing field is an error.
    pub fn get_field_assert(
        &self,
        registry: &mut ClassRegistry,
        name: &str,
        descriptor: &str,
    ) -> Result<Rc<FieldInfo>> {
        self.get_field(registry, name, descriptor)?
            .ok_or_else(|| VmError::FieldNotFound {
                class: self.name.clone(),
                name: name.to_string(),
                descriptor: descriptor.to_string(),
            })
    }

    /// Value of the given static field.
    pub fn get_static(&self, registry: &mut ClassRegistry, name: &str, descriptor: &str) -> Result<Value> {
        Ok(self.get_field_assert(registry, name, descriptor)?.value())
    }

    pub fn set_static(
        &self,
        registry: &mut ClassRegistry,
        name: &str,
        descriptor: &str,
        value: Value,
    ) -> Result<()> {
        self.get_field_assert(registry, name, descriptor)?.set_value(value);
        Ok(())
    }

    /// Checks if `class_name` is the root class, a superclass or an interface
    /// implemented by this class, directly or transitively.
    pub fn is_a(&self, registry: &mut ClassRegistry, class_name: &str) -> Result<bool> {
        if class_name == ROOT_CLASS {
            return Ok(true);
        }
        if self.super_class_name.as_deref() == Some(class_name) {
            return Ok(true);
        }
        if self.implements_interface(registry, class_name)? {
            return Ok(true);
        }
        match self.super_class(registry)? {
            Some(super_class) => super_class.is_a(registry, class_name),
            None => Ok(false),
        }
    }

    /// Checks if one of the directly implemented interfaces is, or extends,
    /// `interface_name`.
    pub fn implements_interface(&self, registry: &mut ClassRegistry, interface_name: &str) -> Result<bool> {
        for interface in &self.interfaces {
            if interface == interface_name {
                return Ok(true);
            }
            let interface = registry.lookup(interface)?;
            if interface.is_a(registry, interface_name)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// A new object of this class whose instance fields, including inherited
    /// ones, hold their default values. No constructor is run.
    pub fn instantiate(self: &Rc<Self>, registry: &mut ClassRegistry) -> Result<ObjectRef> {
        let mut object = JavaObject::new(Rc::clone(self));
        self.populate_object_fields(registry, &mut object)?;
        Ok(Rc::new(RefCell::new(object)))
    }

    fn populate_object_fields(&self, registry: &mut ClassRegistry, object: &mut JavaObject) -> Result<()> {
        let slots = object.slots_mut(&self.name);
        for field in self.fields.iter().filter(|f| !f.is_static()) {
            slots.insert(field.name.clone(), field.default_value());
        }
        if let Some(super_class) = self.super_class(registry)? {
            super_class.populate_object_fields(registry, object)?;
        }
        Ok(())
    }
}

/// Header fields read before the class name is reserved.
struct ClassShell {
    name: String,
    declared_name: String,
    minor_version: u16,
    major_version: u16,
    constant_pool: ConstantPool,
    access_flags: u16,
}

impl ClassShell {
    fn parse_rest(self, reader: &mut ClassReader) -> std::result::Result<Class, ClassFormatError> {
        let pool = &self.constant_pool;
        let super_index = reader.read_u2()?;
        let super_class_name = match super_index {
            0 => None,
            index => Some(pool.class_name(index)?.to_string()),
        };

        let interfaces_count = reader.read_u2()?;
        let mut interfaces = Vec::with_capacity(interfaces_count as usize);
        for _ in 0..interfaces_count {
            interfaces.push(pool.class_name(reader.read_u2()?)?.to_string());
        }

        let fields_count = reader.read_u2()?;
        let mut fields = Vec::with_capacity(fields_count as usize);
        for _ in 0..fields_count {
            fields.push(Rc::new(FieldInfo::parse(reader, pool, &self.name)?));
        }

        let methods_count = reader.read_u2()?;
        let mut methods = Vec::with_capacity(methods_count as usize);
        for _ in 0..methods_count {
            methods.push(Rc::new(MethodInfo::parse(reader, pool, &self.name)?));
        }

        let attributes = GenericAttribute::parse_list(reader, pool)?;

        Ok(Class {
            name: self.name,
            declared_name: self.declared_name,
            minor_version: self.minor_version,
            major_version: self.major_version,
            constant_pool: self.constant_pool,
            access_flags: self.access_flags,
            super_class_name,
            interfaces,
            fields,
            methods,
            attributes,
            super_class: OnceCell::new(),
            deprecated: OnceCell::new(),
            deprecation_warned: Cell::new(false),
            init_state: Cell::new(InitState::Uninitialized),
        })
    }
}

impl fmt::Display for Class {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for flag in flag_names(self.access_flags, CLASS_ACCESS_FLAGS) {
            write!(f, "{flag} ")?;
        }
        write!(f, "{} ", self.declared_name)?;
        if let Some(super_name) = &self.super_class_name {
            write!(f, "extends {super_name} ")?;
        }
        if !self.interfaces.is_empty() {
            write!(f, "implements ")?;
        }
        for interface in &self.interfaces {
            write!(f, "{interface} ")?;
        }
        write!(f, "\n\nFields:\n")?;
        for field in &self.fields {
            writeln!(f, "{field}")?;
        }
        write!(f, "\n\nMethods:\n")?;
        for method in &self.methods {
            writeln!(f, "{method}")?;
        }
        write!(f, "\n\nAttributes:\n")?;
        for attribute in &self.attributes {
            writeln!(f, "{attribute}")?;
        }
        write!(f, "\n\nEND CLASS\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VmConfig;
    use crate::fixtures::{runtime_with, ClassBuilder};

    use proptest::prelude::*;

    const STATIC: u16 = 0x0008;

    fn shapes() -> Runtime {
        runtime_with(
            VmConfig::default(),
            &[
                ClassBuilder::interface("Named"),
                ClassBuilder::interface("Shape").implements("Named"),
                ClassBuilder::new("Base")
                    .field(0x0001, "id", "I")
                    .field(STATIC, "count", "I")
                    .method(0x0001, "greet", "()V")
                    .method(0x0001, "base", "()V"),
                ClassBuilder::new("Circle")
                    .extends("Base")
                    .implements("Shape")
                    .field(0x0001, "id", "J")
                    .field(0x0002, "radius", "D")
                    .method(0x0001, "greet", "()V"),
                ClassBuilder::new("Small").extends("Circle"),
            ],
        )
    }

    #[test]
    fn describes_itself() {
        let mut rt = shapes();
        let bytes = ClassBuilder::new("Point")
            .implements("Shape")
            .field(0x0002, "x", "I")
            .method(0x0001, "<init>", "()V")
            .deprecated()
            .build();
        let point = rt.define_class(&bytes).unwrap();
        assert_eq!(point.major_version, 52);
        assert_eq!(point.super_class_name(), Some(ROOT_CLASS));
        assert_eq!(
            point.to_string(),
            "public super Point extends java/lang/Object implements Shape \n\n\
             Fields:\n\tprivate x I\n\n\n\
             Methods:\n\tpublic <init>()V\n\n\n\
             Attributes:\n\tGeneric: Deprecated\n\n\n\
             END CLASS\n"
        );
    }

    #[test]
    fn aliased_classes_print_their_declared_name() {
        let mut rt = shapes();
        let system = rt.define_class(&ClassBuilder::new("System").build()).unwrap();
        assert_eq!(system.name(), "java/lang/System");
        assert!(system.to_string().starts_with("public super System extends "));
    }

    #[test]
    fn bad_magic_is_only_a_warning_by_default() {
        let mut rt = shapes();
        let bytes = ClassBuilder::new("Odd").magic(0xdead_beef).build();
        assert_eq!(rt.define_class(&bytes).unwrap().name(), "Odd");
    }

    #[test]
    fn strict_magic_rejects_the_class() {
        let mut rt = runtime_with(VmConfig::default().with_strict_magic(true), &[]);
        let bytes = ClassBuilder::new("Odd").magic(0xdead_beef).build();
        assert!(matches!(
            rt.define_class(&bytes),
            Err(VmError::Format(ClassFormatError::BadMagic { found: 0xdead_beef }))
        ));
        assert!(!rt.registry().contains("Odd"));
    }

    #[test]
    fn names_are_defined_once() {
        let mut rt = shapes();
        let bytes = ClassBuilder::new("Once").build();
        rt.define_class(&bytes).unwrap();
        assert!(matches!(
            rt.define_class(&bytes),
            Err(VmError::DuplicateClass(name)) if name == "Once"
        ));
    }

    #[test]
    fn truncated_classes_release_their_name() {
        let mut rt = shapes();
        let mut bytes = ClassBuilder::new("Cut").method(0x0001, "run", "()V").build();
        bytes.truncate(bytes.len() - 3);
        assert!(matches!(
            rt.define_class(&bytes),
            Err(VmError::Format(ClassFormatError::UnexpectedEof { .. }))
        ));
        assert!(!rt.registry().contains("Cut"));
    }

    #[test]
    fn methods_resolve_along_the_superclass_chain() {
        let mut rt = shapes();
        let small = rt.load_class("Small").unwrap();
        let registry = rt.registry_mut();

        let greet = small.get_method(registry, "greet", "()V").unwrap().unwrap();
        assert_eq!(greet.class_name(), "Circle");
        let base = small.get_method(registry, "base", "()V").unwrap().unwrap();
        assert_eq!(base.class_name(), "Base");
        assert!(small.get_method(registry, "greet", "(I)V").unwrap().is_none());
        assert!(matches!(
            small.get_method_assert(registry, "fly", "()V"),
            Err(VmError::MethodNotFound { class, .. }) if class == "Small"
        ));
    }

    #[test]
    fn fields_resolve_by_name_and_descriptor() {
        let mut rt = shapes();
        let small = rt.load_class("Small").unwrap();
        let registry = rt.registry_mut();

        let long_id = small.get_field_assert(registry, "id", "J").unwrap();
        assert_eq!(long_id.class_name(), "Circle");
        let int_id = small.get_field_assert(registry, "id", "I").unwrap();
        assert_eq!(int_id.class_name(), "Base");
        assert!(matches!(
            small.get_field_assert(registry, "id", "F"),
            Err(VmError::FieldNotFound { .. })
        ));
    }

    #[test]
    fn superclass_link_is_cached() {
        let mut rt = shapes();
        let circle = rt.load_class("Circle").unwrap();
        let first = circle.super_class(rt.registry_mut()).unwrap().unwrap();
        let second = circle.super_class(rt.registry_mut()).unwrap().unwrap();
        assert!(Rc::ptr_eq(&first, &second));
        let root = rt.load_class(ROOT_CLASS).unwrap();
        assert!(root.super_class(rt.registry_mut()).unwrap().is_none());
    }

    #[test]
    fn type_relationships() {
        let mut rt = shapes();
        let small = rt.load_class("Small").unwrap();
        let circle = rt.load_class("Circle").unwrap();
        let registry = rt.registry_mut();

        for ancestor in ["Circle", "Base", "Shape", "Named", ROOT_CLASS] {
            assert!(small.is_a(registry, ancestor).unwrap(), "{ancestor}");
        }
        assert!(!small.is_a(registry, "Unrelated").unwrap());
        assert!(!circle.is_a(registry, "Small").unwrap());

        assert!(!circle.is_interface());
        assert!(registry.lookup("Shape").unwrap().is_interface());
        assert!(circle.implements_interface(registry, "Shape").unwrap());
        assert!(circle.implements_interface(registry, "Named").unwrap());
        // Only direct interfaces are consulted.
        assert!(!small.implements_interface(registry, "Shape").unwrap());
    }

    #[test]
    fn objects_get_one_slot_map_per_class() {
        let mut rt = shapes();
        let small = rt.load_class("Small").unwrap();
        let object = small.instantiate(rt.registry_mut()).unwrap();
        let object = object.borrow();
        assert_eq!(object.class().name(), "Small");
        assert_eq!(object.get_field("Base", "id"), Some(&Value::Int(0)));
        assert_eq!(object.get_field("Circle", "id"), Some(&Value::Long(0)));
        assert_eq!(object.get_field("Circle", "radius"), Some(&Value::Double(0.0)));
        assert_eq!(object.get_field("Base", "count"), None);
        assert!(object.slots("Small").map_or(true, |slots| slots.is_empty()));
    }

    #[test]
    fn statics_are_shared_with_subclasses() {
        let mut rt = shapes();
        let base = rt.load_class("Base").unwrap();
        let small = rt.load_class("Small").unwrap();
        let registry = rt.registry_mut();
        assert_eq!(small.get_static(registry, "count", "I").unwrap(), Value::Int(0));
        small.set_static(registry, "count", "I", Value::Int(3)).unwrap();
        assert_eq!(base.get_static(registry, "count", "I").unwrap(), Value::Int(3));
    }

    fn recorder(rt: &mut Runtime, class_name: &'static str, log: &Rc<RefCell<Vec<String>>>) {
        let log = Rc::clone(log);
        rt.bind_native_fn(class_name, CLINIT, "()V", move |rt, _pc| {
            rt.initialize_class(class_name)?;
            log.borrow_mut().push(class_name.to_string());
            rt.create_return(None)
        });
    }

    #[test]
    fn superclass_initializes_first_and_only_once() {
        let mut rt = runtime_with(
            VmConfig::default(),
            &[
                ClassBuilder::new("B").clinit(),
                ClassBuilder::new("A").extends("B").clinit(),
            ],
        );
        let log = Rc::new(RefCell::new(Vec::new()));
        recorder(&mut rt, "A", &log);
        recorder(&mut rt, "B", &log);

        let a = rt.initialize_class("A").unwrap();
        rt.initialize_class("A").unwrap();
        a.initialize(&mut rt).unwrap();
        assert_eq!(*log.borrow(), vec!["B", "A"]);
        assert_eq!(a.init_state(), InitState::Initialized);
        assert!(rt.load_class("B").unwrap().is_initialized());
        assert!(rt.stack().is_empty());
    }

    #[test]
    fn interfaces_are_not_initialized() {
        let mut rt = runtime_with(
            VmConfig::default(),
            &[
                ClassBuilder::interface("Marker").clinit(),
                ClassBuilder::new("Impl").implements("Marker"),
            ],
        );
        let log = Rc::new(RefCell::new(Vec::new()));
        recorder(&mut rt, "Marker", &log);

        rt.initialize_class("Impl").unwrap();
        assert!(log.borrow().is_empty());
        let marker = rt.load_class("Marker").unwrap();
        assert_eq!(marker.init_state(), InitState::Uninitialized);
    }

    #[test]
    fn failed_initialization_is_sticky() {
        let mut rt = runtime_with(
            VmConfig::default(),
            &[
                ClassBuilder::new("Broken").clinit(),
                ClassBuilder::new("Child").extends("Broken"),
                ClassBuilder::new("Unbound").clinit(),
            ],
        );
        rt.bind_native_fn("Broken", CLINIT, "()V", |rt, _pc| {
            let class = rt.load_class("Broken")?;
            let thrown = Value::Object(class.instantiate(rt.registry_mut())?);
            Err(rt.throw_exception(thrown))
        });

        assert!(matches!(rt.initialize_class("Child"), Err(VmError::Thrown(_))));
        assert_eq!(rt.load_class("Broken").unwrap().init_state(), InitState::Erroneous);
        assert_eq!(rt.load_class("Child").unwrap().init_state(), InitState::Erroneous);
        assert!(matches!(
            rt.initialize_class("Broken"),
            Err(VmError::InitializationFailed(name)) if name == "Broken"
        ));
        assert!(rt.stack().is_empty());

        assert!(matches!(rt.initialize_class("Unbound"), Err(VmError::NoExecutableBody(_))));
        assert!(matches!(
            rt.initialize_class("Unbound"),
            Err(VmError::InitializationFailed(_))
        ));
    }

    #[test]
    fn deprecated_classes_warn_once() {
        let mut rt = runtime_with(VmConfig::default(), &[ClassBuilder::new("Old").deprecated()]);
        let old = rt.load_class("Old").unwrap();
        assert!(old.is_deprecated());
        assert!(!old.deprecation_warned());
        old.initialize(&mut rt).unwrap();
        assert!(old.deprecation_warned());
    }

    fn chain(depth: usize) -> Vec<ClassBuilder> {
        (0..depth)
            .map(|i| {
                let builder = ClassBuilder::new(&format!("C{i}")).method(0x0001, &format!("m{i}"), "()V");
                if i == 0 {
                    builder
                } else {
                    builder.extends(&format!("C{}", i - 1))
                }
            })
            .collect()
    }

    proptest! {
        #[test]
        fn lookups_find_the_declaring_ancestor(depth in 1usize..8, pick in 0usize..8) {
            let pick = pick % depth;
            let mut rt = runtime_with(VmConfig::default(), &chain(depth));
            let leaf = rt.load_class(&format!("C{}", depth - 1)).unwrap();
            let registry = rt.registry_mut();

            let method = leaf.get_method(registry, &format!("m{pick}"), "()V").unwrap().unwrap();
            prop_assert_eq!(method.class_name(), format!("C{pick}"));
            prop_assert!(leaf.is_a(registry, ROOT_CLASS).unwrap());
            prop_assert_eq!(leaf.is_a(registry, &format!("C{pick}")).unwrap(), pick + 1 < depth);
        }
    }
}
