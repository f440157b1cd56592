//! Guest values and objects.
use crate::class::Class;

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// Shared handle to a guest object.
pub type ObjectRef = Rc<RefCell<JavaObject>>;

/// JVM value types.
#[derive(Clone)]
pub enum Value {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Null,
    Object(ObjectRef),
}

impl Value {
    /// Number of local variable slots the value occupies.
    pub fn width(&self) -> usize {
        match self {
            Self::Long(_) | Self::Double(_) => 2,
            _ => 1,
        }
    }

    /// Name of the value's type; objects report their class name.
    pub fn type_name(&self) -> String {
        match self {
            Self::Int(_) => "int".to_string(),
            Self::Long(_) => "long".to_string(),
            Self::Float(_) => "float".to_string(),
            Self::Double(_) => "double".to_string(),
            Self::Null => "null".to_string(),
            Self::Object(object) => object.borrow().class().name().to_string(),
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            Self::Int(x) => Some(*x),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Self::Object(object) => Some(object),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Long(a), Self::Long(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a.to_bits() == b.to_bits(),
            (Self::Double(a), Self::Double(b)) => a.to_bits() == b.to_bits(),
            (Self::Null, Self::Null) => true,
            (Self::Object(a), Self::Object(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Int(x) => write!(f, "Int({x})"),
            Self::Long(x) => write!(f, "Long({x})"),
            Self::Float(x) => write!(f, "Float({x})"),
            Self::Double(x) => write!(f, "Double({x})"),
            Self::Null => write!(f, "Null"),
            Self::Object(object) => match object.try_borrow() {
                Ok(object) => write!(f, "Object({})", object.class().name()),
                Err(_) => write!(f, "Object(<borrowed>)"),
            },
        }
    }
}

/// Instance of a guest class. Instance fields are kept per defining class so
/// that a subclass field never shadows a superclass field of the same name.
pub struct JavaObject {
    class: Rc<Class>,
    fields: HashMap<String, HashMap<String, Value>>,
}

impl JavaObject {
    pub(crate) fn new(class: Rc<Class>) -> Self {
        Self {
            class,
            fields: HashMap::new(),
        }
    }

    pub fn class(&self) -> &Rc<Class> {
        &self.class
    }

    /// Slot map for the fields declared by `defining_class`.
    pub fn slots(&self, defining_class: &str) -> Option<&HashMap<String, Value>> {
        self.fields.get(defining_class)
    }

    pub(crate) fn slots_mut(&mut self, defining_class: &str) -> &mut HashMap<String, Value> {
        self.fields.entry(defining_class.to_string()).or_default()
    }

    pub fn get_field(&self, defining_class: &str, name: &str) -> Option<&Value> {
        self.fields.get(defining_class).and_then(|slots| slots.get(name))
    }

    /// Stores `value` into an existing slot. Returns false if the slot does
    /// not exist.
    pub fn set_field(&mut self, defining_class: &str, name: &str, value: Value) -> bool {
        match self
            .fields
            .get_mut(defining_class)
            .and_then(|slots| slots.get_mut(name))
        {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }
}

impl fmt::Debug for JavaObject {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("JavaObject")
            .field("class", &self.class.name())
            .field("fields", &self.fields)
            .finish()
    }
}
