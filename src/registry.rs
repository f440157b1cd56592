//! Global class registry and class loaders.
use crate::class::Class;
use crate::config::VmConfig;
use crate::error::VmError;
use crate::jvm::read_class_file;

use std::collections::HashMap;
use std::path::PathBuf;
use std::rc::Rc;

use tracing::{debug, warn};

type Result<T> = std::result::Result<T, VmError>;

/// Name of the universal root class.
pub const ROOT_CLASS: &str = "java/lang/Object";

/// Source of class file bytes.
pub trait ClassLoader {
    /// Returns the bytes of the class named `name`, or `None` if this loader
    /// does not know it.
    fn load(&self, name: &str) -> Result<Option<Vec<u8>>>;
}

/// Loads `<root>/<name>.class` files.
#[derive(Debug, Clone)]
pub struct DirectoryLoader {
    root: PathBuf,
}

impl DirectoryLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ClassLoader for DirectoryLoader {
    fn load(&self, name: &str) -> Result<Option<Vec<u8>>> {
        let path = self.root.join(format!("{name}.class"));
        if !path.is_file() {
            return Ok(None);
        }
        Ok(Some(read_class_file(&path).map_err(crate::error::ClassFormatError::from)?))
    }
}

/// Serves class bytes held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryLoader {
    classes: HashMap<String, Vec<u8>>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, bytes: Vec<u8>) {
        self.classes.insert(name.into(), bytes);
    }
}

impl ClassLoader for MemoryLoader {
    fn load(&self, name: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.classes.get(name).cloned())
    }
}

enum Entry {
    /// Name claimed by a class whose definition is still being parsed.
    Reserved,
    Loaded(Rc<Class>),
}

/// What the registry currently holds for a name.
#[derive(Debug, Clone)]
pub enum ClassHandle {
    Placeholder(String),
    Loaded(Rc<Class>),
}

impl ClassHandle {
    pub fn name(&self) -> &str {
        match self {
            Self::Placeholder(name) => name,
            Self::Loaded(class) => class.name(),
        }
    }
}

/// Mapping from class name to loaded class. Classes are never unloaded.
pub struct ClassRegistry {
    entries: HashMap<String, Entry>,
    loaders: Vec<Box<dyn ClassLoader>>,
    strict_magic: bool,
    aliases: Vec<(String, String)>,
}

impl ClassRegistry {
    pub fn new(config: &VmConfig) -> Self {
        let loaders = config
            .class_path
            .iter()
            .map(|root| Box::new(DirectoryLoader::new(root.clone())) as Box<dyn ClassLoader>)
            .collect();
        Self {
            entries: HashMap::new(),
            loaders,
            strict_magic: config.strict_magic,
            aliases: config.bootstrap_aliases.clone(),
        }
    }

    /// Appends a loader consulted after the existing ones.
    pub fn add_loader(&mut self, loader: impl ClassLoader + 'static) {
        self.loaders.push(Box::new(loader));
    }

    pub fn strict_magic(&self) -> bool {
        self.strict_magic
    }

    /// Name a class declaring itself as `declared` is registered under.
    pub fn registered_name(&self, declared: &str) -> String {
        self.aliases
            .iter()
            .find(|(short, _)| short == declared)
            .map_or_else(|| declared.to_string(), |(_, full)| full.clone())
    }

    /// Claims `name` for a class being parsed. Returns false if the name is
    /// already reserved or registered.
    pub fn reserve(&mut self, name: &str) -> bool {
        if self.entries.contains_key(name) {
            return false;
        }
        self.entries.insert(name.to_string(), Entry::Reserved);
        true
    }

    /// Drops a reservation whose class failed to parse.
    pub fn release(&mut self, name: &str) {
        if let Some(Entry::Reserved) = self.entries.get(name) {
            self.entries.remove(name);
        }
    }

    /// Completes a reservation (or registers directly) with the parsed class.
    pub fn register(&mut self, name: &str, class: Rc<Class>) {
        self.entries.insert(name.to_string(), Entry::Loaded(class));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Current entry for `name` without triggering a load.
    pub fn peek(&self, name: &str) -> Option<ClassHandle> {
        match self.entries.get(name)? {
            Entry::Reserved => Some(ClassHandle::Placeholder(name.to_string())),
            Entry::Loaded(class) => Some(ClassHandle::Loaded(Rc::clone(class))),
        }
    }

    /// Names of all fully registered classes.
    pub fn loaded_classes(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .entries
            .iter()
            .filter(|(_, entry)| matches!(entry, Entry::Loaded(_)))
            .map(|(name, _)| name.as_str())
            .collect();
        names.sort_unstable();
        names
    }

    /// Parses and registers a class definition.
    pub fn define(&mut self, bytes: &[u8]) -> Result<Rc<Class>> {
        Class::parse(bytes, self)
    }

    /// Returns the class named `name`, loading it on first use.
    /// Bootstrap short names resolve to the class registered under the full
    /// name.
    pub fn lookup(&mut self, name: &str) -> Result<Rc<Class>> {
        let registered = self.registered_name(name);
        for key in [name, registered.as_str()] {
            match self.entries.get(key) {
                Some(Entry::Loaded(class)) => return Ok(Rc::clone(class)),
                Some(Entry::Reserved) => return Err(VmError::ClassNotReady(key.to_string())),
                None => {}
            }
        }
        let mut bytes = None;
        for loader in &self.loaders {
            if let Some(found) = loader.load(name)? {
                bytes = Some(found);
                break;
            }
        }
        let bytes = bytes.ok_or_else(|| VmError::ClassNotFound(name.to_string()))?;
        debug!(class = name, "loading class");
        let class = self.define(&bytes)?;
        if class.name() != name && class.name() != registered {
            warn!(requested = name, found = class.name(), "class file declares a different name");
            self.entries
                .entry(name.to_string())
                .or_insert_with(|| Entry::Loaded(Rc::clone(&class)));
        }
        Ok(class)
    }
}
