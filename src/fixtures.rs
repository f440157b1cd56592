//! Class file builders for tests.
use crate::config::VmConfig;
use crate::constant_pool::ConstantPool;
use crate::jvm::{ClassReader, MAGIC};
use crate::registry::{MemoryLoader, ROOT_CLASS};
use crate::runtime::Runtime;

use std::collections::HashMap;

use byteorder::{BigEndian, WriteBytesExt};

/// Accumulates constant pool entries, deduplicating Utf8 and Class entries.
pub struct ConstantPoolBuilder {
    bytes: Vec<u8>,
    next: u16,
    utf8: HashMap<String, u16>,
    classes: HashMap<String, u16>,
}

impl ConstantPoolBuilder {
    pub fn new() -> Self {
        Self {
            bytes: Vec::new(),
            next: 1,
            utf8: HashMap::new(),
            classes: HashMap::new(),
        }
    }

    pub fn utf8(&mut self, s: &str) -> u16 {
        if let Some(index) = self.utf8.get(s) {
            return *index;
        }
        self.bytes.write_u8(1).unwrap();
        self.bytes.write_u16::<BigEndian>(s.len() as u16).unwrap();
        self.bytes.extend_from_slice(s.as_bytes());
        let index = self.bump(1);
        self.utf8.insert(s.to_string(), index);
        index
    }

    pub fn class(&mut self, name: &str) -> u16 {
        if let Some(index) = self.classes.get(name) {
            return *index;
        }
        let name_index = self.utf8(name);
        self.bytes.write_u8(7).unwrap();
        self.bytes.write_u16::<BigEndian>(name_index).unwrap();
        let index = self.bump(1);
        self.classes.insert(name.to_string(), index);
        index
    }

    fn bump(&mut self, slots: u16) -> u16 {
        let index = self.next;
        self.next += slots;
        index
    }

    pub fn write(&self, out: &mut Vec<u8>) {
        out.write_u16::<BigEndian>(self.next).unwrap();
        out.extend_from_slice(&self.bytes);
    }

    pub fn parse(&self) -> ConstantPool {
        let mut bytes = Vec::new();
        self.write(&mut bytes);
        ConstantPool::parse(&mut ClassReader::new(&bytes)).unwrap()
    }
}

struct Member {
    flags: u16,
    name: String,
    descriptor: String,
    attributes: Vec<(String, Vec<u8>)>,
}

/// Builds a complete class file.
pub struct ClassBuilder {
    magic: u32,
    name: String,
    super_name: Option<String>,
    access_flags: u16,
    interfaces: Vec<String>,
    fields: Vec<Member>,
    methods: Vec<Member>,
    attributes: Vec<(String, Vec<u8>)>,
}

impl ClassBuilder {
    /// A public class extending the root class.
    pub fn new(name: &str) -> Self {
        Self {
            magic: MAGIC,
            name: name.to_string(),
            super_name: Some(ROOT_CLASS.to_string()),
            access_flags: 0x0021,
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            attributes: Vec::new(),
        }
    }

    /// The root class itself, without a superclass.
    pub fn root() -> Self {
        let mut builder = Self::new(ROOT_CLASS);
        builder.super_name = None;
        builder
    }

    /// An interface extending the root class.
    pub fn interface(name: &str) -> Self {
        let mut builder = Self::new(name);
        builder.access_flags = 0x0601;
        builder
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn magic(mut self, magic: u32) -> Self {
        self.magic = magic;
        self
    }

    pub fn extends(mut self, super_name: &str) -> Self {
        self.super_name = Some(super_name.to_string());
        self
    }

    pub fn implements(mut self, interface: &str) -> Self {
        self.interfaces.push(interface.to_string());
        self
    }

    pub fn field(mut self, flags: u16, name: &str, descriptor: &str) -> Self {
        self.fields.push(Member {
            flags,
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            attributes: Vec::new(),
        });
        self
    }

    pub fn method(mut self, flags: u16, name: &str, descriptor: &str) -> Self {
        self.methods.push(Member {
            flags,
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            attributes: Vec::new(),
        });
        self
    }

    /// Adds a static `<clinit>()V`.
    pub fn clinit(self) -> Self {
        self.method(0x0008, "<clinit>", "()V")
    }

    pub fn attribute(mut self, name: &str, info: &[u8]) -> Self {
        self.attributes.push((name.to_string(), info.to_vec()));
        self
    }

    pub fn deprecated(self) -> Self {
        self.attribute("Deprecated", &[])
    }

    pub fn build(&self) -> Vec<u8> {
        let mut pool = ConstantPoolBuilder::new();
        let this_class = pool.class(&self.name);
        let super_class = self.super_name.as_deref().map_or(0, |name| pool.class(name));
        let interfaces: Vec<u16> = self.interfaces.iter().map(|i| pool.class(i)).collect();

        let mut body = Vec::new();
        body.write_u16::<BigEndian>(self.access_flags).unwrap();
        body.write_u16::<BigEndian>(this_class).unwrap();
        body.write_u16::<BigEndian>(super_class).unwrap();
        body.write_u16::<BigEndian>(interfaces.len() as u16).unwrap();
        for index in interfaces {
            body.write_u16::<BigEndian>(index).unwrap();
        }
        for members in [&self.fields, &self.methods] {
            body.write_u16::<BigEndian>(members.len() as u16).unwrap();
            for member in members {
                body.write_u16::<BigEndian>(member.flags).unwrap();
                body.write_u16::<BigEndian>(pool.utf8(&member.name)).unwrap();
                body.write_u16::<BigEndian>(pool.utf8(&member.descriptor)).unwrap();
                write_attributes(&mut body, &mut pool, &member.attributes);
            }
        }
        write_attributes(&mut body, &mut pool, &self.attributes);

        let mut out = Vec::new();
        out.write_u32::<BigEndian>(self.magic).unwrap();
        out.write_u16::<BigEndian>(0).unwrap();
        out.write_u16::<BigEndian>(52).unwrap();
        pool.write(&mut out);
        out.extend_from_slice(&body);
        out
    }
}

fn write_attributes(out: &mut Vec<u8>, pool: &mut ConstantPoolBuilder, attributes: &[(String, Vec<u8>)]) {
    out.write_u16::<BigEndian>(attributes.len() as u16).unwrap();
    for (name, info) in attributes {
        out.write_u16::<BigEndian>(pool.utf8(name)).unwrap();
        out.write_u32::<BigEndian>(info.len() as u32).unwrap();
        out.extend_from_slice(info);
    }
}

/// A runtime whose registry can load the root class and `classes` on demand.
pub fn runtime_with(config: VmConfig, classes: &[ClassBuilder]) -> Runtime {
    let mut loader = MemoryLoader::new();
    loader.insert(ROOT_CLASS, ClassBuilder::root().build());
    for builder in classes {
        loader.insert(builder.name(), builder.build());
    }
    let mut rt = Runtime::new(config);
    rt.registry_mut().add_loader(loader);
    rt
}
