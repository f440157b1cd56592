//! Lightweight reader for JVM class file buffers: a big-endian cursor and the
//! generic attribute holder shared by classes, fields and methods.
use crate::constant_pool::ConstantPool;
use crate::error::ClassFormatError;

use std::fmt;
use std::fs::File;
use std::io::prelude::*;
use std::path::Path;

use byteorder::{BigEndian, ByteOrder};

type Result<T> = std::result::Result<T, ClassFormatError>;

/// Every class file starts with this sentinel.
pub const MAGIC: u32 = 0xCAFE_BABE;

/// Reads a class file from disk into a byte buffer.
pub fn read_class_file(path: &Path) -> std::result::Result<Vec<u8>, std::io::Error> {
    let mut f = File::open(path)?;
    let mut buffer = Vec::new();
    f.read_to_end(&mut buffer)?;
    Ok(buffer)
}

/// Sequential cursor over a class file buffer. All numbers are big-endian.
#[derive(Debug, Clone, Copy)]
pub struct ClassReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ClassReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Current byte offset within the buffer.
    pub fn offset(&self) -> usize {
        self.pos
    }

    /// Remaining unread length.
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    /// Read exactly `n` bytes and advance past them.
    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.data.len())
            .ok_or(ClassFormatError::UnexpectedEof { offset: self.pos })?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    /// Read an unsigned integer of `width` bytes (1, 2, 4 or 8).
    pub fn read_unsigned(&mut self, width: usize) -> Result<u64> {
        if !matches!(width, 1 | 2 | 4 | 8) {
            return Err(ClassFormatError::UnsupportedWidth(width));
        }
        let bytes = self.read_bytes(width)?;
        Ok(BigEndian::read_uint(bytes, width))
    }

    pub fn read_u1(&mut self) -> Result<u8> {
        Ok(self.read_bytes(1)?[0])
    }

    pub fn read_u2(&mut self) -> Result<u16> {
        Ok(BigEndian::read_u16(self.read_bytes(2)?))
    }

    pub fn read_u4(&mut self) -> Result<u32> {
        Ok(BigEndian::read_u32(self.read_bytes(4)?))
    }
}

/// Attribute whose payload is kept as raw bytes. Only its name is ever
/// interpreted (for example `Deprecated`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenericAttribute {
    pub name: String,
    pub length: u32,
    pub info: Vec<u8>,
}

impl GenericAttribute {
    /// Parse one `attribute_info` structure.
    pub fn parse(reader: &mut ClassReader, pool: &ConstantPool) -> Result<Self> {
        let name_index = reader.read_u2()?;
        let name = pool.utf8(name_index)?.to_string();
        let length = reader.read_u4()?;
        let info = reader.read_bytes(length as usize)?.to_vec();
        Ok(Self { name, length, info })
    }

    /// Parse a `u2` count followed by that many attributes.
    pub fn parse_list(reader: &mut ClassReader, pool: &ConstantPool) -> Result<Vec<Self>> {
        let count = reader.read_u2()?;
        (0..count).map(|_| Self::parse(reader, pool)).collect()
    }
}

impl fmt::Display for GenericAttribute {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "\tGeneric: {}", self.name)
    }
}
