//! Core classfile structure: parsing and queries

use super::attribute::{find_attribute, AttributeInfo, InnerClassEntry};
use super::constpool::ConstantPool;
use super::defs::{attribute_names, major_versions, MAGIC, MAX_SUPPORTED_MAJOR, MIN_SUPPORTED_MAJOR};
use super::error::{ClassFileError, ClassFileResult};
use super::field::FieldInfo;
use super::flag::{access_flags, has};
use super::method::MethodInfo;
use super::reader::ByteReader;
use super::writer::ClassfileWritable;

#[derive(Debug, Clone, PartialEq)]
pub struct ClassFile {
    pub magic: u32,
    pub minor_version: u16,
    pub major_version: u16,
    pub constant_pool: ConstantPool,
    pub access_flags: u16,
    pub this_class: u16,
    pub super_class: u16,
    pub interfaces: Vec<u16>,
    pub fields: Vec<FieldInfo>,
    pub methods: Vec<MethodInfo>,
    pub attributes: Vec<AttributeInfo>,
}

impl Default for ClassFile {
    fn default() -> Self {
        Self::new()
    }
}

impl ClassFile {
    pub fn new() -> Self {
        Self {
            magic: MAGIC,
            minor_version: 0,
            major_version: major_versions::JAVA_8,
            constant_pool: ConstantPool::new(),
            access_flags: 0,
            this_class: 0,
            super_class: 0,
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            attributes: Vec::new(),
        }
    }

    pub fn parse(bytes: &[u8]) -> ClassFileResult<Self> {
        let mut reader = ByteReader::new(bytes);
        let magic = reader.read_u4()?;
        if magic != MAGIC {
            return Err(ClassFileError::BadMagic(magic));
        }
        let minor_version = reader.read_u2()?;
        let major_version = reader.read_u2()?;
        if !(MIN_SUPPORTED_MAJOR..=MAX_SUPPORTED_MAJOR).contains(&major_version) {
            return Err(ClassFileError::UnsupportedVersion { major: major_version, minor: minor_version });
        }
        let constant_pool = ConstantPool::parse(&mut reader)?;
        let access_flags = reader.read_u2()?;
        let this_class = reader.read_u2()?;
        let super_class = reader.read_u2()?;
        let interface_count = reader.read_u2()?;
        let interfaces = (0..interface_count)
            .map(|_| reader.read_u2())
            .collect::<ClassFileResult<Vec<_>>>()?;
        let field_count = reader.read_u2()?;
        let fields = (0..field_count)
            .map(|_| FieldInfo::parse(&mut reader))
            .collect::<ClassFileResult<Vec<_>>>()?;
        let method_count = reader.read_u2()?;
        let methods = (0..method_count)
            .map(|_| MethodInfo::parse(&mut reader))
            .collect::<ClassFileResult<Vec<_>>>()?;
        let attributes = AttributeInfo::parse_table(&mut reader)?;
        if !reader.is_empty() {
            return Err(ClassFileError::TrailingBytes(reader.remaining()));
        }
        Ok(Self {
            magic,
            minor_version,
            major_version,
            constant_pool,
            access_flags,
            this_class,
            super_class,
            interfaces,
            fields,
            methods,
            attributes,
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_classfile_bytes()
    }

    /// Internal binary name, e.g. `com/example/SampleTest`
    pub fn name(&self) -> ClassFileResult<&str> {
        self.constant_pool.class_name(self.this_class)
    }

    /// Superclass name; `None` only for `java/lang/Object` and `module-info`
    pub fn super_name(&self) -> ClassFileResult<Option<&str>> {
        if self.super_class == 0 {
            return Ok(None);
        }
        self.constant_pool.class_name(self.super_class).map(Some)
    }

    pub fn is_public(&self) -> bool {
        has(self.access_flags, access_flags::ACC_PUBLIC)
    }

    pub fn is_interface(&self) -> bool {
        has(self.access_flags, access_flags::ACC_INTERFACE)
    }

    pub fn constructors(&self) -> impl Iterator<Item = &MethodInfo> {
        self.methods.iter().filter(move |m| m.is_constructor(&self.constant_pool))
    }

    pub fn field_names(&self) -> ClassFileResult<Vec<&str>> {
        self.fields.iter().map(|f| f.name(&self.constant_pool)).collect()
    }

    /// Entries of the `InnerClasses` attribute, empty when the class has none
    pub fn inner_classes(&self) -> ClassFileResult<Vec<InnerClassEntry>> {
        match find_attribute(&self.attributes, &self.constant_pool, attribute_names::INNER_CLASSES) {
            Some(attribute) => InnerClassEntry::parse_all(&attribute.info),
            None => Ok(Vec::new()),
        }
    }

    /// The `InnerClasses` entry that describes this class itself, if any
    pub fn own_inner_class_entry(&self) -> ClassFileResult<Option<InnerClassEntry>> {
        let this_name = self.name()?;
        for entry in self.inner_classes()? {
            if entry.inner_class_info_index == 0 {
                continue;
            }
            if self.constant_pool.class_name(entry.inner_class_info_index)? == this_name {
                return Ok(Some(entry));
            }
        }
        Ok(None)
    }

    /// Access flags as written in the source. javac records a protected or private
    /// member class as public or package-private in `access_flags`; the real
    /// modifiers live in its own `InnerClasses` entry.
    pub fn declared_access_flags(&self) -> ClassFileResult<u16> {
        Ok(self
            .own_inner_class_entry()?
            .map_or(self.access_flags, |entry| entry.inner_class_access_flags))
    }

    /// True when the `InnerClasses` attribute describes this class as a member class
    /// declared without `static`, i.e. one that needs an enclosing instance
    pub fn is_inner_instance_class(&self) -> ClassFileResult<bool> {
        Ok(self.own_inner_class_entry()?.is_some_and(|entry| {
            let anonymous_or_local = entry.outer_class_info_index == 0;
            !anonymous_or_local && !has(entry.inner_class_access_flags, access_flags::ACC_STATIC)
        }))
    }
}
