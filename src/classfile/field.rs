//! FieldInfo structure and serialization

use super::annotation;
use super::attribute::{self, AttributeInfo};
use super::constpool::ConstantPool;
use super::error::ClassFileResult;
use super::flag::{access_flags, has};
use super::reader::ByteReader;

#[derive(Debug, Clone, PartialEq)]
pub struct FieldInfo {
    pub access_flags: u16,
    pub name_index: u16,
    pub descriptor_index: u16,
    pub attributes: Vec<AttributeInfo>,
}

impl FieldInfo {
    pub fn new(access_flags: u16, name_index: u16, descriptor_index: u16) -> Self {
        Self { access_flags, name_index, descriptor_index, attributes: Vec::new() }
    }

    pub fn parse(reader: &mut ByteReader<'_>) -> ClassFileResult<Self> {
        Ok(Self {
            access_flags: reader.read_u2()?,
            name_index: reader.read_u2()?,
            descriptor_index: reader.read_u2()?,
            attributes: AttributeInfo::parse_table(reader)?,
        })
    }

    pub fn name<'p>(&self, constant_pool: &'p ConstantPool) -> ClassFileResult<&'p str> {
        constant_pool.utf8(self.name_index)
    }

    pub fn descriptor<'p>(&self, constant_pool: &'p ConstantPool) -> ClassFileResult<&'p str> {
        constant_pool.utf8(self.descriptor_index)
    }

    pub fn is_public(&self) -> bool {
        has(self.access_flags, access_flags::ACC_PUBLIC)
    }

    pub fn is_static(&self) -> bool {
        has(self.access_flags, access_flags::ACC_STATIC)
    }

    /// Annotation type descriptors on this field
    pub fn tags(&self, constant_pool: &ConstantPool) -> ClassFileResult<Vec<String>> {
        annotation::tags_of(&self.attributes, constant_pool)
    }

    pub fn has_tag(&self, constant_pool: &ConstantPool, descriptor: &str) -> ClassFileResult<bool> {
        Ok(self.tags(constant_pool)?.iter().any(|t| t == descriptor))
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&self.access_flags.to_be_bytes());
        bytes.extend_from_slice(&self.name_index.to_be_bytes());
        bytes.extend_from_slice(&self.descriptor_index.to_be_bytes());
        attribute::write_table(&mut bytes, &self.attributes);
        bytes
    }
}
