//! MethodInfo structure and serialization

use super::annotation;
use super::attribute::{self, AttributeInfo};
use super::code::MethodBody;
use super::constpool::ConstantPool;
use super::defs::{attribute_names, CONSTRUCTOR_METHOD_NAME};
use super::error::ClassFileResult;
use super::flag::{access_flags, has};
use super::reader::ByteReader;

#[derive(Debug, Clone, PartialEq)]
pub struct MethodInfo {
    pub access_flags: u16,
    pub name_index: u16,
    pub descriptor_index: u16,
    pub attributes: Vec<AttributeInfo>,
}

impl MethodInfo {
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

    pub fn is_constructor(&self, constant_pool: &ConstantPool) -> bool {
        self.name(constant_pool).map(|n| n == CONSTRUCTOR_METHOD_NAME).unwrap_or(false)
    }

    pub fn is_public(&self) -> bool {
        has(self.access_flags, access_flags::ACC_PUBLIC)
    }

    pub fn is_static(&self) -> bool {
        has(self.access_flags, access_flags::ACC_STATIC)
    }

    pub fn tags(&self, constant_pool: &ConstantPool) -> ClassFileResult<Vec<String>> {
        annotation::tags_of(&self.attributes, constant_pool)
    }

    pub fn has_tag(&self, constant_pool: &ConstantPool, descriptor: &str) -> ClassFileResult<bool> {
        Ok(self.tags(constant_pool)?.iter().any(|t| t == descriptor))
    }

    fn code_position(&self, constant_pool: &ConstantPool) -> Option<usize> {
        self.attributes
            .iter()
            .position(|a| a.name(constant_pool).map(|n| n == attribute_names::CODE).unwrap_or(false))
    }

    pub fn has_code(&self, constant_pool: &ConstantPool) -> bool {
        self.code_position(constant_pool).is_some()
    }

    /// Decoded body, or `None` for abstract and native methods
    pub fn body(&self, constant_pool: &ConstantPool) -> ClassFileResult<Option<MethodBody>> {
        match self.code_position(constant_pool) {
            Some(pos) => MethodBody::decode(&self.attributes[pos].info, constant_pool).map(Some),
            None => Ok(None),
        }
    }

    /// Encode `body` and store it as this method's `Code` attribute, replacing any
    /// existing one in place
    pub fn set_body(&mut self, body: &mut MethodBody, constant_pool: &mut ConstantPool) -> ClassFileResult<()> {
        let descriptor = self.descriptor(constant_pool)?.to_string();
        let info = body.encode(constant_pool, &descriptor, self.is_static())?;
        match self.code_position(constant_pool) {
            Some(pos) => self.attributes[pos].info = info,
            None => {
                let name_index = constant_pool.add_utf8(attribute_names::CODE)?;
                self.attributes.push(AttributeInfo::new(name_index, info));
            }
        }
        Ok(())
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
