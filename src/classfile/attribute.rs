//! Raw attributes and the `InnerClasses` table

use super::constpool::ConstantPool;
use super::error::{ClassFileError, ClassFileResult};
use super::reader::ByteReader;

/// An attribute kept as its name index and undecoded payload
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeInfo {
    pub name_index: u16,
    pub info: Vec<u8>,
}

impl AttributeInfo {
    pub fn new(name_index: u16, info: Vec<u8>) -> Self {
        Self { name_index, info }
    }

    pub fn parse(reader: &mut ByteReader<'_>) -> ClassFileResult<Self> {
        let name_index = reader.read_u2()?;
        let length = reader.read_u4()? as usize;
        let info = reader.read_bytes(length)?.to_vec();
        Ok(Self { name_index, info })
    }

    /// Read a `u2`-counted attribute table
    pub fn parse_table(reader: &mut ByteReader<'_>) -> ClassFileResult<Vec<Self>> {
        let count = reader.read_u2()?;
        (0..count).map(|_| Self::parse(reader)).collect()
    }

    pub fn name<'p>(&self, constant_pool: &'p ConstantPool) -> ClassFileResult<&'p str> {
        constant_pool.utf8(self.name_index)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(6 + self.info.len());
        bytes.extend_from_slice(&self.name_index.to_be_bytes());
        bytes.extend_from_slice(&(self.info.len() as u32).to_be_bytes());
        bytes.extend_from_slice(&self.info);
        bytes
    }
}

/// First attribute in `attributes` whose name is `name`
pub fn find_attribute<'a>(
    attributes: &'a [AttributeInfo],
    constant_pool: &ConstantPool,
    name: &str,
) -> Option<&'a AttributeInfo> {
    attributes
        .iter()
        .find(|attr| attr.name(constant_pool).map(|n| n == name).unwrap_or(false))
}

pub(crate) fn write_table(bytes: &mut Vec<u8>, attributes: &[AttributeInfo]) {
    bytes.extend_from_slice(&(attributes.len() as u16).to_be_bytes());
    for attribute in attributes {
        bytes.extend_from_slice(&attribute.to_bytes());
    }
}

/// One row of an `InnerClasses` attribute. Zero indices mean "absent".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InnerClassEntry {
    pub inner_class_info_index: u16,
    pub outer_class_info_index: u16,
    pub inner_name_index: u16,
    pub inner_class_access_flags: u16,
}

impl InnerClassEntry {
    pub fn parse_all(info: &[u8]) -> ClassFileResult<Vec<Self>> {
        let mut reader = ByteReader::new(info);
        let count = reader.read_u2()?;
        let entries = (0..count)
            .map(|_| {
                Ok(Self {
                    inner_class_info_index: reader.read_u2()?,
                    outer_class_info_index: reader.read_u2()?,
                    inner_name_index: reader.read_u2()?,
                    inner_class_access_flags: reader.read_u2()?,
                })
            })
            .collect::<ClassFileResult<Vec<_>>>()?;
        if !reader.is_empty() {
            return Err(ClassFileError::InvalidAttribute {
                name: "InnerClasses".to_string(),
                reason: format!("{} trailing bytes", reader.remaining()),
            });
        }
        Ok(entries)
    }

    pub fn to_bytes(entries: &[Self]) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(2 + entries.len() * 8);
        bytes.extend_from_slice(&(entries.len() as u16).to_be_bytes());
        for entry in entries {
            bytes.extend_from_slice(&entry.inner_class_info_index.to_be_bytes());
            bytes.extend_from_slice(&entry.outer_class_info_index.to_be_bytes());
            bytes.extend_from_slice(&entry.inner_name_index.to_be_bytes());
            bytes.extend_from_slice(&entry.inner_class_access_flags.to_be_bytes());
        }
        bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_round_trip() {
        let attr = AttributeInfo::new(7, vec![1, 2, 3]);
        let bytes = attr.to_bytes();
        assert_eq!(bytes, vec![0, 7, 0, 0, 0, 3, 1, 2, 3]);
        let parsed = AttributeInfo::parse(&mut ByteReader::new(&bytes)).unwrap();
        assert_eq!(parsed, attr);
    }

    #[test]
    fn test_inner_classes_trailing_bytes_rejected() {
        let mut bytes = InnerClassEntry::to_bytes(&[InnerClassEntry {
            inner_class_info_index: 2,
            outer_class_info_index: 3,
            inner_name_index: 4,
            inner_class_access_flags: 0x0008,
        }]);
        assert_eq!(InnerClassEntry::parse_all(&bytes).unwrap().len(), 1);
        bytes.push(0);
        assert!(InnerClassEntry::parse_all(&bytes).is_err());
    }
}
