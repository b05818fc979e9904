use std::collections::HashSet;

use crate::classfile::class::ClassFile;
use crate::classfile::constpool::Constant;
use crate::classfile::descriptor;
use crate::classfile::flag::access_flags;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FieldVerifyError {
    #[error("Invalid constant pool index {0}")]
    InvalidConstantPoolIndex(u16),
    #[error("Invalid constant pool index type {0}")]
    InvalidConstantPoolIndexType(u16),
    #[error("Invalid field access flags: 0x{0:04x}")]
    InvalidFieldAccessFlags(u16),
    #[error("Invalid field descriptor: {0}")]
    InvalidDescriptor(String),
    #[error("Duplicate field {name} {descriptor}")]
    DuplicateField { name: String, descriptor: String },
}

pub type Result<T> = std::result::Result<T, FieldVerifyError>;

pub fn verify(class_file: &ClassFile) -> Result<()> {
    let mut seen = HashSet::new();
    for field in &class_file.fields {
        let name = utf8_at(class_file, field.name_index)?;
        let desc = utf8_at(class_file, field.descriptor_index)?;
        if descriptor::field_slots(desc).is_err() {
            return Err(FieldVerifyError::InvalidDescriptor(desc.to_string()));
        }
        verify_access_flags(class_file, field.access_flags)?;
        if !seen.insert((name, desc)) {
            return Err(FieldVerifyError::DuplicateField { name: name.to_string(), descriptor: desc.to_string() });
        }
    }
    Ok(())
}

fn utf8_at(class_file: &ClassFile, index: u16) -> Result<&str> {
    match class_file.constant_pool.get(index) {
        Some(Constant::Utf8(value)) => Ok(value),
        None => Err(FieldVerifyError::InvalidConstantPoolIndex(index)),
        _ => Err(FieldVerifyError::InvalidConstantPoolIndexType(index)),
    }
}

fn verify_access_flags(class_file: &ClassFile, flags: u16) -> Result<()> {
    if (flags & access_flags::VISIBILITY_MASK).count_ones() > 1 {
        return Err(FieldVerifyError::InvalidFieldAccessFlags(flags));
    }
    let class_is_interface = class_file.access_flags & access_flags::ACC_INTERFACE != 0;
    if class_is_interface {
        let must = access_flags::ACC_PUBLIC | access_flags::ACC_STATIC | access_flags::ACC_FINAL;
        let illegal = access_flags::ACC_PRIVATE
            | access_flags::ACC_PROTECTED
            | access_flags::ACC_VOLATILE
            | access_flags::ACC_TRANSIENT
            | access_flags::ACC_ENUM;
        if flags & must != must || flags & illegal != 0 {
            return Err(FieldVerifyError::InvalidFieldAccessFlags(flags));
        }
    } else if flags & access_flags::ACC_FINAL != 0 && flags & access_flags::ACC_VOLATILE != 0 {
        return Err(FieldVerifyError::InvalidFieldAccessFlags(flags));
    }
    Ok(())
}
