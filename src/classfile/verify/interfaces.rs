use std::collections::HashSet;

use crate::classfile::class::ClassFile;
use crate::classfile::constpool::Constant;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum InterfacesVerifyError {
    #[error("Invalid constant pool index {0}")]
    InvalidConstantPoolIndex(u16),
    #[error("Invalid constant pool index type {0}")]
    InvalidConstantPoolIndexType(u16),
    #[error("Interface {0} listed more than once")]
    DuplicateInterface(String),
}

pub type Result<T> = std::result::Result<T, InterfacesVerifyError>;

/// Every direct superinterface is a distinct Class constant
pub fn verify(class_file: &ClassFile) -> Result<()> {
    let pool = &class_file.constant_pool;
    let mut seen = HashSet::new();
    for interface in &class_file.interfaces {
        match pool.get(*interface) {
            Some(Constant::Class(_)) => {}
            None => return Err(InterfacesVerifyError::InvalidConstantPoolIndex(*interface)),
            _ => return Err(InterfacesVerifyError::InvalidConstantPoolIndexType(*interface)),
        }
        let name = pool
            .class_name(*interface)
            .map_err(|_| InterfacesVerifyError::InvalidConstantPoolIndexType(*interface))?;
        if !seen.insert(name) {
            return Err(InterfacesVerifyError::DuplicateInterface(name.to_string()));
        }
    }
    Ok(())
}
