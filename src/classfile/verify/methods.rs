use std::collections::HashSet;

use crate::classfile::class::ClassFile;
use crate::classfile::constpool::Constant;
use crate::classfile::descriptor;
use crate::classfile::error::ClassFileError;
use crate::classfile::flag::access_flags;
use crate::classfile::method::MethodInfo;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MethodVerifyError {
    #[error("Invalid constant pool index {0}")]
    InvalidConstantPoolIndex(u16),
    #[error("Invalid constant pool index type {0}")]
    InvalidConstantPoolIndexType(u16),
    #[error("Invalid method access flags on {name}: 0x{flags:04x}")]
    InvalidMethodAccessFlags { name: String, flags: u16 },
    #[error("Invalid method descriptor: {0}")]
    InvalidDescriptor(String),
    #[error("Duplicate method {name}{descriptor}")]
    DuplicateMethod { name: String, descriptor: String },
    #[error("Method {0} must have a Code attribute unless abstract or native")]
    MissingCodeAttribute(String),
    #[error("Abstract or native method {0} must not have a Code attribute")]
    ForbiddenCodeAttribute(String),
    #[error("Code of {name} is malformed: {reason}")]
    InvalidCode { name: String, reason: String },
}

pub type Result<T> = std::result::Result<T, MethodVerifyError>;

/// Verify the ClassFile methods
pub fn verify(class_file: &ClassFile) -> Result<()> {
    let mut seen = HashSet::new();
    for method in &class_file.methods {
        let name = utf8_at(class_file, method.name_index)?;
        let desc = utf8_at(class_file, method.descriptor_index)?;
        if descriptor::parse_method(desc).is_err() {
            return Err(MethodVerifyError::InvalidDescriptor(desc.to_string()));
        }
        verify_access_flags(class_file, method, name)?;
        if !seen.insert((name, desc)) {
            return Err(MethodVerifyError::DuplicateMethod { name: name.to_string(), descriptor: desc.to_string() });
        }
        verify_code(class_file, method, name)?;
    }
    Ok(())
}

fn utf8_at(class_file: &ClassFile, index: u16) -> Result<&str> {
    match class_file.constant_pool.get(index) {
        Some(Constant::Utf8(value)) => Ok(value),
        None => Err(MethodVerifyError::InvalidConstantPoolIndex(index)),
        _ => Err(MethodVerifyError::InvalidConstantPoolIndexType(index)),
    }
}

fn verify_access_flags(class_file: &ClassFile, method: &MethodInfo, name: &str) -> Result<()> {
    let flags = method.access_flags;
    let invalid = || MethodVerifyError::InvalidMethodAccessFlags { name: name.to_string(), flags };
    if (flags & access_flags::VISIBILITY_MASK).count_ones() > 1 {
        return Err(invalid());
    }
    let class_is_interface = class_file.access_flags & access_flags::ACC_INTERFACE != 0;
    if class_is_interface
        && flags & (access_flags::ACC_PROTECTED | access_flags::ACC_FINAL | access_flags::ACC_SYNCHRONIZED | access_flags::ACC_NATIVE) != 0
    {
        return Err(invalid());
    }
    if flags & access_flags::ACC_ABSTRACT != 0
        && flags
            & (access_flags::ACC_PRIVATE
                | access_flags::ACC_STATIC
                | access_flags::ACC_FINAL
                | access_flags::ACC_SYNCHRONIZED
                | access_flags::ACC_NATIVE
                | access_flags::ACC_STRICT)
            != 0
    {
        return Err(invalid());
    }
    Ok(())
}

fn verify_code(class_file: &ClassFile, method: &MethodInfo, name: &str) -> Result<()> {
    let pool = &class_file.constant_pool;
    let bodiless = method.access_flags & (access_flags::ACC_ABSTRACT | access_flags::ACC_NATIVE) != 0;
    match (bodiless, method.has_code(pool)) {
        (true, true) => Err(MethodVerifyError::ForbiddenCodeAttribute(name.to_string())),
        (false, false) => Err(MethodVerifyError::MissingCodeAttribute(name.to_string())),
        (true, false) => Ok(()),
        (false, true) => method
            .body(pool)
            .map(|_| ())
            .map_err(|e: ClassFileError| MethodVerifyError::InvalidCode { name: name.to_string(), reason: e.to_string() }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classfile::builder::ClassBuilder;
    use crate::classfile::flag::access_flags::*;

    #[test]
    fn test_missing_code_rejected() {
        let class = ClassBuilder::new("A").method(ACC_PUBLIC, "run", "()V", &[], None).build().unwrap();
        assert_eq!(verify(&class), Err(MethodVerifyError::MissingCodeAttribute("run".to_string())));
    }

    #[test]
    fn test_abstract_without_code_accepted() {
        let class = ClassBuilder::new("A")
            .access(ACC_PUBLIC | ACC_ABSTRACT | ACC_SUPER)
            .method(ACC_PUBLIC | ACC_ABSTRACT, "run", "()V", &[], None)
            .build()
            .unwrap();
        assert_eq!(verify(&class), Ok(()));
    }

    #[test]
    fn test_duplicate_constructor_rejected() {
        let class = ClassBuilder::new("A")
            .default_constructor(ACC_PUBLIC)
            .default_constructor(ACC_PRIVATE)
            .build()
            .unwrap();
        assert!(matches!(verify(&class), Err(MethodVerifyError::DuplicateMethod { .. })));
    }

    #[test]
    fn test_truncated_code_rejected() {
        let mut class = ClassBuilder::new("A").default_constructor(ACC_PUBLIC).build().unwrap();
        let code = &mut class.methods[0].attributes[0].info;
        code.truncate(code.len() - 2);
        assert!(matches!(verify(&class), Err(MethodVerifyError::InvalidCode { .. })));
    }
}
