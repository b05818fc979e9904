//! Structural verification of parsed or rewritten class files
//!
//! Checks the parts of JVMS §4.8 that a rewrite can break: constant pool cross-references,
//! access flag combinations, duplicate members and `Code` presence. Bytecode type checking
//! is left to the JVM.

pub mod class_access_flags;
pub mod constant_pool;
pub mod fields;
pub mod interfaces;
pub mod methods;

use super::class::ClassFile;
use super::constpool::Constant;
use super::flag::{access_flags, has};

pub use class_access_flags::ClassAccessFlagsError;
pub use constant_pool::ConstantPoolVerifyError;
pub use fields::FieldVerifyError;
pub use interfaces::InterfacesVerifyError;
pub use methods::MethodVerifyError;

pub type VerifyResult<T> = Result<T, VerifyError>;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum VerifyError {
    #[error(transparent)]
    ConstantPool(#[from] ConstantPoolVerifyError),
    #[error(transparent)]
    ClassAccessFlags(#[from] ClassAccessFlagsError),
    #[error(transparent)]
    Interfaces(#[from] InterfacesVerifyError),
    #[error(transparent)]
    Fields(#[from] FieldVerifyError),
    #[error(transparent)]
    Methods(#[from] MethodVerifyError),
    #[error("this_class {0} is not a Class constant")]
    InvalidThisClass(u16),
    #[error("super_class {0} is not a Class constant")]
    InvalidSuperClass(u16),
}

/// Verify the ClassFile by orchestrating all sub-verifiers
pub fn verify(class_file: &ClassFile) -> VerifyResult<()> {
    constant_pool::verify(class_file)?;
    let class_name = class_file.name().ok();
    class_access_flags::verify(class_file, class_name)?;
    verify_this_class(class_file)?;
    verify_super_class(class_file)?;
    interfaces::verify(class_file)?;
    fields::verify(class_file)?;
    methods::verify(class_file)?;
    Ok(())
}

fn verify_this_class(class_file: &ClassFile) -> VerifyResult<()> {
    match class_file.constant_pool.get(class_file.this_class) {
        Some(Constant::Class(_)) => Ok(()),
        _ => Err(VerifyError::InvalidThisClass(class_file.this_class)),
    }
}

fn verify_super_class(class_file: &ClassFile) -> VerifyResult<()> {
    let super_class = class_file.super_class;
    if super_class == 0 {
        // only java/lang/Object and module descriptors have no superclass
        let root = class_file.name().map(|n| n == super::defs::JAVA_LANG_OBJECT).unwrap_or(false);
        if root || has(class_file.access_flags, access_flags::ACC_MODULE) {
            return Ok(());
        }
        return Err(VerifyError::InvalidSuperClass(super_class));
    }
    match class_file.constant_pool.get(super_class) {
        Some(Constant::Class(_)) => Ok(()),
        _ => Err(VerifyError::InvalidSuperClass(super_class)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classfile::builder::ClassBuilder;
    use crate::classfile::flag::access_flags::*;

    #[test]
    fn test_built_class_verifies() {
        let class = ClassBuilder::new("Sample")
            .field(ACC_PUBLIC, "name", "Ljava/lang/String;", &[])
            .default_constructor(ACC_PUBLIC)
            .build()
            .unwrap();
        assert_eq!(verify(&class), Ok(()));
    }

    #[test]
    fn test_missing_super_class_rejected() {
        let mut class = ClassBuilder::new("Sample").build().unwrap();
        class.super_class = 0;
        assert_eq!(verify(&class), Err(VerifyError::InvalidSuperClass(0)));
    }

    #[test]
    fn test_this_class_must_be_class_constant() {
        let mut class = ClassBuilder::new("Sample").build().unwrap();
        class.this_class = class.constant_pool.add_utf8("Sample").unwrap();
        assert!(matches!(verify(&class), Err(VerifyError::InvalidThisClass(_))));
    }
}
