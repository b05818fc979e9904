use crate::classfile::class::ClassFile;
use crate::classfile::flag::access_flags::*;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ClassAccessFlagsError {
    #[error("Invalid class access flags: 0x{0:04x}")]
    Invalid(u16),
}

pub type Result<T> = std::result::Result<T, ClassAccessFlagsError>;

/// Verify the class access flags (JVMS 4.1, table 4.1-B)
pub fn verify(class_file: &ClassFile, class_name: Option<&str>) -> Result<()> {
    let flags = class_file.access_flags;
    let has = |bit: u16| flags & bit != 0;

    if has(ACC_MODULE) {
        // module-info carries no other flag
        return if flags == ACC_MODULE { Ok(()) } else { Err(ClassAccessFlagsError::Invalid(flags)) };
    }
    if has(ACC_ANNOTATION) && !has(ACC_INTERFACE) {
        return Err(ClassAccessFlagsError::Invalid(flags));
    }
    if has(ACC_INTERFACE) {
        let package_info = class_name
            .map(|full| full.rsplit('/').next() == Some("package-info"))
            .unwrap_or(false);
        if !has(ACC_ABSTRACT) && !package_info {
            return Err(ClassAccessFlagsError::Invalid(flags));
        }
        if has(ACC_FINAL) || has(ACC_SUPER) || has(ACC_ENUM) {
            return Err(ClassAccessFlagsError::Invalid(flags));
        }
    } else if has(ACC_FINAL) && has(ACC_ABSTRACT) {
        return Err(ClassAccessFlagsError::Invalid(flags));
    }
    Ok(())
}
