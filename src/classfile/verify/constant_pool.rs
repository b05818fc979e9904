use crate::classfile::class::ClassFile;
use crate::classfile::constpool::{Constant, ConstantPool};
use crate::classfile::defs::attribute_names;
use crate::classfile::attribute::find_attribute;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConstantPoolVerifyError {
    #[error("Invalid constant pool index {0}")]
    InvalidConstantPoolIndex(u16),
    #[error("Invalid constant pool index type {0}")]
    InvalidConstantPoolIndexType(u16),
    #[error("Constant {0} refers to the unusable second slot of a long or double")]
    UnusableSlotReference(u16),
    #[error("Invalid method handle kind {kind} at index {index}")]
    InvalidMethodHandleKind { kind: u8, index: u16 },
    #[error("BootstrapMethods attribute not defined")]
    BootstrapMethodsNotDefined,
}

pub type Result<T> = std::result::Result<T, ConstantPoolVerifyError>;

/// Verify the ClassFile ConstantPool
pub fn verify(class_file: &ClassFile) -> Result<()> {
    let pool = &class_file.constant_pool;
    let has_bootstrap =
        find_attribute(&class_file.attributes, pool, attribute_names::BOOTSTRAP_METHODS).is_some();
    for (index, constant) in pool.iter() {
        verify_constant(pool, index, constant, has_bootstrap)?;
    }
    Ok(())
}

fn expect(pool: &ConstantPool, owner: u16, target: u16, ok: fn(&Constant) -> bool) -> Result<()> {
    match pool.get(target) {
        Some(Constant::Unusable) => Err(ConstantPoolVerifyError::UnusableSlotReference(owner)),
        Some(constant) if ok(constant) => Ok(()),
        Some(_) => Err(ConstantPoolVerifyError::InvalidConstantPoolIndexType(owner)),
        None => Err(ConstantPoolVerifyError::InvalidConstantPoolIndex(owner)),
    }
}

fn is_utf8(c: &Constant) -> bool {
    matches!(c, Constant::Utf8(_) | Constant::RawUtf8(_))
}

fn is_class(c: &Constant) -> bool {
    matches!(c, Constant::Class(_))
}

fn is_name_and_type(c: &Constant) -> bool {
    matches!(c, Constant::NameAndType(..))
}

fn verify_constant(pool: &ConstantPool, index: u16, constant: &Constant, has_bootstrap: bool) -> Result<()> {
    match constant {
        Constant::Class(name_index)
        | Constant::Module(name_index)
        | Constant::Package(name_index)
        | Constant::String(name_index)
        | Constant::MethodType(name_index) => expect(pool, index, *name_index, is_utf8),
        Constant::FieldRef(class_index, nat_index)
        | Constant::MethodRef(class_index, nat_index)
        | Constant::InterfaceMethodRef(class_index, nat_index) => {
            expect(pool, index, *class_index, is_class)?;
            expect(pool, index, *nat_index, is_name_and_type)
        }
        Constant::NameAndType(name_index, desc_index) => {
            expect(pool, index, *name_index, is_utf8)?;
            expect(pool, index, *desc_index, is_utf8)
        }
        Constant::MethodHandle(kind, reference_index) => {
            let accepted: fn(&Constant) -> bool = match *kind {
                1..=4 => |c| matches!(c, Constant::FieldRef(..)),
                5 | 8 => |c| matches!(c, Constant::MethodRef(..)),
                6 | 7 => |c| matches!(c, Constant::MethodRef(..) | Constant::InterfaceMethodRef(..)),
                9 => |c| matches!(c, Constant::InterfaceMethodRef(..)),
                _ => return Err(ConstantPoolVerifyError::InvalidMethodHandleKind { kind: *kind, index }),
            };
            expect(pool, index, *reference_index, accepted)
        }
        Constant::Dynamic(_, nat_index) | Constant::InvokeDynamic(_, nat_index) => {
            if !has_bootstrap {
                return Err(ConstantPoolVerifyError::BootstrapMethodsNotDefined);
            }
            expect(pool, index, *nat_index, is_name_and_type)
        }
        Constant::Utf8(_)
        | Constant::RawUtf8(_)
        | Constant::Integer(_)
        | Constant::Float(_)
        | Constant::Long(_)
        | Constant::Double(_)
        | Constant::Unusable => Ok(()),
    }
}
