//! JVM class file model
//!
//! Parsing, a symbolic view of method bodies, re-encoding and structural verification.
//! Everything outside `Code` attributes the engine does not touch is kept as raw bytes,
//! so a class passes through unchanged apart from what a rewrite adds.

pub mod annotation;
pub mod attribute;
#[cfg(any(test, feature = "test-fixtures"))]
pub mod builder;
pub mod class;
pub mod code;
pub mod constpool;
pub mod defs;
pub mod descriptor;
pub mod error;
pub mod field;
pub mod flag;
pub mod frame;
pub mod insn;
pub mod maxs;
pub mod method;
pub mod opcodes;
pub mod reader;
pub mod verify;
pub mod writer;

#[cfg(any(test, feature = "test-fixtures"))]
pub use builder::ClassBuilder;
pub use class::ClassFile;
pub use code::{LineNumber, LocalVariable, MethodBody, TryCatchBlock};
pub use constpool::{Constant, ConstantPool};
pub use error::{ClassFileError, ClassFileResult};
pub use field::FieldInfo;
pub use insn::{ConstValue, Insn, InsnList, Label, MemberRef};
pub use method::MethodInfo;
pub use writer::ClassfileWritable;
