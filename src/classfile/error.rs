//! Errors raised while reading, decoding or encoding class files

use thiserror::Error;

/// Errors that can occur while parsing or serializing a class file
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClassFileError {
    #[error("Unexpected end of input at offset {offset} (needed {needed} more bytes)")]
    UnexpectedEof { offset: usize, needed: usize },
    #[error("Bad magic number: 0x{0:08x}")]
    BadMagic(u32),
    #[error("Unsupported class file version {major}.{minor}")]
    UnsupportedVersion { major: u16, minor: u16 },
    #[error("Invalid constant pool tag {tag} at index {index}")]
    InvalidConstantTag { tag: u8, index: u16 },
    #[error("Invalid constant pool index {index}: expected {expected}")]
    InvalidConstantIndex { index: u16, expected: &'static str },
    #[error("Constant pool is out of space")]
    ConstantPoolFull,
    #[error("Invalid modified UTF-8 in constant pool entry {index}")]
    InvalidUtf8 { index: u16 },
    #[error("Invalid opcode 0x{opcode:02x} at offset {offset}")]
    InvalidOpcode { opcode: u8, offset: usize },
    #[error("Offset {offset} does not start an instruction")]
    InvalidLabelOffset { offset: u32 },
    #[error("Unknown label {0}")]
    UnknownLabel(u32),
    #[error("Branch from {from} to {to} does not fit a 16-bit offset")]
    BranchOutOfRange { from: usize, to: usize },
    #[error("Code length {0} exceeds the class file limit")]
    CodeTooLarge(usize),
    #[error("Invalid descriptor: {0}")]
    InvalidDescriptor(String),
    #[error("Invalid attribute {name}: {reason}")]
    InvalidAttribute { name: String, reason: String },
    #[error("Invalid stack map frame type {0}")]
    InvalidFrameType(u8),
    #[error("Stack analysis failed: {0}")]
    FrameAnalysis(String),
    #[error("Trailing bytes after class file: {0}")]
    TrailingBytes(usize),
}

/// Result type for class file operations
pub type ClassFileResult<T> = Result<T, ClassFileError>;
