//! Trait-based serialization for classfile structures

use std::io::Write;

use super::attribute::AttributeInfo;
use super::class::ClassFile;
use super::constpool::ConstantPool;
use super::field::FieldInfo;
use super::method::MethodInfo;

/// An object which can be written into a classfile.
pub trait ClassfileWritable {
    /// Writes the bytes of this object into the given buffer.
    fn write_to_classfile<W: Write>(&self, buffer: &mut W) -> std::io::Result<()>;

    /// Writes the bytes of this object into a newly created buffer.
    fn to_classfile_bytes(&self) -> Vec<u8> {
        let mut buffer = Vec::new();
        // writing into a Vec cannot fail
        let _ = self.write_to_classfile(&mut buffer);
        buffer
    }
}

impl ClassfileWritable for ClassFile {
    fn write_to_classfile<W: Write>(&self, buffer: &mut W) -> std::io::Result<()> {
        buffer.write_all(&self.magic.to_be_bytes())?;
        buffer.write_all(&self.minor_version.to_be_bytes())?;
        buffer.write_all(&self.major_version.to_be_bytes())?;
        self.constant_pool.write_to_classfile(buffer)?;
        buffer.write_all(&self.access_flags.to_be_bytes())?;
        buffer.write_all(&self.this_class.to_be_bytes())?;
        buffer.write_all(&self.super_class.to_be_bytes())?;

        buffer.write_all(&(self.interfaces.len() as u16).to_be_bytes())?;
        for interface in &self.interfaces {
            buffer.write_all(&interface.to_be_bytes())?;
        }

        buffer.write_all(&(self.fields.len() as u16).to_be_bytes())?;
        for field in &self.fields {
            field.write_to_classfile(buffer)?;
        }

        buffer.write_all(&(self.methods.len() as u16).to_be_bytes())?;
        for method in &self.methods {
            method.write_to_classfile(buffer)?;
        }

        buffer.write_all(&(self.attributes.len() as u16).to_be_bytes())?;
        for attribute in &self.attributes {
            attribute.write_to_classfile(buffer)?;
        }
        Ok(())
    }
}

impl ClassfileWritable for ConstantPool {
    fn write_to_classfile<W: Write>(&self, buffer: &mut W) -> std::io::Result<()> {
        buffer.write_all(&self.to_bytes())
    }
}

impl ClassfileWritable for FieldInfo {
    fn write_to_classfile<W: Write>(&self, buffer: &mut W) -> std::io::Result<()> {
        buffer.write_all(&self.to_bytes())
    }
}

impl ClassfileWritable for MethodInfo {
    fn write_to_classfile<W: Write>(&self, buffer: &mut W) -> std::io::Result<()> {
        buffer.write_all(&self.to_bytes())
    }
}

impl ClassfileWritable for AttributeInfo {
    fn write_to_classfile<W: Write>(&self, buffer: &mut W) -> std::io::Result<()> {
        buffer.write_all(&self.to_bytes())
    }
}
