//! Constant pool and constants for Java class files
//!
//! Entries are stored so that pool index `i` lives at `constants[i - 1]`. The second slot
//! of a `Long` or `Double` is kept as an explicit [`Constant::Unusable`] entry, so indices
//! read from an existing class stay valid for as long as the pool is only appended to.

use super::error::{ClassFileError, ClassFileResult};
use super::reader::ByteReader;

#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    Utf8(String),
    /// Utf8 entry that is well-formed modified UTF-8 but not valid Unicode, such as a
    /// string literal holding an unpaired surrogate. Kept as its encoded bytes.
    RawUtf8(Vec<u8>),
    Integer(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    Class(u16),
    String(u16),
    FieldRef(u16, u16),
    MethodRef(u16, u16),
    InterfaceMethodRef(u16, u16),
    NameAndType(u16, u16),
    MethodHandle(u8, u16),
    MethodType(u16),
    Dynamic(u16, u16),
    InvokeDynamic(u16, u16),
    Module(u16),
    Package(u16),
    /// Second slot of an 8-byte constant
    Unusable,
}

pub(crate) mod constant_tags {
    pub const CONSTANT_UTF8: u8 = 1;
    pub const CONSTANT_INTEGER: u8 = 3;
    pub const CONSTANT_FLOAT: u8 = 4;
    pub const CONSTANT_LONG: u8 = 5;
    pub const CONSTANT_DOUBLE: u8 = 6;
    pub const CONSTANT_CLASS: u8 = 7;
    pub const CONSTANT_STRING: u8 = 8;
    pub const CONSTANT_FIELDREF: u8 = 9;
    pub const CONSTANT_METHODREF: u8 = 10;
    pub const CONSTANT_INTERFACEMETHODREF: u8 = 11;
    pub const CONSTANT_NAMEANDTYPE: u8 = 12;
    pub const CONSTANT_METHODHANDLE: u8 = 15;
    pub const CONSTANT_METHODTYPE: u8 = 16;
    pub const CONSTANT_DYNAMIC: u8 = 17;
    pub const CONSTANT_INVOKEDYNAMIC: u8 = 18;
    pub const CONSTANT_MODULE: u8 = 19;
    pub const CONSTANT_PACKAGE: u8 = 20;
}

impl Constant {
    /// Long and Double occupy two pool slots
    pub fn is_wide(&self) -> bool {
        matches!(self, Constant::Long(_) | Constant::Double(_))
    }

    /// Identity used for de-duplication. Floating point values compare by bit pattern
    /// so that `NaN` and `-0.0` constants are reused only for identical encodings.
    fn same_entry(&self, other: &Constant) -> bool {
        match (self, other) {
            (Constant::Float(a), Constant::Float(b)) => a.to_bits() == b.to_bits(),
            (Constant::Double(a), Constant::Double(b)) => a.to_bits() == b.to_bits(),
            (Constant::Unusable, _) | (_, Constant::Unusable) => false,
            _ => self == other,
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        use constant_tags::*;
        let mut bytes = Vec::new();
        match self {
            Constant::Utf8(value) => {
                bytes.push(CONSTANT_UTF8);
                let encoded = encode_modified_utf8(value);
                bytes.extend_from_slice(&(encoded.len() as u16).to_be_bytes());
                bytes.extend_from_slice(&encoded);
            }
            Constant::RawUtf8(encoded) => {
                bytes.push(CONSTANT_UTF8);
                bytes.extend_from_slice(&(encoded.len() as u16).to_be_bytes());
                bytes.extend_from_slice(encoded);
            }
            Constant::Integer(value) => {
                bytes.push(CONSTANT_INTEGER);
                bytes.extend_from_slice(&value.to_be_bytes());
            }
            Constant::Float(value) => {
                bytes.push(CONSTANT_FLOAT);
                bytes.extend_from_slice(&value.to_bits().to_be_bytes());
            }
            Constant::Long(value) => {
                bytes.push(CONSTANT_LONG);
                bytes.extend_from_slice(&value.to_be_bytes());
            }
            Constant::Double(value) => {
                bytes.push(CONSTANT_DOUBLE);
                bytes.extend_from_slice(&value.to_bits().to_be_bytes());
            }
            Constant::Class(index) | Constant::String(index) | Constant::MethodType(index)
            | Constant::Module(index) | Constant::Package(index) => {
                bytes.push(match self {
                    Constant::Class(_) => CONSTANT_CLASS,
                    Constant::String(_) => CONSTANT_STRING,
                    Constant::MethodType(_) => CONSTANT_METHODTYPE,
                    Constant::Module(_) => CONSTANT_MODULE,
                    _ => CONSTANT_PACKAGE,
                });
                bytes.extend_from_slice(&index.to_be_bytes());
            }
            Constant::FieldRef(a, b)
            | Constant::MethodRef(a, b)
            | Constant::InterfaceMethodRef(a, b)
            | Constant::NameAndType(a, b)
            | Constant::Dynamic(a, b)
            | Constant::InvokeDynamic(a, b) => {
                bytes.push(match self {
                    Constant::FieldRef(..) => CONSTANT_FIELDREF,
                    Constant::MethodRef(..) => CONSTANT_METHODREF,
                    Constant::InterfaceMethodRef(..) => CONSTANT_INTERFACEMETHODREF,
                    Constant::NameAndType(..) => CONSTANT_NAMEANDTYPE,
                    Constant::Dynamic(..) => CONSTANT_DYNAMIC,
                    _ => CONSTANT_INVOKEDYNAMIC,
                });
                bytes.extend_from_slice(&a.to_be_bytes());
                bytes.extend_from_slice(&b.to_be_bytes());
            }
            Constant::MethodHandle(reference_kind, reference_index) => {
                bytes.push(CONSTANT_METHODHANDLE);
                bytes.push(*reference_kind);
                bytes.extend_from_slice(&reference_index.to_be_bytes());
            }
            Constant::Unusable => {}
        }
        bytes
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConstantPool {
    pub(crate) constants: Vec<Constant>,
}

impl ConstantPool {
    pub fn new() -> Self {
        Self { constants: Vec::new() }
    }

    /// Value of the `constant_pool_count` item: one more than the highest usable index
    pub fn count(&self) -> u16 {
        (self.constants.len() + 1) as u16
    }

    pub fn get(&self, index: u16) -> Option<&Constant> {
        if index == 0 {
            return None;
        }
        self.constants.get(index as usize - 1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u16, &Constant)> {
        self.constants
            .iter()
            .enumerate()
            .map(|(i, c)| ((i + 1) as u16, c))
    }

    pub fn parse(reader: &mut ByteReader<'_>) -> ClassFileResult<Self> {
        use constant_tags::*;
        let count = reader.read_u2()?;
        let mut pool = ConstantPool::new();
        let mut index: u16 = 1;
        while index < count {
            let tag = reader.read_u1()?;
            let constant = match tag {
                CONSTANT_UTF8 => {
                    let len = reader.read_u2()? as usize;
                    let raw = reader.read_bytes(len)?;
                    let units = decode_modified_utf8_units(raw).ok_or(ClassFileError::InvalidUtf8 { index })?;
                    match String::from_utf16(&units) {
                        Ok(value) => Constant::Utf8(value),
                        Err(_) => Constant::RawUtf8(raw.to_vec()),
                    }
                }
                CONSTANT_INTEGER => Constant::Integer(reader.read_i4()?),
                CONSTANT_FLOAT => Constant::Float(f32::from_bits(reader.read_u4()?)),
                CONSTANT_LONG => Constant::Long(reader.read_i8()?),
                CONSTANT_DOUBLE => Constant::Double(f64::from_bits(reader.read_i8()? as u64)),
                CONSTANT_CLASS => Constant::Class(reader.read_u2()?),
                CONSTANT_STRING => Constant::String(reader.read_u2()?),
                CONSTANT_FIELDREF => Constant::FieldRef(reader.read_u2()?, reader.read_u2()?),
                CONSTANT_METHODREF => Constant::MethodRef(reader.read_u2()?, reader.read_u2()?),
                CONSTANT_INTERFACEMETHODREF => {
                    Constant::InterfaceMethodRef(reader.read_u2()?, reader.read_u2()?)
                }
                CONSTANT_NAMEANDTYPE => Constant::NameAndType(reader.read_u2()?, reader.read_u2()?),
                CONSTANT_METHODHANDLE => Constant::MethodHandle(reader.read_u1()?, reader.read_u2()?),
                CONSTANT_METHODTYPE => Constant::MethodType(reader.read_u2()?),
                CONSTANT_DYNAMIC => Constant::Dynamic(reader.read_u2()?, reader.read_u2()?),
                CONSTANT_INVOKEDYNAMIC => Constant::InvokeDynamic(reader.read_u2()?, reader.read_u2()?),
                CONSTANT_MODULE => Constant::Module(reader.read_u2()?),
                CONSTANT_PACKAGE => Constant::Package(reader.read_u2()?),
                _ => return Err(ClassFileError::InvalidConstantTag { tag, index }),
            };
            let wide = constant.is_wide();
            pool.constants.push(constant);
            index += 1;
            if wide {
                if index >= count {
                    return Err(ClassFileError::InvalidConstantIndex { index, expected: "second slot of long/double" });
                }
                pool.constants.push(Constant::Unusable);
                index += 1;
            }
        }
        Ok(pool)
    }

    fn push(&mut self, constant: Constant) -> ClassFileResult<u16> {
        let slots = if constant.is_wide() { 2 } else { 1 };
        if self.constants.len() + slots >= u16::MAX as usize {
            return Err(ClassFileError::ConstantPoolFull);
        }
        let wide = constant.is_wide();
        self.constants.push(constant);
        let index = self.constants.len() as u16;
        if wide {
            self.constants.push(Constant::Unusable);
        }
        Ok(index)
    }

    /// Index of an existing identical entry, or of a newly appended one
    fn intern(&mut self, constant: Constant) -> ClassFileResult<u16> {
        if let Some(pos) = self.constants.iter().position(|c| c.same_entry(&constant)) {
            return Ok((pos + 1) as u16);
        }
        self.push(constant)
    }

    pub fn add_utf8(&mut self, value: &str) -> ClassFileResult<u16> {
        self.intern(Constant::Utf8(value.to_string()))
    }
    /// Intern already encoded modified UTF-8, e.g. a [`Constant::RawUtf8`] payload
    pub fn add_utf8_bytes(&mut self, encoded: &[u8]) -> ClassFileResult<u16> {
        match decode_modified_utf8(encoded) {
            Some(value) => self.add_utf8(&value),
            None => self.intern(Constant::RawUtf8(encoded.to_vec())),
        }
    }
    pub fn add_class(&mut self, name: &str) -> ClassFileResult<u16> {
        let name_index = self.add_utf8(name)?;
        self.intern(Constant::Class(name_index))
    }
    pub fn add_string(&mut self, value: &str) -> ClassFileResult<u16> {
        let utf8_index = self.add_utf8(value)?;
        self.intern(Constant::String(utf8_index))
    }
    /// String constant whose value is given as modified UTF-8 bytes
    pub fn add_string_bytes(&mut self, encoded: &[u8]) -> ClassFileResult<u16> {
        let utf8_index = self.add_utf8_bytes(encoded)?;
        self.intern(Constant::String(utf8_index))
    }
    pub fn add_name_and_type(&mut self, name: &str, descriptor: &str) -> ClassFileResult<u16> {
        let name_index = self.add_utf8(name)?;
        let descriptor_index = self.add_utf8(descriptor)?;
        self.intern(Constant::NameAndType(name_index, descriptor_index))
    }
    pub fn add_field_ref(&mut self, class: &str, name: &str, descriptor: &str) -> ClassFileResult<u16> {
        let class_index = self.add_class(class)?;
        let name_and_type_index = self.add_name_and_type(name, descriptor)?;
        self.intern(Constant::FieldRef(class_index, name_and_type_index))
    }
    pub fn add_method_ref(&mut self, class: &str, name: &str, descriptor: &str) -> ClassFileResult<u16> {
        let class_index = self.add_class(class)?;
        let name_and_type_index = self.add_name_and_type(name, descriptor)?;
        self.intern(Constant::MethodRef(class_index, name_and_type_index))
    }
    pub fn add_interface_method_ref(&mut self, class: &str, name: &str, descriptor: &str) -> ClassFileResult<u16> {
        let class_index = self.add_class(class)?;
        let name_and_type_index = self.add_name_and_type(name, descriptor)?;
        self.intern(Constant::InterfaceMethodRef(class_index, name_and_type_index))
    }
    pub fn add_integer(&mut self, value: i32) -> ClassFileResult<u16> {
        self.intern(Constant::Integer(value))
    }
    pub fn add_float(&mut self, value: f32) -> ClassFileResult<u16> {
        self.intern(Constant::Float(value))
    }
    pub fn add_long(&mut self, value: i64) -> ClassFileResult<u16> {
        self.intern(Constant::Long(value))
    }
    pub fn add_double(&mut self, value: f64) -> ClassFileResult<u16> {
        self.intern(Constant::Double(value))
    }
    pub fn add_method_type(&mut self, descriptor: &str) -> ClassFileResult<u16> {
        let descriptor_index = self.add_utf8(descriptor)?;
        self.intern(Constant::MethodType(descriptor_index))
    }
    pub fn add_method_handle(&mut self, reference_kind: u8, reference_index: u16) -> ClassFileResult<u16> {
        self.intern(Constant::MethodHandle(reference_kind, reference_index))
    }
    pub fn add_dynamic(&mut self, bootstrap_index: u16, name: &str, descriptor: &str) -> ClassFileResult<u16> {
        let nat = self.add_name_and_type(name, descriptor)?;
        self.intern(Constant::Dynamic(bootstrap_index, nat))
    }
    pub fn add_invoke_dynamic(&mut self, bootstrap_index: u16, name: &str, descriptor: &str) -> ClassFileResult<u16> {
        let nat = self.add_name_and_type(name, descriptor)?;
        self.intern(Constant::InvokeDynamic(bootstrap_index, nat))
    }

    pub fn utf8(&self, index: u16) -> ClassFileResult<&str> {
        match self.get(index) {
            Some(Constant::Utf8(value)) => Ok(value),
            Some(Constant::RawUtf8(_)) => Err(ClassFileError::InvalidUtf8 { index }),
            _ => Err(ClassFileError::InvalidConstantIndex { index, expected: "Utf8" }),
        }
    }

    /// Internal name referenced by a `CONSTANT_Class` entry
    pub fn class_name(&self, index: u16) -> ClassFileResult<&str> {
        match self.get(index) {
            Some(Constant::Class(name_index)) => self.utf8(*name_index),
            _ => Err(ClassFileError::InvalidConstantIndex { index, expected: "Class" }),
        }
    }

    pub fn name_and_type(&self, index: u16) -> ClassFileResult<(&str, &str)> {
        match self.get(index) {
            Some(Constant::NameAndType(name, descriptor)) => Ok((self.utf8(*name)?, self.utf8(*descriptor)?)),
            _ => Err(ClassFileError::InvalidConstantIndex { index, expected: "NameAndType" }),
        }
    }

    /// Owner, name, descriptor and interface-ness of a field or method reference
    pub fn member_ref(&self, index: u16) -> ClassFileResult<(&str, &str, &str, bool)> {
        let (class_index, nat_index, interface) = match self.get(index) {
            Some(Constant::FieldRef(c, n)) | Some(Constant::MethodRef(c, n)) => (*c, *n, false),
            Some(Constant::InterfaceMethodRef(c, n)) => (*c, *n, true),
            _ => return Err(ClassFileError::InvalidConstantIndex { index, expected: "member reference" }),
        };
        let owner = self.class_name(class_index)?;
        let (name, descriptor) = self.name_and_type(nat_index)?;
        Ok((owner, name, descriptor, interface))
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&self.count().to_be_bytes());
        for constant in &self.constants {
            bytes.extend_from_slice(&constant.to_bytes());
        }
        bytes
    }
}

/// Decode the JVM's modified UTF-8 (JVMS 4.4.7). Returns `None` for malformed input,
/// including unpaired surrogates, which a Rust `String` cannot hold.
pub fn decode_modified_utf8(bytes: &[u8]) -> Option<String> {
    if bytes.iter().all(|b| *b != 0 && *b < 0x80) {
        return std::str::from_utf8(bytes).ok().map(str::to_string);
    }
    String::from_utf16(&decode_modified_utf8_units(bytes)?).ok()
}

/// UTF-16 code units of modified UTF-8 input; `None` only when the byte structure is broken
fn decode_modified_utf8_units(bytes: &[u8]) -> Option<Vec<u16>> {
    let mut units: Vec<u16> = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i] as u16;
        if b & 0x80 == 0 {
            units.push(b);
            i += 1;
        } else if b & 0xE0 == 0xC0 {
            let b2 = *bytes.get(i + 1)? as u16;
            if b2 & 0xC0 != 0x80 {
                return None;
            }
            units.push(((b & 0x1F) << 6) | (b2 & 0x3F));
            i += 2;
        } else if b & 0xF0 == 0xE0 {
            let b2 = *bytes.get(i + 1)? as u16;
            let b3 = *bytes.get(i + 2)? as u16;
            if b2 & 0xC0 != 0x80 || b3 & 0xC0 != 0x80 {
                return None;
            }
            units.push(((b & 0x0F) << 12) | ((b2 & 0x3F) << 6) | (b3 & 0x3F));
            i += 3;
        } else {
            return None;
        }
    }
    Some(units)
}

/// Encode a string as modified UTF-8: NUL becomes two bytes and supplementary characters
/// are written as surrogate pairs of three bytes each.
pub fn encode_modified_utf8(value: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(value.len());
    for unit in value.encode_utf16() {
        match unit {
            0x0001..=0x007F => out.push(unit as u8),
            0x0000 | 0x0080..=0x07FF => {
                out.push((0xC0 | (unit >> 6)) as u8);
                out.push((0x80 | (unit & 0x3F)) as u8);
            }
            _ => {
                out.push((0xE0 | (unit >> 12)) as u8);
                out.push((0x80 | ((unit >> 6) & 0x3F)) as u8);
                out.push((0x80 | (unit & 0x3F)) as u8);
            }
        }
    }
    out
}
