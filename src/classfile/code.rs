//! `Code` attribute decoding and encoding
//!
//! [`MethodBody::decode`] turns the raw attribute into an [`InsnList`] plus label-based
//! tables. [`MethodBody::encode`] lays the instructions out again, widening `goto`/`jsr`
//! where a 16-bit offset no longer fits, and recomputes `max_stack`/`max_locals`.

use std::collections::{BTreeMap, HashMap};

use super::attribute::AttributeInfo;
use super::constpool::{Constant, ConstantPool};
use super::defs::attribute_names;
use super::descriptor;
use super::error::{ClassFileError, ClassFileResult};
use super::frame::{self, StackMapFrame, VerificationType};
use super::insn::{ConstValue, Handle, Insn, InsnList, Label, MemberRef};
use super::maxs;
use super::opcodes::*;
use super::reader::ByteReader;

/// Largest code array the class file format allows
pub const MAX_CODE_LENGTH: usize = 65535;

/// One exception table row; `catch_type` is `None` for `finally` handlers
#[derive(Debug, Clone, PartialEq)]
pub struct TryCatchBlock {
    pub start: Label,
    pub end: Label,
    pub handler: Label,
    pub catch_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LineNumber {
    pub start: Label,
    pub line: u16,
}

/// Entry of a LocalVariableTable, or of a LocalVariableTypeTable when `descriptor` holds
/// a generic signature
#[derive(Debug, Clone, PartialEq)]
pub struct LocalVariable {
    pub start: Label,
    pub end: Label,
    pub name: String,
    pub descriptor: String,
    pub index: u16,
}

/// Position of each `Code` sub-attribute, so the table order survives a rewrite
#[derive(Debug, Clone, PartialEq)]
enum SubAttribute {
    LineNumbers,
    LocalVariables,
    LocalVariableTypes,
    StackMap,
    Other(AttributeInfo),
}

/// Decoded body of a method
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MethodBody {
    pub max_stack: u16,
    pub max_locals: u16,
    pub insns: InsnList,
    pub try_catch: Vec<TryCatchBlock>,
    pub line_numbers: Vec<LineNumber>,
    pub local_variables: Vec<LocalVariable>,
    pub local_variable_types: Vec<LocalVariable>,
    pub frames: Vec<StackMapFrame>,
    sub_attributes: Vec<SubAttribute>,
}

struct Labels {
    by_offset: BTreeMap<u32, Label>,
}

impl Labels {
    fn at(&mut self, offset: u32) -> Label {
        let next = self.by_offset.len() as u32;
        *self.by_offset.entry(offset).or_insert(Label(next))
    }
}

fn relative(offset: usize, delta: i32) -> ClassFileResult<u32> {
    let target = offset as i64 + delta as i64;
    if target < 0 || target > MAX_CODE_LENGTH as i64 {
        return Err(ClassFileError::InvalidLabelOffset { offset: target.max(0) as u32 });
    }
    Ok(target as u32)
}

fn loadable_constant(constant_pool: &ConstantPool, index: u16) -> ClassFileResult<ConstValue> {
    Ok(match constant_pool.get(index) {
        Some(Constant::Integer(v)) => ConstValue::Int(*v),
        Some(Constant::Float(v)) => ConstValue::Float(*v),
        Some(Constant::Long(v)) => ConstValue::Long(*v),
        Some(Constant::Double(v)) => ConstValue::Double(*v),
        Some(Constant::String(s)) => match constant_pool.get(*s) {
            Some(Constant::RawUtf8(encoded)) => ConstValue::RawString(encoded.clone()),
            _ => ConstValue::String(constant_pool.utf8(*s)?.to_string()),
        },
        Some(Constant::Class(n)) => ConstValue::Class(constant_pool.utf8(*n)?.to_string()),
        Some(Constant::MethodType(d)) => ConstValue::MethodType(constant_pool.utf8(*d)?.to_string()),
        Some(Constant::MethodHandle(kind, reference)) => {
            let (owner, name, desc, interface) = constant_pool.member_ref(*reference)?;
            ConstValue::MethodHandle(Handle { kind: *kind, member: MemberRef::new(owner, name, desc), interface })
        }
        Some(Constant::Dynamic(bootstrap, nat)) => {
            let (name, desc) = constant_pool.name_and_type(*nat)?;
            ConstValue::Dynamic { bootstrap: *bootstrap, name: name.to_string(), descriptor: desc.to_string() }
        }
        _ => return Err(ClassFileError::InvalidConstantIndex { index, expected: "loadable constant" }),
    })
}

fn intern_constant(constant_pool: &mut ConstantPool, value: &ConstValue) -> ClassFileResult<u16> {
    match value {
        ConstValue::Null => Ok(0),
        ConstValue::Int(v) => constant_pool.add_integer(*v),
        ConstValue::Float(v) => constant_pool.add_float(*v),
        ConstValue::Long(v) => constant_pool.add_long(*v),
        ConstValue::Double(v) => constant_pool.add_double(*v),
        ConstValue::String(s) => constant_pool.add_string(s),
        ConstValue::RawString(encoded) => constant_pool.add_string_bytes(encoded),
        ConstValue::Class(c) => constant_pool.add_class(c),
        ConstValue::MethodType(d) => constant_pool.add_method_type(d),
        ConstValue::MethodHandle(handle) => {
            let m = &handle.member;
            let reference = if handle.kind <= 4 {
                constant_pool.add_field_ref(&m.owner, &m.name, &m.descriptor)?
            } else if handle.interface {
                constant_pool.add_interface_method_ref(&m.owner, &m.name, &m.descriptor)?
            } else {
                constant_pool.add_method_ref(&m.owner, &m.name, &m.descriptor)?
            };
            constant_pool.add_method_handle(handle.kind, reference)
        }
        ConstValue::Dynamic { bootstrap, name, descriptor } => constant_pool.add_dynamic(*bootstrap, name, descriptor),
    }
}

fn decode_insn(
    reader: &mut ByteReader<'_>,
    constant_pool: &ConstantPool,
    labels: &mut Labels,
) -> ClassFileResult<Insn> {
    let offset = reader.position();
    let opcode = reader.read_u1()?;
    let insn = match opcode {
        ACONST_NULL => Insn::Const { opcode, value: ConstValue::Null },
        ICONST_M1..=ICONST_5 => Insn::Const { opcode, value: ConstValue::Int(opcode as i32 - ICONST_0 as i32) },
        LCONST_0 | LCONST_1 => Insn::Const { opcode, value: ConstValue::Long((opcode - LCONST_0) as i64) },
        FCONST_0..=FCONST_2 => Insn::Const { opcode, value: ConstValue::Float((opcode - FCONST_0) as f32) },
        DCONST_0 | DCONST_1 => Insn::Const { opcode, value: ConstValue::Double((opcode - DCONST_0) as f64) },
        BIPUSH => Insn::Const { opcode, value: ConstValue::Int(reader.read_i1()? as i32) },
        SIPUSH => Insn::Const { opcode, value: ConstValue::Int(reader.read_i2()? as i32) },
        LDC => Insn::Const { opcode, value: loadable_constant(constant_pool, reader.read_u1()? as u16)? },
        LDC_W | LDC2_W => Insn::Const { opcode, value: loadable_constant(constant_pool, reader.read_u2()?)? },
        ILOAD..=ALOAD | ISTORE..=ASTORE | RET => Insn::Var { opcode, index: reader.read_u1()? as u16 },
        0x1a..=0x2d => {
            let k = opcode - ILOAD_0;
            Insn::Var { opcode: ILOAD + k / 4, index: (k % 4) as u16 }
        }
        0x3b..=0x4e => {
            let k = opcode - ISTORE_0;
            Insn::Var { opcode: ISTORE + k / 4, index: (k % 4) as u16 }
        }
        IINC => Insn::Iinc { index: reader.read_u1()? as u16, delta: reader.read_i1()? as i16 },
        IFEQ..=JSR | IFNULL | IFNONNULL => {
            let target = relative(offset, reader.read_i2()? as i32)?;
            Insn::Jump { opcode, target: labels.at(target) }
        }
        GOTO_W | JSR_W => {
            let target = relative(offset, reader.read_i4()?)?;
            let opcode = if opcode == GOTO_W { GOTO } else { JSR };
            Insn::Jump { opcode, target: labels.at(target) }
        }
        TABLESWITCH => {
            reader.skip((4 - (offset + 1) % 4) % 4)?;
            let default = labels.at(relative(offset, reader.read_i4()?)?);
            let low = reader.read_i4()?;
            let high = reader.read_i4()?;
            if high < low {
                return Err(ClassFileError::InvalidOpcode { opcode, offset });
            }
            let count = (high as i64 - low as i64 + 1) as usize;
            if count > reader.remaining() / 4 {
                return Err(ClassFileError::UnexpectedEof { offset: reader.position(), needed: count * 4 });
            }
            let targets = (0..count)
                .map(|_| Ok(labels.at(relative(offset, reader.read_i4()?)?)))
                .collect::<ClassFileResult<Vec<_>>>()?;
            Insn::TableSwitch { default, low, high, targets }
        }
        LOOKUPSWITCH => {
            reader.skip((4 - (offset + 1) % 4) % 4)?;
            let default = labels.at(relative(offset, reader.read_i4()?)?);
            let npairs = reader.read_i4()?;
            if npairs < 0 || npairs as usize > reader.remaining() / 8 {
                return Err(ClassFileError::InvalidOpcode { opcode, offset });
            }
            let pairs = (0..npairs)
                .map(|_| {
                    let key = reader.read_i4()?;
                    Ok((key, labels.at(relative(offset, reader.read_i4()?)?)))
                })
                .collect::<ClassFileResult<Vec<_>>>()?;
            Insn::LookupSwitch { default, pairs }
        }
        GETSTATIC..=PUTFIELD => {
            let (owner, name, desc, _) = constant_pool.member_ref(reader.read_u2()?)?;
            Insn::Field { opcode, field: MemberRef::new(owner, name, desc) }
        }
        INVOKEVIRTUAL | INVOKESPECIAL | INVOKESTATIC => {
            let (owner, name, desc, interface) = constant_pool.member_ref(reader.read_u2()?)?;
            Insn::Invoke { opcode, method: MemberRef::new(owner, name, desc), interface }
        }
        INVOKEINTERFACE => {
            let (owner, name, desc, _) = constant_pool.member_ref(reader.read_u2()?)?;
            reader.skip(2)?;
            Insn::Invoke { opcode, method: MemberRef::new(owner, name, desc), interface: true }
        }
        INVOKEDYNAMIC => {
            let index = reader.read_u2()?;
            reader.skip(2)?;
            match constant_pool.get(index) {
                Some(Constant::InvokeDynamic(bootstrap, nat)) => {
                    let (name, desc) = constant_pool.name_and_type(*nat)?;
                    Insn::InvokeDynamic { bootstrap: *bootstrap, name: name.to_string(), descriptor: desc.to_string() }
                }
                _ => return Err(ClassFileError::InvalidConstantIndex { index, expected: "InvokeDynamic" }),
            }
        }
        NEW | ANEWARRAY | CHECKCAST | INSTANCEOF => {
            Insn::Type { opcode, class: constant_pool.class_name(reader.read_u2()?)?.to_string() }
        }
        NEWARRAY => Insn::NewArray { atype: reader.read_u1()? },
        MULTIANEWARRAY => {
            let class = constant_pool.class_name(reader.read_u2()?)?.to_string();
            Insn::MultiANewArray { class, dimensions: reader.read_u1()? }
        }
        WIDE => {
            let widened = reader.read_u1()?;
            match widened {
                IINC => Insn::Iinc { index: reader.read_u2()?, delta: reader.read_i2()? },
                ILOAD..=ALOAD | ISTORE..=ASTORE | RET => Insn::Var { opcode: widened, index: reader.read_u2()? },
                _ => return Err(ClassFileError::InvalidOpcode { opcode: widened, offset: offset + 1 }),
            }
        }
        op if simple_stack_delta(op).is_some() => Insn::Simple(op),
        _ => return Err(ClassFileError::InvalidOpcode { opcode, offset }),
    };
    Ok(insn)
}

fn parse_local_variables(
    info: &[u8],
    constant_pool: &ConstantPool,
    labels: &mut Labels,
) -> ClassFileResult<Vec<LocalVariable>> {
    let mut reader = ByteReader::new(info);
    let count = reader.read_u2()?;
    (0..count)
        .map(|_| {
            let start_pc = reader.read_u2()? as u32;
            let length = reader.read_u2()? as u32;
            let name = constant_pool.utf8(reader.read_u2()?)?.to_string();
            let descriptor = constant_pool.utf8(reader.read_u2()?)?.to_string();
            let index = reader.read_u2()?;
            Ok(LocalVariable {
                start: labels.at(start_pc),
                end: labels.at(start_pc + length),
                name,
                descriptor,
                index,
            })
        })
        .collect()
}

impl MethodBody {
    pub fn new(insns: InsnList) -> Self {
        Self { insns, ..Self::default() }
    }

    /// Decode the payload of a `Code` attribute
    pub fn decode(info: &[u8], constant_pool: &ConstantPool) -> ClassFileResult<Self> {
        let mut reader = ByteReader::new(info);
        let max_stack = reader.read_u2()?;
        let max_locals = reader.read_u2()?;
        let code_length = reader.read_u4()? as usize;
        if code_length == 0 || code_length > MAX_CODE_LENGTH {
            return Err(ClassFileError::CodeTooLarge(code_length));
        }
        let code = reader.read_bytes(code_length)?;

        let mut labels = Labels { by_offset: BTreeMap::new() };
        let mut decoded = Vec::new();
        let mut code_reader = ByteReader::new(code);
        while !code_reader.is_empty() {
            let offset = code_reader.position() as u32;
            decoded.push((offset, decode_insn(&mut code_reader, constant_pool, &mut labels)?));
        }

        let exception_count = reader.read_u2()?;
        let mut try_catch = Vec::with_capacity(exception_count as usize);
        for _ in 0..exception_count {
            let start = labels.at(reader.read_u2()? as u32);
            let end = labels.at(reader.read_u2()? as u32);
            let handler = labels.at(reader.read_u2()? as u32);
            let catch_index = reader.read_u2()?;
            let catch_type = if catch_index == 0 {
                None
            } else {
                Some(constant_pool.class_name(catch_index)?.to_string())
            };
            try_catch.push(TryCatchBlock { start, end, handler, catch_type });
        }

        let mut body = MethodBody { max_stack, max_locals, try_catch, ..Self::default() };
        for attribute in AttributeInfo::parse_table(&mut reader)? {
            let slot = match attribute.name(constant_pool)? {
                attribute_names::LINE_NUMBER_TABLE => {
                    let mut r = ByteReader::new(&attribute.info);
                    let count = r.read_u2()?;
                    for _ in 0..count {
                        let start = labels.at(r.read_u2()? as u32);
                        body.line_numbers.push(LineNumber { start, line: r.read_u2()? });
                    }
                    SubAttribute::LineNumbers
                }
                attribute_names::LOCAL_VARIABLE_TABLE => {
                    body.local_variables.extend(parse_local_variables(&attribute.info, constant_pool, &mut labels)?);
                    SubAttribute::LocalVariables
                }
                attribute_names::LOCAL_VARIABLE_TYPE_TABLE => {
                    body.local_variable_types.extend(parse_local_variables(&attribute.info, constant_pool, &mut labels)?);
                    SubAttribute::LocalVariableTypes
                }
                attribute_names::STACK_MAP_TABLE => {
                    body.frames.extend(frame::parse_stack_map(&attribute.info, constant_pool, |off| labels.at(off))?);
                    SubAttribute::StackMap
                }
                _ => SubAttribute::Other(attribute),
            };
            if matches!(slot, SubAttribute::Other(_)) || !body.sub_attributes.contains(&slot) {
                body.sub_attributes.push(slot);
            }
        }
        if !reader.is_empty() {
            return Err(ClassFileError::InvalidAttribute {
                name: attribute_names::CODE.to_string(),
                reason: format!("{} trailing bytes", reader.remaining()),
            });
        }

        // Interleave label markers with the instructions they precede
        let label_count = labels.by_offset.len() as u32;
        let mut pending = labels.by_offset.into_iter().peekable();
        let mut insns = InsnList::new();
        insns.reserve_labels(label_count);
        for (offset, insn) in decoded {
            while let Some(&(label_offset, label)) = pending.peek() {
                if label_offset > offset {
                    break;
                }
                if label_offset < offset {
                    return Err(ClassFileError::InvalidLabelOffset { offset: label_offset });
                }
                insns.push(Insn::Label(label));
                pending.next();
            }
            insns.push(insn);
        }
        for (label_offset, label) in pending {
            if label_offset as usize != code_length {
                return Err(ClassFileError::InvalidLabelOffset { offset: label_offset });
            }
            insns.push(Insn::Label(label));
        }
        body.insns = insns;
        Ok(body)
    }

    /// Encode into the payload of a `Code` attribute, interning every referenced constant.
    /// `max_stack` and `max_locals` are recomputed and stored back into `self`.
    pub fn encode(
        &mut self,
        constant_pool: &mut ConstantPool,
        descriptor: &str,
        is_static: bool,
    ) -> ClassFileResult<Vec<u8>> {
        let insns = self.insns.as_slice();

        let mut pool_indices = Vec::with_capacity(insns.len());
        for insn in insns {
            pool_indices.push(intern_operand(constant_pool, insn)?);
        }

        let layout = Layout::compute(insns, &pool_indices)?;
        let offset_of = |label: Label| -> ClassFileResult<u32> {
            layout.labels.get(&label).copied().ok_or(ClassFileError::UnknownLabel(label.0))
        };

        let mut code = Vec::with_capacity(layout.code_length);
        for (i, insn) in insns.iter().enumerate() {
            emit(&mut code, insn, layout.offsets[i], layout.wide[i], pool_indices[i], &offset_of)?;
        }
        debug_assert_eq!(code.len(), layout.code_length);

        let shape = descriptor::parse_method(descriptor)?;
        let computed = maxs::compute(insns, &self.try_catch, &shape, is_static)?;
        let mut implicit = Vec::new();
        if !is_static {
            implicit.push(VerificationType::UninitializedThis);
        }
        // only slot widths matter here
        implicit.extend(shape.params.iter().map(|w| if *w == 2 { VerificationType::Long } else { VerificationType::Top }));
        let frame_locals = frame::max_frame_locals(&implicit, &self.frames);
        self.max_stack = computed.max_stack;
        self.max_locals = computed.max_locals.max(frame_locals.min(u16::MAX as usize) as u16);

        let mut bytes = Vec::with_capacity(code.len() + 32);
        bytes.extend_from_slice(&self.max_stack.to_be_bytes());
        bytes.extend_from_slice(&self.max_locals.to_be_bytes());
        bytes.extend_from_slice(&(code.len() as u32).to_be_bytes());
        bytes.extend_from_slice(&code);

        bytes.extend_from_slice(&(self.try_catch.len() as u16).to_be_bytes());
        for block in &self.try_catch {
            bytes.extend_from_slice(&(offset_of(block.start)? as u16).to_be_bytes());
            bytes.extend_from_slice(&(offset_of(block.end)? as u16).to_be_bytes());
            bytes.extend_from_slice(&(offset_of(block.handler)? as u16).to_be_bytes());
            let catch_index = match &block.catch_type {
                Some(class) => constant_pool.add_class(class)?,
                None => 0,
            };
            bytes.extend_from_slice(&catch_index.to_be_bytes());
        }

        let mut slots = self.sub_attributes.clone();
        for (present, slot) in [
            (!self.line_numbers.is_empty(), SubAttribute::LineNumbers),
            (!self.local_variables.is_empty(), SubAttribute::LocalVariables),
            (!self.local_variable_types.is_empty(), SubAttribute::LocalVariableTypes),
            (!self.frames.is_empty(), SubAttribute::StackMap),
        ] {
            if present && !slots.contains(&slot) {
                slots.push(slot);
            }
        }

        let mut attributes = Vec::with_capacity(slots.len());
        for slot in &slots {
            let attribute = match slot {
                SubAttribute::LineNumbers => {
                    let mut info = Vec::with_capacity(2 + self.line_numbers.len() * 4);
                    info.extend_from_slice(&(self.line_numbers.len() as u16).to_be_bytes());
                    for entry in &self.line_numbers {
                        info.extend_from_slice(&(offset_of(entry.start)? as u16).to_be_bytes());
                        info.extend_from_slice(&entry.line.to_be_bytes());
                    }
                    AttributeInfo::new(constant_pool.add_utf8(attribute_names::LINE_NUMBER_TABLE)?, info)
                }
                SubAttribute::LocalVariables => AttributeInfo::new(
                    constant_pool.add_utf8(attribute_names::LOCAL_VARIABLE_TABLE)?,
                    write_local_variables(&self.local_variables, constant_pool, &offset_of)?,
                ),
                SubAttribute::LocalVariableTypes => AttributeInfo::new(
                    constant_pool.add_utf8(attribute_names::LOCAL_VARIABLE_TYPE_TABLE)?,
                    write_local_variables(&self.local_variable_types, constant_pool, &offset_of)?,
                ),
                SubAttribute::StackMap => AttributeInfo::new(
                    constant_pool.add_utf8(attribute_names::STACK_MAP_TABLE)?,
                    frame::write_stack_map(&self.frames, constant_pool, &offset_of)?,
                ),
                SubAttribute::Other(raw) => raw.clone(),
            };
            attributes.push(attribute);
        }
        super::attribute::write_table(&mut bytes, &attributes);
        Ok(bytes)
    }
}

fn write_local_variables(
    entries: &[LocalVariable],
    constant_pool: &mut ConstantPool,
    offset_of: &impl Fn(Label) -> ClassFileResult<u32>,
) -> ClassFileResult<Vec<u8>> {
    let mut info = Vec::with_capacity(2 + entries.len() * 10);
    info.extend_from_slice(&(entries.len() as u16).to_be_bytes());
    for entry in entries {
        let start = offset_of(entry.start)?;
        let end = offset_of(entry.end)?;
        if end < start {
            return Err(ClassFileError::InvalidAttribute {
                name: attribute_names::LOCAL_VARIABLE_TABLE.to_string(),
                reason: format!("range of '{}' ends before it starts", entry.name),
            });
        }
        info.extend_from_slice(&(start as u16).to_be_bytes());
        info.extend_from_slice(&((end - start) as u16).to_be_bytes());
        info.extend_from_slice(&constant_pool.add_utf8(&entry.name)?.to_be_bytes());
        info.extend_from_slice(&constant_pool.add_utf8(&entry.descriptor)?.to_be_bytes());
        info.extend_from_slice(&entry.index.to_be_bytes());
    }
    Ok(info)
}

/// Constant-pool operand of an instruction, 0 when it has none
fn intern_operand(constant_pool: &mut ConstantPool, insn: &Insn) -> ClassFileResult<u16> {
    match insn {
        Insn::Const { opcode: LDC | LDC_W | LDC2_W, value } => intern_constant(constant_pool, value),
        Insn::Type { class, .. } | Insn::MultiANewArray { class, .. } => constant_pool.add_class(class),
        Insn::Field { field, .. } => constant_pool.add_field_ref(&field.owner, &field.name, &field.descriptor),
        Insn::Invoke { method, interface: true, .. } => {
            constant_pool.add_interface_method_ref(&method.owner, &method.name, &method.descriptor)
        }
        Insn::Invoke { method, .. } => constant_pool.add_method_ref(&method.owner, &method.name, &method.descriptor),
        Insn::InvokeDynamic { bootstrap, name, descriptor } => constant_pool.add_invoke_dynamic(*bootstrap, name, descriptor),
        _ => Ok(0),
    }
}

fn switch_padding(offset: usize) -> usize {
    (4 - (offset + 1) % 4) % 4
}

fn fits_i16(from: usize, to: u32) -> bool {
    let delta = to as i64 - from as i64;
    delta >= i16::MIN as i64 && delta <= i16::MAX as i64
}

fn insn_size(insn: &Insn, offset: usize, wide: bool, pool_index: u16) -> usize {
    match insn {
        Insn::Label(_) => 0,
        Insn::Simple(_) => 1,
        Insn::Const { opcode, .. } => match *opcode {
            BIPUSH => 2,
            SIPUSH | LDC_W | LDC2_W => 3,
            LDC if pool_index > 255 => 3,
            LDC => 2,
            _ => 1,
        },
        Insn::Var { opcode, index } => {
            if *index <= 3 && *opcode != RET {
                1
            } else if *index <= 255 {
                2
            } else {
                4
            }
        }
        Insn::Iinc { index, delta } => {
            if *index <= 255 && i8::try_from(*delta).is_ok() {
                3
            } else {
                6
            }
        }
        Insn::Type { .. } | Insn::Field { .. } => 3,
        Insn::NewArray { .. } => 2,
        Insn::MultiANewArray { .. } => 4,
        Insn::Invoke { opcode, .. } => if *opcode == INVOKEINTERFACE { 5 } else { 3 },
        Insn::InvokeDynamic { .. } => 5,
        Insn::Jump { .. } => if wide { 5 } else { 3 },
        Insn::TableSwitch { targets, .. } => 1 + switch_padding(offset) + 12 + 4 * targets.len(),
        Insn::LookupSwitch { pairs, .. } => 1 + switch_padding(offset) + 8 + 8 * pairs.len(),
    }
}

struct Layout {
    offsets: Vec<usize>,
    wide: Vec<bool>,
    labels: HashMap<Label, u32>,
    code_length: usize,
}

impl Layout {
    fn place(insns: &[Insn], pool_indices: &[u16], wide: &[bool]) -> (Vec<usize>, HashMap<Label, u32>, usize) {
        let mut offsets = Vec::with_capacity(insns.len());
        let mut labels = HashMap::new();
        let mut offset = 0usize;
        for (i, insn) in insns.iter().enumerate() {
            offsets.push(offset);
            if let Insn::Label(label) = insn {
                labels.insert(*label, offset as u32);
            }
            offset += insn_size(insn, offset, wide[i], pool_indices[i]);
        }
        (offsets, labels, offset)
    }

    /// Assign offsets, widening unconditional jumps until every branch fits
    fn compute(insns: &[Insn], pool_indices: &[u16]) -> ClassFileResult<Self> {
        let mut wide = vec![false; insns.len()];
        loop {
            let (offsets, labels, code_length) = Self::place(insns, pool_indices, &wide);
            if code_length > MAX_CODE_LENGTH {
                return Err(ClassFileError::CodeTooLarge(code_length));
            }
            let mut changed = false;
            for (i, insn) in insns.iter().enumerate() {
                if let Insn::Jump { opcode, target } = insn {
                    let to = *labels.get(target).ok_or(ClassFileError::UnknownLabel(target.0))?;
                    if wide[i] || fits_i16(offsets[i], to) {
                        continue;
                    }
                    if *opcode == GOTO || *opcode == JSR {
                        wide[i] = true;
                        changed = true;
                    } else {
                        return Err(ClassFileError::BranchOutOfRange { from: offsets[i], to: to as usize });
                    }
                }
            }
            if !changed {
                return Ok(Layout { offsets, wide, labels, code_length });
            }
        }
    }
}

fn emit(
    code: &mut Vec<u8>,
    insn: &Insn,
    offset: usize,
    wide: bool,
    pool_index: u16,
    offset_of: &impl Fn(Label) -> ClassFileResult<u32>,
) -> ClassFileResult<()> {
    let rel = |label: Label| -> ClassFileResult<i32> { Ok(offset_of(label)? as i32 - offset as i32) };
    match insn {
        Insn::Label(_) => {}
        Insn::Simple(op) => code.push(*op),
        Insn::Const { opcode, value } => match (*opcode, value) {
            (BIPUSH, ConstValue::Int(v)) => {
                code.push(BIPUSH);
                code.push(*v as i8 as u8);
            }
            (SIPUSH, ConstValue::Int(v)) => {
                code.push(SIPUSH);
                code.extend_from_slice(&(*v as i16).to_be_bytes());
            }
            (LDC, _) if pool_index <= 255 => {
                code.push(LDC);
                code.push(pool_index as u8);
            }
            (LDC | LDC_W | LDC2_W, _) => {
                code.push(if *opcode == LDC { LDC_W } else { *opcode });
                code.extend_from_slice(&pool_index.to_be_bytes());
            }
            (op, _) => code.push(op),
        },
        Insn::Var { opcode, index } => {
            if *index <= 3 && *opcode != RET {
                let base = if *opcode <= ALOAD { ILOAD_0 + (opcode - ILOAD) * 4 } else { ISTORE_0 + (opcode - ISTORE) * 4 };
                code.push(base + *index as u8);
            } else if *index <= 255 {
                code.push(*opcode);
                code.push(*index as u8);
            } else {
                code.push(WIDE);
                code.push(*opcode);
                code.extend_from_slice(&index.to_be_bytes());
            }
        }
        Insn::Iinc { index, delta } => {
            if *index <= 255 && i8::try_from(*delta).is_ok() {
                code.push(IINC);
                code.push(*index as u8);
                code.push(*delta as i8 as u8);
            } else {
                code.push(WIDE);
                code.push(IINC);
                code.extend_from_slice(&index.to_be_bytes());
                code.extend_from_slice(&delta.to_be_bytes());
            }
        }
        Insn::Type { opcode, .. } | Insn::Field { opcode, .. } => {
            code.push(*opcode);
            code.extend_from_slice(&pool_index.to_be_bytes());
        }
        Insn::NewArray { atype } => {
            code.push(NEWARRAY);
            code.push(*atype);
        }
        Insn::MultiANewArray { dimensions, .. } => {
            code.push(MULTIANEWARRAY);
            code.extend_from_slice(&pool_index.to_be_bytes());
            code.push(*dimensions);
        }
        Insn::Invoke { opcode, method, .. } => {
            code.push(*opcode);
            code.extend_from_slice(&pool_index.to_be_bytes());
            if *opcode == INVOKEINTERFACE {
                let count = descriptor::parse_method(&method.descriptor)?.arg_slots() + 1;
                code.push(count as u8);
                code.push(0);
            }
        }
        Insn::InvokeDynamic { .. } => {
            code.push(INVOKEDYNAMIC);
            code.extend_from_slice(&pool_index.to_be_bytes());
            code.extend_from_slice(&[0, 0]);
        }
        Insn::Jump { opcode, target } => {
            let delta = rel(*target)?;
            if wide {
                code.push(if *opcode == GOTO { GOTO_W } else { JSR_W });
                code.extend_from_slice(&delta.to_be_bytes());
            } else {
                code.push(*opcode);
                code.extend_from_slice(&(delta as i16).to_be_bytes());
            }
        }
        Insn::TableSwitch { default, low, high, targets } => {
            code.push(TABLESWITCH);
            code.extend(std::iter::repeat(0).take(switch_padding(offset)));
            code.extend_from_slice(&rel(*default)?.to_be_bytes());
            code.extend_from_slice(&low.to_be_bytes());
            code.extend_from_slice(&high.to_be_bytes());
            for target in targets {
                code.extend_from_slice(&rel(*target)?.to_be_bytes());
            }
        }
        Insn::LookupSwitch { default, pairs } => {
            code.push(LOOKUPSWITCH);
            code.extend(std::iter::repeat(0).take(switch_padding(offset)));
            code.extend_from_slice(&rel(*default)?.to_be_bytes());
            code.extend_from_slice(&(pairs.len() as i32).to_be_bytes());
            for (key, target) in pairs {
                code.extend_from_slice(&key.to_be_bytes());
                code.extend_from_slice(&rel(*target)?.to_be_bytes());
            }
        }
    }
    Ok(())
}
