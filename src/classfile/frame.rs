//! StackMapTable frames with symbolic positions
//!
//! Frames keep the kind they were read with; only the offset delta is recomputed when
//! the table is written again, picking the shortest encoding of that kind the delta fits.

use super::constpool::ConstantPool;
use super::error::{ClassFileError, ClassFileResult};
use super::insn::Label;
use super::reader::ByteReader;

#[derive(Debug, Clone, PartialEq)]
pub enum VerificationType {
    Top,
    Integer,
    Float,
    Double,
    Long,
    Null,
    UninitializedThis,
    Object(String),
    /// Result of the `new` instruction at the label
    Uninitialized(Label),
}

impl VerificationType {
    /// Local slots taken by a value of this type
    pub fn slots(&self) -> usize {
        match self {
            VerificationType::Long | VerificationType::Double => 2,
            _ => 1,
        }
    }

    pub(crate) fn parse(
        reader: &mut ByteReader<'_>,
        constant_pool: &ConstantPool,
        label_at: &mut impl FnMut(u32) -> Label,
    ) -> ClassFileResult<Self> {
        let tag = reader.read_u1()?;
        Ok(match tag {
            0 => VerificationType::Top,
            1 => VerificationType::Integer,
            2 => VerificationType::Float,
            3 => VerificationType::Double,
            4 => VerificationType::Long,
            5 => VerificationType::Null,
            6 => VerificationType::UninitializedThis,
            7 => VerificationType::Object(constant_pool.class_name(reader.read_u2()?)?.to_string()),
            8 => VerificationType::Uninitialized(label_at(reader.read_u2()? as u32)),
            other => {
                return Err(ClassFileError::InvalidAttribute {
                    name: "StackMapTable".to_string(),
                    reason: format!("unknown verification type tag {}", other),
                })
            }
        })
    }

    pub(crate) fn write(
        &self,
        bytes: &mut Vec<u8>,
        constant_pool: &mut ConstantPool,
        offset_of: &impl Fn(Label) -> ClassFileResult<u32>,
    ) -> ClassFileResult<()> {
        match self {
            VerificationType::Top => bytes.push(0),
            VerificationType::Integer => bytes.push(1),
            VerificationType::Float => bytes.push(2),
            VerificationType::Double => bytes.push(3),
            VerificationType::Long => bytes.push(4),
            VerificationType::Null => bytes.push(5),
            VerificationType::UninitializedThis => bytes.push(6),
            VerificationType::Object(class) => {
                bytes.push(7);
                bytes.extend_from_slice(&constant_pool.add_class(class)?.to_be_bytes());
            }
            VerificationType::Uninitialized(label) => {
                bytes.push(8);
                bytes.extend_from_slice(&(offset_of(*label)? as u16).to_be_bytes());
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FrameKind {
    Same,
    SameLocals1StackItem(VerificationType),
    /// Last `n` locals (1..=3) removed
    Chop(u8),
    /// Locals (1..=3) appended
    Append(Vec<VerificationType>),
    Full { locals: Vec<VerificationType>, stack: Vec<VerificationType> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct StackMapFrame {
    pub label: Label,
    pub kind: FrameKind,
}

const SAME_LOCALS_1_STACK_ITEM_EXTENDED: u8 = 247;
const SAME_FRAME_EXTENDED: u8 = 251;
const FULL_FRAME: u8 = 255;

/// Decode a StackMapTable payload. Positions are resolved to labels through `label_at`.
pub fn parse_stack_map(
    info: &[u8],
    constant_pool: &ConstantPool,
    mut label_at: impl FnMut(u32) -> Label,
) -> ClassFileResult<Vec<StackMapFrame>> {
    let mut reader = ByteReader::new(info);
    let count = reader.read_u2()?;
    let mut frames = Vec::with_capacity(count as usize);
    let mut previous: Option<u32> = None;
    for _ in 0..count {
        let frame_type = reader.read_u1()?;
        let (delta, kind) = match frame_type {
            0..=63 => (frame_type as u32, FrameKind::Same),
            64..=127 => (
                (frame_type - 64) as u32,
                FrameKind::SameLocals1StackItem(VerificationType::parse(&mut reader, constant_pool, &mut label_at)?),
            ),
            SAME_LOCALS_1_STACK_ITEM_EXTENDED => {
                let delta = reader.read_u2()? as u32;
                (delta, FrameKind::SameLocals1StackItem(VerificationType::parse(&mut reader, constant_pool, &mut label_at)?))
            }
            248..=250 => (reader.read_u2()? as u32, FrameKind::Chop(SAME_FRAME_EXTENDED - frame_type)),
            SAME_FRAME_EXTENDED => (reader.read_u2()? as u32, FrameKind::Same),
            252..=254 => {
                let delta = reader.read_u2()? as u32;
                let locals = (0..frame_type - SAME_FRAME_EXTENDED)
                    .map(|_| VerificationType::parse(&mut reader, constant_pool, &mut label_at))
                    .collect::<ClassFileResult<Vec<_>>>()?;
                (delta, FrameKind::Append(locals))
            }
            FULL_FRAME => {
                let delta = reader.read_u2()? as u32;
                let n_locals = reader.read_u2()?;
                let locals = (0..n_locals)
                    .map(|_| VerificationType::parse(&mut reader, constant_pool, &mut label_at))
                    .collect::<ClassFileResult<Vec<_>>>()?;
                let n_stack = reader.read_u2()?;
                let stack = (0..n_stack)
                    .map(|_| VerificationType::parse(&mut reader, constant_pool, &mut label_at))
                    .collect::<ClassFileResult<Vec<_>>>()?;
                (delta, FrameKind::Full { locals, stack })
            }
            other => return Err(ClassFileError::InvalidFrameType(other)),
        };
        let offset = match previous {
            None => delta,
            Some(prev) => prev + delta + 1,
        };
        previous = Some(offset);
        frames.push(StackMapFrame { label: label_at(offset), kind });
    }
    if !reader.is_empty() {
        return Err(ClassFileError::InvalidAttribute {
            name: "StackMapTable".to_string(),
            reason: format!("{} trailing bytes", reader.remaining()),
        });
    }
    Ok(frames)
}

/// Encode frames; `offset_of` maps labels to their laid-out byte offsets.
pub fn write_stack_map(
    frames: &[StackMapFrame],
    constant_pool: &mut ConstantPool,
    offset_of: impl Fn(Label) -> ClassFileResult<u32>,
) -> ClassFileResult<Vec<u8>> {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&(frames.len() as u16).to_be_bytes());
    let mut previous: Option<u32> = None;
    for frame in frames {
        let offset = offset_of(frame.label)?;
        let delta = match previous {
            None => offset,
            Some(prev) if offset > prev => offset - prev - 1,
            Some(_) => {
                return Err(ClassFileError::FrameAnalysis(format!(
                    "stack map frames out of order at offset {}",
                    offset
                )))
            }
        };
        if delta > u16::MAX as u32 {
            return Err(ClassFileError::CodeTooLarge(offset as usize));
        }
        previous = Some(offset);
        let delta16 = (delta as u16).to_be_bytes();
        match &frame.kind {
            FrameKind::Same if delta <= 63 => bytes.push(delta as u8),
            FrameKind::Same => {
                bytes.push(SAME_FRAME_EXTENDED);
                bytes.extend_from_slice(&delta16);
            }
            FrameKind::SameLocals1StackItem(item) => {
                if delta <= 63 {
                    bytes.push(64 + delta as u8);
                } else {
                    bytes.push(SAME_LOCALS_1_STACK_ITEM_EXTENDED);
                    bytes.extend_from_slice(&delta16);
                }
                item.write(&mut bytes, constant_pool, &offset_of)?;
            }
            FrameKind::Chop(k) => {
                bytes.push(SAME_FRAME_EXTENDED - k);
                bytes.extend_from_slice(&delta16);
            }
            FrameKind::Append(locals) => {
                bytes.push(SAME_FRAME_EXTENDED + locals.len() as u8);
                bytes.extend_from_slice(&delta16);
                for local in locals {
                    local.write(&mut bytes, constant_pool, &offset_of)?;
                }
            }
            FrameKind::Full { locals, stack } => {
                bytes.push(FULL_FRAME);
                bytes.extend_from_slice(&delta16);
                bytes.extend_from_slice(&(locals.len() as u16).to_be_bytes());
                for local in locals {
                    local.write(&mut bytes, constant_pool, &offset_of)?;
                }
                bytes.extend_from_slice(&(stack.len() as u16).to_be_bytes());
                for item in stack {
                    item.write(&mut bytes, constant_pool, &offset_of)?;
                }
            }
        }
    }
    Ok(bytes)
}

/// Largest number of local slots any frame describes, starting from the implicit
/// frame built from the method's receiver and parameters
pub fn max_frame_locals(initial: &[VerificationType], frames: &[StackMapFrame]) -> usize {
    let mut locals: Vec<VerificationType> = initial.to_vec();
    let slots = |locals: &[VerificationType]| locals.iter().map(VerificationType::slots).sum::<usize>();
    let mut max = slots(&locals);
    for frame in frames {
        match &frame.kind {
            FrameKind::Same | FrameKind::SameLocals1StackItem(_) => {}
            FrameKind::Chop(k) => {
                let keep = locals.len().saturating_sub(*k as usize);
                locals.truncate(keep);
            }
            FrameKind::Append(extra) => locals.extend(extra.iter().cloned()),
            FrameKind::Full { locals: full, .. } => locals = full.clone(),
        }
        max = max.max(slots(&locals));
    }
    max
}
