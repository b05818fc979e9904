//! `max_stack` / `max_locals` computation over a symbolic instruction list

use std::collections::{HashMap, VecDeque};

use super::code::TryCatchBlock;
use super::descriptor::{self, MethodShape};
use super::error::{ClassFileError, ClassFileResult};
use super::insn::{ConstValue, Insn, Label};
use super::opcodes::*;

/// Upper bound on worklist visits before the analysis gives up
const MAX_ITERATIONS: usize = 1_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Maxs {
    pub max_stack: u16,
    pub max_locals: u16,
}

fn var_width(opcode: u8) -> i32 {
    match opcode {
        LLOAD | DLOAD | LSTORE | DSTORE => 2,
        _ => 1,
    }
}

/// Net stack effect in slots. `jsr` reports 0; its target is entered one slot higher.
fn stack_effect(insn: &Insn) -> ClassFileResult<i32> {
    Ok(match insn {
        Insn::Label(_) | Insn::Iinc { .. } | Insn::NewArray { .. } => 0,
        Insn::Simple(op) => simple_stack_delta(*op)
            .ok_or_else(|| ClassFileError::FrameAnalysis(format!("{} is not a simple instruction", opcode_name(*op))))?,
        Insn::Const { value, .. } => match value {
            ConstValue::Long(_) | ConstValue::Double(_) => 2,
            ConstValue::Dynamic { descriptor, .. } => descriptor::field_slots(descriptor)? as i32,
            _ => 1,
        },
        Insn::Var { opcode: RET, .. } => 0,
        Insn::Var { opcode, .. } if *opcode <= ALOAD => var_width(*opcode),
        Insn::Var { opcode, .. } => -var_width(*opcode),
        Insn::Type { opcode, .. } => if *opcode == NEW { 1 } else { 0 },
        Insn::MultiANewArray { dimensions, .. } => 1 - *dimensions as i32,
        Insn::Field { opcode, field } => {
            let size = descriptor::field_slots(&field.descriptor)? as i32;
            match *opcode {
                GETSTATIC => size,
                PUTSTATIC => -size,
                GETFIELD => size - 1,
                _ => -size - 1,
            }
        }
        Insn::Invoke { opcode, method, .. } => {
            let shape = descriptor::parse_method(&method.descriptor)?;
            let receiver = if *opcode == INVOKESTATIC { 0 } else { 1 };
            shape.ret as i32 - shape.arg_slots() as i32 - receiver
        }
        Insn::InvokeDynamic { descriptor, .. } => {
            let shape = descriptor::parse_method(descriptor)?;
            shape.ret as i32 - shape.arg_slots() as i32
        }
        Insn::Jump { opcode, .. } => match *opcode {
            GOTO | JSR => 0,
            IF_ICMPEQ..=IF_ACMPNE => -2,
            _ => -1,
        },
        Insn::TableSwitch { .. } | Insn::LookupSwitch { .. } => -1,
    })
}

/// Compute frame sizes by propagating stack heights from the entry point and every
/// exception handler. Locals are the receiver, the parameters and every slot an
/// instruction touches.
pub fn compute(
    insns: &[Insn],
    try_catch: &[TryCatchBlock],
    shape: &MethodShape,
    is_static: bool,
) -> ClassFileResult<Maxs> {
    let mut max_locals = shape.arg_slots() as usize + if is_static { 0 } else { 1 };
    for insn in insns {
        let touched = match insn {
            Insn::Var { opcode, index } => *index as usize + var_width(*opcode) as usize,
            Insn::Iinc { index, .. } => *index as usize + 1,
            _ => 0,
        };
        max_locals = max_locals.max(touched);
    }

    let positions: HashMap<Label, usize> = insns
        .iter()
        .enumerate()
        .filter_map(|(i, insn)| match insn {
            Insn::Label(label) => Some((*label, i)),
            _ => None,
        })
        .collect();
    let position = |label: &Label| -> ClassFileResult<usize> {
        positions.get(label).copied().ok_or(ClassFileError::UnknownLabel(label.0))
    };

    let mut heights: Vec<Option<i32>> = vec![None; insns.len()];
    let mut worklist = VecDeque::new();
    let mut max_stack = 0i32;

    let enqueue = |index: usize, height: i32, heights: &mut Vec<Option<i32>>, worklist: &mut VecDeque<usize>| {
        if index >= heights.len() {
            return;
        }
        match heights[index] {
            Some(existing) if existing >= height => {}
            _ => {
                heights[index] = Some(height);
                worklist.push_back(index);
            }
        }
    };

    if !insns.is_empty() {
        enqueue(0, 0, &mut heights, &mut worklist);
    }
    for block in try_catch {
        enqueue(position(&block.handler)?, 1, &mut heights, &mut worklist);
    }

    let mut iterations = 0usize;
    while let Some(index) = worklist.pop_front() {
        iterations += 1;
        if iterations > MAX_ITERATIONS {
            return Err(ClassFileError::FrameAnalysis("stack analysis did not converge".to_string()));
        }
        let insn = &insns[index];
        let before = heights[index].unwrap_or(0);
        let after = before + stack_effect(insn)?;
        if after < 0 {
            return Err(ClassFileError::FrameAnalysis(format!(
                "stack underflow at instruction {} ({})",
                index,
                insn.opcode().map(opcode_name).unwrap_or("label")
            )));
        }
        max_stack = max_stack.max(before).max(after);

        if let Insn::Jump { opcode: JSR, target } = insn {
            max_stack = max_stack.max(after + 1);
            enqueue(position(target)?, after + 1, &mut heights, &mut worklist);
        } else {
            for target in insn.branch_targets() {
                enqueue(position(&target)?, after, &mut heights, &mut worklist);
            }
        }
        if !insn.ends_flow() {
            enqueue(index + 1, after, &mut heights, &mut worklist);
        }
    }

    if max_stack > u16::MAX as i32 || max_locals > u16::MAX as usize {
        return Err(ClassFileError::FrameAnalysis("frame exceeds 65535 slots".to_string()));
    }
    Ok(Maxs { max_stack: max_stack as u16, max_locals: max_locals as u16 })
}
