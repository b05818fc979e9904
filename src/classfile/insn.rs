//! Symbolic instruction model
//!
//! Instructions carry resolved operands (class names, member references, constant values,
//! labels) instead of constant-pool indices and byte offsets, so a method body can be
//! edited freely and laid out again by [`super::code`].

use super::opcodes::*;

/// A symbolic position in an [`InsnList`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Label(pub(crate) u32);

impl Label {
    pub fn id(&self) -> u32 {
        self.0
    }
}

/// Owner, name and descriptor of a field or method
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MemberRef {
    pub owner: String,
    pub name: String,
    pub descriptor: String,
}

impl MemberRef {
    pub fn new(owner: impl Into<String>, name: impl Into<String>, descriptor: impl Into<String>) -> Self {
        Self { owner: owner.into(), name: name.into(), descriptor: descriptor.into() }
    }
}

/// A resolved `CONSTANT_MethodHandle`
#[derive(Debug, Clone, PartialEq)]
pub struct Handle {
    pub kind: u8,
    pub member: MemberRef,
    pub interface: bool,
}

/// Value pushed by a constant instruction
#[derive(Debug, Clone, PartialEq)]
pub enum ConstValue {
    Null,
    Int(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    String(String),
    /// String literal that is not valid Unicode, as modified UTF-8 bytes
    RawString(Vec<u8>),
    Class(String),
    MethodType(String),
    MethodHandle(Handle),
    Dynamic { bootstrap: u16, name: String, descriptor: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Insn {
    /// Position marker; encodes to nothing
    Label(Label),
    /// Zero-operand instruction
    Simple(u8),
    /// `aconst_null`, `iconst_*`, `lconst_*`, `fconst_*`, `dconst_*`, `bipush`, `sipush`, `ldc*`
    Const { opcode: u8, value: ConstValue },
    /// Local variable load/store or `ret`; `opcode` is always the indexed form (`iload`, `astore`...)
    Var { opcode: u8, index: u16 },
    Iinc { index: u16, delta: i16 },
    /// `new`, `checkcast`, `instanceof`, `anewarray`
    Type { opcode: u8, class: String },
    NewArray { atype: u8 },
    MultiANewArray { class: String, dimensions: u8 },
    Field { opcode: u8, field: MemberRef },
    Invoke { opcode: u8, method: MemberRef, interface: bool },
    InvokeDynamic { bootstrap: u16, name: String, descriptor: String },
    /// Conditional branch, `goto` or `jsr`; wide forms are chosen during layout
    Jump { opcode: u8, target: Label },
    TableSwitch { default: Label, low: i32, high: i32, targets: Vec<Label> },
    LookupSwitch { default: Label, pairs: Vec<(i32, Label)> },
}

impl Insn {
    pub fn simple(opcode: u8) -> Self {
        Insn::Simple(opcode)
    }

    pub fn aload(index: u16) -> Self {
        Insn::Var { opcode: ALOAD, index }
    }

    pub fn ldc_long(value: i64) -> Self {
        Insn::Const { opcode: LDC2_W, value: ConstValue::Long(value) }
    }

    /// Smallest instruction pushing the int `value`
    pub fn push_int(value: i32) -> Self {
        let opcode = match value {
            -1..=5 => (ICONST_0 as i32 + value) as u8,
            -128..=127 => BIPUSH,
            -32768..=32767 => SIPUSH,
            _ => LDC,
        };
        Insn::Const { opcode, value: ConstValue::Int(value) }
    }

    pub fn ldc_string(value: impl Into<String>) -> Self {
        Insn::Const { opcode: LDC, value: ConstValue::String(value.into()) }
    }

    pub fn new_object(class: impl Into<String>) -> Self {
        Insn::Type { opcode: NEW, class: class.into() }
    }

    pub fn get_static(owner: &str, name: &str, descriptor: &str) -> Self {
        Insn::Field { opcode: GETSTATIC, field: MemberRef::new(owner, name, descriptor) }
    }

    pub fn put_field(owner: &str, name: &str, descriptor: &str) -> Self {
        Insn::Field { opcode: PUTFIELD, field: MemberRef::new(owner, name, descriptor) }
    }

    pub fn invoke_special(owner: &str, name: &str, descriptor: &str) -> Self {
        Insn::Invoke { opcode: INVOKESPECIAL, method: MemberRef::new(owner, name, descriptor), interface: false }
    }

    pub fn invoke_virtual(owner: &str, name: &str, descriptor: &str) -> Self {
        Insn::Invoke { opcode: INVOKEVIRTUAL, method: MemberRef::new(owner, name, descriptor), interface: false }
    }

    pub fn invoke_static(owner: &str, name: &str, descriptor: &str) -> Self {
        Insn::Invoke { opcode: INVOKESTATIC, method: MemberRef::new(owner, name, descriptor), interface: false }
    }

    pub fn jump(opcode: u8, target: Label) -> Self {
        Insn::Jump { opcode, target }
    }

    /// The real opcode, or `None` for a label
    pub fn opcode(&self) -> Option<u8> {
        match self {
            Insn::Label(_) => None,
            Insn::Simple(op) => Some(*op),
            Insn::Const { opcode, .. }
            | Insn::Var { opcode, .. }
            | Insn::Type { opcode, .. }
            | Insn::Field { opcode, .. }
            | Insn::Invoke { opcode, .. }
            | Insn::Jump { opcode, .. } => Some(*opcode),
            Insn::Iinc { .. } => Some(IINC),
            Insn::NewArray { .. } => Some(NEWARRAY),
            Insn::MultiANewArray { .. } => Some(MULTIANEWARRAY),
            Insn::InvokeDynamic { .. } => Some(INVOKEDYNAMIC),
            Insn::TableSwitch { .. } => Some(TABLESWITCH),
            Insn::LookupSwitch { .. } => Some(LOOKUPSWITCH),
        }
    }

    /// True when control cannot fall through to the next instruction
    pub fn ends_flow(&self) -> bool {
        self.opcode().map(ends_flow).unwrap_or(false)
    }

    /// Labels this instruction may transfer control to
    pub fn branch_targets(&self) -> Vec<Label> {
        match self {
            Insn::Jump { target, .. } => vec![*target],
            Insn::TableSwitch { default, targets, .. } => {
                let mut all = vec![*default];
                all.extend(targets.iter().copied());
                all
            }
            Insn::LookupSwitch { default, pairs } => {
                let mut all = vec![*default];
                all.extend(pairs.iter().map(|(_, l)| *l));
                all
            }
            _ => Vec::new(),
        }
    }

    /// True for `invokespecial <init>`
    pub fn is_constructor_call(&self) -> bool {
        matches!(self, Insn::Invoke { opcode: INVOKESPECIAL, method, .. } if method.name == "<init>")
    }
}

/// Ordered instruction sequence of one method body
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InsnList {
    insns: Vec<Insn>,
    next_label: u32,
}

impl InsnList {
    pub fn new() -> Self {
        Self::default()
    }

    /// A label unique within this list; it still has to be placed with [`Insn::Label`]
    pub fn new_label(&mut self) -> Label {
        let label = Label(self.next_label);
        self.next_label += 1;
        label
    }

    pub(crate) fn reserve_labels(&mut self, upto: u32) {
        self.next_label = self.next_label.max(upto);
    }

    pub fn push(&mut self, insn: Insn) {
        self.insns.push(insn);
    }

    pub fn len(&self) -> usize {
        self.insns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.insns.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Insn> {
        self.insns.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Insn> {
        self.insns.iter()
    }

    pub fn as_slice(&self) -> &[Insn] {
        &self.insns
    }

    /// Index of the first instruction matching `pred`
    pub fn find_first(&self, pred: impl FnMut(&Insn) -> bool) -> Option<usize> {
        self.insns.iter().position(pred)
    }

    /// Insert `block` directly after the instruction at `index`
    pub fn insert_after(&mut self, index: usize, block: impl IntoIterator<Item = Insn>) {
        let at = (index + 1).min(self.insns.len());
        self.insns.splice(at..at, block);
    }

    /// Insert `block` directly before the instruction at `index`
    pub fn insert_before(&mut self, index: usize, block: impl IntoIterator<Item = Insn>) {
        let at = index.min(self.insns.len());
        self.insns.splice(at..at, block);
    }

    pub fn remove(&mut self, index: usize) -> Insn {
        self.insns.remove(index)
    }

    /// Number of real (non-label) instructions
    pub fn real_len(&self) -> usize {
        self.insns.iter().filter(|i| !matches!(i, Insn::Label(_))).count()
    }
}

impl<'a> IntoIterator for &'a InsnList {
    type Item = &'a Insn;
    type IntoIter = std::slice::Iter<'a, Insn>;

    fn into_iter(self) -> Self::IntoIter {
        self.insns.iter()
    }
}

impl FromIterator<Insn> for InsnList {
    fn from_iter<T: IntoIterator<Item = Insn>>(iter: T) -> Self {
        let insns: Vec<Insn> = iter.into_iter().collect();
        let next_label = insns
            .iter()
            .flat_map(|i| match i {
                Insn::Label(l) => vec![*l],
                other => other.branch_targets(),
            })
            .map(|l| l.0 + 1)
            .max()
            .unwrap_or(0);
        Self { insns, next_label }
    }
}
