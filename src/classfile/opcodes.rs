//! JVM instruction opcodes
//!
//! Values follow the Java Virtual Machine Specification, chapter 6, ordered by opcode value.

// 0x00 - 0x14: constants
pub const NOP: u8 = 0x00;
pub const ACONST_NULL: u8 = 0x01;
pub const ICONST_M1: u8 = 0x02;
pub const ICONST_0: u8 = 0x03;
pub const ICONST_1: u8 = 0x04;
pub const ICONST_2: u8 = 0x05;
pub const ICONST_3: u8 = 0x06;
pub const ICONST_4: u8 = 0x07;
pub const ICONST_5: u8 = 0x08;
pub const LCONST_0: u8 = 0x09;
pub const LCONST_1: u8 = 0x0a;
pub const FCONST_0: u8 = 0x0b;
pub const FCONST_1: u8 = 0x0c;
pub const FCONST_2: u8 = 0x0d;
pub const DCONST_0: u8 = 0x0e;
pub const DCONST_1: u8 = 0x0f;
pub const BIPUSH: u8 = 0x10;
pub const SIPUSH: u8 = 0x11;
pub const LDC: u8 = 0x12;
pub const LDC_W: u8 = 0x13;
pub const LDC2_W: u8 = 0x14;

// 0x15 - 0x35: loads
pub const ILOAD: u8 = 0x15;
pub const LLOAD: u8 = 0x16;
pub const FLOAD: u8 = 0x17;
pub const DLOAD: u8 = 0x18;
pub const ALOAD: u8 = 0x19;
pub const ILOAD_0: u8 = 0x1a;
pub const ALOAD_0: u8 = 0x2a;
pub const ALOAD_3: u8 = 0x2d;
pub const IALOAD: u8 = 0x2e;
pub const LALOAD: u8 = 0x2f;
pub const FALOAD: u8 = 0x30;
pub const DALOAD: u8 = 0x31;
pub const AALOAD: u8 = 0x32;
pub const BALOAD: u8 = 0x33;
pub const CALOAD: u8 = 0x34;
pub const SALOAD: u8 = 0x35;

// 0x36 - 0x56: stores
pub const ISTORE: u8 = 0x36;
pub const LSTORE: u8 = 0x37;
pub const FSTORE: u8 = 0x38;
pub const DSTORE: u8 = 0x39;
pub const ASTORE: u8 = 0x3a;
pub const ISTORE_0: u8 = 0x3b;
pub const ASTORE_3: u8 = 0x4e;
pub const IASTORE: u8 = 0x4f;
pub const LASTORE: u8 = 0x50;
pub const FASTORE: u8 = 0x51;
pub const DASTORE: u8 = 0x52;
pub const AASTORE: u8 = 0x53;
pub const BASTORE: u8 = 0x54;
pub const CASTORE: u8 = 0x55;
pub const SASTORE: u8 = 0x56;

// 0x57 - 0x5f: stack
pub const POP: u8 = 0x57;
pub const POP2: u8 = 0x58;
pub const DUP: u8 = 0x59;
pub const DUP_X1: u8 = 0x5a;
pub const DUP_X2: u8 = 0x5b;
pub const DUP2: u8 = 0x5c;
pub const DUP2_X1: u8 = 0x5d;
pub const DUP2_X2: u8 = 0x5e;
pub const SWAP: u8 = 0x5f;

// 0x60 - 0x84: arithmetic
pub const IADD: u8 = 0x60;
pub const LADD: u8 = 0x61;
pub const FADD: u8 = 0x62;
pub const DADD: u8 = 0x63;
pub const ISUB: u8 = 0x64;
pub const LSUB: u8 = 0x65;
pub const FSUB: u8 = 0x66;
pub const DSUB: u8 = 0x67;
pub const IMUL: u8 = 0x68;
pub const LMUL: u8 = 0x69;
pub const FMUL: u8 = 0x6a;
pub const DMUL: u8 = 0x6b;
pub const IDIV: u8 = 0x6c;
pub const LDIV: u8 = 0x6d;
pub const FDIV: u8 = 0x6e;
pub const DDIV: u8 = 0x6f;
pub const IREM: u8 = 0x70;
pub const LREM: u8 = 0x71;
pub const FREM: u8 = 0x72;
pub const DREM: u8 = 0x73;
pub const INEG: u8 = 0x74;
pub const LNEG: u8 = 0x75;
pub const FNEG: u8 = 0x76;
pub const DNEG: u8 = 0x77;
pub const ISHL: u8 = 0x78;
pub const LSHL: u8 = 0x79;
pub const ISHR: u8 = 0x7a;
pub const LSHR: u8 = 0x7b;
pub const IUSHR: u8 = 0x7c;
pub const LUSHR: u8 = 0x7d;
pub const IAND: u8 = 0x7e;
pub const LAND: u8 = 0x7f;
pub const IOR: u8 = 0x80;
pub const LOR: u8 = 0x81;
pub const IXOR: u8 = 0x82;
pub const LXOR: u8 = 0x83;
pub const IINC: u8 = 0x84;

// 0x85 - 0x98: conversions and comparisons
pub const I2L: u8 = 0x85;
pub const I2F: u8 = 0x86;
pub const I2D: u8 = 0x87;
pub const L2I: u8 = 0x88;
pub const L2F: u8 = 0x89;
pub const L2D: u8 = 0x8a;
pub const F2I: u8 = 0x8b;
pub const F2L: u8 = 0x8c;
pub const F2D: u8 = 0x8d;
pub const D2I: u8 = 0x8e;
pub const D2L: u8 = 0x8f;
pub const D2F: u8 = 0x90;
pub const I2B: u8 = 0x91;
pub const I2C: u8 = 0x92;
pub const I2S: u8 = 0x93;
pub const LCMP: u8 = 0x94;
pub const FCMPL: u8 = 0x95;
pub const FCMPG: u8 = 0x96;
pub const DCMPL: u8 = 0x97;
pub const DCMPG: u8 = 0x98;

// 0x99 - 0xb1: control
pub const IFEQ: u8 = 0x99;
pub const IFNE: u8 = 0x9a;
pub const IFLT: u8 = 0x9b;
pub const IFGE: u8 = 0x9c;
pub const IFGT: u8 = 0x9d;
pub const IFLE: u8 = 0x9e;
pub const IF_ICMPEQ: u8 = 0x9f;
pub const IF_ICMPNE: u8 = 0xa0;
pub const IF_ICMPLT: u8 = 0xa1;
pub const IF_ICMPGE: u8 = 0xa2;
pub const IF_ICMPGT: u8 = 0xa3;
pub const IF_ICMPLE: u8 = 0xa4;
pub const IF_ACMPEQ: u8 = 0xa5;
pub const IF_ACMPNE: u8 = 0xa6;
pub const GOTO: u8 = 0xa7;
pub const JSR: u8 = 0xa8;
pub const RET: u8 = 0xa9;
pub const TABLESWITCH: u8 = 0xaa;
pub const LOOKUPSWITCH: u8 = 0xab;
pub const IRETURN: u8 = 0xac;
pub const LRETURN: u8 = 0xad;
pub const FRETURN: u8 = 0xae;
pub const DRETURN: u8 = 0xaf;
pub const ARETURN: u8 = 0xb0;
pub const RETURN: u8 = 0xb1;

// 0xb2 - 0xc3: references
pub const GETSTATIC: u8 = 0xb2;
pub const PUTSTATIC: u8 = 0xb3;
pub const GETFIELD: u8 = 0xb4;
pub const PUTFIELD: u8 = 0xb5;
pub const INVOKEVIRTUAL: u8 = 0xb6;
pub const INVOKESPECIAL: u8 = 0xb7;
pub const INVOKESTATIC: u8 = 0xb8;
pub const INVOKEINTERFACE: u8 = 0xb9;
pub const INVOKEDYNAMIC: u8 = 0xba;
pub const NEW: u8 = 0xbb;
pub const NEWARRAY: u8 = 0xbc;
pub const ANEWARRAY: u8 = 0xbd;
pub const ARRAYLENGTH: u8 = 0xbe;
pub const ATHROW: u8 = 0xbf;
pub const CHECKCAST: u8 = 0xc0;
pub const INSTANCEOF: u8 = 0xc1;
pub const MONITORENTER: u8 = 0xc2;
pub const MONITOREXIT: u8 = 0xc3;

// 0xc4 - 0xc9: extended
pub const WIDE: u8 = 0xc4;
pub const MULTIANEWARRAY: u8 = 0xc5;
pub const IFNULL: u8 = 0xc6;
pub const IFNONNULL: u8 = 0xc7;
pub const GOTO_W: u8 = 0xc8;
pub const JSR_W: u8 = 0xc9;

/// Net operand-stack effect, in slots, of an instruction without operands.
///
/// Returns `None` for opcodes that carry operands or whose effect depends on a
/// constant-pool reference.
pub fn simple_stack_delta(opcode: u8) -> Option<i32> {
    let delta = match opcode {
        NOP | INEG | LNEG | FNEG | DNEG | I2F | L2D | F2I | D2L | I2B | I2C | I2S
        | SWAP | LALOAD | DALOAD | ARRAYLENGTH | RETURN => 0,
        ACONST_NULL..=ICONST_5 | FCONST_0..=FCONST_2 => 1,
        LCONST_0 | LCONST_1 | DCONST_0 | DCONST_1 => 2,
        IALOAD | FALOAD | AALOAD | BALOAD | CALOAD | SALOAD => -1,
        IASTORE | FASTORE | AASTORE | BASTORE | CASTORE | SASTORE => -3,
        LASTORE | DASTORE => -4,
        POP => -1,
        POP2 => -2,
        DUP | DUP_X1 | DUP_X2 => 1,
        DUP2 | DUP2_X1 | DUP2_X2 => 2,
        IADD | FADD | ISUB | FSUB | IMUL | FMUL | IDIV | FDIV | IREM | FREM => -1,
        LADD | DADD | LSUB | DSUB | LMUL | DMUL | LDIV | DDIV | LREM | DREM => -2,
        ISHL | ISHR | IUSHR | LSHL | LSHR | LUSHR => -1,
        IAND | IOR | IXOR => -1,
        LAND | LOR | LXOR => -2,
        I2L | I2D | F2L | F2D => 1,
        L2I | L2F | D2I | D2F => -1,
        LCMP | DCMPL | DCMPG => -3,
        FCMPL | FCMPG => -1,
        IRETURN | FRETURN | ARETURN | ATHROW | MONITORENTER | MONITOREXIT => -1,
        LRETURN | DRETURN => -2,
        _ => return None,
    };
    Some(delta)
}

/// True for opcodes after which control never falls through to the next instruction.
pub fn ends_flow(opcode: u8) -> bool {
    matches!(
        opcode,
        IRETURN..=RETURN | ATHROW | GOTO | GOTO_W | RET | TABLESWITCH | LOOKUPSWITCH
    )
}

/// True for the conditional branch family (`if*`, `if_icmp*`, `if_acmp*`, `ifnull`, `ifnonnull`).
pub fn is_conditional_jump(opcode: u8) -> bool {
    matches!(opcode, IFEQ..=IF_ACMPNE | IFNULL | IFNONNULL)
}

/// Human-readable mnemonic, used in diagnostics.
pub fn opcode_name(opcode: u8) -> &'static str {
    match opcode {
        NOP => "nop",
        ACONST_NULL => "aconst_null",
        BIPUSH => "bipush",
        SIPUSH => "sipush",
        LDC => "ldc",
        LDC_W => "ldc_w",
        LDC2_W => "ldc2_w",
        ILOAD => "iload",
        LLOAD => "lload",
        FLOAD => "fload",
        DLOAD => "dload",
        ALOAD => "aload",
        ISTORE => "istore",
        LSTORE => "lstore",
        FSTORE => "fstore",
        DSTORE => "dstore",
        ASTORE => "astore",
        DUP => "dup",
        IINC => "iinc",
        GOTO => "goto",
        GOTO_W => "goto_w",
        JSR => "jsr",
        JSR_W => "jsr_w",
        RET => "ret",
        TABLESWITCH => "tableswitch",
        LOOKUPSWITCH => "lookupswitch",
        RETURN => "return",
        ATHROW => "athrow",
        GETSTATIC => "getstatic",
        PUTSTATIC => "putstatic",
        GETFIELD => "getfield",
        PUTFIELD => "putfield",
        INVOKEVIRTUAL => "invokevirtual",
        INVOKESPECIAL => "invokespecial",
        INVOKESTATIC => "invokestatic",
        INVOKEINTERFACE => "invokeinterface",
        INVOKEDYNAMIC => "invokedynamic",
        NEW => "new",
        NEWARRAY => "newarray",
        ANEWARRAY => "anewarray",
        CHECKCAST => "checkcast",
        INSTANCEOF => "instanceof",
        WIDE => "wide",
        MULTIANEWARRAY => "multianewarray",
        IFEQ..=IF_ACMPNE | IFNULL | IFNONNULL => "if",
        _ => "op",
    }
}
