//! Rewriting applicable classes and checking the output

mod common;

use common::*;
use timeout_enforcer::classfile::flag::access_flags::*;
use timeout_enforcer::classfile::opcodes::*;
use timeout_enforcer::classfile::verify::verify;
use timeout_enforcer::classfile::{ClassBuilder, ClassFile, ConstValue, Insn};
use timeout_enforcer::consts::{RULE_TAG, TIMEOUT_DESCRIPTOR};
use timeout_enforcer::engine::apply_with_report;
use timeout_enforcer::{apply, classify, transform_bytes, Applicability, Error};

const TIMEOUT_BLOCK: [u8; 7] = [ALOAD, NEW, DUP, LDC2_W, GETSTATIC, INVOKESPECIAL, PUTFIELD];
/// Encoded size of the inserted block
const TIMEOUT_BLOCK_LENGTH: u32 = 17;

fn applicable_samples() -> Vec<ClassFile> {
    samples()
        .into_iter()
        .filter(|(_, applicability)| applicability.should_transform())
        .map(|(class, _)| class)
        .collect()
}

fn rule_field_names(class: &ClassFile) -> Vec<String> {
    class
        .fields
        .iter()
        .filter(|f| f.is_public() && !f.is_static())
        .filter(|f| f.descriptor(&class.constant_pool).unwrap() == TIMEOUT_DESCRIPTOR)
        .filter(|f| f.has_tag(&class.constant_pool, RULE_TAG).unwrap())
        .map(|f| f.name(&class.constant_pool).unwrap().to_string())
        .collect()
}

#[test]
fn test_rewritten_samples_are_no_longer_applicable() {
    init_logging();
    for class in applicable_samples() {
        let name = class.name().unwrap().to_string();
        let out = apply(class, 10).unwrap();
        assert_eq!(classify(&out), Applicability::ExistentTimeout, "{}", name);
        let reparsed = ClassFile::parse(&out.to_bytes()).unwrap();
        assert_eq!(classify(&reparsed), Applicability::ExistentTimeout, "{}", name);
        verify(&reparsed).unwrap_or_else(|e| panic!("{}: {}", name, e));
    }
}

#[test]
fn test_basic_constructor_gets_block_after_super_call() {
    let out = apply(basic_junit_test(), 10).unwrap();
    assert_eq!(rule_field_names(&out), vec!["globalTimeout".to_string()]);

    let init = method_body(&out, "<init>", "()V");
    let mut expected = vec![ALOAD, INVOKESPECIAL];
    expected.extend(TIMEOUT_BLOCK);
    expected.push(RETURN);
    assert_eq!(opcodes(&init), expected);
    assert!(init.insns.iter().any(|i| matches!(i, Insn::Const { value: ConstValue::Long(10), .. })));
    assert_eq!(init.max_stack, 6);
    assert_eq!(init.max_locals, 1);
}

#[test]
fn test_other_methods_untouched() {
    let original = basic_junit_test();
    let out = apply(original.clone(), 10).unwrap();
    for name in ["noopTest", "sleepFor10s"] {
        assert_eq!(method_body(&out, name, "()V"), method_body(&original, name, "()V"));
    }
    assert_eq!(out.fields.len(), original.fields.len() + 1);
    assert_eq!(out.methods.len(), original.methods.len());
}

#[test]
fn test_name_collision_picks_suffix() {
    let out = apply(private_timeout_field(), 1).unwrap();
    assert_eq!(rule_field_names(&out), vec!["globalTimeout1".to_string()]);
    let names = out.field_names().unwrap();
    assert_eq!(names, vec!["globalTimeout", "globalTimeout1"]);
}

#[test]
fn test_name_exhaustion() {
    let mut builder = with_test_methods(ClassBuilder::new("pkg/Crowded").default_constructor(ACC_PUBLIC))
        .field(ACC_PRIVATE, "globalTimeout", "I", &[]);
    for n in 1..=100 {
        builder = builder.field(ACC_PRIVATE, &format!("globalTimeout{}", n), "I", &[]);
    }
    let class = builder.build().unwrap();
    assert_eq!(classify(&class), Applicability::Applicable);
    assert!(matches!(apply(class, 10), Err(Error::NameExhaustion { class }) if class == "pkg/Crowded"));
}

#[test]
fn test_only_super_calling_constructor_is_instrumented() {
    let original = secondary_private_constructor();
    let (out, report) = apply_with_report(original.clone(), 10).unwrap();
    assert_eq!(report.instrumented, vec!["(Z)V".to_string()]);
    assert_eq!(report.delegating, vec!["()V".to_string()]);
    assert!(report.skipped.is_empty());

    assert_eq!(method_body(&out, "<init>", "()V"), method_body(&original, "<init>", "()V"));
    assert_eq!(code_length(&out, "<init>", "(Z)V"), code_length(&original, "<init>", "(Z)V") + TIMEOUT_BLOCK_LENGTH);
    verify(&out).unwrap();
}

#[test]
fn test_branches_and_frames_follow_the_insertion() {
    let original = secondary_private_constructor();
    let out = apply(original.clone(), 10).unwrap();
    let before = method_body(&original, "<init>", "(Z)V");
    let after = method_body(&out, "<init>", "(Z)V");

    // every label still sits before the same instruction it marked originally
    let following = |body: &timeout_enforcer::classfile::MethodBody| -> Vec<Option<u8>> {
        let insns = body.insns.as_slice();
        insns
            .iter()
            .enumerate()
            .filter(|(_, i)| matches!(i, Insn::Label(_)))
            .map(|(index, _)| insns[index + 1..].iter().find_map(Insn::opcode))
            .collect()
    };
    assert_eq!(following(&before), following(&after));
    assert_eq!(after.frames.len(), before.frames.len());
    for (a, b) in after.frames.iter().zip(&before.frames) {
        assert_eq!(a.kind, b.kind);
    }
    let first_frame = after.insns.as_slice().iter().position(|i| *i == Insn::Label(after.frames[0].label)).unwrap();
    let preceding: Vec<u8> = after.insns.as_slice()[..first_frame].iter().filter_map(Insn::opcode).collect();
    assert!(preceding.windows(TIMEOUT_BLOCK.len()).any(|w| w == TIMEOUT_BLOCK));
}

#[test]
fn test_exception_ranges_follow_the_insertion() {
    let original = guarded_constructor();
    let out = apply(original.clone(), 10).unwrap();
    assert_eq!(code_length(&out, "<init>", "()V"), code_length(&original, "<init>", "()V") + TIMEOUT_BLOCK_LENGTH);

    let body = method_body(&out, "<init>", "()V");
    assert_eq!(body.try_catch.len(), 1);
    assert_eq!(body.try_catch[0].catch_type.as_deref(), Some("java/lang/RuntimeException"));
    let insns = body.insns.as_slice();
    let start = insns.iter().position(|i| *i == Insn::Label(body.try_catch[0].start)).unwrap();
    let guarded: Vec<u8> = insns[start..].iter().filter_map(Insn::opcode).take(2).collect();
    assert_eq!(guarded, vec![ALOAD, INVOKEVIRTUAL]);
    let handler = insns.iter().position(|i| *i == Insn::Label(body.try_catch[0].handler)).unwrap();
    assert_eq!(insns[handler + 1..].iter().find_map(Insn::opcode), Some(ASTORE));
    assert_eq!(body.line_numbers.len(), 2);
    assert_eq!(body.max_locals, 2);
    verify(&out).unwrap();
}

#[test]
fn test_unmodified_code_round_trips_byte_for_byte() {
    for (class, _) in samples() {
        let bytes = class.to_bytes();
        let mut parsed = ClassFile::parse(&bytes).unwrap();
        let ClassFile { constant_pool, methods, .. } = &mut parsed;
        for method in methods.iter_mut() {
            if let Some(mut body) = method.body(constant_pool).unwrap() {
                method.set_body(&mut body, constant_pool).unwrap();
            }
        }
        assert_eq!(parsed.to_bytes(), bytes, "{}", class.name().unwrap());
    }
}

#[test]
fn test_transform_bytes_gates_on_applicability() {
    let out = transform_bytes(&basic_junit_test().to_bytes(), 10).unwrap();
    assert_eq!(classify(&ClassFile::parse(&out).unwrap()), Applicability::ExistentTimeout);

    let again = transform_bytes(&out, 10);
    assert!(matches!(
        again,
        Err(Error::NotApplicable { applicability: Applicability::ExistentTimeout, .. })
    ));
    assert!(matches!(
        transform_bytes(&hello_world().to_bytes(), 10),
        Err(Error::NotApplicable { applicability: Applicability::NoTests, .. })
    ));
}

#[test]
fn test_duration_bounds() {
    assert!(apply(basic_junit_test(), i64::MAX as u64).is_ok());
    assert!(matches!(apply(basic_junit_test(), u64::MAX), Err(Error::InvalidDuration { millis: u64::MAX })));
    let out = apply(basic_junit_test(), 0).unwrap();
    let init = method_body(&out, "<init>", "()V");
    assert!(init.insns.iter().any(|i| matches!(i, Insn::Const { opcode: LDC2_W, value: ConstValue::Long(0) })));
}

#[test]
fn test_constant_pool_only_grows() {
    let original = basic_junit_test();
    let out = apply(original.clone(), 10).unwrap();
    for (index, constant) in original.constant_pool.iter() {
        assert_eq!(out.constant_pool.get(index).unwrap(), constant);
    }
    assert!(out.constant_pool.count() > original.constant_pool.count());
}
