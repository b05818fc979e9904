//! Classification of the sample test classes

mod common;

use std::collections::HashMap;
use std::sync::Arc;

use common::*;
use timeout_enforcer::classfile::annotation::marker_annotations;
use timeout_enforcer::classfile::attribute::AttributeInfo;
use timeout_enforcer::classfile::defs::attribute_names;
use timeout_enforcer::classfile::flag::access_flags::*;
use timeout_enforcer::classfile::{ClassBuilder, ClassFile, Constant};
use timeout_enforcer::consts::{RULE_TAG, TEST_TAG, TIMEOUT_DESCRIPTOR};
use timeout_enforcer::engine::Classifier;
use timeout_enforcer::{classify, classify_bytes, transform_bytes, Applicability};

fn hierarchy_of(classes: &[&ClassFile]) -> HashMap<String, Arc<ClassFile>> {
    classes.iter().map(|c| (c.name().unwrap().to_string(), Arc::new((*c).clone()))).collect()
}

#[test]
fn test_samples_classify_as_expected() {
    init_logging();
    for (class, expected) in samples() {
        assert_eq!(classify(&class), expected, "{}", class.name().unwrap());
    }
}

#[test]
fn test_classify_from_bytes_matches_model() {
    for (class, expected) in samples() {
        assert_eq!(classify_bytes(&class.to_bytes()).unwrap(), expected, "{}", class.name().unwrap());
    }
}

#[test]
fn test_subclass_inherits_timeout_rule() {
    let parent = class_with_timeout_but_no_tests();
    let child = junit_test_subclass();
    // own members only: the rule is invisible
    assert_eq!(classify(&child), Applicability::Applicable);

    let hierarchy = hierarchy_of(&[&parent]);
    let classifier = Classifier::with_hierarchy(&hierarchy);
    assert_eq!(classifier.classify(&child), Applicability::ExistentTimeout);
    assert_eq!(classifier.classify(&parent), Applicability::ExistentTimeout);
}

#[test]
fn test_inherited_test_methods_count() {
    let base = ClassBuilder::new("pkg/AbstractBase")
        .access(ACC_PUBLIC | ACC_SUPER | ACC_ABSTRACT)
        .default_constructor(ACC_PUBLIC)
        .void_method(ACC_PUBLIC, "inheritedTest", &[TEST_TAG])
        .build()
        .unwrap();
    let concrete = ClassBuilder::new("pkg/Concrete")
        .super_name("pkg/AbstractBase")
        .default_constructor(ACC_PUBLIC)
        .build()
        .unwrap();
    assert_eq!(classify(&base), Applicability::NotTestClass);
    assert_eq!(classify(&concrete), Applicability::NoTests);
    let hierarchy = hierarchy_of(&[&base]);
    assert_eq!(Classifier::with_hierarchy(&hierarchy).classify(&concrete), Applicability::Applicable);
}

#[test]
fn test_rule_precedes_missing_tests() {
    let class = ClassBuilder::new("pkg/RuleOnly")
        .default_constructor(ACC_PUBLIC)
        .field(ACC_PUBLIC, "t", TIMEOUT_DESCRIPTOR, &[RULE_TAG])
        .build()
        .unwrap();
    assert_eq!(classify(&class), Applicability::ExistentTimeout);
}

#[test]
fn test_untagged_timeout_field_is_not_a_rule() {
    let class = with_test_methods(
        ClassBuilder::new("pkg/PlainField")
            .default_constructor(ACC_PUBLIC)
            .field(ACC_PUBLIC, "timeout", TIMEOUT_DESCRIPTOR, &[]),
    )
    .build()
    .unwrap();
    assert_eq!(classify(&class), Applicability::Applicable);
}

#[test]
fn test_classify_is_pure() {
    let class = basic_junit_test();
    let before = class.clone();
    let first = classify(&class);
    let second = classify(&class);
    assert_eq!(first, second);
    assert_eq!(class, before);
}

#[test]
fn test_garbage_bytes_are_malformed() {
    assert!(matches!(classify_bytes(b"\xCA\xFE\xBA\xBE"), Err(timeout_enforcer::Error::Malformed { .. })));
}

#[test]
fn test_lone_surrogate_literal_is_not_malformed() {
    let bytes = lone_surrogate_constant().to_bytes();
    assert_eq!(classify_bytes(&bytes).unwrap(), Applicability::Applicable);

    let out = ClassFile::parse(&transform_bytes(&bytes, 1_000).unwrap()).unwrap();
    assert_eq!(classify(&out), Applicability::ExistentTimeout);
    let raw = Constant::RawUtf8(LONE_SURROGATE.to_vec());
    assert_eq!(out.constant_pool.iter().filter(|(_, c)| **c == raw).count(), 1);
}

#[test]
fn test_member_class_needing_an_enclosing_instance() {
    let inner = member_class("Inner", ACC_PUBLIC | ACC_SUPER, ACC_PUBLIC);
    assert!(inner.is_inner_instance_class().unwrap());
    assert_eq!(classify(&inner), Applicability::NotTestClass);

    let nested = member_class("Nested", ACC_PUBLIC | ACC_SUPER, ACC_PUBLIC | ACC_STATIC);
    assert!(!nested.is_inner_instance_class().unwrap());
    assert_eq!(classify(&nested), Applicability::Applicable);
}

#[test]
fn test_member_class_visibility_comes_from_inner_classes() {
    // javac writes a protected member class as public in access_flags
    let protected = member_class("Prot", ACC_PUBLIC | ACC_SUPER, ACC_PROTECTED | ACC_STATIC);
    assert_eq!(protected.declared_access_flags().unwrap(), ACC_PROTECTED | ACC_STATIC);
    assert_eq!(classify(&protected), Applicability::NotTestClass);
    assert_eq!(classify_bytes(&protected.to_bytes()).unwrap(), Applicability::NotTestClass);

    let private = member_class("Priv", ACC_SUPER, ACC_PRIVATE | ACC_STATIC);
    assert_eq!(classify(&private), Applicability::NotTestClass);

    let top_level = basic_junit_test();
    assert_eq!(top_level.declared_access_flags().unwrap(), top_level.access_flags);
}

#[test]
fn test_enum_interface_and_annotation_types_are_not_test_classes() {
    let kinds = [
        ("pkg/Color", ACC_PUBLIC | ACC_FINAL | ACC_SUPER | ACC_ENUM),
        ("pkg/Contract", ACC_PUBLIC | ACC_INTERFACE | ACC_ABSTRACT),
        ("pkg/Marker", ACC_PUBLIC | ACC_INTERFACE | ACC_ABSTRACT | ACC_ANNOTATION),
    ];
    for (name, access) in kinds {
        // a public no-arg constructor leaves the kind as the only reason to reject
        let class = with_test_methods(ClassBuilder::new(name).access(access).default_constructor(ACC_PUBLIC))
            .build()
            .unwrap();
        assert_eq!(classify(&class), Applicability::NotTestClass, "{}", name);
    }
}

#[test]
fn test_invisible_test_annotation_is_ignored() {
    let mut class = ClassBuilder::new("pkg/SourceOnly")
        .default_constructor(ACC_PUBLIC)
        .void_method(ACC_PUBLIC, "looksLikeATest", &[])
        .build()
        .unwrap();
    let marker = marker_annotations(&mut class.constant_pool, &[TEST_TAG]).unwrap();
    let name = class.constant_pool.add_utf8(attribute_names::RUNTIME_INVISIBLE_ANNOTATIONS).unwrap();
    class.methods[1].attributes.push(AttributeInfo::new(name, marker.info));
    assert_eq!(classify(&class), Applicability::NoTests);
}

#[test]
fn test_unreadable_member_makes_class_not_a_test_class() {
    init_logging();
    let mut class = with_test_methods(
        ClassBuilder::new("pkg/Corrupt")
            .default_constructor(ACC_PUBLIC)
            .field(ACC_PUBLIC, "timeout", TIMEOUT_DESCRIPTOR, &[RULE_TAG]),
    )
    .build()
    .unwrap();
    assert_eq!(classify(&class), Applicability::ExistentTimeout);
    class.fields[0].descriptor_index = u16::MAX;
    assert_eq!(classify(&class), Applicability::NotTestClass);
}
