//! Deciding whether a class should receive a timeout rule

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use crate::classfile::defs::JAVA_LANG_OBJECT;
use crate::classfile::descriptor;
use crate::classfile::error::ClassFileResult;
use crate::classfile::flag::{access_flags, has};
use crate::classfile::ClassFile;
use crate::consts::{MAX_HIERARCHY_DEPTH, RULE_TAG, TEST_TAG, TIMEOUT_DESCRIPTOR};

/// Outcome of classifying a class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Applicability {
    /// Has JUnit 4 test methods and no timeout rule
    Applicable,
    /// A valid test class shape, but no test methods
    NoTests,
    /// Already declares or inherits a timeout rule
    ExistentTimeout,
    /// Not something JUnit 4 could instantiate as a test class
    NotTestClass,
}

impl Applicability {
    pub fn should_transform(&self) -> bool {
        matches!(self, Applicability::Applicable)
    }

    pub fn message(&self) -> &'static str {
        match self {
            Applicability::Applicable => "Class has junit4 test methods but no timeout rule",
            Applicability::NoTests => "Class does not have any junit4 test methods",
            Applicability::ExistentTimeout => "Class already has a timeout rule, no transform needed",
            Applicability::NotTestClass => "Not a valid Junit4 test class",
        }
    }
}

impl fmt::Display for Applicability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Applicability::Applicable => "APPLICABLE",
            Applicability::NoTests => "NO_TESTS",
            Applicability::ExistentTimeout => "EXISTENT_TIMEOUT",
            Applicability::NotTestClass => "NOT_TESTCLASS",
        };
        f.write_str(name)
    }
}

/// Lookup of classes by internal name, used to see inherited members
pub trait ClassHierarchy: Send + Sync {
    fn lookup(&self, name: &str) -> Option<Arc<ClassFile>>;
}

/// A hierarchy that knows no classes; only a class's own members are inspected
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHierarchy;

impl ClassHierarchy for NoHierarchy {
    fn lookup(&self, _name: &str) -> Option<Arc<ClassFile>> {
        None
    }
}

impl ClassHierarchy for HashMap<String, Arc<ClassFile>> {
    fn lookup(&self, name: &str) -> Option<Arc<ClassFile>> {
        self.get(name).cloned()
    }
}

pub struct Classifier<'h> {
    hierarchy: &'h dyn ClassHierarchy,
}

impl Default for Classifier<'static> {
    fn default() -> Self {
        Self::new()
    }
}

impl Classifier<'static> {
    pub fn new() -> Self {
        Self { hierarchy: &NoHierarchy }
    }
}

impl<'h> Classifier<'h> {
    pub fn with_hierarchy(hierarchy: &'h dyn ClassHierarchy) -> Self {
        Self { hierarchy }
    }

    /// Classify `class`. Unreadable constant pool references make a class `NotTestClass`.
    pub fn classify(&self, class: &ClassFile) -> Applicability {
        match self.decide(class) {
            Ok(applicability) => applicability,
            Err(e) => {
                log::warn!("Treating unreadable class as not a test class: {}", e);
                Applicability::NotTestClass
            }
        }
    }

    fn decide(&self, class: &ClassFile) -> ClassFileResult<Applicability> {
        let name = class.name()?;
        if !is_valid_test_class(class)? {
            log::debug!("{}: not a valid test class", name);
            return Ok(Applicability::NotTestClass);
        }
        let supers = self.superclasses(class)?;
        let lineage: Vec<&ClassFile> = std::iter::once(class).chain(supers.iter().map(Arc::as_ref)).collect();

        for c in &lineage {
            if has_timeout_rule_field(c)? {
                log::debug!("{}: timeout rule found in {}", name, c.name()?);
                return Ok(Applicability::ExistentTimeout);
            }
        }
        for c in &lineage {
            for method in &c.methods {
                if method.has_tag(&c.constant_pool, TEST_TAG)? {
                    return Ok(Applicability::Applicable);
                }
            }
        }
        Ok(Applicability::NoTests)
    }

    /// Resolvable superclasses, nearest first, stopping below `java/lang/Object`
    fn superclasses(&self, class: &ClassFile) -> ClassFileResult<Vec<Arc<ClassFile>>> {
        let mut visited: HashSet<String> = HashSet::new();
        visited.insert(class.name()?.to_string());
        let mut chain = Vec::new();
        let mut next = class.super_name()?.map(str::to_string);
        while let Some(super_name) = next {
            if super_name == JAVA_LANG_OBJECT || chain.len() >= MAX_HIERARCHY_DEPTH {
                break;
            }
            if !visited.insert(super_name.clone()) {
                log::warn!("Superclass cycle through {}", super_name);
                break;
            }
            let Some(resolved) = self.hierarchy.lookup(&super_name) else {
                log::debug!("Superclass {} not on the class path", super_name);
                break;
            };
            next = resolved.super_name()?.map(str::to_string);
            chain.push(resolved);
        }
        Ok(chain)
    }
}

/// Classify with only the class's own members in view
pub fn classify(class: &ClassFile) -> Applicability {
    Classifier::new().classify(class)
}

fn is_valid_test_class(class: &ClassFile) -> ClassFileResult<bool> {
    let excluded = access_flags::ACC_INTERFACE
        | access_flags::ACC_ANNOTATION
        | access_flags::ACC_ENUM
        | access_flags::ACC_ABSTRACT
        | access_flags::ACC_MODULE;
    if !has(class.declared_access_flags()?, access_flags::ACC_PUBLIC) || class.access_flags & excluded != 0 {
        return Ok(false);
    }
    if class.is_inner_instance_class()? {
        return Ok(false);
    }
    let mut public_constructors = class.constructors().filter(|m| m.is_public());
    let (Some(only), None) = (public_constructors.next(), public_constructors.next()) else {
        return Ok(false);
    };
    let shape = descriptor::parse_method(only.descriptor(&class.constant_pool)?)?;
    Ok(shape.params.is_empty())
}

fn has_timeout_rule_field(class: &ClassFile) -> ClassFileResult<bool> {
    for field in &class.fields {
        if !field.is_public() || has(field.access_flags, access_flags::ACC_STATIC) {
            continue;
        }
        if field.descriptor(&class.constant_pool)? != TIMEOUT_DESCRIPTOR {
            continue;
        }
        if field.has_tag(&class.constant_pool, RULE_TAG)? {
            return Ok(true);
        }
    }
    Ok(false)
}
