//! Injecting a `@Rule Timeout` field and initializing it in constructors

use crate::classfile::annotation::marker_annotations;
use crate::classfile::flag::access_flags;
use crate::classfile::opcodes::{DUP, INVOKESPECIAL, NEW};
use crate::classfile::{ClassFile, FieldInfo, Insn, InsnList};
use crate::consts::{
    RULE_TAG, TIMEOUT_CLASS, TIMEOUT_CONSTRUCTOR_DESCRIPTOR, TIMEOUT_DESCRIPTOR, TIMEOUT_FIELD_BASE_NAME,
    TIMEOUT_FIELD_MAX_SUFFIX, TIME_UNIT_CLASS, TIME_UNIT_DESCRIPTOR, TIME_UNIT_MILLISECONDS,
};
use crate::error::{Error, Result};

/// What a rewrite did to a class
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RewriteReport {
    /// Name of the injected field
    pub field_name: String,
    /// Descriptors of constructors that received the initializer
    pub instrumented: Vec<String>,
    /// Descriptors of constructors that delegate to another constructor of the class
    pub delegating: Vec<String>,
    /// Descriptors of constructors without a recognizable superclass constructor call
    pub skipped: Vec<String>,
}

/// How a constructor hands off to another constructor before touching `this`
#[derive(Debug, Clone, PartialEq, Eq)]
enum Chaining {
    /// `super(...)`, at this instruction index
    Super(usize),
    /// `this(...)`
    Delegation,
    /// An `<init>` on the receiver whose owner is neither the class nor its superclass
    Foreign(String),
    Missing,
}

/// Find the constructor call that initializes the receiver. Each `new` is paired with
/// the next `invokespecial <init>`, so objects created while evaluating the arguments
/// are not mistaken for it.
fn find_chaining_call(insns: &InsnList, class_name: &str, super_name: Option<&str>) -> Chaining {
    let mut pending_new = 0usize;
    for (index, insn) in insns.iter().enumerate() {
        match insn {
            Insn::Type { opcode: NEW, .. } => pending_new += 1,
            Insn::Invoke { opcode: INVOKESPECIAL, method, .. } if insn.is_constructor_call() => {
                if pending_new > 0 {
                    pending_new -= 1;
                    continue;
                }
                return if method.owner == class_name {
                    Chaining::Delegation
                } else if Some(method.owner.as_str()) == super_name {
                    Chaining::Super(index)
                } else {
                    Chaining::Foreign(method.owner.clone())
                };
            }
            _ => {}
        }
    }
    Chaining::Missing
}

/// First of `globalTimeout`, `globalTimeout1` .. `globalTimeout100` not among `existing`
pub fn allocate_field_name(existing: &[&str]) -> Option<String> {
    std::iter::once(TIMEOUT_FIELD_BASE_NAME.to_string())
        .chain((1..=TIMEOUT_FIELD_MAX_SUFFIX).map(|n| format!("{}{}", TIMEOUT_FIELD_BASE_NAME, n)))
        .find(|candidate| !existing.contains(&candidate.as_str()))
}

/// Adds a class-wide timeout rule of a fixed duration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rewriter {
    duration_millis: i64,
}

impl Rewriter {
    pub fn new(duration_millis: u64) -> Result<Self> {
        let duration_millis =
            i64::try_from(duration_millis).map_err(|_| Error::InvalidDuration { millis: duration_millis })?;
        Ok(Self { duration_millis })
    }

    pub fn duration_millis(&self) -> i64 {
        self.duration_millis
    }

    fn initializer(&self, class_name: &str, field_name: &str) -> Vec<Insn> {
        vec![
            Insn::aload(0),
            Insn::new_object(TIMEOUT_CLASS),
            Insn::simple(DUP),
            Insn::ldc_long(self.duration_millis),
            Insn::get_static(TIME_UNIT_CLASS, TIME_UNIT_MILLISECONDS, TIME_UNIT_DESCRIPTOR),
            Insn::invoke_special(TIMEOUT_CLASS, "<init>", TIMEOUT_CONSTRUCTOR_DESCRIPTOR),
            Insn::put_field(class_name, field_name, TIMEOUT_DESCRIPTOR),
        ]
    }

    /// Rewrite `class` in place. Callers are expected to have classified it as applicable.
    pub fn rewrite(&self, class: &mut ClassFile) -> Result<RewriteReport> {
        let class_name = class.name().map_err(|e| Error::malformed("<unnamed>", e))?.to_string();
        let malformed = |e| Error::malformed(class_name.clone(), e);
        let super_name = class.super_name().map_err(malformed)?.map(str::to_string);

        let existing = class.field_names().map_err(malformed)?;
        let field_name =
            allocate_field_name(&existing).ok_or_else(|| Error::NameExhaustion { class: class_name.clone() })?;

        let ClassFile { constant_pool, fields, methods, .. } = class;
        let mut field = FieldInfo::new(
            access_flags::ACC_PUBLIC,
            constant_pool.add_utf8(&field_name).map_err(malformed)?,
            constant_pool.add_utf8(TIMEOUT_DESCRIPTOR).map_err(malformed)?,
        );
        field.attributes.push(marker_annotations(constant_pool, &[RULE_TAG]).map_err(malformed)?);
        fields.push(field);

        let mut report = RewriteReport { field_name: field_name.clone(), ..RewriteReport::default() };
        for method in methods.iter_mut() {
            if !method.is_constructor(constant_pool) {
                continue;
            }
            let descriptor = method.descriptor(constant_pool).map_err(malformed)?.to_string();
            let Some(mut body) = method.body(constant_pool).map_err(malformed)? else {
                continue;
            };
            match find_chaining_call(&body.insns, &class_name, super_name.as_deref()) {
                Chaining::Super(index) => {
                    body.insns.insert_after(index, self.initializer(&class_name, &field_name));
                    method.set_body(&mut body, constant_pool).map_err(malformed)?;
                    log::debug!("{}: initialized {} in <init>{}", class_name, field_name, descriptor);
                    report.instrumented.push(descriptor);
                }
                Chaining::Delegation => {
                    log::debug!("{}: <init>{} delegates to this(...), left unchanged", class_name, descriptor);
                    report.delegating.push(descriptor);
                }
                Chaining::Foreign(owner) => {
                    log::warn!(
                        "{}: <init>{} initializes the receiver through {}, left unchanged",
                        class_name,
                        descriptor,
                        owner
                    );
                    report.skipped.push(descriptor);
                }
                Chaining::Missing => {
                    log::warn!("{}: no superclass constructor call found in <init>{}", class_name, descriptor);
                    report.skipped.push(descriptor);
                }
            }
        }
        Ok(report)
    }
}

/// Rewrite an applicable class so every super-calling constructor installs a timeout rule
/// of `duration_millis` milliseconds
pub fn apply(class: ClassFile, duration_millis: u64) -> Result<ClassFile> {
    apply_with_report(class, duration_millis).map(|(class, _)| class)
}

pub fn apply_with_report(mut class: ClassFile, duration_millis: u64) -> Result<(ClassFile, RewriteReport)> {
    let report = Rewriter::new(duration_millis)?.rewrite(&mut class)?;
    Ok((class, report))
}
