//! Assembles class files from names and symbolic instructions
//!
//! Used to synthesize fixtures and small helper classes; everything goes through the
//! same constant pool and `Code` encoder as rewritten classes.

use super::annotation::marker_annotations;
use super::attribute::{AttributeInfo, InnerClassEntry};
use super::class::ClassFile;
use super::code::MethodBody;
use super::defs::{attribute_names, CONSTRUCTOR_METHOD_NAME, JAVA_LANG_OBJECT};
use super::error::ClassFileResult;
use super::field::FieldInfo;
use super::flag::access_flags::*;
use super::insn::{Insn, InsnList};
use super::method::MethodInfo;
use super::opcodes::RETURN;

struct MemberSpec {
    access: u16,
    name: String,
    descriptor: String,
    tags: Vec<String>,
    body: Option<MethodBody>,
}

struct InnerSpec {
    inner: String,
    outer: Option<String>,
    simple_name: Option<String>,
    access: u16,
}

pub struct ClassBuilder {
    name: String,
    super_name: Option<String>,
    access: u16,
    major_version: u16,
    interfaces: Vec<String>,
    fields: Vec<MemberSpec>,
    methods: Vec<MemberSpec>,
    inner_classes: Vec<InnerSpec>,
}

impl ClassBuilder {
    /// A public class extending `java.lang.Object`
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            super_name: Some(JAVA_LANG_OBJECT.to_string()),
            access: ACC_PUBLIC | ACC_SUPER,
            major_version: super::defs::major_versions::JAVA_8,
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            inner_classes: Vec::new(),
        }
    }

    pub fn access(mut self, access: u16) -> Self {
        self.access = access;
        self
    }

    pub fn super_name(mut self, super_name: impl Into<String>) -> Self {
        self.super_name = Some(super_name.into());
        self
    }

    pub fn version(mut self, major_version: u16) -> Self {
        self.major_version = major_version;
        self
    }

    pub fn interface(mut self, name: impl Into<String>) -> Self {
        self.interfaces.push(name.into());
        self
    }

    pub fn field(mut self, access: u16, name: &str, descriptor: &str, tags: &[&str]) -> Self {
        self.fields.push(MemberSpec {
            access,
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            body: None,
        });
        self
    }

    /// Add a method; `body` is `None` for abstract or native methods
    pub fn method(mut self, access: u16, name: &str, descriptor: &str, tags: &[&str], body: Option<MethodBody>) -> Self {
        self.methods.push(MemberSpec {
            access,
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            body,
        });
        self
    }

    /// `<init>()V` that only calls the superclass's no-arg constructor
    pub fn default_constructor(self, access: u16) -> Self {
        let owner = self.super_name.clone().unwrap_or_else(|| JAVA_LANG_OBJECT.to_string());
        let insns: InsnList = vec![
            Insn::aload(0),
            Insn::invoke_special(&owner, CONSTRUCTOR_METHOD_NAME, "()V"),
            Insn::simple(RETURN),
        ]
        .into_iter()
        .collect();
        self.method(access, CONSTRUCTOR_METHOD_NAME, "()V", &[], Some(MethodBody::new(insns)))
    }

    /// `void name()` with an empty body carrying the given annotation tags
    pub fn void_method(self, access: u16, name: &str, tags: &[&str]) -> Self {
        let insns: InsnList = std::iter::once(Insn::simple(RETURN)).collect();
        self.method(access, name, "()V", tags, Some(MethodBody::new(insns)))
    }

    /// Record an `InnerClasses` entry
    pub fn inner_class(mut self, inner: &str, outer: Option<&str>, simple_name: Option<&str>, access: u16) -> Self {
        self.inner_classes.push(InnerSpec {
            inner: inner.to_string(),
            outer: outer.map(str::to_string),
            simple_name: simple_name.map(str::to_string),
            access,
        });
        self
    }

    pub fn build(self) -> ClassFileResult<ClassFile> {
        let mut class = ClassFile::new();
        class.major_version = self.major_version;
        class.access_flags = self.access;
        let pool = &mut class.constant_pool;
        class.this_class = pool.add_class(&self.name)?;
        if let Some(super_name) = &self.super_name {
            class.super_class = pool.add_class(super_name)?;
        }
        for interface in &self.interfaces {
            class.interfaces.push(pool.add_class(interface)?);
        }

        for spec in &self.fields {
            let mut field = FieldInfo::new(spec.access, pool.add_utf8(&spec.name)?, pool.add_utf8(&spec.descriptor)?);
            if !spec.tags.is_empty() {
                let tags: Vec<&str> = spec.tags.iter().map(String::as_str).collect();
                field.attributes.push(marker_annotations(pool, &tags)?);
            }
            class.fields.push(field);
        }

        for spec in self.methods {
            let mut method = MethodInfo::new(spec.access, pool.add_utf8(&spec.name)?, pool.add_utf8(&spec.descriptor)?);
            if let Some(mut body) = spec.body {
                method.set_body(&mut body, pool)?;
            }
            if !spec.tags.is_empty() {
                let tags: Vec<&str> = spec.tags.iter().map(String::as_str).collect();
                method.attributes.push(marker_annotations(pool, &tags)?);
            }
            class.methods.push(method);
        }

        if !self.inner_classes.is_empty() {
            let mut entries = Vec::with_capacity(self.inner_classes.len());
            for inner in &self.inner_classes {
                entries.push(InnerClassEntry {
                    inner_class_info_index: pool.add_class(&inner.inner)?,
                    outer_class_info_index: match &inner.outer {
                        Some(outer) => pool.add_class(outer)?,
                        None => 0,
                    },
                    inner_name_index: match &inner.simple_name {
                        Some(simple) => pool.add_utf8(simple)?,
                        None => 0,
                    },
                    inner_class_access_flags: inner.access,
                });
            }
            let name_index = pool.add_utf8(attribute_names::INNER_CLASSES)?;
            class.attributes.push(AttributeInfo::new(name_index, InnerClassEntry::to_bytes(&entries)));
        }
        Ok(class)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_built_class_parses_back() {
        let class = ClassBuilder::new("com/example/Sample")
            .field(ACC_PRIVATE, "count", "I", &[])
            .default_constructor(ACC_PUBLIC)
            .void_method(ACC_PUBLIC, "works", &["Lorg/junit/Test;"])
            .inner_class("com/example/Sample$Inner", Some("com/example/Sample"), Some("Inner"), ACC_PUBLIC)
            .build()
            .unwrap();
        let parsed = ClassFile::parse(&class.to_bytes()).unwrap();
        assert_eq!(parsed.name().unwrap(), "com/example/Sample");
        assert_eq!(parsed.super_name().unwrap(), Some(JAVA_LANG_OBJECT));
        assert_eq!(parsed.constructors().count(), 1);
        assert_eq!(parsed.inner_classes().unwrap().len(), 1);
        assert!(!parsed.is_inner_instance_class().unwrap());
        let works = &parsed.methods[1];
        assert!(works.has_tag(&parsed.constant_pool, "Lorg/junit/Test;").unwrap());
        let body = parsed.methods[0].body(&parsed.constant_pool).unwrap().unwrap();
        assert_eq!(body.max_stack, 1);
        assert_eq!(body.max_locals, 1);
    }

    #[test]
    fn test_member_class_without_static_is_inner_instance() {
        let class = ClassBuilder::new("Outer$Inner")
            .inner_class("Outer$Inner", Some("Outer"), Some("Inner"), ACC_PUBLIC)
            .build()
            .unwrap();
        assert!(class.is_inner_instance_class().unwrap());
        let nested = ClassBuilder::new("Outer$Nested")
            .inner_class("Outer$Nested", Some("Outer"), Some("Nested"), ACC_PUBLIC | ACC_STATIC)
            .build()
            .unwrap();
        assert!(!nested.is_inner_instance_class().unwrap());
    }
}
