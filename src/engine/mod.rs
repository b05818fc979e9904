//! The class transformation engine
//!
//! [`classify`] decides whether a class is a JUnit 4 test class lacking a timeout rule;
//! [`apply`] adds one. Both work on owned, in-memory [`ClassFile`](crate::classfile::ClassFile)
//! values and never touch the file system.

pub mod classify;
pub mod rewrite;

pub use classify::{classify, Applicability, ClassHierarchy, Classifier, NoHierarchy};
pub use rewrite::{allocate_field_name, apply, apply_with_report, RewriteReport, Rewriter};
