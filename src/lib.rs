//! Timeout enforcer for JUnit 4 test classes
//!
//! Rewrites compiled JVM class files so that every JUnit 4 test class carries a
//! class-wide `@Rule public Timeout` field.
//!
//! ## Architecture
//!
//! - **classfile**: class file model, `Code` attribute decoding/encoding, frame sizing and
//!   structural verification
//! - **engine**: the classifier and the rewriter, pure functions over parsed classes
//! - **policy**: named timeouts with Java time units
//! - **classpath**: directory-backed superclass lookup
//! - **driver**: discovers, classifies and rewrites class directories in parallel
//! - **bin**: command-line interface
//!
//! ## Flow
//!
//! ```text
//! .class bytes → ClassFile::parse → classify → apply → verify → ClassFile::to_bytes
//! ```

pub mod classfile;
pub mod classpath;
pub mod config;
pub mod consts;
pub mod driver;
pub mod engine;
pub mod error;
pub mod policy;

pub use config::Config;
pub use engine::{apply, classify, Applicability};
pub use error::{Error, Result};

use classfile::ClassFile;

/// Parse class file bytes
pub fn parse_class(bytes: &[u8]) -> Result<ClassFile> {
    ClassFile::parse(bytes).map_err(|e| Error::malformed("<bytes>", e))
}

/// Classify class file bytes, looking only at the class's own members
pub fn classify_bytes(bytes: &[u8]) -> Result<Applicability> {
    Ok(classify(&parse_class(bytes)?))
}

/// Add a timeout rule of `duration_millis` to a class given as bytes.
///
/// Unlike [`apply`], this re-checks applicability and refuses anything that is not
/// [`Applicability::Applicable`]. The rewritten class is verified before it is
/// serialized.
pub fn transform_bytes(bytes: &[u8], duration_millis: u64) -> Result<Vec<u8>> {
    let class = parse_class(bytes)?;
    let class_name = class.name().map_err(|e| Error::malformed("<bytes>", e))?.to_string();
    let applicability = classify(&class);
    if !applicability.should_transform() {
        return Err(Error::NotApplicable { class: class_name, applicability });
    }
    let class = apply(class, duration_millis)?;
    classfile::verify::verify(&class).map_err(|source| Error::Verify { class: class_name, source })?;
    log::debug!("Transformed {}", class.name().unwrap_or("<unnamed>"));
    Ok(class.to_bytes())
}
