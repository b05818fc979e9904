//! Runtime annotation attributes
//!
//! Members are tagged by the type descriptors of their annotations. Element values are
//! walked only to find where each annotation ends; their contents are never interpreted.

use super::attribute::AttributeInfo;
use super::constpool::ConstantPool;
use super::defs::attribute_names;
use super::error::{ClassFileError, ClassFileResult};
use super::reader::ByteReader;

fn invalid(reason: impl Into<String>) -> ClassFileError {
    ClassFileError::InvalidAttribute {
        name: attribute_names::RUNTIME_VISIBLE_ANNOTATIONS.to_string(),
        reason: reason.into(),
    }
}

fn skip_element_value(reader: &mut ByteReader<'_>, depth: usize) -> ClassFileResult<()> {
    if depth > 64 {
        return Err(invalid("element values nested too deeply"));
    }
    let tag = reader.read_u1()?;
    match tag {
        b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z' | b's' | b'c' => reader.skip(2),
        b'e' => reader.skip(4),
        b'@' => skip_annotation(reader, depth + 1).map(|_| ()),
        b'[' => {
            let count = reader.read_u2()?;
            for _ in 0..count {
                skip_element_value(reader, depth + 1)?;
            }
            Ok(())
        }
        other => Err(invalid(format!("unknown element value tag '{}'", other as char))),
    }
}

/// Consume one `annotation` structure and return its type index
fn skip_annotation(reader: &mut ByteReader<'_>, depth: usize) -> ClassFileResult<u16> {
    let type_index = reader.read_u2()?;
    let pairs = reader.read_u2()?;
    for _ in 0..pairs {
        reader.skip(2)?;
        skip_element_value(reader, depth)?;
    }
    Ok(type_index)
}

/// Type descriptors of the annotations stored in a `Runtime(In)VisibleAnnotations` payload
pub fn annotation_types(info: &[u8], constant_pool: &ConstantPool) -> ClassFileResult<Vec<String>> {
    let mut reader = ByteReader::new(info);
    let count = reader.read_u2()?;
    let mut types = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let type_index = skip_annotation(&mut reader, 0)?;
        types.push(constant_pool.utf8(type_index)?.to_string());
    }
    if !reader.is_empty() {
        return Err(invalid(format!("{} trailing bytes", reader.remaining())));
    }
    Ok(types)
}

/// Annotation type descriptors carried by a member's `RuntimeVisibleAnnotations`
///
/// Invisible annotations are not reflected at run time, so JUnit never sees them.
pub fn tags_of(attributes: &[AttributeInfo], constant_pool: &ConstantPool) -> ClassFileResult<Vec<String>> {
    let mut tags = Vec::new();
    for attribute in attributes {
        if attribute.name(constant_pool)? == attribute_names::RUNTIME_VISIBLE_ANNOTATIONS {
            tags.extend(annotation_types(&attribute.info, constant_pool)?);
        }
    }
    Ok(tags)
}

/// A `RuntimeVisibleAnnotations` attribute holding element-less annotations of the given types
pub fn marker_annotations(
    constant_pool: &mut ConstantPool,
    descriptors: &[&str],
) -> ClassFileResult<AttributeInfo> {
    let name_index = constant_pool.add_utf8(attribute_names::RUNTIME_VISIBLE_ANNOTATIONS)?;
    let mut info = Vec::with_capacity(2 + descriptors.len() * 4);
    info.extend_from_slice(&(descriptors.len() as u16).to_be_bytes());
    for descriptor in descriptors {
        let type_index = constant_pool.add_utf8(descriptor)?;
        info.extend_from_slice(&type_index.to_be_bytes());
        info.extend_from_slice(&0u16.to_be_bytes());
    }
    Ok(AttributeInfo::new(name_index, info))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_annotation_is_readable() {
        let mut pool = ConstantPool::new();
        let attr = marker_annotations(&mut pool, &["Lorg/junit/Rule;"]).unwrap();
        assert_eq!(attr.info.len(), 6);
        let tags = tags_of(&[attr], &pool).unwrap();
        assert_eq!(tags, vec!["Lorg/junit/Rule;".to_string()]);
    }

    #[test]
    fn test_invisible_annotations_are_not_tags() {
        let mut pool = ConstantPool::new();
        let visible = marker_annotations(&mut pool, &["Lorg/junit/Rule;"]).unwrap();
        let hidden = marker_annotations(&mut pool, &["Lorg/junit/Test;"]).unwrap();
        let hidden = AttributeInfo::new(
            pool.add_utf8(attribute_names::RUNTIME_INVISIBLE_ANNOTATIONS).unwrap(),
            hidden.info,
        );
        let tags = tags_of(&[hidden.clone()], &pool).unwrap();
        assert!(tags.is_empty());
        let tags = tags_of(&[hidden, visible], &pool).unwrap();
        assert_eq!(tags, vec!["Lorg/junit/Rule;".to_string()]);
    }

    #[test]
    fn test_skips_element_values() {
        // @Test(timeout = 5L, expected = Foo.class) followed by @Ignore
        let mut pool = ConstantPool::new();
        let test = pool.add_utf8("Lorg/junit/Test;").unwrap();
        let timeout = pool.add_utf8("timeout").unwrap();
        let five = pool.add_long(5).unwrap();
        let expected = pool.add_utf8("expected").unwrap();
        let foo = pool.add_utf8("LFoo;").unwrap();
        let ignore = pool.add_utf8("Lorg/junit/Ignore;").unwrap();

        let mut info = vec![0, 2];
        info.extend_from_slice(&test.to_be_bytes());
        info.extend_from_slice(&[0, 2]);
        info.extend_from_slice(&timeout.to_be_bytes());
        info.push(b'J');
        info.extend_from_slice(&five.to_be_bytes());
        info.extend_from_slice(&expected.to_be_bytes());
        info.push(b'[');
        info.extend_from_slice(&[0, 1]);
        info.push(b'c');
        info.extend_from_slice(&foo.to_be_bytes());
        info.extend_from_slice(&ignore.to_be_bytes());
        info.extend_from_slice(&[0, 0]);

        let types = annotation_types(&info, &pool).unwrap();
        assert_eq!(types, vec!["Lorg/junit/Test;", "Lorg/junit/Ignore;"]);
    }

    #[test]
    fn test_unknown_tag_rejected() {
        let mut pool = ConstantPool::new();
        let ty = pool.add_utf8("LA;").unwrap();
        let name = pool.add_utf8("v").unwrap();
        let mut info = vec![0, 1];
        info.extend_from_slice(&ty.to_be_bytes());
        info.extend_from_slice(&[0, 1]);
        info.extend_from_slice(&name.to_be_bytes());
        info.extend_from_slice(&[b'x', 0, 0]);
        assert!(annotation_types(&info, &pool).is_err());
    }
}
