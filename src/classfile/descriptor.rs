//! Field and method descriptor parsing
//!
//! Only what stack and local sizing needs: the slot width of each parameter and of the
//! return value.

use super::error::{ClassFileError, ClassFileResult};

/// Parsed shape of a method descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodShape {
    /// Slot width of each parameter, in declaration order
    pub params: Vec<u16>,
    /// Slot width of the return value (0 for `V`)
    pub ret: u16,
}

impl MethodShape {
    pub fn arg_slots(&self) -> u16 {
        self.params.iter().sum()
    }
}

/// Parse one field type starting at `pos`; returns its slot width and the next position.
fn field_type(desc: &[u8], pos: usize) -> Option<(u16, usize)> {
    let mut i = pos;
    let mut array = false;
    while desc.get(i) == Some(&b'[') {
        array = true;
        i += 1;
    }
    let width = match desc.get(i)? {
        b'J' | b'D' => 2,
        b'B' | b'C' | b'F' | b'I' | b'S' | b'Z' => 1,
        b'L' => {
            let semi = desc[i..].iter().position(|b| *b == b';')?;
            if semi == 1 {
                return None;
            }
            i += semi;
            1
        }
        _ => return None,
    };
    Some((if array { 1 } else { width }, i + 1))
}

/// Slot width of a value with the given field descriptor
pub fn field_slots(descriptor: &str) -> ClassFileResult<u16> {
    match field_type(descriptor.as_bytes(), 0) {
        Some((width, end)) if end == descriptor.len() => Ok(width),
        _ => Err(ClassFileError::InvalidDescriptor(descriptor.to_string())),
    }
}

pub fn parse_method(descriptor: &str) -> ClassFileResult<MethodShape> {
    let invalid = || ClassFileError::InvalidDescriptor(descriptor.to_string());
    let bytes = descriptor.as_bytes();
    if bytes.first() != Some(&b'(') {
        return Err(invalid());
    }
    let mut params = Vec::new();
    let mut pos = 1;
    loop {
        match bytes.get(pos) {
            Some(b')') => break,
            Some(_) => {
                let (width, next) = field_type(bytes, pos).ok_or_else(invalid)?;
                params.push(width);
                pos = next;
            }
            None => return Err(invalid()),
        }
    }
    let ret_desc = &descriptor[pos + 1..];
    let ret = if ret_desc == "V" { 0 } else { field_slots(ret_desc).map_err(|_| invalid())? };
    Ok(MethodShape { params, ret })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_shapes() {
        let shape = parse_method("(JLjava/util/concurrent/TimeUnit;)V").unwrap();
        assert_eq!(shape.params, vec![2, 1]);
        assert_eq!(shape.ret, 0);
        assert_eq!(shape.arg_slots(), 3);

        let shape = parse_method("([JD[[Ljava/lang/String;I)J").unwrap();
        assert_eq!(shape.params, vec![1, 2, 1, 1]);
        assert_eq!(shape.ret, 2);
        assert_eq!(parse_method("()V").unwrap().arg_slots(), 0);
    }

    #[test]
    fn test_invalid_descriptors() {
        assert!(parse_method("V").is_err());
        assert!(parse_method("(L;)V").is_err());
        assert!(parse_method("(I").is_err());
        assert!(parse_method("(I)VV").is_err());
        assert!(field_slots("Ljava/lang/String").is_err());
        assert_eq!(field_slots("Lorg/junit/rules/Timeout;").unwrap(), 1);
    }
}
