//! Access flags for classes, fields, methods and inner-class entries

pub mod access_flags {
    pub const ACC_PUBLIC: u16 = 0x0001;
    pub const ACC_PRIVATE: u16 = 0x0002;
    pub const ACC_PROTECTED: u16 = 0x0004;
    pub const ACC_STATIC: u16 = 0x0008;
    pub const ACC_FINAL: u16 = 0x0010;
    pub const ACC_SUPER: u16 = 0x0020;
    pub const ACC_SYNCHRONIZED: u16 = 0x0020;
    pub const ACC_VOLATILE: u16 = 0x0040;
    pub const ACC_BRIDGE: u16 = 0x0040;
    pub const ACC_TRANSIENT: u16 = 0x0080;
    pub const ACC_VARARGS: u16 = 0x0080;
    pub const ACC_NATIVE: u16 = 0x0100;
    pub const ACC_INTERFACE: u16 = 0x0200;
    pub const ACC_ABSTRACT: u16 = 0x0400;
    pub const ACC_STRICT: u16 = 0x0800;
    pub const ACC_SYNTHETIC: u16 = 0x1000;
    pub const ACC_ANNOTATION: u16 = 0x2000;
    pub const ACC_ENUM: u16 = 0x4000;
    pub const ACC_MODULE: u16 = 0x8000;

    /// Visibility bits; a well-formed member sets at most one of them.
    pub const VISIBILITY_MASK: u16 = ACC_PUBLIC | ACC_PRIVATE | ACC_PROTECTED;
}

/// Returns true when every bit of `flag` is set in `flags`.
#[inline]
pub fn has(flags: u16, flag: u16) -> bool {
    flags & flag == flag
}

#[cfg(test)]
mod tests {
    use super::access_flags::*;
    use super::has;

    #[test]
    fn test_has_flag() {
        let flags = ACC_PUBLIC | ACC_STATIC;
        assert!(has(flags, ACC_PUBLIC));
        assert!(has(flags, ACC_PUBLIC | ACC_STATIC));
        assert!(!has(flags, ACC_PUBLIC | ACC_FINAL));
        assert_eq!((flags & VISIBILITY_MASK).count_ones(), 1);
    }
}
