//! Generic classfile-specific definitions

/// Header of Java class file (magic number)
pub const MAGIC: u32 = 0xCAFEBABE;

/// Name of a constructor
pub const CONSTRUCTOR_METHOD_NAME: &str = "<init>";

/// Name of a static initializer
pub const STATIC_INITIALIZER_METHOD_NAME: &str = "<clinit>";

/// Root of every class hierarchy
pub const JAVA_LANG_OBJECT: &str = "java/lang/Object";

/// JVM version constants
pub mod major_versions {
    pub const JAVA_1_1: u16 = 45;
    pub const JAVA_5_0: u16 = 49;
    pub const JAVA_6_0: u16 = 50;
    pub const JAVA_7: u16 = 51;
    pub const JAVA_8: u16 = 52;
    pub const JAVA_11: u16 = 55;
    pub const JAVA_17: u16 = 61;
    pub const JAVA_21: u16 = 65;
}

/// Oldest class file major version the reader accepts
pub const MIN_SUPPORTED_MAJOR: u16 = major_versions::JAVA_1_1;
/// Newest class file major version the reader accepts
pub const MAX_SUPPORTED_MAJOR: u16 = major_versions::JAVA_21;

/// Attribute names the engine reads or writes
pub mod attribute_names {
    pub const CODE: &str = "Code";
    pub const LINE_NUMBER_TABLE: &str = "LineNumberTable";
    pub const LOCAL_VARIABLE_TABLE: &str = "LocalVariableTable";
    pub const LOCAL_VARIABLE_TYPE_TABLE: &str = "LocalVariableTypeTable";
    pub const STACK_MAP_TABLE: &str = "StackMapTable";
    pub const INNER_CLASSES: &str = "InnerClasses";
    pub const BOOTSTRAP_METHODS: &str = "BootstrapMethods";
    pub const RUNTIME_VISIBLE_ANNOTATIONS: &str = "RuntimeVisibleAnnotations";
    pub const RUNTIME_INVISIBLE_ANNOTATIONS: &str = "RuntimeInvisibleAnnotations";
}
