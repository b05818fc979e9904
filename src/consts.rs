//! JUnit 4 names the engine looks for and emits

/// Internal name of `org.junit.rules.Timeout`
pub const TIMEOUT_CLASS: &str = "org/junit/rules/Timeout";
/// Field descriptor of a `Timeout` value
pub const TIMEOUT_DESCRIPTOR: &str = "Lorg/junit/rules/Timeout;";
/// `Timeout(long, TimeUnit)`
pub const TIMEOUT_CONSTRUCTOR_DESCRIPTOR: &str = "(JLjava/util/concurrent/TimeUnit;)V";

pub const TIME_UNIT_CLASS: &str = "java/util/concurrent/TimeUnit";
pub const TIME_UNIT_DESCRIPTOR: &str = "Ljava/util/concurrent/TimeUnit;";
pub const TIME_UNIT_MILLISECONDS: &str = "MILLISECONDS";

/// Annotation tag of `@org.junit.Rule`
pub const RULE_TAG: &str = "Lorg/junit/Rule;";
/// Annotation tag of `@org.junit.Test`
pub const TEST_TAG: &str = "Lorg/junit/Test;";

/// Name of the injected rule field; collisions get a numeric suffix
pub const TIMEOUT_FIELD_BASE_NAME: &str = "globalTimeout";
/// Largest suffix tried before giving up
pub const TIMEOUT_FIELD_MAX_SUFFIX: u32 = 100;

/// Upper bound on superclass hops when collecting inherited members
pub const MAX_HIERARCHY_DEPTH: usize = 256;
