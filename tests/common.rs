// Shared fixtures: synthetic versions of typical javac output for JUnit 4 test classes
#![allow(dead_code)]

use timeout_enforcer::classfile::attribute::{find_attribute, AttributeInfo};
use timeout_enforcer::classfile::flag::access_flags::*;
use timeout_enforcer::classfile::frame::{FrameKind, StackMapFrame, VerificationType};
use timeout_enforcer::classfile::opcodes::*;
use timeout_enforcer::classfile::{
    ClassBuilder, ClassFile, ConstValue, Insn, InsnList, LineNumber, MethodBody, MethodInfo, TryCatchBlock,
};
use timeout_enforcer::consts::{RULE_TAG, TEST_TAG, TIMEOUT_CLASS, TIMEOUT_DESCRIPTOR};

pub const PACKAGE: &str = "com/example/samples";
pub const OBJECT: &str = "java/lang/Object";

pub fn init_logging() {
    let _ = env_logger::builder()
        .is_test(true)
        .format_timestamp_millis()
        .filter_level(log::LevelFilter::Debug)
        .try_init();
}

pub fn qualified(simple: &str) -> String {
    format!("{}/{}", PACKAGE, simple)
}

fn body(insns: Vec<Insn>) -> MethodBody {
    MethodBody::new(insns.into_iter().collect())
}

fn println(message: &str) -> Vec<Insn> {
    vec![
        Insn::get_static("java/lang/System", "out", "Ljava/io/PrintStream;"),
        Insn::ldc_string(message),
        Insn::invoke_virtual("java/io/PrintStream", "println", "(Ljava/lang/String;)V"),
    ]
}

fn super_call(owner: &str) -> Vec<Insn> {
    vec![Insn::aload(0), Insn::invoke_special(owner, "<init>", "()V")]
}

/// `noopTest` and `sleepFor10s`, both tagged `@Test`
pub fn with_test_methods(builder: ClassBuilder) -> ClassBuilder {
    let mut noop = println("noopTest nooping right along");
    noop.push(Insn::simple(RETURN));
    let mut sleep = println("sleepFor10s test about to sleep");
    sleep.extend([
        Insn::ldc_long(10_000),
        Insn::invoke_static("java/lang/Thread", "sleep", "(J)V"),
        Insn::simple(RETURN),
    ]);
    builder
        .method(ACC_PUBLIC, "noopTest", "()V", &[TEST_TAG], Some(body(noop)))
        .method(ACC_PUBLIC, "sleepFor10s", "()V", &[TEST_TAG], Some(body(sleep)))
}

pub fn basic_junit_test() -> ClassFile {
    with_test_methods(ClassBuilder::new(qualified("BasicJunitTest")).default_constructor(ACC_PUBLIC))
        .build()
        .unwrap()
}

/// Like [`basic_junit_test`] plus a `@Rule public Timeout` field
pub fn basic_junit_test_with_timeout() -> ClassFile {
    let name = qualified("BasicJunitTestWithTimeout");
    with_test_methods(
        ClassBuilder::new(&name)
            .field(ACC_PUBLIC, "globalTimeout", TIMEOUT_DESCRIPTOR, &[RULE_TAG])
            .method(ACC_PUBLIC, "<init>", "()V", &[], Some(timeout_initializing_constructor(&name, "globalTimeout"))),
    )
    .build()
    .unwrap()
}

fn timeout_initializing_constructor(class: &str, field: &str) -> MethodBody {
    let mut insns = super_call(OBJECT);
    insns.extend([
        Insn::aload(0),
        Insn::new_object(TIMEOUT_CLASS),
        Insn::simple(DUP),
        Insn::ldc_long(5_000),
        Insn::get_static("java/util/concurrent/TimeUnit", "MILLISECONDS", "Ljava/util/concurrent/TimeUnit;"),
        Insn::invoke_special(TIMEOUT_CLASS, "<init>", "(JLjava/util/concurrent/TimeUnit;)V"),
        Insn::put_field(class, field, TIMEOUT_DESCRIPTOR),
        Insn::simple(RETURN),
    ]);
    body(insns)
}

pub fn hello_world() -> ClassFile {
    let mut main = println("Hello, world");
    main.push(Insn::simple(RETURN));
    ClassBuilder::new(qualified("HelloWorld"))
        .default_constructor(ACC_PUBLIC)
        .method(ACC_PUBLIC | ACC_STATIC, "main", "([Ljava/lang/String;)V", &[], Some(body(main)))
        .build()
        .unwrap()
}

pub fn junit_test_with_temp_folder_rule() -> ClassFile {
    let name = qualified("JunitTestWithTempFolderRule");
    let folder = "org/junit/rules/TemporaryFolder";
    let mut init = super_call(OBJECT);
    init.extend([
        Insn::aload(0),
        Insn::new_object(folder),
        Insn::simple(DUP),
        Insn::invoke_special(folder, "<init>", "()V"),
        Insn::put_field(&name, "tempDir", "Lorg/junit/rules/TemporaryFolder;"),
        Insn::simple(RETURN),
    ]);
    with_test_methods(
        ClassBuilder::new(&name)
            .field(ACC_PUBLIC, "tempDir", "Lorg/junit/rules/TemporaryFolder;", &[RULE_TAG])
            .method(ACC_PUBLIC, "<init>", "()V", &[], Some(body(init))),
    )
    .build()
    .unwrap()
}

/// A private `@Rule Timeout globalTimeout`, which JUnit would reject and which takes the default name
pub fn private_timeout_field() -> ClassFile {
    let name = qualified("PrivateTimeoutFieldDuplicateFieldName");
    with_test_methods(
        ClassBuilder::new(&name)
            .field(ACC_PRIVATE, "globalTimeout", TIMEOUT_DESCRIPTOR, &[RULE_TAG])
            .method(ACC_PUBLIC, "<init>", "()V", &[], Some(timeout_initializing_constructor(&name, "globalTimeout"))),
    )
    .build()
    .unwrap()
}

pub fn static_timeout_field() -> ClassFile {
    with_test_methods(
        ClassBuilder::new(qualified("StaticTimeoutField"))
            .field(ACC_PUBLIC | ACC_STATIC, "timeout", TIMEOUT_DESCRIPTOR, &[RULE_TAG])
            .default_constructor(ACC_PUBLIC),
    )
    .build()
    .unwrap()
}

/// Public `()V` delegating through `this(true)` to a private `(Z)V` that calls `super()`
/// and branches while assigning its fields
pub fn secondary_private_constructor() -> ClassFile {
    let name = qualified("BasicJunitTestWithSecondaryPrivateConstructor");

    let delegating = body(vec![
        Insn::aload(0),
        Insn::push_int(1),
        Insn::invoke_special(&name, "<init>", "(Z)V"),
        Insn::simple(RETURN),
    ]);

    let mut insns = InsnList::new();
    let negated_false = insns.new_label();
    let store = insns.new_label();
    for insn in super_call(OBJECT) {
        insns.push(insn);
    }
    for insn in [
        Insn::aload(0),
        Insn::Var { opcode: ILOAD, index: 1 },
        Insn::put_field(&name, "foo", "Z"),
        Insn::aload(0),
        Insn::Var { opcode: ILOAD, index: 1 },
        Insn::jump(IFNE, negated_false),
        Insn::push_int(1),
        Insn::jump(GOTO, store),
        Insn::Label(negated_false),
        Insn::push_int(0),
        Insn::Label(store),
        Insn::put_field(&name, "bar", "Z"),
        Insn::simple(RETURN),
    ] {
        insns.push(insn);
    }
    let this = VerificationType::Object(name.clone());
    let mut primary = MethodBody::new(insns);
    primary.frames = vec![
        StackMapFrame {
            label: negated_false,
            kind: FrameKind::Full {
                locals: vec![this.clone(), VerificationType::Integer],
                stack: vec![this.clone()],
            },
        },
        StackMapFrame {
            label: store,
            kind: FrameKind::Full {
                locals: vec![this.clone(), VerificationType::Integer],
                stack: vec![this, VerificationType::Integer],
            },
        },
    ];

    with_test_methods(
        ClassBuilder::new(&name)
            .field(ACC_PRIVATE | ACC_FINAL, "foo", "Z", &[])
            .field(ACC_PRIVATE | ACC_FINAL, "bar", "Z", &[])
            .method(ACC_PUBLIC, "<init>", "()V", &[], Some(delegating))
            .method(ACC_PRIVATE, "<init>", "(Z)V", &[], Some(primary)),
    )
    .build()
    .unwrap()
}

/// `JunitWithAnonymousInner` and its anonymous `$1`
pub fn anonymous_inner() -> (ClassFile, ClassFile) {
    let outer_name = qualified("JunitWithAnonymousInner");
    let inner_name = format!("{}$1", outer_name);

    let mut uses_inner = vec![
        Insn::new_object(&inner_name),
        Insn::simple(DUP),
        Insn::aload(0),
        Insn::invoke_special(&inner_name, "<init>", &format!("(L{};)V", outer_name)),
        Insn::Var { opcode: ASTORE, index: 1 },
        Insn::get_static("java/lang/System", "out", "Ljava/io/PrintStream;"),
        Insn::aload(1),
        Insn::invoke_virtual(OBJECT, "toString", "()Ljava/lang/String;"),
        Insn::invoke_virtual("java/io/PrintStream", "println", "(Ljava/lang/String;)V"),
    ];
    uses_inner.push(Insn::simple(RETURN));
    let outer = with_test_methods(
        ClassBuilder::new(&outer_name)
            .default_constructor(ACC_PUBLIC)
            .method(ACC_PUBLIC, "usesAnonymousInner", "()V", &[TEST_TAG], Some(body(uses_inner)))
            .inner_class(&inner_name, None, None, 0),
    )
    .build()
    .unwrap();

    let outer_descriptor = format!("L{};", outer_name);
    let mut init = vec![
        Insn::aload(0),
        Insn::aload(1),
        Insn::put_field(&inner_name, "this$0", &outer_descriptor),
    ];
    init.extend(super_call(OBJECT));
    init.push(Insn::simple(RETURN));
    let to_string = body(vec![Insn::ldc_string("usesAnonymousInner"), Insn::simple(ARETURN)]);
    let inner = ClassBuilder::new(&inner_name)
        .access(ACC_SUPER)
        .field(ACC_FINAL | ACC_SYNTHETIC, "this$0", &outer_descriptor, &[])
        .method(0, "<init>", &format!("({})V", outer_descriptor), &[], Some(body(init)))
        .method(ACC_PUBLIC, "toString", "()Ljava/lang/String;", &[], Some(to_string))
        .inner_class(&inner_name, None, None, 0)
        .build()
        .unwrap();
    (outer, inner)
}

pub fn multiple_constructors() -> ClassFile {
    let name = qualified("HasMultipleConstructors");
    let mut with_arg = super_call(OBJECT);
    with_arg.push(Insn::simple(RETURN));
    with_test_methods(
        ClassBuilder::new(&name)
            .default_constructor(ACC_PUBLIC)
            .method(ACC_PUBLIC, "<init>", "(I)V", &[], Some(body(with_arg))),
    )
    .build()
    .unwrap()
}

pub fn class_with_timeout_but_no_tests() -> ClassFile {
    let name = qualified("ClassWithTimeoutButNoTests");
    ClassBuilder::new(&name)
        .field(ACC_PUBLIC, "globalTimeout", TIMEOUT_DESCRIPTOR, &[RULE_TAG])
        .method(ACC_PUBLIC, "<init>", "()V", &[], Some(timeout_initializing_constructor(&name, "globalTimeout")))
        .build()
        .unwrap()
}

pub fn junit_test_subclass() -> ClassFile {
    let parent = qualified("ClassWithTimeoutButNoTests");
    let mut init = super_call(&parent);
    init.push(Insn::simple(RETURN));
    with_test_methods(
        ClassBuilder::new(qualified("JunitTestSubclass"))
            .super_name(&parent)
            .method(ACC_PUBLIC, "<init>", "()V", &[], Some(body(init))),
    )
    .build()
    .unwrap()
}

/// Constructor whose body calls `setUp()` inside a try/catch after `super()`
pub fn guarded_constructor() -> ClassFile {
    let name = qualified("GuardedSetUp");
    let mut insns = InsnList::new();
    let start = insns.new_label();
    let end = insns.new_label();
    let handler = insns.new_label();
    let after = insns.new_label();
    let first_line = insns.new_label();
    insns.push(Insn::Label(first_line));
    for insn in super_call(OBJECT) {
        insns.push(insn);
    }
    for insn in [
        Insn::Label(start),
        Insn::aload(0),
        Insn::invoke_virtual(&name, "setUp", "()V"),
        Insn::Label(end),
        Insn::jump(GOTO, after),
        Insn::Label(handler),
        Insn::Var { opcode: ASTORE, index: 1 },
    ] {
        insns.push(insn);
    }
    for insn in println("setUp failed") {
        insns.push(insn);
    }
    insns.push(Insn::Label(after));
    insns.push(Insn::simple(RETURN));

    let this = VerificationType::Object(name.clone());
    let mut init = MethodBody::new(insns);
    init.try_catch = vec![TryCatchBlock {
        start,
        end,
        handler,
        catch_type: Some("java/lang/RuntimeException".to_string()),
    }];
    init.line_numbers = vec![LineNumber { start: first_line, line: 7 }, LineNumber { start, line: 9 }];
    init.frames = vec![
        StackMapFrame {
            label: handler,
            kind: FrameKind::Full {
                locals: vec![this.clone()],
                stack: vec![VerificationType::Object("java/lang/RuntimeException".to_string())],
            },
        },
        StackMapFrame { label: after, kind: FrameKind::Same },
    ];

    let set_up = body(vec![Insn::simple(RETURN)]);
    with_test_methods(
        ClassBuilder::new(&name)
            .method(ACC_PUBLIC, "<init>", "()V", &[], Some(init))
            .method(ACC_PROTECTED, "setUp", "()V", &[], Some(set_up)),
    )
    .build()
    .unwrap()
}

/// Modified UTF-8 of a lone high surrogate, which is how javac writes `"\uD800"`
pub const LONE_SURROGATE: [u8; 3] = [0xED, 0xA0, 0x80];

/// `static final String LONE = "\uD800"` and a test that loads the same literal
pub fn lone_surrogate_constant() -> ClassFile {
    let uses_literal = body(vec![
        Insn::Const { opcode: LDC, value: ConstValue::RawString(LONE_SURROGATE.to_vec()) },
        Insn::simple(POP),
        Insn::simple(RETURN),
    ]);
    let mut class = ClassBuilder::new(qualified("LoneSurrogate"))
        .default_constructor(ACC_PUBLIC)
        .field(ACC_PUBLIC | ACC_STATIC | ACC_FINAL, "LONE", "Ljava/lang/String;", &[])
        .method(ACC_PUBLIC, "usesLoneSurrogate", "()V", &[TEST_TAG], Some(uses_literal))
        .build()
        .unwrap();
    let value = class.constant_pool.add_string_bytes(&LONE_SURROGATE).unwrap();
    let name = class.constant_pool.add_utf8("ConstantValue").unwrap();
    class.fields[0].attributes.push(AttributeInfo::new(name, value.to_be_bytes().to_vec()));
    class
}

/// A member class of `pkg/Outer` described by its own `InnerClasses` entry
pub fn member_class(simple: &str, class_access: u16, inner_access: u16) -> ClassFile {
    let name = format!("pkg/Outer${}", simple);
    with_test_methods(
        ClassBuilder::new(&name)
            .access(class_access)
            .default_constructor(ACC_PUBLIC)
            .inner_class(&name, Some("pkg/Outer"), Some(simple), inner_access),
    )
    .build()
    .unwrap()
}

/// Every fixture with the applicability the classifier should report for it
pub fn samples() -> Vec<(ClassFile, timeout_enforcer::Applicability)> {
    use timeout_enforcer::Applicability::*;
    let (outer, inner) = anonymous_inner();
    vec![
        (basic_junit_test_with_timeout(), ExistentTimeout),
        (hello_world(), NoTests),
        (class_with_timeout_but_no_tests(), ExistentTimeout),
        (basic_junit_test(), Applicable),
        (junit_test_with_temp_folder_rule(), Applicable),
        (private_timeout_field(), Applicable),
        (static_timeout_field(), Applicable),
        (outer, Applicable),
        (inner, NotTestClass),
        (multiple_constructors(), NotTestClass),
        (secondary_private_constructor(), Applicable),
        (guarded_constructor(), Applicable),
        (lone_surrogate_constant(), Applicable),
    ]
}

pub fn method<'c>(class: &'c ClassFile, name: &str, descriptor: &str) -> &'c MethodInfo {
    class
        .methods
        .iter()
        .find(|m| {
            m.name(&class.constant_pool).unwrap() == name && m.descriptor(&class.constant_pool).unwrap() == descriptor
        })
        .unwrap_or_else(|| panic!("no method {}{}", name, descriptor))
}

pub fn method_body(class: &ClassFile, name: &str, descriptor: &str) -> MethodBody {
    method(class, name, descriptor).body(&class.constant_pool).unwrap().unwrap()
}

/// Length of the raw bytecode array of a method
pub fn code_length(class: &ClassFile, name: &str, descriptor: &str) -> u32 {
    let code = find_attribute(&method(class, name, descriptor).attributes, &class.constant_pool, "Code").unwrap();
    u32::from_be_bytes([code.info[4], code.info[5], code.info[6], code.info[7]])
}

/// Real opcodes of a method body, labels skipped
pub fn opcodes(body: &MethodBody) -> Vec<u8> {
    body.insns.iter().filter_map(Insn::opcode).collect()
}
