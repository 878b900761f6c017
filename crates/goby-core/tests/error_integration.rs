//! Error values: raising, propagation through frames, and reporting

mod common;

use common::{eval, eval_error, eval_int};
use goby_core::{ErrorKind, Mode, ResourceLimits, Vm, VmError, VmOptions};

#[test]
fn test_integer_division_by_zero() {
    let message = eval_error(
        "<ProgramStart>\nputobject 7\nputobject 0\nsend / 1\nleave\n",
        ErrorKind::ZeroDivisionError,
    );
    assert_eq!(message, "Divided by 0");

    eval_error(
        "<ProgramStart>\nputobject 7\nputobject 0\nsend % 1\nleave\n",
        ErrorKind::ZeroDivisionError,
    );
}

#[test]
fn test_constant_rebinding_fails() {
    // Foo = 1; Foo = 2
    let listing = "<ProgramStart>\nputobject 1\nsetconstant Foo\nputobject 2\nsetconstant Foo\nleave\n";
    eval_error(listing, ErrorKind::ConstantAlreadyInitializedError);
}

#[test]
fn test_rebinding_keeps_first_value() {
    // Foo = 1; Foo = 2 runs in one chunk, Foo is read in the next
    let mut vm = Vm::with_options(VmOptions {
        capture_output: true,
        ..VmOptions::repl()
    });
    vm.init_for_repl();
    let first = goby_bytecode::assemble(
        "repl",
        "<ProgramStart>\nputobject 1\nsetconstant Foo\nputobject 2\nsetconstant Foo\nleave\n",
    )
    .unwrap();
    vm.repl_exec(first.sets).unwrap();
    assert!(vm.take_output().starts_with("ConstantAlreadyInitializedError"));

    let second = goby_bytecode::assemble("repl", "<ProgramStart>\ngetconstant Foo\nleave\n").unwrap();
    vm.repl_exec(second.sets).unwrap();
    assert_eq!(vm.get_exec_result().and_then(|v| v.as_int()), Some(1));
}

#[test]
fn test_missing_constant() {
    let message = eval_error("<ProgramStart>\ngetconstant Nope\nleave\n", ErrorKind::NameError);
    assert!(message.contains("Nope"));
}

#[test]
fn test_undefined_method() {
    let message = eval_error(
        "<ProgramStart>\nputobject 1\nsend frobnicate 0\nleave\n",
        ErrorKind::NoMethodError,
    );
    assert!(message.contains("frobnicate"));
}

#[test]
fn test_error_skips_remaining_instructions() {
    // a = 1; 1 / 0; a = 2
    let listing = r#"
<ProgramStart>
putobject 1
setlocal 0 0
putobject 1
putobject 0
send / 1
pop
putobject 2
setlocal 0 0
getlocal 0 0
leave
"#;
    assert!(eval(listing).is_error());
}

#[test]
fn test_error_unwinds_method_frames() {
    // def boom; 1 / 0; 5; end
    // def outer; boom; 10; end
    // outer
    let listing = r#"
<Def:boom>
putobject 1
putobject 0
send / 1
pop
putobject 5
leave
<Def:outer>
putself
send boom 0
pop
putobject 10
leave
<ProgramStart>
putself
putstring boom
def_method 0
putself
putstring outer
def_method 0
putself
send outer 0 @3
leave
"#;
    let value = eval(listing);
    let error = value.as_error().expect("expected an error");
    assert_eq!(error.kind(), Some(ErrorKind::ZeroDivisionError));
    assert_eq!(error.file(), "test.gb");
}

#[test]
fn test_wrong_argument_count() {
    // def foo(a); a; end
    // foo
    let listing = r#"
<Def:foo>
params: a
getlocal 0 0
leave
<ProgramStart>
putself
putstring foo
def_method 1
putself
send foo 0
leave
"#;
    let message = eval_error(listing, ErrorKind::ArgumentError);
    assert_eq!(message, "Expect at least 1 args for method 'foo'. got: 0");
}

#[test]
fn test_yield_without_block() {
    // def foo; yield; end
    // foo
    let listing = r#"
<Def:foo>
putself
invokeblock 0
leave
<ProgramStart>
putself
putstring foo
def_method 0
putself
send foo 0
leave
"#;
    let message = eval_error(listing, ErrorKind::InternalError);
    assert_eq!(message, "Can't yield without a block");
}

#[test]
fn test_raise_error_class() {
    // raise ArgumentError, "bad input"
    let listing = "<ProgramStart>\nputself\ngetconstant ArgumentError\nputstring \"bad input\"\nsend raise 2\nleave\n";
    let message = eval_error(listing, ErrorKind::ArgumentError);
    assert_eq!(message, "bad input");
}

#[test]
fn test_raise_custom_error_subclass() {
    // class MyError < Error; end
    // raise MyError
    let listing = r#"
<DefClass:MyError>
leave
<ProgramStart>
putself
getconstant Error
def_class class:MyError Error
pop
putself
getconstant MyError
send raise 1
leave
"#;
    let value = eval(listing);
    let error = value.as_error().expect("expected an error");
    assert_eq!(error.kind(), None);
    assert_eq!(error.kind_name(), "MyError");
}

#[test]
fn test_call_depth_limit() {
    // def down(n); down(n + 1); end
    // down(0)
    let listing = r#"
<Def:down>
params: n
putself
getlocal 0 0
putobject 1
send + 1
send down 1
leave
<ProgramStart>
putself
putstring down
def_method 1
putself
putobject 0
send down 1
leave
"#;
    let options = VmOptions::test().with_limits(ResourceLimits::with_call_depth(100));
    let vm = common::run_vm(listing, options);
    let value = vm.get_exec_result().expect("program should leave a value");
    let error = value.as_error().expect("expected an error");
    assert_eq!(error.kind(), Some(ErrorKind::InternalError));
    assert_eq!(error.message(), "Call depth exceeded");
}

#[test]
fn test_normal_mode_returns_program_error() {
    let program = goby_bytecode::assemble(
        "main.gb",
        "<ProgramStart>\nputobject 1\nsend nope 0 @2\nleave\n",
    )
    .unwrap();
    let mut vm = Vm::with_options(VmOptions::default().with_mode(Mode::Normal));
    match vm.exec_program(program) {
        Err(VmError::Program(message)) => {
            assert!(message.starts_with("NoMethodError:"));
            assert!(message.ends_with("At main.gb:2"));
        }
        other => panic!("unexpected result {:?}", other),
    }
}

#[test]
fn test_break_leaves_iteration() {
    // sum = 0
    // [1, 2, 3].each { |x| sum += x; break if x == 2 }
    // sum
    let listing = r#"
<Block:0>
0 getlocal 1 0
1 getlocal 0 0
2 send + 1
3 setlocal 1 0
4 getlocal 0 0
5 putobject 2
6 send == 1
7 branchunless 9
8 break
9 leave
<ProgramStart>
putobject 0
setlocal 0 0
putobject 1
putobject 2
putobject 3
newarray 3
send each 0 block:0
pop
getlocal 0 0
leave
"#;
    assert_eq!(eval_int(listing), 3);
}
