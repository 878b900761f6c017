//! Builtin classes driven through compiled programs

mod common;

use common::{eval, eval_error, eval_int, run_vm};
use goby_core::{ClassId, ErrorKind, VmOptions};

fn eval_str(listing: &str) -> String {
    let value = eval(listing);
    value
        .as_str()
        .unwrap_or_else(|| panic!("expected a String, got {:?}", value))
        .to_string()
}

#[test]
fn test_string_character_round_trip() {
    // "héllo wörld".to_a.reduce("") { |acc, c| acc + c }
    let listing = r#"
<Block:0>
getlocal 0 0
getlocal 0 1
send + 1
leave
<ProgramStart>
putstring "héllo wörld"
send to_a 0
putstring ""
send reduce 1 block:0
leave
"#;
    assert_eq!(eval_str(listing), "héllo wörld");
}

#[test]
fn test_class_of_class_is_stable() {
    // class Foo; end
    // Foo.class == Foo.class
    let listing = r#"
<DefClass:Foo>
leave
<ProgramStart>
putself
def_class class:Foo
pop
getconstant Foo
send class 0
getconstant Foo
send class 0
send == 1
leave
"#;
    assert_eq!(eval(listing).as_bool(), Some(true));

    let listing = "<DefClass:Foo>\nleave\n<ProgramStart>\nputself\ndef_class class:Foo\npop\ngetconstant Foo\nsend class 0\nleave\n";
    assert_eq!(eval(listing).as_class(), Some(ClassId::CLASS));
}

#[test]
fn test_superclass_chain_reaches_object() {
    // class A; end; class B < A; end
    // B.superclass.superclass.name
    let listing = r#"
<DefClass:A>
leave
<DefClass:B>
leave
<ProgramStart>
putself
def_class class:A
pop
putself
getconstant A
def_class class:B A
pop
getconstant B
send superclass 0
send superclass 0
send name 0
leave
"#;
    assert_eq!(eval_str(listing), "Object");
}

#[test]
fn test_closest_method_wins() {
    // class A; def who; 1; end; end
    // class B < A; def who; 2; end; end
    // B.new.who
    let listing = r#"
<Def:who>
putobject 1
leave
<Def:who>
putobject 2
leave
<DefClass:A>
putself
putstring who
def_method 0
leave
<DefClass:B>
putself
putstring who
def_method 0
leave
<ProgramStart>
putself
def_class class:A
pop
putself
getconstant A
def_class class:B A
pop
getconstant B
send new 0
send who 0
leave
"#;
    assert_eq!(eval_int(listing), 2);
}

#[test]
fn test_attr_accessor() {
    // class Point; attr_accessor :x; end
    // p = Point.new; p.x = 7; p.x
    let listing = r#"
<DefClass:Point>
putself
putstring x
send attr_accessor 1
pop
leave
<ProgramStart>
putself
def_class class:Point
pop
getconstant Point
send new 0
setlocal 0 0
getlocal 0 0
putobject 7
send x= 1
pop
getlocal 0 0
send x 0
leave
"#;
    assert_eq!(eval_int(listing), 7);
}

#[test]
fn test_range_size_and_direction() {
    assert_eq!(
        eval_int("<ProgramStart>\nputobject 1\nputobject 5\nnewrange\nsend size 0\nleave\n"),
        5
    );
    assert_eq!(
        eval_str("<ProgramStart>\nputobject 5\nputobject 1\nnewrange\nsend to_a 0\nsend inspect 0\nleave\n"),
        "[5, 4, 3, 2, 1]"
    );
}

#[test]
fn test_range_step_rejects_zero() {
    let listing = r#"
<Block:0>
leave
<ProgramStart>
putobject 1
putobject 5
newrange
putobject 0
send step 1 block:0
leave
"#;
    let message = eval_error(listing, ErrorKind::ArgumentError);
    assert_eq!(message, "Step can't be negative or 0. got: 0");
}

#[test]
fn test_hash_keys_sorted() {
    // { b: 2, a: 1 }.keys
    let listing = r#"
<ProgramStart>
putstring b
putobject 2
putstring a
putobject 1
newhash 4
send keys 0
send inspect 0
leave
"#;
    assert_eq!(eval_str(listing), r#"["a", "b"]"#);
}

#[test]
fn test_array_index_assignment_grows() {
    // a = []; a[2] = 1; a.inspect
    let listing = r#"
<ProgramStart>
newarray 0
setlocal 0 0
getlocal 0 0
putobject 2
putobject 1
send []= 2
pop
getlocal 0 0
send inspect 0
leave
"#;
    assert_eq!(eval_str(listing), "[nil, nil, 1]");
}

#[test]
fn test_splat_expands_arguments() {
    // def add(a, b, c); a + b + c; end
    // add(*[1, 2, 3])
    let listing = r#"
<Def:add>
params: a b c
getlocal 0 0
getlocal 0 1
send + 1
getlocal 0 2
send + 1
leave
<ProgramStart>
putself
putstring add
def_method 3
putself
putobject 1
putobject 2
putobject 3
newarray 3
splatarray
send add 1
leave
"#;
    assert_eq!(eval_int(listing), 6);
}

#[test]
fn test_optional_and_keyword_arguments() {
    // def f(a, b = 10, c:); a + b + c; end
    // f(1, c: 100)
    let listing = r#"
<Def:f>
params: a b= c:
putobject 10
setlocal 0 1 optional
getlocal 0 0
getlocal 0 1
send + 1
getlocal 0 2
send + 1
leave
<ProgramStart>
putself
putstring f
def_method 3
putself
putobject 1
putobject 100
send f 2 args:_,c:
leave
"#;
    assert_eq!(eval_int(listing), 111);
}

#[test]
fn test_puts_writes_output() {
    let vm = run_vm(
        "<ProgramStart>\nputself\nputstring hi\nputobject 3\nsend puts 2\nleave\n",
        VmOptions::test(),
    );
    assert_eq!(vm.take_output(), "hi\n3\n");
    assert!(vm.get_exec_result().unwrap().is_null());
}

#[test]
fn test_integer_division_truncates() {
    assert_eq!(
        eval_int("<ProgramStart>\nputobject -7\nputobject 2\nsend / 1\nleave\n"),
        -3
    );
}

#[test]
fn test_channel_receive_after_close() {
    // c = Channel.new; c.close; c.receive
    let listing = r#"
<ProgramStart>
getconstant Channel
send new 0
dup
send close 0
pop
send receive 0
leave
"#;
    let message = eval_error(listing, ErrorKind::ChannelCloseError);
    assert_eq!(message, "The channel is already closed.");
}

#[test]
fn test_buffered_channel_in_one_thread() {
    // c = Channel.new(2); c.deliver(4); c.deliver(5); c.receive + c.receive
    let listing = r#"
<ProgramStart>
getconstant Channel
putobject 2
send new 1
setlocal 0 0
getlocal 0 0
putobject 4
send deliver 1
pop
getlocal 0 0
putobject 5
send deliver 1
pop
getlocal 0 0
send receive 0
getlocal 0 0
send receive 0
send + 1
leave
"#;
    assert_eq!(eval_int(listing), 9);
}

#[test]
fn test_regexp_match() {
    // Regexp.new("h(.)llo").match?("hello")
    let listing = r#"
<ProgramStart>
getconstant Regexp
putstring "h(.)llo"
send new 1
putstring hello
send match? 1
leave
"#;
    assert_eq!(eval(listing).as_bool(), Some(true));
}

#[test]
fn test_array_slice_with_huge_count() {
    // [1, 2, 3][1, 9223372036854775807]
    let listing = r#"
<ProgramStart>
putobject 1
putobject 2
putobject 3
newarray 3
putobject 1
putobject 9223372036854775807
send [] 2
send inspect 0
leave
"#;
    assert_eq!(eval_str(listing), "[2, 3]");

    // [1, 2, 3][1..9223372036854775807]
    let listing = r#"
<ProgramStart>
putobject 1
putobject 2
putobject 3
newarray 3
putobject 1
putobject 9223372036854775807
newrange
send [] 1
send inspect 0
leave
"#;
    assert_eq!(eval_str(listing), "[2, 3]");
}

#[test]
fn test_oversized_results_are_argument_errors() {
    let expected = format!(
        "Result length exceeds the maximum of {}",
        goby_core::builtins::MAX_BUILD_LENGTH
    );

    // "ab" * 9223372036854775807
    let message = eval_error(
        "<ProgramStart>\nputstring ab\nputobject 9223372036854775807\nsend * 1\nleave\n",
        ErrorKind::ArgumentError,
    );
    assert_eq!(message, expected);

    // [1] * 9223372036854775807
    let message = eval_error(
        "<ProgramStart>\nputobject 1\nnewarray 1\nputobject 9223372036854775807\nsend * 1\nleave\n",
        ErrorKind::ArgumentError,
    );
    assert_eq!(message, expected);

    // [][1099511627776] = 1
    let message = eval_error(
        "<ProgramStart>\nnewarray 0\nputobject 1099511627776\nputobject 1\nsend []= 2\nleave\n",
        ErrorKind::ArgumentError,
    );
    assert_eq!(message, expected);

    // "a".ljust(9223372036854775807)
    let message = eval_error(
        "<ProgramStart>\nputstring a\nputobject 9223372036854775807\nsend ljust 1\nleave\n",
        ErrorKind::ArgumentError,
    );
    assert_eq!(message, expected);
}

#[test]
fn test_empty_array_repeat_is_empty() {
    assert_eq!(
        eval_str("<ProgramStart>\nnewarray 0\nputobject 9223372036854775807\nsend * 1\nsend inspect 0\nleave\n"),
        "[]"
    );
}

#[test]
fn test_range_bsearch_stays_in_range() {
    // seen = []
    // r = (0..4).bsearch { |i| seen.push(i); 1 }
    // [r, seen.max].inspect
    let listing = r#"
<Block:0>
getlocal 1 0
getlocal 0 0
send push 1
pop
putobject 1
leave
<ProgramStart>
newarray 0
setlocal 0 0
putobject 0
putobject 4
newrange
send bsearch 0 block:0
setlocal 0 1
getlocal 0 1
getlocal 0 0
send max 0
newarray 2
send inspect 0
leave
"#;
    assert_eq!(eval_str(listing), "[nil, 4]");
}

#[test]
fn test_decimal_power() {
    assert_eq!(
        eval_str("<ProgramStart>\nputobject 2\nsend to_d 0\nputobject 10\nsend ** 1\nsend to_s 0\nleave\n"),
        "1024"
    );
    let message = eval_error(
        "<ProgramStart>\nputobject 2\nsend to_d 0\nputobject 1000000000\nsend ** 1\nleave\n",
        ErrorKind::ArgumentError,
    );
    assert_eq!(message, "Exponent out of range");
}

#[test]
fn test_instance_methods_own_only() {
    // class A; def who; end; end
    // class B < A; def hi; end; end
    // [B.instance_methods(false), B.instance_methods.include?("who")].inspect
    let listing = r#"
<Def:who>
putnil
leave
<Def:hi>
putnil
leave
<DefClass:A>
putself
putstring who
def_method 0
leave
<DefClass:B>
putself
putstring hi
def_method 0
leave
<ProgramStart>
putself
def_class class:A
pop
putself
getconstant A
def_class class:B A
pop
getconstant B
putobject false
send instance_methods 1
getconstant B
send instance_methods 0
putstring who
send include? 1
newarray 2
send inspect 0
leave
"#;
    assert_eq!(eval_str(listing), r#"[["hi"], true]"#);
}

#[test]
fn test_assigned_channel_is_a_fresh_channel() {
    // c = Channel.new; d = c; d.close; [c.closed?, d.closed?]
    let listing = r#"
<ProgramStart>
getconstant Channel
send new 0
setlocal 0 0
getlocal 0 0
setlocal 0 1
getlocal 0 1
send close 0
pop
getlocal 0 0
send closed? 0
getlocal 0 1
send closed? 0
newarray 2
send inspect 0
leave
"#;
    assert_eq!(eval_str(listing), "[false, true]");
}
