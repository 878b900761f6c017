//! End-to-end programs exercising classes, blocks, namespaces and threads
//!
//! Each listing is the compiled form of a short Goby program, shown in the
//! comment above it.

mod common;

use common::eval_int;

#[test]
fn test_thread_fan_in_over_channel() {
    // c = Channel.new
    // sum = 0
    // 1001.times { |i| thread(i) { |i| c.deliver(i) } }
    // 1001.times { sum += c.receive }
    // sum
    let listing = r#"
<Block:0>
getlocal 2 0
getlocal 0 0
send deliver 1
leave
<Block:1>
putself
getlocal 0 0
send thread 1 block:0
leave
<Block:2>
getlocal 1 1
getlocal 1 0
send receive 0
send + 1
setlocal 1 1
leave
<ProgramStart>
getconstant Channel
send new 0
setlocal 0 0
putobject 0
setlocal 0 1
putobject 1001
send times 0 block:1
pop
putobject 1001
send times 0 block:2
pop
getlocal 0 1
leave
"#;
    assert_eq!(eval_int(listing), 500500);
}

#[test]
fn test_class_with_initializer() {
    // class Foo
    //   def initialize(x, y); @x = x; @y = y; end
    //   def bar; @x + @y; end
    // end
    // Foo.new(10, 20).bar
    let listing = r#"
<Def:initialize>
params: x y
getlocal 0 0
setinstancevariable @x
getlocal 0 1
setinstancevariable @y
leave
<Def:bar>
getinstancevariable @x
getinstancevariable @y
send + 1
leave
<DefClass:Foo>
putself
putstring initialize
def_method 2
putself
putstring bar
def_method 0
leave
<ProgramStart>
putself
def_class class:Foo
pop
getconstant Foo
putobject 10
putobject 20
send new 2
send bar 0
leave
"#;
    assert_eq!(eval_int(listing), 30);
}

#[test]
fn test_block_forwarded_through_methods() {
    // def foo(x); yield(x + 10); end
    // def bar(y); foo(y) { |f| yield(f) }; end
    // def baz(z); bar(z + 100) { |b| yield(b) }; end
    // a = 0
    // baz(100) { |b| a = b }
    // a
    let listing = r#"
<Def:foo>
params: x
putself
getlocal 0 0
putobject 10
send + 1
invokeblock 1
leave
<Def:bar>
params: y
putself
getlocal 0 0
send foo 1 block:0
leave
<Block:0>
putself
getlocal 0 0
invokeblock 1
leave
<Def:baz>
params: z
putself
getlocal 0 0
putobject 100
send + 1
send bar 1 block:1
leave
<Block:1>
putself
getlocal 0 0
invokeblock 1
leave
<Block:2>
getlocal 0 0
setlocal 1 0
leave
<ProgramStart>
putself
putstring foo
def_method 1
putself
putstring bar
def_method 1
putself
putstring baz
def_method 1
putobject 0
setlocal 0 0
putself
putobject 100
send baz 1 block:2
pop
getlocal 0 0
leave
"#;
    assert_eq!(eval_int(listing), 210);
}

#[test]
fn test_namespaced_inheritance() {
    // module Foo; class Bar; def bar; 10; end; end; end
    // module Baz; class Bar < Foo::Bar; def foo; 100; end; end; end
    // b = Baz::Bar.new
    // b.foo + b.bar
    let listing = r#"
<Def:bar>
putobject 10
leave
<DefClass:Bar>
putself
putstring bar
def_method 0
leave
<DefClass:Foo>
putself
def_class class:Bar
pop
leave
<Def:foo>
putobject 100
leave
<DefClass:Bar>
putself
putstring foo
def_method 0
leave
<DefClass:Baz>
putself
getconstant Foo true
getconstant Bar
def_class class:Bar Foo::Bar
pop
leave
<ProgramStart>
putself
def_class module:Foo
pop
putself
def_class module:Baz
pop
getconstant Baz true
getconstant Bar
send new 0
setlocal 0 0
getlocal 0 0
send foo 0
getlocal 0 0
send bar 0
send + 1
leave
"#;
    assert_eq!(eval_int(listing), 110);
}

#[test]
fn test_integer_times() {
    // a = 0
    // 3.times { a += 1 }
    // a
    let listing = r#"
<Block:0>
getlocal 1 0
putobject 1
send + 1
setlocal 1 0
leave
<ProgramStart>
putobject 0
setlocal 0 0
putobject 3
send times 0 block:0
pop
getlocal 0 0
leave
"#;
    assert_eq!(eval_int(listing), 3);
}

#[test]
fn test_range_bsearch() {
    // ary = [0, 4, 7, 10, 12]
    // (0..4).bsearch { |i| ary[i] >= 6 }
    let listing = r#"
<Block:0>
getlocal 1 0
getlocal 0 0
send [] 1
putobject 6
send >= 1
leave
<ProgramStart>
putobject 0
putobject 4
putobject 7
putobject 10
putobject 12
newarray 5
setlocal 0 0
putobject 0
putobject 4
newrange
send bsearch 0 block:0
leave
"#;
    assert_eq!(eval_int(listing), 2);
}
