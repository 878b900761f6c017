//! `require` and the bundled libraries

mod common;

use common::{eval, eval_error, eval_int};
use goby_core::ErrorKind;

#[test]
fn test_require_loads_once() {
    // [require("json"), require("json")]
    let listing = r#"
<ProgramStart>
putself
putstring json
send require 1
putself
putstring json
send require 1
newarray 2
leave
"#;
    let value = eval(listing);
    let loaded: Vec<Option<bool>> = value
        .as_array()
        .expect("expected an array")
        .snapshot()
        .iter()
        .map(|v| v.as_bool())
        .collect();
    assert_eq!(loaded, vec![Some(true), Some(false)]);
}

#[test]
fn test_require_unknown_library() {
    let message = eval_error(
        "<ProgramStart>\nputself\nputstring nope\nsend require 1\nleave\n",
        ErrorKind::NameError,
    );
    assert_eq!(message, "Can't require \"nope\"");
}

#[test]
fn test_require_unavailable_library() {
    let message = eval_error(
        "<ProgramStart>\nputself\nputstring net/http\nsend require 1\nleave\n",
        ErrorKind::InternalError,
    );
    assert!(message.contains("net/http"));
}

#[test]
fn test_json_parse() {
    // require "json"
    // JSON.parse("{\"a\": [1, 2]}")["a"].length
    let listing = r#"
<ProgramStart>
putself
putstring json
send require 1
pop
getconstant JSON
putstring "{\"a\": [1, 2]}"
send parse 1
putstring a
send [] 1
send length 0
leave
"#;
    assert_eq!(eval_int(listing), 2);
}

#[test]
fn test_json_parse_invalid() {
    let listing = r#"
<ProgramStart>
putself
putstring json
send require 1
pop
getconstant JSON
putstring "{oops"
send parse 1
leave
"#;
    let message = eval_error(listing, ErrorKind::ArgumentError);
    assert!(message.starts_with("Invalid JSON string"));
}

#[test]
fn test_to_json() {
    // { a: [1, nil] }.to_json
    let listing = r#"
<ProgramStart>
putstring a
putobject 1
putnil
newarray 2
newhash 2
send to_json 0
leave
"#;
    let value = eval(listing);
    let json: serde_json::Value = serde_json::from_str(value.as_str().expect("expected a String")).unwrap();
    assert_eq!(json, serde_json::json!({ "a": [1, null] }));
}

#[test]
fn test_concurrent_array() {
    // require "concurrent/array"
    // a = Concurrent::Array.new([1])
    // a.push(2, 3)
    // a.length
    let listing = r#"
<ProgramStart>
putself
putstring concurrent/array
send require 1
pop
getconstant Concurrent true
getconstant Array
putobject 1
newarray 1
send new 1
setlocal 0 0
getlocal 0 0
putobject 2
putobject 3
send push 2
pop
getlocal 0 0
send length 0
leave
"#;
    assert_eq!(eval_int(listing), 3);
}

#[test]
fn test_concurrent_hash_shared_between_threads() {
    // require "concurrent/hash"
    // h = Concurrent::Hash.new
    // c = Channel.new
    // thread { h["k"] = 5; c.deliver(nil) }
    // c.receive
    // h["k"]
    let listing = r#"
<Block:0>
getlocal 1 0
putstring k
putobject 5
send []= 2
pop
getlocal 1 1
putnil
send deliver 1
leave
<ProgramStart>
putself
putstring concurrent/hash
send require 1
pop
getconstant Concurrent true
getconstant Hash
send new 0
setlocal 0 0
getconstant Channel
send new 0
setlocal 0 1
putself
send thread 0 block:0
pop
getlocal 0 1
send receive 0
pop
getlocal 0 0
putstring k
send [] 1
leave
"#;
    assert_eq!(eval_int(listing), 5);
}

#[test]
fn test_rw_lock_runs_block() {
    // require "concurrent/rw_lock"
    // Concurrent::RWLock.new.with_write_lock { 42 }
    let listing = r#"
<Block:0>
putobject 42
leave
<ProgramStart>
putself
putstring concurrent/rw_lock
send require 1
pop
getconstant Concurrent true
getconstant RWLock
send new 0
send with_write_lock 0 block:0
leave
"#;
    assert_eq!(eval_int(listing), 42);
}

#[test]
fn test_rw_lock_release_unheld() {
    let listing = r#"
<ProgramStart>
putself
putstring concurrent/rw_lock
send require 1
pop
getconstant Concurrent true
getconstant RWLock
send new 0
send release_read_lock 0
leave
"#;
    let message = eval_error(listing, ErrorKind::InternalError);
    assert_eq!(message, "Can't release a read lock that is not held");
}

#[test]
fn test_concurrent_hash_delete_returns_value() {
    // require "concurrent/hash"
    // h = Concurrent::Hash.new; h["k"] = 5
    // [h.delete("k"), h.length]
    let listing = r#"
<ProgramStart>
putself
putstring concurrent/hash
send require 1
pop
getconstant Concurrent true
getconstant Hash
send new 0
setlocal 0 0
getlocal 0 0
putstring k
putobject 5
send []= 2
pop
getlocal 0 0
putstring k
send delete 1
getlocal 0 0
send length 0
newarray 2
send inspect 0
leave
"#;
    assert_eq!(eval(listing).as_str(), Some("[5, 0]"));
}
