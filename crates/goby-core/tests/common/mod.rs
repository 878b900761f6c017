//! Shared helpers for running bytecode listings

#![allow(dead_code)]

use goby_core::{ErrorKind, Value, Vm, VmOptions};

/// Assemble `listing` and run it in test mode, returning the VM
pub fn run_vm(listing: &str, options: VmOptions) -> Vm {
    let program = goby_bytecode::assemble("test.gb", listing).expect("listing should assemble");
    let mut vm = Vm::with_options(options);
    vm.exec_program(program).expect("program should run");
    vm
}

/// Assemble `listing`, run it, and return the value left on the stack
pub fn eval(listing: &str) -> Value {
    run_vm(listing, VmOptions::test())
        .get_exec_result()
        .expect("program should leave a value")
}

/// Run `listing` and return its integer result
pub fn eval_int(listing: &str) -> i64 {
    let value = eval(listing);
    value
        .as_int()
        .unwrap_or_else(|| panic!("expected an Integer, got {:?}", value))
}

/// Run `listing` and return the error it left, asserting its kind
pub fn eval_error(listing: &str, kind: ErrorKind) -> String {
    let value = eval(listing);
    let error = value
        .as_error()
        .unwrap_or_else(|| panic!("expected an error, got {:?}", value));
    assert_eq!(error.kind(), Some(kind), "unexpected error: {}", error);
    error.message().to_string()
}
