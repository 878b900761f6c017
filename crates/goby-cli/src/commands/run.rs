//! `goby run`: execute a program on a fresh VM

use super::load_program;
use goby_core::{Vm, VmError, VmOptions};
use std::process::ExitCode;

/// Run the program in `path`
///
/// An error raised by the program has already been printed by the VM; it
/// only turns into a failing exit code here.
pub fn execute(path: &str, json: bool, print_result: bool) -> anyhow::Result<ExitCode> {
    let program = load_program(path, json)?;
    let options = VmOptions {
        file: Some(program.filename.clone()),
        ..VmOptions::default()
    };
    let mut vm = Vm::with_options(options);

    match vm.exec_program(program) {
        Ok(()) => {}
        Err(VmError::Program(_)) => return Ok(ExitCode::FAILURE),
        Err(e) => return Err(e.into()),
    }

    let counters = vm.counters();
    log::debug!(
        "{} instructions executed, peak threads {}",
        counters.total_instructions(),
        counters.peak_threads()
    );

    if print_result {
        if let Some(value) = vm.get_exec_result() {
            println!("{}", value.inspect(&vm.context().classes));
        }
    }
    Ok(ExitCode::SUCCESS)
}
