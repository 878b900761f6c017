//! `goby check`: assemble and verify without running

use super::load_program;
use crate::output::StyledOutput;
use goby_bytecode::{verify_program, SetKind};
use std::process::ExitCode;
use termcolor::ColorChoice;

/// Verify the program in `path` and print a one-line summary
pub fn execute(path: &str, json: bool, choice: ColorChoice) -> anyhow::Result<ExitCode> {
    let program = load_program(path, json)?;
    let mut out = StyledOutput::new(choice);

    if let Err(e) = verify_program(&program) {
        out.error("invalid");
        out.plain(&format!(" {}: {}\n", path, e));
        return Ok(ExitCode::FAILURE);
    }

    out.success("ok");
    out.plain(&format!(
        " {}: {} methods, {} classes, {} blocks\n",
        path,
        program.sets_of(SetKind::MethodDef).count(),
        program.sets_of(SetKind::ClassDef).count(),
        program.sets_of(SetKind::Block).count(),
    ));
    Ok(ExitCode::SUCCESS)
}
