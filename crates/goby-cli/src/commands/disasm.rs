//! `goby disasm` and `goby encode`: convert between JSON and listing form

use super::load_program;
use anyhow::Context;
use std::process::ExitCode;

/// Print the listing form of the JSON program in `path`
pub fn execute(path: &str) -> anyhow::Result<ExitCode> {
    let program = load_program(path, true)?;
    print!("{}", program);
    Ok(ExitCode::SUCCESS)
}

/// Write the listing in `path` as a JSON program
pub fn encode(path: &str, output: Option<&str>) -> anyhow::Result<ExitCode> {
    let program = load_program(path, false)?;
    let json = program.to_json()?;
    match output {
        Some(target) => {
            std::fs::write(target, json).with_context(|| format!("Failed to write {}", target))?
        }
        None => println!("{}", json),
    }
    Ok(ExitCode::SUCCESS)
}
