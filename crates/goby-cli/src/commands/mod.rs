//! Subcommand implementations

pub mod check;
pub mod disasm;
pub mod run;

use anyhow::Context;
use goby_bytecode::Program;
use std::path::Path;

/// Read `path` as a listing, or as a JSON program when `json` is set or the
/// file ends in `.json`
pub fn load_program(path: &str, json: bool) -> anyhow::Result<Program> {
    let source = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path))?;
    let is_json = json
        || Path::new(path)
            .extension()
            .map(|ext| ext == "json")
            .unwrap_or(false);

    let program = if is_json {
        let mut program =
            Program::from_json(&source).with_context(|| format!("Failed to decode {}", path))?;
        if program.filename.is_empty() {
            program.filename = path.to_string();
        }
        program
    } else {
        goby_bytecode::assemble(path, &source).with_context(|| format!("Failed to assemble {}", path))?
    };
    log::debug!("loaded {} ({} instruction sets)", path, program.sets.len());
    Ok(program)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn temp_file(name: &str, contents: &str) -> String {
        let path = std::env::temp_dir().join(format!("goby-cli-{}-{}", std::process::id(), name));
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn test_load_listing_and_json() {
        let listing = temp_file("load.gb", "<ProgramStart>\nputobject 1\nleave\n");
        let program = load_program(&listing, false).unwrap();
        assert_eq!(program.sets.len(), 1);

        let json = temp_file("load.json", &program.to_json().unwrap());
        let decoded = load_program(&json, false).unwrap();
        assert_eq!(decoded.sets, program.sets);
    }

    #[test]
    fn test_load_missing_file() {
        let err = load_program("/nonexistent/goby/file.gb", false).unwrap_err();
        assert!(err.to_string().starts_with("Failed to read"));
    }
}
