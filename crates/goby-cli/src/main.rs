//! Goby command-line driver
//!
//! Runs, checks and disassembles compiled Goby programs. Input is either the
//! labelled listing form or a JSON-encoded program.

mod commands;
mod output;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "goby")]
#[command(about = "Goby bytecode virtual machine", long_about = None)]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Colored output: auto, always, never
    #[arg(long, global = true)]
    color: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a compiled program
    Run {
        /// Listing or JSON program file
        file: String,
        /// Read the input as a JSON program regardless of its extension
        #[arg(long)]
        json: bool,
        /// Print the value left by the program
        #[arg(short, long)]
        print_result: bool,
    },

    /// Assemble and verify a program without running it
    Check {
        /// Listing or JSON program file
        file: String,
        /// Read the input as a JSON program regardless of its extension
        #[arg(long)]
        json: bool,
    },

    /// Print the listing form of a JSON program
    Disasm {
        /// JSON program file
        file: String,
    },

    /// Convert a listing into a JSON program
    Encode {
        /// Listing file
        file: String,
        /// Output path (defaults to stdout)
        #[arg(short, long)]
        output: Option<String>,
    },
}

fn init_logging(verbose: u8) {
    let mut builder = env_logger::Builder::from_default_env();
    match verbose {
        0 => {}
        1 => {
            builder.filter_level(log::LevelFilter::Debug);
        }
        _ => {
            builder.filter_level(log::LevelFilter::Trace);
        }
    }
    builder.init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let choice = output::resolve_color_choice(cli.color.as_deref());

    let result = match cli.command {
        Commands::Run {
            file,
            json,
            print_result,
        } => commands::run::execute(&file, json, print_result),
        Commands::Check { file, json } => commands::check::execute(&file, json, choice),
        Commands::Disasm { file } => commands::disasm::execute(&file),
        Commands::Encode { file, output } => commands::disasm::encode(&file, output.as_deref()),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            let mut out = output::StyledOutput::new(choice);
            out.stderr_error("error");
            out.stderr_plain(&format!(": {:#}\n", e));
            ExitCode::FAILURE
        }
    }
}
