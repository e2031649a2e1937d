//! Jack Compiler CLI
//!
//! Command-line interface for compiling .jack classes to Hack VM files.

use clap::{CommandFactory, Parser as ClapParser};
use clap_complete::{Shell, generate};
use jackc::BuildOptions;
use std::io;
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

#[derive(ClapParser)]
#[command(name = "jackc")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Jack compiler - compile .jack classes to Hack VM code", long_about = None)]
struct Cli {
    /// Input .jack source files; the set must include Main.jack
    #[arg(required_unless_present = "completions")]
    files: Vec<PathBuf>,

    /// Write a JSON dump of each class AST next to its input
    #[arg(long)]
    viz_ast: bool,

    /// Write a JSON dump of each symbol table next to its input
    #[arg(long)]
    viz_checker: bool,

    /// Generate a shell completion script and exit
    #[arg(long, value_enum, value_name = "SHELL")]
    completions: Option<Shell>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    if let Some(shell) = cli.completions {
        generate(shell, &mut Cli::command(), "jackc", &mut io::stdout());
        return;
    }

    if let Err(message) = validate_inputs(&cli.files) {
        eprintln!("Error: {}", message);
        process::exit(1);
    }

    let options = BuildOptions {
        viz_ast: cli.viz_ast,
        viz_checker: cli.viz_checker,
    };

    match jackc::compile_files(&cli.files, &options) {
        Ok(outputs) => {
            for (input, output) in outputs {
                println!("Compiled {} -> {}", input.display(), output.display());
            }
        }
        Err(errors) => {
            for error in errors {
                eprintln!("Error: {}", error);
            }
            process::exit(1);
        }
    }
}

/// Every input must be an existing `.jack` file, and one of them must be
/// `Main.jack` (case-sensitive).
fn validate_inputs(files: &[PathBuf]) -> Result<(), String> {
    for path in files {
        if path.extension().is_none_or(|ext| ext != "jack") {
            return Err(format!(
                "{} is not a .jack source file",
                path.display()
            ));
        }
        if !path.exists() {
            return Err(format!("{} does not exist", path.display()));
        }
    }
    let has_main = files
        .iter()
        .any(|p| p.file_name().is_some_and(|n| n == "Main.jack"));
    if !has_main {
        return Err("Missing 'Main.jack'".to_string());
    }
    Ok(())
}
