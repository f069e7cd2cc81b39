//! MiniPascal compiler CLI
//!
//! Usage: mpc <input.pas> [-o output.ll]

use clap::Parser;
use colored::Colorize;
use minipascal::Driver;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "mpc")]
#[command(version = "0.1.0")]
#[command(about = "MiniPascal compiler - emits textual LLVM IR", long_about = None)]
struct Args {
    /// Input MiniPascal file (.pas)
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Output IR file (defaults to <input>.ll)
    #[arg(short, long, value_name = "OUTPUT")]
    output: Option<PathBuf>,

    /// Print tokens for debugging
    #[arg(long, default_value_t = false)]
    dump_tokens: bool,

    /// Print the AST in DOT form for debugging
    #[arg(long, default_value_t = false)]
    dump_ast: bool,

    /// Print the symbol tables for debugging
    #[arg(long, default_value_t = false)]
    dump_tables: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    // Validate input file extension
    if args.input.extension().map_or(true, |ext| ext != "pas") {
        eprintln!(
            "{}: input file must have .pas extension: {}",
            "error".red().bold(),
            args.input.display()
        );
        return ExitCode::FAILURE;
    }

    // Determine output path
    let output = args.output.unwrap_or_else(|| args.input.with_extension("ll"));

    // Read source file
    let source = match std::fs::read_to_string(&args.input) {
        Ok(s) => s,
        Err(e) => {
            eprintln!(
                "{}: could not read file '{}': {}",
                "error".red().bold(),
                args.input.display(),
                e
            );
            return ExitCode::FAILURE;
        }
    };

    // Create driver and compile
    let mut driver = Driver::new(source);
    driver.set_dump_tokens(args.dump_tokens);
    driver.set_dump_ast(args.dump_ast);
    driver.set_dump_tables(args.dump_tables);

    match driver.compile() {
        Ok(ir) => {
            // Write output
            if let Err(e) = std::fs::write(&output, &ir) {
                eprintln!(
                    "{}: could not write file '{}': {}",
                    "error".red().bold(),
                    output.display(),
                    e
                );
                return ExitCode::FAILURE;
            }

            println!(
                "{}: {} -> {}",
                "compiled".green().bold(),
                args.input.display(),
                output.display()
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            // Diagnostics carry their own formatting; print them as-is.
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}
