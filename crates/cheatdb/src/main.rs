//! CLI entry point for the cheat database tool.

use std::env;
use std::ffi::OsString;
use std::fs;
use std::path::PathBuf;

use cheat_core as _;
use cheatdb::commands::{check, convert, list};
use cheatdb::report::{format_diagnostic, summary};
use log as _;
#[cfg(test)]
use tempfile as _;

const USAGE_TEXT: &str = "\
Usage: cheatdb <command> <files...> [options]

Commands:
  check   <files...> [--driver <name>]                Load and validate every entry
  convert <files...> --driver <name> [-o <output>]    Rewrite in the current record format
  list    <files...> [--driver <name>]                List loaded entries

Options:
  -d, --driver <name>  Keep only records for this driver
  -o, --output <file>  Output file path (convert only, default: stdout)
  -h, --help           Show this help message

Logging is controlled through RUST_LOG.

Examples:
  cheatdb check cheat.dat
  cheatdb convert old.dat --driver pacman -o pacman.dat
  cheatdb list cheat.dat extra.dat -d galaga
";

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Check(InputArgs),
    Convert(ConvertArgs),
    List(InputArgs),
}

#[derive(Debug, PartialEq, Eq)]
struct InputArgs {
    inputs: Vec<PathBuf>,
    driver: Option<String>,
}

#[derive(Debug, PartialEq, Eq)]
struct ConvertArgs {
    inputs: Vec<PathBuf>,
    driver: String,
    output: Option<PathBuf>,
}

#[derive(Debug)]
enum ParseResult {
    Command(Command),
    Help,
}

fn parse_args(mut args: impl Iterator<Item = OsString>) -> Result<ParseResult, String> {
    let first = args.next().ok_or_else(|| "missing command".to_string())?;

    if first == "--help" || first == "-h" {
        return Ok(ParseResult::Help);
    }

    let command_str = first.to_string_lossy().to_string();

    match command_str.as_str() {
        "check" => parse_input_args(args, false)
            .map(|(args, _)| Command::Check(args))
            .map(ParseResult::Command),
        "convert" => parse_convert_args(args)
            .map(Command::Convert)
            .map(ParseResult::Command),
        "list" => parse_input_args(args, false)
            .map(|(args, _)| Command::List(args))
            .map(ParseResult::Command),
        other => Err(format!("unknown command: {other}")),
    }
}

#[allow(clippy::while_let_on_iterator)]
fn parse_input_args(
    mut args: impl Iterator<Item = OsString>,
    allow_output: bool,
) -> Result<(InputArgs, Option<PathBuf>), String> {
    let mut inputs = Vec::new();
    let mut driver: Option<String> = None;
    let mut output: Option<PathBuf> = None;

    while let Some(arg) = args.next() {
        if arg == "--help" || arg == "-h" {
            return Err(USAGE_TEXT.to_string());
        }

        if arg == "-d" || arg == "--driver" {
            let value = args
                .next()
                .ok_or_else(|| "missing value for --driver".to_string())?;
            driver = Some(value.to_string_lossy().to_string());
            continue;
        }

        if allow_output && (arg == "-o" || arg == "--output") {
            let value = args
                .next()
                .ok_or_else(|| "missing value for -o".to_string())?;
            output = Some(PathBuf::from(value));
            continue;
        }

        if arg.to_string_lossy().starts_with('-') {
            return Err(format!("unknown option: {}", arg.to_string_lossy()));
        }

        inputs.push(PathBuf::from(arg));
    }

    if inputs.is_empty() {
        return Err("missing input path".to_string());
    }
    Ok((InputArgs { inputs, driver }, output))
}

fn parse_convert_args(args: impl Iterator<Item = OsString>) -> Result<ConvertArgs, String> {
    let (input, output) = parse_input_args(args, true)?;
    let driver = input
        .driver
        .ok_or_else(|| "convert requires --driver".to_string())?;
    Ok(ConvertArgs {
        inputs: input.inputs,
        driver,
        output,
    })
}

fn run_check(args: &InputArgs) -> Result<(), i32> {
    let outcome = match check(&args.inputs, args.driver.as_deref()) {
        Ok(outcome) => outcome,
        Err(e) => {
            eprintln!("error: {e}");
            return Err(1);
        }
    };

    for diagnostic in &outcome.report.diagnostics {
        eprintln!("{}", format_diagnostic(diagnostic));
    }
    for problem in &outcome.problems {
        println!("{problem}");
    }
    println!("{}", summary(&outcome.report));

    if outcome.is_clean() {
        Ok(())
    } else {
        Err(1)
    }
}

fn run_convert(args: ConvertArgs) -> Result<(), i32> {
    let outcome = match convert(&args.inputs, &args.driver) {
        Ok(outcome) => outcome,
        Err(e) => {
            eprintln!("error: {e}");
            return Err(1);
        }
    };

    for diagnostic in &outcome.report.diagnostics {
        eprintln!("warning: skipped {}", format_diagnostic(diagnostic));
    }

    match args.output {
        Some(path) => {
            if let Err(e) = fs::write(&path, &outcome.text) {
                eprintln!("error: failed to write output: {e}");
                return Err(1);
            }
            println!(
                "Converted {} entries -> {}",
                outcome.report.entries_loaded,
                path.display()
            );
        }
        None => print!("{}", outcome.text),
    }

    Ok(())
}

fn run_list(args: &InputArgs) -> Result<(), i32> {
    match list(&args.inputs, args.driver.as_deref()) {
        Ok(lines) => {
            for line in lines {
                println!("{line}");
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("error: {e}");
            Err(1)
        }
    }
}

fn main() {
    env_logger::init();

    let exit_code = match parse_args(env::args_os().skip(1)) {
        Ok(ParseResult::Help) => {
            println!("{USAGE_TEXT}");
            0
        }
        Ok(ParseResult::Command(Command::Check(args))) => match run_check(&args) {
            Ok(()) => 0,
            Err(code) => code,
        },
        Ok(ParseResult::Command(Command::Convert(args))) => match run_convert(args) {
            Ok(()) => 0,
            Err(code) => code,
        },
        Ok(ParseResult::Command(Command::List(args))) => match run_list(&args) {
            Ok(()) => 0,
            Err(code) => code,
        },
        Err(error) => {
            if error.starts_with("Usage:") {
                println!("{error}");
            } else {
                eprintln!("error: {error}");
                eprintln!("{USAGE_TEXT}");
            }
            1
        }
    };

    std::process::exit(exit_code);
}
