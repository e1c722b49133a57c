//! `brisk` - the Brisk scripting language CLI (spec.md §6).
//!
//! Usage:
//!   brisk                 # start an interactive REPL
//!   brisk script.brisk    # run a script file
//!   brisk -v | --version  # print the version and exit
//!
//! Exit codes: 0 on clean completion, 1 on parse or runtime error, or
//! whatever the script's own `exit()` built-in requests.

mod config;

use brisk_core::memory_stats;
use brisk_eval::{BriskError, Interpreter};
use clap::Parser as ClapParser;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(ClapParser)]
#[command(name = "brisk")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Brisk: a dynamically-typed scripting language with direct C FFI", long_about = None)]
struct Cli {
    /// Script to run; with no file, starts a REPL
    file: Option<PathBuf>,

    /// Print live heap-object counts and bytes allocated on exit
    #[arg(long)]
    stats: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .without_time()
        .init();

    let cli = Cli::parse();

    let mut interp = Interpreter::new();
    let cfg = config::Config::load();
    interp.configure_headers(cfg.headers.include_dirs.clone(), cfg.library_hint_pairs());

    let code = match &cli.file {
        Some(path) => run_script(&mut interp, path),
        None => run_repl(&mut interp),
    };

    if cli.stats {
        print_stats();
    }

    ExitCode::from(code)
}

fn run_script(interp: &mut Interpreter, path: &PathBuf) -> u8 {
    let source = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("brisk: could not read '{}': {e}", path.display());
            return 1;
        }
    };

    let program = match brisk_eval::Parser::new(&source) {
        Ok(mut parser) => match parser.parse_program() {
            Ok(program) => program,
            Err(errors) => {
                for e in &errors {
                    eprintln!("{e}");
                }
                return 1;
            }
        },
        Err(e) => {
            eprintln!("{e}");
            return 1;
        }
    };

    match interp.run(&program) {
        Ok(_) => 0,
        Err(e) => {
            eprintln!("{e}");
            1
        }
    }
}

/// Line-oriented REPL using a persistent interpreter, so closures and
/// top-level definitions survive across inputs (spec.md §7: "The latch is
/// also cleared by the REPL between inputs" — an error on one line does not
/// end the session).
fn run_repl(interp: &mut Interpreter) -> u8 {
    let mut editor = match DefaultEditor::new() {
        Ok(e) => e,
        Err(e) => {
            eprintln!("brisk: could not start line editor: {e}");
            return 1;
        }
    };

    println!("brisk {} -- :quit or Ctrl-D to exit", env!("CARGO_PKG_VERSION"));

    loop {
        match editor.readline("brisk> ") {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                if trimmed == ":quit" || trimmed == ":q" {
                    break;
                }
                let _ = editor.add_history_entry(trimmed);
                eval_line(interp, trimmed);
            }
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("brisk: readline error: {e}");
                break;
            }
        }
    }
    0
}

fn eval_line(interp: &mut Interpreter, line: &str) {
    let mut parser = match brisk_eval::Parser::new(line) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("{e}");
            return;
        }
    };
    let program = match parser.parse_program() {
        Ok(p) => p,
        Err(errors) => {
            for e in &errors {
                eprintln!("{e}");
            }
            return;
        }
    };
    match interp.run(&program) {
        Ok(v) => {
            if !matches!(v, brisk_core::Value::Nil) {
                println!("{}", v.to_display_string());
            }
        }
        Err(e) => report(&e),
    }
}

fn report(e: &BriskError) {
    eprintln!("{e}");
}

fn print_stats() {
    let counts = memory_stats::live_counts();
    eprintln!(
        "live objects: {} (strings {}, arrays {}, tables {}, functions {}, natives {}, pointers {}, cstructs {}, cfunctions {})",
        counts.total(),
        counts.strings,
        counts.arrays,
        counts.tables,
        counts.functions,
        counts.natives,
        counts.pointers,
        counts.cstructs,
        counts.cfunctions,
    );
    eprintln!("bytes allocated (cumulative): {}", memory_stats::bytes_allocated());
}
