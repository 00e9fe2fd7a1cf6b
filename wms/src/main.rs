//! WMS command-line host

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use wms::error::report_error;
use wms::{Runtime, RuntimeConfig, WmsError};

#[derive(Parser)]
#[command(name = "wms", version, about = "WMS script runner")]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a script's `main` function
    Run {
        /// Script to run
        file: PathBuf,
        /// TOML file with runtime limits
        #[arg(long)]
        config: Option<PathBuf>,
        /// String pool capacity
        #[arg(long)]
        string_pool: Option<usize>,
        /// Array pool capacity
        #[arg(long)]
        array_pool: Option<usize>,
        /// Maximum call depth
        #[arg(long)]
        max_depth: Option<usize>,
    },
    /// Parse and dump AST (debug)
    Parse {
        /// Script to parse
        file: PathBuf,
    },
    /// Tokenize and dump tokens (debug)
    Tokens {
        /// Script to tokenize
        file: PathBuf,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Command::Run {
            file,
            config,
            string_pool,
            array_pool,
            max_depth,
        } => load_config(config.as_deref()).and_then(|mut config| {
            if let Some(n) = string_pool {
                config.string_pool_capacity = n;
            }
            if let Some(n) = array_pool {
                config.array_pool_capacity = n;
            }
            if let Some(n) = max_depth {
                config.max_call_depth = n;
            }
            run_file(&file, config)
        }),
        Command::Parse { file } => parse_file(&file),
        Command::Tokens { file } => tokenize_file(&file),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn load_config(path: Option<&Path>) -> Result<RuntimeConfig, WmsError> {
    match path {
        Some(path) => RuntimeConfig::load(path),
        None => Ok(RuntimeConfig::default()),
    }
}

/// Read a script, reporting parse failures with source context
fn load_program(path: &Path) -> Result<(String, wms::ast::Program), WmsError> {
    let source = std::fs::read_to_string(path)?;
    match wms::parse(&source) {
        Ok(program) => Ok((source, program)),
        Err(e) => {
            report_error(&path.display().to_string(), &source, &e);
            std::process::exit(1);
        }
    }
}

fn run_file(path: &Path, config: RuntimeConfig) -> Result<(), WmsError> {
    let (source, program) = load_program(path)?;
    let mut runtime = Runtime::new(program, config);
    if !runtime.run() {
        if let Some(error) = runtime.last_error() {
            let error = WmsError::Runtime(error.clone());
            report_error(&path.display().to_string(), &source, &error);
        }
        std::process::exit(1);
    }
    Ok(())
}

fn parse_file(path: &Path) -> Result<(), WmsError> {
    let (_, program) = load_program(path)?;
    match serde_json::to_string_pretty(&program) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
    Ok(())
}

fn tokenize_file(path: &Path) -> Result<(), WmsError> {
    let source = std::fs::read_to_string(path)?;
    let tokens = match wms::lexer::tokenize(&source) {
        Ok(tokens) => tokens,
        Err(e) => {
            report_error(&path.display().to_string(), &source, &e);
            std::process::exit(1);
        }
    };
    for (tok, span) in &tokens {
        println!("{tok:?} @ {}..{}", span.start, span.end);
    }
    Ok(())
}
