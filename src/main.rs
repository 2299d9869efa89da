use std::io;
use std::path::{Path, PathBuf};
use std::process::{exit, Command};

use clap::Parser;

use smallc::assembly::CompileOptions;
use smallc::code_gen::GeneratedCode;
use smallc::common::CompileError;
use smallc::compiler::compile_file;
use smallc::vm::Vm;

/// Compile SMALL programs to Jasmin assembler listings
#[derive(Parser, Debug)]
#[command(name = "smallc", version, about, long_about = None)]
struct Cli {
    /// Directory the `.j` listings are written to
    #[arg(short, long, default_value = ".")]
    output: PathBuf,

    /// Assembler command run on each listing that compiled cleanly
    #[arg(long)]
    assembler: Option<String>,

    /// Execute each program after compiling it
    #[arg(long)]
    run: bool,

    /// Class that library calls are made on
    #[arg(long)]
    library: Option<String>,

    /// Source files
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

fn assemble(command: &str, listing: &Path) -> Result<(), CompileError> {
    let mut words = command.split_whitespace();
    let program = words.next().unwrap_or(command);
    let status = Command::new(program)
        .args(words)
        .arg(listing)
        .status()
        .map_err(|source| CompileError::AssemblerSpawn {
            command: command.to_string(),
            source,
        })?;
    if !status.success() {
        return Err(CompileError::AssemblerFailed {
            command: command.to_string(),
            path: listing.to_path_buf(),
        });
    }
    Ok(())
}

fn execute(code: &GeneratedCode) -> Result<(), CompileError> {
    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut vm = Vm::new(stdin.lock(), stdout.lock());
    vm.run(code)?;
    Ok(())
}

fn process(path: &Path, cli: &Cli, options: &CompileOptions) -> Result<(), CompileError> {
    let (listing, code) = compile_file(path, &cli.output, options)?;
    if let Some(command) = &cli.assembler {
        assemble(command, &listing)?;
    }
    if cli.run {
        execute(&code)?;
    }
    Ok(())
}

fn main() {
    use tracing_subscriber::{fmt, EnvFilter};

    // RUST_LOG controls the level; warnings only by default
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("warn"))
        .unwrap();

    fmt()
        .compact()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    let cli = Cli::parse();
    let mut options = CompileOptions::default();
    if let Some(library) = &cli.library {
        options.library_class = library.clone();
    }

    let mut failed = 0;
    for path in &cli.files {
        tracing::info!(file = %path.display(), "compiling");
        if let Err(e) = process(path, &cli, &options) {
            eprintln!("{}", e);
            failed += 1;
        }
    }
    if failed > 0 {
        exit(1);
    }
}
