//! Veighty Machinery - CLI
//!
//! With no subcommand, serves the interactive session on stdin/stdout.
//! `run`, `asm` and `disasm` work on program files directly.

use std::error::Error;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use veighty_core::bytecode::disassemble;
use veighty_core::{assemble, Machine, ProgramLoader, Sandbox, SwapCheck};
use veighty_vol::{HarnessConfig, Session, Watchdog};

type CliResult = Result<(), Box<dyn Error>>;

#[derive(Parser, Debug)]
#[command(name = "veighty", version, about = "Tagged-stack bytecode machine")]
struct Cli {
    /// TOML file with harness settings and a [vm] table
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory confining writefile/readfile
    #[arg(long, global = true)]
    sandbox_dir: Option<PathBuf>,

    /// Make swap demand two live cells
    #[arg(long, global = true)]
    hardened_swap: bool,

    /// Disable the session watchdog
    #[arg(long, global = true)]
    no_timeout: bool,

    /// Skip the prompt and writefile pauses
    #[arg(long, global = true)]
    no_delay: bool,

    /// Trace every executed instruction on stderr
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Read a length and bytecode from stdin, then run it (default)
    Serve,
    /// Run a raw bytecode file with stdin as its input
    Run { program: PathBuf },
    /// Assemble a text program into bytecode
    Asm {
        source: PathBuf,
        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// List the instructions in a bytecode file
    Disasm { program: PathBuf },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    let result = load_config(&cli).and_then(|config| match &cli.command {
        None | Some(Command::Serve) => serve(config),
        Some(Command::Run { program }) => run_file(config, program),
        Some(Command::Asm { source, output }) => asm(source, output.as_deref()),
        Some(Command::Disasm { program }) => disasm(program),
    });

    if let Err(e) = result {
        eprintln!("{}", e);
        process::exit(1);
    }
}

fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::new("trace")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(io::stderr))
        .init();
}

/// File settings first, then flag overrides.
fn load_config(cli: &Cli) -> Result<HarnessConfig, Box<dyn Error>> {
    let mut config = match &cli.config {
        Some(path) => HarnessConfig::from_file(path)?,
        None => HarnessConfig::default(),
    };
    if let Some(dir) = &cli.sandbox_dir {
        config.vm.sandbox_dir = dir.clone();
    }
    if cli.hardened_swap {
        config.vm.swap_check = SwapCheck::Hardened;
    }
    if cli.no_timeout {
        config.timeout_secs = 0;
    }
    if cli.no_delay {
        config.prompt_delay_ms = 0;
        config.vm.file_write_delay_ms = 0;
    }
    config.validate()?;
    debug!(?config, "configuration loaded");
    Ok(config)
}

fn serve(config: HarnessConfig) -> CliResult {
    let _watchdog = config.timeout().map(Watchdog::arm);
    let session = Session::new(config)?;

    let stdin = io::stdin();
    let stdout = io::stdout();
    session.serve(&mut stdin.lock(), &mut stdout.lock())?;
    Ok(())
}

fn run_file(config: HarnessConfig, path: &Path) -> CliResult {
    Sandbox::new(&config.vm).ensure_root()?;
    let image = ProgramLoader::load_file(path, &config.vm)?;
    let mut machine = Machine::initialize(config.vm)?;
    machine.load_program(&image)?;

    let stdin = io::stdin();
    let stdout = io::stdout();
    let summary = machine.run(&mut stdin.lock(), &mut stdout.lock());
    debug!(cycles = summary.cycles, reason = ?summary.reason, "program finished");
    Ok(())
}

fn asm(source: &Path, output: Option<&Path>) -> CliResult {
    let text = fs::read_to_string(source)?;
    let bytes = assemble(&text)?;
    match output {
        Some(path) => fs::write(path, &bytes)?,
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(&bytes)?;
            stdout.flush()?;
        }
    }
    Ok(())
}

fn disasm(path: &Path) -> CliResult {
    let bytes = fs::read(path)?;
    let mut stdout = io::stdout().lock();
    for line in disassemble(&bytes) {
        writeln!(stdout, "{}", line)?;
    }
    Ok(())
}
