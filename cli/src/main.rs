use anyhow::Context as _;
use clap::{Parser, Subcommand};
use cli::driver::{run_script, DriverOptions};
use cli::{init_tracing, repl, resolve_max_depth};
use engine::Mode;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "ub", version, about = "Apply transformations under binders", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Keep undetermined lemma parameters as new goals instead of failing
    #[arg(long, global = true)]
    deferred: bool,

    /// Deepest number of binders a search may strip (falls back to UB_MAX_DEPTH)
    #[arg(long, global = true)]
    max_depth: Option<usize>,

    /// Log engine decisions to stderr (overrides UB_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a script and print its transcript
    Run {
        /// Script file
        file: PathBuf,
    },
    /// Read commands interactively
    Repl,
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let options = DriverOptions {
        mode: if cli.deferred {
            Mode::Deferred
        } else {
            Mode::Eager
        },
        max_depth: resolve_max_depth(cli.max_depth),
    };

    match cli.command {
        Commands::Run { file } => {
            let source = fs::read_to_string(&file)
                .with_context(|| format!("cannot read {}", file.display()))?;
            let transcript = run_script(&source, options);
            print!("{}", transcript.output);
            Ok(if transcript.failed {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            })
        }
        Commands::Repl => {
            repl::start(options)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}
