use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use uncar::extract::extract;
use uncar::list::list;

#[derive(Parser)]
#[command(name = "uncar", about = "Extract AT Protocol repository CAR files", version, disable_version_flag = true)]
struct Cli {
    /// Print version
    #[arg(short = 'v', long, action = ArgAction::Version)]
    version: Option<bool>,
    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract all records from CAR file to JSON files
    Extract {
        /// Path of the CAR file
        car_file: PathBuf,
        /// Directory to save extracted JSON files (default: CAR file name without extension)
        output_dir: Option<PathBuf>,
    },
    /// List all records in the CAR file
    List {
        /// Path of the CAR file
        car_file: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.quiet);

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(command: Commands) -> Result<(), Box<dyn std::error::Error>> {
    match command {

        // ── Extract ──────────────────────────────────────────────────────────
        Commands::Extract { car_file, output_dir } => {
            let report = extract(&car_file, output_dir.as_deref())?;
            tracing::info!("{}", report.summary());
            println!("Extracted {} records", report.records_written);
            if let Some(commit) = report.commit {
                println!("Commit: {commit}");
            }
            println!("Repository data written to: {}", report.output_dir.display());
        }

        // ── List ─────────────────────────────────────────────────────────────
        Commands::List { car_file } => {
            let stdout = std::io::stdout();
            list(&car_file, stdout.lock())?;
        }
    }

    Ok(())
}

// ── helpers ──────────────────────────────────────────────────────────────────

fn init_logging(quiet: bool) {
    let default = if quiet { "warn" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
