use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use cvwater_service::config::RunConfig;
use cvwater_service::logging::{self, init_logger, Stage};
use cvwater_service::model::{Result, WaterError};
use cvwater_service::{pipeline, verify};

#[derive(Parser, Debug)]
#[command(name = "cvwater", version, about = "Central Valley water availability pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Runs the full pipeline and writes every output.
    Run {
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Checks which configured stations have usable CSV files.
    Verify {
        #[arg(long)]
        config: Option<PathBuf>,
        /// Write the JSON report here instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Prints the effective configuration as TOML.
    Config {
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match dispatch(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            logging::error(Stage::System, None, &e.to_string());
            eprintln!("error: {}", e);
            let mut source = std::error::Error::source(&e);
            while let Some(cause) = source {
                eprintln!("  caused by: {}", cause);
                source = cause.source();
            }
            ExitCode::FAILURE
        }
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<RunConfig> {
    let config = RunConfig::load(path.map(PathBuf::as_path))?;
    init_logger(
        config.logging.level,
        config.logging.file.as_deref(),
        config.logging.timestamps,
    );
    Ok(config)
}

fn dispatch(command: Commands) -> Result<()> {
    match command {
        Commands::Run { config } => {
            let config = load_config(config.as_ref())?;
            let summary = pipeline::run(&config)?;
            println!(
                "Loaded {} stations ({} skipped) over {} days",
                summary.stations_loaded, summary.stations_skipped, summary.days
            );
            for path in &summary.outputs {
                println!("  wrote {}", path.display());
            }
            Ok(())
        }
        Commands::Verify { config, output } => {
            let config = load_config(config.as_ref())?;
            let report = verify::verify_station_files(&config);
            let json = serde_json::to_string_pretty(&report)?;
            match output {
                Some(path) => {
                    fs::write(&path, json).map_err(|e| WaterError::io(&path, e))?;
                    verify::print_summary(&report);
                }
                None => println!("{}", json),
            }
            Ok(())
        }
        Commands::Config { config } => {
            let config = load_config(config.as_ref())?;
            print!("{}", config.to_toml_string()?);
            Ok(())
        }
    }
}
