use std::io::{self, Write};
use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::filter::LevelFilter;

use parameter_rust::config::{parse_log_level, CliConfig, CliError};
use parameter_rust::logging::init_logging;
use parameter_rust::{Collection, ParameterError};

/// Load a parameter file and print every combination of its values.
#[derive(Parser, Debug)]
#[command(name = "parameter", version, about)]
struct Args {
    /// Configuration file to load.
    file: PathBuf,

    /// Print only the combination with this index.
    #[arg(long, conflicts_with = "size")]
    index: Option<usize>,

    /// Print only the number of combinations.
    #[arg(long)]
    size: bool,

    /// Log level (off, error, warn, info, debug, trace).
    #[arg(long, value_parser = parse_log_level)]
    log_level: Option<LevelFilter>,
}

fn main() {
    let args = Args::parse();

    let config = match build_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(2);
        }
    };
    init_logging(&config);

    if let Err(e) = run(&args) {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

fn build_config(args: &Args) -> Result<CliConfig, CliError> {
    let config = CliConfig::from_env()?;
    Ok(config.apply_overrides(args.log_level))
}

fn run(args: &Args) -> Result<(), ParameterError> {
    let mut collection = parameter_rust::load(&args.file)?;
    let stdout = io::stdout();
    let mut out = stdout.lock();

    if args.size {
        writeln!(out, "{}", collection.get_collection_size())?;
        return Ok(());
    }

    match args.index {
        Some(index) => print_combination(&mut collection, index, &mut out),
        None => {
            for index in 0..collection.get_collection_size() {
                print_combination(&mut collection, index, &mut out)?;
            }
            Ok(())
        }
    }
}

fn print_combination<W: Write>(
    collection: &mut Collection,
    index: usize,
    out: &mut W,
) -> Result<(), ParameterError> {
    collection.set_current_collection(index)?;
    writeln!(out, "collection id {} is:", index)?;
    collection.print_key_values(out)?;
    writeln!(out)?;
    Ok(())
}
