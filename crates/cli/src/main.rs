use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use itertools::Itertools;
use logbook::{logify, merge, ops, Config, FeedInput, Logbook, ParseError};

#[derive(Parser)]
#[command(name = "logbook-cli", about = "Reconstructs arrival/departure history from GTFS-Realtime snapshots")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Repeat for more verbose logging (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Command {
    /// Builds a logbook from a directory of raw GTFS-Realtime snapshots.
    Logify {
        /// Directory of snapshot files, read in filename order.
        input_dir: PathBuf,
        output_file: PathBuf,
        #[arg(long, value_enum, default_value_t = OutputFormat::Csv)]
        to: OutputFormat,
        #[arg(long, overrides_with = "no_clean")]
        clean: bool,
        #[arg(long, overrides_with = "clean")]
        no_clean: bool,
        #[arg(long, default_value_t = Config::default().cancellation_threshold_factor)]
        cancellation_threshold: f64,
    },
    /// Merges logbooks built from adjacent, contiguous time windows.
    Merge {
        /// CSV logbooks in strict ascending window order, followed by the output path.
        #[arg(required = true, num_args = 2..)]
        paths: Vec<PathBuf>,
        #[arg(long, value_enum, default_value_t = OutputFormat::Csv)]
        to: OutputFormat,
        #[arg(long, overrides_with = "no_clean")]
        clean: bool,
        #[arg(long, overrides_with = "clean")]
        no_clean: bool,
        #[arg(long, default_value_t = Config::default().cancellation_threshold_factor)]
        cancellation_threshold: f64,
    },
}

#[derive(Copy, Clone, ValueEnum)]
enum OutputFormat {
    Csv,
    Gtfs,
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

/// Post-processing is on by default; `--no-clean` is the only thing that
/// turns it off. `--clean` exists so the default can be spelled explicitly.
fn wants_clean(no_clean: bool) -> bool {
    !no_clean
}

fn report_parse_errors(parse_errors: &[ParseError]) {
    if parse_errors.is_empty() {
        return;
    }
    log::warn!("{} update(s) dropped during sanitisation", parse_errors.len());
    for error in parse_errors {
        log::debug!("{}", error);
    }
}

fn clean_logbook(logbook: Logbook, config: &Config) -> Logbook {
    let timestamps = ops::timestamps_from_logbook(&logbook);
    let mean_gap = ops::estimate_mean_update_gap(&timestamps);
    let threshold = mean_gap * config.cancellation_threshold_factor;
    let logbook = ops::cut_cancellations(logbook, threshold);
    let first_update_timestamp = ops::first_observed_timestamp(&logbook).unwrap_or(0);
    ops::discard_partial_logs(logbook, first_update_timestamp)
}

fn write_output(logbook: &Logbook, output_file: &PathBuf, format: OutputFormat) -> Result<(), Box<dyn std::error::Error>> {
    let file = fs::File::create(output_file)?;
    match format {
        OutputFormat::Csv => ops::to_csv(logbook, file)?,
        OutputFormat::Gtfs => ops::to_gtfs_stop_times(logbook, file)?,
    }
    Ok(())
}

fn read_snapshot_dir(input_dir: &PathBuf) -> Result<Vec<FeedInput>, Box<dyn std::error::Error>> {
    // Snapshot filenames are expected to sort into timestamp order (e.g.
    // zero-padded unix seconds); the sanitiser's monotonicity check will
    // reject anything this doesn't hold for.
    let paths: Vec<PathBuf> = fs::read_dir(input_dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .sorted()
        .collect();

    let mut inputs = Vec::with_capacity(paths.len());
    for path in paths {
        let bytes = fs::read(&path)?;
        inputs.push(FeedInput::Bytes(bytes));
    }
    Ok(inputs)
}

fn run_logify(
    input_dir: PathBuf,
    output_file: PathBuf,
    to: OutputFormat,
    no_clean: bool,
    cancellation_threshold: f64,
) -> Result<(), Box<dyn std::error::Error>> {
    let inputs = read_snapshot_dir(&input_dir)?;
    log::info!("read {} snapshot(s) from {:?}", inputs.len(), input_dir);

    let (logbook, _timestamps, parse_errors) = logify(inputs);
    report_parse_errors(&parse_errors);
    log::info!("built {} trip(s)", logbook.len());

    let config = Config {
        cancellation_threshold_factor: cancellation_threshold,
    };
    let logbook = if wants_clean(no_clean) {
        clean_logbook(logbook, &config)
    } else {
        logbook
    };

    write_output(&logbook, &output_file, to)?;
    Ok(())
}

fn run_merge(
    mut paths: Vec<PathBuf>,
    to: OutputFormat,
    no_clean: bool,
    cancellation_threshold: f64,
) -> Result<(), Box<dyn std::error::Error>> {
    let output_file = paths.pop().expect("clap enforces at least two paths");

    let mut windows = Vec::with_capacity(paths.len());
    for path in &paths {
        let file = fs::File::open(path)?;
        let window_logbook = ops::from_csv(file)?;
        let timestamps = ops::timestamps_from_logbook(&window_logbook);
        windows.push((window_logbook, timestamps));
    }

    let (logbook, _timestamps) = merge(windows)?;
    log::info!("merged into {} trip(s)", logbook.len());

    let config = Config {
        cancellation_threshold_factor: cancellation_threshold,
    };
    let logbook = if wants_clean(no_clean) {
        clean_logbook(logbook, &config)
    } else {
        logbook
    };

    write_output(&logbook, &output_file, to)?;
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Command::Logify {
            input_dir,
            output_file,
            to,
            clean: _,
            no_clean,
            cancellation_threshold,
        } => run_logify(input_dir, output_file, to, no_clean, cancellation_threshold),
        Command::Merge {
            paths,
            to,
            clean: _,
            no_clean,
            cancellation_threshold,
        } => run_merge(paths, to, no_clean, cancellation_threshold),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{}", err);
            ExitCode::FAILURE
        }
    }
}
