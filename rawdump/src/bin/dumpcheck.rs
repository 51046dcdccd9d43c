use std::fs;
use std::io::{self, BufReader};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser};
use log::{error, info};

use rawdump::cli::init_logging;
use rawdump::{EXIT_FAILURE, ExportReader, StreamEvent};

/// Check an export stream produced by `rawdump` and print a summary of it
#[derive(Parser, Debug)]
#[command(name = "dumpcheck")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// The dump to read, STDIN if omitted
    #[arg(value_name = "DUMP")]
    path: Option<PathBuf>,

    /// Print one line per scan
    #[arg(short, long)]
    scans: bool,

    /// Verbosity level (-v for info, -vv for debug)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let reader: Box<dyn io::BufRead> = match &cli.path {
        Some(path) => match fs::File::open(path) {
            Ok(fh) => Box::new(BufReader::new(fh)),
            Err(e) => {
                error!("Could not open {}: {e}", path.display());
                return ExitCode::from(EXIT_FAILURE);
            }
        },
        None => Box::new(io::stdin().lock()),
    };

    let mut announced = None;
    let mut records = 0usize;
    let mut fragmentation = 0usize;
    let mut points = 0usize;
    let mut payload_bytes = 0usize;
    let mut mislabeled = Vec::new();
    let mut errors = Vec::new();

    for event in ExportReader::new(reader) {
        match event {
            Ok(StreamEvent::ScanCount(n)) => announced = Some(n),
            Ok(StreamEvent::Scan(record)) => {
                records += 1;
                points += record.data_points();
                payload_bytes += record.payload_len();
                if record.kind().is_fragmentation() != record.precursor.is_some() {
                    mislabeled.push(record.scan_number);
                }
                if let Some(precursor) = &record.precursor {
                    fragmentation += 1;
                    if cli.scans {
                        println!(
                            "{}\t{:.4}\t{}\t{:.4}\t{}",
                            record.scan_number,
                            record.retention_time,
                            record.peaks.len(),
                            precursor.mz,
                            precursor.charge
                        );
                    }
                } else if cli.scans {
                    println!(
                        "{}\t{:.4}\t{}",
                        record.scan_number,
                        record.retention_time,
                        record.peaks.len()
                    );
                }
            }
            Ok(StreamEvent::Error(message)) => errors.push(message),
            Err(e) => {
                error!("Malformed stream after {records} records: {e}");
                return ExitCode::from(EXIT_FAILURE);
            }
        }
    }

    match announced {
        Some(n) => println!("Announced scans: {n}"),
        None => println!("Announced scans: -"),
    }
    println!("Records: {records}");
    println!("MS/MS records: {fragmentation}");
    println!("Data points: {points} ({payload_bytes} bytes)");
    for message in errors.iter() {
        println!("ERROR: {message}");
    }

    if !errors.is_empty() {
        return ExitCode::from(EXIT_FAILURE);
    }
    if !mislabeled.is_empty() {
        error!("PRECURSOR line does not match the scan filter for scans {mislabeled:?}");
        return ExitCode::from(EXIT_FAILURE);
    }
    if announced != Some(records as i64) {
        error!(
            "Stream announced {} scans but holds {records} records",
            announced.unwrap_or_default()
        );
        return ExitCode::from(EXIT_FAILURE);
    }
    info!("Stream is complete");
    ExitCode::SUCCESS
}
