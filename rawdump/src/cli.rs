use std::ffi::OsString;
use std::io::Write;
use std::path::PathBuf;

use clap::error::ErrorKind;
use clap::{ArgAction, Parser};
use log::error;

use crate::config::{ExportConfig, RetrievalPolicy, ScanNumbering};
use crate::controller::RunController;
use crate::error::{EXIT_SUCCESS, ExportError};
use crate::source::SourceProvider;
use crate::writer::RecordEmitter;

/// Dump every scan of a RAW file to STDOUT as text headers followed by binary peak lists
#[derive(Parser, Debug)]
#[command(name = "rawdump")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// The RAW file to read
    #[arg(value_name = "RAW_FILE")]
    pub path: PathBuf,

    /// Stop instead of writing placeholder values when a scan header or peak list
    /// can't be read
    #[arg(long)]
    pub strict: bool,

    /// Walk the scan numbers the file reports rather than 1..=N
    #[arg(long)]
    pub reported_range: bool,

    /// Verbosity level on STDERR (-v for info, -vv for debug)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    pub fn config(&self) -> ExportConfig {
        let mut config = ExportConfig::default();
        if self.strict {
            config = config.with_retrieval(RetrievalPolicy::Strict);
        }
        if self.reported_range {
            config = config.with_numbering(ScanNumbering::Reported);
        }
        config
    }
}

/// Route `log` output to STDERR, keeping STDOUT for the export stream. `RUST_LOG`
/// takes precedence over `verbose`.
pub fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .try_init();
}

fn report<W: Write>(emitter: &mut RecordEmitter<W>, e: &ExportError) -> u8 {
    if let Err(io_err) = emitter.write_error(e) {
        error!("Could not report the failure on the output stream: {io_err}");
    }
    e.exit_code()
}

/// The whole command line program: parse `args`, bring up a data source session with
/// `start`, export to `writer` and return the process exit code.
///
/// Argument errors and session failures are reported in-band like any other fatal
/// condition. `start` is not called unless the arguments are valid.
pub fn run<I, T, P, F, W>(args: I, writer: W, start: F) -> u8
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
    P: SourceProvider,
    F: FnOnce() -> Result<P, ExportError>,
    W: Write,
{
    let mut emitter = RecordEmitter::new(writer);

    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            let _ = e.print();
            return EXIT_SUCCESS;
        }
        Err(_) => return report(&mut emitter, &ExportError::Argument),
    };
    init_logging(cli.verbose);

    let provider = match start() {
        Ok(provider) => provider,
        Err(e) => return report(&mut emitter, &e),
    };

    let mut controller = RunController::new(provider, cli.config());
    controller.execute(&cli.path, &mut emitter)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::error::EXIT_FAILURE;
    use crate::memory::{MemoryProvider, MemoryScan, MemorySource};

    fn provider() -> Result<MemoryProvider, ExportError> {
        let source = MemorySource::from_scans([MemoryScan::new("Full ms ", 0.5, vec![])]);
        Ok(MemoryProvider::new().with_file("small.RAW", source))
    }

    #[test]
    fn test_argument_count() {
        let mut out = Vec::new();
        let code = run(["rawdump"], &mut out, provider);
        assert_eq!(code, EXIT_FAILURE);
        assert_eq!(out, b"ERROR: This program accepts exactly 1 argument\n".to_vec());

        let mut out = Vec::new();
        let code = run(["rawdump", "a.RAW", "b.RAW"], &mut out, provider);
        assert_eq!(code, EXIT_FAILURE);
        assert_eq!(out, b"ERROR: This program accepts exactly 1 argument\n".to_vec());
    }

    #[test]
    fn test_session_not_started_on_bad_arguments() {
        let mut out = Vec::new();
        let code = run(["rawdump"], &mut out, || -> Result<MemoryProvider, ExportError> {
            panic!("session should not start")
        });
        assert_eq!(code, EXIT_FAILURE);
    }

    #[test]
    fn test_session_failure() {
        let mut out = Vec::new();
        let code = run(["rawdump", "small.RAW"], &mut out, || {
            Err::<MemoryProvider, _>(ExportError::AdapterInit("hostfxr not found".into()))
        });
        assert_eq!(code, EXIT_FAILURE);
        assert_eq!(
            out,
            b"ERROR: Unable to initialize the RAW file reader runtime: hostfxr not found\n".to_vec()
        );
    }

    #[test]
    fn test_successful_export() {
        let mut out = Vec::new();
        let code = run(["rawdump", "small.RAW"], &mut out, provider);
        assert_eq!(code, EXIT_SUCCESS);
        assert_eq!(
            out,
            b"NUMBER OF SCANS: 1\nSCAN NUMBER: 1\nSCAN FILTER: Full ms \nRETENTION TIME: 0.500000\nDATA POINTS: 0\n"
                .to_vec()
        );
    }

    #[test]
    fn test_flags() {
        let cli = Cli::try_parse_from(["rawdump", "--strict", "--reported-range", "x.RAW"]).unwrap();
        let config = cli.config();
        assert!(config.is_strict());
        assert_eq!(config.numbering, ScanNumbering::Reported);

        let cli = Cli::try_parse_from(["rawdump", "x.RAW"]).unwrap();
        assert_eq!(cli.config(), ExportConfig::default());
    }
}
