use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::source::SourceError;

/// Process outcome of a successful export
pub const EXIT_SUCCESS: u8 = 0;
/// Process outcome of any fatal condition
pub const EXIT_FAILURE: u8 = 1;

/// Every way a run can fail. All of these are fatal: the export stops where it is, a
/// single `ERROR:` line carrying the [`Display`](std::fmt::Display) text is written to
/// the output stream and the process exits with [`EXIT_FAILURE`].
#[derive(Debug, Error)]
pub enum ExportError {
    /// Wrong number of command line arguments
    #[error("This program accepts exactly 1 argument")]
    Argument,

    /// The runtime hosting the data source could not be brought up
    #[error("Unable to initialize the RAW file reader runtime: {0}")]
    AdapterInit(String),

    #[error("Unable to open RAW file {}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: SourceError,
    },

    /// The data source could not report a usable scan range
    #[error("{}", range_message(.0))]
    Range(#[source] SourceError),

    #[error("Could not extract scan filter line for scan #{0}")]
    MissingFilter(i64),

    #[error("Could not read the header of scan #{scan}: {source}")]
    Header {
        scan: i64,
        #[source]
        source: SourceError,
    },

    #[error("Could not read the peak list of scan #{scan}: {source}")]
    PeakList {
        scan: i64,
        #[source]
        source: SourceError,
    },

    #[error("Error trying to close the RAW file")]
    Close(#[source] SourceError),

    /// Writing to the output stream failed
    #[error("Unable to write the export stream: {0}")]
    Io(#[from] io::Error),
}

fn range_message(source: &SourceError) -> String {
    match source {
        SourceError::FirstScanUnavailable => format!("Unable to get first scan: {source}"),
        SourceError::LastScanUnavailable => format!("Unable to get last scan: {source}"),
        _ => format!("Unable to get the scan range: {source}"),
    }
}

impl ExportError {
    pub fn exit_code(&self) -> u8 {
        EXIT_FAILURE
    }

    /// Whether any output at all may have been committed before the failure
    pub fn is_mid_stream(&self) -> bool {
        matches!(
            self,
            Self::MissingFilter(_)
                | Self::Header { .. }
                | Self::PeakList { .. }
                | Self::Close(_)
                | Self::Io(_)
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_messages() {
        assert_eq!(
            ExportError::Argument.to_string(),
            "This program accepts exactly 1 argument"
        );
        assert_eq!(
            ExportError::MissingFilter(2).to_string(),
            "Could not extract scan filter line for scan #2"
        );
        let err = ExportError::Open {
            path: PathBuf::from("missing.RAW"),
            source: SourceError::FileNotFound(PathBuf::from("missing.RAW")),
        };
        assert_eq!(err.to_string(), "Unable to open RAW file missing.RAW");
        assert_eq!(
            ExportError::Range(SourceError::FirstScanUnavailable).to_string(),
            "Unable to get first scan: the first scan number is not available"
        );
        assert_eq!(
            ExportError::Range(SourceError::LastScanUnavailable).to_string(),
            "Unable to get last scan: the last scan number is not available"
        );
        assert_eq!(
            ExportError::Range(SourceError::InvalidRange { first: 10, last: 3 }).to_string(),
            "Unable to get the scan range: invalid scan range 10..=3"
        );
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(ExportError::Argument.exit_code(), EXIT_FAILURE);
        assert_eq!(
            ExportError::Close(SourceError::Runtime("gone".into())).exit_code(),
            EXIT_FAILURE
        );
        assert!(ExportError::MissingFilter(1).is_mid_stream());
        assert!(!ExportError::AdapterInit("no hostfxr".into()).is_mid_stream());
    }
}
