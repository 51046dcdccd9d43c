//! Stream the scans of a mass spectrometry data source as a mixed text/binary dump.
//!
//! The stream opens with a `NUMBER OF SCANS` line, then carries one record per scan in
//! ascending order: a few `KEY: value` text lines followed by the scan's peak list as raw
//! native-endian `f64` pairs. See [`RecordEmitter`] for the exact layout and
//! [`ExportReader`] for reading it back.
//!
//! Data sources plug in through [`ScanSource`] and [`SourceProvider`]. An in-memory
//! implementation lives in [`memory`]; the Thermo RAW implementation is in the
//! `rawdump-thermo` crate.
//!
//! ```rust
//! use std::path::Path;
//!
//! use rawdump::memory::{MemoryProvider, MemoryScan, MemorySource};
//! use rawdump::{ExportConfig, Peak, RecordEmitter, RunController};
//!
//! # fn main() -> Result<(), rawdump::ExportError> {
//! let source = MemorySource::from_scans([
//!     MemoryScan::new("FTMS + p NSI Full ms [200.00-2000.00]", 0.5, vec![Peak::new(445.12, 1e4)]),
//! ]);
//! let provider = MemoryProvider::new().with_file("small.RAW", source);
//! let mut controller = RunController::new(provider, ExportConfig::default());
//! let mut emitter = RecordEmitter::new(Vec::new());
//! let summary = controller.run(Path::new("small.RAW"), &mut emitter)?;
//! assert_eq!(summary.records_written, 1);
//! #   Ok(())
//! # }
//! ```
pub mod cli;
pub(crate) mod config;
pub(crate) mod controller;
pub(crate) mod error;
pub(crate) mod export;
pub mod memory;
pub(crate) mod reader;
pub(crate) mod record;
pub(crate) mod source;
pub mod trailer;
pub(crate) mod writer;

pub use crate::config::{ExportConfig, RetrievalPolicy, ScanNumbering};
pub use crate::controller::{RunController, RunState};
pub use crate::error::{EXIT_FAILURE, EXIT_SUCCESS, ExportError};
pub use crate::export::{ExportSummary, Exporter};
pub use crate::reader::{ExportReader, ReadError, StreamEvent, StreamSummary, summarize};
pub use crate::record::{FixedFloat, Precursor, ScanKind, ScanRecord};
pub use crate::source::{
    Peak, PeakBuffer, PeakListOptions, ScanHeader, ScanRange, ScanSource, SourceError,
    SourceProvider,
};
pub use crate::trailer::DynamicValue;
pub use crate::writer::{RecordEmitter, Unbuffered};
