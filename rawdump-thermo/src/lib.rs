//! A Thermo RAW file data source for [`rawdump`].
//!
//! Depends upon the [`thermorawfilereader`] crate which manages the self-hosted `dotnet`
//! runtime.
//!
//! ```no_run
//! use std::path::Path;
//!
//! use rawdump::{ExportConfig, RecordEmitter, RunController};
//! use rawdump_thermo::ThermoProvider;
//!
//! # fn main() -> Result<(), rawdump::ExportError> {
//! let provider = ThermoProvider::start()?;
//! let mut controller = RunController::new(provider, ExportConfig::default());
//! let mut emitter = RecordEmitter::new(Vec::new());
//! let summary = controller.run(Path::new("small.RAW"), &mut emitter)?;
//! assert_eq!(summary.records_written, 48);
//! #    Ok(())
//! # }
//! ```
//!
//! # Licensing
//! By using this library, you agree to the [RawFileReader License](https://github.com/thermofisherlsms/RawFileReader/blob/main/License.doc)
//!
mod source;

pub use source::{ThermoProvider, ThermoSource};

/// Re-exported from [`thermorawfilereader`].
pub use thermorawfilereader::set_runtime_dir;
