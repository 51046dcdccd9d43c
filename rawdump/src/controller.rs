use std::fmt::Display;
use std::io::Write;
use std::path::Path;

use log::{debug, error, warn};

use crate::config::ExportConfig;
use crate::error::{EXIT_SUCCESS, ExportError};
use crate::export::{ExportSummary, Exporter};
use crate::source::{ScanSource, SourceProvider};
use crate::writer::RecordEmitter;

/// Where a run is in its lifecycle. Any failure moves straight to `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    NotOpened,
    Opened,
    Exporting,
    Closed,
    Failed,
}

impl Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Drives one export from open to close over a live [`SourceProvider`] session.
///
/// The provider is owned by the controller, so whatever runtime it keeps alive is torn
/// down when the controller is dropped, whether the run succeeded or not.
pub struct RunController<P: SourceProvider> {
    provider: P,
    config: ExportConfig,
    state: RunState,
}

impl<P: SourceProvider> RunController<P> {
    pub fn new(provider: P, config: ExportConfig) -> Self {
        Self {
            provider,
            config,
            state: RunState::NotOpened,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    fn transition(&mut self, state: RunState) {
        debug!("Run state {} -> {}", self.state, state);
        self.state = state;
    }

    /// Open `path`, export every scan to `emitter` and close the source.
    ///
    /// On failure the source, if it was opened, is closed before returning. The caller
    /// is responsible for reporting the error in-band, see [`RunController::execute`].
    pub fn run<W: Write>(
        &mut self,
        path: &Path,
        emitter: &mut RecordEmitter<W>,
    ) -> Result<ExportSummary, ExportError> {
        let result = self.run_impl(path, emitter);
        if let Err(e) = &result {
            if e.is_mid_stream() {
                error!("Export of {} failed part way through: {e}", path.display());
            } else {
                error!("Export of {} failed: {e}", path.display());
            }
            self.transition(RunState::Failed);
        }
        result
    }

    fn run_impl<W: Write>(
        &mut self,
        path: &Path,
        emitter: &mut RecordEmitter<W>,
    ) -> Result<ExportSummary, ExportError> {
        let mut source = self
            .provider
            .open(path)
            .map_err(|source| ExportError::Open {
                path: path.to_path_buf(),
                source,
            })?;
        self.transition(RunState::Opened);

        self.transition(RunState::Exporting);
        let exported = Exporter::new(&mut source, self.config).export(emitter);

        match exported {
            Ok(summary) => {
                source.close().map_err(ExportError::Close)?;
                self.transition(RunState::Closed);
                Ok(summary)
            }
            Err(e) => {
                if let Err(close_err) = source.close() {
                    warn!("Failed to close the source after an aborted export: {close_err}");
                }
                Err(e)
            }
        }
    }

    /// Run the export and turn the outcome into a process exit code, writing an
    /// `ERROR:` line to the stream when something went wrong.
    pub fn execute<W: Write>(&mut self, path: &Path, emitter: &mut RecordEmitter<W>) -> u8 {
        match self.run(path, emitter) {
            Ok(_) => EXIT_SUCCESS,
            Err(e) => {
                if let Err(io_err) = emitter.write_error(&e) {
                    error!("Could not report the failure on the output stream: {io_err}");
                }
                e.exit_code()
            }
        }
    }
}
