use std::io::Write;

use log::{debug, info, warn};

use crate::config::{ExportConfig, RetrievalPolicy};
use crate::error::ExportError;
use crate::record::{Precursor, ScanKind, ScanRecord};
use crate::source::{PeakBuffer, ScanHeader, ScanRange, ScanSource, SourceError};
use crate::trailer::{CHARGE_STATE, MONOISOTOPIC_MZ};
use crate::writer::RecordEmitter;

/// Counts gathered over a completed export
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExportSummary {
    /// The count announced at the head of the stream
    pub total_scans: i64,
    pub records_written: usize,
    pub fragmentation_scans: usize,
    pub data_points: usize,
}

/// Walks a [`ScanSource`] in ascending scan order and pulls out one [`ScanRecord`]
/// per scan.
pub struct Exporter<'a, S: ScanSource> {
    source: &'a mut S,
    config: ExportConfig,
}

impl<'a, S: ScanSource> Exporter<'a, S> {
    pub fn new(source: &'a mut S, config: ExportConfig) -> Self {
        Self { source, config }
    }

    /// Ask the source for its scan bounds. A range that ends more than one scan before
    /// it starts, or whose length doesn't fit an `i64`, is rejected. An empty range is not.
    pub fn resolve_range(&mut self) -> Result<ScanRange, ExportError> {
        let range = self.source.scan_range().map_err(ExportError::Range)?;
        if range.checked_len().is_none() {
            return Err(ExportError::Range(SourceError::InvalidRange {
                first: range.first,
                last: range.last,
            }));
        }
        Ok(range)
    }

    /// Gather everything the stream needs for `scan`.
    ///
    /// The filter string comes first because classification depends on it, and a
    /// scan without one stops the export. Precursor trailers are only consulted for
    /// fragmentation scans. The peak list comes last and is owned by the returned
    /// record, so it is released as soon as the record is dropped.
    pub fn extract(
        &mut self,
        scan: i64,
    ) -> Result<ScanRecord<PeakBuffer<S::Peaks>>, ExportError> {
        let filter = self
            .source
            .filter(scan)
            .ok_or(ExportError::MissingFilter(scan))?;

        let header = self.header(scan)?;

        let precursor = match ScanKind::classify(&filter) {
            ScanKind::Primary => None,
            ScanKind::Fragmentation => Some(self.precursor(scan)),
        };

        let peaks = match self.source.peak_list(scan, &self.config.peak_options) {
            Ok(peaks) => PeakBuffer::Source(peaks),
            Err(source) => match self.config.retrieval {
                RetrievalPolicy::Strict => return Err(ExportError::PeakList { scan, source }),
                RetrievalPolicy::Lenient => {
                    warn!("Peak list for scan {scan} unavailable ({source}), writing no data points");
                    PeakBuffer::Empty
                }
            },
        };

        if header.points >= 0 && header.points as usize != peaks.len() {
            debug!(
                "Scan {scan} header reports {} points but the peak list holds {}",
                header.points,
                peaks.len()
            );
        }

        Ok(ScanRecord {
            scan_number: scan,
            filter,
            retention_time: header.retention_time,
            precursor,
            peaks,
        })
    }

    fn header(&mut self, scan: i64) -> Result<ScanHeader, ExportError> {
        match self.source.header(scan) {
            Ok(header) => Ok(header),
            Err(source) => match self.config.retrieval {
                RetrievalPolicy::Strict => Err(ExportError::Header { scan, source }),
                RetrievalPolicy::Lenient => {
                    warn!("Header for scan {scan} unavailable ({source}), using sentinel values");
                    Ok(ScanHeader::sentinel())
                }
            },
        }
    }

    fn precursor(&mut self, scan: i64) -> Precursor {
        let mut precursor = Precursor::default();

        let mz = self.source.trailer_value(scan, MONOISOTOPIC_MZ);
        precursor.mz = mz.as_precursor_mz(precursor.mz);

        let charge = self.source.trailer_value(scan, CHARGE_STATE);
        precursor.charge = charge.as_charge(precursor.charge);

        debug!("Scan {scan} precursor {mz:?} / {charge:?} -> {precursor:?}");
        precursor
    }

    /// Resolve the range, announce it, then extract and emit every scan in order.
    /// Stops at the first fatal condition.
    pub fn export<W: Write>(
        &mut self,
        emitter: &mut RecordEmitter<W>,
    ) -> Result<ExportSummary, ExportError> {
        let range = self.resolve_range()?;
        let total = range.len();
        info!(
            "Exporting {total} scans (source reports {}..={})",
            range.first, range.last
        );
        emitter.write_scan_count(total)?;

        let mut summary = ExportSummary {
            total_scans: total,
            ..Default::default()
        };

        for scan in self.config.numbering.scan_numbers(&range) {
            let record = self.extract(scan)?;
            debug!("Writing {record:?}");
            emitter.write_record(&record)?;
            summary.records_written += 1;
            summary.data_points += record.data_points();
            if record.precursor.is_some() {
                summary.fragmentation_scans += 1;
            }
        }

        emitter.flush()?;
        info!(
            "Wrote {} records ({} fragmentation scans, {} data points)",
            summary.records_written, summary.fragmentation_scans, summary.data_points
        );
        Ok(summary)
    }
}
