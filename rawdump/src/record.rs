use std::fmt::{self, Debug, Display};
use std::ops::Deref;

use crate::source::Peak;

/// The substring of a filter string that marks a full (non-fragmentation) scan
pub const PRIMARY_SCAN_MARKER: &str = "ms ";

/// Whether a scan is a full scan or the product of fragmenting a precursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScanKind {
    Primary,
    Fragmentation,
}

impl ScanKind {
    /// Classify a scan from its filter string. A filter containing `"ms "` is a
    /// primary scan, anything else is a fragmentation scan.
    pub fn classify(filter: &str) -> Self {
        if filter.contains(PRIMARY_SCAN_MARKER) {
            Self::Primary
        } else {
            Self::Fragmentation
        }
    }

    pub fn is_fragmentation(&self) -> bool {
        matches!(self, Self::Fragmentation)
    }
}

/// The precursor ion of a fragmentation scan. Both fields are zero when the
/// data source had nothing usable.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Precursor {
    pub mz: f64,
    pub charge: i32,
}

impl Precursor {
    pub fn new(mz: f64, charge: i32) -> Self {
        Self { mz, charge }
    }
}

/// Everything the export stream carries for one scan.
///
/// The peak buffer is generic so that a record can borrow the data source's own buffer
/// for as long as it takes to write it out, or own a plain [`Vec`] once read back.
#[derive(Clone, PartialEq)]
pub struct ScanRecord<P = Vec<Peak>> {
    pub scan_number: i64,
    pub filter: String,
    /// The scan start time, in minutes
    pub retention_time: f64,
    /// Present exactly when the scan is a fragmentation scan
    pub precursor: Option<Precursor>,
    pub peaks: P,
}

impl<P: Deref<Target = [Peak]>> ScanRecord<P> {
    pub fn kind(&self) -> ScanKind {
        ScanKind::classify(&self.filter)
    }

    pub fn data_points(&self) -> usize {
        self.peaks.len()
    }

    /// The size of the binary block that follows this record's text lines
    pub fn payload_len(&self) -> usize {
        self.data_points() * Peak::ENCODED_SIZE
    }
}

impl<P: Deref<Target = [Peak]>> Debug for ScanRecord<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanRecord")
            .field("scan_number", &self.scan_number)
            .field("filter", &self.filter)
            .field("retention_time", &self.retention_time)
            .field("precursor", &self.precursor)
            .field("data-points", &self.peaks.len())
            .finish()
    }
}

/// Renders a float the way C's `%f` conversion does: six digits after the decimal
/// point, `nan` and `inf` spelled in lower case.
#[derive(Debug, Clone, Copy)]
pub struct FixedFloat(pub f64);

impl Display for FixedFloat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = self.0;
        if value.is_nan() {
            if value.is_sign_negative() {
                f.write_str("-nan")
            } else {
                f.write_str("nan")
            }
        } else {
            write!(f, "{value:.6}")
        }
    }
}
