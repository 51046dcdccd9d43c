use std::io;
use std::ops::{Deref, RangeInclusive};
use std::path::{Path, PathBuf};

use bytemuck::{Pod, Zeroable};
use thiserror::Error;

use crate::trailer::DynamicValue;

/// A set of error codes to describe how talking to a data source might fail.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The file path given doesn't exist
    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),
    /// The file path given does exist, but the data source can't read it
    #[error("{} does not appear to be a valid RAW file", .0.display())]
    InvalidFormat(PathBuf),
    #[error("the first scan number is not available")]
    FirstScanUnavailable,
    #[error("the last scan number is not available")]
    LastScanUnavailable,
    /// The reported bounds don't describe a (possibly empty) contiguous interval
    #[error("invalid scan range {first}..={last}")]
    InvalidRange { first: i64, last: i64 },
    #[error("scan {0} is not available")]
    ScanUnavailable(i64),
    /// The runtime hosting the data source failed
    #[error("runtime error: {0}")]
    Runtime(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// The closed interval of scan numbers a data source reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanRange {
    pub first: i64,
    pub last: i64,
}

impl ScanRange {
    pub fn new(first: i64, last: i64) -> Self {
        Self { first, last }
    }

    /// `last - first + 1`, or `None` if the bounds are too far apart to count or `last`
    /// lies more than one scan before `first`
    pub fn checked_len(&self) -> Option<i64> {
        self.last
            .checked_sub(self.first)?
            .checked_add(1)
            .filter(|n| *n >= 0)
    }

    /// The number of scans announced at the head of the stream. An invalid range counts
    /// as empty.
    pub fn len(&self) -> i64 {
        self.checked_len().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The scan numbers as reported by the source
    pub fn reported(&self) -> RangeInclusive<i64> {
        self.first..=self.last
    }

    /// `1..=len()`, regardless of where the source says the first scan is
    pub fn one_based(&self) -> RangeInclusive<i64> {
        1..=self.len()
    }
}

/// Per-scan metadata. Only the retention time ends up in the export stream, the rest
/// is carried for logging and for adapters that want to report it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanHeader {
    pub points: i64,
    /// The scan start time, in minutes
    pub retention_time: f64,
    pub low_mz: f64,
    pub high_mz: f64,
    pub total_ion_current: f64,
    pub base_peak_mz: f64,
    pub base_peak_intensity: f64,
    pub channel: i64,
    pub uniform_time: bool,
    pub frequency: f64,
}

impl ScanHeader {
    /// The header reported when retrieval failed and the run tolerates it. Every
    /// numeric field carries `-1`, the values the header is initialized to before the
    /// data source is asked to fill it in.
    pub fn sentinel() -> Self {
        Self {
            points: -1,
            retention_time: -1.0,
            low_mz: -1.0,
            high_mz: -1.0,
            total_ion_current: -1.0,
            base_peak_mz: -1.0,
            base_peak_intensity: -1.0,
            channel: 0,
            uniform_time: false,
            frequency: 0.0,
        }
    }
}

/// A single centroid or profile point. The layout is exactly two native-endian `f64`
/// values, which is also the layout of one pair in the binary block of the export stream.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Peak {
    pub mass: f64,
    pub intensity: f64,
}

impl Peak {
    pub const ENCODED_SIZE: usize = std::mem::size_of::<Peak>();

    pub fn new(mass: f64, intensity: f64) -> Self {
        Self { mass, intensity }
    }
}

impl From<(f64, f64)> for Peak {
    fn from((mass, intensity): (f64, f64)) -> Self {
        Self::new(mass, intensity)
    }
}

/// The peak list of one scan as the pipeline holds it: either the buffer the data
/// source handed out, or nothing at all when retrieval failed and the run tolerates it.
#[derive(Debug)]
pub enum PeakBuffer<P> {
    Source(P),
    Empty,
}

impl<P: Deref<Target = [Peak]>> Deref for PeakBuffer<P> {
    type Target = [Peak];

    fn deref(&self) -> &Self::Target {
        match self {
            Self::Source(peaks) => peaks,
            Self::Empty => &[],
        }
    }
}

/// Options passed along when requesting a peak list. The defaults disable every
/// reduction the data source might otherwise apply.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PeakListOptions {
    /// `0` means no intensity cutoff
    pub cutoff_type: i32,
    pub cutoff_value: i32,
    /// `0` means return every peak
    pub max_peaks: i32,
    pub centroid: bool,
}

impl PeakListOptions {
    /// `true` when no filtering or centroiding was asked for
    pub fn is_unfiltered(&self) -> bool {
        *self == Self::default()
    }
}

/// The capabilities the export pipeline consumes from an opened data source.
///
/// Scan numbers are passed through exactly as the pipeline chose them; it is up to the
/// implementation to map them onto whatever indexing the underlying reader uses.
pub trait ScanSource {
    /// An owned peak buffer. It lives for exactly one scan and is released when dropped.
    type Peaks: Deref<Target = [Peak]>;

    fn scan_range(&mut self) -> Result<ScanRange, SourceError>;

    /// The filter string for `scan`, or `None` if the source has none
    fn filter(&mut self, scan: i64) -> Option<String>;

    fn header(&mut self, scan: i64) -> Result<ScanHeader, SourceError>;

    /// Look up a named trailer entry for `scan`
    fn trailer_value(&mut self, scan: i64, key: &str) -> DynamicValue;

    fn peak_list(
        &mut self,
        scan: i64,
        options: &PeakListOptions,
    ) -> Result<Self::Peaks, SourceError>;

    /// Close the source, releasing whatever it holds on to.
    fn close(self) -> Result<(), SourceError>
    where
        Self: Sized;
}

/// A live session with whatever runtime a data source needs. Constructing the provider
/// is the initialization step; dropping it is the teardown.
pub trait SourceProvider {
    type Source: ScanSource;

    fn open(&mut self, path: &Path) -> Result<Self::Source, SourceError>;
}
