//! An in-memory data source. Useful for exercising the export pipeline, and for
//! downstream tools that want to produce a dump from data they already hold.
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::source::{
    Peak, PeakListOptions, ScanHeader, ScanRange, ScanSource, SourceError, SourceProvider,
};
use crate::trailer::DynamicValue;

/// One scan held by a [`MemorySource`]. `None` in `header` or `peaks` makes the
/// corresponding request fail.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryScan {
    pub filter: Option<String>,
    pub header: Option<ScanHeader>,
    pub trailers: HashMap<String, DynamicValue>,
    pub peaks: Option<Vec<Peak>>,
}

impl MemoryScan {
    /// A scan with the given filter, a header consistent with `peaks` and no trailers
    pub fn new(filter: &str, retention_time: f64, peaks: Vec<Peak>) -> Self {
        let (base_peak_mz, base_peak_intensity) = peaks
            .iter()
            .max_by(|a, b| a.intensity.total_cmp(&b.intensity))
            .map(|p| (p.mass, p.intensity))
            .unwrap_or_default();
        let header = ScanHeader {
            points: peaks.len() as i64,
            retention_time,
            low_mz: peaks.first().map(|p| p.mass).unwrap_or_default(),
            high_mz: peaks.last().map(|p| p.mass).unwrap_or_default(),
            total_ion_current: peaks.iter().map(|p| p.intensity).sum(),
            base_peak_mz,
            base_peak_intensity,
            channel: 0,
            uniform_time: false,
            frequency: 0.0,
        };
        Self {
            filter: Some(filter.to_string()),
            header: Some(header),
            trailers: HashMap::new(),
            peaks: Some(peaks),
        }
    }

    pub fn with_trailer(mut self, key: &str, value: impl Into<DynamicValue>) -> Self {
        self.trailers.insert(key.to_string(), value.into());
        self
    }

    pub fn without_filter(mut self) -> Self {
        self.filter = None;
        self
    }

    pub fn without_header(mut self) -> Self {
        self.header = None;
        self
    }

    pub fn without_peaks(mut self) -> Self {
        self.peaks = None;
        self
    }
}

/// What a [`MemorySource`] has been asked to do. Shared between clones of the source
/// and its provider, so a test can keep a handle after the source is consumed.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Activity {
    /// Scan numbers in the order their filter was requested
    pub visited: Vec<i64>,
    /// Scan numbers whose trailers were consulted
    pub trailer_lookups: Vec<(i64, String)>,
    /// The options every peak list was requested with
    pub peak_requests: Vec<PeakListOptions>,
    pub buffers_issued: usize,
    pub buffers_released: usize,
    pub closed: bool,
    pub torn_down: bool,
}

impl Activity {
    pub fn buffers_outstanding(&self) -> usize {
        self.buffers_issued - self.buffers_released
    }
}

/// A peak buffer handed out by a [`MemorySource`]. Dropping it is recorded in the
/// source's [`Activity`].
#[derive(Debug)]
pub struct MemoryPeaks {
    peaks: Vec<Peak>,
    activity: Rc<RefCell<Activity>>,
}

impl Deref for MemoryPeaks {
    type Target = [Peak];

    fn deref(&self) -> &Self::Target {
        &self.peaks
    }
}

impl Drop for MemoryPeaks {
    fn drop(&mut self) {
        self.activity.borrow_mut().buffers_released += 1;
    }
}

#[derive(Debug, Clone, Copy)]
enum RangeReport {
    /// Span the stored scans
    Derived,
    Fixed(ScanRange),
    Unavailable,
}

#[derive(Debug, Clone)]
pub struct MemorySource {
    range: RangeReport,
    scans: BTreeMap<i64, MemoryScan>,
    fail_close: bool,
    activity: Rc<RefCell<Activity>>,
}

impl Default for MemorySource {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySource {
    pub fn new() -> Self {
        Self {
            range: RangeReport::Derived,
            scans: BTreeMap::new(),
            fail_close: false,
            activity: Rc::default(),
        }
    }

    /// Build a source whose scans are numbered from 1 in the order given
    pub fn from_scans<I: IntoIterator<Item = MemoryScan>>(scans: I) -> Self {
        let mut this = Self::new();
        for scan in scans {
            this.push(scan);
        }
        this
    }

    /// Append a scan after the current last one
    pub fn push(&mut self, scan: MemoryScan) -> i64 {
        let number = self.scans.keys().next_back().map(|k| k + 1).unwrap_or(1);
        self.scans.insert(number, scan);
        number
    }

    pub fn insert(&mut self, number: i64, scan: MemoryScan) {
        self.scans.insert(number, scan);
    }

    /// Report this range instead of the one spanned by the stored scans
    pub fn with_range(mut self, range: ScanRange) -> Self {
        self.range = RangeReport::Fixed(range);
        self
    }

    /// Make the source unable to report its range at all
    pub fn without_range(mut self) -> Self {
        self.range = RangeReport::Unavailable;
        self
    }

    pub fn failing_close(mut self) -> Self {
        self.fail_close = true;
        self
    }

    pub fn activity(&self) -> Rc<RefCell<Activity>> {
        self.activity.clone()
    }

    fn get(&self, scan: i64) -> Option<&MemoryScan> {
        self.scans.get(&scan)
    }
}

impl ScanSource for MemorySource {
    type Peaks = MemoryPeaks;

    fn scan_range(&mut self) -> Result<ScanRange, SourceError> {
        match self.range {
            RangeReport::Unavailable => Err(SourceError::FirstScanUnavailable),
            RangeReport::Fixed(range) => Ok(range),
            RangeReport::Derived => {
                let first = self.scans.keys().next().copied().unwrap_or(1);
                let last = self.scans.keys().next_back().copied().unwrap_or(0);
                Ok(ScanRange::new(first, last))
            }
        }
    }

    fn filter(&mut self, scan: i64) -> Option<String> {
        self.activity.borrow_mut().visited.push(scan);
        self.get(scan).and_then(|s| s.filter.clone())
    }

    fn header(&mut self, scan: i64) -> Result<ScanHeader, SourceError> {
        self.get(scan)
            .and_then(|s| s.header)
            .ok_or(SourceError::ScanUnavailable(scan))
    }

    fn trailer_value(&mut self, scan: i64, key: &str) -> DynamicValue {
        self.activity
            .borrow_mut()
            .trailer_lookups
            .push((scan, key.to_string()));
        self.get(scan)
            .and_then(|s| s.trailers.get(key).copied())
            .unwrap_or(DynamicValue::Absent)
    }

    fn peak_list(
        &mut self,
        scan: i64,
        options: &PeakListOptions,
    ) -> Result<Self::Peaks, SourceError> {
        self.activity.borrow_mut().peak_requests.push(*options);
        let peaks = self
            .get(scan)
            .and_then(|s| s.peaks.clone())
            .ok_or(SourceError::ScanUnavailable(scan))?;
        self.activity.borrow_mut().buffers_issued += 1;
        Ok(MemoryPeaks {
            peaks,
            activity: self.activity.clone(),
        })
    }

    fn close(self) -> Result<(), SourceError> {
        self.activity.borrow_mut().closed = true;
        if self.fail_close {
            Err(SourceError::Runtime("close rejected".to_string()))
        } else {
            Ok(())
        }
    }
}

/// Hands out clones of a [`MemorySource`] for known paths.
#[derive(Debug, Default)]
pub struct MemoryProvider {
    files: HashMap<PathBuf, MemorySource>,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file<P: Into<PathBuf>>(mut self, path: P, source: MemorySource) -> Self {
        self.files.insert(path.into(), source);
        self
    }
}

impl SourceProvider for MemoryProvider {
    type Source = MemorySource;

    fn open(&mut self, path: &Path) -> Result<Self::Source, SourceError> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| SourceError::FileNotFound(path.to_path_buf()))
    }
}

impl Drop for MemoryProvider {
    fn drop(&mut self) {
        for source in self.files.values() {
            source.activity.borrow_mut().torn_down = true;
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_scan_numbering_and_range() -> Result<(), SourceError> {
        let mut source = MemorySource::from_scans([
            MemoryScan::new("Full ms ", 0.1, vec![]),
            MemoryScan::new("Full ms2 ", 0.2, vec![]),
        ]);
        assert_eq!(source.scan_range()?, ScanRange::new(1, 2));
        assert_eq!(source.filter(2).as_deref(), Some("Full ms2 "));
        assert_eq!(source.filter(3), None);
        assert!(source.header(3).is_err());

        let empty = MemorySource::new().scan_range()?;
        assert!(empty.is_empty());

        assert!(matches!(
            MemorySource::new().without_range().scan_range(),
            Err(SourceError::FirstScanUnavailable)
        ));
        Ok(())
    }

    #[test]
    fn test_buffers_tracked() -> Result<(), SourceError> {
        let mut source =
            MemorySource::from_scans([MemoryScan::new("Full ms ", 0.1, vec![Peak::new(1.0, 2.0)])]);
        let activity = source.activity();
        {
            let peaks = source.peak_list(1, &PeakListOptions::default())?;
            assert_eq!(peaks.len(), 1);
            assert_eq!(activity.borrow().buffers_outstanding(), 1);
        }
        assert_eq!(activity.borrow().buffers_outstanding(), 0);
        source.close()?;
        assert!(activity.borrow().closed);
        Ok(())
    }

    #[test]
    fn test_header_derived_from_peaks() {
        let scan = MemoryScan::new(
            "Full ms ",
            3.0,
            vec![Peak::new(100.0, 5.0), Peak::new(150.0, 50.0), Peak::new(200.0, 1.0)],
        );
        let header = scan.header.unwrap();
        assert_eq!(header.points, 3);
        assert_eq!(header.base_peak_mz, 150.0);
        assert_eq!(header.total_ion_current, 56.0);
        assert_eq!(header.low_mz, 100.0);
        assert_eq!(header.high_mz, 200.0);
    }

    #[test]
    fn test_provider_teardown() {
        let source = MemorySource::new();
        let activity = source.activity();
        let mut provider = MemoryProvider::new().with_file("a.RAW", source);
        assert!(provider.open(Path::new("a.RAW")).is_ok());
        assert!(provider.open(Path::new("b.RAW")).is_err());
        drop(provider);
        assert!(activity.borrow().torn_down);
    }
}
