use std::ops::RangeInclusive;

use crate::source::{PeakListOptions, ScanRange};

/// What to do when a data source fails to deliver a scan header or peak list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetrievalPolicy {
    /// Emit the record anyway, with a sentinel header or an empty peak list
    #[default]
    Lenient,
    /// Treat the failure as fatal
    Strict,
}

/// Which scan numbers to walk once the range is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanNumbering {
    /// `1..=total`, whatever the source reports as its first scan. This is what
    /// existing consumers of the stream expect.
    #[default]
    Legacy,
    /// `first..=last` as reported by the source
    Reported,
}

impl ScanNumbering {
    pub fn scan_numbers(&self, range: &ScanRange) -> RangeInclusive<i64> {
        match self {
            Self::Legacy => range.one_based(),
            Self::Reported => range.reported(),
        }
    }
}

/// Settings for one export run. The default reproduces the legacy stream exactly.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ExportConfig {
    pub retrieval: RetrievalPolicy,
    pub numbering: ScanNumbering,
    pub peak_options: PeakListOptions,
}

impl ExportConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_retrieval(mut self, retrieval: RetrievalPolicy) -> Self {
        self.retrieval = retrieval;
        self
    }

    pub fn with_numbering(mut self, numbering: ScanNumbering) -> Self {
        self.numbering = numbering;
        self
    }

    pub fn is_strict(&self) -> bool {
        self.retrieval == RetrievalPolicy::Strict
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_defaults_are_legacy() {
        let config = ExportConfig::default();
        assert_eq!(config.retrieval, RetrievalPolicy::Lenient);
        assert_eq!(config.numbering, ScanNumbering::Legacy);
        assert!(config.peak_options.is_unfiltered());
        assert!(!config.is_strict());
    }

    #[test]
    fn test_numbering() {
        let range = ScanRange::new(10, 12);
        assert_eq!(
            ScanNumbering::Legacy.scan_numbers(&range).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert_eq!(
            ScanNumbering::Reported.scan_numbers(&range).collect::<Vec<_>>(),
            vec![10, 11, 12]
        );
    }

    #[test]
    fn test_builder() {
        let config = ExportConfig::new()
            .with_retrieval(RetrievalPolicy::Strict)
            .with_numbering(ScanNumbering::Reported);
        assert!(config.is_strict());
        assert_eq!(config.numbering, ScanNumbering::Reported);
    }
}
