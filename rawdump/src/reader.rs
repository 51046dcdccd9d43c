//! Read an export stream back.
//!
//! ```rust
//! use rawdump::{ExportReader, StreamEvent};
//!
//! # fn main() -> Result<(), rawdump::ReadError> {
//! let stream = b"NUMBER OF SCANS: 0\n";
//! let mut reader = ExportReader::new(&stream[..]);
//! assert_eq!(reader.next().transpose()?, Some(StreamEvent::ScanCount(0)));
//! assert!(reader.next().is_none());
//! #   Ok(())
//! # }
//! ```
use std::io::{self, BufRead, Read};
use std::str::FromStr;

use thiserror::Error;

use crate::record::{Precursor, ScanRecord};
use crate::source::Peak;

const SCAN_COUNT: &str = "NUMBER OF SCANS: ";
const SCAN_NUMBER: &str = "SCAN NUMBER: ";
const SCAN_FILTER: &str = "SCAN FILTER: ";
const RETENTION_TIME: &str = "RETENTION TIME: ";
const PRECURSOR: &str = "PRECURSOR: ";
const DATA_POINTS: &str = "DATA POINTS: ";
const ERROR: &str = "ERROR: ";

#[derive(Debug, Error)]
pub enum ReadError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("expected a {expected:?} line, found {found:?}")]
    UnexpectedLine {
        expected: &'static str,
        found: String,
    },
    #[error("could not parse {field:?} from {value:?}")]
    InvalidValue { field: &'static str, value: String },
    #[error("stream ended inside the record for scan {0}")]
    Truncated(i64),
}

/// One unit of an export stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// The leading `NUMBER OF SCANS` line
    ScanCount(i64),
    Scan(ScanRecord),
    /// An `ERROR:` line. The stream is incomplete and should not be trusted.
    Error(String),
}

/// An iterator over the [`StreamEvent`]s of an export stream.
#[derive(Debug)]
pub struct ExportReader<R: BufRead> {
    inner: R,
    line: Vec<u8>,
}

enum Line {
    Text(String),
    Error(String),
    Eof,
}

impl<R: BufRead> ExportReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            line: Vec::new(),
        }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    fn read_line(&mut self) -> Result<Line, ReadError> {
        self.line.clear();
        let n = self.inner.read_until(b'\n', &mut self.line)?;
        if n == 0 {
            return Ok(Line::Eof);
        }
        if self.line.last() == Some(&b'\n') {
            self.line.pop();
        }
        let text = String::from_utf8_lossy(&self.line).into_owned();
        match text.strip_prefix(ERROR) {
            Some(message) => Ok(Line::Error(message.to_string())),
            None => Ok(Line::Text(text)),
        }
    }

    /// Read the next line of a record, which should start with `prefix`
    fn field(&mut self, prefix: &'static str, scan: i64) -> Result<Field, ReadError> {
        match self.read_line()? {
            Line::Eof => Err(ReadError::Truncated(scan)),
            Line::Error(message) => Ok(Field::Error(message)),
            Line::Text(text) => match text.strip_prefix(prefix) {
                Some(value) => Ok(Field::Value(value.to_string())),
                None => Ok(Field::Other(text)),
            },
        }
    }

    /// Read `count` peaks. The payload is pulled in as it arrives rather than allocated
    /// up front, so a bogus count ends in [`ReadError::Truncated`] at the end of the input.
    fn read_peaks(&mut self, count: usize, scan: i64) -> Result<Vec<Peak>, ReadError> {
        let Some(size) = count.checked_mul(Peak::ENCODED_SIZE) else {
            return Err(ReadError::InvalidValue {
                field: DATA_POINTS.trim_end_matches(": "),
                value: count.to_string(),
            });
        };
        let mut payload = Vec::new();
        let read = (&mut self.inner).take(size as u64).read_to_end(&mut payload)?;
        if read < size {
            return Err(ReadError::Truncated(scan));
        }
        Ok(bytemuck::pod_collect_to_vec(&payload[..]))
    }

    fn read_record(&mut self, scan_number: i64) -> Result<StreamEvent, ReadError> {
        let filter = match self.field(SCAN_FILTER, scan_number)? {
            Field::Value(v) => v,
            Field::Error(message) => return Ok(StreamEvent::Error(message)),
            Field::Other(found) => return Err(unexpected(SCAN_FILTER, found)),
        };

        let retention_time: f64 = match self.field(RETENTION_TIME, scan_number)? {
            Field::Value(v) => parse(RETENTION_TIME, &v)?,
            Field::Error(message) => return Ok(StreamEvent::Error(message)),
            Field::Other(found) => return Err(unexpected(RETENTION_TIME, found)),
        };

        let (precursor, points) = match self.field(PRECURSOR, scan_number)? {
            Field::Value(v) => {
                let precursor = parse_precursor(&v)?;
                match self.field(DATA_POINTS, scan_number)? {
                    Field::Value(v) => (Some(precursor), v),
                    Field::Error(message) => return Ok(StreamEvent::Error(message)),
                    Field::Other(found) => return Err(unexpected(DATA_POINTS, found)),
                }
            }
            Field::Error(message) => return Ok(StreamEvent::Error(message)),
            Field::Other(found) => match found.strip_prefix(DATA_POINTS) {
                Some(v) => (None, v.to_string()),
                None => return Err(unexpected(DATA_POINTS, found)),
            },
        };

        let points: usize = parse(DATA_POINTS, &points)?;
        let peaks = self.read_peaks(points, scan_number)?;

        Ok(StreamEvent::Scan(ScanRecord {
            scan_number,
            filter,
            retention_time,
            precursor,
            peaks,
        }))
    }
}

enum Field {
    Value(String),
    Error(String),
    Other(String),
}

fn unexpected(expected: &'static str, found: String) -> ReadError {
    ReadError::UnexpectedLine {
        expected: expected.trim_end_matches(": "),
        found,
    }
}

fn parse<T: FromStr>(field: &'static str, value: &str) -> Result<T, ReadError> {
    value.trim().parse().map_err(|_| ReadError::InvalidValue {
        field: field.trim_end_matches(": "),
        value: value.to_string(),
    })
}

fn parse_precursor(value: &str) -> Result<Precursor, ReadError> {
    let mut parts = value.split_ascii_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(mz), Some(charge), None) => {
            Ok(Precursor::new(parse(PRECURSOR, mz)?, parse(PRECURSOR, charge)?))
        }
        _ => Err(ReadError::InvalidValue {
            field: "PRECURSOR",
            value: value.to_string(),
        }),
    }
}

impl<R: BufRead> Iterator for ExportReader<R> {
    type Item = Result<StreamEvent, ReadError>;

    fn next(&mut self) -> Option<Self::Item> {
        let line = match self.read_line() {
            Ok(line) => line,
            Err(e) => return Some(Err(e)),
        };
        let text = match line {
            Line::Eof => return None,
            Line::Error(message) => return Some(Ok(StreamEvent::Error(message))),
            Line::Text(text) => text,
        };
        if let Some(count) = text.strip_prefix(SCAN_COUNT) {
            return Some(parse(SCAN_COUNT, count).map(StreamEvent::ScanCount));
        }
        match text.strip_prefix(SCAN_NUMBER) {
            Some(number) => Some(
                parse(SCAN_NUMBER, number).and_then(|scan_number| self.read_record(scan_number)),
            ),
            None => Some(Err(unexpected(SCAN_NUMBER, text))),
        }
    }
}

/// Tallies over a whole stream, see [`summarize`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamSummary {
    pub announced_scans: Option<i64>,
    pub records: usize,
    pub fragmentation_scans: usize,
    pub data_points: usize,
    pub errors: Vec<String>,
}

impl StreamSummary {
    /// No `ERROR:` lines and exactly as many records as were announced
    pub fn is_complete(&self) -> bool {
        self.errors.is_empty() && self.announced_scans == Some(self.records as i64)
    }
}

/// Read a whole stream, keeping only counts. Malformed input stops the read.
pub fn summarize<R: BufRead>(reader: R) -> Result<StreamSummary, ReadError> {
    let mut summary = StreamSummary::default();
    for event in ExportReader::new(reader) {
        match event? {
            StreamEvent::ScanCount(n) => summary.announced_scans = Some(n),
            StreamEvent::Scan(record) => {
                summary.records += 1;
                summary.data_points += record.peaks.len();
                if record.precursor.is_some() {
                    summary.fragmentation_scans += 1;
                }
            }
            StreamEvent::Error(message) => summary.errors.push(message),
        }
    }
    Ok(summary)
}

#[cfg(test)]
mod test {
    use super::*;

    fn stream() -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(b"NUMBER OF SCANS: 2\n");
        buf.extend_from_slice(b"SCAN NUMBER: 1\nSCAN FILTER: FTMS + p NSI Full ms [200.00-2000.00]\nRETENTION TIME: 0.500000\nDATA POINTS: 2\n");
        // The second mass is made entirely of newline bytes
        for v in [10.0f64, 2.5, f64::from_bits(0x0A0A_0A0A_0A0A_0A0A), 7.0] {
            buf.extend_from_slice(&v.to_ne_bytes());
        }
        buf.extend_from_slice(b"SCAN NUMBER: 2\nSCAN FILTER: ITMS + c NSI d Full ms2 445.12@cid35.00\nRETENTION TIME: 0.600000\nPRECURSOR: 445.120000 2\nDATA POINTS: 0\n");
        buf
    }

    #[test]
    fn test_read_stream() -> Result<(), ReadError> {
        let data = stream();
        let events: Vec<_> = ExportReader::new(&data[..]).collect::<Result<_, _>>()?;
        assert_eq!(events.len(), 3);
        assert_eq!(events[0], StreamEvent::ScanCount(2));
        match &events[1] {
            StreamEvent::Scan(record) => {
                assert_eq!(record.scan_number, 1);
                assert_eq!(record.retention_time, 0.5);
                assert!(record.precursor.is_none());
                assert_eq!(record.peaks.len(), 2);
                assert_eq!(record.peaks[0], Peak::new(10.0, 2.5));
                assert_eq!(record.peaks[1].mass.to_bits(), 0x0A0A_0A0A_0A0A_0A0A);
            }
            other => panic!("unexpected {other:?}"),
        }
        match &events[2] {
            StreamEvent::Scan(record) => {
                assert_eq!(record.precursor, Some(Precursor::new(445.12, 2)));
                assert!(record.peaks.is_empty());
            }
            other => panic!("unexpected {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn test_error_line() -> Result<(), ReadError> {
        let mut data = stream();
        data.extend_from_slice(b"ERROR: Could not extract scan filter line for scan #3\n");
        let summary = summarize(&data[..])?;
        assert_eq!(summary.records, 2);
        assert_eq!(summary.fragmentation_scans, 1);
        assert_eq!(
            summary.errors,
            vec!["Could not extract scan filter line for scan #3".to_string()]
        );
        assert!(!summary.is_complete());
        Ok(())
    }

    #[test]
    fn test_summary_complete() -> Result<(), ReadError> {
        let summary = summarize(&stream()[..])?;
        assert!(summary.is_complete());
        assert_eq!(summary.data_points, 2);
        Ok(())
    }

    #[test]
    fn test_truncated_payload() {
        let mut data = Vec::new();
        data.extend_from_slice(b"NUMBER OF SCANS: 2\nSCAN NUMBER: 1\nSCAN FILTER: Full ms \n");
        data.extend_from_slice(b"RETENTION TIME: 0.100000\nDATA POINTS: 0\n");
        data.extend_from_slice(b"SCAN NUMBER: 2\nSCAN FILTER: Full ms \n");
        data.extend_from_slice(b"RETENTION TIME: 0.200000\nDATA POINTS: 3\n");
        data.extend_from_slice(&[0u8; 20]);
        let result: Result<Vec<_>, _> = ExportReader::new(&data[..]).collect();
        assert!(matches!(result, Err(ReadError::Truncated(2))));
    }

    #[test]
    fn test_oversized_point_count() {
        let head = b"NUMBER OF SCANS: 1\nSCAN NUMBER: 1\nSCAN FILTER: Full ms \nRETENTION TIME: 0.1\n";

        let mut data = head.to_vec();
        data.extend_from_slice(b"DATA POINTS: 18446744073709551615\n");
        let result: Result<Vec<_>, _> = ExportReader::new(&data[..]).collect();
        assert!(matches!(
            result,
            Err(ReadError::InvalidValue { field: "DATA POINTS", .. })
        ));

        let mut data = head.to_vec();
        data.extend_from_slice(b"DATA POINTS: 1000000000000\n");
        data.extend_from_slice(&[0u8; 48]);
        let result: Result<Vec<_>, _> = ExportReader::new(&data[..]).collect();
        assert!(matches!(result, Err(ReadError::Truncated(1))));
    }

    #[test]
    fn test_malformed_lines() {
        let data = b"NUMBER OF SCANS: x\n";
        assert!(matches!(
            ExportReader::new(&data[..]).next(),
            Some(Err(ReadError::InvalidValue { .. }))
        ));

        let data = b"SCAN NUMBER: 1\nRETENTION TIME: 1.0\n";
        assert!(matches!(
            ExportReader::new(&data[..]).next(),
            Some(Err(ReadError::UnexpectedLine { expected: "SCAN FILTER", .. }))
        ));

        let data = b"SCAN NUMBER: 1\nSCAN FILTER: x\n";
        assert!(matches!(
            ExportReader::new(&data[..]).next(),
            Some(Err(ReadError::Truncated(1)))
        ));
    }
}
