use std::io::{self, Write};
use std::ops::Deref;

use crate::error::ExportError;
use crate::record::{FixedFloat, ScanRecord};
use crate::source::Peak;

/// A [`Write`] adapter that flushes the wrapped writer after every write, so each
/// byte handed to it is visible downstream immediately.
///
/// Bytes are passed through untouched, there is no newline translation anywhere in the
/// output path.
#[derive(Debug)]
pub struct Unbuffered<W: Write> {
    inner: W,
}

impl<W: Write> Unbuffered<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for Unbuffered<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.inner.flush()?;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Serializes the export stream.
///
/// The stream is a single `NUMBER OF SCANS` line followed by one record per scan:
///
/// ```text
/// SCAN NUMBER: <n>
/// SCAN FILTER: <filter>
/// RETENTION TIME: <minutes>
/// PRECURSOR: <mz> <charge>      (fragmentation scans only)
/// DATA POINTS: <count>
/// <count × (f64 mass, f64 intensity), native byte order>
/// ```
///
/// Fatal conditions are reported in-band as a single `ERROR: ...` line.
#[derive(Debug)]
pub struct RecordEmitter<W: Write> {
    writer: W,
    records_written: usize,
}

impl<W: Write> RecordEmitter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            records_written: 0,
        }
    }

    pub fn records_written(&self) -> usize {
        self.records_written
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    pub fn write_scan_count(&mut self, total: i64) -> io::Result<()> {
        writeln!(self.writer, "NUMBER OF SCANS: {total}")
    }

    pub fn write_record<P: Deref<Target = [Peak]>>(
        &mut self,
        record: &ScanRecord<P>,
    ) -> io::Result<()> {
        writeln!(self.writer, "SCAN NUMBER: {}", record.scan_number)?;
        writeln!(self.writer, "SCAN FILTER: {}", record.filter)?;
        writeln!(
            self.writer,
            "RETENTION TIME: {}",
            FixedFloat(record.retention_time)
        )?;
        if let Some(precursor) = &record.precursor {
            writeln!(
                self.writer,
                "PRECURSOR: {} {}",
                FixedFloat(precursor.mz),
                precursor.charge
            )?;
        }
        writeln!(self.writer, "DATA POINTS: {}", record.data_points())?;
        let payload: &[u8] = bytemuck::cast_slice(&record.peaks[..]);
        self.writer.write_all(payload)?;
        self.records_written += 1;
        Ok(())
    }

    pub fn write_error(&mut self, error: &ExportError) -> io::Result<()> {
        writeln!(self.writer, "ERROR: {error}")?;
        self.writer.flush()
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::record::Precursor;

    fn peak_bytes(peaks: &[Peak]) -> Vec<u8> {
        let mut buf = Vec::new();
        for p in peaks {
            buf.extend_from_slice(&p.mass.to_ne_bytes());
            buf.extend_from_slice(&p.intensity.to_ne_bytes());
        }
        buf
    }

    #[test]
    fn test_primary_record_layout() -> io::Result<()> {
        let peaks = vec![Peak::new(400.0, 10.0), Peak::new(401.5, 0.25)];
        let record = ScanRecord {
            scan_number: 1,
            filter: "FTMS + p NSI Full ms [400.00-2000.00]".to_string(),
            retention_time: 0.004,
            precursor: None,
            peaks: peaks.clone(),
        };
        let mut emitter = RecordEmitter::new(Vec::new());
        emitter.write_scan_count(1)?;
        emitter.write_record(&record)?;
        assert_eq!(emitter.records_written(), 1);

        let mut expected = b"NUMBER OF SCANS: 1\n\
SCAN NUMBER: 1\n\
SCAN FILTER: FTMS + p NSI Full ms [400.00-2000.00]\n\
RETENTION TIME: 0.004000\n\
DATA POINTS: 2\n"
            .to_vec();
        expected.extend(peak_bytes(&peaks));
        assert_eq!(emitter.into_inner(), expected);
        Ok(())
    }

    #[test]
    fn test_fragmentation_record_layout() -> io::Result<()> {
        let record = ScanRecord {
            scan_number: 7,
            filter: "ITMS + c NSI d Full ms2 810.79@cid35.00 [210.00-1635.00]".to_string(),
            retention_time: 1.5,
            precursor: Some(Precursor::new(810.789, 2)),
            peaks: Vec::<Peak>::new(),
        };
        let mut emitter = RecordEmitter::new(Vec::new());
        emitter.write_record(&record)?;
        let text = String::from_utf8(emitter.into_inner()).unwrap();
        assert_eq!(
            text,
            "SCAN NUMBER: 7\n\
SCAN FILTER: ITMS + c NSI d Full ms2 810.79@cid35.00 [210.00-1635.00]\n\
RETENTION TIME: 1.500000\n\
PRECURSOR: 810.789000 2\n\
DATA POINTS: 0\n"
        );
        Ok(())
    }

    #[test]
    fn test_error_line() -> io::Result<()> {
        let mut emitter = RecordEmitter::new(Vec::new());
        emitter.write_error(&ExportError::MissingFilter(2))?;
        assert_eq!(
            emitter.into_inner(),
            b"ERROR: Could not extract scan filter line for scan #2\n".to_vec()
        );
        Ok(())
    }

    #[derive(Default)]
    struct CountingWriter {
        data: Vec<u8>,
        flushes: usize,
    }

    impl Write for CountingWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            self.flushes += 1;
            Ok(())
        }
    }

    #[test]
    fn test_unbuffered_flushes_each_write() -> io::Result<()> {
        let mut writer = Unbuffered::new(CountingWriter::default());
        writer.write_all(b"abc")?;
        writer.write_all(b"\n\r\n")?;
        assert_eq!(writer.get_ref().flushes, 2);
        assert_eq!(writer.into_inner().data, b"abc\n\r\n".to_vec());
        Ok(())
    }
}
