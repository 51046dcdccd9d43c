use std::any::Any;
use std::io;
use std::panic;
use std::path::Path;

use log::{debug, info, warn};

use rawdump::trailer::{CHARGE_STATE, MONOISOTOPIC_MZ};
use rawdump::{
    DynamicValue, ExportError, Peak, PeakListOptions, ScanHeader, ScanRange, ScanSource,
    SourceError, SourceProvider,
};
use thermorawfilereader::{RawFileReader, RawSpectrum, get_runtime};

/// Intensity cutoff interpretations understood by [`PeakListOptions::cutoff_type`]
const CUTOFF_ABSOLUTE: i32 = 1;
const CUTOFF_RELATIVE: i32 = 2;

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "the runtime panicked while starting".to_string()
    }
}

/// A live `dotnet` runtime session hosting Thermo's `RawFileReader` library.
///
/// The runtime is process-wide and stays loaded for the remainder of the process once
/// started, so dropping the provider only ends the session from our side.
#[derive(Debug)]
pub struct ThermoProvider {
    opened: usize,
}

impl ThermoProvider {
    /// Bring up the runtime, unpacking the bundled assemblies if needed. See
    /// [`thermorawfilereader::set_runtime_dir`] to control where they are unpacked.
    pub fn start() -> Result<Self, ExportError> {
        match panic::catch_unwind(get_runtime) {
            Ok(_) => {
                debug!("RawFileReader runtime is up");
                Ok(Self { opened: 0 })
            }
            Err(payload) => Err(ExportError::AdapterInit(panic_message(payload))),
        }
    }
}

impl Drop for ThermoProvider {
    fn drop(&mut self) {
        debug!("Ending RawFileReader session after {} file(s)", self.opened);
    }
}

pub(crate) fn open_error(path: &Path, err: io::Error) -> SourceError {
    match err.kind() {
        io::ErrorKind::NotFound => SourceError::FileNotFound(path.to_path_buf()),
        io::ErrorKind::InvalidData => SourceError::InvalidFormat(path.to_path_buf()),
        _ => SourceError::Io(err),
    }
}

impl SourceProvider for ThermoProvider {
    type Source = ThermoSource;

    fn open(&mut self, path: &Path) -> Result<Self::Source, SourceError> {
        let reader = RawFileReader::open(path).map_err(|e| open_error(path, e))?;
        self.opened += 1;
        info!("Opened {} holding {} spectra", path.display(), reader.len());
        Ok(ThermoSource::new(reader))
    }
}

/// The coercions applied to a precursor's charge on its way into the trailer table. The
/// trailer holds a 16-bit integer, anything wider is reported as an unexpected type.
pub(crate) fn charge_value(charge: i32) -> DynamicValue {
    match i16::try_from(charge) {
        Ok(z) => DynamicValue::Int16(z),
        Err(_) => DynamicValue::Other,
    }
}

/// Build a [`ScanHeader`] from a spectrum's signal and acquisition window.
pub(crate) fn signal_header(
    retention_time: f64,
    window: Option<(f64, f64)>,
    mz: &[f64],
    intensity: &[f32],
) -> ScanHeader {
    let mut total_ion_current = 0.0;
    let mut base_peak_mz = 0.0;
    let mut base_peak_intensity = 0.0;
    for (m, i) in mz.iter().zip(intensity.iter()) {
        let i = *i as f64;
        total_ion_current += i;
        if i > base_peak_intensity {
            base_peak_intensity = i;
            base_peak_mz = *m;
        }
    }
    let (low_mz, high_mz) = window.unwrap_or_else(|| {
        (
            mz.first().copied().unwrap_or_default(),
            mz.last().copied().unwrap_or_default(),
        )
    });
    ScanHeader {
        points: mz.len().min(intensity.len()) as i64,
        retention_time,
        low_mz,
        high_mz,
        total_ion_current,
        base_peak_mz,
        base_peak_intensity,
        channel: 0,
        uniform_time: false,
        frequency: 0.0,
    }
}

/// Apply the reductions in `options` to a peak list in m/z order. The result stays in
/// m/z order.
pub(crate) fn reduce_peaks(mut peaks: Vec<Peak>, options: &PeakListOptions) -> Vec<Peak> {
    let threshold = match options.cutoff_type {
        CUTOFF_ABSOLUTE => Some(options.cutoff_value as f64),
        CUTOFF_RELATIVE => {
            let base = peaks.iter().map(|p| p.intensity).fold(0.0, f64::max);
            Some(base * options.cutoff_value as f64 / 100.0)
        }
        _ => None,
    };
    if let Some(threshold) = threshold {
        peaks.retain(|p| p.intensity >= threshold);
    }

    if options.max_peaks > 0 && peaks.len() > options.max_peaks as usize {
        let mut by_intensity: Vec<usize> = (0..peaks.len()).collect();
        by_intensity.sort_by(|a, b| peaks[*b].intensity.total_cmp(&peaks[*a].intensity));
        by_intensity.truncate(options.max_peaks as usize);
        by_intensity.sort_unstable();
        peaks = by_intensity.into_iter().map(|i| peaks[i]).collect();
    }
    peaks
}

/// An open Thermo RAW file.
///
/// The pipeline asks for the filter, header, trailers and peaks of one scan in turn, so
/// the most recently decoded spectrum is kept around and reused until a different scan
/// is requested.
pub struct ThermoSource {
    reader: RawFileReader,
    cached: Option<(i64, RawSpectrum)>,
}

impl ThermoSource {
    pub fn new(reader: RawFileReader) -> Self {
        Self {
            reader,
            cached: None,
        }
    }

    /// Scan numbers start at 1, spectrum indices at 0
    fn spectrum(&mut self, scan: i64) -> Option<&RawSpectrum> {
        let hit = matches!(&self.cached, Some((n, _)) if *n == scan);
        if !hit {
            let index = usize::try_from(scan.checked_sub(1)?).ok()?;
            let spectrum = self.reader.get(index)?;
            self.cached = Some((scan, spectrum));
        }
        self.cached.as_ref().map(|(_, spectrum)| spectrum)
    }

    fn set_centroid(&mut self, centroid: bool) {
        if self.reader.get_centroid_spectra() != centroid {
            debug!("Switching centroid spectra to {centroid}");
            self.reader.set_centroid_spectra(centroid);
            self.cached = None;
        }
    }
}

impl ScanSource for ThermoSource {
    type Peaks = Vec<Peak>;

    fn scan_range(&mut self) -> Result<ScanRange, SourceError> {
        if self.reader.is_empty() {
            return Ok(ScanRange::new(1, 0));
        }
        let first = self.reader.first_spectrum();
        if first <= 0 {
            return Err(SourceError::FirstScanUnavailable);
        }
        let last = self.reader.last_spectrum();
        if last <= 0 {
            return Err(SourceError::LastScanUnavailable);
        }
        Ok(ScanRange::new(first as i64, last as i64))
    }

    fn filter(&mut self, scan: i64) -> Option<String> {
        self.spectrum(scan)?.filter_string().map(str::to_string)
    }

    fn header(&mut self, scan: i64) -> Result<ScanHeader, SourceError> {
        let spectrum = self
            .spectrum(scan)
            .ok_or(SourceError::ScanUnavailable(scan))?;
        let window = spectrum
            .acquisition()
            .map(|acq| (acq.low_mz() as f64, acq.high_mz() as f64));
        let header = match spectrum.data() {
            Some(data) => signal_header(spectrum.time(), window, &data.mz(), &data.intensity()),
            None => signal_header(spectrum.time(), window, &[], &[]),
        };
        Ok(header)
    }

    fn trailer_value(&mut self, scan: i64, key: &str) -> DynamicValue {
        let Some(precursor) = self.spectrum(scan).and_then(|s| s.precursor()) else {
            return DynamicValue::Absent;
        };
        // The reader exposes the selected ion rather than the raw trailer table, so the
        // monoisotopic m/z is whatever precursor m/z the reader settled on.
        match key {
            MONOISOTOPIC_MZ => DynamicValue::Float64(precursor.mz()),
            CHARGE_STATE => charge_value(precursor.charge()),
            _ => DynamicValue::Absent,
        }
    }

    fn peak_list(
        &mut self,
        scan: i64,
        options: &PeakListOptions,
    ) -> Result<Self::Peaks, SourceError> {
        self.set_centroid(options.centroid);
        let spectrum = self
            .spectrum(scan)
            .ok_or(SourceError::ScanUnavailable(scan))?;
        let Some(data) = spectrum.data() else {
            warn!("Scan {scan} carries no signal");
            return Ok(Vec::new());
        };
        let peaks: Vec<Peak> = data
            .mz()
            .iter()
            .zip(data.intensity().iter())
            .map(|(mz, int)| Peak::new(*mz, *int as f64))
            .collect();
        if options.is_unfiltered() {
            Ok(peaks)
        } else {
            Ok(reduce_peaks(peaks, options))
        }
    }

    fn close(self) -> Result<(), SourceError> {
        debug!("Closing RAW file after {} spectra", self.reader.len());
        drop(self);
        Ok(())
    }
}
