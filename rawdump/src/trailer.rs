//! Trailer entries are the loosely typed key/value pairs an instrument records alongside
//! each scan. The values come back tagged with whatever representation the instrument
//! chose, so each consumer field has its own explicit conversion.

/// Trailer key holding the monoisotopic precursor m/z of a fragmentation scan
pub const MONOISOTOPIC_MZ: &str = "Monoisotopic M/Z:";

/// Trailer key holding the precursor charge state of a fragmentation scan
pub const CHARGE_STATE: &str = "Charge State:";

/// A dynamically typed trailer value.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum DynamicValue {
    Float32(f32),
    Float64(f64),
    Int16(i16),
    /// The key isn't present for this scan
    #[default]
    Absent,
    /// Present, but of a type no consumer field accepts
    Other,
}

impl DynamicValue {
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    /// Interpret the value as a precursor m/z.
    ///
    /// Either float width is accepted. An absent entry leaves `current` untouched,
    /// any other representation resets it to zero.
    pub fn as_precursor_mz(&self, current: f64) -> f64 {
        match self {
            Self::Float32(v) => f64::from(*v),
            Self::Float64(v) => *v,
            Self::Absent => current,
            Self::Int16(_) | Self::Other => 0.0,
        }
    }

    /// Interpret the value as a precursor charge. Only a 16-bit integer is accepted,
    /// anything else leaves `current` untouched.
    pub fn as_charge(&self, current: i32) -> i32 {
        match self {
            Self::Int16(z) => i32::from(*z),
            _ => current,
        }
    }
}

impl From<f32> for DynamicValue {
    fn from(value: f32) -> Self {
        Self::Float32(value)
    }
}

impl From<f64> for DynamicValue {
    fn from(value: f64) -> Self {
        Self::Float64(value)
    }
}

impl From<i16> for DynamicValue {
    fn from(value: i16) -> Self {
        Self::Int16(value)
    }
}

impl<T: Into<DynamicValue>> From<Option<T>> for DynamicValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Self::Absent)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_precursor_mz_coercion() {
        assert_eq!(DynamicValue::Float64(445.12).as_precursor_mz(0.0), 445.12);
        assert_eq!(
            DynamicValue::Float32(445.25).as_precursor_mz(0.0),
            445.25f32 as f64
        );
        assert_eq!(DynamicValue::Absent.as_precursor_mz(0.0), 0.0);
        assert_eq!(DynamicValue::Absent.as_precursor_mz(12.5), 12.5);
        assert_eq!(DynamicValue::Int16(2).as_precursor_mz(12.5), 0.0);
        assert_eq!(DynamicValue::Other.as_precursor_mz(12.5), 0.0);
    }

    #[test]
    fn test_charge_coercion() {
        assert_eq!(DynamicValue::Int16(3).as_charge(0), 3);
        assert_eq!(DynamicValue::Int16(-2).as_charge(0), -2);
        assert_eq!(DynamicValue::Float64(2.0).as_charge(0), 0);
        assert_eq!(DynamicValue::Float32(2.0).as_charge(0), 0);
        assert_eq!(DynamicValue::Absent.as_charge(0), 0);
        assert_eq!(DynamicValue::Other.as_charge(0), 0);
    }

    #[test]
    fn test_from_option() {
        assert_eq!(DynamicValue::from(Some(2i16)), DynamicValue::Int16(2));
        assert_eq!(DynamicValue::from(None::<f64>), DynamicValue::Absent);
        assert!(DynamicValue::default().is_absent());
    }
}
