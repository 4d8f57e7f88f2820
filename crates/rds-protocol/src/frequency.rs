//! FM band frequency model
//!
//! User-facing frequencies are integers in kHz. The radio device works in
//! units of 1/16 kHz, so every value crossing the tuner boundary is scaled by
//! [`FREQUENCY_SCALE`].

use std::fmt;

use crate::error::FrequencyError;
use crate::Direction;

/// Lowest tunable frequency (kHz)
pub const FREQUENCY_MIN: u32 = 87_500;
/// Highest tunable frequency (kHz)
pub const FREQUENCY_MAX: u32 = 108_000;
/// Channel grid spacing (kHz)
pub const FREQUENCY_STEP: u32 = 100;
/// Device units per kHz
pub const FREQUENCY_SCALE: u32 = 16;

/// A validated in-band, on-grid frequency in kHz
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "u32", into = "u32")
)]
pub struct Frequency(u32);

impl Frequency {
    /// Bottom of the band
    pub const MIN: Frequency = Frequency(FREQUENCY_MIN);
    /// Top of the band
    pub const MAX: Frequency = Frequency(FREQUENCY_MAX);

    /// Validate a frequency in kHz
    pub fn new(khz: u32) -> Result<Self, FrequencyError> {
        if !(FREQUENCY_MIN..=FREQUENCY_MAX).contains(&khz) {
            return Err(FrequencyError::OutOfRange(khz));
        }
        if khz % FREQUENCY_STEP != 0 {
            return Err(FrequencyError::OffGrid(khz));
        }
        Ok(Self(khz))
    }

    /// Frequency in kHz
    pub fn khz(self) -> u32 {
        self.0
    }

    /// Frequency in device register units
    pub fn to_device_units(self) -> u32 {
        self.0 * FREQUENCY_SCALE
    }

    /// Convert device register units back to kHz (truncating)
    pub fn khz_from_device_units(units: u32) -> u32 {
        units / FREQUENCY_SCALE
    }
}

impl TryFrom<u32> for Frequency {
    type Error = FrequencyError;

    fn try_from(khz: u32) -> Result<Self, Self::Error> {
        Self::new(khz)
    }
}

impl From<Frequency> for u32 {
    fn from(freq: Frequency) -> u32 {
        freq.0
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Move one channel up or down from `current_khz`, wrapping at the band edges
///
/// Stepping past the top lands on [`FREQUENCY_MIN`] and stepping below the
/// bottom lands on [`FREQUENCY_MAX`]. Inside the band the value simply moves
/// by [`FREQUENCY_STEP`], even if `current_khz` was off-grid.
pub fn step_wrapping(current_khz: u32, direction: Direction) -> u32 {
    let next = match direction {
        Direction::Up => current_khz.saturating_add(FREQUENCY_STEP),
        Direction::Down => current_khz.saturating_sub(FREQUENCY_STEP),
    };

    if next > FREQUENCY_MAX {
        FREQUENCY_MIN
    } else if next < FREQUENCY_MIN {
        FREQUENCY_MAX
    } else {
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_band_edges_are_valid() {
        assert_eq!(Frequency::new(87_500).unwrap(), Frequency::MIN);
        assert_eq!(Frequency::new(108_000).unwrap(), Frequency::MAX);
    }

    #[test]
    fn test_rejects_out_of_band() {
        assert_eq!(
            Frequency::new(87_400),
            Err(FrequencyError::OutOfRange(87_400))
        );
        assert_eq!(
            Frequency::new(108_100),
            Err(FrequencyError::OutOfRange(108_100))
        );
    }

    #[test]
    fn test_rejects_off_grid() {
        assert_eq!(Frequency::new(87_550), Err(FrequencyError::OffGrid(87_550)));
    }

    #[test]
    fn test_device_scaling() {
        let freq = Frequency::new(100_100).unwrap();
        assert_eq!(freq.to_device_units(), 1_601_600);
        assert_eq!(Frequency::khz_from_device_units(1_601_600), 100_100);
        // Readback truncates partial units
        assert_eq!(Frequency::khz_from_device_units(1_601_615), 100_100);
    }

    #[test]
    fn test_step_inside_band() {
        assert_eq!(step_wrapping(95_000, Direction::Up), 95_100);
        assert_eq!(step_wrapping(95_000, Direction::Down), 94_900);
    }

    #[test]
    fn test_step_wraps_to_opposite_edge() {
        assert_eq!(step_wrapping(108_000, Direction::Up), 87_500);
        assert_eq!(step_wrapping(87_500, Direction::Down), 108_000);
        // Not a modulo sweep: 107_950 + 100 overshoots and lands on MIN
        assert_eq!(step_wrapping(107_950, Direction::Up), 87_500);
    }

    #[test]
    fn test_step_from_zero_does_not_underflow() {
        assert_eq!(step_wrapping(0, Direction::Down), 108_000);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_deserialize_validates() {
        let ok: Frequency = serde_json::from_str("99500").unwrap();
        assert_eq!(ok.khz(), 99_500);
        assert!(serde_json::from_str::<Frequency>("99550").is_err());
    }
}
