//! Unit newtypes for the quantities the sampler moves around.
//!
//! The circuit engine reports load and generator setpoints in kW/kvar and bus
//! voltages in per-unit. Keeping them as distinct types stops a kvar value from
//! landing in a kW column by accident.
//!
//! ```
//! use voltset_core::units::{percent_scale, Kilowatts};
//!
//! let p = Kilowatts(10.0);
//! assert_eq!((p * percent_scale(50.0)).value(), 15.0);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Mul, Sub};

/// Scaling, raw access and display shared by every unit type.
macro_rules! impl_unit {
    ($type:ty, $unit_name:literal) => {
        impl Mul<f64> for $type {
            type Output = Self;
            fn mul(self, rhs: f64) -> Self::Output {
                Self(self.0 * rhs)
            }
        }

        impl fmt::Display for $type {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{:.4} {}", self.0, $unit_name)
            }
        }

        impl $type {
            #[inline]
            pub const fn new(value: f64) -> Self {
                Self(value)
            }

            #[inline]
            pub const fn value(self) -> f64 {
                self.0
            }

            #[inline]
            pub fn is_finite(self) -> bool {
                self.0.is_finite()
            }
        }
    };
}

/// Real power in kilowatts (kW)
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Kilowatts(pub f64);

impl_unit!(Kilowatts, "kW");

/// Reactive power in kilovolt-amperes reactive (kvar)
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Kilovars(pub f64);

impl_unit!(Kilovars, "kvar");

/// Voltage magnitude in per-unit (pu), normalized to the bus nominal voltage.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct PerUnit(pub f64);

impl_unit!(PerUnit, "pu");

impl PerUnit {
    pub const ONE: Self = Self(1.0);
}

/// Voltage deviation between two solves.
impl Sub for PerUnit {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

/// Scale factor for a percentage change: `1 + pct/100`.
#[inline]
pub fn percent_scale(pct: f64) -> f64 {
    1.0 + pct / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scaling() {
        assert_eq!((Kilowatts(100.0) * 2.0).value(), 200.0);
        assert_eq!((Kilovars(4.0) * percent_scale(-25.0)).value(), 3.0);
        assert!(!Kilowatts(f64::NAN).is_finite());
    }

    #[test]
    fn test_percent_scale() {
        assert_eq!(percent_scale(0.0), 1.0);
        assert_eq!(percent_scale(50.0), 1.5);
        assert_eq!(percent_scale(-50.0), 0.5);
        assert_eq!(percent_scale(-100.0), 0.0);
    }

    #[test]
    fn test_voltage_deviation() {
        let delta = PerUnit(0.97) - PerUnit::ONE;
        assert!((delta.value() + 0.03).abs() < 1e-12);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Kilowatts(10.0)), "10.0000 kW");
        assert_eq!(format!("{}", Kilovars(2.0)), "2.0000 kvar");
        assert_eq!(format!("{}", PerUnit::ONE), "1.0000 pu");
    }

    #[test]
    fn test_serde_is_transparent() {
        let json = serde_json::to_string(&Kilowatts(12.5)).unwrap();
        assert_eq!(json, "12.5");
        let back: Kilovars = serde_json::from_str("3.25").unwrap();
        assert_eq!(back, Kilovars(3.25));
    }
}
