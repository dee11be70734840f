//! Unit conversion applied to extracted prices before publishing
//!
//! Upstream APIs disagree on the unit of the value they return, so the
//! transform is always an explicit configuration choice and never implied by
//! the data source.

use serde::{Deserialize, Serialize};

/// Linear transform applied to a successfully extracted price
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UnitConversion {
    /// Publish the upstream value unchanged
    #[default]
    None,
    /// `(value - 32) * 5 / 9`
    FahrenheitToCelsius,
    /// `value * scale + offset`, e.g. `scale: 0.1` turns EUR/MWh into ct/kWh
    Linear { scale: f64, offset: f64 },
}

impl UnitConversion {
    /// Apply the conversion to a value
    pub fn apply(&self, value: f64) -> f64 {
        match self {
            Self::None => value,
            Self::FahrenheitToCelsius => (value - 32.0) * 5.0 / 9.0,
            Self::Linear { scale, offset } => value * scale + offset,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::FahrenheitToCelsius => "fahrenheit_to_celsius",
            Self::Linear { .. } => "linear",
        }
    }

    pub(crate) fn is_finite(&self) -> bool {
        match self {
            Self::Linear { scale, offset } => scale.is_finite() && offset.is_finite(),
            _ => true,
        }
    }
}

/// Round to a fixed number of decimals; `None` leaves the value untouched
pub fn round_to_decimals(value: f64, decimals: Option<u32>) -> f64 {
    match decimals {
        Some(d) => {
            let factor = 10f64.powi(d.min(9) as i32);
            (value * factor).round() / factor
        }
        None => value,
    }
}

/// One-decimal rendering used wherever a reading is shown to people
pub fn format_display(value: f64) -> String {
    format!("{:.1}", value)
}
