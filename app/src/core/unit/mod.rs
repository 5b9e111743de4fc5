mod ampere;
mod degree_celsius;
mod kwh;
mod volt;

pub use ampere::{Ampere, MilliAmpere};
pub use degree_celsius::DegreeCelsius;
pub use kwh::KiloWattHours;
pub use volt::Volt;

/// Rounds to the given number of decimal places, ties to even.
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round_ties_even() / factor
}
