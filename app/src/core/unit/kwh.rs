#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KiloWattHours(pub f64);

impl KiloWattHours {
    pub const SYMBOL: &'static str = "kWh";

    /// Energy counters are reported in units of 100 Wh.
    pub fn from_hectowatt_hours(value: f64) -> Self {
        Self(value / 10.0)
    }
}

impl From<KiloWattHours> for f64 {
    fn from(value: KiloWattHours) -> Self {
        value.0
    }
}
