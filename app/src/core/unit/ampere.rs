#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Ampere(pub f64);

impl Ampere {
    pub const SYMBOL: &'static str = "A";

    /// The device reports phase currents in tenths of an ampere.
    pub fn from_deciampere(value: f64) -> Self {
        Self(value / 10.0)
    }
}

impl From<f64> for Ampere {
    fn from(value: f64) -> Self {
        Self(value)
    }
}

impl From<Ampere> for f64 {
    fn from(value: Ampere) -> Self {
        value.0
    }
}

///Leakage current
pub struct MilliAmpere;

impl MilliAmpere {
    pub const SYMBOL: &'static str = "mA";
}
