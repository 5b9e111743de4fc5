pub struct DegreeCelsius;

impl DegreeCelsius {
    pub const SYMBOL: &'static str = "°C";
}
