pub struct Volt;

impl Volt {
    pub const SYMBOL: &'static str = "V";
}
