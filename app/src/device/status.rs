use derive_more::Display;

/// Charging state as reported in the `state` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ChargingStatus {
    #[display("no_data")]
    NoData,
    #[display("charging")]
    Charging,
    #[display("waiting")]
    Waiting,
    #[display("ready")]
    Ready,
    #[display("delayed_start")]
    DelayedStart,
    #[display("overcurrent")]
    Overcurrent,
    #[display("overvoltage")]
    Overvoltage,
    #[display("leakage")]
    Leakage,
    #[display("station_error")]
    StationError,
    #[display("overtemperature")]
    Overtemperature,
    #[display("locked")]
    Locked,
    #[display("no_ground")]
    NoGround,
    #[display("plug_overheat")]
    PlugOverheat,
    #[display("undervoltage")]
    Undervoltage,
    #[display("unknown")]
    Unknown,
}

impl ChargingStatus {
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => ChargingStatus::NoData,
            6 => ChargingStatus::Charging,
            9 => ChargingStatus::Waiting,
            12 => ChargingStatus::Ready,
            13 => ChargingStatus::DelayedStart,
            14 => ChargingStatus::Overcurrent,
            15 => ChargingStatus::Overvoltage,
            16 => ChargingStatus::Leakage,
            17 => ChargingStatus::StationError,
            18 => ChargingStatus::Overtemperature,
            19 => ChargingStatus::Locked,
            20 => ChargingStatus::NoGround,
            21 => ChargingStatus::PlugOverheat,
            22 => ChargingStatus::Undervoltage,
            _ => ChargingStatus::Unknown,
        }
    }
}
