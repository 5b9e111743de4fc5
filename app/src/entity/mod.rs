mod button;
mod derive;
mod number;
mod registry;
mod select;
mod sensor;
mod switch;
mod text;

pub use button::Button;
pub use number::Number;
pub use registry::EntityRegistry;
pub use select::{TimeZoneSelect, UpdateRateSelect};
pub use sensor::{GroundStatus, Sensor};
pub use switch::Switch;
pub use text::ScheduleText;

use derive_more::{Display, Error};
use infrastructure::meter;
use serde::{Deserialize, Serialize};

use crate::device::{EvseApi, EvseHttpClient, Snapshot};

/// Something whose value is a projection of the current snapshot.
pub trait Readable {
    type Value;

    /// `None` when the device did not report the underlying field.
    fn current_value(&self) -> Option<Self::Value>;
}

/// Something that can change a setting on the device.
pub trait Writable {
    type Value;

    /// Fails only when the value is refused before anything is sent. Device errors are logged.
    async fn set_value(&self, value: Self::Value) -> Result<(), EntityError>;
}

pub trait Pressable {
    async fn press(&self) -> Result<(), EntityError>;
}

#[derive(Debug, PartialEq, Display, Error)]
pub enum EntityError {
    #[display("Unknown entity {_0}")]
    NotFound(#[error(not(source))] String),

    #[display("Entity {_0} does not accept this operation")]
    NotSupported(#[error(not(source))] &'static str),

    #[display("Invalid value: {_0}")]
    InvalidInput(#[error(not(source))] String),

    #[display("Command rejected: {_0}")]
    Rejected(#[error(not(source))] String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    #[display("sensor")]
    Sensor,
    #[display("number")]
    Number,
    #[display("switch")]
    Switch,
    #[display("select")]
    Select,
    #[display("button")]
    Button,
    #[display("text")]
    Text,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum EntityValue {
    Number(f64),
    Bool(bool),
    Text(String),
}

impl EntityValue {
    /// Payload form used on text-only transports.
    pub fn to_payload(&self) -> String {
        match self {
            EntityValue::Number(n) => format_number(*n),
            EntityValue::Bool(true) => "ON".to_owned(),
            EntityValue::Bool(false) => "OFF".to_owned(),
            EntityValue::Text(s) => s.clone(),
        }
    }
}

/// Value received from the host for a write.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum EntityInput {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl EntityInput {
    pub fn as_number(&self) -> Result<f64, EntityError> {
        let value = match self {
            EntityInput::Number(n) => *n,
            EntityInput::Text(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| EntityError::InvalidInput(format!("{:?} is not a number", s)))?,
            EntityInput::Bool(b) => return Err(EntityError::InvalidInput(format!("{} is not a number", b))),
        };

        if value.is_finite() {
            Ok(value)
        } else {
            Err(EntityError::InvalidInput(format!("{} is not a finite number", value)))
        }
    }

    pub fn as_bool(&self) -> Result<bool, EntityError> {
        match self {
            EntityInput::Bool(b) => Ok(*b),
            EntityInput::Number(n) if *n == 1.0 => Ok(true),
            EntityInput::Number(n) if *n == 0.0 => Ok(false),
            EntityInput::Text(s) => match s.trim().to_lowercase().as_str() {
                "on" | "true" | "1" => Ok(true),
                "off" | "false" | "0" => Ok(false),
                _ => Err(EntityError::InvalidInput(format!("{:?} is not on/off", s))),
            },
            other => Err(EntityError::InvalidInput(format!("{:?} is not on/off", other))),
        }
    }

    pub fn as_text(&self) -> Result<String, EntityError> {
        match self {
            EntityInput::Text(s) => Ok(s.trim().to_owned()),
            EntityInput::Number(n) => Ok(format_number(*n)),
            EntityInput::Bool(b) => Err(EntityError::InvalidInput(format!("{} is not text", b))),
        }
    }
}

/// Whole numbers without a fractional part, so that `12.0` goes out as `12`.
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

/// Counts and logs the outcome of a device write. Returns whether the device accepted it.
fn command_sent(target: &'static str, result: anyhow::Result<()>) -> bool {
    match result {
        Ok(()) => {
            meter::increment("evse_command_total", &[("target", target), ("result", "success")]);
            true
        }
        Err(e) => {
            meter::increment("evse_command_total", &[("target", target), ("result", "failed")]);
            tracing::error!("Error sending {} command to EVSE: {:?}", target, e);
            false
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityState {
    pub id: &'static str,
    pub name: &'static str,
    pub kind: EntityKind,
    pub available: bool,
    pub value: Option<EntityValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<f64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
}

impl EntityState {
    pub fn new(id: &'static str, name: &'static str, kind: EntityKind) -> Self {
        Self {
            id,
            name,
            kind,
            available: false,
            value: None,
            unit: None,
            icon: None,
            min: None,
            max: None,
            step: None,
            options: vec![],
        }
    }

    pub fn available(mut self, available: bool) -> Self {
        self.available = available;
        self
    }

    pub fn value(mut self, value: Option<EntityValue>) -> Self {
        self.value = value;
        self
    }

    pub fn unit(mut self, unit: Option<&'static str>) -> Self {
        self.unit = unit;
        self
    }

    pub fn icon(mut self, icon: Option<&'static str>) -> Self {
        self.icon = icon;
        self
    }

    pub fn range(mut self, min: f64, max: f64, step: f64) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self.step = Some(step);
        self
    }

    pub fn options(mut self, options: Vec<String>) -> Self {
        self.options = options;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceInfo {
    pub name: String,
    pub title: String,
    pub manufacturer: &'static str,
    pub model: &'static str,
    pub sw_version: Option<String>,
    pub last_update_success: bool,
}

impl DeviceInfo {
    pub fn new(device_name: &str, host: &str, snapshot: &Snapshot, last_update_success: bool) -> Self {
        Self {
            name: device_name.to_owned(),
            title: format!("EVSE Energy Star ({})", host),
            manufacturer: "Energy Star",
            model: "EVSE",
            sw_version: snapshot.text("fwVersion"),
            last_update_success,
        }
    }
}

/// Every adapter of one charger, dispatched by role.
pub enum EvseEntity<A = EvseHttpClient> {
    Sensor(Sensor<A>),
    GroundStatus(GroundStatus<A>),
    Number(Number<A>),
    Switch(Switch<A>),
    TimeZone(TimeZoneSelect<A>),
    UpdateRate(UpdateRateSelect<A>),
    Button(Button<A>),
    Text(ScheduleText<A>),
}

impl<A: EvseApi> EvseEntity<A> {
    pub fn id(&self) -> &'static str {
        match self {
            EvseEntity::Sensor(e) => e.id(),
            EvseEntity::GroundStatus(e) => e.id(),
            EvseEntity::Number(e) => e.id(),
            EvseEntity::Switch(e) => e.id(),
            EvseEntity::TimeZone(e) => e.id(),
            EvseEntity::UpdateRate(e) => e.id(),
            EvseEntity::Button(e) => e.id(),
            EvseEntity::Text(e) => e.id(),
        }
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            EvseEntity::Sensor(_) | EvseEntity::GroundStatus(_) => EntityKind::Sensor,
            EvseEntity::Number(_) => EntityKind::Number,
            EvseEntity::Switch(_) => EntityKind::Switch,
            EvseEntity::TimeZone(_) | EvseEntity::UpdateRate(_) => EntityKind::Select,
            EvseEntity::Button(_) => EntityKind::Button,
            EvseEntity::Text(_) => EntityKind::Text,
        }
    }

    pub fn state(&self) -> EntityState {
        match self {
            EvseEntity::Sensor(e) => e.state(),
            EvseEntity::GroundStatus(e) => e.state(),
            EvseEntity::Number(e) => e.state(),
            EvseEntity::Switch(e) => e.state(),
            EvseEntity::TimeZone(e) => e.state(),
            EvseEntity::UpdateRate(e) => e.state(),
            EvseEntity::Button(e) => e.state(),
            EvseEntity::Text(e) => e.state(),
        }
    }

    /// Whether a change from `previous` to `next` is too small to be worth publishing.
    pub fn is_insignificant_change(&self, previous: &EntityValue, next: &EntityValue) -> bool {
        match self {
            EvseEntity::Sensor(e) => e.is_insignificant_change(previous, next),
            _ => false,
        }
    }

    pub async fn apply(&self, input: EntityInput) -> Result<(), EntityError> {
        match self {
            EvseEntity::Number(e) => e.set_value(input.as_number()?).await,
            EvseEntity::Switch(e) => e.set_value(input.as_bool()?).await,
            EvseEntity::TimeZone(e) => e.set_value(input.as_text()?).await,
            EvseEntity::UpdateRate(e) => e.set_value(input.as_text()?).await,
            EvseEntity::Text(e) => e.set_value(input.as_text()?).await,
            EvseEntity::Sensor(_) | EvseEntity::GroundStatus(_) | EvseEntity::Button(_) => {
                Err(EntityError::NotSupported(self.id()))
            }
        }
    }

    pub async fn press(&self) -> Result<(), EntityError> {
        match self {
            EvseEntity::Button(e) => e.press().await,
            _ => Err(EntityError::NotSupported(self.id())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_is_deserialized_by_shape() {
        assert_eq!(serde_json::from_str::<EntityInput>("true").unwrap(), EntityInput::Bool(true));
        assert_eq!(serde_json::from_str::<EntityInput>("12").unwrap(), EntityInput::Number(12.0));
        assert_eq!(
            serde_json::from_str::<EntityInput>("\"23:00\"").unwrap(),
            EntityInput::Text("23:00".to_owned())
        );
    }

    #[test]
    fn input_conversions() {
        assert_eq!(EntityInput::Text(" 12 ".to_owned()).as_number().unwrap(), 12.0);
        assert!(EntityInput::Text("abc".to_owned()).as_number().is_err());
        assert!(EntityInput::Bool(true).as_number().is_err());

        assert!(EntityInput::Text("ON".to_owned()).as_bool().unwrap());
        assert!(!EntityInput::Text("off".to_owned()).as_bool().unwrap());
        assert!(EntityInput::Number(1.0).as_bool().unwrap());
        assert!(EntityInput::Number(2.0).as_bool().is_err());

        assert_eq!(EntityInput::Number(-3.0).as_text().unwrap(), "-3");
    }

    #[test]
    fn numbers_are_formatted_without_trailing_zero() {
        assert_eq!(format_number(12.0), "12");
        assert_eq!(format_number(-12.0), "-12");
        assert_eq!(format_number(12.5), "12.5");
    }

    #[test]
    fn payloads_for_text_transports() {
        assert_eq!(EntityValue::Number(16.0).to_payload(), "16");
        assert_eq!(EntityValue::Bool(true).to_payload(), "ON");
        assert_eq!(EntityValue::Text("charging".to_owned()).to_payload(), "charging");
    }
}
