mod client;
pub mod snapshot;
mod status;

#[cfg(test)]
pub mod fake;

use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use client::EvseHttpClient;
pub use snapshot::{Payload, Snapshot};
pub use status::ChargingStatus;

pub const PATH_INIT: &str = "/init";
pub const PATH_MAIN: &str = "/main";
pub const PATH_PAGE_EVENT: &str = "/pageEvent";
pub const PATH_TIMER: &str = "/timer";

//Trait would need boxing for dyn use; generics over the implementation are used instead
pub trait EvseApi {
    /// Identity and configuration fields. `Err` only for transport failures, malformed responses yield an empty payload.
    async fn fetch_init(&self) -> anyhow::Result<Payload>;

    /// Live telemetry. Same failure contract as `fetch_init`.
    async fn fetch_main(&self) -> anyhow::Result<Payload>;

    /// Applies settings through a single form-encoded page event.
    async fn send_events(&self, fields: &[(&str, String)]) -> anyhow::Result<()>;

    /// Replaces the whole charge schedule. The device has no partial update.
    async fn send_timer(&self, schedule: &Schedule) -> anyhow::Result<()>;

    /// Points all following requests at a new host and credentials.
    fn reconfigure(&self, connection: &EvseConnection) -> anyhow::Result<()>;

    async fn send_event(&self, key: &str, value: &str) -> anyhow::Result<()> {
        self.send_events(&[(key, value.to_owned())]).await
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, derive_more::Display)]
pub enum DeviceType {
    #[default]
    #[serde(rename = "1_phase")]
    #[display("1_phase")]
    SinglePhase,
    #[serde(rename = "3_phase")]
    #[display("3_phase")]
    ThreePhase,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Everything the HTTP client needs to reach the device.
#[derive(Debug, Clone, PartialEq)]
pub struct EvseConnection {
    pub host: String,
    pub credentials: Option<Credentials>,
    pub request_timeout: Duration,
}

impl EvseConnection {
    pub fn base_url(&self) -> String {
        format!("http://{}", self.host)
    }
}

/// The four fields that make up the device's timed-charging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    pub enabled: bool,
    pub start: String,
    pub stop: String,
    pub time_zone: i32,
}

impl Schedule {
    pub const DEFAULT_START: &'static str = "23:00";
    pub const DEFAULT_STOP: &'static str = "07:00";

    /// Latest known schedule, falling back to defaults for fields the device did not report.
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        Self {
            enabled: snapshot.flag("isAlarm").unwrap_or(false),
            start: snapshot
                .text("startTime")
                .unwrap_or_else(|| Self::DEFAULT_START.to_owned()),
            stop: snapshot
                .text("stopTime")
                .unwrap_or_else(|| Self::DEFAULT_STOP.to_owned()),
            time_zone: snapshot.time_zone(),
        }
    }

    pub fn with_enabled(self, enabled: bool) -> Self {
        Self { enabled, ..self }
    }

    pub fn form_fields(&self) -> [(&'static str, String); 4] {
        [
            ("isAlarm", self.enabled.to_string()),
            ("startTime", self.start.clone()),
            ("stopTime", self.stop.clone()),
            ("timeZone", self.time_zone.to_string()),
        ]
    }
}
