use std::net::{Ipv4Addr, SocketAddrV4};
use std::time::Duration;

use anyhow::Context as _;
use config::{Config, Environment, File};
use infrastructure::{HttpServerConfig, MonitoringConfig, MqttConfig};
use serde::Deserialize;

use crate::device::{Credentials, DeviceType, EvseConnection};

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub evse: EvseSettings,
    pub monitoring: MonitoringConfig,
    pub http_server: HttpServerConfig,
    pub mqtt: Option<MqttConfig>,
}

impl Settings {
    pub fn new() -> anyhow::Result<Self> {
        let builder = Config::builder()
            .add_source(File::with_name("config.toml"))
            .add_source(Environment::with_prefix("EVSE").separator("__"));

        Self::build(builder)
    }

    #[cfg(test)]
    pub fn from_toml(toml: &str) -> anyhow::Result<Self> {
        Self::build(Config::builder().add_source(File::from_str(toml, config::FileFormat::Toml)))
    }

    fn build(builder: config::ConfigBuilder<config::builder::DefaultState>) -> anyhow::Result<Self> {
        let settings: Self = builder
            .build()
            .context("Error loading configuration")?
            .try_deserialize()
            .context("Error parsing configuration")?;

        settings.evse.validate()?;
        Ok(settings)
    }
}

/// Everything needed to talk to one charger and how often to poll it.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct EvseSettings {
    pub host: String,
    #[serde(default = "default_device_name")]
    pub device_name: String,
    pub username: Option<String>,
    pub password: Option<String>,
    #[serde(default)]
    pub device_type: DeviceType,
    #[serde(default = "default_update_rate_secs")]
    pub update_rate_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_cycle_timeout_secs")]
    pub cycle_timeout_secs: u64,
}

fn default_device_name() -> String {
    "Eveus Pro".to_owned()
}

fn default_update_rate_secs() -> u64 {
    10
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_cycle_timeout_secs() -> u64 {
    35
}

/// Fields that can be changed while running. Absent fields keep their value, empty credentials clear them.
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct EvseSettingsUpdate {
    pub host: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub device_type: Option<DeviceType>,
    pub update_rate_secs: Option<u64>,
}

impl EvseSettings {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.host.parse::<Ipv4Addr>().is_err() && self.host.parse::<SocketAddrV4>().is_err() {
            anyhow::bail!("EVSE host must be an IPv4 address with optional port, got {:?}", self.host);
        }

        if self.device_name.trim().is_empty() {
            anyhow::bail!("EVSE device name must not be empty");
        }

        if self.update_rate_secs < 1 {
            anyhow::bail!("EVSE update rate must be at least 1 second");
        }

        if self.request_timeout_secs < 1 || self.request_timeout_secs > self.cycle_timeout_secs {
            anyhow::bail!(
                "EVSE request timeout ({}s) must be between 1s and the cycle timeout ({}s)",
                self.request_timeout_secs,
                self.cycle_timeout_secs
            );
        }

        Ok(())
    }

    pub fn updated(&self, update: EvseSettingsUpdate) -> Self {
        let non_empty = |v: String| if v.trim().is_empty() { None } else { Some(v) };

        Self {
            host: update.host.unwrap_or_else(|| self.host.clone()),
            username: match update.username {
                Some(v) => non_empty(v),
                None => self.username.clone(),
            },
            password: match update.password {
                Some(v) => non_empty(v),
                None => self.password.clone(),
            },
            device_type: update.device_type.unwrap_or(self.device_type),
            update_rate_secs: update.update_rate_secs.unwrap_or(self.update_rate_secs),
            ..self.clone()
        }
    }

    pub fn connection(&self) -> EvseConnection {
        let credentials = match (&self.username, &self.password) {
            (Some(username), Some(password)) => Some(Credentials {
                username: username.clone(),
                password: password.clone(),
            }),
            _ => None,
        };

        EvseConnection {
            host: self.host.clone(),
            credentials,
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }

    pub fn update_interval(&self) -> Duration {
        Duration::from_secs(self.update_rate_secs)
    }

    pub fn cycle_timeout(&self) -> Duration {
        Duration::from_secs(self.cycle_timeout_secs)
    }

    /// Topic-safe form of the device name, `Eveus Pro` becomes `eveus_pro`.
    pub fn device_slug(&self) -> String {
        self.device_name
            .trim()
            .to_lowercase()
            .split(|c: char| !c.is_ascii_alphanumeric())
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join("_")
    }
}
