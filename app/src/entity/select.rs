use std::sync::Arc;
use std::time::Duration;

use crate::coordinator::EvseCoordinator;
use crate::device::{EvseApi, Schedule};

use super::{EntityError, EntityKind, EntityState, EntityValue, Readable, Writable, command_sent};

pub const TIME_ZONES: std::ops::RangeInclusive<i32> = -12..=12;
pub const UPDATE_RATES_SECS: [u64; 7] = [1, 2, 5, 10, 15, 30, 60];

/// UTC offset of the device clock, part of the schedule tuple.
pub struct TimeZoneSelect<A> {
    coordinator: EvseCoordinator<A>,
    client: Arc<A>,
}

impl<A: EvseApi> TimeZoneSelect<A> {
    pub const ID: &'static str = "time_zone";

    pub fn new(coordinator: EvseCoordinator<A>, client: Arc<A>) -> Self {
        Self { coordinator, client }
    }

    pub fn id(&self) -> &'static str {
        Self::ID
    }

    pub fn options() -> Vec<String> {
        TIME_ZONES.map(|tz| tz.to_string()).collect()
    }

    pub fn state(&self) -> EntityState {
        EntityState::new(Self::ID, "Time zone", EntityKind::Select)
            .available(self.coordinator.last_update_success())
            .value(self.current_value().map(EntityValue::Text))
            .icon(Some("mdi:map-clock-outline"))
            .options(Self::options())
    }
}

impl<A: EvseApi> Readable for TimeZoneSelect<A> {
    type Value = String;

    fn current_value(&self) -> Option<String> {
        let snapshot = self.coordinator.snapshot();
        snapshot.get("timeZone")?;

        let tz = snapshot.time_zone();
        if TIME_ZONES.contains(&tz) {
            Some(tz.to_string())
        } else {
            tracing::warn!("Device reports time zone {} outside of the supported range", tz);
            None
        }
    }
}

impl<A: EvseApi> Writable for TimeZoneSelect<A> {
    type Value = String;

    #[tracing::instrument(skip(self))]
    async fn set_value(&self, option: String) -> Result<(), EntityError> {
        let time_zone = option
            .parse::<i32>()
            .ok()
            .filter(|tz| TIME_ZONES.contains(tz))
            .ok_or_else(|| EntityError::InvalidInput(format!("{:?} is not a time zone between -12 and 12", option)))?;

        let snapshot = self.coordinator.snapshot();
        if snapshot.is_empty() {
            return Err(EntityError::Rejected("no device data to build the schedule from".to_owned()));
        }

        let schedule = Schedule {
            time_zone,
            ..Schedule::from_snapshot(&snapshot)
        };

        if command_sent(Self::ID, self.client.send_timer(&schedule).await) {
            self.coordinator.request_refresh();
        }

        Ok(())
    }
}

/// Polling cadence of the coordinator. Local setting, so always available.
pub struct UpdateRateSelect<A> {
    coordinator: EvseCoordinator<A>,
}

impl<A: EvseApi> UpdateRateSelect<A> {
    pub const ID: &'static str = "refresh_rate";

    pub fn new(coordinator: EvseCoordinator<A>) -> Self {
        Self { coordinator }
    }

    pub fn id(&self) -> &'static str {
        Self::ID
    }

    pub fn options() -> Vec<String> {
        UPDATE_RATES_SECS.iter().map(|s| s.to_string()).collect()
    }

    pub fn state(&self) -> EntityState {
        EntityState::new(Self::ID, "Refresh rate", EntityKind::Select)
            .available(true)
            .value(self.current_value().map(EntityValue::Text))
            .unit(Some("s"))
            .icon(Some("mdi:history"))
            .options(Self::options())
    }
}

impl<A: EvseApi> Readable for UpdateRateSelect<A> {
    type Value = String;

    fn current_value(&self) -> Option<String> {
        Some(self.coordinator.update_interval().as_secs().to_string())
    }
}

impl<A: EvseApi> Writable for UpdateRateSelect<A> {
    type Value = String;

    async fn set_value(&self, option: String) -> Result<(), EntityError> {
        let secs = option
            .parse::<u64>()
            .ok()
            .filter(|s| UPDATE_RATES_SECS.contains(s))
            .ok_or_else(|| EntityError::InvalidInput(format!("{:?} is not a supported refresh rate", option)))?;

        self.coordinator.set_update_interval(Duration::from_secs(secs));
        Ok(())
    }
}
