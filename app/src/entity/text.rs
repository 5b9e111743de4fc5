use std::sync::Arc;

use crate::coordinator::EvseCoordinator;
use crate::core::time::ClockTime;
use crate::device::{EvseApi, Schedule};

use super::{EntityError, EntityKind, EntityState, EntityValue, Readable, Writable, command_sent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleField {
    Start,
    Stop,
}

impl ScheduleField {
    fn key(&self) -> &'static str {
        match self {
            ScheduleField::Start => "startTime",
            ScheduleField::Stop => "stopTime",
        }
    }
}

/// Start or stop time of the charge schedule, `H:MM` or `HH:MM`.
pub struct ScheduleText<A> {
    field: ScheduleField,
    coordinator: EvseCoordinator<A>,
    client: Arc<A>,
}

impl<A: EvseApi> ScheduleText<A> {
    pub fn new(field: ScheduleField, coordinator: EvseCoordinator<A>, client: Arc<A>) -> Self {
        Self {
            field,
            coordinator,
            client,
        }
    }

    pub fn id(&self) -> &'static str {
        match self.field {
            ScheduleField::Start => "start_time",
            ScheduleField::Stop => "stop_time",
        }
    }

    pub fn state(&self) -> EntityState {
        let name = match self.field {
            ScheduleField::Start => "Schedule start",
            ScheduleField::Stop => "Schedule stop",
        };

        EntityState::new(self.id(), name, EntityKind::Text)
            .available(self.coordinator.last_update_success())
            .value(self.current_value().map(EntityValue::Text))
            .icon(Some("mdi:clock-time-four-outline"))
    }
}

impl<A: EvseApi> Readable for ScheduleText<A> {
    type Value = String;

    fn current_value(&self) -> Option<String> {
        self.coordinator.snapshot().text(self.field.key())
    }
}

impl<A: EvseApi> Writable for ScheduleText<A> {
    type Value = String;

    #[tracing::instrument(skip(self), fields(entity = self.id()))]
    async fn set_value(&self, value: String) -> Result<(), EntityError> {
        let time = value
            .parse::<ClockTime>()
            .map_err(|e| EntityError::InvalidInput(e.to_string()))?;

        let snapshot = self.coordinator.snapshot();
        if snapshot.is_empty() {
            return Err(EntityError::Rejected("no device data to build the schedule from".to_owned()));
        }

        let mut schedule = Schedule::from_snapshot(&snapshot);
        match self.field {
            ScheduleField::Start => schedule.start = time.to_string(),
            ScheduleField::Stop => schedule.stop = time.to_string(),
        }

        if command_sent(self.id(), self.client.send_timer(&schedule).await) {
            self.coordinator.request_refresh();
        }

        Ok(())
    }
}
