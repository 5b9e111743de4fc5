use std::sync::Arc;

use crate::coordinator::EvseCoordinator;
use crate::device::{EvseApi, Schedule};

use super::derive::{RESTRICTED_MAX, design_current, is_restricted};
use super::{EntityError, EntityKind, EntityState, EntityValue, Readable, Writable, command_sent, format_number};

/// Current set when restricted mode is switched on from a higher setpoint.
const RESTRICTED_CURRENT: f64 = 12.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchKind {
    /// Plain flag written as `key=1` / `key=0`.
    Flag(&'static str),
    /// Derived from the current setpoint, toggled by changing it.
    RestrictedMode,
    /// `isAlarm`, written together with the rest of the schedule.
    Schedule,
    /// `aiMode` with `aiStatus` as fallback for reading.
    AdaptiveMode,
}

#[derive(Debug, Clone, Copy)]
pub struct SwitchDefinition {
    pub id: &'static str,
    pub name: &'static str,
    pub icon: Option<&'static str>,
    pub kind: SwitchKind,
}

pub const SWITCHES: [SwitchDefinition; 5] = [
    SwitchDefinition {
        id: "control_pe",
        name: "Ground control",
        icon: Some("mdi:shield-check-outline"),
        kind: SwitchKind::Flag("groundCtrl"),
    },
    SwitchDefinition {
        id: "restricted_mode",
        name: "16A mode",
        icon: Some("mdi:speedometer-slow"),
        kind: SwitchKind::RestrictedMode,
    },
    SwitchDefinition {
        id: "schedule",
        name: "Charge on schedule",
        icon: Some("mdi:calendar-clock"),
        kind: SwitchKind::Schedule,
    },
    SwitchDefinition {
        id: "one_charge",
        name: "One charge",
        icon: None,
        kind: SwitchKind::Flag("oneCharge"),
    },
    SwitchDefinition {
        id: "adaptive_mode",
        name: "Adaptive mode",
        icon: None,
        kind: SwitchKind::AdaptiveMode,
    },
];

pub struct Switch<A> {
    definition: SwitchDefinition,
    coordinator: EvseCoordinator<A>,
    client: Arc<A>,
}

impl<A: EvseApi> Switch<A> {
    pub fn new(definition: SwitchDefinition, coordinator: EvseCoordinator<A>, client: Arc<A>) -> Self {
        Self {
            definition,
            coordinator,
            client,
        }
    }

    pub fn id(&self) -> &'static str {
        self.definition.id
    }

    pub fn state(&self) -> EntityState {
        EntityState::new(self.definition.id, self.definition.name, EntityKind::Switch)
            .available(self.coordinator.last_update_success())
            .value(self.current_value().map(EntityValue::Bool))
            .icon(self.definition.icon)
    }

    async fn send_flag(&self, key: &'static str, on: bool) -> bool {
        let result = self.client.send_event(key, if on { "1" } else { "0" }).await;
        command_sent(self.definition.id, result)
    }

    async fn set_restricted(&self, on: bool) -> bool {
        let snapshot = self.coordinator.snapshot();
        let current = snapshot.number("currentSet").unwrap_or(f64::from(design_current(&snapshot)));

        let target = match on {
            true if current > RESTRICTED_CURRENT => RESTRICTED_CURRENT,
            false if current <= RESTRICTED_MAX => design_current(&snapshot).into(),
            _ => {
                tracing::debug!("Restricted mode already {}, current {} A", on, current);
                return false;
            }
        };

        let result = self.client.send_event("currentSet", &format_number(target)).await;
        command_sent(self.definition.id, result)
    }

    async fn set_schedule(&self, on: bool) -> Result<bool, EntityError> {
        let snapshot = self.coordinator.snapshot();
        if snapshot.is_empty() {
            return Err(EntityError::Rejected("no device data to build the schedule from".to_owned()));
        }

        let schedule = Schedule::from_snapshot(&snapshot).with_enabled(on);
        let result = self.client.send_timer(&schedule).await;
        Ok(command_sent(self.definition.id, result))
    }
}

impl<A: EvseApi> Readable for Switch<A> {
    type Value = bool;

    fn current_value(&self) -> Option<bool> {
        let snapshot = self.coordinator.snapshot();

        match self.definition.kind {
            SwitchKind::Flag(key) => Some(snapshot.flag(key).unwrap_or(false)),
            SwitchKind::RestrictedMode => Some(is_restricted(&snapshot)),
            SwitchKind::Schedule => Some(snapshot.flag("isAlarm").unwrap_or(false)),
            SwitchKind::AdaptiveMode => Some(
                snapshot
                    .flag("aiMode")
                    .or_else(|| snapshot.flag("aiStatus"))
                    .unwrap_or(false),
            ),
        }
    }
}

impl<A: EvseApi> Writable for Switch<A> {
    type Value = bool;

    #[tracing::instrument(skip(self), fields(entity = self.definition.id))]
    async fn set_value(&self, on: bool) -> Result<(), EntityError> {
        let sent = match self.definition.kind {
            SwitchKind::Flag(key) => self.send_flag(key, on).await,
            SwitchKind::AdaptiveMode => self.send_flag("aiMode", on).await,
            SwitchKind::RestrictedMode => self.set_restricted(on).await,
            SwitchKind::Schedule => self.set_schedule(on).await?,
        };

        if sent {
            self.coordinator.request_refresh();
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::{Value, json};

    use super::*;
    use crate::device::fake::{FakeEvse, Write};

    async fn switch(id: &str, main: Value) -> (Switch<FakeEvse>, Arc<FakeEvse>) {
        let fake = Arc::new(FakeEvse::new(json!({}), main));
        let coordinator = EvseCoordinator::new(fake.clone(), Duration::from_secs(10), Duration::from_secs(35));
        coordinator.refresh().await;

        let definition = SWITCHES.into_iter().find(|d| d.id == id).unwrap();
        (Switch::new(definition, coordinator, fake.clone()), fake)
    }

    #[tokio::test]
    async fn flags_are_written_as_digits() {
        let (control_pe, fake) = switch("control_pe", json!({"groundCtrl": 0})).await;
        assert_eq!(control_pe.current_value(), Some(false));

        control_pe.set_value(true).await.unwrap();
        control_pe.set_value(false).await.unwrap();

        assert_eq!(
            fake.writes(),
            vec![Write::event("groundCtrl", "1"), Write::event("groundCtrl", "0")]
        );
    }

    #[tokio::test]
    async fn restricted_mode_follows_current_setpoint() {
        let (restricted, _) = switch("restricted_mode", json!({"currentSet": 16})).await;
        assert_eq!(restricted.current_value(), Some(true));

        let (restricted, _) = switch("restricted_mode", json!({"currentSet": 17})).await;
        assert_eq!(restricted.current_value(), Some(false));
    }

    #[tokio::test]
    async fn restricted_mode_on_lowers_high_setpoint() {
        let (restricted, fake) = switch("restricted_mode", json!({"currentSet": 32})).await;
        restricted.set_value(true).await.unwrap();
        assert_eq!(fake.writes(), vec![Write::event("currentSet", "12")]);

        let (restricted, fake) = switch("restricted_mode", json!({"currentSet": 10})).await;
        restricted.set_value(true).await.unwrap();
        assert!(fake.writes().is_empty());
    }

    #[tokio::test]
    async fn restricted_mode_off_raises_to_design_current() {
        let (restricted, fake) = switch("restricted_mode", json!({"currentSet": 12, "curDesign": 24})).await;
        restricted.set_value(false).await.unwrap();
        assert_eq!(fake.writes(), vec![Write::event("currentSet", "24")]);

        let (restricted, fake) = switch("restricted_mode", json!({"currentSet": 20})).await;
        restricted.set_value(false).await.unwrap();
        assert!(fake.writes().is_empty());
    }

    #[tokio::test]
    async fn restricted_mode_off_only_below_the_16a_boundary() {
        let (restricted, fake) = switch("restricted_mode", json!({"currentSet": 16, "curDesign": 32})).await;
        restricted.set_value(false).await.unwrap();
        assert_eq!(fake.writes(), vec![Write::event("currentSet", "32")]);

        let (restricted, fake) = switch("restricted_mode", json!({"currentSet": 17, "curDesign": 32})).await;
        restricted.set_value(false).await.unwrap();
        assert!(fake.writes().is_empty());
    }

    #[tokio::test]
    async fn schedule_resends_full_tuple() {
        let (schedule, fake) = switch(
            "schedule",
            json!({"isAlarm": false, "startTime": "22:00", "stopTime": "06:30", "timeZone": "2"}),
        )
        .await;

        schedule.set_value(true).await.unwrap();

        assert_eq!(
            fake.writes(),
            vec![Write::Timer(Schedule {
                enabled: true,
                start: "22:00".to_owned(),
                stop: "06:30".to_owned(),
                time_zone: 2,
            })]
        );
    }

    #[tokio::test]
    async fn schedule_needs_device_data() {
        let (schedule, fake) = switch("schedule", json!({})).await;

        assert!(matches!(schedule.set_value(true).await, Err(EntityError::Rejected(_))));
        assert!(fake.writes().is_empty());
    }

    #[tokio::test]
    async fn adaptive_mode_falls_back_to_status() {
        let (adaptive, _) = switch("adaptive_mode", json!({"aiStatus": 1})).await;
        assert_eq!(adaptive.current_value(), Some(true));

        let (adaptive, fake) = switch("adaptive_mode", json!({"aiMode": 0, "aiStatus": 1})).await;
        assert_eq!(adaptive.current_value(), Some(false));

        adaptive.set_value(true).await.unwrap();
        assert_eq!(fake.writes(), vec![Write::event("aiMode", "1")]);
    }

    #[tokio::test]
    async fn one_charge_reads_flag() {
        let (one_charge, _) = switch("one_charge", json!({"oneCharge": "1"})).await;
        assert_eq!(one_charge.current_value(), Some(true));
    }
}
