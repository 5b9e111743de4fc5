use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::coordinator::EvseCoordinator;
use crate::device::{EvseApi, Schedule};

use super::{EntityError, EntityKind, EntityState, Pressable, command_sent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonKind {
    SyncTime,
    ChargeNow,
}

impl ButtonKind {
    pub fn id(&self) -> &'static str {
        match self {
            ButtonKind::SyncTime => "sync_time",
            ButtonKind::ChargeNow => "charge_now",
        }
    }

    fn name(&self) -> &'static str {
        match self {
            ButtonKind::SyncTime => "Sync time",
            ButtonKind::ChargeNow => "Charge now",
        }
    }

    fn icon(&self) -> &'static str {
        match self {
            ButtonKind::SyncTime => "mdi:clock-check-outline",
            ButtonKind::ChargeNow => "mdi:battery-charging-high",
        }
    }
}

/// One write of the "charge now" sequence. The device only starts a session in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChargeNowStep {
    CancelOneCharge,
    EnableCharging,
    DisableSchedule,
    LiftLimits,
    Start,
}

impl ChargeNowStep {
    const SEQUENCE: [ChargeNowStep; 5] = [
        ChargeNowStep::CancelOneCharge,
        ChargeNowStep::EnableCharging,
        ChargeNowStep::DisableSchedule,
        ChargeNowStep::LiftLimits,
        ChargeNowStep::Start,
    ];

    const TIME_LIMIT: &'static str = "500000";
    const ENERGY_LIMIT: &'static str = "10000";
    const START_CODE: &'static str = "12";

    async fn send(self, api: &impl EvseApi, schedule: &Schedule) -> anyhow::Result<()> {
        match self {
            ChargeNowStep::CancelOneCharge => api.send_event("oneCharge", "0").await,
            ChargeNowStep::EnableCharging => api.send_event("evseEnabled", "1").await,
            ChargeNowStep::DisableSchedule => api.send_timer(&schedule.clone().with_enabled(false)).await,
            ChargeNowStep::LiftLimits => {
                api.send_events(&[
                    ("timeLimit", Self::TIME_LIMIT.to_owned()),
                    ("energyLimit", Self::ENERGY_LIMIT.to_owned()),
                ])
                .await
            }
            ChargeNowStep::Start => api.send_event("chargeNow", Self::START_CODE).await,
        }
    }
}

pub struct Button<A> {
    kind: ButtonKind,
    coordinator: EvseCoordinator<A>,
    client: Arc<A>,
}

impl<A: EvseApi> Button<A> {
    pub fn new(kind: ButtonKind, coordinator: EvseCoordinator<A>, client: Arc<A>) -> Self {
        Self {
            kind,
            coordinator,
            client,
        }
    }

    pub fn id(&self) -> &'static str {
        self.kind.id()
    }

    pub fn state(&self) -> EntityState {
        EntityState::new(self.kind.id(), self.kind.name(), EntityKind::Button)
            .available(self.coordinator.last_update_success())
            .icon(Some(self.kind.icon()))
    }

    /// Sets the device clock to `now`, shifted into the device's time zone.
    pub async fn sync_time_at(&self, now: DateTime<Utc>) {
        let time_zone = self.coordinator.snapshot().time_zone();
        let system_time = now.timestamp() + i64::from(time_zone) * 3600;
        tracing::debug!("Syncing EVSE clock to {} (time zone {})", system_time, time_zone);

        let result = self
            .client
            .send_event("systemTime", &system_time.to_string())
            .await;

        if command_sent(self.kind.id(), result) {
            self.coordinator.request_refresh();
        }
    }

    async fn charge_now(&self) {
        let schedule = Schedule::from_snapshot(&self.coordinator.snapshot());

        for step in ChargeNowStep::SEQUENCE {
            if let Err(e) = step.send(self.client.as_ref(), &schedule).await {
                command_sent(self.kind.id(), Err(e));
                tracing::warn!("Charge now abandoned at step {:?}", step);
                self.coordinator.request_refresh();
                return;
            }
        }

        command_sent(self.kind.id(), Ok(()));
        tracing::info!("Charge now sequence sent to EVSE");
        self.coordinator.request_refresh();
    }
}

impl<A: EvseApi> Pressable for Button<A> {
    #[tracing::instrument(skip(self), fields(entity = self.kind.id()))]
    async fn press(&self) -> Result<(), EntityError> {
        match self.kind {
            ButtonKind::SyncTime => self.sync_time_at(Utc::now()).await,
            ButtonKind::ChargeNow => self.charge_now().await,
        }

        Ok(())
    }
}
