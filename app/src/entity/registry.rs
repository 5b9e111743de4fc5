use std::sync::{Arc, PoisonError, RwLock};

use infrastructure::meter;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::coordinator::EvseCoordinator;
use crate::device::{DeviceType, EvseApi, EvseHttpClient};

use super::button::{Button, ButtonKind};
use super::number::{NUMBERS, Number};
use super::select::{TimeZoneSelect, UpdateRateSelect};
use super::sensor::{self, GroundStatus, Sensor};
use super::switch::{SWITCHES, Switch};
use super::text::{ScheduleField, ScheduleText};
use super::{EntityError, EntityInput, EntityState, EntityValue, EvseEntity};

/// The entity set of one charger. Re-publishes all states after every refresh cycle.
pub struct EntityRegistry<A = EvseHttpClient> {
    coordinator: EvseCoordinator<A>,
    catalog: RwLock<Catalog<A>>,
    published: watch::Sender<Vec<EntityState>>,
}

struct Catalog<A> {
    device_type: DeviceType,
    entities: Arc<Vec<EvseEntity<A>>>,
}

impl<A> Clone for Catalog<A> {
    fn clone(&self) -> Self {
        Self {
            device_type: self.device_type,
            entities: self.entities.clone(),
        }
    }
}

impl<A: EvseApi> EntityRegistry<A> {
    pub fn new(coordinator: EvseCoordinator<A>, device_type: DeviceType) -> Self {
        let entities = Arc::new(build(&coordinator, device_type));

        Self {
            coordinator,
            catalog: RwLock::new(Catalog { device_type, entities }),
            published: watch::Sender::new(vec![]),
        }
    }

    pub fn device_type(&self) -> DeviceType {
        self.catalog().device_type
    }

    /// Replaces the entity set, e.g. after switching between single- and three-phase.
    pub fn rebuild(&self, device_type: DeviceType) {
        let entities = Arc::new(build(&self.coordinator, device_type));
        tracing::info!("Rebuilt entities for {} device: {} entities", device_type, entities.len());

        *self.catalog.write().unwrap_or_else(PoisonError::into_inner) = Catalog { device_type, entities };
        self.publish();
    }

    pub fn entities(&self) -> Arc<Vec<EvseEntity<A>>> {
        self.catalog().entities
    }

    fn catalog(&self) -> Catalog<A> {
        self.catalog.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn states(&self) -> Vec<EntityState> {
        self.entities().iter().map(|e| e.state()).collect()
    }

    pub fn state(&self, id: &str) -> Option<EntityState> {
        self.entities().iter().find(|e| e.id() == id).map(|e| e.state())
    }

    pub async fn apply(&self, id: &str, input: EntityInput) -> Result<(), EntityError> {
        let entities = self.entities();
        let entity = find(&entities, id)?;
        tracing::info!("Setting {} to {:?}", id, input);
        entity.apply(input).await
    }

    pub async fn press(&self, id: &str) -> Result<(), EntityError> {
        let entities = self.entities();
        let entity = find(&entities, id)?;
        tracing::info!("Pressing {}", id);
        entity.press().await
    }

    /// Last published state of every entity.
    #[cfg(test)]
    pub fn published(&self) -> Vec<EntityState> {
        self.published.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<EntityState>> {
        self.published.subscribe()
    }

    /// Recomputes all states and publishes those that changed in a meaningful way.
    pub fn publish(&self) {
        let entities = self.entities();

        self.published.send_if_modified(|published| {
            let next: Vec<EntityState> = entities
                .iter()
                .map(|entity| {
                    let mut state = entity.state();
                    let previous = published.iter().find(|p| p.id == state.id);

                    if let (Some(prev), Some(next)) = (previous.and_then(|p| p.value.as_ref()), state.value.as_ref()) {
                        if entity.is_insignificant_change(prev, next) {
                            state.value = Some(prev.clone());
                        }
                    }

                    state
                })
                .collect();

            if *published == next {
                false
            } else {
                *published = next;
                true
            }
        });

        for state in self.published.borrow().iter() {
            if let (true, Some(EntityValue::Number(value))) = (state.available, &state.value) {
                meter::set("evse_entity_value", *value, &[("entity", state.id)]);
            }
        }
    }

    pub async fn run(&self, shutdown: CancellationToken) {
        let mut events = self.coordinator.subscribe();
        self.publish();

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("Entity publisher stopped");
                    return;
                },

                event = events.recv() => match event {
                    Some(event) => {
                        tracing::debug!(
                            "Publishing entity states of refresh #{} (success: {}, {} fields)",
                            event.generation,
                            event.success,
                            event.snapshot.len()
                        );
                        self.publish();
                    }
                    None => return,
                },
            }
        }
    }
}

fn find<'a, A: EvseApi>(entities: &'a [EvseEntity<A>], id: &str) -> Result<&'a EvseEntity<A>, EntityError> {
    entities
        .iter()
        .find(|e| e.id() == id)
        .ok_or_else(|| EntityError::NotFound(id.to_owned()))
}

fn build<A: EvseApi>(coordinator: &EvseCoordinator<A>, device_type: DeviceType) -> Vec<EvseEntity<A>> {
    let client = coordinator.api().clone();
    let mut entities = vec![];

    entities.extend(
        sensor::definitions(device_type)
            .into_iter()
            .map(|d| EvseEntity::Sensor(Sensor::new(d, coordinator.clone()))),
    );
    entities.push(EvseEntity::GroundStatus(GroundStatus::new(coordinator.clone())));

    entities.extend(
        NUMBERS
            .into_iter()
            .map(|d| EvseEntity::Number(Number::new(d, coordinator.clone(), client.clone()))),
    );
    entities.extend(
        SWITCHES
            .into_iter()
            .map(|d| EvseEntity::Switch(Switch::new(d, coordinator.clone(), client.clone()))),
    );

    entities.push(EvseEntity::TimeZone(TimeZoneSelect::new(coordinator.clone(), client.clone())));
    entities.push(EvseEntity::UpdateRate(UpdateRateSelect::new(coordinator.clone())));

    for kind in [ButtonKind::SyncTime, ButtonKind::ChargeNow] {
        entities.push(EvseEntity::Button(Button::new(kind, coordinator.clone(), client.clone())));
    }

    for field in [ScheduleField::Start, ScheduleField::Stop] {
        entities.push(EvseEntity::Text(ScheduleText::new(field, coordinator.clone(), client.clone())));
    }

    entities
}
