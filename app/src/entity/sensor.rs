use crate::coordinator::EvseCoordinator;
use crate::core::unit::{Ampere, DegreeCelsius, KiloWattHours, MilliAmpere, Volt};
use crate::device::{DeviceType, EvseApi};

use super::derive::{Derivation, ground_glyph};
use super::{EntityKind, EntityState, EntityValue, Readable};

#[derive(Debug, Clone, Copy)]
pub struct SensorDefinition {
    pub id: &'static str,
    pub key: &'static str,
    pub name: &'static str,
    pub unit: Option<&'static str>,
    pub derivation: Derivation,
}

const fn sensor(
    id: &'static str,
    key: &'static str,
    name: &'static str,
    unit: Option<&'static str>,
    derivation: Derivation,
) -> SensorDefinition {
    SensorDefinition {
        id,
        key,
        name,
        unit,
        derivation,
    }
}

pub const SENSORS: [SensorDefinition; 11] = [
    sensor("status", "state", "Charging status", None, Derivation::Status),
    sensor("current_set", "currentSet", "Current (set)", Some(Ampere::SYMBOL), Derivation::Number),
    sensor("current_phase_1", "curMeas1", "Current phase 1", Some(Ampere::SYMBOL), Derivation::DeciAmpere),
    sensor("voltage_phase_1", "voltMeas1", "Voltage phase 1", Some(Volt::SYMBOL), Derivation::Number),
    sensor("temperature_box", "temperature1", "Box temperature", Some(DegreeCelsius::SYMBOL), Derivation::Number),
    sensor("temperature_socket", "temperature2", "Socket temperature", Some(DegreeCelsius::SYMBOL), Derivation::Number),
    sensor("leakage", "leakValue", "Leakage", Some(MilliAmpere::SYMBOL), Derivation::Number),
    sensor("session_energy", "sessionEnergy", "Session energy", Some(KiloWattHours::SYMBOL), Derivation::Energy),
    sensor("session_time", "sessionTime", "Session time", None, Derivation::SessionTime),
    sensor("total_energy", "totalEnergy", "Total energy", Some(KiloWattHours::SYMBOL), Derivation::Energy),
    sensor("system_time", "systemTime", "System time", None, Derivation::Clock),
];

//phases 2 and 3 are reported unscaled
pub const THREE_PHASE_SENSORS: [SensorDefinition; 4] = [
    sensor("current_phase_2", "curMeas2", "Current phase 2", Some(Ampere::SYMBOL), Derivation::Number),
    sensor("current_phase_3", "curMeas3", "Current phase 3", Some(Ampere::SYMBOL), Derivation::Number),
    sensor("voltage_phase_2", "voltMeas2", "Voltage phase 2", Some(Volt::SYMBOL), Derivation::Number),
    sensor("voltage_phase_3", "voltMeas3", "Voltage phase 3", Some(Volt::SYMBOL), Derivation::Number),
];

pub fn definitions(device_type: DeviceType) -> Vec<SensorDefinition> {
    let mut definitions = SENSORS.to_vec();
    if device_type == DeviceType::ThreePhase {
        definitions.extend(THREE_PHASE_SENSORS);
    }
    definitions
}

pub struct Sensor<A> {
    definition: SensorDefinition,
    coordinator: EvseCoordinator<A>,
}

impl<A: EvseApi> Sensor<A> {
    pub fn new(definition: SensorDefinition, coordinator: EvseCoordinator<A>) -> Self {
        Self {
            definition,
            coordinator,
        }
    }

    pub fn id(&self) -> &'static str {
        self.definition.id
    }

    pub fn is_insignificant_change(&self, previous: &EntityValue, next: &EntityValue) -> bool {
        self.definition.derivation.is_insignificant_change(previous, next)
    }

    pub fn state(&self) -> EntityState {
        EntityState::new(self.definition.id, self.definition.name, EntityKind::Sensor)
            .available(self.coordinator.last_update_success())
            .value(self.current_value())
            .unit(self.definition.unit)
    }
}

impl<A: EvseApi> Readable for Sensor<A> {
    type Value = EntityValue;

    fn current_value(&self) -> Option<EntityValue> {
        let snapshot = self.coordinator.snapshot();
        let raw = snapshot.get(self.definition.key)?;
        Some(self.definition.derivation.apply_or_raw(self.definition.id, raw))
    }
}

/// Protective earth indicator, shown as a glyph.
pub struct GroundStatus<A> {
    coordinator: EvseCoordinator<A>,
}

impl<A: EvseApi> GroundStatus<A> {
    pub const ID: &'static str = "ground_status";

    pub fn new(coordinator: EvseCoordinator<A>) -> Self {
        Self { coordinator }
    }

    pub fn id(&self) -> &'static str {
        Self::ID
    }

    pub fn state(&self) -> EntityState {
        let grounded = self.current_value().unwrap_or(false);
        let icon = if grounded {
            "mdi:checkbox-marked-circle"
        } else {
            "mdi:close-circle-outline"
        };

        EntityState::new(Self::ID, "Ground", EntityKind::Sensor)
            .available(self.coordinator.last_update_success())
            .value(Some(EntityValue::Text(ground_glyph(grounded).to_owned())))
            .icon(Some(icon))
    }
}

impl<A: EvseApi> Readable for GroundStatus<A> {
    type Value = bool;

    fn current_value(&self) -> Option<bool> {
        Some(self.coordinator.snapshot().flag("ground").unwrap_or(false))
    }
}
