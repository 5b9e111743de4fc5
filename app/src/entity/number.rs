use std::sync::Arc;

use crate::coordinator::EvseCoordinator;
use crate::core::unit::{Ampere, Volt};
use crate::device::EvseApi;

use super::derive::current_limit_max;
use super::{EntityError, EntityKind, EntityState, EntityValue, Readable, Writable, command_sent, format_number};

#[derive(Debug, Clone, Copy)]
pub struct NumberDefinition {
    pub id: &'static str,
    pub key: &'static str,
    pub name: &'static str,
    pub icon: &'static str,
    pub unit: &'static str,
    pub min: f64,
    pub max: NumberMax,
    pub step: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NumberMax {
    Fixed(f64),
    /// Restricted mode or the design current, whichever applies.
    CurrentLimit,
}

pub const NUMBERS: [NumberDefinition; 2] = [
    NumberDefinition {
        id: "current_limit",
        key: "currentSet",
        name: "Current limit",
        icon: "mdi:current-dc",
        unit: Ampere::SYMBOL,
        min: 6.0,
        max: NumberMax::CurrentLimit,
        step: 1.0,
    },
    NumberDefinition {
        id: "voltage_adaptive",
        key: "aiVoltage",
        name: "Adaptive mode voltage",
        icon: "mdi:flash-outline",
        unit: Volt::SYMBOL,
        min: 180.0,
        max: NumberMax::Fixed(240.0),
        step: 1.0,
    },
];

pub struct Number<A> {
    definition: NumberDefinition,
    coordinator: EvseCoordinator<A>,
    client: Arc<A>,
}

impl<A: EvseApi> Number<A> {
    pub fn new(definition: NumberDefinition, coordinator: EvseCoordinator<A>, client: Arc<A>) -> Self {
        Self {
            definition,
            coordinator,
            client,
        }
    }

    pub fn id(&self) -> &'static str {
        self.definition.id
    }

    pub fn max_value(&self) -> f64 {
        match self.definition.max {
            NumberMax::Fixed(max) => max,
            NumberMax::CurrentLimit => current_limit_max(&self.coordinator.snapshot()).into(),
        }
    }

    pub fn state(&self) -> EntityState {
        EntityState::new(self.definition.id, self.definition.name, EntityKind::Number)
            .available(self.coordinator.last_update_success())
            .value(self.current_value().map(EntityValue::Number))
            .unit(Some(self.definition.unit))
            .icon(Some(self.definition.icon))
            .range(self.definition.min, self.max_value(), self.definition.step)
    }
}

impl<A: EvseApi> Readable for Number<A> {
    type Value = f64;

    fn current_value(&self) -> Option<f64> {
        self.coordinator.snapshot().number(self.definition.key)
    }
}

impl<A: EvseApi> Writable for Number<A> {
    type Value = f64;

    #[tracing::instrument(skip(self), fields(entity = self.definition.id))]
    async fn set_value(&self, value: f64) -> Result<(), EntityError> {
        let max = self.max_value();
        if !(self.definition.min..=max).contains(&value) {
            return Err(EntityError::InvalidInput(format!(
                "{} must be between {} and {}",
                self.definition.id,
                format_number(self.definition.min),
                format_number(max)
            )));
        }

        let result = self
            .client
            .send_event(self.definition.key, &format_number(value))
            .await;

        if command_sent(self.definition.id, result) {
            self.coordinator.request_refresh();
        }

        Ok(())
    }
}
