use std::collections::HashMap;
use std::sync::Arc;

use infrastructure::{MqttInMessage, MqttLastWill, MqttSender, MqttSubscription};
use tokio_util::sync::CancellationToken;

use crate::device::{EvseApi, EvseHttpClient};
use crate::entity::{EntityError, EntityInput, EntityKind, EntityState};
use crate::integration::EvseIntegration;

const ONLINE: &str = "online";
const OFFLINE: &str = "offline";
const PRESS: &str = "PRESS";

/// Topic layout of one device below the configured base topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvseTopics {
    prefix: String,
}

impl EvseTopics {
    pub fn new(base_topic: &str, device_slug: &str) -> Self {
        Self {
            prefix: format!("{}/{}", base_topic.trim_end_matches('/'), device_slug),
        }
    }

    pub fn availability(&self) -> String {
        format!("{}/availability", self.prefix)
    }

    pub fn state(&self, entity_id: &str) -> String {
        format!("{}/{}/state", self.prefix, entity_id)
    }

    /// Filter matching the command topic of every entity.
    pub fn commands(&self) -> String {
        format!("{}/+/set", self.prefix)
    }

    pub fn last_will(&self) -> MqttLastWill {
        MqttLastWill {
            topic: self.availability(),
            payload: OFFLINE.to_owned(),
        }
    }

    fn entity_of_command<'a>(&self, topic: &'a str) -> Option<&'a str> {
        topic
            .strip_prefix(self.prefix.as_str())?
            .strip_prefix('/')?
            .strip_suffix("/set")
            .filter(|id| !id.is_empty() && !id.contains('/'))
    }
}

/// Remembers what was sent last, so that retained states are only re-sent on change.
#[derive(Debug, Default)]
struct StateExport {
    sent: HashMap<String, String>,
}

impl StateExport {
    fn changes(&mut self, topics: &EvseTopics, states: &[EntityState]) -> Vec<(String, String)> {
        let mut changes = vec![];

        for state in states {
            let Some(value) = &state.value else {
                continue;
            };

            let topic = topics.state(state.id);
            let payload = value.to_payload();

            if self.sent.get(&topic) != Some(&payload) {
                self.sent.insert(topic.clone(), payload.clone());
                changes.push((topic, payload));
            }
        }

        changes
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Command {
    Set(EntityInput),
    Press,
}

fn parse_command(kind: EntityKind, payload: &str) -> Result<Command, EntityError> {
    match kind {
        EntityKind::Button if payload.trim().eq_ignore_ascii_case(PRESS) => Ok(Command::Press),
        EntityKind::Button => Err(EntityError::InvalidInput(format!("expected {}, got {:?}", PRESS, payload))),
        _ => Ok(Command::Set(EntityInput::Text(payload.to_owned()))),
    }
}

/// Mirrors entity states to MQTT and applies commands received on the `set` topics.
pub struct MqttBridge<A = EvseHttpClient> {
    integration: Arc<EvseIntegration<A>>,
    sender: MqttSender,
    commands: MqttSubscription,
    topics: EvseTopics,
}

impl<A: EvseApi> MqttBridge<A> {
    pub fn new(
        integration: Arc<EvseIntegration<A>>,
        sender: MqttSender,
        commands: MqttSubscription,
        topics: EvseTopics,
    ) -> Self {
        Self {
            integration,
            sender,
            commands,
            topics,
        }
    }

    pub async fn run(mut self, shutdown: CancellationToken) {
        let mut published = self.integration.registry().subscribe();
        let mut export = StateExport::default();
        let mut online = None;

        loop {
            let states = published.borrow_and_update().clone();
            online = self.export(&mut export, &states, online).await;

            tokio::select! {
                _ = shutdown.cancelled() => break,

                changed = published.changed() => {
                    if changed.is_err() {
                        break;
                    }
                },

                Some(message) = self.commands.recv() => {
                    self.handle_command(message).await;
                },
            }
        }

        if let Err(e) = self.sender.send_retained(self.topics.availability(), OFFLINE).await {
            tracing::warn!("Error publishing offline state: {:?}", e);
        }
        tracing::info!("MQTT bridge stopped");
    }

    async fn export(&self, export: &mut StateExport, states: &[EntityState], online: Option<bool>) -> Option<bool> {
        let is_online = self.integration.coordinator().last_update_success();

        if online != Some(is_online) {
            let payload = if is_online { ONLINE } else { OFFLINE };
            if let Err(e) = self.sender.send_retained(self.topics.availability(), payload).await {
                tracing::error!("Error publishing availability: {:?}", e);
                return online;
            }
        }

        for (topic, payload) in export.changes(&self.topics, states) {
            if let Err(e) = self.sender.send_retained(topic, payload).await {
                tracing::error!("Error publishing entity state: {:?}", e);
            }
        }

        Some(is_online)
    }

    #[tracing::instrument(skip_all, fields(topic = %message.topic))]
    async fn handle_command(&self, message: MqttInMessage) {
        let Some(entity_id) = self.topics.entity_of_command(&message.topic) else {
            tracing::warn!("Ignoring MQTT message on unexpected topic {}", message.topic);
            return;
        };

        let registry = self.integration.registry();
        let result = match registry.state(entity_id) {
            None => Err(EntityError::NotFound(entity_id.to_owned())),
            Some(state) => match parse_command(state.kind, &message.payload) {
                Ok(Command::Press) => registry.press(entity_id).await,
                Ok(Command::Set(input)) => registry.apply(entity_id, input).await,
                Err(e) => Err(e),
            },
        };

        if let Err(e) = result {
            tracing::warn!("MQTT command {:?} for {} failed: {}", message.payload, entity_id, e);
        }
    }
}
