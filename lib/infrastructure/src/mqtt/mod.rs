mod client;
mod receiver;
mod sender;

pub use client::Mqtt;
pub use receiver::{MqttInMessage, MqttSubscription};
pub use sender::MqttSender;

use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct MqttConfig {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub base_topic: String,
}

/// Retained message the broker publishes on behalf of the client when the connection drops.
#[derive(Debug, Clone)]
pub struct MqttLastWill {
    pub topic: String,
    pub payload: String,
}

impl MqttConfig {
    pub fn new_client(&self, last_will: Option<MqttLastWill>) -> Mqtt {
        Mqtt::connect(self, last_will)
    }
}

/// Matches a concrete topic against a subscription filter with `+` and `#` wildcards.
pub(crate) fn topic_matches(filter: &str, topic: &str) -> bool {
    let mut filter_levels = filter.split('/');
    let mut topic_levels = topic.split('/');

    loop {
        match (filter_levels.next(), topic_levels.next()) {
            (Some("#"), _) => return true,
            (Some("+"), Some(_)) => {}
            (Some(f), Some(t)) if f == t => {}
            (None, None) => return true,
            _ => return false,
        }
    }
}
