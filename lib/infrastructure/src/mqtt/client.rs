use std::sync::Arc;

use rumqttc::v5::{
    AsyncClient, EventLoop, MqttOptions,
    mqttbytes::{
        QoS,
        v5::{LastWill, Packet, Publish},
    },
};

use rumqttc::v5::Event::Incoming;
use tokio::sync::mpsc;

use super::*;

pub struct Mqtt {
    client: Arc<AsyncClient>,
    event_loop: EventLoop,
    subscriptions: Vec<MqttSubscriptionHandle>,
}

struct MqttSubscriptionHandle {
    filter: String,
    tx: mpsc::Sender<MqttInMessage>,
}

impl Mqtt {
    pub fn connect(config: &MqttConfig, last_will: Option<MqttLastWill>) -> Self {
        let mut mqttoptions = MqttOptions::new(&config.client_id, &config.host, config.port);
        mqttoptions.set_keep_alive(::std::time::Duration::from_secs(5));
        mqttoptions.set_clean_start(true);

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            mqttoptions.set_credentials(username, password);
        }

        if let Some(will) = last_will {
            mqttoptions.set_last_will(LastWill::new(will.topic, will.payload, QoS::AtLeastOnce, true, None));
        }

        let (client, event_loop) = AsyncClient::new(mqttoptions, 32);

        Mqtt {
            client: Arc::new(client),
            event_loop,
            subscriptions: vec![],
        }
    }

    pub async fn subscribe(&mut self, filter: impl Into<String>) -> anyhow::Result<MqttSubscription> {
        let filter = filter.into();
        let (tx, rx) = mpsc::channel::<MqttInMessage>(32);

        tracing::info!("Subscribing to MQTT topic {}", &filter);
        self.client.subscribe(filter.clone(), QoS::AtLeastOnce).await?;

        self.subscriptions.push(MqttSubscriptionHandle { filter, tx });

        Ok(MqttSubscription::new(rx))
    }

    pub fn sender(&self) -> MqttSender {
        MqttSender::new(self.client.clone())
    }

    pub async fn run(mut self) {
        loop {
            match self.event_loop.poll().await {
                Ok(Incoming(Packet::Publish(publish))) => {
                    self.handle_publish(&publish).await;
                }
                Ok(Incoming(Packet::ConnAck(_))) => {
                    tracing::info!("Connected to MQTT broker");
                    self.resubscribe().await;
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::error!("MQTT error: {}", e);
                    tokio::time::sleep(::std::time::Duration::from_secs(1)).await;
                }
            }
        }
    }

    //clean start drops subscriptions on every reconnect
    async fn resubscribe(&self) {
        for subscription in &self.subscriptions {
            if let Err(e) = self.client.subscribe(subscription.filter.clone(), QoS::AtLeastOnce).await {
                tracing::error!("Error resubscribing to {}: {}", subscription.filter, e);
            }
        }
    }

    async fn handle_publish(&self, publish: &Publish) {
        let message = match MqttInMessage::try_from(publish) {
            Ok(m) => m,
            Err(e) => {
                tracing::error!("Error parsing MQTT message: {}", e);
                return;
            }
        };

        tracing::trace!("Received MQTT message on topic {}", message.topic);

        for subscription in self
            .subscriptions
            .iter()
            .filter(|s| topic_matches(&s.filter, &message.topic))
        {
            if let Err(e) = subscription
                .tx
                .send_timeout(message.clone(), tokio::time::Duration::from_secs(5))
                .await
            {
                tracing::error!("Failed to forward MQTT message to subscriber {}: {}", subscription.filter, e);
            }
        }
    }
}
