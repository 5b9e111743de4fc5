use std::sync::Arc;

use adapter::mqtt::{EvseTopics, MqttBridge};
use integration::EvseIntegration;
use settings::Settings;

mod adapter;
mod coordinator;
mod core;
mod device;
mod entity;
mod integration;
mod settings;

#[tokio::main(flavor = "multi_thread")]
pub async fn main() {
    let settings = Settings::new().expect("Error reading configuration");
    settings.monitoring.init().expect("Error initializing monitoring");

    let integration = Arc::new(
        EvseIntegration::setup(settings.evse.clone())
            .await
            .expect("Error setting up EVSE integration"),
    );

    let http_server_exec = {
        let http_server = settings.http_server.clone();
        let http_integration = integration.clone();

        async move {
            http_server
                .run_server(move || vec![adapter::http_api::new_routes(http_integration.clone())])
                .await
                .expect("HTTP server execution failed");
        }
    };

    let mqtt_exec = async {
        let Some(mqtt_config) = &settings.mqtt else {
            tracing::info!("No MQTT broker configured, skipping MQTT bridge");
            return;
        };

        let topics = EvseTopics::new(&mqtt_config.base_topic, &settings.evse.device_slug());
        let mut mqtt = mqtt_config.new_client(Some(topics.last_will()));
        let commands = mqtt
            .subscribe(topics.commands())
            .await
            .expect("Error subscribing to EVSE command topics");

        let bridge = MqttBridge::new(integration.clone(), mqtt.sender(), commands, topics);

        tokio::select!(
            _ = bridge.run(integration.shutdown_token()) => {},
            _ = mqtt.run() => {},
        );
    };

    let teardown_on_signal = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Error listening for shutdown signal: {}", e);
            return std::future::pending().await;
        }

        tracing::info!("Shutdown requested");
        integration.teardown();
    };

    tracing::info!("Starting main loop");

    tokio::select!(
        _ = async { tokio::join!(integration.run(), mqtt_exec, teardown_on_signal) } => {},
        _ = http_server_exec => {},
    );

    tracing::info!("EVSE bridge stopped");
}
