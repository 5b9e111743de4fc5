use std::sync::{Arc, PoisonError, RwLock};

use tokio_util::sync::CancellationToken;

use crate::coordinator::{EvseCoordinator, EvseRunner};
use crate::device::{EvseApi, EvseHttpClient};
use crate::entity::{DeviceInfo, EntityRegistry};
use crate::settings::{EvseSettings, EvseSettingsUpdate};

/// One configured charger: client, coordinator and entities, from setup to teardown.
pub struct EvseIntegration<A = EvseHttpClient> {
    settings: RwLock<EvseSettings>,
    coordinator: EvseCoordinator<A>,
    registry: EntityRegistry<A>,
    shutdown: CancellationToken,
}

impl EvseIntegration<EvseHttpClient> {
    pub async fn setup(settings: EvseSettings) -> anyhow::Result<Self> {
        settings.validate()?;
        let client = EvseHttpClient::new(&settings.connection())?;
        Ok(Self::with_api(settings, Arc::new(client)).await)
    }
}

impl<A: EvseApi> EvseIntegration<A> {
    /// Wires everything up and runs the first refresh. An unreachable device is not an error.
    pub async fn with_api(settings: EvseSettings, api: Arc<A>) -> Self {
        let coordinator = EvseCoordinator::new(api, settings.update_interval(), settings.cycle_timeout());
        let registry = EntityRegistry::new(coordinator.clone(), settings.device_type);

        tracing::info!(
            "Setting up {} ({}) at {}",
            settings.device_name,
            settings.device_type,
            settings.host
        );

        coordinator.refresh().await;
        if !coordinator.last_update_success() {
            tracing::warn!("EVSE at {} not reachable, entities unavailable until it answers", settings.host);
        }
        registry.publish();

        Self {
            settings: RwLock::new(settings),
            coordinator,
            registry,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn settings(&self) -> EvseSettings {
        let mut settings = self.settings.read().unwrap_or_else(PoisonError::into_inner).clone();
        //refresh rate can be changed through its select entity
        settings.update_rate_secs = self.coordinator.update_interval().as_secs();
        settings
    }

    pub fn coordinator(&self) -> &EvseCoordinator<A> {
        &self.coordinator
    }

    pub fn registry(&self) -> &EntityRegistry<A> {
        &self.registry
    }

    pub fn device_info(&self) -> DeviceInfo {
        let settings = self.settings();

        DeviceInfo::new(
            &settings.device_name,
            &settings.host,
            &self.coordinator.snapshot(),
            self.coordinator.last_update_success(),
        )
    }

    /// Polls the device and publishes entity states until teardown.
    pub async fn run(&self) {
        let runner = EvseRunner::new(self.coordinator.clone(), self.shutdown.child_token());
        tokio::join!(runner.run(), self.registry.run(self.shutdown.child_token()));
    }

    pub fn teardown(&self) {
        tracing::info!("Tearing down EVSE integration");
        self.shutdown.cancel();
    }

    /// Token cancelled on teardown, for adapters running alongside the integration.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.child_token()
    }

    /// Applies new connection settings and polling cadence while running.
    pub fn reconfigure(&self, update: EvseSettingsUpdate) -> anyhow::Result<EvseSettings> {
        let current = self.settings();
        let next = current.updated(update);
        next.validate()?;

        if next.connection() != current.connection() {
            self.coordinator.api().reconfigure(&next.connection())?;
        }

        self.coordinator.set_update_interval(next.update_interval());

        if next.device_type != self.registry.device_type() {
            self.registry.rebuild(next.device_type);
        }

        *self.settings.write().unwrap_or_else(PoisonError::into_inner) = next.clone();
        self.coordinator.request_refresh();

        tracing::info!("EVSE integration reconfigured for {}", next.host);
        Ok(next)
    }
}
