use std::time::Duration;

use tokio::time::{Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::device::EvseApi;

use super::EvseCoordinator;

/// Drives the refresh cycle: on every tick of the polling timer and on every refresh request.
pub struct EvseRunner<A> {
    coordinator: EvseCoordinator<A>,
    shutdown: CancellationToken,
}

impl<A: EvseApi> EvseRunner<A> {
    pub fn new(coordinator: EvseCoordinator<A>, shutdown: CancellationToken) -> Self {
        Self { coordinator, shutdown }
    }

    pub async fn run(self) {
        let mut interval_rx = self.coordinator.watch_update_interval();
        let mut timer = new_timer(*interval_rx.borrow_and_update());

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    tracing::info!("EVSE polling stopped");
                    return;
                },

                _ = timer.tick() => {},

                _ = self.coordinator.refresh_requested() => {
                    tracing::debug!("Out-of-band refresh requested");
                },

                Ok(()) = interval_rx.changed() => {
                    let interval = *interval_rx.borrow_and_update();
                    tracing::info!("Restarting EVSE polling every {:?}", interval);
                    timer = new_timer(interval);
                    continue;
                },
            };

            self.coordinator.refresh().await;
        }
    }
}

fn new_timer(period: Duration) -> Interval {
    let mut timer = tokio::time::interval(period.max(Duration::from_secs(1)));
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    timer
}
