//! Background sampler: moves every device's telemetry forward on a fixed period,
//! so handlers only clone the latest snapshot.

use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};

use crate::state::AppState;

pub fn spawn_sampler(state: AppState, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // the first tick completes immediately; the seeded values are already fresh
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let mut store = state.store.lock().await;
            store.advance();
            tracing::trace!(tick = store.tick, devices = store.devices.len(), "sampled");
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn sampler_advances_on_period() {
        let state = AppState::seeded("k");
        let handle = spawn_sampler(state.clone(), Duration::from_secs(2));
        tokio::time::sleep(Duration::from_millis(6500)).await;
        assert_eq!(state.store.lock().await.tick, 3);
        handle.abort();
    }
}
