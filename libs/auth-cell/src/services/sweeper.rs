use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use shared_utils::otp::OtpStore;

/// Periodically drops expired codes so keys that never verify do not pile up.
pub fn spawn_otp_sweeper(store: Arc<OtpStore>, every: Duration) -> JoinHandle<()> {
    info!("Starting OTP sweeper every {:?}", every);

    tokio::spawn(async move {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let purged = store.purge_expired();
            if purged > 0 {
                debug!("Purged {} expired OTP entries ({} live)", purged, store.len());
            }
        }
    })
}
