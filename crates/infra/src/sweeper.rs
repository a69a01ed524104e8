//! Background purge of expired OTP codes and sessions.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::otp::OtpStore;
use crate::store::Store;

pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Handle to stop and join the sweeper task.
#[derive(Debug)]
pub struct SweeperHandle {
    shutdown: Option<oneshot::Sender<()>>,
    join: JoinHandle<()>,
}

impl SweeperHandle {
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        let _ = self.join.await;
    }
}

/// Spawn the sweeper on the current tokio runtime.
pub fn spawn_sweeper(
    store: Arc<dyn Store>,
    otp: Arc<dyn OtpStore>,
    every: Duration,
) -> SweeperHandle {
    let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

    let join = tokio::spawn(async move {
        let mut tick = tokio::time::interval(every);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = &mut shutdown_rx => break,
                _ = tick.tick() => sweep_once(store.as_ref(), otp.as_ref()).await,
            }
        }
        debug!("sweeper stopped");
    });

    SweeperHandle { shutdown: Some(shutdown_tx), join }
}

/// One pass; failures are logged and retried on the next tick.
pub async fn sweep_once(store: &dyn Store, otp: &dyn OtpStore) {
    let now = Utc::now();
    match otp.purge_expired(now).await {
        Ok(0) => {}
        Ok(n) => debug!(purged = n, "expired otp codes removed"),
        Err(err) => warn!(error = %err, "otp sweep failed"),
    }
    match store.purge_expired_sessions(now).await {
        Ok(0) => {}
        Ok(n) => debug!(purged = n, "expired sessions removed"),
        Err(err) => warn!(error = %err, "session sweep failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryStore;
    use crate::otp::InMemoryOtpStore;
    use crate::store::SessionStore;
    use chrono::Duration as ChronoDuration;
    use herbstore_auth::{OtpCode, OtpEntry, Principal, Session, SessionMeta};
    use herbstore_core::{CustomerId, Mobile};

    #[tokio::test]
    async fn sweep_removes_only_expired_state() {
        let store = InMemoryStore::new();
        let otp = InMemoryOtpStore::new();
        let now = Utc::now();

        let live = Session::issue(Principal::Customer { id: CustomerId::new() }, now, SessionMeta::default());
        let mut dead = Session::issue(Principal::Customer { id: CustomerId::new() }, now, SessionMeta::default());
        dead.expires_at = now - ChronoDuration::seconds(1);
        store.replace_sessions(&live).await.unwrap();
        store.insert_session_unchecked(dead.clone()).unwrap();

        let mobile = Mobile::parse("9876543210").unwrap();
        otp.put(
            &mobile,
            OtpEntry { code: OtpCode::from_string("123456"), expires_at: now - ChronoDuration::seconds(1) },
        )
        .await
        .unwrap();

        sweep_once(&store, &otp).await;

        assert!(store.find_session(&live.token).await.unwrap().is_some());
        assert!(store.find_session(&dead.token).await.unwrap().is_none());
        assert!(otp.get(&mobile).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn shutdown_stops_task() {
        let handle = spawn_sweeper(
            Arc::new(InMemoryStore::new()),
            Arc::new(InMemoryOtpStore::new()),
            Duration::from_millis(10),
        );
        handle.shutdown().await;
    }
}
