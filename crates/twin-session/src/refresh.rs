//! Background token renewal.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use twin_core::AuthService;

use crate::controller::SessionState;

/// Stop handle for the refresh loop; bound to the session lifetime.
pub(crate) struct RefreshHandle {
    handle: JoinHandle<()>,
}

impl RefreshHandle {
    pub(crate) fn stop(&self) {
        self.handle.abort();
    }
}

fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

fn wait_for(expires_at: i64, lead: Duration) -> Duration {
    let lead = i64::try_from(lead.as_secs()).unwrap_or(i64::MAX);
    let secs = expires_at.saturating_sub(lead).saturating_sub(now_secs());
    Duration::from_secs(u64::try_from(secs).unwrap_or(0))
}

/// Spawn the renewal loop on its own task.
///
/// The loop sleeps until `lead` before token expiry, renews through the
/// authentication service and swaps the token under the state lock. The
/// lock is only held for the swap; sleeping and the renewal call happen
/// outside it. On a renewal failure the loop logs a warning and terminates
/// with no retry; on wakeup with the session already cleared it exits.
pub(crate) fn spawn<A>(
    auth: Arc<A>,
    state: Arc<Mutex<SessionState>>,
    lead: Duration,
) -> RefreshHandle
where
    A: AuthService + 'static,
{
    let handle = tokio::spawn(async move {
        loop {
            let Some(info) = state.lock().await.session.clone() else {
                tracing::debug!("session cleared, refresh loop exiting");
                break;
            };

            tokio::time::sleep(wait_for(info.expires_at, lead)).await;

            match auth.refresh(&info).await {
                Ok(renewed) => {
                    let mut guard = state.lock().await;
                    let Some(session) = guard.session.as_mut() else {
                        break;
                    };
                    session.token = renewed.token;
                    session.expires_at = renewed.expires_at;
                    tracing::debug!(expires_at = renewed.expires_at, "session token renewed");
                }
                Err(e) => {
                    tracing::warn!("token refresh failed, loop terminating: {e}");
                    break;
                }
            }
        }
    });

    RefreshHandle { handle }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wait_subtracts_the_lead_margin() {
        let expires_at = now_secs() + 300;
        let wait = wait_for(expires_at, Duration::from_secs(60));
        assert!(wait >= Duration::from_secs(238) && wait <= Duration::from_secs(240));
    }

    #[test]
    fn past_expiry_means_no_wait() {
        assert_eq!(
            wait_for(now_secs() - 10, Duration::from_secs(60)),
            Duration::ZERO
        );
    }
}
