//! Periodic token liveness probing.
//!
//! While the session is authenticated, a background task probes the
//! service's `test-auth` endpoint on a fixed period. A 401-class
//! rejection clears the session and stops polling; transient failures
//! (network errors, 5xx) are logged and ignored.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::api::ApiClient;

use super::session::SessionHandle;

/// Handle to a running probe loop. Dropping the handle does not stop the
/// loop; call [`LivenessMonitor::stop`].
pub struct LivenessMonitor {
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl LivenessMonitor {
    /// Spawn the probe loop. The first probe fires one full period after
    /// spawn. Must be called from within a Tokio runtime.
    pub fn spawn(client: ApiClient, session: SessionHandle, period: Duration) -> Self {
        let (stop_tx, mut stop_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // interval yields immediately once; consume that tick so the
            // first probe waits a full period
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = stop_rx.changed() => break,
                    _ = ticker.tick() => {
                        // session may have been cleared by another path
                        // (explicit logout, a 401 on a lookup request)
                        if !session.is_authenticated() {
                            debug!("session gone, stopping liveness probes");
                            break;
                        }
                        match client.probe_auth().await {
                            Ok(()) => debug!("liveness probe ok"),
                            Err(error) if error.is_session_expired() => {
                                // the request layer already cleared the
                                // session; clearing again is a no-op
                                session.clear();
                                warn!("token expired, session cleared");
                                break;
                            }
                            Err(error) => {
                                warn!(%error, "liveness probe failed, keeping session");
                            }
                        }
                    }
                }
            }
        });

        Self { stop_tx, task }
    }

    /// Stop polling. The signal is delivered synchronously; an in-flight
    /// probe is allowed to finish, and a stale success performs no
    /// session mutation.
    pub fn stop(&self) {
        let _ = self.stop_tx.send(true);
    }

    /// Whether the probe loop has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::store::MemoryCredentialStore;
    use crate::auth::SessionData;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Short period so the tests complete quickly.
    const TEST_PERIOD: Duration = Duration::from_millis(25);

    fn authenticated_session() -> SessionHandle {
        let session = SessionHandle::new(Box::new(MemoryCredentialStore::new()));
        session
            .set(SessionData {
                username: "alice".into(),
                user_id: "U".into(),
                token: "T".into(),
            })
            .unwrap();
        session
    }

    async fn counting_mock(
        server: &mut mockito::Server,
        status: usize,
    ) -> (mockito::Mock, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let recorder = Arc::clone(&hits);
        let mock = server
            .mock("GET", "/api/test-auth")
            .with_status(status)
            .with_body_from_request(move |_| {
                recorder.fetch_add(1, Ordering::SeqCst);
                Vec::new()
            })
            .create_async()
            .await;
        (mock, hits)
    }

    #[tokio::test]
    async fn test_transient_failures_keep_session() {
        let mut server = mockito::Server::new_async().await;
        let (_mock, hits) = counting_mock(&mut server, 500).await;

        let session = authenticated_session();
        let client = ApiClient::new(&server.url(), session.clone()).unwrap();
        let monitor = LivenessMonitor::spawn(client, session.clone(), TEST_PERIOD);

        // long enough for at least three probes
        tokio::time::sleep(TEST_PERIOD * 6).await;

        assert!(hits.load(Ordering::SeqCst) >= 3);
        assert!(session.is_authenticated());
        assert!(!monitor.is_finished());

        monitor.stop();
    }

    #[tokio::test]
    async fn test_unauthorized_probe_clears_session_and_stops() {
        let mut server = mockito::Server::new_async().await;
        let (_mock, hits) = counting_mock(&mut server, 401).await;

        let session = authenticated_session();
        let client = ApiClient::new(&server.url(), session.clone()).unwrap();
        let monitor = LivenessMonitor::spawn(client, session.clone(), TEST_PERIOD);

        tokio::time::sleep(TEST_PERIOD * 6).await;

        assert!(!session.is_authenticated());
        assert!(monitor.is_finished());
        // the loop stopped after the first rejected probe
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stop_cancels_future_probes() {
        let mut server = mockito::Server::new_async().await;
        let (_mock, hits) = counting_mock(&mut server, 200).await;

        let session = authenticated_session();
        let client = ApiClient::new(&server.url(), session.clone()).unwrap();
        let monitor = LivenessMonitor::spawn(client, session.clone(), TEST_PERIOD);

        tokio::time::sleep(TEST_PERIOD * 3).await;
        monitor.stop();
        // give the loop a moment to observe the signal
        tokio::time::sleep(TEST_PERIOD).await;

        let probes_at_stop = hits.load(Ordering::SeqCst);
        assert!(probes_at_stop >= 1);
        assert!(monitor.is_finished());

        // several periods later, no further probes were issued
        tokio::time::sleep(TEST_PERIOD * 4).await;
        assert_eq!(hits.load(Ordering::SeqCst), probes_at_stop);
        // stopping the monitor is teardown, not logout
        assert!(session.is_authenticated());
    }

    #[tokio::test]
    async fn test_probe_loop_exits_when_session_cleared_elsewhere() {
        let mut server = mockito::Server::new_async().await;
        let (_mock, _hits) = counting_mock(&mut server, 200).await;

        let session = authenticated_session();
        let client = ApiClient::new(&server.url(), session.clone()).unwrap();
        let monitor = LivenessMonitor::spawn(client, session.clone(), TEST_PERIOD);

        session.clear();
        tokio::time::sleep(TEST_PERIOD * 3).await;

        assert!(monitor.is_finished());
    }
}
