//! Online/offline state of the API client.
//!
//! The state flips to `Online` whenever a request completes successfully and
//! to `Offline` whenever one fails. Front ends subscribe to show or hide an
//! offline banner.

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectivityState {
    Online,
    Offline,
}

impl std::fmt::Display for ConnectivityState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectivityState::Online => write!(f, "online"),
            ConnectivityState::Offline => write!(f, "offline"),
        }
    }
}

#[derive(Debug)]
pub struct Connectivity {
    tx: watch::Sender<ConnectivityState>,
}

impl Connectivity {
    /// Starts `Online` until the first request completes.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(ConnectivityState::Online);
        Self { tx }
    }

    pub fn state(&self) -> ConnectivityState {
        *self.tx.borrow()
    }

    pub fn is_online(&self) -> bool {
        self.state() == ConnectivityState::Online
    }

    /// Record the outcome of a request. Subscribers are only woken on an
    /// actual transition. Returns whether the state changed.
    pub fn set(&self, state: ConnectivityState) -> bool {
        let changed = self.tx.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
        if changed {
            info!(%state, "Connectivity changed");
        }
        changed
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectivityState> {
        self.tx.subscribe()
    }
}

impl Default for Connectivity {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_online() {
        let connectivity = Connectivity::new();
        assert!(connectivity.is_online());
    }

    #[test]
    fn test_set_reports_transitions_only() {
        let connectivity = Connectivity::new();
        assert!(!connectivity.set(ConnectivityState::Online));
        assert!(connectivity.set(ConnectivityState::Offline));
        assert!(!connectivity.set(ConnectivityState::Offline));
        assert_eq!(connectivity.state(), ConnectivityState::Offline);
        assert!(connectivity.set(ConnectivityState::Online));
    }

    #[tokio::test]
    async fn test_subscriber_sees_change() {
        let connectivity = Connectivity::new();
        let mut rx = connectivity.subscribe();
        assert_eq!(*rx.borrow_and_update(), ConnectivityState::Online);

        connectivity.set(ConnectivityState::Offline);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), ConnectivityState::Offline);

        // No-op set does not mark the channel changed
        connectivity.set(ConnectivityState::Offline);
        assert!(!rx.has_changed().unwrap());
    }
}
