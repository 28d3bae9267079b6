use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of the shared connection.
///
/// ```text
/// DISCONNECTED --connect--> CONNECTING --open--> CONNECTED
/// CONNECTED --abnormal close--> RECONNECTING --timer--> CONNECTING
/// CONNECTED --clean close / disconnect()--> DISCONNECTED
/// any --immediate failure or attempts exhausted--> ERROR
/// ERROR --reconnect()--> CONNECTING
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    Error,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Reconnecting => "reconnecting",
            ConnectionState::Error => "error",
        }
    }

    /// A transport is open or being worked on.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            ConnectionState::Connecting | ConnectionState::Connected | ConnectionState::Reconnecting
        )
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
