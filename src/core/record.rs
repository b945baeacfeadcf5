use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle state of a runtime-owned record.
///
/// The vocabulary belongs to the agent runtime and is passed through
/// unvalidated. Only `done` and `abandoned` carry meaning for the core.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordState(String);

impl RecordState {
    pub const DONE: &'static str = "done";
    pub const ABANDONED: &'static str = "abandoned";

    pub fn new(state: impl Into<String>) -> Self {
        Self(state.into())
    }

    pub fn done() -> Self {
        Self::new(Self::DONE)
    }

    pub fn abandoned() -> Self {
        Self::new(Self::ABANDONED)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether polling can stop. Unrecognized states are never terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self.0.as_str(), Self::DONE | Self::ABANDONED)
    }
}

impl fmt::Display for RecordState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordState {
    fn from(state: &str) -> Self {
        Self::new(state)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolVersion {
    V1,
    #[default]
    V2,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialExchangeRecord {
    pub id: String,
    pub state: RecordState,
    pub protocol_version: ProtocolVersion,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofExchangeRecord {
    pub id: String,
    pub state: RecordState,
    pub protocol_version: ProtocolVersion,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Unset until the runtime has checked the presentation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_verified: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionRecord {
    pub id: String,
    pub state: RecordState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub out_of_band_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_done_and_abandoned_are_terminal() {
        assert!(RecordState::done().is_terminal());
        assert!(RecordState::abandoned().is_terminal());
        for state in ["offer-sent", "request-sent", "presentation-received", "", "DONE"] {
            assert!(!RecordState::from(state).is_terminal(), "{state}");
        }
    }

    #[test]
    fn records_use_runtime_field_names() {
        let record: ProofExchangeRecord = serde_json::from_value(serde_json::json!({
            "id": "p-1",
            "state": "some-future-state",
            "protocolVersion": "v2",
            "isVerified": false
        }))
        .unwrap();
        assert_eq!(record.state.as_str(), "some-future-state");
        assert_eq!(record.is_verified, Some(false));
        assert_eq!(record.connection_id, None);
    }
}
