use std::{collections::BTreeMap, fmt, str::FromStr};

use serde::Serialize;

use crate::{
    agent::{AgentRuntime, ConnectionQuery},
    core::record::RecordState,
    error::{ExchangeError, ExchangeResult, UpstreamContext},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialState {
    pub state: RecordState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofState {
    pub state: RecordState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verified: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Both fields stay empty until a holder has answered the invitation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionState {
    pub state: Option<RecordState>,
    pub connection_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum StateSnapshot {
    Connection(ConnectionState),
    Credential(CredentialState),
    Proof(ProofState),
}

impl StateSnapshot {
    /// `None` for connections, which have no terminal state the core knows of.
    pub fn is_terminal(&self) -> Option<bool> {
        match self {
            StateSnapshot::Connection(_) => None,
            StateSnapshot::Credential(c) => Some(c.state.is_terminal()),
            StateSnapshot::Proof(p) => Some(p.state.is_terminal()),
        }
    }
}

/// What a poll refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    /// Polled by out-of-band id.
    Connection,
    Credential,
    Proof,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RecordKind::Connection => "connection",
            RecordKind::Credential => "credential",
            RecordKind::Proof => "proof",
        })
    }
}

impl FromStr for RecordKind {
    type Err = ExchangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "connection" => Ok(RecordKind::Connection),
            "credential" => Ok(RecordKind::Credential),
            "proof" => Ok(RecordKind::Proof),
            other => Err(ExchangeError::Validation(format!(
                "unknown record kind '{other}'"
            ))),
        }
    }
}

/// Side-effect free reads of exchange state. Callers poll every few seconds
/// until a terminal state.
#[derive(Debug, Clone, Copy)]
pub struct ExchangeStateTracker<'a> {
    runtime: &'a dyn AgentRuntime,
}

impl<'a> ExchangeStateTracker<'a> {
    pub fn new(runtime: &'a dyn AgentRuntime) -> Self {
        Self { runtime }
    }

    pub async fn credential_state(&self, id: &str) -> ExchangeResult<CredentialState> {
        let record = self
            .runtime
            .credentials()
            .get_by_id(id)
            .await
            .upstream("failed to fetch credential exchange")?;
        Ok(CredentialState {
            state: record.state,
            error_message: record.error_message,
        })
    }

    pub async fn proof_state(&self, id: &str) -> ExchangeResult<ProofState> {
        let record = self
            .runtime
            .proofs()
            .get_by_id(id)
            .await
            .upstream("failed to fetch proof exchange")?;
        Ok(ProofState {
            state: record.state,
            verified: record.is_verified,
            error_message: record.error_message,
        })
    }

    /// State of the first connection created from invitation `out_of_band_id`.
    pub async fn connection_state(&self, out_of_band_id: &str) -> ExchangeResult<ConnectionState> {
        let connections = self
            .runtime
            .connections()
            .find_all_by_query(ConnectionQuery {
                out_of_band_id: Some(out_of_band_id.to_owned()),
            })
            .await
            .upstream("failed to query connections")?;

        Ok(connections
            .into_iter()
            .next()
            .map(|connection| ConnectionState {
                state: Some(connection.state),
                connection_id: Some(connection.id),
            })
            .unwrap_or_default())
    }

    /// Revealed values by referent; `None` for predicate-only or missing presentations.
    pub async fn revealed_attributes(
        &self,
        proof_id: &str,
    ) -> ExchangeResult<Option<BTreeMap<String, String>>> {
        let data = self
            .runtime
            .proofs()
            .get_format_data(proof_id)
            .await
            .upstream("failed to fetch proof format data")?;
        Ok(data.revealed_attributes())
    }

    pub async fn snapshot(&self, kind: RecordKind, id: &str) -> ExchangeResult<StateSnapshot> {
        Ok(match kind {
            RecordKind::Connection => StateSnapshot::Connection(self.connection_state(id).await?),
            RecordKind::Credential => StateSnapshot::Credential(self.credential_state(id).await?),
            RecordKind::Proof => StateSnapshot::Proof(self.proof_state(id).await?),
        })
    }
}
