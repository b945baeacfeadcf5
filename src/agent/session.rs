use std::{fmt::Debug, sync::Arc};

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::{
    config::{AgentConfig, AgentEnvironment},
    core::envelope::ServiceResponse,
    error::{ExchangeError, ExchangeResult, UpstreamContext},
    ledger::{validate_seed, DidRegistration, LedgerNetwork},
};

use super::{AgentLauncher, AgentRuntime};

/// What a caller learns about a freshly initialized agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentDetails {
    pub agent_id: String,
    pub admin_port: u16,
    pub inbound_port: u16,
    pub did: String,
    pub endpoint: Url,
}

#[derive(Debug, Clone)]
pub struct ReadyAgent {
    pub runtime: Arc<dyn AgentRuntime>,
    pub details: AgentDetails,
}

#[derive(Debug, Clone, Default)]
pub enum AgentState {
    #[default]
    Uninitialized,
    Ready(ReadyAgent),
}

/// Owns the single agent of this process.
///
/// The agent holds open listeners and a wallet, so it is created once and
/// never replaced: a second [AgentSession::initialize] fails with
/// [ExchangeError::Conflict].
#[derive(Debug)]
pub struct AgentSession {
    environment: AgentEnvironment,
    launcher: Arc<dyn AgentLauncher>,
    registration: DidRegistration,
    state: RwLock<AgentState>,
}

impl AgentSession {
    pub fn new(
        environment: AgentEnvironment,
        launcher: Arc<dyn AgentLauncher>,
        registration: DidRegistration,
    ) -> Self {
        Self {
            environment,
            launcher,
            registration,
            state: RwLock::default(),
        }
    }

    /// Launch the agent and anchor its DID on `network`.
    ///
    /// If the launched runtime has no endpoint or its DID cannot be registered,
    /// the runtime is shut down again and the session stays uninitialized.
    pub async fn initialize(
        &self,
        seed: &str,
        network: &str,
    ) -> ExchangeResult<ServiceResponse<AgentDetails>> {
        let network: LedgerNetwork = network
            .parse()
            .map_err(|e: anyhow::Error| ExchangeError::Validation(e.to_string()))?;
        validate_seed(seed)?;

        // Held until the new agent is stored so concurrent callers cannot both launch.
        let mut state = self.state.write().await;
        if let AgentState::Ready(ready) = &*state {
            return Err(ExchangeError::Conflict(format!(
                "an agent is already initialized at port {}. Agent endpoints: {:?}",
                ready.details.admin_port,
                ready
                    .runtime
                    .endpoints()
                    .iter()
                    .map(Url::as_str)
                    .collect::<Vec<_>>(),
            )));
        }

        let config = AgentConfig::new(&self.environment, network)?;
        let runtime = self
            .launcher
            .launch(&config)
            .await
            .upstream("agent initialization failed")
            .inspect_err(|e| error!("failed to initialize agent: {e}"))?;

        let established: ExchangeResult<(Url, String)> = async {
            let endpoint = runtime
                .endpoints()
                .first()
                .cloned()
                .ok_or_else(|| ExchangeError::Configuration("agent has no endpoint".into()))?;
            let did = self
                .registration
                .register(runtime.as_ref(), network, seed)
                .await?;
            Ok((endpoint, did))
        }
        .await;

        let (endpoint, did) = match established {
            Ok(established) => established,
            Err(e) => {
                if let Err(shutdown) = runtime.shutdown().await {
                    warn!("failed to shut down agent after failed initialization: {shutdown:#}");
                }
                return Err(e);
            }
        };

        let details = AgentDetails {
            agent_id: self.environment.agent_id.clone(),
            admin_port: config.admin_port,
            inbound_port: config.inbound_port,
            did,
            endpoint,
        };

        info!(
            "agent initialized - id: {}, admin port: {}, inbound port: {}",
            details.agent_id, details.admin_port, details.inbound_port
        );
        debug!("agent endpoints: {:?}", runtime.endpoints());

        *state = AgentState::Ready(ReadyAgent {
            runtime,
            details: details.clone(),
        });

        Ok(ServiceResponse::created(
            "Agent initialized successfully",
            details,
        ))
    }

    /// The live runtime, or [ExchangeError::NotInitialized].
    pub async fn runtime(&self) -> ExchangeResult<Arc<dyn AgentRuntime>> {
        match &*self.state.read().await {
            AgentState::Ready(ready) => Ok(ready.runtime.clone()),
            AgentState::Uninitialized => Err(ExchangeError::NotInitialized),
        }
    }

    pub async fn details(&self) -> Option<AgentDetails> {
        match &*self.state.read().await {
            AgentState::Ready(ready) => Some(ready.details.clone()),
            AgentState::Uninitialized => None,
        }
    }
}
