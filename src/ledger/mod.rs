//! Registration of the agent's public DID on an Indy testnet.

use std::{fmt, str::FromStr, sync::Arc};

use anyhow::{bail, Context, Error, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::{
    agent::{AgentRuntime, DidImport, KeyType, PrivateKey},
    error::{ExchangeError, ExchangeResult, UpstreamContext},
};

pub use nym::{HttpNymRegistrar, NymRegistrar, NymRequest, NymResponse};

mod nym;

/// Length of an Indy wallet seed.
pub const SEED_LENGTH: usize = 32;

/// Indy networks the agent can anchor its DID on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LedgerNetwork {
    #[serde(rename = "bcovrin:testnet")]
    BcovrinTestnet,
    #[serde(rename = "indicio:testnet")]
    IndicioTestnet,
}

impl LedgerNetwork {
    /// The `did:indy` namespace of the network.
    pub fn namespace(self) -> &'static str {
        match self {
            LedgerNetwork::BcovrinTestnet => "bcovrin:testnet",
            LedgerNetwork::IndicioTestnet => "indicio:testnet",
        }
    }

    pub fn qualify(self, did: &str) -> String {
        format!("did:indy:{}:{did}", self.namespace())
    }
}

impl fmt::Display for LedgerNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.namespace())
    }
}

impl FromStr for LedgerNetwork {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "bcovrin:testnet" => Ok(LedgerNetwork::BcovrinTestnet),
            "indicio:testnet" => Ok(LedgerNetwork::IndicioTestnet),
            other => bail!("unsupported network: {other}"),
        }
    }
}

pub fn validate_seed(seed: &str) -> ExchangeResult<()> {
    if seed.len() != SEED_LENGTH {
        return Err(ExchangeError::Validation(format!(
            "seed must be {SEED_LENGTH} characters long"
        )));
    }
    Ok(())
}

/// Derive the unqualified Indy DID from an Ed25519 verkey: the base58 of its first 16 bytes.
pub fn did_from_verkey(verkey: &str) -> Result<String> {
    let bytes = bs58::decode(verkey)
        .into_vec()
        .context("verkey is not base58")?;
    if bytes.len() < 16 {
        bail!("verkey is too short ({} bytes)", bytes.len())
    }
    Ok(bs58::encode(&bytes[..16]).into_string())
}

/// Registers a DID on the ledger and imports it into the agent's wallet.
#[derive(Debug, Clone)]
pub struct DidRegistration {
    registrar: Arc<dyn NymRegistrar>,
    alias: String,
}

impl DidRegistration {
    pub fn new(registrar: Arc<dyn NymRegistrar>, alias: impl Into<String>) -> Self {
        Self {
            registrar,
            alias: alias.into(),
        }
    }

    /// Register the DID derived from `seed` and return its qualified form.
    pub async fn register(
        &self,
        agent: &dyn AgentRuntime,
        network: LedgerNetwork,
        seed: &str,
    ) -> ExchangeResult<String> {
        debug!("registering DID for network: {network}");
        validate_seed(seed)?;

        let registered = match network {
            LedgerNetwork::BcovrinTestnet => self.register_endorser(network, seed).await,
            LedgerNetwork::IndicioTestnet => self.register_verkey(agent, network, seed).await,
        };
        let did = registered
            .upstream(format!("DID registration on {network} failed"))
            .inspect_err(|e| error!("{e}"))?;

        let qualified = network.qualify(&did);
        agent
            .dids()
            .import(DidImport {
                did: qualified.clone(),
                overwrite: true,
                private_keys: vec![seed_key(seed)],
            })
            .await
            .upstream(format!("failed to import {qualified}"))?;

        debug!("DID registration completed successfully");
        Ok(qualified)
    }

    /// The ledger derives the DID from the seed and endorses it.
    async fn register_endorser(&self, network: LedgerNetwork, seed: &str) -> Result<String> {
        let response = self
            .registrar
            .register(
                network,
                &NymRequest::Endorser {
                    role: "ENDORSER".into(),
                    alias: self.alias.clone(),
                    seed: seed.into(),
                },
            )
            .await?;

        response
            .did
            .filter(|did| !did.is_empty())
            .context("invalid response from registration service: no DID")
    }

    /// The DID is derived locally from a wallet key and submitted with its verkey.
    async fn register_verkey(
        &self,
        agent: &dyn AgentRuntime,
        network: LedgerNetwork,
        seed: &str,
    ) -> Result<String> {
        let key = agent
            .wallet()
            .create_key(seed_key(seed))
            .await
            .context("failed to create wallet key")?;
        let did = did_from_verkey(&key.public_key_base58)?;

        let response = self
            .registrar
            .register(
                network,
                &NymRequest::Verkey {
                    network: "testnet".into(),
                    did: did.clone(),
                    verkey: key.public_key_base58,
                },
            )
            .await?;

        if response.status_code != Some(200) {
            bail!(
                "registration service rejected the DID (status: {:?})",
                response.status_code
            )
        }
        Ok(did)
    }
}

fn seed_key(seed: &str) -> PrivateKey {
    PrivateKey {
        key_type: KeyType::Ed25519,
        private_key: seed.as_bytes().to_vec(),
    }
}
