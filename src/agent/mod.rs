//! Contracts of the agent runtime the exchange core drives.
//!
//! The runtime owns DIDComm transport, the wallet and all AnonCreds
//! cryptography. The core only calls into the capability groups below and
//! reads back the records the runtime maintains.

use std::{fmt::Debug, sync::Arc};

use anyhow::Result;
use async_trait::async_trait;
use url::Url;

use crate::{
    config::AgentConfig,
    core::{
        credential_definition::{CredentialDefinitionRecord, CredentialSchema},
        options::{CreateOfferOptions, CreatedOffer, CreatedRequest, RequestProofOptions},
        out_of_band::{CreateInvitationConfig, OutOfBandRecord},
        presentation::ProofFormatData,
        record::{ConnectionRecord, CredentialExchangeRecord, ProofExchangeRecord},
    },
};

pub mod memory;
pub mod session;

/// Reported by runtimes when a record lookup by id finds nothing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{record_type} record '{id}' not found")]
pub struct RecordNotFound {
    pub record_type: &'static str,
    pub id: String,
}

impl RecordNotFound {
    pub fn new(record_type: &'static str, id: impl Into<String>) -> Self {
        Self {
            record_type,
            id: id.into(),
        }
    }
}

/// A live agent.
#[async_trait]
pub trait AgentRuntime: Debug + Send + Sync {
    /// Public DIDComm endpoints, in configuration order.
    fn endpoints(&self) -> &[Url];

    fn credentials(&self) -> &dyn CredentialsModule;
    fn proofs(&self) -> &dyn ProofsModule;
    fn oob(&self) -> &dyn OutOfBandModule;
    fn connections(&self) -> &dyn ConnectionsModule;
    fn anoncreds(&self) -> &dyn AnonCredsModule;
    fn dids(&self) -> &dyn DidsModule;
    fn wallet(&self) -> &dyn WalletModule;

    /// Stop listeners and close the wallet.
    async fn shutdown(&self) -> Result<()>;
}

/// Starts an agent runtime.
#[async_trait]
pub trait AgentLauncher: Debug + Send + Sync {
    async fn launch(&self, config: &AgentConfig) -> Result<Arc<dyn AgentRuntime>>;
}

#[async_trait]
pub trait CredentialsModule: Debug + Send + Sync {
    /// Create a connectionless offer.
    async fn create_offer(&self, options: CreateOfferOptions) -> Result<CreatedOffer>;

    /// Send an offer over an existing connection.
    async fn offer_credential(
        &self,
        options: CreateOfferOptions,
    ) -> Result<CredentialExchangeRecord>;

    async fn get_by_id(&self, id: &str) -> Result<CredentialExchangeRecord>;
}

#[async_trait]
pub trait ProofsModule: Debug + Send + Sync {
    /// Create a connectionless proof request.
    async fn create_request(&self, options: RequestProofOptions) -> Result<CreatedRequest>;

    /// Send a proof request over an existing connection.
    async fn request_proof(&self, options: RequestProofOptions) -> Result<ProofExchangeRecord>;

    async fn get_by_id(&self, id: &str) -> Result<ProofExchangeRecord>;

    async fn get_format_data(&self, id: &str) -> Result<ProofFormatData>;
}

#[async_trait]
pub trait OutOfBandModule: Debug + Send + Sync {
    async fn create_invitation(&self, config: CreateInvitationConfig) -> Result<OutOfBandRecord>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionQuery {
    pub out_of_band_id: Option<String>,
}

#[async_trait]
pub trait ConnectionsModule: Debug + Send + Sync {
    /// Connections matching `query`, in the runtime's storage order.
    async fn find_all_by_query(&self, query: ConnectionQuery) -> Result<Vec<ConnectionRecord>>;
}

#[async_trait]
pub trait AnonCredsModule: Debug + Send + Sync {
    /// Credential definitions this agent has published.
    async fn get_created_credential_definitions(&self) -> Result<Vec<CredentialDefinitionRecord>>;

    async fn get_schema(&self, schema_id: &str) -> Result<CredentialSchema>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyType {
    Ed25519,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrivateKey {
    pub key_type: KeyType,
    pub private_key: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DidImport {
    pub did: String,
    pub overwrite: bool,
    pub private_keys: Vec<PrivateKey>,
}

#[async_trait]
pub trait DidsModule: Debug + Send + Sync {
    async fn import(&self, options: DidImport) -> Result<()>;
}

/// A wallet key, identified by its base58 public key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletKey {
    pub public_key_base58: String,
}

#[async_trait]
pub trait WalletModule: Debug + Send + Sync {
    async fn create_key(&self, private_key: PrivateKey) -> Result<WalletKey>;
}
