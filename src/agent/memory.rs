use std::{
    collections::{BTreeMap, BTreeSet},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde_json::json;
use tokio::sync::{Mutex, MutexGuard};
use url::Url;
use uuid::Uuid;

use crate::{
    config::AgentConfig,
    core::{
        credential_definition::{
            CredentialDefinition, CredentialDefinitionRecord, CredentialSchema,
        },
        message::ProtocolMessage,
        options::{CreateOfferOptions, CreatedOffer, CreatedRequest, RequestProofOptions},
        out_of_band::{
            Attachment, CreateInvitationConfig, OutOfBandInvitation, OutOfBandRecord,
            INVITATION_TYPE,
        },
        presentation::{
            AnonCredsPresentation, FormatPresentation, FormatRequest, ProofFormatData,
            RequestedProof, RevealedAttribute, SubProofReference,
        },
        record::{ConnectionRecord, CredentialExchangeRecord, ProofExchangeRecord, RecordState},
    },
};

use super::{
    AgentLauncher, AgentRuntime, AnonCredsModule, ConnectionQuery, ConnectionsModule,
    CredentialsModule, DidImport, DidsModule, OutOfBandModule, PrivateKey, ProofsModule,
    RecordNotFound, WalletKey, WalletModule,
};

const OFFER_CREDENTIAL: &str = "https://didcomm.org/issue-credential/2.0/offer-credential";
const REQUEST_PRESENTATION: &str = "https://didcomm.org/present-proof/2.0/request-presentation";
const HANDSHAKE_PROTOCOLS: [&str; 2] = [
    "https://didcomm.org/didexchange/1.1",
    "https://didcomm.org/connections/1.0",
];

/// A local in-memory agent runtime. Not for production use!
///
/// # Warning
/// No DIDComm messages are ever sent and no cryptography is performed. The
/// holder side of every exchange is driven by hand through the `accept_*` and
/// `present_proof` methods, which makes this useful for tests and demos only.
#[derive(Debug, Clone)]
pub struct MemoryAgent {
    endpoints: Vec<Url>,
    store: Arc<Mutex<MemoryStore>>,
}

#[derive(Debug, Default)]
struct MemoryStore {
    credential_definitions: Vec<CredentialDefinitionRecord>,
    schemas: BTreeMap<String, CredentialSchema>,
    credentials: BTreeMap<String, (CredentialExchangeRecord, CreateOfferOptions)>,
    proofs: BTreeMap<String, StoredProof>,
    invitations: BTreeMap<String, OutOfBandRecord>,
    connections: Vec<ConnectionRecord>,
    dids: Vec<DidImport>,
    calls: Vec<&'static str>,
    failing: BTreeSet<&'static str>,
    shut_down: bool,
}

#[derive(Debug)]
struct StoredProof {
    record: ProofExchangeRecord,
    options: RequestProofOptions,
    format_data: ProofFormatData,
}

impl MemoryAgent {
    pub fn new(endpoints: Vec<Url>) -> Self {
        Self {
            endpoints,
            store: Arc::default(),
        }
    }

    /// Publish a credential definition together with its schema.
    pub async fn publish_credential_definition(
        &self,
        credential_definition_id: &str,
        tag: &str,
        schema_id: &str,
        schema: CredentialSchema,
    ) {
        let issuer_id = credential_definition_id
            .split('/')
            .next()
            .unwrap_or_default()
            .to_owned();
        let mut store = self.store.lock().await;
        store.schemas.insert(schema_id.to_owned(), schema);
        store
            .credential_definitions
            .push(CredentialDefinitionRecord {
                credential_definition_id: credential_definition_id.to_owned(),
                credential_definition: CredentialDefinition {
                    issuer_id,
                    schema_id: schema_id.to_owned(),
                    tag: tag.to_owned(),
                },
            });
    }

    /// Make every later call of `operation` fail, e.g. `"create_invitation"`.
    pub async fn fail(&self, operation: &'static str) {
        self.store.lock().await.failing.insert(operation);
    }

    /// Names of the runtime operations invoked so far, in order.
    pub async fn calls(&self) -> Vec<&'static str> {
        self.store.lock().await.calls.clone()
    }

    pub async fn is_shut_down(&self) -> bool {
        self.store.lock().await.shut_down
    }

    pub async fn imported_dids(&self) -> Vec<String> {
        let store = self.store.lock().await;
        store.dids.iter().map(|d| d.did.clone()).collect()
    }

    pub async fn credential_offer(&self, id: &str) -> Option<CreateOfferOptions> {
        let store = self.store.lock().await;
        store.credentials.get(id).map(|(_, options)| options.clone())
    }

    pub async fn proof_request(&self, id: &str) -> Option<RequestProofOptions> {
        let store = self.store.lock().await;
        store.proofs.get(id).map(|p| p.options.clone())
    }

    pub async fn invitation_count(&self) -> usize {
        self.store.lock().await.invitations.len()
    }

    pub async fn credential_count(&self) -> usize {
        self.store.lock().await.credentials.len()
    }

    /// Move a credential exchange to `state`, as the remote holder would.
    pub async fn set_credential_state(&self, id: &str, state: &str) -> Result<()> {
        let mut store = self.store.lock().await;
        let (record, _) = store
            .credentials
            .get_mut(id)
            .ok_or_else(|| RecordNotFound::new("credential", id))?;
        record.state = RecordState::new(state);
        Ok(())
    }

    pub async fn set_proof_state(&self, id: &str, state: &str) -> Result<()> {
        let mut store = self.store.lock().await;
        let proof = store
            .proofs
            .get_mut(id)
            .ok_or_else(|| RecordNotFound::new("proof", id))?;
        proof.record.state = RecordState::new(state);
        Ok(())
    }

    /// Register a completed connection, returning its id.
    pub async fn add_connection(&self, id: &str, out_of_band_id: Option<&str>) -> String {
        self.store.lock().await.connections.push(ConnectionRecord {
            id: id.to_owned(),
            state: RecordState::new("completed"),
            out_of_band_id: out_of_band_id.map(ToOwned::to_owned),
        });
        id.to_owned()
    }

    /// A holder answers the invitation `out_of_band_id`, creating a connection.
    pub async fn accept_invitation(&self, out_of_band_id: &str) -> Result<String> {
        if !self
            .store
            .lock()
            .await
            .invitations
            .contains_key(out_of_band_id)
        {
            bail!(RecordNotFound::new("out-of-band", out_of_band_id))
        }
        let id = Uuid::new_v4().to_string();
        Ok(self.add_connection(&id, Some(out_of_band_id)).await)
    }

    /// A holder owning a credential with `attributes` answers proof request `id`.
    ///
    /// Predicates are evaluated on the integer value of the attribute they
    /// name. All of them must hold for the proof to verify. Returns whether it
    /// verified.
    pub async fn present_proof(&self, id: &str, attributes: &BTreeMap<&str, &str>) -> Result<bool> {
        let mut store = self.store.lock().await;
        let proof = store
            .proofs
            .get_mut(id)
            .ok_or_else(|| RecordNotFound::new("proof", id))?;
        let request = proof.options.proof_formats.anoncreds.clone();

        let mut requested_proof = RequestedProof::default();
        let mut verified = true;

        for (index, (referent, predicate)) in request.requested_predicates.iter().enumerate() {
            let value: i64 = attributes
                .get(predicate.name.as_str())
                .with_context(|| format!("holder has no '{}' attribute", predicate.name))?
                .parse()
                .with_context(|| format!("'{}' is not an integer", predicate.name))?;
            verified &= predicate.p_type.holds(value, predicate.p_value);
            requested_proof.predicates.insert(
                referent.clone(),
                SubProofReference {
                    sub_proof_index: index as u32,
                },
            );
        }

        for (index, (referent, attribute)) in request.requested_attributes.iter().enumerate() {
            let raw = attributes
                .get(attribute.name.as_str())
                .with_context(|| format!("holder has no '{}' attribute", attribute.name))?;
            requested_proof.revealed_attrs.insert(
                referent.clone(),
                RevealedAttribute {
                    sub_proof_index: index as u32,
                    raw: raw.to_string(),
                    encoded: raw.to_string(),
                },
            );
        }

        proof.format_data.presentation = Some(FormatPresentation {
            anoncreds: Some(AnonCredsPresentation { requested_proof }),
        });
        proof.record.is_verified = Some(verified);
        if verified {
            proof.record.state = RecordState::done();
        } else {
            proof.record.state = RecordState::abandoned();
            proof.record.error_message = Some("presentation could not be verified".into());
        }
        Ok(verified)
    }

    async fn enter(&self, operation: &'static str) -> Result<MutexGuard<'_, MemoryStore>> {
        let mut store = self.store.lock().await;
        store.calls.push(operation);
        if store.failing.contains(operation) {
            bail!("{operation} failed")
        }
        Ok(store)
    }
}

impl MemoryStore {
    fn require_connection(&self, connection_id: Option<&str>) -> Result<String> {
        let connection_id = connection_id.context("a connection id is required")?;
        if !self.connections.iter().any(|c| c.id == connection_id) {
            bail!(RecordNotFound::new("connection", connection_id))
        }
        Ok(connection_id.to_owned())
    }

    fn store_proof(&mut self, options: RequestProofOptions, connection_id: Option<String>) -> ProofExchangeRecord {
        let record = ProofExchangeRecord {
            id: Uuid::new_v4().to_string(),
            state: RecordState::new("request-sent"),
            protocol_version: options.protocol_version,
            connection_id,
            error_message: None,
            is_verified: None,
        };
        let format_data = ProofFormatData {
            request: Some(FormatRequest {
                anoncreds: Some(options.proof_formats.anoncreds.clone()),
            }),
            presentation: None,
        };
        self.proofs.insert(
            record.id.clone(),
            StoredProof {
                record: record.clone(),
                options,
                format_data,
            },
        );
        record
    }

    fn store_credential(
        &mut self,
        options: CreateOfferOptions,
        connection_id: Option<String>,
    ) -> CredentialExchangeRecord {
        let record = CredentialExchangeRecord {
            id: Uuid::new_v4().to_string(),
            state: RecordState::new("offer-sent"),
            protocol_version: options.protocol_version,
            connection_id,
            error_message: None,
        };
        self.credentials
            .insert(record.id.clone(), (record.clone(), options));
        record
    }
}

#[async_trait]
impl AgentRuntime for MemoryAgent {
    fn endpoints(&self) -> &[Url] {
        &self.endpoints
    }

    fn credentials(&self) -> &dyn CredentialsModule {
        self
    }

    fn proofs(&self) -> &dyn ProofsModule {
        self
    }

    fn oob(&self) -> &dyn OutOfBandModule {
        self
    }

    fn connections(&self) -> &dyn ConnectionsModule {
        self
    }

    fn anoncreds(&self) -> &dyn AnonCredsModule {
        self
    }

    fn dids(&self) -> &dyn DidsModule {
        self
    }

    fn wallet(&self) -> &dyn WalletModule {
        self
    }

    async fn shutdown(&self) -> Result<()> {
        let mut store = self.enter("shutdown").await?;
        store.shut_down = true;
        Ok(())
    }
}

#[async_trait]
impl CredentialsModule for MemoryAgent {
    async fn create_offer(&self, options: CreateOfferOptions) -> Result<CreatedOffer> {
        let mut store = self.enter("create_offer").await?;
        let message = ProtocolMessage::new(Uuid::new_v4().to_string(), OFFER_CREDENTIAL)
            .with_field("comment", json!(options.comment))
            .with_field("credential_preview", json!({
                "attributes": options.credential_formats.anoncreds.attributes,
            }));
        let credential_record = store.store_credential(options, None);
        Ok(CreatedOffer {
            message,
            credential_record,
        })
    }

    async fn offer_credential(
        &self,
        options: CreateOfferOptions,
    ) -> Result<CredentialExchangeRecord> {
        let mut store = self.enter("offer_credential").await?;
        let connection_id = store.require_connection(options.connection_id.as_deref())?;
        Ok(store.store_credential(options, Some(connection_id)))
    }

    async fn get_by_id(&self, id: &str) -> Result<CredentialExchangeRecord> {
        let store = self.enter("credentials.get_by_id").await?;
        store
            .credentials
            .get(id)
            .map(|(record, _)| record.clone())
            .ok_or_else(|| RecordNotFound::new("credential", id).into())
    }
}

#[async_trait]
impl ProofsModule for MemoryAgent {
    async fn create_request(&self, options: RequestProofOptions) -> Result<CreatedRequest> {
        let mut store = self.enter("create_request").await?;
        let message = ProtocolMessage::new(Uuid::new_v4().to_string(), REQUEST_PRESENTATION)
            .with_field("will_confirm", json!(options.will_confirm))
            .with_field("comment", json!(options.comment));
        let proof_record = store.store_proof(options, None);
        Ok(CreatedRequest {
            message,
            proof_record,
        })
    }

    async fn request_proof(&self, options: RequestProofOptions) -> Result<ProofExchangeRecord> {
        let mut store = self.enter("request_proof").await?;
        let connection_id = store.require_connection(options.connection_id.as_deref())?;
        Ok(store.store_proof(options, Some(connection_id)))
    }

    async fn get_by_id(&self, id: &str) -> Result<ProofExchangeRecord> {
        let store = self.enter("proofs.get_by_id").await?;
        store
            .proofs
            .get(id)
            .map(|proof| proof.record.clone())
            .ok_or_else(|| RecordNotFound::new("proof", id).into())
    }

    async fn get_format_data(&self, id: &str) -> Result<ProofFormatData> {
        let store = self.enter("get_format_data").await?;
        store
            .proofs
            .get(id)
            .map(|proof| proof.format_data.clone())
            .ok_or_else(|| RecordNotFound::new("proof", id).into())
    }
}

#[async_trait]
impl OutOfBandModule for MemoryAgent {
    async fn create_invitation(&self, config: CreateInvitationConfig) -> Result<OutOfBandRecord> {
        let mut store = self.enter("create_invitation").await?;
        let invitation = OutOfBandInvitation {
            invitation_type: INVITATION_TYPE.into(),
            id: Uuid::new_v4().to_string(),
            label: Some("memory-agent".into()),
            handshake_protocols: HANDSHAKE_PROTOCOLS.iter().map(|p| p.to_string()).collect(),
            services: self
                .endpoints
                .iter()
                .map(|endpoint| {
                    json!({
                        "id": "#inline-0",
                        "type": "did-communication",
                        "serviceEndpoint": endpoint.as_str(),
                    })
                })
                .collect(),
            requests_attach: config
                .messages
                .into_iter()
                .enumerate()
                .map(|(index, message)| Attachment::json(format!("request-{index}"), message))
                .collect(),
        };
        let record = OutOfBandRecord {
            id: Uuid::new_v4().to_string(),
            multi_use_invitation: config.multi_use_invitation,
            out_of_band_invitation: invitation,
        };
        store.invitations.insert(record.id.clone(), record.clone());
        Ok(record)
    }
}

#[async_trait]
impl ConnectionsModule for MemoryAgent {
    async fn find_all_by_query(&self, query: ConnectionQuery) -> Result<Vec<ConnectionRecord>> {
        let store = self.enter("find_all_by_query").await?;
        Ok(store
            .connections
            .iter()
            .filter(|c| {
                query.out_of_band_id.is_none() || c.out_of_band_id == query.out_of_band_id
            })
            .cloned()
            .collect())
    }
}

#[async_trait]
impl AnonCredsModule for MemoryAgent {
    async fn get_created_credential_definitions(&self) -> Result<Vec<CredentialDefinitionRecord>> {
        let store = self.enter("get_created_credential_definitions").await?;
        Ok(store.credential_definitions.clone())
    }

    async fn get_schema(&self, schema_id: &str) -> Result<CredentialSchema> {
        let store = self.enter("get_schema").await?;
        store
            .schemas
            .get(schema_id)
            .cloned()
            .ok_or_else(|| RecordNotFound::new("schema", schema_id).into())
    }
}

#[async_trait]
impl DidsModule for MemoryAgent {
    async fn import(&self, options: DidImport) -> Result<()> {
        self.enter("import").await?.dids.push(options);
        Ok(())
    }
}

#[async_trait]
impl WalletModule for MemoryAgent {
    /// The "public key" is the seed padded to 32 bytes.
    async fn create_key(&self, private_key: PrivateKey) -> Result<WalletKey> {
        let _store = self.enter("create_key").await?;
        let mut public_key = private_key.private_key;
        public_key.resize(32, 0);
        Ok(WalletKey {
            public_key_base58: bs58::encode(public_key).into_string(),
        })
    }
}

/// Hands out [MemoryAgent]s sharing one store, with the configured endpoints.
#[derive(Debug, Clone)]
pub struct MemoryLauncher {
    agent: MemoryAgent,
    launches: Arc<AtomicUsize>,
}

impl MemoryLauncher {
    pub fn new(agent: MemoryAgent) -> Self {
        Self {
            agent,
            launches: Arc::default(),
        }
    }

    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AgentLauncher for MemoryLauncher {
    async fn launch(&self, config: &AgentConfig) -> Result<Arc<dyn AgentRuntime>> {
        let _store = self.agent.enter("launch").await?;
        self.launches.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MemoryAgent {
            endpoints: config.endpoints.clone(),
            store: self.agent.store.clone(),
        }))
    }
}
