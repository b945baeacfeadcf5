use std::{collections::BTreeMap, sync::Arc};

use serde::Serialize;
use tracing::info;

use crate::{
    agent::{session::AgentSession, AgentRuntime},
    config::ExchangeConfig,
    core::{
        attributes::AttributeSet,
        credential_definition::CredentialDefinitionRecord,
        envelope::ServiceResponse,
        message::ProtocolMessage,
        proof_request::Predicate,
        record::{CredentialExchangeRecord, ProofExchangeRecord},
    },
    error::{ExchangeError, ExchangeResult},
    shortener::{NoopShortener, UrlShortener},
    utils::{Clock, NonEmptyVec, SystemClock},
};

use super::{
    invitation::{shorten_url, InvitationPackager},
    offer_builder::{BuiltOffer, OfferBuilder},
    registry::CredentialDefinitionRegistry,
    request_builder::{BuiltRequest, PredicateRequestBuilder},
    tracker::{ExchangeStateTracker, RecordKind, StateSnapshot},
};

/// A started credential exchange. The URL is only present for connectionless offers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialExchange {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub out_of_band_id: Option<String>,
    pub credential_record: CredentialExchangeRecord,
}

/// A started proof exchange. The URL is only present for connectionless requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofExchange {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proof_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub out_of_band_id: Option<String>,
    pub proof_record: ProofExchangeRecord,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionInvitation {
    pub invitation_url: String,
    pub out_of_band_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestedData {
    pub requested_proof: Option<BTreeMap<String, String>>,
}

struct Delivery {
    url: Option<String>,
    out_of_band_id: Option<String>,
}

/// Entry point for every exchange.
///
/// Each operation resolves the live agent first and fails with
/// [ExchangeError::NotInitialized] before anything else happens.
#[derive(Debug, Clone)]
pub struct ExchangeOrchestrator {
    session: Arc<AgentSession>,
    config: ExchangeConfig,
    shortener: Arc<dyn UrlShortener>,
    clock: Arc<dyn Clock>,
}

impl ExchangeOrchestrator {
    pub fn new(session: Arc<AgentSession>, config: ExchangeConfig) -> Self {
        Self {
            session,
            config,
            shortener: Arc::new(NoopShortener),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_shortener(mut self, shortener: Arc<dyn UrlShortener>) -> Self {
        self.shortener = shortener;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn session(&self) -> &AgentSession {
        &self.session
    }

    pub fn config(&self) -> &ExchangeConfig {
        &self.config
    }

    pub(super) fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub(super) fn now(&self) -> i64 {
        self.clock.unix_seconds()
    }

    pub(super) async fn runtime(&self) -> ExchangeResult<Arc<dyn AgentRuntime>> {
        self.session.runtime().await
    }

    /// Offer a credential of the definition tagged `tag`.
    ///
    /// Without `connection_id` the offer is wrapped in a single-use invitation.
    pub async fn issue_credential(
        &self,
        tag: &str,
        attributes: AttributeSet,
        connection_id: Option<String>,
    ) -> ExchangeResult<ServiceResponse<CredentialExchange>> {
        let runtime = self.runtime().await?;
        let definition = CredentialDefinitionRegistry::new(runtime.as_ref())
            .get_by_tag(tag)
            .await?;
        let message = match connection_id {
            Some(_) => "Credential offered successfully",
            None => "Credential offer created successfully (OOB)",
        };
        let exchange = self
            .offer(runtime.as_ref(), &definition, attributes, connection_id, None)
            .await?;
        Ok(ServiceResponse::created(message, exchange))
    }

    pub(super) async fn offer(
        &self,
        runtime: &dyn AgentRuntime,
        definition: &CredentialDefinitionRecord,
        attributes: AttributeSet,
        connection_id: Option<String>,
        comment: Option<&str>,
    ) -> ExchangeResult<CredentialExchange> {
        let packager = match connection_id {
            None => Some(InvitationPackager::new(runtime)?),
            Some(_) => None,
        };

        let mut builder = OfferBuilder::new(runtime, definition)
            .with_attributes(attributes)
            .over_connection(connection_id);
        if let Some(comment) = comment {
            builder = builder.with_comment(comment);
        }

        let (message, record) = match builder.build().await? {
            BuiltOffer::Connectionless { message, record } => (Some(message), record),
            BuiltOffer::ConnectionBound { record } => (None, record),
        };
        let delivery = self.deliver(packager, message, &record.id).await?;

        info!(
            "credential exchange {} started for {}",
            record.id,
            definition.tag()
        );
        Ok(CredentialExchange {
            credential_url: delivery.url,
            out_of_band_id: delivery.out_of_band_id,
            credential_record: record,
        })
    }

    /// Ask for proof of `predicates` against the definition tagged `tag`.
    pub async fn request_proof(
        &self,
        tag: &str,
        predicates: Vec<Predicate>,
        connection_id: Option<String>,
    ) -> ExchangeResult<ServiceResponse<ProofExchange>> {
        let runtime = self.runtime().await?;
        let definition = CredentialDefinitionRegistry::new(runtime.as_ref())
            .get_by_tag(tag)
            .await?;

        let predicates = predicates
            .iter()
            .map(|p| p.restrict_to(&definition.credential_definition_id))
            .collect::<anyhow::Result<Vec<_>>>()
            .map_err(|e| ExchangeError::Validation(format!("{e:#}")))?;

        let builder = PredicateRequestBuilder::new(runtime.as_ref(), format!("Validating {tag}"))
            .with_predicates(predicates)
            .over_connection(connection_id);
        let message = match builder.connection_id() {
            Some(_) => "Proof request initiated successfully",
            None => "Proof request initiated successfully (OOB)",
        };
        let exchange = self.dispatch_request(runtime.as_ref(), builder).await?;
        Ok(ServiceResponse::created(message, exchange))
    }

    pub(super) async fn dispatch_request(
        &self,
        runtime: &dyn AgentRuntime,
        builder: PredicateRequestBuilder<'_>,
    ) -> ExchangeResult<ProofExchange> {
        let packager = match builder.connection_id() {
            None => Some(InvitationPackager::new(runtime)?),
            Some(_) => None,
        };

        let (message, record) = match builder.build().await? {
            BuiltRequest::Connectionless { message, record } => (Some(message), record),
            BuiltRequest::ConnectionBound { record } => (None, record),
        };
        let delivery = self.deliver(packager, message, &record.id).await?;

        info!("proof exchange {} started", record.id);
        Ok(ProofExchange {
            proof_url: delivery.url,
            out_of_band_id: delivery.out_of_band_id,
            proof_record: record,
        })
    }

    /// Package a connectionless message. A failure here leaves the exchange
    /// record behind, so the error carries its id.
    async fn deliver(
        &self,
        packager: Option<InvitationPackager<'_>>,
        message: Option<ProtocolMessage>,
        exchange_id: &str,
    ) -> ExchangeResult<Delivery> {
        let (Some(packager), Some(message)) = (packager, message) else {
            return Ok(Delivery {
                url: None,
                out_of_band_id: None,
            });
        };

        let packaged = packager
            .package(vec![message], false)
            .await
            .map_err(|e| e.with_exchange_id(exchange_id))?;

        Ok(Delivery {
            url: Some(self.present_url(&packaged.invitation_url).await),
            out_of_band_id: Some(packaged.out_of_band_id),
        })
    }

    async fn present_url(&self, url: &url::Url) -> String {
        if self.config.shorten_urls {
            shorten_url(self.shortener.as_ref(), url).await
        } else {
            url.to_string()
        }
    }

    /// Read the current state of a connection (by out-of-band id), credential or proof exchange.
    pub async fn poll_state(
        &self,
        kind: RecordKind,
        id: &str,
    ) -> ExchangeResult<ServiceResponse<StateSnapshot>> {
        let runtime = self.runtime().await?;
        let snapshot = ExchangeStateTracker::new(runtime.as_ref())
            .snapshot(kind, id)
            .await?;
        let message = match kind {
            RecordKind::Connection => "Connection state fetched successfully!",
            RecordKind::Credential => "Credential state fetched successfully",
            RecordKind::Proof => "Verification state fetched successfully",
        };
        Ok(ServiceResponse::ok(message, snapshot))
    }

    pub async fn credential_definitions(
        &self,
    ) -> ExchangeResult<ServiceResponse<NonEmptyVec<CredentialDefinitionRecord>>> {
        let runtime = self.runtime().await?;
        let definitions = CredentialDefinitionRegistry::new(runtime.as_ref())
            .get_all()
            .await?;
        Ok(ServiceResponse::ok(
            "Credential definitions fetched successfully",
            definitions,
        ))
    }

    pub async fn credential_definition_by_tag(
        &self,
        tag: &str,
    ) -> ExchangeResult<ServiceResponse<CredentialDefinitionRecord>> {
        let runtime = self.runtime().await?;
        let definition = CredentialDefinitionRegistry::new(runtime.as_ref())
            .get_by_tag(tag)
            .await?;
        Ok(ServiceResponse::ok(
            "Credential definition fetched successfully",
            definition,
        ))
    }

    /// A reusable invitation that only establishes a connection.
    pub async fn create_connection_invitation(
        &self,
    ) -> ExchangeResult<ServiceResponse<ConnectionInvitation>> {
        let runtime = self.runtime().await?;
        let packaged = InvitationPackager::new(runtime.as_ref())?
            .package(vec![], true)
            .await?;
        let invitation = ConnectionInvitation {
            invitation_url: self.present_url(&packaged.invitation_url).await,
            out_of_band_id: packaged.out_of_band_id,
        };
        Ok(ServiceResponse::created(
            "Connection invitation created successfully!",
            invitation,
        ))
    }

    /// Attribute values revealed by proof exchange `proof_id`.
    pub async fn requested_data(
        &self,
        proof_id: &str,
    ) -> ExchangeResult<ServiceResponse<RequestedData>> {
        let runtime = self.runtime().await?;
        let requested_proof = ExchangeStateTracker::new(runtime.as_ref())
            .revealed_attributes(proof_id)
            .await?;
        Ok(ServiceResponse::ok(
            "Requested data fetched successfully!",
            RequestedData { requested_proof },
        ))
    }
}
