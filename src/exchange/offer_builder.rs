use std::time::Duration;

use tracing::debug;

use crate::{
    agent::AgentRuntime,
    config::AutoAccept,
    core::{
        attributes::AttributeSet,
        credential_definition::CredentialDefinitionRecord,
        message::ProtocolMessage,
        options::{AnonCredsOffer, CreateOfferOptions, CredentialFormats},
        record::{CredentialExchangeRecord, ProtocolVersion},
    },
    error::{ExchangeError, ExchangeResult, UpstreamContext},
    utils::Clock,
};

use super::registry::CredentialDefinitionRegistry;

/// Unix time at which a credential issued now stops being fresh.
pub fn expiry(clock: &dyn Clock, window: Duration) -> ExchangeResult<i64> {
    i64::try_from(window.as_secs())
        .ok()
        .and_then(|window| clock.unix_seconds().checked_add(window))
        .ok_or_else(|| {
            ExchangeError::Configuration(format!(
                "freshness window of {}s is out of range",
                window.as_secs()
            ))
        })
}

/// An offer handed to the runtime.
#[derive(Debug, Clone, PartialEq)]
pub enum BuiltOffer {
    /// Must still be packaged into an invitation.
    Connectionless {
        message: ProtocolMessage,
        record: CredentialExchangeRecord,
    },
    /// Already sent over the connection.
    ConnectionBound { record: CredentialExchangeRecord },
}

impl BuiltOffer {
    pub fn record(&self) -> &CredentialExchangeRecord {
        match self {
            BuiltOffer::Connectionless { record, .. } | BuiltOffer::ConnectionBound { record } => {
                record
            }
        }
    }
}

/// Builds an AnonCreds v2 credential offer against one credential definition.
#[derive(Debug, Clone)]
#[must_use]
pub struct OfferBuilder<'a> {
    runtime: &'a dyn AgentRuntime,
    definition: &'a CredentialDefinitionRecord,
    attributes: Option<AttributeSet>,
    auto_accept: AutoAccept,
    comment: Option<String>,
    connection_id: Option<String>,
}

impl<'a> OfferBuilder<'a> {
    pub fn new(runtime: &'a dyn AgentRuntime, definition: &'a CredentialDefinitionRecord) -> Self {
        Self {
            runtime,
            definition,
            attributes: None,
            auto_accept: AutoAccept::Always,
            comment: None,
            connection_id: None,
        }
    }

    pub fn with_attributes(mut self, attributes: AttributeSet) -> Self {
        self.attributes = Some(attributes);
        self
    }

    pub fn with_auto_accept(mut self, auto_accept: AutoAccept) -> Self {
        self.auto_accept = auto_accept;
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Send the offer over an existing connection instead of creating a connectionless one.
    pub fn over_connection(mut self, connection_id: Option<String>) -> Self {
        self.connection_id = connection_id;
        self
    }

    /// Validate the attributes against the definition's schema and create the offer.
    pub async fn build(self) -> ExchangeResult<BuiltOffer> {
        let Some(attributes) = self.attributes else {
            return Err(ExchangeError::Validation(
                "attributes are required, see `with_attributes`".into(),
            ));
        };

        let credential_definition_id = self
            .definition
            .parsed_id()
            .map_err(|e| ExchangeError::Validation(format!("{e:#}")))?
            .unqualified();

        let schema = CredentialDefinitionRegistry::new(self.runtime)
            .schema_for(self.definition)
            .await?;
        attributes
            .conform_to(&schema)
            .map_err(|e| ExchangeError::Validation(e.to_string()))?;

        let options = CreateOfferOptions {
            protocol_version: ProtocolVersion::V2,
            auto_accept_credential: self.auto_accept,
            connection_id: self.connection_id,
            credential_formats: CredentialFormats {
                anoncreds: AnonCredsOffer::new(credential_definition_id, attributes),
            },
            comment: self.comment,
        };

        let credentials = self.runtime.credentials();
        let offer = match options.connection_id.clone() {
            None => {
                let created = credentials
                    .create_offer(options)
                    .await
                    .upstream("failed to create credential offer")?;
                BuiltOffer::Connectionless {
                    message: created.message,
                    record: created.credential_record,
                }
            }
            Some(connection_id) => {
                let record = credentials
                    .offer_credential(options)
                    .await
                    .upstream(format!("failed to offer credential over {connection_id}"))?;
                BuiltOffer::ConnectionBound { record }
            }
        };

        debug!(
            "credential exchange {} created for {}",
            offer.record().id,
            self.definition.tag()
        );
        Ok(offer)
    }
}
