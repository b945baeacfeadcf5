use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::{
    agent::AgentRuntime,
    config::AutoAccept,
    core::{
        message::ProtocolMessage,
        options::{ProofFormats, RequestProofOptions},
        proof_request::{AnonCredsProofRequest, PredicateSpec, RequestedAttributeSpec},
        record::{ProofExchangeRecord, ProtocolVersion},
    },
    error::{ExchangeError, ExchangeResult, UpstreamContext},
};

/// A proof request handed to the runtime.
#[derive(Debug, Clone, PartialEq)]
pub enum BuiltRequest {
    /// Must still be packaged into an invitation.
    Connectionless {
        message: ProtocolMessage,
        record: ProofExchangeRecord,
    },
    /// Already sent over the connection.
    ConnectionBound { record: ProofExchangeRecord },
}

impl BuiltRequest {
    pub fn record(&self) -> &ProofExchangeRecord {
        match self {
            BuiltRequest::Connectionless { record, .. }
            | BuiltRequest::ConnectionBound { record } => record,
        }
    }
}

/// Builds an AnonCreds v2 presentation request.
///
/// Every predicate and requested attribute is restricted to a single credential
/// definition. The holder has to satisfy all of them at once.
#[derive(Debug, Clone)]
#[must_use]
pub struct PredicateRequestBuilder<'a> {
    runtime: &'a dyn AgentRuntime,
    name: String,
    predicates: Vec<PredicateSpec>,
    attributes: Vec<RequestedAttributeSpec>,
    auto_accept: AutoAccept,
    comment: Option<String>,
    connection_id: Option<String>,
}

impl<'a> PredicateRequestBuilder<'a> {
    pub fn new(runtime: &'a dyn AgentRuntime, name: impl Into<String>) -> Self {
        Self {
            runtime,
            name: name.into(),
            predicates: Vec::new(),
            attributes: Vec::new(),
            auto_accept: AutoAccept::Always,
            comment: None,
            connection_id: None,
        }
    }

    pub fn with_predicate(mut self, predicate: PredicateSpec) -> Self {
        self.predicates.push(predicate);
        self
    }

    pub fn with_predicates(mut self, predicates: impl IntoIterator<Item = PredicateSpec>) -> Self {
        self.predicates.extend(predicates);
        self
    }

    /// Ask for an attribute to be revealed.
    pub fn with_requested_attribute(mut self, attribute: RequestedAttributeSpec) -> Self {
        self.attributes.push(attribute);
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

    pub fn over_connection(mut self, connection_id: Option<String>) -> Self {
        self.connection_id = connection_id;
        self
    }

    pub fn connection_id(&self) -> Option<&str> {
        self.connection_id.as_deref()
    }

    /// The `anoncreds` proof format this builder will send.
    pub fn proof_request(&self) -> ExchangeResult<AnonCredsProofRequest> {
        if self.predicates.is_empty() && self.attributes.is_empty() {
            return Err(ExchangeError::Validation(
                "a proof request needs at least one predicate or requested attribute".into(),
            ));
        }

        let mut referents = BTreeSet::new();
        let duplicate = self
            .predicates
            .iter()
            .map(PredicateSpec::referent)
            .chain(self.attributes.iter().map(RequestedAttributeSpec::referent))
            .find(|referent| !referents.insert(*referent));
        if let Some(referent) = duplicate {
            return Err(ExchangeError::Validation(format!(
                "duplicate referent '{referent}'"
            )));
        }

        Ok(AnonCredsProofRequest {
            name: self.name.clone(),
            version: "1.0".into(),
            requested_attributes: self
                .attributes
                .iter()
                .map(|a| (a.referent().to_owned(), a.into()))
                .collect::<BTreeMap<_, _>>(),
            requested_predicates: self
                .predicates
                .iter()
                .map(|p| (p.referent().to_owned(), p.into()))
                .collect::<BTreeMap<_, _>>(),
        })
    }

    pub async fn build(self) -> ExchangeResult<BuiltRequest> {
        let options = RequestProofOptions {
            protocol_version: ProtocolVersion::V2,
            auto_accept_proof: self.auto_accept,
            will_confirm: true,
            connection_id: self.connection_id.clone(),
            proof_formats: ProofFormats {
                anoncreds: self.proof_request()?,
            },
            comment: self.comment,
        };

        let proofs = self.runtime.proofs();
        let request = match self.connection_id {
            None => {
                let created = proofs
                    .create_request(options)
                    .await
                    .upstream("failed to create proof request")?;
                BuiltRequest::Connectionless {
                    message: created.message,
                    record: created.proof_record,
                }
            }
            Some(connection_id) => {
                let record = proofs
                    .request_proof(options)
                    .await
                    .upstream(format!("failed to request proof over {connection_id}"))?;
                BuiltRequest::ConnectionBound { record }
            }
        };

        debug!(
            "proof exchange {} created for '{}'",
            request.record().id,
            self.name
        );
        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{agent::memory::MemoryAgent, core::proof_request::PredicateType};

    const DEFINITION_ID: &str = "Th7MpTaRZVRYnPiabds81Y:3:CL:9:card";

    fn expiry_after(referent: &str, now: i64) -> PredicateSpec {
        PredicateSpec::new(referent, "Expiry", PredicateType::Greater, now, DEFINITION_ID).unwrap()
    }

    #[test]
    fn empty_request_is_invalid() {
        let agent = MemoryAgent::new(vec![]);
        let builder = PredicateRequestBuilder::new(&agent, "empty");
        assert!(matches!(
            builder.proof_request(),
            Err(ExchangeError::Validation(_))
        ));
    }

    #[test]
    fn referents_are_unique_across_kinds() {
        let agent = MemoryAgent::new(vec![]);
        let builder = PredicateRequestBuilder::new(&agent, "dup")
            .with_predicate(expiry_after("check", 10))
            .with_requested_attribute(
                RequestedAttributeSpec::new("check", "Name", DEFINITION_ID).unwrap(),
            );
        assert!(matches!(
            builder.proof_request(),
            Err(ExchangeError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn requests_always_ask_for_confirmation() {
        let agent = MemoryAgent::new(vec![]);
        let request = PredicateRequestBuilder::new(&agent, "Validating PHC")
            .with_predicate(expiry_after("Validating expiration", 1_700_000_000))
            .build()
            .await
            .unwrap();

        let BuiltRequest::Connectionless { record, .. } = &request else {
            panic!("expected a connectionless request")
        };
        let options = agent.proof_request(&record.id).await.unwrap();
        assert!(options.will_confirm);
        let predicate = &options.proof_formats.anoncreds.requested_predicates["Validating expiration"];
        assert_eq!(predicate.p_value, 1_700_000_000);
        assert_eq!(predicate.restrictions.len(), 1);
        assert_eq!(predicate.restrictions[0].cred_def_id, DEFINITION_ID);
    }
}
