use serde::{Deserialize, Serialize};

use crate::config::AutoAccept;

use super::{
    attributes::{AttributeSet, CredentialAttribute},
    message::ProtocolMessage,
    proof_request::AnonCredsProofRequest,
    record::{CredentialExchangeRecord, ProofExchangeRecord, ProtocolVersion},
};

/// Arguments of the runtime's `createOffer`/`offerCredential` calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOfferOptions {
    pub protocol_version: ProtocolVersion,
    pub auto_accept_credential: AutoAccept,
    /// Present only for connection-bound offers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_id: Option<String>,
    pub credential_formats: CredentialFormats,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialFormats {
    pub anoncreds: AnonCredsOffer,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnonCredsOffer {
    /// Unqualified (legacy) credential definition id.
    pub credential_definition_id: String,
    pub attributes: Vec<CredentialAttribute>,
}

impl AnonCredsOffer {
    pub fn new(credential_definition_id: String, attributes: AttributeSet) -> Self {
        Self {
            credential_definition_id,
            attributes: attributes.into_inner(),
        }
    }
}

/// Result of a connectionless offer: the message to embed plus the new record.
#[derive(Debug, Clone, PartialEq)]
pub struct CreatedOffer {
    pub message: ProtocolMessage,
    pub credential_record: CredentialExchangeRecord,
}

/// Arguments of the runtime's `createRequest`/`requestProof` calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestProofOptions {
    pub protocol_version: ProtocolVersion,
    pub auto_accept_proof: AutoAccept,
    /// The verifier always asks for a presentation acknowledgement.
    pub will_confirm: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_id: Option<String>,
    pub proof_formats: ProofFormats,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofFormats {
    pub anoncreds: AnonCredsProofRequest,
}

/// Result of a connectionless proof request.
#[derive(Debug, Clone, PartialEq)]
pub struct CreatedRequest {
    pub message: ProtocolMessage,
    pub proof_record: ProofExchangeRecord,
}
