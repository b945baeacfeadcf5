use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::proof_request::AnonCredsProofRequest;

/// Format-specific data of a proof exchange, as returned by the runtime's
/// `proofs.getFormatData`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofFormatData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<FormatRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presentation: Option<FormatPresentation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatRequest {
    pub anoncreds: Option<AnonCredsProofRequest>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatPresentation {
    #[serde(default)]
    pub anoncreds: Option<AnonCredsPresentation>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnonCredsPresentation {
    #[serde(default)]
    pub requested_proof: RequestedProof,
}

/// The disclosed part of an AnonCreds presentation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestedProof {
    #[serde(default)]
    pub revealed_attrs: BTreeMap<String, RevealedAttribute>,
    #[serde(default)]
    pub predicates: BTreeMap<String, SubProofReference>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevealedAttribute {
    pub sub_proof_index: u32,
    pub raw: String,
    pub encoded: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubProofReference {
    pub sub_proof_index: u32,
}

impl ProofFormatData {
    /// Revealed attribute values keyed by referent.
    ///
    /// `None` when there is no presentation yet or it discloses nothing, e.g.
    /// a predicate-only proof.
    pub fn revealed_attributes(&self) -> Option<BTreeMap<String, String>> {
        let revealed = &self
            .presentation
            .as_ref()?
            .anoncreds
            .as_ref()?
            .requested_proof
            .revealed_attrs;
        if revealed.is_empty() {
            return None;
        }
        Some(
            revealed
                .iter()
                .map(|(referent, attribute)| (referent.clone(), attribute.raw.clone()))
                .collect(),
        )
    }
}
