use std::{collections::BTreeMap, fmt, str::FromStr};

use anyhow::{bail, Error, Result};
use serde::{Deserialize, Serialize};

use super::credential_definition::CredentialDefinitionId;

/// Comparison operator of an AnonCreds predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PredicateType {
    #[serde(rename = "<=")]
    LessOrEqual,
    #[serde(rename = "<")]
    Less,
    #[serde(rename = ">=")]
    GreaterOrEqual,
    #[serde(rename = ">")]
    Greater,
}

impl PredicateType {
    /// Whether `attribute <op> threshold` holds.
    pub fn holds(self, attribute: i64, threshold: i64) -> bool {
        match self {
            PredicateType::LessOrEqual => attribute <= threshold,
            PredicateType::Less => attribute < threshold,
            PredicateType::GreaterOrEqual => attribute >= threshold,
            PredicateType::Greater => attribute > threshold,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PredicateType::LessOrEqual => "<=",
            PredicateType::Less => "<",
            PredicateType::GreaterOrEqual => ">=",
            PredicateType::Greater => ">",
        }
    }
}

impl fmt::Display for PredicateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PredicateType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s {
            "<=" => PredicateType::LessOrEqual,
            "<" => PredicateType::Less,
            ">=" => PredicateType::GreaterOrEqual,
            ">" => PredicateType::Greater,
            other => bail!("unsupported predicate type '{other}'"),
        })
    }
}

/// A non-revealing numeric predicate restricted to one credential definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PredicateSpec {
    referent: String,
    attribute_name: String,
    p_type: PredicateType,
    p_value: i64,
    credential_definition_id: CredentialDefinitionId,
}

impl PredicateSpec {
    pub fn new(
        referent: impl Into<String>,
        attribute_name: impl Into<String>,
        p_type: PredicateType,
        p_value: i64,
        credential_definition_id: &str,
    ) -> Result<Self> {
        let referent = referent.into();
        let attribute_name = attribute_name.into();
        if referent.trim().is_empty() {
            bail!("predicate referent must not be empty")
        }
        if attribute_name.trim().is_empty() {
            bail!("predicate attribute name must not be empty")
        }
        Ok(Self {
            referent,
            attribute_name,
            p_type,
            p_value,
            credential_definition_id: credential_definition_id.parse()?,
        })
    }

    pub fn referent(&self) -> &str {
        &self.referent
    }

    pub fn attribute_name(&self) -> &str {
        &self.attribute_name
    }

    pub fn p_type(&self) -> PredicateType {
        self.p_type
    }

    pub fn p_value(&self) -> i64 {
        self.p_value
    }

    pub fn credential_definition_id(&self) -> &CredentialDefinitionId {
        &self.credential_definition_id
    }
}

/// A predicate as a caller states it, before the credential definition is known.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Predicate {
    pub referent: String,
    pub attribute_name: String,
    pub p_type: PredicateType,
    pub p_value: i64,
}

impl Predicate {
    pub fn restrict_to(&self, credential_definition_id: &str) -> Result<PredicateSpec> {
        PredicateSpec::new(
            self.referent.clone(),
            self.attribute_name.clone(),
            self.p_type,
            self.p_value,
            credential_definition_id,
        )
    }
}

/// A revealed attribute restricted to one credential definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestedAttributeSpec {
    referent: String,
    attribute_name: String,
    credential_definition_id: CredentialDefinitionId,
}

impl RequestedAttributeSpec {
    pub fn new(
        referent: impl Into<String>,
        attribute_name: impl Into<String>,
        credential_definition_id: &str,
    ) -> Result<Self> {
        let referent = referent.into();
        let attribute_name = attribute_name.into();
        if referent.trim().is_empty() || attribute_name.trim().is_empty() {
            bail!("requested attribute referent and name must not be empty")
        }
        Ok(Self {
            referent,
            attribute_name,
            credential_definition_id: credential_definition_id.parse()?,
        })
    }

    pub fn referent(&self) -> &str {
        &self.referent
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Restriction {
    pub cred_def_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestedAttribute {
    pub name: String,
    pub restrictions: Vec<Restriction>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestedPredicate {
    pub name: String,
    pub p_type: PredicateType,
    pub p_value: i64,
    pub restrictions: Vec<Restriction>,
}

impl From<&PredicateSpec> for RequestedPredicate {
    fn from(spec: &PredicateSpec) -> Self {
        Self {
            name: spec.attribute_name.clone(),
            p_type: spec.p_type,
            p_value: spec.p_value,
            restrictions: vec![Restriction {
                cred_def_id: spec.credential_definition_id.unqualified(),
            }],
        }
    }
}

impl From<&RequestedAttributeSpec> for RequestedAttribute {
    fn from(spec: &RequestedAttributeSpec) -> Self {
        Self {
            name: spec.attribute_name.clone(),
            restrictions: vec![Restriction {
                cred_def_id: spec.credential_definition_id.unqualified(),
            }],
        }
    }
}

/// The `anoncreds` proof format of a presentation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnonCredsProofRequest {
    pub name: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub requested_attributes: BTreeMap<String, RequestedAttribute>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub requested_predicates: BTreeMap<String, RequestedPredicate>,
}
