use std::{fmt, str::FromStr};

use anyhow::{bail, Context, Error, Result};
use serde::{Deserialize, Serialize};

/// An issuer-published credential definition, as enumerated by the agent runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialDefinitionRecord {
    /// Ledger identifier, usually the qualified `did:indy:` form.
    pub credential_definition_id: String,
    pub credential_definition: CredentialDefinition,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialDefinition {
    pub issuer_id: String,
    pub schema_id: String,
    /// Human assigned name. Not unique on the ledger.
    pub tag: String,
}

impl CredentialDefinitionRecord {
    pub fn tag(&self) -> &str {
        &self.credential_definition.tag
    }

    pub fn schema_id(&self) -> &str {
        &self.credential_definition.schema_id
    }

    pub fn parsed_id(&self) -> Result<CredentialDefinitionId> {
        self.credential_definition_id.parse()
    }
}

/// The schema a credential definition binds to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialSchema {
    pub name: String,
    pub version: String,
    pub attr_names: Vec<String>,
}

/// A decomposed Indy credential definition identifier.
///
/// Accepts the qualified form
/// `did:indy:<namespace>:<did>/anoncreds/v0/CLAIM_DEF/<schema seq no>/<tag>`
/// and the legacy form `<did>:3:CL:<schema seq no>:<tag>`. AnonCreds payloads
/// always carry the legacy (unqualified) form, which is what [fmt::Display] renders.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CredentialDefinitionId {
    pub namespace: Option<String>,
    pub namespace_identifier: String,
    pub schema_seq_no: u64,
    pub tag: String,
}

const QUALIFIED_PREFIX: &str = "did:indy:";
const CLAIM_DEF_PATH: &str = "/anoncreds/v0/CLAIM_DEF/";

impl CredentialDefinitionId {
    pub fn unqualified(&self) -> String {
        self.to_string()
    }

    fn parse_qualified(id: &str) -> Result<Self> {
        let Some(rest) = id.strip_prefix(QUALIFIED_PREFIX) else {
            bail!("missing '{QUALIFIED_PREFIX}' prefix")
        };
        let (did, path) = rest
            .split_once(CLAIM_DEF_PATH)
            .context("missing CLAIM_DEF path")?;
        let (namespace, namespace_identifier) =
            did.rsplit_once(':').context("missing DID namespace")?;
        let (seq_no, tag) = path.split_once('/').context("missing tag")?;

        Self::validated(Some(namespace), namespace_identifier, seq_no, tag)
    }

    fn parse_legacy(id: &str) -> Result<Self> {
        let mut parts = id.splitn(5, ':');
        let (Some(did), Some("3"), Some("CL"), Some(seq_no), Some(tag)) = (
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
        ) else {
            bail!("expected '<did>:3:CL:<schema seq no>:<tag>'")
        };

        Self::validated(None, did, seq_no, tag)
    }

    fn validated(
        namespace: Option<&str>,
        namespace_identifier: &str,
        seq_no: &str,
        tag: &str,
    ) -> Result<Self> {
        if namespace.is_some_and(str::is_empty) || namespace_identifier.is_empty() {
            bail!("empty DID component")
        }
        if tag.is_empty() {
            bail!("empty tag")
        }
        let schema_seq_no = seq_no
            .parse()
            .with_context(|| format!("invalid schema sequence number '{seq_no}'"))?;

        Ok(Self {
            namespace: namespace.map(ToOwned::to_owned),
            namespace_identifier: namespace_identifier.to_owned(),
            schema_seq_no,
            tag: tag.to_owned(),
        })
    }
}

impl FromStr for CredentialDefinitionId {
    type Err = Error;

    fn from_str(id: &str) -> Result<Self> {
        let parsed = if id.starts_with(QUALIFIED_PREFIX) {
            Self::parse_qualified(id)
        } else {
            Self::parse_legacy(id)
        };
        parsed.with_context(|| format!("invalid credential definition id '{id}'"))
    }
}

impl fmt::Display for CredentialDefinitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:3:CL:{}:{}",
            self.namespace_identifier, self.schema_seq_no, self.tag
        )
    }
}
