use std::collections::BTreeSet;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use super::credential_definition::CredentialSchema;

pub const TEXT_PLAIN: &str = "text/plain";

/// One claim of a credential offer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialAttribute {
    pub name: String,
    pub mime_type: String,
    pub value: String,
}

impl CredentialAttribute {
    /// A `text/plain` attribute.
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mime_type: TEXT_PLAIN.into(),
            value: value.into(),
        }
    }
}

/// The ordered claim payload of an offer.
///
/// Names are unique and non-empty. Whether they match a particular schema is
/// checked with [AttributeSet::conform_to] once the credential definition is known.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct AttributeSet(Vec<CredentialAttribute>);

impl AttributeSet {
    pub fn new(attributes: Vec<CredentialAttribute>) -> Result<Self> {
        if attributes.is_empty() {
            bail!("an offer needs at least one attribute")
        }
        let mut seen = BTreeSet::new();
        for attribute in &attributes {
            if attribute.name.trim().is_empty() {
                bail!("attribute names must not be empty")
            }
            if !seen.insert(attribute.name.as_str()) {
                bail!("duplicate attribute '{}'", attribute.name)
            }
        }
        Ok(Self(attributes))
    }

    /// Check that the attribute names are exactly the schema's attribute names.
    pub fn conform_to(&self, schema: &CredentialSchema) -> Result<()> {
        let offered: BTreeSet<&str> = self.names().collect();
        let declared: BTreeSet<&str> = schema.attr_names.iter().map(String::as_str).collect();

        if let Some(unknown) = offered.difference(&declared).next() {
            bail!(
                "attribute '{unknown}' is not declared by schema '{}'",
                schema.name
            )
        }
        if let Some(missing) = declared.difference(&offered).next() {
            bail!(
                "attribute '{missing}' required by schema '{}' is missing",
                schema.name
            )
        }
        Ok(())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|a| a.name.as_str())
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &CredentialAttribute> {
        self.0.iter()
    }

    pub fn into_inner(self) -> Vec<CredentialAttribute> {
        self.0
    }
}

impl TryFrom<Vec<CredentialAttribute>> for AttributeSet {
    type Error = anyhow::Error;

    fn try_from(attributes: Vec<CredentialAttribute>) -> Result<Self> {
        Self::new(attributes)
    }
}

impl<'de> Deserialize<'de> for AttributeSet {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let attributes = Vec::<CredentialAttribute>::deserialize(deserializer)?;
        Self::new(attributes).map_err(serde::de::Error::custom)
    }
}
