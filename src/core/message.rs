use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};

/// A DIDComm message produced by the agent runtime.
///
/// The core never interprets the body; it only moves messages from the
/// runtime into out-of-band invitations. `@id` and `@type` are the only
/// fields it reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Map<String, Json>", into = "Map<String, Json>")]
pub struct ProtocolMessage(Map<String, Json>);

const ID: &str = "@id";
const TYPE: &str = "@type";

impl ProtocolMessage {
    pub fn new(id: impl Into<String>, message_type: impl Into<String>) -> Self {
        let mut body = Map::new();
        body.insert(ID.to_owned(), Json::String(id.into()));
        body.insert(TYPE.to_owned(), Json::String(message_type.into()));
        Self(body)
    }

    pub fn id(&self) -> &str {
        self.0.get(ID).and_then(Json::as_str).unwrap_or_default()
    }

    pub fn message_type(&self) -> &str {
        self.0.get(TYPE).and_then(Json::as_str).unwrap_or_default()
    }

    /// Add or replace a body field.
    pub fn with_field(mut self, key: impl Into<String>, value: Json) -> Self {
        self.0.insert(key.into(), value);
        self
    }

    pub fn field(&self, key: &str) -> Option<&Json> {
        self.0.get(key)
    }
}

impl TryFrom<Map<String, Json>> for ProtocolMessage {
    type Error = anyhow::Error;

    fn try_from(body: Map<String, Json>) -> Result<Self> {
        for key in [ID, TYPE] {
            if !body.get(key).is_some_and(Json::is_string) {
                bail!("DIDComm message is missing '{key}'")
            }
        }
        Ok(Self(body))
    }
}

impl From<ProtocolMessage> for Map<String, Json> {
    fn from(ProtocolMessage(body): ProtocolMessage) -> Self {
        body
    }
}
