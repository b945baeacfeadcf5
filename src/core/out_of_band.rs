use anyhow::{Context, Result};
use base64::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use url::Url;

use super::message::ProtocolMessage;

pub const INVITATION_TYPE: &str = "https://didcomm.org/out-of-band/1.1/invitation";
const OOB_QUERY_PARAMETER: &str = "oob";

/// Arguments of the runtime's `oob.createInvitation` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateInvitationConfig {
    pub auto_accept_connection: bool,
    pub multi_use_invitation: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<ProtocolMessage>,
}

/// The runtime's record of an invitation it created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutOfBandRecord {
    pub id: String,
    pub multi_use_invitation: bool,
    pub out_of_band_invitation: OutOfBandInvitation,
}

/// An Aries RFC 0434 out-of-band invitation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutOfBandInvitation {
    #[serde(rename = "@type")]
    pub invitation_type: String,
    #[serde(rename = "@id")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub handshake_protocols: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub services: Vec<Json>,
    #[serde(
        rename = "requests~attach",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    pub requests_attach: Vec<Attachment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    #[serde(rename = "@id")]
    pub id: String,
    #[serde(rename = "mime-type")]
    pub mime_type: String,
    pub data: AttachmentData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttachmentData {
    pub json: ProtocolMessage,
}

impl Attachment {
    pub fn json(id: impl Into<String>, message: ProtocolMessage) -> Self {
        Self {
            id: id.into(),
            mime_type: "application/json".into(),
            data: AttachmentData { json: message },
        }
    }
}

impl OutOfBandInvitation {
    /// Messages carried by the invitation, in attachment order.
    pub fn messages(&self) -> impl Iterator<Item = &ProtocolMessage> {
        self.requests_attach.iter().map(|a| &a.data.json)
    }

    /// Encode as `<domain>?oob=<base64url(invitation)>`.
    pub fn to_url(&self, domain: &Url) -> Result<Url> {
        let encoded = serde_json::to_vec(self)
            .map(|json| BASE64_URL_SAFE_NO_PAD.encode(json))
            .context("unable to encode out-of-band invitation")?;
        let mut url = domain.clone();
        url.query_pairs_mut()
            .clear()
            .append_pair(OOB_QUERY_PARAMETER, &encoded);
        Ok(url)
    }

    /// Decode an invitation URL produced by [OutOfBandInvitation::to_url].
    pub fn from_url(url: &Url) -> Result<Self> {
        let (_, encoded) = url
            .query_pairs()
            .find(|(key, _)| key == OOB_QUERY_PARAMETER)
            .context("url has no 'oob' parameter")?;
        let json = BASE64_URL_SAFE_NO_PAD
            .decode(encoded.trim_end_matches('=').as_bytes())
            .context("'oob' parameter is not base64url")?;
        serde_json::from_slice(&json).context("'oob' parameter is not an invitation")
    }
}
