use tracing::{debug, warn};
use url::Url;

use crate::{
    agent::AgentRuntime,
    core::{message::ProtocolMessage, out_of_band::CreateInvitationConfig},
    error::{ExchangeError, ExchangeResult, UpstreamContext},
    shortener::UrlShortener,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackagedInvitation {
    pub out_of_band_id: String,
    pub invitation_url: Url,
}

/// Wraps protocol messages into out-of-band invitations on the agent's first endpoint.
#[derive(Debug, Clone, Copy)]
pub struct InvitationPackager<'a> {
    runtime: &'a dyn AgentRuntime,
    domain: &'a Url,
}

impl<'a> InvitationPackager<'a> {
    pub fn new(runtime: &'a dyn AgentRuntime) -> ExchangeResult<Self> {
        let domain = runtime.endpoints().first().ok_or_else(|| {
            ExchangeError::Configuration("agent has no configured endpoint".into())
        })?;
        Ok(Self { runtime, domain })
    }

    /// Create an invitation carrying `messages`; accepting it auto-accepts the connection.
    pub async fn package(
        &self,
        messages: Vec<ProtocolMessage>,
        multi_use: bool,
    ) -> ExchangeResult<PackagedInvitation> {
        let record = self
            .runtime
            .oob()
            .create_invitation(CreateInvitationConfig {
                auto_accept_connection: true,
                multi_use_invitation: multi_use,
                messages,
            })
            .await
            .upstream("failed to create out-of-band invitation")?;

        let invitation_url = record
            .out_of_band_invitation
            .to_url(self.domain)
            .upstream("failed to encode out-of-band invitation")?;

        debug!("out-of-band invitation {} created", record.id);
        Ok(PackagedInvitation {
            out_of_band_id: record.id,
            invitation_url,
        })
    }
}

/// Shorten `url`, falling back to the original on any failure.
pub async fn shorten_url(shortener: &dyn UrlShortener, url: &Url) -> String {
    match shortener.shorten(url).await {
        Ok(short) => short,
        Err(e) => {
            warn!("failed to shorten invitation url, using the original: {e:#}");
            url.to_string()
        }
    }
}
