use std::{fmt::Debug, sync::Arc};

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{
    config::LedgerConfig,
    core::util::{post_json, AsyncHttpClient},
};

use super::LedgerNetwork;

/// Body of a NYM registration request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum NymRequest {
    /// The service derives the DID from the seed.
    Endorser {
        role: String,
        alias: String,
        seed: String,
    },
    /// The caller supplies the DID and its verkey.
    Verkey {
        network: String,
        did: String,
        verkey: String,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NymResponse {
    #[serde(default)]
    pub did: Option<String>,
    #[serde(default)]
    pub verkey: Option<String>,
    #[serde(default)]
    pub status_code: Option<u16>,
}

/// A ledger's NYM registration service.
#[async_trait]
pub trait NymRegistrar: Debug + Send + Sync {
    async fn register(&self, network: LedgerNetwork, request: &NymRequest) -> Result<NymResponse>;
}

/// Posts registrations to the endpoints in [LedgerConfig].
#[derive(Debug, Clone)]
pub struct HttpNymRegistrar {
    http: Arc<dyn AsyncHttpClient>,
    config: LedgerConfig,
}

impl HttpNymRegistrar {
    pub fn new(http: Arc<dyn AsyncHttpClient>, config: LedgerConfig) -> Self {
        Self { http, config }
    }
}

#[async_trait]
impl NymRegistrar for HttpNymRegistrar {
    async fn register(&self, network: LedgerNetwork, request: &NymRequest) -> Result<NymResponse> {
        let url = self.config.nym_url(network);
        post_json(self.http.as_ref(), url.as_str(), request).await
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::core::util::test::CannedClient;

    #[tokio::test]
    async fn posts_to_the_network_endpoint() {
        let http = Arc::new(CannedClient::new(
            200,
            r#"{"did":"NcYxiDXkpYi6ov5FcYDi1e","seed":"x","verkey":"y"}"#,
        ));
        let registrar = HttpNymRegistrar::new(http.clone(), LedgerConfig::default());

        let response = registrar
            .register(
                LedgerNetwork::BcovrinTestnet,
                &NymRequest::Endorser {
                    role: "ENDORSER".into(),
                    alias: "Alias".into(),
                    seed: "000000000000000000000000Steward1".into(),
                },
            )
            .await
            .unwrap();
        assert_eq!(response.did.as_deref(), Some("NcYxiDXkpYi6ov5FcYDi1e"));

        let requests = http.requests.lock().unwrap();
        let (method, uri, body) = &requests[0];
        assert_eq!(method, "POST");
        assert_eq!(uri, "http://test.bcovrin.vonx.io/register");
        assert_eq!(
            serde_json::from_slice::<serde_json::Value>(body).unwrap(),
            json!({
                "role": "ENDORSER",
                "alias": "Alias",
                "seed": "000000000000000000000000Steward1"
            })
        );
    }

    #[tokio::test]
    async fn indicio_status_is_decoded() {
        let http = Arc::new(CannedClient::new(200, r#"{"statusCode":200}"#));
        let registrar = HttpNymRegistrar::new(http, LedgerConfig::default());
        let response = registrar
            .register(
                LedgerNetwork::IndicioTestnet,
                &NymRequest::Verkey {
                    network: "testnet".into(),
                    did: "did".into(),
                    verkey: "verkey".into(),
                },
            )
            .await
            .unwrap();
        assert_eq!(response.status_code, Some(200));
    }
}
