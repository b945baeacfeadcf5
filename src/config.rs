use std::time::Duration;

use serde::Deserialize;
use url::Url;
use uuid::Uuid;

use crate::{
    error::{ExchangeError, ExchangeResult},
    ledger::LedgerNetwork,
};

/// Expiry window applied to freshly issued credentials (60 * 60 * 60 seconds).
pub const DEFAULT_FRESHNESS_WINDOW_SECS: u64 = 216_000;

#[derive(Deserialize, Debug, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub exchange: ExchangeConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
}

/// Tunables for the exchange flows.
#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ExchangeConfig {
    /// Seconds added to the current time for the `Expiry` attribute.
    pub freshness_window_secs: u64,
    /// Value of the `Issued By` attribute on personhood credentials.
    pub issuer_name: String,
    /// Whether invitation URLs are passed through the URL shortener.
    pub shorten_urls: bool,
    /// Course modules whose `Marks Scored` are requested by the performance check.
    pub performance_modules: Vec<PerformanceModule>,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            freshness_window_secs: DEFAULT_FRESHNESS_WINDOW_SECS,
            issuer_name: "SSI Portal".into(),
            shorten_urls: true,
            performance_modules: Vec::new(),
        }
    }
}

impl ExchangeConfig {
    pub fn freshness_window(&self) -> Duration {
        Duration::from_secs(self.freshness_window_secs)
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PerformanceModule {
    /// Human readable module name, used to label the requested attribute.
    pub label: String,
    pub credential_definition_id: String,
}

/// NYM registration endpoints of the supported testnets.
#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct LedgerConfig {
    pub bcovrin_nym_url: Url,
    pub indicio_nym_url: Url,
    /// Alias recorded with endorser registrations.
    pub alias: String,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            bcovrin_nym_url: static_url("http://test.bcovrin.vonx.io/register"),
            indicio_nym_url: static_url("https://selfserve.indiciotech.io/nym"),
            alias: "Alias".into(),
        }
    }
}

fn static_url(url: &'static str) -> Url {
    Url::parse(url).unwrap_or_else(|e| unreachable!("invalid built-in url {url}: {e}"))
}

impl LedgerConfig {
    pub fn nym_url(&self, network: LedgerNetwork) -> &Url {
        match network {
            LedgerNetwork::BcovrinTestnet => &self.bcovrin_nym_url,
            LedgerNetwork::IndicioTestnet => &self.indicio_nym_url,
        }
    }
}

/// Process environment required to launch an agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentEnvironment {
    pub agent_id: String,
    pub agent_host: String,
    pub admin_port: u16,
    pub inbound_port: u16,
    /// Publicly reachable DIDComm endpoint, e.g. a tunnel in front of the inbound port.
    pub public_endpoint: Option<BaseUrl>,
}

impl AgentEnvironment {
    /// Read `AGENT_HOST`, `ADMIN_PORT`, `INBOUND_PORT`, and optionally
    /// `PUBLIC_ENDPOINT` and `AGENT_ID`.
    pub fn from_env() -> ExchangeResult<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> ExchangeResult<Self> {
        let (Some(agent_host), Some(admin_port), Some(inbound_port)) =
            (var("AGENT_HOST"), var("ADMIN_PORT"), var("INBOUND_PORT"))
        else {
            return Err(ExchangeError::Configuration(
                "missing required environment variables to initialize the agent".into(),
            ));
        };

        let public_endpoint = var("PUBLIC_ENDPOINT")
            .map(|endpoint| {
                BaseUrl::try_from(endpoint).map_err(|e| {
                    ExchangeError::Configuration(format!("invalid PUBLIC_ENDPOINT: {e}"))
                })
            })
            .transpose()?;

        Ok(Self {
            agent_id: var("AGENT_ID").unwrap_or_else(|| Uuid::new_v4().to_string()),
            agent_host,
            admin_port: parse_port("ADMIN_PORT", &admin_port)?,
            inbound_port: parse_port("INBOUND_PORT", &inbound_port)?,
            public_endpoint,
        })
    }

    /// The endpoint advertised to holders in invitations.
    ///
    /// Falls back to `<AGENT_HOST><INBOUND_PORT>` when no public endpoint is set.
    pub fn endpoint(&self) -> ExchangeResult<Url> {
        match &self.public_endpoint {
            Some(endpoint) => Ok(Url::clone(endpoint)),
            None => BaseUrl::try_from(format!("{}{}", self.agent_host, self.inbound_port))
                .map(|endpoint| Url::clone(&endpoint))
                .map_err(|e| ExchangeError::Configuration(format!("invalid agent endpoint: {e}"))),
        }
    }
}

fn parse_port(key: &str, value: &str) -> ExchangeResult<u16> {
    value
        .parse()
        .map_err(|_| ExchangeError::Configuration(format!("{key} is not a valid port: '{value}'")))
}

/// Acceptance policy handed to the agent runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AutoAccept {
    Always,
    ContentApproved,
    Never,
}

/// Everything the agent runtime needs to start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentConfig {
    pub label: String,
    pub wallet_id: String,
    pub wallet_key: String,
    pub network: LedgerNetwork,
    pub endpoints: Vec<Url>,
    pub admin_port: u16,
    pub inbound_port: u16,
    pub auto_accept_connections: bool,
    pub auto_accept_credentials: AutoAccept,
    pub auto_accept_proofs: AutoAccept,
}

impl AgentConfig {
    pub fn new(environment: &AgentEnvironment, network: LedgerNetwork) -> ExchangeResult<Self> {
        let wallet_id = format!("wallet-{}", environment.agent_id);
        Ok(Self {
            label: format!("agent-{}", environment.agent_id),
            wallet_key: format!("key-{wallet_id}"),
            wallet_id,
            network,
            endpoints: vec![environment.endpoint()?],
            admin_port: environment.admin_port,
            inbound_port: environment.inbound_port,
            auto_accept_connections: false,
            auto_accept_credentials: AutoAccept::ContentApproved,
            auto_accept_proofs: AutoAccept::ContentApproved,
        })
    }
}

/// A url that is always a base (can be safely join()'ed with further path elements without
/// mangling).
#[derive(Deserialize, Debug, Clone, Hash, PartialEq, Eq)]
#[serde(try_from = "String")]
pub struct BaseUrl(Url);

impl std::ops::Deref for BaseUrl {
    type Target = Url;

    fn deref(&self) -> &Url {
        &self.0
    }
}

impl TryFrom<String> for BaseUrl {
    type Error = url::ParseError;

    fn try_from(mut url: String) -> Result<Self, Self::Error> {
        // Make URL a base.
        if !url.ends_with('/') {
            url += "/"
        }
        url.parse().map(Self)
    }
}
