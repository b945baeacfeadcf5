use std::sync::{Arc, Mutex};

use anyhow::{bail, Result};
use async_trait::async_trait;
use ssi_exchange::{
    agent::{
        memory::{MemoryAgent, MemoryLauncher},
        session::AgentSession,
        AgentLauncher, AgentRuntime,
    },
    config::{AgentConfig, AgentEnvironment, ExchangeConfig, PerformanceModule},
    core::credential_definition::CredentialSchema,
    exchange::ExchangeOrchestrator,
    ledger::{DidRegistration, LedgerNetwork, NymRegistrar, NymRequest, NymResponse},
    utils::FixedClock,
};

pub const SEED: &str = "000000000000000000000000Steward1";
pub const ISSUER_DID: &str = "JM9L6HL2QCexjbn9WB46h9";
pub const NOW: u64 = 1_700_000_000;

pub const STUDENT_ACCESS_CARD: &str = "did:indy:bcovrin:testnet:JM9L6HL2QCexjbn9WB46h9/anoncreds/v0/CLAIM_DEF/2264778/Student Access Card";
pub const PHC: &str = "did:indy:bcovrin:testnet:JM9L6HL2QCexjbn9WB46h9/anoncreds/v0/CLAIM_DEF/2264780/PHC Credential";
pub const COURSE: &str = "did:indy:bcovrin:testnet:JM9L6HL2QCexjbn9WB46h9/anoncreds/v0/CLAIM_DEF/2264790/CS101";
pub const COURSE_MODULE_2: &str = "JM9L6HL2QCexjbn9WB46h9:3:CL:2264791:CS102";

/// Answers every NYM registration like the BCovrin testnet does.
#[derive(Debug, Default)]
pub struct TestRegistrar {
    pub requests: Mutex<Vec<NymRequest>>,
    pub reject: bool,
    /// Answered in place of `200`.
    pub status_code: Option<u16>,
}

#[async_trait]
impl NymRegistrar for TestRegistrar {
    async fn register(&self, _: LedgerNetwork, request: &NymRequest) -> Result<NymResponse> {
        self.requests.lock().unwrap().push(request.clone());
        if self.reject {
            bail!("ledger unavailable")
        }
        Ok(NymResponse {
            did: Some(ISSUER_DID.into()),
            verkey: None,
            status_code: Some(self.status_code.unwrap_or(200)),
        })
    }
}

/// Hands out the given agent as is, whatever the configured endpoints.
#[derive(Debug)]
pub struct FixedLauncher(pub MemoryAgent);

#[async_trait]
impl AgentLauncher for FixedLauncher {
    async fn launch(&self, _: &AgentConfig) -> Result<Arc<dyn AgentRuntime>> {
        Ok(Arc::new(self.0.clone()))
    }
}

pub struct Fixture {
    pub agent: MemoryAgent,
    pub launcher: MemoryLauncher,
    pub registrar: Arc<TestRegistrar>,
    pub session: Arc<AgentSession>,
    pub orchestrator: ExchangeOrchestrator,
}

pub fn environment() -> AgentEnvironment {
    AgentEnvironment::from_vars(|key| {
        match key {
            "AGENT_HOST" => Some("http://localhost:"),
            "ADMIN_PORT" => Some("3001"),
            "INBOUND_PORT" => Some("3002"),
            "PUBLIC_ENDPOINT" => Some("https://agent.example.com"),
            "AGENT_ID" => Some("401"),
            _ => None,
        }
        .map(ToOwned::to_owned)
    })
    .unwrap()
}

pub fn exchange_config() -> ExchangeConfig {
    ExchangeConfig {
        shorten_urls: false,
        performance_modules: vec![
            PerformanceModule {
                label: "Module 1".into(),
                credential_definition_id: COURSE.into(),
            },
            PerformanceModule {
                label: "Module 2".into(),
                credential_definition_id: COURSE_MODULE_2.into(),
            },
        ],
        ..ExchangeConfig::default()
    }
}

/// An uninitialized session over an empty in-memory agent.
pub fn fixture_with(registrar: TestRegistrar) -> Fixture {
    let agent = MemoryAgent::new(vec![]);
    let launcher = MemoryLauncher::new(agent.clone());
    let registrar = Arc::new(registrar);
    let session = Arc::new(AgentSession::new(
        environment(),
        Arc::new(launcher.clone()),
        DidRegistration::new(registrar.clone(), "Alias"),
    ));
    let orchestrator = ExchangeOrchestrator::new(session.clone(), exchange_config())
        .with_clock(Arc::new(FixedClock(NOW)));
    Fixture {
        agent,
        launcher,
        registrar,
        session,
        orchestrator,
    }
}

pub fn fixture() -> Fixture {
    fixture_with(TestRegistrar::default())
}

/// An initialized session without any credential definitions.
pub async fn ready() -> Fixture {
    let fixture = fixture();
    fixture
        .session
        .initialize(SEED, "bcovrin:testnet")
        .await
        .unwrap();
    fixture
}

fn schema(name: &str, attr_names: &[&str]) -> CredentialSchema {
    CredentialSchema {
        name: name.into(),
        version: "1.0".into(),
        attr_names: attr_names.iter().map(|n| n.to_string()).collect(),
    }
}

pub async fn publish_student_access_card(agent: &MemoryAgent) {
    agent
        .publish_credential_definition(
            STUDENT_ACCESS_CARD,
            "Student Access Card",
            "JM9L6HL2QCexjbn9WB46h9:2:Student Access Card:1.0",
            schema("Student Access Card", &["Name", "ID", "Expiry"]),
        )
        .await;
}

pub async fn publish_phc(agent: &MemoryAgent) {
    agent
        .publish_credential_definition(
            PHC,
            "PHC Credential",
            "JM9L6HL2QCexjbn9WB46h9:2:PHC:1.0",
            schema("PHC", &["Name", "Issued By", "Expiry"]),
        )
        .await;
}

pub async fn publish_course(agent: &MemoryAgent) {
    agent
        .publish_credential_definition(
            COURSE,
            "CS101",
            "JM9L6HL2QCexjbn9WB46h9:2:Course:1.0",
            schema("Course", &["Name", "Marks Scored", "Timestamp"]),
        )
        .await;
}
