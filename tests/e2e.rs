use std::{collections::BTreeMap, sync::Arc};

use anyhow::bail;
use async_trait::async_trait;
use ssi_exchange::{
    agent::{memory::MemoryAgent, session::AgentSession},
    config::ExchangeConfig,
    core::{
        attributes::{AttributeSet, CredentialAttribute},
        out_of_band::OutOfBandInvitation,
        proof_request::{Predicate, PredicateType},
    },
    error::ExchangeError,
    exchange::{tracker::ConnectionState, ExchangeOrchestrator, RecordKind, StateSnapshot},
    ledger::{DidRegistration, NymRequest},
    shortener::UrlShortener,
};
use url::Url;

mod agent_fixture;

use agent_fixture::*;

const FRESHNESS_WINDOW: i64 = 60 * 60 * 60;

async fn proof_snapshot(orchestrator: &ExchangeOrchestrator, id: &str) -> (String, Option<bool>) {
    match orchestrator
        .poll_state(RecordKind::Proof, id)
        .await
        .unwrap()
        .data
    {
        StateSnapshot::Proof(proof) => (proof.state.to_string(), proof.verified),
        other => panic!("unexpected snapshot {other:?}"),
    }
}

async fn credential_state(orchestrator: &ExchangeOrchestrator, id: &str) -> String {
    match orchestrator
        .poll_state(RecordKind::Credential, id)
        .await
        .unwrap()
        .data
    {
        StateSnapshot::Credential(credential) => credential.state.to_string(),
        other => panic!("unexpected snapshot {other:?}"),
    }
}

async fn connection_snapshot(orchestrator: &ExchangeOrchestrator, out_of_band_id: &str) -> ConnectionState {
    match orchestrator
        .poll_state(RecordKind::Connection, out_of_band_id)
        .await
        .unwrap()
        .data
    {
        StateSnapshot::Connection(connection) => connection,
        other => panic!("unexpected snapshot {other:?}"),
    }
}

#[tokio::test]
async fn operations_fail_fast_before_initialization() {
    let fixture = fixture();
    assert!(matches!(
        fixture.orchestrator.issue_phc("Alice").await,
        Err(ExchangeError::NotInitialized)
    ));
    assert!(matches!(
        fixture
            .orchestrator
            .poll_state(RecordKind::Credential, "cred-1")
            .await,
        Err(ExchangeError::NotInitialized)
    ));
    assert!(matches!(
        fixture.orchestrator.create_connection_invitation().await,
        Err(ExchangeError::NotInitialized)
    ));
    assert_eq!(
        ExchangeError::NotInitialized.status_code(),
        http::StatusCode::BAD_REQUEST
    );
    assert_eq!(fixture.launcher.launches(), 0);
}

#[tokio::test]
async fn initialize_registers_and_imports_the_did() {
    let fixture = fixture();
    let response = fixture
        .session
        .initialize(SEED, "bcovrin:testnet")
        .await
        .unwrap();

    assert_eq!(response.status_code, 201);
    assert_eq!(response.message, "Agent initialized successfully");
    assert_eq!(
        response.data.did,
        format!("did:indy:bcovrin:testnet:{ISSUER_DID}")
    );
    assert_eq!(response.data.admin_port, 3001);
    assert_eq!(response.data.endpoint.as_str(), "https://agent.example.com/");
    assert_eq!(
        fixture.agent.imported_dids().await,
        vec![format!("did:indy:bcovrin:testnet:{ISSUER_DID}")]
    );
    assert_eq!(
        fixture.registrar.requests.lock().unwrap()[0],
        NymRequest::Endorser {
            role: "ENDORSER".into(),
            alias: "Alias".into(),
            seed: SEED.into(),
        }
    );
}

#[tokio::test]
async fn second_initialize_conflicts_and_keeps_the_agent() {
    let fixture = ready().await;
    let before = fixture.session.details().await.unwrap();

    let err = fixture
        .session
        .initialize(SEED, "indicio:testnet")
        .await
        .unwrap_err();
    assert!(matches!(err, ExchangeError::Conflict(_)));
    assert_eq!(err.status_code(), http::StatusCode::CONFLICT);
    assert!(err.to_string().contains("3001"));
    assert!(err.to_string().contains("https://agent.example.com/"));

    assert_eq!(fixture.launcher.launches(), 1);
    assert_eq!(fixture.session.details().await.unwrap(), before);
    let runtime = fixture.session.runtime().await.unwrap();
    assert_eq!(runtime.endpoints()[0].as_str(), "https://agent.example.com/");
}

#[tokio::test]
async fn invalid_initialization_input_never_launches() {
    let fixture = fixture();
    assert!(matches!(
        fixture.session.initialize("short", "bcovrin:testnet").await,
        Err(ExchangeError::Validation(_))
    ));
    assert!(matches!(
        fixture.session.initialize(SEED, "sovrin:mainnet").await,
        Err(ExchangeError::Validation(_))
    ));
    assert_eq!(fixture.launcher.launches(), 0);
}

#[tokio::test]
async fn failed_did_registration_shuts_the_agent_down() {
    let fixture = fixture_with(TestRegistrar {
        reject: true,
        ..TestRegistrar::default()
    });
    let err = fixture
        .session
        .initialize(SEED, "bcovrin:testnet")
        .await
        .unwrap_err();

    assert!(matches!(err, ExchangeError::Upstream { .. }));
    assert!(fixture.agent.is_shut_down().await);
    assert!(fixture.session.details().await.is_none());
    assert!(matches!(
        fixture.session.runtime().await,
        Err(ExchangeError::NotInitialized)
    ));
}

#[tokio::test]
async fn agent_without_endpoint_is_shut_down() {
    let agent = MemoryAgent::new(vec![]);
    let registrar = Arc::new(TestRegistrar::default());
    let session = AgentSession::new(
        environment(),
        Arc::new(FixedLauncher(agent.clone())),
        DidRegistration::new(registrar.clone(), "Alias"),
    );

    let err = session
        .initialize(SEED, "bcovrin:testnet")
        .await
        .unwrap_err();
    assert!(matches!(err, ExchangeError::Configuration(_)));
    assert!(agent.is_shut_down().await);
    assert!(agent.imported_dids().await.is_empty());
    assert!(registrar.requests.lock().unwrap().is_empty());
    assert!(session.details().await.is_none());
}

#[tokio::test]
async fn indicio_registration_submits_the_derived_did() {
    let fixture = fixture();
    let response = fixture
        .session
        .initialize(SEED, "indicio:testnet")
        .await
        .unwrap();

    let verkey = bs58::encode(SEED.as_bytes()).into_string();
    let did = bs58::encode(&SEED.as_bytes()[..16]).into_string();
    assert_eq!(
        fixture.registrar.requests.lock().unwrap()[0],
        NymRequest::Verkey {
            network: "testnet".into(),
            did: did.clone(),
            verkey,
        }
    );
    assert_eq!(response.data.did, format!("did:indy:indicio:testnet:{did}"));
    assert_eq!(
        fixture.agent.imported_dids().await,
        vec![format!("did:indy:indicio:testnet:{did}")]
    );
    assert!(fixture.agent.calls().await.contains(&"create_key"));
}

#[tokio::test]
async fn indicio_rejection_shuts_the_agent_down() {
    let fixture = fixture_with(TestRegistrar {
        status_code: Some(400),
        ..TestRegistrar::default()
    });
    let err = fixture
        .session
        .initialize(SEED, "indicio:testnet")
        .await
        .unwrap_err();

    assert!(matches!(err, ExchangeError::Upstream { .. }));
    assert_eq!(fixture.registrar.requests.lock().unwrap().len(), 1);
    assert!(fixture.agent.imported_dids().await.is_empty());
    assert!(fixture.agent.is_shut_down().await);
    assert!(fixture.session.details().await.is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_initializations_launch_once() {
    let fixture = fixture();
    let (a, b) = tokio::join!(
        fixture.session.initialize(SEED, "bcovrin:testnet"),
        fixture.session.initialize(SEED, "bcovrin:testnet"),
    );

    let conflicts = [&a, &b]
        .into_iter()
        .filter(|r| matches!(r, Err(ExchangeError::Conflict(_))))
        .count();
    assert_eq!(conflicts, 1);
    assert!(a.is_ok() || b.is_ok());
    assert_eq!(fixture.launcher.launches(), 1);
    assert!(fixture.session.details().await.is_some());
}

#[tokio::test]
async fn student_access_card_issuance() {
    let fixture = ready().await;
    publish_student_access_card(&fixture.agent).await;

    let response = fixture
        .orchestrator
        .issue_student_access_card("Alice")
        .await
        .unwrap();
    assert_eq!(response.status_code, 201);

    let exchange = response.data;
    let record_id = exchange.credential_record.id.clone();
    assert!(!record_id.is_empty());
    assert!(exchange.out_of_band_id.is_some());

    let url: Url = exchange.credential_url.unwrap().parse().unwrap();
    assert_eq!(url.host_str(), Some("agent.example.com"));
    let invitation = OutOfBandInvitation::from_url(&url).unwrap();
    let messages: Vec<_> = invitation.messages().collect();
    assert_eq!(messages.len(), 1);
    assert_eq!(
        messages[0].message_type(),
        "https://didcomm.org/issue-credential/2.0/offer-credential"
    );

    let offer = fixture.agent.credential_offer(&record_id).await.unwrap();
    let offered = offer.credential_formats.anoncreds;
    assert_eq!(
        offered.credential_definition_id,
        "JM9L6HL2QCexjbn9WB46h9:3:CL:2264778:Student Access Card"
    );
    let value = |name: &str| {
        offered
            .attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.clone())
            .unwrap()
    };
    assert_eq!(value("Name"), "Alice");
    assert!((1000..10000).contains(&value("ID").parse::<u32>().unwrap()));
    assert_eq!(
        value("Expiry").parse::<i64>().unwrap(),
        NOW as i64 + FRESHNESS_WINDOW
    );

    assert_eq!(credential_state(&fixture.orchestrator, &record_id).await, "offer-sent");
    fixture
        .agent
        .set_credential_state(&record_id, "request-received")
        .await
        .unwrap();
    assert_eq!(
        credential_state(&fixture.orchestrator, &record_id).await,
        "request-received"
    );
    fixture
        .agent
        .set_credential_state(&record_id, "done")
        .await
        .unwrap();
    assert_eq!(credential_state(&fixture.orchestrator, &record_id).await, "done");
}

#[tokio::test]
async fn offers_are_tracked_independently() {
    let fixture = ready().await;
    publish_phc(&fixture.agent).await;

    let first = fixture.orchestrator.issue_phc("Alice").await.unwrap().data;
    let second = fixture.orchestrator.issue_phc("Bob").await.unwrap().data;
    assert_ne!(first.credential_record.id, second.credential_record.id);
    assert_ne!(first.out_of_band_id, second.out_of_band_id);

    fixture
        .agent
        .set_credential_state(&first.credential_record.id, "done")
        .await
        .unwrap();
    assert_eq!(
        credential_state(&fixture.orchestrator, &first.credential_record.id).await,
        "done"
    );
    assert_eq!(
        credential_state(&fixture.orchestrator, &second.credential_record.id).await,
        "offer-sent"
    );

    let offer = fixture
        .agent
        .credential_offer(&second.credential_record.id)
        .await
        .unwrap();
    let issued_by = offer
        .credential_formats
        .anoncreds
        .attributes
        .iter()
        .find(|a| a.name == "Issued By")
        .map(|a| a.value.clone());
    assert_eq!(issued_by.as_deref(), Some("SSI Portal"));
}

#[tokio::test]
async fn unknown_tag_is_not_found() {
    let fixture = ready().await;
    assert!(matches!(
        fixture.orchestrator.credential_definitions().await,
        Err(ExchangeError::NotFound(_))
    ));

    publish_phc(&fixture.agent).await;
    let attributes = AttributeSet::new(vec![CredentialAttribute::text("Name", "Alice")]).unwrap();
    let err = fixture
        .orchestrator
        .issue_credential("Unknown", attributes, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ExchangeError::NotFound(_)));
    assert_eq!(err.status_code(), http::StatusCode::NOT_FOUND);
    assert!(matches!(
        fixture
            .orchestrator
            .credential_definition_by_tag("phc credential")
            .await,
        Err(ExchangeError::NotFound(_))
    ));
    assert!(!fixture.agent.calls().await.contains(&"create_offer"));
}

#[tokio::test]
async fn first_published_definition_wins() {
    let fixture = ready().await;
    publish_student_access_card(&fixture.agent).await;
    fixture
        .agent
        .publish_credential_definition(
            "Other1111111111111111:3:CL:77:Student Access Card",
            "Student Access Card",
            "Other1111111111111111:2:Student Access Card:1.0",
            ssi_exchange::core::credential_definition::CredentialSchema {
                name: "Student Access Card".into(),
                version: "1.0".into(),
                attr_names: vec!["Name".into()],
            },
        )
        .await;

    for _ in 0..3 {
        let definition = fixture
            .orchestrator
            .credential_definition_by_tag("Student Access Card")
            .await
            .unwrap()
            .data;
        assert_eq!(definition.credential_definition_id, STUDENT_ACCESS_CARD);
    }
    let all = fixture.orchestrator.credential_definitions().await.unwrap();
    assert_eq!(all.status_code, 200);
    assert_eq!(all.data.len(), 2);
}

#[tokio::test]
async fn verification_without_definition_never_reaches_the_runtime() {
    let fixture = ready().await;
    fixture.agent.add_connection("conn-1", None).await;

    let err = fixture
        .orchestrator
        .verify_student_access_card("conn-1")
        .await
        .unwrap_err();
    assert!(matches!(err, ExchangeError::NotFound(_)));

    let calls = fixture.agent.calls().await;
    assert!(!calls.contains(&"request_proof"));
    assert!(!calls.contains(&"create_request"));
}

#[tokio::test]
async fn expiry_predicate_is_strict() {
    let fixture = ready().await;
    publish_student_access_card(&fixture.agent).await;
    fixture.agent.add_connection("conn-1", None).await;

    let request = fixture
        .orchestrator
        .verify_student_access_card("conn-1")
        .await
        .unwrap()
        .data;
    assert!(request.proof_url.is_none());
    assert_eq!(request.proof_record.connection_id.as_deref(), Some("conn-1"));

    let options = fixture
        .agent
        .proof_request(&request.proof_record.id)
        .await
        .unwrap();
    let predicate = &options.proof_formats.anoncreds.requested_predicates["Validating expiration"];
    assert_eq!(predicate.p_type, PredicateType::Greater);
    assert_eq!(predicate.p_value, NOW as i64);
    assert!(options.will_confirm);

    // Expiry equal to now does not satisfy `>`.
    let expiry = NOW.to_string();
    let verified = fixture
        .agent
        .present_proof(
            &request.proof_record.id,
            &BTreeMap::from([("Expiry", expiry.as_str())]),
        )
        .await
        .unwrap();
    assert!(!verified);
    assert_eq!(
        proof_snapshot(&fixture.orchestrator, &request.proof_record.id).await,
        ("abandoned".to_owned(), Some(false))
    );

    let request = fixture
        .orchestrator
        .request_proof(
            "Student Access Card",
            vec![Predicate {
                referent: "Validating expiration".into(),
                attribute_name: "Expiry".into(),
                p_type: PredicateType::GreaterOrEqual,
                p_value: NOW as i64,
            }],
            Some("conn-1".into()),
        )
        .await
        .unwrap()
        .data;
    let verified = fixture
        .agent
        .present_proof(
            &request.proof_record.id,
            &BTreeMap::from([("Expiry", expiry.as_str())]),
        )
        .await
        .unwrap();
    assert!(verified);
    assert_eq!(
        proof_snapshot(&fixture.orchestrator, &request.proof_record.id).await,
        ("done".to_owned(), Some(true))
    );

    // Predicates disclose nothing.
    let data = fixture
        .orchestrator
        .requested_data(&request.proof_record.id)
        .await
        .unwrap();
    assert_eq!(data.status_code, 200);
    assert_eq!(data.data.requested_proof, None);
}

#[tokio::test]
async fn phc_verification_is_connectionless() {
    let fixture = ready().await;
    publish_phc(&fixture.agent).await;

    let request = fixture.orchestrator.verify_phc().await.unwrap();
    assert_eq!(request.status_code, 201);
    let url: Url = request.data.proof_url.unwrap().parse().unwrap();
    let invitation = OutOfBandInvitation::from_url(&url).unwrap();
    assert_eq!(
        invitation.messages().next().unwrap().message_type(),
        "https://didcomm.org/present-proof/2.0/request-presentation"
    );

    let (state, verified) =
        proof_snapshot(&fixture.orchestrator, &request.data.proof_record.id).await;
    assert_eq!(state, "request-sent");
    assert_eq!(verified, None);
}

#[tokio::test]
async fn course_credential_round_trip() {
    let fixture = ready().await;
    publish_course(&fixture.agent).await;
    fixture.agent.add_connection("conn-1", None).await;

    let issued = fixture
        .orchestrator
        .issue_course_credential("CS101", "Alice", 87, "conn-1")
        .await
        .unwrap();
    assert_eq!(issued.message, "Credential for CS101 issued successfully");
    assert!(issued.data.credential_url.is_none());
    assert_eq!(
        issued.data.credential_record.connection_id.as_deref(),
        Some("conn-1")
    );
    let offer = fixture
        .agent
        .credential_offer(&issued.data.credential_record.id)
        .await
        .unwrap();
    assert_eq!(offer.comment.as_deref(), Some("Issuing Course Credential"));

    let request = fixture
        .orchestrator
        .verify_course_credential("conn-1", "CS101")
        .await
        .unwrap()
        .data;
    let options = fixture
        .agent
        .proof_request(&request.proof_record.id)
        .await
        .unwrap();
    let predicate = &options.proof_formats.anoncreds.requested_predicates["Validating timestamp"];
    assert_eq!(predicate.p_type, PredicateType::LessOrEqual);

    let timestamp = NOW.to_string();
    assert!(fixture
        .agent
        .present_proof(
            &request.proof_record.id,
            &BTreeMap::from([("Timestamp", timestamp.as_str())]),
        )
        .await
        .unwrap());
}

#[tokio::test]
async fn performance_check_reveals_marks() {
    let fixture = ready().await;
    fixture.agent.add_connection("conn-1", None).await;

    let request = fixture
        .orchestrator
        .check_performance("conn-1")
        .await
        .unwrap()
        .data;
    let options = fixture
        .agent
        .proof_request(&request.proof_record.id)
        .await
        .unwrap();
    let requested = &options.proof_formats.anoncreds.requested_attributes;
    assert_eq!(requested.len(), 2);
    assert_eq!(
        requested["Requesting Marks of Module 1"].restrictions[0].cred_def_id,
        "JM9L6HL2QCexjbn9WB46h9:3:CL:2264790:CS101"
    );
    assert_eq!(
        requested["Requesting Marks of Module 2"].restrictions[0].cred_def_id,
        COURSE_MODULE_2
    );

    fixture
        .agent
        .present_proof(
            &request.proof_record.id,
            &BTreeMap::from([("Marks Scored", "87")]),
        )
        .await
        .unwrap();
    let revealed = fixture
        .orchestrator
        .requested_data(&request.proof_record.id)
        .await
        .unwrap()
        .data
        .requested_proof
        .unwrap();
    assert_eq!(revealed["Requesting Marks of Module 1"], "87");
    assert_eq!(revealed["Requesting Marks of Module 2"], "87");
}

#[tokio::test]
async fn performance_check_needs_configured_modules() {
    let fixture = ready().await;
    let orchestrator = ExchangeOrchestrator::new(fixture.session.clone(), ExchangeConfig::default());
    let err = orchestrator.check_performance("conn-1").await.unwrap_err();
    assert!(matches!(err, ExchangeError::Configuration(_)));
    assert_eq!(
        err.status_code(),
        http::StatusCode::INTERNAL_SERVER_ERROR
    );
}

#[tokio::test]
async fn connection_invitation_polling() {
    let fixture = ready().await;
    let invitation = fixture
        .orchestrator
        .create_connection_invitation()
        .await
        .unwrap();
    assert_eq!(invitation.status_code, 201);
    let out_of_band_id = invitation.data.out_of_band_id;

    let url: Url = invitation.data.invitation_url.parse().unwrap();
    assert_eq!(OutOfBandInvitation::from_url(&url).unwrap().messages().count(), 0);

    let pending = connection_snapshot(&fixture.orchestrator, &out_of_band_id).await;
    assert_eq!(pending.state, None);
    assert_eq!(pending.connection_id, None);

    let connection_id = fixture.agent.accept_invitation(&out_of_band_id).await.unwrap();
    let connected = connection_snapshot(&fixture.orchestrator, &out_of_band_id).await;
    assert_eq!(connected.connection_id, Some(connection_id));
    assert_eq!(connected.state.unwrap().as_str(), "completed");
}

#[tokio::test]
async fn packaging_failure_reports_the_created_exchange() {
    let fixture = ready().await;
    publish_phc(&fixture.agent).await;
    fixture.agent.fail("create_invitation").await;

    let err = fixture.orchestrator.issue_phc("Alice").await.unwrap_err();
    assert!(matches!(err, ExchangeError::Upstream { .. }));
    assert_eq!(err.status_code(), http::StatusCode::BAD_GATEWAY);

    let exchange_id = err.exchange_id().unwrap().to_owned();
    assert_eq!(fixture.agent.credential_count().await, 1);
    assert_eq!(
        credential_state(&fixture.orchestrator, &exchange_id).await,
        "offer-sent"
    );
}

#[derive(Debug)]
struct FixedShortener(Option<&'static str>);

#[async_trait]
impl UrlShortener for FixedShortener {
    async fn shorten(&self, _: &Url) -> anyhow::Result<String> {
        match self.0 {
            Some(short) => Ok(short.to_owned()),
            None => bail!("shortener unavailable"),
        }
    }
}

#[tokio::test]
async fn invitation_urls_are_shortened_best_effort() {
    let fixture = ready().await;
    publish_phc(&fixture.agent).await;
    let config = ExchangeConfig {
        shorten_urls: true,
        ..exchange_config()
    };

    let shortened = ExchangeOrchestrator::new(fixture.session.clone(), config.clone())
        .with_shortener(Arc::new(FixedShortener(Some("https://tinyurl.com/abc123"))));
    let offer = shortened.issue_phc("Alice").await.unwrap();
    assert_eq!(
        offer.data.credential_url.as_deref(),
        Some("https://tinyurl.com/abc123")
    );

    let unavailable = ExchangeOrchestrator::new(fixture.session.clone(), config)
        .with_shortener(Arc::new(FixedShortener(None)));
    let offer = unavailable.issue_phc("Alice").await.unwrap();
    let url: Url = offer.data.credential_url.unwrap().parse().unwrap();
    assert!(OutOfBandInvitation::from_url(&url).is_ok());
}
