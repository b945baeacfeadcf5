//! This library orchestrates AnonCreds credential issuance and proof
//! verification over [DIDComm out-of-band invitations].
//!
//! [DIDComm out-of-band invitations]: <https://github.com/hyperledger/aries-rfcs/tree/main/features/0434-outofband>
//!
//! # Usage
//!
//! An [`AgentSession`] owns the single agent of the process. It is created
//! uninitialized and launched once with a wallet seed and an Indy network;
//! the [`ExchangeOrchestrator`] drives every exchange through it:
//!
//! ```ignore
//! use std::sync::Arc;
//!
//! use ssi_exchange::agent::session::AgentSession;
//! use ssi_exchange::config::{AgentEnvironment, Config};
//! use ssi_exchange::core::util::ReqwestClient;
//! use ssi_exchange::exchange::{ExchangeOrchestrator, RecordKind};
//! use ssi_exchange::ledger::{DidRegistration, HttpNymRegistrar};
//! use ssi_exchange::shortener::TinyUrlShortener;
//!
//! let config = Config::default();
//! let http = Arc::new(ReqwestClient::new()?);
//!
//! // The launcher starts the actual agent runtime.
//! let session = Arc::new(AgentSession::new(
//!     AgentEnvironment::from_env()?,
//!     launcher,
//!     DidRegistration::new(
//!         Arc::new(HttpNymRegistrar::new(http.clone(), config.ledger.clone())),
//!         config.ledger.alias.clone(),
//!     ),
//! ));
//! session.initialize(seed, "bcovrin:testnet").await?;
//!
//! let orchestrator = ExchangeOrchestrator::new(session, config.exchange)
//!     .with_shortener(Arc::new(TinyUrlShortener::new(http)?));
//!
//! // Offer a credential through a single-use invitation.
//! let offer = orchestrator.issue_student_access_card("Alice").await?;
//! let record_id = offer.data.credential_record.id;
//! show_qr_code(offer.data.credential_url);
//!
//! // Poll until the holder has accepted.
//! let state = orchestrator.poll_state(RecordKind::Credential, &record_id).await?;
//! ```
//!
//! The agent runtime is reached through the traits in [`agent`]. An in-memory
//! implementation, [`MemoryAgent`], is provided for tests.
//!
//! [`AgentSession`]: crate::agent::session::AgentSession
//! [`ExchangeOrchestrator`]: crate::exchange::ExchangeOrchestrator
//! [`MemoryAgent`]: crate::agent::memory::MemoryAgent
//!
//! # Protocol Overview
//!
//! ## Issuance
//!
//! 1. *Definition lookup*: the credential definition is resolved by tag through
//!    the [`CredentialDefinitionRegistry`].
//! 2. *Offer*: the [`OfferBuilder`] checks the attributes against the
//!    definition's schema and has the runtime create the offer.
//! 3. *Delivery*: connectionless offers are wrapped into an invitation by the
//!    [`InvitationPackager`]; connection-bound ones are sent directly.
//!
//! ## Verification
//!
//! 4. *Request*: the [`PredicateRequestBuilder`] builds a presentation request
//!    of predicates and revealed attributes, each restricted to one credential
//!    definition.
//! 5. *Delivery*: as for issuance.
//!
//! ## State
//!
//! 6. *Polling*: callers read connection, credential and proof state through
//!    the [`ExchangeStateTracker`] until `done` or `abandoned`.
//!
//! [`CredentialDefinitionRegistry`]: crate::exchange::registry::CredentialDefinitionRegistry
//! [`OfferBuilder`]: crate::exchange::offer_builder::OfferBuilder
//! [`InvitationPackager`]: crate::exchange::invitation::InvitationPackager
//! [`PredicateRequestBuilder`]: crate::exchange::request_builder::PredicateRequestBuilder
//! [`ExchangeStateTracker`]: crate::exchange::tracker::ExchangeStateTracker

pub mod agent;
pub mod config;
pub mod core;
pub mod error;
pub mod exchange;
pub mod ledger;
pub mod shortener;
pub mod utils;
