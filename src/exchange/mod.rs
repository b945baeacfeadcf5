//! Credential issuance and proof verification over out-of-band invitations.
//!
//! [ExchangeOrchestrator] is the entry point. It resolves credential
//! definitions through the [registry](registry::CredentialDefinitionRegistry),
//! builds offers and proof requests, packages connectionless ones into
//! invitations and reads exchange state back through the
//! [tracker](tracker::ExchangeStateTracker).

pub mod catalog;
pub mod invitation;
pub mod offer_builder;
pub mod orchestrator;
pub mod registry;
pub mod request_builder;
pub mod tracker;

pub use orchestrator::{
    ConnectionInvitation, CredentialExchange, ExchangeOrchestrator, ProofExchange, RequestedData,
};
pub use tracker::{RecordKind, StateSnapshot};
