pub mod attributes;
pub mod credential_definition;
pub mod envelope;
pub mod message;
pub mod options;
pub mod out_of_band;
pub mod presentation;
pub mod proof_request;
pub mod record;
pub mod util;
