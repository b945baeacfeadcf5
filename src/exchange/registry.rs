use tracing::debug;

use crate::{
    agent::AgentRuntime,
    core::credential_definition::{CredentialDefinitionRecord, CredentialSchema},
    error::{ExchangeError, ExchangeResult, UpstreamContext},
    utils::NonEmptyVec,
};

/// Read-only view of the credential definitions the agent has published.
///
/// Tags are not unique on the ledger. [CredentialDefinitionRegistry::get_by_tag]
/// returns the first match in the runtime's enumeration order.
#[derive(Debug, Clone, Copy)]
pub struct CredentialDefinitionRegistry<'a> {
    runtime: &'a dyn AgentRuntime,
}

impl<'a> CredentialDefinitionRegistry<'a> {
    pub fn new(runtime: &'a dyn AgentRuntime) -> Self {
        Self { runtime }
    }

    pub async fn get_all(&self) -> ExchangeResult<NonEmptyVec<CredentialDefinitionRecord>> {
        let definitions = self
            .runtime
            .anoncreds()
            .get_created_credential_definitions()
            .await
            .upstream("failed to enumerate credential definitions")?;

        NonEmptyVec::maybe_new(definitions)
            .ok_or_else(|| ExchangeError::NotFound("no credential definitions found".into()))
    }

    pub async fn get_by_tag(&self, tag: &str) -> ExchangeResult<CredentialDefinitionRecord> {
        let definition = self
            .get_all()
            .await?
            .into_inner()
            .into_iter()
            .find(|definition| definition.tag() == tag)
            .ok_or_else(|| {
                ExchangeError::NotFound(format!(
                    "credential definition with tag '{tag}' not found"
                ))
            })?;

        debug!(
            "resolved tag '{tag}' to {}",
            definition.credential_definition_id
        );
        Ok(definition)
    }

    /// The schema `definition` was created from.
    pub async fn schema_for(
        &self,
        definition: &CredentialDefinitionRecord,
    ) -> ExchangeResult<CredentialSchema> {
        self.runtime
            .anoncreds()
            .get_schema(definition.schema_id())
            .await
            .upstream(format!(
                "failed to fetch schema of {}",
                definition.credential_definition_id
            ))
    }
}
