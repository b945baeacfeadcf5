//! The portal's fixed credential flows: personhood credentials, student access
//! cards and course credentials.

use rand::Rng;

use crate::{
    core::{
        attributes::{AttributeSet, CredentialAttribute},
        envelope::ServiceResponse,
        proof_request::{PredicateSpec, PredicateType, RequestedAttributeSpec},
    },
    error::{ExchangeError, ExchangeResult},
};

use super::{
    offer_builder::expiry,
    orchestrator::{CredentialExchange, ExchangeOrchestrator, ProofExchange},
    registry::CredentialDefinitionRegistry,
    request_builder::PredicateRequestBuilder,
};

pub const PHC_TAG: &str = "PHC Credential";
pub const STUDENT_ACCESS_CARD_TAG: &str = "Student Access Card";

const NAME: &str = "Name";
const ISSUED_BY: &str = "Issued By";
const EXPIRY: &str = "Expiry";
const ID: &str = "ID";
const MARKS_SCORED: &str = "Marks Scored";
const TIMESTAMP: &str = "Timestamp";

const EXPIRATION_REFERENT: &str = "Validating expiration";
const TIMESTAMP_REFERENT: &str = "Validating timestamp";

const OOB_OFFER_CREATED: &str = "Credential offer created successfully (OOB)";
const OOB_REQUEST_CREATED: &str = "Proof request initiated successfully (OOB)";

fn attribute_set(attributes: Vec<CredentialAttribute>) -> ExchangeResult<AttributeSet> {
    AttributeSet::new(attributes).map_err(|e| ExchangeError::Validation(e.to_string()))
}

fn invalid(e: anyhow::Error) -> ExchangeError {
    ExchangeError::Validation(format!("{e:#}"))
}

impl ExchangeOrchestrator {
    /// Personhood credential, delivered connectionless.
    pub async fn issue_phc(&self, name: &str) -> ExchangeResult<ServiceResponse<CredentialExchange>> {
        let attributes = attribute_set(vec![
            CredentialAttribute::text(NAME, name),
            CredentialAttribute::text(ISSUED_BY, &self.config().issuer_name),
            CredentialAttribute::text(EXPIRY, self.fresh_until()?.to_string()),
        ])?;
        let exchange = self.issue_by_tag(PHC_TAG, attributes, None, None).await?;
        Ok(ServiceResponse::created(OOB_OFFER_CREATED, exchange))
    }

    /// Student access card with a random four digit ID, delivered connectionless.
    pub async fn issue_student_access_card(
        &self,
        name: &str,
    ) -> ExchangeResult<ServiceResponse<CredentialExchange>> {
        let card_id: u16 = rand::thread_rng().gen_range(1000..10000);
        let attributes = attribute_set(vec![
            CredentialAttribute::text(NAME, name),
            CredentialAttribute::text(ID, card_id.to_string()),
            CredentialAttribute::text(EXPIRY, self.fresh_until()?.to_string()),
        ])?;
        let exchange = self
            .issue_by_tag(STUDENT_ACCESS_CARD_TAG, attributes, None, None)
            .await?;
        Ok(ServiceResponse::created(OOB_OFFER_CREATED, exchange))
    }

    /// Course credential stamped with the issuance time, sent over `connection_id`.
    pub async fn issue_course_credential(
        &self,
        course_tag: &str,
        name: &str,
        marks: u32,
        connection_id: &str,
    ) -> ExchangeResult<ServiceResponse<CredentialExchange>> {
        let attributes = attribute_set(vec![
            CredentialAttribute::text(NAME, name),
            CredentialAttribute::text(MARKS_SCORED, marks.to_string()),
            CredentialAttribute::text(TIMESTAMP, self.now().to_string()),
        ])?;
        let exchange = self
            .issue_by_tag(
                course_tag,
                attributes,
                Some(connection_id.to_owned()),
                Some("Issuing Course Credential"),
            )
            .await?;
        Ok(ServiceResponse::created(
            format!("Credential for {course_tag} issued successfully"),
            exchange,
        ))
    }

    /// Connectionless proof that a personhood credential has not expired.
    pub async fn verify_phc(&self) -> ExchangeResult<ServiceResponse<ProofExchange>> {
        let exchange = self
            .verify_predicate(
                PHC_TAG,
                "Validating PHC",
                EXPIRATION_REFERENT,
                EXPIRY,
                PredicateType::Greater,
                None,
            )
            .await?;
        Ok(ServiceResponse::created(OOB_REQUEST_CREATED, exchange))
    }

    /// Proof over `connection_id` that a student access card has not expired.
    pub async fn verify_student_access_card(
        &self,
        connection_id: &str,
    ) -> ExchangeResult<ServiceResponse<ProofExchange>> {
        let exchange = self
            .verify_predicate(
                STUDENT_ACCESS_CARD_TAG,
                "Validating Student Access Card",
                EXPIRATION_REFERENT,
                EXPIRY,
                PredicateType::Greater,
                Some(connection_id),
            )
            .await?;
        Ok(ServiceResponse::created(
            "Proof request initiated successfully",
            exchange,
        ))
    }

    /// Proof over `connection_id` that a course credential was issued in the past.
    pub async fn verify_course_credential(
        &self,
        connection_id: &str,
        course_tag: &str,
    ) -> ExchangeResult<ServiceResponse<ProofExchange>> {
        let exchange = self
            .verify_predicate(
                course_tag,
                &format!("Validating {course_tag} Credential"),
                TIMESTAMP_REFERENT,
                TIMESTAMP,
                PredicateType::LessOrEqual,
                Some(connection_id),
            )
            .await?;
        Ok(ServiceResponse::created(
            format!("Proof request for {course_tag} initiated successfully"),
            exchange,
        ))
    }

    /// Ask the holder on `connection_id` to reveal the marks of every configured course module.
    pub async fn check_performance(
        &self,
        connection_id: &str,
    ) -> ExchangeResult<ServiceResponse<ProofExchange>> {
        let runtime = self.runtime().await?;
        let modules = &self.config().performance_modules;
        if modules.is_empty() {
            return Err(ExchangeError::Configuration(
                "no course modules are configured for the performance check".into(),
            ));
        }

        let mut builder = PredicateRequestBuilder::new(runtime.as_ref(), "Requesting Marks")
            .over_connection(Some(connection_id.to_owned()));
        for module in modules {
            builder = builder.with_requested_attribute(
                RequestedAttributeSpec::new(
                    format!("Requesting Marks of {}", module.label),
                    MARKS_SCORED,
                    &module.credential_definition_id,
                )
                .map_err(|e| ExchangeError::Configuration(format!("{e:#}")))?,
            );
        }

        let exchange = self.dispatch_request(runtime.as_ref(), builder).await?;
        Ok(ServiceResponse::created("Proof requested successfully!", exchange))
    }

    fn fresh_until(&self) -> ExchangeResult<i64> {
        expiry(self.clock(), self.config().freshness_window())
    }

    async fn issue_by_tag(
        &self,
        tag: &str,
        attributes: AttributeSet,
        connection_id: Option<String>,
        comment: Option<&str>,
    ) -> ExchangeResult<CredentialExchange> {
        let runtime = self.runtime().await?;
        let definition = CredentialDefinitionRegistry::new(runtime.as_ref())
            .get_by_tag(tag)
            .await?;
        self.offer(runtime.as_ref(), &definition, attributes, connection_id, comment)
            .await
    }

    /// Request a single predicate comparing `attribute` with the current time.
    async fn verify_predicate(
        &self,
        tag: &str,
        request_name: &str,
        referent: &str,
        attribute: &str,
        p_type: PredicateType,
        connection_id: Option<&str>,
    ) -> ExchangeResult<ProofExchange> {
        let runtime = self.runtime().await?;
        let definition = CredentialDefinitionRegistry::new(runtime.as_ref())
            .get_by_tag(tag)
            .await?;
        let predicate = PredicateSpec::new(
            referent,
            attribute,
            p_type,
            self.now(),
            &definition.credential_definition_id,
        )
        .map_err(invalid)?;

        let mut builder = PredicateRequestBuilder::new(runtime.as_ref(), request_name)
            .with_predicate(predicate)
            .over_connection(connection_id.map(ToOwned::to_owned));
        if connection_id.is_some() {
            builder = builder.with_comment(format!("Verifying {tag} Credential"));
        }
        self.dispatch_request(runtime.as_ref(), builder).await
    }
}
