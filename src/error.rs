use http::StatusCode;

use crate::agent::RecordNotFound;

/// Errors surfaced by the exchange control plane.
///
/// Collaborators (agent runtime, ledger, shortener) report failures as
/// [anyhow::Error]; those are translated into one of these kinds at the
/// orchestrator boundary, see [UpstreamContext].
#[derive(Debug, thiserror::Error)]
pub enum ExchangeError {
    /// The agent was accessed before it was initialized.
    #[error("agent is not initialized")]
    NotInitialized,

    /// A live agent already exists.
    #[error("{0}")]
    Conflict(String),

    /// A credential definition or exchange record could not be found.
    #[error("{0}")]
    NotFound(String),

    /// Required configuration is missing or invalid.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A call into the agent runtime, ledger or another collaborator failed.
    ///
    /// `exchange_id` is set when the runtime had already created an exchange
    /// record before the failure, so the caller can still reference it.
    #[error("{context}: {source:#}")]
    Upstream {
        context: String,
        exchange_id: Option<String>,
        #[source]
        source: anyhow::Error,
    },

    /// Malformed caller input.
    #[error("invalid input: {0}")]
    Validation(String),
}

pub type ExchangeResult<T> = Result<T, ExchangeError>;

impl ExchangeError {
    /// The HTTP status a transport layer should answer with.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ExchangeError::NotInitialized => StatusCode::BAD_REQUEST,
            ExchangeError::Conflict(_) => StatusCode::CONFLICT,
            ExchangeError::NotFound(_) => StatusCode::NOT_FOUND,
            ExchangeError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ExchangeError::Upstream { .. } => StatusCode::BAD_GATEWAY,
            ExchangeError::Validation(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Id of an exchange record left behind by a partially completed operation.
    pub fn exchange_id(&self) -> Option<&str> {
        match self {
            ExchangeError::Upstream { exchange_id, .. } => exchange_id.as_deref(),
            _ => None,
        }
    }

    pub(crate) fn with_exchange_id(self, id: &str) -> Self {
        match self {
            ExchangeError::Upstream {
                context, source, ..
            } => ExchangeError::Upstream {
                context,
                exchange_id: Some(id.to_owned()),
                source,
            },
            other => other,
        }
    }
}

/// Annotate a collaborator failure with the operation that triggered it.
pub trait UpstreamContext<T> {
    fn upstream(self, context: impl Into<String>) -> ExchangeResult<T>;
}

impl<T> UpstreamContext<T> for anyhow::Result<T> {
    fn upstream(self, context: impl Into<String>) -> ExchangeResult<T> {
        self.map_err(|source| {
            let context = context.into();
            match source.downcast_ref::<RecordNotFound>() {
                Some(missing) => ExchangeError::NotFound(format!("{context}: {missing}")),
                None => ExchangeError::Upstream {
                    context,
                    exchange_id: None,
                    source,
                },
            }
        })
    }
}
