use aws_credential_types::provider::error::CredentialsError as SdkCredentialsError;

/// Errors resolving AWS credentials for a poll cycle.
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("AWS config has no credentials provider")]
    MissingProvider,
    #[error("failed loading ambient AWS credentials")]
    Ambient(#[source] SdkCredentialsError),
    #[error("failed assuming AWS role `{role}`")]
    AssumeRole {
        role: String,
        #[source]
        source: SdkCredentialsError,
    },
}

/// Errors aborting a single poll cycle. None of them are fatal; the next cycle retries from scratch.
#[derive(Debug, thiserror::Error)]
pub enum PollError {
    #[error(transparent)]
    Credentials(#[from] CredentialError),
    #[error("DMS API call `{operation}` failed")]
    Api {
        operation: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

impl PollError {
    pub(crate) fn api(
        operation: &'static str,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Api {
            operation,
            source: source.into(),
        }
    }
}
