//! Resolution of AWS credentials, optionally assuming a role.

use std::time::{Duration, Instant, SystemTime};

use aws_config::{
    sts::AssumeRoleProvider, timeout::TimeoutConfig, BehaviorVersion, Region, SdkConfig,
};
use aws_credential_types::{
    provider::{self, future, ProvideCredentials, SharedCredentialsProvider},
    Credentials,
};
use dms_exporter_config::ExporterConfig;
use tokio::sync::Mutex;

use crate::errors::CredentialError;

/// Credentials expiring sooner than this are refreshed.
const EXPIRY_BUFFER: Duration = Duration::from_secs(5 * 60);
/// Credentials without an expiry (env / profile) are re-read after this age, so that rotated keys are picked up.
const MAX_CREDENTIALS_AGE: Duration = Duration::from_secs(15 * 60);

/// Settings of role assumption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssumedRole {
    pub role_arn: String,
    pub session_name: String,
}

#[derive(Debug, Clone)]
struct CachedCredentials {
    credentials: Credentials,
    fetched_at: Instant,
}

impl CachedCredentials {
    fn is_fresh(&self) -> bool {
        match self.credentials.expiry() {
            Some(expiry) => expiry > SystemTime::now() + EXPIRY_BUFFER,
            None => self.fetched_at.elapsed() < MAX_CREDENTIALS_AGE,
        }
    }
}

/// Provider returning the last fetched credentials of the wrapped provider until they are about to expire.
#[derive(Debug)]
struct CachingProvider {
    inner: SharedCredentialsProvider,
    cached: Mutex<Option<CachedCredentials>>,
}

impl CachingProvider {
    fn shared(inner: SharedCredentialsProvider) -> SharedCredentialsProvider {
        SharedCredentialsProvider::new(Self {
            inner,
            cached: Mutex::new(None),
        })
    }

    async fn credentials(&self) -> provider::Result {
        let mut cached = self.cached.lock().await;
        if let Some(entry) = cached.as_ref().filter(|entry| entry.is_fresh()) {
            return Ok(entry.credentials.clone());
        }

        let credentials = self.inner.provide_credentials().await?;
        *cached = Some(CachedCredentials {
            credentials: credentials.clone(),
            fetched_at: Instant::now(),
        });
        Ok(credentials)
    }
}

impl ProvideCredentials for CachingProvider {
    fn provide_credentials<'a>(&'a self) -> future::ProvideCredentials<'a>
    where
        Self: 'a,
    {
        future::ProvideCredentials::new(self.credentials())
    }
}

/// Config with caching credential providers, reused across poll cycles.
#[derive(Debug, Clone)]
struct ResolvedConfig {
    config: SdkConfig,
    ambient_provider: SharedCredentialsProvider,
    role_provider: Option<(String, SharedCredentialsProvider)>,
}

impl ResolvedConfig {
    async fn verify(&self) -> Result<(), CredentialError> {
        self.ambient_provider
            .provide_credentials()
            .await
            .map_err(CredentialError::Ambient)?;
        if let Some((role, provider)) = &self.role_provider {
            provider
                .provide_credentials()
                .await
                .map_err(|source| CredentialError::AssumeRole {
                    role: role.clone(),
                    source,
                })?;
        }
        Ok(())
    }
}

/// Produces [`SdkConfig`]s with verified credentials.
///
/// The config is built once and shared by all poll cycles; credentials (ambient and assumed) are cached
/// until they are about to expire, so an STS call is only made when temporary credentials need a refresh.
/// If credentials cannot be obtained, the cached config is dropped and rebuilt on the next call,
/// which re-reads the ambient provider chain.
#[derive(Debug)]
pub struct CredentialResolver {
    region: Region,
    assumed_role: Option<AssumedRole>,
    operation_timeout: Duration,
    endpoint_url: Option<String>,
    base_provider: Option<SharedCredentialsProvider>,
    resolved: Mutex<Option<ResolvedConfig>>,
}

impl CredentialResolver {
    pub fn new(region: impl Into<String>, operation_timeout: Duration) -> Self {
        Self {
            region: Region::new(region.into()),
            assumed_role: None,
            operation_timeout,
            endpoint_url: None,
            base_provider: None,
            resolved: Mutex::new(None),
        }
    }

    pub fn from_config(config: &ExporterConfig) -> Self {
        let mut resolver = Self::new(config.region.clone(), config.api_timeout());
        if let Some(role_arn) = config.role() {
            resolver = resolver.with_assumed_role(AssumedRole {
                role_arn: role_arn.to_owned(),
                session_name: config.role_session_name.clone(),
            });
        }
        if let Some(endpoint_url) = config.endpoint_url() {
            resolver = resolver.with_endpoint_url(endpoint_url);
        }
        resolver
    }

    #[must_use]
    pub fn with_assumed_role(mut self, assumed_role: AssumedRole) -> Self {
        self.assumed_role = Some(assumed_role);
        self
    }

    /// Overrides the endpoint of all AWS services (DMS and STS), e.g. to point to a local emulator.
    #[must_use]
    pub fn with_endpoint_url(mut self, endpoint_url: impl Into<String>) -> Self {
        self.endpoint_url = Some(endpoint_url.into());
        self
    }

    /// Replaces the default provider chain as the source of ambient credentials.
    #[must_use]
    pub fn with_base_provider(mut self, provider: impl ProvideCredentials + 'static) -> Self {
        self.base_provider = Some(SharedCredentialsProvider::new(provider));
        self
    }

    pub fn region(&self) -> &Region {
        &self.region
    }

    pub fn assumed_role(&self) -> Option<&AssumedRole> {
        self.assumed_role.as_ref()
    }

    /// Returns the shared config after checking that credentials can actually be obtained with it.
    pub async fn resolve(&self) -> Result<SdkConfig, CredentialError> {
        let mut resolved = self.resolved.lock().await;
        let current = match &*resolved {
            Some(current) => current.clone(),
            None => {
                let built = self.build().await?;
                *resolved = Some(built.clone());
                built
            }
        };

        if let Err(err) = current.verify().await {
            *resolved = None;
            return Err(err);
        }
        Ok(current.config)
    }

    async fn build(&self) -> Result<ResolvedConfig, CredentialError> {
        let timeout_config = TimeoutConfig::builder()
            .operation_timeout(self.operation_timeout)
            .build();
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(self.region.clone())
            .timeout_config(timeout_config);
        if let Some(endpoint_url) = &self.endpoint_url {
            loader = loader.endpoint_url(endpoint_url);
        }
        if let Some(provider) = &self.base_provider {
            loader = loader.credentials_provider(provider.clone());
        }
        let loaded = loader.load().await;

        let ambient_provider = CachingProvider::shared(
            loaded
                .credentials_provider()
                .ok_or(CredentialError::MissingProvider)?,
        );
        let ambient_config = loaded
            .into_builder()
            .credentials_provider(ambient_provider.clone())
            .build();

        let Some(assumed_role) = &self.assumed_role else {
            return Ok(ResolvedConfig {
                config: ambient_config,
                ambient_provider,
                role_provider: None,
            });
        };

        tracing::debug!(
            role = %assumed_role.role_arn,
            session = %assumed_role.session_name,
            "Configuring AWS role assumption"
        );
        let role_provider = AssumeRoleProvider::builder(&assumed_role.role_arn)
            .session_name(&assumed_role.session_name)
            .region(self.region.clone())
            .configure(&ambient_config)
            .build()
            .await;
        let role_provider = CachingProvider::shared(SharedCredentialsProvider::new(role_provider));
        Ok(ResolvedConfig {
            config: ambient_config
                .into_builder()
                .credentials_provider(role_provider.clone())
                .build(),
            ambient_provider,
            role_provider: Some((assumed_role.role_arn.clone(), role_provider)),
        })
    }
}
