use async_trait::async_trait;
use hickory_resolver::{
    config::{ResolverConfig, ResolverOpts},
    error::ResolveErrorKind,
    TokioAsyncResolver,
};
use std::time::Duration;
use tracing::warn;

use crate::error::ApiError;

/// Everything after the first `@`, or `None` when there is no `@` or the
/// domain part is empty.
pub(crate) fn domain_part(email: &str) -> Option<&str> {
    match email.split_once('@') {
        Some((_, domain)) if !domain.is_empty() => Some(domain),
        _ => None,
    }
}

/// Checks whether an email's domain can receive mail. MX presence is a
/// heuristic for "domain exists", nothing more.
#[async_trait]
pub trait DomainVerifier: Send + Sync {
    /// `Ok(false)` for anything that definitively rules the domain out,
    /// including resolver failures; only a timed-out lookup is an error.
    async fn is_valid_domain(&self, email: &str) -> Result<bool, ApiError>;
}

/// Live MX lookups against the system resolver configuration.
pub struct MxResolver {
    resolver: TokioAsyncResolver,
}

impl MxResolver {
    pub fn new(timeout: Duration) -> Self {
        let mut opts = ResolverOpts::default();
        opts.timeout = timeout;
        opts.attempts = 1;
        Self {
            resolver: TokioAsyncResolver::tokio(ResolverConfig::default(), opts),
        }
    }
}

#[async_trait]
impl DomainVerifier for MxResolver {
    async fn is_valid_domain(&self, email: &str) -> Result<bool, ApiError> {
        let Some(domain) = domain_part(email) else {
            return Ok(false);
        };

        match self.resolver.mx_lookup(domain).await {
            Ok(lookup) => Ok(lookup.iter().next().is_some()),
            Err(err) => match err.kind() {
                ResolveErrorKind::NoRecordsFound { .. } => Ok(false),
                ResolveErrorKind::Timeout => Err(ApiError::UpstreamTimeout("dns")),
                _ => {
                    warn!(domain, error = %err, "mx lookup failed");
                    Ok(false)
                }
            },
        }
    }
}

/// Verifier with a fixed answer, for tests and offline runs.
pub struct StaticVerifier(pub bool);

#[async_trait]
impl DomainVerifier for StaticVerifier {
    async fn is_valid_domain(&self, _email: &str) -> Result<bool, ApiError> {
        Ok(self.0)
    }
}
