//! DNS lookups used by the email verifier.

use std::time::Duration;

use async_trait::async_trait;
use hickory_resolver::TokioAsyncResolver;
use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::error::{ResolveError, ResolveErrorKind};
use tracing::debug;

use crate::error::VerificationInfraError;

/// Address and MX lookups.
///
/// `Ok(false)` / `Ok(vec![])` mean the records do not exist. `Err` means the
/// lookup itself could not be completed.
#[async_trait]
pub trait DnsResolver: Send + Sync {
    /// Whether the domain has an A or AAAA record.
    async fn has_address(&self, domain: &str) -> Result<bool, VerificationInfraError>;

    /// MX exchange hosts, most preferred first.
    async fn mx_hosts(&self, domain: &str) -> Result<Vec<String>, VerificationInfraError>;
}

/// [`DnsResolver`] backed by hickory's tokio resolver.
pub struct HickoryDns {
    resolver: TokioAsyncResolver,
    timeout: Duration,
}

impl HickoryDns {
    /// Resolver using the public default upstream with a per-lookup timeout.
    pub fn new(timeout: Duration) -> Self {
        let mut opts = ResolverOpts::default();
        opts.timeout = timeout;
        opts.attempts = 1;
        Self {
            resolver: TokioAsyncResolver::tokio(ResolverConfig::default(), opts),
            timeout,
        }
    }
}

impl std::fmt::Debug for HickoryDns {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HickoryDns")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

fn is_no_records(err: &ResolveError) -> bool {
    matches!(err.kind(), ResolveErrorKind::NoRecordsFound { .. })
}

#[async_trait]
impl DnsResolver for HickoryDns {
    async fn has_address(&self, domain: &str) -> Result<bool, VerificationInfraError> {
        let fqdn = format!("{}.", domain.trim_end_matches('.'));
        // hickory's own timeout covers each query, not the whole lookup
        match tokio::time::timeout(self.timeout * 2, self.resolver.lookup_ip(fqdn.as_str())).await {
            Ok(Ok(lookup)) => Ok(lookup.iter().next().is_some()),
            Ok(Err(e)) if is_no_records(&e) => Ok(false),
            Ok(Err(e)) => Err(VerificationInfraError::Dns(format!("{domain}: {e}"))),
            Err(_) => Err(VerificationInfraError::Timeout(format!("address lookup for {domain}"))),
        }
    }

    async fn mx_hosts(&self, domain: &str) -> Result<Vec<String>, VerificationInfraError> {
        let fqdn = format!("{}.", domain.trim_end_matches('.'));
        let lookup = match tokio::time::timeout(self.timeout * 2, self.resolver.mx_lookup(fqdn.as_str())).await {
            Ok(Ok(lookup)) => lookup,
            Ok(Err(e)) if is_no_records(&e) => return Ok(Vec::new()),
            Ok(Err(e)) => return Err(VerificationInfraError::Dns(format!("{domain}: {e}"))),
            Err(_) => {
                return Err(VerificationInfraError::Timeout(format!("MX lookup for {domain}")));
            }
        };

        let mut records: Vec<(u16, String)> = lookup
            .iter()
            .map(|mx| {
                let host = mx.exchange().to_utf8();
                (mx.preference(), host.trim_end_matches('.').to_string())
            })
            // A null MX ("." per RFC 7505) means the domain accepts no mail
            .filter(|(_, host)| !host.is_empty())
            .collect();
        records.sort();
        debug!(domain, mx = ?records, "MX records");

        Ok(records.into_iter().map(|(_, host)| host).collect())
    }
}
