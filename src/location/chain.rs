//! Ordered fallback over providers, plus the startup join rule between the
//! full lookup and the fast IP-only seed.

use super::model::LocationRecord;
use super::normalize::normalize_ip_only;
use super::providers::Provider;
use crate::error::ChainError;
use reqwest::Client;
use std::fmt::Display;
use std::future::Future;
use tracing::{debug, error, info, warn};

pub const GEO_LOOKUP_FAILED: &str = "IP LOOKUP FAILED";
pub const PUBLIC_IP_FAILED: &str = "PUBLIC IP FAILED";

/// Tries `attempt` on each provider in order and returns the first success.
///
/// Providers are awaited one at a time; nothing after the winning provider is
/// started. When every attempt fails, the reasons are returned in order.
pub async fn first_success<'a, P, T, E, F, Fut>(
    label: &'static str,
    providers: &'a [P],
    mut attempt: F,
) -> Result<T, ChainError>
where
    F: FnMut(&'a P) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let mut attempts = Vec::with_capacity(providers.len());

    for (index, provider) in providers.iter().enumerate() {
        debug!(chain = label, index, "trying provider");
        match attempt(provider).await {
            Ok(value) => {
                debug!(chain = label, index, "provider succeeded");
                return Ok(value);
            }
            Err(reason) => {
                warn!(chain = label, index, "provider failed: {}", reason);
                attempts.push(reason.to_string());
            }
        }
    }

    Err(ChainError::Exhausted { label, attempts })
}

/// Full geolocation lookup across `providers`.
pub async fn fetch_ip_data(
    http: &Client,
    providers: &[Provider],
) -> Result<LocationRecord, ChainError> {
    let record = first_success(GEO_LOOKUP_FAILED, providers, |p| p.fetch_location(http)).await?;
    info!("Geolocation resolved for {}", record.ip);
    Ok(record)
}

/// Address-only lookup across `providers`.
pub async fn fetch_public_ip_only(
    http: &Client,
    providers: &[Provider],
) -> Result<String, ChainError> {
    first_success(PUBLIC_IP_FAILED, providers, |p| p.fetch_ip(http)).await
}

/// What the dashboard ends up showing for the session.
#[derive(Debug, Clone, PartialEq)]
pub enum LookupOutcome {
    Full(LocationRecord),
    /// The full chain failed but the seed lookup had an address.
    IpOnly { record: LocationRecord, error: String },
    Unavailable { error: String },
}

impl LookupOutcome {
    pub fn record(&self) -> Option<&LocationRecord> {
        match self {
            LookupOutcome::Full(record) | LookupOutcome::IpOnly { record, .. } => Some(record),
            LookupOutcome::Unavailable { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            LookupOutcome::Full(_) => None,
            LookupOutcome::IpOnly { error, .. } | LookupOutcome::Unavailable { error } => Some(error),
        }
    }
}

/// Waits for the full lookup and only falls back to `seed` if it failed.
///
/// `seed` should wrap an already-running task so the IP-only lookup is never
/// issued twice; it is not polled at all when the full lookup succeeds.
pub async fn resolve_location<Full, Seed>(full: Full, seed: Seed) -> LookupOutcome
where
    Full: Future<Output = Result<LocationRecord, ChainError>>,
    Seed: Future<Output = Option<String>>,
{
    let err = match full.await {
        Ok(record) => return LookupOutcome::Full(record),
        Err(err) => err,
    };
    error!("{}", err);

    match seed.await {
        Some(ip) => {
            info!("Falling back to IP-only record for {}", ip);
            LookupOutcome::IpOnly {
                record: normalize_ip_only(&ip),
                error: err.to_string(),
            }
        }
        None => LookupOutcome::Unavailable {
            error: err.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::model::IpType;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn stops_at_first_success() {
        let calls = AtomicUsize::new(0);
        let providers = [1, 2, 3, 4];

        let result = first_success("TEST", &providers, |n: &u32| {
            calls.fetch_add(1, Ordering::SeqCst);
            let n = *n;
            async move {
                if n < 3 {
                    Err(format!("P{n} DOWN"))
                } else {
                    Ok(n * 10)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 30);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhaustion_collects_reasons_in_order() {
        let providers = ["A", "B"];
        let err = first_success("ALL DOWN", &providers, |p: &&str| {
            let p = *p;
            async move { Err::<(), _>(format!("{p} HTTP 500")) }
        })
        .await
        .unwrap_err();

        assert_eq!(err.to_string(), "ALL DOWN / A HTTP 500 / B HTTP 500");
        assert_eq!(err.attempts(), ["A HTTP 500", "B HTTP 500"]);
    }

    fn exhausted() -> ChainError {
        ChainError::Exhausted {
            label: GEO_LOOKUP_FAILED,
            attempts: vec!["IPWHO.IS HTTP 503".into()],
        }
    }

    #[tokio::test]
    async fn full_success_never_polls_seed() {
        let polled = Arc::new(AtomicUsize::new(0));
        let seed_polled = polled.clone();
        let record = normalize_ip_only("198.51.100.1");

        let outcome = resolve_location(async { Ok(record.clone()) }, async move {
            seed_polled.fetch_add(1, Ordering::SeqCst);
            Some("203.0.113.9".to_string())
        })
        .await;

        assert_eq!(outcome, LookupOutcome::Full(record));
        assert_eq!(polled.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failed_chain_falls_back_to_running_seed_task() {
        let spawned = Arc::new(AtomicUsize::new(0));
        let counter = spawned.clone();
        let seed = tokio::spawn(async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Some("2001:db8::42".to_string())
        });

        let outcome = resolve_location(async { Err(exhausted()) }, async move {
            seed.await.ok().flatten()
        })
        .await;

        let record = outcome.record().unwrap();
        assert_eq!(record.ip, "2001:db8::42");
        assert_eq!(record.ip_type, Some(IpType::V6));
        assert_eq!(record.country, None);
        assert_eq!(outcome.error(), Some("IP LOOKUP FAILED / IPWHO.IS HTTP 503"));
        assert_eq!(spawned.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn no_seed_means_unavailable() {
        let outcome = resolve_location(async { Err(exhausted()) }, async { None }).await;
        assert!(outcome.record().is_none());
        assert!(matches!(outcome, LookupOutcome::Unavailable { .. }));
    }
}
