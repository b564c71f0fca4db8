//! Error types shared by the lookup chains and the speed probe.
//!
//! The `Display` output of [`ProviderError`] is what lands in a chain's
//! attempt log, so each message is kept short and prefixed with the
//! provider label (e.g. `IPWHO.IS HTTP 503`).

use thiserror::Error;

/// Why a single provider attempt was rejected.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// The request never produced a response (DNS, connect, TLS, timeout).
    #[error("{provider} {source}")]
    Transport {
        provider: &'static str,
        #[source]
        source: reqwest::Error,
    },

    /// The provider answered with a non-2xx status.
    #[error("{provider} HTTP {status}")]
    Http { provider: &'static str, status: u16 },

    /// The body was not the JSON shape the provider documents.
    #[error("{provider} INVALID RESPONSE: {source}")]
    Decode {
        provider: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// The provider reported a logical failure (`success: false`, `error: true`).
    #[error("{message}")]
    Rejected { message: String },

    /// A 2xx response that carried no usable address.
    #[error("{0}")]
    MissingIp(String),
}

/// Every provider of a chain failed.
#[derive(Error, Debug)]
pub enum ChainError {
    #[error("{} / {}", .label, .attempts.join(" / "))]
    Exhausted {
        label: &'static str,
        attempts: Vec<String>,
    },
}

impl ChainError {
    /// Individual failure reasons, in provider order.
    pub fn attempts(&self) -> &[String] {
        match self {
            ChainError::Exhausted { attempts, .. } => attempts,
        }
    }
}

/// A throughput probe that could not complete.
#[derive(Error, Debug)]
pub enum SpeedTestError {
    #[error("LATENCY HTTP {0}")]
    LatencyStatus(u16),

    #[error("DOWNLOAD HTTP {0}")]
    DownloadStatus(u16),

    #[error(transparent)]
    Transport(#[from] reqwest::Error),
}
