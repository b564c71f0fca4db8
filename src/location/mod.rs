//! Public IP and geolocation lookup.
//!
//! Two provider chains run at startup: a fast address-only chain that seeds
//! the display, and the full geolocation chain. Every provider response is
//! normalized into [`LocationRecord`] before it leaves this module.

pub mod chain;
pub mod model;
pub mod normalize;
pub mod providers;
pub mod timezone;

pub use chain::{fetch_ip_data, fetch_public_ip_only, resolve_location, LookupOutcome};
pub use model::{IpType, LocationRecord};
pub use providers::{geo_chain, public_ip_chain, Provider, ProviderKind};

use crate::config::LookupConfig;
use reqwest::Client;
use std::time::Duration;

/// HTTP client used for every provider request.
pub fn build_http_client(config: &LookupConfig) -> reqwest::Result<Client> {
    let mut builder = Client::builder().user_agent(crate::client::user_agent());
    if let Some(secs) = config.request_timeout_secs {
        builder = builder.timeout(Duration::from_secs(secs));
    }
    builder.build()
}
