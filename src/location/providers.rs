//! Remote IP/geolocation services and how each one is queried.

use super::model::LocationRecord;
use super::normalize::{
    normalize_ip_only, normalize_ipapi_co, normalize_ipwho_is, normalize_ipwhois_io,
    IpApiCoResponse, IpWhoisResponse, IpifyResponse,
};
use crate::config::LookupConfig;
use crate::error::ProviderError;
use reqwest::{header::ACCEPT, Client};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

/// Which response shape a provider speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    IpWhoIs,
    IpWhoisIo,
    IpApiCo,
    Ipify,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Provider {
    pub label: &'static str,
    pub kind: ProviderKind,
    pub url: String,
}

impl Provider {
    pub fn new(label: &'static str, kind: ProviderKind, url: impl Into<String>) -> Self {
        Self {
            label,
            kind,
            url: url.into(),
        }
    }

    /// One request, normalized into a full record (or an IP-only one for ipify).
    pub async fn fetch_location(&self, http: &Client) -> Result<LocationRecord, ProviderError> {
        let body = self.get_json(http).await?;

        match self.kind {
            ProviderKind::IpWhoIs => {
                let raw: IpWhoisResponse = self.decode(body)?;
                self.check(raw.failure(self.label))?;
                Ok(normalize_ipwho_is(&raw))
            }
            ProviderKind::IpWhoisIo => {
                let raw: IpWhoisResponse = self.decode(body)?;
                self.check(raw.failure(self.label))?;
                Ok(normalize_ipwhois_io(&raw))
            }
            ProviderKind::IpApiCo => {
                let raw: IpApiCoResponse = self.decode(body)?;
                self.check(raw.failure())?;
                Ok(normalize_ipapi_co(&raw))
            }
            ProviderKind::Ipify => {
                let raw: IpifyResponse = self.decode(body)?;
                match raw.ip {
                    Some(ip) => Ok(normalize_ip_only(&ip)),
                    None => Err(ProviderError::MissingIp(format!("{} MISSING IP", self.label))),
                }
            }
        }
    }

    /// One request, keeping only the address.
    pub async fn fetch_ip(&self, http: &Client) -> Result<String, ProviderError> {
        let body = self.get_json(http).await?;

        let ip = match self.kind {
            ProviderKind::IpWhoIs | ProviderKind::IpWhoisIo => {
                let raw: IpWhoisResponse = self.decode(body)?;
                self.check(raw.failure(self.label))?;
                raw.ip
            }
            ProviderKind::IpApiCo => {
                let raw: IpApiCoResponse = self.decode(body)?;
                self.check(raw.failure())?;
                raw.ip
            }
            ProviderKind::Ipify => self.decode::<IpifyResponse>(body)?.ip,
        };

        ip.map(|ip| ip.trim().to_string())
            .filter(|ip| !ip.is_empty())
            .ok_or_else(|| ProviderError::MissingIp("MISSING IP".to_string()))
    }

    async fn get_json(&self, http: &Client) -> Result<Value, ProviderError> {
        debug!(provider = self.label, url = %self.url, "querying provider");

        let transport = |source| ProviderError::Transport {
            provider: self.label,
            source,
        };
        let res = http
            .get(&self.url)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(transport)?;

        let status = res.status();
        if !status.is_success() {
            return Err(ProviderError::Http {
                provider: self.label,
                status: status.as_u16(),
            });
        }

        let bytes = res.bytes().await.map_err(transport)?;
        serde_json::from_slice(&bytes).map_err(|source| ProviderError::Decode {
            provider: self.label,
            source,
        })
    }

    fn decode<T: DeserializeOwned>(&self, body: Value) -> Result<T, ProviderError> {
        serde_json::from_value(body).map_err(|source| ProviderError::Decode {
            provider: self.label,
            source,
        })
    }

    fn check(&self, failure: Option<String>) -> Result<(), ProviderError> {
        match failure {
            Some(message) => Err(ProviderError::Rejected { message }),
            None => Ok(()),
        }
    }
}

/// Full-detail chain: ipwho.is, ipwhois.io, ipapi.co, then ipify as a last resort.
pub fn geo_chain(config: &LookupConfig) -> Vec<Provider> {
    vec![
        Provider::new("IPWHO.IS", ProviderKind::IpWhoIs, &config.ipwho_is_url),
        Provider::new("IPWHOIS.IO", ProviderKind::IpWhoisIo, &config.ipwhois_io_url),
        Provider::new("IPAPI.CO", ProviderKind::IpApiCo, &config.ipapi_co_url),
        Provider::new("IPIFY", ProviderKind::Ipify, &config.ipify64_url),
    ]
}

/// Address-only chain used to seed the display quickly.
pub fn public_ip_chain(config: &LookupConfig) -> Vec<Provider> {
    vec![
        Provider::new("IPIFY64", ProviderKind::Ipify, &config.ipify64_url),
        Provider::new("IPIFY", ProviderKind::Ipify, &config.ipify_url),
        Provider::new("IPWHO.IS", ProviderKind::IpWhoIs, &config.ipwho_is_url),
    ]
}
