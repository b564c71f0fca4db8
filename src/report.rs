//! Diagnostics export: the last lookup, client snapshot and speed result as JSON.

use crate::client::ClientCapabilities;
use crate::location::LocationRecord;
use crate::speedtest::ThroughputResult;
use serde::Serialize;
use std::fs;
use std::path::Path;
use tracing::info;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticsReport<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'a str>,
    pub ip_api: Option<&'a LocationRecord>,
    pub client: &'a ClientCapabilities,
    pub speed_test: Option<&'a ThroughputResult>,
}

impl DiagnosticsReport<'_> {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn write_to(&self, path: impl AsRef<Path>) -> color_eyre::Result<()> {
        let path = path.as_ref();
        fs::write(path, self.to_json()?)?;
        info!("Diagnostics exported to {}", path.display());
        Ok(())
    }
}
