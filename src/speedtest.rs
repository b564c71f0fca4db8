//! On-demand latency and download probe.
//!
//! A run is three small latency requests followed by one bulk download. Only
//! one run may be in flight; a second call while busy returns `None` without
//! touching the network.

use crate::config::SpeedTestConfig;
use crate::error::SpeedTestError;
use chrono::{SecondsFormat, Utc};
use reqwest::{header::CACHE_CONTROL, Client};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// The median below assumes an odd sample count.
pub const LATENCY_SAMPLES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProbeStatus {
    Completed,
    Failed,
}

impl ProbeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeStatus::Completed => "COMPLETED",
            ProbeStatus::Failed => "FAILED",
        }
    }
}

/// Outcome of one probe. Each run replaces the previous result wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThroughputResult {
    pub status: ProbeStatus,
    pub status_label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_mbps: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,
    pub tested_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Raw figures from a successful run, before rounding.
#[derive(Debug, Clone, Copy)]
pub struct Measurement {
    pub latency_ms: f64,
    pub bytes: u64,
    pub download: Duration,
    pub total: Duration,
}

impl ThroughputResult {
    pub fn completed(m: &Measurement, server: &str) -> Self {
        let mbps = throughput_mbps(m.bytes, m.download);
        Self {
            status: ProbeStatus::Completed,
            status_label: format!("DONE / {} MBPS", format_mbps(mbps)),
            latency_ms: Some(round1(m.latency_ms)),
            download_mbps: mbps,
            bytes: Some(m.bytes),
            download_ms: Some(m.download.as_millis() as u64),
            total_ms: Some(m.total.as_millis() as u64),
            server: Some(server.to_string()),
            tested_at: now_iso(),
            error: None,
        }
    }

    /// No partial figures survive a failed run.
    pub fn failed(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            status: ProbeStatus::Failed,
            status_label: format!("TEST FAILED: {message}"),
            latency_ms: None,
            download_mbps: None,
            bytes: None,
            download_ms: None,
            total_ms: None,
            server: None,
            tested_at: now_iso(),
            error: Some(message),
        }
    }
}

pub struct SpeedTester {
    http: Client,
    config: SpeedTestConfig,
    busy: AtomicBool,
}

/// Clears the busy flag however the run ends.
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl SpeedTester {
    pub fn new(http: Client, config: SpeedTestConfig) -> Self {
        Self {
            http,
            config,
            busy: AtomicBool::new(false),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Runs one probe, or returns `None` if another is already in flight.
    pub async fn run(&self) -> Option<ThroughputResult> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Speed test already running; ignoring request");
            return None;
        }
        let _guard = BusyGuard(&self.busy);

        info!("Speed test started against {}", self.config.server_label);
        let result = match self.measure().await {
            Ok(m) => {
                let result = ThroughputResult::completed(&m, &self.config.server_label);
                info!("Speed test finished: {}", result.status_label);
                result
            }
            Err(e) => {
                warn!("Speed test failed: {}", e);
                ThroughputResult::failed(e.to_string())
            }
        };
        Some(result)
    }

    async fn measure(&self) -> Result<Measurement, SpeedTestError> {
        let started = Instant::now();
        let latency_ms = self.measure_latency().await?;
        let (bytes, download) = self.measure_download().await?;

        Ok(Measurement {
            latency_ms,
            bytes,
            download,
            total: started.elapsed(),
        })
    }

    async fn measure_latency(&self) -> Result<f64, SpeedTestError> {
        let mut samples = Vec::with_capacity(LATENCY_SAMPLES);

        for i in 0..LATENCY_SAMPLES {
            let cache_buster = format!("{}-{}", Utc::now().timestamp_millis(), i);
            let t0 = Instant::now();
            let res = self
                .http
                .get(&self.config.trace_url)
                .query(&[("ts", cache_buster)])
                .header(CACHE_CONTROL, "no-store")
                .send()
                .await?;
            if !res.status().is_success() {
                return Err(SpeedTestError::LatencyStatus(res.status().as_u16()));
            }
            res.bytes().await?;
            samples.push(t0.elapsed().as_secs_f64() * 1000.0);
        }

        debug!(?samples, "latency samples");
        Ok(median_latency(&mut samples).unwrap_or_default())
    }

    async fn measure_download(&self) -> Result<(u64, Duration), SpeedTestError> {
        let nominal = self.config.download_bytes;
        let t0 = Instant::now();
        let res = self
            .http
            .get(&self.config.download_url)
            .query(&[
                ("bytes", nominal.to_string()),
                ("nocache", Utc::now().timestamp_millis().to_string()),
            ])
            .header(CACHE_CONTROL, "no-store")
            .send()
            .await?;
        if !res.status().is_success() {
            return Err(SpeedTestError::DownloadStatus(res.status().as_u16()));
        }
        let body = res.bytes().await?;
        let elapsed = t0.elapsed();

        Ok((received_or_nominal(body.len() as u64, nominal), elapsed))
    }
}

/// Middle value of the sorted samples.
pub fn median_latency(samples: &mut [f64]) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }
    samples.sort_by(|a, b| a.total_cmp(b));
    Some(samples[samples.len() / 2])
}

/// Megabits per second; `None` when no time elapsed.
pub fn throughput_mbps(bytes: u64, elapsed: Duration) -> Option<f64> {
    let secs = elapsed.as_secs_f64();
    if secs <= 0.0 {
        return None;
    }
    Some((bytes as f64 * 8.0) / secs / 1_000_000.0)
}

pub fn received_or_nominal(received: u64, nominal: u64) -> u64 {
    if received > 0 {
        received
    } else {
        nominal
    }
}

pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Whole megabits from 100 up, one decimal below that.
pub fn format_mbps(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_finite() && v >= 100.0 => format!("{}", v.round()),
        Some(v) if v.is_finite() => format!("{v:.1}"),
        _ => "N/A".to_string(),
    }
}

fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
