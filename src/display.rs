//! Turns records into the labelled rows and sentences the dashboard shows.
//!
//! Nothing here fails on a missing field: absence is rendered as `N/A`.

use crate::client::ClientCapabilities;
use crate::location::LocationRecord;
use crate::speedtest::{format_mbps, ThroughputResult};
use std::fmt::Display;

pub const NOT_AVAILABLE: &str = "N/A";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Normal,
    Empty,
    Accent,
    Warn,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub key: &'static str,
    pub value: String,
}

impl Row {
    fn new(key: &'static str, value: impl Into<String>) -> Self {
        Self {
            key,
            value: value.into(),
        }
    }

    /// How the value should be highlighted.
    pub fn tone(&self) -> Tone {
        let value = self.value.as_str();
        if value == NOT_AVAILABLE || value == "UNKNOWN" {
            return Tone::Empty;
        }
        let flag_key = ["PROXY", "TOR", "VPN"].iter().any(|k| self.key.contains(k));
        if flag_key && value != "NONE DETECTED" {
            return Tone::Warn;
        }
        let accent_key = ["ONLINE", "SECURE", "DST", "MOBILE", "COOKIES", "ROUTEABLE"]
            .iter()
            .any(|k| self.key.contains(k));
        if accent_key && value.ends_with("YES") {
            return Tone::Accent;
        }
        Tone::Normal
    }
}

/// Text fields are shown uppercased; empty or missing becomes `N/A`.
pub fn text(value: Option<&str>) -> String {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => v.to_uppercase(),
        _ => NOT_AVAILABLE.to_string(),
    }
}

pub fn num<T: Display>(value: Option<T>) -> String {
    value.map_or_else(|| NOT_AVAILABLE.to_string(), |v| v.to_string())
}

pub fn yes_no(value: Option<bool>) -> String {
    match value {
        Some(true) => "YES".to_string(),
        Some(false) => "NO".to_string(),
        None => NOT_AVAILABLE.to_string(),
    }
}

pub fn format_lat_lon(lat: Option<f64>, lon: Option<f64>) -> String {
    match (lat, lon) {
        (Some(lat), Some(lon)) => format!("{lat:.5}, {lon:.5}"),
        _ => NOT_AVAILABLE.to_string(),
    }
}

fn dimensions(width: Option<u16>, height: Option<u16>) -> String {
    format!("{} x {}", num(width), num(height))
}

pub fn detect_network_risk_flags(record: &LocationRecord) -> String {
    let Some(security) = &record.security else {
        return "NONE DETECTED".to_string();
    };
    let flags: Vec<&str> = [
        (security.proxy, "PROXY"),
        (security.vpn, "VPN"),
        (security.tor, "TOR"),
        (security.relay, "RELAY"),
    ]
    .into_iter()
    .filter(|(set, _)| *set == Some(true))
    .map(|(_, name)| name)
    .collect();

    if flags.is_empty() {
        "NONE DETECTED".to_string()
    } else {
        flags.join(", ")
    }
}

/// One-line, human description of where the connection appears to come from.
pub fn compact_summary(record: &LocationRecord, client: &ClientCapabilities) -> String {
    let place = [&record.city, &record.region, &record.country]
        .into_iter()
        .flatten()
        .filter(|s| !s.is_empty())
        .cloned()
        .collect::<Vec<_>>()
        .join(", ");
    let isp = record
        .connection
        .isp
        .as_deref()
        .or(record.connection.org.as_deref())
        .filter(|s| !s.is_empty());
    let network_hint = [&client.connection_type, &client.effective_type]
        .into_iter()
        .flatten()
        .filter(|s| !s.is_empty())
        .cloned()
        .collect::<Vec<_>>()
        .join(" / ");

    match (place.is_empty(), isp) {
        (false, Some(isp)) if !network_hint.is_empty() => {
            format!("It looks like you're connecting from {place} with {isp} ({network_hint}).")
        }
        (false, Some(isp)) => format!("It looks like you're connecting from {place} with {isp}."),
        (false, None) => format!("It looks like you're connecting from {place}."),
        (true, Some(isp)) => format!("You're online through {isp}."),
        (true, None) => "Your connection details are ready.".to_string(),
    }
}

pub fn is_mac_device(client: &ClientCapabilities) -> bool {
    let ua = client.user_agent.to_lowercase();
    let platform = client.platform.to_lowercase();
    let touch = client.max_touch_points.unwrap_or(0);

    if ua.contains("iphone") || ua.contains("ipad") || ua.contains("ipod") {
        return false;
    }
    if platform.contains("mac") && touch > 1 {
        return false;
    }
    platform.contains("mac") || ua.contains("macintosh")
}

pub fn friendly_device_name(client: &ClientCapabilities) -> &'static str {
    let ua = client.user_agent.to_lowercase();
    let platform = client.platform.to_lowercase();
    let touch = client.max_touch_points.unwrap_or(0);

    if ua.contains("iphone") || platform.starts_with("ios") {
        return "an iPhone";
    }
    if ua.contains("ipad") {
        return "an iPad";
    }
    if ua.contains("ipod") {
        return "an iPod touch";
    }
    if platform.contains("mac") && touch > 1 {
        return "an iPad";
    }
    if platform.contains("mac") || ua.contains("macintosh") {
        if ua.contains("macbookpro") {
            return "a MacBook Pro";
        }
        if ua.contains("macbookair") {
            return "a MacBook Air";
        }
        return "a Mac";
    }
    if ua.contains("android") || platform.starts_with("android") {
        return if client.mobile {
            "an Android phone"
        } else {
            "an Android device"
        };
    }
    if platform.contains("windows") || ua.contains("windows") {
        return "a Windows computer";
    }
    if platform.contains("linux") || ua.contains("linux") {
        return "a Linux machine";
    }
    if client.mobile {
        "a mobile device"
    } else {
        "this device"
    }
}

/// The line above the IP address in the header.
pub fn hero_kicker(client: &ClientCapabilities) -> String {
    if is_mac_device(client) {
        return "NICE LOOKING MAC! YOUR IP ADDRESS IS".to_string();
    }
    let device = friendly_device_name(client).to_uppercase();
    if client.mobile {
        format!("YOU'RE USING {device}. YOUR IP ADDRESS IS")
    } else {
        format!("YOU'RE USING {device}. GREAT CHOICE. YOUR IP ADDRESS IS")
    }
}

/// The six cards under the header.
pub fn snapshot_cards(record: &LocationRecord, client: &ClientCapabilities) -> Vec<Row> {
    let city = [&record.city, &record.region]
        .into_iter()
        .flatten()
        .filter(|s| !s.is_empty())
        .cloned()
        .collect::<Vec<_>>()
        .join(", ");
    vec![
        Row::new(
            "COUNTRY",
            text(record.country_code.as_deref().or(record.country.as_deref())),
        ),
        Row::new("CITY", text(Some(city.as_str()))),
        Row::new(
            "ISP",
            text(record.connection.isp.as_deref().or(record.connection.org.as_deref())),
        ),
        Row::new(
            "IP TIMEZONE",
            text(record.timezone.id.as_deref().or(record.timezone.abbr.as_deref())),
        ),
        Row::new("LOCAL TIMEZONE", text(client.time_zone.as_deref())),
        Row::new("VIEWPORT", dimensions(client.viewport_width, client.viewport_height)),
    ]
}

pub fn network_rows(record: &LocationRecord) -> Vec<Row> {
    let c = &record.connection;
    vec![
        Row::new("IP", text(Some(record.ip.as_str()))),
        Row::new("TYPE", text(record.ip_type.map(|t| t.as_str()))),
        Row::new("ISP", text(c.isp.as_deref())),
        Row::new("ORG", text(c.org.as_deref())),
        Row::new("ASN", text(c.asn.as_deref())),
        Row::new("DOMAIN", text(c.domain.as_deref())),
        Row::new("HOSTNAME", text(c.hostname.as_deref())),
        Row::new(
            "ROUTEABLE",
            if record.ip_type.is_some() { "YES" } else { "UNKNOWN" },
        ),
        Row::new("VPN/PROXY/TOR FLAG", detect_network_risk_flags(record)),
    ]
}

pub fn geo_rows(record: &LocationRecord) -> Vec<Row> {
    let tz = &record.timezone;
    vec![
        Row::new("COUNTRY", text(record.country.as_deref())),
        Row::new("COUNTRY CODE", text(record.country_code.as_deref())),
        Row::new("REGION", text(record.region.as_deref())),
        Row::new("CITY", text(record.city.as_deref())),
        Row::new("POSTAL", text(record.postal.as_deref())),
        Row::new("LAT/LON", format_lat_lon(record.latitude, record.longitude)),
        Row::new("TIMEZONE", text(tz.id.as_deref())),
        Row::new("TIMEZONE ABBR", text(tz.abbr.as_deref())),
        Row::new("UTC OFFSET", text(tz.utc.as_deref())),
        Row::new("LOCAL TIME", text(tz.current_time.as_deref())),
        Row::new("DST", yes_no(tz.is_dst)),
        Row::new(
            "COUNTRY FLAG",
            record.flag.emoji.clone().unwrap_or_else(|| NOT_AVAILABLE.to_string()),
        ),
    ]
}

pub fn client_rows(client: &ClientCapabilities) -> Vec<Row> {
    vec![
        Row::new("USER AGENT", text(Some(client.user_agent.as_str()))),
        Row::new("LANGUAGES", text(client.languages.as_deref())),
        Row::new("PLATFORM", text(Some(client.platform.as_str()))),
        Row::new("MOBILE", yes_no(Some(client.mobile))),
        Row::new("TOUCH POINTS", num(client.max_touch_points)),
        Row::new("ONLINE", yes_no(client.online)),
        Row::new("COOKIES ENABLED", yes_no(client.cookie_enabled)),
        Row::new("DO NOT TRACK", text(client.do_not_track.as_deref())),
        Row::new("TIMEZONE", text(client.time_zone.as_deref())),
        Row::new("LOCALE", text(client.locale.as_deref())),
        Row::new("COLOR SCHEME", text(Some(client.prefers_color_scheme.as_str()))),
        Row::new("REDUCED MOTION", text(Some(client.prefers_reduced_motion.as_str()))),
        Row::new("CONNECTION TYPE", text(client.connection_type.as_deref())),
        Row::new("EFFECTIVE TYPE", text(client.effective_type.as_deref())),
        Row::new("DOWNLINK MBPS", num(client.downlink)),
        Row::new("RTT MS", num(client.rtt)),
        Row::new("SAVE DATA", yes_no(client.save_data)),
    ]
}

pub fn device_rows(client: &ClientCapabilities) -> Vec<Row> {
    vec![
        Row::new("SCREEN PX", dimensions(client.screen_width, client.screen_height)),
        Row::new("VIEWPORT CELLS", dimensions(client.viewport_width, client.viewport_height)),
        Row::new("AVAILABLE SCREEN", dimensions(client.avail_width, client.avail_height)),
        Row::new("PIXEL RATIO", client.device_pixel_ratio.to_string()),
        Row::new("COLOR DEPTH", num(client.color_depth)),
        Row::new("HARDWARE CONCURRENCY", num(client.hardware_concurrency)),
        Row::new("DEVICE MEMORY (GB)", num(client.device_memory)),
        Row::new("CPU CLASS", text(client.cpu_class.as_deref())),
        Row::new("PLATFORM TOKEN", text(client.user_agent_data_platform.as_deref())),
        Row::new("UA BRANDS", text(client.user_agent_brands.as_deref())),
        Row::new("WEBDRIVER", yes_no(Some(client.webdriver))),
        Row::new("MAX TOUCH POINTS", num(client.max_touch_points)),
    ]
}

pub fn speed_rows(
    client: &ClientCapabilities,
    result: Option<&ThroughputResult>,
    running: bool,
    default_server: &str,
) -> Vec<Row> {
    let status = if running {
        "RUNNING".to_string()
    } else {
        result.map_or_else(|| "READY".to_string(), |r| r.status.as_str().to_string())
    };
    let result = result.filter(|_| !running);

    vec![
        Row::new("TEST STATUS", status),
        Row::new("MEASURED PING (MS)", num(result.and_then(|r| r.latency_ms))),
        Row::new(
            "MEASURED DOWNLOAD (MBPS)",
            format_mbps(result.and_then(|r| r.download_mbps)),
        ),
        Row::new("TRANSFER BYTES", num(result.and_then(|r| r.bytes))),
        Row::new("TRANSFER TIME (MS)", num(result.and_then(|r| r.download_ms))),
        Row::new("TOTAL TEST TIME (MS)", num(result.and_then(|r| r.total_ms))),
        Row::new("EST DOWNLINK (MBPS)", num(client.downlink)),
        Row::new("EST RTT (MS)", num(client.rtt)),
        Row::new("EFFECTIVE TYPE", text(client.effective_type.as_deref())),
        Row::new("CONNECTION TYPE", text(client.connection_type.as_deref())),
        Row::new(
            "SERVER",
            text(Some(result.and_then(|r| r.server.as_deref()).unwrap_or(default_server))),
        ),
        Row::new("TESTED AT", text(result.map(|r| r.tested_at.as_str()))),
    ]
}

/// Short explanation shown in the footer for the selected row.
pub fn field_tooltip(key: &str) -> Option<&'static str> {
    let text = match key {
        "IP" => "YOUR PUBLIC INTERNET ADDRESS AS SEEN BY THE LOOKUP SERVICE.",
        "TYPE" => "IP VERSION / TYPE (SUCH AS IPV4 OR IPV6).",
        "ISP" => "YOUR INTERNET SERVICE PROVIDER.",
        "ORG" => "ORGANIZATION NAME ASSOCIATED WITH THE IP BLOCK.",
        "ASN" => "AUTONOMOUS SYSTEM NUMBER THAT ANNOUNCES THIS IP ROUTE.",
        "DOMAIN" => "PRIMARY DOMAIN ASSOCIATED WITH THE NETWORK PROVIDER.",
        "HOSTNAME" => "REVERSE DNS HOSTNAME FOR THIS IP (IF AVAILABLE).",
        "ROUTEABLE" => "WHETHER THE ADDRESS LOOKS LIKE A PUBLIC ROUTEABLE INTERNET IP.",
        "VPN/PROXY/TOR FLAG" => "PRIVACY/RELAY NETWORK FLAGS REPORTED BY THE GEO IP SERVICE.",
        "COUNTRY" => "COUNTRY ESTIMATE BASED ON YOUR PUBLIC IP ADDRESS.",
        "COUNTRY CODE" => "ISO COUNTRY CODE FOR THE DETECTED LOCATION.",
        "REGION" => "STATE / PROVINCE / REGION REPORTED FOR THE IP.",
        "CITY" => "CITY ESTIMATE BASED ON YOUR PUBLIC IP ADDRESS.",
        "POSTAL" => "POSTAL OR ZIP CODE ESTIMATE FOR THE IP GEO LOCATION.",
        "LAT/LON" => "APPROXIMATE GEOLOCATION COORDINATES FOR THE IP.",
        "TIMEZONE" => "IANA TIME ZONE ID (FOR EXAMPLE AMERICA/NEW_YORK).",
        "TIMEZONE ABBR" => "SHORT TIME ZONE ABBREVIATION (CAN BE AMBIGUOUS GLOBALLY).",
        "UTC OFFSET" => "CURRENT UTC OFFSET FOR THE DETECTED TIME ZONE.",
        "LOCAL TIME" => "CURRENT LOCAL TIME IN THE DETECTED GEO IP TIME ZONE.",
        "DST" => "DAYLIGHT SAVING TIME STATUS IN THE DETECTED TIME ZONE (BEST EFFORT).",
        "COUNTRY FLAG" => "UNICODE / EMOJI FLAG FOR THE DETECTED COUNTRY.",
        "USER AGENT" => "USER-AGENT STRING THIS CLIENT SENDS WITH EVERY REQUEST.",
        "LANGUAGES" => "PREFERRED LANGUAGES FROM THE ENVIRONMENT, IN ORDER.",
        "PLATFORM" => "OPERATING SYSTEM AND CPU ARCHITECTURE.",
        "MOBILE" => "BEST-EFFORT DETECTION OF A MOBILE DEVICE.",
        "DO NOT TRACK" => "DO_NOT_TRACK PRIVACY PREFERENCE FROM THE ENVIRONMENT.",
        "LOCALE" => "SYSTEM LOCALE USED FOR FORMATTERS.",
        "COLOR SCHEME" => "TERMINAL BACKGROUND PREFERENCE (FROM COLORFGBG).",
        "REDUCED MOTION" => "ACCESSIBILITY MOTION PREFERENCE.",
        "SCREEN PX" => "TERMINAL WINDOW SIZE IN PIXELS, WHEN REPORTED.",
        "VIEWPORT CELLS" => "CURRENT TERMINAL SIZE IN CHARACTER CELLS.",
        "COLOR DEPTH" => "BITS PER COLOR THE TERMINAL ADVERTISES.",
        "HARDWARE CONCURRENCY" => "LOGICAL CPU CORE COUNT.",
        "DEVICE MEMORY (GB)" => "TOTAL SYSTEM MEMORY, ROUNDED TO GB.",
        "CPU CLASS" => "CPU BRAND STRING.",
        "PLATFORM TOKEN" => "LONG OPERATING SYSTEM VERSION.",
        "WEBDRIVER" => "YES CAN INDICATE AN AUTOMATED (CI) ENVIRONMENT.",
        "TEST STATUS" => "CURRENT OR LAST SPEED TEST STATUS.",
        "MEASURED PING (MS)" => "MEDIAN LATENCY MEASURED USING MULTIPLE SMALL REQUESTS.",
        "MEASURED DOWNLOAD (MBPS)" => "ESTIMATED DOWNLOAD THROUGHPUT FROM A TEST FILE FETCH.",
        "TRANSFER BYTES" => "NUMBER OF BYTES DOWNLOADED DURING THE SPEED TEST.",
        "TRANSFER TIME (MS)" => "TIME SPENT DOWNLOADING THE TEST PAYLOAD.",
        "TOTAL TEST TIME (MS)" => "FULL SPEED TEST DURATION INCLUDING LATENCY CHECKS.",
        "SERVER" => "SERVER USED FOR THE SPEED TEST REQUESTS.",
        "TESTED AT" => "TIMESTAMP WHEN THE LAST SPEED TEST FINISHED.",
        _ => return None,
    };
    Some(text)
}
