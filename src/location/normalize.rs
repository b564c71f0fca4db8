//! Provider response shapes and their mapping onto [`LocationRecord`].
//!
//! Each `normalize_*` function is pure: it takes the documented JSON shape of
//! one provider and returns the canonical record. The only "impure" input is
//! the clock, used to derive a local time and DST flag when a provider
//! reports a zone id and nothing else.

use super::model::{Connection, Flag, IpType, LocationRecord, Security, Timezone};
use super::timezone::{current_time_for_zone, is_dst_now_in_zone};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Offset from an ASCII uppercase letter to its regional-indicator symbol.
const REGIONAL_INDICATOR_OFFSET: u32 = 127_397;

/// Accepts strings and numbers, yielding `None` for anything else (including `null`).
fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(text_of))
}

fn text_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Mirrors a JSON truthiness check: `true`, non-zero numbers, non-empty strings
/// and any object or array count as set.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

// -- ipwho.is / ipwhois.io --------------------------------------------------

/// Response shape shared by ipwho.is and ipwhois.io.
#[derive(Debug, Default, Deserialize)]
pub struct IpWhoisResponse {
    #[serde(default, deserialize_with = "lenient_text")]
    pub ip: Option<String>,
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub message: Option<String>,
    #[serde(default, rename = "type", deserialize_with = "lenient_text")]
    pub ip_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub country: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub country_code: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub region: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub city: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub postal: Option<String>,
    #[serde(default)]
    pub latitude: Value,
    #[serde(default)]
    pub longitude: Value,
    #[serde(default)]
    pub connection: Option<IpWhoisConnection>,
    #[serde(default)]
    pub flag: Option<IpWhoisFlag>,
    #[serde(default)]
    pub timezone: Option<IpWhoisTimezone>,
    #[serde(default)]
    pub security: Option<IpWhoisSecurity>,
}

#[derive(Debug, Default, Deserialize)]
pub struct IpWhoisConnection {
    #[serde(default, deserialize_with = "lenient_text")]
    pub asn: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub org: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub isp: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub domain: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub hostname: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct IpWhoisFlag {
    #[serde(default, deserialize_with = "lenient_text")]
    pub emoji: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct IpWhoisTimezone {
    #[serde(default, deserialize_with = "lenient_text")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub abbr: Option<String>,
    #[serde(default)]
    pub is_dst: Option<bool>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub utc: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub current_time: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct IpWhoisSecurity {
    #[serde(default)]
    pub proxy: Option<bool>,
    #[serde(default)]
    pub vpn: Option<bool>,
    #[serde(default)]
    pub tor: Option<bool>,
    #[serde(default)]
    pub relay: Option<bool>,
}

impl IpWhoisResponse {
    /// The provider's own failure signal, if it raised one.
    pub fn failure(&self, provider: &str) -> Option<String> {
        if self.success == Some(false) {
            return Some(
                self.message
                    .clone()
                    .unwrap_or_else(|| format!("{provider} FAILED")),
            );
        }
        None
    }
}

fn base_record(raw: &IpWhoisResponse) -> LocationRecord {
    let connection = raw.connection.as_ref().map(|c| Connection {
        isp: c.isp.clone(),
        org: c.org.clone(),
        asn: c.asn.clone(),
        domain: c.domain.clone(),
        hostname: c.hostname.clone(),
    });

    LocationRecord {
        ip: raw.ip.clone().unwrap_or_default(),
        ip_type: raw.ip_type.as_deref().and_then(IpType::parse),
        country: raw.country.clone(),
        country_code: raw.country_code.clone(),
        region: raw.region.clone(),
        city: raw.city.clone(),
        postal: raw.postal.clone(),
        latitude: number_or_none(&raw.latitude),
        longitude: number_or_none(&raw.longitude),
        connection: connection.unwrap_or_default(),
        flag: Flag {
            emoji: raw.flag.as_ref().and_then(|f| f.emoji.clone()),
        },
        timezone: Timezone::default(),
        security: raw.security.as_ref().map(|s| Security {
            proxy: s.proxy,
            vpn: s.vpn,
            tor: s.tor,
            relay: s.relay,
        }),
    }
}

/// ipwho.is is the reference shape: its timezone block is taken as reported.
pub fn normalize_ipwho_is(raw: &IpWhoisResponse) -> LocationRecord {
    let mut record = base_record(raw);
    if let Some(tz) = &raw.timezone {
        record.timezone = Timezone {
            id: tz.id.clone(),
            abbr: tz.abbr.clone(),
            utc: tz.utc.clone(),
            current_time: tz.current_time.clone(),
            is_dst: tz.is_dst,
        };
    }
    record
}

/// ipwhois.io: local time is recomputed from the zone id, and DST falls back
/// to the heuristic when the provider leaves it out.
pub fn normalize_ipwhois_io(raw: &IpWhoisResponse) -> LocationRecord {
    let mut record = base_record(raw);
    let tz = raw.timezone.as_ref();
    let tz_id = tz.and_then(|t| t.id.clone());

    record.timezone = Timezone {
        abbr: tz.and_then(|t| t.abbr.clone()),
        utc: tz.and_then(|t| t.utc.clone()),
        current_time: tz_id.as_deref().and_then(current_time_for_zone),
        is_dst: tz
            .and_then(|t| t.is_dst)
            .or_else(|| tz_id.as_deref().and_then(is_dst_now_in_zone)),
        id: tz_id,
    };
    record
}

// -- ipapi.co ---------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct IpApiCoResponse {
    #[serde(default, deserialize_with = "lenient_text")]
    pub ip: Option<String>,
    #[serde(default)]
    pub error: Value,
    #[serde(default, deserialize_with = "lenient_text")]
    pub reason: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub message: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub version: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub country_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub country: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub country_code: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub region: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub city: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub postal: Option<String>,
    #[serde(default)]
    pub latitude: Value,
    #[serde(default)]
    pub longitude: Value,
    #[serde(default, deserialize_with = "lenient_text")]
    pub org: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub asn: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub timezone: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub utc_offset: Option<String>,
}

impl IpApiCoResponse {
    pub fn failure(&self) -> Option<String> {
        if !is_truthy(&self.error) {
            return None;
        }
        Some(
            self.reason
                .clone()
                .or_else(|| self.message.clone())
                .unwrap_or_else(|| "IPAPI.CO FAILED".to_string()),
        )
    }
}

pub fn normalize_ipapi_co(raw: &IpApiCoResponse) -> LocationRecord {
    let tz_id = raw.timezone.clone();
    // ipapi.co sends "IPv4"; older payloads sent a bare "4".
    let ip_type = raw.version.as_deref().and_then(IpType::parse);

    LocationRecord {
        ip: raw.ip.clone().unwrap_or_default(),
        ip_type,
        country: raw.country_name.clone().or_else(|| raw.country.clone()),
        country_code: raw.country_code.clone(),
        region: raw.region.clone(),
        city: raw.city.clone(),
        postal: raw.postal.clone(),
        latitude: number_or_none(&raw.latitude),
        longitude: number_or_none(&raw.longitude),
        connection: Connection {
            isp: raw.org.clone(),
            org: raw.org.clone(),
            asn: raw.asn.clone(),
            domain: None,
            hostname: None,
        },
        flag: Flag {
            emoji: country_code_to_flag_emoji(raw.country_code.as_deref()),
        },
        timezone: Timezone {
            abbr: None,
            utc: format_utc_offset(raw.utc_offset.as_deref()),
            current_time: tz_id.as_deref().and_then(current_time_for_zone),
            is_dst: tz_id.as_deref().and_then(is_dst_now_in_zone),
            id: tz_id,
        },
        security: None,
    }
}

// -- ipify ------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct IpifyResponse {
    #[serde(default, deserialize_with = "lenient_text")]
    pub ip: Option<String>,
}

/// Minimal record for providers (and fallbacks) that only know the address.
pub fn normalize_ip_only(ip: &str) -> LocationRecord {
    LocationRecord {
        ip: ip.to_string(),
        ip_type: infer_ip_type(ip),
        ..Default::default()
    }
}

// -- helpers ----------------------------------------------------------------

/// A colon means IPv6; any other non-empty address is taken as IPv4.
pub fn infer_ip_type(ip: &str) -> Option<IpType> {
    if ip.is_empty() {
        None
    } else if ip.contains(':') {
        Some(IpType::V6)
    } else {
        Some(IpType::V4)
    }
}

/// Numbers and numeric strings become finite `f64`s; everything else is `None`.
pub fn number_or_none(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                return None;
            }
            s.parse::<f64>().ok()?
        }
        _ => return None,
    };
    n.is_finite().then_some(n)
}

/// Rewrites a compact `+HHMM` offset as `+HH:MM`. Other non-empty input
/// passes through trimmed.
pub fn format_utc_offset(value: Option<&str>) -> Option<String> {
    let s = value?.trim();
    if s.is_empty() {
        return None;
    }

    let b = s.as_bytes();
    let signed = matches!(b[0], b'+' | b'-');
    let digits = |range: &[usize]| range.iter().all(|&i| b[i].is_ascii_digit());

    if signed && b.len() == 5 && digits(&[1, 2, 3, 4]) {
        return Some(format!("{}:{}", &s[..3], &s[3..]));
    }
    Some(s.to_string())
}

/// Turns a two-letter country code into its regional-indicator flag.
pub fn country_code_to_flag_emoji(code: Option<&str>) -> Option<String> {
    let code = code?;
    if code.chars().count() != 2 {
        return None;
    }
    code.chars()
        .map(|c| char::from_u32(c.to_ascii_uppercase() as u32 + REGIONAL_INDICATOR_OFFSET))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn number_or_none_accepts_numeric_strings() {
        assert_eq!(number_or_none(&json!("12.5")), Some(12.5));
        assert_eq!(number_or_none(&json!(" -33.86 ")), Some(-33.86));
        assert_eq!(number_or_none(&json!(40.7)), Some(40.7));
    }

    #[test]
    fn number_or_none_rejects_garbage() {
        assert_eq!(number_or_none(&json!("abc")), None);
        assert_eq!(number_or_none(&json!("")), None);
        assert_eq!(number_or_none(&json!("NaN")), None);
        assert_eq!(number_or_none(&json!("inf")), None);
        assert_eq!(number_or_none(&json!(f64::NAN)), None);
        assert_eq!(number_or_none(&Value::Null), None);
        assert_eq!(number_or_none(&json!(true)), None);
    }

    #[test]
    fn utc_offset_gains_a_colon() {
        assert_eq!(format_utc_offset(Some("+0530")).as_deref(), Some("+05:30"));
        assert_eq!(format_utc_offset(Some("-0800")).as_deref(), Some("-08:00"));
    }

    #[test]
    fn utc_offset_is_idempotent() {
        assert_eq!(format_utc_offset(Some("+05:30")).as_deref(), Some("+05:30"));
        let once = format_utc_offset(Some("+0930"));
        assert_eq!(format_utc_offset(once.as_deref()), once);
    }

    #[test]
    fn utc_offset_handles_missing_and_odd_values() {
        assert_eq!(format_utc_offset(None), None);
        assert_eq!(format_utc_offset(Some("   ")), None);
        assert_eq!(format_utc_offset(Some(" UTC ")).as_deref(), Some("UTC"));
        assert_eq!(format_utc_offset(Some("+530")).as_deref(), Some("+530"));
    }

    #[test]
    fn flag_emoji_from_country_code() {
        assert_eq!(
            country_code_to_flag_emoji(Some("US")).as_deref(),
            Some("\u{1F1FA}\u{1F1F8}")
        );
        assert_eq!(
            country_code_to_flag_emoji(Some("de")).as_deref(),
            Some("\u{1F1E9}\u{1F1EA}")
        );
        assert_eq!(country_code_to_flag_emoji(Some("USA")), None);
        assert_eq!(country_code_to_flag_emoji(Some("")), None);
        assert_eq!(country_code_to_flag_emoji(None), None);
    }

    #[test]
    fn ip_type_follows_the_colon() {
        assert_eq!(infer_ip_type("2001:db8::1"), Some(IpType::V6));
        assert_eq!(infer_ip_type("198.51.100.4"), Some(IpType::V4));
        assert_eq!(infer_ip_type(""), None);
    }

    #[test]
    fn ip_only_record_carries_nothing_else() {
        let record = normalize_ip_only("2001:db8::1");
        assert_eq!(record.ip, "2001:db8::1");
        assert_eq!(record.ip_type, Some(IpType::V6));
        assert_eq!(
            record,
            LocationRecord {
                ip: "2001:db8::1".into(),
                ip_type: Some(IpType::V6),
                ..Default::default()
            }
        );
    }

    fn ipwhois_sample() -> IpWhoisResponse {
        serde_json::from_value(json!({
            "ip": "8.8.8.8",
            "success": true,
            "type": "IPv4",
            "country": "United States",
            "country_code": "US",
            "region": "California",
            "city": "Mountain View",
            "postal": "94043",
            "latitude": 37.3860517,
            "longitude": "-122.0838511",
            "flag": { "img": "https://cdn.ipwhois.io/flags/us.svg", "emoji": "🇺🇸" },
            "connection": { "asn": 15169, "org": "Google LLC", "isp": "Google LLC", "domain": "google.com" },
            "timezone": {
                "id": "America/Los_Angeles",
                "abbr": "PDT",
                "is_dst": true,
                "offset": -25200,
                "utc": "-07:00",
                "current_time": "2024-06-01T10:00:00-07:00"
            },
            "security": { "anonymous": false, "proxy": false, "vpn": true, "tor": false, "hosting": false }
        }))
        .unwrap()
    }

    #[test]
    fn ipwho_is_maps_field_for_field() {
        let record = normalize_ipwho_is(&ipwhois_sample());
        assert_eq!(record.ip, "8.8.8.8");
        assert_eq!(record.ip_type, Some(IpType::V4));
        assert_eq!(record.city.as_deref(), Some("Mountain View"));
        assert_eq!(record.latitude, Some(37.3860517));
        assert_eq!(record.longitude, Some(-122.0838511));
        assert_eq!(record.connection.asn.as_deref(), Some("15169"));
        assert_eq!(record.connection.hostname, None);
        assert_eq!(record.flag.emoji.as_deref(), Some("🇺🇸"));
        assert_eq!(
            record.timezone.current_time.as_deref(),
            Some("2024-06-01T10:00:00-07:00")
        );
        assert_eq!(record.timezone.is_dst, Some(true));
        let security = record.security.unwrap();
        assert_eq!(security.vpn, Some(true));
        assert_eq!(security.relay, None);
    }

    #[test]
    fn ipwhois_io_recomputes_local_time() {
        let record = normalize_ipwhois_io(&ipwhois_sample());
        let local = record.timezone.current_time.unwrap();
        assert_ne!(local, "2024-06-01T10:00:00-07:00");
        assert_eq!(local.len(), "2024-06-01, 10:00:00".len());
        assert_eq!(record.timezone.is_dst, Some(true));
        assert_eq!(record.timezone.utc.as_deref(), Some("-07:00"));
    }

    #[test]
    fn ipwhois_io_falls_back_to_dst_heuristic() {
        let raw: IpWhoisResponse = serde_json::from_value(json!({
            "ip": "1.1.1.1",
            "timezone": { "id": "UTC" }
        }))
        .unwrap();
        let record = normalize_ipwhois_io(&raw);
        assert_eq!(record.timezone.is_dst, Some(false));
    }

    #[test]
    fn ipwhois_failure_uses_message() {
        let raw: IpWhoisResponse =
            serde_json::from_value(json!({ "success": false, "message": "Reserved range" })).unwrap();
        assert_eq!(raw.failure("IPWHO.IS").as_deref(), Some("Reserved range"));

        let raw: IpWhoisResponse = serde_json::from_value(json!({ "success": false })).unwrap();
        assert_eq!(raw.failure("IPWHOIS.IO").as_deref(), Some("IPWHOIS.IO FAILED"));

        assert_eq!(ipwhois_sample().failure("IPWHO.IS"), None);
    }

    #[test]
    fn ipapi_co_is_remapped() {
        let raw: IpApiCoResponse = serde_json::from_value(json!({
            "ip": "2001:db8::5",
            "version": "IPv6",
            "city": "Pune",
            "region": "Maharashtra",
            "country": "IN",
            "country_name": "India",
            "country_code": "IN",
            "postal": "411001",
            "latitude": 18.52,
            "longitude": 73.86,
            "timezone": "Asia/Kolkata",
            "utc_offset": "+0530",
            "asn": "AS55836",
            "org": "Reliance Jio Infocomm Limited"
        }))
        .unwrap();
        assert_eq!(raw.failure(), None);

        let record = normalize_ipapi_co(&raw);
        assert_eq!(record.ip_type, Some(IpType::V6));
        assert_eq!(record.country.as_deref(), Some("India"));
        assert_eq!(record.connection.isp, record.connection.org);
        assert_eq!(record.connection.asn.as_deref(), Some("AS55836"));
        assert_eq!(record.flag.emoji.as_deref(), Some("\u{1F1EE}\u{1F1F3}"));
        assert_eq!(record.timezone.utc.as_deref(), Some("+05:30"));
        assert_eq!(record.timezone.id.as_deref(), Some("Asia/Kolkata"));
        assert_eq!(record.timezone.is_dst, Some(false));
        assert!(record.timezone.current_time.is_some());
        assert_eq!(record.security, None);
    }

    #[test]
    fn ipapi_co_error_reason_wins() {
        let raw: IpApiCoResponse =
            serde_json::from_value(json!({ "error": true, "reason": "RateLimited", "message": "slow down" }))
                .unwrap();
        assert_eq!(raw.failure().as_deref(), Some("RateLimited"));

        let raw: IpApiCoResponse = serde_json::from_value(json!({ "error": true })).unwrap();
        assert_eq!(raw.failure().as_deref(), Some("IPAPI.CO FAILED"));

        let raw: IpApiCoResponse = serde_json::from_value(json!({ "error": false, "ip": "1.2.3.4" })).unwrap();
        assert_eq!(raw.failure(), None);
    }

    #[test]
    fn ipapi_co_tolerates_missing_country_name() {
        let raw: IpApiCoResponse =
            serde_json::from_value(json!({ "ip": "1.2.3.4", "country": "AU", "latitude": "n/a" })).unwrap();
        let record = normalize_ipapi_co(&raw);
        assert_eq!(record.country.as_deref(), Some("AU"));
        assert_eq!(record.latitude, None);
        assert_eq!(record.flag.emoji, None);
        assert_eq!(record.timezone, Timezone::default());
    }
}
