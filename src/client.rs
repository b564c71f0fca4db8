//! Local client/device signals, collected synchronously with no network.
//!
//! Everything is read through [`PlatformProbe`] so the derivations can be
//! exercised without touching the real environment. Signals a terminal
//! process has no way to observe are reported as `None` and shown as `N/A`.

use serde::{Deserialize, Serialize};
use sysinfo::System;

/// User-agent substrings that mark a mobile device.
const MOBILE_TOKENS: [&str; 5] = ["MOBILE", "ANDROID", "IPHONE", "IPAD", "IPOD"];

pub const NO_PREFERENCE: &str = "NO-PREFERENCE";

/// The user agent sent with every outbound request.
pub fn user_agent() -> String {
    format!(
        "{}/{} ({}; {})",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS,
        std::env::consts::ARCH
    )
}

/// Read access to the host. [`SystemProbe`] is the real one.
pub trait PlatformProbe {
    fn env(&self, key: &str) -> Option<String>;
    fn os(&self) -> &str;
    fn arch(&self) -> &str;
    fn user_agent(&self) -> String;
    /// Terminal size in character cells (columns, rows).
    fn terminal_cells(&self) -> Option<(u16, u16)>;
    /// Terminal size in pixels (width, height), where the terminal reports it.
    fn terminal_pixels(&self) -> Option<(u16, u16)>;
    fn time_zone(&self) -> Option<String>;
    fn logical_cpus(&self) -> Option<usize>;
    fn total_memory_bytes(&self) -> Option<u64>;
    fn cpu_brand(&self) -> Option<String>;
    fn os_long_version(&self) -> Option<String>;
}

pub struct SystemProbe {
    system: System,
}

impl SystemProbe {
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_memory();
        system.refresh_cpu_all();
        Self { system }
    }
}

impl Default for SystemProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl PlatformProbe for SystemProbe {
    fn env(&self, key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|v| !v.trim().is_empty())
    }

    fn os(&self) -> &str {
        std::env::consts::OS
    }

    fn arch(&self) -> &str {
        std::env::consts::ARCH
    }

    fn user_agent(&self) -> String {
        user_agent()
    }

    fn terminal_cells(&self) -> Option<(u16, u16)> {
        crossterm::terminal::size().ok()
    }

    fn terminal_pixels(&self) -> Option<(u16, u16)> {
        crossterm::terminal::window_size()
            .ok()
            .filter(|w| w.width > 0 && w.height > 0)
            .map(|w| (w.width, w.height))
    }

    fn time_zone(&self) -> Option<String> {
        iana_time_zone::get_timezone().ok()
    }

    fn logical_cpus(&self) -> Option<usize> {
        std::thread::available_parallelism().ok().map(|n| n.get())
    }

    fn total_memory_bytes(&self) -> Option<u64> {
        Some(self.system.total_memory()).filter(|&b| b > 0)
    }

    fn cpu_brand(&self) -> Option<String> {
        self.system
            .cpus()
            .first()
            .map(|cpu| cpu.brand().trim().to_string())
            .filter(|brand| !brand.is_empty())
    }

    fn os_long_version(&self) -> Option<String> {
        System::long_os_version()
    }
}

/// Snapshot of client signals, taken once at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientCapabilities {
    pub user_agent: String,
    pub languages: Option<String>,
    pub platform: String,
    pub mobile: bool,
    pub max_touch_points: Option<u32>,
    pub online: Option<bool>,
    pub cookie_enabled: Option<bool>,
    pub do_not_track: Option<String>,
    pub locale: Option<String>,
    pub time_zone: Option<String>,
    pub prefers_color_scheme: String,
    pub prefers_reduced_motion: String,
    pub connection_type: Option<String>,
    pub effective_type: Option<String>,
    pub downlink: Option<f64>,
    pub rtt: Option<u32>,
    pub save_data: Option<bool>,
    pub screen_width: Option<u16>,
    pub screen_height: Option<u16>,
    pub avail_width: Option<u16>,
    pub avail_height: Option<u16>,
    pub viewport_width: Option<u16>,
    pub viewport_height: Option<u16>,
    pub device_pixel_ratio: f64,
    pub color_depth: Option<u8>,
    pub hardware_concurrency: Option<usize>,
    /// Rounded to whole gigabytes.
    pub device_memory: Option<u64>,
    pub cpu_class: Option<String>,
    pub user_agent_data_platform: Option<String>,
    pub user_agent_brands: Option<String>,
    pub webdriver: bool,
}

impl ClientCapabilities {
    /// Only the viewport is refreshed after startup (on terminal resize).
    pub fn refresh_viewport(&mut self, columns: u16, rows: u16) {
        self.viewport_width = Some(columns);
        self.viewport_height = Some(rows);
    }
}

/// Collects from the real host.
pub fn collect_client_data() -> ClientCapabilities {
    collect_with(&SystemProbe::new())
}

pub fn collect_with(probe: &dyn PlatformProbe) -> ClientCapabilities {
    let user_agent = probe.user_agent();
    let platform_hint = matches!(probe.os(), "android" | "ios");
    let cells = probe.terminal_cells();
    let pixels = probe.terminal_pixels();

    ClientCapabilities {
        mobile: is_mobile(platform_hint, &user_agent),
        user_agent,
        languages: languages(probe),
        platform: format!("{} {}", probe.os(), probe.arch()),
        max_touch_points: None,
        online: None,
        cookie_enabled: None,
        do_not_track: probe.env("DO_NOT_TRACK"),
        locale: locale(probe),
        time_zone: probe.time_zone(),
        prefers_color_scheme: color_scheme(probe).to_string(),
        prefers_reduced_motion: reduced_motion(probe).to_string(),
        connection_type: None,
        effective_type: None,
        downlink: None,
        rtt: None,
        save_data: None,
        screen_width: pixels.map(|p| p.0),
        screen_height: pixels.map(|p| p.1),
        avail_width: pixels.map(|p| p.0),
        avail_height: pixels.map(|p| p.1),
        viewport_width: cells.map(|c| c.0),
        viewport_height: cells.map(|c| c.1),
        device_pixel_ratio: 1.0,
        color_depth: color_depth(probe),
        hardware_concurrency: probe.logical_cpus(),
        device_memory: probe
            .total_memory_bytes()
            .map(|b| (b as f64 / 1_073_741_824.0).round() as u64),
        cpu_class: probe.cpu_brand(),
        user_agent_data_platform: probe.os_long_version(),
        user_agent_brands: Some(format!(
            "{} {}",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION")
        )),
        webdriver: probe.env("CI").is_some(),
    }
}

pub fn is_mobile(platform_hint: bool, user_agent: &str) -> bool {
    let ua = user_agent.to_uppercase();
    platform_hint || MOBILE_TOKENS.iter().any(|token| ua.contains(token))
}

/// `en_US.UTF-8` / `de_DE@euro` to `en-US` / `de-DE`. `C` and `POSIX` carry no locale.
pub fn normalize_locale(raw: &str) -> Option<String> {
    let tag = raw.split(['.', '@']).next().unwrap_or_default().trim();
    if tag.is_empty() || tag == "C" || tag == "POSIX" {
        return None;
    }
    Some(tag.replace('_', "-"))
}

fn languages(probe: &dyn PlatformProbe) -> Option<String> {
    let list: Vec<String> = match probe.env("LANGUAGE") {
        Some(value) => value.split(':').filter_map(normalize_locale).collect(),
        None => ["LC_ALL", "LC_MESSAGES", "LANG"]
            .iter()
            .find_map(|key| probe.env(key).and_then(|v| normalize_locale(&v)))
            .into_iter()
            .collect(),
    };
    (!list.is_empty()).then(|| list.join(", "))
}

fn locale(probe: &dyn PlatformProbe) -> Option<String> {
    ["LC_ALL", "LC_TIME", "LANG"]
        .iter()
        .find_map(|key| probe.env(key).and_then(|v| normalize_locale(&v)))
}

/// Background colour index from `COLORFGBG` (e.g. `15;0`), the closest thing a
/// terminal has to a colour-scheme media query.
fn terminal_background(probe: &dyn PlatformProbe) -> Option<u8> {
    probe
        .env("COLORFGBG")?
        .rsplit(';')
        .next()
        .and_then(|bg| bg.trim().parse().ok())
}

fn color_scheme(probe: &dyn PlatformProbe) -> &'static str {
    let background = terminal_background(probe);
    let prefers_dark = background.is_some_and(|bg| bg <= 6 || bg == 8);
    let prefers_light = background.is_some_and(|bg| bg == 7 || (9..=15).contains(&bg));

    if prefers_dark {
        "DARK"
    } else if prefers_light {
        "LIGHT"
    } else {
        NO_PREFERENCE
    }
}

fn reduced_motion(probe: &dyn PlatformProbe) -> &'static str {
    let reduce = probe
        .env("PREFERS_REDUCED_MOTION")
        .is_some_and(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "reduce"));
    if reduce {
        "REDUCE"
    } else {
        NO_PREFERENCE
    }
}

fn color_depth(probe: &dyn PlatformProbe) -> Option<u8> {
    let colorterm = probe.env("COLORTERM").unwrap_or_default().to_ascii_lowercase();
    if colorterm == "truecolor" || colorterm == "24bit" {
        return Some(24);
    }
    probe
        .env("TERM")
        .filter(|term| term.ends_with("256color"))
        .map(|_| 8)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;

    #[derive(Default)]
    pub(crate) struct FakeProbe {
        pub vars: HashMap<&'static str, &'static str>,
        pub os: &'static str,
        pub ua: String,
        pub cells: Option<(u16, u16)>,
        pub memory: Option<u64>,
    }

    impl PlatformProbe for FakeProbe {
        fn env(&self, key: &str) -> Option<String> {
            self.vars.get(key).map(|v| v.to_string())
        }
        fn os(&self) -> &str {
            self.os
        }
        fn arch(&self) -> &str {
            "x86_64"
        }
        fn user_agent(&self) -> String {
            self.ua.clone()
        }
        fn terminal_cells(&self) -> Option<(u16, u16)> {
            self.cells
        }
        fn terminal_pixels(&self) -> Option<(u16, u16)> {
            None
        }
        fn time_zone(&self) -> Option<String> {
            Some("Europe/Berlin".into())
        }
        fn logical_cpus(&self) -> Option<usize> {
            Some(8)
        }
        fn total_memory_bytes(&self) -> Option<u64> {
            self.memory
        }
        fn cpu_brand(&self) -> Option<String> {
            None
        }
        fn os_long_version(&self) -> Option<String> {
            None
        }
    }

    fn probe(vars: &[(&'static str, &'static str)]) -> FakeProbe {
        FakeProbe {
            vars: vars.iter().copied().collect(),
            os: "linux",
            ua: "whatsmyip-tui/0.1.0 (linux; x86_64)".into(),
            ..Default::default()
        }
    }

    /// A desktop Linux snapshot for other modules' tests.
    pub(crate) fn sample_client() -> ClientCapabilities {
        let mut p = probe(&[("LANG", "en_US.UTF-8")]);
        p.cells = Some((120, 40));
        collect_with(&p)
    }

    #[test]
    fn mobile_from_hint_or_user_agent() {
        assert!(is_mobile(true, "desktop"));
        assert!(is_mobile(false, "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0)"));
        assert!(is_mobile(false, "something android-ish"));
        assert!(!is_mobile(false, "whatsmyip-tui/0.1.0 (linux; x86_64)"));

        let mut p = probe(&[]);
        p.os = "android";
        assert!(collect_with(&p).mobile);
    }

    #[test]
    fn locale_strips_encoding_and_modifier() {
        assert_eq!(normalize_locale("en_US.UTF-8").as_deref(), Some("en-US"));
        assert_eq!(normalize_locale("de_DE@euro").as_deref(), Some("de-DE"));
        assert_eq!(normalize_locale("C.UTF-8"), None);
        assert_eq!(normalize_locale("POSIX"), None);
    }

    #[test]
    fn languages_prefer_language_list() {
        let caps = collect_with(&probe(&[("LANGUAGE", "fr_CA:fr:en"), ("LANG", "en_US.UTF-8")]));
        assert_eq!(caps.languages.as_deref(), Some("fr-CA, fr, en"));
        assert_eq!(caps.locale.as_deref(), Some("en-US"));

        let caps = collect_with(&probe(&[("LANG", "pt_BR.UTF-8")]));
        assert_eq!(caps.languages.as_deref(), Some("pt-BR"));
    }

    #[test]
    fn missing_signals_are_not_available() {
        let caps = collect_with(&probe(&[]));
        assert_eq!(caps.languages, None);
        assert_eq!(caps.locale, None);
        assert_eq!(caps.do_not_track, None);
        assert_eq!(caps.viewport_width, None);
        assert_eq!(caps.device_memory, None);
        assert_eq!(caps.connection_type, None);
        assert_eq!(caps.color_depth, None);
        assert_eq!(caps.prefers_color_scheme, NO_PREFERENCE);
        assert_eq!(caps.prefers_reduced_motion, NO_PREFERENCE);
        assert!(!caps.webdriver);
        assert_eq!(caps.time_zone.as_deref(), Some("Europe/Berlin"));
        assert_eq!(caps.platform, "linux x86_64");
    }

    #[test]
    fn color_scheme_from_terminal_background() {
        let dark = collect_with(&probe(&[("COLORFGBG", "15;0")]));
        assert_eq!(dark.prefers_color_scheme, "DARK");
        let light = collect_with(&probe(&[("COLORFGBG", "0;default;15")]));
        assert_eq!(light.prefers_color_scheme, "LIGHT");
        let unknown = collect_with(&probe(&[("COLORFGBG", "default;default")]));
        assert_eq!(unknown.prefers_color_scheme, NO_PREFERENCE);
    }

    #[test]
    fn depth_motion_and_automation_flags() {
        let caps = collect_with(&probe(&[
            ("COLORTERM", "truecolor"),
            ("PREFERS_REDUCED_MOTION", "1"),
            ("CI", "true"),
            ("DO_NOT_TRACK", "1"),
        ]));
        assert_eq!(caps.color_depth, Some(24));
        assert_eq!(caps.prefers_reduced_motion, "REDUCE");
        assert!(caps.webdriver);
        assert_eq!(caps.do_not_track.as_deref(), Some("1"));

        let caps = collect_with(&probe(&[("TERM", "xterm-256color")]));
        assert_eq!(caps.color_depth, Some(8));
    }

    #[test]
    fn viewport_and_memory() {
        let mut p = probe(&[]);
        p.cells = Some((120, 40));
        p.memory = Some(16 * 1_073_741_824 - 300_000_000);
        let mut caps = collect_with(&p);
        assert_eq!((caps.viewport_width, caps.viewport_height), (Some(120), Some(40)));
        assert_eq!(caps.device_memory, Some(16));

        caps.refresh_viewport(80, 24);
        assert_eq!((caps.viewport_width, caps.viewport_height), (Some(80), Some(24)));
        assert_eq!(caps.hardware_concurrency, Some(8));
    }
}
