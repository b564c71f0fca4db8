use crate::client::ClientCapabilities;
use crate::config::Config;
use crate::display::{self, field_tooltip, Row};
use crate::location::{LocationRecord, LookupOutcome};
use crate::report::DiagnosticsReport;
use crate::speedtest::ThroughputResult;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use tracing::{info, warn};

pub const IP_ONLY_SUMMARY: &str =
    "I could read your IP, but the location provider didn't return full details.";
pub const UNAVAILABLE_SUMMARY: &str = "I couldn't read your public IP details right now.";
const PENDING_SUMMARY: &str = "Looking up your connection...";

#[derive(Debug, PartialEq, Clone, Copy, Default)]
pub enum ViewMode {
    #[default]
    Network,
    Geo,
    Client,
    Device,
    Speed,
    Raw,
}

impl ViewMode {
    pub const ALL: [ViewMode; 6] = [
        ViewMode::Network,
        ViewMode::Geo,
        ViewMode::Client,
        ViewMode::Device,
        ViewMode::Speed,
        ViewMode::Raw,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            ViewMode::Network => "NETWORK",
            ViewMode::Geo => "GEO",
            ViewMode::Client => "CLIENT",
            ViewMode::Device => "DEVICE",
            ViewMode::Speed => "SPEED",
            ViewMode::Raw => "RAW JSON",
        }
    }

    /// Matches the `default_view` names in config.toml, ignoring case.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "network" => Some(ViewMode::Network),
            "geo" => Some(ViewMode::Geo),
            "client" => Some(ViewMode::Client),
            "device" => Some(ViewMode::Device),
            "speed" => Some(ViewMode::Speed),
            "raw" => Some(ViewMode::Raw),
            _ => None,
        }
    }

    pub fn index(&self) -> usize {
        Self::ALL.iter().position(|v| v == self).unwrap_or(0)
    }

    pub fn next(&self) -> Self {
        Self::ALL[(self.index() + 1) % Self::ALL.len()]
    }

    pub fn prev(&self) -> Self {
        Self::ALL[(self.index() + Self::ALL.len() - 1) % Self::ALL.len()]
    }
}

/// Where the startup lookups stand.
#[derive(Debug, Clone, PartialEq)]
pub enum LocationState {
    /// The full chain is still running; the fast chain may already have an address.
    Pending { seeded_ip: Option<String> },
    Settled(LookupOutcome),
}

/// Side effects a key press asks the event loop to perform.
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum Action {
    RunSpeedTest,
    Export,
}

pub struct App {
    pub config: Config,
    pub client: ClientCapabilities,
    pub location: LocationState,
    pub speed_result: Option<ThroughputResult>,
    pub speed_running: bool,
    pub view_mode: ViewMode,
    pub selected_row: usize,
    pub tick_count: usize,
    pub should_quit: bool,
    pub status_message: Option<String>,
}

impl App {
    pub fn new(config: Config, client: ClientCapabilities) -> Self {
        let view_mode = ViewMode::from_name(&config.ui.default_view).unwrap_or_else(|| {
            warn!("Unknown default_view {:?}; using Network", config.ui.default_view);
            ViewMode::Network
        });

        Self {
            config,
            client,
            location: LocationState::Pending { seeded_ip: None },
            speed_result: None,
            speed_running: false,
            view_mode,
            selected_row: 0,
            tick_count: 0,
            should_quit: false,
            status_message: None,
        }
    }

    pub fn on_tick(&mut self) {
        self.tick_count = self.tick_count.wrapping_add(1);
    }

    pub fn on_resize(&mut self, columns: u16, rows: u16) {
        self.client.refresh_viewport(columns, rows);
    }

    pub fn on_seed_ip(&mut self, ip: Option<String>) {
        if let LocationState::Pending { seeded_ip } = &mut self.location {
            *seeded_ip = ip;
        }
    }

    pub fn on_lookup(&mut self, outcome: LookupOutcome) {
        self.location = LocationState::Settled(outcome);
    }

    pub fn on_speed_test(&mut self, result: ThroughputResult) {
        self.speed_running = false;
        self.status_message = Some(result.status_label.clone());
        self.speed_result = Some(result);
    }

    pub fn record(&self) -> Option<&LocationRecord> {
        match &self.location {
            LocationState::Settled(outcome) => outcome.record(),
            LocationState::Pending { .. } => None,
        }
    }

    pub fn lookup_error(&self) -> Option<&str> {
        match &self.location {
            LocationState::Settled(outcome) => outcome.error(),
            LocationState::Pending { .. } => None,
        }
    }

    /// The big address in the header.
    pub fn displayed_ip(&self) -> String {
        match &self.location {
            LocationState::Settled(LookupOutcome::Unavailable { .. }) => "UNAVAILABLE".to_string(),
            LocationState::Settled(outcome) => outcome
                .record()
                .map(|r| r.ip.clone())
                .unwrap_or_default(),
            LocationState::Pending { seeded_ip: Some(ip) } => ip.clone(),
            LocationState::Pending { seeded_ip: None } => "...".to_string(),
        }
    }

    pub fn summary(&self) -> String {
        match &self.location {
            LocationState::Pending { .. } => PENDING_SUMMARY.to_string(),
            LocationState::Settled(LookupOutcome::Full(record)) => {
                display::compact_summary(record, &self.client)
            }
            LocationState::Settled(LookupOutcome::IpOnly { .. }) => IP_ONLY_SUMMARY.to_string(),
            LocationState::Settled(LookupOutcome::Unavailable { .. }) => {
                UNAVAILABLE_SUMMARY.to_string()
            }
        }
    }

    /// Rows for the current view. The raw view renders JSON instead.
    pub fn rows(&self) -> Vec<Row> {
        let empty = LocationRecord::default();
        let record = self.record().unwrap_or(&empty);
        match self.view_mode {
            ViewMode::Network => display::network_rows(record),
            ViewMode::Geo => display::geo_rows(record),
            ViewMode::Client => display::client_rows(&self.client),
            ViewMode::Device => display::device_rows(&self.client),
            ViewMode::Speed => display::speed_rows(
                &self.client,
                self.speed_result.as_ref(),
                self.speed_running,
                &self.config.speed_test.server_label,
            ),
            ViewMode::Raw => Vec::new(),
        }
    }

    pub fn selected_tooltip(&self) -> Option<&'static str> {
        self.rows()
            .get(self.selected_row)
            .and_then(|row| field_tooltip(row.key))
    }

    pub fn report(&self) -> DiagnosticsReport<'_> {
        DiagnosticsReport {
            error: self.lookup_error(),
            ip_api: self.record(),
            client: &self.client,
            speed_test: self.speed_result.as_ref(),
        }
    }

    pub fn raw_json(&self) -> String {
        self.report()
            .to_json()
            .unwrap_or_else(|e| format!("{{\"error\": \"{e}\"}}"))
    }

    pub fn export_report(&mut self) {
        let path = self.config.ui.export_path.clone();
        let message = match self.report().write_to(&path) {
            Ok(()) => format!("EXPORTED TO {path}"),
            Err(e) => {
                warn!("Export to {} failed: {}", path, e);
                format!("EXPORT FAILED: {e}")
            }
        };
        self.status_message = Some(message);
    }

    fn set_view(&mut self, view: ViewMode) {
        self.view_mode = view;
        self.selected_row = 0;
    }

    /// Row count the cursor moves over; the raw view scrolls by line.
    fn row_count(&self) -> usize {
        match self.view_mode {
            ViewMode::Raw => self.raw_json().lines().count(),
            _ => self.rows().len(),
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> Option<Action> {
        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.should_quit = true
            }
            KeyCode::Tab | KeyCode::Right => self.set_view(self.view_mode.next()),
            KeyCode::BackTab | KeyCode::Left => self.set_view(self.view_mode.prev()),
            KeyCode::Char(c @ '1'..='6') => {
                let index = c as usize - '1' as usize;
                self.set_view(ViewMode::ALL[index]);
            }
            KeyCode::Down | KeyCode::Char('j') => {
                let count = self.row_count();
                if count > 0 {
                    self.selected_row = (self.selected_row + 1) % count;
                }
            }
            KeyCode::Up | KeyCode::Char('k') => {
                let count = self.row_count();
                if count > 0 {
                    self.selected_row = self.selected_row.checked_sub(1).unwrap_or(count - 1);
                }
            }
            KeyCode::Char('t') => {
                if self.speed_running {
                    return None;
                }
                info!("Speed test requested");
                self.speed_running = true;
                self.status_message = Some("RUNNING SPEED TEST...".to_string());
                return Some(Action::RunSpeedTest);
            }
            KeyCode::Char('e') => return Some(Action::Export),
            _ => {}
        }
        None
    }
}
