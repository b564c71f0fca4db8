//! Event types and the main event loop driver.
//!
//! [`EventHandler`] runs a background task that polls crossterm for terminal
//! input and emits periodic [`Event::Tick`]s. Lookup and speed-test tasks post
//! their results through a clone of [`EventHandler::tx`].

use crate::location::LookupOutcome;
use crate::speedtest::ThroughputResult;
use crossterm::event::{self, Event as CrosstermEvent, KeyEvent, KeyEventKind};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::error;

/// Events processed by the application event loop.
#[derive(Debug)]
pub enum Event {
    Tick,
    Input(KeyEvent),
    /// Terminal resized to (columns, rows).
    Resize(u16, u16),
    /// The fast address-only lookup finished.
    SeedIp(Option<String>),
    /// The full lookup settled.
    Lookup(LookupOutcome),
    SpeedTest(ThroughputResult),
}

/// Multiplexes terminal input and ticks into a single event stream.
pub struct EventHandler {
    pub tx: mpsc::UnboundedSender<Event>,
    rx: mpsc::UnboundedReceiver<Event>,
}

impl EventHandler {
    /// Spawns the input/tick task. It exits if the terminal can no longer be
    /// read or the receiver is dropped.
    pub fn new(tick_rate_ms: u64) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let event_tx = tx.clone();

        tokio::spawn(async move {
            let tick_rate = Duration::from_millis(tick_rate_ms);
            let mut last_tick = Instant::now();
            loop {
                let timeout = tick_rate
                    .checked_sub(last_tick.elapsed())
                    .unwrap_or(Duration::from_secs(0));

                match event::poll(timeout) {
                    Ok(true) => match event::read() {
                        Ok(CrosstermEvent::Key(key)) if key.kind == KeyEventKind::Press => {
                            event_tx.send(Event::Input(key)).ok();
                        }
                        Ok(CrosstermEvent::Resize(cols, rows)) => {
                            event_tx.send(Event::Resize(cols, rows)).ok();
                        }
                        Ok(_) => {}
                        Err(e) => {
                            error!("Terminal read failed: {}", e);
                            break;
                        }
                    },
                    Ok(false) => {}
                    Err(e) => {
                        error!("Terminal poll failed: {}", e);
                        break;
                    }
                }

                if last_tick.elapsed() >= tick_rate {
                    if event_tx.send(Event::Tick).is_err() {
                        break;
                    }
                    last_tick = Instant::now();
                }
            }
        });

        Self { tx, rx }
    }

    /// Returns `None` once every sender is gone.
    pub async fn next(&mut self) -> Option<Event> {
        self.rx.recv().await
    }
}
