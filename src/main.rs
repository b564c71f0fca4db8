use color_eyre::Result;
use ratatui::{backend::CrosstermBackend, Terminal};
use std::{io, sync::Arc};
use tracing::{debug, info};
use whatsmyip_tui::{
    app::{Action, App},
    client::collect_client_data,
    config::Config,
    events::{Event, EventHandler},
    location::{
        build_http_client, fetch_ip_data, fetch_public_ip_only, geo_chain, public_ip_chain,
        resolve_location,
    },
    logging,
    speedtest::SpeedTester,
    ui,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Instrumentation and safety
    let _log_guard = logging::initialize_logging();
    install_panic_hook();
    color_eyre::install()?;

    let config = Config::load();
    let http = build_http_client(&config.lookup)?;
    let client = collect_client_data();
    info!("Client collected: {} / {}", client.platform, client.user_agent);

    let mut terminal = setup_terminal()?;
    let mut app = App::new(config.clone(), client);
    let mut events = EventHandler::new(config.ui.tick_rate_ms);

    // Fast address-only lookup; its handle doubles as the fallback for the full chain.
    let seed_tx = events.tx.clone();
    let seed_http = http.clone();
    let seed_providers = public_ip_chain(&config.lookup);
    let seed = tokio::spawn(async move {
        let ip = fetch_public_ip_only(&seed_http, &seed_providers).await.ok();
        seed_tx.send(Event::SeedIp(ip.clone())).ok();
        ip
    });

    let lookup_tx = events.tx.clone();
    let lookup_http = http.clone();
    let geo_providers = geo_chain(&config.lookup);
    tokio::spawn(async move {
        let outcome = resolve_location(fetch_ip_data(&lookup_http, &geo_providers), async move {
            seed.await.ok().flatten()
        })
        .await;
        lookup_tx.send(Event::Lookup(outcome)).ok();
    });

    let tester = Arc::new(SpeedTester::new(http, config.speed_test.clone()));

    // Main loop
    while !app.should_quit {
        terminal.draw(|f| ui::render(f, &app))?;

        let Some(event) = events.next().await else {
            break;
        };
        match event {
            Event::Tick => app.on_tick(),
            Event::Resize(cols, rows) => app.on_resize(cols, rows),
            Event::SeedIp(ip) => app.on_seed_ip(ip),
            Event::Lookup(outcome) => app.on_lookup(outcome),
            Event::SpeedTest(result) => app.on_speed_test(result),
            Event::Input(key) => match app.handle_key(key) {
                Some(Action::RunSpeedTest) => {
                    let tester = Arc::clone(&tester);
                    let tx = events.tx.clone();
                    tokio::spawn(async move {
                        if let Some(result) = tester.run().await {
                            tx.send(Event::SpeedTest(result)).ok();
                        }
                    });
                }
                Some(Action::Export) => app.export_report(),
                None => {}
            },
        }
    }

    debug!("Shutting down");
    restore_terminal(terminal)?;
    Ok(())
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<io::Stdout>>> {
    crossterm::terminal::enable_raw_mode()?;
    let mut stdout = io::stdout();
    crossterm::execute!(stdout, crossterm::terminal::EnterAlternateScreen, crossterm::cursor::Hide)?;
    Ok(Terminal::new(CrosstermBackend::new(stdout))?)
}

fn restore_terminal(mut terminal: Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    crossterm::terminal::disable_raw_mode()?;
    crossterm::execute!(terminal.backend_mut(), crossterm::terminal::LeaveAlternateScreen, crossterm::cursor::Show)?;
    Ok(())
}

fn install_panic_hook() {
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        // Force terminal cleanup!
        crossterm::terminal::disable_raw_mode().ok();
        crossterm::execute!(std::io::stdout(), crossterm::terminal::LeaveAlternateScreen, crossterm::cursor::Show).ok();
        original_hook(panic_info);
    }));
}
