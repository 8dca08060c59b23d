use anyhow::Result;
use std::sync::Arc;
use tokio::signal;

mod watch_logic;
use watch_logic::{config, logger, render};

use lib_livemap::{ConnectionManager, HttpCatalog, Line, MapView};

fn main() -> Result<()> {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    let config = config::load_config();
    logger::setup_logging(&config.log_dir(), config.log_level(), false)?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(run(config))
}

async fn run(config: config::Config) -> Result<()> {
    log::info!("Starting livemap_watch against {}", config.api_url());

    // --- Wiring ---
    let catalog = Arc::new(HttpCatalog::new(&config.catalog_config())?);
    let feed = ConnectionManager::new(config.feed_config());
    let map = MapView::new(catalog, config.tracker_config());
    map.connect(&feed)?;

    // --- Initial user actions ---
    if let Err(e) = map.load_lines().await {
        log::warn!("Starting without a line list: {}", e);
    }
    for line_id in config.lines.clone().unwrap_or_default() {
        let known = map.lines().borrow().iter().find(|line| line.id == line_id).cloned();
        let line = known.unwrap_or_else(|| Line {
            name: line_id.clone(),
            id: line_id,
            color: String::new(),
        });
        map.activate_line(&line);
    }
    if let Some(bus_id) = &config.select {
        map.select_vehicle(bus_id);
    }

    // --- Render loop ---
    let mut markers = map.markers();
    let mut routes = map.visible_routes();
    let mut detail = map.current_bus();
    let mut state = feed.state();
    let mut ticker = tokio::time::interval(config.render_interval());
    let mut first_frame = true;

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = ticker.tick() => {
                let dirty = markers.has_changed()
                    || routes.has_changed()
                    || detail.has_changed()
                    || state.has_changed();
                if !dirty && !first_frame {
                    continue;
                }
                first_frame = false;

                let screen = render::render_screen(
                    *state.borrow_and_update(),
                    feed.retry_count(),
                    &markers.borrow_and_update(),
                    &routes.borrow_and_update(),
                    Option::as_ref(&detail.borrow_and_update()),
                );
                // Clear the terminal and redraw from the top
                println!("\x1B[2J\x1B[H{}", screen);
            }
        }
    }

    // --- Orderly shutdown ---
    map.shutdown();
    feed.shutdown();
    log::info!("Shutdown complete.");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            log::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut term_signal) => {
                term_signal.recv().await;
            }
            Err(e) => {
                log::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => log::info!("Ctrl-C received, initiating shutdown."),
        _ = terminate => log::info!("SIGTERM received, initiating shutdown."),
    }
}
