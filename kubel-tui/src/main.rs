//! Terminal UI for kubel that imports the address registries and lets an
//! operator correct rejected rows.

mod app;
mod input;
mod logging;
mod ui;

use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration as StdDuration,
};

use anyhow::{Context, Result};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event as CEvent},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use kubel_core::{
    config::AppConfig,
    model::SourceKind,
    plugin::SourceRegistry,
    ports::AddressStore,
    service::{ImportService, RegistryFile},
    store::JsonFileStore,
};
use kubel_source_commercial as commercial;
use kubel_source_residential as residential;
use kubel_store_http::HttpAddressStore;
use ratatui::{Terminal, backend::CrosstermBackend};
use reqwest::Client;
use tracing::{error, info};

use crate::app::{App, Screen};
use crate::input::Action;

/// Command line: `kubel-tui [--config FILE] [COMMERCIAL_FILE [RESIDENTIAL_FILE]]`.
#[derive(Debug, Default)]
struct Args {
    config: Option<PathBuf>,
    commercial: Option<PathBuf>,
    residential: Option<PathBuf>,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Args> {
    let mut parsed = Args::default();
    let mut positional = Vec::new();
    while let Some(arg) = args.next() {
        if arg == "--config" {
            let path = args.next().context("--config needs a file path")?;
            parsed.config = Some(PathBuf::from(path));
        } else {
            positional.push(PathBuf::from(arg));
        }
    }
    let mut positional = positional.into_iter();
    parsed.commercial = positional.next();
    parsed.residential = positional.next();
    Ok(parsed)
}

/// Start logging, then load the configuration so its overrides are logged.
fn start_up(args: &Args, data_dir: &Path) -> Result<AppConfig> {
    logging::init_logging(data_dir)?;
    let config = AppConfig::load_with_env(args.config.as_deref())?;
    info!(
        config = ?args.config,
        store_url = config.store.base_url.is_some(),
        "configuration loaded"
    );
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = parse_args(std::env::args().skip(1))?;
    let data_dir = AppConfig::data_dir()?;
    let config = start_up(&args, &data_dir)?;

    // Store + service setup
    let (store, store_label): (Arc<dyn AddressStore>, String) =
        if let Some(base_url) = &config.store.base_url {
            let client = Client::builder().user_agent("kubel/0.1").build()?;
            info!(%base_url, "using remote address store");
            let remote: Arc<dyn AddressStore> =
                Arc::new(HttpAddressStore::new(client, base_url.clone()));
            (remote, base_url.clone())
        } else {
            let snapshot = JsonFileStore::new(
                config
                    .store
                    .snapshot_path
                    .clone()
                    .unwrap_or_else(|| data_dir.join("addresses.json")),
            );
            let label = snapshot.path().display().to_string();
            info!(path = %label, "using snapshot address store");
            let local: Arc<dyn AddressStore> = Arc::new(snapshot);
            (local, label)
        };

    let plugins = vec![commercial::plugin(), residential::plugin()];
    let registry = Arc::new(SourceRegistry::new(plugins));
    info!(sources = ?registry.kinds(), "registered registry reducers");
    let service = Arc::new(ImportService::new(registry, store, config.import.clone())?);

    // App state
    let mut app = App::new(
        service,
        args.commercial.or(config.sources.commercial),
        args.residential.or(config.sources.residential),
    );
    app.store_label = store_label;

    // Terminal init
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run event loop
    let res = run(&mut terminal, app).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    res
}

async fn run(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, mut app: App) -> Result<()> {
    loop {
        terminal.draw(|frame| ui::draw(frame, &app))?;

        // Poll for input (non-blocking, small timeout to keep CPU low)
        if event::poll(StdDuration::from_millis(100))?
            && let CEvent::Key(key) = event::read()?
        {
            let action = input::handle_key_event(key, &mut app);

            match action {
                Action::Quit => break,
                Action::None => {}
                Action::RunImport => {
                    let sources = match read_sources(&app) {
                        Ok(sources) => sources,
                        Err(err) => {
                            app.error_message = Some(format!("{err:#}"));
                            continue;
                        }
                    };

                    app.is_loading = true;
                    app.error_message = None;
                    app.info_message = None;
                    terminal.draw(|frame| ui::draw(frame, &app))?;

                    let files = sources
                        .iter()
                        .map(|(kind, bytes)| RegistryFile {
                            kind: *kind,
                            bytes: bytes.as_slice(),
                        })
                        .collect::<Vec<_>>();
                    let res = app.service.run_import(&files).await;

                    app.is_loading = false;
                    match res {
                        Ok(outcome) => {
                            app.info_message = Some(format!(
                                "Created {} · skipped {} · {} rows to correct",
                                outcome.summary.created,
                                outcome.summary.skipped_existing,
                                outcome.queue.len()
                            ));
                            app.summary = Some(outcome.summary);
                            app.duplicate_list_index = 0;
                            app.set_queue(outcome.queue);
                        }
                        Err(err) => {
                            error!(error = %err, "import failed");
                            app.error_message = Some(format!("Import failed: {err}"));
                        }
                    }
                }
                Action::SubmitCorrection => {
                    let Some(id) = app.editing else {
                        app.error_message = Some("No row selected".into());
                        continue;
                    };

                    app.is_loading = true;
                    app.error_message = None;
                    terminal.draw(|frame| ui::draw(frame, &app))?;

                    let store = app.service.store();
                    let corrected = app.form.to_corrected();
                    let res = app.queue.fix_row(id, corrected, store.as_ref()).await;

                    app.is_loading = false;
                    match res {
                        Ok(address) => {
                            app.info_message = Some(format!(
                                "Added {} {}, {}",
                                address.street, address.number, address.city
                            ));
                            app.editing = None;
                            app.refresh_rows();
                            app.screen = Screen::InvalidRows;
                        }
                        Err(err) => {
                            app.error_message = Some(format!("Could not add address: {err}"));
                        }
                    }
                }
            }
        }
    }

    Ok(())
}

/// Read every configured registry file; unconfigured sources are skipped.
fn read_sources(app: &App) -> Result<Vec<(SourceKind, Vec<u8>)>> {
    let candidates = [
        (SourceKind::Commercial, app.commercial_path.as_ref()),
        (SourceKind::Residential, app.residential_path.as_ref()),
    ];

    let mut sources = Vec::new();
    for (kind, path) in candidates {
        let Some(path) = path else {
            continue;
        };
        let bytes = fs::read(path).with_context(|| format!("cannot read {}", path.display()))?;
        sources.push((kind, bytes));
    }

    anyhow::ensure!(
        !sources.is_empty(),
        "No registry files configured; pass them as arguments or set [sources] in the config"
    );
    Ok(sources)
}
