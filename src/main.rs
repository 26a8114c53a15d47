mod config;
mod error;
mod gsheets;
mod logging;
mod storage;
mod tariffs;
mod wbseller;

use std::{path::Path, sync::Arc};
use tracing::{info, warn};

use error::Result;
use storage::TariffRepository;
use tariffs::{SheetExporter, TariffScheduler, TariffService, TariffSource};

use crate::config::Config;

const LOGO: &str = r#"
 __      _____.  ___________             .__  _____  _____
/  \    /  \_ |__\__    ___/____ _______|__|/ ____\/ ____\______
\   \/\/   /| __ \ |    |  \__  \\_  __ \  \   __\\   __\/  ___/
 \        / | \_\ \|    |   / __ \|  | \/  ||  |   |  |  \___ \
  \__/\  /  |___  /|____|  (____  /__|  |__||__|   |__| /____  >
       \/       \/              \/                           \/
"#;

/// Обработка сигнала завершения (Ctrl+C или SIGINT/SIGTERM)
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match (
            signal(SignalKind::interrupt()),
            signal(SignalKind::terminate()),
        ) {
            (Ok(mut sigint), Ok(mut sigterm)) => {
                tokio::select! {
                    _ = sigint.recv() => {},
                    _ = sigterm.recv() => {},
                }
            }
            _ => {
                warn!("Unable to listen for SIGINT/SIGTERM, falling back to Ctrl+C");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    info!("Shutdown signal received");
}

/// Инициализация конфигурации и логирования
fn startup() -> Result<&'static Config> {
    let created = config::init_if_not()?;
    let cfg = config::init(config::load()?);
    logging::init(&cfg.logging)?;

    if created {
        let full_config_path = std::env::current_dir()?.join(config::CONFIG_PATH);
        info!("Config file created at {:?}", full_config_path);
    }

    Ok(cfg)
}

/// Клиент WB; без токена загрузка тарифов отключается
fn build_source(cfg: &Config) -> Option<Arc<dyn TariffSource>> {
    match wbseller::ClientBuilder::new(&cfg.wb.token)
        .base_url(&cfg.wb.base_url)
        .timeout(cfg.wb.timeout())
        .build()
    {
        Ok(client) => Some(Arc::new(client)),
        Err(e) => {
            warn!("WB client is not initialised: {e}");
            None
        }
    }
}

/// Клиент Google Sheets; без учётных данных или таблиц выгрузка пропускается
fn build_exporter(cfg: &Config) -> Option<Arc<dyn SheetExporter>> {
    let gs = &cfg.google_sheets;
    if config::current_spreadsheet_ids(&gs.spreadsheet_ids).is_empty() {
        warn!("No spreadsheet ids configured, Google Sheets export disabled");
        return None;
    }

    match gsheets::ClientBuilder::new(&gs.service_account_email, &gs.private_key)
        .sheet_name(&gs.sheet_name)
        .token_url(&gs.token_url)
        .api_base_url(&gs.api_base_url)
        .timeout(gs.timeout())
        .build()
    {
        Ok(client) => {
            info!(
                service_account = client.service_account(),
                sheet = %gs.sheet_name,
                "Google Sheets client initialised"
            );
            Some(Arc::new(client))
        }
        Err(e) => {
            warn!("Google Sheets client is not initialised: {e}");
            None
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    println!("\x1b[95m{}\x1b[0m\n", LOGO);
    let cfg = startup()?;

    let db = storage::connect(&cfg.database.url).await?;
    storage::run_migrations(&db).await?;
    info!("Database migrations applied");

    if !cfg.database.seed_file.trim().is_empty() {
        match storage::run_seed(&db, Path::new(&cfg.database.seed_file)).await {
            Ok(count) => info!(statements = count, "Seeds applied"),
            Err(e) => warn!("Seeds skipped: {e}"),
        }
    }

    let source = build_source(cfg);
    let exporter = build_exporter(cfg);

    let fallback_ids = cfg.google_sheets.spreadsheet_ids.clone();
    let service = Arc::new(
        TariffService::new(TariffRepository::new(db))
            .with_source(source)
            .with_exporter(exporter)
            .with_spreadsheet_ids(move || config::current_spreadsheet_ids(&fallback_ids))
            .with_policy(cfg.tariffs.on_malformed_number),
    );

    info!(
        wb = service.has_source(),
        google_sheets = service.has_exporter(),
        "Services status"
    );

    let scheduler = if service.has_source() {
        let schedule = tariffs::parse_schedule(&cfg.tariffs.schedule)?;
        info!(schedule = %cfg.tariffs.schedule, "Tariff scheduler started");
        Some(TariffScheduler::start(Arc::clone(&service), schedule))
    } else {
        warn!("Tariff scheduler is not started: WB client is not available");
        None
    };

    shutdown_signal().await;

    if let Some(scheduler) = scheduler {
        scheduler.close().await;
    }
    info!("Stopped");
    Ok(())
}
