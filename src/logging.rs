use crate::{
    config::Logging,
    error::{Error, Result},
};
use std::{path::Path, sync::Arc};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

pub const LOG_FILE: &str = "tariffs.log";

/// Инициализация трассировки.
///
/// Логи пишутся в stdout (с цветами) и, если задан каталог,
/// в `<dir>/tariffs.log` без цветов. `RUST_LOG` переопределяет уровень.
pub fn init(cfg: &Logging) -> Result<()> {
    let level = std::env::var("RUST_LOG").unwrap_or_else(|_| cfg.level.clone());

    let file_layer = if cfg.dir.trim().is_empty() {
        None
    } else {
        let dir = Path::new(&cfg.dir);
        std::fs::create_dir_all(dir)?;
        let log_file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join(LOG_FILE))?;
        Some(
            tracing_subscriber::fmt::layer()
                .with_writer(Arc::new(log_file))
                .with_ansi(false),
        )
    };

    tracing_subscriber::registry()
        .with(EnvFilter::new(level))
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .try_init()
        .map_err(|e| Error::Config(format!("logging: {e}")))
}
