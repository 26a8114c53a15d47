use chrono::Utc;
use cron::Schedule;
use std::{str::FromStr, sync::Arc, time::Duration};
use tokio::{sync::watch, task::JoinHandle};
use tracing::{error, info, warn};

use crate::error::{Error, Result};

use super::{SyncOutcome, TariffService};

/// Разбор cron-выражения (с полем секунд): `0 0 * * * *` — каждый час
pub fn parse_schedule(expr: &str) -> Result<Schedule> {
    Ok(Schedule::from_str(expr)?)
}

/// Периодическая загрузка тарифов: сразу при старте, затем по расписанию.
///
/// Запуски идут строго по одному; дата вычисляется заново на каждом запуске
pub struct TariffScheduler {
    shutdown: watch::Sender<bool>,
    background_handle: JoinHandle<()>,
}

impl TariffScheduler {
    pub fn start(service: Arc<TariffService>, schedule: Schedule) -> Self {
        let (shutdown, mut stop) = watch::channel(false);

        let background_handle = tokio::spawn(async move {
            run_once(&service, "initial").await;

            loop {
                let Some(next) = schedule.upcoming(Utc).next() else {
                    warn!("Tariff schedule has no upcoming runs, scheduler stopped");
                    break;
                };
                let wait = (next - Utc::now()).to_std().unwrap_or(Duration::ZERO);

                tokio::select! {
                    _ = tokio::time::sleep(wait) => {}
                    _ = stop.changed() => break,
                }

                run_once(&service, "scheduled").await;
            }
        });

        Self {
            shutdown,
            background_handle,
        }
    }

    /// Остановка: текущий запуск доводится до конца, новые не начинаются
    pub async fn close(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.background_handle.await {
            error!("Tariff scheduler task failed: {e}");
        }
    }
}

/// Один запуск за текущую дату (UTC). Ошибки пишутся в лог и не пробрасываются
pub async fn run_once(service: &TariffService, trigger: &'static str) -> Option<SyncOutcome> {
    let date = Utc::now().date_naive();
    info!(%date, trigger, "Tariff fetch started");

    match service.fetch_and_save_tariffs(date).await {
        Ok(outcome) => {
            info!(%date, trigger, ?outcome, "Tariff fetch finished");
            Some(outcome)
        }
        Err(e) => {
            let kind = match &e {
                Error::Source { source, .. } => source.kind(),
                _ => e.phase(),
            };
            error!(%date, trigger, phase = e.phase(), kind, "Error in tariff fetch: {e}");
            None
        }
    }
}
