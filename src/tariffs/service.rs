use chrono::{DateTime, Local, NaiveDate};
use std::{
    collections::HashSet,
    sync::{Arc, Mutex, PoisonError},
};
use tracing::{error, info, warn};

use crate::{
    error::{Error, Result},
    storage::{TariffRepository, tariff},
};

use super::{
    SheetExporter, TariffSource,
    normalize::{MalformedNumberPolicy, normalize},
};

/// Список таблиц для выгрузки; вызывается заново при каждой выгрузке
pub type SpreadsheetIds = Arc<dyn Fn() -> Vec<String> + Send + Sync>;

/// Итог загрузки тарифов за дату
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Saved { saved: usize, export: ExportSummary },
    /// WB не вернул ни одного склада: снимок не менялся
    NoData,
    /// Загрузка за эту дату уже выполняется
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportSummary {
    /// Выгрузка в таблицы не настроена
    Skipped,
    Exported { targets: usize },
}

/// Загрузка тарифов: WB -> нормализация -> БД -> Google Sheets
pub struct TariffService {
    source: Option<Arc<dyn TariffSource>>,
    exporter: Option<Arc<dyn SheetExporter>>,
    repository: TariffRepository,
    spreadsheet_ids: SpreadsheetIds,
    policy: MalformedNumberPolicy,
    in_flight: Mutex<HashSet<NaiveDate>>,
}

impl TariffService {
    pub fn new(repository: TariffRepository) -> Self {
        Self {
            source: None,
            exporter: None,
            repository,
            spreadsheet_ids: Arc::new(Vec::new),
            policy: MalformedNumberPolicy::default(),
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    pub fn with_source(mut self, source: Option<Arc<dyn TariffSource>>) -> Self {
        self.source = source;
        self
    }

    pub fn with_exporter(mut self, exporter: Option<Arc<dyn SheetExporter>>) -> Self {
        self.exporter = exporter;
        self
    }

    pub fn with_spreadsheet_ids<F>(mut self, ids: F) -> Self
    where
        F: Fn() -> Vec<String> + Send + Sync + 'static,
    {
        self.spreadsheet_ids = Arc::new(ids);
        self
    }

    pub fn with_policy(mut self, policy: MalformedNumberPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn has_source(&self) -> bool {
        self.source.is_some()
    }

    pub fn has_exporter(&self) -> bool {
        self.exporter.is_some()
    }

    /// Загрузка тарифов за дату и замена снимка в БД.
    ///
    /// Ошибка WB или нормализации прерывает загрузку до изменения БД.
    /// Ошибка выгрузки возвращается, но сохранённый снимок не откатывается
    pub async fn fetch_and_save_tariffs(&self, date: NaiveDate) -> Result<SyncOutcome> {
        let Some(source) = self.source.as_ref() else {
            return Err(Error::Config(
                "WB client is not initialised. Check WB_TOKEN".into(),
            ));
        };

        let Some(_guard) = RunGuard::acquire(&self.in_flight, date) else {
            warn!(%date, "Tariff sync for this date is already running, skipped");
            return Ok(SyncOutcome::Skipped);
        };

        let records = source
            .fetch_tariffs(date)
            .await
            .map_err(|source| Error::Source { date, source })?;

        let normalized =
            normalize(&records, self.policy).map_err(|source| Error::Transform { date, source })?;

        if normalized.nulled_fields > 0 || normalized.skipped_records > 0 {
            warn!(
                %date,
                nulled_fields = normalized.nulled_fields,
                skipped_records = normalized.skipped_records,
                "Tariff data contained unreadable values"
            );
        }

        if normalized.rows.is_empty() {
            info!(%date, "No tariff data to save");
            return Ok(SyncOutcome::NoData);
        }

        let stats = self
            .repository
            .replace(date, &normalized.rows)
            .await
            .map_err(|source| Error::Persistence { date, source })?;

        info!(
            %date,
            saved = stats.inserted,
            replaced = stats.deleted,
            "Saved tariff records"
        );

        let export = self.export_to_sheets(date).await?;

        Ok(SyncOutcome::Saved {
            saved: stats.inserted,
            export,
        })
    }

    /// Снимок тарифов на дату в порядке коэффициента доставки
    pub async fn get_tariffs_for_date(&self, date: NaiveDate) -> Result<Vec<tariff::Model>> {
        self.repository
            .select_by_date(date)
            .await
            .map_err(|source| Error::Persistence { date, source })
    }

    /// Выгрузка снимка во все настроенные таблицы по очереди.
    ///
    /// Первая ошибка прерывает выгрузку в оставшиеся таблицы
    pub async fn export_to_sheets(&self, date: NaiveDate) -> Result<ExportSummary> {
        let Some(exporter) = self.exporter.as_ref() else {
            warn!(%date, "Google Sheets client is not initialised, export skipped");
            return Ok(ExportSummary::Skipped);
        };

        let rows = self.get_tariffs_for_date(date).await?;
        let spreadsheet_ids = (self.spreadsheet_ids)();

        for (done, spreadsheet_id) in spreadsheet_ids.iter().enumerate() {
            let label = timestamp_label(Local::now());
            if let Err(source) = exporter.overwrite(spreadsheet_id, &label, &rows).await {
                error!(
                    %date,
                    spreadsheet_id = %spreadsheet_id,
                    exported = done,
                    not_exported = spreadsheet_ids.len() - done,
                    "Export to Google Sheets aborted"
                );
                return Err(Error::Export { date, source });
            }
            info!(
                %date,
                spreadsheet_id = %spreadsheet_id,
                rows = rows.len(),
                "Updated Google Sheet"
            );
        }

        info!(%date, targets = spreadsheet_ids.len(), "Exported tariffs to Google Sheets");
        Ok(ExportSummary::Exported {
            targets: spreadsheet_ids.len(),
        })
    }
}

/// Отметка времени выгрузки в формате `дд.мм.гггг, чч:мм:сс`
pub fn timestamp_label(now: DateTime<Local>) -> String {
    now.format("%d.%m.%Y, %H:%M:%S").to_string()
}

/// Отметка о выполняющейся загрузке за дату, снимается при drop
struct RunGuard<'a> {
    in_flight: &'a Mutex<HashSet<NaiveDate>>,
    date: NaiveDate,
}

impl<'a> RunGuard<'a> {
    fn acquire(in_flight: &'a Mutex<HashSet<NaiveDate>>, date: NaiveDate) -> Option<Self> {
        let mut set = in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if !set.insert(date) {
            return None;
        }
        Some(Self { in_flight, date })
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.date);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::{
        gsheets::{ExportError, error::GSheetsError},
        storage::{NewTariff, db::test_connection},
        wbseller::{error::WbSellerError, models::WarehouseTariff},
    };
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    pub(crate) fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 11, day).unwrap()
    }

    pub(crate) fn record(name: &str, base: &str, coef: &str) -> WarehouseTariff {
        WarehouseTariff {
            warehouse_name: name.to_string(),
            geo_name: Some("Центральный федеральный округ".to_string()),
            box_delivery_base: Some(base.to_string()),
            box_delivery_coef_expr: Some(coef.to_string()),
            box_delivery_liter: Some("11,2".to_string()),
            box_delivery_marketplace_base: Some("-".to_string()),
            box_delivery_marketplace_coef_expr: Some("-".to_string()),
            box_delivery_marketplace_liter: Some("-".to_string()),
            box_storage_base: Some("0,08".to_string()),
            box_storage_coef_expr: Some("115".to_string()),
            box_storage_liter: Some("0,08".to_string()),
        }
    }

    /// Источник с заранее заданным ответом
    pub(crate) struct FakeSource {
        pub response: Mutex<std::result::Result<Vec<WarehouseTariff>, WbSellerError>>,
        pub calls: AtomicUsize,
        pub gate: Option<(Arc<Notify>, Arc<Notify>)>,
    }

    impl FakeSource {
        pub(crate) fn ok(records: Vec<WarehouseTariff>) -> Self {
            Self {
                response: Mutex::new(Ok(records)),
                calls: AtomicUsize::new(0),
                gate: None,
            }
        }

        fn failing(err: WbSellerError) -> Self {
            Self {
                response: Mutex::new(Err(err)),
                calls: AtomicUsize::new(0),
                gate: None,
            }
        }

        fn set(&self, records: Vec<WarehouseTariff>) {
            *self.response.lock().unwrap() = Ok(records);
        }
    }

    #[async_trait]
    impl TariffSource for FakeSource {
        async fn fetch_tariffs(
            &self,
            _date: NaiveDate,
        ) -> std::result::Result<Vec<WarehouseTariff>, WbSellerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some((entered, release)) = &self.gate {
                entered.notify_one();
                release.notified().await;
            }
            match &*self.response.lock().unwrap() {
                Ok(records) => Ok(records.clone()),
                Err(WbSellerError::Unauthorized) => Err(WbSellerError::Unauthorized),
                Err(WbSellerError::RateLimited) => Err(WbSellerError::RateLimited),
                Err(other) => Err(WbSellerError::MalformedResponse(other.to_string())),
            }
        }
    }

    /// Получатель выгрузки, запоминающий вызовы
    #[derive(Default)]
    pub(crate) struct RecordingExporter {
        pub calls: Mutex<Vec<(String, String, Vec<tariff::Model>)>>,
        pub fail_on: Option<String>,
    }

    #[async_trait]
    impl SheetExporter for RecordingExporter {
        async fn overwrite(
            &self,
            spreadsheet_id: &str,
            timestamp_label: &str,
            rows: &[tariff::Model],
        ) -> std::result::Result<(), ExportError> {
            if self.fail_on.as_deref() == Some(spreadsheet_id) {
                return Err(ExportError {
                    spreadsheet_id: spreadsheet_id.to_string(),
                    source: GSheetsError::Api {
                        status: 403,
                        message: "The caller does not have permission".to_string(),
                    },
                });
            }
            self.calls.lock().unwrap().push((
                spreadsheet_id.to_string(),
                timestamp_label.to_string(),
                rows.to_vec(),
            ));
            Ok(())
        }
    }

    async fn service(
        source: Option<Arc<FakeSource>>,
        exporter: Option<Arc<RecordingExporter>>,
        ids: &[&str],
    ) -> TariffService {
        let ids: Vec<String> = ids.iter().map(|s| s.to_string()).collect();
        TariffService::new(TariffRepository::new(test_connection().await))
            .with_source(source.map(|s| s as Arc<dyn TariffSource>))
            .with_exporter(exporter.map(|e| e as Arc<dyn SheetExporter>))
            .with_spreadsheet_ids(move || ids.clone())
    }

    fn koledino_and_tula() -> Vec<WarehouseTariff> {
        vec![
            record("Коледино", "12,5", "115"),
            record("Тула", "-", "100"),
        ]
    }

    #[tokio::test]
    async fn saved_rows_match_source_values() {
        let source = Arc::new(FakeSource::ok(koledino_and_tula()));
        let svc = service(Some(source), None, &[]).await;

        let outcome = svc.fetch_and_save_tariffs(date(23)).await.unwrap();
        let rows = svc.get_tariffs_for_date(date(23)).await.unwrap();

        assert_eq!(
            outcome,
            SyncOutcome::Saved {
                saved: 2,
                export: ExportSummary::Skipped
            }
        );
        assert_eq!(rows.len(), 2);
        let koledino = rows.iter().find(|r| r.warehouse_name == "Коледино").unwrap();
        let tula = rows.iter().find(|r| r.warehouse_name == "Тула").unwrap();
        assert_eq!(koledino.box_delivery_base, Some(12.5));
        assert_eq!(koledino.box_delivery_coef_expr, Some(115));
        assert_eq!(koledino.box_delivery_liter, Some(11.2));
        assert_eq!(koledino.box_delivery_marketplace_base, None);
        assert_eq!(tula.box_delivery_base, None);
        // сортировка по коэффициенту доставки
        assert_eq!(rows[0].warehouse_name, "Тула");
    }

    #[tokio::test]
    async fn rerun_with_same_response_is_idempotent() {
        let source = Arc::new(FakeSource::ok(koledino_and_tula()));
        let svc = service(Some(source), None, &[]).await;

        svc.fetch_and_save_tariffs(date(23)).await.unwrap();
        let first: Vec<NewTariff> = svc
            .get_tariffs_for_date(date(23))
            .await
            .unwrap()
            .iter()
            .map(NewTariff::from)
            .collect();
        svc.fetch_and_save_tariffs(date(23)).await.unwrap();
        let second: Vec<NewTariff> = svc
            .get_tariffs_for_date(date(23))
            .await
            .unwrap()
            .iter()
            .map(NewTariff::from)
            .collect();

        assert_eq!(first.len(), 2);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn other_dates_are_untouched() {
        let source = Arc::new(FakeSource::ok(koledino_and_tula()));
        let svc = service(Some(Arc::clone(&source)), None, &[]).await;
        svc.fetch_and_save_tariffs(date(22)).await.unwrap();

        source.set(vec![record("Казань", "40", "90")]);
        svc.fetch_and_save_tariffs(date(23)).await.unwrap();

        assert_eq!(svc.get_tariffs_for_date(date(22)).await.unwrap().len(), 2);
        assert_eq!(svc.get_tariffs_for_date(date(23)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn source_failure_keeps_existing_snapshot() {
        let source = Arc::new(FakeSource::ok(koledino_and_tula()));
        let svc = service(Some(Arc::clone(&source)), None, &[]).await;
        svc.fetch_and_save_tariffs(date(23)).await.unwrap();

        *source.response.lock().unwrap() = Err(WbSellerError::RateLimited);
        let err = svc.fetch_and_save_tariffs(date(23)).await.unwrap_err();

        assert!(matches!(
            err,
            Error::Source {
                source: WbSellerError::RateLimited,
                ..
            }
        ));
        assert_eq!(err.phase(), "fetch");
        assert_eq!(svc.get_tariffs_for_date(date(23)).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn source_errors_keep_their_kind() {
        let svc = service(
            Some(Arc::new(FakeSource::failing(WbSellerError::Unauthorized))),
            None,
            &[],
        )
        .await;

        let err = svc.fetch_and_save_tariffs(date(23)).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Source {
                source: WbSellerError::Unauthorized,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn empty_batch_changes_nothing() {
        let source = Arc::new(FakeSource::ok(koledino_and_tula()));
        let exporter = Arc::new(RecordingExporter::default());
        let svc = service(Some(Arc::clone(&source)), Some(Arc::clone(&exporter)), &["sheet"]).await;
        svc.fetch_and_save_tariffs(date(23)).await.unwrap();
        assert_eq!(exporter.calls.lock().unwrap().len(), 1);

        source.set(Vec::new());
        let outcome = svc.fetch_and_save_tariffs(date(23)).await.unwrap();

        assert_eq!(outcome, SyncOutcome::NoData);
        assert_eq!(svc.get_tariffs_for_date(date(23)).await.unwrap().len(), 2);
        assert_eq!(exporter.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn missing_source_is_config_error_without_mutation() {
        let svc = service(None, None, &[]).await;

        let err = svc.fetch_and_save_tariffs(date(23)).await.unwrap_err();

        assert!(matches!(err, Error::Config(_)));
        assert!(svc.get_tariffs_for_date(date(23)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn fail_policy_rejects_batch_before_persisting() {
        let source = Arc::new(FakeSource::ok(vec![record("Коледино", "12,5", "1,5")]));
        let svc = service(Some(source), None, &[])
            .await
            .with_policy(MalformedNumberPolicy::Fail);

        let err = svc.fetch_and_save_tariffs(date(23)).await.unwrap_err();

        assert!(matches!(err, Error::Transform { .. }));
        assert!(svc.get_tariffs_for_date(date(23)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn exports_to_every_spreadsheet_with_same_rows() {
        let source = Arc::new(FakeSource::ok(vec![record("Moscow", "10,5", "100")]));
        let exporter = Arc::new(RecordingExporter::default());
        let svc = service(Some(source), Some(Arc::clone(&exporter)), &["first", "second"]).await;

        let outcome = svc.fetch_and_save_tariffs(date(23)).await.unwrap();

        assert_eq!(
            outcome,
            SyncOutcome::Saved {
                saved: 1,
                export: ExportSummary::Exported { targets: 2 }
            }
        );
        let calls = exporter.calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].0, "first");
        assert_eq!(calls[1].0, "second");
        assert_eq!(calls[0].2, calls[1].2);
        assert_eq!(calls[0].2[0].warehouse_name, "Moscow");
        assert_eq!(calls[0].2[0].box_delivery_base, Some(10.5));
        assert_eq!(calls[0].2[0].box_delivery_coef_expr, Some(100));
        assert!(!calls[0].1.is_empty());
    }

    #[tokio::test]
    async fn export_failure_aborts_remaining_targets_but_keeps_rows() {
        let source = Arc::new(FakeSource::ok(koledino_and_tula()));
        let exporter = Arc::new(RecordingExporter {
            fail_on: Some("broken".to_string()),
            ..Default::default()
        });
        let svc = service(
            Some(source),
            Some(Arc::clone(&exporter)),
            &["first", "broken", "third"],
        )
        .await;

        let err = svc.fetch_and_save_tariffs(date(23)).await.unwrap_err();

        match &err {
            Error::Export { source, .. } => assert_eq!(source.spreadsheet_id, "broken"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(err.phase(), "export");
        let calls = exporter.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "first");
        assert_eq!(svc.get_tariffs_for_date(date(23)).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn duplicate_warehouse_fails_persist_and_keeps_snapshot() {
        let source = Arc::new(FakeSource::ok(koledino_and_tula()));
        let exporter = Arc::new(RecordingExporter::default());
        let svc = service(Some(Arc::clone(&source)), Some(Arc::clone(&exporter)), &["sheet"]).await;
        svc.fetch_and_save_tariffs(date(23)).await.unwrap();
        let before = svc.get_tariffs_for_date(date(23)).await.unwrap();

        source.set(vec![
            record("Казань", "40", "90"),
            record("Казань", "41", "95"),
        ]);
        let err = svc.fetch_and_save_tariffs(date(23)).await.unwrap_err();

        assert!(matches!(err, Error::Persistence { .. }));
        assert_eq!(err.phase(), "persist");
        assert_eq!(svc.get_tariffs_for_date(date(23)).await.unwrap(), before);
        assert_eq!(exporter.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn export_without_exporter_is_skipped() {
        let svc = service(None, None, &["first"]).await;
        let summary = svc.export_to_sheets(date(23)).await.unwrap();
        assert_eq!(summary, ExportSummary::Skipped);
    }

    #[tokio::test]
    async fn spreadsheet_ids_are_resolved_on_every_export() {
        let exporter = Arc::new(RecordingExporter::default());
        let resolved = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&resolved);
        let svc = TariffService::new(TariffRepository::new(test_connection().await))
            .with_exporter(Some(Arc::clone(&exporter) as Arc<dyn SheetExporter>))
            .with_spreadsheet_ids(move || {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                vec![format!("sheet-{n}")]
            });

        svc.export_to_sheets(date(23)).await.unwrap();
        svc.export_to_sheets(date(23)).await.unwrap();

        let calls = exporter.calls.lock().unwrap();
        assert_eq!(calls[0].0, "sheet-0");
        assert_eq!(calls[1].0, "sheet-1");
    }

    #[tokio::test]
    async fn concurrent_run_for_same_date_is_skipped() {
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let source = Arc::new(FakeSource {
            gate: Some((Arc::clone(&entered), Arc::clone(&release))),
            ..FakeSource::ok(koledino_and_tula())
        });
        let svc = Arc::new(service(Some(Arc::clone(&source)), None, &[]).await);

        let first = tokio::spawn({
            let svc = Arc::clone(&svc);
            async move { svc.fetch_and_save_tariffs(date(23)).await }
        });
        entered.notified().await;

        let second = svc.fetch_and_save_tariffs(date(23)).await.unwrap();
        assert_eq!(second, SyncOutcome::Skipped);

        release.notify_one();
        let first = first.await.unwrap().unwrap();
        assert!(matches!(first, SyncOutcome::Saved { saved: 2, .. }));
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);

        // после завершения дата снова доступна
        let source_calls_before = source.calls.load(Ordering::SeqCst);
        let third = tokio::spawn({
            let svc = Arc::clone(&svc);
            async move { svc.fetch_and_save_tariffs(date(23)).await }
        });
        entered.notified().await;
        release.notify_one();
        assert!(third.await.unwrap().is_ok());
        assert_eq!(source.calls.load(Ordering::SeqCst), source_calls_before + 1);
    }

    #[test]
    fn timestamp_label_uses_russian_layout() {
        let at = Local.with_ymd_and_hms(2025, 11, 23, 9, 5, 7).unwrap();
        assert_eq!(timestamp_label(at), "23.11.2025, 09:05:07");
    }
}
