pub mod normalize;
pub mod scheduler;
pub mod service;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::{
    gsheets::ExportError,
    storage::tariff,
    wbseller::{error::WbSellerError, models::WarehouseTariff},
};

pub use normalize::{MalformedNumberPolicy, TransformError};
pub use scheduler::{TariffScheduler, parse_schedule};
pub use service::{SyncOutcome, TariffService};

/// Источник тарифов на дату
#[async_trait]
pub trait TariffSource: Send + Sync {
    async fn fetch_tariffs(&self, date: NaiveDate) -> Result<Vec<WarehouseTariff>, WbSellerError>;
}

/// Получатель выгрузки: полностью перезаписывает лист таблицы
#[async_trait]
pub trait SheetExporter: Send + Sync {
    async fn overwrite(
        &self,
        spreadsheet_id: &str,
        timestamp_label: &str,
        rows: &[tariff::Model],
    ) -> Result<(), ExportError>;
}
