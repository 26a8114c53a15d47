use chrono::{NaiveDate, Utc};
use sea_orm::{
    ColumnTrait, DatabaseConnection, DatabaseTransaction, DbErr, EntityTrait, QueryFilter,
    QueryOrder, TransactionTrait,
};

use super::tariff::{self, NewTariff};

/// Максимум строк в одном INSERT (ограничение числа параметров в PostgreSQL)
const INSERT_CHUNK: usize = 1000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaceStats {
    pub deleted: u64,
    pub inserted: usize,
}

/// Доступ к таблице `tariffs`
#[derive(Debug, Clone)]
pub struct TariffRepository {
    db: DatabaseConnection,
}

impl TariffRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Замена снимка на дату: удаление и вставка в одной транзакции.
    /// При ошибке предыдущий снимок остаётся нетронутым
    pub async fn replace(&self, date: NaiveDate, rows: &[NewTariff]) -> Result<ReplaceStats, DbErr> {
        let txn = self.db.begin().await?;

        match write_snapshot(&txn, date, rows).await {
            Ok(stats) => {
                txn.commit().await?;
                Ok(stats)
            }
            Err(e) => {
                if let Err(rollback_err) = txn.rollback().await {
                    tracing::error!(%date, "rollback failed: {rollback_err}");
                }
                Err(e)
            }
        }
    }

    /// Снимок на дату, отсортированный по коэффициенту доставки.
    ///
    /// Положение NULL определяется СУБД: PostgreSQL ставит их в конец,
    /// SQLite — в начало
    pub async fn select_by_date(&self, date: NaiveDate) -> Result<Vec<tariff::Model>, DbErr> {
        tariff::Entity::find()
            .filter(tariff::Column::Date.eq(date))
            .order_by_asc(tariff::Column::BoxDeliveryCoefExpr)
            .order_by_asc(tariff::Column::WarehouseName)
            .all(&self.db)
            .await
    }
}

async fn write_snapshot(
    txn: &DatabaseTransaction,
    date: NaiveDate,
    rows: &[NewTariff],
) -> Result<ReplaceStats, DbErr> {
    let deleted = tariff::Entity::delete_many()
        .filter(tariff::Column::Date.eq(date))
        .exec(txn)
        .await?
        .rows_affected;

    let now = Utc::now();
    for chunk in rows.chunks(INSERT_CHUNK) {
        tariff::Entity::insert_many(chunk.iter().map(|row| row.to_active_model(date, now)))
            .exec(txn)
            .await?;
    }

    Ok(ReplaceStats {
        deleted,
        inserted: rows.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::db::test_connection;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 11, day).unwrap()
    }

    fn row(name: &str, coef: Option<i32>) -> NewTariff {
        NewTariff {
            warehouse_name: name.to_string(),
            geo_name: Some("Центральный федеральный округ".to_string()),
            box_delivery_base: Some(46.0),
            box_delivery_coef_expr: coef,
            box_delivery_liter: Some(11.5),
            box_storage_base: Some(0.08),
            ..Default::default()
        }
    }

    async fn repository() -> TariffRepository {
        TariffRepository::new(test_connection().await)
    }

    #[tokio::test]
    async fn replace_then_select_returns_same_rows() {
        let repo = repository().await;
        let rows = vec![row("Коледино", Some(115)), row("Тула", Some(100))];

        let stats = repo.replace(date(23), &rows).await.unwrap();
        let stored = repo.select_by_date(date(23)).await.unwrap();

        assert_eq!(stats, ReplaceStats { deleted: 0, inserted: 2 });
        assert_eq!(stored.len(), 2);
        for model in &stored {
            assert_eq!(model.date, date(23));
            let original = rows
                .iter()
                .find(|r| r.warehouse_name == model.warehouse_name)
                .unwrap();
            assert_eq!(&NewTariff::from(model), original);
        }
    }

    #[tokio::test]
    async fn replace_overwrites_previous_snapshot() {
        let repo = repository().await;
        repo.replace(date(23), &[row("Коледино", Some(115)), row("Тула", Some(100))])
            .await
            .unwrap();

        let stats = repo.replace(date(23), &[row("Казань", Some(90))]).await.unwrap();
        let stored = repo.select_by_date(date(23)).await.unwrap();

        assert_eq!(stats.deleted, 2);
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].warehouse_name, "Казань");
    }

    #[tokio::test]
    async fn replace_does_not_touch_other_dates() {
        let repo = repository().await;
        repo.replace(date(22), &[row("Коледино", Some(115))]).await.unwrap();
        repo.replace(date(23), &[row("Тула", Some(100))]).await.unwrap();

        repo.replace(date(23), &[row("Казань", Some(90))]).await.unwrap();

        let other = repo.select_by_date(date(22)).await.unwrap();
        assert_eq!(other.len(), 1);
        assert_eq!(other[0].warehouse_name, "Коледино");
    }

    #[tokio::test]
    async fn failed_insert_rolls_back_delete() {
        let repo = repository().await;
        repo.replace(date(23), &[row("Коледино", Some(115))]).await.unwrap();

        // дубликат склада нарушает уникальный индекс (date, warehouse_name)
        let result = repo
            .replace(date(23), &[row("Тула", Some(100)), row("Тула", Some(100))])
            .await;

        assert!(result.is_err());
        let stored = repo.select_by_date(date(23)).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].warehouse_name, "Коледино");
    }

    #[tokio::test]
    async fn select_orders_by_delivery_coefficient_with_sqlite_nulls_first() {
        let repo = repository().await;
        repo.replace(
            date(23),
            &[
                row("Коледино", Some(115)),
                row("Тула", None),
                row("Казань", Some(90)),
                row("Электросталь", Some(100)),
            ],
        )
        .await
        .unwrap();

        let names: Vec<_> = repo
            .select_by_date(date(23))
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.warehouse_name)
            .collect();

        assert_eq!(names, vec!["Тула", "Казань", "Электросталь", "Коледино"]);
    }
}
