use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseBackend, DatabaseConnection, DbErr};
use std::{path::Path, time::Duration};

use crate::error::Result;

/// Схема таблицы `tariffs` для PostgreSQL
const POSTGRES_SCHEMA: [&str; 3] = [
    r#"
    CREATE TABLE IF NOT EXISTS tariffs (
        id SERIAL PRIMARY KEY,
        date DATE NOT NULL,
        warehouse_name VARCHAR(255) NOT NULL,
        geo_name VARCHAR(255),
        box_delivery_base DOUBLE PRECISION,
        box_delivery_coef_expr INTEGER,
        box_delivery_liter DOUBLE PRECISION,
        box_delivery_marketplace_base DOUBLE PRECISION,
        box_delivery_marketplace_coef_expr INTEGER,
        box_delivery_marketplace_liter DOUBLE PRECISION,
        box_storage_base DOUBLE PRECISION,
        box_storage_coef_expr INTEGER,
        box_storage_liter DOUBLE PRECISION,
        created_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP,
        updated_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP
    )
    "#,
    "CREATE UNIQUE INDEX IF NOT EXISTS tariffs_date_warehouse_name_unique ON tariffs (date, warehouse_name)",
    "CREATE INDEX IF NOT EXISTS tariffs_box_delivery_coef_expr_index ON tariffs (box_delivery_coef_expr)",
];

/// Та же схема для SQLite (локальный запуск и тесты)
const SQLITE_SCHEMA: [&str; 3] = [
    r#"
    CREATE TABLE IF NOT EXISTS tariffs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        date TEXT NOT NULL,
        warehouse_name TEXT NOT NULL,
        geo_name TEXT,
        box_delivery_base REAL,
        box_delivery_coef_expr INTEGER,
        box_delivery_liter REAL,
        box_delivery_marketplace_base REAL,
        box_delivery_marketplace_coef_expr INTEGER,
        box_delivery_marketplace_liter REAL,
        box_storage_base REAL,
        box_storage_coef_expr INTEGER,
        box_storage_liter REAL,
        created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
        updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
    )
    "#,
    "CREATE UNIQUE INDEX IF NOT EXISTS tariffs_date_warehouse_name_unique ON tariffs (date, warehouse_name)",
    "CREATE INDEX IF NOT EXISTS tariffs_box_delivery_coef_expr_index ON tariffs (box_delivery_coef_expr)",
];

/// Соединение с SQLite не закрывается пулом по простою или возрасту
const SQLITE_KEEP_ALIVE: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// Подключение к базе по URL (`postgres://...` или `sqlite:...`)
pub async fn connect(url: &str) -> std::result::Result<DatabaseConnection, DbErr> {
    Database::connect(connect_options(url)).await
}

fn connect_options(url: &str) -> ConnectOptions {
    let mut opt = ConnectOptions::new(url.to_owned());
    opt.sqlx_logging(false);
    if url.starts_with("sqlite") {
        // база sqlite::memory: живёт, пока открыто соединение
        opt.max_connections(1)
            .min_connections(1)
            .idle_timeout(SQLITE_KEEP_ALIVE)
            .max_lifetime(SQLITE_KEEP_ALIVE);
    }
    opt
}

/// Создание таблицы и индексов, если их ещё нет
pub async fn run_migrations(db: &DatabaseConnection) -> std::result::Result<(), DbErr> {
    let statements = match db.get_database_backend() {
        DatabaseBackend::Postgres => POSTGRES_SCHEMA,
        DatabaseBackend::Sqlite => SQLITE_SCHEMA,
        DatabaseBackend::MySql => {
            return Err(DbErr::Custom("MySQL backend is not supported".into()));
        }
    };

    for sql in statements {
        db.execute_unprepared(sql).await?;
    }

    tracing::info!("Database migrations applied successfully");
    Ok(())
}

/// Загрузка начальных данных из SQL-файла.
///
/// Возвращает число выполненных инструкций
pub async fn run_seed(db: &DatabaseConnection, path: &Path) -> Result<usize> {
    let script = tokio::fs::read_to_string(path).await?;
    let mut executed = 0;

    for sql in script.split(';').map(str::trim).filter(|s| !s.is_empty()) {
        db.execute_unprepared(sql).await?;
        executed += 1;
    }

    tracing::info!("Seed file {} applied: {} statements", path.display(), executed);
    Ok(executed)
}

#[cfg(test)]
pub(crate) async fn test_connection() -> DatabaseConnection {
    let db = connect("sqlite::memory:").await.unwrap();
    run_migrations(&db).await.unwrap();
    db
}
