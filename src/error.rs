use crate::gsheets::ExportError;
use crate::tariffs::TransformError;
use crate::wbseller::WbSellerError;
use chrono::NaiveDate;
use cron::error::Error as CronError;
use sea_orm::DbErr;
use std::io::Error as StdIoError;
use std::result::Result as StdResult;
use thiserror::Error as ThisError;
use toml::de::Error as TomlDeError;

pub type Result<T> = StdResult<T, Error>;

#[derive(ThisError, Debug)]
pub enum Error {
    #[error("StdIoError: {0:?}")]
    StdIo(#[from] StdIoError),

    #[error("TomlDeError: {0:?}")]
    TomlDe(#[from] TomlDeError),

    #[error("DbError: {0}")]
    Db(#[from] DbErr),

    #[error("ScheduleError: {0}")]
    Schedule(#[from] CronError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("fetch tariffs for {date}: {source}")]
    Source {
        date: NaiveDate,
        source: WbSellerError,
    },

    #[error("normalize tariffs for {date}: {source}")]
    Transform {
        date: NaiveDate,
        source: TransformError,
    },

    #[error("persist tariffs for {date}: {source}")]
    Persistence { date: NaiveDate, source: DbErr },

    #[error("export tariffs for {date}: {source}")]
    Export { date: NaiveDate, source: ExportError },
}

impl Error {
    /// Этап конвейера, на котором произошла ошибка
    pub fn phase(&self) -> &'static str {
        match self {
            Error::Config(_) => "config",
            Error::Source { .. } => "fetch",
            Error::Transform { .. } => "transform",
            Error::Persistence { .. } => "persist",
            Error::Export { .. } => "export",
            Error::StdIo(_) | Error::TomlDe(_) | Error::Db(_) | Error::Schedule(_) => "startup",
        }
    }
}
