use jsonwebtoken::errors::Error as JwtError;
use reqwest::Error as ReqwestError;
use std::result::Result as StdResult;
use thiserror::Error;

pub type Result<T> = StdResult<T, GSheetsError>;

#[derive(Error, Debug)]
pub enum GSheetsError {
    #[error("Google Sheets client is not configured: {0}")]
    Config(String),

    #[error("JwtError: {0}")]
    Jwt(#[from] JwtError),

    #[error("token request rejected: status {status}: {message}")]
    Auth { status: u16, message: String },

    #[error("Sheets API error: status {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] ReqwestError),
}

/// Ошибка выгрузки в конкретную таблицу
#[derive(Error, Debug)]
#[error("spreadsheet '{spreadsheet_id}': {source}")]
pub struct ExportError {
    pub spreadsheet_id: String,
    pub source: GSheetsError,
}
