use reqwest::Error as ReqwestError;
use std::result::Result as StdResult;
use thiserror::Error;

pub type Result<T> = StdResult<T, WbSellerError>;

/// Ошибки клиента тарифов Wildberries.
///
/// Коды ответа не схлопываются в одну ошибку: 400, 401 и 429 требуют
/// разной реакции оператора.
#[derive(Error, Debug)]
pub enum WbSellerError {
    #[error("WB client is not configured: {0}")]
    Config(String),

    #[error("400 Bad request: invalid date format? ({message})")]
    InvalidRequest { message: String },

    #[error("401 Unauthorized: invalid WB token?")]
    Unauthorized,

    #[error("429 Rate limit exceeded")]
    RateLimited,

    #[error("WB API error: status {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[source] ReqwestError),

    #[error("Invalid response structure: {0}")]
    MalformedResponse(String),
}

impl WbSellerError {
    /// Короткое имя вида ошибки для логов
    pub fn kind(&self) -> &'static str {
        match self {
            WbSellerError::Config(_) => "config",
            WbSellerError::InvalidRequest { .. } => "invalid_request",
            WbSellerError::Unauthorized => "unauthorized",
            WbSellerError::RateLimited => "rate_limited",
            WbSellerError::Upstream { .. } => "upstream",
            WbSellerError::Network(_) => "network",
            WbSellerError::MalformedResponse(_) => "malformed_response",
        }
    }
}
