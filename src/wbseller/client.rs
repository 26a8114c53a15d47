use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{
    StatusCode,
    header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue},
};
use std::time::Duration;

use crate::{
    tariffs::TariffSource,
    wbseller::models::{TariffsBoxResponse, WarehouseTariff},
};

use super::error::{Result, WbSellerError};

pub const BASE_URL: &str = "https://common-api.wildberries.ru/api/v1";

/// HTTP-клиент для тарифов Wildberries (common-api)
#[derive(Debug, Clone)]
pub struct Client {
    http: reqwest::Client,
    base_url: String,
    headers: HeaderMap,
}

pub struct ClientBuilder {
    token: String,
    base_url: String,
    timeout: Duration,
}

impl ClientBuilder {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            base_url: BASE_URL.to_string(),
            timeout: Duration::from_secs(10),
        }
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = duration;
        self
    }

    /// Сборка клиента. Пустой токен — ошибка конфигурации, а не запроса
    pub fn build(self) -> Result<Client> {
        let token = self.token.trim();
        if token.is_empty() {
            return Err(WbSellerError::Config(
                "'WB_TOKEN' is required. Check credentials in Config.toml or environment".into(),
            ));
        }

        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(token)
            .map_err(|_| WbSellerError::Config("WB token contains invalid characters".into()))?;
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| WbSellerError::Config(format!("http client: {e}")))?;

        Ok(Client {
            http,
            base_url: self.base_url,
            headers,
        })
    }
}

impl Client {
    /// Получение тарифов для коробов на дату
    pub async fn get_tariffs_box(&self, date: NaiveDate) -> Result<Vec<WarehouseTariff>> {
        let url = format!("{}/tariffs/box", self.base_url);
        let response = self
            .http
            .get(&url)
            .headers(self.headers.clone())
            .query(&[("date", date.format("%Y-%m-%d").to_string())])
            .send()
            .await
            .map_err(WbSellerError::Network)?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(classify_status(status, message));
        }

        if status != StatusCode::OK {
            return Err(WbSellerError::MalformedResponse(format!(
                "unexpected status {status}"
            )));
        }

        let body = response.text().await.map_err(WbSellerError::Network)?;
        let parsed: TariffsBoxResponse = serde_json::from_str(&body)
            .map_err(|e| WbSellerError::MalformedResponse(e.to_string()))?;

        parsed.into_warehouse_list().ok_or_else(|| {
            WbSellerError::MalformedResponse("response.data.warehouseList is missing".into())
        })
    }
}

/// Классификация неуспешного ответа по коду статуса
fn classify_status(status: StatusCode, message: String) -> WbSellerError {
    match status {
        StatusCode::BAD_REQUEST => WbSellerError::InvalidRequest { message },
        StatusCode::UNAUTHORIZED => WbSellerError::Unauthorized,
        StatusCode::TOO_MANY_REQUESTS => WbSellerError::RateLimited,
        _ => WbSellerError::Upstream {
            status: status.as_u16(),
            message,
        },
    }
}

#[async_trait]
impl TariffSource for Client {
    async fn fetch_tariffs(&self, date: NaiveDate) -> Result<Vec<WarehouseTariff>> {
        self.get_tariffs_box(date).await
    }
}
