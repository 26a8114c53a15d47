use async_trait::async_trait;
use reqwest::Response;
use serde_json::{Value, json};
use std::time::Duration;

use crate::{storage::tariff, tariffs::SheetExporter};

use super::{
    auth::{self, ServiceAccount},
    error::{ExportError, GSheetsError, Result},
    layout,
};

pub const API_BASE_URL: &str = "https://sheets.googleapis.com";
pub const DEFAULT_SHEET: &str = "stocks_coefs";

/// Клиент Google Sheets API v4 для выгрузки тарифов
pub struct Client {
    http: reqwest::Client,
    auth: ServiceAccount,
    api_base_url: String,
    sheet_name: String,
}

pub struct ClientBuilder {
    email: String,
    private_key: String,
    sheet_name: String,
    token_url: String,
    api_base_url: String,
    timeout: Duration,
}

impl ClientBuilder {
    pub fn new(email: impl Into<String>, private_key: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            private_key: private_key.into(),
            sheet_name: DEFAULT_SHEET.to_string(),
            token_url: auth::TOKEN_URL.to_string(),
            api_base_url: API_BASE_URL.to_string(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn sheet_name(mut self, name: impl Into<String>) -> Self {
        self.sheet_name = name.into();
        self
    }

    pub fn token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = url.into();
        self
    }

    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = duration;
        self
    }

    pub fn build(self) -> Result<Client> {
        if self.sheet_name.trim().is_empty() {
            return Err(GSheetsError::Config("sheet name is empty".into()));
        }

        let auth = ServiceAccount::new(&self.email, &self.private_key, self.token_url)?;
        let http = reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| GSheetsError::Config(format!("http client: {e}")))?;

        Ok(Client {
            http,
            auth,
            api_base_url: self.api_base_url,
            sheet_name: self.sheet_name,
        })
    }
}

impl Client {
    pub fn service_account(&self) -> &str {
        self.auth.email()
    }

    /// Полная перезапись листа: очистка `A:Z`, затем запись с `A1`
    pub async fn update_sheet(
        &self,
        spreadsheet_id: &str,
        timestamp_label: &str,
        rows: &[tariff::Model],
    ) -> Result<()> {
        let token = self.auth.access_token(&self.http).await?;
        let values = layout::sheet_values(timestamp_label, rows);

        self.clear(spreadsheet_id, &token).await?;
        self.update(spreadsheet_id, &token, values).await
    }

    async fn clear(&self, spreadsheet_id: &str, token: &str) -> Result<()> {
        let range = format!("{}!A:Z", self.sheet_name);
        let url = format!("{}:clear", self.values_url(spreadsheet_id, &range));

        let response = self
            .http
            .post(&url)
            .bearer_auth(token)
            .json(&json!({}))
            .send()
            .await?;

        check_status(response).await
    }

    async fn update(&self, spreadsheet_id: &str, token: &str, values: Vec<Vec<Value>>) -> Result<()> {
        let range = format!("{}!A1", self.sheet_name);
        let url = self.values_url(spreadsheet_id, &range);

        let response = self
            .http
            .put(&url)
            .bearer_auth(token)
            .query(&[("valueInputOption", "RAW")])
            .json(&json!({
                "range": range,
                "majorDimension": "ROWS",
                "values": values,
            }))
            .send()
            .await?;

        check_status(response).await
    }

    fn values_url(&self, spreadsheet_id: &str, range: &str) -> String {
        format!(
            "{}/v4/spreadsheets/{}/values/{}",
            self.api_base_url,
            urlencoding::encode(spreadsheet_id),
            urlencoding::encode(range)
        )
    }
}

async fn check_status(response: Response) -> Result<()> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    Err(GSheetsError::Api {
        status: status.as_u16(),
        message: response.text().await.unwrap_or_default(),
    })
}

#[async_trait]
impl SheetExporter for Client {
    async fn overwrite(
        &self,
        spreadsheet_id: &str,
        timestamp_label: &str,
        rows: &[tariff::Model],
    ) -> std::result::Result<(), ExportError> {
        self.update_sheet(spreadsheet_id, timestamp_label, rows)
            .await
            .map_err(|source| ExportError {
                spreadsheet_id: spreadsheet_id.to_string(),
                source,
            })
    }
}
