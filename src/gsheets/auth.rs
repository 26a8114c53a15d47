use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use super::error::{GSheetsError, Result};

pub const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
const GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Запас до истечения токена, после которого он запрашивается заново
const REFRESH_MARGIN_SECS: i64 = 60;

#[derive(Debug, Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    3600
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: DateTime<Utc>,
}

/// Авторизация сервисного аккаунта Google (JWT bearer grant)
pub struct ServiceAccount {
    email: String,
    key: EncodingKey,
    token_url: String,
    cached: Mutex<Option<CachedToken>>,
}

impl ServiceAccount {
    /// Ключ разбирается сразу: неверный PEM — ошибка конфигурации.
    /// Экранированные `\n` из переменных окружения заменяются на переводы строк
    pub fn new(email: &str, private_key: &str, token_url: impl Into<String>) -> Result<Self> {
        let email = email.trim();
        if email.is_empty() {
            return Err(GSheetsError::Config(
                "'GOOGLE_SERVICE_ACCOUNT_EMAIL' is required".into(),
            ));
        }
        if private_key.trim().is_empty() {
            return Err(GSheetsError::Config("'GOOGLE_PRIVATE_KEY' is required".into()));
        }

        let pem = private_key.replace("\\n", "\n");
        let key = EncodingKey::from_rsa_pem(pem.as_bytes())
            .map_err(|e| GSheetsError::Config(format!("invalid private key: {e}")))?;

        Ok(Self {
            email: email.to_string(),
            key,
            token_url: token_url.into(),
            cached: Mutex::new(None),
        })
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    /// Действующий access token; запрашивается заново незадолго до истечения
    pub async fn access_token(&self, http: &reqwest::Client) -> Result<String> {
        let mut cached = self.cached.lock().await;

        if let Some(token) = cached.as_ref() {
            if token.expires_at - Duration::seconds(REFRESH_MARGIN_SECS) > Utc::now() {
                return Ok(token.value.clone());
            }
        }

        let token = self.request_token(http).await?;
        let value = token.value.clone();
        *cached = Some(token);
        Ok(value)
    }

    fn assertion(&self, now: DateTime<Utc>) -> Result<String> {
        let iat = now.timestamp();
        let claims = Claims {
            iss: &self.email,
            scope: SCOPE,
            aud: &self.token_url,
            iat,
            exp: iat + 3600,
        };
        Ok(jsonwebtoken::encode(
            &Header::new(Algorithm::RS256),
            &claims,
            &self.key,
        )?)
    }

    async fn request_token(&self, http: &reqwest::Client) -> Result<CachedToken> {
        let now = Utc::now();
        let assertion = self.assertion(now)?;

        let response = http
            .post(&self.token_url)
            .form(&[("grant_type", GRANT_TYPE), ("assertion", assertion.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(GSheetsError::Auth {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        let token: TokenResponse = response.json().await?;
        Ok(CachedToken {
            value: token.access_token,
            expires_at: now + Duration::seconds(token.expires_in),
        })
    }
}
