use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::Error;

pub const GMAIL_API_BASE: &str = "https://gmail.googleapis.com";

/// Authenticated handle for Gmail REST calls. The base URL is parameterized
/// so tests can point it at a local mock server.
#[derive(Debug, Clone)]
pub struct GmailClient {
    http: reqwest::Client,
    token: String,
    base_url: String,
}

impl GmailClient {
    pub fn new(token: String) -> Self {
        Self::with_base_url(token, GMAIL_API_BASE.to_string())
    }

    pub fn with_base_url(token: String, base_url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            token,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// `users/me`-relative endpoint URL.
    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}/gmail/v1/users/me/{}", self.base_url, path)
    }

    pub(crate) async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, Error> {
        debug!(url, "GET");
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .await?;
        Self::parse(response).await
    }

    pub(crate) async fn post_json<T: DeserializeOwned>(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<T, Error> {
        debug!(url, "POST");
        let response = self
            .http
            .post(url)
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await?;
        Self::parse(response).await
    }

    async fn parse<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, Error> {
        let status = response.status();
        if status.is_success() {
            Ok(response.json::<T>().await?)
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(Error::RemoteApi(format!("{}: {}", status, body)))
        }
    }
}
