use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::time::timeout;
use tracing::debug;
use yup_oauth2::ApplicationSecret;

use crate::auth::scopes::Scope;
use crate::error::Error;

/// Both authorization flows are user-paced waits; bound them rather than
/// hanging a stuck invocation forever.
pub const AUTH_TIMEOUT_SECS: u64 = 300;

/// Redirect target used by the manual flow when the client configuration
/// does not name one. The browser's failure to load it is expected; the user
/// pastes the resulting URL back.
pub const MANUAL_REDIRECT_URI: &str = "http://localhost:8080/";

/// Token endpoint response for both code exchange and refresh.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub expires_in: i64,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

/// Network half of the OAuth dance, behind a trait so the credential state
/// machine is testable without real token-endpoint calls.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TokenExchanger: Send + Sync {
    async fn exchange_code(
        &self,
        secret: &ApplicationSecret,
        redirect_uri: &str,
        code: &str,
    ) -> Result<TokenResponse, Error>;

    async fn refresh_token(
        &self,
        secret: &ApplicationSecret,
        refresh_token: &str,
    ) -> Result<TokenResponse, Error>;
}

pub struct HttpTokenExchanger {
    client: reqwest::Client,
}

impl HttpTokenExchanger {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    async fn post_token_request(
        &self,
        token_uri: &str,
        params: &[(&str, &str)],
    ) -> Result<TokenResponse, Error> {
        debug!(token_uri, "requesting token");
        let response = self.client.post(token_uri).form(params).send().await?;
        let status = response.status();
        if status.is_success() {
            Ok(response.json::<TokenResponse>().await?)
        } else {
            let body = response.text().await.unwrap_or_default();
            if status.is_client_error() {
                // Expired/invalid code, revoked consent, bad refresh token.
                Err(Error::AuthorizationDenied(format!("{}: {}", status, body)))
            } else {
                Err(Error::RemoteApi(format!("{}: {}", status, body)))
            }
        }
    }
}

impl Default for HttpTokenExchanger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TokenExchanger for HttpTokenExchanger {
    async fn exchange_code(
        &self,
        secret: &ApplicationSecret,
        redirect_uri: &str,
        code: &str,
    ) -> Result<TokenResponse, Error> {
        let params = [
            ("client_id", secret.client_id.as_str()),
            ("client_secret", secret.client_secret.as_str()),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("grant_type", "authorization_code"),
        ];
        self.post_token_request(&secret.token_uri, &params).await
    }

    async fn refresh_token(
        &self,
        secret: &ApplicationSecret,
        refresh_token: &str,
    ) -> Result<TokenResponse, Error> {
        let params = [
            ("client_id", secret.client_id.as_str()),
            ("client_secret", secret.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ];
        self.post_token_request(&secret.token_uri, &params).await
    }
}

/// Consent URL embedding the permission strings of the given scope.
/// `access_type=offline` + `prompt=consent` so Google issues a refresh token.
pub fn build_auth_url(secret: &ApplicationSecret, redirect_uri: &str, scope: Scope) -> String {
    let scopes_str = scope.permission_urls().join(" ");
    format!(
        "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&access_type=offline&prompt=consent",
        secret.auth_uri,
        urlencoding::encode(&secret.client_id),
        urlencoding::encode(redirect_uri),
        urlencoding::encode(&scopes_str),
    )
}

/// Pull the authorization code out of whatever the user pasted: a full
/// redirect URL, a bare query string, or the code itself.
pub fn extract_code(input: &str) -> Result<String, Error> {
    let input = input.trim();
    if input.is_empty() {
        return Err(Error::AuthorizationDenied(
            "no authorization code provided".to_string(),
        ));
    }

    let query = input.split_once('?').map(|(_, q)| q).unwrap_or(input);
    for pair in query.split('&') {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        match key {
            "code" if !value.is_empty() => {
                let decoded = urlencoding::decode(value)
                    .map_err(|e| Error::AuthorizationDenied(e.to_string()))?;
                return Ok(decoded.into_owned());
            }
            "error" => {
                return Err(Error::AuthorizationDenied(format!(
                    "provider returned error '{}'",
                    value
                )));
            }
            _ => {}
        }
    }

    // A bare code has no URL or query structure at all.
    if !input.contains('=') && !input.contains("://") && !input.contains(char::is_whitespace) {
        return Ok(input.to_string());
    }

    Err(Error::AuthorizationDenied(
        "pasted input does not contain an authorization code. \
         Copy the full URL from the browser's address bar"
            .to_string(),
    ))
}

/// Loopback listener for the interactive flow. Binds an ephemeral port so the
/// redirect URI never collides with something already running locally.
pub struct RedirectListener {
    listener: TcpListener,
    redirect_uri: String,
}

impl RedirectListener {
    pub async fn bind() -> Result<Self, Error> {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await?;
        let port = listener.local_addr()?.port();
        Ok(Self {
            listener,
            redirect_uri: format!("http://127.0.0.1:{}/", port),
        })
    }

    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    /// Wait for the provider to redirect the browser back, answer it with a
    /// small "you can close this tab" page, and return the authorization code.
    pub async fn wait_for_code(self) -> Result<String, Error> {
        let accept = timeout(
            Duration::from_secs(AUTH_TIMEOUT_SECS),
            self.listener.accept(),
        );
        let (stream, addr) = accept
            .await
            .map_err(|_| Error::AuthorizationTimedOut(AUTH_TIMEOUT_SECS))??;
        debug!(%addr, "redirect received");

        let mut reader = BufReader::new(stream);
        let mut request_line = String::new();
        reader.read_line(&mut request_line).await?;

        // "GET /?state=...&code=... HTTP/1.1"
        let target = request_line
            .split_whitespace()
            .nth(1)
            .unwrap_or("")
            .to_string();
        let result = extract_code(&target);

        let body = match &result {
            Ok(_) => "Authorization complete. You can close this tab and return to the terminal.",
            Err(_) => "Authorization failed. Return to the terminal for details.",
        };
        let response = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: text/plain; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            body.len(),
            body
        );
        let mut stream = reader.into_inner();
        let _ = stream.write_all(response.as_bytes()).await;
        let _ = stream.shutdown().await;

        result
    }
}

/// Blocking stdin read for the manual flow, bounded like the listener.
pub async fn read_pasted_redirect() -> Result<String, Error> {
    let read = tokio::task::spawn_blocking(|| {
        let mut line = String::new();
        std::io::stdin().read_line(&mut line).map(|_| line)
    });
    let line = timeout(Duration::from_secs(AUTH_TIMEOUT_SECS), read)
        .await
        .map_err(|_| Error::AuthorizationTimedOut(AUTH_TIMEOUT_SECS))?
        .map_err(|e| Error::LocalIo(std::io::Error::new(std::io::ErrorKind::Other, e)))??;
    Ok(line)
}
