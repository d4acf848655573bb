use chrono::{Duration, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use crate::auth::flow::{
    build_auth_url, extract_code, read_pasted_redirect, RedirectListener, TokenExchanger,
    TokenResponse, MANUAL_REDIRECT_URI,
};
use crate::auth::scopes::Scope;
use crate::auth::store::CredentialStore;
use crate::auth::token::TokenRecord;
use crate::error::Error;

/// Structured result of `check_setup`. Absence is data here, never an error.
#[derive(Debug, Serialize)]
pub struct SetupStatus {
    pub client_config_present: bool,
    pub scope: String,
    pub scope_recognized: bool,
    pub token_present: bool,
    pub token_unexpired: bool,
    pub scope_matches: bool,
}

impl SetupStatus {
    pub fn ready(&self) -> bool {
        self.client_config_present && self.token_present && self.token_unexpired && self.scope_matches
    }
}

/// Owns the on-disk credential state and mediates every token decision.
/// The exchanger is injected so the whole lifecycle runs against a mock in
/// tests; the CLI entry point constructs one with `HttpTokenExchanger`.
pub struct CredentialManager<E> {
    store: CredentialStore,
    exchanger: E,
}

impl<E: TokenExchanger> CredentialManager<E> {
    pub fn new(store: CredentialStore, exchanger: E) -> Self {
        Self { store, exchanger }
    }

    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    /// Report which artifacts exist and whether the cached token is usable.
    pub fn check_setup(&self) -> SetupStatus {
        let raw_scope = self.store.raw_scope();
        let parsed_scope = self.store.load_scope().ok();
        let scope = raw_scope.unwrap_or_else(|| {
            parsed_scope
                .unwrap_or(crate::auth::scopes::DEFAULT_SCOPE)
                .as_str()
                .to_string()
        });

        let token = self.store.load_token().unwrap_or(None);
        let now = Utc::now();
        let token_unexpired = token.as_ref().map(|t| !t.is_expired(now)).unwrap_or(false);
        let scope_matches = match (&token, parsed_scope) {
            (Some(t), Some(s)) => t.scope == s,
            _ => false,
        };

        SetupStatus {
            client_config_present: self.store.client_config_present(),
            scope,
            scope_recognized: parsed_scope.is_some(),
            token_present: token.is_some(),
            token_unexpired,
            scope_matches,
        }
    }

    /// Persist a new scope setting. The cached token is deliberately left
    /// alone: the next `get_valid_token` reports the mismatch and forces
    /// re-authorization instead of this call silently revoking anything.
    pub fn set_scope(&self, name: &str) -> Result<Scope, Error> {
        let scope: Scope = name.parse()?;
        self.store.save_scope(scope)?;
        Ok(scope)
    }

    pub fn current_scope(&self) -> Result<Scope, Error> {
        self.store.load_scope()
    }

    /// Interactive authorization: loopback listener plus a consent URL the
    /// user opens in a browser.
    pub async fn authorize_interactive(&self) -> Result<TokenRecord, Error> {
        let secret = self.store.load_client_config().await?;
        let scope = self.store.load_scope()?;

        let listener = RedirectListener::bind().await?;
        let redirect_uri = listener.redirect_uri().to_string();
        let auth_url = build_auth_url(&secret, &redirect_uri, scope);

        println!("Open this URL in your browser to authorize (scope: {}):", scope);
        println!("\n{}\n", auth_url);
        println!("Waiting for the browser to redirect back...");

        let code = listener.wait_for_code().await?;
        self.authorize_with_code(&redirect_uri, &code).await
    }

    /// Manual authorization for headless machines: print the URL, block on a
    /// pasted redirect URL (or bare code) from stdin.
    pub async fn authorize_manual(&self) -> Result<TokenRecord, Error> {
        let secret = self.store.load_client_config().await?;
        let scope = self.store.load_scope()?;

        let redirect_uri = secret
            .redirect_uris
            .iter()
            .find(|uri| uri.starts_with("http"))
            .cloned()
            .unwrap_or_else(|| MANUAL_REDIRECT_URI.to_string());
        let auth_url = build_auth_url(&secret, &redirect_uri, scope);

        println!("STEP 1: Open this URL in any browser (scope: {}):", scope);
        println!("\n{}\n", auth_url);
        println!("STEP 2: Complete the consent flow.");
        println!(
            "STEP 3: The browser will fail to load {} - that's expected.",
            redirect_uri
        );
        println!("STEP 4: Copy the FULL URL from the address bar and paste it here.\n");
        print!("Paste the redirect URL: ");
        use std::io::Write;
        let _ = std::io::stdout().flush();

        let pasted = read_pasted_redirect().await?;
        let code = extract_code(&pasted)?;
        self.authorize_with_code(&redirect_uri, &code).await
    }

    /// Exchange an authorization code and persist the resulting record,
    /// tagged with the currently configured scope. On rejection the previous
    /// record (if any) is left untouched.
    pub async fn authorize_with_code(
        &self,
        redirect_uri: &str,
        code: &str,
    ) -> Result<TokenRecord, Error> {
        let secret = self.store.load_client_config().await?;
        let scope = self.store.load_scope()?;

        let response = self
            .exchanger
            .exchange_code(&secret, redirect_uri, code)
            .await?;
        let record = record_from_response(response, scope, None);
        self.store.save_token(&record)?;
        debug!(%scope, "authorization complete, token cached");
        Ok(record)
    }

    /// Produce a token valid for the configured scope, refreshing if needed.
    ///
    /// The ordering matters: a scope mismatch is reported before any refresh
    /// attempt, because a refreshed token would still carry the old scope.
    pub async fn get_valid_token(&self) -> Result<TokenRecord, Error> {
        let scope = self.store.load_scope()?;
        let record = self.store.load_token()?.ok_or(Error::NotAuthenticated)?;

        if record.scope != scope {
            return Err(Error::ScopeMismatch {
                token: record.scope,
                configured: scope,
            });
        }

        if !record.is_expired(Utc::now()) {
            return Ok(record);
        }

        let refresh_token = match record.refresh_token.clone() {
            Some(t) => t,
            None => return Err(Error::NotAuthenticated),
        };

        let secret = self.store.load_client_config().await?;
        match self.exchanger.refresh_token(&secret, &refresh_token).await {
            Ok(response) => {
                let refreshed = record_from_response(response, scope, Some(refresh_token));
                self.store.save_token(&refreshed)?;
                debug!(%scope, "access token refreshed");
                Ok(refreshed)
            }
            Err(Error::AuthorizationDenied(reason)) => {
                // Revoked consent or provider-enforced expiry; the cached
                // record is dead weight from here on.
                warn!(%reason, "refresh rejected, discarding cached token");
                self.store.delete_token()?;
                Err(Error::NotAuthenticated)
            }
            Err(other) => Err(other),
        }
    }
}

/// Google omits the refresh token on refresh responses; keep the one we had.
fn record_from_response(
    response: TokenResponse,
    scope: Scope,
    prior_refresh: Option<String>,
) -> TokenRecord {
    TokenRecord {
        access_token: response.access_token,
        refresh_token: response.refresh_token.or(prior_refresh),
        expires_at: Utc::now() + Duration::seconds(response.expires_in),
        scope,
    }
}
