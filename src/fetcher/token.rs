//! Login-with-Amazon token exchange

use serde::Deserialize;
use std::fmt;
use tracing::{debug, info};

use super::sp_http::SpHttpClient;
use super::{FetcherError, FetcherResult, RequestFailure};
use crate::config::Credentials;

const ENDPOINT: &str = "tokenExchange";

/// Short-lived bearer token for API calls
///
/// Lives only for the current run; [`fmt::Debug`] never prints the value.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    /// Wrap a token value
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Header value
    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(<redacted>)")
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
}

/// Exchanges the refresh token for an access token
#[derive(Clone)]
pub struct TokenProvider {
    http: SpHttpClient,
    token_url: String,
}

impl TokenProvider {
    /// Create a provider for a token endpoint
    pub fn new(http: SpHttpClient, token_url: impl Into<String>) -> Self {
        Self {
            http,
            token_url: token_url.into(),
        }
    }

    /// Perform the exchange
    ///
    /// # Errors
    /// [`FetcherError::Auth`] with upstream status and body on rejection, or
    /// when the response carries no token
    pub async fn access_token(&self, credentials: &Credentials) -> FetcherResult<AccessToken> {
        debug!(token_url = %self.token_url, client_id = %credentials.client_id(), "Exchanging refresh token");

        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", credentials.refresh_token()),
            ("client_id", credentials.client_id()),
            ("client_secret", credentials.client_secret()),
        ];
        let request = self.http.inner().post(&self.token_url).form(&form);

        let response: TokenResponse = self
            .http
            .send_json(ENDPOINT, request)
            .await
            .map_err(FetcherError::Auth)?;

        let token = parse_token(response)?;
        info!("Obtained access token");
        Ok(token)
    }
}

fn parse_token(response: TokenResponse) -> FetcherResult<AccessToken> {
    match response.access_token.filter(|t| !t.is_empty()) {
        Some(token) => {
            if let Some(expires_in) = response.expires_in {
                debug!(expires_in, "Access token lifetime");
            }
            Ok(AccessToken::new(token))
        }
        None => Err(FetcherError::Auth(RequestFailure::InvalidResponse {
            endpoint: ENDPOINT.to_string(),
            message: "response did not contain access_token".to_string(),
        })),
    }
}
