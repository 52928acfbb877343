// This file is part of the terraform-provider-ibm project
//
// Copyright (C) ANEO, 2024-2024. All rights reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License")
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use base64::Engine;
use serde::Deserialize;
use time::OffsetDateTime;
use tokio::sync::Mutex;

use super::error::{ApiError, Result};

const APIKEY_GRANT_TYPE: &str = "urn:ibm:params:oauth:grant-type:apikey";
const REFRESH_GRANT_TYPE: &str = "refresh_token";
/// Tokens are renewed this many seconds before they expire
const EXPIRY_MARGIN: i64 = 60;

#[derive(Clone)]
pub enum Credentials {
    ApiKey(String),
    Token {
        access_token: String,
        refresh_token: Option<String>,
    },
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credentials::ApiKey(_) => f.write_str("ApiKey(***)"),
            Credentials::Token { refresh_token, .. } => f
                .debug_struct("Token")
                .field("access_token", &"***")
                .field("refresh_token", &refresh_token.as_ref().map(|_| "***"))
                .finish(),
        }
    }
}

#[derive(Clone, Deserialize)]
pub(crate) struct IamToken {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expiration: Option<i64>,
}

impl std::fmt::Debug for IamToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IamToken")
            .field("expiration", &self.expiration)
            .finish_non_exhaustive()
    }
}

impl IamToken {
    fn is_fresh(&self, now: i64) -> bool {
        match self.expiration {
            Some(expiration) => now + EXPIRY_MARGIN < expiration,
            None => true,
        }
    }
}

/// Exchanges the API key for IAM tokens and keeps them until they are about to expire
#[derive(Debug)]
pub(crate) struct Authenticator {
    credentials: Credentials,
    token_url: String,
    cached: Mutex<Option<IamToken>>,
}

impl Authenticator {
    pub fn new(credentials: Credentials, iam_endpoint: &str) -> Self {
        let cached = match &credentials {
            Credentials::ApiKey(_) => None,
            Credentials::Token {
                access_token,
                refresh_token,
            } => Some(IamToken {
                access_token: strip_bearer(access_token).to_owned(),
                refresh_token: refresh_token.clone(),
                expiration: jwt_claims(strip_bearer(access_token))
                    .ok()
                    .and_then(|claims| claims.exp),
            }),
        };
        Self {
            credentials,
            token_url: format!("{}/identity/token", iam_endpoint.trim_end_matches('/')),
            cached: Mutex::new(cached),
        }
    }

    /// Current token, renewing it first if needed
    pub async fn token(&self, http: &reqwest::Client) -> Result<IamToken> {
        let mut cached = self.cached.lock().await;
        let now = OffsetDateTime::now_utc().unix_timestamp();

        if let Some(token) = cached.as_ref() {
            if token.is_fresh(now) {
                return Ok(token.clone());
            }
        }

        let form: Vec<(&str, &str)> = match (&self.credentials, cached.as_ref()) {
            (Credentials::ApiKey(apikey), _) => {
                vec![("grant_type", APIKEY_GRANT_TYPE), ("apikey", apikey.as_str())]
            }
            (
                Credentials::Token { .. },
                Some(IamToken {
                    refresh_token: Some(refresh_token),
                    ..
                }),
            ) => vec![
                ("grant_type", REFRESH_GRANT_TYPE),
                ("refresh_token", refresh_token.as_str()),
            ],
            (Credentials::Token { .. }, _) => {
                return Err(ApiError::Auth(
                    "the IAM token has expired and no refresh token was provided".into(),
                ))
            }
        };

        tracing::debug!("Requesting IAM token from {}", self.token_url);
        let response = http
            .post(&self.token_url)
            .header(reqwest::header::ACCEPT, "application/json")
            // public client id of the IBM CLIs, refresh grants are rejected without it
            .basic_auth("bx", Some("bx"))
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            let err = ApiError::from_body(status, body);
            return Err(ApiError::Auth(err.to_string()));
        }

        let token: IamToken = serde_json::from_str(&body)?;
        *cached = Some(token.clone());
        Ok(token)
    }
}

fn strip_bearer(token: &str) -> &str {
    token
        .strip_prefix("Bearer ")
        .or_else(|| token.strip_prefix("bearer "))
        .unwrap_or(token)
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct JwtClaims {
    pub exp: Option<i64>,
    pub account: Option<JwtAccount>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct JwtAccount {
    pub bss: Option<String>,
}

/// Decode the (unverified) claims of an IAM access token
pub(crate) fn jwt_claims(token: &str) -> Result<JwtClaims> {
    let payload = strip_bearer(token)
        .split('.')
        .nth(1)
        .ok_or_else(|| ApiError::Auth("malformed IAM token".into()))?;
    let decoded = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|err| ApiError::Auth(format!("malformed IAM token: {err}")))?;
    Ok(serde_json::from_slice(&decoded)?)
}

#[cfg(test)]
pub(crate) mod tests {
    use base64::Engine;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    /// Build an unsigned JWT carrying the given claims
    pub(crate) fn fake_jwt(claims: serde_json::Value) -> String {
        let engine = base64::engine::general_purpose::URL_SAFE_NO_PAD;
        format!(
            "{}.{}.sig",
            engine.encode(r#"{"alg":"none"}"#),
            engine.encode(claims.to_string())
        )
    }

    #[test]
    fn decodes_account_claim() {
        let token = fake_jwt(serde_json::json!({
            "iam_id": "IBMid-123",
            "account": { "bss": "acc-42" },
            "exp": 1700000000,
        }));
        let claims = jwt_claims(&format!("Bearer {token}")).unwrap();
        assert_eq!(claims.account.unwrap().bss.as_deref(), Some("acc-42"));
        assert_eq!(claims.exp, Some(1700000000));
    }

    #[test]
    fn rejects_garbage_token() {
        assert!(jwt_claims("not-a-jwt").is_err());
    }

    #[tokio::test]
    async fn api_key_token_is_cached() {
        let server = MockServer::start().await;
        let expiration = OffsetDateTime::now_utc().unix_timestamp() + 3600;
        Mock::given(method("POST"))
            .and(path("/identity/token"))
            .and(body_string_contains("apikey=secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "tok-1",
                "refresh_token": "ref-1",
                "expiration": expiration,
            })))
            .expect(1)
            .mount(&server)
            .await;

        let auth = Authenticator::new(Credentials::ApiKey("secret".into()), &server.uri());
        let http = reqwest::Client::new();
        assert_eq!(auth.token(&http).await.unwrap().access_token, "tok-1");
        let again = auth.token(&http).await.unwrap();
        assert_eq!(again.refresh_token.as_deref(), Some("ref-1"));
    }

    #[tokio::test]
    async fn expired_token_is_refreshed() {
        let server = MockServer::start().await;
        let expiration = OffsetDateTime::now_utc().unix_timestamp() + 3600;
        Mock::given(method("POST"))
            .and(path("/identity/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "tok-2",
                "expiration": expiration,
            })))
            .expect(1)
            .mount(&server)
            .await;

        let stale = fake_jwt(serde_json::json!({ "exp": 1000 }));
        let auth = Authenticator::new(
            Credentials::Token {
                access_token: stale,
                refresh_token: Some("ref-0".into()),
            },
            &server.uri(),
        );
        let token = auth.token(&reqwest::Client::new()).await.unwrap();
        assert_eq!(token.access_token, "tok-2");
    }

    #[tokio::test]
    async fn iam_rejection_is_an_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/identity/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "errorCode": "BXNIM0415E",
                "errorMessage": "Provided API key could not be found",
            })))
            .mount(&server)
            .await;

        let auth = Authenticator::new(Credentials::ApiKey("bad".into()), &server.uri());
        let err = auth.token(&reqwest::Client::new()).await.unwrap_err();
        assert!(matches!(err, ApiError::Auth(_)));
        assert!(err.to_string().contains("Provided API key could not be found"));
    }
}
