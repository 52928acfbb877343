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

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use reqwest::header::HeaderMap;
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use tf_provider::Diagnostics;

mod auth;
pub mod cis;
mod endpoints;
mod error;
pub mod iam;
pub mod pager;
pub mod schematics;
pub mod tagging;
pub mod vpc;

pub use auth::Credentials;
pub use endpoints::{Endpoints, Visibility};
pub use error::{ApiError, NotFoundExt, Result};

use auth::Authenticator;

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub credentials: Credentials,
    pub region: String,
    pub endpoints: Endpoints,
    pub timeout: Duration,
    /// Tags attached to every taggable resource (`IC_ENV_TAGS`)
    pub env_tags: Vec<String>,
}

/// Authenticated access to the IBM Cloud APIs
#[derive(Debug)]
pub struct Session {
    http: reqwest::Client,
    auth: Authenticator,
    pub endpoints: Endpoints,
    pub env_tags: Vec<String>,
}

impl Session {
    pub fn new(config: SessionConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("terraform-provider-ibm/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            auth: Authenticator::new(config.credentials, &config.endpoints.iam),
            http,
            endpoints: config.endpoints,
            env_tags: config.env_tags,
        })
    }

    pub async fn access_token(&self) -> Result<String> {
        Ok(self.auth.token(&self.http).await?.access_token)
    }

    /// Refresh token, required by the Schematics job APIs
    pub async fn refresh_token(&self) -> Result<String> {
        self.auth
            .token(&self.http)
            .await?
            .refresh_token
            .ok_or_else(|| ApiError::Auth("no IAM refresh token available".into()))
    }

    /// Account owning the credentials, read from the token claims
    pub async fn account_id(&self) -> Result<String> {
        let token = self.access_token().await?;
        auth::jwt_claims(&token)?
            .account
            .and_then(|account| account.bss)
            .ok_or_else(|| ApiError::Auth("the IAM token carries no account id".into()))
    }

    pub fn vpc(&self) -> vpc::VpcApi<'_> {
        vpc::VpcApi::new(self)
    }

    pub fn iam(&self) -> iam::IamApi<'_> {
        iam::IamApi::new(self)
    }

    pub fn cis(&self) -> cis::CisApi<'_> {
        cis::CisApi::new(self)
    }

    pub fn schematics(&self) -> schematics::SchematicsApi<'_> {
        schematics::SchematicsApi::new(self)
    }

    pub fn tagging(&self) -> tagging::TaggingApi<'_> {
        tagging::TaggingApi::new(self)
    }

    /// Start an authenticated request
    pub(crate) async fn request(&self, method: Method, url: &str) -> Result<RequestBuilder> {
        let token = self.access_token().await?;
        Ok(self
            .http
            .request(method, url)
            .bearer_auth(token)
            .header(reqwest::header::ACCEPT, "application/json"))
    }

    async fn execute(&self, request: RequestBuilder) -> Result<(HeaderMap, String)> {
        let request = request.build()?;
        tracing::debug!("{} {}", request.method(), request.url());
        let response = self.http.execute(request).await?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.text().await?;
        if status.is_success() {
            Ok((headers, body))
        } else {
            tracing::debug!("{status}: {body}");
            Err(ApiError::from_body(status, body))
        }
    }

    /// Send the request and decode the JSON body
    pub(crate) async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let (_, body) = self.execute(request).await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Send the request, also returning the `ETag` header
    pub(crate) async fn send_with_etag<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<(T, Option<String>)> {
        let (headers, body) = self.execute(request).await?;
        let etag = headers
            .get(reqwest::header::ETAG)
            .and_then(|etag| etag.to_str().ok())
            .map(str::to_owned);
        Ok((serde_json::from_str(&body)?, etag))
    }

    /// Send the request and ignore the body
    pub(crate) async fn send_empty(&self, request: RequestBuilder) -> Result<()> {
        self.execute(request).await.map(|_| ())
    }
}

/// Slot for the session built by `configure`.
///
/// Resources and data sources are instantiated before the provider is
/// configured, so they all share this handle and look the session up on use.
#[derive(Debug, Clone, Default)]
pub struct SessionHandle(Arc<RwLock<Option<Arc<Session>>>>);

impl SessionHandle {
    pub fn set(&self, session: Session) {
        *self.0.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(session));
    }

    pub fn get(&self, diags: &mut Diagnostics) -> Option<Arc<Session>> {
        let session = self
            .0
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if session.is_none() {
            diags.root_error(
                "Provider not configured",
                "The IBM Cloud session is not available: the provider block has not been configured yet.",
            );
        }
        session
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Session pointing every service at `base`, authenticated with a static token
    pub(crate) fn mock_session(base: &str) -> Session {
        let token = auth::tests::fake_jwt(serde_json::json!({
            "account": { "bss": "acc-1" },
        }));
        Session::new(SessionConfig {
            credentials: Credentials::Token {
                access_token: token,
                refresh_token: Some("refresh-1".into()),
            },
            region: "us-south".into(),
            endpoints: Endpoints::mock(base),
            timeout: Duration::from_secs(5),
            env_tags: Vec::new(),
        })
        .unwrap()
    }

    pub(crate) fn mock_handle(base: &str) -> SessionHandle {
        let handle = SessionHandle::default();
        handle.set(mock_session(base));
        handle
    }

    #[test]
    fn unconfigured_handle_reports_error() {
        let mut diags = Diagnostics::default();
        assert!(SessionHandle::default().get(&mut diags).is_none());
        assert_eq!(diags.errors.len(), 1);
    }

    #[tokio::test]
    async fn account_id_comes_from_token() {
        let session = mock_session("http://127.0.0.1:1");
        assert_eq!(session.account_id().await.unwrap(), "acc-1");
        assert_eq!(session.refresh_token().await.unwrap(), "refresh-1");
    }
}
