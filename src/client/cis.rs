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

use reqwest::{Method, Url};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::json;

use super::error::{ApiError, Result};
use super::Session;

/// Envelope of every CIS response
#[derive(Debug, Clone, Deserialize)]
pub struct CisResponse<T> {
    pub result: T,
    #[serde(default)]
    pub success: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ZoneSetting {
    pub id: String,
    pub value: serde_json::Value,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Dnssec {
    pub status: String,
}

/// Cloud Internet Services API, scoped by instance CRN and zone
pub struct CisApi<'s> {
    session: &'s Session,
}

impl<'s> CisApi<'s> {
    pub(super) fn new(session: &'s Session) -> Self {
        Self { session }
    }

    /// The CRN contains `/` and must be escaped as a single path segment
    fn url(&self, crn: &str, zone_id: &str, tail: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.session.endpoints.cis)
            .map_err(|err| ApiError::Url(format!("{}: {err}", self.session.endpoints.cis)))?;
        url.path_segments_mut()
            .map_err(|()| ApiError::Url(self.session.endpoints.cis.clone()))?
            .pop_if_empty()
            .extend(["v1", crn, "zones", zone_id])
            .extend(tail);
        Ok(url)
    }

    async fn send<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        url: Url,
        body: Option<&B>,
    ) -> Result<T> {
        let mut request = self.session.request(method, url.as_str()).await?;
        if let Some(body) = body {
            request = request.json(body);
        }
        let response: CisResponse<T> = self.session.send(request).await?;
        if !response.success {
            tracing::warn!("CIS call to {url} returned success=false");
        }
        Ok(response.result)
    }

    pub async fn get_setting(&self, crn: &str, zone_id: &str, name: &str) -> Result<ZoneSetting> {
        let url = self.url(crn, zone_id, &["settings", name])?;
        self.send(Method::GET, url, None::<&()>).await
    }

    pub async fn update_setting(
        &self,
        crn: &str,
        zone_id: &str,
        name: &str,
        value: serde_json::Value,
    ) -> Result<ZoneSetting> {
        let url = self.url(crn, zone_id, &["settings", name])?;
        self.send(Method::PATCH, url, Some(&json!({ "value": value })))
            .await
    }

    pub async fn get_dnssec(&self, crn: &str, zone_id: &str) -> Result<Dnssec> {
        let url = self.url(crn, zone_id, &["dnssec"])?;
        self.send(Method::GET, url, None::<&()>).await
    }

    pub async fn update_dnssec(&self, crn: &str, zone_id: &str, status: &str) -> Result<Dnssec> {
        let url = self.url(crn, zone_id, &["dnssec"])?;
        self.send(Method::PATCH, url, Some(&json!({ "status": status })))
            .await
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::client::tests::mock_session;

    const CRN: &str = "crn:v1:bluemix:public:internet-svcs:global:a/4ea1882a2d3401ed1e459979941966ea:31fa970d-51d0-4b05-893e-251cba75a7b3::";

    #[tokio::test]
    async fn crn_is_one_path_segment() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path(format!(
                "/v1/{}/zones/zone-1/settings/ssl",
                CRN.replace('/', "%2F")
            )))
            .and(body_json(serde_json::json!({ "value": "strict" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "result": { "id": "ssl", "value": "strict", "editable": true },
                "success": true,
                "errors": [],
            })))
            .expect(1)
            .mount(&server)
            .await;

        let session = mock_session(&server.uri());
        let setting = session
            .cis()
            .update_setting(CRN, "zone-1", "ssl", "strict".into())
            .await
            .unwrap();
        assert_eq!(setting.value, "strict");
    }
}
