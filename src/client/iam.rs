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

use reqwest::header::IF_MATCH;
use reqwest::{Method, RequestBuilder};
use serde::{Deserialize, Serialize};

use super::error::Result;
use super::pager::{collect_all, collection};
use super::Session;

const PAGE_LIMIT: &str = "100";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AccessGroup {
    pub id: String,
    pub name: String,
    pub description: String,
    pub crn: String,
    pub is_federated: bool,
}

collection!(AccessGroupCollection, groups, AccessGroup, "offset");

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AccessGroupPrototype {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AccessGroupPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// IAM access groups API
pub struct IamApi<'s> {
    session: &'s Session,
}

impl<'s> IamApi<'s> {
    pub(super) fn new(session: &'s Session) -> Self {
        Self { session }
    }

    async fn call(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        let url = format!("{}/v2/groups{}", self.session.endpoints.iam, path);
        self.session.request(method, &url).await
    }

    pub async fn list_access_groups(&self, account_id: &str) -> Result<Vec<AccessGroup>> {
        collect_all(|offset| async move {
            let mut request = self
                .call(Method::GET, "")
                .await?
                .query(&[("account_id", account_id), ("limit", PAGE_LIMIT)]);
            if let Some(offset) = offset {
                request = request.query(&[("offset", offset)]);
            }
            self.session.send::<AccessGroupCollection>(request).await
        })
        .await
    }

    /// Group with its current `ETag`, needed to update it
    pub async fn get_access_group(&self, id: &str) -> Result<(AccessGroup, Option<String>)> {
        let request = self.call(Method::GET, &format!("/{id}")).await?;
        self.session.send_with_etag(request).await
    }

    pub async fn create_access_group(
        &self,
        account_id: &str,
        prototype: &AccessGroupPrototype,
    ) -> Result<AccessGroup> {
        let request = self
            .call(Method::POST, "")
            .await?
            .query(&[("account_id", account_id)])
            .json(prototype);
        self.session.send(request).await
    }

    pub async fn update_access_group(
        &self,
        id: &str,
        etag: &str,
        patch: &AccessGroupPatch,
    ) -> Result<AccessGroup> {
        let request = self
            .call(Method::PATCH, &format!("/{id}"))
            .await?
            .header(IF_MATCH, etag)
            .json(patch);
        self.session.send(request).await
    }

    /// Delete the group, removing its members and policies as well
    pub async fn delete_access_group(&self, id: &str) -> Result<()> {
        let request = self
            .call(Method::DELETE, &format!("/{id}"))
            .await?
            .query(&[("force", "true")]);
        self.session.send_empty(request).await
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::client::tests::mock_session;

    #[tokio::test]
    async fn list_pages_by_offset() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/groups"))
            .and(query_param("offset", "100"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "groups": [{ "id": "AccessGroupId-2", "name": "ops" }],
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v2/groups"))
            .and(query_param("account_id", "acc-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "groups": [{ "id": "AccessGroupId-1", "name": "dev" }],
                "next": { "href": format!("{}/v2/groups?account_id=acc-1&offset=100&limit=100", server.uri()) },
            })))
            .mount(&server)
            .await;

        let session = mock_session(&server.uri());
        let groups = session.iam().list_access_groups("acc-1").await.unwrap();
        let names: Vec<_> = groups.iter().map(|group| group.name.as_str()).collect();
        assert_eq!(names, ["dev", "ops"]);
    }

    #[tokio::test]
    async fn update_sends_if_match() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/groups/AccessGroupId-1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("ETag", "1-abc")
                    .set_body_json(serde_json::json!({ "id": "AccessGroupId-1", "name": "dev" })),
            )
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .and(path("/v2/groups/AccessGroupId-1"))
            .and(header("if-match", "1-abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "AccessGroupId-1",
                "name": "devs",
            })))
            .expect(1)
            .mount(&server)
            .await;

        let session = mock_session(&server.uri());
        let iam = session.iam();
        let (_, etag) = iam.get_access_group("AccessGroupId-1").await.unwrap();
        let etag = etag.unwrap();
        let group = iam
            .update_access_group(
                "AccessGroupId-1",
                &etag,
                &AccessGroupPatch {
                    name: Some("devs".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(group.name, "devs");
    }
}
