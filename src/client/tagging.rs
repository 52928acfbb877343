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
use serde::{Deserialize, Serialize};

use super::error::{ApiError, Result};
use super::pager::{collect_all, collection};
use super::Session;

const PAGE_LIMIT: &str = "1000";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Tag {
    pub name: String,
}

collection!(TagCollection, items, Tag, "offset");

#[derive(Debug, Serialize)]
struct TagRequest<'a> {
    resources: [TagResource<'a>; 1],
    tag_names: &'a [String],
}

#[derive(Debug, Serialize)]
struct TagResource<'a> {
    resource_id: &'a str,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TagResults {
    results: Vec<TagResult>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TagResult {
    resource_id: String,
    is_error: bool,
}

/// Global search and tagging API, user tags only
pub struct TaggingApi<'s> {
    session: &'s Session,
}

impl<'s> TaggingApi<'s> {
    pub(super) fn new(session: &'s Session) -> Self {
        Self { session }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v3/tags{}", self.session.endpoints.global_tagging, path)
    }

    pub async fn list_attached_tags(&self, crn: &str) -> Result<Vec<String>> {
        let tags = collect_all(|offset| async move {
            let mut request = self
                .session
                .request(Method::GET, &self.url(""))
                .await?
                .query(&[
                    ("attached_to", crn),
                    ("tag_type", "user"),
                    ("limit", PAGE_LIMIT),
                ]);
            if let Some(offset) = offset {
                request = request.query(&[("offset", offset)]);
            }
            self.session.send::<TagCollection>(request).await
        })
        .await?;
        Ok(tags.into_iter().map(|tag| tag.name).collect())
    }

    pub async fn attach_tags(&self, crn: &str, tags: &[String]) -> Result<()> {
        self.tag_operation("/attach", crn, tags).await
    }

    pub async fn detach_tags(&self, crn: &str, tags: &[String]) -> Result<()> {
        self.tag_operation("/detach", crn, tags).await
    }

    /// Remove a user tag from the account, once nothing is attached to it
    pub async fn delete_tag(&self, tag: &str) -> Result<()> {
        let base = self.url("");
        let mut url = Url::parse(&base).map_err(|err| ApiError::Url(format!("{base}: {err}")))?;
        url.path_segments_mut()
            .map_err(|()| ApiError::Url(base.clone()))?
            .push(tag);
        let request = self
            .session
            .request(Method::DELETE, url.as_str())
            .await?
            .query(&[("tag_type", "user")]);
        self.session.send_empty(request).await
    }

    async fn tag_operation(&self, path: &str, crn: &str, tags: &[String]) -> Result<()> {
        if tags.is_empty() {
            return Ok(());
        }
        let request = self
            .session
            .request(Method::POST, &self.url(path))
            .await?
            .query(&[("tag_type", "user")])
            .json(&TagRequest {
                resources: [TagResource { resource_id: crn }],
                tag_names: tags,
            });
        let results: TagResults = self.session.send(request).await?;
        match results.results.into_iter().find(|result| result.is_error) {
            Some(failed) => Err(ApiError::Tagging(failed.resource_id)),
            None => Ok(()),
        }
    }
}
