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

use reqwest::{Method, RequestBuilder};
use serde::{Deserialize, Serialize};

use super::error::Result;
use super::Session;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Job {
    pub id: String,
    pub name: String,
    pub description: String,
    pub command_object: String,
    pub command_object_id: String,
    pub command_name: String,
    pub command_parameter: String,
    pub command_options: Vec<String>,
    pub inputs: Vec<VariableData>,
    pub settings: Vec<VariableData>,
    pub tags: Vec<String>,
    pub location: String,
    pub resource_group: String,
    pub submitted_at: String,
    pub submitted_by: String,
    pub start_at: String,
    pub end_at: String,
    pub duration: String,
    pub status: JobStatus,
    pub log_store_url: String,
    pub state_store_url: String,
    pub results_url: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct VariableData {
    pub name: String,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<VariableMetadata>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct VariableMetadata {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub variable_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secure: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct JobStatus {
    pub workspace_job_status: Option<JobStatusItem>,
    pub action_job_status: Option<JobStatusItem>,
    pub system_job_status: Option<JobStatusItem>,
    pub flow_job_status: Option<JobStatusItem>,
}

impl JobStatus {
    /// Status of whichever kind of job this is
    pub fn current(&self) -> Option<&JobStatusItem> {
        self.workspace_job_status
            .as_ref()
            .or(self.action_job_status.as_ref())
            .or(self.system_job_status.as_ref())
            .or(self.flow_job_status.as_ref())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct JobStatusItem {
    pub status_code: String,
    pub status_message: String,
    pub updated_at: String,
}

/// Body of the create and replace calls
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct JobPrototype {
    pub command_object: String,
    pub command_object_id: String,
    pub command_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command_parameter: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub command_options: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub inputs: Vec<VariableData>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub settings: Vec<VariableData>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

/// Schematics jobs API
pub struct SchematicsApi<'s> {
    session: &'s Session,
}

impl<'s> SchematicsApi<'s> {
    pub(super) fn new(session: &'s Session) -> Self {
        Self { session }
    }

    async fn call(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        let url = format!("{}/v2/jobs{}", self.session.endpoints.schematics, path);
        self.session.request(method, &url).await
    }

    /// Mutating job calls must carry the IAM refresh token
    async fn call_with_refresh(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        let refresh_token = self.session.refresh_token().await?;
        Ok(self
            .call(method, path)
            .await?
            .header("refresh_token", refresh_token))
    }

    pub async fn create_job(&self, prototype: &JobPrototype) -> Result<Job> {
        let request = self
            .call_with_refresh(Method::POST, "")
            .await?
            .json(prototype);
        self.session.send(request).await
    }

    pub async fn get_job(&self, id: &str) -> Result<Job> {
        let request = self.call(Method::GET, &format!("/{id}")).await?;
        self.session.send(request).await
    }

    pub async fn replace_job(&self, id: &str, prototype: &JobPrototype) -> Result<Job> {
        let request = self
            .call_with_refresh(Method::PUT, &format!("/{id}"))
            .await?
            .json(prototype);
        self.session.send(request).await
    }

    pub async fn delete_job(&self, id: &str) -> Result<()> {
        let request = self
            .call_with_refresh(Method::DELETE, &format!("/{id}"))
            .await?;
        self.session.send_empty(request).await
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::client::tests::mock_session;

    #[tokio::test]
    async fn create_sends_refresh_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/jobs"))
            .and(header("refresh_token", "refresh-1"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "id": "job-1",
                "command_object": "workspace",
                "status": { "workspace_job_status": { "status_code": "job_pending" } },
            })))
            .expect(1)
            .mount(&server)
            .await;

        let session = mock_session(&server.uri());
        let job = session
            .schematics()
            .create_job(&JobPrototype {
                command_object: "workspace".into(),
                command_object_id: "ws-1".into(),
                command_name: "workspace_plan".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(job.id, "job-1");
        assert_eq!(
            job.status.current().map(|status| status.status_code.as_str()),
            Some("job_pending")
        );
    }
}
