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

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use tf_provider::schema::{Attribute, AttributeConstraint, AttributeType, Block, Description, Schema};
use tf_provider::value::{Value, ValueEmpty, ValueList, ValueSet, ValueString};
use tf_provider::{map, DataSource, Diagnostics};

use crate::client::schematics::{Job, VariableData};
use crate::client::{NotFoundExt, SessionHandle};
use crate::flatten::{computed, many};
use crate::utils::{attribute, computed_objects, string_list, string_set, WithSchema};

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchematicsJobDataSourceState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub job_id: ValueString<'a>,
    pub command_object: ValueString<'a>,
    pub command_object_id: ValueString<'a>,
    pub command_name: ValueString<'a>,
    pub command_parameter: ValueString<'a>,
    pub command_options: ValueList<ValueString<'a>>,
    pub job_inputs: ValueList<Value<JobInputState<'a>>>,
    pub tags: ValueSet<ValueString<'a>>,
    pub name: ValueString<'a>,
    pub description: ValueString<'a>,
    pub location: ValueString<'a>,
    pub resource_group: ValueString<'a>,
    pub submitted_at: ValueString<'a>,
    pub submitted_by: ValueString<'a>,
    pub start_at: ValueString<'a>,
    pub end_at: ValueString<'a>,
    pub duration: ValueString<'a>,
    pub status_code: ValueString<'a>,
    pub status_message: ValueString<'a>,
    pub log_store_url: ValueString<'a>,
    pub state_store_url: ValueString<'a>,
    pub results_url: ValueString<'a>,
    pub updated_at: ValueString<'a>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobInputState<'a> {
    pub name: ValueString<'a>,
    pub value: ValueString<'a>,
    #[serde(rename = "type")]
    pub variable_type: ValueString<'a>,
}

impl<'a> From<VariableData> for JobInputState<'a> {
    fn from(data: VariableData) -> Self {
        Self {
            name: data.name.into(),
            value: data.value.into(),
            variable_type: data
                .metadata
                .and_then(|metadata| metadata.variable_type)
                .unwrap_or_default()
                .into(),
        }
    }
}

impl<'a> JobInputState<'a> {
    fn attributes() -> HashMap<String, Attribute> {
        use AttributeType::String;
        map! {
            "name" => computed(String, "Name of the variable"),
            "value" => computed(String, "Value of the variable"),
            "type" => computed(String, "Type of the variable"),
        }
    }
}

impl<'a> SchematicsJobDataSourceState<'a> {
    fn flatten(&mut self, job: Job) {
        let status = job.status.current().cloned().unwrap_or_default();
        self.id = job.id.into();
        self.command_object = job.command_object.into();
        self.command_object_id = job.command_object_id.into();
        self.command_name = job.command_name.into();
        self.command_parameter = job.command_parameter.into();
        self.command_options = Value::Value(
            job.command_options
                .into_iter()
                .map(ValueString::from)
                .collect(),
        );
        self.job_inputs = many(job.inputs, JobInputState::from);
        self.tags = Value::Value(job.tags.into_iter().map(ValueString::from).collect());
        self.name = job.name.into();
        self.description = job.description.into();
        self.location = job.location.into();
        self.resource_group = job.resource_group.into();
        self.submitted_at = job.submitted_at.into();
        self.submitted_by = job.submitted_by.into();
        self.start_at = job.start_at.into();
        self.end_at = job.end_at.into();
        self.duration = job.duration.into();
        self.status_code = status.status_code.into();
        self.status_message = status.status_message.into();
        self.log_store_url = job.log_store_url.into();
        self.state_store_url = job.state_store_url.into();
        self.results_url = job.results_url.into();
        self.updated_at = job.updated_at.into();
    }
}

impl<'a> WithSchema for SchematicsJobDataSourceState<'a> {
    fn schema() -> Schema {
        use AttributeConstraint::Required;
        use AttributeType::String;
        Schema {
            version: 1,
            block: Block {
                version: 1,
                description: Description::plain("Look up a schematics job by ID"),
                attributes: map! {
                    "id" => computed(String, "Job ID"),
                    "job_id" => attribute(String, Required, "ID of the job to read"),
                    "command_object" => computed(String, "`workspace` or `action`"),
                    "command_object_id" => computed(String, "Workspace or action ID"),
                    "command_name" => computed(String, "Command the job runs"),
                    "command_parameter" => computed(String, "Playbook, capsule or flow name"),
                    "command_options" => computed(string_list(), "Command line options for the command"),
                    "job_inputs" => computed_objects("Input variables of the job", JobInputState::attributes()),
                    "tags" => computed(string_set(), "Job tags"),
                    "name" => computed(String, "Job name"),
                    "description" => computed(String, "Job description"),
                    "location" => computed(String, "Region the job runs in"),
                    "resource_group" => computed(String, "Resource group name"),
                    "submitted_at" => computed(String, "Submission date"),
                    "submitted_by" => computed(String, "User who submitted the job"),
                    "start_at" => computed(String, "Start date"),
                    "end_at" => computed(String, "End date"),
                    "duration" => computed(String, "Duration of the job"),
                    "status_code" => computed(String, "Status of the job"),
                    "status_message" => computed(String, "Status message of the job"),
                    "log_store_url" => computed(String, "URL of the job logs"),
                    "state_store_url" => computed(String, "URL of the job state"),
                    "results_url" => computed(String, "URL of the job results"),
                    "updated_at" => computed(String, "Last update date"),
                },
                ..Default::default()
            },
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct SchematicsJobDataSource {
    session: SessionHandle,
}

impl SchematicsJobDataSource {
    pub fn new(session: SessionHandle) -> Self {
        Self { session }
    }
}

#[async_trait]
impl DataSource for SchematicsJobDataSource {
    type State<'a> = SchematicsJobDataSourceState<'a>;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(SchematicsJobDataSourceState::schema())
    }

    async fn read<'a>(
        &self,
        diags: &mut Diagnostics,
        config: Self::State<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<Self::State<'a>> {
        let session = self.session.get(diags)?;
        let job_id = config.job_id.as_str();
        let job = match session.schematics().get_job(job_id).await.found() {
            Ok(Some(job)) => job,
            Ok(None) => {
                diags.root_error_short(format!("[ERROR] Schematics job {job_id} not found"));
                return None;
            }
            Err(err) => {
                diags.root_error(
                    "Error retrieving schematics job",
                    format!("GetJobWithContext failed {err}"),
                );
                return None;
            }
        };

        let mut state = config.clone();
        state.flatten(job);
        Some(state)
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::client::tests::mock_handle;

    #[tokio::test]
    async fn reads_job_by_id() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/jobs/job-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "job-1",
                "command_object": "action",
                "command_name": "ansible_playbook_run",
                "inputs": [{ "name": "hosts", "value": "web", "metadata": { "type": "string" } }],
                "status": { "action_job_status": { "status_code": "job_finished" } },
            })))
            .mount(&server)
            .await;

        let data_source = SchematicsJobDataSource::new(mock_handle(&server.uri()));
        let mut diags = Diagnostics::default();
        let config = SchematicsJobDataSourceState {
            job_id: "job-1".into(),
            ..Default::default()
        };
        let state = data_source
            .read(&mut diags, config, Default::default())
            .await
            .unwrap();
        assert!(diags.errors.is_empty(), "{diags:?}");
        assert_eq!(state.status_code, Value::from("job_finished"));
        let inputs: Vec<_> = state.job_inputs.iter().flatten().flatten().collect();
        assert_eq!(inputs.len(), 1);
        assert_eq!(inputs[0].variable_type, Value::from("string"));
    }

    #[tokio::test]
    async fn unknown_job_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/jobs/job-9"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let data_source = SchematicsJobDataSource::new(mock_handle(&server.uri()));
        let mut diags = Diagnostics::default();
        let config = SchematicsJobDataSourceState {
            job_id: "job-9".into(),
            ..Default::default()
        };
        assert!(data_source
            .read(&mut diags, config, Default::default())
            .await
            .is_none());
        assert_eq!(diags.errors.len(), 1);
    }
}
