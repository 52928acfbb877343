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

use async_trait::async_trait;

use tf_provider::schema::Schema;
use tf_provider::value::{Value, ValueEmpty};
use tf_provider::{AttributePath, Diagnostics, Resource};

use crate::client::{ApiError, NotFoundExt, Session, SessionHandle};
use crate::utils::{WithSchema, WithValidate};

use super::state::SchematicsJobState;

async fn refresh(session: &Session, state: &mut SchematicsJobState<'_>) -> Result<bool, ApiError> {
    let Some(job) = session
        .schematics()
        .get_job(state.id.as_str())
        .await
        .found()?
    else {
        return Ok(false);
    };
    state.flatten(job);
    Ok(true)
}

fn mark_computed_unknown(state: &mut SchematicsJobState<'_>) {
    for field in [
        &mut state.name,
        &mut state.description,
        &mut state.resource_group,
        &mut state.submitted_at,
        &mut state.submitted_by,
        &mut state.start_at,
        &mut state.end_at,
        &mut state.duration,
        &mut state.status_code,
        &mut state.status_message,
        &mut state.log_store_url,
        &mut state.state_store_url,
        &mut state.results_url,
        &mut state.updated_at,
    ] {
        *field = Value::Unknown;
    }
}

#[derive(Debug, Default, Clone)]
pub struct SchematicsJobResource {
    session: SessionHandle,
}

impl SchematicsJobResource {
    pub fn new(session: SessionHandle) -> Self {
        Self { session }
    }
}

#[async_trait]
impl Resource for SchematicsJobResource {
    type State<'a> = SchematicsJobState<'a>;
    type PrivateState<'a> = ValueEmpty;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(SchematicsJobState::schema())
    }

    async fn validate<'a>(&self, diags: &mut Diagnostics, config: Self::State<'a>) -> Option<()> {
        config.validate(diags, Default::default()).await;

        if diags.errors.is_empty() {
            Some(())
        } else {
            None
        }
    }

    async fn read<'a>(
        &self,
        diags: &mut Diagnostics,
        state: Self::State<'a>,
        private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let session = self.session.get(diags)?;
        let mut refreshed = state.clone();
        match refresh(&session, &mut refreshed).await {
            Ok(true) => Some((refreshed, private_state)),
            Ok(false) => {
                tracing::info!("Schematics job {} not found, removing it from state", state.id);
                None
            }
            Err(err) => {
                diags.root_error(
                    "Error retrieving schematics job",
                    format!("GetJobWithContext failed {err}"),
                );
                Some((state, private_state))
            }
        }
    }

    async fn plan_create<'a>(
        &self,
        _diags: &mut Diagnostics,
        proposed_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let mut state = proposed_state;
        state.id = Value::Unknown;
        if state.location.is_null() {
            state.location = Value::Unknown;
        }
        mark_computed_unknown(&mut state);
        Some((state, Default::default()))
    }

    async fn plan_update<'a>(
        &self,
        _diags: &mut Diagnostics,
        prior_state: Self::State<'a>,
        proposed_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        prior_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>, Vec<AttributePath>)> {
        let mut trigger_replace = Vec::new();
        let mut state = proposed_state;
        if state.location.is_null() {
            state.location = prior_state.location.clone();
        }
        if state.location != prior_state.location {
            trigger_replace.push(AttributePath::new("location"));
        }
        if state.prototype() != prior_state.prototype() {
            mark_computed_unknown(&mut state);
        }
        Some((state, prior_private_state, trigger_replace))
    }

    async fn plan_destroy<'a>(
        &self,
        _diags: &mut Diagnostics,
        _prior_state: Self::State<'a>,
        prior_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<Self::PrivateState<'a>> {
        Some(prior_private_state)
    }

    async fn create<'a>(
        &self,
        diags: &mut Diagnostics,
        planned_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let session = self.session.get(diags)?;
        let job = match session.schematics().create_job(&planned_state.prototype()).await {
            Ok(job) => job,
            Err(err) => {
                diags.root_error(
                    "Error creating schematics job",
                    format!("CreateJobWithContext failed {err}"),
                );
                return None;
            }
        };
        tracing::info!("Schematics job {} created", job.id);

        let mut state = planned_state;
        state.flatten(job);
        Some((state, private_state))
    }

    async fn update<'a>(
        &self,
        diags: &mut Diagnostics,
        prior_state: Self::State<'a>,
        planned_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let session = self.session.get(diags)?;
        let id = prior_state.id.as_str().to_owned();
        let prototype = planned_state.prototype();
        if prototype == prior_state.prototype() {
            let mut state = planned_state;
            return match refresh(&session, &mut state).await {
                Ok(true) => Some((state, private_state)),
                Ok(false) => {
                    diags.root_error(
                        "Schematics job disappeared",
                        format!("Schematics job {id} was not found"),
                    );
                    Some((prior_state, private_state))
                }
                Err(err) => {
                    diags.root_error(
                        "Error retrieving schematics job",
                        format!("GetJobWithContext failed {err}"),
                    );
                    Some((prior_state, private_state))
                }
            };
        }

        match session.schematics().replace_job(&id, &prototype).await {
            Ok(job) => {
                let mut state = planned_state;
                state.flatten(job);
                Some((state, private_state))
            }
            Err(err) => {
                diags.root_error(
                    "Error updating schematics job",
                    format!("ReplaceJobWithContext failed {err}"),
                );
                Some((prior_state, private_state))
            }
        }
    }

    async fn destroy<'a>(
        &self,
        diags: &mut Diagnostics,
        state: Self::State<'a>,
        _planned_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<()> {
        let session = self.session.get(diags)?;
        if let Err(err) = session.schematics().delete_job(state.id.as_str()).await.found() {
            diags.root_error(
                "Error deleting schematics job",
                format!("DeleteJobWithContext failed {err}"),
            );
        }
        Some(())
    }

    async fn import<'a>(
        &self,
        diags: &mut Diagnostics,
        id: String,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let state = SchematicsJobState {
            id: Value::from(id.clone()),
            ..Default::default()
        };
        let imported = self
            .read(diags, state, Default::default(), Default::default())
            .await;
        if imported.is_none() && diags.errors.is_empty() {
            diags.root_error(
                "Cannot import non-existent remote object",
                format!("Schematics job {id} does not exist"),
            );
        }
        imported
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::client::tests::mock_handle;

    fn job_body(command_parameter: &str) -> serde_json::Value {
        serde_json::json!({
            "id": "job-1",
            "name": "plan-ws-1",
            "command_object": "workspace",
            "command_object_id": "ws-1",
            "command_name": "workspace_plan_flow",
            "command_parameter": command_parameter,
            "location": "us-south",
            "status": { "workspace_job_status": { "status_code": "job_pending", "status_message": "queued" } },
        })
    }

    fn planned() -> SchematicsJobState<'static> {
        SchematicsJobState {
            command_object: "workspace".into(),
            command_object_id: "ws-1".into(),
            command_name: "workspace_plan_flow".into(),
            command_parameter: "plan".into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn create_with_refresh_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/jobs"))
            .and(header("refresh_token", "refresh-1"))
            .and(body_partial_json(serde_json::json!({ "command_object_id": "ws-1" })))
            .respond_with(ResponseTemplate::new(201).set_body_json(job_body("plan")))
            .expect(1)
            .mount(&server)
            .await;

        let resource = SchematicsJobResource::new(mock_handle(&server.uri()));
        let mut diags = Diagnostics::default();
        let (state, _) = resource
            .create(&mut diags, planned(), planned(), Default::default(), Default::default())
            .await
            .unwrap();
        assert!(diags.errors.is_empty(), "{diags:?}");
        assert_eq!(state.id, Value::from("job-1"));
        assert_eq!(state.status_code, Value::from("job_pending"));
        assert_eq!(state.status_message, Value::from("queued"));
        assert_eq!(state.location, Value::from("us-south"));
    }

    #[tokio::test]
    async fn missing_job_leaves_state() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/jobs/job-1"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let resource = SchematicsJobResource::new(mock_handle(&server.uri()));
        let mut diags = Diagnostics::default();
        let state = SchematicsJobState {
            id: "job-1".into(),
            ..planned()
        };
        let read = resource
            .read(&mut diags, state, Default::default(), Default::default())
            .await;
        assert!(read.is_none());
        assert!(diags.errors.is_empty(), "{diags:?}");
    }

    #[tokio::test]
    async fn update_replaces_job() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/v2/jobs/job-1"))
            .and(header("refresh_token", "refresh-1"))
            .and(body_partial_json(serde_json::json!({ "command_parameter": "apply" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(job_body("apply")))
            .expect(1)
            .mount(&server)
            .await;

        let resource = SchematicsJobResource::new(mock_handle(&server.uri()));
        let mut diags = Diagnostics::default();
        let prior = SchematicsJobState {
            id: "job-1".into(),
            ..planned()
        };
        let planned = SchematicsJobState {
            command_parameter: "apply".into(),
            ..prior.clone()
        };
        let (state, _) = resource
            .update(
                &mut diags,
                prior,
                planned.clone(),
                planned,
                Default::default(),
                Default::default(),
            )
            .await
            .unwrap();
        assert!(diags.errors.is_empty(), "{diags:?}");
        assert_eq!(state.command_parameter, Value::from("apply"));
    }

    #[tokio::test]
    async fn destroy_tolerates_missing_job() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/v2/jobs/job-1"))
            .and(header("refresh_token", "refresh-1"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let resource = SchematicsJobResource::new(mock_handle(&server.uri()));
        let mut diags = Diagnostics::default();
        let state = SchematicsJobState {
            id: "job-1".into(),
            ..planned()
        };
        resource
            .destroy(&mut diags, state, Default::default(), Default::default())
            .await
            .unwrap();
        assert!(diags.errors.is_empty(), "{diags:?}");
    }
}
