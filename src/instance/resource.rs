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

use std::time::Duration;

use async_trait::async_trait;

use tf_provider::schema::Schema;
use tf_provider::value::{Value, ValueEmpty};
use tf_provider::{AttributePath, Diagnostics, Resource};

use crate::client::vpc::{Instance, InstancePatch, VpcApi};
use crate::client::{ApiError, NotFoundExt, Session, SessionHandle};
use crate::tags::{read_tags_best_effort, sync_tags_best_effort};
use crate::utils::{DisplayJoinable, WithSchema, WithTimeouts, WithValidate};
use crate::wait::{Polling, StateChangeConf, WaitError};

use super::state::InstanceState;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30 * 60);

#[derive(Debug, Default, Clone)]
pub struct InstanceResource {
    session: SessionHandle,
    polling: Polling,
}

impl InstanceResource {
    pub fn new(session: SessionHandle) -> Self {
        Self {
            session,
            polling: Polling::default(),
        }
    }
}

/// Wait until the instance leaves provisioning. A `failed` instance ends the wait too.
async fn wait_for_available(
    vpc: &VpcApi<'_>,
    id: &str,
    timeout: Duration,
    polling: Polling,
) -> Result<Instance, WaitError> {
    tracing::info!("Waiting for instance ({id}) to be available.");
    StateChangeConf::new(
        &["retry", "provisioning"],
        &["running", "available", "failed", ""],
        timeout,
    )
    .with_polling(polling)
    .wait_for_state(move || async move {
        let instance = vpc.get_instance(id).await?;
        let state = match instance.status.as_str() {
            "running" | "available" | "failed" => instance.status.clone(),
            _ => "provisioning".to_owned(),
        };
        Ok(Some((instance, state)))
    })
    .await?
    .ok_or(WaitError::NotFound { retries: 0 })
}

async fn wait_for_deleted(
    vpc: &VpcApi<'_>,
    id: &str,
    timeout: Duration,
    polling: Polling,
) -> Result<(), WaitError> {
    StateChangeConf::new(&["deleting", "available"], &["done", ""], timeout)
        .with_polling(polling)
        .wait_for_state(move || async move {
            let state = match vpc.get_instance(id).await.found()? {
                None => "done",
                Some(instance) if instance.status == "failed" => "failed",
                Some(_) => "deleting",
            };
            Ok(Some(((), state.to_owned())))
        })
        .await
        .map(|_| ())
}

async fn refresh(
    diags: &mut Diagnostics,
    session: &Session,
    state: &mut InstanceState<'_>,
) -> Result<bool, ApiError> {
    let Some(instance) = session.vpc().get_instance(state.id.as_str()).await.found()? else {
        return Ok(false);
    };
    let crn = instance.crn.clone();
    state.flatten(instance);
    let tags = std::mem::take(&mut state.tags);
    state.tags = read_tags_best_effort(diags, session, &crn, tags).await;
    Ok(true)
}

fn failure_reasons(instance: &Instance) -> String {
    instance
        .status_reasons
        .iter()
        .map(|reason| format!("{}: {}", reason.code, reason.message))
        .join_with(", ")
        .to_string()
}

#[async_trait]
impl Resource for InstanceResource {
    type State<'a> = InstanceState<'a>;
    type PrivateState<'a> = ValueEmpty;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(InstanceState::schema())
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
        match refresh(diags, &session, &mut refreshed).await {
            Ok(true) => Some((refreshed, private_state)),
            Ok(false) => {
                tracing::info!("Instance {} not found, removing it from state", state.id);
                None
            }
            Err(err) => {
                diags.root_error(
                    "Error getting instance",
                    format!("Error getting instance ({}): {err}", state.id),
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
        state.unknown_outputs();
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
        for (name, changed) in [
            ("vpc", prior_state.vpc != proposed_state.vpc),
            ("zone", prior_state.zone != proposed_state.zone),
            ("profile", prior_state.profile != proposed_state.profile),
            ("image", prior_state.image != proposed_state.image),
            ("keys", prior_state.keys != proposed_state.keys),
            ("user_data", prior_state.user_data != proposed_state.user_data),
            (
                "resource_group",
                prior_state.resource_group != proposed_state.resource_group,
            ),
        ] {
            if changed {
                trigger_replace.push(AttributePath::new(name));
            }
        }

        let prior_interface = prior_state.primary_network_interface.as_ref_option();
        let interface = proposed_state.primary_network_interface.as_ref_option();
        for (name, changed) in [
            (
                "subnet",
                prior_interface.map(|i| &i.subnet) != interface.map(|i| &i.subnet),
            ),
            (
                "name",
                prior_interface.map(|i| &i.name) != interface.map(|i| &i.name),
            ),
            (
                "security_groups",
                prior_interface.map(|i| &i.security_groups)
                    != interface.map(|i| &i.security_groups),
            ),
        ] {
            if changed {
                trigger_replace.push(AttributePath::new("primary_network_interface").attribute(name));
            }
        }

        Some((proposed_state, prior_private_state, trigger_replace))
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
        let vpc = session.vpc();

        let instance = match vpc.create_instance(&planned_state.prototype()).await {
            Ok(instance) => instance,
            Err(err) => {
                diags.root_error(
                    "Error creating instance",
                    format!("[ERROR] Error creating instance: {err}"),
                );
                return None;
            }
        };
        let id = instance.id.clone();
        let crn = instance.crn.clone();
        tracing::info!("Instance {id} created");

        let mut state = planned_state.clone();
        state.flatten(instance);
        state.clear_unknowns();

        let timeout = planned_state.timeouts.create_timeout(DEFAULT_TIMEOUT);
        match wait_for_available(&vpc, &id, timeout, self.polling).await {
            Ok(instance) if instance.status == "failed" => {
                diags.root_error(
                    "Instance failed to provision",
                    format!("Instance {id} is in failed state: {}", failure_reasons(&instance)),
                );
                state.flatten(instance);
                return Some((state, private_state));
            }
            Ok(instance) => state.flatten(instance),
            Err(err) => {
                diags.root_error(
                    "Error waiting for instance",
                    format!("Error waiting for instance ({id}) to be available: {err}"),
                );
                return Some((state, private_state));
            }
        }

        sync_tags_best_effort(diags, &session, &Value::Null, &planned_state.tags, &crn).await;

        let mut refreshed = state.clone();
        match refresh(diags, &session, &mut refreshed).await {
            Ok(true) => Some((refreshed, private_state)),
            Ok(false) => {
                diags.root_error(
                    "Instance disappeared",
                    format!("Instance {id} was not found right after its creation"),
                );
                Some((state, private_state))
            }
            Err(err) => {
                diags.root_error(
                    "Error getting instance",
                    format!("Error getting instance ({id}): {err}"),
                );
                Some((state, private_state))
            }
        }
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

        if planned_state.name != prior_state.name {
            let patch = InstancePatch {
                name: planned_state.name.as_deref_option().map(str::to_owned),
            };
            if let Err(err) = session.vpc().update_instance(&id, &patch).await {
                diags.root_error(
                    "Error updating instance",
                    format!("Error updating instance ({id}): {err}"),
                );
            }
        }

        if planned_state.tags != prior_state.tags {
            sync_tags_best_effort(
                diags,
                &session,
                &prior_state.tags,
                &planned_state.tags,
                prior_state.crn.as_str(),
            )
            .await;
        }

        let mut state = planned_state.clone();
        match refresh(diags, &session, &mut state).await {
            Ok(true) => Some((state, private_state)),
            Ok(false) => {
                diags.root_error(
                    "Instance disappeared",
                    format!("Instance {id} was not found after its update"),
                );
                Some((prior_state, private_state))
            }
            Err(err) => {
                diags.root_error(
                    "Error getting instance",
                    format!("Error getting instance ({id}): {err}"),
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
        let vpc = session.vpc();
        let id = state.id.as_str();

        match vpc.get_instance(id).await.found() {
            Ok(Some(_)) => {}
            Ok(None) => return Some(()),
            Err(err) => {
                diags.root_error(
                    "Error getting instance",
                    format!("Error getting instance ({id}): {err}"),
                );
                return Some(());
            }
        }

        if let Err(err) = vpc.delete_instance(id).await.found() {
            diags.root_error(
                "Error deleting instance",
                format!("Error deleting instance ({id}): {err}"),
            );
            return Some(());
        }

        let timeout = state.timeouts.delete_timeout(DEFAULT_TIMEOUT);
        match wait_for_deleted(&vpc, id, timeout, self.polling).await {
            Ok(()) => tracing::info!("Instance {id} deleted"),
            Err(err) => diags.root_error(
                "Error waiting for instance deletion",
                format!("The instance {id} failed to delete: {err}"),
            ),
        }
        Some(())
    }

    async fn import<'a>(
        &self,
        diags: &mut Diagnostics,
        id: String,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let state = InstanceState {
            id: Value::from(id.clone()),
            ..Default::default()
        };
        let imported = self
            .read(diags, state, Default::default(), Default::default())
            .await;
        if imported.is_none() {
            diags.root_error(
                "Cannot import non-existent remote object",
                format!("Instance {id} does not exist"),
            );
        }
        imported
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};

    use super::*;
    use crate::client::tests::mock_handle;
    use crate::instance::state::NetworkInterfaceState;

    fn resource(server: &MockServer) -> InstanceResource {
        InstanceResource {
            session: mock_handle(&server.uri()),
            polling: Polling::immediate(),
        }
    }

    fn instance_json(status: &str) -> serde_json::Value {
        serde_json::json!({
            "id": "vsi-id",
            "crn": "crn:v1:bluemix:public:is:us-south-1:a/acc-1::instance:vsi-id",
            "name": "vsi-1",
            "status": status,
            "memory": 8,
            "vcpu": { "architecture": "amd64", "count": 2 },
            "vpc": { "id": "vpc-1" },
            "zone": { "id": "", "name": "us-south-1" },
            "profile": { "id": "", "name": "bx2-2x8" },
            "image": { "id": "image-1" },
            "resource_group": { "id": "rg-1" },
            "primary_network_interface": {
                "id": "nic-1",
                "name": "eth0",
                "subnet": { "id": "subnet-1" },
                "primary_ip": { "address": "10.240.0.4" },
            },
        })
    }

    /// Statuses returned by successive GETs, the last one repeated
    fn statuses(statuses: &'static [&'static str]) -> impl Fn(&Request) -> ResponseTemplate {
        let calls = AtomicUsize::new(0);
        move |_: &Request| {
            let call = calls.fetch_add(1, Ordering::SeqCst);
            let status = statuses[call.min(statuses.len() - 1)];
            ResponseTemplate::new(200).set_body_json(instance_json(status))
        }
    }

    async fn mount_empty_tags(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/v3/tags"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "items": [] })))
            .mount(server)
            .await;
    }

    fn planned() -> InstanceState<'static> {
        let mut state = InstanceState {
            name: "vsi-1".into(),
            vpc: "vpc-1".into(),
            zone: "us-south-1".into(),
            profile: "bx2-2x8".into(),
            image: "image-1".into(),
            keys: Value::Value(vec!["key-1".into()]),
            primary_network_interface: Value::Value(NetworkInterfaceState {
                subnet: "subnet-1".into(),
                ..Default::default()
            }),
            ..Default::default()
        };
        state.unknown_outputs();
        state
    }

    #[tokio::test]
    async fn create_waits_for_running() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/instances"))
            .respond_with(ResponseTemplate::new(201).set_body_json(instance_json("pending")))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/instances/vsi-id"))
            .respond_with(statuses(&["pending", "starting", "running"]))
            .mount(&server)
            .await;
        mount_empty_tags(&server).await;

        let mut diags = Diagnostics::default();
        let (state, _) = resource(&server)
            .create(
                &mut diags,
                planned(),
                planned(),
                Default::default(),
                Default::default(),
            )
            .await
            .unwrap();
        assert!(diags.errors.is_empty(), "{diags:?}");
        assert_eq!(state.status, Value::from("running"));
        assert_eq!(state.memory, Value::Value(8));
        assert_eq!(state.tags, Value::Value(Default::default()));
        let interface = state.primary_network_interface.as_ref_option().unwrap();
        assert_eq!(interface.primary_ipv4_address, Value::from("10.240.0.4"));
        assert_eq!(interface.security_groups, Value::Value(Default::default()));
    }

    #[tokio::test]
    async fn failed_instance_is_an_error_but_kept() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/instances"))
            .respond_with(ResponseTemplate::new(201).set_body_json(instance_json("pending")))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/instances/vsi-id"))
            .respond_with(statuses(&["failed"]))
            .mount(&server)
            .await;

        let mut diags = Diagnostics::default();
        let created = resource(&server)
            .create(
                &mut diags,
                planned(),
                planned(),
                Default::default(),
                Default::default(),
            )
            .await;
        let (state, _) = created.unwrap();
        assert_eq!(state.id, Value::from("vsi-id"));
        assert_eq!(state.status, Value::from("failed"));
        assert_eq!(diags.errors.len(), 1);
    }

    #[tokio::test]
    async fn destroy_waits_until_gone() {
        let server = MockServer::start().await;
        let calls = AtomicUsize::new(0);
        Mock::given(method("GET"))
            .and(path("/v1/instances/vsi-id"))
            .respond_with(move |_: &Request| {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    ResponseTemplate::new(200).set_body_json(instance_json("deleting"))
                } else {
                    ResponseTemplate::new(404)
                }
            })
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/v1/instances/vsi-id"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let mut diags = Diagnostics::default();
        let state = InstanceState {
            id: "vsi-id".into(),
            ..Default::default()
        };
        resource(&server)
            .destroy(&mut diags, state, Default::default(), Default::default())
            .await
            .unwrap();
        assert!(diags.errors.is_empty(), "{diags:?}");
    }

    #[tokio::test]
    async fn subnet_change_forces_replacement() {
        let prior = InstanceState {
            id: "vsi-id".into(),
            primary_network_interface: Value::Value(NetworkInterfaceState {
                subnet: "subnet-1".into(),
                ..Default::default()
            }),
            ..Default::default()
        };
        let proposed = InstanceState {
            name: "renamed".into(),
            primary_network_interface: Value::Value(NetworkInterfaceState {
                subnet: "subnet-2".into(),
                ..Default::default()
            }),
            ..prior.clone()
        };
        let (_, _, replace) = InstanceResource::default()
            .plan_update(
                &mut Diagnostics::default(),
                prior,
                proposed.clone(),
                proposed,
                Default::default(),
                Default::default(),
            )
            .await
            .unwrap();
        assert_eq!(
            replace,
            vec![AttributePath::new("primary_network_interface").attribute("subnet")]
        );
    }
}
