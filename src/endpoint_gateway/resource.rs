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

use crate::client::vpc::{EndpointGateway, EndpointGatewayPatch, VpcApi};
use crate::client::{ApiError, NotFoundExt, Session, SessionHandle};
use crate::tags::{read_tags_best_effort, sync_tags_best_effort};
use crate::utils::{WithSchema, WithTimeouts, WithValidate};
use crate::wait::{Polling, StateChangeConf, WaitError};

use super::state::EndpointGatewayState;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10 * 60);

#[derive(Debug, Default, Clone)]
pub struct EndpointGatewayResource {
    session: SessionHandle,
    polling: Polling,
}

impl EndpointGatewayResource {
    pub fn new(session: SessionHandle) -> Self {
        Self {
            session,
            polling: Polling::default(),
        }
    }
}

async fn wait_for_stable(
    vpc: &VpcApi<'_>,
    id: &str,
    timeout: Duration,
    polling: Polling,
) -> Result<EndpointGateway, WaitError> {
    tracing::info!("Waiting for endpoint gateway ({id}) to be stable.");
    StateChangeConf::new(&["pending", "updating", "waiting"], &["stable"], timeout)
        .with_polling(polling)
        .wait_for_state(move || async move {
            let gateway = vpc.get_endpoint_gateway(id).await?;
            let state = gateway.lifecycle_state.clone();
            Ok(Some((gateway, state)))
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
    StateChangeConf::new(&["deleting", "stable", "pending", "updating"], &["done", ""], timeout)
        .with_polling(polling)
        .wait_for_state(move || async move {
            let state = match vpc.get_endpoint_gateway(id).await.found()? {
                None => "done".to_owned(),
                Some(gateway) => gateway.lifecycle_state,
            };
            Ok(Some(((), state)))
        })
        .await
        .map(|_| ())
}

async fn refresh(
    diags: &mut Diagnostics,
    session: &Session,
    state: &mut EndpointGatewayState<'_>,
) -> Result<bool, ApiError> {
    let Some(gateway) = session
        .vpc()
        .get_endpoint_gateway(state.id.as_str())
        .await
        .found()?
    else {
        return Ok(false);
    };
    let crn = gateway.crn.clone();
    state.flatten(gateway);
    let tags = std::mem::take(&mut state.tags);
    state.tags = read_tags_best_effort(diags, session, &crn, tags).await;
    Ok(true)
}

#[async_trait]
impl Resource for EndpointGatewayResource {
    type State<'a> = EndpointGatewayState<'a>;
    type PrivateState<'a> = ValueEmpty;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(EndpointGatewayState::schema())
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
                tracing::info!("Endpoint gateway {} not found, removing it from state", state.id);
                None
            }
            Err(err) => {
                diags.root_error(
                    "Error getting endpoint gateway",
                    format!("Error Getting Endpoint Gateway ({}): {err}", state.id),
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
        state.crn = Value::Unknown;
        state.health_state = Value::Unknown;
        state.lifecycle_state = Value::Unknown;
        state.resource_type = Value::Unknown;
        state.created_at = Value::Unknown;
        if state.resource_group.is_null() {
            state.resource_group = Value::Unknown;
        }
        if state.security_groups.is_null() {
            state.security_groups = Value::Unknown;
        }
        if state.tags.is_null() {
            state.tags = Value::Unknown;
        }
        if let Value::Value(target) = &mut state.target {
            for value in [&mut target.name, &mut target.crn] {
                if value.is_null() {
                    *value = Value::Unknown;
                }
            }
        }
        if let Value::Value(ips) = &mut state.ips {
            for ip in ips.iter_mut().filter_map(Value::as_mut_option) {
                ip.id = Value::Unknown;
                ip.address = Value::Unknown;
                ip.resource_type = Value::Unknown;
                if ip.name.is_null() {
                    ip.name = Value::Unknown;
                }
            }
        }
        if state.ips.is_null() {
            state.ips = Value::Unknown;
        }
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
        let mut state = proposed_state;
        let mut trigger_replace = Vec::new();
        for (name, changed) in [
            ("vpc", state.vpc != prior_state.vpc),
            ("resource_group", state.resource_group != prior_state.resource_group),
            ("security_groups", state.security_groups != prior_state.security_groups),
            ("target", state.target != prior_state.target),
            ("ips", state.ips != prior_state.ips),
        ] {
            if changed {
                trigger_replace.push(AttributePath::new(name));
            }
        }
        if state.name != prior_state.name {
            state.lifecycle_state = Value::Unknown;
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
        let vpc = session.vpc();

        let gateway = match vpc.create_endpoint_gateway(&planned_state.prototype()).await {
            Ok(gateway) => gateway,
            Err(err) => {
                diags.root_error(
                    "Error creating endpoint gateway",
                    format!("[ERROR] Create Endpoint Gateway failed {err}"),
                );
                return None;
            }
        };
        let id = gateway.id.clone();
        let crn = gateway.crn.clone();
        tracing::info!("Endpoint gateway {id} created");

        let mut state = planned_state.clone();
        state.flatten(gateway);
        if state.tags.is_unknown() {
            state.tags = Value::Value(Default::default());
        }

        let timeout = planned_state.timeouts.create_timeout(DEFAULT_TIMEOUT);
        match wait_for_stable(&vpc, &id, timeout, self.polling).await {
            Ok(gateway) => state.flatten(gateway),
            Err(err) => {
                diags.root_error(
                    "Error waiting for endpoint gateway",
                    format!("Error waiting for endpoint gateway ({id}) to be stable: {err}"),
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
                    "Endpoint gateway disappeared",
                    format!("Endpoint gateway {id} was not found right after its creation"),
                );
                Some((state, private_state))
            }
            Err(err) => {
                diags.root_error(
                    "Error getting endpoint gateway",
                    format!("Error Getting Endpoint Gateway ({id}): {err}"),
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
            let patch = EndpointGatewayPatch {
                name: planned_state.name.as_deref_option().map(str::to_owned),
                ..Default::default()
            };
            if let Err(err) = session.vpc().update_endpoint_gateway(&id, &patch).await {
                diags.root_error(
                    "Error updating endpoint gateway",
                    format!("[ERROR] Error updating Endpoint Gateway ({id}): {err}"),
                );
                return Some((prior_state, private_state));
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
                    "Endpoint gateway disappeared",
                    format!("Endpoint gateway {id} was not found after its update"),
                );
                Some((prior_state, private_state))
            }
            Err(err) => {
                diags.root_error(
                    "Error getting endpoint gateway",
                    format!("Error Getting Endpoint Gateway ({id}): {err}"),
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

        match vpc.get_endpoint_gateway(id).await.found() {
            Ok(Some(_)) => {}
            Ok(None) => return Some(()),
            Err(err) => {
                diags.root_error(
                    "Error getting endpoint gateway",
                    format!("Error Getting Endpoint Gateway ({id}): {err}"),
                );
                return Some(());
            }
        }

        if let Err(err) = vpc.delete_endpoint_gateway(id).await.found() {
            diags.root_error(
                "Error deleting endpoint gateway",
                format!("[ERROR] Delete Endpoint Gateway failed ({id}): {err}"),
            );
            return Some(());
        }

        let timeout = state.timeouts.delete_timeout(DEFAULT_TIMEOUT);
        if let Err(err) = wait_for_deleted(&vpc, id, timeout, self.polling).await {
            diags.root_error(
                "Error waiting for endpoint gateway deletion",
                format!("Error waiting for endpoint gateway ({id}) to be deleted: {err}"),
            );
        }
        Some(())
    }

    async fn import<'a>(
        &self,
        diags: &mut Diagnostics,
        id: String,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let state = EndpointGatewayState {
            id: Value::from(id.clone()),
            ..Default::default()
        };
        let imported = self
            .read(diags, state, Default::default(), Default::default())
            .await;
        if imported.is_none() && diags.errors.is_empty() {
            diags.root_error(
                "Cannot import non-existent remote object",
                format!("Endpoint gateway {id} does not exist"),
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

    use super::super::state::{IpState, TargetState};
    use super::*;
    use crate::client::tests::mock_handle;

    fn resource(server: &MockServer) -> EndpointGatewayResource {
        EndpointGatewayResource {
            session: mock_handle(&server.uri()),
            polling: Polling::immediate(),
        }
    }

    fn gateway(lifecycle_state: &str) -> serde_json::Value {
        serde_json::json!({
            "id": "gw-1",
            "crn": "crn:v1:bluemix:public:is:us-south:a/acc-1::endpoint-gateway:gw-1",
            "name": "gw",
            "health_state": "ok",
            "lifecycle_state": lifecycle_state,
            "ips": [{ "id": "ip-1", "name": "gw-ip", "address": "10.240.0.9", "resource_type": "subnet_reserved_ip" }],
            "target": { "name": "ibm-ntp-server", "resource_type": "provider_infrastructure_service" },
            "vpc": { "id": "vpc-1" },
            "resource_group": { "id": "rg-1" },
            "security_groups": [{ "id": "sg-1" }],
            "resource_type": "endpoint_gateway",
        })
    }

    #[tokio::test]
    async fn create_waits_for_stable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/endpoint_gateways"))
            .respond_with(ResponseTemplate::new(201).set_body_json(gateway("pending")))
            .expect(1)
            .mount(&server)
            .await;
        let calls = AtomicUsize::new(0);
        Mock::given(method("GET"))
            .and(path("/v1/endpoint_gateways/gw-1"))
            .respond_with(move |_: &Request| {
                let state = match calls.fetch_add(1, Ordering::SeqCst) {
                    0 => "pending",
                    _ => "stable",
                };
                ResponseTemplate::new(200).set_body_json(gateway(state))
            })
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v3/tags"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "items": [] })))
            .mount(&server)
            .await;

        let config = EndpointGatewayState {
            name: "gw".into(),
            vpc: "vpc-1".into(),
            target: Value::Value(TargetState {
                name: "ibm-ntp-server".into(),
                resource_type: "provider_infrastructure_service".into(),
                ..Default::default()
            }),
            ips: Value::Value(vec![Value::Value(IpState {
                subnet: "subnet-1".into(),
                ..Default::default()
            })]),
            ..Default::default()
        };
        let mut diags = Diagnostics::default();
        let resource = resource(&server);
        let (planned, _) = resource
            .plan_create(&mut diags, config.clone(), config.clone(), Default::default())
            .await
            .unwrap();
        let (state, _) = resource
            .create(&mut diags, planned, config, Default::default(), Default::default())
            .await
            .unwrap();
        assert!(diags.errors.is_empty(), "{diags:?}");
        assert_eq!(state.lifecycle_state, Value::from("stable"));
        let Value::Value(ips) = &state.ips else {
            panic!("ips should be known");
        };
        let Value::Value(ip) = &ips[0] else {
            panic!("ip should be known");
        };
        assert_eq!(ip.subnet, Value::from("subnet-1"));
        assert_eq!(ip.address, Value::from("10.240.0.9"));
        let Value::Value(target) = &state.target else {
            panic!("target should be known");
        };
        assert!(target.crn.is_null());
    }

    #[tokio::test]
    async fn destroy_waits_until_gone() {
        let server = MockServer::start().await;
        let calls = AtomicUsize::new(0);
        Mock::given(method("GET"))
            .and(path("/v1/endpoint_gateways/gw-1"))
            .respond_with(move |_: &Request| match calls.fetch_add(1, Ordering::SeqCst) {
                0 => ResponseTemplate::new(200).set_body_json(gateway("stable")),
                1 => ResponseTemplate::new(200).set_body_json(gateway("deleting")),
                _ => ResponseTemplate::new(404),
            })
            .expect(3)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/v1/endpoint_gateways/gw-1"))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&server)
            .await;

        let state = EndpointGatewayState {
            id: "gw-1".into(),
            ..Default::default()
        };
        let mut diags = Diagnostics::default();
        resource(&server)
            .destroy(&mut diags, state, Default::default(), Default::default())
            .await
            .unwrap();
        assert!(diags.errors.is_empty(), "{diags:?}");
    }
}
