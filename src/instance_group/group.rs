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

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use tf_provider::schema::{AttributeConstraint, AttributeType, Block, Description, Schema};
use tf_provider::value::{self, Value, ValueEmpty, ValueList, ValueNumber, ValueSet, ValueString};
use tf_provider::{map, AttributePath, Diagnostics, Resource};

use crate::client::vpc::{Identity, InstanceGroup, InstanceGroupPatch, InstanceGroupPrototype};
use crate::client::{ApiError, NotFoundExt, Session, SessionHandle};
use crate::flatten::opt_string;
use crate::mutexkv::{instance_group_key, IBM_MUTEX_KV};
use crate::tags::{read_tags_best_effort, sync_tags_best_effort};
use crate::utils::{
    attribute, string_list, tags_attribute, Timeouts, WithSchema, WithTimeouts, WithValidate,
};
use crate::validators;
use crate::wait::Polling;

use super::health::{wait_for_deleted, wait_for_healthy, while_healthy, DEFAULT_TIMEOUT};

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceGroupState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub name: ValueString<'a>,
    pub instance_template: ValueString<'a>,
    pub instance_count: ValueNumber,
    pub subnets: ValueList<ValueString<'a>>,
    pub application_port: ValueNumber,
    pub load_balancer: ValueString<'a>,
    pub load_balancer_pool: ValueString<'a>,
    pub resource_group: ValueString<'a>,
    pub tags: ValueSet<ValueString<'a>>,
    pub crn: ValueString<'a>,
    pub vpc: ValueString<'a>,
    pub status: ValueString<'a>,
    pub managers: ValueList<ValueString<'a>>,
    #[serde(with = "value::serde_as_vec")]
    pub timeouts: Value<Timeouts<'a>>,
}

fn subnet_ids(subnets: &ValueList<ValueString>) -> Vec<Identity> {
    subnets
        .iter()
        .flatten()
        .filter_map(|subnet| subnet.as_deref_option().map(Identity::id))
        .collect()
}

impl<'a> InstanceGroupState<'a> {
    fn prototype(&self) -> InstanceGroupPrototype {
        InstanceGroupPrototype {
            name: self.name.as_str().to_owned(),
            instance_template: Identity::id(self.instance_template.as_str()),
            membership_count: self.instance_count.as_ref_option().copied(),
            subnets: subnet_ids(&self.subnets),
            application_port: self.application_port.as_ref_option().copied(),
            load_balancer: self.load_balancer.as_deref_option().map(Identity::id),
            load_balancer_pool: self.load_balancer_pool.as_deref_option().map(Identity::id),
            resource_group: self.resource_group.as_deref_option().map(Identity::id),
        }
    }

    /// Changed attributes between `prior` and `self`
    fn patch(&self, prior: &Self) -> InstanceGroupPatch {
        let mut patch = InstanceGroupPatch::default();
        if self.name != prior.name {
            patch.name = self.name.as_deref_option().map(str::to_owned);
        }
        if self.instance_count != prior.instance_count {
            patch.membership_count = self.instance_count.as_ref_option().copied();
        }
        if self.subnets != prior.subnets {
            patch.subnets = Some(subnet_ids(&self.subnets));
        }
        if self.instance_template != prior.instance_template {
            patch.instance_template = self.instance_template.as_deref_option().map(Identity::id);
        }
        if self.application_port != prior.application_port
            || self.load_balancer != prior.load_balancer
            || self.load_balancer_pool != prior.load_balancer_pool
        {
            patch.application_port = self.application_port.as_ref_option().copied();
            patch.load_balancer = self.load_balancer.as_deref_option().map(Identity::id);
            patch.load_balancer_pool = self.load_balancer_pool.as_deref_option().map(Identity::id);
        }
        patch
    }

    /// The API does not return the load balancer, only its pool: it stays as declared
    fn flatten(&mut self, group: InstanceGroup) {
        self.id = group.id.into();
        self.crn = group.crn.into();
        self.name = group.name.into();
        self.status = group.status.into();
        self.instance_template = group.instance_template.id.into();
        self.instance_count = Value::Value(group.membership_count);
        self.subnets = Value::Value(
            group
                .subnets
                .into_iter()
                .map(|subnet| subnet.id.into())
                .collect(),
        );
        self.application_port = group.application_port.into();
        self.load_balancer_pool = opt_string(group.load_balancer_pool.map(|pool| pool.id));
        if self.load_balancer.is_unknown() {
            self.load_balancer = Value::Null;
        }
        self.vpc = group.vpc.id.into();
        self.resource_group = group.resource_group.id.into();
        self.managers = Value::Value(
            group
                .managers
                .into_iter()
                .map(|manager| manager.id.into())
                .collect(),
        );
    }
}

impl<'a> WithSchema for InstanceGroupState<'a> {
    fn schema() -> Schema {
        use AttributeConstraint::{Computed, Optional, OptionalComputed, Required};
        use AttributeType::{Number, String};
        Schema {
            version: 1,
            block: Block {
                version: 1,
                description: Description::plain("Group of instances created from an instance template"),
                attributes: map! {
                    "id" => attribute(String, Computed, "Instance group ID"),
                    "name" => attribute(String, Required, "Instance group name"),
                    "instance_template" => attribute(String, Required, "Instance template ID"),
                    "instance_count" => attribute(Number, OptionalComputed, "Number of instances in the group"),
                    "subnets" => attribute(string_list(), Required, "Subnet IDs the instances are placed in"),
                    "application_port" => attribute(Number, Optional, "Port the load balancer pool members listen on"),
                    "load_balancer" => attribute(String, Optional, "Load balancer ID"),
                    "load_balancer_pool" => attribute(String, Optional, "Load balancer pool ID"),
                    "resource_group" => attribute(String, OptionalComputed, "Resource group ID"),
                    "tags" => tags_attribute(OptionalComputed),
                    "crn" => attribute(String, Computed, "Instance group CRN"),
                    "vpc" => attribute(String, Computed, "VPC ID"),
                    "status" => attribute(String, Computed, "Instance group status"),
                    "managers" => attribute(string_list(), Computed, "Instance group manager IDs"),
                },
                blocks: map! {
                    "timeouts" => Timeouts::block(),
                },
                ..Default::default()
            },
        }
    }
}

#[async_trait]
impl<'a> WithValidate for InstanceGroupState<'a> {
    async fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath) {
        validators::resource_name(diags, attr_path.clone().attribute("name"), &self.name);
        validators::tags(diags, attr_path.clone().attribute("tags"), &self.tags);
        validators::int_range(
            diags,
            attr_path.clone().attribute("instance_count"),
            &self.instance_count,
            0,
            1000,
        );
        validators::int_range(
            diags,
            attr_path.clone().attribute("application_port"),
            &self.application_port,
            1,
            65535,
        );
        let balancing = [
            self.application_port.is_null(),
            self.load_balancer.is_null(),
            self.load_balancer_pool.is_null(),
        ];
        if balancing.contains(&true) && balancing.contains(&false) {
            diags.error(
                "Incomplete load balancer configuration",
                "`application_port`, `load_balancer` and `load_balancer_pool` must be set together",
                attr_path.clone().attribute("load_balancer"),
            );
        }
        if let Value::Value(timeouts) = &self.timeouts {
            timeouts
                .validate(diags, attr_path.attribute("timeouts").index(0))
                .await;
        }
    }
}

async fn refresh(
    diags: &mut Diagnostics,
    session: &Session,
    state: &mut InstanceGroupState<'_>,
) -> Result<bool, ApiError> {
    let Some(group) = session
        .vpc()
        .get_instance_group(state.id.as_str())
        .await
        .found()?
    else {
        return Ok(false);
    };
    let crn = group.crn.clone();
    state.flatten(group);
    let tags = std::mem::take(&mut state.tags);
    state.tags = read_tags_best_effort(diags, session, &crn, tags).await;
    Ok(true)
}

#[derive(Debug, Default, Clone)]
pub struct InstanceGroupResource {
    session: SessionHandle,
    polling: Polling,
}

impl InstanceGroupResource {
    pub fn new(session: SessionHandle) -> Self {
        Self {
            session,
            polling: Polling::default(),
        }
    }

    async fn apply_patch(
        &self,
        session: &Session,
        id: &str,
        patch: &InstanceGroupPatch,
        state: &InstanceGroupState<'_>,
    ) -> Result<()> {
        let vpc = session.vpc();
        let timeout = state.timeouts.update_timeout(DEFAULT_TIMEOUT);
        let api = &vpc;
        while_healthy(&vpc, id, timeout, self.polling, move || async move {
            api.update_instance_group(id, patch).await
        })
        .await
        .with_context(|| format!("Error updating instance group ({id})"))?;
        Ok(())
    }

    /// Memberships go first: a group with instances cannot be deleted
    async fn delete_group(&self, session: &Session, state: &InstanceGroupState<'_>) -> Result<()> {
        let vpc = session.vpc();
        let id = state.id.as_str();
        let timeout = state.timeouts.delete_timeout(DEFAULT_TIMEOUT);
        let _lock = IBM_MUTEX_KV.lock(instance_group_key(id)).await;

        wait_for_healthy(&vpc, id, timeout, self.polling)
            .await
            .with_context(|| format!("Error waiting for instance group ({id}) to be healthy"))?;
        vpc.delete_instance_group_memberships(id)
            .await
            .found()
            .with_context(|| format!("Error deleting memberships of instance group ({id})"))?;
        wait_for_healthy(&vpc, id, timeout, self.polling)
            .await
            .with_context(|| format!("Error waiting for instance group ({id}) to be healthy"))?;
        vpc.delete_instance_group(id)
            .await
            .found()
            .with_context(|| format!("Error deleting instance group ({id})"))?;
        wait_for_deleted(&vpc, id, timeout, self.polling)
            .await
            .with_context(|| format!("Error waiting for instance group ({id}) to be deleted"))?;
        Ok(())
    }
}

#[async_trait]
impl Resource for InstanceGroupResource {
    type State<'a> = InstanceGroupState<'a>;
    type PrivateState<'a> = ValueEmpty;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(InstanceGroupState::schema())
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
                tracing::info!("Instance group {} not found, removing it from state", state.id);
                None
            }
            Err(err) => {
                diags.root_error(
                    "Error getting instance group",
                    format!("Error getting instance group ({}): {err}", state.id),
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
        state.vpc = Value::Unknown;
        state.status = Value::Unknown;
        state.managers = Value::Unknown;
        if state.instance_count.is_null() {
            state.instance_count = Value::Unknown;
        }
        if state.resource_group.is_null() {
            state.resource_group = Value::Unknown;
        }
        if state.tags.is_null() {
            state.tags = Value::Unknown;
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
        if state.resource_group != prior_state.resource_group {
            trigger_replace.push(AttributePath::new("resource_group"));
        }
        if !state.patch(&prior_state).is_empty() {
            state.status = Value::Unknown;
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

        let group = match vpc.create_instance_group(&planned_state.prototype()).await {
            Ok(group) => group,
            Err(err) => {
                diags.root_error(
                    "Error creating instance group",
                    format!("[ERROR] Error creating InstanceGroup: {err}"),
                );
                return None;
            }
        };
        let id = group.id.clone();
        let crn = group.crn.clone();
        tracing::info!("Instance group {id} created");

        let mut state = planned_state.clone();
        state.flatten(group);
        if state.tags.is_unknown() {
            state.tags = Value::Value(Default::default());
        }

        let timeout = planned_state.timeouts.create_timeout(DEFAULT_TIMEOUT);
        match wait_for_healthy(&vpc, &id, timeout, self.polling).await {
            Ok(group) => state.flatten(group),
            Err(err) => {
                diags.root_error(
                    "Error waiting for instance group",
                    format!("Error waiting for instance group ({id}) to be healthy: {err}"),
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
                    "Instance group disappeared",
                    format!("Instance group {id} was not found right after its creation"),
                );
                Some((state, private_state))
            }
            Err(err) => {
                diags.root_error(
                    "Error getting instance group",
                    format!("Error getting instance group ({id}): {err}"),
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

        let patch = planned_state.patch(&prior_state);
        if !patch.is_empty() {
            if let Err(err) = self.apply_patch(&session, &id, &patch, &planned_state).await {
                diags.root_error("Error updating instance group", format!("{err:#}"));
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
                    "Instance group disappeared",
                    format!("Instance group {id} was not found after its update"),
                );
                Some((prior_state, private_state))
            }
            Err(err) => {
                diags.root_error(
                    "Error getting instance group",
                    format!("Error getting instance group ({id}): {err}"),
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
        let id = state.id.as_str();

        match session.vpc().get_instance_group(id).await.found() {
            Ok(Some(_)) => {}
            Ok(None) => return Some(()),
            Err(err) => {
                diags.root_error(
                    "Error getting instance group",
                    format!("Error getting instance group ({id}): {err}"),
                );
                return Some(());
            }
        }

        match self.delete_group(&session, &state).await {
            Ok(()) => tracing::info!("Instance group {id} deleted"),
            Err(err) => diags.root_error("Error deleting instance group", format!("{err:#}")),
        }
        Some(())
    }

    async fn import<'a>(
        &self,
        diags: &mut Diagnostics,
        id: String,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let state = InstanceGroupState {
            id: Value::from(id.clone()),
            ..Default::default()
        };
        let imported = self
            .read(diags, state, Default::default(), Default::default())
            .await;
        if imported.is_none() {
            diags.root_error(
                "Cannot import non-existent remote object",
                format!("Instance group {id} does not exist"),
            );
        }
        imported
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};

    use super::*;
    use crate::client::tests::mock_handle;

    fn resource(server: &MockServer) -> InstanceGroupResource {
        InstanceGroupResource {
            session: mock_handle(&server.uri()),
            polling: Polling::immediate(),
        }
    }

    fn group(status: &str, count: i64) -> serde_json::Value {
        serde_json::json!({
            "id": "ig-1",
            "crn": "crn:v1:bluemix:public:is:us-south:a/acc-1::instance-group:ig-1",
            "name": "web",
            "status": status,
            "membership_count": count,
            "instance_template": { "id": "tpl-1" },
            "subnets": [{ "id": "subnet-1" }],
            "vpc": { "id": "vpc-1" },
            "resource_group": { "id": "rg-1" },
            "managers": [{ "id": "mgr-1" }],
        })
    }

    fn prior() -> InstanceGroupState<'static> {
        InstanceGroupState {
            id: "ig-1".into(),
            name: "web".into(),
            instance_template: "tpl-1".into(),
            instance_count: Value::Value(2),
            subnets: Value::Value(vec!["subnet-1".into()]),
            crn: "crn:v1:bluemix:public:is:us-south:a/acc-1::instance-group:ig-1".into(),
            tags: Value::Value(Default::default()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn scaling_is_patched_between_healthy_waits() {
        let server = MockServer::start().await;
        let patched = Arc::new(AtomicBool::new(false));
        let seen = patched.clone();
        Mock::given(method("GET"))
            .and(path("/v1/instance_groups/ig-1"))
            .respond_with(move |_: &Request| {
                let count = if seen.load(Ordering::SeqCst) { 3 } else { 2 };
                ResponseTemplate::new(200).set_body_json(group("healthy", count))
            })
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .and(path("/v1/instance_groups/ig-1"))
            .and(body_json(serde_json::json!({ "membership_count": 3 })))
            .respond_with(move |_: &Request| {
                patched.store(true, Ordering::SeqCst);
                ResponseTemplate::new(200).set_body_json(group("scaling", 3))
            })
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v3/tags"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "items": [] })))
            .mount(&server)
            .await;

        let planned = InstanceGroupState {
            instance_count: Value::Value(3),
            ..prior()
        };
        let mut diags = Diagnostics::default();
        let (state, _) = resource(&server)
            .update(
                &mut diags,
                prior(),
                planned.clone(),
                planned,
                Default::default(),
                Default::default(),
            )
            .await
            .unwrap();
        assert!(diags.errors.is_empty(), "{diags:?}");
        assert_eq!(state.instance_count, Value::Value(3));
        assert_eq!(state.managers, Value::Value(vec!["mgr-1".into()]));
    }

    #[tokio::test]
    async fn destroy_removes_memberships_first() {
        let server = MockServer::start().await;
        let deleted = Arc::new(AtomicBool::new(false));
        let gone = deleted.clone();
        Mock::given(method("GET"))
            .and(path("/v1/instance_groups/ig-1"))
            .respond_with(move |_: &Request| {
                if gone.load(Ordering::SeqCst) {
                    ResponseTemplate::new(404)
                } else {
                    ResponseTemplate::new(200).set_body_json(group("healthy", 0))
                }
            })
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/v1/instance_groups/ig-1/memberships"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/v1/instance_groups/ig-1"))
            .respond_with(move |_: &Request| {
                deleted.store(true, Ordering::SeqCst);
                ResponseTemplate::new(202)
            })
            .expect(1)
            .mount(&server)
            .await;

        let mut diags = Diagnostics::default();
        resource(&server)
            .destroy(&mut diags, prior(), Default::default(), Default::default())
            .await
            .unwrap();
        assert!(diags.errors.is_empty(), "{diags:?}");
    }

    #[tokio::test]
    async fn load_balancer_attributes_go_together() {
        let state = InstanceGroupState {
            application_port: Value::Value(8080),
            ..prior()
        };
        let mut diags = Diagnostics::default();
        state.validate(&mut diags, AttributePath::default()).await;
        assert_eq!(diags.errors.len(), 1);
    }
}
