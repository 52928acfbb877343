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

//! Memberships are created by the group itself when it scales. The resource
//! adopts an existing membership, renames it, and optionally deletes it.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use tf_provider::schema::{AttributeConstraint, AttributeType, Block, Description, Schema};
use tf_provider::value::{self, Value, ValueBool, ValueEmpty, ValueString};
use tf_provider::{map, AttributePath, Diagnostics, Resource};

use crate::client::vpc::{InstanceGroupMembership, InstanceGroupMembershipPatch};
use crate::client::{NotFoundExt, Session, SessionHandle};
use crate::flatten::opt_string;
use crate::utils::{attribute, split_id, Timeouts, WithSchema, WithTimeouts, WithValidate};
use crate::validators;
use crate::wait::Polling;

use super::health::{while_healthy, DEFAULT_TIMEOUT};

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub instance_group: ValueString<'a>,
    pub instance_group_membership: ValueString<'a>,
    pub name: ValueString<'a>,
    pub action_delete: ValueBool,
    pub delete_instance_on_membership_delete: ValueBool,
    pub instance_id: ValueString<'a>,
    pub instance_name: ValueString<'a>,
    pub instance_template: ValueString<'a>,
    pub load_balancer_pool_member: ValueString<'a>,
    pub status: ValueString<'a>,
    #[serde(with = "value::serde_as_vec")]
    pub timeouts: Value<Timeouts<'a>>,
}

impl<'a> MembershipState<'a> {
    fn flatten(&mut self, group_id: &str, membership: InstanceGroupMembership) {
        self.id = format!("{group_id}/{}", membership.id).into();
        self.instance_group = group_id.to_owned().into();
        self.instance_group_membership = membership.id.into();
        self.name = membership.name.into();
        self.delete_instance_on_membership_delete =
            Value::Value(membership.delete_instance_on_membership_delete);
        self.instance_name = membership.instance.name.clone().unwrap_or_default().into();
        self.instance_id = membership.instance.id.into();
        self.instance_template = membership.instance_template.id.into();
        self.load_balancer_pool_member =
            opt_string(membership.pool_member.map(|member| member.id));
        self.status = membership.status.into();
        if self.action_delete.is_null() {
            self.action_delete = Value::Value(false);
        }
    }

    fn ids(&self) -> Result<[&str; 2]> {
        split_id(self.id.as_str(), '/')
    }
}

impl<'a> WithSchema for MembershipState<'a> {
    fn schema() -> Schema {
        use AttributeConstraint::{Computed, OptionalComputed, Required};
        use AttributeType::{Bool, String};
        Schema {
            version: 1,
            block: Block {
                version: 1,
                description: Description::plain("Membership of an instance group, adopted from the group"),
                attributes: map! {
                    "id" => attribute(String, Computed, "`<instance_group>/<membership>`"),
                    "instance_group" => attribute(String, Required, "Instance group ID"),
                    "instance_group_membership" => attribute(String, Required, "Membership ID"),
                    "name" => attribute(String, OptionalComputed, "Membership name"),
                    "action_delete" => attribute(Bool, OptionalComputed, "Delete the membership when the resource is destroyed, defaults to false"),
                    "delete_instance_on_membership_delete" => attribute(Bool, Computed, "Whether the instance is deleted with the membership"),
                    "instance_id" => attribute(String, Computed, "ID of the member instance"),
                    "instance_name" => attribute(String, Computed, "Name of the member instance"),
                    "instance_template" => attribute(String, Computed, "Instance template ID"),
                    "load_balancer_pool_member" => attribute(String, Computed, "Load balancer pool member ID"),
                    "status" => attribute(String, Computed, "Membership status"),
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
impl<'a> WithValidate for MembershipState<'a> {
    async fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath) {
        validators::resource_name(diags, attr_path.clone().attribute("name"), &self.name);
        if let Value::Value(timeouts) = &self.timeouts {
            timeouts
                .validate(diags, attr_path.attribute("timeouts").index(0))
                .await;
        }
    }
}

async fn refresh(session: &Session, state: &mut MembershipState<'_>) -> Result<bool> {
    let [group_id, id] = state.ids()?;
    let (group_id, id) = (group_id.to_owned(), id.to_owned());
    let membership = session
        .vpc()
        .get_instance_group_membership(&group_id, &id)
        .await
        .found()
        .with_context(|| format!("Error getting instance group membership ({group_id}/{id})"))?;
    match membership {
        Some(membership) => {
            state.flatten(&group_id, membership);
            Ok(true)
        }
        None => Ok(false),
    }
}

#[derive(Debug, Default, Clone)]
pub struct MembershipResource {
    session: SessionHandle,
    polling: Polling,
}

impl MembershipResource {
    pub fn new(session: SessionHandle) -> Self {
        Self {
            session,
            polling: Polling::default(),
        }
    }

    async fn adopt(
        &self,
        session: &Session,
        planned: &MembershipState<'_>,
    ) -> Result<InstanceGroupMembership> {
        let group_id = planned.instance_group.as_str();
        let id = planned.instance_group_membership.as_str();
        let vpc = session.vpc();
        let membership = vpc
            .get_instance_group_membership(group_id, id)
            .await
            .found()
            .with_context(|| format!("Error getting instance group membership ({group_id}/{id})"))?
            .ok_or_else(|| anyhow!("Instance group membership {id} not found in group {group_id}"))?;

        let name = planned.name.as_deref_option();
        if name.is_none() || name == Some(membership.name.as_str()) {
            return Ok(membership);
        }
        let patch = InstanceGroupMembershipPatch {
            name: name.map(str::to_owned),
        };
        let timeout = planned.timeouts.create_timeout(DEFAULT_TIMEOUT);
        let (api, patch) = (&vpc, &patch);
        while_healthy(&vpc, group_id, timeout, self.polling, move || async move {
            api.update_instance_group_membership(group_id, id, patch).await
        })
        .await
        .with_context(|| format!("Error updating instance group membership ({group_id}/{id})"))
    }
}

#[async_trait]
impl Resource for MembershipResource {
    type State<'a> = MembershipState<'a>;
    type PrivateState<'a> = ValueEmpty;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(MembershipState::schema())
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
                tracing::info!("Membership {} not found, removing it from state", state.id);
                None
            }
            Err(err) => {
                diags.root_error("Error reading instance group membership", format!("{err:#}"));
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
        if let (Some(group_id), Some(id)) = (
            state.instance_group.as_deref_option(),
            state.instance_group_membership.as_deref_option(),
        ) {
            state.id = format!("{group_id}/{id}").into();
        } else {
            state.id = Value::Unknown;
        }
        if state.name.is_null() {
            state.name = Value::Unknown;
        }
        if state.action_delete.is_null() {
            state.action_delete = Value::Value(false);
        }
        state.delete_instance_on_membership_delete = Value::Unknown;
        state.instance_id = Value::Unknown;
        state.instance_name = Value::Unknown;
        state.instance_template = Value::Unknown;
        state.load_balancer_pool_member = Value::Unknown;
        state.status = Value::Unknown;
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
        if state.instance_group != prior_state.instance_group {
            trigger_replace.push(AttributePath::new("instance_group"));
        }
        if state.instance_group_membership != prior_state.instance_group_membership {
            trigger_replace.push(AttributePath::new("instance_group_membership"));
        }
        if state.action_delete.is_null() {
            state.action_delete = Value::Value(false);
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
        match self.adopt(&session, &planned_state).await {
            Ok(membership) => {
                let mut state = planned_state.clone();
                state.flatten(planned_state.instance_group.as_str(), membership);
                Some((state, private_state))
            }
            Err(err) => {
                diags.root_error("Error creating instance group membership", format!("{err:#}"));
                None
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
        let group_id = prior_state.instance_group.as_str();
        let id = prior_state.instance_group_membership.as_str();

        let mut state = planned_state.clone();
        if planned_state.name == prior_state.name {
            return Some((state, private_state));
        }

        let vpc = session.vpc();
        let patch = InstanceGroupMembershipPatch {
            name: planned_state.name.as_deref_option().map(str::to_owned),
        };
        let timeout = planned_state.timeouts.update_timeout(DEFAULT_TIMEOUT);
        let (api, patch) = (&vpc, &patch);
        let updated = while_healthy(&vpc, group_id, timeout, self.polling, move || async move {
            api.update_instance_group_membership(group_id, id, patch).await
        })
        .await;
        match updated {
            Ok(membership) => {
                state.flatten(group_id, membership);
                Some((state, private_state))
            }
            Err(err) => {
                diags.root_error(
                    "Error updating instance group membership",
                    format!("Error updating instance group membership ({group_id}/{id}): {err:#}"),
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
        if state.action_delete.as_ref_option() != Some(&true) {
            tracing::info!("Membership {} left in its group", state.id);
            return Some(());
        }
        let session = self.session.get(diags)?;
        let group_id = state.instance_group.as_str();
        let id = state.instance_group_membership.as_str();

        let vpc = session.vpc();
        let timeout = state.timeouts.delete_timeout(DEFAULT_TIMEOUT);
        let api = &vpc;
        let deleted = while_healthy(&vpc, group_id, timeout, self.polling, move || async move {
            api.delete_instance_group_membership(group_id, id).await.found()
        })
        .await;
        if let Err(err) = deleted {
            diags.root_error(
                "Error deleting instance group membership",
                format!("Error deleting instance group membership ({group_id}/{id}): {err:#}"),
            );
        }
        Some(())
    }

    async fn import<'a>(
        &self,
        diags: &mut Diagnostics,
        id: String,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let state = MembershipState {
            id: Value::from(id.clone()),
            ..Default::default()
        };
        let imported = self
            .read(diags, state, Default::default(), Default::default())
            .await;
        if imported.is_none() && diags.errors.is_empty() {
            diags.root_error(
                "Cannot import non-existent remote object",
                format!("Instance group membership {id} does not exist"),
            );
        }
        imported
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use wiremock::matchers::{body_json, method, path, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::client::tests::mock_handle;

    fn resource(server: &MockServer) -> MembershipResource {
        MembershipResource {
            session: mock_handle(&server.uri()),
            polling: Polling::immediate(),
        }
    }

    fn membership(name: &str) -> serde_json::Value {
        serde_json::json!({
            "id": "m-1",
            "name": name,
            "status": "healthy",
            "instance": { "id": "vsi-1", "name": "web-1" },
            "instance_template": { "id": "tpl-1" },
        })
    }

    async fn mount_healthy_group(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/v1/instance_groups/ig-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "ig-1",
                "status": "healthy",
            })))
            .expect(2)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn adopt_and_rename() {
        let server = MockServer::start().await;
        mount_healthy_group(&server).await;
        Mock::given(method("GET"))
            .and(path("/v1/instance_groups/ig-1/memberships/m-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(membership("generated")))
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .and(path("/v1/instance_groups/ig-1/memberships/m-1"))
            .and(body_json(serde_json::json!({ "name": "web-a" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(membership("web-a")))
            .expect(1)
            .mount(&server)
            .await;

        let config = MembershipState {
            instance_group: "ig-1".into(),
            instance_group_membership: "m-1".into(),
            name: "web-a".into(),
            ..Default::default()
        };
        let mut diags = Diagnostics::default();
        let resource = resource(&server);
        let (planned, _) = resource
            .plan_create(&mut diags, config.clone(), config.clone(), Default::default())
            .await
            .unwrap();
        assert_eq!(planned.id, Value::from("ig-1/m-1"));
        let (state, _) = resource
            .create(&mut diags, planned, config, Default::default(), Default::default())
            .await
            .unwrap();
        assert!(diags.errors.is_empty(), "{diags:?}");
        assert_eq!(state.name, Value::from("web-a"));
        assert_eq!(state.instance_id, Value::from("vsi-1"));
        assert_eq!(state.action_delete, Value::Value(false));
        assert!(state.load_balancer_pool_member.is_null());
    }

    fn renamed(membership_id: &str, name: &str) -> (MembershipState<'static>, MembershipState<'static>) {
        let prior = MembershipState {
            id: format!("ig-lock/{membership_id}").into(),
            instance_group: "ig-lock".into(),
            instance_group_membership: membership_id.to_owned().into(),
            name: "generated".into(),
            action_delete: Value::Value(false),
            ..Default::default()
        };
        let planned = MembershipState {
            name: name.to_owned().into(),
            ..prior.clone()
        };
        (prior, planned)
    }

    #[tokio::test]
    async fn renames_in_one_group_are_serialized() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/instance_groups/ig-lock"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "ig-lock",
                "status": "healthy",
            })))
            .expect(4)
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .and(path_regex("^/v1/instance_groups/ig-lock/memberships/m-[12]$"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(membership("renamed"))
                    .set_delay(Duration::from_millis(200)),
            )
            .expect(2)
            .mount(&server)
            .await;

        let resource = resource(&server);
        let (prior_1, planned_1) = renamed("m-1", "web-a");
        let (prior_2, planned_2) = renamed("m-2", "web-b");
        let (mut diags_1, mut diags_2) = (Diagnostics::default(), Diagnostics::default());
        let (first, second) = tokio::join!(
            resource.update(
                &mut diags_1,
                prior_1,
                planned_1.clone(),
                planned_1,
                Default::default(),
                Default::default(),
            ),
            resource.update(
                &mut diags_2,
                prior_2,
                planned_2.clone(),
                planned_2,
                Default::default(),
                Default::default(),
            ),
        );
        assert!(first.is_some() && second.is_some());
        assert!(diags_1.errors.is_empty(), "{diags_1:?}");
        assert!(diags_2.errors.is_empty(), "{diags_2:?}");

        // Each rename runs its healthy wait, PATCH and trailing healthy wait before the other starts
        let methods: Vec<String> = server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .map(|request| request.method.to_string())
            .collect();
        assert_eq!(methods, ["GET", "PATCH", "GET", "GET", "PATCH", "GET"]);
    }

    #[tokio::test]
    async fn destroy_keeps_membership_unless_asked() {
        let server = MockServer::start().await;
        let state = MembershipState {
            id: "ig-1/m-1".into(),
            instance_group: "ig-1".into(),
            instance_group_membership: "m-1".into(),
            action_delete: Value::Value(false),
            ..Default::default()
        };
        let mut diags = Diagnostics::default();
        resource(&server)
            .destroy(&mut diags, state, Default::default(), Default::default())
            .await
            .unwrap();
        assert!(diags.errors.is_empty());
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn import_rejects_malformed_id() {
        let server = MockServer::start().await;
        let mut diags = Diagnostics::default();
        let imported = resource(&server).import(&mut diags, "m-1".to_owned()).await;
        assert!(imported.is_some());
        assert_eq!(diags.errors.len(), 1);
        assert!(diags.errors[0].detail.contains("Incorrect ID"));
    }
}
