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
use tf_provider::value::{self, Value, ValueBool, ValueEmpty, ValueNumber, ValueString};
use tf_provider::{map, AttributePath, Diagnostics, Resource};

use crate::client::vpc::{
    InstanceGroupManagerAction, ManagerActionGroup, ManagerActionManager, ManagerActionPrototype,
};
use crate::client::{NotFoundExt, Session, SessionHandle};
use crate::flatten::opt_string;
use crate::utils::{attribute, split_id, Timeouts, WithSchema, WithTimeouts, WithValidate};
use crate::validators;
use crate::wait::Polling;

use super::health::{while_healthy, DEFAULT_TIMEOUT};

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagerActionState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub instance_group: ValueString<'a>,
    pub instance_group_manager: ValueString<'a>,
    pub name: ValueString<'a>,
    pub run_at: ValueString<'a>,
    pub cron_spec: ValueString<'a>,
    pub membership_count: ValueNumber,
    pub target_manager: ValueString<'a>,
    pub min_membership_count: ValueNumber,
    pub max_membership_count: ValueNumber,
    pub action_id: ValueString<'a>,
    pub action_type: ValueString<'a>,
    pub status: ValueString<'a>,
    pub auto_delete: ValueBool,
    pub auto_delete_timeout: ValueNumber,
    pub last_applied_at: ValueString<'a>,
    pub next_run_at: ValueString<'a>,
    pub resource_type: ValueString<'a>,
    #[serde(with = "value::serde_as_vec")]
    pub timeouts: Value<Timeouts<'a>>,
}

impl<'a> ManagerActionState<'a> {
    fn group(&self) -> Option<ManagerActionGroup> {
        self.membership_count
            .as_ref_option()
            .map(|&membership_count| ManagerActionGroup { membership_count })
    }

    fn manager(&self) -> Option<ManagerActionManager> {
        self.target_manager
            .as_deref_option()
            .map(|id| ManagerActionManager {
                id: id.to_owned(),
                min_membership_count: self.min_membership_count.as_ref_option().copied(),
                max_membership_count: self.max_membership_count.as_ref_option().copied(),
            })
    }

    fn prototype(&self) -> ManagerActionPrototype {
        ManagerActionPrototype {
            name: self.name.as_deref_option().map(str::to_owned),
            cron_spec: self.cron_spec.as_deref_option().map(str::to_owned),
            run_at: self.run_at.as_deref_option().map(str::to_owned),
            group: self.group(),
            manager: self.manager(),
        }
    }

    fn patch(&self, prior: &Self) -> ManagerActionPrototype {
        let mut patch = ManagerActionPrototype::default();
        if self.name != prior.name {
            patch.name = self.name.as_deref_option().map(str::to_owned);
        }
        if self.cron_spec != prior.cron_spec || self.run_at != prior.run_at {
            patch.cron_spec = self.cron_spec.as_deref_option().map(str::to_owned);
            patch.run_at = self.run_at.as_deref_option().map(str::to_owned);
        }
        if self.membership_count != prior.membership_count {
            patch.group = self.group();
        }
        if self.target_manager != prior.target_manager
            || self.min_membership_count != prior.min_membership_count
            || self.max_membership_count != prior.max_membership_count
        {
            patch.manager = self.manager();
        }
        patch
    }

    fn ids(&self) -> Result<[&str; 3]> {
        split_id(self.id.as_str(), '/')
    }

    /// A declared `run_at` is kept as written: the API normalizes the timestamp
    fn flatten(&mut self, group_id: &str, manager_id: &str, action: InstanceGroupManagerAction) {
        self.id = format!("{group_id}/{manager_id}/{}", action.id).into();
        self.instance_group = group_id.to_owned().into();
        self.instance_group_manager = manager_id.to_owned().into();
        self.action_id = action.id.into();
        self.name = action.name.into();
        self.action_type = action.action_type.into();
        self.status = action.status.into();
        self.auto_delete = Value::Value(action.auto_delete);
        self.auto_delete_timeout = Value::Value(action.auto_delete_timeout);
        self.cron_spec = opt_string(action.cron_spec);
        if !self.run_at.is_value() || action.run_at.is_none() {
            self.run_at = opt_string(action.run_at);
        }
        self.last_applied_at = opt_string(action.last_applied_at);
        self.next_run_at = opt_string(action.next_run_at);
        self.resource_type = action.resource_type.into();
        self.membership_count = action.group.map(|group| group.membership_count).into();
        match action.manager {
            Some(manager) => {
                self.target_manager = manager.id.into();
                self.min_membership_count = manager.min_membership_count.into();
                self.max_membership_count = manager.max_membership_count.into();
            }
            None => {
                self.target_manager = Value::Null;
                self.min_membership_count = Value::Null;
                self.max_membership_count = Value::Null;
            }
        }
    }
}

impl<'a> WithSchema for ManagerActionState<'a> {
    fn schema() -> Schema {
        use AttributeConstraint::{Computed, Optional, OptionalComputed, Required};
        use AttributeType::{Bool, Number, String};
        Schema {
            version: 1,
            block: Block {
                version: 1,
                description: Description::plain("Scheduled action of an instance group manager"),
                attributes: map! {
                    "id" => attribute(String, Computed, "`<instance_group>/<manager>/<action>`"),
                    "instance_group" => attribute(String, Required, "Instance group ID"),
                    "instance_group_manager" => attribute(String, Required, "Scheduled instance group manager ID"),
                    "name" => attribute(String, OptionalComputed, "Action name"),
                    "run_at" => attribute(String, Optional, "Date and time of a one time action, conflicts with `cron_spec`"),
                    "cron_spec" => attribute(String, Optional, "Cron specification of a recurring action"),
                    "membership_count" => attribute(Number, Optional, "Number of members the group is set to"),
                    "target_manager" => attribute(String, Optional, "Autoscale manager the bounds apply to"),
                    "min_membership_count" => attribute(Number, Optional, "Minimum number of members of the autoscale manager"),
                    "max_membership_count" => attribute(Number, Optional, "Maximum number of members of the autoscale manager"),
                    "action_id" => attribute(String, Computed, "Action ID"),
                    "action_type" => attribute(String, Computed, "Action type"),
                    "status" => attribute(String, Computed, "Action status"),
                    "auto_delete" => attribute(Bool, Computed, "Whether the action is deleted once it has run"),
                    "auto_delete_timeout" => attribute(Number, Computed, "Hours before a finished action is deleted"),
                    "last_applied_at" => attribute(String, Computed, "Date of the last run"),
                    "next_run_at" => attribute(String, Computed, "Date of the next run"),
                    "resource_type" => attribute(String, Computed, "Resource type"),
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
impl<'a> WithValidate for ManagerActionState<'a> {
    async fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath) {
        validators::resource_name(diags, attr_path.clone().attribute("name"), &self.name);
        validators::at_most_one(
            diags,
            attr_path.clone().attribute("run_at"),
            &[
                ("run_at", !self.run_at.is_null()),
                ("cron_spec", !self.cron_spec.is_null()),
            ],
        );
        if self.run_at.is_null() && self.cron_spec.is_null() {
            diags.error_short(
                "One of `run_at` or `cron_spec` must be set",
                attr_path.clone(),
            );
        }
        validators::at_most_one(
            diags,
            attr_path.clone().attribute("membership_count"),
            &[
                ("membership_count", !self.membership_count.is_null()),
                ("target_manager", !self.target_manager.is_null()),
            ],
        );
        if self.target_manager.is_null()
            && !(self.min_membership_count.is_null() && self.max_membership_count.is_null())
        {
            diags.error(
                "Missing target manager",
                "`min_membership_count` and `max_membership_count` apply to `target_manager`",
                attr_path.clone().attribute("target_manager"),
            );
        }
        for (name, count, min) in [
            ("membership_count", &self.membership_count, 0),
            ("min_membership_count", &self.min_membership_count, 1),
            ("max_membership_count", &self.max_membership_count, 1),
        ] {
            validators::int_range(diags, attr_path.clone().attribute(name), count, min, 1000);
        }
        if let Value::Value(timeouts) = &self.timeouts {
            timeouts
                .validate(diags, attr_path.attribute("timeouts").index(0))
                .await;
        }
    }
}

async fn refresh(session: &Session, state: &mut ManagerActionState<'_>) -> Result<bool> {
    let [group_id, manager_id, id] = state.ids()?.map(str::to_owned);
    let action = session
        .vpc()
        .get_instance_group_manager_action(&group_id, &manager_id, &id)
        .await
        .found()
        .with_context(|| format!("Error getting scheduled action ({group_id}/{manager_id}/{id})"))?;
    match action {
        Some(action) => {
            state.flatten(&group_id, &manager_id, action);
            Ok(true)
        }
        None => Ok(false),
    }
}

#[derive(Debug, Default, Clone)]
pub struct ManagerActionResource {
    session: SessionHandle,
    polling: Polling,
}

impl ManagerActionResource {
    pub fn new(session: SessionHandle) -> Self {
        Self {
            session,
            polling: Polling::default(),
        }
    }
}

#[async_trait]
impl Resource for ManagerActionResource {
    type State<'a> = ManagerActionState<'a>;
    type PrivateState<'a> = ValueEmpty;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(ManagerActionState::schema())
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
                tracing::info!("Scheduled action {} not found, removing it from state", state.id);
                None
            }
            Err(err) => {
                diags.root_error("Error reading scheduled action", format!("{err:#}"));
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
        state.action_id = Value::Unknown;
        state.action_type = Value::Unknown;
        state.status = Value::Unknown;
        state.auto_delete = Value::Unknown;
        state.auto_delete_timeout = Value::Unknown;
        state.last_applied_at = Value::Unknown;
        state.next_run_at = Value::Unknown;
        state.resource_type = Value::Unknown;
        if state.name.is_null() {
            state.name = Value::Unknown;
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
        if state.instance_group != prior_state.instance_group {
            trigger_replace.push(AttributePath::new("instance_group"));
        }
        if state.instance_group_manager != prior_state.instance_group_manager {
            trigger_replace.push(AttributePath::new("instance_group_manager"));
        }
        if state.patch(&prior_state) != ManagerActionPrototype::default() {
            state.status = Value::Unknown;
            state.next_run_at = Value::Unknown;
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
        let group_id = planned_state.instance_group.as_str();
        let manager_id = planned_state.instance_group_manager.as_str();
        let timeout = planned_state.timeouts.create_timeout(DEFAULT_TIMEOUT);

        let prototype = planned_state.prototype();
        let (api, prototype) = (&vpc, &prototype);
        let created = while_healthy(&vpc, group_id, timeout, self.polling, move || async move {
            api.create_instance_group_manager_action(group_id, manager_id, prototype)
                .await
        })
        .await;
        match created {
            Ok(action) => {
                tracing::info!("Scheduled action {} created", action.id);
                let mut state = planned_state.clone();
                state.flatten(group_id, manager_id, action);
                Some((state, private_state))
            }
            Err(err) => {
                diags.root_error(
                    "Error creating scheduled action",
                    format!("[ERROR] Error creating InstanceGroup Manager Action: {err:#}"),
                );
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
        let vpc = session.vpc();
        let group_id = prior_state.instance_group.as_str();
        let manager_id = prior_state.instance_group_manager.as_str();
        let id = prior_state.action_id.as_str();
        let timeout = planned_state.timeouts.update_timeout(DEFAULT_TIMEOUT);

        let patch = planned_state.patch(&prior_state);
        let (api, patch) = (&vpc, &patch);
        let updated = while_healthy(&vpc, group_id, timeout, self.polling, move || async move {
            api.update_instance_group_manager_action(group_id, manager_id, id, patch)
                .await
        })
        .await;
        match updated {
            Ok(action) => {
                let mut state = planned_state.clone();
                state.flatten(group_id, manager_id, action);
                Some((state, private_state))
            }
            Err(err) => {
                diags.root_error(
                    "Error updating scheduled action",
                    format!("[ERROR] Error updating InstanceGroup Manager Action ({id}): {err:#}"),
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
        let group_id = state.instance_group.as_str();
        let manager_id = state.instance_group_manager.as_str();
        let id = state.action_id.as_str();
        let timeout = state.timeouts.delete_timeout(DEFAULT_TIMEOUT);

        let api = &vpc;
        let deleted = while_healthy(&vpc, group_id, timeout, self.polling, move || async move {
            api.delete_instance_group_manager_action(group_id, manager_id, id)
                .await
                .found()
        })
        .await;
        if let Err(err) = deleted {
            diags.root_error(
                "Error deleting scheduled action",
                format!("[ERROR] Error deleting InstanceGroup Manager Action ({id}): {err:#}"),
            );
        }
        Some(())
    }

    async fn import<'a>(
        &self,
        diags: &mut Diagnostics,
        id: String,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let state = ManagerActionState {
            id: Value::from(id.clone()),
            ..Default::default()
        };
        let imported = self
            .read(diags, state, Default::default(), Default::default())
            .await;
        if imported.is_none() && diags.errors.is_empty() {
            diags.root_error(
                "Cannot import non-existent remote object",
                format!("Scheduled action {id} does not exist"),
            );
        }
        imported
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::client::tests::mock_handle;

    fn resource(server: &MockServer) -> ManagerActionResource {
        ManagerActionResource {
            session: mock_handle(&server.uri()),
            polling: Polling::immediate(),
        }
    }

    #[test]
    fn autoscale_bounds_target_a_manager() {
        let state = ManagerActionState {
            cron_spec: "*/5 1,2,3 * * *".into(),
            target_manager: "mgr-2".into(),
            min_membership_count: Value::Value(2),
            max_membership_count: Value::Value(5),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(state.prototype()).unwrap(),
            serde_json::json!({
                "cron_spec": "*/5 1,2,3 * * *",
                "manager": { "id": "mgr-2", "min_membership_count": 2, "max_membership_count": 5 },
            })
        );
    }

    #[tokio::test]
    async fn exactly_one_schedule() {
        let state = ManagerActionState {
            membership_count: Value::Value(3),
            ..Default::default()
        };
        let mut diags = Diagnostics::default();
        state.validate(&mut diags, AttributePath::default()).await;
        assert_eq!(diags.errors.len(), 1);
        assert_eq!(diags.errors[0].summary, "One of `run_at` or `cron_spec` must be set");
    }

    #[tokio::test]
    async fn create_under_healthy_group() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/instance_groups/ig-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "ig-1",
                "status": "healthy",
            })))
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/instance_groups/ig-1/managers/mgr-1/actions"))
            .and(body_json(serde_json::json!({
                "run_at": "2030-01-01T00:00:00Z",
                "group": { "membership_count": 3 },
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "id": "act-1",
                "name": "scale-up",
                "action_type": "scheduled",
                "status": "active",
                "run_at": "2030-01-01T00:00:00.000Z",
                "group": { "membership_count": 3 },
                "resource_type": "instance_group_manager_action",
            })))
            .expect(1)
            .mount(&server)
            .await;

        let config = ManagerActionState {
            instance_group: "ig-1".into(),
            instance_group_manager: "mgr-1".into(),
            run_at: "2030-01-01T00:00:00Z".into(),
            membership_count: Value::Value(3),
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
        assert_eq!(state.id, Value::from("ig-1/mgr-1/act-1"));
        assert_eq!(state.name, Value::from("scale-up"));
        assert_eq!(state.run_at, Value::from("2030-01-01T00:00:00Z"));
        assert!(state.next_run_at.is_null());
    }
}
