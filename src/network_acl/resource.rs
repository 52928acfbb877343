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

use crate::client::vpc::{Identity, NetworkAclPatch, NetworkAclPrototype};
use crate::client::{ApiError, NotFoundExt, Session, SessionHandle};
use crate::tags::{read_tags_best_effort, sync_tags_best_effort};
use crate::utils::{WithNormalize, WithSchema, WithValidate};

use super::rules::replace_rules;
use super::state::{rules_changed, NetworkAclState};

#[derive(Debug, Default, Clone)]
pub struct NetworkAclResource {
    session: SessionHandle,
}

impl NetworkAclResource {
    pub fn new(session: SessionHandle) -> Self {
        Self { session }
    }
}

/// Read the remote ACL and its rules into `state`.
///
/// Returns `Ok(false)` when the ACL does not exist anymore.
async fn refresh(
    diags: &mut Diagnostics,
    session: &Session,
    state: &mut NetworkAclState<'_>,
) -> Result<bool, ApiError> {
    let id = state.id.as_str().to_owned();
    let vpc = session.vpc();
    let Some(mut acl) = vpc.get_network_acl(&id).await.found()? else {
        return Ok(false);
    };
    acl.rules = vpc.list_network_acl_rules(&id).await?;

    let crn = acl.crn.clone();
    state.flatten(acl);
    let tags = std::mem::take(&mut state.tags);
    state.tags = read_tags_best_effort(diags, session, &crn, tags).await;
    Ok(true)
}

#[async_trait]
impl Resource for NetworkAclResource {
    type State<'a> = NetworkAclState<'a>;
    type PrivateState<'a> = ValueEmpty;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(NetworkAclState::schema())
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
                tracing::info!("Network ACL {} not found, removing it from state", state.id);
                None
            }
            Err(err) => {
                diags.root_error(
                    "Error getting Network ACL",
                    format!("Error getting Network ACL ({}): {err}", state.id),
                );
                Some((state, private_state))
            }
        }
    }

    async fn plan_create<'a>(
        &self,
        diags: &mut Diagnostics,
        proposed_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let mut state = proposed_state;
        state.id = Value::Unknown;
        state.crn = Value::Unknown;
        state.resource_group_name = Value::Unknown;
        if state.resource_group.is_null() {
            state.resource_group = Value::Unknown;
        }
        if state.tags.is_null() {
            state.tags = Value::Unknown;
        }
        state.normalize(diags);
        state.unknown_rule_outputs();

        Some((state, Default::default()))
    }

    async fn plan_update<'a>(
        &self,
        diags: &mut Diagnostics,
        prior_state: Self::State<'a>,
        proposed_state: Self::State<'a>,
        _config_state: Self::State<'a>,
        prior_private_state: Self::PrivateState<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>, Vec<AttributePath>)> {
        let mut state = proposed_state;
        state.normalize(diags);
        if rules_changed(&prior_state, &state) {
            state.unknown_rule_outputs();
        }

        let mut trigger_replace = Vec::new();
        if state.vpc != prior_state.vpc {
            trigger_replace.push(AttributePath::new("vpc"));
        }
        if state.resource_group != prior_state.resource_group {
            trigger_replace.push(AttributePath::new("resource_group"));
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

        let prototype = NetworkAclPrototype {
            name: planned_state.name.as_str().to_owned(),
            vpc: Identity::id(planned_state.vpc.as_str()),
            resource_group: planned_state.resource_group.as_deref_option().map(Identity::id),
        };
        let acl = match session.vpc().create_network_acl(&prototype).await {
            Ok(acl) => acl,
            Err(err) => {
                diags.root_error(
                    "Error creating Network ACL",
                    format!("Error while creating Network ACL: {err}"),
                );
                return None;
            }
        };
        tracing::info!("Network ACL {} created", acl.id);

        let id = acl.id.clone();
        let crn = acl.crn.clone();
        let mut state = planned_state.clone();
        state.flatten(acl);
        if state.tags.is_unknown() {
            state.tags = Value::Value(Default::default());
        }

        // The API creates default allow-all rules along with the ACL
        match replace_rules(&session, &id, &planned_state.declared_rules()).await {
            Ok(()) => {
                sync_tags_best_effort(diags, &session, &Value::Null, &planned_state.tags, &crn)
                    .await
            }
            Err(err) => diags.root_error("Error creating Network ACL rules", format!("{err:#}")),
        }

        let mut refreshed = state.clone();
        match refresh(diags, &session, &mut refreshed).await {
            Ok(true) => Some((refreshed, private_state)),
            Ok(false) => {
                diags.root_error(
                    "Network ACL disappeared",
                    format!("Network ACL {id} was not found right after its creation"),
                );
                Some((state, private_state))
            }
            Err(err) => {
                diags.root_error(
                    "Error getting Network ACL",
                    format!("Error getting Network ACL ({id}): {err}"),
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
            let patch = NetworkAclPatch {
                name: planned_state.name.as_deref_option().map(str::to_owned),
            };
            if let Err(err) = session.vpc().update_network_acl(&id, &patch).await {
                diags.root_error(
                    "Error updating Network ACL",
                    format!("Error Updating Network ACL({id}): {err}"),
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

        if diags.errors.is_empty() && rules_changed(&prior_state, &planned_state) {
            if let Err(err) = replace_rules(&session, &id, &planned_state.declared_rules()).await {
                diags.root_error("Error updating Network ACL rules", format!("{err:#}"));
            }
        }

        let mut state = planned_state.clone();
        state.id = prior_state.id.clone();
        match refresh(diags, &session, &mut state).await {
            Ok(true) => Some((state, private_state)),
            Ok(false) => {
                diags.root_error(
                    "Network ACL disappeared",
                    format!("Network ACL {id} was not found after its update"),
                );
                Some((prior_state, private_state))
            }
            Err(err) => {
                diags.root_error(
                    "Error getting Network ACL",
                    format!("Error getting Network ACL ({id}): {err}"),
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
        let vpc = session.vpc();

        match vpc.get_network_acl(id).await.found() {
            Ok(Some(_)) => {}
            Ok(None) => return Some(()),
            Err(err) => {
                diags.root_error(
                    "Error getting Network ACL",
                    format!("Error getting Network ACL ({id}): {err}"),
                );
                return Some(());
            }
        }

        match vpc.delete_network_acl(id).await.found() {
            Ok(_) => tracing::info!("Network ACL {id} deleted"),
            Err(err) => diags.root_error(
                "Error deleting Network ACL",
                format!("Error Deleting Network ACL : {err}"),
            ),
        }
        Some(())
    }

    async fn import<'a>(
        &self,
        diags: &mut Diagnostics,
        id: String,
    ) -> Option<(Self::State<'a>, Self::PrivateState<'a>)> {
        let state = NetworkAclState {
            id: Value::from(id.clone()),
            ..Default::default()
        };
        let imported = self
            .read(diags, state, Default::default(), Default::default())
            .await;
        if imported.is_none() {
            diags.root_error(
                "Cannot import non-existent remote object",
                format!("Network ACL {id} does not exist"),
            );
        }
        imported
    }
}

impl<'a> NetworkAclState<'a> {
    /// Rule attributes computed by the API become unknown
    fn unknown_rule_outputs(&mut self) {
        for rule in self.rules.iter_mut().flatten().flatten() {
            rule.id = Value::Unknown;
            rule.ip_version = Value::Unknown;
            rule.subnets = Value::Unknown;
        }
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::client::tests::mock_handle;
    use crate::network_acl::state::{PortRangeState, RuleState};

    const CRN: &str = "crn:v1:bluemix:public:is:us-south:a/acc-1::network-acl:acl-1";

    fn acl_json(rules: serde_json::Value) -> serde_json::Value {
        serde_json::json!({
            "id": "acl-1",
            "crn": CRN,
            "name": "my-acl",
            "vpc": { "id": "vpc-1", "name": "my-vpc" },
            "resource_group": { "id": "rg-1", "name": "default" },
            "rules": rules,
            "subnets": [{ "id": "subnet-1" }, { "id": "subnet-2" }],
        })
    }

    fn ssh_rule() -> RuleState<'static> {
        RuleState {
            name: "allow-ssh".into(),
            action: "allow".into(),
            source: "0.0.0.0/0".into(),
            destination: "10.0.0.0/24".into(),
            direction: "inbound".into(),
            tcp: Value::Value(PortRangeState {
                port_min: Value::Value(22),
                port_max: Value::Value(22),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    async fn mount_tags(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/v3/tags"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "items": [{ "name": "env:test" }],
            })))
            .mount(server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v3/tags/attach"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "results": [{ "resource_id": CRN, "is_error": false }],
            })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn read_flattens_rules() {
        let server = MockServer::start().await;
        let rules = serde_json::json!([{
            "id": "rule-1",
            "name": "allow-ssh",
            "action": "allow",
            "direction": "inbound",
            "source": "0.0.0.0/0",
            "destination": "10.0.0.0/24",
            "ip_version": "ipv4",
            "protocol": "tcp",
            "port_min": 22,
            "port_max": 22,
            "source_port_min": 1,
            "source_port_max": 65535,
        }]);
        Mock::given(method("GET"))
            .and(path("/v1/network_acls/acl-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(acl_json(rules.clone())))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/network_acls/acl-1/rules"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "rules": rules })),
            )
            .mount(&server)
            .await;
        mount_tags(&server).await;

        let resource = NetworkAclResource::new(mock_handle(&server.uri()));
        let mut diags = Diagnostics::default();
        let state = NetworkAclState {
            id: "acl-1".into(),
            ..Default::default()
        };
        let (state, _) = resource
            .read(&mut diags, state, Default::default(), Default::default())
            .await
            .unwrap();
        assert!(diags.errors.is_empty(), "{diags:?}");

        assert_eq!(state.name, Value::from("my-acl"));
        assert_eq!(state.vpc, Value::from("vpc-1"));
        assert_eq!(state.resource_group_name, Value::from("default"));
        assert_eq!(state.tags, crate::tags::tags_value(["env:test".to_owned()]));

        let rules = state.declared_rules();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].id, Value::from("rule-1"));
        assert_eq!(rules[0].subnets, Value::Value(2));
        assert!(rules[0].icmp.is_null());
        let tcp = rules[0].tcp.as_ref_option().unwrap();
        assert_eq!(tcp.port_min, Value::Value(22));
        assert_eq!(tcp.source_port_max, Value::Value(65535));
    }

    #[tokio::test]
    async fn read_missing_acl_removes_it() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/network_acls/acl-1"))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
                "errors": [{ "code": "not_found", "message": "Network ACL not found" }],
            })))
            .mount(&server)
            .await;

        let resource = NetworkAclResource::new(mock_handle(&server.uri()));
        let mut diags = Diagnostics::default();
        let state = NetworkAclState {
            id: "acl-1".into(),
            ..Default::default()
        };
        let read = resource
            .read(&mut diags, state, Default::default(), Default::default())
            .await;
        assert!(read.is_none());
        assert!(diags.errors.is_empty());
    }

    #[tokio::test]
    async fn create_replaces_default_rules() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/network_acls"))
            .respond_with(ResponseTemplate::new(201).set_body_json(acl_json(serde_json::json!([
                { "id": "default-in", "name": "allow-inbound", "protocol": "all" },
            ]))))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/network_acls/acl-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(acl_json(serde_json::json!([]))))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/network_acls/acl-1/rules"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "rules": [{ "id": "default-in", "name": "allow-inbound", "protocol": "all" }],
            })))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/v1/network_acls/acl-1/rules/default-in"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/network_acls/acl-1/rules"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "id": "rule-1", "name": "allow-ssh", "protocol": "tcp",
            })))
            .expect(1)
            .mount(&server)
            .await;
        mount_tags(&server).await;

        let resource = NetworkAclResource::new(mock_handle(&server.uri()));
        let mut diags = Diagnostics::default();
        let planned = NetworkAclState {
            name: "my-acl".into(),
            vpc: "vpc-1".into(),
            rules: Value::Value(vec![Value::Value(ssh_rule())]),
            ..Default::default()
        };
        let (planned, _) = resource
            .plan_create(
                &mut diags,
                planned.clone(),
                planned,
                Default::default(),
            )
            .await
            .unwrap();
        assert!(planned.id.is_unknown());
        assert!(planned.declared_rules()[0].ip_version.is_unknown());

        let created = resource
            .create(
                &mut diags,
                planned.clone(),
                planned,
                Default::default(),
                Default::default(),
            )
            .await;
        assert!(diags.errors.is_empty(), "{diags:?}");
        let (state, _) = created.unwrap();
        assert_eq!(state.id, Value::from("acl-1"));
        assert_eq!(state.crn, Value::from(CRN));

        let rule_post = server
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .find(|request| {
                request.method.as_str() == "POST" && request.url.path() == "/v1/network_acls/acl-1/rules"
            })
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&rule_post.body).unwrap();
        assert_eq!(body["protocol"], "tcp");
        assert_eq!(body["port_min"], 22);
        assert_eq!(body["source_port_min"], 1);
        assert!(body.get("before").is_none());
    }

    #[tokio::test]
    async fn destroy_missing_acl_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/network_acls/acl-1"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/v1/network_acls/acl-1"))
            .respond_with(ResponseTemplate::new(204))
            .expect(0)
            .mount(&server)
            .await;

        let resource = NetworkAclResource::new(mock_handle(&server.uri()));
        let mut diags = Diagnostics::default();
        let state = NetworkAclState {
            id: "acl-1".into(),
            ..Default::default()
        };
        let destroyed = resource
            .destroy(&mut diags, state, Default::default(), Default::default())
            .await;
        assert!(destroyed.is_some());
        assert!(diags.errors.is_empty());
    }

    #[tokio::test]
    async fn vpc_change_forces_replacement() {
        let resource = NetworkAclResource::default();
        let mut diags = Diagnostics::default();
        let prior = NetworkAclState {
            id: "acl-1".into(),
            name: "my-acl".into(),
            vpc: "vpc-1".into(),
            ..Default::default()
        };
        let proposed = NetworkAclState {
            vpc: "vpc-2".into(),
            ..prior.clone()
        };
        let (_, _, replace) = resource
            .plan_update(
                &mut diags,
                prior,
                proposed.clone(),
                proposed,
                Default::default(),
                Default::default(),
            )
            .await
            .unwrap();
        assert_eq!(replace, vec![AttributePath::new("vpc")]);
    }
}
