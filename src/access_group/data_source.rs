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
use tf_provider::value::{Value, ValueBool, ValueEmpty, ValueList, ValueString};
use tf_provider::{map, DataSource, Diagnostics};

use crate::client::iam::AccessGroup;
use crate::client::SessionHandle;
use crate::flatten::{computed, data_source_id, many};
use crate::utils::{attribute, computed_objects, WithSchema};

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessGroupsDataSourceState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub access_group_name: ValueString<'a>,
    pub groups: ValueList<Value<AccessGroupItemState<'a>>>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessGroupItemState<'a> {
    pub id: ValueString<'a>,
    pub name: ValueString<'a>,
    pub description: ValueString<'a>,
    pub crn: ValueString<'a>,
    pub is_federated: ValueBool,
}

impl<'a> From<AccessGroup> for AccessGroupItemState<'a> {
    fn from(group: AccessGroup) -> Self {
        Self {
            id: group.id.into(),
            name: group.name.into(),
            description: group.description.into(),
            crn: group.crn.into(),
            is_federated: Value::Value(group.is_federated),
        }
    }
}

impl<'a> AccessGroupItemState<'a> {
    fn attributes() -> HashMap<String, Attribute> {
        use AttributeType::{Bool, String};
        map! {
            "id" => computed(String, "Access group ID"),
            "name" => computed(String, "Access group name"),
            "description" => computed(String, "Description of the access group"),
            "crn" => computed(String, "Access group CRN"),
            "is_federated" => computed(Bool, "Whether the group is federated from an identity provider"),
        }
    }
}

impl<'a> WithSchema for AccessGroupsDataSourceState<'a> {
    fn schema() -> Schema {
        use AttributeConstraint::{Computed, Optional};
        use AttributeType::String;
        Schema {
            version: 1,
            block: Block {
                version: 1,
                description: Description::plain("List the access groups of the account"),
                attributes: map! {
                    "id" => attribute(String, Computed, "Identifier of this read"),
                    "access_group_name" => attribute(String, Optional, "Only keep the group with this name"),
                    "groups" => computed_objects("Access groups", AccessGroupItemState::attributes()),
                },
                ..Default::default()
            },
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct AccessGroupDataSource {
    session: SessionHandle,
}

impl AccessGroupDataSource {
    pub fn new(session: SessionHandle) -> Self {
        Self { session }
    }
}

#[async_trait]
impl DataSource for AccessGroupDataSource {
    type State<'a> = AccessGroupsDataSourceState<'a>;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(AccessGroupsDataSourceState::schema())
    }

    async fn read<'a>(
        &self,
        diags: &mut Diagnostics,
        config: Self::State<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<Self::State<'a>> {
        let session = self.session.get(diags)?;
        let groups = match session.account_id().await {
            Ok(account_id) => session.iam().list_access_groups(&account_id).await,
            Err(err) => Err(err),
        };
        let mut groups = match groups {
            Ok(groups) => groups,
            Err(err) => {
                diags.root_error(
                    "Error retrieving access groups",
                    format!("Error retrieving access groups: {err}"),
                );
                return None;
            }
        };

        if let Some(name) = config.access_group_name.as_deref_option() {
            groups.retain(|group| group.name == name);
            if groups.is_empty() {
                diags.root_error_short(format!("No Access Group found with name {name}"));
                return None;
            }
        }

        let mut state = config;
        state.id = data_source_id().into();
        state.groups = many(groups, AccessGroupItemState::from);
        Some(state)
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::client::tests::mock_handle;

    async fn server() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/groups"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "groups": [
                    { "id": "AccessGroupId-1", "name": "dev" },
                    { "id": "AccessGroupId-2", "name": "ops", "is_federated": true },
                ],
            })))
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn filter_by_name() {
        let server = server().await;
        let data_source = AccessGroupDataSource::new(mock_handle(&server.uri()));
        let mut diags = Diagnostics::default();
        let config = AccessGroupsDataSourceState {
            access_group_name: "ops".into(),
            ..Default::default()
        };
        let state = data_source
            .read(&mut diags, config, Default::default())
            .await
            .unwrap();
        assert!(diags.errors.is_empty(), "{diags:?}");
        let groups: Vec<_> = state.groups.iter().flatten().collect();
        assert_eq!(groups.len(), 1);
        let Value::Value(group) = groups[0] else {
            panic!("group should be known");
        };
        assert_eq!(group.id, Value::from("AccessGroupId-2"));
        assert_eq!(group.is_federated, Value::Value(true));
    }

    #[tokio::test]
    async fn unknown_name_is_an_error() {
        let server = server().await;
        let data_source = AccessGroupDataSource::new(mock_handle(&server.uri()));
        let mut diags = Diagnostics::default();
        let config = AccessGroupsDataSourceState {
            access_group_name: "qa".into(),
            ..Default::default()
        };
        assert!(data_source
            .read(&mut diags, config, Default::default())
            .await
            .is_none());
        assert_eq!(diags.errors.len(), 1);
        assert_eq!(diags.errors[0].summary, "No Access Group found with name qa");
    }
}
