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
use serde::{Deserialize, Serialize};

use tf_provider::schema::{AttributeConstraint, AttributeType, Block, Description, Schema};
use tf_provider::value::{Value, ValueEmpty, ValueList, ValueNumber, ValueString};
use tf_provider::{map, DataSource, Diagnostics};

use crate::client::vpc::InstanceGroup;
use crate::client::SessionHandle;
use crate::flatten::opt_string;
use crate::utils::{attribute, string_list, WithSchema};

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceGroupDataSourceState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub name: ValueString<'a>,
    pub instance_template: ValueString<'a>,
    pub membership_count: ValueNumber,
    pub resource_group: ValueString<'a>,
    pub subnets: ValueList<ValueString<'a>>,
    pub application_port: ValueNumber,
    pub load_balancer_pool: ValueString<'a>,
    pub managers: ValueList<ValueString<'a>>,
    pub vpc: ValueString<'a>,
    pub status: ValueString<'a>,
    pub crn: ValueString<'a>,
}

impl<'a> InstanceGroupDataSourceState<'a> {
    fn flatten(&mut self, group: InstanceGroup) {
        self.id = group.id.into();
        self.name = group.name.into();
        self.instance_template = group.instance_template.id.into();
        self.membership_count = Value::Value(group.membership_count);
        self.resource_group = group.resource_group.id.into();
        self.subnets = Value::Value(group.subnets.into_iter().map(|s| s.id.into()).collect());
        self.application_port = group.application_port.into();
        self.load_balancer_pool = opt_string(group.load_balancer_pool.map(|pool| pool.id));
        self.managers = Value::Value(group.managers.into_iter().map(|m| m.id.into()).collect());
        self.vpc = group.vpc.id.into();
        self.status = group.status.into();
        self.crn = group.crn.into();
    }
}

impl<'a> WithSchema for InstanceGroupDataSourceState<'a> {
    fn schema() -> Schema {
        use AttributeConstraint::{Computed, Required};
        use AttributeType::{Number, String};
        Schema {
            version: 1,
            block: Block {
                version: 1,
                description: Description::plain("Look up an instance group by name"),
                attributes: map! {
                    "id" => attribute(String, Computed, "Instance group ID"),
                    "name" => attribute(String, Required, "Instance group name"),
                    "instance_template" => attribute(String, Computed, "Instance template ID"),
                    "membership_count" => attribute(Number, Computed, "Number of instances in the group"),
                    "resource_group" => attribute(String, Computed, "Resource group ID"),
                    "subnets" => attribute(string_list(), Computed, "Subnet IDs"),
                    "application_port" => attribute(Number, Computed, "Port the load balancer forwards to"),
                    "load_balancer_pool" => attribute(String, Computed, "Load balancer pool ID"),
                    "managers" => attribute(string_list(), Computed, "Instance group manager IDs"),
                    "vpc" => attribute(String, Computed, "VPC ID"),
                    "status" => attribute(String, Computed, "Instance group status"),
                    "crn" => attribute(String, Computed, "Instance group CRN"),
                },
                ..Default::default()
            },
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct InstanceGroupDataSource {
    session: SessionHandle,
}

impl InstanceGroupDataSource {
    pub fn new(session: SessionHandle) -> Self {
        Self { session }
    }
}

#[async_trait]
impl DataSource for InstanceGroupDataSource {
    type State<'a> = InstanceGroupDataSourceState<'a>;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(InstanceGroupDataSourceState::schema())
    }

    async fn read<'a>(
        &self,
        diags: &mut Diagnostics,
        config: Self::State<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<Self::State<'a>> {
        let session = self.session.get(diags)?;
        let name = config.name.as_str();

        let groups = match session.vpc().list_instance_groups().await {
            Ok(groups) => groups,
            Err(err) => {
                diags.root_error(
                    "Error fetching instance groups",
                    format!("[ERROR] Error Fetching InstanceGroups {err}"),
                );
                return None;
            }
        };
        let Some(group) = groups.into_iter().find(|group| group.name == name) else {
            diags.root_error_short(format!("[ERROR] Instance group {name} not found"));
            return None;
        };

        let mut state = config.clone();
        state.flatten(group);
        Some(state)
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::client::tests::mock_handle;

    #[tokio::test]
    async fn match_across_pages() {
        let server = MockServer::start().await;
        let uri = server.uri();
        Mock::given(method("GET"))
            .and(path("/v1/instance_groups"))
            .and(query_param("start", "page-2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "instance_groups": [{
                    "id": "ig-2",
                    "name": "web",
                    "status": "healthy",
                    "membership_count": 4,
                    "subnets": [{ "id": "subnet-1" }, { "id": "subnet-2" }],
                    "vpc": { "id": "vpc-1" },
                }],
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/instance_groups"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "instance_groups": [{ "id": "ig-1", "name": "batch" }],
                "next": { "href": format!("{uri}/v1/instance_groups?start=page-2") },
            })))
            .mount(&server)
            .await;

        let data_source = InstanceGroupDataSource::new(mock_handle(&uri));
        let mut diags = Diagnostics::default();
        let config = InstanceGroupDataSourceState {
            name: "web".into(),
            ..Default::default()
        };
        let state = data_source
            .read(&mut diags, config, Default::default())
            .await
            .unwrap();
        assert!(diags.errors.is_empty(), "{diags:?}");
        assert_eq!(state.id, Value::from("ig-2"));
        assert_eq!(state.membership_count, Value::Value(4));
        assert_eq!(state.subnets.iter().flatten().count(), 2);
        assert!(state.load_balancer_pool.is_null());
    }

    #[tokio::test]
    async fn unknown_name() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/instance_groups"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "instance_groups": [],
            })))
            .mount(&server)
            .await;

        let data_source = InstanceGroupDataSource::new(mock_handle(&server.uri()));
        let mut diags = Diagnostics::default();
        let config = InstanceGroupDataSourceState {
            name: "web".into(),
            ..Default::default()
        };
        assert!(data_source
            .read(&mut diags, config, Default::default())
            .await
            .is_none());
        assert_eq!(diags.errors[0].summary, "[ERROR] Instance group web not found");
    }
}
