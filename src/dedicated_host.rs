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
use tf_provider::value::{Value, ValueBool, ValueEmpty, ValueList, ValueNumber, ValueString};
use tf_provider::{map, DataSource, Diagnostics};

use crate::client::vpc::DedicatedHost;
use crate::client::SessionHandle;
use crate::flatten::{computed, data_source_id, many, single, ReferenceState, VcpuState};
use crate::utils::{attribute, computed_objects, WithSchema};

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DedicatedHostsDataSourceState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub host_group: ValueString<'a>,
    pub dedicated_hosts: ValueList<Value<DedicatedHostState<'a>>>,
    pub total_count: ValueNumber,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DedicatedHostState<'a> {
    pub id: ValueString<'a>,
    pub crn: ValueString<'a>,
    pub name: ValueString<'a>,
    pub href: ValueString<'a>,
    pub state: ValueString<'a>,
    pub lifecycle_state: ValueString<'a>,
    pub memory: ValueNumber,
    pub available_memory: ValueNumber,
    pub socket_count: ValueNumber,
    pub instance_placement_enabled: ValueBool,
    pub provisionable: ValueBool,
    pub zone: ValueString<'a>,
    pub profile: ValueString<'a>,
    pub host_group: ValueString<'a>,
    pub resource_group: ValueString<'a>,
    pub resource_type: ValueString<'a>,
    pub created_at: ValueString<'a>,
    pub vcpu: ValueList<Value<VcpuState<'a>>>,
    pub available_vcpu: ValueList<Value<VcpuState<'a>>>,
    pub instances: ValueList<Value<ReferenceState<'a>>>,
    pub supported_instance_profiles: ValueList<Value<ReferenceState<'a>>>,
}

impl<'a> From<DedicatedHost> for DedicatedHostState<'a> {
    fn from(host: DedicatedHost) -> Self {
        Self {
            id: host.id.into(),
            crn: host.crn.into(),
            name: host.name.into(),
            href: host.href.into(),
            state: host.state.into(),
            lifecycle_state: host.lifecycle_state.into(),
            memory: Value::Value(host.memory),
            available_memory: Value::Value(host.available_memory),
            socket_count: Value::Value(host.socket_count),
            instance_placement_enabled: Value::Value(host.instance_placement_enabled),
            provisionable: Value::Value(host.provisionable),
            zone: host.zone.name.unwrap_or_default().into(),
            profile: host.profile.name.unwrap_or_default().into(),
            host_group: host.group.id.into(),
            resource_group: host.resource_group.id.into(),
            resource_type: host.resource_type.into(),
            created_at: host.created_at.into(),
            vcpu: single(VcpuState::from(host.vcpu)),
            available_vcpu: single(VcpuState::from(host.available_vcpu)),
            instances: many(host.instances, ReferenceState::from),
            supported_instance_profiles: many(host.supported_instance_profiles, ReferenceState::from),
        }
    }
}

impl<'a> DedicatedHostState<'a> {
    fn attributes() -> HashMap<String, Attribute> {
        use AttributeType::{Bool, Number, String};
        map! {
            "id" => computed(String, "Dedicated host ID"),
            "crn" => computed(String, "Dedicated host CRN"),
            "name" => computed(String, "Dedicated host name"),
            "href" => computed(String, "URL of the dedicated host"),
            "state" => computed(String, "Administrative state"),
            "lifecycle_state" => computed(String, "Lifecycle state"),
            "memory" => computed(Number, "Total memory in GiB"),
            "available_memory" => computed(Number, "Memory available for instances, in GiB"),
            "socket_count" => computed(Number, "Number of CPU sockets"),
            "instance_placement_enabled" => computed(Bool, "Whether instances can be placed on this host"),
            "provisionable" => computed(Bool, "Whether the host is available for placement"),
            "zone" => computed(String, "Zone name"),
            "profile" => computed(String, "Profile name"),
            "host_group" => computed(String, "Dedicated host group ID"),
            "resource_group" => computed(String, "Resource group ID"),
            "resource_type" => computed(String, "Resource type"),
            "created_at" => computed(String, "Creation date"),
            "vcpu" => computed_objects("Total VCPU", VcpuState::attributes()),
            "available_vcpu" => computed_objects("VCPU available for instances", VcpuState::attributes()),
            "instances" => computed_objects("Instances placed on the host", ReferenceState::attributes()),
            "supported_instance_profiles" => computed_objects(
                "Instance profiles the host can run",
                ReferenceState::attributes(),
            ),
        }
    }
}

impl<'a> WithSchema for DedicatedHostsDataSourceState<'a> {
    fn schema() -> Schema {
        use AttributeConstraint::{Computed, Optional};
        use AttributeType::{Number, String};
        Schema {
            version: 1,
            block: Block {
                version: 1,
                description: Description::plain("List the dedicated hosts, optionally of a single host group"),
                attributes: map! {
                    "id" => attribute(String, Computed, "Identifier of this read"),
                    "host_group" => attribute(String, Optional, "Dedicated host group ID"),
                    "dedicated_hosts" => computed_objects("Dedicated hosts", DedicatedHostState::attributes()),
                    "total_count" => attribute(Number, Computed, "Number of dedicated hosts"),
                },
                ..Default::default()
            },
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct DedicatedHostsDataSource {
    session: SessionHandle,
}

impl DedicatedHostsDataSource {
    pub fn new(session: SessionHandle) -> Self {
        Self { session }
    }
}

#[async_trait]
impl DataSource for DedicatedHostsDataSource {
    type State<'a> = DedicatedHostsDataSourceState<'a>;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(DedicatedHostsDataSourceState::schema())
    }

    async fn read<'a>(
        &self,
        diags: &mut Diagnostics,
        config: Self::State<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<Self::State<'a>> {
        let session = self.session.get(diags)?;
        let mut filters = Vec::new();
        if let Some(group) = config.host_group.as_deref_option() {
            filters.push(("dedicated_host_group.id", group.to_owned()));
        }

        match session.vpc().list_dedicated_hosts(&filters).await {
            Ok(hosts) => {
                let mut state = config;
                state.id = data_source_id().into();
                state.total_count = Value::Value(hosts.len() as i64);
                state.dedicated_hosts = many(hosts, DedicatedHostState::from);
                Some(state)
            }
            Err(err) => {
                diags.root_error(
                    "Error fetching dedicated hosts",
                    format!("[ERROR] Error fetching Dedicated Hosts {err}"),
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::client::tests::mock_handle;

    #[tokio::test]
    async fn lists_hosts_of_a_group() {
        let server = MockServer::start().await;
        let next = format!("{}/v1/dedicated_hosts?start=xyz", server.uri());
        Mock::given(method("GET"))
            .and(path("/v1/dedicated_hosts"))
            .and(query_param("start", "xyz"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "dedicated_hosts": [{ "id": "dh-2", "name": "host-2", "group": { "id": "dhg-1" } }],
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/dedicated_hosts"))
            .and(query_param("dedicated_host_group.id", "dhg-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "dedicated_hosts": [{
                    "id": "dh-1",
                    "name": "host-1",
                    "memory": 128,
                    "vcpu": { "architecture": "amd64", "count": 32 },
                    "group": { "id": "dhg-1" },
                    "instances": [{ "id": "vsi-1", "name": "web" }],
                }],
                "next": { "href": next },
            })))
            .mount(&server)
            .await;

        let data_source = DedicatedHostsDataSource::new(mock_handle(&server.uri()));
        let mut diags = Diagnostics::default();
        let config = DedicatedHostsDataSourceState {
            host_group: "dhg-1".into(),
            ..Default::default()
        };
        let state = data_source
            .read(&mut diags, config, Default::default())
            .await
            .unwrap();
        assert!(diags.errors.is_empty(), "{diags:?}");
        assert_eq!(state.total_count, Value::Value(2));

        let hosts = state.dedicated_hosts.as_ref_option().unwrap();
        let first = hosts[0].as_ref_option().unwrap();
        assert_eq!(first.host_group, Value::from("dhg-1"));
        assert_eq!(first.memory, Value::Value(128));
        let instance = first.instances.as_ref_option().unwrap()[0].as_ref_option().unwrap();
        assert_eq!(instance.name, Value::from("web"));
    }
}
