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

use std::collections::{HashMap, HashSet};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use tf_provider::schema::{Attribute, AttributeConstraint, AttributeType, Block, Description, Schema};
use tf_provider::value::{Value, ValueEmpty, ValueList, ValueNumber, ValueString};
use tf_provider::{map, AttributePath, DataSource, Diagnostics};

use crate::client::vpc::Instance;
use crate::client::{Session, SessionHandle};
use crate::flatten::{
    computed, data_source_id, many, single, ReferenceState, StatusReasonState, VcpuState,
};
use crate::utils::{attribute, computed_objects, WithSchema, WithValidate};
use crate::validators;

use super::state::{NetworkInterfaceState, VolumeAttachmentState};

/// Filter attributes and the query parameter each one maps to
const FILTERS: &[(&str, &str)] = &[
    ("vpc", "vpc.id"),
    ("vpc_name", "vpc.name"),
    ("vpc_crn", "vpc.crn"),
    ("resource_group", "resource_group.id"),
    ("dedicated_host", "dedicated_host.id"),
    ("dedicated_host_name", "dedicated_host.name"),
    ("placement_group", "placement_group.id"),
    ("placement_group_name", "placement_group.name"),
];

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstancesDataSourceState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub vpc: ValueString<'a>,
    pub vpc_name: ValueString<'a>,
    pub vpc_crn: ValueString<'a>,
    pub resource_group: ValueString<'a>,
    pub dedicated_host: ValueString<'a>,
    pub dedicated_host_name: ValueString<'a>,
    pub placement_group: ValueString<'a>,
    pub placement_group_name: ValueString<'a>,
    pub instance_group: ValueString<'a>,
    pub instance_group_name: ValueString<'a>,
    pub instances: ValueList<Value<InstanceItemState<'a>>>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceItemState<'a> {
    pub id: ValueString<'a>,
    pub crn: ValueString<'a>,
    pub name: ValueString<'a>,
    pub status: ValueString<'a>,
    pub memory: ValueNumber,
    pub vpc: ValueString<'a>,
    pub zone: ValueString<'a>,
    pub profile: ValueString<'a>,
    pub image: ValueString<'a>,
    pub resource_group: ValueString<'a>,
    pub vcpu: ValueList<Value<VcpuState<'a>>>,
    pub status_reasons: ValueList<Value<StatusReasonState<'a>>>,
    pub primary_network_interface: ValueList<Value<NetworkInterfaceState<'a>>>,
    pub network_interfaces: ValueList<Value<NetworkInterfaceState<'a>>>,
    pub volume_attachments: ValueList<Value<VolumeAttachmentState<'a>>>,
    pub placement_target: ValueList<Value<ReferenceState<'a>>>,
}

impl<'a> From<Instance> for InstanceItemState<'a> {
    fn from(instance: Instance) -> Self {
        let interface = |interface| {
            NetworkInterfaceState::from_api(interface, Value::Value(Default::default()))
        };
        Self {
            id: instance.id.into(),
            crn: instance.crn.into(),
            name: instance.name.into(),
            status: instance.status.into(),
            memory: Value::Value(instance.memory),
            vpc: instance.vpc.id.into(),
            zone: instance.zone.name.unwrap_or_default().into(),
            profile: instance.profile.name.unwrap_or_default().into(),
            image: instance.image.map(|image| image.id).unwrap_or_default().into(),
            resource_group: instance.resource_group.id.into(),
            vcpu: single(VcpuState::from(instance.vcpu)),
            status_reasons: many(instance.status_reasons, StatusReasonState::from),
            primary_network_interface: many(instance.primary_network_interface, interface),
            network_interfaces: many(instance.network_interfaces, interface),
            volume_attachments: many(instance.volume_attachments, VolumeAttachmentState::from),
            placement_target: many(instance.placement_target, ReferenceState::from),
        }
    }
}

impl<'a> InstanceItemState<'a> {
    fn attributes() -> HashMap<String, Attribute> {
        use AttributeType::{Number, String};
        map! {
            "id" => computed(String, "Instance ID"),
            "crn" => computed(String, "Instance CRN"),
            "name" => computed(String, "Instance name"),
            "status" => computed(String, "Instance status"),
            "memory" => computed(Number, "Instance memory in GiB"),
            "vpc" => computed(String, "VPC ID"),
            "zone" => computed(String, "Zone name"),
            "profile" => computed(String, "Profile name"),
            "image" => computed(String, "Image ID"),
            "resource_group" => computed(String, "Resource group ID"),
            "vcpu" => computed_objects("Instance VCPU", VcpuState::attributes()),
            "status_reasons" => computed_objects(
                "Reasons for the current status",
                StatusReasonState::attributes(),
            ),
            "primary_network_interface" => computed_objects(
                "Primary network interface",
                NetworkInterfaceState::computed_attributes(),
            ),
            "network_interfaces" => computed_objects(
                "Every network interface of the instance",
                NetworkInterfaceState::computed_attributes(),
            ),
            "volume_attachments" => computed_objects(
                "Volumes attached to the instance",
                VolumeAttachmentState::attributes(),
            ),
            "placement_target" => computed_objects(
                "Dedicated host or placement group hosting the instance",
                ReferenceState::attributes(),
            ),
        }
    }
}

impl<'a> WithSchema for InstancesDataSourceState<'a> {
    fn schema() -> Schema {
        use AttributeConstraint::{Computed, Optional};
        use AttributeType::String;
        Schema {
            version: 1,
            block: Block {
                version: 1,
                description: Description::plain("List the instances matching every given filter"),
                attributes: map! {
                    "id" => attribute(String, Computed, "Identifier of this read"),
                    "vpc" => attribute(String, Optional, "VPC ID"),
                    "vpc_name" => attribute(String, Optional, "VPC name"),
                    "vpc_crn" => attribute(String, Optional, "VPC CRN"),
                    "resource_group" => attribute(String, Optional, "Resource group ID"),
                    "dedicated_host" => attribute(String, Optional, "Dedicated host ID"),
                    "dedicated_host_name" => attribute(String, Optional, "Dedicated host name"),
                    "placement_group" => attribute(String, Optional, "Placement group ID"),
                    "placement_group_name" => attribute(String, Optional, "Placement group name"),
                    "instance_group" => attribute(String, Optional, "Only keep the members of this instance group"),
                    "instance_group_name" => attribute(String, Optional, "Only keep the members of the instance group with this name"),
                    "instances" => computed_objects("Matching instances", InstanceItemState::attributes()),
                },
                ..Default::default()
            },
        }
    }
}

#[async_trait]
impl<'a> WithValidate for InstancesDataSourceState<'a> {
    async fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath) {
        validators::at_most_one(
            diags,
            attr_path.clone().attribute("vpc"),
            &[
                ("vpc", self.vpc.is_value()),
                ("vpc_name", self.vpc_name.is_value()),
                ("vpc_crn", self.vpc_crn.is_value()),
            ],
        );
        validators::at_most_one(
            diags,
            attr_path.clone().attribute("dedicated_host"),
            &[
                ("dedicated_host", self.dedicated_host.is_value()),
                ("dedicated_host_name", self.dedicated_host_name.is_value()),
            ],
        );
        validators::at_most_one(
            diags,
            attr_path.clone().attribute("placement_group"),
            &[
                ("placement_group", self.placement_group.is_value()),
                ("placement_group_name", self.placement_group_name.is_value()),
            ],
        );
        validators::at_most_one(
            diags,
            attr_path.attribute("instance_group"),
            &[
                ("instance_group", self.instance_group.is_value()),
                ("instance_group_name", self.instance_group_name.is_value()),
            ],
        );
    }
}

impl<'a> InstancesDataSourceState<'a> {
    fn filter_values(&self) -> [&ValueString<'a>; 8] {
        [
            &self.vpc,
            &self.vpc_name,
            &self.vpc_crn,
            &self.resource_group,
            &self.dedicated_host,
            &self.dedicated_host_name,
            &self.placement_group,
            &self.placement_group_name,
        ]
    }

    fn filters(&self) -> Vec<(&'static str, String)> {
        FILTERS
            .iter()
            .zip(self.filter_values())
            .filter_map(|((_, param), value)| {
                value
                    .as_deref_option()
                    .filter(|value| !value.is_empty())
                    .map(|value| (*param, value.to_owned()))
            })
            .collect()
    }
}

/// Resolve the instance group filter to a group ID. An unknown group name
/// filters nothing out.
async fn instance_group_id(
    session: &Session,
    config: &InstancesDataSourceState<'_>,
) -> Result<Option<String>> {
    if let Some(id) = config.instance_group.as_deref_option() {
        return Ok(Some(id.to_owned()));
    }
    let Some(name) = config.instance_group_name.as_deref_option() else {
        return Ok(None);
    };
    let groups = session
        .vpc()
        .list_instance_groups()
        .await
        .context("Error Fetching InstanceGroups")?;
    Ok(groups
        .into_iter()
        .find(|group| group.name == name)
        .map(|group| group.id))
}

async fn list_instances(
    session: &Session,
    config: &InstancesDataSourceState<'_>,
) -> Result<Vec<Instance>> {
    let vpc = session.vpc();
    let group = instance_group_id(session, config).await?;
    let mut instances = vpc
        .list_instances(&config.filters())
        .await
        .context("Error Fetching Instances")?;

    if let Some(group) = group {
        let members: HashSet<String> = vpc
            .list_instance_group_memberships(&group)
            .await
            .context("Error Getting InstanceGroup Membership Collection")?
            .into_iter()
            .map(|membership| membership.instance.id)
            .collect();
        instances.retain(|instance| members.contains(&instance.id));
    }
    Ok(instances)
}

#[derive(Debug, Default, Clone)]
pub struct InstancesDataSource {
    session: SessionHandle,
}

impl InstancesDataSource {
    pub fn new(session: SessionHandle) -> Self {
        Self { session }
    }
}

#[async_trait]
impl DataSource for InstancesDataSource {
    type State<'a> = InstancesDataSourceState<'a>;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(InstancesDataSourceState::schema())
    }

    async fn validate<'a>(&self, diags: &mut Diagnostics, config: Self::State<'a>) -> Option<()> {
        config.validate(diags, AttributePath::default()).await;

        if diags.errors.is_empty() {
            Some(())
        } else {
            None
        }
    }

    async fn read<'a>(
        &self,
        diags: &mut Diagnostics,
        config: Self::State<'a>,
        _provider_meta_state: Self::ProviderMetaState<'a>,
    ) -> Option<Self::State<'a>> {
        let session = self.session.get(diags)?;
        match list_instances(&session, &config).await {
            Ok(instances) => {
                tracing::debug!("Found {} instances", instances.len());
                let mut state = config;
                state.id = data_source_id().into();
                state.instances = many(instances, InstanceItemState::from);
                Some(state)
            }
            Err(err) => {
                diags.root_error("Error listing instances", format!("[ERROR] {err:#}"));
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

    fn instance(id: &str) -> serde_json::Value {
        serde_json::json!({
            "id": id,
            "name": format!("{id}-name"),
            "status": "running",
            "vpc": { "id": "vpc-1" },
            "zone": { "id": "", "name": "us-south-1" },
            "primary_network_interface": {
                "id": format!("{id}-nic"),
                "name": "eth0",
                "subnet": { "id": "subnet-1" },
                "primary_ip": { "address": "10.240.0.4" },
            },
        })
    }

    #[test]
    fn filters_become_query_parameters() {
        let config = InstancesDataSourceState {
            vpc_name: "my-vpc".into(),
            dedicated_host: "dh-1".into(),
            placement_group: "".into(),
            ..Default::default()
        };
        assert_eq!(
            config.filters(),
            vec![
                ("vpc.name", "my-vpc".to_owned()),
                ("dedicated_host.id", "dh-1".to_owned())
            ]
        );
    }

    #[tokio::test]
    async fn instance_group_name_keeps_members_only() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/instance_groups"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "instance_groups": [
                    { "id": "ig-1", "name": "web" },
                    { "id": "ig-2", "name": "db" },
                ],
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/instances"))
            .and(query_param("vpc.id", "vpc-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "instances": [instance("vsi-1"), instance("vsi-2"), instance("vsi-3")],
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/instance_groups/ig-2/memberships"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "memberships": [
                    { "id": "m-1", "instance": { "id": "vsi-3" } },
                    { "id": "m-2", "instance": { "id": "vsi-1" } },
                ],
            })))
            .mount(&server)
            .await;

        let data_source = InstancesDataSource::new(mock_handle(&server.uri()));
        let mut diags = Diagnostics::default();
        let config = InstancesDataSourceState {
            vpc: "vpc-1".into(),
            instance_group_name: "db".into(),
            ..Default::default()
        };
        let state = data_source
            .read(&mut diags, config, Default::default())
            .await
            .unwrap();
        assert!(diags.errors.is_empty(), "{diags:?}");
        assert!(state.id.is_value());

        let ids: Vec<&str> = state
            .instances
            .iter()
            .flatten()
            .filter_map(|instance| instance.as_ref_option())
            .map(|instance| instance.id.as_str())
            .collect();
        assert_eq!(ids, vec!["vsi-1", "vsi-3"]);

        let first = state.instances.as_ref_option().unwrap()[0].as_ref_option().unwrap();
        let nic = first.primary_network_interface.as_ref_option().unwrap()[0]
            .as_ref_option()
            .unwrap();
        assert_eq!(nic.id, Value::from("vsi-1-nic"));
    }

    #[test]
    fn conflicting_vpc_filters() {
        let config = InstancesDataSourceState {
            vpc: "vpc-1".into(),
            vpc_crn: "crn:vpc".into(),
            ..Default::default()
        };
        let mut diags = Diagnostics::default();
        futures::executor::block_on(config.validate(&mut diags, AttributePath::default()));
        assert_eq!(diags.errors.len(), 1);
        assert_eq!(diags.errors[0].summary, "Conflicting attributes");
    }
}
