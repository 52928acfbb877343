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

use tf_provider::schema::{
    Attribute, AttributeConstraint, AttributeType, Block, Description, NestedBlock, Schema,
};
use tf_provider::value::{self, Value, ValueList, ValueNumber, ValueSet, ValueString};
use tf_provider::{map, AttributePath, Diagnostics};

use crate::client::vpc::{
    Identity, Instance, InstancePrototype, NetworkInterfacePrototype, NetworkInterfaceReference,
    VolumeAttachmentReference,
};
use crate::flatten::{computed, many, single, StatusReasonState, VcpuState};
use crate::utils::{
    attribute, computed_objects, string_list, string_set, tags_attribute, Timeouts, WithSchema,
    WithValidate,
};
use crate::validators;

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub name: ValueString<'a>,
    pub vpc: ValueString<'a>,
    pub zone: ValueString<'a>,
    pub profile: ValueString<'a>,
    pub image: ValueString<'a>,
    pub keys: ValueList<ValueString<'a>>,
    pub user_data: ValueString<'a>,
    pub resource_group: ValueString<'a>,
    pub primary_network_interface: Value<NetworkInterfaceState<'a>>,
    pub tags: ValueSet<ValueString<'a>>,
    pub crn: ValueString<'a>,
    pub status: ValueString<'a>,
    pub memory: ValueNumber,
    pub vcpu: ValueList<Value<VcpuState<'a>>>,
    pub status_reasons: ValueList<Value<StatusReasonState<'a>>>,
    pub volume_attachments: ValueList<Value<VolumeAttachmentState<'a>>>,
    #[serde(with = "value::serde_as_vec")]
    pub timeouts: Value<Timeouts<'a>>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkInterfaceState<'a> {
    pub id: ValueString<'a>,
    pub name: ValueString<'a>,
    pub subnet: ValueString<'a>,
    pub security_groups: ValueSet<ValueString<'a>>,
    pub primary_ipv4_address: ValueString<'a>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeAttachmentState<'a> {
    pub id: ValueString<'a>,
    pub name: ValueString<'a>,
    pub volume_id: ValueString<'a>,
    pub volume_name: ValueString<'a>,
    pub volume_crn: ValueString<'a>,
}

impl<'a> From<VolumeAttachmentReference> for VolumeAttachmentState<'a> {
    fn from(attachment: VolumeAttachmentReference) -> Self {
        Self {
            id: attachment.id.into(),
            name: attachment.name.into(),
            volume_id: attachment.volume.id.into(),
            volume_name: attachment.volume.name.unwrap_or_default().into(),
            volume_crn: attachment.volume.crn.unwrap_or_default().into(),
        }
    }
}

impl<'a> VolumeAttachmentState<'a> {
    pub(crate) fn attributes() -> HashMap<String, Attribute> {
        use AttributeType::String;
        map! {
            "id" => computed(String, "Volume attachment ID"),
            "name" => computed(String, "Volume attachment name"),
            "volume_id" => computed(String, "Volume ID"),
            "volume_name" => computed(String, "Volume name"),
            "volume_crn" => computed(String, "Volume CRN"),
        }
    }
}

impl<'a> NetworkInterfaceState<'a> {
    pub(crate) fn from_api(
        interface: NetworkInterfaceReference,
        security_groups: ValueSet<ValueString<'a>>,
    ) -> Self {
        Self {
            id: interface.id.into(),
            name: interface.name.into(),
            subnet: interface.subnet.id.into(),
            security_groups,
            primary_ipv4_address: interface.primary_ip.address.into(),
        }
    }

    pub(crate) fn computed_attributes() -> HashMap<String, Attribute> {
        use AttributeType::String;
        map! {
            "id" => computed(String, "Network interface ID"),
            "name" => computed(String, "Network interface name"),
            "subnet" => computed(String, "Subnet ID"),
            "security_groups" => computed(string_set(), "Security groups of the network interface"),
            "primary_ipv4_address" => computed(String, "Primary IPv4 address"),
        }
    }
}

impl<'a> InstanceState<'a> {
    pub(super) fn prototype(&self) -> InstancePrototype {
        let interface = self.primary_network_interface.as_ref_option();
        InstancePrototype {
            name: self.name.as_deref_option().map(str::to_owned),
            vpc: Identity::id(self.vpc.as_str()),
            zone: Identity::name(self.zone.as_str()),
            profile: Identity::name(self.profile.as_str()),
            image: Identity::id(self.image.as_str()),
            keys: self
                .keys
                .iter()
                .flatten()
                .filter_map(|key| key.as_deref_option().map(Identity::id))
                .collect(),
            primary_network_interface: NetworkInterfacePrototype {
                name: interface
                    .and_then(|interface| interface.name.as_deref_option())
                    .map(str::to_owned),
                subnet: Identity::id(
                    interface
                        .and_then(|interface| interface.subnet.as_deref_option())
                        .unwrap_or_default(),
                ),
                security_groups: interface
                    .into_iter()
                    .flat_map(|interface| interface.security_groups.iter().flatten())
                    .filter_map(|group| group.as_deref_option().map(Identity::id))
                    .collect(),
            },
            resource_group: self.resource_group.as_deref_option().map(Identity::id),
            user_data: self.user_data.as_deref_option().map(str::to_owned),
        }
    }

    /// Copy the remote instance. `keys`, `user_data` and the interface security
    /// groups are not part of the response and stay as declared.
    pub(super) fn flatten(&mut self, instance: Instance) {
        self.id = instance.id.into();
        self.crn = instance.crn.into();
        self.name = instance.name.into();
        self.status = instance.status.into();
        self.memory = Value::Value(instance.memory);
        self.vpc = instance.vpc.id.into();
        self.zone = instance.zone.name.unwrap_or_default().into();
        self.profile = instance.profile.name.unwrap_or_default().into();
        if let Some(image) = instance.image {
            self.image = image.id.into();
        }
        self.resource_group = instance.resource_group.id.into();
        self.vcpu = single(VcpuState::from(instance.vcpu));
        self.status_reasons = many(instance.status_reasons, StatusReasonState::from);
        self.volume_attachments = many(instance.volume_attachments, VolumeAttachmentState::from);
        if let Some(interface) = instance.primary_network_interface {
            let security_groups = self
                .primary_network_interface
                .as_ref_option()
                .map(|interface| interface.security_groups.clone())
                .filter(|groups| groups.is_value())
                .unwrap_or_else(|| Value::Value(Default::default()));
            self.primary_network_interface =
                Value::Value(NetworkInterfaceState::from_api(interface, security_groups));
        }
    }

    /// Attributes only known once the instance exists
    pub(super) fn unknown_outputs(&mut self) {
        self.id = Value::Unknown;
        self.crn = Value::Unknown;
        self.status = Value::Unknown;
        self.memory = Value::Unknown;
        self.vcpu = Value::Unknown;
        self.status_reasons = Value::Unknown;
        self.volume_attachments = Value::Unknown;
        if self.resource_group.is_null() {
            self.resource_group = Value::Unknown;
        }
        if self.tags.is_null() {
            self.tags = Value::Unknown;
        }
        if let Value::Value(interface) = &mut self.primary_network_interface {
            interface.id = Value::Unknown;
            interface.primary_ipv4_address = Value::Unknown;
            if interface.name.is_null() {
                interface.name = Value::Unknown;
            }
            if interface.security_groups.is_null() {
                interface.security_groups = Value::Unknown;
            }
        }
    }

    /// Outputs the creation response did not fill. Applied states cannot hold unknowns.
    pub(super) fn clear_unknowns(&mut self) {
        fn clear<T>(value: &mut Value<T>) {
            if value.is_unknown() {
                *value = Value::Null;
            }
        }
        clear(&mut self.id);
        clear(&mut self.crn);
        clear(&mut self.status);
        clear(&mut self.memory);
        clear(&mut self.vcpu);
        clear(&mut self.status_reasons);
        clear(&mut self.volume_attachments);
        clear(&mut self.resource_group);
        if self.tags.is_unknown() {
            self.tags = Value::Value(Default::default());
        }
        if let Value::Value(interface) = &mut self.primary_network_interface {
            clear(&mut interface.id);
            clear(&mut interface.name);
            clear(&mut interface.primary_ipv4_address);
            if interface.security_groups.is_unknown() {
                interface.security_groups = Value::Value(Default::default());
            }
        }
    }
}

impl<'a> WithSchema for InstanceState<'a> {
    fn schema() -> Schema {
        use AttributeConstraint::{Computed, Optional, OptionalComputed, Required};
        use AttributeType::{Number, String};
        Schema {
            version: 1,
            block: Block {
                version: 1,
                description: Description::plain("Virtual server instance of a VPC"),
                attributes: map! {
                    "id" => attribute(String, Computed, "Instance ID"),
                    "name" => attribute(String, Required, "Instance name"),
                    "vpc" => attribute(String, Required, "VPC ID"),
                    "zone" => attribute(String, Required, "Zone name"),
                    "profile" => attribute(String, Required, "Profile name"),
                    "image" => attribute(String, Required, "Image ID"),
                    "keys" => attribute(string_list(), Required, "SSH key IDs"),
                    "user_data" => attribute(String, Optional, "User data given to the instance"),
                    "resource_group" => attribute(String, OptionalComputed, "Resource group ID"),
                    "tags" => tags_attribute(OptionalComputed),
                    "crn" => attribute(String, Computed, "Instance CRN"),
                    "status" => attribute(String, Computed, "Instance status"),
                    "memory" => attribute(Number, Computed, "Instance memory in GiB"),
                    "vcpu" => computed_objects("Instance VCPU", VcpuState::attributes()),
                    "status_reasons" => computed_objects(
                        "Reasons for the current status",
                        StatusReasonState::attributes(),
                    ),
                    "volume_attachments" => computed_objects(
                        "Volumes attached to the instance",
                        VolumeAttachmentState::attributes(),
                    ),
                },
                blocks: map! {
                    "primary_network_interface" => NestedBlock::Single(Block {
                        description: Description::plain("Primary network interface"),
                        attributes: map! {
                            "id" => attribute(String, Computed, "Network interface ID"),
                            "name" => attribute(String, OptionalComputed, "Network interface name"),
                            "subnet" => attribute(String, Required, "Subnet ID"),
                            "security_groups" => attribute(string_set(), OptionalComputed, "Security group IDs"),
                            "primary_ipv4_address" => attribute(String, Computed, "Primary IPv4 address"),
                        },
                        ..Default::default()
                    }),
                    "timeouts" => Timeouts::block(),
                },
                ..Default::default()
            },
        }
    }
}

#[async_trait]
impl<'a> WithValidate for InstanceState<'a> {
    async fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath) {
        validators::resource_name(diags, attr_path.clone().attribute("name"), &self.name);
        validators::tags(diags, attr_path.clone().attribute("tags"), &self.tags);
        if let Value::Value(interface) = &self.primary_network_interface {
            validators::resource_name(
                diags,
                attr_path
                    .clone()
                    .attribute("primary_network_interface")
                    .attribute("name"),
                &interface.name,
            );
        }
        if let Value::Value(timeouts) = &self.timeouts {
            timeouts
                .validate(diags, attr_path.attribute("timeouts").index(0))
                .await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;

    #[test]
    fn prototype_from_declared_fields() {
        let state = InstanceState {
            name: "vsi-1".into(),
            vpc: "vpc-1".into(),
            zone: "us-south-1".into(),
            profile: "bx2-2x8".into(),
            image: "image-1".into(),
            keys: Value::Value(vec!["key-1".into()]),
            primary_network_interface: Value::Value(NetworkInterfaceState {
                subnet: "subnet-1".into(),
                security_groups: Value::Value(BTreeSet::from([ValueString::from("sg-1")])),
                ..Default::default()
            }),
            ..Default::default()
        };
        let body = serde_json::to_value(state.prototype()).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "name": "vsi-1",
                "vpc": { "id": "vpc-1" },
                "zone": { "name": "us-south-1" },
                "profile": { "name": "bx2-2x8" },
                "image": { "id": "image-1" },
                "keys": [{ "id": "key-1" }],
                "primary_network_interface": {
                    "subnet": { "id": "subnet-1" },
                    "security_groups": [{ "id": "sg-1" }],
                },
            })
        );
    }

    #[test]
    fn flatten_keeps_declared_security_groups() {
        let mut state = InstanceState {
            primary_network_interface: Value::Value(NetworkInterfaceState {
                subnet: "subnet-1".into(),
                security_groups: Value::Value(BTreeSet::from([ValueString::from("sg-1")])),
                ..Default::default()
            }),
            ..Default::default()
        };
        let instance: Instance = serde_json::from_value(serde_json::json!({
            "id": "vsi-id",
            "name": "vsi-1",
            "status": "running",
            "memory": 8,
            "vcpu": { "architecture": "amd64", "count": 2 },
            "zone": { "id": "", "name": "us-south-1" },
            "profile": { "id": "", "name": "bx2-2x8" },
            "primary_network_interface": {
                "id": "nic-1",
                "name": "eth0",
                "subnet": { "id": "subnet-1" },
                "primary_ip": { "address": "10.240.0.4" },
            },
        }))
        .unwrap();
        state.flatten(instance);

        assert_eq!(state.zone, Value::from("us-south-1"));
        let interface = state.primary_network_interface.as_ref_option().unwrap();
        assert_eq!(interface.primary_ipv4_address, Value::from("10.240.0.4"));
        assert_eq!(interface.security_groups, Value::Value(BTreeSet::from([ValueString::from("sg-1")])));
        let vcpu = &state.vcpu.as_ref_option().unwrap()[0];
        assert_eq!(vcpu.as_ref_option().unwrap().count, Value::Value(2));
    }
}
