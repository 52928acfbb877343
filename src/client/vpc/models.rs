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

//! Request and response bodies of the VPC generation 2 API

use serde::{Deserialize, Serialize};

use crate::client::pager::collection;

/// Reference to another VPC object, as embedded in responses
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Reference {
    pub id: String,
    pub crn: Option<String>,
    pub name: Option<String>,
    pub href: Option<String>,
    pub resource_type: Option<String>,
}

impl Reference {
    pub fn name_or_empty(&self) -> &str {
        self.name.as_deref().unwrap_or_default()
    }
}

/// Identity of an object in a request body
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Identity {
    Id { id: String },
    Name { name: String },
}

impl Identity {
    pub fn id(id: impl Into<String>) -> Self {
        Identity::Id { id: id.into() }
    }
    pub fn name(name: impl Into<String>) -> Self {
        Identity::Name { name: name.into() }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StatusReason {
    pub code: String,
    pub message: String,
    pub more_info: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Vcpu {
    pub architecture: String,
    pub count: i64,
    pub manufacturer: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ReservedIpReference {
    pub id: Option<String>,
    pub name: Option<String>,
    pub address: String,
    pub resource_type: Option<String>,
}

// Instances

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Instance {
    pub id: String,
    pub crn: String,
    pub name: String,
    pub status: String,
    pub status_reasons: Vec<StatusReason>,
    pub memory: i64,
    pub vcpu: Vcpu,
    pub profile: Reference,
    pub image: Option<Reference>,
    pub zone: Reference,
    pub vpc: Reference,
    pub resource_group: Reference,
    pub primary_network_interface: Option<NetworkInterfaceReference>,
    pub network_interfaces: Vec<NetworkInterfaceReference>,
    pub volume_attachments: Vec<VolumeAttachmentReference>,
    pub placement_target: Option<Reference>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct NetworkInterfaceReference {
    pub id: String,
    pub name: String,
    pub subnet: Reference,
    pub primary_ip: ReservedIpReference,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct VolumeAttachmentReference {
    pub id: String,
    pub name: String,
    pub volume: Reference,
}

collection!(InstanceCollection, instances, Instance);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstancePrototype {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub vpc: Identity,
    pub zone: Identity,
    pub profile: Identity,
    pub image: Identity,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub keys: Vec<Identity>,
    pub primary_network_interface: NetworkInterfacePrototype,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_group: Option<Identity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_data: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkInterfacePrototype {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub subnet: Identity,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub security_groups: Vec<Identity>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InstancePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

// Dedicated hosts

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DedicatedHost {
    pub id: String,
    pub crn: String,
    pub name: String,
    pub href: String,
    pub state: String,
    pub lifecycle_state: String,
    pub memory: i64,
    pub available_memory: i64,
    pub vcpu: Vcpu,
    pub available_vcpu: Vcpu,
    pub socket_count: i64,
    pub instance_placement_enabled: bool,
    pub provisionable: bool,
    pub zone: Reference,
    pub profile: Reference,
    pub group: Reference,
    pub resource_group: Reference,
    pub instances: Vec<Reference>,
    pub supported_instance_profiles: Vec<Reference>,
    pub resource_type: String,
    pub created_at: String,
}

collection!(DedicatedHostCollection, dedicated_hosts, DedicatedHost);

// Floating IPs

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FloatingIp {
    pub id: String,
    pub crn: String,
    pub name: String,
    pub href: String,
    pub address: String,
    pub status: String,
    pub zone: Reference,
    pub target: Option<Reference>,
    pub resource_group: Reference,
    pub created_at: String,
}

collection!(FloatingIpCollection, floating_ips, FloatingIp);

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FloatingIpPrototype {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zone: Option<Identity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<Identity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_group: Option<Identity>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FloatingIpPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<Identity>,
}

// Network ACLs

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct NetworkAcl {
    pub id: String,
    pub crn: String,
    pub name: String,
    pub href: String,
    pub vpc: Reference,
    pub resource_group: Reference,
    pub rules: Vec<NetworkAclRule>,
    pub subnets: Vec<Reference>,
    pub created_at: String,
}

collection!(NetworkAclCollection, network_acls, NetworkAcl);

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct NetworkAclRule {
    pub id: String,
    pub name: String,
    pub href: String,
    pub action: String,
    pub direction: String,
    pub source: String,
    pub destination: String,
    pub ip_version: String,
    pub protocol: String,
    pub before: Option<Reference>,
    pub code: Option<i64>,
    #[serde(rename = "type")]
    pub icmp_type: Option<i64>,
    pub port_min: Option<i64>,
    pub port_max: Option<i64>,
    pub source_port_min: Option<i64>,
    pub source_port_max: Option<i64>,
}

collection!(NetworkAclRuleCollection, rules, NetworkAclRule);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkAclPrototype {
    pub name: String,
    pub vpc: Identity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_group: Option<Identity>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NetworkAclPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NetworkAclRulePrototype {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub action: String,
    pub direction: String,
    pub source: String,
    pub destination: String,
    pub protocol: String,
    /// Rule to insert before, appended at the end when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub before: Option<Identity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<i64>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub icmp_type: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port_min: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port_max: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_port_min: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_port_max: Option<i64>,
}

// Instance groups

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct InstanceGroup {
    pub id: String,
    pub crn: String,
    pub name: String,
    pub href: String,
    pub status: String,
    pub membership_count: i64,
    pub instance_template: Reference,
    pub subnets: Vec<Reference>,
    pub application_port: Option<i64>,
    pub load_balancer_pool: Option<Reference>,
    pub managers: Vec<Reference>,
    pub vpc: Reference,
    pub resource_group: Reference,
    pub created_at: String,
    pub updated_at: String,
}

collection!(InstanceGroupCollection, instance_groups, InstanceGroup);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstanceGroupPrototype {
    pub name: String,
    pub instance_template: Identity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub membership_count: Option<i64>,
    pub subnets: Vec<Identity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub application_port: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load_balancer: Option<Identity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load_balancer_pool: Option<Identity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_group: Option<Identity>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InstanceGroupPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub membership_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subnets: Option<Vec<Identity>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub application_port: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load_balancer: Option<Identity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load_balancer_pool: Option<Identity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_template: Option<Identity>,
}

impl InstanceGroupPatch {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct InstanceGroupMembership {
    pub id: String,
    pub name: String,
    pub href: String,
    pub status: String,
    pub delete_instance_on_membership_delete: bool,
    pub instance: Reference,
    pub instance_template: Reference,
    pub pool_member: Option<Reference>,
    pub created_at: String,
    pub updated_at: String,
}

collection!(
    InstanceGroupMembershipCollection,
    memberships,
    InstanceGroupMembership
);

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InstanceGroupMembershipPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct InstanceGroupManagerAction {
    pub id: String,
    pub name: String,
    pub href: String,
    pub action_type: String,
    pub status: String,
    pub auto_delete: bool,
    pub auto_delete_timeout: i64,
    pub cron_spec: Option<String>,
    pub run_at: Option<String>,
    pub last_applied_at: Option<String>,
    pub next_run_at: Option<String>,
    pub resource_type: String,
    pub group: Option<ManagerActionGroup>,
    pub manager: Option<ManagerActionManager>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ManagerActionGroup {
    pub membership_count: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ManagerActionManager {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_membership_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_membership_count: Option<i64>,
}

/// Body of both the create and the update calls of a scheduled action
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ManagerActionPrototype {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cron_spec: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<ManagerActionGroup>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manager: Option<ManagerActionManager>,
}

// Endpoint gateways

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EndpointGateway {
    pub id: String,
    pub crn: String,
    pub name: String,
    pub href: String,
    pub health_state: String,
    pub lifecycle_state: String,
    pub ips: Vec<ReservedIpReference>,
    pub target: EndpointGatewayTarget,
    pub vpc: Reference,
    pub resource_group: Reference,
    pub security_groups: Vec<Reference>,
    pub service_endpoints: Vec<String>,
    pub allow_dns_resolution_binding: bool,
    pub resource_type: String,
    pub created_at: String,
}

collection!(EndpointGatewayCollection, endpoint_gateways, EndpointGateway);

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct EndpointGatewayTarget {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crn: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub resource_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EndpointGatewayPrototype {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub target: EndpointGatewayTarget,
    pub vpc: Identity,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ips: Vec<ReservedIpPrototype>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub security_groups: Vec<Identity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_group: Option<Identity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_dns_resolution_binding: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReservedIpPrototype {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub subnet: Identity,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EndpointGatewayPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_dns_resolution_binding: Option<bool>,
}
