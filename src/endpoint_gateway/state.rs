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

use tf_provider::schema::{
    AttributeConstraint, AttributeType, Block, Description, NestedBlock, Schema,
};
use tf_provider::value::{self, Value, ValueList, ValueSet, ValueString};
use tf_provider::{map, AttributePath, Diagnostics};

use crate::client::vpc::{
    EndpointGateway, EndpointGatewayPrototype, EndpointGatewayTarget, Identity,
    ReservedIpPrototype,
};
use crate::flatten::opt_string;
use crate::utils::{attribute, string_set, tags_attribute, Timeouts, WithSchema, WithValidate};
use crate::validators;

pub(super) const TARGET_TYPES: &[&str] = &["provider_cloud_service", "provider_infrastructure_service"];

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointGatewayState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub name: ValueString<'a>,
    pub vpc: ValueString<'a>,
    pub resource_group: ValueString<'a>,
    pub security_groups: ValueSet<ValueString<'a>>,
    pub tags: ValueSet<ValueString<'a>>,
    pub crn: ValueString<'a>,
    pub health_state: ValueString<'a>,
    pub lifecycle_state: ValueString<'a>,
    pub resource_type: ValueString<'a>,
    pub created_at: ValueString<'a>,
    pub target: Value<TargetState<'a>>,
    pub ips: ValueList<Value<IpState<'a>>>,
    #[serde(with = "value::serde_as_vec")]
    pub timeouts: Value<Timeouts<'a>>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetState<'a> {
    pub name: ValueString<'a>,
    pub crn: ValueString<'a>,
    pub resource_type: ValueString<'a>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpState<'a> {
    pub id: ValueString<'a>,
    pub name: ValueString<'a>,
    pub subnet: ValueString<'a>,
    pub address: ValueString<'a>,
    pub resource_type: ValueString<'a>,
}

impl<'a> EndpointGatewayState<'a> {
    pub(super) fn prototype(&self) -> EndpointGatewayPrototype {
        let target = match &self.target {
            Value::Value(target) => EndpointGatewayTarget {
                crn: target.crn.as_deref_option().map(str::to_owned),
                name: target.name.as_deref_option().map(str::to_owned),
                resource_type: target.resource_type.as_str().to_owned(),
            },
            _ => Default::default(),
        };
        EndpointGatewayPrototype {
            name: self.name.as_deref_option().map(str::to_owned),
            target,
            vpc: Identity::id(self.vpc.as_str()),
            ips: self
                .ips
                .iter()
                .flatten()
                .filter_map(|ip| ip.as_ref_option())
                .filter_map(|ip| {
                    let subnet = ip.subnet.as_deref_option()?;
                    Some(ReservedIpPrototype {
                        name: ip.name.as_deref_option().map(str::to_owned),
                        subnet: Identity::id(subnet),
                    })
                })
                .collect(),
            security_groups: self
                .security_groups
                .iter()
                .flatten()
                .filter_map(|sg| sg.as_deref_option())
                .map(Identity::id)
                .collect(),
            resource_group: self.resource_group.as_deref_option().map(Identity::id),
            allow_dns_resolution_binding: None,
        }
    }

    /// Reserved IPs are matched to the declared ones by position: the API does not echo the subnet
    pub(super) fn flatten(&mut self, gateway: EndpointGateway) {
        self.id = gateway.id.into();
        self.crn = gateway.crn.into();
        self.name = gateway.name.into();
        self.health_state = gateway.health_state.into();
        self.lifecycle_state = gateway.lifecycle_state.into();
        self.resource_type = gateway.resource_type.into();
        self.created_at = gateway.created_at.into();
        self.vpc = gateway.vpc.id.into();
        self.resource_group = gateway.resource_group.id.into();
        self.security_groups = Value::Value(
            gateway
                .security_groups
                .into_iter()
                .map(|sg| sg.id.into())
                .collect(),
        );

        let declared = match &self.target {
            Value::Value(target) => target.clone(),
            _ => Default::default(),
        };
        self.target = Value::Value(TargetState {
            name: match declared.name {
                Value::Value(name) => Value::Value(name),
                _ => opt_string(gateway.target.name),
            },
            crn: match declared.crn {
                Value::Value(crn) => Value::Value(crn),
                _ => opt_string(gateway.target.crn),
            },
            resource_type: gateway.target.resource_type.into(),
        });

        let subnets: Vec<ValueString<'a>> = self
            .ips
            .iter()
            .flatten()
            .map(|ip| match ip {
                Value::Value(ip) => ip.subnet.clone(),
                _ => Value::Null,
            })
            .collect();
        self.ips = Value::Value(
            gateway
                .ips
                .into_iter()
                .enumerate()
                .map(|(i, ip)| {
                    Value::Value(IpState {
                        id: opt_string(ip.id),
                        name: opt_string(ip.name),
                        subnet: subnets.get(i).cloned().unwrap_or(Value::Null),
                        address: ip.address.into(),
                        resource_type: opt_string(ip.resource_type),
                    })
                })
                .collect(),
        );
    }
}

impl<'a> WithSchema for EndpointGatewayState<'a> {
    fn schema() -> Schema {
        use AttributeConstraint::{Computed, Optional, OptionalComputed, Required};
        use AttributeType::String;
        Schema {
            version: 1,
            block: Block {
                version: 1,
                description: Description::plain("Virtual private endpoint gateway to an IBM Cloud service"),
                attributes: map! {
                    "id" => attribute(String, Computed, "Endpoint gateway ID"),
                    "name" => attribute(String, Required, "Endpoint gateway name"),
                    "vpc" => attribute(String, Required, "VPC ID"),
                    "resource_group" => attribute(String, OptionalComputed, "Resource group ID"),
                    "security_groups" => attribute(string_set(), OptionalComputed, "Security group IDs"),
                    "tags" => tags_attribute(OptionalComputed),
                    "crn" => attribute(String, Computed, "Endpoint gateway CRN"),
                    "health_state" => attribute(String, Computed, "Health of the endpoint gateway"),
                    "lifecycle_state" => attribute(String, Computed, "Lifecycle state of the endpoint gateway"),
                    "resource_type" => attribute(String, Computed, "Resource type"),
                    "created_at" => attribute(String, Computed, "Creation date"),
                },
                blocks: map! {
                    "target" => NestedBlock::Single(Block {
                        description: Description::plain("Service the gateway connects to, by name or CRN"),
                        attributes: map! {
                            "name" => attribute(String, OptionalComputed, "Target name"),
                            "crn" => attribute(String, OptionalComputed, "Target CRN"),
                            "resource_type" => attribute(String, Required, "`provider_cloud_service` or `provider_infrastructure_service`"),
                        },
                        ..Default::default()
                    }),
                    "ips" => NestedBlock::List(Block {
                        description: Description::plain("Reserved IPs bound to the gateway"),
                        attributes: map! {
                            "id" => attribute(String, Computed, "Reserved IP ID"),
                            "name" => attribute(String, OptionalComputed, "Reserved IP name"),
                            "subnet" => attribute(String, Optional, "Subnet the IP is reserved in"),
                            "address" => attribute(String, Computed, "IP address"),
                            "resource_type" => attribute(String, Computed, "Resource type"),
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
impl<'a> WithValidate for EndpointGatewayState<'a> {
    async fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath) {
        validators::resource_name(diags, attr_path.clone().attribute("name"), &self.name);
        validators::tags(diags, attr_path.clone().attribute("tags"), &self.tags);
        if let Value::Value(target) = &self.target {
            let target_path = attr_path.clone().attribute("target");
            validators::allowed_string(
                diags,
                target_path.clone().attribute("resource_type"),
                &target.resource_type,
                TARGET_TYPES,
            );
            if target.name.is_null() && target.crn.is_null() {
                diags.error_short("One of `name` or `crn` must be set", target_path);
            }
        }
        for (i, ip) in self.ips.iter().flatten().enumerate() {
            if let Value::Value(ip) = ip {
                validators::resource_name(
                    diags,
                    attr_path.clone().attribute("ips").index(i as i64).attribute("name"),
                    &ip.name,
                );
            }
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
    use super::*;

    #[test]
    fn prototype_targets_by_crn() {
        let state = EndpointGatewayState {
            name: "cos-gateway".into(),
            vpc: "vpc-1".into(),
            target: Value::Value(TargetState {
                crn: "crn:v1:bluemix:public:cloud-object-storage:global:::endpoint:s3.direct.us-south.cloud-object-storage.appdomain.cloud".into(),
                resource_type: "provider_cloud_service".into(),
                ..Default::default()
            }),
            ips: Value::Value(vec![Value::Value(IpState {
                name: "cos-ip".into(),
                subnet: "subnet-1".into(),
                ..Default::default()
            })]),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(state.prototype()).unwrap(),
            serde_json::json!({
                "name": "cos-gateway",
                "target": {
                    "crn": "crn:v1:bluemix:public:cloud-object-storage:global:::endpoint:s3.direct.us-south.cloud-object-storage.appdomain.cloud",
                    "resource_type": "provider_cloud_service",
                },
                "vpc": { "id": "vpc-1" },
                "ips": [{ "name": "cos-ip", "subnet": { "id": "subnet-1" } }],
            })
        );
    }

    #[tokio::test]
    async fn target_needs_name_or_crn() {
        let state = EndpointGatewayState {
            name: "gw".into(),
            target: Value::Value(TargetState {
                resource_type: "provider_service".into(),
                ..Default::default()
            }),
            ..Default::default()
        };
        let mut diags = Diagnostics::default();
        state.validate(&mut diags, AttributePath::default()).await;
        assert_eq!(diags.errors.len(), 2);
    }
}
