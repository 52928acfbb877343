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
use tf_provider::value::{self, Value, ValueList, ValueNumber, ValueSet, ValueString};
use tf_provider::{map, AttributePath, Diagnostics};

use crate::client::vpc::{NetworkAcl, NetworkAclRule, NetworkAclRulePrototype};
use crate::utils::{attribute, tags_attribute, WithNormalize, WithSchema, WithValidate};
use crate::validators;

pub(super) const PORT_MIN: i64 = 1;
pub(super) const PORT_MAX: i64 = 65535;

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkAclState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub name: ValueString<'a>,
    pub vpc: ValueString<'a>,
    pub resource_group: ValueString<'a>,
    pub resource_group_name: ValueString<'a>,
    pub crn: ValueString<'a>,
    pub tags: ValueSet<ValueString<'a>>,
    pub rules: ValueList<Value<RuleState<'a>>>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleState<'a> {
    pub id: ValueString<'a>,
    pub name: ValueString<'a>,
    pub action: ValueString<'a>,
    pub ip_version: ValueString<'a>,
    pub source: ValueString<'a>,
    pub destination: ValueString<'a>,
    pub direction: ValueString<'a>,
    pub subnets: ValueNumber,
    #[serde(with = "value::serde_as_vec")]
    pub icmp: Value<IcmpState>,
    #[serde(with = "value::serde_as_vec")]
    pub tcp: Value<PortRangeState>,
    #[serde(with = "value::serde_as_vec")]
    pub udp: Value<PortRangeState>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IcmpState {
    pub code: ValueNumber,
    #[serde(rename = "type")]
    pub icmp_type: ValueNumber,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortRangeState {
    pub port_min: ValueNumber,
    pub port_max: ValueNumber,
    pub source_port_min: ValueNumber,
    pub source_port_max: ValueNumber,
}

impl RuleState<'_> {
    /// Attributes the user declares, ignoring what the API computes
    pub(super) fn same_declaration(&self, other: &Self) -> bool {
        self.name == other.name
            && self.action == other.action
            && self.source == other.source
            && self.destination == other.destination
            && self.direction == other.direction
            && self.icmp == other.icmp
            && self.tcp == other.tcp
            && self.udp == other.udp
    }

    /// Rule creation body, appended at the end of the list (no `before`)
    pub(super) fn prototype(&self) -> NetworkAclRulePrototype {
        let owned = |value: &ValueString| value.as_deref_option().map(str::to_owned);
        let mut prototype = NetworkAclRulePrototype {
            name: owned(&self.name),
            action: self.action.as_deref_option().unwrap_or_default().to_owned(),
            direction: self.direction.as_deref_option().unwrap_or_default().to_owned(),
            source: self.source.as_deref_option().unwrap_or_default().to_owned(),
            destination: self
                .destination
                .as_deref_option()
                .unwrap_or_default()
                .to_owned(),
            protocol: "all".to_owned(),
            before: None,
            ..Default::default()
        };

        let ports = if let Value::Value(icmp) = &self.icmp {
            prototype.protocol = "icmp".to_owned();
            prototype.code = icmp.code.as_ref_option().copied();
            prototype.icmp_type = icmp.icmp_type.as_ref_option().copied();
            None
        } else if let Value::Value(tcp) = &self.tcp {
            prototype.protocol = "tcp".to_owned();
            Some(tcp)
        } else if let Value::Value(udp) = &self.udp {
            prototype.protocol = "udp".to_owned();
            Some(udp)
        } else {
            None
        };
        if let Some(ports) = ports {
            prototype.port_min = Some(ports.port_min.as_ref_option().copied().unwrap_or(PORT_MIN));
            prototype.port_max = Some(ports.port_max.as_ref_option().copied().unwrap_or(PORT_MAX));
            prototype.source_port_min = Some(
                ports
                    .source_port_min
                    .as_ref_option()
                    .copied()
                    .unwrap_or(PORT_MIN),
            );
            prototype.source_port_max = Some(
                ports
                    .source_port_max
                    .as_ref_option()
                    .copied()
                    .unwrap_or(PORT_MAX),
            );
        }
        prototype
    }

    pub(super) fn from_api(rule: NetworkAclRule, subnets: usize) -> Self {
        let ports = || PortRangeState {
            port_min: rule.port_min.into(),
            port_max: rule.port_max.into(),
            source_port_min: rule.source_port_min.into(),
            source_port_max: rule.source_port_max.into(),
        };
        let (icmp, tcp, udp) = match rule.protocol.as_str() {
            "icmp" => (
                Value::Value(IcmpState {
                    code: rule.code.into(),
                    icmp_type: rule.icmp_type.into(),
                }),
                Value::Null,
                Value::Null,
            ),
            "tcp" => (Value::Null, Value::Value(ports()), Value::Null),
            "udp" => (Value::Null, Value::Null, Value::Value(ports())),
            _ => (Value::Null, Value::Null, Value::Null),
        };
        Self {
            id: rule.id.into(),
            name: rule.name.into(),
            action: rule.action.into(),
            ip_version: rule.ip_version.into(),
            source: rule.source.into(),
            destination: rule.destination.into(),
            direction: rule.direction.into(),
            subnets: Value::Value(subnets as i64),
            icmp,
            tcp,
            udp,
        }
    }
}

impl<'a> NetworkAclState<'a> {
    /// Copy the remote ACL into the state, keeping the configured inputs
    pub(super) fn flatten(&mut self, acl: NetworkAcl) {
        let subnets = acl.subnets.len();
        self.id = acl.id.into();
        self.name = acl.name.into();
        self.vpc = acl.vpc.id.into();
        self.resource_group = acl.resource_group.id.into();
        self.resource_group_name = acl.resource_group.name.unwrap_or_default().into();
        self.crn = acl.crn.into();
        self.rules = Value::Value(
            acl.rules
                .into_iter()
                .map(|rule| Value::Value(RuleState::from_api(rule, subnets)))
                .collect(),
        );
    }

    /// Declared rules, in order
    pub(super) fn declared_rules(&self) -> Vec<&RuleState<'a>> {
        self.rules.iter().flatten().flatten().collect()
    }
}

/// `true` when the rule lists differ in anything the user declares
pub(super) fn rules_changed(prior: &NetworkAclState, planned: &NetworkAclState) -> bool {
    if planned.rules.is_unknown() {
        return false;
    }
    let (prior, planned) = (prior.declared_rules(), planned.declared_rules());
    prior.len() != planned.len()
        || prior
            .iter()
            .zip(planned.iter())
            .any(|(a, b)| !a.same_declaration(b))
}

fn port_range_block() -> NestedBlock {
    let port = |description: &str| {
        attribute(
            AttributeType::Number,
            AttributeConstraint::OptionalComputed,
            description,
        )
    };
    NestedBlock::Optional(Block {
        description: Description::plain("Port range of the rule, 1 to 65535 by default"),
        attributes: map! {
            "port_min" => port("Lowest destination port"),
            "port_max" => port("Highest destination port"),
            "source_port_min" => port("Lowest source port"),
            "source_port_max" => port("Highest source port"),
        },
        ..Default::default()
    })
}

pub(super) fn rule_block() -> Block {
    use AttributeConstraint::{Computed, Optional, Required};
    use AttributeType::{Number, String};
    Block {
        description: Description::plain("Rule of the network ACL"),
        attributes: map! {
            "id" => attribute(String, Computed, "Rule ID"),
            "name" => attribute(String, Required, "Rule name"),
            "action" => attribute(String, Required, "`allow` or `deny`"),
            "ip_version" => attribute(String, Computed, "IP version of the rule"),
            "source" => attribute(String, Required, "Source IP address or CIDR block"),
            "destination" => attribute(String, Required, "Destination IP address or CIDR block"),
            "direction" => attribute(String, Required, "Direction of traffic to enforce, either inbound or outbound"),
            "subnets" => attribute(Number, Computed, "Number of subnets attached to the network ACL"),
        },
        blocks: map! {
            "icmp" => NestedBlock::Optional(Block {
                description: Description::plain("ICMP protocol"),
                attributes: map! {
                    "code" => attribute(Number, Optional, "ICMP code, 0 to 255"),
                    "type" => attribute(Number, Optional, "ICMP type, 0 to 254"),
                },
                ..Default::default()
            }),
            "tcp" => port_range_block(),
            "udp" => port_range_block(),
        },
        ..Default::default()
    }
}

impl<'a> WithSchema for NetworkAclState<'a> {
    fn schema() -> Schema {
        use AttributeConstraint::{Computed, OptionalComputed, Required};
        use AttributeType::String;
        Schema {
            version: 1,
            block: Block {
                version: 1,
                description: Description::plain("Network ACL of a VPC, with its inline rules"),
                attributes: map! {
                    "id" => attribute(String, Computed, "Network ACL ID"),
                    "name" => attribute(String, Required, "Network ACL name"),
                    "vpc" => attribute(String, Required, "ID of the VPC of the network ACL"),
                    "resource_group" => attribute(String, OptionalComputed, "Resource group ID for the network ACL"),
                    "resource_group_name" => attribute(String, Computed, "Name of the resource group"),
                    "crn" => attribute(String, Computed, "CRN of the network ACL"),
                    "tags" => tags_attribute(OptionalComputed),
                },
                blocks: map! {
                    "rules" => NestedBlock::List(rule_block()),
                },
                ..Default::default()
            },
        }
    }
}

#[async_trait]
impl<'a> WithValidate for RuleState<'a> {
    async fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath) {
        validators::resource_name(diags, attr_path.clone().attribute("name"), &self.name);
        validators::allowed_string(
            diags,
            attr_path.clone().attribute("action"),
            &self.action,
            &["allow", "deny"],
        );
        validators::allowed_string(
            diags,
            attr_path.clone().attribute("direction"),
            &self.direction,
            &["inbound", "outbound"],
        );
        validators::at_most_one(
            diags,
            attr_path.clone(),
            &[
                ("icmp", self.icmp.is_value()),
                ("tcp", self.tcp.is_value()),
                ("udp", self.udp.is_value()),
            ],
        );
        if let Value::Value(icmp) = &self.icmp {
            let path = attr_path.clone().attribute("icmp").index(0);
            validators::int_range(diags, path.clone().attribute("code"), &icmp.code, 0, 255);
            validators::int_range(diags, path.attribute("type"), &icmp.icmp_type, 0, 254);
        }
        for (name, ports) in [("tcp", &self.tcp), ("udp", &self.udp)] {
            if let Value::Value(ports) = ports {
                let path = attr_path.clone().attribute(name).index(0);
                for (field, value) in [
                    ("port_min", &ports.port_min),
                    ("port_max", &ports.port_max),
                    ("source_port_min", &ports.source_port_min),
                    ("source_port_max", &ports.source_port_max),
                ] {
                    validators::int_range(
                        diags,
                        path.clone().attribute(field),
                        value,
                        PORT_MIN,
                        PORT_MAX,
                    );
                }
            }
        }
    }
}

#[async_trait]
impl<'a> WithValidate for NetworkAclState<'a> {
    async fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath) {
        validators::resource_name(diags, attr_path.clone().attribute("name"), &self.name);
        validators::tags(diags, attr_path.clone().attribute("tags"), &self.tags);
        for (i, rule) in self.rules.iter().flatten().enumerate() {
            if let Value::Value(rule) = rule {
                rule.validate(diags, attr_path.clone().attribute("rules").index(i as i64))
                    .await;
            }
        }
    }
}

impl<'a> WithNormalize for RuleState<'a> {
    fn normalize(&mut self, _diags: &mut Diagnostics) {
        for ports in [&mut self.tcp, &mut self.udp] {
            if let Value::Value(ports) = ports {
                for (value, default) in [
                    (&mut ports.port_min, PORT_MIN),
                    (&mut ports.port_max, PORT_MAX),
                    (&mut ports.source_port_min, PORT_MIN),
                    (&mut ports.source_port_max, PORT_MAX),
                ] {
                    if value.is_null() {
                        *value = Value::Value(default);
                    }
                }
            }
        }
    }
}

impl<'a> WithNormalize for NetworkAclState<'a> {
    fn normalize(&mut self, diags: &mut Diagnostics) {
        for rule in self.rules.iter_mut().flatten().flatten() {
            rule.normalize(diags);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tcp_rule() -> RuleState<'static> {
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

    #[test]
    fn prototype_defaults_and_no_before() {
        let mut rule = tcp_rule();
        rule.normalize(&mut Diagnostics::default());
        let prototype = rule.prototype();
        assert_eq!(prototype.protocol, "tcp");
        assert_eq!(prototype.port_min, Some(22));
        assert_eq!(prototype.source_port_min, Some(PORT_MIN));
        assert_eq!(prototype.source_port_max, Some(PORT_MAX));
        assert!(prototype.before.is_none());

        let all = RuleState {
            tcp: Value::Null,
            ..tcp_rule()
        }
        .prototype();
        assert_eq!(all.protocol, "all");
        assert_eq!(all.port_min, None);
    }

    #[tokio::test]
    async fn only_one_protocol_per_rule() {
        let rule = RuleState {
            icmp: Value::Value(IcmpState {
                code: Value::Value(0),
                icmp_type: Value::Value(8),
            }),
            ..tcp_rule()
        };
        let mut diags = Diagnostics::default();
        rule.validate(&mut diags, AttributePath::new("rules").index(0))
            .await;
        assert_eq!(diags.errors.len(), 1);
        assert_eq!(diags.errors[0].summary, "Conflicting attributes");
    }

    #[tokio::test]
    async fn icmp_ranges() {
        let rule = RuleState {
            tcp: Value::Null,
            icmp: Value::Value(IcmpState {
                code: Value::Value(256),
                icmp_type: Value::Value(255),
            }),
            ..tcp_rule()
        };
        let mut diags = Diagnostics::default();
        rule.validate(&mut diags, AttributePath::new("rules").index(0))
            .await;
        assert_eq!(diags.errors.len(), 2);
    }

    #[test]
    fn computed_fields_do_not_count_as_changes() {
        let prior = NetworkAclState {
            rules: Value::Value(vec![Value::Value(RuleState {
                id: "r006-rule".into(),
                ip_version: "ipv4".into(),
                subnets: Value::Value(2),
                ..tcp_rule()
            })]),
            ..Default::default()
        };
        let mut planned = NetworkAclState {
            rules: Value::Value(vec![Value::Value(tcp_rule())]),
            ..Default::default()
        };
        assert!(!rules_changed(&prior, &planned));

        planned.rules = Value::Value(vec![
            Value::Value(tcp_rule()),
            Value::Value(tcp_rule()),
        ]);
        assert!(rules_changed(&prior, &planned));
    }
}
