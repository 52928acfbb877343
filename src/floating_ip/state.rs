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
use tf_provider::value::{self, Value, ValueSet, ValueString};
use tf_provider::{map, AttributePath, Diagnostics};

use crate::client::vpc::{FloatingIp, FloatingIpPrototype, Identity};
use crate::utils::{attribute, tags_attribute, Timeouts, WithSchema, WithValidate};
use crate::validators;

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FloatingIpState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub name: ValueString<'a>,
    pub zone: ValueString<'a>,
    pub target: ValueString<'a>,
    pub resource_group: ValueString<'a>,
    pub tags: ValueSet<ValueString<'a>>,
    pub crn: ValueString<'a>,
    pub address: ValueString<'a>,
    pub status: ValueString<'a>,
    #[serde(with = "value::serde_as_vec")]
    pub timeouts: Value<Timeouts<'a>>,
}

impl<'a> FloatingIpState<'a> {
    /// Bound to `target` when set, reserved in `zone` otherwise
    pub(super) fn prototype(&self) -> FloatingIpPrototype {
        let target = self.target.as_deref_option().map(Identity::id);
        FloatingIpPrototype {
            name: self.name.as_deref_option().map(str::to_owned),
            zone: match target {
                Some(_) => None,
                None => self.zone.as_deref_option().map(Identity::name),
            },
            target,
            resource_group: self.resource_group.as_deref_option().map(Identity::id),
        }
    }

    pub(super) fn flatten(&mut self, ip: FloatingIp) {
        self.id = ip.id.into();
        self.crn = ip.crn.into();
        self.name = ip.name.into();
        self.address = ip.address.into();
        self.status = ip.status.into();
        self.zone = ip.zone.name.unwrap_or_default().into();
        self.target = ip.target.map(|target| target.id).unwrap_or_default().into();
        self.resource_group = ip.resource_group.id.into();
    }
}

impl<'a> WithSchema for FloatingIpState<'a> {
    fn schema() -> Schema {
        use AttributeConstraint::{Computed, OptionalComputed, Required};
        use AttributeType::String;
        Schema {
            version: 1,
            block: Block {
                version: 1,
                description: Description::plain("Floating IP, reserved in a zone or bound to a network interface"),
                attributes: map! {
                    "id" => attribute(String, Computed, "Floating IP ID"),
                    "name" => attribute(String, Required, "Floating IP name"),
                    "zone" => attribute(String, OptionalComputed, "Zone name, conflicts with `target`"),
                    "target" => attribute(String, OptionalComputed, "Network interface ID the floating IP is bound to"),
                    "resource_group" => attribute(String, OptionalComputed, "Resource group ID"),
                    "tags" => tags_attribute(OptionalComputed),
                    "crn" => attribute(String, Computed, "Floating IP CRN"),
                    "address" => attribute(String, Computed, "Public IP address"),
                    "status" => attribute(String, Computed, "Floating IP status"),
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
impl<'a> WithValidate for FloatingIpState<'a> {
    async fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath) {
        validators::resource_name(diags, attr_path.clone().attribute("name"), &self.name);
        validators::tags(diags, attr_path.clone().attribute("tags"), &self.tags);
        validators::at_most_one(
            diags,
            attr_path.clone().attribute("zone"),
            &[
                ("zone", self.zone.is_value()),
                ("target", self.target.is_value()),
            ],
        );
        if self.zone.is_null() && self.target.is_null() {
            diags.error_short("One of `zone` or `target` must be set", attr_path.clone());
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
    fn target_wins_over_zone() {
        let state = FloatingIpState {
            name: "fip".into(),
            zone: "us-south-1".into(),
            target: "nic-1".into(),
            ..Default::default()
        };
        let body = serde_json::to_value(state.prototype()).unwrap();
        assert_eq!(
            body,
            serde_json::json!({ "name": "fip", "target": { "id": "nic-1" } })
        );
    }

    #[tokio::test]
    async fn zone_or_target_required() {
        let state = FloatingIpState {
            name: "fip".into(),
            ..Default::default()
        };
        let mut diags = Diagnostics::default();
        state.validate(&mut diags, AttributePath::default()).await;
        assert_eq!(diags.errors.len(), 1);
    }
}
