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

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use tf_provider::schema::{
    Attribute, AttributeConstraint, AttributeType, Block, Description, NestedBlock, Schema,
};
use tf_provider::value::{Value, ValueEmpty, ValueList, ValueString};
use tf_provider::{map, AttributePath, DataSource, Diagnostics};

use crate::client::vpc::NetworkAcl;
use crate::client::{NotFoundExt, Session, SessionHandle};
use crate::utils::{attribute, computed_objects, WithSchema, WithValidate};

use super::state::{rule_block, RuleState};

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkAclDataSourceState<'a> {
    #[serde(borrow = "'a")]
    pub id: ValueString<'a>,
    pub network_acl: ValueString<'a>,
    pub name: ValueString<'a>,
    pub vpc_name: ValueString<'a>,
    pub vpc: ValueString<'a>,
    pub resource_group: ValueString<'a>,
    pub resource_group_name: ValueString<'a>,
    pub crn: ValueString<'a>,
    pub rules: ValueList<Value<RuleState<'a>>>,
}

/// Nested blocks of the resource become computed lists of objects
fn computed_attributes(block: Block) -> HashMap<String, Attribute> {
    let mut attributes: HashMap<String, Attribute> = block
        .attributes
        .into_iter()
        .map(|(name, attr)| {
            (
                name,
                Attribute {
                    constraint: AttributeConstraint::Computed,
                    ..attr
                },
            )
        })
        .collect();
    for (name, nested) in block.blocks {
        let (NestedBlock::Optional(nested) | NestedBlock::List(nested)) = nested else {
            continue;
        };
        let description = nested.description.content.clone();
        attributes.insert(
            name,
            computed_objects(&description, computed_attributes(nested)),
        );
    }
    attributes
}

impl<'a> WithSchema for NetworkAclDataSourceState<'a> {
    fn schema() -> Schema {
        use AttributeConstraint::{Computed, Optional};
        use AttributeType::String;
        Schema {
            version: 1,
            block: Block {
                version: 1,
                description: Description::plain("Look up a network ACL by ID, or by name"),
                attributes: map! {
                    "id" => attribute(String, Computed, "Network ACL ID"),
                    "network_acl" => attribute(String, Optional, "Network ACL ID, conflicts with `name`"),
                    "name" => attribute(String, Optional, "Network ACL name"),
                    "vpc_name" => attribute(String, Optional, "Name of the VPC the ACL belongs to, to disambiguate `name`"),
                    "vpc" => attribute(String, Computed, "ID of the VPC of the network ACL"),
                    "resource_group" => attribute(String, Computed, "Resource group ID"),
                    "resource_group_name" => attribute(String, Computed, "Resource group name"),
                    "crn" => attribute(String, Computed, "CRN of the network ACL"),
                    "rules" => computed_objects(
                        "Rules of the network ACL, in evaluation order",
                        computed_attributes(rule_block()),
                    ),
                },
                ..Default::default()
            },
        }
    }
}

#[async_trait]
impl<'a> WithValidate for NetworkAclDataSourceState<'a> {
    async fn validate(&self, diags: &mut Diagnostics, attr_path: AttributePath) {
        match (self.network_acl.is_null(), self.name.is_null()) {
            (false, false) => diags.error(
                "Conflicting attributes",
                "Only one of `network_acl` and `name` can be set",
                attr_path.attribute("name"),
            ),
            (true, true) => diags.root_error_short("One of `network_acl` or `name` must be set"),
            _ => {}
        }
    }
}

impl<'a> NetworkAclDataSourceState<'a> {
    fn flatten(&mut self, acl: NetworkAcl) {
        let subnets = acl.subnets.len();
        self.id = acl.id.clone().into();
        self.network_acl = acl.id.into();
        self.name = acl.name.into();
        self.vpc_name = acl.vpc.name.unwrap_or_default().into();
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
}

/// Find the ACL by id, or by name within the optional VPC name
async fn lookup(session: &Session, config: &NetworkAclDataSourceState<'_>) -> Result<NetworkAcl> {
    let vpc = session.vpc();
    let id = match config.network_acl.as_deref_option() {
        Some(id) => id.to_owned(),
        None => {
            let name = config.name.as_str();
            let vpc_name = config.vpc_name.as_deref_option();
            vpc.list_network_acls(&[])
                .await
                .context("Error fetching network ACLs")?
                .into_iter()
                .find(|acl| {
                    acl.name == name
                        && vpc_name.map_or(true, |vpc_name| acl.vpc.name_or_empty() == vpc_name)
                })
                .map(|acl| acl.id)
                .ok_or_else(|| match vpc_name {
                    Some(vpc_name) => {
                        anyhow!("No Network ACL found with name {name} in VPC {vpc_name}")
                    }
                    None => anyhow!("No Network ACL found with name {name}"),
                })?
        }
    };

    let mut acl = vpc
        .get_network_acl(&id)
        .await
        .found()
        .with_context(|| format!("Error getting Network ACL ({id})"))?
        .ok_or_else(|| anyhow!("No Network ACL found with id {id}"))?;
    acl.rules = vpc
        .list_network_acl_rules(&id)
        .await
        .with_context(|| format!("Error listing rules of Network ACL ({id})"))?;
    Ok(acl)
}

#[derive(Debug, Default, Clone)]
pub struct NetworkAclDataSource {
    session: SessionHandle,
}

impl NetworkAclDataSource {
    pub fn new(session: SessionHandle) -> Self {
        Self { session }
    }
}

#[async_trait]
impl DataSource for NetworkAclDataSource {
    type State<'a> = NetworkAclDataSourceState<'a>;
    type ProviderMetaState<'a> = ValueEmpty;

    fn schema(&self, _diags: &mut Diagnostics) -> Option<Schema> {
        Some(NetworkAclDataSourceState::schema())
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
        match lookup(&session, &config).await {
            Ok(acl) => {
                let mut state = config;
                state.flatten(acl);
                Some(state)
            }
            Err(err) => {
                diags.root_error("Error reading Network ACL", format!("{err:#}"));
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

    fn acl(id: &str, vpc: &str) -> serde_json::Value {
        serde_json::json!({
            "id": id,
            "crn": format!("crn:v1:bluemix:public:is:us-south:a/acc-1::network-acl:{id}"),
            "name": "shared-name",
            "vpc": { "id": format!("{vpc}-id"), "name": vpc },
            "resource_group": { "id": "rg-1", "name": "default" },
            "subnets": [],
        })
    }

    #[tokio::test]
    async fn finds_by_name_within_vpc_across_pages() {
        let server = MockServer::start().await;
        let next = format!("{}/v1/network_acls?limit=50&start=page-2", server.uri());
        Mock::given(method("GET"))
            .and(path("/v1/network_acls"))
            .and(query_param("start", "page-2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "network_acls": [acl("acl-2", "vpc-b")],
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/network_acls"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "network_acls": [acl("acl-1", "vpc-a")],
                "next": { "href": next },
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/network_acls/acl-2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(acl("acl-2", "vpc-b")))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/network_acls/acl-2/rules"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "rules": [{
                    "id": "rule-1",
                    "name": "ping",
                    "action": "allow",
                    "protocol": "icmp",
                    "code": 0,
                    "type": 8,
                }],
            })))
            .mount(&server)
            .await;

        let data_source = NetworkAclDataSource::new(mock_handle(&server.uri()));
        let mut diags = Diagnostics::default();
        let config = NetworkAclDataSourceState {
            name: "shared-name".into(),
            vpc_name: "vpc-b".into(),
            ..Default::default()
        };
        let state = data_source
            .read(&mut diags, config, Default::default())
            .await
            .unwrap();
        assert!(diags.errors.is_empty(), "{diags:?}");
        assert_eq!(state.id, Value::from("acl-2"));
        assert_eq!(state.vpc, Value::from("vpc-b-id"));

        let rules = state.rules.as_ref_option().unwrap();
        let rule = rules[0].as_ref_option().unwrap();
        let icmp = rule.icmp.as_ref_option().unwrap();
        assert_eq!(icmp.icmp_type, Value::Value(8));
        assert!(rule.tcp.is_null());
    }

    #[tokio::test]
    async fn no_match_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/network_acls"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "network_acls": [acl("acl-1", "vpc-a")],
            })))
            .mount(&server)
            .await;

        let data_source = NetworkAclDataSource::new(mock_handle(&server.uri()));
        let mut diags = Diagnostics::default();
        let config = NetworkAclDataSourceState {
            name: "other".into(),
            ..Default::default()
        };
        assert!(data_source
            .read(&mut diags, config, Default::default())
            .await
            .is_none());
        assert_eq!(diags.errors.len(), 1);
        assert!(diags.errors[0].detail.contains("No Network ACL found with name other"));
    }
}
